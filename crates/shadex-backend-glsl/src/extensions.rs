//! Extension and capability resolution.
//!
//! Every language feature that is not core in all GLSL dialects is a
//! [`Trigger`]. Each trigger maps to a [`TriggerRule`] with one
//! [`Requirement`] per profile; resolving a trigger against the target
//! [`Options`] yields the `#extension` lines to enable, or an
//! [`Error::UnsupportedFeature`] when the target cannot express it.
//!
//! Subgroup operations are resolved separately through ranked candidate
//! lists, since plain OpenGL has several competing vendor extensions.

use std::fmt;

use crate::{Error, Options};

/// A language feature that may need an extension or a minimum version.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Trigger {
    Int64,
    Float64,
    Int16,
    Float16,
    Int8,
    Storage16Bit,
    Storage8Bit,
    UnsignedIntegers,
    ComputeStage,
    GeometryStage,
    TessellationStage,
    MeshStage,
    RayTracingStage,
    MultiView,
    SampleRateShading,
    SampleInterpolation,
    ViewportIndexLayer,
    ClipDistance,
    PhysicalStorageBuffer,
    RayQuery,
    StorageBuffer,
    IoBlocks,
    ExplicitAttribLocation,
    SeparateShaderObjects,
    BindingLayout,
    DualSourceBlend,
    EarlyFragmentTests,
    ConservativeDepth,
    PostDepthCoverage,
    StandardDerivatives,
    DerivativeControl,
    IntegerOps,
    BitOps,
    FloatBitcast,
    Packing2x16,
    Packing4x8,
    FusedMultiplyAdd,
    FloatAtomics,
    Int64Atomics,
    EnhancedLayouts,
    ScalarBlockLayout,
}

impl Trigger {
    /// Every trigger, in declaration order.
    pub const ALL: [Trigger; 41] = [
        Self::Int64,
        Self::Float64,
        Self::Int16,
        Self::Float16,
        Self::Int8,
        Self::Storage16Bit,
        Self::Storage8Bit,
        Self::UnsignedIntegers,
        Self::ComputeStage,
        Self::GeometryStage,
        Self::TessellationStage,
        Self::MeshStage,
        Self::RayTracingStage,
        Self::MultiView,
        Self::SampleRateShading,
        Self::SampleInterpolation,
        Self::ViewportIndexLayer,
        Self::ClipDistance,
        Self::PhysicalStorageBuffer,
        Self::RayQuery,
        Self::StorageBuffer,
        Self::IoBlocks,
        Self::ExplicitAttribLocation,
        Self::SeparateShaderObjects,
        Self::BindingLayout,
        Self::DualSourceBlend,
        Self::EarlyFragmentTests,
        Self::ConservativeDepth,
        Self::PostDepthCoverage,
        Self::StandardDerivatives,
        Self::DerivativeControl,
        Self::IntegerOps,
        Self::BitOps,
        Self::FloatBitcast,
        Self::Packing2x16,
        Self::Packing4x8,
        Self::FusedMultiplyAdd,
        Self::FloatAtomics,
        Self::Int64Atomics,
        Self::EnhancedLayouts,
        Self::ScalarBlockLayout,
    ];
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int64 => "64-bit integers",
            Self::Float64 => "64-bit floats",
            Self::Int16 => "16-bit integers",
            Self::Float16 => "16-bit floats",
            Self::Int8 => "8-bit integers",
            Self::Storage16Bit => "16-bit storage",
            Self::Storage8Bit => "8-bit storage",
            Self::UnsignedIntegers => "unsigned integers",
            Self::ComputeStage => "compute shaders",
            Self::GeometryStage => "geometry shaders",
            Self::TessellationStage => "tessellation shaders",
            Self::MeshStage => "mesh and task shaders",
            Self::RayTracingStage => "ray tracing shaders",
            Self::MultiView => "multiview",
            Self::SampleRateShading => "sample-rate shading",
            Self::SampleInterpolation => "per-sample interpolation",
            Self::ViewportIndexLayer => "viewport index and layer outside geometry shaders",
            Self::ClipDistance => "clip distances",
            Self::PhysicalStorageBuffer => "physical storage buffer pointers",
            Self::RayQuery => "ray queries",
            Self::StorageBuffer => "shader storage buffers",
            Self::IoBlocks => "interface blocks",
            Self::ExplicitAttribLocation => "explicit attribute locations",
            Self::SeparateShaderObjects => "explicit varying locations",
            Self::BindingLayout => "explicit binding layouts",
            Self::DualSourceBlend => "dual-source blending",
            Self::EarlyFragmentTests => "early fragment tests",
            Self::ConservativeDepth => "conservative depth",
            Self::PostDepthCoverage => "post depth coverage",
            Self::StandardDerivatives => "derivatives",
            Self::DerivativeControl => "derivative control",
            Self::IntegerOps => "integer operators",
            Self::BitOps => "bit manipulation builtins",
            Self::FloatBitcast => "float bit casts",
            Self::Packing2x16 => "2x16 packing builtins",
            Self::Packing4x8 => "4x8 packing builtins",
            Self::FusedMultiplyAdd => "fused multiply-add",
            Self::FloatAtomics => "float atomics",
            Self::Int64Atomics => "64-bit integer atomics",
            Self::EnhancedLayouts => "enhanced layouts",
            Self::ScalarBlockLayout => "scalar block layout",
        })
    }
}

/// How a trigger is satisfied under Vulkan semantics.
#[derive(Clone, Copy, Debug)]
pub enum VulkanRule {
    /// Available without extensions.
    Core,
    /// Needs these extensions, from `min_version` on.
    Extensions {
        names: &'static [&'static str],
        min_version: u32,
    },
    /// Resolved exactly like plain OpenGL for the same profile.
    SameAsGl,
    Unsupported,
}

/// What one profile (desktop or ES) needs for a trigger.
#[derive(Clone, Copy, Debug)]
pub enum Requirement {
    Supported {
        /// First version where the feature is core.
        core_since: Option<u32>,
        /// Extensions that provide the feature below `core_since`.
        extensions: &'static [&'static str],
        /// Oldest version the extensions can be enabled on.
        ext_min_version: u32,
        vulkan: VulkanRule,
    },
    Unsupported,
}

#[derive(Clone, Copy, Debug)]
pub struct TriggerRule {
    pub desktop: Requirement,
    pub es: Requirement,
}

const fn core(since: u32, vulkan: VulkanRule) -> Requirement {
    Requirement::Supported {
        core_since: Some(since),
        extensions: &[],
        ext_min_version: 0,
        vulkan,
    }
}

const fn core_or(
    since: u32,
    extensions: &'static [&'static str],
    ext_min_version: u32,
    vulkan: VulkanRule,
) -> Requirement {
    Requirement::Supported {
        core_since: Some(since),
        extensions,
        ext_min_version,
        vulkan,
    }
}

const fn ext_only(
    extensions: &'static [&'static str],
    ext_min_version: u32,
    vulkan: VulkanRule,
) -> Requirement {
    Requirement::Supported {
        core_since: None,
        extensions,
        ext_min_version,
        vulkan,
    }
}

const fn vulkan_only(names: &'static [&'static str], min_version: u32) -> Requirement {
    Requirement::Supported {
        core_since: None,
        extensions: &[],
        ext_min_version: 0,
        vulkan: VulkanRule::Extensions { names, min_version },
    }
}

const fn vk_ext(names: &'static [&'static str]) -> VulkanRule {
    VulkanRule::Extensions {
        names,
        min_version: 0,
    }
}

const CORE: VulkanRule = VulkanRule::Core;
const AS_GL: VulkanRule = VulkanRule::SameAsGl;

const INT64_TYPES: &[&str] = &["GL_EXT_shader_explicit_arithmetic_types_int64"];
const INT16_TYPES: &[&str] = &["GL_EXT_shader_explicit_arithmetic_types_int16"];
const INT8_TYPES: &[&str] = &["GL_EXT_shader_explicit_arithmetic_types_int8"];
const FLOAT16_TYPES: &[&str] = &["GL_EXT_shader_explicit_arithmetic_types_float16"];

/// The rule table.
pub fn rule(trigger: Trigger) -> TriggerRule {
    use Trigger as T;
    let (desktop, es) = match trigger {
        T::Int64 => (
            ext_only(&["GL_ARB_gpu_shader_int64"], 400, vk_ext(INT64_TYPES)),
            ext_only(INT64_TYPES, 310, vk_ext(INT64_TYPES)),
        ),
        T::Float64 => (
            core_or(400, &["GL_ARB_gpu_shader_fp64"], 150, CORE),
            Requirement::Unsupported,
        ),
        T::Int16 => (
            ext_only(&["GL_AMD_gpu_shader_int16"], 450, vk_ext(INT16_TYPES)),
            ext_only(INT16_TYPES, 310, vk_ext(INT16_TYPES)),
        ),
        T::Float16 => (
            ext_only(&["GL_AMD_gpu_shader_half_float"], 450, vk_ext(FLOAT16_TYPES)),
            ext_only(FLOAT16_TYPES, 310, vk_ext(FLOAT16_TYPES)),
        ),
        T::Int8 => (
            ext_only(INT8_TYPES, 450, vk_ext(INT8_TYPES)),
            ext_only(INT8_TYPES, 310, vk_ext(INT8_TYPES)),
        ),
        T::Storage16Bit => (
            vulkan_only(&["GL_EXT_shader_16bit_storage"], 0),
            vulkan_only(&["GL_EXT_shader_16bit_storage"], 0),
        ),
        T::Storage8Bit => (
            vulkan_only(&["GL_EXT_shader_8bit_storage"], 0),
            vulkan_only(&["GL_EXT_shader_8bit_storage"], 0),
        ),
        T::UnsignedIntegers | T::IntegerOps => (core(130, CORE), core(300, CORE)),
        T::ComputeStage => (
            core_or(430, &["GL_ARB_compute_shader"], 140, CORE),
            core(310, CORE),
        ),
        T::GeometryStage => (
            core(150, CORE),
            core_or(320, &["GL_EXT_geometry_shader"], 310, AS_GL),
        ),
        T::TessellationStage => (
            core_or(400, &["GL_ARB_tessellation_shader"], 150, CORE),
            core_or(320, &["GL_EXT_tessellation_shader"], 310, AS_GL),
        ),
        T::MeshStage => (
            vulkan_only(&["GL_EXT_mesh_shader"], 450),
            Requirement::Unsupported,
        ),
        T::RayTracingStage => (
            vulkan_only(&["GL_EXT_ray_tracing"], 460),
            Requirement::Unsupported,
        ),
        T::RayQuery => (
            vulkan_only(&["GL_EXT_ray_query"], 460),
            Requirement::Unsupported,
        ),
        T::MultiView => (
            ext_only(&["GL_OVR_multiview2"], 330, vk_ext(&["GL_EXT_multiview"])),
            ext_only(&["GL_OVR_multiview2"], 300, vk_ext(&["GL_EXT_multiview"])),
        ),
        T::SampleRateShading => (
            core_or(400, &["GL_ARB_sample_shading"], 150, CORE),
            core_or(320, &["GL_OES_sample_variables"], 300, AS_GL),
        ),
        T::SampleInterpolation => (
            core_or(400, &["GL_ARB_gpu_shader5"], 150, CORE),
            core_or(
                320,
                &["GL_OES_shader_multisample_interpolation"],
                300,
                AS_GL,
            ),
        ),
        T::ViewportIndexLayer => (
            ext_only(
                &["GL_ARB_shader_viewport_layer_array"],
                450,
                vk_ext(&["GL_ARB_shader_viewport_layer_array"]),
            ),
            ext_only(&["GL_NV_viewport_array2"], 310, AS_GL),
        ),
        T::ClipDistance => (
            core(130, CORE),
            ext_only(&["GL_EXT_clip_cull_distance"], 300, AS_GL),
        ),
        T::PhysicalStorageBuffer => (
            vulkan_only(&["GL_EXT_buffer_reference"], 0),
            vulkan_only(&["GL_EXT_buffer_reference"], 0),
        ),
        T::StorageBuffer => (
            core_or(430, &["GL_ARB_shader_storage_buffer_object"], 140, CORE),
            core(310, CORE),
        ),
        T::IoBlocks => (
            core(150, CORE),
            core_or(320, &["GL_EXT_shader_io_blocks"], 310, AS_GL),
        ),
        T::ExplicitAttribLocation => (
            core_or(330, &["GL_ARB_explicit_attrib_location"], 150, CORE),
            core(300, CORE),
        ),
        T::SeparateShaderObjects => (
            core_or(410, &["GL_ARB_separate_shader_objects"], 150, CORE),
            core(310, CORE),
        ),
        T::BindingLayout => (
            core_or(420, &["GL_ARB_shading_language_420pack"], 140, CORE),
            core(310, CORE),
        ),
        T::DualSourceBlend => (
            core_or(330, &["GL_ARB_blend_func_extended"], 150, CORE),
            ext_only(&["GL_EXT_blend_func_extended"], 300, AS_GL),
        ),
        T::EarlyFragmentTests => (
            core_or(420, &["GL_ARB_shader_image_load_store"], 130, CORE),
            core(310, CORE),
        ),
        T::ConservativeDepth => (
            core_or(420, &["GL_ARB_conservative_depth"], 130, CORE),
            ext_only(&["GL_EXT_conservative_depth"], 300, AS_GL),
        ),
        T::PostDepthCoverage => (
            ext_only(&["GL_ARB_post_depth_coverage"], 150, AS_GL),
            ext_only(&["GL_EXT_post_depth_coverage"], 310, AS_GL),
        ),
        T::StandardDerivatives => (
            core(110, CORE),
            core_or(300, &["GL_OES_standard_derivatives"], 100, CORE),
        ),
        T::DerivativeControl => (
            core_or(450, &["GL_ARB_derivative_control"], 400, CORE),
            Requirement::Unsupported,
        ),
        T::BitOps => (
            core_or(400, &["GL_ARB_gpu_shader5"], 150, CORE),
            core(310, CORE),
        ),
        T::FloatBitcast => (
            core_or(330, &["GL_ARB_shader_bit_encoding"], 150, CORE),
            core(300, CORE),
        ),
        T::Packing2x16 => (
            core_or(420, &["GL_ARB_shading_language_packing"], 140, CORE),
            core(300, CORE),
        ),
        T::Packing4x8 => (
            core_or(400, &["GL_ARB_shading_language_packing"], 140, CORE),
            core(310, CORE),
        ),
        T::FusedMultiplyAdd => (
            core_or(400, &["GL_ARB_gpu_shader5"], 150, CORE),
            core_or(320, &["GL_EXT_gpu_shader5"], 310, AS_GL),
        ),
        T::FloatAtomics => (
            ext_only(
                &["GL_EXT_shader_atomic_float"],
                450,
                vk_ext(&["GL_EXT_shader_atomic_float"]),
            ),
            ext_only(&["GL_EXT_shader_atomic_float"], 310, AS_GL),
        ),
        T::Int64Atomics => (
            ext_only(
                &["GL_EXT_shader_atomic_int64"],
                450,
                vk_ext(&["GL_EXT_shader_atomic_int64"]),
            ),
            Requirement::Unsupported,
        ),
        T::EnhancedLayouts => (
            core_or(440, &["GL_ARB_enhanced_layouts"], 140, CORE),
            Requirement::Supported {
                core_since: None,
                extensions: &[],
                ext_min_version: 0,
                vulkan: CORE,
            },
        ),
        T::ScalarBlockLayout => (
            vulkan_only(&["GL_EXT_scalar_block_layout"], 0),
            vulkan_only(&["GL_EXT_scalar_block_layout"], 0),
        ),
    };
    TriggerRule { desktop, es }
}

/// Resolves a trigger to the extensions it needs on the target.
///
/// An empty slice means the feature is core.
pub fn resolve(trigger: Trigger, options: &Options) -> Result<&'static [&'static str], Error> {
    let rule = rule(trigger);
    let requirement = if options.es { rule.es } else { rule.desktop };
    let target = options.target_label();
    let unsupported = |reason: String| Error::UnsupportedFeature { trigger, reason };

    let Requirement::Supported {
        core_since,
        extensions,
        ext_min_version,
        vulkan,
    } = requirement
    else {
        return Err(unsupported(format!("not available in {target}")));
    };

    if options.vulkan_semantics {
        match vulkan {
            VulkanRule::Core => return Ok(&[]),
            VulkanRule::Extensions { names, min_version } => {
                if options.version < min_version {
                    return Err(unsupported(format!(
                        "needs Vulkan GLSL {min_version} or later, target is {target}"
                    )));
                }
                return Ok(names);
            }
            VulkanRule::Unsupported => {
                return Err(unsupported(format!("not available in {target}")));
            }
            VulkanRule::SameAsGl => {}
        }
    }

    if core_since.is_some_and(|v| options.version >= v) {
        return Ok(&[]);
    }
    if !extensions.is_empty() && options.version >= ext_min_version {
        return Ok(extensions);
    }

    let mut needs = Vec::new();
    if let Some(v) = core_since {
        needs.push(format!("version {v}"));
    }
    if !extensions.is_empty() {
        needs.push(format!(
            "{} from version {ext_min_version}",
            extensions.join(" + ")
        ));
    }
    if needs.is_empty() {
        needs.push("Vulkan semantics".to_string());
    }
    Err(unsupported(format!(
        "needs {}, target is {target}",
        needs.join(" or ")
    )))
}

/// Like [`resolve`], but treats an unavailable feature as `None` for
/// callers that have a fallback.
pub fn resolve_optional(trigger: Trigger, options: &Options) -> Option<&'static [&'static str]> {
    resolve(trigger, options).ok()
}

/// A group of subgroup builtins that share one extension family.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum SubgroupFeature {
    /// `gl_SubgroupSize`, `gl_SubgroupInvocationID`.
    Basic,
    Elect,
    Barrier,
    Vote,
    Ballot,
    Broadcast,
    Arithmetic,
    Shuffle,
    /// `gl_NumSubgroups`, `gl_SubgroupID`.
    ComputeIds,
}

/// One way of providing a subgroup feature: every extension must be
/// defined; the first is required, the others are merely enabled.
#[derive(Clone, Copy, Debug)]
pub struct SubgroupCandidate {
    pub extensions: &'static [&'static str],
}

impl SubgroupFeature {
    /// The Khronos extension used under Vulkan semantics.
    pub fn khr_extension(self) -> &'static str {
        match self {
            Self::Basic | Self::Elect | Self::Barrier | Self::ComputeIds => {
                "GL_KHR_shader_subgroup_basic"
            }
            Self::Vote => "GL_KHR_shader_subgroup_vote",
            Self::Ballot | Self::Broadcast => "GL_KHR_shader_subgroup_ballot",
            Self::Arithmetic => "GL_KHR_shader_subgroup_arithmetic",
            Self::Shuffle => "GL_KHR_shader_subgroup_shuffle",
        }
    }

    /// Ranked candidates for plain OpenGL, best first.
    pub fn candidates(self) -> &'static [SubgroupCandidate] {
        match self {
            Self::Basic => &[
                SubgroupCandidate {
                    extensions: &["GL_KHR_shader_subgroup_basic"],
                },
                SubgroupCandidate {
                    extensions: &["GL_NV_shader_thread_group"],
                },
                SubgroupCandidate {
                    extensions: &["GL_ARB_shader_ballot"],
                },
            ],
            Self::Elect | Self::Barrier | Self::ComputeIds => &[SubgroupCandidate {
                extensions: &["GL_KHR_shader_subgroup_basic"],
            }],
            Self::Vote => &[
                SubgroupCandidate {
                    extensions: &["GL_KHR_shader_subgroup_vote"],
                },
                SubgroupCandidate {
                    extensions: &["GL_NV_gpu_shader5"],
                },
                SubgroupCandidate {
                    extensions: &["GL_ARB_shader_group_vote"],
                },
            ],
            Self::Ballot => &[
                SubgroupCandidate {
                    extensions: &["GL_KHR_shader_subgroup_ballot"],
                },
                SubgroupCandidate {
                    extensions: &["GL_NV_shader_thread_group"],
                },
                SubgroupCandidate {
                    extensions: &["GL_ARB_shader_ballot", "GL_ARB_shader_int64"],
                },
            ],
            Self::Broadcast => &[
                SubgroupCandidate {
                    extensions: &["GL_KHR_shader_subgroup_ballot"],
                },
                SubgroupCandidate {
                    extensions: &["GL_NV_shader_thread_shuffle"],
                },
                SubgroupCandidate {
                    extensions: &["GL_ARB_shader_ballot", "GL_ARB_shader_int64"],
                },
            ],
            Self::Arithmetic => &[SubgroupCandidate {
                extensions: &["GL_KHR_shader_subgroup_arithmetic"],
            }],
            Self::Shuffle => &[
                SubgroupCandidate {
                    extensions: &["GL_KHR_shader_subgroup_shuffle"],
                },
                SubgroupCandidate {
                    extensions: &["GL_NV_shader_thread_shuffle"],
                },
            ],
        }
    }
}

/// Writes the `#if defined(..) / #elif / #else #error / #endif` chain that
/// enables the best available candidate for `feature`.
pub fn write_subgroup_chain(out: &mut String, feature: SubgroupFeature) {
    for (i, candidate) in feature.candidates().iter().enumerate() {
        let condition = candidate
            .extensions
            .iter()
            .map(|e| format!("defined({e})"))
            .collect::<Vec<_>>()
            .join(" && ");
        let keyword = if i == 0 { "#if" } else { "#elif" };
        out.push_str(&format!("{keyword} {condition}\n"));
        let Some((required, enabled)) = candidate.extensions.split_first() else {
            continue;
        };
        for ext in enabled {
            out.push_str(&format!("#extension {ext} : enable\n"));
        }
        out.push_str(&format!("#extension {required} : require\n"));
    }
    out.push_str("#else\n");
    out.push_str("#error No extensions available to emulate requested subgroup feature.\n");
    out.push_str("#endif\n");
}
