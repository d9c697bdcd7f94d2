//! Built-in variables: their GLSL spelling and what they require.

use shadex_ir::{AddressSpace, BuiltIn, ScalarKind, ShaderStage};

use crate::extensions::{SubgroupFeature, Trigger};
use crate::options::Options;

/// The GLSL variable behind `builtin`. `space` tells `gl_SampleMaskIn`
/// from `gl_SampleMask`.
pub fn builtin_name(builtin: BuiltIn, space: AddressSpace, options: &Options) -> &'static str {
    let vulkan = options.vulkan_semantics;
    match builtin {
        BuiltIn::Position => "gl_Position",
        BuiltIn::PointSize => "gl_PointSize",
        BuiltIn::ClipDistance => "gl_ClipDistance",
        BuiltIn::VertexIndex if vulkan => "gl_VertexIndex",
        BuiltIn::VertexIndex => "gl_VertexID",
        BuiltIn::InstanceIndex if vulkan => "gl_InstanceIndex",
        BuiltIn::InstanceIndex => "gl_InstanceID",
        BuiltIn::FrontFacing => "gl_FrontFacing",
        BuiltIn::FragCoord => "gl_FragCoord",
        BuiltIn::FragDepth => "gl_FragDepth",
        BuiltIn::PointCoord => "gl_PointCoord",
        BuiltIn::SampleIndex => "gl_SampleID",
        BuiltIn::SampleMask if space == AddressSpace::Input => "gl_SampleMaskIn[0]",
        BuiltIn::SampleMask => "gl_SampleMask[0]",
        BuiltIn::PrimitiveId => "gl_PrimitiveID",
        BuiltIn::InvocationId => "gl_InvocationID",
        BuiltIn::Layer => "gl_Layer",
        BuiltIn::ViewportIndex => "gl_ViewportIndex",
        BuiltIn::ViewIndex if vulkan => "gl_ViewIndex",
        BuiltIn::ViewIndex => "gl_ViewID_OVR",
        BuiltIn::TessLevelOuter => "gl_TessLevelOuter",
        BuiltIn::TessLevelInner => "gl_TessLevelInner",
        BuiltIn::TessCoord => "gl_TessCoord",
        BuiltIn::GlobalInvocationId => "gl_GlobalInvocationID",
        BuiltIn::LocalInvocationId => "gl_LocalInvocationID",
        BuiltIn::LocalInvocationIndex => "gl_LocalInvocationIndex",
        BuiltIn::WorkgroupId => "gl_WorkGroupID",
        BuiltIn::NumWorkgroups => "gl_NumWorkGroups",
        BuiltIn::SubgroupSize => "gl_SubgroupSize",
        BuiltIn::SubgroupInvocationId => "gl_SubgroupInvocationID",
        BuiltIn::NumSubgroups => "gl_NumSubgroups",
        BuiltIn::SubgroupId => "gl_SubgroupID",
    }
}

/// Scalar kind GLSL declares for builtins that are `int` even though the
/// IR may carry them as `uint`. `None` means no conversion is ever needed.
pub fn builtin_kind(builtin: BuiltIn, options: &Options) -> Option<ScalarKind> {
    match builtin {
        BuiltIn::VertexIndex
        | BuiltIn::InstanceIndex
        | BuiltIn::SampleIndex
        | BuiltIn::SampleMask
        | BuiltIn::PrimitiveId
        | BuiltIn::InvocationId
        | BuiltIn::Layer
        | BuiltIn::ViewportIndex => Some(ScalarKind::Sint),
        BuiltIn::ViewIndex if options.vulkan_semantics => Some(ScalarKind::Sint),
        BuiltIn::ViewIndex => Some(ScalarKind::Uint),
        _ => None,
    }
}

/// Feature a builtin depends on, if any.
pub fn builtin_trigger(builtin: BuiltIn, stage: ShaderStage) -> Option<Trigger> {
    match builtin {
        BuiltIn::SampleIndex | BuiltIn::SampleMask => Some(Trigger::SampleRateShading),
        BuiltIn::ClipDistance => Some(Trigger::ClipDistance),
        BuiltIn::ViewIndex => Some(Trigger::MultiView),
        // Geometry shaders always had these; other stages need an extension.
        BuiltIn::Layer | BuiltIn::ViewportIndex
            if !matches!(stage, ShaderStage::Geometry | ShaderStage::Fragment) =>
        {
            Some(Trigger::ViewportIndexLayer)
        }
        _ => None,
    }
}

pub fn builtin_subgroup_feature(builtin: BuiltIn) -> Option<SubgroupFeature> {
    match builtin {
        BuiltIn::SubgroupSize | BuiltIn::SubgroupInvocationId => Some(SubgroupFeature::Basic),
        BuiltIn::NumSubgroups | BuiltIn::SubgroupId => Some(SubgroupFeature::ComputeIds),
        _ => None,
    }
}
