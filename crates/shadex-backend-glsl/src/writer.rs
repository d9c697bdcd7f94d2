//! One pass: planning, the header and every module-scope declaration.
//!
//! Output order is fixed: `#version`, extensions, precision and mode
//! layouts, specialization constants, structs, buffer and interface
//! blocks, other globals, helper functions, then user functions in call
//! graph post-order with `main` last.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use shadex_analysis::TypeResolution;
use shadex_ir::{
    AddressSpace, ArraySize, BuiltIn, Capability, ConstantValue, ExecutionMode, FunctionKey,
    GlobalVariable, Handle, Interpolation, MatrixMajor, Module, Primitive, Sampling, Scalar,
    ScalarKind, ShaderStage, StorageAccess, TessSpacing, Type, TypeInner,
};

use crate::builtin::{builtin_name, builtin_subgroup_feature, builtin_trigger};
use crate::driver::Compiler;
use crate::extensions::{Trigger, write_subgroup_chain};
use crate::ids::Entity;
use crate::layout::{BlockLayout, BufferKind};
use crate::names::{NameKey, Namespace};
use crate::state::{Dialect, ExprState};
use crate::types::{location_slots, simple_type_name, zero_literal};
use crate::Error;

/// How a live global is declared.
#[derive(Clone, Copy, Debug)]
pub(crate) enum GlobalForm {
    Builtin(BuiltIn),
    /// A struct-typed buffer declared as a block with a named instance.
    Block {
        kind: BufferKind,
        layout: BlockLayout,
    },
    /// A non-struct buffer wrapped in a block without an instance name.
    Wrapped {
        kind: BufferKind,
        layout: BlockLayout,
    },
    /// `uniform T name;`
    PlainUniform,
    IoBlock,
    /// Interface block members declared as separate variables.
    FlattenedIo,
    Io,
    /// Legacy fragment output, written through `gl_FragData`.
    FragData(u32),
    Private,
    Workgroup,
}

#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub globals: BTreeMap<Handle<GlobalVariable>, GlobalForm>,
    /// Struct types declared as blocks, with the namespace of the block name.
    pub block_types: BTreeMap<Handle<Type>, Namespace>,
    /// Struct types that need a `struct` declaration, dependencies first.
    pub structs: Vec<Handle<Type>>,
    /// Pointees of physical pointers, declared as `buffer_reference` blocks.
    pub references: Vec<Handle<Type>>,
}

#[derive(Default)]
struct TypeScan {
    scalars: BTreeSet<Scalar>,
    seen: HashSet<Handle<Type>>,
    structs: Vec<Handle<Type>>,
    references: Vec<Handle<Type>>,
}

impl TypeScan {
    fn visit(&mut self, module: &Module, ty: Handle<Type>) -> Result<(), Error> {
        if !self.seen.insert(ty) {
            return Ok(());
        }
        match module.types.fetch(ty)?.inner {
            TypeInner::Scalar(s)
            | TypeInner::Atomic(s)
            | TypeInner::Vector { scalar: s, .. }
            | TypeInner::Matrix { scalar: s, .. } => {
                self.scalars.insert(s);
            }
            TypeInner::Array { base, .. } => self.visit(module, base)?,
            TypeInner::Struct { ref members, .. } => {
                for member in members {
                    self.visit(module, member.ty)?;
                }
                self.structs.push(ty);
            }
            TypeInner::Pointer {
                base,
                space: AddressSpace::PhysicalStorage,
            } => {
                self.visit_members(module, base)?;
                if !self.references.contains(&base) {
                    self.references.push(base);
                }
            }
            TypeInner::Pointer { base, .. } => self.visit(module, base)?,
        }
        Ok(())
    }

    /// Visits what a block of type `ty` contains without declaring `ty`
    /// itself as a struct.
    fn visit_members(&mut self, module: &Module, ty: Handle<Type>) -> Result<(), Error> {
        match module.types.fetch(ty)?.inner {
            TypeInner::Struct { ref members, .. } => {
                for member in members {
                    self.visit(module, member.ty)?;
                }
                Ok(())
            }
            _ => self.visit(module, ty),
        }
    }
}

fn scalar_trigger(scalar: Scalar) -> Option<Trigger> {
    match (scalar.kind, scalar.width) {
        (ScalarKind::Sint | ScalarKind::Uint, 8) => Some(Trigger::Int64),
        (ScalarKind::Float, 8) => Some(Trigger::Float64),
        (ScalarKind::Sint | ScalarKind::Uint, 2) => Some(Trigger::Int16),
        (ScalarKind::Float, 2) => Some(Trigger::Float16),
        (ScalarKind::Sint | ScalarKind::Uint, 1) => Some(Trigger::Int8),
        (ScalarKind::Uint, 4) => Some(Trigger::UnsignedIntegers),
        _ => None,
    }
}

/// Capabilities that only matter where a body uses them are handled by
/// the expression writer.
fn capability_trigger(capability: Capability) -> Option<Trigger> {
    Some(match capability {
        Capability::Int8 => Trigger::Int8,
        Capability::Int16 => Trigger::Int16,
        Capability::Int64 => Trigger::Int64,
        Capability::Float16 => Trigger::Float16,
        Capability::Float64 => Trigger::Float64,
        Capability::StorageBuffer8BitAccess => Trigger::Storage8Bit,
        Capability::StorageBuffer16BitAccess => Trigger::Storage16Bit,
        Capability::MultiView => Trigger::MultiView,
        Capability::SampleRateShading => Trigger::SampleRateShading,
        Capability::ShaderViewportIndexLayer => Trigger::ViewportIndexLayer,
        Capability::PhysicalStorageBufferAddresses => Trigger::PhysicalStorageBuffer,
        Capability::RayQuery => Trigger::RayQuery,
        Capability::Int64Atomics | Capability::AtomicFloat32Add | Capability::DerivativeControl => {
            return None;
        }
    })
}

fn stage_trigger(stage: ShaderStage) -> Option<Trigger> {
    match stage {
        ShaderStage::Vertex | ShaderStage::Fragment => None,
        ShaderStage::Compute => Some(Trigger::ComputeStage),
        ShaderStage::Geometry => Some(Trigger::GeometryStage),
        ShaderStage::TessellationControl | ShaderStage::TessellationEvaluation => {
            Some(Trigger::TessellationStage)
        }
        ShaderStage::Task | ShaderStage::Mesh => Some(Trigger::MeshStage),
        _ => Some(Trigger::RayTracingStage),
    }
}

fn primitive_name(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Points => "points",
        Primitive::Lines => "lines",
        Primitive::LinesAdjacency => "lines_adjacency",
        Primitive::Triangles => "triangles",
        Primitive::TrianglesAdjacency => "triangles_adjacency",
        Primitive::LineStrip => "line_strip",
        Primitive::TriangleStrip => "triangle_strip",
        Primitive::Quads => "quads",
        Primitive::Isolines => "isolines",
    }
}

/// Vertex inputs and fragment outputs are attributes; everything else
/// on the interface is a varying.
fn is_attribute(space: AddressSpace, stage: ShaderStage) -> bool {
    matches!(
        (space, stage),
        (AddressSpace::Input, ShaderStage::Vertex) | (AddressSpace::Output, ShaderStage::Fragment)
    )
}

impl<'a> Compiler<'a> {
    pub(crate) fn emit_pass(&mut self) -> Result<(), Error> {
        self.prescan()?;
        self.reserve_global_names()?;
        self.write_header()?;
        self.pass.header_written = true;
        self.write_spec_constants()?;
        self.write_structs()?;
        self.write_references()?;
        self.write_globals()?;
        let polyfills: Vec<_> = self.sticky.polyfills.iter().copied().collect();
        for polyfill in polyfills {
            polyfill.write(&mut self.pass.out)?;
        }
        let analyses = self.analyses;
        for &h in analyses.graph.post_order() {
            self.write_function(FunctionKey::Function(h))?;
        }
        self.write_function(FunctionKey::EntryPoint(self.entry_point))
    }

    pub(crate) fn stage(&self) -> ShaderStage {
        self.module.entry_points[self.entry_point].stage
    }

    /// Everything known before any text is written: required features,
    /// how each global is declared and which structs exist.
    fn prescan(&mut self) -> Result<(), Error> {
        let module = self.module;
        let entry = &module.entry_points[self.entry_point];
        let stage = entry.stage;

        for &capability in &module.capabilities {
            if let Some(trigger) = capability_trigger(capability) {
                self.require(trigger)?;
            }
        }
        if let Some(trigger) = stage_trigger(stage) {
            self.require(trigger)?;
        }
        for mode in &entry.modes {
            match mode {
                ExecutionMode::EarlyFragmentTests => self.require(Trigger::EarlyFragmentTests)?,
                ExecutionMode::DepthGreater
                | ExecutionMode::DepthLess
                | ExecutionMode::DepthUnchanged => self.require(Trigger::ConservativeDepth)?,
                ExecutionMode::PostDepthCoverage => self.require(Trigger::PostDepthCoverage)?,
                _ => {}
            }
        }

        let mut plan = Plan::default();
        let mut scan = TypeScan::default();
        let mut wants = Dialect::default();
        let mut io_blocks = None;

        let live: Vec<_> = self.analyses.liveness.iter().collect();
        for h in live {
            let var = module.global_variables.fetch(h)?;
            let form = self.global_form(h, var, stage, &mut io_blocks)?;
            match form {
                GlobalForm::Block { .. }
                | GlobalForm::Wrapped { .. }
                | GlobalForm::IoBlock
                | GlobalForm::FlattenedIo => scan.visit_members(module, var.ty)?,
                _ => scan.visit(module, var.ty)?,
            }
            match form {
                GlobalForm::Block { .. } => {
                    plan.block_types.insert(var.ty, Namespace::BufferBlock);
                }
                GlobalForm::IoBlock => {
                    let ns = if var.space == AddressSpace::Input {
                        Namespace::InputBlock
                    } else {
                        Namespace::OutputBlock
                    };
                    plan.block_types.insert(var.ty, ns);
                }
                _ => {}
            }
            self.scan_global(var, form, stage, &mut wants)?;
            plan.globals.insert(h, form);
        }

        let analyses = self.analyses;
        for key in analyses.graph.reachable_keys(self.entry_point) {
            let func = module.function(key)?;
            let info = analyses.function(key)?;
            for arg in &func.arguments {
                scan.visit(module, arg.ty)?;
            }
            if let Some(result) = &func.result {
                scan.visit(module, result.ty)?;
            }
            for (_, local) in func.local_variables.iter() {
                scan.visit(module, local.ty)?;
            }
            for (h, _) in func.expressions.iter() {
                let Some(resolved) = info.typifier.get(h) else {
                    continue;
                };
                if resolved.pointer.is_some() {
                    continue;
                }
                match resolved.ty {
                    TypeResolution::Handle(ty) => scan.visit(module, ty)?,
                    TypeResolution::Value(ref inner) => {
                        if let Some(s) = inner.scalar() {
                            scan.scalars.insert(s);
                        }
                    }
                }
            }
        }

        for &scalar in &scan.scalars {
            if let Some(trigger) = scalar_trigger(scalar) {
                self.require(trigger)?;
            }
        }
        if !scan.references.is_empty() {
            self.require(Trigger::PhysicalStorageBuffer)?;
            for &ty in &scan.references {
                self.classify_layout(ty, BufferKind::Storage)?;
            }
        }

        self.pass.dialect = Dialect {
            bindings: wants.bindings && self.require_optional(Trigger::BindingLayout),
            attribute_locations: wants.attribute_locations
                && self.require_optional(Trigger::ExplicitAttribLocation),
            varying_locations: wants.varying_locations
                && self.require_optional(Trigger::SeparateShaderObjects),
        };

        plan.structs = scan
            .structs
            .into_iter()
            .filter(|ty| !scan.references.contains(ty))
            .collect();
        plan.references = scan.references;
        self.plan = plan;
        Ok(())
    }

    fn global_form(
        &mut self,
        handle: Handle<GlobalVariable>,
        var: &GlobalVariable,
        stage: ShaderStage,
        io_blocks: &mut Option<bool>,
    ) -> Result<GlobalForm, Error> {
        if let Some(builtin) = var.decorations.built_in {
            return Ok(GlobalForm::Builtin(builtin));
        }
        let module = self.module;
        let is_struct = module.types.fetch(var.ty)?.inner.is_struct();
        let options = self.options;
        let kind = match var.space {
            AddressSpace::Uniform => {
                if options.emit_uniform_buffer_as_plain_uniforms
                    || !options.supports_uniform_blocks()
                {
                    return Ok(GlobalForm::PlainUniform);
                }
                BufferKind::Uniform
            }
            AddressSpace::Storage { .. } => {
                self.require(Trigger::StorageBuffer)?;
                BufferKind::Storage
            }
            AddressSpace::PushConstant => {
                if options.vulkan_semantics {
                    BufferKind::PushConstant
                } else if options.emit_push_constant_as_uniform_buffer {
                    BufferKind::Uniform
                } else {
                    return Ok(GlobalForm::PlainUniform);
                }
            }
            AddressSpace::Input | AddressSpace::Output => {
                if options.is_legacy()
                    && stage == ShaderStage::Fragment
                    && var.space == AddressSpace::Output
                {
                    return Ok(GlobalForm::FragData(var.decorations.location.unwrap_or(0)));
                }
                if !is_struct {
                    return Ok(GlobalForm::Io);
                }
                // Vertex inputs and fragment outputs cannot be blocks.
                if is_attribute(var.space, stage) || options.force_flattened_io_blocks {
                    return Ok(GlobalForm::FlattenedIo);
                }
                let available =
                    *io_blocks.get_or_insert_with(|| self.require_optional(Trigger::IoBlocks));
                return Ok(if available {
                    GlobalForm::IoBlock
                } else {
                    GlobalForm::FlattenedIo
                });
            }
            AddressSpace::Function | AddressSpace::Private => return Ok(GlobalForm::Private),
            AddressSpace::Workgroup => return Ok(GlobalForm::Workgroup),
            AddressSpace::PhysicalStorage => {
                return Err(Error::Unsupported(
                    "global variable in physical storage".into(),
                ));
            }
        };
        if is_struct {
            let layout = self.classify_layout(var.ty, kind)?;
            Ok(GlobalForm::Block { kind, layout })
        } else {
            let layout = self.classify_value_layout(handle, kind)?;
            Ok(GlobalForm::Wrapped { kind, layout })
        }
    }

    /// Requirements that follow from a global's decorations.
    fn scan_global(
        &mut self,
        var: &GlobalVariable,
        form: GlobalForm,
        stage: ShaderStage,
        wants: &mut Dialect,
    ) -> Result<(), Error> {
        let decorations = &var.decorations;
        match form {
            GlobalForm::Builtin(builtin) => {
                if let Some(trigger) = builtin_trigger(builtin, stage) {
                    self.require(trigger)?;
                }
                if let Some(feature) = builtin_subgroup_feature(builtin) {
                    self.require_subgroup(feature);
                }
            }
            GlobalForm::Block { .. } | GlobalForm::Wrapped { .. } => {
                wants.bindings |= decorations.binding.is_some();
            }
            GlobalForm::Io | GlobalForm::IoBlock | GlobalForm::FlattenedIo => {
                if decorations.location.is_some() {
                    if is_attribute(var.space, stage) {
                        wants.attribute_locations = true;
                    } else {
                        wants.varying_locations = true;
                    }
                }
                if decorations.sampling == Some(Sampling::Sample) {
                    self.require(Trigger::SampleInterpolation)?;
                }
                if decorations.index.is_some() {
                    self.require(Trigger::DualSourceBlend)?;
                }
                if decorations.component.is_some() {
                    self.require(Trigger::EnhancedLayouts)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn form(&self, global: Handle<GlobalVariable>) -> Result<GlobalForm, Error> {
        self.plan
            .globals
            .get(&global)
            .copied()
            .ok_or_else(|| Error::Unsupported(format!("{global:?} is not live")))
    }

    /// Assigns names to everything declared at module scope.
    fn reserve_global_names(&mut self) -> Result<(), Error> {
        let module = self.module;

        let block_types: Vec<_> = self.plan.block_types.iter().map(|(&t, &n)| (t, n)).collect();
        for (ty, ns) in block_types {
            let name = module.types.fetch(ty)?.name.as_deref();
            self.reserve_name(Entity::Type(ty), name, ns, true);
            self.reserve_member_names(ty)?;
        }
        let structs = self.plan.structs.clone();
        for ty in structs.into_iter().chain(self.plan.references.clone()) {
            let name = module.types.fetch(ty)?.name.as_deref();
            if self.plan.block_types.contains_key(&ty) && !self.plan.references.contains(&ty) {
                // A block whose value is also loaded whole needs a struct
                // type of its own.
                let base = name.map_or_else(|| format!("_{}", ty.index()), str::to_string);
                let proposed = format!("{base}_value");
                self.reserve_member_name(
                    Entity::Type(ty),
                    u32::MAX,
                    Some(&proposed),
                    Namespace::Global,
                );
            } else {
                self.reserve_name(Entity::Type(ty), name, Namespace::Global, false);
            }
            self.reserve_member_names(ty)?;
        }

        for (h, constant) in module.constants.iter() {
            if constant.is_specialization() {
                self.reserve_name(
                    Entity::Constant(h),
                    constant.name.as_deref(),
                    Namespace::Global,
                    false,
                );
            }
        }

        let globals: Vec<_> = self.plan.globals.iter().map(|(&h, &f)| (h, f)).collect();
        for (h, form) in globals {
            let var = module.global_variables.fetch(h)?;
            let name = var.name.as_deref();
            match form {
                GlobalForm::Builtin(_) | GlobalForm::FragData(_) => {}
                GlobalForm::Block { .. } | GlobalForm::IoBlock => {
                    self.reserve_name(Entity::Global(h), name, Namespace::BlockInstance, true);
                }
                GlobalForm::Wrapped { .. } => {
                    let member = self.reserve_name(Entity::Global(h), name, Namespace::Global, false);
                    let block = format!("{member}_block");
                    self.reserve_member_name(
                        Entity::Global(h),
                        0,
                        Some(&block),
                        Namespace::BufferBlock,
                    );
                }
                GlobalForm::FlattenedIo => {
                    let instance =
                        self.reserve_name(Entity::Global(h), name, Namespace::BlockInstance, true);
                    if let TypeInner::Struct { ref members, .. } = module.types.fetch(var.ty)?.inner
                    {
                        for (i, member) in (0u32..).zip(members) {
                            let suffix = member.name.clone().unwrap_or_else(|| i.to_string());
                            let flat = format!("{instance}_{suffix}");
                            self.reserve_member_name(
                                Entity::Global(h),
                                i,
                                Some(&flat),
                                Namespace::Global,
                            );
                        }
                    }
                }
                _ => {
                    self.reserve_name(Entity::Global(h), name, Namespace::Global, false);
                }
            }
        }

        let analyses = self.analyses;
        for &h in analyses.graph.post_order() {
            let func = module.functions.fetch(h)?;
            self.reserve_name(
                Entity::Function(FunctionKey::Function(h)),
                func.name.as_deref(),
                Namespace::Global,
                false,
            );
        }
        Ok(())
    }

    fn reserve_member_names(&mut self, ty: Handle<Type>) -> Result<(), Error> {
        let module = self.module;
        if let TypeInner::Struct { ref members, .. } = module.types.fetch(ty)?.inner {
            let ns = Namespace::Member(self.id(Entity::Type(ty)));
            for (i, member) in (0u32..).zip(members) {
                self.reserve_member_name(Entity::Type(ty), i, member.name.as_deref(), ns);
            }
        }
        Ok(())
    }

    /// The name already assigned to `entity`.
    pub(crate) fn name_of(&self, entity: Entity) -> Result<String, Error> {
        self.names
            .get(NameKey::Entity(self.id(entity)))
            .map(str::to_string)
            .ok_or_else(|| Error::Unsupported(format!("{entity:?} has no name")))
    }

    pub(crate) fn member_name_of(&self, owner: Entity, index: u32) -> Result<String, Error> {
        let key = NameKey::Member {
            owner: self.id(owner),
            index,
        };
        self.names
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| Error::Unsupported(format!("member {index} of {owner:?} has no name")))
    }

    /// Name of a struct type used as a value.
    pub(crate) fn struct_name(&self, ty: Handle<Type>) -> Result<String, Error> {
        if self.plan.block_types.contains_key(&ty) && !self.plan.references.contains(&ty) {
            self.member_name_of(Entity::Type(ty), u32::MAX)
        } else {
            self.name_of(Entity::Type(ty))
        }
    }

    /// Splits a type into the part before and after the declarator, so
    /// arrays read `float name[4]`.
    pub(crate) fn type_parts(&self, ty: Handle<Type>) -> Result<(String, String), Error> {
        let module = self.module;
        match module.types.fetch(ty)?.inner {
            TypeInner::Array { base, size, .. } => {
                let (base, suffix) = self.type_parts(base)?;
                let extent = self.array_extent_text(size)?;
                Ok((base, format!("[{extent}]{suffix}")))
            }
            TypeInner::Struct { .. } => Ok((self.struct_name(ty)?, String::new())),
            TypeInner::Pointer {
                base,
                space: AddressSpace::PhysicalStorage,
            } => Ok((self.name_of(Entity::Type(base))?, String::new())),
            TypeInner::Pointer { space, .. } => Err(Error::Unsupported(format!(
                "pointer into {space:?} memory used as a value"
            ))),
            ref inner => Ok((simple_type_name(inner)?, String::new())),
        }
    }

    fn array_extent_text(&self, size: ArraySize) -> Result<String, Error> {
        match size {
            ArraySize::Dynamic => Ok(String::new()),
            ArraySize::Literal(n) => Ok(n.to_string()),
            ArraySize::Constant(c) => {
                if self.module.constants.fetch(c)?.is_specialization() {
                    self.name_of(Entity::Constant(c))
                } else {
                    self.module
                        .array_extent(size)
                        .map(|n| n.to_string())
                        .ok_or_else(|| Error::Unsupported("array extent is not a constant".into()))
                }
            }
        }
    }

    /// The full type, usable in constructors and return types.
    pub(crate) fn type_name(&self, ty: Handle<Type>) -> Result<String, Error> {
        let (base, suffix) = self.type_parts(ty)?;
        Ok(base + &suffix)
    }

    pub(crate) fn declaration(&self, ty: Handle<Type>, name: &str) -> Result<String, Error> {
        let (base, suffix) = self.type_parts(ty)?;
        Ok(format!("{base} {name}{suffix}"))
    }

    pub(crate) fn resolution_name(&self, ty: &TypeResolution) -> Result<String, Error> {
        match *ty {
            TypeResolution::Handle(h) => self.type_name(h),
            TypeResolution::Value(ref inner) => simple_type_name(inner),
        }
    }

    pub(crate) fn resolution_declaration(
        &self,
        ty: &TypeResolution,
        name: &str,
    ) -> Result<String, Error> {
        match *ty {
            TypeResolution::Handle(h) => self.declaration(h, name),
            TypeResolution::Value(ref inner) => Ok(format!("{} {name}", simple_type_name(inner)?)),
        }
    }

    /// A constructor expression for the zero value of `ty`.
    pub(crate) fn zero_value(&self, ty: Handle<Type>) -> Result<String, Error> {
        let module = self.module;
        match module.types.fetch(ty)?.inner {
            TypeInner::Scalar(s) | TypeInner::Atomic(s) => zero_literal(s),
            TypeInner::Vector { scalar, .. } | TypeInner::Matrix { scalar, .. } => Ok(format!(
                "{}({})",
                self.type_name(ty)?,
                zero_literal(scalar)?
            )),
            TypeInner::Array { base, size, .. } => {
                let count = module.array_extent(size).ok_or_else(|| {
                    Error::Unsupported("zero value of an array without a fixed size".into())
                })?;
                let element = self.zero_value(base)?;
                let elements = vec![element; count as usize].join(", ");
                Ok(format!("{}({elements})", self.type_name(ty)?))
            }
            TypeInner::Struct { ref members, .. } => {
                let fields = members
                    .iter()
                    .map(|m| self.zero_value(m.ty))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{}({})", self.struct_name(ty)?, fields.join(", ")))
            }
            TypeInner::Pointer { .. } => {
                Err(Error::Unsupported("zero value of a pointer".into()))
            }
        }
    }

    /// Spells a constant at a use site. Only specialization constants are
    /// declared; everything else is inlined.
    pub(crate) fn constant_text(&self, c: Handle<shadex_ir::Constant>) -> Result<String, Error> {
        let constant = self.module.constants.fetch(c)?;
        if constant.is_specialization() {
            return self.name_of(Entity::Constant(c));
        }
        match constant.value {
            ConstantValue::Scalar(lit) => Ok(crate::types::literal(lit)),
            ConstantValue::Zero => self.zero_value(constant.ty),
            ConstantValue::Composite(ref parts) => {
                let parts = parts
                    .iter()
                    .map(|&p| self.constant_text(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{}({})", self.type_name(constant.ty)?, parts.join(", ")))
            }
            ConstantValue::SpecOp { .. } => self.name_of(Entity::Constant(c)),
        }
    }

    fn write_header(&mut self) -> Result<(), Error> {
        let options = self.options;
        self.pass.line(&options.version_directive());
        let extensions: Vec<String> = self.sticky.extensions.iter().cloned().collect();
        for ext in extensions {
            self.pass.line(&format!("#extension {ext} : require"));
        }
        if !options.vulkan_semantics {
            let features: Vec<_> = self.sticky.subgroup_features.iter().copied().collect();
            for feature in features {
                write_subgroup_chain(&mut self.pass.out, feature);
            }
        }
        if options.es {
            let float = if self.stage() == ShaderStage::Fragment && !options.es_default_highp {
                "mediump"
            } else {
                "highp"
            };
            self.pass.line(&format!("precision {float} float;"));
            self.pass.line("precision highp int;");
        }
        self.write_mode_layouts();
        self.pass.blank();
        Ok(())
    }

    fn write_mode_layouts(&mut self) {
        let entry = &self.module.entry_points[self.entry_point];
        let modes = &entry.modes;
        let mut lines = Vec::new();
        match entry.stage {
            ShaderStage::Compute | ShaderStage::Task | ShaderStage::Mesh => {
                if let Some([x, y, z]) = entry.workgroup_size() {
                    lines.push(format!(
                        "layout(local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;"
                    ));
                }
            }
            _ => {}
        }
        match entry.stage {
            ShaderStage::Fragment => {
                for mode in modes {
                    let depth = match mode {
                        ExecutionMode::EarlyFragmentTests => {
                            lines.push("layout(early_fragment_tests) in;".into());
                            continue;
                        }
                        ExecutionMode::PostDepthCoverage => {
                            lines.push("layout(post_depth_coverage) in;".into());
                            continue;
                        }
                        ExecutionMode::DepthGreater => "depth_greater",
                        ExecutionMode::DepthLess => "depth_less",
                        ExecutionMode::DepthUnchanged => "depth_unchanged",
                        _ => continue,
                    };
                    lines.push(format!("layout({depth}) out float gl_FragDepth;"));
                }
                if !self.options.vulkan_semantics && !self.options.es {
                    let mut coord = Vec::new();
                    if modes.contains(&ExecutionMode::OriginUpperLeft) {
                        coord.push("origin_upper_left");
                    }
                    if modes.contains(&ExecutionMode::PixelCenterInteger) {
                        coord.push("pixel_center_integer");
                    }
                    if !coord.is_empty() {
                        lines.push(format!("layout({}) in vec4 gl_FragCoord;", coord.join(", ")));
                    }
                }
            }
            ShaderStage::Geometry => {
                let mut input = Vec::new();
                let mut output = Vec::new();
                for mode in modes {
                    match *mode {
                        ExecutionMode::InputPrimitive(p) => input.push(primitive_name(p).into()),
                        ExecutionMode::Invocations(n) => input.push(format!("invocations = {n}")),
                        ExecutionMode::OutputPrimitive(p) => output.push(primitive_name(p).into()),
                        ExecutionMode::OutputVertices(n) => {
                            output.push(format!("max_vertices = {n}"));
                        }
                        _ => {}
                    }
                }
                if !input.is_empty() {
                    lines.push(format!("layout({}) in;", input.join(", ")));
                }
                if !output.is_empty() {
                    lines.push(format!("layout({}) out;", output.join(", ")));
                }
            }
            ShaderStage::TessellationControl => {
                for mode in modes {
                    if let ExecutionMode::OutputVertices(n) = *mode {
                        lines.push(format!("layout(vertices = {n}) out;"));
                    }
                }
            }
            ShaderStage::TessellationEvaluation => {
                let mut input: Vec<String> = Vec::new();
                for mode in modes {
                    match *mode {
                        ExecutionMode::InputPrimitive(p) => input.push(primitive_name(p).into()),
                        ExecutionMode::Spacing(spacing) => input.push(
                            match spacing {
                                TessSpacing::Equal => "equal_spacing",
                                TessSpacing::FractionalEven => "fractional_even_spacing",
                                TessSpacing::FractionalOdd => "fractional_odd_spacing",
                            }
                            .into(),
                        ),
                        ExecutionMode::VertexOrderCw => input.push("cw".into()),
                        ExecutionMode::VertexOrderCcw => input.push("ccw".into()),
                        ExecutionMode::PointMode => input.push("point_mode".into()),
                        _ => {}
                    }
                }
                if !input.is_empty() {
                    lines.push(format!("layout({}) in;", input.join(", ")));
                }
            }
            ShaderStage::Mesh => {
                let mut output = Vec::new();
                for mode in modes {
                    match *mode {
                        ExecutionMode::OutputVertices(n) => {
                            output.push(format!("max_vertices = {n}"));
                        }
                        ExecutionMode::OutputPrimitives(n) => {
                            output.push(format!("max_primitives = {n}"));
                        }
                        ExecutionMode::OutputPrimitive(p) => {
                            lines.push(format!("layout({}) out;", primitive_name(p)));
                        }
                        _ => {}
                    }
                }
                if !output.is_empty() {
                    lines.push(format!("layout({}) out;", output.join(", ")));
                }
            }
            _ => {}
        }
        for line in lines {
            self.pass.line(&line);
        }
    }

    fn write_spec_constants(&mut self) -> Result<(), Error> {
        let module = self.module;
        let vulkan = self.options.vulkan_semantics;
        let mut any = false;
        for (h, constant) in module.constants.iter() {
            if !constant.is_specialization() {
                continue;
            }
            any = true;
            let name = self.name_of(Entity::Constant(h))?;
            let decl = self.declaration(constant.ty, &name)?;
            let default = match constant.value {
                ConstantValue::Scalar(lit) => crate::types::literal(lit),
                ConstantValue::Zero => self.zero_value(constant.ty)?,
                ConstantValue::SpecOp { op, left, right } => {
                    let left = self.constant_text(left)?;
                    let right = self.constant_text(right)?;
                    self.pass
                        .line(&format!("const {decl} = ({left} {} {right});", op.symbol()));
                    continue;
                }
                ConstantValue::Composite(_) => {
                    return Err(Error::Unsupported(format!(
                        "composite specialization constant `{name}`"
                    )));
                }
            };
            let Some(id) = constant.spec_id else {
                self.pass.line(&format!("const {decl} = {default};"));
                continue;
            };
            if vulkan {
                self.pass
                    .line(&format!("layout(constant_id = {id}) const {decl} = {default};"));
            } else {
                let macro_name = format!("SPIRV_CROSS_CONSTANT_ID_{id}");
                self.pass.line(&format!("#ifndef {macro_name}"));
                self.pass.line(&format!("#define {macro_name} {default}"));
                self.pass.line("#endif");
                self.pass.line(&format!("const {decl} = {macro_name};"));
            }
        }
        if any {
            self.pass.blank();
        }
        Ok(())
    }

    fn write_struct_members(
        &mut self,
        ty: Handle<Type>,
        layout: Option<BlockLayout>,
    ) -> Result<(), Error> {
        let module = self.module;
        let TypeInner::Struct { ref members, .. } = module.types.fetch(ty)?.inner else {
            return Ok(());
        };
        for (i, member) in (0u32..).zip(members) {
            let name = self.member_name_of(Entity::Type(ty), i)?;
            let decl = self.declaration(member.ty, &name)?;
            let mut qualifiers = Vec::new();
            if let Some(layout) = layout {
                let inner = &module.types.fetch(module.innermost_element(member.ty))?.inner;
                if member.layout.major == MatrixMajor::Row
                    && matches!(inner, TypeInner::Matrix { .. })
                {
                    qualifiers.push("row_major".to_string());
                }
                if layout.explicit_offsets
                    && let Some(offset) = member.layout.offset
                {
                    qualifiers.push(format!("offset = {offset}"));
                }
            }
            if qualifiers.is_empty() {
                self.pass.line(&format!("{decl};"));
            } else {
                self.pass
                    .line(&format!("layout({}) {decl};", qualifiers.join(", ")));
            }
        }
        Ok(())
    }

    fn write_structs(&mut self) -> Result<(), Error> {
        let structs = self.plan.structs.clone();
        for ty in structs {
            let name = self.struct_name(ty)?;
            self.pass.line(&format!("struct {name}"));
            self.pass.open();
            self.write_struct_members(ty, None)?;
            self.pass.close(";");
            self.pass.blank();
        }
        Ok(())
    }

    fn write_references(&mut self) -> Result<(), Error> {
        let references = self.plan.references.clone();
        if references.is_empty() {
            return Ok(());
        }
        for &ty in &references {
            let name = self.name_of(Entity::Type(ty))?;
            self.pass.line(&format!("layout(buffer_reference) buffer {name};"));
        }
        self.pass.blank();
        for ty in references {
            let name = self.name_of(Entity::Type(ty))?;
            let layout = self.classify_layout(ty, BufferKind::Storage)?;
            self.pass.line(&format!(
                "layout(buffer_reference, {}) buffer {name}",
                layout.standard.qualifier()
            ));
            self.pass.open();
            self.write_struct_members(ty, Some(layout))?;
            self.pass.close(";");
            self.pass.blank();
        }
        Ok(())
    }

    fn write_globals(&mut self) -> Result<(), Error> {
        let module = self.module;
        let globals: Vec<_> = self.plan.globals.iter().map(|(&h, &f)| (h, f)).collect();
        let mut any = false;
        for (h, form) in globals {
            let var = module.global_variables.fetch(h)?;
            let before = self.pass.out.len();
            match form {
                GlobalForm::Builtin(builtin) => self.write_builtin(var, builtin)?,
                GlobalForm::Block { kind, layout } => {
                    let name = self.name_of(Entity::Type(var.ty))?;
                    let instance = self.name_of(Entity::Global(h))?;
                    self.write_buffer_header(var, kind, layout.standard.qualifier(), &name);
                    self.pass.open();
                    self.write_struct_members(var.ty, Some(layout))?;
                    self.pass.close(&format!(" {instance};"));
                }
                GlobalForm::Wrapped { kind, layout } => {
                    let block = self.member_name_of(Entity::Global(h), 0)?;
                    let member = self.name_of(Entity::Global(h))?;
                    self.write_buffer_header(var, kind, layout.standard.qualifier(), &block);
                    self.pass.open();
                    let decl = self.declaration(var.ty, &member)?;
                    self.pass.line(&format!("{decl};"));
                    self.pass.close(";");
                }
                GlobalForm::PlainUniform => {
                    let decl = self.declaration(var.ty, &self.name_of(Entity::Global(h))?)?;
                    self.pass.line(&format!("uniform {decl};"));
                }
                GlobalForm::IoBlock => {
                    let name = self.name_of(Entity::Type(var.ty))?;
                    let instance = self.name_of(Entity::Global(h))?;
                    let prefix = self.io_prefix(var, var.decorations.location, false)?;
                    let storage = if var.space == AddressSpace::Input { "in" } else { "out" };
                    self.pass.line(&format!("{prefix}{storage} {name}"));
                    self.pass.open();
                    self.write_struct_members(var.ty, None)?;
                    self.pass.close(&format!(" {instance};"));
                }
                GlobalForm::FlattenedIo => self.write_flattened(h, var)?,
                GlobalForm::Io => {
                    let name = self.name_of(Entity::Global(h))?;
                    let decl = self.declaration(var.ty, &name)?;
                    let prefix = self.io_prefix(var, var.decorations.location, true)?;
                    let storage = self.io_storage(var.space);
                    self.pass.line(&format!("{prefix}{storage} {decl};"));
                }
                GlobalForm::FragData(_) => {}
                GlobalForm::Private => {
                    let name = self.name_of(Entity::Global(h))?;
                    let decl = self.declaration(var.ty, &name)?;
                    let init = match var.init {
                        Some(c) => Some(self.constant_text(c)?),
                        None if self.options.force_zero_initialized_variables => {
                            Some(self.zero_value(var.ty)?)
                        }
                        None => None,
                    };
                    match init {
                        Some(init) => self.pass.line(&format!("{decl} = {init};")),
                        None => self.pass.line(&format!("{decl};")),
                    }
                }
                GlobalForm::Workgroup => {
                    let name = self.name_of(Entity::Global(h))?;
                    let decl = self.declaration(var.ty, &name)?;
                    self.pass.line(&format!("shared {decl};"));
                }
            }
            if self.pass.out.len() != before {
                any = true;
                if matches!(
                    form,
                    GlobalForm::Block { .. } | GlobalForm::Wrapped { .. } | GlobalForm::IoBlock
                ) {
                    self.pass.blank();
                }
            }
        }
        if any && !self.pass.out.ends_with("\n\n") {
            self.pass.blank();
        }
        Ok(())
    }

    fn write_builtin(&mut self, var: &GlobalVariable, builtin: BuiltIn) -> Result<(), Error> {
        if var.space != AddressSpace::Output {
            return Ok(());
        }
        let name = builtin_name(builtin, var.space, self.options);
        if builtin == BuiltIn::ClipDistance
            && let TypeInner::Array {
                size: ArraySize::Literal(n),
                ..
            } = self.module.types.fetch(var.ty)?.inner
        {
            self.pass.line(&format!("out float {name}[{n}];"));
        }
        if var.decorations.invariant {
            self.pass.line(&format!("invariant {name};"));
        }
        Ok(())
    }

    fn write_buffer_header(
        &mut self,
        var: &GlobalVariable,
        kind: BufferKind,
        standard: &str,
        block: &str,
    ) {
        let vulkan = self.options.vulkan_semantics;
        let mut layout = Vec::new();
        if kind == BufferKind::PushConstant {
            layout.push("push_constant".to_string());
        } else if vulkan || self.pass.dialect.bindings {
            if vulkan && let Some(set) = var.decorations.descriptor_set {
                layout.push(format!("set = {set}"));
            }
            if let Some(binding) = var.decorations.binding {
                layout.push(format!("binding = {binding}"));
            }
        }
        layout.push(standard.to_string());

        let mut qualifiers = String::new();
        if let AddressSpace::Storage { access } = var.space {
            let d = &var.decorations;
            if !access.contains(StorageAccess::STORE) || d.non_writable {
                qualifiers.push_str("readonly ");
            }
            if !access.contains(StorageAccess::LOAD) || d.non_readable {
                qualifiers.push_str("writeonly ");
            }
            if d.coherent {
                qualifiers.push_str("coherent ");
            }
            if d.volatile {
                qualifiers.push_str("volatile ");
            }
            if d.restrict {
                qualifiers.push_str("restrict ");
            }
        }
        let storage = if kind == BufferKind::Storage { "buffer" } else { "uniform" };
        self.pass.line(&format!(
            "layout({}) {qualifiers}{storage} {block}",
            layout.join(", ")
        ));
    }

    fn io_storage(&self, space: AddressSpace) -> &'static str {
        let input = space == AddressSpace::Input;
        if !self.options.is_legacy() {
            return if input { "in" } else { "out" };
        }
        match (input, self.stage()) {
            (true, ShaderStage::Vertex) => "attribute",
            _ => "varying",
        }
    }

    /// Layout, invariance and interpolation qualifiers of an interface
    /// variable, each followed by a space.
    fn io_prefix(
        &self,
        var: &GlobalVariable,
        location: Option<u32>,
        allow_component: bool,
    ) -> Result<String, Error> {
        let stage = self.stage();
        let attribute = is_attribute(var.space, stage);
        let dialect = self.pass.dialect;
        let locations = if attribute {
            dialect.attribute_locations
        } else {
            dialect.varying_locations
        };
        let d = &var.decorations;
        let mut prefix = String::new();
        if locations && let Some(location) = location {
            let mut layout = vec![format!("location = {location}")];
            if allow_component && let Some(component) = d.component {
                layout.push(format!("component = {component}"));
            }
            if let Some(index) = d.index {
                layout.push(format!("index = {index}"));
            }
            prefix.push_str(&format!("layout({}) ", layout.join(", ")));
        }
        if self.options.is_legacy() {
            return Ok(prefix);
        }
        if d.invariant && var.space == AddressSpace::Output {
            prefix.push_str("invariant ");
        }
        if !attribute {
            match d.interpolation {
                Some(Interpolation::Flat) => prefix.push_str("flat "),
                Some(Interpolation::Linear) if self.options.es => {
                    return Err(Error::Unsupported(
                        "noperspective interpolation on OpenGL ES".into(),
                    ));
                }
                Some(Interpolation::Linear) => prefix.push_str("noperspective "),
                Some(Interpolation::Perspective) | None => {}
            }
            match d.sampling {
                Some(Sampling::Centroid) => prefix.push_str("centroid "),
                Some(Sampling::Sample) => prefix.push_str("sample "),
                Some(Sampling::Center) | None => {}
            }
        }
        Ok(prefix)
    }

    fn write_flattened(
        &mut self,
        h: Handle<GlobalVariable>,
        var: &GlobalVariable,
    ) -> Result<(), Error> {
        let module = self.module;
        let TypeInner::Struct { ref members, .. } = module.types.fetch(var.ty)?.inner else {
            return Ok(());
        };
        let storage = self.io_storage(var.space);
        let mut location = var.decorations.location;
        for (i, member) in (0u32..).zip(members) {
            let name = self.member_name_of(Entity::Global(h), i)?;
            let decl = self.declaration(member.ty, &name)?;
            let prefix = self.io_prefix(var, location, false)?;
            self.pass.line(&format!("{prefix}{storage} {decl};"));
            let slots = location_slots(&module.types.fetch(member.ty)?.inner);
            location = location.map(|l| l + slots);
        }
        Ok(())
    }

    fn argument_declaration(&self, ty: Handle<Type>, name: &str) -> Result<String, Error> {
        match self.module.types.fetch(ty)?.inner {
            TypeInner::Pointer {
                base,
                space: AddressSpace::Function | AddressSpace::Private,
            } => Ok(format!("inout {}", self.declaration(base, name)?)),
            TypeInner::Pointer {
                space: AddressSpace::PhysicalStorage,
                ..
            } => self.declaration(ty, name),
            TypeInner::Pointer { space, .. } => Err(Error::Unsupported(format!(
                "pointer argument into {space:?} memory"
            ))),
            _ => self.declaration(ty, name),
        }
    }

    fn write_function(&mut self, key: FunctionKey) -> Result<(), Error> {
        let module = self.module;
        let func = module.function(key)?;
        let ns = Namespace::Local(self.id(Entity::Function(key)));
        self.current = Some(key);
        self.pass.exprs = vec![ExprState::Pending; func.expressions.len()];
        self.pass.loop_depth = 0;
        self.pass.loop_count = 0;

        let name = match key {
            FunctionKey::EntryPoint(_) => "main".to_string(),
            FunctionKey::Function(_) => self.name_of(Entity::Function(key))?,
        };
        let result = match &func.result {
            Some(result) => self.type_name(result.ty)?,
            None => "void".to_string(),
        };
        let mut arguments = Vec::with_capacity(func.arguments.len());
        for (i, arg) in (0u32..).zip(&func.arguments) {
            let arg_name = self.reserve_name(Entity::Argument(key, i), arg.name.as_deref(), ns, false);
            arguments.push(self.argument_declaration(arg.ty, &arg_name)?);
        }
        self.pass
            .line(&format!("{result} {name}({})", arguments.join(", ")));
        self.pass.open();

        for (h, local) in func.local_variables.iter() {
            let local_name =
                self.reserve_name(Entity::Local(key, h), local.name.as_deref(), ns, false);
            let decl = self.declaration(local.ty, &local_name)?;
            let init = match local.init {
                Some(init) => Some(self.expr(init)?),
                None if self.options.force_zero_initialized_variables => {
                    Some(self.zero_value(local.ty)?)
                }
                None => None,
            };
            match init {
                Some(init) => self.pass.line(&format!("{decl} = {init};")),
                None => self.pass.line(&format!("{decl};")),
            }
        }

        self.write_block(&func.body)?;
        self.pass.close("");
        self.pass.blank();
        self.current = None;
        Ok(())
    }
}
