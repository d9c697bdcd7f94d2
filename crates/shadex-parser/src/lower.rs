//! Lowering pass: `naga::Module` → `shadex_ir::Module`.

use std::collections::HashMap;

use shadex_ir::{
    AddressSpace, Arena, Block, Capability, CollectiveOp, Constant, ConstantValue, Decorations,
    EntryPoint, ExecutionMode, Expression, Function, GlobalVariable, Handle, MemberLayout, Range,
    Scalar, ShaderStage, Statement, SubgroupOperation, Type, TypeInner, VectorSize,
};

use crate::ParseError;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Module-level lowering context: handle mappings between the naga and
/// shadex arenas.
struct LowerCtx<'a> {
    naga: &'a naga::Module,
    module: shadex_ir::Module,
    type_map: HashMap<naga::Handle<naga::Type>, Handle<Type>>,
    global_var_map: HashMap<naga::Handle<naga::GlobalVariable>, Handle<GlobalVariable>>,
    /// Every global (constant) expression becomes one shadex constant.
    const_expr_map: HashMap<naga::Handle<naga::Expression>, Handle<Constant>>,
    override_map: HashMap<naga::Handle<naga::Override>, Handle<Constant>>,
    func_map: HashMap<naga::Handle<naga::Function>, Handle<Function>>,
    /// Specialization id handed to the next override declared without `@id`.
    next_spec_id: u32,
}

/// Per-function lowering context for expressions and locals.
struct FuncCtx {
    function: Function,
    expr_map: HashMap<naga::Handle<naga::Expression>, Handle<Expression>>,
    local_var_map: HashMap<naga::Handle<naga::LocalVariable>, Handle<shadex_ir::LocalVariable>>,
    /// `workgroupUniformLoad` results and the pointer each one reads.
    uniform_loads: HashMap<naga::Handle<naga::Expression>, naga::Handle<naga::Expression>>,
    /// Interface globals standing in for an entry point's parameters.
    io: Option<EntryIo>,
}

/// One entry point parameter or result, as stage interface globals.
#[derive(Clone, Debug)]
enum Interface {
    Single(Handle<GlobalVariable>),
    /// A struct whose members each carry their own binding.
    Struct {
        ty: Handle<Type>,
        members: Vec<Handle<GlobalVariable>>,
    },
}

#[derive(Clone, Debug, Default)]
struct EntryIo {
    arguments: Vec<Interface>,
    result: Option<Interface>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn lower_module(naga: &naga::Module) -> Result<shadex_ir::Module, ParseError> {
    let next_spec_id = naga
        .overrides
        .iter()
        .filter_map(|(_, o)| o.id)
        .max()
        .map_or(0, |id| u32::from(id) + 1);
    let mut ctx = LowerCtx {
        naga,
        module: shadex_ir::Module::default(),
        type_map: HashMap::new(),
        global_var_map: HashMap::new(),
        const_expr_map: HashMap::new(),
        override_map: HashMap::new(),
        func_map: HashMap::new(),
        next_spec_id,
    };

    ctx.lower_types()?;
    ctx.lower_global_expressions()?;
    ctx.lower_constants()?;
    ctx.lower_global_variables()?;
    ctx.lower_functions()?;
    ctx.lower_entry_points()?;
    ctx.collect_capabilities();

    log::debug!(
        "lowered {} type(s), {} constant(s), {} global(s), {} function(s), {} entry point(s)",
        ctx.module.types.len(),
        ctx.module.constants.len(),
        ctx.module.global_variables.len(),
        ctx.module.functions.len(),
        ctx.module.entry_points.len()
    );
    Ok(ctx.module)
}

// ---------------------------------------------------------------------------
// Type lowering
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    fn lower_types(&mut self) -> Result<(), ParseError> {
        let naga = self.naga;
        for (naga_handle, ty) in naga.types.iter() {
            let inner = self.lower_type_inner(&ty.inner)?;
            let handle = self.module.types.append(Type {
                name: ty.name.clone(),
                inner,
            });
            self.type_map.insert(naga_handle, handle);
        }
        Ok(())
    }

    fn lower_type_inner(&mut self, inner: &naga::TypeInner) -> Result<TypeInner, ParseError> {
        match *inner {
            naga::TypeInner::Scalar(s) => Ok(TypeInner::Scalar(lower_scalar(s))),
            naga::TypeInner::Vector { size, scalar } => Ok(TypeInner::Vector {
                size: lower_vector_size(size),
                scalar: lower_scalar(scalar),
            }),
            naga::TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } => Ok(TypeInner::Matrix {
                columns: lower_vector_size(columns),
                rows: lower_vector_size(rows),
                scalar: lower_scalar(scalar),
            }),
            naga::TypeInner::Atomic(s) => Ok(TypeInner::Atomic(lower_scalar(s))),
            naga::TypeInner::Pointer { base, space } => Ok(TypeInner::Pointer {
                base: self.map_type(base)?,
                space: lower_address_space(space)?,
            }),
            naga::TypeInner::ValuePointer {
                size,
                scalar,
                space,
            } => {
                // A pointer to a scalar or vector; the pointee type may not
                // exist in the arena yet.
                let base = match size {
                    Some(size) => TypeInner::Vector {
                        size: lower_vector_size(size),
                        scalar: lower_scalar(scalar),
                    },
                    None => TypeInner::Scalar(lower_scalar(scalar)),
                };
                Ok(TypeInner::Pointer {
                    base: self.find_or_append_type(base),
                    space: lower_address_space(space)?,
                })
            }
            naga::TypeInner::Array { base, size, stride } => Ok(TypeInner::Array {
                base: self.map_type(base)?,
                size: lower_array_size(size)?,
                stride,
            }),
            naga::TypeInner::Struct { ref members, .. } => {
                let members = members
                    .iter()
                    .map(|m| {
                        Ok(shadex_ir::StructMember {
                            name: m.name.clone(),
                            ty: self.map_type(m.ty)?,
                            layout: MemberLayout {
                                offset: Some(m.offset),
                                matrix_stride: self.matrix_stride(m.ty),
                                ..MemberLayout::default()
                            },
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;
                // Buffer blocks are marked once the globals are known.
                Ok(TypeInner::Struct {
                    members,
                    is_block: false,
                })
            }
            _ => Err(unsupported(&format!("{inner:?} type"))),
        }
    }

    /// Column stride of a matrix member (or array of matrices) under the
    /// WGSL memory layout rules.
    fn matrix_stride(&self, ty: naga::Handle<naga::Type>) -> Option<u32> {
        match self.naga.types[ty].inner {
            naga::TypeInner::Matrix { rows, scalar, .. } => {
                let components = match rows {
                    naga::VectorSize::Bi => 2,
                    naga::VectorSize::Tri | naga::VectorSize::Quad => 4,
                };
                Some(components * u32::from(scalar.width))
            }
            naga::TypeInner::Array { base, .. } => self.matrix_stride(base),
            _ => None,
        }
    }

    fn map_type(&self, h: naga::Handle<naga::Type>) -> Result<Handle<Type>, ParseError> {
        self.type_map
            .get(&h)
            .copied()
            .ok_or_else(|| ParseError::Lowering(format!("unmapped type {h:?}")))
    }

    /// Returns an anonymous type with the given shape, appending it if the
    /// arena has none.
    fn find_or_append_type(&mut self, inner: TypeInner) -> Handle<Type> {
        let existing = self
            .module
            .types
            .iter()
            .find(|(_, ty)| ty.name.is_none() && ty.inner == inner)
            .map(|(h, _)| h);
        match existing {
            Some(handle) => handle,
            None => self.module.types.append(Type { name: None, inner }),
        }
    }
}

// ---------------------------------------------------------------------------
// Constants and overrides
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    fn lower_global_expressions(&mut self) -> Result<(), ParseError> {
        let naga = self.naga;
        for (naga_handle, expr) in naga.global_expressions.iter() {
            let handle = self.lower_const_expr(expr)?;
            self.const_expr_map.insert(naga_handle, handle);
        }
        // Overrides that only functions refer to.
        for (naga_handle, _) in naga.overrides.iter() {
            self.override_constant(naga_handle)?;
        }
        Ok(())
    }

    fn lower_const_expr(&mut self, expr: &naga::Expression) -> Result<Handle<Constant>, ParseError> {
        let (ty, value) = match *expr {
            naga::Expression::Literal(lit) => {
                let lit = lower_literal(lit)?;
                let ty = self.find_or_append_type(TypeInner::Scalar(lit.scalar()));
                (ty, ConstantValue::Scalar(lit))
            }
            naga::Expression::ZeroValue(ty) => (self.map_type(ty)?, ConstantValue::Zero),
            // Named constants share the constant of their initializer.
            naga::Expression::Constant(h) => return self.map_constant(h),
            naga::Expression::Override(h) => return self.override_constant(h),
            naga::Expression::Compose { ty, ref components } => {
                let components = components
                    .iter()
                    .map(|c| self.map_const_expr(*c))
                    .collect::<Result<Vec<_>, _>>()?;
                (self.map_type(ty)?, ConstantValue::Composite(components))
            }
            naga::Expression::Splat { size, value } => {
                let component = self.map_const_expr(value)?;
                let scalar = self.constant_scalar(component)?;
                let ty = self.find_or_append_type(TypeInner::Vector {
                    size: lower_vector_size(size),
                    scalar,
                });
                (
                    ty,
                    ConstantValue::Composite(vec![component; size as usize]),
                )
            }
            // Anything the constant evaluator left behind depends on an
            // override.
            naga::Expression::Binary { op, left, right } => {
                let left = self.map_const_expr(left)?;
                let right = self.map_const_expr(right)?;
                let op = lower_binary_op(op);
                let ty = if op.is_comparison() {
                    self.find_or_append_type(TypeInner::Scalar(Scalar::BOOL))
                } else {
                    self.module.constants.fetch(left).map_err(lowering)?.ty
                };
                (ty, ConstantValue::SpecOp { op, left, right })
            }
            _ => {
                return Err(ParseError::Lowering(format!(
                    "unsupported global expression: {expr:?}"
                )));
            }
        };
        Ok(self.module.constants.append(Constant {
            name: None,
            ty,
            value,
            spec_id: None,
        }))
    }

    /// Names the constants that `const` declarations initialize.
    fn lower_constants(&mut self) -> Result<(), ParseError> {
        let naga = self.naga;
        for (_, constant) in naga.constants.iter() {
            let Some(name) = &constant.name else {
                continue;
            };
            let handle = self.map_const_expr(constant.init)?;
            let ty = self.map_type(constant.ty)?;
            let target = &mut self.module.constants[handle];
            if target.name.is_none() && target.spec_id.is_none() {
                target.name = Some(name.clone());
                target.ty = ty;
            } else {
                // Two declarations with one initializer; the second gets
                // its own copy.
                let copy = Constant {
                    name: Some(name.clone()),
                    ty,
                    value: target.value.clone(),
                    spec_id: None,
                };
                self.module.constants.append(copy);
            }
        }
        Ok(())
    }

    fn override_constant(
        &mut self,
        h: naga::Handle<naga::Override>,
    ) -> Result<Handle<Constant>, ParseError> {
        if let Some(&handle) = self.override_map.get(&h) {
            return Ok(handle);
        }
        let naga = self.naga;
        let decl = &naga.overrides[h];
        let value = match decl.init {
            Some(init) => {
                let default = self.map_const_expr(init)?;
                self.module
                    .constants
                    .fetch(default)
                    .map_err(lowering)?
                    .value
                    .clone()
            }
            None => ConstantValue::Zero,
        };
        let spec_id = match decl.id {
            Some(id) => u32::from(id),
            None => {
                let id = self.next_spec_id;
                self.next_spec_id += 1;
                id
            }
        };
        let handle = self.module.constants.append(Constant {
            name: decl.name.clone(),
            ty: self.map_type(decl.ty)?,
            value,
            spec_id: Some(spec_id),
        });
        log::trace!("override {:?} is specialization constant {spec_id}", decl.name);
        self.override_map.insert(h, handle);
        Ok(handle)
    }

    fn constant_scalar(&self, handle: Handle<Constant>) -> Result<Scalar, ParseError> {
        let ty = self.module.constants.fetch(handle).map_err(lowering)?.ty;
        self.module
            .types
            .fetch(ty)
            .map_err(lowering)?
            .inner
            .scalar()
            .ok_or_else(|| ParseError::Lowering(format!("splat of non-scalar constant {ty:?}")))
    }

    fn map_const_expr(
        &self,
        h: naga::Handle<naga::Expression>,
    ) -> Result<Handle<Constant>, ParseError> {
        self.const_expr_map
            .get(&h)
            .copied()
            .ok_or_else(|| ParseError::Lowering(format!("unmapped const expression {h:?}")))
    }

    fn map_constant(&self, h: naga::Handle<naga::Constant>) -> Result<Handle<Constant>, ParseError> {
        self.map_const_expr(self.naga.constants[h].init)
    }
}

// ---------------------------------------------------------------------------
// Global variables
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    fn lower_global_variables(&mut self) -> Result<(), ParseError> {
        let naga = self.naga;
        for (naga_handle, var) in naga.global_variables.iter() {
            let space = lower_address_space(var.space)?;
            let ty = self.map_type(var.ty)?;
            let mut decorations = Decorations::default();
            if let Some(binding) = &var.binding {
                decorations.descriptor_set = Some(binding.group);
                decorations.binding = Some(binding.binding);
            }
            let init = match var.init {
                Some(h) => Some(self.map_const_expr(h)?),
                None => None,
            };

            if space.is_buffer()
                && let TypeInner::Struct { is_block, .. } = &mut self.module.types[ty].inner
            {
                *is_block = true;
            }

            let handle = self.module.global_variables.append(GlobalVariable {
                name: var.name.clone(),
                space,
                ty,
                init,
                decorations,
            });
            self.global_var_map.insert(naga_handle, handle);
        }
        Ok(())
    }

    fn map_global(
        &self,
        h: naga::Handle<naga::GlobalVariable>,
    ) -> Result<Handle<GlobalVariable>, ParseError> {
        self.global_var_map
            .get(&h)
            .copied()
            .ok_or_else(|| ParseError::Lowering(format!("unmapped global var {h:?}")))
    }

    /// Declares the interface global for one bound entry point parameter
    /// or result.
    fn interface_global(
        &mut self,
        name: Option<String>,
        ty: naga::Handle<naga::Type>,
        binding: &naga::Binding,
        space: AddressSpace,
        stage: ShaderStage,
    ) -> Result<Handle<GlobalVariable>, ParseError> {
        let mut decorations = Decorations::default();
        match *binding {
            naga::Binding::BuiltIn(builtin) => {
                decorations.built_in = Some(lower_builtin(builtin, stage, space)?);
                if let naga::BuiltIn::Position { invariant } = builtin {
                    decorations.invariant = invariant;
                }
            }
            naga::Binding::Location {
                location,
                interpolation,
                sampling,
                ..
            } => {
                decorations.location = Some(location);
                // Vertex inputs and fragment outputs are not interpolated.
                let attribute = match space {
                    AddressSpace::Input => stage == ShaderStage::Vertex,
                    _ => stage == ShaderStage::Fragment,
                };
                if !attribute {
                    decorations.interpolation = interpolation.and_then(lower_interpolation);
                    decorations.sampling = sampling.and_then(lower_sampling);
                }
            }
        }
        let ty = self.map_type(ty)?;
        Ok(self.module.global_variables.append(GlobalVariable {
            name,
            space,
            ty,
            init: None,
            decorations,
        }))
    }

    /// Turns a bound parameter (or a struct of bound members) into
    /// interface globals.
    fn interface(
        &mut self,
        name: Option<String>,
        ty: naga::Handle<naga::Type>,
        binding: Option<&naga::Binding>,
        space: AddressSpace,
        stage: ShaderStage,
    ) -> Result<Interface, ParseError> {
        if let Some(binding) = binding {
            return self
                .interface_global(name, ty, binding, space, stage)
                .map(Interface::Single);
        }
        let naga = self.naga;
        let naga::TypeInner::Struct { ref members, .. } = naga.types[ty].inner else {
            return Err(ParseError::Lowering(format!(
                "entry point parameter {name:?} has no binding"
            )));
        };
        let mut globals = Vec::with_capacity(members.len());
        for member in members {
            let binding = member.binding.as_ref().ok_or_else(|| {
                ParseError::Lowering(format!("struct member {:?} has no binding", member.name))
            })?;
            globals.push(self.interface_global(
                member.name.clone(),
                member.ty,
                binding,
                space,
                stage,
            )?);
        }
        Ok(Interface::Struct {
            ty: self.map_type(ty)?,
            members: globals,
        })
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    fn lower_functions(&mut self) -> Result<(), ParseError> {
        let naga = self.naga;
        for (naga_handle, naga_func) in naga.functions.iter() {
            let function = self.lower_function(naga_func, None)?;
            let handle = self.module.functions.append(function);
            self.func_map.insert(naga_handle, handle);
        }
        Ok(())
    }

    fn lower_entry_points(&mut self) -> Result<(), ParseError> {
        let naga = self.naga;
        for ep in &naga.entry_points {
            let stage = match ep.stage {
                naga::ShaderStage::Vertex => ShaderStage::Vertex,
                naga::ShaderStage::Fragment => ShaderStage::Fragment,
                naga::ShaderStage::Compute => ShaderStage::Compute,
                #[allow(unreachable_patterns)]
                other => return Err(unsupported(&format!("{other:?} entry point"))),
            };

            let mut io = EntryIo::default();
            for arg in &ep.function.arguments {
                io.arguments.push(self.interface(
                    arg.name.clone(),
                    arg.ty,
                    arg.binding.as_ref(),
                    AddressSpace::Input,
                    stage,
                )?);
            }
            if let Some(result) = &ep.function.result {
                let name = match result.binding {
                    Some(naga::Binding::Location { .. }) => Some(format!("{}_output", ep.name)),
                    _ => None,
                };
                io.result = Some(self.interface(
                    name,
                    result.ty,
                    result.binding.as_ref(),
                    AddressSpace::Output,
                    stage,
                )?);
            }

            let mut function = self.lower_function(&ep.function, Some(io))?;
            function.name = Some(ep.name.clone());
            let modes = match stage {
                ShaderStage::Compute => vec![ExecutionMode::LocalSize(ep.workgroup_size)],
                _ => Vec::new(),
            };
            self.module.entry_points.push(EntryPoint {
                name: ep.name.clone(),
                stage,
                modes,
                function,
            });
        }
        Ok(())
    }

    fn lower_function(
        &mut self,
        naga_func: &naga::Function,
        io: Option<EntryIo>,
    ) -> Result<Function, ParseError> {
        let mut uniform_loads = HashMap::new();
        collect_uniform_loads(&naga_func.body, &mut uniform_loads);
        let mut fctx = FuncCtx {
            function: Function {
                name: naga_func.name.clone(),
                arguments: Vec::new(),
                result: None,
                local_variables: Arena::new(),
                expressions: Arena::new(),
                named_expressions: HashMap::new(),
                body: Vec::new(),
            },
            expr_map: HashMap::new(),
            local_var_map: HashMap::new(),
            uniform_loads,
            io,
        };

        // Entry points read their parameters from interface globals.
        if fctx.io.is_none() {
            for arg in &naga_func.arguments {
                fctx.function.arguments.push(shadex_ir::FunctionArgument {
                    name: arg.name.clone(),
                    ty: self.map_type(arg.ty)?,
                });
            }
            if let Some(ref res) = naga_func.result {
                fctx.function.result = Some(shadex_ir::FunctionResult {
                    ty: self.map_type(res.ty)?,
                });
            }
        }

        // Locals first, with inits filled in once expressions exist.
        let mut local_inits = Vec::new();
        for (naga_handle, var) in naga_func.local_variables.iter() {
            let ty = self.map_type(var.ty)?;
            if let Some(init) = var.init {
                local_inits.push((naga_handle, init));
            }
            let handle = fctx
                .function
                .local_variables
                .append(shadex_ir::LocalVariable {
                    name: var.name.clone(),
                    ty,
                    init: None,
                });
            fctx.local_var_map.insert(naga_handle, handle);
        }

        for (naga_handle, expr) in naga_func.expressions.iter() {
            let handle = self.lower_expression(naga_handle, expr, &mut fctx)?;
            fctx.expr_map.insert(naga_handle, handle);
        }

        for (naga_handle, init) in local_inits {
            let init = fctx.map_expr(init)?;
            let handle = fctx.map_local(naga_handle)?;
            fctx.function.local_variables[handle].init = Some(init);
        }

        for (naga_handle, name) in &naga_func.named_expressions {
            if let Some(&handle) = fctx.expr_map.get(naga_handle) {
                fctx.function.named_expressions.insert(handle, name.clone());
            }
        }

        fctx.function.body = self.lower_block(&naga_func.body, &mut fctx)?;
        Ok(fctx.function)
    }
}

impl FuncCtx {
    fn map_expr(&self, h: naga::Handle<naga::Expression>) -> Result<Handle<Expression>, ParseError> {
        self.expr_map
            .get(&h)
            .copied()
            .ok_or_else(|| ParseError::Lowering(format!("unmapped expression {h:?}")))
    }

    fn map_expr_opt(
        &self,
        h: Option<naga::Handle<naga::Expression>>,
    ) -> Result<Option<Handle<Expression>>, ParseError> {
        h.map(|h| self.map_expr(h)).transpose()
    }

    fn map_local(
        &self,
        h: naga::Handle<naga::LocalVariable>,
    ) -> Result<Handle<shadex_ir::LocalVariable>, ParseError> {
        self.local_var_map
            .get(&h)
            .copied()
            .ok_or_else(|| ParseError::Lowering(format!("unmapped local var {h:?}")))
    }

    fn append(&mut self, expr: Expression) -> Handle<Expression> {
        self.function.expressions.append(expr)
    }

    /// Reads an entry point parameter back out of its interface globals.
    fn load_interface(&mut self, interface: &Interface) -> Handle<Expression> {
        match *interface {
            Interface::Single(global) => {
                let pointer = self.append(Expression::GlobalVariable(global));
                self.append(Expression::Load { pointer })
            }
            Interface::Struct { ty, ref members } => {
                let components = members
                    .iter()
                    .map(|&global| {
                        let pointer = self.append(Expression::GlobalVariable(global));
                        self.append(Expression::Load { pointer })
                    })
                    .collect();
                self.append(Expression::Compose { ty, components })
            }
        }
    }

    /// Writes an entry point's return value to its interface globals.
    fn store_interface(&mut self, interface: &Interface, value: Handle<Expression>, out: &mut Block) {
        match *interface {
            Interface::Single(global) => {
                let pointer = self.append(Expression::GlobalVariable(global));
                out.push(Statement::Store { pointer, value });
            }
            Interface::Struct { ref members, .. } => {
                let start = self.function.expressions.len() as u32;
                let fields: Vec<_> = (0..members.len() as u32)
                    .map(|index| self.append(Expression::AccessIndex { base: value, index }))
                    .collect();
                out.push(Statement::Emit(Range::from_index_range(
                    start..start + fields.len() as u32,
                )));
                for (&global, field) in members.iter().zip(fields) {
                    let pointer = self.append(Expression::GlobalVariable(global));
                    out.push(Statement::Store {
                        pointer,
                        value: field,
                    });
                }
            }
        }
    }
}

fn collect_uniform_loads(
    block: &naga::Block,
    out: &mut HashMap<naga::Handle<naga::Expression>, naga::Handle<naga::Expression>>,
) {
    for stmt in block.iter() {
        match *stmt {
            naga::Statement::WorkGroupUniformLoad { pointer, result } => {
                out.insert(result, pointer);
            }
            naga::Statement::Block(ref block) => collect_uniform_loads(block, out),
            naga::Statement::If {
                ref accept,
                ref reject,
                ..
            } => {
                collect_uniform_loads(accept, out);
                collect_uniform_loads(reject, out);
            }
            naga::Statement::Switch { ref cases, .. } => {
                for case in cases {
                    collect_uniform_loads(&case.body, out);
                }
            }
            naga::Statement::Loop {
                ref body,
                ref continuing,
                ..
            } => {
                collect_uniform_loads(body, out);
                collect_uniform_loads(continuing, out);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    fn lower_expression(
        &mut self,
        naga_handle: naga::Handle<naga::Expression>,
        expr: &naga::Expression,
        fctx: &mut FuncCtx,
    ) -> Result<Handle<Expression>, ParseError> {
        let lowered = match *expr {
            naga::Expression::Literal(lit) => Expression::Literal(lower_literal(lit)?),
            naga::Expression::Constant(h) => Expression::Constant(self.map_constant(h)?),
            naga::Expression::Override(h) => Expression::Constant(self.override_constant(h)?),
            naga::Expression::ZeroValue(ty) => Expression::ZeroValue(self.map_type(ty)?),
            naga::Expression::Compose { ty, ref components } => Expression::Compose {
                ty: self.map_type(ty)?,
                components: components
                    .iter()
                    .map(|c| fctx.map_expr(*c))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            naga::Expression::Access { base, index } => Expression::Access {
                base: fctx.map_expr(base)?,
                index: fctx.map_expr(index)?,
            },
            naga::Expression::AccessIndex { base, index } => Expression::AccessIndex {
                base: fctx.map_expr(base)?,
                index,
            },
            naga::Expression::Splat { size, value } => Expression::Splat {
                size: lower_vector_size(size),
                value: fctx.map_expr(value)?,
            },
            naga::Expression::Swizzle {
                size,
                vector,
                pattern,
            } => Expression::Swizzle {
                size: lower_vector_size(size),
                vector: fctx.map_expr(vector)?,
                pattern: lower_swizzle_pattern(pattern),
            },
            naga::Expression::FunctionArgument(idx) => match fctx.io {
                Some(ref io) => {
                    let interface = io.arguments.get(idx as usize).cloned().ok_or_else(|| {
                        ParseError::Lowering(format!("entry point has no argument {idx}"))
                    })?;
                    return Ok(fctx.load_interface(&interface));
                }
                None => Expression::FunctionArgument(idx),
            },
            naga::Expression::GlobalVariable(h) => Expression::GlobalVariable(self.map_global(h)?),
            naga::Expression::LocalVariable(h) => Expression::LocalVariable(fctx.map_local(h)?),
            naga::Expression::Load { pointer } => Expression::Load {
                pointer: fctx.map_expr(pointer)?,
            },
            naga::Expression::Unary { op, expr } => Expression::Unary {
                op: lower_unary_op(op),
                expr: fctx.map_expr(expr)?,
            },
            naga::Expression::Binary { op, left, right } => Expression::Binary {
                op: lower_binary_op(op),
                left: fctx.map_expr(left)?,
                right: fctx.map_expr(right)?,
            },
            naga::Expression::Select {
                condition,
                accept,
                reject,
            } => Expression::Select {
                condition: fctx.map_expr(condition)?,
                accept: fctx.map_expr(accept)?,
                reject: fctx.map_expr(reject)?,
            },
            naga::Expression::Derivative { axis, ctrl, expr } => Expression::Derivative {
                axis: match axis {
                    naga::DerivativeAxis::X => shadex_ir::DerivativeAxis::X,
                    naga::DerivativeAxis::Y => shadex_ir::DerivativeAxis::Y,
                    naga::DerivativeAxis::Width => shadex_ir::DerivativeAxis::Width,
                },
                control: match ctrl {
                    naga::DerivativeControl::Coarse => shadex_ir::DerivativeControl::Coarse,
                    naga::DerivativeControl::Fine => shadex_ir::DerivativeControl::Fine,
                    naga::DerivativeControl::None => shadex_ir::DerivativeControl::None,
                },
                expr: fctx.map_expr(expr)?,
            },
            naga::Expression::Relational { fun, argument } => Expression::Relational {
                fun: match fun {
                    naga::RelationalFunction::All => shadex_ir::RelationalFunction::All,
                    naga::RelationalFunction::Any => shadex_ir::RelationalFunction::Any,
                    naga::RelationalFunction::IsNan => shadex_ir::RelationalFunction::IsNan,
                    naga::RelationalFunction::IsInf => shadex_ir::RelationalFunction::IsInf,
                },
                argument: fctx.map_expr(argument)?,
            },
            naga::Expression::Math {
                fun,
                arg,
                arg1,
                arg2,
                arg3,
            } => Expression::Math {
                fun: lower_math_function(fun)?,
                arg: fctx.map_expr(arg)?,
                arg1: fctx.map_expr_opt(arg1)?,
                arg2: fctx.map_expr_opt(arg2)?,
                arg3: fctx.map_expr_opt(arg3)?,
            },
            naga::Expression::As {
                expr,
                kind,
                convert,
            } => Expression::As {
                expr: fctx.map_expr(expr)?,
                kind: lower_scalar_kind(kind),
                convert,
            },
            naga::Expression::CallResult(h) => {
                let function = self
                    .func_map
                    .get(&h)
                    .copied()
                    .ok_or_else(|| ParseError::Lowering(format!("unmapped function {h:?}")))?;
                Expression::CallResult(function)
            }
            naga::Expression::AtomicResult { ty, comparison } => Expression::AtomicResult {
                ty: self.map_type(ty)?,
                comparison,
            },
            naga::Expression::ArrayLength(expr) => Expression::ArrayLength(fctx.map_expr(expr)?),
            naga::Expression::SubgroupBallotResult => {
                let ty = self.find_or_append_type(TypeInner::Vector {
                    size: VectorSize::Quad,
                    scalar: Scalar::U32,
                });
                Expression::SubgroupResult { ty }
            }
            naga::Expression::SubgroupOperationResult { ty } => Expression::SubgroupResult {
                ty: self.map_type(ty)?,
            },
            // A plain load, fenced by barriers where the statement sits.
            naga::Expression::WorkGroupUniformLoadResult { .. } => {
                let pointer = fctx.uniform_loads.get(&naga_handle).copied().ok_or_else(|| {
                    ParseError::Lowering(format!("uniform load {naga_handle:?} has no statement"))
                })?;
                Expression::Load {
                    pointer: fctx.map_expr(pointer)?,
                }
            }
            _ => return Err(unsupported(&format!("{expr:?} expression"))),
        };
        Ok(fctx.append(lowered))
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    fn lower_block(&self, block: &naga::Block, fctx: &mut FuncCtx) -> Result<Block, ParseError> {
        let mut out = Vec::new();
        for stmt in block.iter() {
            self.lower_statement(stmt, fctx, &mut out)?;
        }
        Ok(out)
    }

    fn lower_statement(
        &self,
        stmt: &naga::Statement,
        fctx: &mut FuncCtx,
        out: &mut Block,
    ) -> Result<(), ParseError> {
        match *stmt {
            naga::Statement::Emit(ref range) => {
                if let Some((first, last)) = range.clone().first_and_last() {
                    let first = fctx.map_expr(first)?;
                    let last = fctx.map_expr(last)?;
                    // naga's last handle is inclusive.
                    out.push(Statement::Emit(Range::from_index_range(
                        first.index() as u32..last.index() as u32 + 1,
                    )));
                }
            }
            naga::Statement::Block(ref block) => {
                let stmts = self.lower_block(block, fctx)?;
                out.extend(stmts);
            }
            naga::Statement::Store { pointer, value } => out.push(Statement::Store {
                pointer: fctx.map_expr(pointer)?,
                value: fctx.map_expr(value)?,
            }),
            naga::Statement::If {
                condition,
                ref accept,
                ref reject,
            } => {
                let condition = fctx.map_expr(condition)?;
                let accept = self.lower_block(accept, fctx)?;
                let reject = self.lower_block(reject, fctx)?;
                out.push(Statement::If {
                    condition,
                    accept,
                    reject,
                });
            }
            naga::Statement::Switch {
                selector,
                ref cases,
            } => {
                let selector = fctx.map_expr(selector)?;
                let mut lowered = Vec::with_capacity(cases.len());
                for case in cases {
                    lowered.push(shadex_ir::SwitchCase {
                        value: match case.value {
                            naga::SwitchValue::I32(v) => shadex_ir::SwitchValue::I32(v),
                            naga::SwitchValue::U32(v) => shadex_ir::SwitchValue::U32(v),
                            naga::SwitchValue::Default => shadex_ir::SwitchValue::Default,
                        },
                        body: self.lower_block(&case.body, fctx)?,
                        fall_through: case.fall_through,
                    });
                }
                out.push(Statement::Switch {
                    selector,
                    cases: lowered,
                });
            }
            naga::Statement::Loop {
                ref body,
                ref continuing,
                break_if,
            } => {
                let body = self.lower_block(body, fctx)?;
                let continuing = self.lower_block(continuing, fctx)?;
                out.push(Statement::Loop {
                    body,
                    continuing,
                    break_if: fctx.map_expr_opt(break_if)?,
                });
            }
            naga::Statement::Break => out.push(Statement::Break),
            naga::Statement::Continue => out.push(Statement::Continue),
            naga::Statement::Kill => out.push(Statement::Kill),
            naga::Statement::Return { value } => {
                let result = fctx.io.as_ref().map(|io| io.result.clone());
                match result {
                    // An entry point returns through its output globals.
                    Some(result) => {
                        if let (Some(value), Some(interface)) = (value, result) {
                            let value = fctx.map_expr(value)?;
                            fctx.store_interface(&interface, value, out);
                        }
                        out.push(Statement::Return { value: None });
                    }
                    None => out.push(Statement::Return {
                        value: fctx.map_expr_opt(value)?,
                    }),
                }
            }
            naga::Statement::Call {
                function,
                ref arguments,
                result,
            } => {
                let function = self.func_map.get(&function).copied().ok_or_else(|| {
                    ParseError::Lowering(format!("unmapped called function {function:?}"))
                })?;
                let arguments = arguments
                    .iter()
                    .map(|a| fctx.map_expr(*a))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(Statement::Call {
                    function,
                    arguments,
                    result: fctx.map_expr_opt(result)?,
                });
            }
            naga::Statement::Atomic {
                pointer,
                ref fun,
                value,
                result,
            } => out.push(Statement::Atomic {
                pointer: fctx.map_expr(pointer)?,
                fun: lower_atomic_function(fun, fctx)?,
                value: fctx.map_expr(value)?,
                result: fctx.map_expr_opt(result)?,
            }),
            naga::Statement::ControlBarrier(barrier) | naga::Statement::MemoryBarrier(barrier) => {
                let barrier = lower_barrier(barrier);
                if !barrier.is_empty() {
                    out.push(Statement::Barrier(barrier));
                }
            }
            naga::Statement::WorkGroupUniformLoad { result, .. } => {
                let result = fctx.map_expr(result)?;
                let index = result.index() as u32;
                out.push(Statement::Barrier(shadex_ir::Barrier::WORKGROUP));
                out.push(Statement::Emit(Range::from_index_range(index..index + 1)));
                out.push(Statement::Barrier(shadex_ir::Barrier::WORKGROUP));
            }
            naga::Statement::SubgroupBallot { result, predicate } => out.push(Statement::Subgroup {
                op: SubgroupOperation::Ballot,
                argument: fctx.map_expr_opt(predicate)?,
                index: None,
                result: fctx.map_expr(result)?,
            }),
            naga::Statement::SubgroupGather {
                ref mode,
                argument,
                result,
            } => {
                let (op, index) = match *mode {
                    naga::GatherMode::BroadcastFirst => (SubgroupOperation::BroadcastFirst, None),
                    naga::GatherMode::Broadcast(i) => (SubgroupOperation::Broadcast, Some(i)),
                    naga::GatherMode::Shuffle(i) => (SubgroupOperation::Shuffle, Some(i)),
                    naga::GatherMode::ShuffleXor(i) => (SubgroupOperation::ShuffleXor, Some(i)),
                    _ => return Err(unsupported(&format!("{mode:?} subgroup gather"))),
                };
                out.push(Statement::Subgroup {
                    op,
                    argument: Some(fctx.map_expr(argument)?),
                    index: fctx.map_expr_opt(index)?,
                    result: fctx.map_expr(result)?,
                });
            }
            naga::Statement::SubgroupCollectiveOperation {
                op,
                collective_op,
                argument,
                result,
            } => out.push(Statement::Subgroup {
                op: lower_subgroup_operation(op, collective_op),
                argument: Some(fctx.map_expr(argument)?),
                index: None,
                result: fctx.map_expr(result)?,
            }),
            _ => return Err(unsupported(&format!("{stmt:?} statement"))),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

impl LowerCtx<'_> {
    /// Declares the capabilities implied by the scalar types in use.
    fn collect_capabilities(&mut self) {
        for (_, ty) in self.module.types.iter() {
            let Some(scalar) = ty.inner.scalar() else {
                continue;
            };
            let atomic = matches!(ty.inner, TypeInner::Atomic(_));
            let capability = match (scalar.kind, scalar.width) {
                (shadex_ir::ScalarKind::Sint | shadex_ir::ScalarKind::Uint, 8) if atomic => {
                    Capability::Int64Atomics
                }
                (shadex_ir::ScalarKind::Float, 4) if atomic => Capability::AtomicFloat32Add,
                (shadex_ir::ScalarKind::Sint | shadex_ir::ScalarKind::Uint, 8) => {
                    Capability::Int64
                }
                (shadex_ir::ScalarKind::Float, 8) => Capability::Float64,
                (shadex_ir::ScalarKind::Float, 2) => Capability::Float16,
                _ => continue,
            };
            self.module.capabilities.insert(capability);
        }
    }
}

// ---------------------------------------------------------------------------
// Enum mapping helpers
// ---------------------------------------------------------------------------

/// Abstract scalars only survive in unused constants; they get the
/// default concrete type.
fn lower_scalar(s: naga::Scalar) -> Scalar {
    match s.kind {
        naga::ScalarKind::AbstractInt => Scalar::I32,
        naga::ScalarKind::AbstractFloat => Scalar::F32,
        kind => Scalar {
            kind: lower_scalar_kind(kind),
            width: s.width,
        },
    }
}

fn lower_scalar_kind(kind: naga::ScalarKind) -> shadex_ir::ScalarKind {
    match kind {
        naga::ScalarKind::Bool => shadex_ir::ScalarKind::Bool,
        naga::ScalarKind::Sint | naga::ScalarKind::AbstractInt => shadex_ir::ScalarKind::Sint,
        naga::ScalarKind::Uint => shadex_ir::ScalarKind::Uint,
        naga::ScalarKind::Float | naga::ScalarKind::AbstractFloat => shadex_ir::ScalarKind::Float,
    }
}

fn lower_vector_size(size: naga::VectorSize) -> VectorSize {
    match size {
        naga::VectorSize::Bi => VectorSize::Bi,
        naga::VectorSize::Tri => VectorSize::Tri,
        naga::VectorSize::Quad => VectorSize::Quad,
    }
}

fn lower_array_size(size: naga::ArraySize) -> Result<shadex_ir::ArraySize, ParseError> {
    match size {
        naga::ArraySize::Constant(n) => Ok(shadex_ir::ArraySize::Literal(n.get())),
        naga::ArraySize::Dynamic => Ok(shadex_ir::ArraySize::Dynamic),
        naga::ArraySize::Pending(_) => Err(unsupported("override-sized array")),
    }
}

fn lower_address_space(space: naga::AddressSpace) -> Result<AddressSpace, ParseError> {
    match space {
        naga::AddressSpace::Function => Ok(AddressSpace::Function),
        naga::AddressSpace::Private => Ok(AddressSpace::Private),
        naga::AddressSpace::WorkGroup => Ok(AddressSpace::Workgroup),
        naga::AddressSpace::Uniform => Ok(AddressSpace::Uniform),
        naga::AddressSpace::PushConstant => Ok(AddressSpace::PushConstant),
        naga::AddressSpace::Storage { access } => {
            let mut ir_access = shadex_ir::StorageAccess::EMPTY;
            if access.contains(naga::StorageAccess::LOAD) {
                ir_access |= shadex_ir::StorageAccess::LOAD;
            }
            if access.contains(naga::StorageAccess::STORE) {
                ir_access |= shadex_ir::StorageAccess::STORE;
            }
            Ok(AddressSpace::Storage { access: ir_access })
        }
        naga::AddressSpace::Handle => Err(unsupported("Handle address space")),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported(&format!("{space:?} address space"))),
    }
}

/// Maps a builtin binding; `position` means the fragment coordinate when
/// a fragment shader reads it.
fn lower_builtin(
    builtin: naga::BuiltIn,
    stage: ShaderStage,
    space: AddressSpace,
) -> Result<shadex_ir::BuiltIn, ParseError> {
    use shadex_ir::BuiltIn as B;
    Ok(match builtin {
        naga::BuiltIn::Position { .. } => {
            if stage == ShaderStage::Fragment && space == AddressSpace::Input {
                B::FragCoord
            } else {
                B::Position
            }
        }
        naga::BuiltIn::ViewIndex => B::ViewIndex,
        naga::BuiltIn::ClipDistance => B::ClipDistance,
        naga::BuiltIn::InstanceIndex => B::InstanceIndex,
        naga::BuiltIn::PointSize => B::PointSize,
        naga::BuiltIn::VertexIndex => B::VertexIndex,
        naga::BuiltIn::FragDepth => B::FragDepth,
        naga::BuiltIn::PointCoord => B::PointCoord,
        naga::BuiltIn::FrontFacing => B::FrontFacing,
        naga::BuiltIn::PrimitiveIndex => B::PrimitiveId,
        naga::BuiltIn::SampleIndex => B::SampleIndex,
        naga::BuiltIn::SampleMask => B::SampleMask,
        naga::BuiltIn::GlobalInvocationId => B::GlobalInvocationId,
        naga::BuiltIn::LocalInvocationId => B::LocalInvocationId,
        naga::BuiltIn::LocalInvocationIndex => B::LocalInvocationIndex,
        naga::BuiltIn::WorkGroupId => B::WorkgroupId,
        naga::BuiltIn::NumWorkGroups => B::NumWorkgroups,
        naga::BuiltIn::NumSubgroups => B::NumSubgroups,
        naga::BuiltIn::SubgroupId => B::SubgroupId,
        naga::BuiltIn::SubgroupSize => B::SubgroupSize,
        naga::BuiltIn::SubgroupInvocationId => B::SubgroupInvocationId,
        other => return Err(unsupported(&format!("{other:?} builtin"))),
    })
}

fn lower_interpolation(interpolation: naga::Interpolation) -> Option<shadex_ir::Interpolation> {
    match interpolation {
        naga::Interpolation::Perspective => Some(shadex_ir::Interpolation::Perspective),
        naga::Interpolation::Linear => Some(shadex_ir::Interpolation::Linear),
        naga::Interpolation::Flat => Some(shadex_ir::Interpolation::Flat),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn lower_sampling(sampling: naga::Sampling) -> Option<shadex_ir::Sampling> {
    match sampling {
        naga::Sampling::Center => Some(shadex_ir::Sampling::Center),
        naga::Sampling::Centroid => Some(shadex_ir::Sampling::Centroid),
        naga::Sampling::Sample => Some(shadex_ir::Sampling::Sample),
        _ => None,
    }
}

fn lower_unary_op(op: naga::UnaryOperator) -> shadex_ir::UnaryOp {
    match op {
        naga::UnaryOperator::Negate => shadex_ir::UnaryOp::Negate,
        naga::UnaryOperator::LogicalNot => shadex_ir::UnaryOp::LogicalNot,
        naga::UnaryOperator::BitwiseNot => shadex_ir::UnaryOp::BitwiseNot,
    }
}

fn lower_binary_op(op: naga::BinaryOperator) -> shadex_ir::BinaryOp {
    use shadex_ir::BinaryOp as B;
    match op {
        naga::BinaryOperator::Add => B::Add,
        naga::BinaryOperator::Subtract => B::Subtract,
        naga::BinaryOperator::Multiply => B::Multiply,
        naga::BinaryOperator::Divide => B::Divide,
        naga::BinaryOperator::Modulo => B::Modulo,
        naga::BinaryOperator::Equal => B::Equal,
        naga::BinaryOperator::NotEqual => B::NotEqual,
        naga::BinaryOperator::Less => B::Less,
        naga::BinaryOperator::LessEqual => B::LessEqual,
        naga::BinaryOperator::Greater => B::Greater,
        naga::BinaryOperator::GreaterEqual => B::GreaterEqual,
        naga::BinaryOperator::And => B::BitwiseAnd,
        naga::BinaryOperator::ExclusiveOr => B::BitwiseXor,
        naga::BinaryOperator::InclusiveOr => B::BitwiseOr,
        naga::BinaryOperator::LogicalAnd => B::LogicalAnd,
        naga::BinaryOperator::LogicalOr => B::LogicalOr,
        naga::BinaryOperator::ShiftLeft => B::ShiftLeft,
        naga::BinaryOperator::ShiftRight => B::ShiftRight,
    }
}

fn lower_math_function(fun: naga::MathFunction) -> Result<shadex_ir::MathFunction, ParseError> {
    use naga::MathFunction as N;
    use shadex_ir::MathFunction as M;
    Ok(match fun {
        N::Abs => M::Abs,
        N::Min => M::Min,
        N::Max => M::Max,
        N::Clamp => M::Clamp,
        N::Saturate => M::Saturate,
        N::Sign => M::Sign,
        N::Floor => M::Floor,
        N::Ceil => M::Ceil,
        N::Round => M::Round,
        N::Fract => M::Fract,
        N::Trunc => M::Trunc,
        N::Sin => M::Sin,
        N::Cos => M::Cos,
        N::Tan => M::Tan,
        N::Asin => M::Asin,
        N::Acos => M::Acos,
        N::Atan => M::Atan,
        N::Atan2 => M::Atan2,
        N::Sinh => M::Sinh,
        N::Cosh => M::Cosh,
        N::Tanh => M::Tanh,
        N::Sqrt => M::Sqrt,
        N::InverseSqrt => M::InverseSqrt,
        N::Log => M::Log,
        N::Log2 => M::Log2,
        N::Exp => M::Exp,
        N::Exp2 => M::Exp2,
        N::Pow => M::Pow,
        N::Dot => M::Dot,
        N::Cross => M::Cross,
        N::Normalize => M::Normalize,
        N::Length => M::Length,
        N::Distance => M::Distance,
        N::Transpose => M::Transpose,
        N::Inverse => M::Inverse,
        N::Determinant => M::Determinant,
        N::Mix => M::Mix,
        N::Step => M::Step,
        N::SmoothStep => M::SmoothStep,
        N::Fma => M::Fma,
        N::CountOneBits => M::CountOneBits,
        N::ReverseBits => M::ReverseBits,
        N::FirstTrailingBit => M::FindLsb,
        N::FirstLeadingBit => M::FindMsb,
        N::ExtractBits => M::ExtractBits,
        N::InsertBits => M::InsertBits,
        N::Pack4x8snorm => M::Pack4x8Snorm,
        N::Pack4x8unorm => M::Pack4x8Unorm,
        N::Pack2x16snorm => M::Pack2x16Snorm,
        N::Pack2x16unorm => M::Pack2x16Unorm,
        N::Pack2x16float => M::Pack2x16Float,
        N::Unpack4x8snorm => M::Unpack4x8Snorm,
        N::Unpack4x8unorm => M::Unpack4x8Unorm,
        N::Unpack2x16snorm => M::Unpack2x16Snorm,
        N::Unpack2x16unorm => M::Unpack2x16Unorm,
        N::Unpack2x16float => M::Unpack2x16Float,
        other => return Err(unsupported(&format!("{other:?} math function"))),
    })
}

fn lower_atomic_function(
    fun: &naga::AtomicFunction,
    fctx: &FuncCtx,
) -> Result<shadex_ir::AtomicFunction, ParseError> {
    use shadex_ir::AtomicFunction as A;
    match *fun {
        naga::AtomicFunction::Add => Ok(A::Add),
        naga::AtomicFunction::Subtract => Ok(A::Subtract),
        naga::AtomicFunction::And => Ok(A::And),
        naga::AtomicFunction::ExclusiveOr => Ok(A::ExclusiveOr),
        naga::AtomicFunction::InclusiveOr => Ok(A::InclusiveOr),
        naga::AtomicFunction::Min => Ok(A::Min),
        naga::AtomicFunction::Max => Ok(A::Max),
        naga::AtomicFunction::Exchange { compare } => Ok(A::Exchange {
            compare: fctx.map_expr_opt(compare)?,
        }),
    }
}

fn lower_subgroup_operation(
    op: naga::SubgroupOperation,
    collective: naga::CollectiveOperation,
) -> SubgroupOperation {
    let reduction = match op {
        naga::SubgroupOperation::All => return SubgroupOperation::All,
        naga::SubgroupOperation::Any => return SubgroupOperation::Any,
        naga::SubgroupOperation::Add => CollectiveOp::Add,
        naga::SubgroupOperation::Mul => CollectiveOp::Mul,
        naga::SubgroupOperation::Min => CollectiveOp::Min,
        naga::SubgroupOperation::Max => CollectiveOp::Max,
        naga::SubgroupOperation::And => CollectiveOp::And,
        naga::SubgroupOperation::Or => CollectiveOp::Or,
        naga::SubgroupOperation::Xor => CollectiveOp::Xor,
    };
    match collective {
        naga::CollectiveOperation::Reduce => SubgroupOperation::Reduce(reduction),
        naga::CollectiveOperation::InclusiveScan => SubgroupOperation::InclusiveScan(reduction),
        naga::CollectiveOperation::ExclusiveScan => SubgroupOperation::ExclusiveScan(reduction),
    }
}

fn lower_literal(lit: naga::Literal) -> Result<shadex_ir::Literal, ParseError> {
    use shadex_ir::Literal as L;
    match lit {
        naga::Literal::Bool(v) => Ok(L::Bool(v)),
        naga::Literal::I32(v) => Ok(L::I32(v)),
        naga::Literal::U32(v) => Ok(L::U32(v)),
        naga::Literal::I64(v) => Ok(L::I64(v)),
        naga::Literal::U64(v) => Ok(L::U64(v)),
        naga::Literal::F32(v) => Ok(L::F32(v)),
        naga::Literal::F64(v) => Ok(L::F64(v)),
        naga::Literal::AbstractInt(v) => Ok(i32::try_from(v).map_or(L::I64(v), L::I32)),
        naga::Literal::AbstractFloat(v) => Ok(L::F32(v as f32)),
        _ => Err(unsupported(&format!("{lit:?} literal"))),
    }
}

fn lower_swizzle_pattern(
    pattern: [naga::SwizzleComponent; 4],
) -> [shadex_ir::SwizzleComponent; 4] {
    pattern.map(|c| match c {
        naga::SwizzleComponent::X => shadex_ir::SwizzleComponent::X,
        naga::SwizzleComponent::Y => shadex_ir::SwizzleComponent::Y,
        naga::SwizzleComponent::Z => shadex_ir::SwizzleComponent::Z,
        naga::SwizzleComponent::W => shadex_ir::SwizzleComponent::W,
    })
}

fn lower_barrier(barrier: naga::Barrier) -> shadex_ir::Barrier {
    let mut out = shadex_ir::Barrier::EMPTY;
    if barrier.contains(naga::Barrier::STORAGE) {
        out |= shadex_ir::Barrier::STORAGE;
    }
    if barrier.contains(naga::Barrier::WORK_GROUP) {
        out |= shadex_ir::Barrier::WORKGROUP;
    }
    if barrier.contains(naga::Barrier::SUB_GROUP) {
        out |= shadex_ir::Barrier::SUBGROUP;
    }
    out
}

fn unsupported(what: &str) -> ParseError {
    ParseError::Unsupported(what.to_string())
}

fn lowering(err: shadex_ir::IrError) -> ParseError {
    ParseError::Lowering(err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> shadex_ir::Module {
        let naga_module = naga::front::wgsl::parse_str(source).expect("WGSL parse failed");
        lower_module(&naga_module).expect("lowering failed")
    }

    #[test]
    fn test_lower_scalar() {
        assert_eq!(lower_scalar(naga::Scalar::F32), Scalar::F32);
        assert_eq!(lower_scalar(naga::Scalar::U32), Scalar::U32);
        assert_eq!(lower_scalar(naga::Scalar::ABSTRACT_INT), Scalar::I32);
        assert_eq!(lower_scalar(naga::Scalar::ABSTRACT_FLOAT), Scalar::F32);
    }

    #[test]
    fn test_lower_binary_op() {
        assert_eq!(
            lower_binary_op(naga::BinaryOperator::And),
            shadex_ir::BinaryOp::BitwiseAnd
        );
        assert_eq!(
            lower_binary_op(naga::BinaryOperator::LogicalAnd),
            shadex_ir::BinaryOp::LogicalAnd
        );
        assert!(lower_binary_op(naga::BinaryOperator::Less).is_comparison());
        assert!(!lower_binary_op(naga::BinaryOperator::Add).is_comparison());
    }

    #[test]
    fn test_lower_address_space() {
        assert_eq!(
            lower_address_space(naga::AddressSpace::WorkGroup).unwrap(),
            AddressSpace::Workgroup
        );
        assert_eq!(
            lower_address_space(naga::AddressSpace::PushConstant).unwrap(),
            AddressSpace::PushConstant
        );
        assert!(lower_address_space(naga::AddressSpace::Handle).is_err());
    }

    #[test]
    fn test_lower_math_function() {
        assert_eq!(
            lower_math_function(naga::MathFunction::FirstLeadingBit).unwrap(),
            shadex_ir::MathFunction::FindMsb
        );
        assert_eq!(
            lower_math_function(naga::MathFunction::Pack2x16float).unwrap(),
            shadex_ir::MathFunction::Pack2x16Float
        );
        assert!(lower_math_function(naga::MathFunction::Outer).is_err());
    }

    #[test]
    fn test_lower_literal() {
        assert_eq!(
            lower_literal(naga::Literal::AbstractInt(7)).unwrap(),
            shadex_ir::Literal::I32(7)
        );
        assert_eq!(
            lower_literal(naga::Literal::AbstractInt(1 << 40)).unwrap(),
            shadex_ir::Literal::I64(1 << 40)
        );
        assert_eq!(
            lower_literal(naga::Literal::F32(2.75)).unwrap(),
            shadex_ir::Literal::F32(2.75)
        );
    }

    #[test]
    fn test_lower_barrier() {
        let both = lower_barrier(naga::Barrier::STORAGE | naga::Barrier::WORK_GROUP);
        assert!(both.contains(shadex_ir::Barrier::STORAGE));
        assert!(both.contains(shadex_ir::Barrier::WORKGROUP));
        assert!(lower_barrier(naga::Barrier::empty()).is_empty());
    }

    #[test]
    fn test_builtin_position_depends_on_stage() {
        let position = naga::BuiltIn::Position { invariant: false };
        assert_eq!(
            lower_builtin(position, ShaderStage::Fragment, AddressSpace::Input).unwrap(),
            shadex_ir::BuiltIn::FragCoord
        );
        assert_eq!(
            lower_builtin(position, ShaderStage::Vertex, AddressSpace::Output).unwrap(),
            shadex_ir::BuiltIn::Position
        );
    }

    #[test]
    fn test_compute_entry_point() {
        let module = lower(
            "@group(0) @binding(0) var<storage, read_write> buf: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    buf[i] = buf[i] + 1.0;
}",
        );
        assert_eq!(module.entry_points.len(), 1);
        let ep = &module.entry_points[0];
        assert_eq!(ep.name, "main");
        assert_eq!(ep.workgroup_size(), Some([64, 1, 1]));
        assert!(ep.function.arguments.is_empty());

        // The buffer plus the invocation id input.
        assert_eq!(module.global_variables.len(), 2);
        let (_, gid) = module
            .global_variables
            .iter()
            .find(|(_, g)| g.space == AddressSpace::Input)
            .unwrap();
        assert_eq!(
            gid.decorations.built_in,
            Some(shadex_ir::BuiltIn::GlobalInvocationId)
        );
    }

    #[test]
    fn test_struct_result_becomes_outputs() {
        let module = lower(
            "struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) @interpolate(flat) id: u32,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    return VertexOutput(vec4<f32>(0.0), index);
}",
        );
        let outputs: Vec<_> = module
            .global_variables
            .iter()
            .filter(|(_, g)| g.space == AddressSpace::Output)
            .map(|(_, g)| g)
            .collect();
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs[0].decorations.built_in,
            Some(shadex_ir::BuiltIn::Position)
        );
        assert_eq!(outputs[1].decorations.location, Some(0));
        assert_eq!(
            outputs[1].decorations.interpolation,
            Some(shadex_ir::Interpolation::Flat)
        );

        let body = &module.entry_points[0].function.body;
        let stores = body
            .iter()
            .filter(|s| matches!(s, Statement::Store { .. }))
            .count();
        assert_eq!(stores, 2);
        assert!(matches!(body.last(), Some(Statement::Return { value: None })));
    }

    #[test]
    fn test_overrides_become_specialization_constants() {
        let module = lower(
            "@id(3) override scale: f32 = 2.0;
override count: u32;

@group(0) @binding(0) var<storage, read_write> buf: array<f32>;

@compute @workgroup_size(1)
fn main() {
    buf[count] = scale;
}",
        );
        let spec: Vec<_> = module
            .constants
            .iter()
            .filter_map(|(_, c)| Some((c.name.clone()?, c.spec_id?)))
            .collect();
        assert!(spec.contains(&("scale".to_string(), 3)));
        assert!(spec.contains(&("count".to_string(), 4)));
    }

    #[test]
    fn test_uniform_struct_is_a_block() {
        let module = lower(
            "struct Params { scale: f32, offset: vec3<f32>, m: mat3x3<f32> }
@group(0) @binding(0) var<uniform> params: Params;

@compute @workgroup_size(1)
fn main() {
    let s = params.scale;
}",
        );
        let (_, var) = module.global_variables.iter().next().unwrap();
        let TypeInner::Struct {
            ref members,
            is_block,
        } = module.types[var.ty].inner
        else {
            panic!("expected a struct");
        };
        assert!(is_block);
        assert_eq!(members[1].layout.offset, Some(16));
        assert_eq!(members[2].layout.offset, Some(32));
        assert_eq!(members[2].layout.matrix_stride, Some(16));
    }

    #[test]
    fn test_images_are_rejected() {
        let naga_module = naga::front::wgsl::parse_str(
            "@group(0) @binding(0) var tex: texture_2d<f32>;
@fragment
fn main() -> @location(0) vec4<f32> {
    return textureLoad(tex, vec2<i32>(0), 0);
}",
        )
        .unwrap();
        assert!(matches!(
            lower_module(&naga_module),
            Err(ParseError::Unsupported(_))
        ));
    }
}
