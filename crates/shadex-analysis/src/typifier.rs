//! Expression type resolution.
//!
//! Every expression resolves to either an arena type or an anonymous
//! [`TypeInner`] (swizzles, comparisons and other derived shapes), plus
//! the address space it points into when the expression is a reference.

use shadex_ir::{
    AddressSpace, BinaryOp, Expression, Function, Handle, MathFunction, Module,
    RelationalFunction, Scalar, ScalarKind, Type, TypeInner, VectorSize,
};

use crate::AnalysisError;

/// The value type of an expression.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeResolution {
    Handle(Handle<Type>),
    Value(TypeInner),
}

impl TypeResolution {
    pub fn inner<'a>(&'a self, module: &'a Module) -> Option<&'a TypeInner> {
        match self {
            Self::Handle(h) => module.types.try_get(*h).map(|ty| &ty.inner),
            Self::Value(inner) => Some(inner),
        }
    }
}

/// The resolved type of one expression.
///
/// For references (`pointer` is `Some`), `ty` is the pointee type: GLSL
/// has no pointers, so a reference is spelled as the lvalue itself.
#[derive(Clone, Debug, PartialEq)]
pub struct ExprType {
    pub ty: TypeResolution,
    pub pointer: Option<AddressSpace>,
}

impl ExprType {
    fn value(ty: TypeResolution) -> Self {
        Self { ty, pointer: None }
    }

    fn inner_value(inner: TypeInner) -> Self {
        Self::value(TypeResolution::Value(inner))
    }
}

/// Types of every expression in one function.
#[derive(Clone, Debug, Default)]
pub struct Typifier {
    resolved: Vec<ExprType>,
}

impl Typifier {
    /// Resolves every expression of `func`. Expressions may only refer to
    /// earlier handles, so one forward sweep suffices.
    pub fn resolve(module: &Module, func: &Function) -> Result<Self, AnalysisError> {
        let mut this = Self {
            resolved: Vec::with_capacity(func.expressions.len()),
        };
        for (handle, expr) in func.expressions.iter() {
            let resolved = this
                .resolve_one(module, func, expr)
                .map_err(|reason| AnalysisError::Typify {
                    function: func.name.clone().unwrap_or_default(),
                    expr: handle.index(),
                    reason,
                })?;
            this.resolved.push(resolved);
        }
        Ok(this)
    }

    pub fn get(&self, handle: Handle<Expression>) -> Option<&ExprType> {
        self.resolved.get(handle.index())
    }

    /// Returns `true` when the expression denotes a reference, not a value.
    pub fn is_pointer(&self, handle: Handle<Expression>) -> bool {
        self.get(handle).is_some_and(|t| t.pointer.is_some())
    }

    pub fn inner<'a>(
        &'a self,
        module: &'a Module,
        handle: Handle<Expression>,
    ) -> Option<&'a TypeInner> {
        self.get(handle)?.ty.inner(module)
    }

    fn earlier(&self, handle: Handle<Expression>) -> Result<&ExprType, String> {
        self.resolved
            .get(handle.index())
            .ok_or_else(|| format!("forward reference to {handle:?}"))
    }

    fn earlier_inner<'a>(
        &'a self,
        module: &'a Module,
        handle: Handle<Expression>,
    ) -> Result<&'a TypeInner, String> {
        self.earlier(handle)?
            .ty
            .inner(module)
            .ok_or_else(|| format!("dangling type behind {handle:?}"))
    }

    fn resolve_one(
        &self,
        module: &Module,
        func: &Function,
        expr: &Expression,
    ) -> Result<ExprType, String> {
        Ok(match *expr {
            Expression::Literal(lit) => ExprType::inner_value(TypeInner::Scalar(lit.scalar())),
            Expression::Constant(c) => {
                let constant = module.constants.fetch(c).map_err(|e| e.to_string())?;
                ExprType::value(TypeResolution::Handle(constant.ty))
            }
            Expression::ZeroValue(ty) | Expression::Compose { ty, .. } => {
                ExprType::value(TypeResolution::Handle(ty))
            }
            Expression::FunctionArgument(index) => {
                let arg = func
                    .arguments
                    .get(index as usize)
                    .ok_or_else(|| format!("argument {index} out of range"))?;
                match module.types.fetch(arg.ty).map_err(|e| e.to_string())?.inner {
                    TypeInner::Pointer { base, space } if space != AddressSpace::PhysicalStorage => {
                        ExprType {
                            ty: TypeResolution::Handle(base),
                            pointer: Some(space),
                        }
                    }
                    _ => ExprType::value(TypeResolution::Handle(arg.ty)),
                }
            }
            Expression::GlobalVariable(g) => {
                let var = module.global_variables.fetch(g).map_err(|e| e.to_string())?;
                ExprType {
                    ty: TypeResolution::Handle(var.ty),
                    pointer: Some(var.space),
                }
            }
            Expression::LocalVariable(l) => {
                let var = func.local_variables.fetch(l).map_err(|e| e.to_string())?;
                ExprType {
                    ty: TypeResolution::Handle(var.ty),
                    pointer: Some(AddressSpace::Function),
                }
            }
            Expression::Load { pointer } => {
                let base = self.earlier(pointer)?;
                if base.pointer.is_none() {
                    return Err("load through a non-pointer".into());
                }
                ExprType::value(base.ty.clone())
            }
            Expression::Access { base, .. } => self.element(module, base, None)?,
            Expression::AccessIndex { base, index } => self.element(module, base, Some(index))?,
            Expression::Swizzle { size, vector, .. } => {
                let scalar = self
                    .earlier_inner(module, vector)?
                    .scalar()
                    .ok_or("swizzle of a non-vector")?;
                ExprType::inner_value(TypeInner::Vector { size, scalar })
            }
            Expression::Splat { size, value } => {
                let scalar = self
                    .earlier_inner(module, value)?
                    .scalar()
                    .ok_or("splat of a non-scalar")?;
                ExprType::inner_value(TypeInner::Vector { size, scalar })
            }
            Expression::Unary { expr, .. }
            | Expression::Derivative { expr, .. }
            | Expression::Select { accept: expr, .. } => {
                ExprType::value(self.earlier(expr)?.ty.clone())
            }
            Expression::Binary { op, left, right } => self.binary(module, op, left, right)?,
            Expression::Relational { fun, argument } => match fun {
                RelationalFunction::All | RelationalFunction::Any => {
                    ExprType::inner_value(TypeInner::Scalar(Scalar::BOOL))
                }
                RelationalFunction::IsNan | RelationalFunction::IsInf => {
                    ExprType::inner_value(bool_shape(self.earlier_inner(module, argument)?))
                }
            },
            Expression::Math { fun, arg, .. } => self.math(module, fun, arg)?,
            Expression::As {
                expr,
                kind,
                convert,
            } => {
                let source = self.earlier_inner(module, expr)?;
                let width = |s: Scalar| match convert {
                    Some(w) => w,
                    None => s.width,
                };
                let inner = match *source {
                    TypeInner::Scalar(s) => TypeInner::Scalar(Scalar {
                        kind,
                        width: width(s),
                    }),
                    TypeInner::Vector { size, scalar } => TypeInner::Vector {
                        size,
                        scalar: Scalar {
                            kind,
                            width: width(scalar),
                        },
                    },
                    TypeInner::Matrix {
                        columns,
                        rows,
                        scalar,
                    } => TypeInner::Matrix {
                        columns,
                        rows,
                        scalar: Scalar {
                            kind,
                            width: width(scalar),
                        },
                    },
                    _ => return Err("cast of a non-numeric value".into()),
                };
                ExprType::inner_value(inner)
            }
            Expression::ArrayLength(_) => ExprType::inner_value(TypeInner::Scalar(Scalar::U32)),
            Expression::CallResult(f) => {
                let callee = module.functions.fetch(f).map_err(|e| e.to_string())?;
                let result = callee
                    .result
                    .as_ref()
                    .ok_or("call result of a void function")?;
                ExprType::value(TypeResolution::Handle(result.ty))
            }
            Expression::AtomicResult { ty, .. } | Expression::SubgroupResult { ty } => {
                ExprType::value(TypeResolution::Handle(ty))
            }
        })
    }

    fn element(
        &self,
        module: &Module,
        base: Handle<Expression>,
        index: Option<u32>,
    ) -> Result<ExprType, String> {
        let base_ty = self.earlier(base)?;
        let mut pointer = base_ty.pointer;
        let mut inner = base_ty
            .ty
            .inner(module)
            .ok_or("dangling base type")?
            .clone();
        // Indexing a physical pointer value dereferences it.
        if let TypeInner::Pointer { base, space } = inner {
            pointer = Some(space);
            inner = module
                .types
                .fetch(base)
                .map_err(|e| e.to_string())?
                .inner
                .clone();
        }
        let ty = match inner {
            TypeInner::Array { base, .. } => TypeResolution::Handle(base),
            TypeInner::Vector { scalar, .. } => TypeResolution::Value(TypeInner::Scalar(scalar)),
            TypeInner::Matrix { rows, scalar, .. } => TypeResolution::Value(TypeInner::Vector {
                size: rows,
                scalar,
            }),
            TypeInner::Struct { ref members, .. } => {
                let index = index.ok_or("dynamic index into a struct")?;
                let member = members
                    .get(index as usize)
                    .ok_or_else(|| format!("member {index} out of range"))?;
                TypeResolution::Handle(member.ty)
            }
            _ => return Err("index into a non-composite".into()),
        };
        Ok(ExprType { ty, pointer })
    }

    fn binary(
        &self,
        module: &Module,
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<ExprType, String> {
        let l = self.earlier_inner(module, left)?;
        let r = self.earlier_inner(module, right)?;
        Ok(match op {
            op if op.is_comparison() => ExprType::inner_value(bool_shape(l)),
            BinaryOp::Multiply => match (l, r) {
                (
                    &TypeInner::Matrix { rows, scalar, .. },
                    &TypeInner::Matrix { columns, .. },
                ) => ExprType::inner_value(TypeInner::Matrix {
                    columns,
                    rows,
                    scalar,
                }),
                (&TypeInner::Matrix { rows, scalar, .. }, &TypeInner::Vector { .. }) => {
                    ExprType::inner_value(TypeInner::Vector { size: rows, scalar })
                }
                (&TypeInner::Vector { scalar, .. }, &TypeInner::Matrix { columns, .. }) => {
                    ExprType::inner_value(TypeInner::Vector {
                        size: columns,
                        scalar,
                    })
                }
                (&TypeInner::Scalar(_), _) => ExprType::value(self.earlier(right)?.ty.clone()),
                _ => ExprType::value(self.earlier(left)?.ty.clone()),
            },
            _ => match (l, r) {
                (&TypeInner::Scalar(_), &TypeInner::Vector { .. }) => {
                    ExprType::value(self.earlier(right)?.ty.clone())
                }
                _ => ExprType::value(self.earlier(left)?.ty.clone()),
            },
        })
    }

    fn math(
        &self,
        module: &Module,
        fun: MathFunction,
        arg: Handle<Expression>,
    ) -> Result<ExprType, String> {
        use MathFunction as Mf;
        let arg_inner = self.earlier_inner(module, arg)?;
        let scalar_of = |inner: &TypeInner| inner.scalar().ok_or("non-numeric math operand");
        Ok(match fun {
            Mf::Dot | Mf::Length | Mf::Distance | Mf::Determinant => {
                ExprType::inner_value(TypeInner::Scalar(scalar_of(arg_inner)?))
            }
            Mf::Transpose => match *arg_inner {
                TypeInner::Matrix {
                    columns,
                    rows,
                    scalar,
                } => ExprType::inner_value(TypeInner::Matrix {
                    columns: rows,
                    rows: columns,
                    scalar,
                }),
                _ => return Err("transpose of a non-matrix".into()),
            },
            Mf::Pack4x8Snorm
            | Mf::Pack4x8Unorm
            | Mf::Pack2x16Snorm
            | Mf::Pack2x16Unorm
            | Mf::Pack2x16Float => ExprType::inner_value(TypeInner::Scalar(Scalar::U32)),
            Mf::Unpack4x8Snorm | Mf::Unpack4x8Unorm => ExprType::inner_value(TypeInner::Vector {
                size: VectorSize::Quad,
                scalar: Scalar::F32,
            }),
            Mf::Unpack2x16Snorm | Mf::Unpack2x16Unorm | Mf::Unpack2x16Float => {
                ExprType::inner_value(TypeInner::Vector {
                    size: VectorSize::Bi,
                    scalar: Scalar::F32,
                })
            }
            Mf::CountOneBits | Mf::FindLsb | Mf::FindMsb => {
                // GLSL returns signed integers for these; the writer casts.
                ExprType::value(self.earlier(arg)?.ty.clone())
            }
            _ => ExprType::value(self.earlier(arg)?.ty.clone()),
        })
    }
}

/// A boolean scalar or vector with the same component count as `inner`.
fn bool_shape(inner: &TypeInner) -> TypeInner {
    match *inner {
        TypeInner::Vector { size, .. } => TypeInner::Vector {
            size,
            scalar: Scalar {
                kind: ScalarKind::Bool,
                width: 1,
            },
        },
        _ => TypeInner::Scalar(Scalar::BOOL),
    }
}
