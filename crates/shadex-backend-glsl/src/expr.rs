//! Expression spelling.
//!
//! An expression is inlined at its single use unless it is named, used
//! more than once, or was forced into a temporary by an earlier pass.
//! Inlined text that reads memory remembers which variables it read
//! ([`Root`]s); a later store to one of them makes the text stale, and a
//! stale use forces a temporary for the next pass.

use std::collections::BTreeSet;

use shadex_analysis::{TypeResolution, expression_operands};
use shadex_ir::{
    BinaryOp, DerivativeAxis, DerivativeControl, Expression, Function, FunctionKey,
    GlobalVariable, Handle, Literal, MathFunction, RelationalFunction, Scalar, ScalarKind, Type,
    TypeInner, UnaryOp,
};

use crate::builtin::{builtin_kind, builtin_name};
use crate::driver::{Compiler, FunctionInfo};
use crate::extensions::Trigger;
use crate::ids::Entity;
use crate::names::Namespace;
use crate::polyfill::Polyfill;
use crate::state::{ExprState, Root};
use crate::types::{literal, scalar_name};
use crate::writer::GlobalForm;
use crate::Error;

pub(crate) const COMPONENTS: [&str; 4] = ["x", "y", "z", "w"];

/// Component-wise comparison builtin for vector operands.
fn vector_comparison(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Equal => "equal",
        BinaryOp::NotEqual => "notEqual",
        BinaryOp::Less => "lessThan",
        BinaryOp::LessEqual => "lessThanEqual",
        BinaryOp::Greater => "greaterThan",
        BinaryOp::GreaterEqual => "greaterThanEqual",
        _ => return None,
    })
}

/// Strips one pair of parentheses enclosing all of `text`.
pub(crate) fn unparenthesized(text: &str) -> &str {
    let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
        return text;
    };
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return text;
                }
            }
            _ => {}
        }
    }
    if depth == 0 { inner } else { text }
}

/// The variable a pointer expression points into.
pub(crate) fn pointer_root(func: &Function, mut pointer: Handle<Expression>) -> Option<Root> {
    loop {
        match *func.expressions.try_get(pointer)? {
            Expression::Access { base, .. } | Expression::AccessIndex { base, .. } => {
                pointer = base;
            }
            Expression::LocalVariable(l) => return Some(Root::Local(l)),
            Expression::GlobalVariable(g) => return Some(Root::Global(g)),
            Expression::FunctionArgument(i) => return Some(Root::Argument(i)),
            _ => return None,
        }
    }
}

fn float_literal(scalar: Scalar, value: f64) -> Result<String, Error> {
    match scalar.width {
        2 => Ok(literal(Literal::F16(value as f32))),
        4 => Ok(literal(Literal::F32(value as f32))),
        8 => Ok(literal(Literal::F64(value))),
        width => Err(Error::Unsupported(format!("float of width {width}"))),
    }
}

impl<'a> Compiler<'a> {
    pub(crate) fn current_key(&self) -> Result<FunctionKey, Error> {
        self.current
            .ok_or_else(|| Error::Unsupported("expression outside a function".into()))
    }

    pub(crate) fn current_function(
        &self,
    ) -> Result<(&'a Function, &'a FunctionInfo, FunctionKey), Error> {
        let key = self.current_key()?;
        let module = self.module;
        let analyses = self.analyses;
        Ok((module.function(key)?, analyses.function(key)?, key))
    }

    pub(crate) fn inner_of(
        &self,
        info: &'a FunctionInfo,
        h: Handle<Expression>,
    ) -> Result<&'a TypeInner, Error> {
        let module = self.module;
        info.typifier
            .inner(module, h)
            .ok_or_else(|| Error::Unsupported(format!("{h:?} has no type")))
    }

    fn type_of(&self, info: &FunctionInfo, h: Handle<Expression>) -> Result<String, Error> {
        let resolved = info
            .typifier
            .get(h)
            .ok_or_else(|| Error::Unsupported(format!("{h:?} has no type")))?;
        self.resolution_name(&resolved.ty)
    }

    pub(crate) fn set_state(&mut self, h: Handle<Expression>, state: ExprState) {
        if let Some(slot) = self.pass.exprs.get_mut(h.index()) {
            *slot = state;
        }
    }

    /// The text of `h` at a use site.
    pub(crate) fn expr(&mut self, h: Handle<Expression>) -> Result<String, Error> {
        let key = self.current_key()?;
        match self.pass.exprs.get(h.index()).cloned().unwrap_or_default() {
            ExprState::Baked(name) => Ok(name),
            ExprState::Forwarded {
                text,
                roots,
                loop_depth,
                valid,
            } => {
                if !valid || (!roots.is_empty() && self.pass.loop_depth > loop_depth) {
                    self.force_temporary(key, h);
                }
                Ok(text)
            }
            ExprState::Pending => self.build(h),
        }
    }

    pub(crate) fn expr_list(&mut self, list: &[Handle<Expression>]) -> Result<String, Error> {
        let mut parts = Vec::with_capacity(list.len());
        for &h in list {
            parts.push(self.expr(h)?);
        }
        Ok(parts.join(", "))
    }

    /// Handles `h` at its `Emit` point.
    pub(crate) fn emit_expression(&mut self, h: Handle<Expression>) -> Result<(), Error> {
        let (func, info, key) = self.current_function()?;
        let expr = func.expressions.fetch(h)?;
        // References are spelled again at every use.
        if expr.is_statement_result() || info.typifier.is_pointer(h) {
            return Ok(());
        }
        let named = func.named_expressions.contains_key(&h);
        let uses = info.usage.count(h);
        if uses == 0 && !named {
            return Ok(());
        }
        let forced = self.sticky.forced_temporaries.contains(&(key, h));
        let text = self.build(h)?;
        let state = if named || forced || (uses > 1 && !expr.is_trivial()) {
            ExprState::Baked(self.bake(h, &text)?)
        } else {
            ExprState::Forwarded {
                roots: self.roots(func, h),
                text,
                loop_depth: self.pass.loop_depth,
                valid: true,
            }
        };
        self.set_state(h, state);
        Ok(())
    }

    fn roots(&self, func: &Function, h: Handle<Expression>) -> BTreeSet<Root> {
        match self.pass.exprs.get(h.index()) {
            Some(ExprState::Baked(_)) => BTreeSet::new(),
            Some(ExprState::Forwarded { roots, .. }) => roots.clone(),
            _ => match func.expressions.try_get(h) {
                Some(&Expression::LocalVariable(l)) => BTreeSet::from([Root::Local(l)]),
                Some(&Expression::GlobalVariable(g)) => BTreeSet::from([Root::Global(g)]),
                Some(&Expression::FunctionArgument(i)) => BTreeSet::from([Root::Argument(i)]),
                Some(expr) => expression_operands(expr)
                    .into_iter()
                    .flat_map(|op| self.roots(func, op))
                    .collect(),
                None => BTreeSet::new(),
            },
        }
    }

    /// Marks inlined text that read any root matching `hit` as stale.
    pub(crate) fn invalidate(&mut self, hit: impl Fn(Root) -> bool) {
        for state in &mut self.pass.exprs {
            if let ExprState::Forwarded { roots, valid, .. } = state
                && roots.iter().any(|&r| hit(r))
            {
                *valid = false;
            }
        }
    }

    pub(crate) fn invalidate_store(&mut self, pointer: Handle<Expression>) -> Result<(), Error> {
        let (func, _, _) = self.current_function()?;
        match pointer_root(func, pointer) {
            Some(root) => self.invalidate(|r| r == root),
            // Physical pointers may alias any buffer.
            None => self.invalidate(|r| matches!(r, Root::Global(_))),
        }
        Ok(())
    }

    pub(crate) fn temporary_name(&mut self, h: Handle<Expression>) -> Result<String, Error> {
        let (func, _, key) = self.current_function()?;
        let ns = Namespace::Local(self.id(Entity::Function(key)));
        let proposed = func.named_expressions.get(&h).map(String::as_str);
        Ok(self.reserve_name(Entity::Expression(key, h), proposed, ns, false))
    }

    /// Declares a temporary holding `text` and returns its name.
    pub(crate) fn bake(&mut self, h: Handle<Expression>, text: &str) -> Result<String, Error> {
        let (_, info, _) = self.current_function()?;
        let name = self.temporary_name(h)?;
        let resolved = info
            .typifier
            .get(h)
            .ok_or_else(|| Error::Unsupported(format!("{h:?} has no type")))?;
        let decl = self.resolution_declaration(&resolved.ty, &name)?;
        self.pass.line(&format!("{decl} = {text};"));
        Ok(name)
    }

    pub(crate) fn global_text(&self, g: Handle<GlobalVariable>) -> Result<String, Error> {
        let var = self.module.global_variables.fetch(g)?;
        match self.form(g)? {
            GlobalForm::Builtin(builtin) => {
                Ok(builtin_name(builtin, var.space, self.options).to_string())
            }
            GlobalForm::FragData(location) => Ok(format!("gl_FragData[{location}]")),
            GlobalForm::FlattenedIo => Err(Error::Unsupported(format!(
                "whole use of flattened interface block `{}`",
                var.name.as_deref().unwrap_or("_")
            ))),
            _ => self.name_of(Entity::Global(g)),
        }
    }

    /// For a builtin GLSL declares `int` that the IR treats as `uint` (or
    /// the other way round): the IR type and the GLSL kind.
    pub(crate) fn builtin_mismatch(
        &self,
        pointer: Handle<Expression>,
    ) -> Result<Option<(Handle<Type>, ScalarKind)>, Error> {
        let (func, _, _) = self.current_function()?;
        let Expression::GlobalVariable(g) = *func.expressions.fetch(pointer)? else {
            return Ok(None);
        };
        let GlobalForm::Builtin(builtin) = self.form(g)? else {
            return Ok(None);
        };
        let Some(kind) = builtin_kind(builtin, self.options) else {
            return Ok(None);
        };
        let var = self.module.global_variables.fetch(g)?;
        match self.module.types.fetch(var.ty)?.inner.scalar() {
            Some(scalar) if scalar.kind != kind => Ok(Some((var.ty, kind))),
            _ => Ok(None),
        }
    }

    /// Spells `h` from its operands.
    fn build(&mut self, h: Handle<Expression>) -> Result<String, Error> {
        let (func, info, key) = self.current_function()?;
        let ns = Namespace::Local(self.id(Entity::Function(key)));
        Ok(match *func.expressions.fetch(h)? {
            Expression::Literal(lit) => literal(lit),
            Expression::Constant(c) => self.constant_text(c)?,
            Expression::ZeroValue(ty) => self.zero_value(ty)?,
            Expression::Compose { ty, ref components } => {
                let parts = self.expr_list(components)?;
                format!("{}({parts})", self.type_name(ty)?)
            }
            Expression::FunctionArgument(i) => {
                let name = func.arguments.get(i as usize).and_then(|a| a.name.as_deref());
                self.reserve_name(Entity::Argument(key, i), name, ns, false)
            }
            Expression::GlobalVariable(g) => self.global_text(g)?,
            Expression::LocalVariable(l) => {
                let name = func.local_variables.fetch(l)?.name.as_deref();
                self.reserve_name(Entity::Local(key, l), name, ns, false)
            }
            Expression::Load { pointer } => self.load(func, pointer)?,
            Expression::Access { base, index } => {
                let base = self.expr(base)?;
                let index = self.expr(index)?;
                format!("{base}[{}]", unparenthesized(&index))
            }
            Expression::AccessIndex { base, index } => {
                self.access_index(func, info, base, index)?
            }
            Expression::Swizzle {
                size,
                vector,
                pattern,
            } => {
                let vector = self.expr(vector)?;
                let components: String = pattern[..size as usize]
                    .iter()
                    .map(|&c| COMPONENTS[c as usize])
                    .collect();
                format!("{vector}.{components}")
            }
            Expression::Splat { value, .. } => {
                let value = self.expr(value)?;
                format!("{}({value})", self.type_of(info, h)?)
            }
            Expression::Unary { op, expr } => {
                let operand = self.expr(expr)?;
                match op {
                    UnaryOp::Negate => format!("(-{operand})"),
                    UnaryOp::LogicalNot => match self.inner_of(info, expr)? {
                        TypeInner::Vector { .. } => format!("not({operand})"),
                        _ => format!("(!{operand})"),
                    },
                    UnaryOp::BitwiseNot => {
                        self.require(Trigger::IntegerOps)?;
                        format!("(~{operand})")
                    }
                }
            }
            Expression::Binary { op, left, right } => self.binary(info, op, left, right)?,
            Expression::Select {
                condition,
                accept,
                reject,
            } => {
                let c = self.expr(condition)?;
                let a = self.expr(accept)?;
                let b = self.expr(reject)?;
                match *self.inner_of(info, condition)? {
                    TypeInner::Vector { size, .. } => {
                        let parts = COMPONENTS[..size as usize]
                            .iter()
                            .map(|x| format!("{c}.{x} ? {a}.{x} : {b}.{x}"))
                            .collect::<Vec<_>>();
                        format!("{}({})", self.type_of(info, h)?, parts.join(", "))
                    }
                    _ => format!("({c} ? {a} : {b})"),
                }
            }
            Expression::Derivative {
                axis,
                control,
                expr,
            } => {
                let operand = self.expr(expr)?;
                self.require(Trigger::StandardDerivatives)?;
                let suffix = match control {
                    DerivativeControl::Coarse => "Coarse",
                    DerivativeControl::Fine => "Fine",
                    DerivativeControl::None => "",
                };
                if !suffix.is_empty() {
                    self.require(Trigger::DerivativeControl)?;
                }
                let base = match axis {
                    DerivativeAxis::X => "dFdx",
                    DerivativeAxis::Y => "dFdy",
                    DerivativeAxis::Width => "fwidth",
                };
                format!("{base}{suffix}({operand})")
            }
            Expression::Relational { fun, argument } => {
                let operand = self.expr(argument)?;
                let scalar = matches!(self.inner_of(info, argument)?, TypeInner::Scalar(_));
                match fun {
                    RelationalFunction::All if scalar => operand,
                    RelationalFunction::Any if scalar => operand,
                    RelationalFunction::All => format!("all({operand})"),
                    RelationalFunction::Any => format!("any({operand})"),
                    RelationalFunction::IsNan => format!("isnan({operand})"),
                    RelationalFunction::IsInf => format!("isinf({operand})"),
                }
            }
            Expression::Math {
                fun,
                arg,
                arg1,
                arg2,
                arg3,
            } => self.math(info, h, fun, [Some(arg), arg1, arg2, arg3])?,
            Expression::As {
                expr,
                kind,
                convert,
            } => self.cast(info, h, expr, kind, convert)?,
            Expression::ArrayLength(array) => {
                let array = self.expr(array)?;
                format!("uint({array}.length())")
            }
            Expression::CallResult(_)
            | Expression::AtomicResult { .. }
            | Expression::SubgroupResult { .. } => {
                return Err(Error::Unsupported(format!(
                    "{h:?} used before the statement producing it"
                )));
            }
        })
    }

    fn load(&mut self, func: &Function, pointer: Handle<Expression>) -> Result<String, Error> {
        let text = self.expr(pointer)?;
        if let Some((ty, _)) = self.builtin_mismatch(pointer)? {
            return Ok(format!("{}({text})", self.type_name(ty)?));
        }
        // A block instance is not a value; rebuild it member by member.
        if let Expression::GlobalVariable(g) = *func.expressions.fetch(pointer)?
            && matches!(self.form(g)?, GlobalForm::Block { .. } | GlobalForm::IoBlock)
        {
            let ty = self.module.global_variables.fetch(g)?.ty;
            if let TypeInner::Struct { ref members, .. } = self.module.types.fetch(ty)?.inner {
                let fields = (0u32..)
                    .zip(members)
                    .map(|(i, _)| {
                        Ok(format!("{text}.{}", self.member_name_of(Entity::Type(ty), i)?))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                return Ok(format!("{}({})", self.struct_name(ty)?, fields.join(", ")));
            }
        }
        Ok(text)
    }

    fn access_index(
        &mut self,
        func: &Function,
        info: &'a FunctionInfo,
        base: Handle<Expression>,
        index: u32,
    ) -> Result<String, Error> {
        if let Expression::GlobalVariable(g) = *func.expressions.fetch(base)?
            && matches!(self.form(g)?, GlobalForm::FlattenedIo)
        {
            return self.member_name_of(Entity::Global(g), index);
        }
        let text = self.expr(base)?;
        let module = self.module;
        let resolved = info
            .typifier
            .get(base)
            .ok_or_else(|| Error::Unsupported(format!("{base:?} has no type")))?;
        let (mut handle, mut inner) = match resolved.ty {
            TypeResolution::Handle(ty) => (Some(ty), &module.types.fetch(ty)?.inner),
            TypeResolution::Value(ref inner) => (None, inner),
        };
        // Member access through a physical pointer dereferences it.
        if let TypeInner::Pointer { base: pointee, .. } = *inner {
            handle = Some(pointee);
            inner = &module.types.fetch(pointee)?.inner;
        }
        Ok(match (inner, handle) {
            (TypeInner::Struct { .. }, Some(ty)) => {
                format!("{text}.{}", self.member_name_of(Entity::Type(ty), index)?)
            }
            (TypeInner::Vector { .. }, _) => {
                let component = COMPONENTS.get(index as usize).ok_or_else(|| {
                    Error::Unsupported(format!("vector component {index} out of range"))
                })?;
                format!("{text}.{component}")
            }
            _ => format!("{text}[{index}]"),
        })
    }

    fn binary(
        &mut self,
        info: &'a FunctionInfo,
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<String, Error> {
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        let left_inner = self.inner_of(info, left)?;
        let right_inner = self.inner_of(info, right)?;
        let size = match (left_inner, right_inner) {
            (&TypeInner::Vector { size, .. }, _) | (_, &TypeInner::Vector { size, .. }) => {
                Some(size)
            }
            _ => None,
        };
        let float = left_inner
            .scalar()
            .is_some_and(|s| s.kind == ScalarKind::Float);
        let symbol = op.symbol();

        if let Some(size) = size {
            if let Some(function) = vector_comparison(op) {
                return Ok(format!("{function}({l}, {r})"));
            }
            if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
                let parts = COMPONENTS[..size as usize]
                    .iter()
                    .map(|x| format!("{l}.{x} {symbol} {r}.{x}"))
                    .collect::<Vec<_>>();
                return Ok(format!("bvec{}({})", size as u32, parts.join(", ")));
            }
        }
        Ok(match op {
            // GLSL's `mod` floors; the IR truncates like C's fmod.
            BinaryOp::Modulo if float => format!("({l} - {r} * trunc({l} / {r}))"),
            BinaryOp::Modulo
            | BinaryOp::BitwiseAnd
            | BinaryOp::BitwiseOr
            | BinaryOp::BitwiseXor
            | BinaryOp::ShiftLeft
            | BinaryOp::ShiftRight => {
                self.require(Trigger::IntegerOps)?;
                format!("({l} {symbol} {r})")
            }
            _ => format!("({l} {symbol} {r})"),
        })
    }

    fn math(
        &mut self,
        info: &'a FunctionInfo,
        h: Handle<Expression>,
        fun: MathFunction,
        args: [Option<Handle<Expression>>; 4],
    ) -> Result<String, Error> {
        use MathFunction as M;

        let mut texts = Vec::new();
        for arg in args.into_iter().flatten() {
            texts.push(self.expr(arg)?);
        }
        let first = args[0].ok_or_else(|| Error::Unsupported("math without operands".into()))?;
        let arg_inner = self.inner_of(info, first)?;
        let scalar = arg_inner.scalar();
        let is_float = scalar.is_some_and(|s| s.kind == ScalarKind::Float);
        let size = match *arg_inner {
            TypeInner::Vector { size, .. } => Some(size),
            _ => None,
        };
        let joined = texts.join(", ");
        let options = self.options;

        let name = match fun {
            M::Abs => "abs",
            M::Min => "min",
            M::Max => "max",
            M::Clamp => "clamp",
            M::Saturate => {
                let scalar = scalar.ok_or_else(|| Error::Unsupported("saturate of a composite".into()))?;
                let zero = float_literal(scalar, 0.0)?;
                let one = float_literal(scalar, 1.0)?;
                return Ok(format!("clamp({joined}, {zero}, {one})"));
            }
            M::NMin | M::NMax | M::NClamp if is_float => {
                let Some(scalar) = scalar else {
                    return Err(Error::Unsupported("NaN-aware min of a composite".into()));
                };
                let polyfill = match fun {
                    M::NMin => Polyfill::NMin { scalar, size },
                    M::NMax => Polyfill::NMax { scalar, size },
                    _ => Polyfill::NClamp { scalar, size },
                };
                self.require_polyfill(polyfill);
                polyfill.helper_name()
            }
            M::NMin => "min",
            M::NMax => "max",
            M::NClamp => "clamp",
            M::Sign => "sign",
            M::Floor => "floor",
            M::Ceil => "ceil",
            M::Round => "roundEven",
            M::Fract => "fract",
            M::Trunc => "trunc",
            M::Sin => "sin",
            M::Cos => "cos",
            M::Tan => "tan",
            M::Asin => "asin",
            M::Acos => "acos",
            M::Atan | M::Atan2 => "atan",
            M::Sinh => "sinh",
            M::Cosh => "cosh",
            M::Tanh => "tanh",
            M::Sqrt => "sqrt",
            M::InverseSqrt => "inversesqrt",
            M::Log => "log",
            M::Log2 => "log2",
            M::Exp => "exp",
            M::Exp2 => "exp2",
            M::Pow => "pow",
            M::Dot => "dot",
            M::Cross => "cross",
            M::Normalize => "normalize",
            M::Length => "length",
            M::Distance => "distance",
            M::Transpose => match *arg_inner {
                TypeInner::Matrix { columns, rows, .. } if !options.at_least(120, 300) => {
                    let polyfill = Polyfill::Transpose { columns, rows };
                    self.require_polyfill(polyfill);
                    polyfill.helper_name()
                }
                _ => "transpose",
            },
            M::Inverse => match *arg_inner {
                TypeInner::Matrix { columns, .. } if !options.at_least(140, 300) => {
                    let polyfill = Polyfill::Inverse(columns);
                    self.require_polyfill(polyfill);
                    polyfill.helper_name()
                }
                _ => "inverse",
            },
            M::Determinant => match *arg_inner {
                TypeInner::Matrix { columns, .. } if !options.at_least(150, 300) => {
                    let polyfill = Polyfill::Determinant(columns);
                    self.require_polyfill(polyfill);
                    polyfill.helper_name()
                }
                _ => "determinant",
            },
            M::Mix => "mix",
            M::Step => "step",
            M::SmoothStep => "smoothstep",
            M::Fma => {
                if is_float && self.require_optional(Trigger::FusedMultiplyAdd) {
                    "fma"
                } else {
                    let [a, b, c] = texts.as_slice() else {
                        return Err(Error::Unsupported("fma needs three operands".into()));
                    };
                    return Ok(format!("(({a} * {b}) + {c})"));
                }
            }
            M::CountOneBits | M::FindLsb | M::FindMsb => {
                self.require(Trigger::BitOps)?;
                let name = match fun {
                    M::CountOneBits => "bitCount",
                    M::FindLsb => "findLSB",
                    _ => "findMSB",
                };
                // These return signed integers whatever the operand.
                let call = format!("{name}({joined})");
                return Ok(if scalar.is_some_and(|s| s.kind == ScalarKind::Uint) {
                    format!("{}({call})", self.type_of(info, h)?)
                } else {
                    call
                });
            }
            M::ReverseBits => {
                self.require(Trigger::BitOps)?;
                "bitfieldReverse"
            }
            M::ExtractBits | M::InsertBits => {
                self.require(Trigger::BitOps)?;
                // Offset and count are `int` in GLSL.
                let count = texts.len();
                let mut parts = texts;
                for part in parts.iter_mut().skip(count.saturating_sub(2)) {
                    *part = format!("int({part})");
                }
                let name = if fun == M::ExtractBits {
                    "bitfieldExtract"
                } else {
                    "bitfieldInsert"
                };
                return Ok(format!("{name}({})", parts.join(", ")));
            }
            M::Pack4x8Snorm
            | M::Pack4x8Unorm
            | M::Unpack4x8Snorm
            | M::Unpack4x8Unorm => {
                self.require(Trigger::Packing4x8)?;
                match fun {
                    M::Pack4x8Snorm => "packSnorm4x8",
                    M::Pack4x8Unorm => "packUnorm4x8",
                    M::Unpack4x8Snorm => "unpackSnorm4x8",
                    _ => "unpackUnorm4x8",
                }
            }
            M::Pack2x16Snorm
            | M::Pack2x16Unorm
            | M::Pack2x16Float
            | M::Unpack2x16Snorm
            | M::Unpack2x16Unorm
            | M::Unpack2x16Float => {
                self.require(Trigger::Packing2x16)?;
                match fun {
                    M::Pack2x16Snorm => "packSnorm2x16",
                    M::Pack2x16Unorm => "packUnorm2x16",
                    M::Pack2x16Float => "packHalf2x16",
                    M::Unpack2x16Snorm => "unpackSnorm2x16",
                    M::Unpack2x16Unorm => "unpackUnorm2x16",
                    _ => "unpackHalf2x16",
                }
            }
        };
        Ok(format!("{name}({joined})"))
    }

    fn cast(
        &mut self,
        info: &'a FunctionInfo,
        h: Handle<Expression>,
        expr: Handle<Expression>,
        kind: ScalarKind,
        convert: Option<u8>,
    ) -> Result<String, Error> {
        use ScalarKind as K;

        let operand = self.expr(expr)?;
        let source = self
            .inner_of(info, expr)?
            .scalar()
            .ok_or_else(|| Error::Unsupported("conversion of a composite".into()))?;
        let target = self.type_of(info, h)?;

        let Some(width) = convert else {
            if source.kind == kind {
                return Ok(operand);
            }
            let function = match (source.kind, kind, source.width) {
                (K::Float, K::Sint, 4) => "floatBitsToInt",
                (K::Float, K::Uint, 4) => "floatBitsToUint",
                (K::Sint, K::Float, 4) => "intBitsToFloat",
                (K::Uint, K::Float, 4) => "uintBitsToFloat",
                (K::Float, K::Sint, 8) => "doubleBitsToInt64",
                (K::Float, K::Uint, 8) => "doubleBitsToUint64",
                (K::Sint, K::Float, 8) => "int64BitsToDouble",
                (K::Uint, K::Float, 8) => "uint64BitsToDouble",
                (K::Float, K::Sint, 2) => "float16BitsToInt16",
                (K::Float, K::Uint, 2) => "float16BitsToUint16",
                (K::Sint, K::Float, 2) => "int16BitsToFloat16",
                (K::Uint, K::Float, 2) => "uint16BitsToFloat16",
                (K::Sint | K::Uint, K::Sint | K::Uint, _) => {
                    return Ok(format!("{target}({operand})"));
                }
                (from, to, width) => {
                    return Err(Error::Unsupported(format!(
                        "bit cast from {from:?} to {to:?} at width {width}"
                    )));
                }
            };
            if source.width == 4 {
                self.require(Trigger::FloatBitcast)?;
            }
            return Ok(format!("{function}({operand})"));
        };

        if source.kind == kind && source.width == width {
            Ok(operand)
        } else {
            // Make sure the target scalar is spellable before using it.
            scalar_name(Scalar { kind, width })?;
            Ok(format!("{target}({operand})"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_enclosing_parentheses() {
        assert_eq!(unparenthesized("(a < b)"), "a < b");
        assert_eq!(unparenthesized("(a) + (b)"), "(a) + (b)");
        assert_eq!(unparenthesized("((a))"), "(a)");
        assert_eq!(unparenthesized("f(x)"), "f(x)");
    }

    #[test]
    fn comparisons_have_vector_forms() {
        assert_eq!(vector_comparison(BinaryOp::Less), Some("lessThan"));
        assert_eq!(vector_comparison(BinaryOp::Add), None);
        assert_eq!(BinaryOp::ShiftRight.symbol(), ">>");
    }

    #[test]
    fn float_literals_follow_width() {
        assert_eq!(float_literal(Scalar::F32, 1.0).unwrap(), "1.0");
        assert_eq!(float_literal(Scalar::F64, 0.0).unwrap(), "0.0lf");
        assert_eq!(float_literal(Scalar::F16, 1.0).unwrap(), "1.0hf");
    }
}
