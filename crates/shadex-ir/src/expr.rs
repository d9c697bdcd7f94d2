//! Expressions: values computed from other values.

use crate::arena::Handle;
use crate::types::{Bytes, Scalar, ScalarKind, Type, VectorSize};

/// A vector swizzle component.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum SwizzleComponent {
    X = 0,
    Y = 1,
    Z = 2,
    W = 3,
}

/// A literal constant value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    /// A half-precision value, stored widened.
    F16(f32),
    F32(f32),
    F64(f64),
}

impl Literal {
    /// Returns the scalar type of this literal.
    pub fn scalar(&self) -> Scalar {
        match *self {
            Self::Bool(_) => Scalar::BOOL,
            Self::I32(_) => Scalar::I32,
            Self::U32(_) => Scalar::U32,
            Self::I64(_) => Scalar::I64,
            Self::U64(_) => Scalar::U64,
            Self::F16(_) => Scalar::F16,
            Self::F32(_) => Scalar::F32,
            Self::F64(_) => Scalar::F64,
        }
    }

    /// Returns the value as a non-negative `u32`, if it is an integer that fits.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::I32(v) => u32::try_from(v).ok(),
            Self::U32(v) => Some(v),
            Self::I64(v) => u32::try_from(v).ok(),
            Self::U64(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    /// The zero literal of a scalar type.
    pub fn zero(scalar: Scalar) -> Option<Self> {
        Some(match (scalar.kind, scalar.width) {
            (ScalarKind::Bool, _) => Self::Bool(false),
            (ScalarKind::Sint, 4) => Self::I32(0),
            (ScalarKind::Sint, 8) => Self::I64(0),
            (ScalarKind::Uint, 4) => Self::U32(0),
            (ScalarKind::Uint, 8) => Self::U64(0),
            (ScalarKind::Float, 2) => Self::F16(0.0),
            (ScalarKind::Float, 4) => Self::F32(0.0),
            (ScalarKind::Float, 8) => Self::F64(0.0),
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitwiseNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::LogicalNot => "!",
            Self::BitwiseNot => "~",
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    /// The infix operator shared by WGSL and GLSL.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
        }
    }

    /// Comparisons produce booleans of the operand shape.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }
}

/// A built-in math function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum MathFunction {
    // Component-wise
    Abs,
    Min,
    Max,
    Clamp,
    Saturate,
    /// `min` returning the non-NaN operand.
    NMin,
    NMax,
    NClamp,
    Sign,
    // Rounding
    Floor,
    Ceil,
    Round,
    Fract,
    Trunc,
    // Trigonometric
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    // Exponential
    Sqrt,
    InverseSqrt,
    Log,
    Log2,
    Exp,
    Exp2,
    Pow,
    // Linear algebra
    Dot,
    Cross,
    Normalize,
    Length,
    Distance,
    Transpose,
    Inverse,
    Determinant,
    // Interpolation
    Mix,
    Step,
    SmoothStep,
    Fma,
    // Bits
    CountOneBits,
    ReverseBits,
    FindLsb,
    FindMsb,
    ExtractBits,
    InsertBits,
    // Packing
    Pack4x8Snorm,
    Pack4x8Unorm,
    Pack2x16Snorm,
    Pack2x16Unorm,
    Pack2x16Float,
    Unpack4x8Snorm,
    Unpack4x8Unorm,
    Unpack2x16Snorm,
    Unpack2x16Unorm,
    Unpack2x16Float,
}

/// A boolean reduction or classification.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum RelationalFunction {
    All,
    Any,
    IsNan,
    IsInf,
}

/// Screen-space derivative direction.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DerivativeAxis {
    X,
    Y,
    /// `abs(dFdx) + abs(dFdy)`.
    Width,
}

/// Precision hint of a derivative.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DerivativeControl {
    Coarse,
    Fine,
    None,
}

/// An atomic read-modify-write operation.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AtomicFunction {
    Add,
    Subtract,
    And,
    ExclusiveOr,
    InclusiveOr,
    Min,
    Max,
    Exchange { compare: Option<Handle<Expression>> },
}

/// Reduction operator of a subgroup collective operation.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum CollectiveOp {
    Add,
    Mul,
    Min,
    Max,
    And,
    Or,
    Xor,
}

/// A cross-invocation operation within a subgroup.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum SubgroupOperation {
    Elect,
    All,
    Any,
    AllEqual,
    Ballot,
    InverseBallot,
    BallotBitCount,
    BroadcastFirst,
    /// Reads the value from the invocation named by the `index` operand.
    Broadcast,
    Shuffle,
    ShuffleXor,
    Reduce(CollectiveOp),
    InclusiveScan(CollectiveOp),
    ExclusiveScan(CollectiveOp),
}

/// An expression in the IR.
///
/// Expressions live in per-function arenas and are referenced by
/// [`Handle<Expression>`]. Values produced by statements (calls, atomics,
/// subgroup operations) appear as `*Result` expressions.
#[derive(Clone, Debug)]
pub enum Expression {
    Literal(Literal),
    /// Reference to a module-scope constant.
    Constant(Handle<crate::Constant>),
    /// A zero value of the given type.
    ZeroValue(Handle<Type>),
    Compose {
        ty: Handle<Type>,
        components: Vec<Handle<Expression>>,
    },
    /// Reference to a function argument by index.
    FunctionArgument(u32),
    /// Pointer to a global variable.
    GlobalVariable(Handle<crate::GlobalVariable>),
    /// Pointer to a local variable.
    LocalVariable(Handle<crate::LocalVariable>),
    Load {
        pointer: Handle<Expression>,
    },
    /// Dynamic index into an array, vector or matrix.
    Access {
        base: Handle<Expression>,
        index: Handle<Expression>,
    },
    /// Constant index into a composite, including struct members.
    AccessIndex {
        base: Handle<Expression>,
        index: u32,
    },
    Swizzle {
        size: VectorSize,
        vector: Handle<Expression>,
        pattern: [SwizzleComponent; 4],
    },
    Splat {
        size: VectorSize,
        value: Handle<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Handle<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
    Select {
        condition: Handle<Expression>,
        accept: Handle<Expression>,
        reject: Handle<Expression>,
    },
    Derivative {
        axis: DerivativeAxis,
        control: DerivativeControl,
        expr: Handle<Expression>,
    },
    Relational {
        fun: RelationalFunction,
        argument: Handle<Expression>,
    },
    Math {
        fun: MathFunction,
        arg: Handle<Expression>,
        arg1: Option<Handle<Expression>>,
        arg2: Option<Handle<Expression>>,
        arg3: Option<Handle<Expression>>,
    },
    /// Conversion (`convert: Some(width)`) or bitcast (`None`).
    As {
        expr: Handle<Expression>,
        kind: ScalarKind,
        convert: Option<Bytes>,
    },
    /// Length of a runtime-sized array reached through a pointer.
    ArrayLength(Handle<Expression>),
    CallResult(Handle<crate::Function>),
    AtomicResult {
        ty: Handle<Type>,
        comparison: bool,
    },
    SubgroupResult {
        ty: Handle<Type>,
    },
}

impl Expression {
    /// Returns `true` for expressions that are produced by a statement
    /// rather than by an `Emit` range.
    pub fn is_statement_result(&self) -> bool {
        matches!(
            self,
            Self::CallResult(_) | Self::AtomicResult { .. } | Self::SubgroupResult { .. }
        )
    }

    /// Returns `true` for expressions that are free to evaluate anywhere
    /// and are never worth a temporary.
    pub fn is_trivial(&self) -> bool {
        matches!(
            self,
            Self::Literal(_)
                | Self::Constant(_)
                | Self::FunctionArgument(_)
                | Self::GlobalVariable(_)
                | Self::LocalVariable(_)
        )
    }
}
