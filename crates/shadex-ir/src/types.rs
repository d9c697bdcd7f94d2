//! Type system and struct member layout records.

use crate::arena::Handle;
use crate::constant::Constant;

/// Width of a scalar type in bytes.
pub type Bytes = u8;

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    Bool,
    Sint,
    Uint,
    Float,
}

/// A scalar type: kind + byte width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        width: 1,
    };
    pub const I8: Self = Self {
        kind: ScalarKind::Sint,
        width: 1,
    };
    pub const U8: Self = Self {
        kind: ScalarKind::Uint,
        width: 1,
    };
    pub const I16: Self = Self {
        kind: ScalarKind::Sint,
        width: 2,
    };
    pub const U16: Self = Self {
        kind: ScalarKind::Uint,
        width: 2,
    };
    pub const F16: Self = Self {
        kind: ScalarKind::Float,
        width: 2,
    };
    pub const I32: Self = Self {
        kind: ScalarKind::Sint,
        width: 4,
    };
    pub const U32: Self = Self {
        kind: ScalarKind::Uint,
        width: 4,
    };
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        width: 4,
    };
    pub const I64: Self = Self {
        kind: ScalarKind::Sint,
        width: 8,
    };
    pub const U64: Self = Self {
        kind: ScalarKind::Uint,
        width: 8,
    };
    pub const F64: Self = Self {
        kind: ScalarKind::Float,
        width: 8,
    };

    /// Returns `true` for signed and unsigned integers.
    pub fn is_integer(self) -> bool {
        matches!(self.kind, ScalarKind::Sint | ScalarKind::Uint)
    }
}

/// Number of components in a vector, or rows/columns of a matrix.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum VectorSize {
    Bi = 2,
    Tri = 3,
    Quad = 4,
}

impl VectorSize {
    pub fn from_u32(n: u32) -> Option<Self> {
        match n {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }
}

/// Storage order of a matrix inside a buffer block.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum MatrixMajor {
    #[default]
    Column,
    Row,
}

/// Element count of an array type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ArraySize {
    /// A literal element count.
    Literal(u32),
    /// The count is the value of a (possibly specialization) constant.
    Constant(Handle<Constant>),
    /// Runtime-sized; only legal as the last member of a buffer block.
    Dynamic,
}

/// Offset and matrix decorations recorded for one struct member.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct MemberLayout {
    /// Declared byte offset from the start of the struct.
    pub offset: Option<u32>,
    /// Declared stride between matrix columns (or rows when row-major).
    pub matrix_stride: Option<u32>,
    pub major: MatrixMajor,
    /// The source spelled out `layout(offset = N)` for this member.
    pub explicit_offset: bool,
}

/// A member of a struct type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StructMember {
    pub name: Option<String>,
    pub ty: Handle<Type>,
    pub layout: MemberLayout,
}

/// A named type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub name: Option<String>,
    pub inner: TypeInner,
}

/// The concrete shape of a type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum TypeInner {
    Scalar(Scalar),
    Vector {
        size: VectorSize,
        scalar: Scalar,
    },
    /// A matrix of `columns` column vectors with `rows` components each.
    Matrix {
        columns: VectorSize,
        rows: VectorSize,
        scalar: Scalar,
    },
    Atomic(Scalar),
    /// A pointer into an address space. Only `PhysicalStorage` pointers
    /// can be stored inside structs.
    Pointer {
        base: Handle<Type>,
        space: crate::AddressSpace,
    },
    /// An array; `stride` is the decorated array stride, 0 when undecorated.
    Array {
        base: Handle<Type>,
        size: ArraySize,
        stride: u32,
    },
    /// A struct; `is_block` marks a top-level interface or buffer block.
    Struct {
        members: Vec<StructMember>,
        is_block: bool,
    },
}

impl TypeInner {
    /// The scalar component type of scalars, vectors, matrices and atomics.
    pub fn scalar(&self) -> Option<Scalar> {
        match *self {
            Self::Scalar(s) | Self::Atomic(s) => Some(s),
            Self::Vector { scalar, .. } | Self::Matrix { scalar, .. } => Some(scalar),
            _ => None,
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Self::Struct { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    /// Returns `true` for a pointer into physical storage buffer memory.
    pub fn is_physical_pointer(&self) -> bool {
        matches!(
            self,
            Self::Pointer {
                space: crate::AddressSpace::PhysicalStorage,
                ..
            }
        )
    }
}
