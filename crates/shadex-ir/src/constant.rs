//! Module-scope constants and specialization constants.

use crate::arena::{Arena, Handle};
use crate::expr::{BinaryOp, Literal};
use crate::types::Type;

/// The value of a [`Constant`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Scalar(Literal),
    /// A vector, matrix, array or struct built from other constants.
    Composite(Vec<Handle<Constant>>),
    /// The zero value of the constant's type.
    Zero,
    /// A specialization-constant expression that is only evaluated when
    /// the pipeline is created. Array sizes that depend on one cannot be
    /// resolved at compile time.
    SpecOp {
        op: BinaryOp,
        left: Handle<Constant>,
        right: Handle<Constant>,
    },
}

/// A module-scope constant.
#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    pub name: Option<String>,
    pub ty: Handle<Type>,
    pub value: ConstantValue,
    /// Specialization constant id; the value above is then the default.
    pub spec_id: Option<u32>,
}

impl Constant {
    pub fn is_specialization(&self) -> bool {
        self.spec_id.is_some() || matches!(self.value, ConstantValue::SpecOp { .. })
    }
}

/// Evaluates a constant as an array extent.
///
/// Specialization constants resolve to their default value. Returns
/// `None` for spec-op expressions and for anything that is not a
/// non-negative scalar integer.
pub fn eval_array_extent(constants: &Arena<Constant>, handle: Handle<Constant>) -> Option<u32> {
    match constants.try_get(handle)?.value {
        ConstantValue::Scalar(literal) => literal.as_u32(),
        ConstantValue::Zero => Some(0),
        ConstantValue::Composite(_) | ConstantValue::SpecOp { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Scalar, TypeInner};

    fn u32_type(types: &mut Arena<Type>) -> Handle<Type> {
        types.append(Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::U32),
        })
    }

    #[test]
    fn literal_extent() {
        let mut types = Arena::new();
        let ty = u32_type(&mut types);
        let mut constants = Arena::new();
        let c = constants.append(Constant {
            name: None,
            ty,
            value: ConstantValue::Scalar(Literal::U32(8)),
            spec_id: None,
        });
        assert_eq!(eval_array_extent(&constants, c), Some(8));
    }

    #[test]
    fn spec_constant_uses_default() {
        let mut types = Arena::new();
        let ty = u32_type(&mut types);
        let mut constants = Arena::new();
        let c = constants.append(Constant {
            name: Some("COUNT".into()),
            ty,
            value: ConstantValue::Scalar(Literal::I32(4)),
            spec_id: Some(3),
        });
        assert!(constants[c].is_specialization());
        assert_eq!(eval_array_extent(&constants, c), Some(4));
    }

    #[test]
    fn spec_op_is_unresolvable() {
        let mut types = Arena::new();
        let ty = u32_type(&mut types);
        let mut constants = Arena::new();
        let a = constants.append(Constant {
            name: None,
            ty,
            value: ConstantValue::Scalar(Literal::U32(2)),
            spec_id: Some(0),
        });
        let sum = constants.append(Constant {
            name: None,
            ty,
            value: ConstantValue::SpecOp {
                op: BinaryOp::Add,
                left: a,
                right: a,
            },
            spec_id: None,
        });
        assert!(constants[sum].is_specialization());
        assert_eq!(eval_array_extent(&constants, sum), None);
    }

    #[test]
    fn negative_extent_is_rejected() {
        let mut types = Arena::new();
        let ty = u32_type(&mut types);
        let mut constants = Arena::new();
        let c = constants.append(Constant {
            name: None,
            ty,
            value: ConstantValue::Scalar(Literal::I32(-1)),
            spec_id: None,
        });
        assert_eq!(eval_array_extent(&constants, c), None);
    }
}
