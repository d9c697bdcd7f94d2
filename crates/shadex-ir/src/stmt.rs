//! Statements: operations with side effects and control flow.

use crate::arena::{Handle, Range};
use crate::expr::{AtomicFunction, Expression, SubgroupOperation};

/// A block of statements.
pub type Block = Vec<Statement>;

/// Bitflags for synchronization barriers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Barrier(u32);

impl Barrier {
    pub const EMPTY: Self = Self(0);
    /// Storage buffer memory.
    pub const STORAGE: Self = Self(1);
    /// Workgroup shared memory plus a workgroup execution barrier.
    pub const WORKGROUP: Self = Self(2);
    /// Subgroup execution barrier.
    pub const SUBGROUP: Self = Self(4);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Barrier {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Barrier {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The label of a switch case.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum SwitchValue {
    I32(i32),
    U32(u32),
    Default,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub value: SwitchValue,
    pub body: Block,
    /// Control continues into the next case after `body`.
    pub fall_through: bool,
}

/// A statement in the IR.
#[derive(Clone, Debug)]
pub enum Statement {
    /// Evaluates a range of expressions at this point.
    Emit(Range<Expression>),
    Store {
        pointer: Handle<Expression>,
        value: Handle<Expression>,
    },
    If {
        condition: Handle<Expression>,
        accept: Block,
        reject: Block,
    },
    Switch {
        selector: Handle<Expression>,
        cases: Vec<SwitchCase>,
    },
    /// Unified loop construct (handles for/while/loop).
    Loop {
        body: Block,
        continuing: Block,
        break_if: Option<Handle<Expression>>,
    },
    Call {
        function: Handle<crate::Function>,
        arguments: Vec<Handle<Expression>>,
        result: Option<Handle<Expression>>,
    },
    Atomic {
        pointer: Handle<Expression>,
        fun: AtomicFunction,
        value: Handle<Expression>,
        result: Option<Handle<Expression>>,
    },
    /// A subgroup operation; `index` carries the lane or mask operand of
    /// broadcasts and shuffles.
    Subgroup {
        op: SubgroupOperation,
        argument: Option<Handle<Expression>>,
        index: Option<Handle<Expression>>,
        result: Handle<Expression>,
    },
    Break,
    Continue,
    Return {
        value: Option<Handle<Expression>>,
    },
    /// Discards the current fragment.
    Kill,
    Barrier(Barrier),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::expr::Literal;

    #[test]
    fn barrier_flags() {
        let both = Barrier::STORAGE | Barrier::WORKGROUP;
        assert!(both.contains(Barrier::STORAGE));
        assert!(both.contains(Barrier::WORKGROUP));
        assert!(!both.contains(Barrier::SUBGROUP));
        assert!(Barrier::EMPTY.is_empty());
    }

    #[test]
    fn build_switch_statement() {
        let mut exprs = Arena::new();
        let sel = exprs.append(Expression::Literal(Literal::I32(1)));
        let stmt = Statement::Switch {
            selector: sel,
            cases: vec![
                SwitchCase {
                    value: SwitchValue::I32(1),
                    body: vec![Statement::Kill],
                    fall_through: false,
                },
                SwitchCase {
                    value: SwitchValue::Default,
                    body: vec![],
                    fall_through: false,
                },
            ],
        };
        let Statement::Switch { cases, .. } = &stmt else {
            panic!("expected Switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].value, SwitchValue::Default);
    }

    #[test]
    fn build_loop_statement() {
        let stmt = Statement::Loop {
            body: vec![Statement::Continue],
            continuing: vec![],
            break_if: None,
        };
        let Statement::Loop {
            body, continuing, ..
        } = &stmt
        else {
            panic!("expected Loop");
        };
        assert_eq!(body.len(), 1);
        assert!(continuing.is_empty());
    }
}
