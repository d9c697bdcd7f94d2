//! Expression use counts.
//!
//! Counts how many times each expression is read by a statement or by
//! another live expression. Expressions that nothing reaches get a count
//! of zero, which lets the writer skip them entirely.

use std::collections::HashSet;

use shadex_ir::{Expression, Function, Handle};

use crate::operands::{expression_operands, statement_operands, walk_block};

#[derive(Clone, Debug, Default)]
pub struct ExpressionUsage {
    counts: Vec<u32>,
}

impl ExpressionUsage {
    pub fn compute(func: &Function) -> Self {
        // Roots: everything a statement or local initializer reads.
        let mut roots = Vec::new();
        walk_block(&func.body, &mut |stmt| {
            roots.extend(statement_operands(stmt));
        });
        for (_, local) in func.local_variables.iter() {
            if let Some(init) = local.init {
                roots.push(init);
            }
        }

        let mut live: HashSet<Handle<Expression>> = roots.iter().copied().collect();
        let mut worklist: Vec<_> = live.iter().copied().collect();
        while let Some(handle) = worklist.pop() {
            if let Some(expr) = func.expressions.try_get(handle) {
                for operand in expression_operands(expr) {
                    if live.insert(operand) {
                        worklist.push(operand);
                    }
                }
            }
        }

        let mut counts = vec![0u32; func.expressions.len()];
        let mut bump = |h: Handle<Expression>| {
            if let Some(c) = counts.get_mut(h.index()) {
                *c += 1;
            }
        };
        for root in roots {
            bump(root);
        }
        for (handle, expr) in func.expressions.iter() {
            if live.contains(&handle) {
                for operand in expression_operands(expr) {
                    bump(operand);
                }
            }
        }
        Self { counts }
    }

    pub fn count(&self, handle: Handle<Expression>) -> u32 {
        self.counts.get(handle.index()).copied().unwrap_or(0)
    }

    pub fn is_used(&self, handle: Handle<Expression>) -> bool {
        self.count(handle) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{BinaryOp, Literal, Range, Statement};

    #[test]
    fn counts_shared_operands() {
        let mut func = Function::new("f");
        let a = func.expressions.append(Expression::Literal(Literal::F32(1.0)));
        let sum = func.expressions.append(Expression::Binary {
            op: BinaryOp::Add,
            left: a,
            right: a,
        });
        let prod = func.expressions.append(Expression::Binary {
            op: BinaryOp::Multiply,
            left: sum,
            right: sum,
        });
        func.body = vec![
            Statement::Emit(Range::from_index_range(1..3)),
            Statement::Return { value: Some(prod) },
        ];
        let usage = ExpressionUsage::compute(&func);
        assert_eq!(usage.count(a), 2);
        assert_eq!(usage.count(sum), 2);
        assert_eq!(usage.count(prod), 1);
    }

    #[test]
    fn dead_expressions_do_not_count() {
        let mut func = Function::new("f");
        let a = func.expressions.append(Expression::Literal(Literal::I32(4)));
        let dead = func.expressions.append(Expression::Unary {
            op: shadex_ir::UnaryOp::Negate,
            expr: a,
        });
        func.body = vec![Statement::Emit(Range::from_index_range(1..2))];
        let usage = ExpressionUsage::compute(&func);
        assert!(!usage.is_used(dead));
        assert_eq!(usage.count(a), 0);
    }

    #[test]
    fn nested_blocks_are_roots() {
        let mut func = Function::new("f");
        let c = func.expressions.append(Expression::Literal(Literal::Bool(true)));
        let v = func.expressions.append(Expression::Literal(Literal::U32(3)));
        func.body = vec![Statement::If {
            condition: c,
            accept: vec![Statement::Return { value: Some(v) }],
            reject: vec![],
        }];
        let usage = ExpressionUsage::compute(&func);
        assert_eq!(usage.count(c), 1);
        assert_eq!(usage.count(v), 1);
    }
}
