//! Operand enumeration for expressions and statements.

use shadex_ir::{AtomicFunction, Expression, Handle, Statement};

/// Returns all expression handles directly referenced by an expression.
pub fn expression_operands(expr: &Expression) -> Vec<Handle<Expression>> {
    match expr {
        Expression::Literal(_)
        | Expression::Constant(_)
        | Expression::ZeroValue(_)
        | Expression::FunctionArgument(_)
        | Expression::GlobalVariable(_)
        | Expression::LocalVariable(_)
        | Expression::CallResult(_)
        | Expression::AtomicResult { .. }
        | Expression::SubgroupResult { .. } => vec![],

        Expression::Load { pointer } => vec![*pointer],
        Expression::Unary { expr, .. } => vec![*expr],
        Expression::ArrayLength(e) => vec![*e],
        Expression::Splat { value, .. } => vec![*value],
        Expression::As { expr, .. } => vec![*expr],
        Expression::Derivative { expr, .. } => vec![*expr],
        Expression::Relational { argument, .. } => vec![*argument],

        Expression::Binary { left, right, .. } => vec![*left, *right],
        Expression::Access { base, index } => vec![*base, *index],
        Expression::AccessIndex { base, .. } => vec![*base],
        Expression::Select {
            condition,
            accept,
            reject,
        } => vec![*condition, *accept, *reject],
        Expression::Swizzle { vector, .. } => vec![*vector],

        Expression::Compose { components, .. } => components.clone(),
        Expression::Math {
            arg,
            arg1,
            arg2,
            arg3,
            ..
        } => std::iter::once(*arg)
            .chain([*arg1, *arg2, *arg3].into_iter().flatten())
            .collect(),
    }
}

/// Returns the expressions a single statement reads, ignoring nested blocks.
///
/// Statement results (`Call`/`Atomic`/`Subgroup` result handles) are not
/// operands and are excluded.
pub fn statement_operands(stmt: &Statement) -> Vec<Handle<Expression>> {
    match stmt {
        Statement::Emit(_)
        | Statement::Break
        | Statement::Continue
        | Statement::Kill
        | Statement::Barrier(_) => vec![],
        Statement::Store { pointer, value } => vec![*pointer, *value],
        Statement::If { condition, .. } => vec![*condition],
        Statement::Switch { selector, .. } => vec![*selector],
        Statement::Loop { break_if, .. } => break_if.iter().copied().collect(),
        Statement::Call { arguments, .. } => arguments.clone(),
        Statement::Atomic {
            pointer, fun, value, ..
        } => {
            let mut ops = vec![*pointer];
            if let AtomicFunction::Exchange { compare: Some(cmp) } = fun {
                ops.push(*cmp);
            }
            ops.push(*value);
            ops
        }
        Statement::Subgroup {
            argument, index, ..
        } => [*argument, *index].into_iter().flatten().collect(),
        Statement::Return { value } => value.iter().copied().collect(),
    }
}

/// Calls `visit` for every statement in `block`, depth first, in source order.
pub fn walk_block<'a>(block: &'a [Statement], visit: &mut impl FnMut(&'a Statement)) {
    for stmt in block {
        visit(stmt);
        match stmt {
            Statement::If { accept, reject, .. } => {
                walk_block(accept, visit);
                walk_block(reject, visit);
            }
            Statement::Switch { cases, .. } => {
                for case in cases {
                    walk_block(&case.body, visit);
                }
            }
            Statement::Loop {
                body, continuing, ..
            } => {
                walk_block(body, visit);
                walk_block(continuing, visit);
            }
            _ => {}
        }
    }
}
