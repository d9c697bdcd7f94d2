//! Statement and control-flow emission.

use shadex_ir::{
    AtomicFunction, Barrier, CollectiveOp, Expression, FunctionKey, Handle, Scalar, ScalarKind,
    Statement, SubgroupOperation, SwitchCase, SwitchValue,
};

use crate::driver::Compiler;
use crate::extensions::{SubgroupFeature, Trigger};
use crate::expr::{pointer_root, unparenthesized};
use crate::ids::Entity;
use crate::names::Namespace;
use crate::state::{ExprState, Root};
use crate::types::scalar_name;
use crate::Error;

/// `true` when control never reaches the end of `block`.
fn ends_in_jump(block: &[Statement]) -> bool {
    matches!(
        block.last(),
        Some(Statement::Break | Statement::Continue | Statement::Return { .. } | Statement::Kill)
    )
}

fn collective_name(op: CollectiveOp) -> &'static str {
    match op {
        CollectiveOp::Add => "Add",
        CollectiveOp::Mul => "Mul",
        CollectiveOp::Min => "Min",
        CollectiveOp::Max => "Max",
        CollectiveOp::And => "And",
        CollectiveOp::Or => "Or",
        CollectiveOp::Xor => "Xor",
    }
}

fn subgroup_feature(op: SubgroupOperation) -> SubgroupFeature {
    use SubgroupOperation as S;
    match op {
        S::Elect => SubgroupFeature::Elect,
        S::All | S::Any | S::AllEqual => SubgroupFeature::Vote,
        S::Ballot | S::InverseBallot | S::BallotBitCount => SubgroupFeature::Ballot,
        S::BroadcastFirst | S::Broadcast => SubgroupFeature::Broadcast,
        S::Shuffle | S::ShuffleXor => SubgroupFeature::Shuffle,
        S::Reduce(_) | S::InclusiveScan(_) | S::ExclusiveScan(_) => SubgroupFeature::Arithmetic,
    }
}

fn subgroup_function(op: SubgroupOperation) -> String {
    use SubgroupOperation as S;
    match op {
        S::Elect => "subgroupElect".into(),
        S::All => "subgroupAll".into(),
        S::Any => "subgroupAny".into(),
        S::AllEqual => "subgroupAllEqual".into(),
        S::Ballot => "subgroupBallot".into(),
        S::InverseBallot => "subgroupInverseBallot".into(),
        S::BallotBitCount => "subgroupBallotBitCount".into(),
        S::BroadcastFirst => "subgroupBroadcastFirst".into(),
        S::Broadcast => "subgroupBroadcast".into(),
        S::Shuffle => "subgroupShuffle".into(),
        S::ShuffleXor => "subgroupShuffleXor".into(),
        S::Reduce(op) => format!("subgroup{}", collective_name(op)),
        S::InclusiveScan(op) => format!("subgroupInclusive{}", collective_name(op)),
        S::ExclusiveScan(op) => format!("subgroupExclusive{}", collective_name(op)),
    }
}

impl<'a> Compiler<'a> {
    pub(crate) fn write_block(&mut self, block: &[Statement]) -> Result<(), Error> {
        for statement in block {
            self.write_statement(statement)?;
        }
        Ok(())
    }

    fn write_nested(&mut self, block: &[Statement]) -> Result<(), Error> {
        self.pass.open();
        self.write_block(block)?;
        self.pass.close("");
        Ok(())
    }

    fn write_statement(&mut self, statement: &Statement) -> Result<(), Error> {
        match *statement {
            Statement::Emit(range) => {
                for h in range.iter() {
                    self.emit_expression(h)?;
                }
            }
            Statement::Store { pointer, value } => self.write_store(pointer, value)?,
            Statement::If {
                condition,
                ref accept,
                ref reject,
            } => {
                let condition = self.expr(condition)?;
                self.pass
                    .line(&format!("if ({})", unparenthesized(&condition)));
                self.write_nested(accept)?;
                if !reject.is_empty() {
                    self.pass.line("else");
                    self.write_nested(reject)?;
                }
            }
            Statement::Switch {
                selector,
                ref cases,
            } => self.write_switch(selector, cases)?,
            Statement::Loop {
                ref body,
                ref continuing,
                break_if,
            } => self.write_loop(body, continuing, break_if)?,
            Statement::Call {
                function,
                ref arguments,
                result,
            } => self.write_call(function, arguments, result)?,
            Statement::Atomic {
                pointer,
                fun,
                value,
                result,
            } => self.write_atomic(pointer, fun, value, result)?,
            Statement::Subgroup {
                op,
                argument,
                index,
                result,
            } => self.write_subgroup(op, argument, index, result)?,
            Statement::Break => self.pass.line("break;"),
            Statement::Continue => self.pass.line("continue;"),
            Statement::Return { value } => {
                let key = self.current_key()?;
                match (key, value) {
                    (FunctionKey::Function(_), Some(value)) => {
                        let value = self.expr(value)?;
                        self.pass.line(&format!("return {value};"));
                    }
                    _ => self.pass.line("return;"),
                }
            }
            Statement::Kill => self.pass.line("discard;"),
            Statement::Barrier(barrier) => self.write_barrier(barrier),
        }
        Ok(())
    }

    fn write_store(
        &mut self,
        pointer: Handle<Expression>,
        value: Handle<Expression>,
    ) -> Result<(), Error> {
        let target = self.expr(pointer)?;
        let mut value_text = self.expr(value)?;
        // Builtins GLSL declares signed take a conversion on the way in.
        if let Some((_, kind)) = self.builtin_mismatch(pointer)? {
            let scalar = scalar_name(Scalar { kind, width: 4 })?;
            value_text = format!("{scalar}({value_text})");
        }
        self.pass.line(&format!("{target} = {};", unparenthesized(&value_text)));
        self.invalidate_store(pointer)
    }

    fn write_switch(
        &mut self,
        selector: Handle<Expression>,
        cases: &[SwitchCase],
    ) -> Result<(), Error> {
        self.require(Trigger::IntegerOps)?;
        let selector = self.expr(selector)?;
        self.pass
            .line(&format!("switch ({})", unparenthesized(&selector)));
        self.pass.open();
        for case in cases {
            match case.value {
                SwitchValue::I32(v) => self.pass.line(&format!("case {v}:")),
                SwitchValue::U32(v) => self.pass.line(&format!("case {v}u:")),
                SwitchValue::Default => self.pass.line("default:"),
            }
            self.pass.open();
            self.write_block(&case.body)?;
            if !case.fall_through && !ends_in_jump(&case.body) {
                self.pass.line("break;");
            }
            self.pass.close("");
        }
        self.pass.close("");
        Ok(())
    }

    /// Loops become `for (;;)`. A continuing block runs at the top of every
    /// iteration but the first, so `continue` in the body reaches it.
    fn write_loop(
        &mut self,
        body: &[Statement],
        continuing: &[Statement],
        break_if: Option<Handle<Expression>>,
    ) -> Result<(), Error> {
        let key = self.current_key()?;
        self.pass.loop_depth += 1;
        if continuing.is_empty() && break_if.is_none() {
            self.pass.line("for (;;)");
            self.write_nested(body)?;
            self.pass.loop_depth -= 1;
            return Ok(());
        }

        let index = self.pass.loop_count;
        self.pass.loop_count += 1;
        let ns = Namespace::Local(self.id(Entity::Function(key)));
        let flag =
            self.reserve_member_name(Entity::Function(key), index, Some("loop_init"), ns);
        self.pass.line(&format!("bool {flag} = true;"));
        self.pass.line("for (;;)");
        self.pass.open();
        self.pass.line(&format!("if (!{flag})"));
        self.pass.open();
        self.write_block(continuing)?;
        if let Some(condition) = break_if {
            let condition = self.expr(condition)?;
            self.pass
                .line(&format!("if ({})", unparenthesized(&condition)));
            self.pass.open();
            self.pass.line("break;");
            self.pass.close("");
        }
        self.pass.close("");
        self.pass.line(&format!("{flag} = false;"));
        self.write_block(body)?;
        self.pass.close("");
        self.pass.loop_depth -= 1;
        Ok(())
    }

    fn write_call(
        &mut self,
        function: Handle<shadex_ir::Function>,
        arguments: &[Handle<Expression>],
        result: Option<Handle<Expression>>,
    ) -> Result<(), Error> {
        let (func, info, _) = self.current_function()?;
        let name = self.name_of(Entity::Function(FunctionKey::Function(function)))?;
        let call = format!("{name}({})", self.expr_list(arguments)?);
        match result {
            Some(result)
                if info.usage.is_used(result) || func.named_expressions.contains_key(&result) =>
            {
                let temp = self.bake(result, &call)?;
                self.set_state(result, ExprState::Baked(temp));
            }
            _ => self.pass.line(&format!("{call};")),
        }

        // The callee may write any global and anything passed by pointer.
        let written: Vec<Root> = arguments
            .iter()
            .filter(|&&arg| info.typifier.is_pointer(arg))
            .filter_map(|&arg| pointer_root(func, arg))
            .collect();
        self.invalidate(|root| matches!(root, Root::Global(_)) || written.contains(&root));
        Ok(())
    }

    fn write_atomic(
        &mut self,
        pointer: Handle<Expression>,
        fun: AtomicFunction,
        value: Handle<Expression>,
        result: Option<Handle<Expression>>,
    ) -> Result<(), Error> {
        let (func, info, _) = self.current_function()?;
        let scalar = self
            .inner_of(info, value)?
            .scalar()
            .ok_or_else(|| Error::Unsupported("atomic on a composite".into()))?;
        if scalar.kind == ScalarKind::Float {
            self.require(Trigger::FloatAtomics)?;
        } else if scalar.width == 8 {
            self.require(Trigger::Int64Atomics)?;
        }

        let target = self.expr(pointer)?;
        let operand = self.expr(value)?;
        let used = |h: Handle<Expression>| {
            info.usage.is_used(h) || func.named_expressions.contains_key(&h)
        };

        if let AtomicFunction::Exchange {
            compare: Some(compare),
        } = fun
        {
            let expected = self.expr(compare)?;
            let call = format!("atomicCompSwap({target}, {expected}, {operand})");
            let Some(result) = result.filter(|&r| used(r)) else {
                self.pass.line(&format!("{call};"));
                return self.invalidate_store(pointer);
            };
            let Expression::AtomicResult { ty, .. } = *func.expressions.fetch(result)? else {
                return Err(Error::Unsupported(format!(
                    "{result:?} is not an atomic result"
                )));
            };
            let temp = self.temporary_name(result)?;
            let old = self.member_name_of(Entity::Type(ty), 0)?;
            let exchanged = self.member_name_of(Entity::Type(ty), 1)?;
            let decl = self.declaration(ty, &temp)?;
            self.pass.line(&format!("{decl};"));
            self.pass.line(&format!("{temp}.{old} = {call};"));
            self.invalidate_store(pointer)?;
            // Re-read after the swap: the comparand may live in the same memory.
            let expected = self.expr(compare)?;
            self.pass
                .line(&format!("{temp}.{exchanged} = ({temp}.{old} == {expected});"));
            self.set_state(result, ExprState::Baked(temp));
            return Ok(());
        }

        let call = match fun {
            AtomicFunction::Add => format!("atomicAdd({target}, {operand})"),
            AtomicFunction::Subtract => format!("atomicAdd({target}, -{operand})"),
            AtomicFunction::And => format!("atomicAnd({target}, {operand})"),
            AtomicFunction::ExclusiveOr => format!("atomicXor({target}, {operand})"),
            AtomicFunction::InclusiveOr => format!("atomicOr({target}, {operand})"),
            AtomicFunction::Min => format!("atomicMin({target}, {operand})"),
            AtomicFunction::Max => format!("atomicMax({target}, {operand})"),
            AtomicFunction::Exchange { .. } => format!("atomicExchange({target}, {operand})"),
        };
        match result.filter(|&r| used(r)) {
            Some(result) => {
                let temp = self.bake(result, &call)?;
                self.set_state(result, ExprState::Baked(temp));
            }
            None => self.pass.line(&format!("{call};")),
        }
        self.invalidate_store(pointer)
    }

    fn write_subgroup(
        &mut self,
        op: SubgroupOperation,
        argument: Option<Handle<Expression>>,
        index: Option<Handle<Expression>>,
        result: Handle<Expression>,
    ) -> Result<(), Error> {
        self.require_subgroup(subgroup_feature(op));
        let mut operands = Vec::new();
        match argument {
            Some(argument) => operands.push(self.expr(argument)?),
            // A ballot with no predicate counts every active invocation.
            None if op == SubgroupOperation::Ballot => operands.push("true".to_string()),
            None => {}
        }
        if let Some(index) = index {
            operands.push(self.expr(index)?);
        }
        let call = format!("{}({})", subgroup_function(op), operands.join(", "));
        let temp = self.bake(result, &call)?;
        self.set_state(result, ExprState::Baked(temp));
        Ok(())
    }

    fn write_barrier(&mut self, barrier: Barrier) {
        let storage = barrier.contains(Barrier::STORAGE);
        let workgroup = barrier.contains(Barrier::WORKGROUP);
        if storage {
            self.pass.line("memoryBarrierBuffer();");
        }
        if workgroup {
            self.pass.line("memoryBarrierShared();");
        }
        if barrier.contains(Barrier::SUBGROUP) {
            self.require_subgroup(SubgroupFeature::Barrier);
            self.pass.line("subgroupBarrier();");
        }
        if storage || workgroup || barrier.is_empty() {
            self.pass.line("barrier();");
        }
        self.invalidate(|root| matches!(root, Root::Global(_)));
    }
}
