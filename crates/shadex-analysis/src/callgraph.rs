//! Call graph of one entry point.

use std::collections::BTreeSet;

use shadex_ir::{Function, FunctionKey, Handle, Module, Statement};

use crate::AnalysisError;
use crate::operands::walk_block;

/// Helper functions reachable from an entry point.
#[derive(Clone, Debug)]
pub struct CallGraph {
    /// Callees before callers; the entry point itself is not included.
    post_order: Vec<Handle<Function>>,
}

impl CallGraph {
    pub fn build(module: &Module, entry_point: usize) -> Result<Self, AnalysisError> {
        let root = module.function(FunctionKey::EntryPoint(entry_point))?;
        let mut state = Walk {
            module,
            done: BTreeSet::new(),
            on_stack: Vec::new(),
            post_order: Vec::new(),
        };
        for callee in direct_callees(root) {
            state.visit(callee)?;
        }
        Ok(Self {
            post_order: state.post_order,
        })
    }

    /// Functions in emission order: every callee precedes its callers.
    pub fn post_order(&self) -> &[Handle<Function>] {
        &self.post_order
    }

    pub fn contains(&self, function: Handle<Function>) -> bool {
        self.post_order.contains(&function)
    }

    /// Every function body the entry point may execute, itself included.
    pub fn reachable_keys(&self, entry_point: usize) -> Vec<FunctionKey> {
        self.post_order
            .iter()
            .map(|&h| FunctionKey::Function(h))
            .chain(std::iter::once(FunctionKey::EntryPoint(entry_point)))
            .collect()
    }
}

struct Walk<'a> {
    module: &'a Module,
    done: BTreeSet<Handle<Function>>,
    on_stack: Vec<Handle<Function>>,
    post_order: Vec<Handle<Function>>,
}

impl Walk<'_> {
    fn visit(&mut self, handle: Handle<Function>) -> Result<(), AnalysisError> {
        if self.done.contains(&handle) {
            return Ok(());
        }
        let func = self.module.functions.fetch(handle)?;
        if self.on_stack.contains(&handle) {
            return Err(AnalysisError::Recursion(
                func.name.clone().unwrap_or_else(|| format!("{handle:?}")),
            ));
        }
        self.on_stack.push(handle);
        for callee in direct_callees(func) {
            self.visit(callee)?;
        }
        self.on_stack.pop();
        self.done.insert(handle);
        self.post_order.push(handle);
        Ok(())
    }
}

/// Functions called directly from `func`, in first-call order.
pub fn direct_callees(func: &Function) -> Vec<Handle<Function>> {
    let mut callees = Vec::new();
    walk_block(&func.body, &mut |stmt| {
        if let Statement::Call { function, .. } = stmt
            && !callees.contains(function)
        {
            callees.push(*function);
        }
    });
    callees
}
