//! Global variable liveness for one entry point.
//!
//! A global is live when any function the entry point may execute
//! references it. Interface variables that are not live are not declared
//! by the backends.

use std::collections::BTreeSet;

use shadex_ir::{Expression, Function, GlobalVariable, Handle, Module};

use crate::{AnalysisError, CallGraph};

#[derive(Clone, Debug)]
pub struct Liveness {
    live: BTreeSet<Handle<GlobalVariable>>,
}

impl Liveness {
    pub fn compute(module: &Module, entry_point: usize) -> Result<Self, AnalysisError> {
        let graph = CallGraph::build(module, entry_point)?;
        let mut live = BTreeSet::new();
        for key in graph.reachable_keys(entry_point) {
            collect_globals(module.function(key)?, &mut live);
        }

        let mut anywhere = BTreeSet::new();
        for (_, func) in module.functions.iter() {
            collect_globals(func, &mut anywhere);
        }
        for ep in &module.entry_points {
            collect_globals(&ep.function, &mut anywhere);
        }
        for (handle, var) in module.global_variables.iter() {
            if var.space.is_interface()
                && var.decorations.location.is_some()
                && !anywhere.contains(&handle)
            {
                log::warn!(
                    "interface variable `{}` at location {} is never used and will not be declared",
                    var.name.as_deref().unwrap_or("_"),
                    var.decorations.location.unwrap_or_default(),
                );
            }
        }

        Ok(Self { live })
    }

    pub fn is_live(&self, handle: Handle<GlobalVariable>) -> bool {
        self.live.contains(&handle)
    }

    /// Live globals in handle order.
    pub fn iter(&self) -> impl Iterator<Item = Handle<GlobalVariable>> + '_ {
        self.live.iter().copied()
    }
}

fn collect_globals(func: &Function, out: &mut BTreeSet<Handle<GlobalVariable>>) {
    for (_, expr) in func.expressions.iter() {
        if let Expression::GlobalVariable(g) = *expr {
            out.insert(g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{
        AddressSpace, Decorations, EntryPoint, Scalar, ShaderStage, Statement, Type, TypeInner,
    };

    fn global(module: &mut Module, name: &str, space: AddressSpace) -> Handle<GlobalVariable> {
        let ty = module.types.append(Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::F32),
        });
        module.global_variables.append(GlobalVariable {
            name: Some(name.into()),
            space,
            ty,
            init: None,
            decorations: Decorations {
                location: Some(0),
                ..Decorations::default()
            },
        })
    }

    #[test]
    fn globals_reached_through_calls_are_live() {
        let mut module = Module::default();
        let used = global(&mut module, "used", AddressSpace::Private);
        let via_call = global(&mut module, "via_call", AddressSpace::Output);
        let dead = global(&mut module, "dead", AddressSpace::Input);

        let mut helper = Function::new("helper");
        helper.expressions.append(Expression::GlobalVariable(via_call));
        let helper_h = module.functions.append(helper);

        let mut main = Function::new("main");
        main.expressions.append(Expression::GlobalVariable(used));
        main.body = vec![Statement::Call {
            function: helper_h,
            arguments: vec![],
            result: None,
        }];
        module.entry_points.push(EntryPoint {
            name: "main".into(),
            stage: ShaderStage::Vertex,
            modes: vec![],
            function: main,
        });

        let liveness = Liveness::compute(&module, 0).unwrap();
        assert!(liveness.is_live(used));
        assert!(liveness.is_live(via_call));
        assert!(!liveness.is_live(dead));
        assert_eq!(liveness.iter().count(), 2);
    }

    #[test]
    fn other_entry_points_do_not_leak_liveness() {
        let mut module = Module::default();
        let a = global(&mut module, "a", AddressSpace::Input);
        let b = global(&mut module, "b", AddressSpace::Input);
        for (name, var) in [("first", a), ("second", b)] {
            let mut f = Function::new(name);
            f.expressions.append(Expression::GlobalVariable(var));
            module.entry_points.push(EntryPoint {
                name: name.into(),
                stage: ShaderStage::Fragment,
                modes: vec![],
                function: f,
            });
        }
        let liveness = Liveness::compute(&module, 1).unwrap();
        assert!(!liveness.is_live(a));
        assert!(liveness.is_live(b));
    }
}
