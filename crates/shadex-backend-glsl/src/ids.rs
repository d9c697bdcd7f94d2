//! Per-compile numeric ids.
//!
//! Fallback names are derived from these ids, so they must not depend on
//! emission order: ids are assigned by walking the module in a fixed
//! order (types, constants, globals, functions, then each function's
//! arguments, locals and expressions).

use shadex_ir::{
    Constant, Expression, FunctionKey, GlobalVariable, Handle, LocalVariable, Module, Type,
};

/// Anything that can own a name.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Entity {
    Type(Handle<Type>),
    Constant(Handle<Constant>),
    Global(Handle<GlobalVariable>),
    Function(FunctionKey),
    Argument(FunctionKey, u32),
    Local(FunctionKey, Handle<LocalVariable>),
    Expression(FunctionKey, Handle<Expression>),
}

#[derive(Clone, Copy, Debug, Default)]
struct FunctionIds {
    id: u32,
    arguments: u32,
    locals: u32,
    expressions: u32,
}

#[derive(Clone, Debug)]
pub struct IdMap {
    constants: u32,
    globals: u32,
    helpers: Vec<FunctionIds>,
    entry_points: Vec<FunctionIds>,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl IdMap {
    pub fn new(module: &Module) -> Self {
        // Id 0 is never handed out.
        let constants = 1 + count(module.types.len());
        let globals = constants + count(module.constants.len());
        let mut next = globals + count(module.global_variables.len());

        let function_count = module.functions.len() + module.entry_points.len();
        let mut ids: Vec<FunctionIds> = (0..function_count)
            .map(|_| {
                let id = next;
                next += 1;
                FunctionIds {
                    id,
                    ..FunctionIds::default()
                }
            })
            .collect();

        let bodies = module
            .functions
            .iter()
            .map(|(_, f)| f)
            .chain(module.entry_points.iter().map(|ep| &ep.function));
        for (slot, func) in ids.iter_mut().zip(bodies) {
            slot.arguments = next;
            slot.locals = slot.arguments + count(func.arguments.len());
            slot.expressions = slot.locals + count(func.local_variables.len());
            next = slot.expressions + count(func.expressions.len());
        }

        let entry_points = ids.split_off(module.functions.len());
        Self {
            constants,
            globals,
            helpers: ids,
            entry_points,
        }
    }

    fn function(&self, key: FunctionKey) -> FunctionIds {
        match key {
            FunctionKey::Function(h) => self.helpers[h.index()],
            FunctionKey::EntryPoint(i) => self.entry_points[i],
        }
    }

    pub fn id(&self, entity: Entity) -> u32 {
        let index = |i: usize| count(i);
        match entity {
            Entity::Type(h) => 1 + index(h.index()),
            Entity::Constant(h) => self.constants + index(h.index()),
            Entity::Global(h) => self.globals + index(h.index()),
            Entity::Function(key) => self.function(key).id,
            Entity::Argument(key, i) => self.function(key).arguments + i,
            Entity::Local(key, h) => self.function(key).locals + index(h.index()),
            Entity::Expression(key, h) => self.function(key).expressions + index(h.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{
        EntryPoint, Function, FunctionArgument, Literal, Scalar, ShaderStage, TypeInner,
    };

    fn sample() -> Module {
        let mut module = Module::default();
        let f32_ty = module.types.append(Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::F32),
        });
        let mut helper = Function::new("helper");
        helper.arguments.push(FunctionArgument {
            name: Some("x".into()),
            ty: f32_ty,
        });
        helper.expressions.append(Expression::FunctionArgument(0));
        module.functions.append(helper);

        let mut main = Function::new("main");
        main.local_variables.append(LocalVariable {
            name: None,
            ty: f32_ty,
            init: None,
        });
        main.expressions.append(Expression::Literal(Literal::F32(1.0)));
        module.entry_points.push(EntryPoint {
            name: "main".into(),
            stage: ShaderStage::Fragment,
            modes: vec![],
            function: main,
        });
        module
    }

    fn h<T>(index: usize) -> Handle<T> {
        Handle::from_usize(index).unwrap()
    }

    #[test]
    fn ids_follow_module_order() {
        let module = sample();
        let ids = IdMap::new(&module);
        let helper = FunctionKey::Function(h(0));
        let main = FunctionKey::EntryPoint(0);

        assert_eq!(ids.id(Entity::Type(h(0))), 1);
        assert_eq!(ids.id(Entity::Function(helper)), 2);
        assert_eq!(ids.id(Entity::Function(main)), 3);
        assert_eq!(ids.id(Entity::Argument(helper, 0)), 4);
        assert_eq!(ids.id(Entity::Expression(helper, h(0))), 5);
        assert_eq!(ids.id(Entity::Local(main, h(0))), 6);
        assert_eq!(ids.id(Entity::Expression(main, h(0))), 7);
    }

    #[test]
    fn ids_are_unique() {
        let module = sample();
        let ids = IdMap::new(&module);
        let helper = FunctionKey::Function(h(0));
        let main = FunctionKey::EntryPoint(0);
        let mut all = vec![
            ids.id(Entity::Type(h(0))),
            ids.id(Entity::Function(helper)),
            ids.id(Entity::Function(main)),
            ids.id(Entity::Argument(helper, 0)),
            ids.id(Entity::Expression(helper, h(0))),
            ids.id(Entity::Local(main, h(0))),
            ids.id(Entity::Expression(main, h(0))),
        ];
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 7);
    }
}
