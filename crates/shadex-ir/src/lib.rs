//! shadex intermediate representation.
//!
//! An arena-based shader IR modeled on SPIR-V: types with explicit layout
//! decorations, module-scope constants (including specialization
//! constants), decorated global variables for every interface, and
//! structured control flow.

pub mod arena;
mod constant;
mod display;
mod error;
mod expr;
mod func;
mod global;
mod stmt;
mod types;

use std::collections::BTreeSet;

pub use arena::{Arena, Handle, Range};
pub use constant::{Constant, ConstantValue, eval_array_extent};
pub use display::{dump_module, format_type, format_type_inner};
pub use error::IrError;
pub use expr::{
    AtomicFunction, BinaryOp, CollectiveOp, DerivativeAxis, DerivativeControl, Expression, Literal,
    MathFunction, RelationalFunction, SubgroupOperation, SwizzleComponent, UnaryOp,
};
pub use func::{
    EntryPoint, ExecutionMode, Function, FunctionArgument, FunctionResult, LocalVariable,
    Primitive, ShaderStage, TessSpacing,
};
pub use global::{
    AddressSpace, BuiltIn, Decorations, GlobalVariable, Interpolation, Sampling, StorageAccess,
};
pub use stmt::{Barrier, Block, Statement, SwitchCase, SwitchValue};
pub use types::{
    ArraySize, Bytes, MatrixMajor, MemberLayout, Scalar, ScalarKind, StructMember, Type,
    TypeInner, VectorSize,
};

/// An optional hardware capability the module declares it uses.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Capability {
    Int8,
    Int16,
    Int64,
    Float16,
    Float64,
    StorageBuffer8BitAccess,
    StorageBuffer16BitAccess,
    Int64Atomics,
    AtomicFloat32Add,
    MultiView,
    SampleRateShading,
    ShaderViewportIndexLayer,
    PhysicalStorageBufferAddresses,
    RayQuery,
    DerivativeControl,
}

/// Identifies either a helper function or an entry point's function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum FunctionKey {
    EntryPoint(usize),
    Function(Handle<Function>),
}

/// A complete shader module.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub types: Arena<Type>,
    pub constants: Arena<Constant>,
    pub global_variables: Arena<GlobalVariable>,
    /// Helper (non-entry-point) functions.
    pub functions: Arena<Function>,
    pub entry_points: Vec<EntryPoint>,
    pub capabilities: BTreeSet<Capability>,
}

impl Module {
    /// Finds the entry point with the given name.
    pub fn entry_point(&self, name: &str) -> Result<(usize, &EntryPoint), IrError> {
        self.entry_points
            .iter()
            .enumerate()
            .find(|(_, ep)| ep.name == name)
            .ok_or_else(|| IrError::MissingEntryPoint(name.to_string()))
    }

    /// Resolves a [`FunctionKey`] to its function body.
    pub fn function(&self, key: FunctionKey) -> Result<&Function, IrError> {
        match key {
            FunctionKey::EntryPoint(index) => self
                .entry_points
                .get(index)
                .map(|ep| &ep.function)
                .ok_or(IrError::BadHandle {
                    kind: "EntryPoint",
                    index,
                    len: self.entry_points.len(),
                }),
            FunctionKey::Function(handle) => self.functions.fetch(handle),
        }
    }

    /// Number of elements of an array, when known at compile time.
    ///
    /// Runtime-sized arrays and sizes that depend on a specialization
    /// expression yield `None`.
    pub fn array_extent(&self, size: ArraySize) -> Option<u32> {
        match size {
            ArraySize::Literal(n) => Some(n),
            ArraySize::Constant(handle) => eval_array_extent(&self.constants, handle),
            ArraySize::Dynamic => None,
        }
    }

    /// Strips array wrappers and returns the innermost element type.
    pub fn innermost_element(&self, mut ty: Handle<Type>) -> Handle<Type> {
        while let Some(Type {
            inner: TypeInner::Array { base, .. },
            ..
        }) = self.types.try_get(ty)
        {
            ty = *base;
        }
        ty
    }

    /// Walks a composite type by a chain of constant indices.
    pub fn member_type(&self, ty: Handle<Type>, index: u32) -> Option<Handle<Type>> {
        match &self.types.try_get(ty)?.inner {
            TypeInner::Struct { members, .. } => members.get(index as usize).map(|m| m.ty),
            TypeInner::Array { base, .. } => Some(*base),
            TypeInner::Pointer { base, .. } => self.member_type(*base, index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with_arrays() -> (Module, Handle<Type>) {
        let mut module = Module::default();
        let f32_ty = module.types.append(Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::F32),
        });
        let inner = module.types.append(Type {
            name: None,
            inner: TypeInner::Array {
                base: f32_ty,
                size: ArraySize::Literal(3),
                stride: 4,
            },
        });
        let outer = module.types.append(Type {
            name: None,
            inner: TypeInner::Array {
                base: inner,
                size: ArraySize::Literal(2),
                stride: 12,
            },
        });
        (module, outer)
    }

    #[test]
    fn innermost_element_of_nested_array() {
        let (module, outer) = module_with_arrays();
        let inner = module.innermost_element(outer);
        assert_eq!(module.types[inner].inner, TypeInner::Scalar(Scalar::F32));
    }

    #[test]
    fn array_extent_resolution() {
        let (mut module, _) = module_with_arrays();
        let u32_ty = module.types.append(Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::U32),
        });
        let count = module.constants.append(Constant {
            name: None,
            ty: u32_ty,
            value: ConstantValue::Scalar(Literal::U32(5)),
            spec_id: Some(1),
        });
        assert_eq!(module.array_extent(ArraySize::Literal(3)), Some(3));
        assert_eq!(module.array_extent(ArraySize::Constant(count)), Some(5));
        assert_eq!(module.array_extent(ArraySize::Dynamic), None);
    }

    #[test]
    fn missing_entry_point() {
        let module = Module::default();
        assert_eq!(
            module.entry_point("main").unwrap_err(),
            IrError::MissingEntryPoint("main".into())
        );
        assert!(module.function(FunctionKey::EntryPoint(0)).is_err());
    }
}
