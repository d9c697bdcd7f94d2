//! Global variables, address spaces, and interface decorations.

use crate::arena::Handle;
use crate::constant::Constant;
use crate::types::Type;

/// Bitflags for storage buffer access modes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct StorageAccess(u32);

impl StorageAccess {
    pub const EMPTY: Self = Self(0);
    pub const LOAD: Self = Self(1);
    pub const STORE: Self = Self(2);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for StorageAccess {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for StorageAccess {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Storage class of a variable or pointer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AddressSpace {
    Function,
    Private,
    Workgroup,
    Uniform,
    Storage { access: StorageAccess },
    PushConstant,
    /// Stage input interface.
    Input,
    /// Stage output interface.
    Output,
    /// Memory reached through a 64-bit buffer device address.
    PhysicalStorage,
}

impl AddressSpace {
    /// Returns `true` for address spaces backed by a buffer block.
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::Uniform | Self::Storage { .. } | Self::PushConstant | Self::PhysicalStorage
        )
    }

    pub fn is_interface(self) -> bool {
        matches!(self, Self::Input | Self::Output)
    }
}

/// Built-in shader inputs and outputs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BuiltIn {
    Position,
    PointSize,
    ClipDistance,
    VertexIndex,
    InstanceIndex,
    FrontFacing,
    FragCoord,
    FragDepth,
    PointCoord,
    SampleIndex,
    SampleMask,
    PrimitiveId,
    InvocationId,
    Layer,
    ViewportIndex,
    ViewIndex,
    TessLevelOuter,
    TessLevelInner,
    TessCoord,
    GlobalInvocationId,
    LocalInvocationId,
    LocalInvocationIndex,
    WorkgroupId,
    NumWorkgroups,
    SubgroupSize,
    SubgroupInvocationId,
    NumSubgroups,
    SubgroupId,
}

/// Interpolation qualifier of a stage interface variable.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Interpolation {
    Perspective,
    Linear,
    Flat,
}

/// Sampling qualifier of a stage interface variable.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Sampling {
    Center,
    Centroid,
    Sample,
}

/// Decorations attached to a global variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decorations {
    pub location: Option<u32>,
    pub component: Option<u32>,
    pub binding: Option<u32>,
    pub descriptor_set: Option<u32>,
    pub built_in: Option<BuiltIn>,
    pub interpolation: Option<Interpolation>,
    pub sampling: Option<Sampling>,
    pub invariant: bool,
    /// Dual-source blend index.
    pub index: Option<u32>,
    pub non_readable: bool,
    pub non_writable: bool,
    pub coherent: bool,
    pub volatile: bool,
    pub restrict: bool,
}

/// A module-scope variable.
#[derive(Clone, Debug)]
pub struct GlobalVariable {
    pub name: Option<String>,
    pub space: AddressSpace,
    pub ty: Handle<Type>,
    pub init: Option<Handle<Constant>>,
    pub decorations: Decorations,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_access_flags() {
        let read = StorageAccess::LOAD;
        let write = StorageAccess::STORE;
        let rw = read | write;
        assert!(rw.contains(read));
        assert!(rw.contains(write));
        assert!(!read.contains(write));
        assert!(!StorageAccess::EMPTY.contains(read));
        assert!(StorageAccess::EMPTY.is_empty());
    }

    #[test]
    fn storage_access_bitor_assign() {
        let mut access = StorageAccess::LOAD;
        access |= StorageAccess::STORE;
        assert!(access.contains(StorageAccess::LOAD));
        assert!(access.contains(StorageAccess::STORE));
    }

    #[test]
    fn buffer_address_spaces() {
        assert!(AddressSpace::Uniform.is_buffer());
        assert!(AddressSpace::PushConstant.is_buffer());
        assert!(
            AddressSpace::Storage {
                access: StorageAccess::LOAD
            }
            .is_buffer()
        );
        assert!(!AddressSpace::Workgroup.is_buffer());
        assert!(AddressSpace::Input.is_interface());
        assert!(!AddressSpace::Private.is_interface());
    }

    #[test]
    fn default_decorations_are_empty() {
        let deco = Decorations::default();
        assert!(deco.location.is_none());
        assert!(deco.built_in.is_none());
        assert!(!deco.invariant);
    }
}
