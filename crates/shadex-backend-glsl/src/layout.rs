//! Buffer packing standards.
//!
//! GLSL cannot spell arbitrary member offsets, so every buffer block must
//! be matched against one of the standard layouts: the block's declared
//! offsets and strides are checked against what each standard would
//! produce, and the first standard the target can express wins.

use std::fmt;
use std::ops::Range;

use shadex_ir::{Handle, IrError, MatrixMajor, Module, Scalar, ScalarKind, Type, TypeInner, VectorSize};

use crate::Error;
use crate::extensions::Trigger;

/// A rule set for member offsets, alignments and strides.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PackingStandard {
    Std140,
    Std140EnhancedLayout,
    Std430,
    Std430EnhancedLayout,
    Scalar,
    ScalarEnhancedLayout,
    HlslCbuffer,
    HlslCbufferPackOffset,
}

impl PackingStandard {
    /// Arrays and structs are rounded up to 16 bytes.
    pub fn is_vec4_padded(self) -> bool {
        matches!(
            self,
            Self::Std140 | Self::Std140EnhancedLayout | Self::HlslCbuffer | Self::HlslCbufferPackOffset
        )
    }

    /// Offsets may be chosen freely as long as they are aligned.
    pub fn has_flexible_offset(self) -> bool {
        matches!(
            self,
            Self::Std140EnhancedLayout
                | Self::Std430EnhancedLayout
                | Self::ScalarEnhancedLayout
                | Self::HlslCbufferPackOffset
        )
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Scalar | Self::ScalarEnhancedLayout)
    }

    pub fn is_hlsl(self) -> bool {
        matches!(self, Self::HlslCbuffer | Self::HlslCbufferPackOffset)
    }

    /// The standard nested structs must follow: explicit offsets are only
    /// expressible on the block's own members.
    pub fn substruct(self) -> Self {
        match self {
            Self::Std140EnhancedLayout => Self::Std140,
            Self::Std430EnhancedLayout => Self::Std430,
            Self::ScalarEnhancedLayout => Self::Scalar,
            Self::HlslCbufferPackOffset => Self::HlslCbuffer,
            other => other,
        }
    }

    /// The `layout(...)` qualifier naming this standard.
    pub fn qualifier(self) -> &'static str {
        match self {
            Self::Std140 | Self::Std140EnhancedLayout => "std140",
            Self::Std430 | Self::Std430EnhancedLayout => "std430",
            Self::Scalar | Self::ScalarEnhancedLayout => "scalar",
            Self::HlslCbuffer | Self::HlslCbufferPackOffset => "cbuffer",
        }
    }
}

impl fmt::Display for PackingStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualifier())?;
        if self.has_flexible_offset() {
            f.write_str(" with explicit offsets")?;
        }
        Ok(())
    }
}

/// Structural problems that make a type's layout unanswerable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("array type {0} has no compile-time size")]
    UnsizedArray(usize),
    #[error("member {member} of struct type {ty} has no offset")]
    MissingOffset { ty: usize, member: usize },
    #[error("member {member} of struct type {ty} has a zero matrix stride")]
    BogusMatrixStride { ty: usize, member: usize },
    #[error("type {0} cannot be stored in a buffer")]
    NotStorable(usize),
    #[error("type {0} is not a struct")]
    NotAStruct(usize),
    #[error("type {0} does not fit in 32-bit offsets")]
    TooLarge(usize),
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Outcome of checking a struct against a standard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// The first member whose offset, alignment or stride disagrees.
    Mismatch { member: usize },
}

impl Validation {
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

/// The kind of buffer a block backs; decides which standards are legal.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BufferKind {
    Uniform,
    Storage,
    PushConstant,
}

/// The layout chosen for one buffer block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    pub standard: PackingStandard,
    /// Every member must carry `layout(offset = N)`.
    pub explicit_offsets: bool,
    /// Feature the chosen standard depends on, if any.
    pub requires: Option<Trigger>,
}

fn align_up(value: u32, alignment: u32) -> Option<u32> {
    value.checked_next_multiple_of(alignment)
}

fn base_size(scalar: Scalar) -> u32 {
    match scalar.kind {
        // Booleans occupy a full word in GLSL blocks.
        ScalarKind::Bool => 4,
        _ => u32::from(scalar.width),
    }
}

/// HLSL packing keeps a vector inside one 16-byte register when it can.
fn straddles_vec4(offset: u32, size: u32) -> bool {
    let end = offset.saturating_add(size).saturating_sub(1);
    size != 0 && offset / 16 != end / 16
}

/// Computes packed alignments, sizes and strides over a module's types.
#[derive(Clone, Copy, Debug)]
pub struct Layouter<'a> {
    module: &'a Module,
}

impl<'a> Layouter<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    fn inner(&self, ty: Handle<Type>) -> Result<&'a TypeInner, LayoutError> {
        Ok(&self.module.types.fetch(ty)?.inner)
    }

    fn innermost_is_struct(&self, ty: Handle<Type>) -> Result<bool, LayoutError> {
        Ok(self.inner(self.module.innermost_element(ty))?.is_struct())
    }

    pub fn alignment(
        &self,
        ty: Handle<Type>,
        major: MatrixMajor,
        standard: PackingStandard,
    ) -> Result<u32, LayoutError> {
        Ok(match *self.inner(ty)? {
            TypeInner::Pointer { space, .. } => {
                if space != shadex_ir::AddressSpace::PhysicalStorage {
                    return Err(LayoutError::NotStorable(ty.index()));
                }
                8
            }
            TypeInner::Array { .. } => {
                let minimum = if standard.is_vec4_padded() { 16 } else { 1 };
                let element = self.module.innermost_element(ty);
                minimum.max(self.alignment(element, major, standard)?)
            }
            TypeInner::Struct { ref members, .. } => {
                let mut alignment = 1;
                for member in members {
                    alignment =
                        alignment.max(self.alignment(member.ty, member.layout.major, standard)?);
                }
                if standard.is_vec4_padded() {
                    alignment = alignment.max(16);
                }
                alignment
            }
            TypeInner::Scalar(scalar) | TypeInner::Atomic(scalar) => base_size(scalar),
            TypeInner::Vector { size, scalar } => {
                let base = base_size(scalar);
                if standard.is_scalar() || standard.is_hlsl() {
                    base
                } else {
                    match size {
                        VectorSize::Bi => 2 * base,
                        VectorSize::Tri | VectorSize::Quad => 4 * base,
                    }
                }
            }
            TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } => {
                let base = base_size(scalar);
                // Column-major stores column vectors, row-major row vectors.
                let vector = match major {
                    MatrixMajor::Column => rows,
                    MatrixMajor::Row => columns,
                };
                if standard.is_scalar() {
                    base
                } else if standard.is_vec4_padded() || vector == VectorSize::Tri {
                    4 * base
                } else {
                    vector as u32 * base
                }
            }
        })
    }

    pub fn size(
        &self,
        ty: Handle<Type>,
        major: MatrixMajor,
        standard: PackingStandard,
    ) -> Result<u32, LayoutError> {
        Ok(match *self.inner(ty)? {
            TypeInner::Pointer { space, .. } => {
                if space != shadex_ir::AddressSpace::PhysicalStorage {
                    return Err(LayoutError::NotStorable(ty.index()));
                }
                8
            }
            TypeInner::Array { size, .. } => {
                let count = self
                    .module
                    .array_extent(size)
                    .ok_or(LayoutError::UnsizedArray(ty.index()))?;
                let mut packed = count
                    .checked_mul(self.array_stride(ty, major, standard)?)
                    .ok_or(LayoutError::TooLarge(ty.index()))?;
                if standard.is_hlsl() {
                    // The last element of a non-struct array only takes the
                    // space of its own vector.
                    let element = self.module.innermost_element(ty);
                    if let Some((vecsize, width)) = self.vector_shape(element)? {
                        packed = packed.saturating_sub((4 - vecsize) * width);
                    }
                }
                packed
            }
            TypeInner::Struct { ref members, .. } => {
                let mut size = 0;
                let mut pad_alignment = 1;
                for member in members {
                    let mut packed_alignment =
                        self.alignment(member.ty, member.layout.major, standard)?;
                    let member_size = self.size(member.ty, member.layout.major, standard)?;
                    if standard.is_hlsl() && straddles_vec4(size, member_size) {
                        packed_alignment = packed_alignment.max(16);
                    }
                    let alignment = packed_alignment.max(pad_alignment);
                    pad_alignment = if self.innermost_is_struct(member.ty)? {
                        packed_alignment
                    } else {
                        1
                    };
                    size = align_up(size, alignment)
                        .and_then(|offset| offset.checked_add(member_size))
                        .ok_or(LayoutError::TooLarge(ty.index()))?;
                }
                size
            }
            TypeInner::Scalar(scalar) | TypeInner::Atomic(scalar) => base_size(scalar),
            TypeInner::Vector { size, scalar } => size as u32 * base_size(scalar),
            TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } => {
                let base = base_size(scalar);
                let (columns, rows) = (columns as u32, rows as u32);
                if standard.is_scalar() {
                    return Ok(columns * rows * base);
                }
                let (count, vector) = match major {
                    MatrixMajor::Column => (columns, rows),
                    MatrixMajor::Row => (rows, columns),
                };
                let mut size = if standard.is_vec4_padded() || vector == 3 {
                    count * 4 * base
                } else {
                    count * vector * base
                };
                if standard.is_hlsl() {
                    size = size.saturating_sub((4 - rows) * base);
                }
                size
            }
        })
    }

    /// Size of one element rounded up to the array's alignment.
    pub fn array_stride(
        &self,
        array: Handle<Type>,
        major: MatrixMajor,
        standard: PackingStandard,
    ) -> Result<u32, LayoutError> {
        let TypeInner::Array { base, .. } = *self.inner(array)? else {
            return Err(LayoutError::NotStorable(array.index()));
        };
        let size = self.size(base, major, standard)?;
        let alignment = self.alignment(array, major, standard)?;
        align_up(size, alignment).ok_or(LayoutError::TooLarge(array.index()))
    }

    /// Component count and width of scalars, vectors and matrix columns.
    fn vector_shape(&self, ty: Handle<Type>) -> Result<Option<(u32, u32)>, LayoutError> {
        Ok(match *self.inner(ty)? {
            TypeInner::Scalar(s) | TypeInner::Atomic(s) => Some((1, base_size(s))),
            TypeInner::Vector { size, scalar } => Some((size as u32, base_size(scalar))),
            TypeInner::Matrix { rows, scalar, .. } => Some((rows as u32, base_size(scalar))),
            _ => None,
        })
    }

    /// Checks whether the members of `ty` whose offsets fall in `range`
    /// follow `standard`.
    pub fn is_standard(
        &self,
        ty: Handle<Type>,
        standard: PackingStandard,
        range: Range<u32>,
    ) -> Result<Validation, LayoutError> {
        let TypeInner::Struct {
            ref members,
            is_block,
        } = *self.inner(ty)?
        else {
            return Err(LayoutError::NotAStruct(ty.index()));
        };

        let mut offset = 0u32;
        let mut pad_alignment = 1u32;
        for (i, member) in members.iter().enumerate() {
            let member_inner = self.inner(member.ty)?;
            if member.layout.matrix_stride == Some(0) {
                return Err(LayoutError::BogusMatrixStride {
                    ty: ty.index(),
                    member: i,
                });
            }
            let major = member.layout.major;
            let mut packed_alignment = self.alignment(member.ty, major, standard)?;

            // A trailing array of a block may be runtime-sized; its size
            // never matters for the offsets checked here.
            let may_be_unsized = is_block && i + 1 == members.len() && member_inner.is_array();
            let packed_size = if !may_be_unsized || standard.is_hlsl() {
                self.size(member.ty, major, standard)?
            } else {
                0
            };

            let actual = member.layout.offset.ok_or(LayoutError::MissingOffset {
                ty: ty.index(),
                member: i,
            })?;

            if standard.is_hlsl() {
                let target = if standard.has_flexible_offset() {
                    actual
                } else {
                    offset
                };
                if straddles_vec4(target, packed_size) {
                    packed_alignment = packed_alignment.max(16);
                }
            }

            if actual >= range.end {
                break;
            }

            let alignment = packed_alignment.max(pad_alignment);
            offset = align_up(offset, alignment).ok_or(LayoutError::TooLarge(ty.index()))?;

            let is_struct = !matches!(member_inner, TypeInner::Pointer { .. })
                && self.innermost_is_struct(member.ty)?;
            pad_alignment = if is_struct { packed_alignment } else { 1 };

            if actual >= range.start {
                let mismatch = Validation::Mismatch { member: i };
                if !standard.has_flexible_offset() {
                    if actual != offset {
                        return Ok(mismatch);
                    }
                } else if actual % alignment != 0 {
                    return Ok(mismatch);
                }

                if let TypeInner::Array { stride, .. } = *member_inner
                    && self.array_stride(member.ty, major, standard)? != stride
                {
                    return Ok(mismatch);
                }

                if is_struct {
                    let element = self.module.innermost_element(member.ty);
                    if !self
                        .is_standard(element, standard.substruct(), 0..u32::MAX)?
                        .is_valid()
                    {
                        return Ok(mismatch);
                    }
                }
            }

            offset = actual
                .checked_add(packed_size)
                .ok_or(LayoutError::TooLarge(ty.index()))?;
        }
        Ok(Validation::Valid)
    }

    /// Offsets `standard` assigns to the members of `ty`, in member order.
    pub fn natural_offsets(
        &self,
        ty: Handle<Type>,
        standard: PackingStandard,
    ) -> Result<Vec<u32>, LayoutError> {
        let TypeInner::Struct { ref members, .. } = *self.inner(ty)? else {
            return Err(LayoutError::NotAStruct(ty.index()));
        };
        let too_large = LayoutError::TooLarge(ty.index());
        let mut offsets = Vec::with_capacity(members.len());
        let mut offset = 0u32;
        let mut pad_alignment = 1;
        for (i, member) in members.iter().enumerate() {
            let major = member.layout.major;
            let mut packed_alignment = self.alignment(member.ty, major, standard)?;
            // A trailing runtime array takes no space before it.
            let trailing_array = i + 1 == members.len() && self.inner(member.ty)?.is_array();
            let size = if trailing_array {
                0
            } else {
                self.size(member.ty, major, standard)?
            };
            if standard.is_hlsl() && straddles_vec4(offset, size) {
                packed_alignment = packed_alignment.max(16);
            }
            offset = align_up(offset, packed_alignment.max(pad_alignment))
                .ok_or_else(|| too_large.clone())?;
            offsets.push(offset);
            pad_alignment = if self.innermost_is_struct(member.ty)? {
                packed_alignment
            } else {
                1
            };
            offset = offset.checked_add(size).ok_or_else(|| too_large.clone())?;
        }
        Ok(offsets)
    }

    /// Picks the packing standard for a buffer block.
    ///
    /// Plain std430/std140 are preferred; scalar layout and explicit
    /// offsets are used only when the declared offsets leave no choice.
    pub fn buffer_to_packing_standard(
        &self,
        ty: Handle<Type>,
        kind: BufferKind,
        vulkan: bool,
    ) -> Result<BlockLayout, Error> {
        use PackingStandard as P;

        let std430_allowed = kind != BufferKind::Uniform;
        let full = 0..u32::MAX;
        let valid = |standard: PackingStandard| -> Result<bool, Error> {
            Ok(self.is_standard(ty, standard, full.clone())?.is_valid())
        };
        let pick = |standard, explicit_offsets, requires| BlockLayout {
            standard,
            explicit_offsets,
            requires,
        };

        if std430_allowed && valid(P::Std430)? {
            return Ok(pick(P::Std430, false, None));
        }
        let std140 = self.is_standard(ty, P::Std140, full.clone())?;
        if std140.is_valid() {
            return Ok(pick(P::Std140, false, None));
        }
        if vulkan && valid(P::Scalar)? {
            return Ok(pick(P::Scalar, false, Some(Trigger::ScalarBlockLayout)));
        }
        if std430_allowed && valid(P::Std430EnhancedLayout)? {
            return Ok(pick(P::Std430EnhancedLayout, true, Some(Trigger::EnhancedLayouts)));
        }
        if valid(P::Std140EnhancedLayout)? {
            return Ok(pick(P::Std140EnhancedLayout, true, Some(Trigger::EnhancedLayouts)));
        }
        if vulkan && valid(P::ScalarEnhancedLayout)? {
            return Ok(pick(
                P::ScalarEnhancedLayout,
                true,
                Some(Trigger::ScalarBlockLayout),
            ));
        }
        if !std430_allowed && vulkan && valid(P::Std430)? {
            return Ok(pick(P::Std430, false, Some(Trigger::ScalarBlockLayout)));
        }
        if !std430_allowed && vulkan && valid(P::Std430EnhancedLayout)? {
            return Ok(pick(
                P::Std430EnhancedLayout,
                true,
                Some(Trigger::ScalarBlockLayout),
            ));
        }

        let member = match std140 {
            Validation::Mismatch { member } => member,
            Validation::Valid => 0,
        };
        let member_name = match self.inner(ty)? {
            TypeInner::Struct { members, .. } => {
                members.get(member).and_then(|m| m.name.clone())
            }
            _ => None,
        };
        Err(Error::LayoutInexpressible {
            block: self.module.types[ty]
                .name
                .clone()
                .unwrap_or_else(|| format!("_{}", ty.index())),
            member,
            member_name,
            standard: P::Std140,
        })
    }

    /// Checks a non-struct value against `standard` as the only member of
    /// a block. It sits at offset 0, so only array strides can disagree.
    pub fn is_standard_value(
        &self,
        ty: Handle<Type>,
        standard: PackingStandard,
    ) -> Result<bool, LayoutError> {
        match *self.inner(ty)? {
            TypeInner::Array { base, stride, .. } => {
                if self.array_stride(ty, MatrixMajor::Column, standard)? != stride {
                    return Ok(false);
                }
                self.is_standard_value(base, standard)
            }
            TypeInner::Struct { .. } => Ok(self
                .is_standard(ty, standard.substruct(), 0..u32::MAX)?
                .is_valid()),
            _ => {
                // Sizes must still be answerable.
                self.size(ty, MatrixMajor::Column, standard)?;
                Ok(true)
            }
        }
    }

    /// Picks the packing standard for a non-struct buffer, which is
    /// declared inside a block of its own. `block` names that block in
    /// errors.
    pub fn value_to_packing_standard(
        &self,
        ty: Handle<Type>,
        kind: BufferKind,
        vulkan: bool,
        block: &str,
    ) -> Result<BlockLayout, Error> {
        use PackingStandard as P;

        let std430_allowed = kind != BufferKind::Uniform;
        let pick = |standard, requires| BlockLayout {
            standard,
            explicit_offsets: false,
            requires,
        };
        if std430_allowed && self.is_standard_value(ty, P::Std430)? {
            return Ok(pick(P::Std430, None));
        }
        if self.is_standard_value(ty, P::Std140)? {
            return Ok(pick(P::Std140, None));
        }
        if vulkan && self.is_standard_value(ty, P::Scalar)? {
            return Ok(pick(P::Scalar, Some(Trigger::ScalarBlockLayout)));
        }
        if !std430_allowed && vulkan && self.is_standard_value(ty, P::Std430)? {
            return Ok(pick(P::Std430, Some(Trigger::ScalarBlockLayout)));
        }
        Err(Error::LayoutInexpressible {
            block: block.to_string(),
            member: 0,
            member_name: None,
            standard: P::Std140,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{ArraySize, AddressSpace, MemberLayout, StructMember};

    struct Builder {
        module: Module,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                module: Module::default(),
            }
        }

        fn ty(&mut self, inner: TypeInner) -> Handle<Type> {
            self.module.types.append(Type { name: None, inner })
        }

        fn float(&mut self) -> Handle<Type> {
            self.ty(TypeInner::Scalar(Scalar::F32))
        }

        fn vec(&mut self, n: VectorSize) -> Handle<Type> {
            self.ty(TypeInner::Vector {
                size: n,
                scalar: Scalar::F32,
            })
        }

        fn array(&mut self, base: Handle<Type>, count: u32, stride: u32) -> Handle<Type> {
            self.ty(TypeInner::Array {
                base,
                size: ArraySize::Literal(count),
                stride,
            })
        }

        fn block(&mut self, name: &str, members: &[(Handle<Type>, u32)]) -> Handle<Type> {
            self.strukt(name, members, true)
        }

        fn strukt(&mut self, name: &str, members: &[(Handle<Type>, u32)], is_block: bool) -> Handle<Type> {
            let members = members
                .iter()
                .enumerate()
                .map(|(i, &(ty, offset))| StructMember {
                    name: Some(format!("m{i}")),
                    ty,
                    layout: MemberLayout {
                        offset: Some(offset),
                        ..MemberLayout::default()
                    },
                })
                .collect();
            self.module.types.append(Type {
                name: Some(name.into()),
                inner: TypeInner::Struct { members, is_block },
            })
        }
    }

    fn check(b: &Builder, ty: Handle<Type>, standard: PackingStandard) -> Validation {
        Layouter::new(&b.module)
            .is_standard(ty, standard, 0..u32::MAX)
            .unwrap()
    }

    #[test]
    fn float_then_vec3_at_16() {
        let mut b = Builder::new();
        let f = b.float();
        let v3 = b.vec(VectorSize::Tri);
        let block = b.block("Block", &[(f, 0), (v3, 16)]);
        assert!(check(&b, block, PackingStandard::Std140).is_valid());
        assert!(check(&b, block, PackingStandard::Std430).is_valid());
        assert_eq!(
            check(&b, block, PackingStandard::Scalar),
            Validation::Mismatch { member: 1 }
        );
    }

    #[test]
    fn vector_alignments() {
        let mut b = Builder::new();
        let v2 = b.vec(VectorSize::Bi);
        let v3 = b.vec(VectorSize::Tri);
        let v4 = b.vec(VectorSize::Quad);
        let l = Layouter::new(&b.module);
        let col = MatrixMajor::Column;
        assert_eq!(l.alignment(v2, col, PackingStandard::Std430).unwrap(), 8);
        assert_eq!(l.alignment(v3, col, PackingStandard::Std430).unwrap(), 16);
        assert_eq!(l.alignment(v4, col, PackingStandard::Std140).unwrap(), 16);
        assert_eq!(l.alignment(v3, col, PackingStandard::Scalar).unwrap(), 4);
        assert_eq!(l.alignment(v4, col, PackingStandard::HlslCbuffer).unwrap(), 4);
        assert_eq!(l.size(v3, col, PackingStandard::Std140).unwrap(), 12);
    }

    #[test]
    fn float_array_strides_differ_between_std140_and_std430() {
        let mut b = Builder::new();
        let f = b.float();
        let arr = b.array(f, 4, 16);
        let l = Layouter::new(&b.module);
        let col = MatrixMajor::Column;
        assert_eq!(l.array_stride(arr, col, PackingStandard::Std140).unwrap(), 16);
        assert_eq!(l.array_stride(arr, col, PackingStandard::Std430).unwrap(), 4);
        assert_eq!(l.size(arr, col, PackingStandard::Std140).unwrap(), 64);
        // HLSL drops the unused tail of the last element.
        assert_eq!(l.size(arr, col, PackingStandard::HlslCbuffer).unwrap(), 52);
    }

    #[test]
    fn matrices() {
        let mut b = Builder::new();
        let m3 = b.ty(TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            scalar: Scalar::F32,
        });
        let m42 = b.ty(TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Bi,
            scalar: Scalar::F32,
        });
        let l = Layouter::new(&b.module);
        let col = MatrixMajor::Column;
        let row = MatrixMajor::Row;
        assert_eq!(l.alignment(m3, col, PackingStandard::Std430).unwrap(), 16);
        assert_eq!(l.size(m3, col, PackingStandard::Std430).unwrap(), 48);
        assert_eq!(l.alignment(m42, col, PackingStandard::Std430).unwrap(), 8);
        assert_eq!(l.size(m42, col, PackingStandard::Std430).unwrap(), 32);
        assert_eq!(l.size(m42, col, PackingStandard::Std140).unwrap(), 64);
        assert_eq!(l.alignment(m42, row, PackingStandard::Std430).unwrap(), 16);
        assert_eq!(l.size(m42, row, PackingStandard::Std430).unwrap(), 32);
        assert_eq!(l.size(m3, col, PackingStandard::Scalar).unwrap(), 36);
    }

    #[test]
    fn member_after_struct_is_padded_to_struct_alignment() {
        let mut b = Builder::new();
        let f = b.float();
        let v3 = b.vec(VectorSize::Tri);
        let inner = b.strukt("Inner", &[(v3, 0)], false);
        // std430: Inner aligns to 16 and has size 12, so `f` lands at 16.
        let block = b.block("Outer", &[(inner, 0), (f, 16)]);
        assert!(check(&b, block, PackingStandard::Std430).is_valid());
        let l = Layouter::new(&b.module);
        assert_eq!(
            l.natural_offsets(block, PackingStandard::Std430).unwrap(),
            vec![0, 16]
        );
        assert_eq!(l.size(block, MatrixMajor::Column, PackingStandard::Std430).unwrap(), 20);
    }

    #[test]
    fn substructs_must_follow_companion_standard() {
        let mut b = Builder::new();
        let f = b.float();
        let v3 = b.vec(VectorSize::Tri);
        // Inner is only valid under scalar packing.
        let inner = b.strukt("Inner", &[(f, 0), (v3, 4)], false);
        let block = b.block("Outer", &[(inner, 0)]);
        assert_eq!(
            check(&b, block, PackingStandard::Std430EnhancedLayout),
            Validation::Mismatch { member: 0 }
        );
        assert!(check(&b, block, PackingStandard::ScalarEnhancedLayout).is_valid());
    }

    #[test]
    fn enhanced_standards_accept_aligned_gaps() {
        let mut b = Builder::new();
        let f = b.float();
        let v4 = b.vec(VectorSize::Quad);
        let block = b.block("Gappy", &[(f, 0), (v4, 32)]);
        assert_eq!(
            check(&b, block, PackingStandard::Std140),
            Validation::Mismatch { member: 1 }
        );
        assert!(check(&b, block, PackingStandard::Std140EnhancedLayout).is_valid());

        let misaligned = b.block("Misaligned", &[(f, 0), (v4, 20)]);
        assert!(!check(&b, misaligned, PackingStandard::Std430EnhancedLayout).is_valid());
    }

    #[test]
    fn range_limits_checked_members() {
        let mut b = Builder::new();
        let f = b.float();
        let block = b.block("Ranged", &[(f, 0), (f, 4), (f, 100)]);
        let l = Layouter::new(&b.module);
        assert!(!l.is_standard(block, PackingStandard::Std430, 0..u32::MAX).unwrap().is_valid());
        assert!(l.is_standard(block, PackingStandard::Std430, 0..100).unwrap().is_valid());
    }

    #[test]
    fn hlsl_vectors_may_not_straddle_16_bytes() {
        let mut b = Builder::new();
        let f = b.float();
        let v2 = b.vec(VectorSize::Bi);
        let v3 = b.vec(VectorSize::Tri);
        let packed = b.block("Packed", &[(f, 0), (v3, 4)]);
        assert!(check(&b, packed, PackingStandard::HlslCbuffer).is_valid());
        let straddle = b.block("Straddle", &[(v2, 0), (v3, 8)]);
        assert_eq!(
            check(&b, straddle, PackingStandard::HlslCbuffer),
            Validation::Mismatch { member: 1 }
        );
        let promoted = b.block("Promoted", &[(v2, 0), (v3, 16)]);
        assert!(check(&b, promoted, PackingStandard::HlslCbuffer).is_valid());
    }

    #[test]
    fn trailing_runtime_array_is_allowed() {
        let mut b = Builder::new();
        let f = b.float();
        let v4 = b.vec(VectorSize::Quad);
        let rta = b.ty(TypeInner::Array {
            base: f,
            size: ArraySize::Dynamic,
            stride: 4,
        });
        let block = b.block("Data", &[(v4, 0), (rta, 16)]);
        assert!(check(&b, block, PackingStandard::Std430).is_valid());
        assert_eq!(
            check(&b, block, PackingStandard::Std140),
            Validation::Mismatch { member: 1 }
        );
        let l = Layouter::new(&b.module);
        assert_eq!(
            l.size(rta, MatrixMajor::Column, PackingStandard::Std430),
            Err(LayoutError::UnsizedArray(rta.index()))
        );
    }

    /// Known soundness gap: a trailing array sized by a specialization
    /// expression is accepted without knowing its extent.
    #[test]
    fn spec_sized_trailing_array_is_not_checked() {
        let mut b = Builder::new();
        let f = b.float();
        let v4 = b.vec(VectorSize::Quad);
        let u = b.ty(TypeInner::Scalar(Scalar::U32));
        let base = b.module.constants.append(shadex_ir::Constant {
            name: Some("N".into()),
            ty: u,
            value: shadex_ir::ConstantValue::Scalar(shadex_ir::Literal::U32(4)),
            spec_id: Some(0),
        });
        let doubled = b.module.constants.append(shadex_ir::Constant {
            name: None,
            ty: u,
            value: shadex_ir::ConstantValue::SpecOp {
                op: shadex_ir::BinaryOp::Multiply,
                left: base,
                right: base,
            },
            spec_id: None,
        });
        let tail = b.ty(TypeInner::Array {
            base: f,
            size: ArraySize::Constant(doubled),
            stride: 4,
        });
        let block = b.block("Spec", &[(v4, 0), (tail, 16)]);
        assert!(check(&b, block, PackingStandard::Std430).is_valid());
    }

    #[test]
    fn physical_pointers_are_eight_bytes() {
        let mut b = Builder::new();
        let f = b.float();
        let target = b.strukt("Target", &[(f, 0)], true);
        let ptr = b.ty(TypeInner::Pointer {
            base: target,
            space: AddressSpace::PhysicalStorage,
        });
        let ptrs = b.array(ptr, 2, 16);
        let l = Layouter::new(&b.module);
        let col = MatrixMajor::Column;
        assert_eq!(l.alignment(ptr, col, PackingStandard::Std430).unwrap(), 8);
        assert_eq!(l.size(ptr, col, PackingStandard::Std140).unwrap(), 8);
        assert_eq!(l.alignment(ptrs, col, PackingStandard::Std140).unwrap(), 16);
        assert_eq!(l.array_stride(ptrs, col, PackingStandard::Std430).unwrap(), 8);
    }

    #[test]
    fn missing_offsets_are_errors() {
        let mut b = Builder::new();
        let f = b.float();
        let block = b.module.types.append(Type {
            name: Some("NoOffsets".into()),
            inner: TypeInner::Struct {
                members: vec![StructMember {
                    name: None,
                    ty: f,
                    layout: MemberLayout::default(),
                }],
                is_block: true,
            },
        });
        let l = Layouter::new(&b.module);
        assert_eq!(
            l.is_standard(block, PackingStandard::Std140, 0..u32::MAX),
            Err(LayoutError::MissingOffset {
                ty: block.index(),
                member: 0
            })
        );
    }

    #[test]
    fn classification_order() {
        let mut b = Builder::new();
        let f = b.float();
        let v3 = b.vec(VectorSize::Tri);
        let arr = b.array(f, 4, 4);
        let tight = b.block("Tight", &[(arr, 0)]);
        let scalar = b.block("ScalarOnly", &[(f, 0), (v3, 4)]);
        let gappy_v4 = b.vec(VectorSize::Quad);
        let gappy = b.block("Gappy", &[(gappy_v4, 0), (f, 64)]);
        let l = Layouter::new(&b.module);

        let ssbo = l
            .buffer_to_packing_standard(tight, BufferKind::Storage, false)
            .unwrap();
        assert_eq!(ssbo.standard, PackingStandard::Std430);
        assert!(!ssbo.explicit_offsets);

        // std430 arrays in a UBO need scalar block layout.
        assert!(matches!(
            l.buffer_to_packing_standard(tight, BufferKind::Uniform, false),
            Err(Error::LayoutInexpressible { member: 0, .. })
        ));
        let ubo = l
            .buffer_to_packing_standard(tight, BufferKind::Uniform, true)
            .unwrap();
        assert_eq!(ubo.standard, PackingStandard::Scalar);
        assert_eq!(ubo.requires, Some(Trigger::ScalarBlockLayout));

        let vk = l
            .buffer_to_packing_standard(scalar, BufferKind::Storage, true)
            .unwrap();
        assert_eq!(vk.standard, PackingStandard::Scalar);

        let enhanced = l
            .buffer_to_packing_standard(gappy, BufferKind::Uniform, false)
            .unwrap();
        assert_eq!(enhanced.standard, PackingStandard::Std140EnhancedLayout);
        assert!(enhanced.explicit_offsets);
        assert_eq!(enhanced.requires, Some(Trigger::EnhancedLayouts));
    }

    #[test]
    fn display_and_predicates() {
        assert_eq!(PackingStandard::Std430.to_string(), "std430");
        assert_eq!(
            PackingStandard::Std140EnhancedLayout.to_string(),
            "std140 with explicit offsets"
        );
        assert!(PackingStandard::HlslCbufferPackOffset.is_vec4_padded());
        assert!(PackingStandard::HlslCbufferPackOffset.has_flexible_offset());
        assert!(!PackingStandard::Std430.is_vec4_padded());
        assert_eq!(
            PackingStandard::ScalarEnhancedLayout.substruct(),
            PackingStandard::Scalar
        );
    }

    #[test]
    fn hlsl_natural_offsets_keep_vectors_in_one_register() {
        let mut b = Builder::new();
        let f = b.float();
        let v2 = b.vec(VectorSize::Bi);
        let v3 = b.vec(VectorSize::Tri);
        let straddling = b.block("Straddling", &[(v2, 0), (v3, 16)]);
        let packed = b.block("Packed", &[(v2, 0), (f, 8)]);
        let l = Layouter::new(&b.module);

        assert_eq!(
            l.natural_offsets(straddling, PackingStandard::HlslCbuffer).unwrap(),
            [0, 16]
        );
        assert!(check(&b, straddling, PackingStandard::HlslCbuffer).is_valid());
        assert_eq!(
            l.natural_offsets(packed, PackingStandard::HlslCbuffer).unwrap(),
            [0, 8]
        );
        // Without the register rule the vec3 packs right after the vec2.
        assert_eq!(
            l.natural_offsets(straddling, PackingStandard::Scalar).unwrap(),
            [0, 8]
        );
    }

    #[test]
    fn offsets_past_four_gigabytes_are_errors() {
        let mut b = Builder::new();
        let f = b.float();
        let v4 = b.vec(VectorSize::Quad);
        let huge = b.array(v4, 300_000_000, 16);
        let edge = b.block("Edge", &[(f, u32::MAX - 3), (f, 0)]);
        let l = Layouter::new(&b.module);

        assert_eq!(
            l.size(huge, MatrixMajor::Column, PackingStandard::Std430),
            Err(LayoutError::TooLarge(huge.index()))
        );
        assert_eq!(
            l.is_standard(edge, PackingStandard::Std430EnhancedLayout, 0..u32::MAX),
            Err(LayoutError::TooLarge(edge.index()))
        );
    }

    #[test]
    fn inexpressible_block_names_the_member() {
        let mut b = Builder::new();
        let f = b.float();
        let v3 = b.vec(VectorSize::Tri);
        let block = b.block("Misaligned", &[(f, 0), (v3, 4)]);
        let l = Layouter::new(&b.module);

        let err = l
            .buffer_to_packing_standard(block, BufferKind::Uniform, false)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LayoutInexpressible { member: 1, ref member_name, .. }
                if member_name.as_deref() == Some("m1")
        ));
        assert!(err.to_string().contains("member 1 `m1`"));
    }

    #[test]
    fn wrapped_arrays_follow_their_stride() {
        let mut b = Builder::new();
        let f = b.float();
        let tight = b.array(f, 4, 4);
        let padded = b.array(f, 4, 16);
        let odd = b.array(f, 4, 8);
        let l = Layouter::new(&b.module);
        let standard = |ty, kind, vulkan| {
            l.value_to_packing_standard(ty, kind, vulkan, "Data")
                .map(|layout| (layout.standard, layout.requires))
        };

        assert_eq!(
            standard(tight, BufferKind::Storage, false).unwrap(),
            (PackingStandard::Std430, None)
        );
        assert_eq!(
            standard(padded, BufferKind::Storage, false).unwrap(),
            (PackingStandard::Std140, None)
        );
        assert_eq!(
            standard(padded, BufferKind::Uniform, false).unwrap(),
            (PackingStandard::Std140, None)
        );
        assert_eq!(
            standard(tight, BufferKind::Uniform, true).unwrap(),
            (PackingStandard::Scalar, Some(Trigger::ScalarBlockLayout))
        );
        assert!(matches!(
            standard(tight, BufferKind::Uniform, false),
            Err(Error::LayoutInexpressible { ref block, member: 0, .. }) if block == "Data"
        ));
        for vulkan in [false, true] {
            assert!(matches!(
                standard(odd, BufferKind::Storage, vulkan),
                Err(Error::LayoutInexpressible { .. })
            ));
        }
        // Scalars and vectors always fit at offset 0.
        assert_eq!(
            standard(f, BufferKind::Uniform, false).unwrap(),
            (PackingStandard::Std140, None)
        );
    }
}
