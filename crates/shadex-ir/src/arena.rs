//! Append-only storage addressed by typed handles.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::IrError;

/// A typed index into an [`Arena`].
///
/// Handles are plain `u32` indices tagged with the element type, so a
/// `Handle<Type>` can never be used to look up a global variable.
pub struct Handle<T> {
    index: u32,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.index)
    }
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _phantom: PhantomData,
        }
    }

    /// Builds a handle from a raw index.
    ///
    /// Returns `None` when the index does not fit in 32 bits. The handle is
    /// not checked against any arena; use [`Arena::fetch`] for that.
    pub fn from_usize(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self::new)
    }

    /// Returns the zero-based index of this handle.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// A half-open range of [`Handle`]s: `[first, last)`.
pub struct Range<T> {
    first: u32,
    last: u32,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Range<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Range<T> {}

impl<T> PartialEq for Range<T> {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first && self.last == other.last
    }
}

impl<T> Eq for Range<T> {}

impl<T> fmt::Debug for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.first, self.last)
    }
}

impl<T> Range<T> {
    /// Creates a range from raw u32 indices.
    pub fn from_index_range(range: std::ops::Range<u32>) -> Self {
        Self {
            first: range.start,
            last: range.end,
            _phantom: PhantomData,
        }
    }

    /// Returns `true` if the range contains no handles.
    pub fn is_empty(&self) -> bool {
        self.first >= self.last
    }

    /// Returns `true` if `handle` falls inside the range.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        (self.first..self.last).contains(&handle.index)
    }

    /// Iterates over every handle in the range.
    pub fn iter(&self) -> impl Iterator<Item = Handle<T>> + use<T> {
        (self.first..self.last).map(Handle::new)
    }
}

/// An append-only arena with typed [`Handle`]-based access.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the handle that the next [`append`](Self::append) will produce.
    pub fn next_handle(&self) -> Handle<T> {
        let index = u32::try_from(self.data.len()).unwrap_or_else(|_| {
            panic!("arena overflow: {} items exceeds u32::MAX", self.data.len())
        });
        Handle::new(index)
    }

    /// Appends a value and returns its handle.
    pub fn append(&mut self, value: T) -> Handle<T> {
        let handle = self.next_handle();
        self.data.push(value);
        handle
    }

    /// Appends several values and returns the range of handles they occupy.
    pub fn append_range(&mut self, values: impl IntoIterator<Item = T>) -> Range<T> {
        let first = self.next_handle().index;
        for value in values {
            self.append(value);
        }
        Range::from_index_range(first..self.next_handle().index)
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.data.get(handle.index())
    }

    /// Looks up a handle, reporting a dangling one as an [`IrError`].
    pub fn fetch(&self, handle: Handle<T>) -> Result<&T, IrError> {
        self.data.get(handle.index()).ok_or(IrError::BadHandle {
            kind: std::any::type_name::<T>()
                .rsplit("::")
                .next()
                .unwrap_or("value"),
            index: handle.index(),
            len: self.data.len(),
        })
    }

    /// Iterates over `(handle, &value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        // Arena size is bounded by u32::MAX (enforced in append).
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }

    /// Iterates over `(handle, &mut value)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.data[handle.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_index() {
        let mut arena = Arena::new();
        let a = arena.append("block");
        let b = arena.append("member");
        assert_eq!(arena[a], "block");
        assert_eq!(arena[b], "member");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn iteration_yields_handles_in_order() {
        let mut arena = Arena::new();
        arena.append(16u32);
        arena.append(32);
        arena.append(64);
        let items: Vec<_> = arena.iter().map(|(h, &v)| (h.index(), v)).collect();
        assert_eq!(items, vec![(0, 16), (1, 32), (2, 64)]);
    }

    #[test]
    fn append_range_covers_new_values() {
        let mut arena = Arena::new();
        arena.append('a');
        let range = arena.append_range(['b', 'c']);
        let handles: Vec<_> = range.iter().map(Handle::index).collect();
        assert_eq!(handles, vec![1, 2]);
        assert!(range.contains(Handle::new(2)));
        assert!(!range.contains(Handle::new(0)));
    }

    #[test]
    fn empty_range() {
        let range = Range::<u32>::from_index_range(3..3);
        assert!(range.is_empty());
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn fetch_reports_dangling_handle() {
        let mut arena = Arena::new();
        let h = arena.append(7i32);
        assert_eq!(arena.fetch(h), Ok(&7));
        let err = arena.fetch(Handle::new(9)).unwrap_err();
        assert_eq!(
            err,
            IrError::BadHandle {
                kind: "i32",
                index: 9,
                len: 1
            }
        );
    }

    #[test]
    fn handle_ordering_and_conversion() {
        let h0: Handle<u8> = Handle::new(0);
        let h1 = Handle::<u8>::from_usize(1).unwrap();
        assert!(h0 < h1);
        assert_eq!(h1.index(), 1);
    }
}
