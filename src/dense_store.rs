//! Dense entry storage.
//!
//! Entries live packed at the front of three parallel columns (keys, values,
//! cached hashes). The bucket index refers to them by [`DenseIndex`]. Removal
//! is swap-and-pop, so the columns never have holes.

use alloc::vec::Vec;
use core::fmt::Debug;

/// Capacity of a column's first allocation.
const INITIAL_CAPACITY: usize = 8;

/// Position of an entry in the dense columns.
///
/// Kept distinct from plain integers so it can't be mixed up with a hash or a
/// bucket slot. `u32::MAX` is reserved as the bucket index's empty marker and
/// is never a valid dense index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DenseIndex(u32);

impl DenseIndex {
    /// Raw value marking an empty bucket slot.
    pub(crate) const EMPTY: u32 = u32::MAX;

    /// Wraps a column position.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit below [`DenseIndex::EMPTY`].
    #[inline(always)]
    pub(crate) fn new(index: usize) -> Self {
        assert!(
            index < Self::EMPTY as usize,
            "dense index {index} exceeds the maximum entry count"
        );
        DenseIndex(index as u32)
    }

    /// Rebuilds an index from a bucket slot; `None` for the empty marker.
    #[inline(always)]
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        (raw != Self::EMPTY).then_some(DenseIndex(raw))
    }

    #[inline(always)]
    pub(crate) fn raw(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Debug for DenseIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A growable column of fixed-stride elements.
///
/// Capacity starts at [`INITIAL_CAPACITY`] and doubles on overflow. Running
/// out of memory aborts through the global allocation error handler.
#[derive(Clone)]
pub(crate) struct Column<T> {
    items: Vec<T>,
}

impl<T> Column<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.items.capacity()
    }

    #[inline]
    pub(crate) fn push(&mut self, item: T) {
        if self.items.len() == self.items.capacity() {
            self.grow();
        }
        self.items.push(item);
    }

    #[cold]
    fn grow(&mut self) {
        let new_capacity = if self.capacity() == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity()
                .checked_mul(2)
                .expect("column capacity overflow")
        };
        self.items.reserve_exact(new_capacity - self.items.len());
    }

    /// Makes room for `additional` more elements without further growth.
    pub(crate) fn reserve(&mut self, additional: usize) {
        self.items.reserve_exact(additional);
    }

    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline(always)]
    pub(crate) fn at(&self, index: usize) -> &T {
        &self.items[index]
    }

    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline(always)]
    pub(crate) fn at_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }

    /// Drops the length by one and hands back the last element. The
    /// allocation is kept.
    #[inline(always)]
    pub(crate) fn truncate_by_one(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Moves the last element into `index` and returns what was there.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub(crate) fn swap_remove(&mut self, index: usize) -> T {
        let last = match self.items.len().checked_sub(1) {
            Some(last) if index <= last => last,
            _ => panic!(
                "swap_remove index {index} out of bounds for column of length {}",
                self.items.len()
            ),
        };
        self.items.swap(index, last);
        let Some(item) = self.truncate_by_one() else {
            unreachable!()
        };
        item
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    #[inline(always)]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline(always)]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}

/// The three entry columns, kept the same length by construction.
#[derive(Clone)]
pub(crate) struct EntryArena<K, V> {
    keys: Column<K>,
    values: Column<V>,
    hashes: Column<u64>,
}

/// An entry taken out of the arena by [`EntryArena::swap_remove`].
pub(crate) struct Removed<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Where the entry now occupying the removed position used to live, if
    /// one was moved.
    pub(crate) moved_from: Option<DenseIndex>,
}

impl<K, V> EntryArena<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Column::with_capacity(capacity),
            values: Column::with_capacity(capacity),
            hashes: Column::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.keys.len(), self.values.len());
        debug_assert_eq!(self.keys.len(), self.hashes.len());
        self.keys.len()
    }

    /// Appends an entry and returns its dense index.
    pub(crate) fn push(&mut self, key: K, value: V, hash: u64) -> DenseIndex {
        let index = DenseIndex::new(self.len());
        self.keys.push(key);
        self.values.push(value);
        self.hashes.push(hash);
        index
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.keys.reserve(additional);
        self.values.reserve(additional);
        self.hashes.reserve(additional);
    }

    /// Removes the entry at `index`, moving the last entry into its place.
    pub(crate) fn swap_remove(&mut self, index: DenseIndex) -> Removed<K, V> {
        let last = self.len() - 1;
        let key = self.keys.swap_remove(index.as_usize());
        let value = self.values.swap_remove(index.as_usize());
        // The hash is dropped; the caller already used it to find the entry.
        self.hashes.swap_remove(index.as_usize());

        Removed {
            key,
            value,
            moved_from: (index.as_usize() != last).then(|| DenseIndex::new(last)),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.hashes.clear();
    }

    #[inline(always)]
    pub(crate) fn key(&self, index: DenseIndex) -> &K {
        self.keys.at(index.as_usize())
    }

    #[inline(always)]
    pub(crate) fn value(&self, index: DenseIndex) -> &V {
        self.values.at(index.as_usize())
    }

    #[inline(always)]
    pub(crate) fn value_mut(&mut self, index: DenseIndex) -> &mut V {
        self.values.at_mut(index.as_usize())
    }

    #[inline(always)]
    pub(crate) fn hash(&self, index: DenseIndex) -> u64 {
        *self.hashes.at(index.as_usize())
    }

    #[inline(always)]
    pub(crate) fn keys(&self) -> &[K] {
        self.keys.as_slice()
    }

    #[inline(always)]
    pub(crate) fn values(&self) -> &[V] {
        self.values.as_slice()
    }

    #[inline(always)]
    pub(crate) fn values_mut(&mut self) -> &mut [V] {
        self.values.as_mut_slice()
    }

    #[inline(always)]
    pub(crate) fn keys_and_values_mut(&mut self) -> (&[K], &mut [V]) {
        (self.keys.as_slice(), self.values.as_mut_slice())
    }

    #[inline(always)]
    pub(crate) fn hashes(&self) -> &[u64] {
        self.hashes.as_slice()
    }

    /// Bytes currently allocated across the three columns.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn allocated_bytes(&self) -> usize {
        self.keys.capacity() * core::mem::size_of::<K>()
            + self.values.capacity() * core::mem::size_of::<V>()
            + self.hashes.capacity() * core::mem::size_of::<u64>()
    }
}
