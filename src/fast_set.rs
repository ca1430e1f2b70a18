use core::fmt::Debug;
use core::hash::BuildHasher;

use crate::fast_map::FastMap;
use crate::hash::BytesState;
use crate::key::ByteKey;

/// A hash set of byte-comparable values, stored as a [`FastMap`] with `()`
/// values.
///
/// # Performance Characteristics
///
/// - **Memory**: `size_of::<T>() + 8` bytes per entry, plus 4 bytes per
///   bucket.
#[derive(Clone)]
pub struct FastSet<T, S = BytesState> {
    map: FastMap<T, (), S>,
}

impl<T, S> PartialEq for FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl<T, S> Eq for FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher,
{
}

impl<T, S> Debug for FastSet<T, S>
where
    T: ByteKey + Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: ByteKey> FastSet<T, BytesState> {
    /// Creates an empty set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastSet;
    ///
    /// let set: FastSet<u32> = FastSet::new();
    /// assert!(set.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(BytesState)
    }

    /// Creates an empty set that holds at least `capacity` values before
    /// growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, BytesState)
    }
}

impl<T, S> Default for FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, S> FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher,
{
    /// Creates an empty set with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            map: FastMap::with_hasher(hash_builder),
        }
    }

    /// Creates an empty set with the specified capacity and hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            map: FastMap::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the set contains no values.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns how many values fit before the set grows.
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    /// Removes all values, keeping the allocated storage.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Makes room for at least `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    /// Adds a value, returning `true` if it was not already present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastSet;
    ///
    /// let mut set = FastSet::new();
    /// assert!(set.insert(3u64));
    /// assert!(!set.insert(3u64));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> bool {
        self.map.put(value, ()).is_none()
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.map.contains_key(value)
    }

    /// Removes `value`, returning `true` if it was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.map.erase(value)
    }

    /// Removes and returns the stored copy of `value`, if present.
    pub fn take(&mut self, value: &T) -> Option<T> {
        self.map.remove_entry(value).map(|(value, ())| value)
    }

    /// Iterates over the values in storage order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.map.keys()
    }

    /// Returns `true` if every value of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|v| other.contains(v))
    }

    /// Returns `true` if `self` and `other` share no value.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        !small.iter().any(|v| large.contains(v))
    }
}

impl<T, S> Extend<T> for FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, S> FromIterator<T> for FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut set = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        set.extend(iter);
        set
    }
}

impl<'a, T, S> IntoIterator for &'a FastSet<T, S>
where
    T: ByteKey,
    S: BuildHasher,
{
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn insert_contains_remove() {
        let mut set: FastSet<i64> = FastSet::new();
        assert!(set.insert(-5));
        assert!(set.insert(5));
        assert!(!set.insert(-5));

        assert!(set.contains(&-5));
        assert!(!set.contains(&6));

        assert!(set.remove(&-5));
        assert!(!set.remove(&-5));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn take_returns_canonical_value() {
        let mut set: FastSet<f32> = FastSet::new();
        set.insert(-0.0);
        let taken = set.take(&0.0).unwrap();
        assert_eq!(taken.to_bits(), 0.0f32.to_bits());
        assert!(set.is_empty());
    }

    #[test]
    fn equality_ignores_order() {
        let a: FastSet<u32> = (0..100).collect();
        let b: FastSet<u32> = (0..100).rev().collect();
        assert_eq!(a, b);

        let c: FastSet<u32> = (0..99).collect();
        assert_ne!(a, c);
        assert!(c.is_subset(&a));
        assert!(!a.is_subset(&c));
    }

    #[test]
    fn disjoint_sets() {
        let evens: FastSet<u32> = (0..50).map(|i| i * 2).collect();
        let odds: FastSet<u32> = (0..50).map(|i| i * 2 + 1).collect();
        assert!(evens.is_disjoint(&odds));

        let mut mixed = odds.clone();
        mixed.insert(10);
        assert!(!evens.is_disjoint(&mixed));
    }

    #[test]
    fn iter_and_clear() {
        let mut set: FastSet<[u8; 4]> = FastSet::new();
        set.extend([*b"abcd", *b"efgh", *b"abcd"]);
        let mut values: Vec<[u8; 4]> = set.iter().copied().collect();
        values.sort_unstable();
        assert_eq!(values, [*b"abcd", *b"efgh"]);

        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(b"abcd"));
    }
}
