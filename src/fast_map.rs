use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hasher;
use core::ops::Index;

use crate::bucket_index::BucketIndex;
use crate::bucket_index::MIN_BUCKETS;
use crate::dense_store::DenseIndex;
use crate::dense_store::EntryArena;
use crate::hash::BytesState;
use crate::key::ByteKey;

/// Fraction of the buckets that may be occupied before the table doubles.
pub const MAX_LOAD_FACTOR: f32 = 0.80;

// MAX_LOAD_FACTOR as an exact ratio.
const LOAD_NUMERATOR: usize = 4;
const LOAD_DENOMINATOR: usize = 5;

/// Largest entry count `bucket_count` buckets may hold.
#[inline(always)]
fn max_load(bucket_count: usize) -> usize {
    bucket_count / LOAD_DENOMINATOR * LOAD_NUMERATOR
        + bucket_count % LOAD_DENOMINATOR * LOAD_NUMERATOR / LOAD_DENOMINATOR
}

/// Smallest bucket count that holds `entries` within the load factor.
fn buckets_for(entries: usize) -> usize {
    let needed = entries
        .checked_mul(LOAD_DENOMINATOR)
        .map(|n| n.div_ceil(LOAD_NUMERATOR))
        .and_then(usize::checked_next_power_of_two)
        .expect("FastMap capacity overflow");
    needed.max(MIN_BUCKETS)
}

/// A hash map keeping its entries densely packed, indexed by a Robin Hood
/// bucket array.
///
/// Keys are [`ByteKey`]s: fixed-size plain-old-data compared by their bytes.
/// Entries live in three parallel columns (keys, values, cached hashes) with no
/// gaps; the buckets hold only 4-byte indices into those columns. Lookups
/// probe linearly from the key's ideal bucket and stop as soon as the key
/// could no longer appear. Removal moves the last entry into the freed
/// position and shifts the following buckets back, so no tombstones are left.
///
/// The hasher builder `S` defaults to [`BytesState`], which hashes each key's
/// bytes with [`hash_bytes`](crate::hash::hash_bytes).
///
/// # Performance Characteristics
///
/// - **Memory**: `size_of::<K>() + size_of::<V>() + 8` bytes per entry, plus
///   4 bytes per bucket at a load factor of at most 80%.
/// - **Iteration** walks the dense columns and never touches empty buckets.
///
/// # Examples
///
/// ```rust
/// use fastmap::FastMap;
///
/// let mut map = FastMap::new();
/// map.put(10i32, 100i32);
/// map.put(20, 200);
///
/// assert_eq!(map.get(&10), Some(&100));
/// assert!(map.erase(&20));
/// assert_eq!(map.get(&20), None);
/// assert_eq!(map.len(), 1);
/// ```
#[derive(Clone)]
pub struct FastMap<K, V, S = BytesState> {
    arena: EntryArena<K, V>,
    index: BucketIndex,
    hash_builder: S,
}

impl<K, V, S> Debug for FastMap<K, V, S>
where
    K: ByteKey + Debug,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: ByteKey, V> FastMap<K, V, BytesState> {
    /// Creates an empty map with 16 buckets.
    ///
    /// # Panics
    ///
    /// Panics if `K` is zero-sized.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastMap;
    ///
    /// let map: FastMap<u64, f32> = FastMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.bucket_count(), 16);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(BytesState)
    }

    /// Creates an empty map that holds at least `capacity` entries before
    /// growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastMap;
    ///
    /// let map: FastMap<u32, u32> = FastMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, BytesState)
    }
}

impl<K, V, S> Default for FastMap<K, V, S>
where
    K: ByteKey,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> FastMap<K, V, S>
where
    K: ByteKey,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    ///
    /// # Panics
    ///
    /// Panics if `K` is zero-sized.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates an empty map that holds at least `capacity` entries before
    /// growing, using the given hasher builder.
    ///
    /// # Panics
    ///
    /// Panics if `K` is zero-sized.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::BytesState;
    /// use fastmap::FastMap;
    ///
    /// let map: FastMap<u32, u32> = FastMap::with_capacity_and_hasher(1000, BytesState);
    /// assert!(map.capacity() >= 1000);
    /// assert!(map.bucket_count().is_power_of_two());
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        assert!(
            core::mem::size_of::<K>() > 0,
            "FastMap keys must not be zero-sized"
        );
        Self {
            arena: EntryArena::with_capacity(capacity),
            index: BucketIndex::with_bucket_count(buckets_for(capacity)),
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of buckets. Always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.index.bucket_count()
    }

    /// Returns how many entries fit before the next insertion doubles the
    /// bucket count.
    ///
    /// The table never holds more than `bucket_count * MAX_LOAD_FACTOR`
    /// entries.
    pub fn capacity(&self) -> usize {
        max_load(self.bucket_count())
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        hasher.write(bytemuck::bytes_of(key));
        hasher.finish()
    }

    /// Hashes an already canonical key and finds its bucket slot and dense
    /// position.
    #[inline]
    fn find(&self, key: &K) -> (u64, Option<(usize, DenseIndex)>) {
        let hash = self.hash_key(key);
        self.index.prefetch(hash);
        let bytes = bytemuck::bytes_of(key);
        let found = self.index.find(hash, self.arena.hashes(), |i| {
            bytemuck::bytes_of(self.arena.key(i)) == bytes
        });
        (hash, found)
    }

    /// Doubles the bucket count if one more entry would exceed the load
    /// factor.
    #[inline]
    fn grow_if_full(&mut self) {
        if self.len() >= self.capacity() {
            self.index
                .rebuild(self.bucket_count() * 2, self.arena.hashes());
        }
    }

    /// Inserts or overwrites the value for `key`.
    ///
    /// Returns the previous value if the key was present. An overwrite leaves
    /// the entry where it is.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastMap;
    ///
    /// let mut map = FastMap::new();
    /// assert_eq!(map.put(1u8, "a"), None);
    /// assert_eq!(map.put(1u8, "b"), Some("a"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.grow_if_full();

        let key = key.canonical();
        let (hash, found) = self.find(&key);
        if let Some((_, index)) = found {
            return Some(core::mem::replace(self.arena.value_mut(index), value));
        }

        let index = self.arena.push(key, value, hash);
        self.index.place(hash, index, self.arena.hashes());
        None
    }

    /// Returns a reference to the value for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastMap;
    ///
    /// let mut map = FastMap::new();
    /// map.put(-0.0f64, 'z');
    /// assert_eq!(map.get(&0.0), Some(&'z'));
    /// assert_eq!(map.get(&1.0), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let (_, found) = self.find(&key.canonical());
        found.map(|(_, index)| self.arena.value(index))
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (_, found) = self.find(&key.canonical());
        found.map(|(_, index)| self.arena.value_mut(index))
    }

    /// Returns `true` if the map holds `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, returning whether it was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fastmap::FastMap;
    ///
    /// let mut map = FastMap::new();
    /// map.put(7u16, ());
    /// assert!(map.erase(&7));
    /// assert!(!map.erase(&7));
    /// ```
    pub fn erase(&mut self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value if it was present.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        if self.is_empty() {
            return None;
        }

        let (_, found) = self.find(&key.canonical());
        let (slot, index) = found?;

        let removed = self.arena.swap_remove(index);
        if let Some(moved_from) = removed.moved_from {
            self.index
                .repoint(self.arena.hash(index), moved_from, index);
        }
        self.index.backward_shift(slot, self.arena.hashes());

        Some((removed.key, removed.value))
    }

    /// Makes room for at least `additional` more entries without growing.
    pub fn reserve(&mut self, additional: usize) {
        let wanted = self
            .len()
            .checked_add(additional)
            .expect("FastMap capacity overflow");
        let buckets = buckets_for(wanted);
        if buckets > self.bucket_count() {
            self.index.rebuild(buckets, self.arena.hashes());
        }
        self.arena.reserve(additional);
    }

    /// Removes every entry, keeping the allocated storage.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
    }

    /// Releases all storage held by the map.
    ///
    /// Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }

    /// Iterates over the entries in storage order.
    ///
    /// The order is not meaningful: it is insertion order until the first
    /// removal, after which removed positions are filled by the last entry.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.arena.keys().iter().zip(self.arena.values()),
        }
    }

    /// Iterates over the entries with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let (keys, values) = self.arena.keys_and_values_mut();
        IterMut {
            inner: keys.iter().zip(values.iter_mut()),
        }
    }

    /// Iterates over the keys in storage order.
    pub fn keys(&self) -> core::slice::Iter<'_, K> {
        self.arena.keys().iter()
    }

    /// Iterates over the values in storage order.
    pub fn values(&self) -> core::slice::Iter<'_, V> {
        self.arena.values().iter()
    }

    /// Iterates mutably over the values in storage order.
    pub fn values_mut(&mut self) -> core::slice::IterMut<'_, V> {
        self.arena.values_mut().iter_mut()
    }

    /// Counts entries by displacement from their ideal bucket.
    ///
    /// `histogram[d]` is the number of entries sitting `d` buckets past their
    /// ideal one; a lookup for such an entry probes `d + 1` buckets.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> alloc::vec::Vec<usize> {
        self.index.probe_histogram(self.arena.hashes())
    }

    /// Returns occupancy and probe-length statistics.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let histogram = self.probe_histogram();
        let total_displacement: usize = histogram.iter().enumerate().map(|(d, &n)| d * n).sum();

        DebugStats {
            populated: self.len(),
            capacity: self.capacity(),
            bucket_count: self.bucket_count(),
            load_factor: self.len() as f64 / self.bucket_count() as f64,
            max_displacement: histogram.len().saturating_sub(1),
            mean_displacement: if self.is_empty() {
                0.0
            } else {
                total_displacement as f64 / self.len() as f64
            },
            total_bytes: self.arena.allocated_bytes()
                + self.bucket_count() * core::mem::size_of::<u32>(),
        }
    }

    /// Pretty-prints the probe histogram as a horizontal bar chart.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_probe_histogram(&self) {
        let histogram = self.probe_histogram();
        let max = histogram.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        println!("probe histogram ({} entries):", self.len());
        for (distance, &count) in histogram.iter().enumerate() {
            let width = (count * max_bar).div_ceil(max);
            println!("{:>3} | {} ({})", distance, "█".repeat(width), count);
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.index.assert_consistent(self.arena.hashes());
        assert!(self.len() <= self.capacity());
        for (i, key) in self.arena.keys().iter().enumerate() {
            assert_eq!(
                self.arena.hashes()[i],
                self.hash_key(key),
                "cached hash of entry #{i} is stale"
            );
        }
    }
}

/// Occupancy and probe-length statistics for a [`FastMap`].
///
/// Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries in the map
    pub populated: usize,
    /// Entries that fit before the next resize
    pub capacity: usize,
    /// Number of buckets
    pub bucket_count: usize,
    /// Load factor (populated / bucket_count)
    pub load_factor: f64,
    /// Largest distance of any entry from its ideal bucket
    pub max_displacement: usize,
    /// Mean distance of the entries from their ideal buckets
    pub mean_displacement: f64,
    /// Bytes allocated for the columns and the buckets
    pub total_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== FastMap Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.bucket_count,
            self.load_factor * 100.0
        );
        println!("Capacity before resize: {}", self.capacity);
        println!(
            "Displacement: max {}, mean {:.3}",
            self.max_displacement, self.mean_displacement
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

impl<K, V, S> Index<&K> for FastMap<K, V, S>
where
    K: ByteKey,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found in FastMap")
    }
}

impl<K, V, S> Extend<(K, V)> for FastMap<K, V, S>
where
    K: ByteKey,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for FastMap<K, V, S>
where
    K: ByteKey,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a FastMap<K, V, S>
where
    K: ByteKey,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`FastMap`], in storage order.
pub struct Iter<'a, K, V> {
    inner: core::iter::Zip<core::slice::Iter<'a, K>, core::slice::Iter<'a, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Iterator over the entries of a [`FastMap`] with mutable values.
pub struct IterMut<'a, K, V> {
    inner: core::iter::Zip<core::slice::Iter<'a, K>, core::slice::IterMut<'a, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
