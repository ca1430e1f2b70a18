//! The sparse bucket index.
//!
//! A power-of-two array of slots, each empty or holding the [`DenseIndex`] of
//! one entry. Entries are placed with Robin Hood linear probing: an entry's
//! *displacement* is how many slots it sits past its ideal slot
//! (`hash & mask`), and on a collision the slot goes to whichever entry is
//! displaced further. Removal closes the gap with a backward shift, so there
//! are no tombstones.
//!
//! Invariants, for a table with `n` entries:
//! - every dense index in `0..n` is referenced by exactly one slot;
//! - an entry at slot `s` with ideal slot `i` has every slot in `i..s`
//!   (cyclically) occupied by entries displaced at least as far as it would be
//!   there, so a probe for it may stop at the first slot whose occupant is
//!   displaced less than the probe distance.
//!
//! The index never hashes keys. All hashes come from the arena's cached hash
//! column, passed in as `hashes` and indexed by dense index.

use alloc::boxed::Box;
use alloc::vec;

use crate::dense_store::DenseIndex;
use crate::prefetch;

/// Smallest bucket count a table is created with.
pub(crate) const MIN_BUCKETS: usize = 16;

const EMPTY: u32 = DenseIndex::EMPTY;

#[derive(Clone)]
pub(crate) struct BucketIndex {
    slots: Box<[u32]>,
    mask: usize,
}

impl BucketIndex {
    /// Creates an index of `bucket_count` empty slots.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is not a power of two.
    pub(crate) fn with_bucket_count(bucket_count: usize) -> Self {
        assert!(
            bucket_count.is_power_of_two(),
            "bucket count {bucket_count} is not a power of two"
        );
        Self {
            slots: vec![EMPTY; bucket_count].into_boxed_slice(),
            mask: bucket_count - 1,
        }
    }

    #[inline(always)]
    pub(crate) fn bucket_count(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    fn ideal_slot(&self, hash: u64) -> usize {
        hash as usize & self.mask
    }

    #[inline(always)]
    fn next_slot(&self, slot: usize) -> usize {
        (slot + 1) & self.mask
    }

    /// Distance from the ideal slot of `hash` forward to `slot`, wrapping.
    #[inline(always)]
    fn displacement(&self, slot: usize, hash: u64) -> usize {
        slot.wrapping_sub(self.ideal_slot(hash)) & self.mask
    }

    #[inline(always)]
    fn get(&self, slot: usize) -> Option<DenseIndex> {
        DenseIndex::from_raw(self.slots[slot])
    }

    #[inline(always)]
    pub(crate) fn prefetch(&self, hash: u64) {
        prefetch(&self.slots[self.ideal_slot(hash)]);
    }

    /// Inserts a reference to `index`, whose hash is `hash`.
    ///
    /// The caller guarantees at least one empty slot. Entries met on the way
    /// that are displaced less than the incoming one are evicted and carried
    /// forward in its place.
    pub(crate) fn place(&mut self, hash: u64, index: DenseIndex, hashes: &[u64]) {
        debug_assert_eq!(hashes[index.as_usize()], hash);

        let mut slot = self.ideal_slot(hash);
        let mut incoming = index;
        let mut distance = 0;

        // Every step advances one slot, so the first empty slot is reached
        // within one lap no matter how many evictions happen.
        for _ in 0..self.bucket_count() {
            let Some(occupant) = self.get(slot) else {
                self.slots[slot] = incoming.raw();
                return;
            };

            let occupant_distance = self.displacement(slot, hashes[occupant.as_usize()]);
            if occupant_distance < distance {
                self.slots[slot] = incoming.raw();
                incoming = occupant;
                distance = occupant_distance;
            }

            slot = self.next_slot(slot);
            distance += 1;
        }

        panic!(
            "bucket index full: no empty slot among {} buckets",
            self.bucket_count()
        );
    }

    /// Replaces this index with one of `bucket_count` slots holding every
    /// entry of `hashes`.
    ///
    /// The new slots are filled completely before they replace the old ones.
    pub(crate) fn rebuild(&mut self, bucket_count: usize, hashes: &[u64]) {
        let mut rebuilt = Self::with_bucket_count(bucket_count);
        for (index, &hash) in hashes.iter().enumerate() {
            rebuilt.place(hash, DenseIndex::new(index), hashes);
        }
        *self = rebuilt;
    }

    /// Marks every slot empty, keeping the bucket count.
    pub(crate) fn clear(&mut self) {
        self.slots.fill(EMPTY);
    }

    /// Looks for an entry with `hash` for which `eq` holds.
    ///
    /// Returns the slot and dense index of the match. The probe stops at the
    /// first empty slot, or at the first occupant displaced less than the
    /// current probe distance, since the entry would have evicted it.
    #[inline]
    pub(crate) fn find(
        &self,
        hash: u64,
        hashes: &[u64],
        mut eq: impl FnMut(DenseIndex) -> bool,
    ) -> Option<(usize, DenseIndex)> {
        let mut slot = self.ideal_slot(hash);

        for distance in 0..self.bucket_count() {
            let index = self.get(slot)?;
            let occupant_hash = hashes[index.as_usize()];

            if self.displacement(slot, occupant_hash) < distance {
                return None;
            }
            if occupant_hash == hash && eq(index) {
                return Some((slot, index));
            }

            slot = self.next_slot(slot);
        }

        None
    }

    /// Repoints the slot referencing `from` to reference `to` instead.
    ///
    /// `hash` is the hash of the entry that moved; its slot lies on the probe
    /// path from `hash`'s ideal slot.
    ///
    /// # Panics
    ///
    /// Panics if no slot references `from`.
    pub(crate) fn repoint(&mut self, hash: u64, from: DenseIndex, to: DenseIndex) {
        let mut slot = self.ideal_slot(hash);
        for _ in 0..self.bucket_count() {
            if self.slots[slot] == from.raw() {
                self.slots[slot] = to.raw();
                return;
            }
            slot = self.next_slot(slot);
        }

        panic!("no bucket references dense index {from:?}");
    }

    /// Closes the hole left at `hole` by a removal.
    ///
    /// Walks forward from the hole, pulling each displaced occupant back one
    /// slot, and stops at an empty slot or at an occupant sitting in its ideal
    /// slot. Whatever slot the hole ends up at is marked empty.
    ///
    /// The content of `hole` on entry is ignored; it may still name a dense
    /// index that has since been reused.
    pub(crate) fn backward_shift(&mut self, mut hole: usize, hashes: &[u64]) {
        let mut next = self.next_slot(hole);

        for _ in 1..self.bucket_count() {
            let Some(index) = self.get(next) else {
                break;
            };

            let hash = hashes[index.as_usize()];
            let to_hole = self.displacement(hole, hash);
            let to_next = self.displacement(next, hash);
            if to_hole >= to_next {
                // In its ideal slot. Everything after it in the cluster is
                // ordered after it too, so nothing further can move.
                break;
            }

            self.slots[hole] = index.raw();
            hole = next;
            next = self.next_slot(next);
        }

        self.slots[hole] = EMPTY;
    }

    /// Counts entries by displacement; `histogram[d]` is the number of entries
    /// sitting `d` slots past their ideal slot.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn probe_histogram(&self, hashes: &[u64]) -> alloc::vec::Vec<usize> {
        let mut histogram = alloc::vec::Vec::new();
        for (slot, &raw) in self.slots.iter().enumerate() {
            let Some(index) = DenseIndex::from_raw(raw) else {
                continue;
            };
            let distance = self.displacement(slot, hashes[index.as_usize()]);
            if histogram.len() <= distance {
                histogram.resize(distance + 1, 0);
            }
            histogram[distance] += 1;
        }
        histogram
    }

    /// Checks every structural invariant, panicking with a description of the
    /// first violation.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self, hashes: &[u64]) {
        let mut seen = vec![false; hashes.len()];

        for (slot, &raw) in self.slots.iter().enumerate() {
            let Some(index) = DenseIndex::from_raw(raw) else {
                continue;
            };
            assert!(
                index.as_usize() < hashes.len(),
                "slot {slot} references {index:?} past the {} live entries",
                hashes.len()
            );
            assert!(
                !seen[index.as_usize()],
                "{index:?} referenced by more than one slot"
            );
            seen[index.as_usize()] = true;

            // Every slot between the ideal slot and this one must be occupied
            // by an entry displaced at least as far as this one would be there.
            let hash = hashes[index.as_usize()];
            let mut probe = self.ideal_slot(hash);
            let mut distance = 0;
            while probe != slot {
                let Some(other) = self.get(probe) else {
                    panic!("{index:?} at slot {slot} is separated from its ideal slot by empty slot {probe}");
                };
                let other_distance = self.displacement(probe, hashes[other.as_usize()]);
                assert!(
                    other_distance >= distance,
                    "{index:?} at slot {slot} passed {other:?} at slot {probe} \
                     (displacement {other_distance} < {distance})"
                );
                probe = self.next_slot(probe);
                distance += 1;
            }
        }

        if let Some(missing) = seen.iter().position(|&s| !s) {
            panic!("dense index #{missing} is not referenced by any slot");
        }
    }

    /// Raw slot contents, for comparing layouts in tests.
    #[cfg(test)]
    pub(crate) fn raw_slots(&self) -> &[u32] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    /// A hash whose ideal slot in a 16-bucket table is `slot`, tagged so that
    /// different entries sharing a slot still have distinct hashes.
    fn hash_for(slot: usize, tag: u64) -> u64 {
        (tag << 32) | slot as u64
    }

    fn build(hashes: &[u64]) -> BucketIndex {
        let mut index = BucketIndex::with_bucket_count(MIN_BUCKETS);
        for (i, &hash) in hashes.iter().enumerate() {
            index.place(hash, DenseIndex::new(i), &hashes[..=i]);
            index.assert_consistent(&hashes[..=i]);
        }
        index
    }

    fn slot_of(index: &BucketIndex, dense: usize) -> usize {
        index
            .raw_slots()
            .iter()
            .position(|&raw| raw == dense as u32)
            .unwrap()
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn rejects_non_power_of_two() {
        BucketIndex::with_bucket_count(12);
    }

    #[test]
    fn place_in_ideal_slot_when_free() {
        let hashes = [hash_for(3, 0), hash_for(7, 1)];
        let index = build(&hashes);
        assert_eq!(slot_of(&index, 0), 3);
        assert_eq!(slot_of(&index, 1), 7);
    }

    #[test]
    fn collisions_probe_linearly() {
        let hashes = [hash_for(5, 0), hash_for(5, 1), hash_for(5, 2)];
        let index = build(&hashes);
        assert_eq!(slot_of(&index, 0), 5);
        assert_eq!(slot_of(&index, 1), 6);
        assert_eq!(slot_of(&index, 2), 7);
    }

    #[test]
    fn poorer_entry_evicts_richer_one() {
        // #0 and #1 want slot 4, #2 wants slot 5. #2 lands in 6 (#1 took 5
        // with displacement 1 >= 0). Then #3 wants slot 4 as well: at slot 6
        // it has displacement 2 against #2's 1, so it takes the slot and #2
        // moves on to 7.
        let hashes = [hash_for(4, 0), hash_for(4, 1), hash_for(5, 2), hash_for(4, 3)];
        let index = build(&hashes);
        assert_eq!(slot_of(&index, 0), 4);
        assert_eq!(slot_of(&index, 1), 5);
        assert_eq!(slot_of(&index, 3), 6);
        assert_eq!(slot_of(&index, 2), 7);
    }

    #[test]
    fn displacement_wraps_around_the_end() {
        let hashes = [hash_for(15, 0), hash_for(15, 1), hash_for(15, 2)];
        let index = build(&hashes);
        assert_eq!(slot_of(&index, 0), 15);
        assert_eq!(slot_of(&index, 1), 0);
        assert_eq!(slot_of(&index, 2), 1);
        assert_eq!(index.displacement(1, hashes[2]), 2);
        assert_eq!(index.probe_histogram(&hashes), alloc::vec![1, 1, 1]);
    }

    #[test]
    fn find_stops_early_on_richer_occupant() {
        let hashes = [hash_for(2, 0), hash_for(3, 1)];
        let index = build(&hashes);

        let mut compared = Vec::new();
        let missing = hash_for(2, 9);
        let found = index.find(missing, &hashes, |i| {
            compared.push(i);
            false
        });
        assert_eq!(found, None);
        // Hash mismatches never reach `eq`, and the probe stops at slot 3
        // (occupant displacement 0 < probe distance 1) before slot 4.
        assert!(compared.is_empty());

        assert_eq!(
            index.find(hashes[1], &hashes, |i| i == DenseIndex::new(1)),
            Some((3, DenseIndex::new(1)))
        );
    }

    #[test]
    fn find_on_full_cluster_terminates() {
        // Fill 15 of 16 slots from a single ideal slot.
        let hashes: Vec<u64> = (0..15).map(|tag| hash_for(0, tag)).collect();
        let index = build(&hashes);
        assert_eq!(index.find(hash_for(0, 99), &hashes, |_| true), None);
        assert_eq!(
            index.find(hashes[14], &hashes, |i| i == DenseIndex::new(14)),
            Some((14, DenseIndex::new(14)))
        );
    }

    #[test]
    #[should_panic(expected = "bucket index full")]
    fn place_into_full_index_panics() {
        let hashes: Vec<u64> = (0..17).map(|tag| hash_for(0, tag)).collect();
        let mut index = BucketIndex::with_bucket_count(MIN_BUCKETS);
        for (i, &hash) in hashes.iter().enumerate() {
            index.place(hash, DenseIndex::new(i), &hashes);
        }
    }

    #[test]
    fn backward_shift_pulls_cluster_back() {
        let hashes = [hash_for(4, 0), hash_for(4, 1), hash_for(4, 2)];
        let mut index = build(&hashes);

        // Remove #0 (slot 4) as the map would: #2 moves to dense position 0.
        let remaining = [hashes[2], hashes[1]];
        index.repoint(hashes[2], DenseIndex::new(2), DenseIndex::new(0));
        index.backward_shift(4, &remaining);
        index.assert_consistent(&remaining);

        assert_eq!(slot_of(&index, 1), 4);
        assert_eq!(slot_of(&index, 0), 5);
        assert_eq!(index.raw_slots()[6], EMPTY);
    }

    #[test]
    fn backward_shift_stops_at_entry_in_ideal_slot() {
        // Slots: 4 -> #0 (ideal 4), 5 -> #1 (ideal 5), 6 -> #2 (ideal 5).
        let hashes = [hash_for(4, 0), hash_for(5, 1), hash_for(5, 2)];
        let mut index = build(&hashes);
        assert_eq!(slot_of(&index, 2), 6);

        // Remove #0; #2 is swapped into dense position 0. #1 sits in its
        // ideal slot, so the hole at 4 stays empty and nothing shifts.
        let remaining = [hashes[2], hashes[1]];
        index.repoint(hashes[2], DenseIndex::new(2), DenseIndex::new(0));
        index.backward_shift(4, &remaining);
        index.assert_consistent(&remaining);

        assert_eq!(index.raw_slots()[4], EMPTY);
        assert_eq!(slot_of(&index, 1), 5);
        assert_eq!(slot_of(&index, 0), 6);
    }

    #[test]
    fn backward_shift_across_wraparound() {
        let hashes = [hash_for(14, 0), hash_for(14, 1), hash_for(14, 2), hash_for(15, 3)];
        let mut index = build(&hashes);
        // 14 -> #0, 15 -> #1, 0 -> #2, 1 -> #3
        assert_eq!(slot_of(&index, 2), 0);
        assert_eq!(slot_of(&index, 3), 1);

        // Remove #1 (slot 15); #3 is swapped into dense position 1.
        let remaining = [hashes[0], hashes[3], hashes[2]];
        index.repoint(hashes[3], DenseIndex::new(3), DenseIndex::new(1));
        index.backward_shift(15, &remaining);
        index.assert_consistent(&remaining);

        assert_eq!(slot_of(&index, 0), 14);
        assert_eq!(slot_of(&index, 2), 15);
        assert_eq!(slot_of(&index, 1), 0);
        assert_eq!(index.raw_slots()[1], EMPTY);
    }

    #[test]
    #[should_panic(expected = "no bucket references")]
    fn repoint_missing_index_panics() {
        let hashes = [hash_for(1, 0)];
        let mut index = build(&hashes);
        index.repoint(hashes[0], DenseIndex::new(5), DenseIndex::new(0));
    }

    #[test]
    fn rebuild_preserves_every_entry() {
        let mut rng = SmallRng::seed_from_u64(7);
        let hashes: Vec<u64> = (0..12).map(|_| rng.random()).collect();
        let mut index = build(&hashes);

        index.rebuild(64, &hashes);
        assert_eq!(index.bucket_count(), 64);
        index.assert_consistent(&hashes);
        for (i, &hash) in hashes.iter().enumerate() {
            let dense = DenseIndex::new(i);
            assert!(index.find(hash, &hashes, |d| d == dense).is_some());
        }
    }

    /// Removes dense entry `victim` the way the map does, then checks the
    /// result against an index rebuilt from scratch.
    fn remove_and_compare(index: &mut BucketIndex, hashes: &mut Vec<u64>, victim: usize) {
        let dense = DenseIndex::new(victim);
        let (slot, _) = index.find(hashes[victim], hashes, |d| d == dense).unwrap();

        let last = hashes.len() - 1;
        hashes.swap_remove(victim);
        if victim != last {
            index.repoint(hashes[victim], DenseIndex::new(last), dense);
        }
        index.backward_shift(slot, hashes);
        index.assert_consistent(hashes);

        // Linear probing fills the same set of slots whatever the history.
        let mut fresh = BucketIndex::with_bucket_count(index.bucket_count());
        fresh.rebuild(index.bucket_count(), hashes);
        let occupied = |i: &BucketIndex| -> Vec<bool> {
            i.raw_slots().iter().map(|&raw| raw != EMPTY).collect()
        };
        assert_eq!(occupied(index), occupied(&fresh));

        // Robin Hood layout is unique up to the order of entries sharing an
        // ideal slot, so the displacements agree as a multiset.
        assert_eq!(index.probe_histogram(hashes), fresh.probe_histogram(hashes));
    }

    #[test]
    fn random_place_and_remove_keep_invariants() {
        let mut rng = SmallRng::seed_from_u64(0xB0B);
        for _ in 0..200 {
            let mut index = BucketIndex::with_bucket_count(32);
            let mut hashes: Vec<u64> = Vec::new();

            for _ in 0..500 {
                if hashes.len() < 25 && (hashes.is_empty() || rng.random_bool(0.6)) {
                    // Few distinct ideal slots to force long clusters.
                    let hash = (rng.random::<u64>() << 8) | (rng.random_range(0..6u64) * 5);
                    hashes.push(hash);
                    index.place(hash, DenseIndex::new(hashes.len() - 1), &hashes);
                    index.assert_consistent(&hashes);
                } else if !hashes.is_empty() {
                    let victim = rng.random_range(0..hashes.len());
                    remove_and_compare(&mut index, &mut hashes, victim);
                }
            }
        }
    }
}
