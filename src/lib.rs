#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bucket_index;
mod dense_store;

/// A dense Robin Hood hash map over byte-comparable keys.
///
/// This module provides `FastMap`, which keeps its entries packed in parallel
/// key, value and hash columns and indexes them with a power-of-two bucket
/// array.
pub mod fast_map;

/// A hash set built on top of `FastMap`.
pub mod fast_set;

pub mod hash;

mod key;

pub use fast_map::FastMap;
#[cfg(any(test, feature = "stats"))]
pub use fast_map::DebugStats;
pub use fast_set::FastSet;
pub use hash::ByteHasher;
pub use hash::BytesState;
pub use key::ByteKey;

/// A `FastMap` hashing keys with `foldhash` instead of the built-in byte
/// hasher.
#[cfg(feature = "foldhash")]
pub type FoldMap<K, V> = FastMap<K, V, foldhash::fast::FixedState>;

/// A `FastSet` hashing keys with `foldhash` instead of the built-in byte
/// hasher.
#[cfg(feature = "foldhash")]
pub type FoldSet<K> = FastSet<K, foldhash::fast::FixedState>;

// Warms the ideal bucket of a lookup before the cached hashes are read.
cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_feature = "sse"))] {
        #[inline(always)]
        pub(crate) fn prefetch<T>(ptr: *const T) {
            // SAFETY: `_mm_prefetch` is a hint; it never dereferences `ptr` and
            // does not fault on any address.
            unsafe {
                use core::arch::x86_64::*;
                _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
            }
        }
    } else {
        #[inline(always)]
        pub(crate) fn prefetch<T>(_ptr: *const T) {}
    }
}
