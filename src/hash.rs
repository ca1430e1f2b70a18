//! Byte hashing.
//!
//! Every position in a [`FastMap`](crate::FastMap) is derived from a 64-bit
//! hash of a key's bytes. [`hash_bytes`] is the one-shot form,
//! [`ByteHasher`] the streaming form; both produce the same value for the
//! same byte sequence no matter how it is split across `write` calls.

use core::ffi::CStr;
use core::hash::BuildHasher;
use core::hash::Hasher;

use crate::key::ByteKey;

const SEED: u64 = 0x9E37_79B9_7F4A_7C15;
const CHUNK_SALT: u64 = 0xBF58_476D_1CE4_E5B9;
const TAIL_SALT: u64 = 0x94D0_49BB_1331_11EB;

/// Multiplies to a 128-bit product and folds the halves together.
#[inline(always)]
fn mix(a: u64, b: u64) -> u64 {
    let product = (a as u128).wrapping_mul(b as u128);
    (product as u64) ^ ((product >> 64) as u64)
}

/// Packs up to 7 trailing bytes into a little-endian word.
#[inline(always)]
fn pack_tail(tail: &[u8]) -> u64 {
    debug_assert!(tail.len() < 8);
    let mut word = [0u8; 8];
    word[..tail.len()].copy_from_slice(tail);
    u64::from_le_bytes(word)
}

/// Hashes an arbitrary byte span.
///
/// The input is consumed in 8-byte little-endian chunks, each folded into a
/// running seed; a partial trailing chunk is packed and folded with its own
/// salt, and the total length is folded in last so inputs that differ only
/// by trailing zero bytes do not collide.
///
/// # Examples
///
/// ```rust
/// use fastmap::hash::hash_bytes;
///
/// assert_eq!(hash_bytes(b"apple"), hash_bytes(b"apple"));
/// assert_ne!(hash_bytes(b"apple"), hash_bytes(b"apple\0"));
/// ```
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut seed = SEED;
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        seed = mix(seed ^ u64::from_le_bytes(word), CHUNK_SALT);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        seed = mix(seed ^ pack_tail(tail), TAIL_SALT);
    }

    mix(seed, bytes.len() as u64)
}

/// Hashes a key through its canonical byte representation.
///
/// This is the hash a [`FastMap`](crate::FastMap) with the default
/// [`BytesState`] computes for `key`.
pub fn hash_value<K: ByteKey>(key: &K) -> u64 {
    hash_bytes(bytemuck::bytes_of(&key.canonical()))
}

/// Hashes an `f32`, treating `-0.0` and `0.0` as the same value.
pub fn hash_f32(value: f32) -> u64 {
    hash_value(&value)
}

/// Hashes an `f64`, treating `-0.0` and `0.0` as the same value.
pub fn hash_f64(value: f64) -> u64 {
    hash_value(&value)
}

/// Hashes the content of a C string, excluding the terminator.
pub fn hash_cstr(value: &CStr) -> u64 {
    hash_bytes(value.to_bytes())
}

/// Hashes a buffer holding a NUL-terminated string.
///
/// Only the bytes before the first NUL take part, so two buffers with the
/// same string and different trailing capacity hash identically. A buffer
/// without a NUL is hashed whole.
///
/// # Examples
///
/// ```rust
/// use fastmap::hash::hash_nul_terminated;
///
/// let mut small = [0u8; 8];
/// small[..5].copy_from_slice(b"apple");
/// let mut large = [0xAAu8; 32];
/// large[..6].copy_from_slice(b"apple\0");
///
/// assert_eq!(hash_nul_terminated(&small), hash_nul_terminated(&large));
/// ```
pub fn hash_nul_terminated(buffer: &[u8]) -> u64 {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    hash_bytes(&buffer[..end])
}

/// Streaming form of [`hash_bytes`].
///
/// Bytes written across any number of `write` calls hash exactly like a single
/// [`hash_bytes`] call over their concatenation.
#[derive(Clone, Debug)]
pub struct ByteHasher {
    seed: u64,
    len: u64,
    pending: [u8; 8],
    pending_len: usize,
}

impl Default for ByteHasher {
    fn default() -> Self {
        Self {
            seed: SEED,
            len: 0,
            pending: [0; 8],
            pending_len: 0,
        }
    }
}

impl Hasher for ByteHasher {
    fn write(&mut self, mut bytes: &[u8]) {
        self.len = self.len.wrapping_add(bytes.len() as u64);

        if self.pending_len > 0 {
            let take = (8 - self.pending_len).min(bytes.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&bytes[..take]);
            self.pending_len += take;
            bytes = &bytes[take..];

            if self.pending_len < 8 {
                return;
            }
            self.seed = mix(self.seed ^ u64::from_le_bytes(self.pending), CHUNK_SALT);
            self.pending_len = 0;
        }

        let mut chunks = bytes.chunks_exact(8);
        for chunk in &mut chunks {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            self.seed = mix(self.seed ^ u64::from_le_bytes(word), CHUNK_SALT);
        }

        let tail = chunks.remainder();
        self.pending[..tail.len()].copy_from_slice(tail);
        self.pending_len = tail.len();
    }

    fn finish(&self) -> u64 {
        let mut seed = self.seed;
        if self.pending_len > 0 {
            seed = mix(seed ^ pack_tail(&self.pending[..self.pending_len]), TAIL_SALT);
        }
        mix(seed, self.len)
    }
}

/// Builds [`ByteHasher`]s. The default hasher builder of
/// [`FastMap`](crate::FastMap).
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesState;

impl BuildHasher for BytesState {
    type Hasher = ByteHasher;

    fn build_hasher(&self) -> Self::Hasher {
        ByteHasher::default()
    }
}
