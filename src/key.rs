use bytemuck::Pod;

/// A fixed-size key that is hashed and compared by its bytes.
///
/// Two keys are equal in a [`FastMap`](crate::FastMap) exactly when the bytes
/// of their [`canonical`](ByteKey::canonical) forms are equal, and the hash is
/// taken over those same bytes. `Pod` guarantees the type has no padding and
/// no invalid bit patterns, so its bytes are a faithful representation.
///
/// Implement it for your own plain-old-data structs:
///
/// ```rust
/// use bytemuck::Pod;
/// use bytemuck::Zeroable;
/// use fastmap::ByteKey;
/// use fastmap::FastMap;
///
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl ByteKey for Point {}
///
/// let mut map = FastMap::new();
/// map.put(Point { x: 1, y: 2 }, "a");
/// assert_eq!(map.get(&Point { x: 1, y: 2 }), Some(&"a"));
/// ```
pub trait ByteKey: Pod {
    /// Returns the representative of this key's equivalence class.
    ///
    /// Keys are canonicalized before they are hashed, compared, or stored.
    /// The default is the identity.
    #[inline(always)]
    fn canonical(self) -> Self {
        self
    }
}

macro_rules! impl_byte_key {
    ($($ty:ty),* $(,)?) => {
        $(impl ByteKey for $ty {})*
    };
}

impl_byte_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl ByteKey for f32 {
    /// Maps `-0.0` to `0.0`.
    #[inline(always)]
    fn canonical(self) -> Self {
        if self == 0.0 { 0.0 } else { self }
    }
}

impl ByteKey for f64 {
    /// Maps `-0.0` to `0.0`.
    #[inline(always)]
    fn canonical(self) -> Self {
        if self == 0.0 { 0.0 } else { self }
    }
}

impl<T: ByteKey, const N: usize> ByteKey for [T; N] {
    #[inline(always)]
    fn canonical(self) -> Self {
        self.map(T::canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_identity() {
        assert_eq!(42u32.canonical(), 42);
        assert_eq!((-7i64).canonical(), -7);
    }

    #[test]
    fn negative_zero_becomes_positive() {
        assert_eq!((-0.0f32).canonical().to_bits(), 0.0f32.to_bits());
        assert_eq!((-0.0f64).canonical().to_bits(), 0.0f64.to_bits());
        assert_eq!((-1.5f64).canonical(), -1.5);
    }

    #[test]
    fn arrays_canonicalize_elementwise() {
        let key = [-0.0f32, 1.0, -0.0];
        let bytes = bytemuck::bytes_of(&key.canonical()).to_vec();
        assert_eq!(bytes, bytemuck::bytes_of(&[0.0f32, 1.0, 0.0]));
    }

    #[test]
    fn nan_is_kept_bitwise() {
        let nan = f64::from_bits(0x7FF8_0000_0000_0001);
        assert_eq!(nan.canonical().to_bits(), nan.to_bits());
    }
}
