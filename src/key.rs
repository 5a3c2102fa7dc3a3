//! Key encoding for Patricia tree sets.
//!
//! A Patricia tree orders its elements by the bit representation of a
//! fixed-width unsigned integer. [`PatriciaKey`] is the seam between an
//! element type and that representation: a pure encoding of the element
//! as a `u64`. Narrower integers zero-extend; pointers encode as their
//! address, so a pointer-keyed set tracks identities, not pointees.

/// An element type usable as a Patricia tree set key.
///
/// The encoding must be pure (the same key always encodes to the same
/// integer) and injective over the keys actually stored in one set: two
/// keys are considered equal exactly when their encodings are equal.
///
/// # Examples
///
/// ```rust
/// use patricia_set::PatriciaKey;
///
/// assert_eq!(7u32.encode(), 7u64);
/// assert_eq!(u32::MAX.encode(), u64::from(u32::MAX));
/// ```
pub trait PatriciaKey {
    /// Encodes this key as a fixed-width unsigned integer.
    fn encode(&self) -> u64;
}

macro_rules! impl_patricia_key_for_unsigned {
    ($($integer:ty),*) => {
        $(
            impl PatriciaKey for $integer {
                #[inline]
                fn encode(&self) -> u64 {
                    u64::from(*self)
                }
            }
        )*
    };
}

impl_patricia_key_for_unsigned!(u8, u16, u32, u64);

impl PatriciaKey for usize {
    #[inline]
    fn encode(&self) -> u64 {
        *self as u64
    }
}

impl<U> PatriciaKey for *const U {
    #[inline]
    fn encode(&self) -> u64 {
        *self as usize as u64
    }
}

impl<U> PatriciaKey for *mut U {
    #[inline]
    fn encode(&self) -> u64 {
        *self as usize as u64
    }
}

// =============================================================================
// Tests
// =============================================================================
