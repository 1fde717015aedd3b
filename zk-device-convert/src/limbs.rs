//! Device-side limb storage
//!
//! The accelerator consumes field elements as fixed-width arrays of little-endian u32 limbs,
//! in canonical (non-Montgomery) form. [`DeviceField`] is that record; its width is carried by
//! the [`LimbStorage`] parameter so that every curve reuses the same code.

use bytemuck::{Pod, Zeroable};
use std::fmt;
use std::hash::Hash;

/// Width in bytes of one device limb
pub const LIMB_BYTES: usize = std::mem::size_of::<u32>();

/// Fixed-width array of u32 limbs backing one device field element.
pub trait LimbStorage:
    Pod + Eq + Hash + fmt::Debug + Send + Sync + AsRef<[u32]> + AsMut<[u32]>
{
    const LIMBS: usize;
    const BYTES: usize = Self::LIMBS * LIMB_BYTES;
}

impl<const N: usize> LimbStorage for [u32; N]
where
    [u32; N]: Pod,
{
    const LIMBS: usize = N;
}

/// Splits little-endian u64 limbs into little-endian u32 limbs.
///
/// `dst` must hold exactly twice as many limbs as `src`.
pub(crate) fn split_u64_limbs(src: &[u64], dst: &mut [u32]) {
    debug_assert_eq!(src.len() * 2, dst.len());
    for (word, out) in src.iter().zip(dst.chunks_exact_mut(2)) {
        out[0] = *word as u32;
        out[1] = (*word >> 32) as u32;
    }
}

/// One field element in device representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DeviceField<L: LimbStorage> {
    limbs: L,
}

// SAFETY: `DeviceField` is a `repr(transparent)` wrapper around a `Pod` limb array.
unsafe impl<L: LimbStorage> Zeroable for DeviceField<L> {}
// SAFETY: see above, no padding and every bit pattern is a valid limb array.
unsafe impl<L: LimbStorage> Pod for DeviceField<L> {}

impl<L: LimbStorage> DeviceField<L> {
    pub const LIMBS: usize = L::LIMBS;
    pub const BYTES: usize = L::BYTES;

    pub fn from_limbs(limbs: L) -> Self {
        Self { limbs }
    }

    /// Builds a device element from u64 limbs, as produced by the host big-integer library.
    pub fn from_u64_limbs(words: &[u64]) -> Self {
        let mut result = Self::zero();
        split_u64_limbs(words, result.limbs.as_mut());
        result
    }

    pub fn zero() -> Self {
        Zeroable::zeroed()
    }

    /// The multiplicative identity, in canonical form
    pub fn one() -> Self {
        let mut result = Self::zero();
        result.limbs.as_mut()[0] = 1;
        result
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.as_ref().iter().all(|&limb| limb == 0)
    }

    #[inline]
    pub fn limbs(&self) -> &[u32] {
        self.limbs.as_ref()
    }

    #[inline]
    pub(crate) fn limbs_mut(&mut self) -> &mut [u32] {
        self.limbs.as_mut()
    }

    /// Little-endian byte image, independent of the host endianness.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.limbs()
            .iter()
            .flat_map(|limb| limb.to_le_bytes())
            .collect()
    }
}

impl<L: LimbStorage> Default for DeviceField<L> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<L: LimbStorage> fmt::Debug for DeviceField<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceField(0x")?;
        for limb in self.limbs().iter().rev() {
            write!(f, "{limb:08x}")?;
        }
        write!(f, ")")
    }
}

impl<L: LimbStorage> From<L> for DeviceField<L> {
    fn from(limbs: L) -> Self {
        Self::from_limbs(limbs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_u64_limbs() {
        let field = DeviceField::<[u32; 4]>::from_u64_limbs(&[0x1122_3344_5566_7788, 0xaabb_ccdd]);
        assert_eq!(field.limbs(), &[0x5566_7788, 0x1122_3344, 0xaabb_ccdd, 0]);
    }

    #[test]
    fn test_le_bytes() {
        let field = DeviceField::from_limbs([0x0403_0201u32, 0x0807_0605]);
        assert_eq!(field.to_le_bytes(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(DeviceField::<[u32; 2]>::BYTES, 8);
    }

    #[test]
    fn test_zero_one() {
        let zero = DeviceField::<[u32; 8]>::zero();
        let one = DeviceField::<[u32; 8]>::one();
        assert!(zero.is_zero());
        assert!(!one.is_zero());
        assert_eq!(one.limbs()[0], 1);
        assert!(one.limbs()[1..].iter().all(|&l| l == 0));
    }

    #[test]
    fn test_debug_is_big_endian_hex() {
        let field = DeviceField::from_limbs([0x1u32, 0x2]);
        assert_eq!(format!("{field:?}"), "DeviceField(0x0000000200000001)");
    }
}
