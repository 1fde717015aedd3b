//! Quadratic extension coordinates ("G2" coordinate field)
//!
//! An element `a0 + a1·u` is stored on the device as the limbs of `a0` immediately followed by
//! the limbs of `a1`. Implementing [`LimbCodec`] for [`QuadExtField`] lets the point
//! normalization code handle G2 points with the extension-field arithmetic of arkworks, without
//! a separate code path.

use ark_ff::{QuadExtConfig, QuadExtField};

use crate::codec::LimbCodec;
use crate::error::{ConversionError, Result};
use crate::limbs::{DeviceField, LimbStorage, LIMB_BYTES};

/// Packs the two components of an extension element into one device record.
///
/// ```compile_fail
/// use zk_device_convert::extension::pack;
/// use zk_device_convert::DeviceField;
///
/// let one = ark_bn254::Fq::from(1u64);
/// let _: DeviceField<[u32; 8]> = pack(&one, &one);
/// ```
pub fn pack<F: LimbCodec, L: LimbStorage>(a0: &F, a1: &F) -> DeviceField<L> {
    const {
        assert!(
            L::BYTES == 2 * F::ENCODED_BYTES,
            "device limb storage does not match the extension encoding width"
        )
    };
    let mut result = DeviceField::zero();
    let (lo, hi) = result
        .limbs_mut()
        .split_at_mut(F::ENCODED_BYTES / LIMB_BYTES);
    a0.write_limbs(lo);
    a1.write_limbs(hi);
    result
}

/// Splits a packed extension element at its midpoint and decodes both halves.
pub fn unpack<F: LimbCodec>(bytes: &[u8]) -> Result<(F, F)> {
    let expected = 2 * F::ENCODED_BYTES;
    if bytes.len() % 2 != 0 || bytes.len() != expected {
        return Err(ConversionError::MalformedEncoding {
            expected,
            found: bytes.len(),
        });
    }

    let (a0, a1) = bytes.split_at(bytes.len() / 2);
    Ok((F::read_le_bytes(a0)?, F::read_le_bytes(a1)?))
}

/// Same as [`unpack`], reading from a device record.
pub fn unpack_device<F: LimbCodec, L: LimbStorage>(field: &DeviceField<L>) -> Result<(F, F)> {
    let limbs = field.limbs();
    let expected = 2 * F::ENCODED_BYTES;
    if limbs.len() * LIMB_BYTES != expected {
        return Err(ConversionError::MalformedEncoding {
            expected,
            found: limbs.len() * LIMB_BYTES,
        });
    }

    let (a0, a1) = limbs.split_at(limbs.len() / 2);
    Ok((F::read_limbs(a0)?, F::read_limbs(a1)?))
}

impl<P: QuadExtConfig> LimbCodec for QuadExtField<P>
where
    P::BaseField: LimbCodec,
{
    const ENCODED_BYTES: usize = 2 * <P::BaseField as LimbCodec>::ENCODED_BYTES;

    fn write_limbs(&self, out: &mut [u32]) {
        let (lo, hi) = out.split_at_mut(out.len() / 2);
        self.c0.write_limbs(lo);
        self.c1.write_limbs(hi);
    }

    fn read_le_bytes(bytes: &[u8]) -> Result<Self> {
        let (c0, c1) = unpack(bytes)?;
        Ok(Self::new(c0, c1))
    }

    fn read_limbs(limbs: &[u32]) -> Result<Self> {
        if limbs.len() * LIMB_BYTES != Self::ENCODED_BYTES {
            return Err(ConversionError::MalformedEncoding {
                expected: Self::ENCODED_BYTES,
                found: limbs.len() * LIMB_BYTES,
            });
        }
        let (c0, c1) = limbs.split_at(limbs.len() / 2);
        Ok(Self::new(
            P::BaseField::read_limbs(c0)?,
            P::BaseField::read_limbs(c1)?,
        ))
    }
}
