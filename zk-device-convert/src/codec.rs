//! Canonical encode/decode between host field elements and device limb arrays
//!
//! arkworks keeps prime field elements in Montgomery form. Everything crossing into a
//! [`DeviceField`] goes through [`PrimeField::into_bigint`] first, so a Montgomery residue never
//! reaches the device. Decoding goes the other way through [`PrimeField::from_bigint`], which
//! re-enters Montgomery form and rejects out of range values.

use ark_ff::{BigInt, Field, Fp, FpConfig, PrimeField};

use crate::error::{ConversionError, Result};
use crate::limbs::{split_u64_limbs, DeviceField, LimbStorage, LIMB_BYTES};

/// A host field whose elements have a fixed-width canonical little-endian encoding.
pub trait LimbCodec: Field {
    /// Width of the canonical encoding in bytes
    const ENCODED_BYTES: usize;

    /// Writes the canonical value as little-endian u32 limbs.
    ///
    /// `out` holds exactly `ENCODED_BYTES / 4` limbs.
    fn write_limbs(&self, out: &mut [u32]);

    /// Reads a canonical little-endian encoding of exactly `ENCODED_BYTES` bytes.
    fn read_le_bytes(bytes: &[u8]) -> Result<Self>;

    /// Reads canonical little-endian u32 limbs, `ENCODED_BYTES / 4` of them.
    fn read_limbs(limbs: &[u32]) -> Result<Self>;
}

impl<P: FpConfig<N>, const N: usize> LimbCodec for Fp<P, N> {
    const ENCODED_BYTES: usize = N * 8;

    fn write_limbs(&self, out: &mut [u32]) {
        // into_bigint() leaves Montgomery form
        let bigint = self.into_bigint();
        split_u64_limbs(&bigint.0, out);
    }

    fn read_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_BYTES {
            return Err(ConversionError::MalformedEncoding {
                expected: Self::ENCODED_BYTES,
                found: bytes.len(),
            });
        }

        let mut words = [0u64; N];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_le_bytes(buf);
        }

        Self::from_bigint(BigInt(words)).ok_or(ConversionError::NonCanonicalValue)
    }

    fn read_limbs(limbs: &[u32]) -> Result<Self> {
        if limbs.len() * LIMB_BYTES != Self::ENCODED_BYTES {
            return Err(ConversionError::MalformedEncoding {
                expected: Self::ENCODED_BYTES,
                found: limbs.len() * LIMB_BYTES,
            });
        }

        let mut words = [0u64; N];
        for (word, pair) in words.iter_mut().zip(limbs.chunks_exact(2)) {
            *word = u64::from(pair[0]) | (u64::from(pair[1]) << 32);
        }

        Self::from_bigint(BigInt(words)).ok_or(ConversionError::NonCanonicalValue)
    }
}

/// Encodes a host field element into its device limb record.
///
/// The limb storage must be exactly as wide as the field encoding, which is checked when the
/// function is instantiated:
///
/// ```compile_fail
/// use zk_device_convert::codec::encode_canonical;
/// use zk_device_convert::DeviceField;
///
/// let _: DeviceField<[u32; 12]> = encode_canonical(&ark_bn254::Fr::from(1u64));
/// ```
pub fn encode_canonical<F: LimbCodec, L: LimbStorage>(value: &F) -> DeviceField<L> {
    const {
        assert!(
            L::BYTES == F::ENCODED_BYTES,
            "device limb storage does not match the field encoding width"
        )
    };
    let mut result = DeviceField::zero();
    value.write_limbs(result.limbs_mut());
    result
}

/// Decodes a canonical little-endian byte string into a host field element.
pub fn decode_canonical<F: LimbCodec>(bytes: &[u8]) -> Result<F> {
    F::read_le_bytes(bytes)
}

/// Decodes a device limb record into a host field element.
pub fn decode_device<F: LimbCodec, L: LimbStorage>(field: &DeviceField<L>) -> Result<F> {
    F::read_limbs(field.limbs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{One, UniformRand, Zero};
    use ark_std::test_rng;

    type Fr = ark_bn254::Fr;
    type Fq381 = ark_bls12_381::Fq;
    type Fq761 = ark_bw6_761::Fq;

    #[test]
    fn test_roundtrip_random() {
        let rng = &mut test_rng();
        for _ in 0..64 {
            let value = Fr::rand(rng);
            let device: DeviceField<[u32; 8]> = encode_canonical(&value);
            assert_eq!(decode_device::<Fr, _>(&device).unwrap(), value);

            let value = Fq381::rand(rng);
            let device: DeviceField<[u32; 12]> = encode_canonical(&value);
            assert_eq!(decode_device::<Fq381, _>(&device).unwrap(), value);

            let value = Fq761::rand(rng);
            let device: DeviceField<[u32; 24]> = encode_canonical(&value);
            assert_eq!(decode_device::<Fq761, _>(&device).unwrap(), value);
        }
    }

    #[test]
    fn test_encoding_is_not_montgomery() {
        let device: DeviceField<[u32; 8]> = encode_canonical(&Fr::from(5u64));
        assert_eq!(device.limbs(), &[5, 0, 0, 0, 0, 0, 0, 0]);

        let device: DeviceField<[u32; 8]> = encode_canonical(&Fr::one());
        assert_eq!(device, DeviceField::one());

        let device: DeviceField<[u32; 8]> = encode_canonical(&Fr::zero());
        assert!(device.is_zero());
    }

    #[test]
    fn test_decode_wrong_length() {
        let bytes = [0u8; 31];
        assert_eq!(
            decode_canonical::<Fr>(&bytes),
            Err(ConversionError::MalformedEncoding {
                expected: 32,
                found: 31
            })
        );

        let bytes = [0u8; 33];
        assert_eq!(
            decode_canonical::<Fr>(&bytes),
            Err(ConversionError::MalformedEncoding {
                expected: 32,
                found: 33
            })
        );

        // A scalar-width record is not a base field element on BLS12-381
        let device: DeviceField<[u32; 8]> = encode_canonical(&ark_bls12_381::Fr::from(7u64));
        assert_eq!(
            decode_device::<Fq381, _>(&device),
            Err(ConversionError::MalformedEncoding {
                expected: 48,
                found: 32
            })
        );
    }

    #[test]
    fn test_decode_rejects_modulus() {
        let modulus = Fr::MODULUS.0;
        let bytes = modulus
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect::<Vec<_>>();
        assert_eq!(
            decode_canonical::<Fr>(&bytes),
            Err(ConversionError::NonCanonicalValue)
        );

        let max = [0xffu8; 32];
        assert_eq!(
            decode_canonical::<Fr>(&max),
            Err(ConversionError::NonCanonicalValue)
        );
    }

    #[test]
    fn test_decode_device_matches_bytes() {
        let rng = &mut test_rng();
        for _ in 0..16 {
            let device: DeviceField<[u32; 12]> = encode_canonical(&Fq381::rand(rng));
            assert_eq!(
                decode_device::<Fq381, _>(&device),
                decode_canonical::<Fq381>(&device.to_le_bytes())
            );
        }

        let modulus = DeviceField::<[u32; 8]>::from_u64_limbs(&Fr::MODULUS.0);
        assert_eq!(
            decode_device::<Fr, _>(&modulus),
            Err(ConversionError::NonCanonicalValue)
        );
    }

    #[test]
    fn test_decode_modulus_minus_one() {
        let minus_one = -Fr::one();
        let bytes = encode_canonical::<Fr, [u32; 8]>(&minus_one).to_le_bytes();
        let mut expected = Fr::MODULUS.0;
        expected[0] -= 1;
        let expected_bytes = expected
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect::<Vec<_>>();
        assert_eq!(bytes, expected_bytes);
        assert_eq!(decode_canonical::<Fr>(&bytes).unwrap(), minus_one);
    }
}
