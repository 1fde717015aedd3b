//! Supported curve families
//!
//! A [`DeviceCurve`] ties the arkworks field and curve configurations of a curve to the device
//! limb widths the accelerator uses for them. All conversion code is generic over it.

use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ff::PrimeField;

use crate::codec::LimbCodec;
use crate::limbs::{DeviceField, LimbStorage};
use crate::point::{DeviceAffine, DeviceProjective};

/// Host and device parameters of one curve family.
pub trait DeviceCurve: Send + Sync + 'static {
    const NAME: &'static str;

    type ScalarField: PrimeField + LimbCodec;
    type BaseField: PrimeField + LimbCodec;
    /// Coordinate field of G2, either the quadratic extension or the base field itself
    type G2BaseField: LimbCodec;

    type G1: SWCurveConfig<BaseField = Self::BaseField, ScalarField = Self::ScalarField>;
    type G2: SWCurveConfig<BaseField = Self::G2BaseField, ScalarField = Self::ScalarField>;

    type ScalarLimbs: LimbStorage;
    type BaseLimbs: LimbStorage;
    type G2Limbs: LimbStorage;
}

pub type DeviceScalar<C> = DeviceField<<C as DeviceCurve>::ScalarLimbs>;
pub type DeviceBase<C> = DeviceField<<C as DeviceCurve>::BaseLimbs>;
pub type DeviceG2Base<C> = DeviceField<<C as DeviceCurve>::G2Limbs>;

pub type G1DeviceAffine<C> = DeviceAffine<<C as DeviceCurve>::BaseLimbs>;
pub type G1DeviceProjective<C> = DeviceProjective<<C as DeviceCurve>::BaseLimbs>;
pub type G2DeviceAffine<C> = DeviceAffine<<C as DeviceCurve>::G2Limbs>;
pub type G2DeviceProjective<C> = DeviceProjective<<C as DeviceCurve>::G2Limbs>;

pub type G1Affine<C> = Affine<<C as DeviceCurve>::G1>;
pub type G1Jacobian<C> = Projective<<C as DeviceCurve>::G1>;
pub type G2Affine<C> = Affine<<C as DeviceCurve>::G2>;
pub type G2Jacobian<C> = Projective<<C as DeviceCurve>::G2>;

macro_rules! device_curve {
    (
        $(#[$attr:meta])*
        $name:ident {
            name: $label:expr,
            krate: $krate:ident,
            g2_base: $g2_base:ty,
            scalar_limbs: $scalar_limbs:expr,
            base_limbs: $base_limbs:expr,
            g2_limbs: $g2_limbs:expr $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl DeviceCurve for $name {
            const NAME: &'static str = $label;

            type ScalarField = $krate::Fr;
            type BaseField = $krate::Fq;
            type G2BaseField = $g2_base;

            type G1 = $krate::g1::Config;
            type G2 = $krate::g2::Config;

            type ScalarLimbs = [u32; $scalar_limbs];
            type BaseLimbs = [u32; $base_limbs];
            type G2Limbs = [u32; $g2_limbs];
        }
    };
}

device_curve!(
    /// BN254: 32 byte scalars, 32 byte base field, G2 over Fq2
    Bn254 {
        name: "bn254",
        krate: ark_bn254,
        g2_base: ark_bn254::Fq2,
        scalar_limbs: 8,
        base_limbs: 8,
        g2_limbs: 16,
    }
);

device_curve!(
    /// BLS12-377: 32 byte scalars, 48 byte base field, G2 over Fq2
    Bls12_377 {
        name: "bls12-377",
        krate: ark_bls12_377,
        g2_base: ark_bls12_377::Fq2,
        scalar_limbs: 8,
        base_limbs: 12,
        g2_limbs: 24,
    }
);

device_curve!(
    /// BLS12-381: 32 byte scalars, 48 byte base field, G2 over Fq2
    Bls12_381 {
        name: "bls12-381",
        krate: ark_bls12_381,
        g2_base: ark_bls12_381::Fq2,
        scalar_limbs: 8,
        base_limbs: 12,
        g2_limbs: 24,
    }
);

device_curve!(
    /// BW6-761: 48 byte scalars, 96 byte base field, G2 over the base field
    Bw6_761 {
        name: "bw6-761",
        krate: ark_bw6_761,
        g2_base: ark_bw6_761::Fq,
        scalar_limbs: 12,
        base_limbs: 24,
        g2_limbs: 24,
    }
);
