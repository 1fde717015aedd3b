//! Point records exchanged with the accelerator, and their normalization to host points
//!
//! The accelerator works on homogeneous projective points (`x = X/Z`, `y = Y/Z`), while the
//! host library exposes affine points and Jacobian points (`x = X/Z²`, `y = Y/Z³`, arkworks
//! `short_weierstrass::Projective`).
//!
//! ## Point at infinity
//!
//! The device records carry no infinity flag. The host identity is written as the projective
//! sentinel `(0, 1, 0)` and the affine sentinel `(0, 0)`, which is what the accelerator itself
//! produces. The strict operations ([`PointNormalizer::projective_device_to_affine`],
//! [`PointNormalizer::projective_device_to_jacobian`]) reject `Z = 0` with
//! [`ConversionError::FieldInversionUndefined`]; the point-level operations map it back to the
//! host identity.

use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, Zero};
use bytemuck::{Pod, Zeroable};

use crate::codec::{decode_device, encode_canonical, LimbCodec};
use crate::error::{ConversionError, Result};
use crate::limbs::{DeviceField, LimbStorage};

/// Affine point in device representation
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(C)]
pub struct DeviceAffine<L: LimbStorage> {
    pub x: DeviceField<L>,
    pub y: DeviceField<L>,
}

// SAFETY: `repr(C)` struct made of `Pod` fields of the same alignment, hence without padding.
unsafe impl<L: LimbStorage> Zeroable for DeviceAffine<L> {}
// SAFETY: see above.
unsafe impl<L: LimbStorage> Pod for DeviceAffine<L> {}

impl<L: LimbStorage> DeviceAffine<L> {
    pub fn new(x: DeviceField<L>, y: DeviceField<L>) -> Self {
        Self { x, y }
    }

    /// Device encoding of the point at infinity
    pub fn identity() -> Self {
        Zeroable::zeroed()
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    /// Lifts the point to projective form with `Z = 1`.
    pub fn to_projective(&self) -> DeviceProjective<L> {
        if self.is_identity() {
            return DeviceProjective::identity();
        }
        DeviceProjective {
            x: self.x,
            y: self.y,
            z: DeviceField::one(),
        }
    }
}

/// Homogeneous projective point in device representation
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(C)]
pub struct DeviceProjective<L: LimbStorage> {
    pub x: DeviceField<L>,
    pub y: DeviceField<L>,
    pub z: DeviceField<L>,
}

// SAFETY: `repr(C)` struct made of `Pod` fields of the same alignment, hence without padding.
unsafe impl<L: LimbStorage> Zeroable for DeviceProjective<L> {}
// SAFETY: see above.
unsafe impl<L: LimbStorage> Pod for DeviceProjective<L> {}

impl<L: LimbStorage> DeviceProjective<L> {
    pub fn new(x: DeviceField<L>, y: DeviceField<L>, z: DeviceField<L>) -> Self {
        Self { x, y, z }
    }

    /// Device encoding of the point at infinity, `(0, 1, 0)`
    pub fn identity() -> Self {
        Self {
            x: DeviceField::zero(),
            y: DeviceField::one(),
            z: DeviceField::zero(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.z.is_zero()
    }

    /// Drops the Z coordinate.
    ///
    /// Only meaningful for points in "affine-as-projective" form (`Z = 1`) and for the identity.
    pub fn strip_z(&self) -> DeviceAffine<L> {
        if self.is_identity() {
            return DeviceAffine::identity();
        }
        DeviceAffine {
            x: self.x,
            y: self.y,
        }
    }
}

/// Field inversion, provided by the host math library.
pub trait FieldInverse<F: Field>: Sync {
    fn invert(&self, value: &F) -> Option<F>;
}

/// Inversion through [`Field::inverse`]
#[derive(Clone, Copy, Debug, Default)]
pub struct HostInverse;

impl<F: Field> FieldInverse<F> for HostInverse {
    #[inline]
    fn invert(&self, value: &F) -> Option<F> {
        value.inverse()
    }
}

/// Lifts affine coordinates to a device projective point with `Z = 1`.
pub fn affine_to_device<F: LimbCodec, L: LimbStorage>(x: &F, y: &F) -> DeviceProjective<L> {
    DeviceProjective {
        x: encode_canonical(x),
        y: encode_canonical(y),
        z: encode_canonical(&F::ONE),
    }
}

/// Converts a host affine point, mapping the identity to the projective sentinel.
pub fn host_affine_to_device<P, L>(point: &Affine<P>) -> DeviceProjective<L>
where
    P: SWCurveConfig,
    P::BaseField: LimbCodec,
    L: LimbStorage,
{
    if point.infinity {
        return DeviceProjective::identity();
    }
    affine_to_device(&point.x, &point.y)
}

/// Reduces a host Jacobian point to affine with the host library, then lifts it.
pub fn jacobian_to_device<P, L>(point: &Projective<P>) -> DeviceProjective<L>
where
    P: SWCurveConfig,
    P::BaseField: LimbCodec,
    L: LimbStorage,
{
    host_affine_to_device(&point.into_affine())
}

/// Converts a host affine point to the affine device record used for MSM bases.
pub fn affine_to_device_affine<P, L>(point: &Affine<P>) -> DeviceAffine<L>
where
    P: SWCurveConfig,
    P::BaseField: LimbCodec,
    L: LimbStorage,
{
    if point.infinity {
        return DeviceAffine::identity();
    }
    DeviceAffine {
        x: encode_canonical(&point.x),
        y: encode_canonical(&point.y),
    }
}

/// Decodes an affine device record. The coordinates are not checked against the curve equation.
pub fn device_affine_to_affine<P, L>(point: &DeviceAffine<L>) -> Result<Affine<P>>
where
    P: SWCurveConfig,
    P::BaseField: LimbCodec,
    L: LimbStorage,
{
    if point.is_identity() {
        return Ok(Affine::identity());
    }
    Ok(Affine::new_unchecked(
        decode_device(&point.x)?,
        decode_device(&point.y)?,
    ))
}

/// Converts a device projective point to a host Jacobian point without any inversion.
///
/// `(X, Y, Z)` homogeneous is the same point as `(X·Z, Y·Z², Z)` Jacobian. `Z = 0` yields the
/// host identity.
pub fn projective_device_to_jacobian_unnormalized<P, L>(
    point: &DeviceProjective<L>,
) -> Result<Projective<P>>
where
    P: SWCurveConfig,
    P::BaseField: LimbCodec,
    L: LimbStorage,
{
    let x: P::BaseField = decode_device(&point.x)?;
    let y: P::BaseField = decode_device(&point.y)?;
    let z: P::BaseField = decode_device(&point.z)?;
    Ok(Projective::new_unchecked(x * z, y * z.square(), z))
}

/// Device to host conversions requiring a field inversion
#[derive(Clone, Copy, Debug, Default)]
pub struct PointNormalizer<I = HostInverse> {
    inverse: I,
}

impl<I> PointNormalizer<I> {
    pub fn new(inverse: I) -> Self {
        Self { inverse }
    }

    pub fn inverse(&self) -> &I {
        &self.inverse
    }

    /// Computes `(X/Z, Y/Z)`. One inversion per call.
    pub fn projective_device_to_affine<F, L>(&self, point: &DeviceProjective<L>) -> Result<(F, F)>
    where
        F: LimbCodec,
        L: LimbStorage,
        I: FieldInverse<F>,
    {
        let x: F = decode_device(&point.x)?;
        let y: F = decode_device(&point.y)?;
        let z: F = decode_device(&point.z)?;

        let z_inv = self
            .inverse
            .invert(&z)
            .ok_or(ConversionError::FieldInversionUndefined)?;

        Ok((x * z_inv, y * z_inv))
    }

    /// Affine-normalizes the point, then lifts it to the host Jacobian form.
    pub fn projective_device_to_jacobian<P, L>(
        &self,
        point: &DeviceProjective<L>,
    ) -> Result<Projective<P>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
        I: FieldInverse<P::BaseField>,
    {
        let (x, y) = self.projective_device_to_affine(point)?;
        Ok(Affine::<P>::new_unchecked(x, y).into_group())
    }

    /// Same as [`Self::projective_device_to_affine`] but returns a host point, mapping `Z = 0`
    /// to the identity.
    pub fn projective_device_to_host_affine<P, L>(
        &self,
        point: &DeviceProjective<L>,
    ) -> Result<Affine<P>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
        I: FieldInverse<P::BaseField>,
    {
        if point.is_identity() {
            return Ok(Affine::identity());
        }
        let (x, y) = self.projective_device_to_affine(point)?;
        Ok(Affine::new_unchecked(x, y))
    }

    /// Normalizes a slice of device points with a single inversion (Montgomery's trick).
    ///
    /// Points with `Z = 0` become the host identity and do not take part in the product.
    pub fn batch_to_affine<P, L>(&self, points: &[DeviceProjective<L>]) -> Result<Vec<Affine<P>>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
        I: FieldInverse<P::BaseField>,
    {
        let decoded = points
            .iter()
            .map(|point| {
                Ok((
                    decode_device::<P::BaseField, L>(&point.x)?,
                    decode_device::<P::BaseField, L>(&point.y)?,
                    decode_device::<P::BaseField, L>(&point.z)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        // prefix[i] = product of the non-zero z_j for j < i
        let mut prefix = Vec::with_capacity(decoded.len());
        let mut acc = P::BaseField::ONE;
        let mut any_finite = false;
        for (_, _, z) in &decoded {
            prefix.push(acc);
            if !z.is_zero() {
                acc *= z;
                any_finite = true;
            }
        }

        let mut result = vec![Affine::<P>::identity(); decoded.len()];
        if !any_finite {
            return Ok(result);
        }

        let mut inv = self
            .inverse
            .invert(&acc)
            .ok_or(ConversionError::FieldInversionUndefined)?;

        for (i, (x, y, z)) in decoded.iter().enumerate().rev() {
            if z.is_zero() {
                continue;
            }
            let z_inv = inv * prefix[i];
            inv *= z;
            result[i] = Affine::new_unchecked(*x * z_inv, *y * z_inv);
        }

        Ok(result)
    }
}
