//! Curve-level batch conversions
//!
//! [`CurveConverter`] runs the per-element conversions of [`crate::codec`] and [`crate::point`]
//! through the batch scheduler, for the scalars, base field elements, G1 and G2 points of one
//! curve family.

use std::marker::PhantomData;

use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ec::{AffineRepr, CurveGroup};

use crate::batch::{convert_batch, convert_chunks, map_batch, map_chunks};
use crate::codec::{decode_device, encode_canonical, LimbCodec};
use crate::config::ConversionConfig;
use crate::curves::{
    DeviceBase, DeviceCurve, DeviceScalar, G1Affine, G1DeviceAffine, G1DeviceProjective,
    G1Jacobian, G2Affine, G2DeviceAffine, G2DeviceProjective, G2Jacobian,
};
use crate::error::Result;
use crate::limbs::{DeviceField, LimbStorage};
use crate::point::{
    affine_to_device_affine, device_affine_to_affine, host_affine_to_device, jacobian_to_device,
    DeviceAffine, DeviceProjective, FieldInverse, HostInverse, PointNormalizer,
};

/// Batch conversions between host values of the curve `C` and their device records.
#[derive(Clone, Debug)]
pub struct CurveConverter<C: DeviceCurve, I = HostInverse> {
    config: ConversionConfig,
    normalizer: PointNormalizer<I>,
    _curve: PhantomData<C>,
}

impl<C: DeviceCurve> CurveConverter<C> {
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_inverse(config, HostInverse)
    }
}

impl<C: DeviceCurve> Default for CurveConverter<C> {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

impl<C: DeviceCurve, I> CurveConverter<C, I> {
    pub fn with_inverse(config: ConversionConfig, inverse: I) -> Self {
        Self {
            config,
            normalizer: PointNormalizer::new(inverse),
            _curve: PhantomData,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &PointNormalizer<I> {
        &self.normalizer
    }

    fn workers(&self) -> usize {
        self.config.workers
    }

    fn fields_to_device<F: LimbCodec, L: LimbStorage>(&self, values: &[F]) -> Vec<DeviceField<L>> {
        map_batch(values, self.workers(), encode_canonical::<F, L>)
    }

    fn fields_from_device<F: LimbCodec, L: LimbStorage>(
        &self,
        values: &[DeviceField<L>],
    ) -> Result<Vec<F>> {
        convert_batch(values, self.workers(), decode_device::<F, L>)
    }

    fn affine_points_to_device<P, L>(&self, points: &[Affine<P>]) -> Vec<DeviceProjective<L>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
    {
        map_batch(points, self.workers(), host_affine_to_device::<P, L>)
    }

    fn jacobian_points_to_device<P, L>(&self, points: &[Projective<P>]) -> Vec<DeviceProjective<L>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
    {
        if self.config.amortize_inversions {
            map_chunks(points, self.workers(), |chunk| {
                Projective::normalize_batch(chunk)
                    .iter()
                    .map(host_affine_to_device::<P, L>)
                    .collect()
            })
        } else {
            map_batch(points, self.workers(), jacobian_to_device::<P, L>)
        }
    }

    fn affine_points_to_device_affine<P, L>(&self, points: &[Affine<P>]) -> Vec<DeviceAffine<L>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
    {
        map_batch(points, self.workers(), affine_to_device_affine::<P, L>)
    }

    fn device_affine_points_to_affine<P, L>(
        &self,
        points: &[DeviceAffine<L>],
    ) -> Result<Vec<Affine<P>>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
    {
        convert_batch(points, self.workers(), device_affine_to_affine::<P, L>)
    }

    fn projective_points_from_device<P, L>(
        &self,
        points: &[DeviceProjective<L>],
    ) -> Result<Vec<Affine<P>>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
        I: FieldInverse<P::BaseField>,
    {
        let normalizer = &self.normalizer;
        if self.config.amortize_inversions {
            convert_chunks(points, self.workers(), |chunk| {
                normalizer.batch_to_affine::<P, L>(chunk)
            })
        } else {
            convert_batch(points, self.workers(), |point| {
                normalizer.projective_device_to_host_affine::<P, L>(point)
            })
        }
    }

    fn projective_points_to_jacobian<P, L>(
        &self,
        points: &[DeviceProjective<L>],
    ) -> Result<Vec<Projective<P>>>
    where
        P: SWCurveConfig,
        P::BaseField: LimbCodec,
        L: LimbStorage,
        I: FieldInverse<P::BaseField>,
    {
        let affine = self.projective_points_from_device::<P, L>(points)?;
        Ok(affine.into_iter().map(|point| point.into_group()).collect())
    }

    pub fn scalars_to_device(&self, scalars: &[C::ScalarField]) -> Vec<DeviceScalar<C>> {
        self.fields_to_device(scalars)
    }

    pub fn scalars_from_device(&self, scalars: &[DeviceScalar<C>]) -> Result<Vec<C::ScalarField>> {
        self.fields_from_device(scalars)
    }

    pub fn base_fields_to_device(&self, values: &[C::BaseField]) -> Vec<DeviceBase<C>> {
        self.fields_to_device(values)
    }

    pub fn base_fields_from_device(&self, values: &[DeviceBase<C>]) -> Result<Vec<C::BaseField>> {
        self.fields_from_device(values)
    }

    /// Lifts G1 affine points to device projective records with `Z = 1`.
    pub fn g1_affine_to_device(&self, points: &[G1Affine<C>]) -> Vec<G1DeviceProjective<C>> {
        self.affine_points_to_device(points)
    }

    pub fn g1_jacobian_to_device(&self, points: &[G1Jacobian<C>]) -> Vec<G1DeviceProjective<C>> {
        self.jacobian_points_to_device(points)
    }

    /// MSM base layout: affine records, identity as `(0, 0)`
    pub fn g1_affine_to_device_affine(&self, points: &[G1Affine<C>]) -> Vec<G1DeviceAffine<C>> {
        self.affine_points_to_device_affine(points)
    }

    pub fn g1_device_affine_to_affine(
        &self,
        points: &[G1DeviceAffine<C>],
    ) -> Result<Vec<G1Affine<C>>> {
        self.device_affine_points_to_affine(points)
    }

    /// Normalizes device projective G1 points. `Z = 0` yields the identity.
    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = points.len()))]
    pub fn g1_projective_from_device(
        &self,
        points: &[G1DeviceProjective<C>],
    ) -> Result<Vec<G1Affine<C>>>
    where
        I: FieldInverse<C::BaseField>,
    {
        self.projective_points_from_device::<C::G1, _>(points)
    }

    pub fn g1_projective_to_jacobian(
        &self,
        points: &[G1DeviceProjective<C>],
    ) -> Result<Vec<G1Jacobian<C>>>
    where
        I: FieldInverse<C::BaseField>,
    {
        self.projective_points_to_jacobian::<C::G1, _>(points)
    }

    pub fn g2_affine_to_device(&self, points: &[G2Affine<C>]) -> Vec<G2DeviceProjective<C>> {
        self.affine_points_to_device(points)
    }

    pub fn g2_jacobian_to_device(&self, points: &[G2Jacobian<C>]) -> Vec<G2DeviceProjective<C>> {
        self.jacobian_points_to_device(points)
    }

    pub fn g2_affine_to_device_affine(&self, points: &[G2Affine<C>]) -> Vec<G2DeviceAffine<C>> {
        self.affine_points_to_device_affine(points)
    }

    pub fn g2_device_affine_to_affine(
        &self,
        points: &[G2DeviceAffine<C>],
    ) -> Result<Vec<G2Affine<C>>> {
        self.device_affine_points_to_affine(points)
    }

    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = points.len()))]
    pub fn g2_projective_from_device(
        &self,
        points: &[G2DeviceProjective<C>],
    ) -> Result<Vec<G2Affine<C>>>
    where
        I: FieldInverse<C::G2BaseField>,
    {
        self.projective_points_from_device::<C::G2, _>(points)
    }

    pub fn g2_projective_to_jacobian(
        &self,
        points: &[G2DeviceProjective<C>],
    ) -> Result<Vec<G2Jacobian<C>>>
    where
        I: FieldInverse<C::G2BaseField>,
    {
        self.projective_points_to_jacobian::<C::G2, _>(points)
    }
}
