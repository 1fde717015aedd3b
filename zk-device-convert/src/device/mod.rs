//! Accelerator collaborator
//!
//! [`Accelerator`] is the interface of the external accelerator library: raw byte buffers,
//! transfers, and the MSM/NTT kernels. [`DeviceContext`] packs host values into device records
//! with a [`CurveConverter`], ships them, runs the kernel, and converts the results back.
//! Every buffer it allocates is owned by a [`DeviceAllocation`] and released on every path.

use std::marker::PhantomData;

use ark_ec::CurveGroup;

use crate::config::ConversionConfig;
use crate::convert::CurveConverter;
use crate::curves::{
    DeviceCurve, DeviceScalar, G1Affine, G1DeviceProjective, G2Affine, G2DeviceProjective,
};
use crate::error::{AcceleratorError, ConversionError, Result};
use crate::point::{projective_device_to_jacobian_unnormalized, FieldInverse, HostInverse};

pub mod sim;

pub use sim::SimAccelerator;

/// Handle on an accelerator memory zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceBuffer {
    handle: u64,
    size_b: usize,
}

impl DeviceBuffer {
    pub fn new(handle: u64, size_b: usize) -> Self {
        Self { handle, size_b }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Size in bytes
    pub fn size_b(&self) -> usize {
        self.size_b
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NttDirection {
    Forward,
    Inverse,
}

/// External accelerator library, as seen from the conversion layer.
///
/// Buffers hold opaque device records of the curve `C`: scalars are [`DeviceScalar`] records,
/// MSM bases are affine records, MSM results are one projective record.
pub trait Accelerator<C: DeviceCurve>: Sync {
    fn malloc(&self, size_b: usize) -> Result<DeviceBuffer, AcceleratorError>;

    fn copy_to_device(&self, dst: &DeviceBuffer, src: &[u8]) -> Result<(), AcceleratorError>;

    fn copy_from_device(&self, dst: &mut [u8], src: &DeviceBuffer) -> Result<(), AcceleratorError>;

    fn free(&self, buffer: DeviceBuffer) -> Result<(), AcceleratorError>;

    /// Writes `sum(scalars[i] * points[i])` for the first `count` records as a G1 projective
    /// record into `result`.
    fn g1_msm(
        &self,
        scalars: &DeviceBuffer,
        points: &DeviceBuffer,
        count: usize,
        result: &DeviceBuffer,
    ) -> Result<(), AcceleratorError>;

    /// Same as [`Self::g1_msm`] over G2
    fn g2_msm(
        &self,
        scalars: &DeviceBuffer,
        points: &DeviceBuffer,
        count: usize,
        result: &DeviceBuffer,
    ) -> Result<(), AcceleratorError>;

    /// In-place transform of `count` scalar records, natural order in and out.
    fn ntt(
        &self,
        values: &DeviceBuffer,
        count: usize,
        direction: NttDirection,
    ) -> Result<(), AcceleratorError>;
}

/// Device buffer released on drop.
///
/// An empty allocation holds no device memory and is never passed to the accelerator.
pub struct DeviceAllocation<'a, C: DeviceCurve, A: Accelerator<C> + ?Sized> {
    accelerator: &'a A,
    buffer: Option<DeviceBuffer>,
    _curve: PhantomData<C>,
}

impl<'a, C: DeviceCurve, A: Accelerator<C> + ?Sized> DeviceAllocation<'a, C, A> {
    pub fn new(accelerator: &'a A, size_b: usize) -> Result<Self> {
        if size_b == 0 {
            return Ok(Self::empty(accelerator));
        }
        let buffer = accelerator.malloc(size_b)?;
        tracing::trace!(handle = buffer.handle(), size_b, "allocated device buffer");
        Ok(Self {
            accelerator,
            buffer: Some(buffer),
            _curve: PhantomData,
        })
    }

    pub fn empty(accelerator: &'a A) -> Self {
        Self {
            accelerator,
            buffer: None,
            _curve: PhantomData,
        }
    }

    /// Allocates a buffer sized for `records` and copies them in.
    pub fn from_records<T: bytemuck::Pod>(accelerator: &'a A, records: &[T]) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(records);
        let allocation = Self::new(accelerator, bytes.len())?;
        if let Some(buffer) = &allocation.buffer {
            accelerator.copy_to_device(buffer, bytes)?;
        }
        Ok(allocation)
    }

    pub fn buffer(&self) -> Option<&DeviceBuffer> {
        self.buffer.as_ref()
    }

    pub fn size_b(&self) -> usize {
        self.buffer.map_or(0, |buffer| buffer.size_b())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_none()
    }

    /// Copies the buffer content back into `records`.
    pub fn read_records<T: bytemuck::Pod>(&self, records: &mut [T]) -> Result<()> {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(records);
        match &self.buffer {
            Some(buffer) => Ok(self.accelerator.copy_from_device(bytes, buffer)?),
            None if bytes.is_empty() => Ok(()),
            None => Err(AcceleratorError::TransferFailure {
                reason: format!("read of {} bytes from an empty allocation", bytes.len()),
            }
            .into()),
        }
    }

    /// Gives up ownership; the caller becomes responsible for freeing the buffer.
    pub fn into_raw(mut self) -> Option<DeviceBuffer> {
        self.buffer.take()
    }

    /// Frees the buffer now, reporting a failure instead of logging it.
    pub fn free(mut self) -> Result<()> {
        match self.buffer.take() {
            Some(buffer) => Ok(self.accelerator.free(buffer)?),
            None => Ok(()),
        }
    }
}

impl<C: DeviceCurve, A: Accelerator<C> + ?Sized> Drop for DeviceAllocation<'_, C, A> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(err) = self.accelerator.free(buffer) {
                tracing::warn!(handle = buffer.handle(), "failed to free device buffer: {err}");
            }
        }
    }
}

fn required_buffer<'b, C, A>(
    allocation: &'b DeviceAllocation<'_, C, A>,
    op: &'static str,
) -> Result<&'b DeviceBuffer>
where
    C: DeviceCurve,
    A: Accelerator<C> + ?Sized,
{
    allocation.buffer().ok_or_else(|| {
        AcceleratorError::OperationFailed {
            op,
            reason: "empty input buffer".to_string(),
        }
        .into()
    })
}

/// Host side of the accelerator: conversions plus device calls for the curve `C`.
pub struct DeviceContext<C: DeviceCurve, A, I = HostInverse> {
    accelerator: A,
    converter: CurveConverter<C, I>,
}

impl<C: DeviceCurve, A: Accelerator<C>> DeviceContext<C, A> {
    pub fn new(accelerator: A, config: ConversionConfig) -> Self {
        Self::with_converter(accelerator, CurveConverter::new(config))
    }
}

impl<C: DeviceCurve> DeviceContext<C, SimAccelerator> {
    /// Context backed by the host-memory simulation, sized by `config.device_memory_limit`
    pub fn simulated(config: ConversionConfig) -> Self {
        let accelerator = SimAccelerator::from_config(&config);
        Self::new(accelerator, config)
    }
}

impl<C, A, I> DeviceContext<C, A, I>
where
    C: DeviceCurve,
    A: Accelerator<C>,
    I: FieldInverse<C::BaseField> + FieldInverse<C::G2BaseField>,
{
    pub fn with_converter(accelerator: A, converter: CurveConverter<C, I>) -> Self {
        Self {
            accelerator,
            converter,
        }
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    pub fn converter(&self) -> &CurveConverter<C, I> {
        &self.converter
    }

    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = scalars.len()))]
    pub fn copy_scalars_to_device(
        &self,
        scalars: &[C::ScalarField],
    ) -> Result<DeviceAllocation<'_, C, A>> {
        let records = self.converter.scalars_to_device(scalars);
        DeviceAllocation::from_records(&self.accelerator, &records)
    }

    /// Ships G1 points as affine MSM bases. No points, no allocation.
    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = points.len()))]
    pub fn copy_points_to_device(
        &self,
        points: &[G1Affine<C>],
    ) -> Result<DeviceAllocation<'_, C, A>> {
        if points.is_empty() {
            return Ok(DeviceAllocation::empty(&self.accelerator));
        }
        let records = self.converter.g1_affine_to_device_affine(points);
        DeviceAllocation::from_records(&self.accelerator, &records)
    }

    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = points.len()))]
    pub fn copy_g2_points_to_device(
        &self,
        points: &[G2Affine<C>],
    ) -> Result<DeviceAllocation<'_, C, A>> {
        if points.is_empty() {
            return Ok(DeviceAllocation::empty(&self.accelerator));
        }
        let records = self.converter.g2_affine_to_device_affine(points);
        DeviceAllocation::from_records(&self.accelerator, &records)
    }

    fn check_msm_lengths(points: usize, scalars: usize) -> Result<()> {
        if points != scalars {
            return Err(ConversionError::LengthMismatch {
                left: points,
                right: scalars,
            });
        }
        Ok(())
    }

    /// `sum(scalars[i] * points[i])` computed on the accelerator
    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = points.len()))]
    pub fn msm_on_device(
        &self,
        points: &[G1Affine<C>],
        scalars: &[C::ScalarField],
    ) -> Result<G1Affine<C>> {
        Self::check_msm_lengths(points.len(), scalars.len())?;
        if points.is_empty() {
            return Ok(G1Affine::<C>::identity());
        }

        let device_points = self.copy_points_to_device(points)?;
        let device_scalars = self.copy_scalars_to_device(scalars)?;
        let result = DeviceAllocation::<C, A>::new(
            &self.accelerator,
            std::mem::size_of::<G1DeviceProjective<C>>(),
        )?;

        self.accelerator.g1_msm(
            required_buffer(&device_scalars, "g1_msm")?,
            required_buffer(&device_points, "g1_msm")?,
            points.len(),
            required_buffer(&result, "g1_msm")?,
        )?;

        let mut output = [G1DeviceProjective::<C>::identity()];
        result.read_records(&mut output)?;
        tracing::trace!(result = ?output[0], "msm result");

        self.converter
            .normalizer()
            .projective_device_to_host_affine::<C::G1, _>(&output[0])
    }

    /// G2 version of [`Self::msm_on_device`]
    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = points.len()))]
    pub fn g2_msm_on_device(
        &self,
        points: &[G2Affine<C>],
        scalars: &[C::ScalarField],
    ) -> Result<G2Affine<C>> {
        Self::check_msm_lengths(points.len(), scalars.len())?;
        if points.is_empty() {
            return Ok(G2Affine::<C>::identity());
        }

        let device_points = self.copy_g2_points_to_device(points)?;
        let device_scalars = self.copy_scalars_to_device(scalars)?;
        let result = DeviceAllocation::<C, A>::new(
            &self.accelerator,
            std::mem::size_of::<G2DeviceProjective<C>>(),
        )?;

        self.accelerator.g2_msm(
            required_buffer(&device_scalars, "g2_msm")?,
            required_buffer(&device_points, "g2_msm")?,
            points.len(),
            required_buffer(&result, "g2_msm")?,
        )?;

        let mut output = [G2DeviceProjective::<C>::identity()];
        result.read_records(&mut output)?;
        tracing::trace!(result = ?output[0], "g2 msm result");

        // G2 results skip the strict normalization: the Jacobian lift needs no inversion
        let jacobian = projective_device_to_jacobian_unnormalized::<C::G2, _>(&output[0])?;
        Ok(jacobian.into_affine())
    }

    fn ntt(
        &self,
        values: &[C::ScalarField],
        direction: NttDirection,
    ) -> Result<Vec<C::ScalarField>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let device_values = self.copy_scalars_to_device(values)?;
        self.accelerator.ntt(
            required_buffer(&device_values, "ntt")?,
            values.len(),
            direction,
        )?;

        let mut output = vec![DeviceScalar::<C>::zero(); values.len()];
        device_values.read_records(&mut output)?;
        self.converter.scalars_from_device(&output)
    }

    /// Evaluations of the polynomial with coefficients `values` over the size `values.len()`
    /// subgroup
    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = values.len()))]
    pub fn ntt_on_device(&self, values: &[C::ScalarField]) -> Result<Vec<C::ScalarField>> {
        self.ntt(values, NttDirection::Forward)
    }

    #[tracing::instrument(level = "trace", skip_all, fields(curve = C::NAME, len = values.len()))]
    pub fn intt_on_device(&self, values: &[C::ScalarField]) -> Result<Vec<C::ScalarField>> {
        self.ntt(values, NttDirection::Inverse)
    }
}
