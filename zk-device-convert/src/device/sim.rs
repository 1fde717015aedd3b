//! Implement a simple mockup of the accelerator library.
//! It enables to run the device path without the real HW
//!
//! Device memory is a map of host byte buffers, optionally bounded. Kernels decode their input
//! records, compute with arkworks and write device records back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use ark_ec::short_weierstrass::{Projective, SWCurveConfig};
use ark_ec::VariableBaseMSM;
use ark_ff::{Field, Zero};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
use bytemuck::Pod;

use super::{Accelerator, DeviceBuffer, NttDirection};
use crate::codec::{decode_device, encode_canonical, LimbCodec};
use crate::config::ConversionConfig;
use crate::curves::{DeviceCurve, DeviceScalar};
use crate::error::AcceleratorError;
use crate::limbs::LimbStorage;
use crate::point::{device_affine_to_affine, DeviceAffine, DeviceProjective};

fn failed(op: &'static str, reason: impl ToString) -> AcceleratorError {
    AcceleratorError::OperationFailed {
        op,
        reason: reason.to_string(),
    }
}

/// Homogeneous record of a Jacobian point, without inversion: `(X·Z, Y, Z³)`
fn jacobian_to_device_projective<P, L>(point: &Projective<P>) -> DeviceProjective<L>
where
    P: SWCurveConfig,
    P::BaseField: LimbCodec,
    L: LimbStorage,
{
    if point.is_zero() {
        return DeviceProjective::identity();
    }
    let z3 = point.z.square() * point.z;
    DeviceProjective::new(
        encode_canonical(&(point.x * point.z)),
        encode_canonical(&point.y),
        encode_canonical(&z3),
    )
}

#[derive(Debug, Default)]
pub struct SimAccelerator {
    memory: Mutex<HashMap<u64, Vec<u8>>>,
    next_handle: AtomicU64,
    memory_limit: Option<usize>,
}

impl SimAccelerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means unbounded
    pub fn with_memory_limit(memory_limit: Option<usize>) -> Self {
        Self {
            memory_limit,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::with_memory_limit(config.device_memory_limit)
    }

    fn memory(&self) -> Result<MutexGuard<'_, HashMap<u64, Vec<u8>>>, AcceleratorError> {
        self.memory
            .lock()
            .map_err(|_| failed("lock", "device memory poisoned"))
    }

    /// Number of buffers currently allocated
    pub fn live_buffers(&self) -> usize {
        self.memory().map_or(0, |memory| memory.len())
    }

    pub fn allocated_bytes(&self) -> usize {
        self.memory()
            .map_or(0, |memory| memory.values().map(Vec::len).sum())
    }

    fn read<T: Pod>(
        &self,
        buffer: &DeviceBuffer,
        count: usize,
        op: &'static str,
    ) -> Result<Vec<T>, AcceleratorError> {
        let record_b = std::mem::size_of::<T>();
        let memory = self.memory()?;
        let zone = memory
            .get(&buffer.handle())
            .ok_or(AcceleratorError::InvalidBuffer {
                handle: buffer.handle(),
            })?;
        let needed = count * record_b;
        if zone.len() < needed {
            return Err(failed(
                op,
                format!("buffer holds {} bytes, {needed} needed", zone.len()),
            ));
        }
        Ok(zone[..needed]
            .chunks_exact(record_b)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn write(&self, buffer: &DeviceBuffer, bytes: &[u8]) -> Result<(), AcceleratorError> {
        let mut memory = self.memory()?;
        let zone = memory
            .get_mut(&buffer.handle())
            .ok_or(AcceleratorError::InvalidBuffer {
                handle: buffer.handle(),
            })?;
        if zone.len() < bytes.len() {
            return Err(AcceleratorError::TransferFailure {
                reason: format!(
                    "{} bytes do not fit in buffer #{} of {} bytes",
                    bytes.len(),
                    buffer.handle(),
                    zone.len()
                ),
            });
        }
        zone[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn msm<C, P, L>(
        &self,
        op: &'static str,
        scalars: &DeviceBuffer,
        points: &DeviceBuffer,
        count: usize,
        result: &DeviceBuffer,
    ) -> Result<(), AcceleratorError>
    where
        C: DeviceCurve,
        P: SWCurveConfig<ScalarField = C::ScalarField>,
        P::BaseField: LimbCodec,
        L: LimbStorage,
    {
        let scalars = self
            .read::<DeviceScalar<C>>(scalars, count, op)?
            .iter()
            .map(decode_device::<C::ScalarField, C::ScalarLimbs>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| failed(op, err))?;
        let bases = self
            .read::<DeviceAffine<L>>(points, count, op)?
            .iter()
            .map(device_affine_to_affine::<P, L>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| failed(op, err))?;

        let sum = Projective::<P>::msm(&bases, &scalars)
            .map_err(|len| failed(op, format!("{len} bases for {} scalars", scalars.len())))?;
        let record = jacobian_to_device_projective::<P, L>(&sum);
        self.write(result, bytemuck::bytes_of(&record))
    }
}

impl<C: DeviceCurve> Accelerator<C> for SimAccelerator {
    fn malloc(&self, size_b: usize) -> Result<DeviceBuffer, AcceleratorError> {
        let mut memory = self.memory()?;
        if let Some(limit) = self.memory_limit {
            let used = memory.values().map(Vec::len).sum::<usize>();
            let available = limit.saturating_sub(used);
            if size_b > available {
                return Err(AcceleratorError::AllocationFailure {
                    requested: size_b,
                    available,
                });
            }
        }

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!("Req => malloc #{handle} {size_b}B");
        memory.insert(handle, vec![0; size_b]);
        Ok(DeviceBuffer::new(handle, size_b))
    }

    fn copy_to_device(&self, dst: &DeviceBuffer, src: &[u8]) -> Result<(), AcceleratorError> {
        tracing::trace!("Req => copy_to_device #{} {}B", dst.handle(), src.len());
        self.write(dst, src)
    }

    fn copy_from_device(&self, dst: &mut [u8], src: &DeviceBuffer) -> Result<(), AcceleratorError> {
        tracing::trace!("Req => copy_from_device #{} {}B", src.handle(), dst.len());
        let memory = self.memory()?;
        let zone = memory
            .get(&src.handle())
            .ok_or(AcceleratorError::InvalidBuffer {
                handle: src.handle(),
            })?;
        if zone.len() < dst.len() {
            return Err(AcceleratorError::TransferFailure {
                reason: format!(
                    "read of {} bytes from buffer #{} of {} bytes",
                    dst.len(),
                    src.handle(),
                    zone.len()
                ),
            });
        }
        dst.copy_from_slice(&zone[..dst.len()]);
        Ok(())
    }

    fn free(&self, buffer: DeviceBuffer) -> Result<(), AcceleratorError> {
        tracing::trace!("Req => free #{}", buffer.handle());
        self.memory()?
            .remove(&buffer.handle())
            .map(|_| ())
            .ok_or(AcceleratorError::InvalidBuffer {
                handle: buffer.handle(),
            })
    }

    fn g1_msm(
        &self,
        scalars: &DeviceBuffer,
        points: &DeviceBuffer,
        count: usize,
        result: &DeviceBuffer,
    ) -> Result<(), AcceleratorError> {
        self.msm::<C, C::G1, C::BaseLimbs>("g1_msm", scalars, points, count, result)
    }

    fn g2_msm(
        &self,
        scalars: &DeviceBuffer,
        points: &DeviceBuffer,
        count: usize,
        result: &DeviceBuffer,
    ) -> Result<(), AcceleratorError> {
        self.msm::<C, C::G2, C::G2Limbs>("g2_msm", scalars, points, count, result)
    }

    fn ntt(
        &self,
        values: &DeviceBuffer,
        count: usize,
        direction: NttDirection,
    ) -> Result<(), AcceleratorError> {
        let domain = Radix2EvaluationDomain::<C::ScalarField>::new(count)
            .filter(|domain| domain.size() == count)
            .ok_or_else(|| failed("ntt", format!("no radix-2 domain of size {count}")))?;

        let mut scalars = self
            .read::<DeviceScalar<C>>(values, count, "ntt")?
            .iter()
            .map(decode_device::<C::ScalarField, C::ScalarLimbs>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| failed("ntt", err))?;

        match direction {
            NttDirection::Forward => domain.fft_in_place(&mut scalars),
            NttDirection::Inverse => domain.ifft_in_place(&mut scalars),
        }

        let records = scalars
            .iter()
            .map(encode_canonical::<C::ScalarField, C::ScalarLimbs>)
            .collect::<Vec<_>>();
        self.write(values, bytemuck::cast_slice(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{Bls12_377, Bls12_381, Bn254, Bw6_761, G1Affine, G1Jacobian, G2Jacobian};
    use crate::device::DeviceContext;
    use crate::error::ConversionError;
    use ark_ec::{AffineRepr, CurveGroup};
    use ark_ff::UniformRand;
    use ark_poly::univariate::DensePolynomial;
    use ark_poly::{DenseUVPolynomial, Polynomial};
    use ark_std::test_rng;

    fn triangular_number(n: u64) -> u64 {
        n * (n + 1) / 2
    }

    fn context<C: DeviceCurve>(workers: usize) -> DeviceContext<C, SimAccelerator> {
        DeviceContext::simulated(ConversionConfig::sequential().with_workers(workers))
    }

    #[test]
    fn test_malloc_free() {
        let sim = SimAccelerator::new();
        let buffer = Accelerator::<Bn254>::malloc(&sim, 64).unwrap();
        assert_eq!(buffer.size_b(), 64);
        assert_eq!(sim.live_buffers(), 1);
        assert_eq!(sim.allocated_bytes(), 64);

        Accelerator::<Bn254>::free(&sim, buffer).unwrap();
        assert_eq!(sim.live_buffers(), 0);
        assert_eq!(
            Accelerator::<Bn254>::free(&sim, buffer),
            Err(AcceleratorError::InvalidBuffer {
                handle: buffer.handle()
            })
        );
    }

    #[test]
    fn test_memory_limit() {
        let sim = SimAccelerator::with_memory_limit(Some(100));
        let first = Accelerator::<Bn254>::malloc(&sim, 60).unwrap();
        assert_eq!(
            Accelerator::<Bn254>::malloc(&sim, 60),
            Err(AcceleratorError::AllocationFailure {
                requested: 60,
                available: 40
            })
        );
        Accelerator::<Bn254>::free(&sim, first).unwrap();
        assert!(Accelerator::<Bn254>::malloc(&sim, 100).is_ok());
    }

    #[test]
    fn test_transfer_overflow() {
        let sim = SimAccelerator::new();
        let buffer = Accelerator::<Bn254>::malloc(&sim, 8).unwrap();
        assert!(matches!(
            Accelerator::<Bn254>::copy_to_device(&sim, &buffer, &[0u8; 9]),
            Err(AcceleratorError::TransferFailure { .. })
        ));
        let mut out = [0u8; 16];
        assert!(matches!(
            Accelerator::<Bn254>::copy_from_device(&sim, &mut out, &buffer),
            Err(AcceleratorError::TransferFailure { .. })
        ));

        Accelerator::<Bn254>::copy_to_device(&sim, &buffer, &[7u8; 8]).unwrap();
        let mut out = [0u8; 8];
        Accelerator::<Bn254>::copy_from_device(&sim, &mut out, &buffer).unwrap();
        assert_eq!(out, [7u8; 8]);
    }

    #[test]
    fn test_empty_points_no_allocation() {
        let ctx = context::<Bls12_381>(1);
        let points = ctx.copy_points_to_device(&[]).unwrap();
        assert!(points.is_empty());
        assert_eq!(points.size_b(), 0);
        let g2_points = ctx.copy_g2_points_to_device(&[]).unwrap();
        assert!(g2_points.is_empty());
        assert_eq!(ctx.accelerator().live_buffers(), 0);

        assert!(ctx.msm_on_device(&[], &[]).unwrap().is_zero());
        assert!(ctx.g2_msm_on_device(&[], &[]).unwrap().is_zero());
    }

    #[test]
    fn test_allocation_guard() {
        let ctx = context::<Bn254>(1);
        {
            let scalars = ctx
                .copy_scalars_to_device(&[ark_bn254::Fr::from(3u64); 4])
                .unwrap();
            assert_eq!(scalars.size_b(), 4 * 32);
            assert_eq!(ctx.accelerator().live_buffers(), 1);
        }
        assert_eq!(ctx.accelerator().live_buffers(), 0);

        let scalars = ctx
            .copy_scalars_to_device(&[ark_bn254::Fr::from(3u64)])
            .unwrap();
        let raw = scalars.into_raw().unwrap();
        assert_eq!(ctx.accelerator().live_buffers(), 1);
        Accelerator::<Bn254>::free(ctx.accelerator(), raw).unwrap();
        assert_eq!(ctx.accelerator().live_buffers(), 0);
    }

    #[test]
    fn test_length_mismatch() {
        let ctx = context::<Bn254>(1);
        let g = G1Affine::<Bn254>::generator();
        assert_eq!(
            ctx.msm_on_device(&[g, g], &[ark_bn254::Fr::from(1u64)]),
            Err(ConversionError::LengthMismatch { left: 2, right: 1 })
        );
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let g = G1Affine::<Bn254>::generator();
        let points = vec![g; 4];
        let scalars = vec![ark_bn254::Fr::from(2u64); 4];

        // room for the points (4 * 64 bytes) only
        let config = ConversionConfig::sequential().with_device_memory_limit(Some(4 * 64 + 1));
        let ctx = DeviceContext::<Bn254, _>::simulated(config);
        assert_eq!(
            ctx.msm_on_device(&points, &scalars),
            Err(ConversionError::Accelerator(
                AcceleratorError::AllocationFailure {
                    requested: 4 * 32,
                    available: 1
                }
            ))
        );
        assert_eq!(ctx.accelerator().live_buffers(), 0);
    }

    fn check_g1_msm_triangular<C: DeviceCurve>() {
        const MAX_N: u64 = 12;
        let ctx = context::<C>(3);
        let gen = G1Affine::<C>::generator();

        for n in 1..=MAX_N {
            let points = vec![gen; n as usize];
            let scalars = (1..=n).map(C::ScalarField::from).collect::<Vec<_>>();
            let result = ctx.msm_on_device(&points, &scalars).unwrap();
            let expected =
                (gen.into_group() * C::ScalarField::from(triangular_number(n))).into_affine();
            assert_eq!(result, expected, "{} G1 MSM: N={n}", C::NAME);
        }
        assert_eq!(ctx.accelerator().live_buffers(), 0);
    }

    fn check_g1_msm_random<C: DeviceCurve>() {
        let rng = &mut test_rng();
        let ctx = context::<C>(4);
        let points = (0..17)
            .map(|_| G1Jacobian::<C>::rand(rng).into_affine())
            .collect::<Vec<_>>();
        let scalars = (0..17)
            .map(|_| C::ScalarField::rand(rng))
            .collect::<Vec<_>>();
        let expected = G1Jacobian::<C>::msm(&points, &scalars).unwrap().into_affine();
        assert_eq!(ctx.msm_on_device(&points, &scalars).unwrap(), expected);
    }

    fn check_g1_msm_canceling<C: DeviceCurve>() {
        let ctx = context::<C>(1);
        let gen = G1Affine::<C>::generator();
        let result = ctx
            .msm_on_device(&[gen, gen], &[C::ScalarField::ONE, -C::ScalarField::ONE])
            .unwrap();
        assert!(result.is_zero(), "{} G1 MSM canceling scalars", C::NAME);
    }

    fn check_g1_msm_infinity_input<C: DeviceCurve>() {
        let ctx = context::<C>(1);
        let gen = G1Affine::<C>::generator();
        let points = [gen, G1Affine::<C>::identity(), gen];
        let scalars = [1u64, 5, 2].map(C::ScalarField::from);
        let expected = (gen.into_group() * C::ScalarField::from(3u64)).into_affine();
        assert_eq!(ctx.msm_on_device(&points, &scalars).unwrap(), expected);
    }

    fn check_g2_msm<C: DeviceCurve>() {
        let rng = &mut test_rng();
        let ctx = context::<C>(2);
        let mut points = (0..9)
            .map(|_| G2Jacobian::<C>::rand(rng).into_affine())
            .collect::<Vec<_>>();
        points[4] = G2Jacobian::<C>::zero().into_affine();
        let scalars = (0..9)
            .map(|_| C::ScalarField::rand(rng))
            .collect::<Vec<_>>();
        let expected = G2Jacobian::<C>::msm(&points, &scalars).unwrap().into_affine();
        assert_eq!(ctx.g2_msm_on_device(&points, &scalars).unwrap(), expected);

        let gen = points[0];
        let canceling = ctx
            .g2_msm_on_device(&[gen, gen], &[C::ScalarField::ONE, -C::ScalarField::ONE])
            .unwrap();
        assert!(canceling.is_zero(), "{} G2 MSM canceling scalars", C::NAME);
        assert_eq!(ctx.accelerator().live_buffers(), 0);
    }

    fn check_ntt<C: DeviceCurve>() {
        let rng = &mut test_rng();
        let ctx = context::<C>(4);
        let coeffs = (0..16)
            .map(|_| C::ScalarField::rand(rng))
            .collect::<Vec<_>>();

        let evals = ctx.ntt_on_device(&coeffs).unwrap();
        let domain = Radix2EvaluationDomain::<C::ScalarField>::new(coeffs.len()).unwrap();
        let poly = DensePolynomial::from_coefficients_slice(&coeffs);
        for (i, eval) in evals.iter().enumerate() {
            assert_eq!(*eval, poly.evaluate(&domain.element(i)), "{} NTT at {i}", C::NAME);
        }

        assert_eq!(ctx.intt_on_device(&evals).unwrap(), coeffs);
        assert!(ctx.ntt_on_device(&[]).unwrap().is_empty());

        assert!(matches!(
            ctx.ntt_on_device(&coeffs[..12]),
            Err(ConversionError::Accelerator(
                AcceleratorError::OperationFailed { op: "ntt", .. }
            ))
        ));
        assert_eq!(ctx.accelerator().live_buffers(), 0);
    }

    macro_rules! sim_tests {
        ($module:ident, $curve:ty) => {
            mod $module {
                use super::*;

                #[test]
                fn test_g1_msm_triangular() {
                    check_g1_msm_triangular::<$curve>();
                }

                #[test]
                fn test_g1_msm_random() {
                    check_g1_msm_random::<$curve>();
                }

                #[test]
                fn test_g1_msm_canceling_scalars_returns_infinity() {
                    check_g1_msm_canceling::<$curve>();
                }

                #[test]
                fn test_g1_msm_infinity_point_input() {
                    check_g1_msm_infinity_input::<$curve>();
                }

                #[test]
                fn test_g2_msm() {
                    check_g2_msm::<$curve>();
                }

                #[test]
                fn test_ntt_roundtrip() {
                    check_ntt::<$curve>();
                }
            }
        };
    }

    sim_tests!(bn254, Bn254);
    sim_tests!(bls12_377, Bls12_377);
    sim_tests!(bls12_381, Bls12_381);
    sim_tests!(bw6_761, Bw6_761);
}
