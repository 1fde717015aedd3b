//! Conversion layer between arkworks curve types and accelerator limb records.
//!
//! Host values (arkworks field elements in Montgomery form, affine and Jacobian points) are
//! converted to fixed-width little-endian u32 limb records in canonical form, which an
//! accelerator consumes as opaque byte buffers, and back. Conversions of whole batches are
//! spread over rayon workers with a deterministic output order.
//!
//! ```no_run
//! use ark_ec::AffineRepr;
//! use zk_device_convert::curves::{Bls12_381, G1Affine};
//! use zk_device_convert::{ConversionConfig, CurveConverter};
//!
//! let converter = CurveConverter::<Bls12_381>::new(ConversionConfig::default());
//! let points = vec![G1Affine::<Bls12_381>::generator(); 4];
//! let device = converter.g1_affine_to_device(&points);
//! let back = converter.g1_projective_from_device(&device).unwrap();
//! assert_eq!(back, points);
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod convert;
pub mod curves;
pub mod device;
pub mod error;
pub mod extension;
pub mod limbs;
pub mod point;

pub use config::ConversionConfig;
pub use convert::CurveConverter;
pub use curves::{Bls12_377, Bls12_381, Bn254, Bw6_761, DeviceCurve};
pub use device::{Accelerator, DeviceContext, SimAccelerator};
pub use error::{AcceleratorError, ConversionError, Result};
pub use limbs::{DeviceField, LimbStorage};
pub use point::{DeviceAffine, DeviceProjective, FieldInverse, HostInverse, PointNormalizer};
