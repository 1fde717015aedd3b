//! Error types reported by the conversion layer and its accelerator collaborator

use thiserror::Error;

/// Errors raised by the accelerator library.
///
/// These are never produced by the conversion code itself, only forwarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcceleratorError {
    #[error("Device allocation of {requested} bytes failed ({available} bytes available)")]
    AllocationFailure { requested: usize, available: usize },

    #[error("Transfer failed: {reason}")]
    TransferFailure { reason: String },

    #[error("Unknown or already released device buffer #{handle}")]
    InvalidBuffer { handle: u64 },

    #[error("Accelerator operation `{op}` failed: {reason}")]
    OperationFailed { op: &'static str, reason: String },
}

/// Common error type exposed to user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Malformed encoding: expected {expected} bytes, found {found}")]
    MalformedEncoding { expected: usize, found: usize },

    #[error("Encoded value is not a canonical field element (>= modulus)")]
    NonCanonicalValue,

    #[error("Field inversion of zero is undefined")]
    FieldInversionUndefined,

    #[error("Length mismatch: {left} points for {right} scalars")]
    LengthMismatch { left: usize, right: usize },

    #[error(transparent)]
    Accelerator(#[from] AcceleratorError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = ConversionError> = std::result::Result<T, E>;
