//! Error types for operator validation and composition.

use lutra_core::{BitDepth, Interpolation};
use thiserror::Error;

/// Result type for operator operations.
pub type OpResult<T> = Result<T, OpError>;

/// Errors reported by operator validation, canonicalization and composition.
#[derive(Debug, Error)]
pub enum OpError {
    /// LUT length outside the supported range.
    #[error("1D LUT length {0} is invalid: must be within [2, 1048576]")]
    InvalidLength(usize),

    /// Half-domain LUT whose table does not cover the half code space.
    #[error("1D LUT: {0} entries found, 65536 required for a half-domain LUT")]
    InvalidHalfDomain(usize),

    /// Interpolation algorithm the operator does not support.
    #[error("1D LUT does not support interpolation algorithm: {0}")]
    InvalidInterpolation(Interpolation),

    /// Bit depth with no defined lookup size.
    #[error("bit depth is not supported for a lookup table: {0}")]
    InvalidBitDepth(BitDepth),

    /// Hue adjust value outside the supported set.
    #[error("1D LUT has an invalid hue adjust style")]
    InvalidHueAdjust,

    /// Composition request that cannot be satisfied.
    #[error("invalid composition: {0}")]
    InvalidComposition(String),
}
