//! # lutra-ops
//!
//! Color operator data model for the Lutra pipeline.
//!
//! This crate holds the operator types a processor graph is built from,
//! centered on the 1D LUT:
//!
//! - [`Lut1DOp`] - per-channel transfer function on a standard or half
//!   domain, with validation, identity detection, inverse preparation and
//!   content fingerprinting
//! - [`MatrixOp`], [`RangeOp`] - collaborator ops used as identity
//!   replacements and composition stages
//! - [`compose`] / [`compose_with_ops`] - fold two LUTs into one by
//!   resampling and evaluation
//! - [`make_fast_lut1d_from_inverse`] - forward approximation of an
//!   inverse LUT
//! - [`eval_transform`] - CPU evaluation of an [`Op`] sequence
//!
//! # Example
//!
//! ```rust
//! use lutra_ops::{compose, ComposeMethod, Lut1DOp};
//!
//! // Fold a gamma curve into a grading curve.
//! let mut shaper = Lut1DOp::new(1024)?;
//! let mut grade = Lut1DOp::new(4096)?;
//! grade.scale(0.9);
//!
//! if shaper.may_compose(&grade) {
//!     compose(&mut shaper, &grade, ComposeMethod::ResampleNo)?;
//! }
//! shaper.finalize()?;
//! println!("cache id: {}", shaper.cache_id());
//! # Ok::<(), lutra_ops::OpError>(())
//! ```
//!
//! # Dependencies
//!
//! - [`lutra-core`] - enums and the half-float bridge
//! - [`thiserror`] - error handling
//! - [`md-5`] - content hashing for cache IDs
//! - [`tracing`] - structured logging
//!
//! [`lutra-core`]: lutra_core
//! [`md-5`]: md5

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod eval;
pub mod guard;
pub mod lut1d;
pub mod matrix;
pub mod metadata;
pub mod range;

pub use error::{OpError, OpResult};
pub use eval::{eval_transform, Op};
pub use guard::ExactInversionGuard;
pub use lut1d::{
    compose, compose_with_ops, make_fast_lut1d_from_inverse, ComponentProperties, ComposeMethod,
    HalfFlags, HueAdjust, InversionQuality, Lut1DArray, Lut1DOp, HALF_DOMAIN_ENTRIES,
    MAX_LUT_LENGTH,
};
pub use matrix::MatrixOp;
pub use metadata::FormatMetadata;
pub use range::RangeOp;
