//! 1D LUT operator data.
//!
//! A [`Lut1DOp`] holds a per-channel transfer function sampled either on a
//! uniform `[0, 1]` grid (standard domain) or on the 65536 IEEE 754 half
//! codes in code order (half domain). The operator carries everything the
//! rest of the pipeline needs to evaluate, invert, compose and cache it:
//! sampling flags, interpolation, direction, hue adjust, and the component
//! properties computed when an inverse is prepared.
//!
//! `finalize` is the canonicalization barrier: it monotonizes inverse data,
//! collapses identical channels, validates, and fingerprints the table into
//! a cache ID.

mod array;
mod compose;
mod prepare;

pub use array::{Lut1DArray, HALF_DOMAIN_ENTRIES, MAX_LUT_LENGTH};
pub use compose::{compose, compose_with_ops, make_fast_lut1d_from_inverse, ComposeMethod};
pub use prepare::ComponentProperties;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use lutra_core::{BitDepth, Interpolation, TransformDirection};
use md5::{Digest, Md5};
use tracing::debug;

use crate::eval::Op;
use crate::matrix::MatrixOp;
use crate::metadata::FormatMetadata;
use crate::range::RangeOp;
use crate::{OpError, OpResult};

/// Domain and value encoding flags of a 1D LUT.
///
/// The two bits are independent: `INPUT_HALF` states that the table is
/// indexed by half codes, `OUTPUT_RAW_HALF` states that the stored floats
/// are reinterpreted half bit patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HalfFlags {
    bits: u8,
}

impl HalfFlags {
    /// Uniform domain, plain float values.
    pub const STANDARD: Self = Self { bits: 0 };
    /// The domain is the 65536 half codes in code order.
    pub const INPUT_HALF: Self = Self { bits: 1 };
    /// Stored values are half bit patterns reinterpreted as floats.
    pub const OUTPUT_RAW_HALF: Self = Self { bits: 2 };

    /// True if the `INPUT_HALF` bit is set.
    #[inline]
    pub const fn input_half_domain(&self) -> bool {
        self.bits & Self::INPUT_HALF.bits != 0
    }

    /// True if the `OUTPUT_RAW_HALF` bit is set.
    #[inline]
    pub const fn output_raw_halfs(&self) -> bool {
        self.bits & Self::OUTPUT_RAW_HALF.bits != 0
    }

    #[inline]
    fn set(&mut self, flag: Self, on: bool) {
        if on {
            self.bits |= flag.bits;
        } else {
            self.bits &= !flag.bits;
        }
    }
}

impl std::ops::BitOr for HalfFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self { bits: self.bits | rhs.bits }
    }
}

/// Hue preservation mode applied after the per-channel curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HueAdjust {
    /// Channels stay independent.
    #[default]
    None,
    /// ACES DW3 hue restore; mixes channels.
    Dw3,
}

impl fmt::Display for HueAdjust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Dw3 => "dw3",
        })
    }
}

/// Quality/speed trade-off for inverse evaluation.
///
/// Advisory: excluded from equality and from the cache ID so both styles
/// share a processed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InversionQuality {
    /// Approximate the inverse with a forward lookup table.
    #[default]
    Fast,
    /// Invert by binary search over the monotonized samples.
    Exact,
}

/// A 1D LUT operator.
///
/// Owns its sample table exclusively; clones are deep. See the module
/// documentation for the lifecycle.
#[derive(Debug)]
pub struct Lut1DOp {
    interpolation: Interpolation,
    array: Lut1DArray,
    half_flags: HalfFlags,
    hue_adjust: HueAdjust,
    direction: TransformDirection,
    inversion_quality: InversionQuality,
    file_output_bit_depth: BitDepth,
    metadata: FormatMetadata,
    component_properties: [ComponentProperties; 3],
    cache_id: String,
    // Serializes validate + fingerprint for callers finalizing an operator
    // shared across threads.
    finalize_lock: Mutex<()>,
}

impl Lut1DOp {
    /// Creates a forward, standard-domain identity LUT of `length` entries.
    pub fn new(length: usize) -> OpResult<Self> {
        Self::with_domain(HalfFlags::STANDARD, length)
    }

    /// Creates a standard-domain identity LUT with an explicit direction.
    pub fn with_direction(length: usize, direction: TransformDirection) -> OpResult<Self> {
        let mut lut = Self::with_domain(HalfFlags::STANDARD, length)?;
        lut.direction = direction;
        Ok(lut)
    }

    /// Creates an identity LUT for the given domain kind.
    pub fn with_domain(half_flags: HalfFlags, length: usize) -> OpResult<Self> {
        Ok(Self {
            interpolation: Interpolation::Default,
            array: Lut1DArray::new(half_flags, length)?,
            half_flags,
            hue_adjust: HueAdjust::None,
            direction: TransformDirection::Forward,
            inversion_quality: InversionQuality::Fast,
            file_output_bit_depth: BitDepth::Unknown,
            metadata: FormatMetadata::new(),
            component_properties: [ComponentProperties::default(); 3],
            cache_id: String::new(),
            finalize_lock: Mutex::new(()),
        })
    }

    // ------------------------------------------------------------------
    // Accessors and mutators
    // ------------------------------------------------------------------

    /// The requested interpolation algorithm.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Sets the interpolation algorithm (validated later by [`validate`]).
    ///
    /// [`validate`]: Self::validate
    pub fn set_interpolation(&mut self, algo: Interpolation) {
        self.interpolation = algo;
    }

    /// The interpolation the renderer will actually run.
    ///
    /// `Default`, `Best` and `Nearest` all resolve to `Linear`: the CPU
    /// evaluator does not implement nearest-neighbor for 1D LUTs, and the
    /// GPU path mirrors the CPU so both produce the same pixels.
    pub fn concrete_interpolation(&self) -> Interpolation {
        Interpolation::Linear
    }

    /// The hue adjust mode.
    pub fn hue_adjust(&self) -> HueAdjust {
        self.hue_adjust
    }

    /// Sets the hue adjust mode.
    pub fn set_hue_adjust(&mut self, algo: HueAdjust) {
        self.hue_adjust = algo;
    }

    /// The application direction.
    pub fn direction(&self) -> TransformDirection {
        self.direction
    }

    /// Sets the application direction.
    pub fn set_direction(&mut self, direction: TransformDirection) {
        self.direction = direction;
    }

    /// The advisory inverse evaluation quality.
    pub fn inversion_quality(&self) -> InversionQuality {
        self.inversion_quality
    }

    /// Sets the inverse evaluation quality.
    pub fn set_inversion_quality(&mut self, quality: InversionQuality) {
        self.inversion_quality = quality;
    }

    /// Bit depth the source file stored the LUT at, if known.
    pub fn file_output_bit_depth(&self) -> BitDepth {
        self.file_output_bit_depth
    }

    /// Records the bit depth the source file stored the LUT at.
    pub fn set_file_output_bit_depth(&mut self, depth: BitDepth) {
        self.file_output_bit_depth = depth;
    }

    /// The domain/value encoding flags.
    pub fn half_flags(&self) -> HalfFlags {
        self.half_flags
    }

    /// True if the table is indexed by half codes.
    pub fn is_input_half_domain(&self) -> bool {
        self.half_flags.input_half_domain()
    }

    /// Sets or clears the half-domain bit. The table contents are not
    /// refilled; callers resizing the domain must do that themselves.
    pub fn set_input_half_domain(&mut self, is_half_domain: bool) {
        self.half_flags.set(HalfFlags::INPUT_HALF, is_half_domain);
    }

    /// True if stored values are raw half bit patterns.
    pub fn is_output_raw_halfs(&self) -> bool {
        self.half_flags.output_raw_halfs()
    }

    /// Sets or clears the raw-halfs bit.
    pub fn set_output_raw_halfs(&mut self, is_raw_halfs: bool) {
        self.half_flags.set(HalfFlags::OUTPUT_RAW_HALF, is_raw_halfs);
    }

    /// The sample table.
    pub fn array(&self) -> &Lut1DArray {
        &self.array
    }

    /// Mutable access to the sample table.
    pub fn array_mut(&mut self) -> &mut Lut1DArray {
        &mut self.array
    }

    /// Multiplies every sample by `scale`.
    pub fn scale(&mut self, scale: f32) {
        self.array.scale(scale);
    }

    /// The format metadata.
    pub fn metadata(&self) -> &FormatMetadata {
        &self.metadata
    }

    /// Mutable access to the format metadata.
    pub fn metadata_mut(&mut self) -> &mut FormatMetadata {
        &mut self.metadata
    }

    /// Per-channel inverse evaluation properties.
    ///
    /// Valid once [`finalize`] has run on an inverse-direction operator.
    ///
    /// [`finalize`]: Self::finalize
    pub fn component_properties(&self) -> &[ComponentProperties; 3] {
        &self.component_properties
    }

    /// The cache ID computed by the last successful [`finalize`].
    ///
    /// [`finalize`]: Self::finalize
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// True if the table maps every input to itself within tolerance.
    pub fn is_identity(&self) -> bool {
        self.array.is_identity(self.half_flags)
    }

    /// True if applying the operator changes nothing at all.
    ///
    /// A standard-domain identity is not a no-op: it still clamps its
    /// domain and may change bit depth. Only a half-domain identity covers
    /// every representable input unchanged.
    pub fn is_no_op(&self) -> bool {
        self.is_input_half_domain() && self.is_identity()
    }

    /// True if one channel's output depends on another channel's input.
    ///
    /// The curves themselves are separable; only hue adjust mixes
    /// channels. Identity detection is deliberately not consulted here,
    /// it would rescan the whole table.
    pub fn has_channel_crosstalk(&self) -> bool {
        self.hue_adjust != HueAdjust::None
    }

    /// True if any non-NaN sample lies outside `[0, 1]` by more than 1e-5.
    ///
    /// It is the range (output) of the forward LUT that decides whether an
    /// inverse has to evaluate over an extended domain; whether the forward
    /// LUT has a half domain does not matter.
    pub fn has_extended_range(&self) -> bool {
        const NORMAL_MIN: f32 = -1e-5;
        const NORMAL_MAX: f32 = 1.0 + 1e-5;

        self.array
            .values()
            .iter()
            .filter(|v| !v.is_nan())
            .any(|&v| v < NORMAL_MIN || v > NORMAL_MAX)
    }

    /// The cheap operator an identity LUT can be replaced with.
    ///
    /// A half-domain identity passes every value through, so a matrix
    /// identity is equivalent. A standard-domain identity still clamps its
    /// domain, so it is replaced by a `[0, 1]` range op.
    pub fn identity_replacement(&self) -> Op {
        if self.is_input_half_domain() {
            Op::Matrix(MatrixOp::new())
        } else {
            Op::Range(RangeOp::new(0.0, 1.0, 0.0, 1.0))
        }
    }

    /// True if the table can be used as a direct lookup for `incoming_depth`
    /// without interpolation.
    pub fn may_lookup(&self, incoming_depth: BitDepth) -> bool {
        if self.is_input_half_domain() {
            incoming_depth == BitDepth::F16
        } else if !incoming_depth.is_float() {
            self.array.length() as f64 == incoming_depth.max_value() + 1.0
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// True if flags, hue adjust and sample contents all match.
    ///
    /// Direction and interpolation are deliberately not compared; this is
    /// the shared-content test used by equality and inverse detection.
    pub fn have_equal_basics(&self, other: &Lut1DOp) -> bool {
        self.half_flags == other.half_flags
            && self.hue_adjust == other.hue_adjust
            && self.array == other.array
    }

    /// Returns a deep copy with the direction flipped.
    pub fn inverse(&self) -> Lut1DOp {
        let mut inv = self.clone();
        inv.direction = self.direction.reversed();
        inv
    }

    /// True if `other` undoes this operator.
    ///
    /// Note that finalizing an inverse monotonizes its array, so a
    /// finalized pair may stop matching; such LUTs should not be optimized
    /// out as an identity anyway.
    pub fn is_inverse(&self, other: &Lut1DOp) -> bool {
        self.direction != other.direction && self.have_equal_basics(other)
    }

    /// True if the pair can be folded into a single LUT by the composer.
    pub fn may_compose(&self, other: &Lut1DOp) -> bool {
        self.direction == TransformDirection::Forward
            && other.direction == TransformDirection::Forward
            && self.hue_adjust == HueAdjust::None
            && other.hue_adjust == HueAdjust::None
    }

    // ------------------------------------------------------------------
    // Validation and canonicalization
    // ------------------------------------------------------------------

    /// Checks the operator invariants.
    ///
    /// Idempotent; may be called repeatedly with no observable change.
    pub fn validate(&self) -> OpResult<()> {
        match self.interpolation {
            Interpolation::Best
            | Interpolation::Default
            | Interpolation::Linear
            | Interpolation::Nearest => {}
            algo => return Err(OpError::InvalidInterpolation(algo)),
        }

        let length = self.array.length();
        if length < 2 || length > MAX_LUT_LENGTH {
            return Err(OpError::InvalidLength(length));
        }

        if self.is_input_half_domain() && length != HALF_DOMAIN_ENTRIES {
            return Err(OpError::InvalidHalfDomain(length));
        }

        Ok(())
    }

    /// Canonicalizes the operator and computes its cache ID.
    ///
    /// Inverse operators get their array monotonized and their effective
    /// domain located first. A failed finalize is terminal for the
    /// operator: the array may already be partially canonicalized.
    pub fn finalize(&mut self) -> OpResult<()> {
        if self.direction == TransformDirection::Inverse {
            self.prepare_array();
        }

        self.array.adjust_color_component_number();

        let _guard = self
            .finalize_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.validate()?;

        let bytes: Vec<u8> = self
            .array
            .values()
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let digest = Md5::digest(&bytes);

        self.cache_id = format!(
            "{} {} {} {} {}",
            to_hex(digest.as_slice()),
            self.direction,
            self.concrete_interpolation(),
            if self.is_input_half_domain() {
                "half domain"
            } else {
                "standard domain"
            },
            self.hue_adjust,
        );
        debug!(cache_id = %self.cache_id, "finalized 1D LUT");

        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup sizing helpers
    // ------------------------------------------------------------------

    /// Number of entries needed for a direct lookup at `incoming_depth`.
    ///
    /// Integer depths get one entry per code. For float depths a true
    /// lookup is impractical, so the half-domain size is returned.
    /// `Unknown` and `U32` have no defined lookup size.
    pub fn ideal_size(incoming_depth: BitDepth) -> OpResult<usize> {
        match incoming_depth {
            BitDepth::U8 | BitDepth::U10 | BitDepth::U12 | BitDepth::U14 | BitDepth::U16 => {
                Ok(incoming_depth.max_value() as usize + 1)
            }
            BitDepth::F16 | BitDepth::F32 => Ok(HALF_DOMAIN_ENTRIES),
            BitDepth::Unknown | BitDepth::U32 => Err(OpError::InvalidBitDepth(incoming_depth)),
        }
    }

    /// Number of entries an identity fill expects for the given domain.
    ///
    /// A half domain is always 65536 entries, whatever the incoming depth.
    pub fn ideal_size_for_domain(
        incoming_depth: BitDepth,
        half_flags: HalfFlags,
    ) -> OpResult<usize> {
        if half_flags.input_half_domain() {
            return Ok(HALF_DOMAIN_ENTRIES);
        }
        Self::ideal_size(incoming_depth)
    }

    /// Builds an identity LUT whose domain suits `incoming_depth`.
    ///
    /// Float depths get a half domain, integer depths a standard domain of
    /// the ideal lookup size.
    pub fn make_lookup_domain(incoming_depth: BitDepth) -> OpResult<Lut1DOp> {
        let domain = if incoming_depth.is_float() {
            HalfFlags::INPUT_HALF
        } else {
            HalfFlags::STANDARD
        };

        let size = Self::ideal_size_for_domain(incoming_depth, domain)?;
        Self::with_domain(domain, size)
    }
}

impl Clone for Lut1DOp {
    fn clone(&self) -> Self {
        Self {
            interpolation: self.interpolation,
            array: self.array.clone(),
            half_flags: self.half_flags,
            hue_adjust: self.hue_adjust,
            direction: self.direction,
            inversion_quality: self.inversion_quality,
            file_output_bit_depth: self.file_output_bit_depth,
            metadata: self.metadata.clone(),
            component_properties: self.component_properties,
            cache_id: self.cache_id.clone(),
            finalize_lock: Mutex::new(()),
        }
    }
}

impl PartialEq for Lut1DOp {
    /// Structural equality over the semantic fields.
    ///
    /// Interpolation is compared in its concrete form, so `Default` and
    /// `Nearest` LUTs compare equal to `Linear` ones. The advisory
    /// inversion quality, file bit depth and cache ID are excluded.
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
            && self.direction == other.direction
            && self.concrete_interpolation() == other.concrete_interpolation()
            && self.have_equal_basics(other)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0xf) as usize] as char);
    }
    s
}
