//! Sample storage for 1D LUT operators.
//!
//! The table always stores three channels physically. A LUT whose channels
//! are identical is tracked with an active channel count of 1 so renderers
//! can use the cheaper single-curve path, but the storage never shrinks.

use lutra_core::halfs;

use super::HalfFlags;
use crate::{OpError, OpResult};

/// Maximum supported table length (1024 * 1024 entries).
pub const MAX_LUT_LENGTH: usize = 1024 * 1024;

/// Number of entries a half-domain table must have.
pub const HALF_DOMAIN_ENTRIES: usize = halfs::HALF_CODE_COUNT;

/// Physical channel count of the storage.
pub(crate) const MAX_CHANNELS: usize = 3;

/// Absolute tolerance for standard-domain identity detection.
const IDENTITY_ABS_TOL: f32 = 1e-5;

/// A dense `length x 3` table of 32-bit float samples.
///
/// Entry `i` of channel `c` lives at `values[i * 3 + c]`. Values are stored
/// as-is: NaNs and infinities are legal table contents and are never
/// clamped by the container.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut1DArray {
    length: usize,
    num_components: usize,
    values: Vec<f32>,
}

impl Lut1DArray {
    /// Creates a table of `length` entries filled with the identity for the
    /// given domain kind.
    pub fn new(half_flags: HalfFlags, length: usize) -> OpResult<Self> {
        let mut array = Self {
            length: 0,
            num_components: MAX_CHANNELS,
            values: Vec::new(),
        };
        array.resize(length, MAX_CHANNELS)?;
        array.fill(half_flags);
        Ok(array)
    }

    /// Number of entries per channel.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Active channel count (1 when all channels are identical, else 3).
    #[inline]
    pub fn num_color_components(&self) -> usize {
        self.num_components
    }

    /// Total number of stored floats (`length * 3`).
    #[inline]
    pub fn num_values(&self) -> usize {
        self.length * MAX_CHANNELS
    }

    /// The interleaved sample storage.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Mutable access to the interleaved sample storage.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Resizes the table, zero-filling any new entries.
    ///
    /// Storage stays three channels wide regardless of `num_components`.
    pub fn resize(&mut self, length: usize, num_components: usize) -> OpResult<()> {
        if length < 2 || length > MAX_LUT_LENGTH {
            return Err(OpError::InvalidLength(length));
        }
        self.length = length;
        self.num_components = num_components.min(MAX_CHANNELS);
        self.values.resize(length * MAX_CHANNELS, 0.0);
        Ok(())
    }

    /// Fills the table with the identity for the given domain kind.
    ///
    /// Half domain: entry `i` is the float value of half code `i` on every
    /// channel (the table then contains both infinities and all 4096 NaN
    /// codes). Standard domain: entry `i` is `i / (length - 1)`.
    pub fn fill(&mut self, half_flags: HalfFlags) {
        let dim = self.length;
        if half_flags.input_half_domain() {
            for idx in 0..dim {
                let v = halfs::from_bits(idx as u16);
                let row = idx * MAX_CHANNELS;
                for channel in 0..MAX_CHANNELS {
                    self.values[row + channel] = v;
                }
            }
        } else {
            let step = 1.0 / (dim as f32 - 1.0);
            for idx in 0..dim {
                let v = idx as f32 * step;
                let row = idx * MAX_CHANNELS;
                for channel in 0..MAX_CHANNELS {
                    self.values[row + channel] = v;
                }
            }
        }
    }

    /// Multiplies every stored sample by `scale`.
    pub fn scale(&mut self, scale: f32) {
        for v in &mut self.values {
            *v *= scale;
        }
    }

    /// Tests whether the table is an identity for the given domain kind.
    ///
    /// Half domain: every entry must round-trip to within 1 ULP of its own
    /// code; NaN entries count as identical to a NaN code. Standard domain:
    /// every entry must be within 1e-5 of `i / (length - 1)`.
    pub fn is_identity(&self, half_flags: HalfFlags) -> bool {
        let dim = self.length;

        if half_flags.input_half_domain() {
            for idx in 0..dim {
                let aim = idx as u16;
                let row = idx * MAX_CHANNELS;
                for channel in 0..MAX_CHANNELS {
                    let v = self.values[row + channel];
                    if v.is_nan() {
                        if halfs::is_nan_code(aim) {
                            continue;
                        }
                        return false;
                    }
                    // Must differ by at least two ULPs to break the identity.
                    if halfs::halfs_differ(aim, halfs::to_bits(v), 1) {
                        return false;
                    }
                }
            }
        } else {
            let step = 1.0 / (dim as f32 - 1.0);
            for idx in 0..dim {
                let aim = idx as f32 * step;
                let row = idx * MAX_CHANNELS;
                for channel in 0..MAX_CHANNELS {
                    let err = self.values[row + channel] - aim;
                    // NaN entries are never a standard-domain identity.
                    if !(err.abs() <= IDENTITY_ABS_TOL) {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Collapses the active channel count to 1 when channels 1 and 2 equal
    /// channel 0 pointwise, or restores it to 3 otherwise.
    pub fn adjust_color_component_number(&mut self) {
        let mut identical = true;
        for row in self.values.chunks_exact(MAX_CHANNELS) {
            if row[1] != row[0] || row[2] != row[0] {
                identical = false;
                break;
            }
        }
        self.num_components = if identical { 1 } else { MAX_CHANNELS };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        assert!(Lut1DArray::new(HalfFlags::STANDARD, 1).is_err());
        assert!(Lut1DArray::new(HalfFlags::STANDARD, 2).is_ok());
        assert!(Lut1DArray::new(HalfFlags::STANDARD, MAX_LUT_LENGTH).is_ok());

        let mut array = Lut1DArray::new(HalfFlags::STANDARD, 2).unwrap();
        assert!(array.resize(MAX_LUT_LENGTH + 1, 3).is_err());
    }

    #[test]
    fn test_standard_fill_is_a_ramp() {
        let array = Lut1DArray::new(HalfFlags::STANDARD, 4).unwrap();
        let v = array.values();
        for c in 0..3 {
            assert_eq!(v[c], 0.0);
            assert!((v[3 + c] - 1.0 / 3.0).abs() < 1e-7);
            assert!((v[6 + c] - 2.0 / 3.0).abs() < 1e-7);
            assert_eq!(v[9 + c], 1.0);
        }
        assert!(array.is_identity(HalfFlags::STANDARD));
    }

    #[test]
    fn test_half_fill_covers_the_code_space() {
        let array = Lut1DArray::new(HalfFlags::INPUT_HALF, HALF_DOMAIN_ENTRIES).unwrap();
        let v = array.values();
        assert_eq!(v[0], 0.0);
        assert_eq!(v[halfs::HALF_ONE as usize * 3], 1.0);
        assert_eq!(v[halfs::HALF_POS_INFINITY as usize * 3], f32::INFINITY);
        let neg_zero = v[halfs::HALF_NEG_ZERO as usize * 3];
        assert_eq!(neg_zero, 0.0);
        assert!(neg_zero.is_sign_negative());
        assert!(v[31745 * 3].is_nan());

        assert!(array.is_identity(HalfFlags::INPUT_HALF));
    }

    #[test]
    fn test_identity_tolerances() {
        let mut array = Lut1DArray::new(HalfFlags::STANDARD, 3).unwrap();
        array.values_mut()[3] += 0.9e-5;
        assert!(array.is_identity(HalfFlags::STANDARD));
        array.values_mut()[3] += 1.0e-5;
        assert!(!array.is_identity(HalfFlags::STANDARD));
    }

    #[test]
    fn test_half_identity_one_ulp_is_tolerated() {
        let mut array = Lut1DArray::new(HalfFlags::INPUT_HALF, HALF_DOMAIN_ENTRIES).unwrap();
        // Shift code 1000 by one ULP: still an identity.
        array.values_mut()[1000 * 3] = halfs::from_bits(1001);
        assert!(array.is_identity(HalfFlags::INPUT_HALF));
        // Two ULPs: no longer an identity.
        array.values_mut()[1000 * 3] = halfs::from_bits(1002);
        assert!(!array.is_identity(HalfFlags::INPUT_HALF));
    }

    #[test]
    fn test_scale() {
        let mut array = Lut1DArray::new(HalfFlags::STANDARD, 3).unwrap();
        array.scale(2.0);
        assert_eq!(array.values()[6], 2.0);
        assert!(!array.is_identity(HalfFlags::STANDARD));
    }

    #[test]
    fn test_scale_composes_multiplicatively() {
        let mut a = Lut1DArray::new(HalfFlags::STANDARD, 5).unwrap();
        let mut b = a.clone();
        a.scale(0.25);
        a.scale(8.0);
        b.scale(0.25 * 8.0);
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn test_adjust_color_component_number() {
        let mut array = Lut1DArray::new(HalfFlags::STANDARD, 4).unwrap();
        array.adjust_color_component_number();
        assert_eq!(array.num_color_components(), 1);

        array.values_mut()[1] = 0.5;
        array.adjust_color_component_number();
        assert_eq!(array.num_color_components(), 3);
    }
}
