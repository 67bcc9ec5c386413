//! Inverse preparation: monotonicity repair and effective-domain discovery.
//!
//! An inverse can only be evaluated uniquely from monotone data, so before
//! an inverse-direction LUT is fingerprinted its forward samples are
//! flattened wherever they reverse, and the flat spots at each end are
//! trimmed off into an effective index range.
//!
//! The half domain covers positive and negative codes as two separate
//! monotone runs with opposite orientation, plus NaN codes that are left
//! untouched: the inversion algorithms ignore the NaN part of the domain,
//! and there are 2048 NaN codes per sign that could each hold a different
//! value.

use lutra_core::halfs;

use super::array::MAX_CHANNELS;
use super::Lut1DOp;

/// Per-channel shape of prepared inverse data.
///
/// Index fields are entry indices on the standard domain and half codes on
/// the half domain. The `neg_*` fields are only meaningful for half-domain
/// LUTs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentProperties {
    /// Whether the channel rises from its start to its end entry.
    /// Flat channels report `false`.
    pub is_increasing: bool,
    /// First index of the effective domain.
    pub start_domain: usize,
    /// Last index of the effective domain.
    pub end_domain: usize,
    /// First negative-side code of the effective domain (half domain only).
    pub neg_start_domain: usize,
    /// Last negative-side code of the effective domain (half domain only).
    pub neg_end_domain: usize,
}

impl Lut1DOp {
    /// Monotonizes the forward samples and locates the effective domain.
    ///
    /// Runs as part of [`finalize`] when the direction is inverse.
    /// Idempotent: already-monotone data is left untouched.
    ///
    /// [`finalize`]: Self::finalize
    pub(crate) fn prepare_array(&mut self) {
        let length = self.array.length();
        let active_channels = self.array.num_color_components();
        let half_domain = self.half_flags.input_half_domain();
        let values = self.array.values_mut();

        let mut properties = [ComponentProperties::default(); MAX_CHANNELS];

        for c in 0..active_channels {
            // Overall direction, judged from two reference entries. The
            // half domain compares the entries for 0.0 and 1.0: customer
            // LUTs do not always populate the far reaches of the domain,
            // so +-HALF_MAX would be unreliable anchors.
            let (low, high) = if half_domain {
                (0, halfs::HALF_ONE as usize)
            } else {
                (0, length - 1)
            };
            let is_increasing =
                values[low * MAX_CHANNELS + c] < values[high * MAX_CHANNELS + c];
            properties[c].is_increasing = is_increasing;

            // Flatten reversals: a reversal has no unique inverse, and the
            // exact inversion algorithm needs sorted values.
            let pos_zero_value = values[c];
            if !half_domain {
                flatten(values, c, 1, length - 1, is_increasing, pos_zero_value);
            } else {
                // Positive codes, +0 through +infinity.
                flatten(
                    values,
                    c,
                    1,
                    halfs::HALF_POS_INFINITY as usize,
                    is_increasing,
                    pos_zero_value,
                );
                // Negative codes run the opposite way, -0 through
                // -infinity. Seeding prev with the value at +0 keeps the
                // two zeros from overlapping.
                flatten(
                    values,
                    c,
                    halfs::HALF_NEG_ZERO as usize,
                    halfs::HALF_NEG_INFINITY as usize,
                    !is_increasing,
                    pos_zero_value,
                );
            }

            // Effective domain: trim the flat spots at each end so the
            // inverse of an endpoint value is the entry nearest the center.
            // Constant channels end up with start == end == the low bound.
            if !half_domain {
                let (start, end) = trim_flat_ends(values, c, 0, length - 1);
                properties[c].start_domain = start;
                properties[c].end_domain = end;
            } else {
                // Infinities are excluded: the fast inverse path cannot
                // reliably tell 65504 from +inf, and limiting the domain
                // lets 65504 invert correctly.
                let (start, end) =
                    trim_flat_ends(values, c, 0, halfs::HALF_MAX_FINITE as usize);
                properties[c].start_domain = start;
                properties[c].end_domain = end;

                let (neg_start, neg_end) = trim_flat_ends(
                    values,
                    c,
                    halfs::HALF_NEG_ZERO as usize,
                    halfs::HALF_MIN_FINITE as usize,
                );
                properties[c].neg_start_domain = neg_start;
                properties[c].neg_end_domain = neg_end;
            }
        }

        if active_channels == 1 {
            properties[1] = properties[0];
            properties[2] = properties[0];
        }

        self.component_properties = properties;
    }
}

/// Clamps each entry in `[first, last]` of channel `c` against the running
/// previous value whenever its step disagrees with the wanted orientation.
fn flatten(
    values: &mut [f32],
    c: usize,
    first: usize,
    last: usize,
    is_increasing: bool,
    seed: f32,
) {
    let mut prev = seed;
    for entry in first..=last {
        let idx = entry * MAX_CHANNELS + c;
        if is_increasing != (values[idx] > prev) {
            values[idx] = prev;
        } else {
            prev = values[idx];
        }
    }
}

/// Walks inward from both bounds of channel `c` past any leading/trailing
/// runs of equal values, returning the trimmed `(start, end)` range.
fn trim_flat_ends(values: &[f32], c: usize, low: usize, high: usize) -> (usize, usize) {
    let mut end = high;
    let end_value = values[end * MAX_CHANNELS + c];
    while end > low && values[(end - 1) * MAX_CHANNELS + c] == end_value {
        end -= 1;
    }

    // No requirement that the start value be below the end value, so this
    // handles decreasing channels too.
    let mut start = low;
    let start_value = values[start * MAX_CHANNELS + c];
    while start < end && values[(start + 1) * MAX_CHANNELS + c] == start_value {
        start += 1;
    }

    (start, end)
}
