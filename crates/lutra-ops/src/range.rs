//! Range operator data: clamping and linear remapping.
//!
//! The range op can clamp values to a min/max, linearly remap an input
//! interval onto an output interval, or both. A `[0, 1]` clamp is what an
//! optimizer substitutes for a standard-domain identity LUT, since such a
//! LUT still clamps its domain even when its curve is an identity.

/// Range operator parameters.
///
/// `None` bounds mean "no clamping on that side".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeOp {
    min_in: Option<f64>,
    max_in: Option<f64>,
    min_out: Option<f64>,
    max_out: Option<f64>,
}

impl RangeOp {
    /// Creates a linear remapping from `[min_in, max_in]` to
    /// `[min_out, max_out]` with clamping.
    pub fn new(min_in: f64, max_in: f64, min_out: f64, max_out: f64) -> Self {
        Self {
            min_in: Some(min_in),
            max_in: Some(max_in),
            min_out: Some(min_out),
            max_out: Some(max_out),
        }
    }

    /// Creates a pure clamp (no scaling).
    pub fn clamp(min: f64, max: f64) -> Self {
        Self {
            min_in: None,
            max_in: None,
            min_out: Some(min),
            max_out: Some(max),
        }
    }

    /// True if the op scales or offsets rather than only clamping.
    pub fn scales(&self) -> bool {
        match (self.min_in, self.max_in, self.min_out, self.max_out) {
            (Some(min_in), Some(max_in), Some(min_out), Some(max_out)) => {
                let in_range = max_in - min_in;
                let out_range = max_out - min_out;
                (in_range - out_range).abs() > 1e-9 || (min_in - min_out).abs() > 1e-9
            }
            _ => false,
        }
    }

    /// Scale factor of the remapping.
    pub fn scale(&self) -> f64 {
        match (self.min_in, self.max_in, self.min_out, self.max_out) {
            (Some(min_in), Some(max_in), Some(min_out), Some(max_out)) => {
                let in_range = max_in - min_in;
                if in_range.abs() < 1e-12 {
                    1.0
                } else {
                    (max_out - min_out) / in_range
                }
            }
            _ => 1.0,
        }
    }

    /// Offset of the remapping.
    pub fn offset(&self) -> f64 {
        match (self.min_in, self.min_out) {
            (Some(min_in), Some(min_out)) => min_out - min_in * self.scale(),
            _ => 0.0,
        }
    }

    /// Clamp floor.
    pub fn lower_bound(&self) -> f64 {
        self.min_out.unwrap_or(f64::NEG_INFINITY)
    }

    /// Clamp ceiling.
    pub fn upper_bound(&self) -> f64 {
        self.max_out.unwrap_or(f64::INFINITY)
    }

    /// Applies the op to the first three components of `rgb` in place.
    ///
    /// NaN inputs become the lower bound.
    #[inline]
    pub fn apply(&self, rgb: &mut [f32]) {
        let scale = self.scale() as f32;
        let offset = self.offset() as f32;
        let lower = self.lower_bound() as f32;
        let upper = self.upper_bound() as f32;

        if self.scales() {
            for c in rgb.iter_mut().take(3) {
                *c = clamp_nan(*c * scale + offset, lower, upper);
            }
        } else {
            for c in rgb.iter_mut().take(3) {
                *c = clamp_nan(*c, lower, upper);
            }
        }
    }
}

impl Default for RangeOp {
    fn default() -> Self {
        Self::clamp(0.0, 1.0)
    }
}

/// Clamp to `[lower, upper]`, with NaN landing on the lower bound.
#[inline]
fn clamp_nan(v: f32, lower: f32, upper: f32) -> f32 {
    if v.is_nan() {
        lower
    } else if v < lower {
        lower
    } else if v > upper {
        upper
    } else {
        v
    }
}
