//! CPU evaluation of an op sequence over a column of RGB samples.
//!
//! The composer renders a LUT's table through a sequence of operators, one
//! row per table entry. Dispatch is a match over the closed [`Op`] set;
//! every operator here is channel-separable except for what hue adjust
//! would add, and hue adjust is kept out of composition by
//! [`Lut1DOp::may_compose`].

use lutra_core::{halfs, TransformDirection};

use crate::lut1d::{
    make_fast_lut1d_from_inverse, ComponentProperties, InversionQuality, Lut1DOp,
};
use crate::matrix::MatrixOp;
use crate::range::RangeOp;
use crate::OpResult;

/// A color operator the evaluator knows how to apply.
#[derive(Debug, Clone)]
pub enum Op {
    /// A 1D LUT, applied forward or inverse per its direction.
    Lut1D(Lut1DOp),
    /// A matrix + offset.
    Matrix(MatrixOp),
    /// A clamp / linear remap.
    Range(RangeOp),
}

/// Applies `ops` in sequence to a buffer of interleaved RGB samples.
///
/// The buffer length must be a multiple of 3. Inverse-direction LUTs must
/// have been finalized, their component properties drive the exact
/// inversion.
pub fn eval_transform(pixels: &mut [f32], ops: &[Op]) -> OpResult<()> {
    debug_assert_eq!(pixels.len() % 3, 0);

    for op in ops {
        match op {
            Op::Lut1D(lut) => apply_lut1d(lut, pixels)?,
            Op::Matrix(matrix) => {
                for rgb in pixels.chunks_exact_mut(3) {
                    matrix.apply(rgb);
                }
            }
            Op::Range(range) => {
                for rgb in pixels.chunks_exact_mut(3) {
                    range.apply(rgb);
                }
            }
        }
    }

    Ok(())
}

fn apply_lut1d(lut: &Lut1DOp, pixels: &mut [f32]) -> OpResult<()> {
    match lut.direction() {
        TransformDirection::Forward => {
            apply_lut_forward(lut, pixels);
            Ok(())
        }
        TransformDirection::Inverse => apply_lut_inverse(lut, pixels),
    }
}

/// Forward application of a 1D LUT.
///
/// Standard domain: linear interpolation over the `[0, 1]` grid, inputs
/// clamped to the grid and NaN landing on the first entry. Half domain:
/// direct lookup by the nearest half code; the composer's domains hold
/// exact half values, so no precision is lost there.
fn apply_lut_forward(lut: &Lut1DOp, pixels: &mut [f32]) {
    let values = lut.array().values();

    if lut.is_input_half_domain() {
        for rgb in pixels.chunks_exact_mut(3) {
            for c in 0..3 {
                let code = halfs::to_bits(rgb[c]) as usize;
                rgb[c] = values[code * 3 + c];
            }
        }
    } else {
        let length = lut.array().length();
        let max_index = (length - 1) as f32;

        for rgb in pixels.chunks_exact_mut(3) {
            for c in 0..3 {
                let t = rgb[c] * max_index;
                let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, max_index) };
                let i0 = t.floor() as usize;
                let frac = t - i0 as f32;
                rgb[c] = if frac == 0.0 {
                    values[i0 * 3 + c]
                } else {
                    let i1 = (i0 + 1).min(length - 1);
                    values[i0 * 3 + c] * (1.0 - frac) + values[i1 * 3 + c] * frac
                };
            }
        }
    }
}

/// Inverse application of a 1D LUT.
///
/// The fast style renders through a forward approximation; building that
/// approximation forces the exact style on the source, so this cannot
/// recurse more than once. The exact style binary-searches the
/// monotonized samples over the effective domain from `prepare_array`.
fn apply_lut_inverse(lut: &Lut1DOp, pixels: &mut [f32]) -> OpResult<()> {
    if lut.inversion_quality() == InversionQuality::Fast {
        let mut source = lut.clone();
        let fast = make_fast_lut1d_from_inverse(&mut source, false)?;
        apply_lut_forward(&fast, pixels);
        return Ok(());
    }

    let length = lut.array().length();
    let values = lut.array().values();
    let half_domain = lut.is_input_half_domain();

    for c in 0..3 {
        let chan: Vec<f32> = (0..length).map(|i| values[i * 3 + c]).collect();
        let props = lut.component_properties()[c];

        for v in pixels[c..].iter_mut().step_by(3) {
            *v = if half_domain {
                invert_half(&chan, &props, *v)
            } else {
                invert_standard(&chan, &props, length, *v)
            };
        }
    }

    Ok(())
}

/// Exact inverse on the standard domain: the result is the grid coordinate
/// `index / (length - 1)` whose forward value matches `target`.
fn invert_standard(
    chan: &[f32],
    props: &ComponentProperties,
    length: usize,
    target: f32,
) -> f32 {
    let index = invert_segment(
        chan,
        props.start_domain,
        props.end_domain,
        props.is_increasing,
        target,
    );
    index / (length - 1) as f32
}

/// Exact inverse on the half domain.
///
/// The positive and negative code ranges are independent monotone runs;
/// the side whose value range covers the target wins, positive side first.
/// The fractional code is mapped back to a value by interpolating the two
/// bracketing half values.
fn invert_half(chan: &[f32], props: &ComponentProperties, target: f32) -> f32 {
    let (p_lo, p_hi) = ordered(chan[props.start_domain], chan[props.end_domain]);
    let (n_lo, n_hi) = ordered(chan[props.neg_start_domain], chan[props.neg_end_domain]);

    let t = if target.is_nan() { chan[props.start_domain] } else { target };

    let (start, end, increasing) = if t >= p_lo && t <= p_hi {
        (props.start_domain, props.end_domain, props.is_increasing)
    } else if t >= n_lo && t <= n_hi {
        (
            props.neg_start_domain,
            props.neg_end_domain,
            !props.is_increasing,
        )
    } else {
        (props.start_domain, props.end_domain, props.is_increasing)
    };

    let index = invert_segment(chan, start, end, increasing, t);

    let code0 = index.floor();
    let frac = index - code0;
    let v0 = halfs::from_bits(code0 as u16);
    if frac == 0.0 {
        v0
    } else {
        let v1 = halfs::from_bits(code0 as u16 + 1);
        v0 + (v1 - v0) * frac
    }
}

/// Binary search for `target` in the monotone run `chan[start..=end]`,
/// returning the fractional index. The target is clamped into the run's
/// value range first, NaN counts as the start value.
fn invert_segment(
    chan: &[f32],
    start: usize,
    end: usize,
    is_increasing: bool,
    target: f32,
) -> f32 {
    if start == end {
        return start as f32;
    }

    let (lo_v, hi_v) = if is_increasing {
        (chan[start], chan[end])
    } else {
        (chan[end], chan[start])
    };
    let t = if target.is_nan() {
        chan[start]
    } else {
        target.clamp(lo_v, hi_v)
    };

    let mut lo = start;
    let mut hi = end;
    if is_increasing {
        if t <= chan[start] {
            return start as f32;
        }
        // Invariant: chan[lo] < t <= chan[hi].
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if chan[mid] < t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let frac = (t - chan[lo]) / (chan[hi] - chan[lo]);
        lo as f32 + frac
    } else {
        if t >= chan[start] {
            return start as f32;
        }
        // Invariant: chan[lo] > t >= chan[hi].
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if chan[mid] > t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let frac = (chan[lo] - t) / (chan[lo] - chan[hi]);
        lo as f32 + frac
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut1d::{HalfFlags, HALF_DOMAIN_ENTRIES};

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_empty_sequence_is_identity() {
        let mut pixels = [0.1_f32, 0.2, 0.3];
        eval_transform(&mut pixels, &[]).unwrap();
        assert_eq!(pixels, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_matrix_then_range() {
        let ops = vec![
            Op::Matrix(MatrixOp::from_diagonal([2.0, 2.0, 2.0])),
            Op::Range(RangeOp::clamp(0.0, 1.0)),
        ];
        let mut pixels = [0.7_f32, 0.3, -0.1];
        eval_transform(&mut pixels, &ops).unwrap();
        assert!((pixels[0] - 1.0).abs() < EPSILON);
        assert!((pixels[1] - 0.6).abs() < EPSILON);
        assert!((pixels[2] - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_forward_standard_interpolates() {
        let mut lut = Lut1DOp::new(2).unwrap();
        lut.scale(2.0); // maps x -> 2x

        let mut pixels = [0.25_f32, 0.5, 0.75];
        eval_transform(&mut pixels, &[Op::Lut1D(lut)]).unwrap();
        assert!((pixels[0] - 0.5).abs() < EPSILON);
        assert!((pixels[1] - 1.0).abs() < EPSILON);
        assert!((pixels[2] - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_forward_standard_clamps_out_of_domain() {
        let lut = Lut1DOp::new(16).unwrap();
        let mut pixels = [-0.5_f32, 1.5, f32::NAN];
        eval_transform(&mut pixels, &[Op::Lut1D(lut)]).unwrap();
        assert_eq!(pixels[0], 0.0);
        assert_eq!(pixels[1], 1.0);
        assert_eq!(pixels[2], 0.0);
    }

    #[test]
    fn test_forward_half_domain_lookup() {
        let lut = Lut1DOp::with_domain(HalfFlags::INPUT_HALF, HALF_DOMAIN_ENTRIES).unwrap();
        let mut pixels = [0.5_f32, -2.0, 65504.0];
        eval_transform(&mut pixels, &[Op::Lut1D(lut)]).unwrap();
        assert_eq!(pixels, [0.5, -2.0, 65504.0]);
    }

    #[test]
    fn test_inverse_exact_standard() {
        // Forward ramp x -> x^2 on 257 entries; exact inverse is sqrt.
        let mut lut = Lut1DOp::with_direction(257, TransformDirection::Inverse).unwrap();
        {
            let values = lut.array_mut().values_mut();
            for i in 0..257 {
                let x = i as f32 / 256.0;
                for c in 0..3 {
                    values[i * 3 + c] = x * x;
                }
            }
        }
        lut.set_inversion_quality(InversionQuality::Exact);
        lut.finalize().unwrap();

        let mut pixels = [0.25_f32, 0.0625, 1.0];
        eval_transform(&mut pixels, &[Op::Lut1D(lut)]).unwrap();
        assert!((pixels[0] - 0.5).abs() < 1e-3);
        assert!((pixels[1] - 0.25).abs() < 1e-3);
        assert!((pixels[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_inverse_exact_clamps_to_the_effective_range() {
        let mut lut = Lut1DOp::with_direction(5, TransformDirection::Inverse).unwrap();
        {
            let values = lut.array_mut().values_mut();
            let data = [0.2_f32, 0.4, 0.6, 0.8, 0.9];
            for (i, v) in data.iter().enumerate() {
                for c in 0..3 {
                    values[i * 3 + c] = *v;
                }
            }
        }
        lut.set_inversion_quality(InversionQuality::Exact);
        lut.finalize().unwrap();

        let mut pixels = [0.0_f32, 1.0, 0.4];
        eval_transform(&mut pixels, &[Op::Lut1D(lut)]).unwrap();
        // Below the range -> start of the domain, above -> end.
        assert_eq!(pixels[0], 0.0);
        assert_eq!(pixels[1], 1.0);
        assert!((pixels[2] - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_exact_decreasing() {
        let mut lut = Lut1DOp::with_direction(5, TransformDirection::Inverse).unwrap();
        {
            let values = lut.array_mut().values_mut();
            let data = [1.0_f32, 0.75, 0.5, 0.25, 0.0];
            for (i, v) in data.iter().enumerate() {
                for c in 0..3 {
                    values[i * 3 + c] = *v;
                }
            }
        }
        lut.set_inversion_quality(InversionQuality::Exact);
        lut.finalize().unwrap();

        let mut pixels = [1.0_f32, 0.5, 0.0];
        eval_transform(&mut pixels, &[Op::Lut1D(lut)]).unwrap();
        assert!((pixels[0] - 0.0).abs() < EPSILON);
        assert!((pixels[1] - 0.5).abs() < EPSILON);
        assert!((pixels[2] - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_fast_approximates_exact() {
        let mut lut = Lut1DOp::with_direction(1024, TransformDirection::Inverse).unwrap();
        {
            let values = lut.array_mut().values_mut();
            for i in 0..1024 {
                let x = i as f32 / 1023.0;
                let y = 0.1 + 0.8 * x;
                for c in 0..3 {
                    values[i * 3 + c] = y;
                }
            }
        }
        lut.finalize().unwrap();

        let mut fast_pixels = [0.1_f32, 0.5, 0.9];
        let mut exact_pixels = fast_pixels;

        lut.set_inversion_quality(InversionQuality::Fast);
        eval_transform(&mut fast_pixels, &[Op::Lut1D(lut.clone())]).unwrap();

        lut.set_inversion_quality(InversionQuality::Exact);
        eval_transform(&mut exact_pixels, &[Op::Lut1D(lut)]).unwrap();

        for (f, e) in fast_pixels.iter().zip(exact_pixels.iter()) {
            assert!((f - e).abs() < 1e-3, "fast {f} vs exact {e}");
        }
    }
}
