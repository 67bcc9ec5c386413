//! Functional composition of 1D LUTs.
//!
//! Composition folds two operators into a single LUT that takes the domain
//! of the first into the range of the last, by rendering values through the
//! op sequence. When the first LUT's domain is too coarse for the result to
//! stay faithful, a finer identity domain is substituted and both LUTs are
//! rendered through it.

use lutra_core::{BitDepth, TransformDirection};
use tracing::debug;

use super::{HalfFlags, Lut1DOp};
use crate::eval::{eval_transform, Op};
use crate::guard::ExactInversionGuard;
use crate::{OpError, OpResult};

/// Domain resampling policy for [`compose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeMethod {
    /// Keep the first LUT's domain as-is.
    ResampleNo,
    /// Resample onto at least 65536 standard-domain entries.
    ResampleBig,
    /// Resample onto a half domain.
    ResampleHd,
}

/// Evaluates an op sequence through `a`'s table, in place.
///
/// `a`'s array is treated as a column of pixels, one row per entry. The
/// caller must ensure every op in the sequence is channel-separable.
pub fn compose_with_ops(a: &mut Lut1DOp, ops: &[Op]) -> OpResult<()> {
    if ops.is_empty() {
        return Err(OpError::InvalidComposition(
            "there is nothing to compose the 1D LUT with".into(),
        ));
    }

    // The eval fills the result LUT's own array.
    let num_pixels = a.array().length();
    a.array_mut().resize(num_pixels, 3)?;

    eval_transform(a.array_mut().values_mut(), ops)
}

/// Composes two forward LUTs into one, leaving the result in `a`.
///
/// With [`ComposeMethod::ResampleNo`] the current domain of `a` is kept.
/// Otherwise, if `a`'s domain is neither a half domain nor fine enough for
/// the method, `a` is replaced by a fresh identity domain and the old `a`
/// becomes the first stage of the rendered sequence, so its effect is
/// preserved.
///
/// Hue adjust is taken from `b` afterwards: the common case is `a` being a
/// fresh domain and `b` the LUT actually being sampled. Callers must check
/// [`Lut1DOp::may_compose`] first when hue-adjust semantics matter, and
/// are responsible for the direction of `b`.
pub fn compose(a: &mut Lut1DOp, b: &Lut1DOp, method: ComposeMethod) -> OpResult<()> {
    if a.direction() == TransformDirection::Inverse {
        return Err(OpError::InvalidComposition(
            "only a forward 1D LUT can serve as the composition domain".into(),
        ));
    }

    let (min_size, need_half_domain) = match method {
        ComposeMethod::ResampleNo => (0, false),
        ComposeMethod::ResampleBig => (65536, false),
        ComposeMethod::ResampleHd => (65536, true),
    };

    let a_size = a.array().length();
    let good_domain = a.is_input_half_domain() || (a_size >= min_size && !need_half_domain);
    let use_orig_domain = method == ComposeMethod::ResampleNo;

    let mut ops: Vec<Op> = Vec::with_capacity(2);

    if !good_domain && !use_orig_domain {
        debug!(
            from = a_size,
            to = min_size,
            half_domain = need_half_domain,
            "resampling composition domain"
        );

        // Interpolate through both LUTs: the old A becomes the first
        // rendered stage, its slot is taken by a finer identity domain.
        let domain_kind = if need_half_domain {
            HalfFlags::INPUT_HALF
        } else {
            HalfFlags::STANDARD
        };
        let mut fresh = Lut1DOp::with_domain(domain_kind, min_size)?;
        fresh.set_interpolation(a.interpolation());
        *fresh.metadata_mut() = a.metadata().clone();

        let old = std::mem::replace(a, fresh);
        ops.push(Op::Lut1D(old));
    }

    ops.push(Op::Lut1D(b.clone()));

    // Render the domain through the sequence.
    compose_with_ops(a, &ops)?;

    a.metadata_mut().combine(b.metadata());
    a.set_hue_adjust(b.hue_adjust());

    Ok(())
}

/// Builds a forward LUT that approximates an inverse one and is cheap to
/// evaluate.
///
/// The domain is a heuristic based on the bit depth the source file stored
/// the LUT at, since the actual color spaces around the LUT are unknown:
///
/// - unset or unusable depths fall back to 12 bits;
/// - GPU consumers are downsampled to 12 bits, except when the depth is
///   `U16`, which marks float-conversion LUTs that must not be subsampled;
/// - a source LUT with values outside `[0, 1]` forces a half domain so the
///   out-of-range outputs stay invertible.
///
/// The source LUT must have been finalized. Its inversion quality is
/// forced to exact for the duration of the call (and restored on every
/// exit path), otherwise the fast inverse path would recurse into this
/// builder.
pub fn make_fast_lut1d_from_inverse(lut: &mut Lut1DOp, for_gpu: bool) -> OpResult<Lut1DOp> {
    if lut.direction() != TransformDirection::Inverse {
        return Err(OpError::InvalidComposition(
            "a fast forward LUT can only be built from an inverse 1D LUT".into(),
        ));
    }

    let mut depth = lut.file_output_bit_depth();
    if matches!(depth, BitDepth::Unknown | BitDepth::U14 | BitDepth::U32) {
        depth = BitDepth::U12;
    }

    if for_gpu && depth != BitDepth::U16 {
        // The GPU always interpolates rather than looks up, so a smaller
        // table is enough.
        depth = BitDepth::U12;
    }

    if lut.has_extended_range() {
        depth = BitDepth::F16;
    }

    debug!(depth = %depth, for_gpu, "building fast LUT domain");

    let mut new_domain = Lut1DOp::make_lookup_domain(depth)?;

    let guard = ExactInversionGuard::new(lut);
    compose(&mut new_domain, guard.lut(), ComposeMethod::ResampleNo)?;
    drop(guard);

    Ok(new_domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut1d::{HueAdjust, InversionQuality, HALF_DOMAIN_ENTRIES};

    const EPSILON: f32 = 1e-5;

    fn channel0(lut: &Lut1DOp) -> Vec<f32> {
        lut.array()
            .values()
            .chunks_exact(3)
            .map(|row| row[0])
            .collect()
    }

    #[test]
    fn test_compose_identities_keeps_the_domain() {
        let mut a = Lut1DOp::new(8).unwrap();
        let b = Lut1DOp::new(16).unwrap();
        compose(&mut a, &b, ComposeMethod::ResampleNo).unwrap();

        assert_eq!(a.array().length(), 8);
        let data = channel0(&a);
        for (i, v) in data.iter().enumerate() {
            let expected = i as f32 / 7.0;
            assert!(
                (v - expected).abs() < EPSILON,
                "entry {i}: {v} != {expected}"
            );
        }
    }

    #[test]
    fn test_compose_neutral_element() {
        let mut a = Lut1DOp::new(32).unwrap();
        a.scale(0.5);
        let before = channel0(&a);

        let identity = Lut1DOp::new(64).unwrap();
        compose(&mut a, &identity, ComposeMethod::ResampleNo).unwrap();

        let after = channel0(&a);
        for (x, y) in before.iter().zip(after.iter()) {
            assert!((x - y).abs() < EPSILON);
        }
    }

    #[test]
    fn test_compose_applies_b() {
        let mut a = Lut1DOp::new(4).unwrap();
        let mut b = Lut1DOp::new(4).unwrap();
        b.scale(2.0);
        compose(&mut a, &b, ComposeMethod::ResampleNo).unwrap();

        let data = channel0(&a);
        for (i, v) in data.iter().enumerate() {
            let expected = 2.0 * i as f32 / 3.0;
            assert!((v - expected).abs() < EPSILON);
        }
    }

    #[test]
    fn test_resample_big_replaces_a_coarse_domain() {
        let mut a = Lut1DOp::new(8).unwrap();
        a.scale(0.5);
        let b = Lut1DOp::new(8).unwrap();
        compose(&mut a, &b, ComposeMethod::ResampleBig).unwrap();

        assert_eq!(a.array().length(), 65536);
        assert!(!a.is_input_half_domain());
        // The old A's effect survives resampling.
        let data = channel0(&a);
        assert!((data[65535] - 0.5).abs() < EPSILON);
        assert!((data[32768] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_resample_hd_builds_a_half_domain() {
        let mut a = Lut1DOp::new(8).unwrap();
        let b = Lut1DOp::new(8).unwrap();
        compose(&mut a, &b, ComposeMethod::ResampleHd).unwrap();

        assert!(a.is_input_half_domain());
        assert_eq!(a.array().length(), HALF_DOMAIN_ENTRIES);
    }

    #[test]
    fn test_half_domain_a_is_good_enough() {
        let mut a = Lut1DOp::with_domain(HalfFlags::INPUT_HALF, HALF_DOMAIN_ENTRIES).unwrap();
        let b = Lut1DOp::new(8).unwrap();
        compose(&mut a, &b, ComposeMethod::ResampleHd).unwrap();
        assert!(a.is_input_half_domain());
    }

    #[test]
    fn test_compose_copies_hue_adjust_and_metadata() {
        let mut a = Lut1DOp::new(8).unwrap();
        a.metadata_mut().add_attribute("id", "domain");

        let mut b = Lut1DOp::new(8).unwrap();
        b.set_hue_adjust(HueAdjust::Dw3);
        b.metadata_mut().add_attribute("comment", "grade");

        compose(&mut a, &b, ComposeMethod::ResampleNo).unwrap();
        assert_eq!(a.hue_adjust(), HueAdjust::Dw3);
        let keys: Vec<&str> = a.metadata().attributes().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "comment"]);
    }

    #[test]
    fn test_compose_rejects_an_inverse_domain() {
        let mut a = Lut1DOp::with_direction(8, TransformDirection::Inverse).unwrap();
        let b = Lut1DOp::new(8).unwrap();
        assert!(matches!(
            compose(&mut a, &b, ComposeMethod::ResampleNo),
            Err(OpError::InvalidComposition(_))
        ));
    }

    #[test]
    fn test_compose_with_empty_ops_fails() {
        let mut a = Lut1DOp::new(8).unwrap();
        assert!(matches!(
            compose_with_ops(&mut a, &[]),
            Err(OpError::InvalidComposition(_))
        ));
    }

    #[test]
    fn test_fast_lut_requires_an_inverse() {
        let mut lut = Lut1DOp::new(8).unwrap();
        assert!(make_fast_lut1d_from_inverse(&mut lut, false).is_err());
    }

    #[test]
    fn test_fast_lut_depth_heuristic() {
        let mut lut = Lut1DOp::with_direction(1024, TransformDirection::Inverse).unwrap();
        lut.finalize().unwrap();

        // Unknown file depth falls back to 12 bits.
        let fast = make_fast_lut1d_from_inverse(&mut lut, false).unwrap();
        assert_eq!(fast.array().length(), 4096);
        assert!(!fast.is_input_half_domain());
        assert_eq!(fast.direction(), TransformDirection::Forward);

        // A 10-bit file depth sizes the domain accordingly.
        lut.set_file_output_bit_depth(BitDepth::U10);
        let fast = make_fast_lut1d_from_inverse(&mut lut, false).unwrap();
        assert_eq!(fast.array().length(), 1024);

        // The GPU path downsamples to 12 bits...
        lut.set_file_output_bit_depth(BitDepth::U8);
        let fast = make_fast_lut1d_from_inverse(&mut lut, true).unwrap();
        assert_eq!(fast.array().length(), 4096);

        // ...except for the 16i no-subsample marker.
        lut.set_file_output_bit_depth(BitDepth::U16);
        let fast = make_fast_lut1d_from_inverse(&mut lut, true).unwrap();
        assert_eq!(fast.array().length(), 65536);
        assert!(!fast.is_input_half_domain());
    }

    #[test]
    fn test_fast_lut_extended_range_forces_half_domain() {
        let mut lut = Lut1DOp::with_direction(4, TransformDirection::Inverse).unwrap();
        for c in 0..3 {
            let values = lut.array_mut().values_mut();
            values[c] = -0.5;
            values[3 + c] = 0.0;
            values[6 + c] = 0.5;
            values[9 + c] = 1.2;
        }
        lut.set_file_output_bit_depth(BitDepth::U10);
        lut.finalize().unwrap();
        assert!(lut.has_extended_range());

        let fast = make_fast_lut1d_from_inverse(&mut lut, false).unwrap();
        assert!(fast.is_input_half_domain());
        assert_eq!(fast.array().length(), HALF_DOMAIN_ENTRIES);
    }

    #[test]
    fn test_fast_lut_restores_inversion_quality() {
        let mut lut = Lut1DOp::with_direction(256, TransformDirection::Inverse).unwrap();
        lut.finalize().unwrap();

        lut.set_inversion_quality(InversionQuality::Fast);
        make_fast_lut1d_from_inverse(&mut lut, false).unwrap();
        assert_eq!(lut.inversion_quality(), InversionQuality::Fast);

        lut.set_inversion_quality(InversionQuality::Exact);
        make_fast_lut1d_from_inverse(&mut lut, false).unwrap();
        assert_eq!(lut.inversion_quality(), InversionQuality::Exact);
    }

    #[test]
    fn test_fast_lut_inverts_a_gamma_curve() {
        // Forward gamma 2: x^2 on [0, 1]; its inverse is sqrt.
        let mut lut = Lut1DOp::with_direction(1024, TransformDirection::Inverse).unwrap();
        {
            let values = lut.array_mut().values_mut();
            for i in 0..1024 {
                let x = i as f32 / 1023.0;
                let y = x * x;
                for c in 0..3 {
                    values[i * 3 + c] = y;
                }
            }
        }
        lut.finalize().unwrap();

        let fast = make_fast_lut1d_from_inverse(&mut lut, false).unwrap();
        let data: Vec<f32> = fast
            .array()
            .values()
            .chunks_exact(3)
            .map(|row| row[0])
            .collect();

        let n = data.len();
        for (i, v) in data.iter().enumerate() {
            let x = i as f32 / (n - 1) as f32;
            let expected = x.sqrt();
            assert!(
                (v - expected).abs() < 2e-3,
                "entry {i}: {v} != sqrt = {expected}"
            );
        }
    }
}
