//! Rail sampling: arc-length positions along a solved spiral pair.
//!
//! Along a clothoid the tangent angle grows with the square of arc length,
//! so equal arc steps bunch their turning toward the curved end. The sampler
//! therefore steps uniformly in *angle* within each spiral half and converts
//! back to arc length, which keeps every per-step turn under the caller's
//! bound with the fewest samples. Terrain height matching and collision-box
//! placement both feed on the resulting sequence.

use thiserror::Error;

use super::Tolerance;
use super::spiral::SpiralFit;

/// Hard cap on per-half sample counts; an angle bound this fine is a caller
/// error, not a sampling request.
const MAX_STEPS_PER_HALF: usize = 1_000_000;

/// Errors from rail sampling.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SampleError {
    /// The angle bound is non-positive, non-finite, or so small the sample
    /// count would be absurd.
    #[error("maximum turning angle must be positive and finite, got {max_angle_degrees} degrees")]
    InvalidMaxAngle { max_angle_degrees: f64 },

    /// The spiral parameters are non-finite or non-positive.
    #[error("spiral parameters are not usable for sampling")]
    InvalidFit,

    /// The partial range is not an increasing subrange of `[0, 1]`.
    #[error("sample range [{start_fraction}, {end_fraction}] is not an increasing subrange of [0, 1]")]
    InvalidRange {
        start_fraction: f64,
        end_fraction: f64,
    },
}

fn validate_fit(fit: &SpiralFit) -> Result<(), SampleError> {
    let values = [fit.theta1, fit.theta2, fit.a1, fit.a2, fit.l1, fit.l2];
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(SampleError::InvalidFit);
    }
    Ok(())
}

/// Sample a solved spiral pair from 0 to its total arc length.
///
/// Returns a strictly increasing sequence starting at `0.0` and ending at
/// `fit.total_length()`, with the turning between consecutive samples never
/// exceeding `max_angle_degrees`. Within each half the samples are uniform
/// in angle.
///
/// # Errors
/// [`SampleError::InvalidMaxAngle`] or [`SampleError::InvalidFit`].
pub fn sample_rail(fit: &SpiralFit, max_angle_degrees: f64) -> Result<Vec<f64>, SampleError> {
    validate_fit(fit)?;
    if !max_angle_degrees.is_finite() || max_angle_degrees <= 0.0 {
        return Err(SampleError::InvalidMaxAngle { max_angle_degrees });
    }
    let max_angle = max_angle_degrees.to_radians();

    let n1 = (fit.theta1 / max_angle).ceil().max(1.0) as usize;
    let n2 = (fit.theta2 / max_angle).ceil().max(1.0) as usize;
    if n1 > MAX_STEPS_PER_HALF || n2 > MAX_STEPS_PER_HALF {
        return Err(SampleError::InvalidMaxAngle { max_angle_degrees });
    }

    let mut samples = Vec::with_capacity(n1 + n2 + 1);
    samples.push(0.0);

    // First half: angle runs 0 → theta1, arc length l/a1 with l = sqrt(angle).
    for k in 1..=n1 {
        let angle = fit.theta1 * (k as f64 / n1 as f64);
        samples.push(angle.sqrt() / fit.a1);
    }

    // Second half: walked from the far end, where the remaining angle drops
    // theta2 → 0 as the normalized parameter m = sqrt(remaining) shrinks.
    let mid = fit.mid_length();
    for j in 1..=n2 {
        let remaining = fit.theta2 * (1.0 - j as f64 / n2 as f64);
        samples.push(mid + (fit.l2 - remaining.sqrt()) / fit.a2);
    }

    Ok(samples)
}

/// Sample a partial range of the curve, given as fractions of the total arc
/// length.
///
/// The first element is the requested start offset and the last element the
/// requested partial end arc length; interior samples are those of the full
/// sampling that fall strictly inside the range, so the per-step turning
/// bound still holds.
///
/// # Errors
/// [`SampleError::InvalidRange`] for a non-increasing or out-of-bounds
/// range, plus the errors of [`sample_rail`].
pub fn sample_rail_range(
    fit: &SpiralFit,
    max_angle_degrees: f64,
    start_fraction: f64,
    end_fraction: f64,
) -> Result<Vec<f64>, SampleError> {
    if !start_fraction.is_finite()
        || !end_fraction.is_finite()
        || start_fraction < 0.0
        || end_fraction > 1.0
        || start_fraction >= end_fraction
    {
        return Err(SampleError::InvalidRange {
            start_fraction,
            end_fraction,
        });
    }

    let full = sample_rail(fit, max_angle_degrees)?;
    let total = fit.total_length();
    let start = start_fraction * total;
    let end = end_fraction * total;
    let eps = Tolerance::DEFAULT.eps * total.max(1.0);

    let mut samples = vec![start];
    for &s in &full {
        if s > start + eps && s < end - eps {
            samples.push(s);
        }
    }
    samples.push(end);
    Ok(samples)
}
