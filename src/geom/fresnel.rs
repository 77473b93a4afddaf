//! Power-series evaluation of the Fresnel integrals.
//!
//! The clothoid machinery in this crate parametrizes spirals by
//! `C(x) = ∫₀ˣ cos(t²) dt` and `S(x) = ∫₀ˣ sin(t²) dt` (no π/2 rescaling).
//! Both are evaluated through their Maclaurin series:
//!
//! ```text
//! C(x) = Σ (-1)ⁿ x^(4n+1) / ((2n)!  (4n+1))
//! S(x) = Σ (-1)ⁿ x^(4n+3) / ((2n+1)! (4n+3))
//! ```
//!
//! Summation stops once a term drops below `1e-6` of the running sum, with a
//! hard cap of [`MAX_SERIES_TERMS`] terms. The series is only trusted for the
//! arguments track curves actually produce (`|x| ≲ 2.5`, i.e. turning angles
//! up to roughly 2π across a double spiral); beyond `|x| ≈ 3.5` the
//! alternating terms stop shrinking within the cap and the evaluation reports
//! [`FresnelError::SeriesDiverged`] instead of returning garbage. This is a
//! deliberate precision boundary, not a general-purpose Fresnel evaluator.

use thiserror::Error;

/// Hard cap on the number of series terms evaluated per call.
pub const MAX_SERIES_TERMS: usize = 20;

/// Relative term-to-sum ratio below which the series is accepted.
const SERIES_RELATIVE_TOLERANCE: f64 = 1e-6;

/// Errors from Fresnel series evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FresnelError {
    /// The argument is outside the range where the truncated Maclaurin
    /// series converges.
    #[error("fresnel series did not converge within {MAX_SERIES_TERMS} terms for x = {x}")]
    SeriesDiverged { x: f64 },

    /// The argument is NaN or infinite.
    #[error("fresnel argument must be finite, got {x}")]
    NonFiniteArgument { x: f64 },
}

/// Evaluate `C(x) = ∫₀ˣ cos(t²) dt`.
///
/// # Errors
/// [`FresnelError::SeriesDiverged`] when the truncated series cannot
/// represent the argument, [`FresnelError::NonFiniteArgument`] for NaN/Inf.
pub fn fresnel_c(x: f64) -> Result<f64, FresnelError> {
    if !x.is_finite() {
        return Err(FresnelError::NonFiniteArgument { x });
    }

    let x2 = x * x;
    let x4 = x2 * x2;

    // u_n = (-1)^n x^(4n+1) / (2n)!, accumulated term is u_n / (4n+1).
    let mut u = x;
    let mut sum = u;
    for n in 1..MAX_SERIES_TERMS {
        let nf = n as f64;
        u *= -x4 / ((2.0 * nf) * (2.0 * nf - 1.0));
        let term = u / (4.0 * nf + 1.0);
        sum += term;
        if term.abs() <= SERIES_RELATIVE_TOLERANCE * sum.abs() {
            return Ok(sum);
        }
    }
    Err(FresnelError::SeriesDiverged { x })
}

/// Evaluate `S(x) = ∫₀ˣ sin(t²) dt`.
///
/// # Errors
/// [`FresnelError::SeriesDiverged`] when the truncated series cannot
/// represent the argument, [`FresnelError::NonFiniteArgument`] for NaN/Inf.
pub fn fresnel_s(x: f64) -> Result<f64, FresnelError> {
    if !x.is_finite() {
        return Err(FresnelError::NonFiniteArgument { x });
    }

    let x2 = x * x;
    let x4 = x2 * x2;

    // u_n = (-1)^n x^(4n+3) / (2n+1)!, accumulated term is u_n / (4n+3).
    let mut u = x * x2;
    let mut sum = u / 3.0;
    for n in 1..MAX_SERIES_TERMS {
        let nf = n as f64;
        u *= -x4 / ((2.0 * nf + 1.0) * (2.0 * nf));
        let term = u / (4.0 * nf + 3.0);
        sum += term;
        if term.abs() <= SERIES_RELATIVE_TOLERANCE * sum.abs() {
            return Ok(sum);
        }
    }
    Err(FresnelError::SeriesDiverged { x })
}
