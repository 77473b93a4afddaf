//! Transition-curve (clothoid) solvers.
//!
//! A clothoid of scale `a` (an inverse length) is parametrized here by its
//! normalized arc parameter `l`: position `(C(l)/a, S(l)/a)` in the local
//! frame, tangent angle `l²`, physical curvature `2·a·l`, physical arc length
//! `l/a`. A curvature limit `R` binds through `l = 1/(2aR)`.
//!
//! The solvers cover the track-fitting cases:
//!
//! - **Full S-less pair** ([`find_theta`]): two spiral halves joining two
//!   anchors with given tangents, splitting the total turning angle.
//! - **Single transition** ([`find_a_single_transition`]): one spiral from
//!   zero curvature to a bounding radius through a target point.
//! - **Partial transition out** ([`find_a_partial_transition_out`]): the
//!   radius-limited case where the spiral hands over to a circular arc
//!   before the target is reached.
//! - **Partial transition in** ([`find_a_partial_transition_in`]): the
//!   target sits partway along the transition toward the bounding radius.
//! - **Single partial transition**
//!   ([`find_a_single_partial_transition`]): a spiral segment clamped
//!   between two different radii with a prescribed chord.
//!
//! Failure is always a typed [`SolveError`]; no sentinel values, no panics.

use std::f64::consts::{FRAC_PI_2, PI};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fresnel::{FresnelError, fresnel_c, fresnel_s};
use super::{Point3, Tolerance, Vec3};

/// Iteration cap for the 1-D Newton split of [`find_theta`].
const MAX_FIND_THETA_ITERATIONS: usize = 10;
/// Iteration cap for the single-transition Newton iteration.
const MAX_SINGLE_TRANSITION_ITERATIONS: usize = 25;
/// Iteration cap for the bracketed partial-transition root find.
const MAX_PARTIAL_OUT_ITERATIONS: usize = 25;
/// Iteration cap for the 2-D partial-transition-in Newton iteration.
const MAX_PARTIAL_IN_ITERATIONS: usize = 15;
/// Iteration cap for the two-radius segment Newton iteration.
const MAX_SINGLE_PARTIAL_ITERATIONS: usize = 200;

/// `theta1` is kept inside `[margin·phi, (1-margin)·phi]` to avoid the
/// degenerate all-in-one-half splits.
const THETA1_CLAMP_MARGIN: f64 = 0.001;
/// Relative tolerance on the scale-factor mismatch accepted by `find_theta`.
const DELTA_A_RELATIVE_TOLERANCE: f64 = 1e-7;
/// A radius this many times the target distance no longer bends the fit.
const R_EFFECTIVELY_INFINITE: f64 = 1e4;
/// Coarse samples used to locate a sign change before regula falsi.
const BRACKET_SCAN_STEPS: usize = 24;

// ============================================================================
// Result types
// ============================================================================

/// A solved pair of spiral halves joining two anchors.
///
/// Invariants (up to solver tolerance): `theta1 + theta2 == phi` and
/// `a1 * l1 == a2 * l2` — the physical curvature of the two halves agrees at
/// the midpoint where they meet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralFit {
    /// Turning angle of the half starting at the first anchor (radians).
    pub theta1: f64,
    /// Turning angle of the half ending at the second anchor (radians).
    pub theta2: f64,
    /// Scale factor of the first half (inverse length).
    pub a1: f64,
    /// Scale factor of the second half (inverse length).
    pub a2: f64,
    /// Normalized arc length of the first half, `sqrt(theta1)`.
    pub l1: f64,
    /// Normalized arc length of the second half, `sqrt(theta2)`.
    pub l2: f64,
}

impl SpiralFit {
    /// Total turning angle between the anchor tangents.
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.theta1 + self.theta2
    }

    /// Physical arc length of the full curve.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.l1 / self.a1 + self.l2 / self.a2
    }

    /// Physical arc length of the first half (start to curvature peak).
    #[must_use]
    pub fn mid_length(&self) -> f64 {
        self.l1 / self.a1
    }
}

/// A single spiral from zero curvature to a bounding radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SingleTransition {
    /// Spiral scale factor (inverse length).
    pub a: f64,
    /// Turning angle at the target point (radians).
    pub theta: f64,
}

/// A radius-limited fit: spiral up to the bounding radius, then a circular
/// arc of that radius carrying the curve to the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTransitionOut {
    /// Spiral scale factor (inverse length).
    pub a: f64,
    /// Total turning angle to the target, spiral plus arc (radians).
    pub theta: f64,
    /// Share of the total turning achieved inside the spiral; `1.0` means
    /// the transition completed with no arc.
    pub fraction_out: f64,
}

/// A fit whose target sits partway along the transition toward the
/// bounding radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTransitionIn {
    /// Spiral scale factor (inverse length).
    pub a: f64,
    /// Turning angle of the full transition up to the bounding radius.
    pub theta: f64,
    /// Fraction of the full transition traversed at the target,
    /// `sqrt(theta_p / theta)`.
    pub fraction_in: f64,
}

/// A spiral segment clamped between two radii with a prescribed chord.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SinglePartialTransition {
    /// Spiral scale factor (inverse length).
    pub a: f64,
    /// Turning across the segment (radians).
    pub theta: f64,
    /// Share of the full zero-to-small-radius transition the segment keeps.
    pub fraction: f64,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from the transition-curve solvers.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SolveError {
    /// Input vectors or radii are degenerate: zero-length, non-finite, or
    /// describing a straight connection that needs no easement.
    #[error("degenerate solver input: {reason}")]
    Degenerate { reason: &'static str },

    /// No spiral pair of the given turning angle can reach the requested
    /// displacement; detected analytically before iterating.
    #[error("displacement unreachable by a spiral pair turning {phi} rad")]
    Infeasible { phi: f64 },

    /// The analytic bracket contains no sign change, so no root exists
    /// between the bounds.
    #[error("no root bracketed in [{lo}, {hi}]")]
    NoBracket { lo: f64, hi: f64 },

    /// The iteration cap was reached before the tolerance was met.
    #[error("solver exhausted {iterations} iterations (last residual {residual:e})")]
    Exhausted { iterations: usize, residual: f64 },

    /// A converged candidate failed its closed-form re-check.
    #[error("converged candidate rejected: {reason} (error {error:e})")]
    Rejected { reason: &'static str, error: f64 },

    /// A Fresnel evaluation left the trusted series range.
    #[error(transparent)]
    Fresnel(#[from] FresnelError),
}

// ============================================================================
// find_theta: split the turning angle between two spiral halves
// ============================================================================

/// Scale factors for a trial split of the turning angle.
///
/// `a2` comes from the along-tangent displacement equation combined with the
/// curvature-continuity constraint; `a1_geometric` from the perpendicular
/// displacement equation given that `a2`; `a1_continuity` is the value the
/// constraint itself demands. The split is correct when the two `a1`s agree.
struct MidScaleFactors {
    a2: f64,
    a1_geometric: f64,
    a1_continuity: f64,
}

fn mid_scale_factors(
    theta1: f64,
    phi: f64,
    xd: f64,
    yd: f64,
) -> Result<MidScaleFactors, SolveError> {
    let theta2 = phi - theta1;
    let l1 = theta1.sqrt();
    let l2 = theta2.sqrt();
    let c1 = fresnel_c(l1)?;
    let s1 = fresnel_s(l1)?;
    let c2 = fresnel_c(l2)?;
    let s2 = fresnel_s(l2)?;
    let (sin_phi, cos_phi) = phi.sin_cos();

    let a2 = (c1 * l1 / l2 + c2 * cos_phi + s2 * sin_phi) / xd;
    let a1_geometric = s1 / (yd - (c2 * sin_phi - s2 * cos_phi) / a2);
    let a1_continuity = a2 * l2 / l1;

    Ok(MidScaleFactors {
        a2,
        a1_geometric,
        a1_continuity,
    })
}

/// Residual of the turning-angle split: the two scale-factor formulas must
/// agree when `theta1` is correct.
fn delta_a(theta1: f64, phi: f64, xd: f64, yd: f64) -> Result<f64, SolveError> {
    mid_scale_factors(theta1, phi, xd, yd).map(|f| f.a1_geometric - f.a1_continuity)
}

/// Fit a pair of spiral halves between two anchors.
///
/// `start_dir` points along the track into the curve; `end_dir` points back
/// out of the curve from the second anchor (the usual connector-node
/// convention), so the total turning angle is the angle between `start_dir`
/// and `-end_dir`. The displacement is decomposed into an along-tangent part
/// `xd` and an in-plane perpendicular part `yd`, and a 1-D Newton iteration
/// on `theta1` drives the [`delta_a`] residual to zero. The residual
/// derivative is taken by central difference; the closed-form residual is
/// the source of truth.
///
/// # Errors
/// [`SolveError::Degenerate`] for zero-length directions, coincident
/// anchors, or (anti-)parallel tangents; [`SolveError::Infeasible`] when the
/// chord angle lies outside what any split can reach;
/// [`SolveError::Exhausted`] when the iteration cap is hit.
pub fn find_theta(
    start_pos: Point3,
    end_pos: Point3,
    start_dir: Vec3,
    end_dir: Vec3,
    initial_guess: Option<f64>,
) -> Result<SpiralFit, SolveError> {
    let sd = start_dir.normalized().ok_or(SolveError::Degenerate {
        reason: "start direction has zero length",
    })?;
    let ed = end_dir.normalized().ok_or(SolveError::Degenerate {
        reason: "end direction has zero length",
    })?;

    let disp = end_pos - start_pos;
    if Tolerance::ZERO_LENGTH.is_zero_vec3(disp) {
        return Err(SolveError::Degenerate {
            reason: "anchor points coincide",
        });
    }

    let cos_phi = sd.dot(-ed).clamp(-1.0, 1.0);
    let phi = cos_phi.acos();
    if phi < Tolerance::ANGLE.eps {
        // Parallel tangents: a straight joint, or an S-curve which this
        // solver does not model.
        return Err(SolveError::Degenerate {
            reason: "tangent directions are parallel",
        });
    }
    if phi > PI - Tolerance::ANGLE.eps {
        return Err(SolveError::Degenerate {
            reason: "tangent directions are anti-parallel",
        });
    }

    let xd = disp.dot(sd);
    let yd = (disp - sd * xd).length();

    // Feasibility: the chord angle must lie strictly between the chord
    // angles of the two limiting single-sided spirals (all turning at the
    // start vs. all turning at the end).
    let l_phi = phi.sqrt();
    let chord_limit = fresnel_s(l_phi)?.atan2(fresnel_c(l_phi)?);
    let chord = yd.atan2(xd);
    if chord <= chord_limit || chord >= phi - chord_limit {
        return Err(SolveError::Infeasible { phi });
    }

    let lo = THETA1_CLAMP_MARGIN * phi;
    let hi = (1.0 - THETA1_CLAMP_MARGIN) * phi;
    let mut theta1 = initial_guess.unwrap_or(0.5 * phi).clamp(lo, hi);
    let h = phi * 1e-6;
    let mut residual = f64::INFINITY;

    for iteration in 0..MAX_FIND_THETA_ITERATIONS {
        let factors = mid_scale_factors(theta1, phi, xd, yd)?;
        residual = factors.a1_geometric - factors.a1_continuity;
        trace!("find_theta it {iteration}: theta1 = {theta1:.9}, residual = {residual:.3e}");

        if !residual.is_finite() {
            // The trial split drove a denominator through zero; pull the
            // split back toward the middle and retry.
            theta1 = 0.5 * (theta1 + 0.5 * phi);
            continue;
        }

        let scale = factors.a1_continuity.abs().max(1.0);
        if residual.abs() <= DELTA_A_RELATIVE_TOLERANCE * scale {
            let a1 = factors.a1_continuity;
            let a2 = factors.a2;
            if !(a1 > 0.0 && a2 > 0.0) {
                return Err(SolveError::Rejected {
                    reason: "non-positive spiral scale",
                    error: a1.min(a2),
                });
            }
            let theta2 = phi - theta1;
            debug!(
                "find_theta converged after {} iterations: theta1 = {theta1:.6}, theta2 = {theta2:.6}",
                iteration + 1
            );
            return Ok(SpiralFit {
                theta1,
                theta2,
                a1,
                a2,
                l1: theta1.sqrt(),
                l2: theta2.sqrt(),
            });
        }

        let f_plus = delta_a(theta1 + h, phi, xd, yd)?;
        let f_minus = delta_a(theta1 - h, phi, xd, yd)?;
        let derivative = (f_plus - f_minus) / (2.0 * h);
        if !derivative.is_finite() || derivative == 0.0 {
            return Err(SolveError::Exhausted {
                iterations: iteration + 1,
                residual,
            });
        }
        theta1 = (theta1 - residual / derivative).clamp(lo, hi);
    }

    debug!("find_theta exhausted after {MAX_FIND_THETA_ITERATIONS} iterations");
    Err(SolveError::Exhausted {
        iterations: MAX_FIND_THETA_ITERATIONS,
        residual,
    })
}

// ============================================================================
// Single transition: spiral from zero curvature to a bounding radius
// ============================================================================

fn check_transition_inputs(r: f64, xp: f64, yp: f64) -> Result<(), SolveError> {
    if !(r.is_finite() && xp.is_finite() && yp.is_finite()) {
        return Err(SolveError::Degenerate {
            reason: "non-finite transition input",
        });
    }
    if r <= 0.0 {
        return Err(SolveError::Degenerate {
            reason: "bounding radius must be positive",
        });
    }
    if xp <= Tolerance::ZERO_LENGTH.eps || yp <= Tolerance::ZERO_LENGTH.eps {
        return Err(SolveError::Degenerate {
            reason: "target must lie forward of and beside the spiral origin",
        });
    }
    Ok(())
}

/// Solve a single spiral of curvature limit `1/r` through `(xp, yp)`.
///
/// Newton–Raphson on the scale `a` against
/// `f(a) = C(L) − (xp/yp)·S(L)` with `L = 1/(2aR)`; the closed-form
/// derivative is `dL/da · (cos L² − (xp/yp)·sin L²)`. The root only fixes
/// the direction ratio, so the converged spiral is re-checked against the
/// target point within [`Tolerance::POSITION_CHECK`]; geometries where the
/// radius limit and the point disagree are rejected.
///
/// # Errors
/// [`SolveError::Degenerate`] for unusable inputs, [`SolveError::Exhausted`]
/// past the iteration cap, [`SolveError::Rejected`] when the converged
/// spiral misses the target.
pub fn find_a_single_transition(r: f64, xp: f64, yp: f64) -> Result<SingleTransition, SolveError> {
    check_transition_inputs(r, xp, yp)?;

    let ratio = xp / yp;
    // Small-angle seed: theta ≈ 3·yp/xp, and the radius ties a to L.
    let theta_seed = (3.0 * yp / xp).clamp(1e-6, 2.0);
    let mut a = 1.0 / (2.0 * theta_seed.sqrt() * r);
    let mut residual = f64::INFINITY;

    for iteration in 0..MAX_SINGLE_TRANSITION_ITERATIONS {
        let l = 1.0 / (2.0 * a * r);
        let c = fresnel_c(l)?;
        let s = fresnel_s(l)?;
        residual = c - ratio * s;
        trace!("find_a_single_transition it {iteration}: a = {a:.9}, residual = {residual:.3e}");

        if residual.abs() <= Tolerance::DEFAULT.eps {
            let x_err = (c / a - xp).abs();
            let y_err = (s / a - yp).abs();
            if x_err > Tolerance::POSITION_CHECK.eps || y_err > Tolerance::POSITION_CHECK.eps {
                return Err(SolveError::Rejected {
                    reason: "spiral misses the target point",
                    error: x_err.max(y_err),
                });
            }
            return Ok(SingleTransition { a, theta: l * l });
        }

        let theta = l * l;
        let dl_da = -1.0 / (2.0 * a * a * r);
        let derivative = dl_da * (theta.cos() - ratio * theta.sin());
        if !derivative.is_finite() || derivative == 0.0 {
            return Err(SolveError::Exhausted {
                iterations: iteration + 1,
                residual,
            });
        }
        let next = a - residual / derivative;
        a = if next.is_finite() && next > 0.0 {
            next
        } else {
            0.5 * a
        };
    }

    Err(SolveError::Exhausted {
        iterations: MAX_SINGLE_TRANSITION_ITERATIONS,
        residual,
    })
}

// ============================================================================
// Partial transition out: spiral capped by its radius, then an arc
// ============================================================================

/// Spiral through `(xp, yp)` with no radius constraint: Newton on the
/// normalized parameter `l` for `C(l)·yp − S(l)·xp = 0`.
fn solve_unbounded_through_point(xp: f64, yp: f64) -> Result<(f64, f64), SolveError> {
    let tol = Tolerance::DEFAULT.eps * (xp.abs() + yp.abs());
    let mut l = (3.0 * yp / xp).clamp(1e-6, 2.0).sqrt();
    let mut residual = f64::INFINITY;

    for iteration in 0..MAX_SINGLE_TRANSITION_ITERATIONS {
        let c = fresnel_c(l)?;
        let s = fresnel_s(l)?;
        residual = c * yp - s * xp;
        if residual.abs() <= tol {
            let a = c / xp;
            if !(a.is_finite() && a > 0.0) {
                return Err(SolveError::Rejected {
                    reason: "non-positive spiral scale",
                    error: a,
                });
            }
            return Ok((a, l * l));
        }
        let theta = l * l;
        let derivative = theta.cos() * yp - theta.sin() * xp;
        if !derivative.is_finite() || derivative == 0.0 {
            return Err(SolveError::Exhausted {
                iterations: iteration + 1,
                residual,
            });
        }
        let next = l - residual / derivative;
        l = if next.is_finite() && next > 0.0 {
            next
        } else {
            0.5 * l
        };
    }

    Err(SolveError::Exhausted {
        iterations: MAX_SINGLE_TRANSITION_ITERATIONS,
        residual,
    })
}

/// Center of the circular arc continuing a spiral of scale `a` past its
/// curvature limit `1/r`, in the spiral's local frame.
fn arc_center(a: f64, r: f64) -> Result<(f64, f64), SolveError> {
    let l = 1.0 / (2.0 * a * r);
    let qx = fresnel_c(l)? / a;
    let qy = fresnel_s(l)? / a;
    let theta_spiral = l * l;
    let (sin_t, cos_t) = theta_spiral.sin_cos();
    // Left normal of the spiral end tangent, scaled by the radius.
    Ok((qx - r * sin_t, qy + r * cos_t))
}

/// Distance mismatch between the target and the arc that continues the
/// spiral: zero exactly when the arc passes through the target.
fn function_of_a_partial_transition(a: f64, r: f64, xp: f64, yp: f64) -> Result<f64, SolveError> {
    let (cx, cy) = arc_center(a, r)?;
    let dx = xp - cx;
    let dy = yp - cy;
    Ok((dx * dx + dy * dy).sqrt() - r)
}

/// Solve the radius-limited "transition out" fit through `(xp, yp)`.
///
/// Tries the pure single transition first; if the radius is effectively
/// infinite relative to the target distance, solves the unbounded spiral
/// instead. Otherwise the curve is a spiral up to curvature `1/r` followed
/// by a circular arc of radius `r`, and the scale is found by an Illinois
/// regula-falsi on [`function_of_a_partial_transition`] between
/// turning-angle-derived bounds (spiral turning from `π` down to `1e-4`
/// rad). A coarse scan locates the sign change nearest the short-spiral end
/// before the regula-falsi refines it.
///
/// # Errors
/// [`SolveError::NoBracket`] when no sign change exists in the bounds,
/// [`SolveError::Exhausted`] past the iteration cap, plus the shared input
/// checks.
pub fn find_a_partial_transition_out(
    r: f64,
    xp: f64,
    yp: f64,
) -> Result<PartialTransitionOut, SolveError> {
    check_transition_inputs(r, xp, yp)?;

    if let Ok(single) = find_a_single_transition(r, xp, yp) {
        return Ok(PartialTransitionOut {
            a: single.a,
            theta: single.theta,
            fraction_out: 1.0,
        });
    }

    let dist = (xp * xp + yp * yp).sqrt();
    if r > R_EFFECTIVELY_INFINITE * dist {
        let (a, theta) = solve_unbounded_through_point(xp, yp)?;
        debug!("find_a_partial_transition_out: radius treated as infinite (r = {r:.3e})");
        return Ok(PartialTransitionOut {
            a,
            theta,
            fraction_out: 1.0,
        });
    }

    // Spiral turning in (1e-4, π]: broad bounds on a through l = 1/(2aR).
    let a_min = 1.0 / (2.0 * r * PI.sqrt());
    let a_max = 1.0 / (2.0 * r * 1e-2);

    // Locate the sign change closest to the short-spiral end; the fit with
    // the least spiral is the one the track wants.
    let log_step = (a_max / a_min).ln() / BRACKET_SCAN_STEPS as f64;
    let mut bracket: Option<(f64, f64, f64, f64)> = None;
    let mut prev_a = a_min;
    let mut prev_f = function_of_a_partial_transition(a_min, r, xp, yp)?;
    for step in 1..=BRACKET_SCAN_STEPS {
        let a = a_min * (log_step * step as f64).exp();
        let f = function_of_a_partial_transition(a, r, xp, yp)?;
        if prev_f * f <= 0.0 {
            bracket = Some((prev_a, prev_f, a, f));
        }
        prev_a = a;
        prev_f = f;
    }
    let Some((mut lo, mut f_lo, mut hi, mut f_hi)) = bracket else {
        return Err(SolveError::NoBracket {
            lo: a_min,
            hi: a_max,
        });
    };

    let mut last_replaced: i8 = 0;
    let mut residual = f64::INFINITY;
    for iteration in 0..MAX_PARTIAL_OUT_ITERATIONS {
        let denom = f_hi - f_lo;
        if denom == 0.0 {
            break;
        }
        let a_mid = hi - f_hi * (hi - lo) / denom;
        let f_mid = function_of_a_partial_transition(a_mid, r, xp, yp)?;
        residual = f_mid;
        trace!(
            "find_a_partial_transition_out it {iteration}: a = {a_mid:.9}, residual = {f_mid:.3e}"
        );

        if f_mid.abs() < Tolerance::PARTIAL_ROOT.eps {
            return finish_partial_out(a_mid, r, xp, yp);
        }

        if (f_mid > 0.0) == (f_lo > 0.0) {
            lo = a_mid;
            f_lo = f_mid;
            if last_replaced == 1 {
                // Illinois weighting: the stagnant end loses half its pull
                // for every consecutive one-sided step.
                f_hi *= 0.5;
            }
            last_replaced = 1;
        } else {
            hi = a_mid;
            f_hi = f_mid;
            if last_replaced == -1 {
                f_lo *= 0.5;
            }
            last_replaced = -1;
        }
    }

    Err(SolveError::Exhausted {
        iterations: MAX_PARTIAL_OUT_ITERATIONS,
        residual,
    })
}

fn finish_partial_out(
    a: f64,
    r: f64,
    xp: f64,
    yp: f64,
) -> Result<PartialTransitionOut, SolveError> {
    let l = 1.0 / (2.0 * a * r);
    let theta_spiral = l * l;
    let (cx, cy) = arc_center(a, r)?;
    let qx = fresnel_c(l)? / a - cx;
    let qy = fresnel_s(l)? / a - cy;
    let tx = xp - cx;
    let ty = yp - cy;
    // Signed arc sweep from the spiral end to the target, in turn direction.
    let mut sweep = (qx * ty - qy * tx).atan2(qx * tx + qy * ty);
    if sweep < 0.0 {
        sweep += 2.0 * PI;
    }
    let theta = theta_spiral + sweep;
    Ok(PartialTransitionOut {
        a,
        theta,
        fraction_out: theta_spiral / theta,
    })
}

// ============================================================================
// Partial transition in: the target sits partway along the transition
// ============================================================================

/// Solve the fit whose target lies partway along the transition toward the
/// bounding radius.
///
/// 2-D Newton–Raphson on `(a, theta_p)` against the position residual
/// `(C(l)/a − xp, S(l)/a − yp)` with `l = sqrt(theta_p)` and the closed-form
/// Jacobian. The full transition angle implied by the radius,
/// `theta = (1/(2aR))²`, must land strictly inside `(theta_p, π/2)` or the
/// candidate is rejected: outside that window the target is beyond the
/// radius limit (use the *out* variant) or the transition is unreasonably
/// sharp.
///
/// # Errors
/// [`SolveError::Exhausted`] past 15 iterations without the residual
/// dropping below [`Tolerance::RESIDUAL`]; [`SolveError::Rejected`] when the
/// implied full angle is out of range; shared input checks.
pub fn find_a_partial_transition_in(
    r: f64,
    xp: f64,
    yp: f64,
) -> Result<PartialTransitionIn, SolveError> {
    check_transition_inputs(r, xp, yp)?;

    let mut theta_p = (3.0 * yp / xp).clamp(1e-4, 1.5);
    let mut a = theta_p.sqrt() / xp;
    let mut residual = f64::INFINITY;

    for iteration in 0..MAX_PARTIAL_IN_ITERATIONS {
        let l = theta_p.sqrt();
        let c = fresnel_c(l)?;
        let s = fresnel_s(l)?;
        let f1 = c / a - xp;
        let f2 = s / a - yp;
        residual = (f1 * f1 + f2 * f2).sqrt();
        trace!(
            "find_a_partial_transition_in it {iteration}: a = {a:.9}, theta_p = {theta_p:.9}, residual = {residual:.3e}"
        );

        if residual <= Tolerance::RESIDUAL.eps {
            let l_full = 1.0 / (2.0 * a * r);
            let theta_full = l_full * l_full;
            if theta_full <= theta_p || theta_full >= FRAC_PI_2 {
                return Err(SolveError::Rejected {
                    reason: "full transition angle outside (theta_p, pi/2)",
                    error: theta_full,
                });
            }
            return Ok(PartialTransitionIn {
                a,
                theta: theta_full,
                fraction_in: (theta_p / theta_full).sqrt(),
            });
        }

        let j11 = -c / (a * a);
        let j12 = theta_p.cos() / (2.0 * l * a);
        let j21 = -s / (a * a);
        let j22 = theta_p.sin() / (2.0 * l * a);
        let det = j11 * j22 - j12 * j21;
        if !det.is_finite() || det.abs() < 1e-18 {
            return Err(SolveError::Exhausted {
                iterations: iteration + 1,
                residual,
            });
        }

        let da = (f1 * j22 - f2 * j12) / det;
        let dtheta = (j11 * f2 - j21 * f1) / det;
        let next_a = a - da;
        a = if next_a.is_finite() && next_a > 0.0 {
            next_a
        } else {
            0.5 * a
        };
        theta_p = (theta_p - dtheta).clamp(1e-9, 2.4);
    }

    Err(SolveError::Exhausted {
        iterations: MAX_PARTIAL_IN_ITERATIONS,
        residual,
    })
}

// ============================================================================
// Single partial transition: spiral segment between two radii
// ============================================================================

/// Solve a spiral segment running from curvature `1/r_large` to `1/r_small`
/// whose chord length equals `dist`.
///
/// The segment spans normalized parameters `l1 = 1/(2a·r_large)` to
/// `l2 = 1/(2a·r_small)`; Newton–Raphson on `a` drives the chord length to
/// `dist` with a central-difference derivative. Returns the turning across
/// the segment and the share of the full transition it keeps,
/// `(l2 − l1)/l2`.
///
/// # Errors
/// [`SolveError::Degenerate`] unless `0 < r_small < r_large` and
/// `dist > 0`; [`SolveError::Exhausted`] past 200 iterations.
pub fn find_a_single_partial_transition(
    dist: f64,
    r_small: f64,
    r_large: f64,
) -> Result<SinglePartialTransition, SolveError> {
    if !(dist.is_finite() && r_small.is_finite() && r_large.is_finite()) {
        return Err(SolveError::Degenerate {
            reason: "non-finite transition input",
        });
    }
    if dist <= 0.0 {
        return Err(SolveError::Degenerate {
            reason: "chord distance must be positive",
        });
    }
    if r_small <= 0.0 || r_small >= r_large {
        return Err(SolveError::Degenerate {
            reason: "radii must satisfy 0 < r_small < r_large",
        });
    }

    let chord = |a: f64| -> Result<f64, SolveError> {
        let l1 = 1.0 / (2.0 * a * r_large);
        let l2 = 1.0 / (2.0 * a * r_small);
        let dx = (fresnel_c(l2)? - fresnel_c(l1)?) / a;
        let dy = (fresnel_s(l2)? - fresnel_s(l1)?) / a;
        Ok((dx * dx + dy * dy).sqrt())
    };

    // Arc-length seed: the segment length is (1/r_small − 1/r_large)/(2a²).
    let mut a = ((1.0 / r_small - 1.0 / r_large) / (2.0 * dist)).sqrt();
    let mut residual = f64::INFINITY;
    let tol = Tolerance::DEFAULT.eps * dist;

    for iteration in 0..MAX_SINGLE_PARTIAL_ITERATIONS {
        residual = chord(a)? - dist;
        trace!(
            "find_a_single_partial_transition it {iteration}: a = {a:.9}, residual = {residual:.3e}"
        );
        if residual.abs() <= tol {
            let l1 = 1.0 / (2.0 * a * r_large);
            let l2 = 1.0 / (2.0 * a * r_small);
            return Ok(SinglePartialTransition {
                a,
                theta: l2 * l2 - l1 * l1,
                fraction: (l2 - l1) / l2,
            });
        }

        let h = a * 1e-6;
        let derivative = (chord(a + h)? - chord(a - h)?) / (2.0 * h);
        if !derivative.is_finite() || derivative == 0.0 {
            return Err(SolveError::Exhausted {
                iterations: iteration + 1,
                residual,
            });
        }
        let next = a - residual / derivative;
        a = if next.is_finite() && next > 0.0 {
            next
        } else {
            0.5 * a
        };
    }

    Err(SolveError::Exhausted {
        iterations: MAX_SINGLE_PARTIAL_ITERATIONS,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Forward evaluation of the double-spiral displacement for known
    /// parameters, used to build self-consistent solver inputs.
    fn displacement_for(theta1: f64, theta2: f64, a1: f64, a2: f64) -> (f64, f64) {
        let phi = theta1 + theta2;
        let (sin_phi, cos_phi) = phi.sin_cos();
        let c1 = fresnel_c(theta1.sqrt()).unwrap();
        let s1 = fresnel_s(theta1.sqrt()).unwrap();
        let c2 = fresnel_c(theta2.sqrt()).unwrap();
        let s2 = fresnel_s(theta2.sqrt()).unwrap();
        let xd = c1 / a1 + (c2 * cos_phi + s2 * sin_phi) / a2;
        let yd = s1 / a1 + (c2 * sin_phi - s2 * cos_phi) / a2;
        (xd, yd)
    }

    fn anchors_for(xd: f64, yd: f64, phi: f64) -> (Point3, Point3, Vec3, Vec3) {
        let start = Point3::ORIGIN;
        let end = Point3::new(xd, yd, 0.0);
        let start_dir = Vec3::X;
        let end_dir = Vec3::new(-phi.cos(), -phi.sin(), 0.0);
        (start, end, start_dir, end_dir)
    }

    #[test]
    fn test_find_theta_symmetric_splits_evenly() {
        let phi = 0.8;
        let (xd, yd) = displacement_for(0.4, 0.4, 1.0, 1.0);
        let (start, end, sd, ed) = anchors_for(xd, yd, phi);

        let fit = find_theta(start, end, sd, ed, None).unwrap();
        assert!((fit.theta1 - 0.4).abs() < 1e-6, "theta1 = {}", fit.theta1);
        assert!((fit.theta2 - 0.4).abs() < 1e-6, "theta2 = {}", fit.theta2);
        assert!((fit.a1 - 1.0).abs() < 1e-5);
        assert!((fit.a2 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_find_theta_asymmetric_recovers_parameters() {
        // theta1 = 0.3, theta2 = 0.5, a2 = 1; continuity fixes a1.
        let a1 = (0.5f64.sqrt()) / (0.3f64.sqrt());
        let (xd, yd) = displacement_for(0.3, 0.5, a1, 1.0);
        let (start, end, sd, ed) = anchors_for(xd, yd, 0.8);

        let fit = find_theta(start, end, sd, ed, None).unwrap();
        assert!((fit.theta1 - 0.3).abs() < 2e-3, "theta1 = {}", fit.theta1);
        assert!((fit.theta2 - 0.5).abs() < 2e-3, "theta2 = {}", fit.theta2);
        assert!((fit.a2 - 1.0).abs() < 5e-3, "a2 = {}", fit.a2);
    }

    #[test]
    fn test_find_theta_invariants_hold() {
        let a1 = (0.55f64.sqrt()) / (0.35f64.sqrt());
        let (xd, yd) = displacement_for(0.35, 0.55, a1, 1.0);
        let (start, end, sd, ed) = anchors_for(xd, yd, 0.9);

        let fit = find_theta(start, end, sd, ed, None).unwrap();
        assert!((fit.theta1 + fit.theta2 - 0.9).abs() < 0.9 * 1e-3);
        let lhs = fit.a1 * fit.l1;
        let rhs = fit.a2 * fit.l2;
        assert!((lhs - rhs).abs() < 1e-3 * rhs.abs());
        assert!(fit.total_length() > 0.0);
    }

    #[test]
    fn test_find_theta_respects_initial_guess() {
        let phi = 0.8;
        let (xd, yd) = displacement_for(0.4, 0.4, 1.0, 1.0);
        let (start, end, sd, ed) = anchors_for(xd, yd, phi);

        let fit = find_theta(start, end, sd, ed, Some(0.3)).unwrap();
        assert!((fit.theta1 - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_find_theta_rejects_infeasible_chord() {
        // A perpendicular-ish displacement is unreachable with a tiny total
        // turning angle.
        let phi = 0.2f64;
        let start = Point3::ORIGIN;
        let end = Point3::new(0.1, 1.0, 0.0);
        let sd = Vec3::X;
        let ed = Vec3::new(-phi.cos(), -phi.sin(), 0.0);
        assert!(matches!(
            find_theta(start, end, sd, ed, None),
            Err(SolveError::Infeasible { .. })
        ));
    }

    #[test]
    fn test_find_theta_rejects_straight_line() {
        // Parallel tangents and a collinear displacement: no easement needed.
        let start = Point3::ORIGIN;
        let end = Point3::new(5.0, 0.0, 0.0);
        assert!(matches!(
            find_theta(start, end, Vec3::X, -Vec3::X, None),
            Err(SolveError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_find_theta_rejects_zero_direction() {
        assert!(matches!(
            find_theta(
                Point3::ORIGIN,
                Point3::new(1.0, 1.0, 0.0),
                Vec3::ZERO,
                Vec3::X,
                None
            ),
            Err(SolveError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_single_transition_unit_scale_pi_over_six() {
        // The classic normalized check: a = 1, theta = π/6. The rounded
        // literals are R ≈ 0.691, xp ≈ 0.704, yp ≈ 0.1238.
        let l = (PI / 6.0).sqrt();
        let r = 1.0 / (2.0 * l);
        let xp = fresnel_c(l).unwrap();
        let yp = fresnel_s(l).unwrap();
        assert!((r - 0.691).abs() < 1e-3);
        assert!((xp - 0.704).abs() < 1e-3);
        assert!((yp - 0.1238).abs() < 1e-3);

        let t = find_a_single_transition(r, xp, yp).unwrap();
        assert!((t.a - 1.0).abs() < 1e-3, "a = {}", t.a);
        assert!((t.theta - PI / 6.0).abs() < 2e-3, "theta = {}", t.theta);
    }

    #[test]
    fn test_single_transition_rejects_incompatible_radius() {
        // Point on a unit-scale spiral, radius that demands a different one.
        let l = (PI / 6.0).sqrt();
        let xp = fresnel_c(l).unwrap();
        let yp = fresnel_s(l).unwrap();
        let result = find_a_single_transition(10.0, xp, yp);
        assert!(matches!(result, Err(SolveError::Rejected { .. })), "{result:?}");
    }

    #[test]
    fn test_single_transition_rejects_degenerate_input() {
        assert!(matches!(
            find_a_single_transition(-1.0, 0.5, 0.1),
            Err(SolveError::Degenerate { .. })
        ));
        assert!(matches!(
            find_a_single_transition(1.0, 0.5, 0.0),
            Err(SolveError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_partial_transition_out_spiral_plus_arc() {
        // Construct: unit-scale spiral to curvature 1/0.5 (theta_s = 1),
        // then a 0.6 rad arc of radius 0.5.
        let r = 0.5;
        let l: f64 = 1.0;
        let theta_s = l * l;
        let qx = fresnel_c(l).unwrap();
        let qy = fresnel_s(l).unwrap();
        let (sin_t, cos_t) = theta_s.sin_cos();
        let cx = qx - r * sin_t;
        let cy = qy + r * cos_t;
        let sweep = 0.6f64;
        let (vx, vy) = (qx - cx, qy - cy);
        let xp = cx + vx * sweep.cos() - vy * sweep.sin();
        let yp = cy + vx * sweep.sin() + vy * sweep.cos();

        let fit = find_a_partial_transition_out(r, xp, yp).unwrap();
        assert!((fit.a - 1.0).abs() < 5e-3, "a = {}", fit.a);
        assert!((fit.theta - 1.6).abs() < 1e-2, "theta = {}", fit.theta);
        assert!(
            (fit.fraction_out - 1.0 / 1.6).abs() < 1e-2,
            "fraction_out = {}",
            fit.fraction_out
        );
    }

    #[test]
    fn test_partial_transition_out_huge_radius_is_full_transition() {
        // Target on a plain spiral of scale 2; the radius never binds.
        let l = 0.8f64;
        let xp = fresnel_c(l).unwrap() / 2.0;
        let yp = fresnel_s(l).unwrap() / 2.0;

        let fit = find_a_partial_transition_out(1e6, xp, yp).unwrap();
        assert!((fit.a - 2.0).abs() < 1e-6, "a = {}", fit.a);
        assert!((fit.theta - 0.64).abs() < 1e-6, "theta = {}", fit.theta);
        assert!((fit.fraction_out - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_transition_in_recovers_interior_point() {
        // Target at theta_p = 0.2 on a unit-scale spiral whose transition
        // completes at theta = 0.5.
        let l_p = 0.2f64.sqrt();
        let xp = fresnel_c(l_p).unwrap();
        let yp = fresnel_s(l_p).unwrap();
        let r = 1.0 / (2.0 * 0.5f64.sqrt());

        let fit = find_a_partial_transition_in(r, xp, yp).unwrap();
        assert!((fit.a - 1.0).abs() < 1e-4, "a = {}", fit.a);
        assert!((fit.theta - 0.5).abs() < 1e-3, "theta = {}", fit.theta);
        assert!(
            (fit.fraction_in - (0.2f64 / 0.5).sqrt()).abs() < 1e-3,
            "fraction_in = {}",
            fit.fraction_in
        );
    }

    #[test]
    fn test_partial_transition_in_rejects_point_past_radius_limit() {
        // Same interior point, but a radius so tight the transition would
        // complete before the point.
        let l_p = 0.2f64.sqrt();
        let xp = fresnel_c(l_p).unwrap();
        let yp = fresnel_s(l_p).unwrap();
        let r = 1.0 / (2.0 * 0.1f64.sqrt());

        assert!(matches!(
            find_a_partial_transition_in(r, xp, yp),
            Err(SolveError::Rejected { .. })
        ));
    }

    #[test]
    fn test_single_partial_transition_between_radii() {
        // Unit-scale segment from curvature 1/2 (l = 0.25) to 1/0.5 (l = 1).
        let l1 = 0.25f64;
        let l2 = 1.0f64;
        let dx = fresnel_c(l2).unwrap() - fresnel_c(l1).unwrap();
        let dy = fresnel_s(l2).unwrap() - fresnel_s(l1).unwrap();
        let dist = (dx * dx + dy * dy).sqrt();

        let fit = find_a_single_partial_transition(dist, 0.5, 2.0).unwrap();
        assert!((fit.a - 1.0).abs() < 1e-6, "a = {}", fit.a);
        assert!((fit.theta - 0.9375).abs() < 1e-6, "theta = {}", fit.theta);
        assert!((fit.fraction - 0.75).abs() < 1e-6, "fraction = {}", fit.fraction);
    }

    #[test]
    fn test_single_partial_transition_rejects_bad_radii() {
        assert!(matches!(
            find_a_single_partial_transition(1.0, 2.0, 0.5),
            Err(SolveError::Degenerate { .. })
        ));
        assert!(matches!(
            find_a_single_partial_transition(0.0, 0.5, 2.0),
            Err(SolveError::Degenerate { .. })
        ));
    }
}
