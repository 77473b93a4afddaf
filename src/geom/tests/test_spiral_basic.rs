//! Cross-checks of the transition solvers: round-trip consistency of the
//! fitted parameters and reconstruction of the anchor displacement.

use crate::geom::{Point3, SolveError, Vec3, find_theta, fresnel_c, fresnel_s};

fn symmetric_anchors(phi: f64) -> (Point3, Point3, Vec3, Vec3) {
    let theta = 0.5 * phi;
    let l = theta.sqrt();
    let c = fresnel_c(l).unwrap();
    let s = fresnel_s(l).unwrap();
    let chord = 2.0 * (c * theta.cos() + s * theta.sin());
    let end = Point3::new(chord * theta.cos(), chord * theta.sin(), 0.0);
    let end_dir = Vec3::new(-phi.cos(), -phi.sin(), 0.0);
    (Point3::ORIGIN, end, Vec3::X, end_dir)
}

#[test]
fn symmetric_fits_split_phi_evenly_across_angles() {
    for phi in [0.2, 0.5, 0.8, 1.2, 1.6] {
        let (start, end, sd, ed) = symmetric_anchors(phi);
        let fit = find_theta(start, end, sd, ed, None).unwrap();
        assert!(
            (fit.theta1 - fit.theta2).abs() < 1e-6 * phi,
            "phi = {phi}: theta1 = {}, theta2 = {}",
            fit.theta1,
            fit.theta2
        );
        assert!((fit.theta1 - 0.5 * phi).abs() < 1e-6 * phi);
    }
}

#[test]
fn fits_satisfy_continuity_invariants() {
    for phi in [0.3, 0.7, 1.1, 1.5] {
        let (start, end, sd, ed) = symmetric_anchors(phi);
        let fit = find_theta(start, end, sd, ed, None).unwrap();

        // theta1 + theta2 == phi within 0.1%.
        assert!((fit.phi() - phi).abs() < 1e-3 * phi);
        // a1 * l1 == a2 * l2 within 0.1% (curvature continuity).
        let lhs = fit.a1 * fit.l1;
        let rhs = fit.a2 * fit.l2;
        assert!((lhs - rhs).abs() < 1e-3 * rhs);
        // l == sqrt(theta) by construction.
        assert!((fit.l1 - fit.theta1.sqrt()).abs() < 1e-12);
        assert!((fit.l2 - fit.theta2.sqrt()).abs() < 1e-12);
    }
}

#[test]
fn fit_reconstructs_anchor_displacement() {
    let (start, end, sd, ed) = symmetric_anchors(0.9);
    let fit = find_theta(start, end, sd, ed, None).unwrap();

    // Walk the displacement formula forward with the fitted parameters.
    let phi = fit.phi();
    let c1 = fresnel_c(fit.l1).unwrap();
    let s1 = fresnel_s(fit.l1).unwrap();
    let c2 = fresnel_c(fit.l2).unwrap();
    let s2 = fresnel_s(fit.l2).unwrap();
    let xd = c1 / fit.a1 + (c2 * phi.cos() + s2 * phi.sin()) / fit.a2;
    let yd = s1 / fit.a1 + (c2 * phi.sin() - s2 * phi.cos()) / fit.a2;

    assert!((xd - end.x).abs() < 1e-6 * end.x.abs());
    assert!((yd - end.y).abs() < 1e-6 * end.y.abs());
}

#[test]
fn chord_angles_outside_the_feasible_band_are_rejected() {
    let phi = 0.6f64;
    let end_dir = Vec3::new(-phi.cos(), -phi.sin(), 0.0);

    // Almost no lateral displacement: below the lower chord-angle limit.
    let flat = Point3::new(1.0, 1e-4, 0.0);
    assert!(matches!(
        find_theta(Point3::ORIGIN, flat, Vec3::X, end_dir, None),
        Err(SolveError::Infeasible { .. })
    ));

    // Mostly lateral displacement: above the upper limit.
    let steep = Point3::new(0.2, 1.0, 0.0);
    assert!(matches!(
        find_theta(Point3::ORIGIN, steep, Vec3::X, end_dir, None),
        Err(SolveError::Infeasible { .. })
    ));
}

#[test]
fn out_of_plane_anchors_use_the_perpendicular_magnitude() {
    // The same symmetric fit, with the bend plane tilted into y-z: the
    // solver works on (xd, |perp|), so the fit parameters are unchanged.
    let phi = 0.8f64;
    let (_, end, _, _) = symmetric_anchors(phi);
    let tilted_end = Point3::new(end.x, 0.0, end.y);
    let tilted_end_dir = Vec3::new(-phi.cos(), 0.0, -phi.sin());

    let fit = find_theta(Point3::ORIGIN, tilted_end, Vec3::X, tilted_end_dir, None).unwrap();
    assert!((fit.theta1 - 0.4).abs() < 1e-6);
    assert!((fit.theta2 - 0.4).abs() < 1e-6);
}
