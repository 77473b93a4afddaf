//! Vertex bending: map a straight reference mesh onto a solved spiral pair.
//!
//! The bend is a closed-form per-vertex transform, not a per-vertex solve.
//! [`BendProperties::solve`] fixes the half-turning angle and the spiral
//! scale once from the reference end vector and the desired target vector;
//! every vertex is then projected onto the straight axis, classified into
//! the first or second spiral half, mapped through that half's position
//! formula, and its lateral offset is rotated by the local tangent angle
//! (Rodrigues' rotation about the bend-plane normal).
//!
//! The same transform drives three entry points:
//!
//! - [`bend_mesh`]: deform a full track mesh (UVs and topology unchanged).
//! - [`bend_points`]: deform an arbitrary point array in the straight pose.
//! - [`bend_arc_points`]: evaluate the curve itself at arc-length positions,
//!   the form rail sampling and shape finalization consume.

use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fresnel::{FresnelError, fresnel_c, fresnel_s};
use super::mesh::TrackMesh;
use super::{Point3, Tolerance, Vec3};

/// Errors from the bending operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BendError {
    /// The input mesh violates its invariants.
    #[error("mesh is invalid: {reason}")]
    InvalidMesh { reason: String },

    /// The straight reference axis (fixed point to movable end) is
    /// zero-length or non-finite.
    #[error("bend reference axis is degenerate")]
    DegenerateAxis,

    /// The target displacement is zero-length or non-finite.
    #[error("bend target displacement is degenerate")]
    DegenerateTarget,

    /// The turning angle is too close to a half turn for the endpoint
    /// formula to produce a usable scale.
    #[error("bend turning angle {theta} rad is outside the supported range")]
    AngleOutOfRange { theta: f64 },

    /// A Fresnel evaluation left the trusted series range.
    #[error(transparent)]
    Fresnel(#[from] FresnelError),
}

/// Per-operation diagnostics for a bend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BendDiagnostics {
    /// Number of vertices transformed.
    pub vertex_count: usize,
    /// Physical arc length of the bent curve.
    pub bent_length: f64,
    /// Largest vertex displacement introduced by the bend.
    pub max_displacement: f64,
    /// Warnings generated during the operation.
    pub warnings: Vec<String>,
}

/// The solved shape of a bend: half-turning angle, normalized half length,
/// and the spiral scale matching the target vector's magnitude.
///
/// For a straight target (`theta ≈ 0`) no spiral exists; `scale` then holds
/// the axial compression ratio (reference length over target length) and
/// `normalized_length` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BendProperties {
    /// Spiral scale factor (inverse length), or the axial compression ratio
    /// in the straight case.
    pub scale: f64,
    /// Normalized arc length of each spiral half, `sqrt(theta)`.
    pub normalized_length: f64,
    /// Turning angle of each spiral half (radians); the full bend turns by
    /// twice this.
    pub theta: f64,
}

impl BendProperties {
    /// Solve the bend shape from the straight end vector and the target end
    /// vector, both relative to the fixed pivot.
    ///
    /// The scale comes from matching the target magnitude against the
    /// closed-form endpoint of a unit-scale symmetric spiral pair,
    /// `2·(C(L)·cos θ + S(L)·sin θ)` along the chord. The along-axis
    /// component is the primary match; when it vanishes (quarter-turn
    /// halves) the perpendicular component is used instead.
    ///
    /// # Errors
    /// [`BendError::DegenerateAxis`] / [`BendError::DegenerateTarget`] for
    /// zero-length inputs, [`BendError::AngleOutOfRange`] when the turning
    /// angle defeats the endpoint formula.
    pub fn solve(movable_end: Vec3, target: Vec3) -> Result<Self, BendError> {
        let axis_length = movable_end.length();
        let target_length = target.length();
        if !movable_end.is_finite() || axis_length <= Tolerance::ZERO_LENGTH.eps {
            return Err(BendError::DegenerateAxis);
        }
        if !target.is_finite() || target_length <= Tolerance::ZERO_LENGTH.eps {
            return Err(BendError::DegenerateTarget);
        }

        let cos_theta = (movable_end.dot(target) / (axis_length * target_length)).clamp(-1.0, 1.0);
        let theta = cos_theta.acos();

        if theta <= Tolerance::ANGLE.eps {
            // Straight target: no rotation axis exists, fall back to a pure
            // axial rescale.
            return Ok(Self {
                scale: axis_length / target_length,
                normalized_length: 0.0,
                theta: 0.0,
            });
        }
        if theta >= PI - Tolerance::ANGLE.eps {
            return Err(BendError::AngleOutOfRange { theta });
        }

        let l = theta.sqrt();
        let c = fresnel_c(l)?;
        let s = fresnel_s(l)?;
        let (sin_t, cos_t) = theta.sin_cos();
        let chord_unit = c * cos_t + s * sin_t;
        let x_unit = 2.0 * cos_t * chord_unit;

        let scale = if x_unit.abs() > Tolerance::ZERO_LENGTH.eps {
            x_unit / (target_length * cos_t)
        } else {
            2.0 * sin_t * chord_unit / (target_length * sin_t)
        };
        if !(scale.is_finite() && scale > 0.0) {
            return Err(BendError::AngleOutOfRange { theta });
        }

        Ok(Self {
            scale,
            normalized_length: l,
            theta,
        })
    }

    /// Whether the bend degenerates to a straight rescale.
    #[must_use]
    pub fn is_straight(&self) -> bool {
        self.theta <= Tolerance::ANGLE.eps
    }

    /// Physical arc length of the bent curve for a given reference axis
    /// length.
    #[must_use]
    pub fn bent_length(&self, axis_length: f64) -> f64 {
        if self.is_straight() {
            axis_length / self.scale
        } else {
            2.0 * self.normalized_length / self.scale
        }
    }
}

/// Rodrigues' rotation of `v` about a unit `axis` by `angle`.
fn rotate_about_axis(v: Vec3, axis: Vec3, angle: f64) -> Vec3 {
    let (sin_a, cos_a) = angle.sin_cos();
    v * cos_a + axis.cross(v) * sin_a + axis * (axis.dot(v) * (1.0 - cos_a))
}

/// The fully-resolved bend: pivot, frame axes, solved properties, and the
/// endpoint of the curve in frame coordinates.
struct BendFrame {
    fixed: Point3,
    axis_dir: Vec3,
    lateral_dir: Vec3,
    plane_normal: Vec3,
    target_dir: Vec3,
    axis_length: f64,
    props: BendProperties,
    end_x: f64,
    end_y: f64,
    phi: f64,
}

impl BendFrame {
    fn new(fixed: Point3, movable_end: Point3, target: Point3) -> Result<Self, BendError> {
        let axis_vec = movable_end - fixed;
        let target_vec = target - fixed;
        let props = BendProperties::solve(axis_vec, target_vec)?;
        let axis_dir = axis_vec.normalized().ok_or(BendError::DegenerateAxis)?;
        let target_dir = target_vec.normalized().ok_or(BendError::DegenerateTarget)?;
        let axis_length = axis_vec.length();
        let target_length = target_vec.length();

        if props.is_straight() {
            return Ok(Self {
                fixed,
                axis_dir,
                lateral_dir: Vec3::ZERO,
                plane_normal: Vec3::ZERO,
                target_dir,
                axis_length,
                props,
                end_x: target_length,
                end_y: 0.0,
                phi: 0.0,
            });
        }

        let plane_normal = axis_dir
            .cross(target_dir)
            .normalized()
            .ok_or(BendError::DegenerateTarget)?;
        let lateral_dir = plane_normal.cross(axis_dir);
        let (sin_t, cos_t) = props.theta.sin_cos();

        Ok(Self {
            fixed,
            axis_dir,
            lateral_dir,
            plane_normal,
            target_dir,
            axis_length,
            props,
            end_x: target_length * cos_t,
            end_y: target_length * sin_t,
            phi: 2.0 * props.theta,
        })
    }

    /// Curve position and tangent angle at normalized parameter `l`, in
    /// frame coordinates. The first half is the spiral itself; the second
    /// half is the mirrored spiral walked backward from the endpoint.
    fn curve_position(&self, l: f64) -> Result<(f64, f64, f64), BendError> {
        let ln = self.props.normalized_length;
        let a = self.props.scale;
        if l <= ln {
            Ok((fresnel_c(l)? / a, fresnel_s(l)? / a, l * l))
        } else {
            let m = 2.0 * ln - l;
            let (sin_phi, cos_phi) = self.phi.sin_cos();
            let cm = fresnel_c(m)?;
            let sm = fresnel_s(m)?;
            let x = self.end_x - (cm * cos_phi + sm * sin_phi) / a;
            let y = self.end_y - (cm * sin_phi - sm * cos_phi) / a;
            Ok((x, y, self.phi - m * m))
        }
    }

    /// Map a point from the straight reference pose onto the bent curve.
    fn apply(&self, p: Point3) -> Result<Point3, BendError> {
        let rel = p - self.fixed;
        let proj = rel.dot(self.axis_dir);
        let off = rel - self.axis_dir * proj;

        if self.props.is_straight() {
            return Ok(self.fixed + self.target_dir * (proj / self.props.scale) + off);
        }

        let l = (proj / self.axis_length) * (2.0 * self.props.normalized_length);
        let (px, py, psi) = self.curve_position(l)?;
        Ok(self.fixed
            + self.axis_dir * px
            + self.lateral_dir * py
            + rotate_about_axis(off, self.plane_normal, psi))
    }

    /// Normalized parameter at a physical arc length along the curve. Both
    /// halves share the scale, so the mapping is linear across the join.
    fn parameter_at_arc_length(&self, s: f64) -> f64 {
        s * self.props.scale
    }

    /// Point on the bent curve itself (no lateral offset) at arc length `s`.
    fn point_at_arc_length(&self, s: f64) -> Result<Point3, BendError> {
        if self.props.is_straight() {
            return Ok(self.fixed + self.target_dir * s);
        }
        let (px, py, _) = self.curve_position(self.parameter_at_arc_length(s))?;
        Ok(self.fixed + self.axis_dir * px + self.lateral_dir * py)
    }
}

/// Bend a straight track mesh onto the spiral pair reaching the target.
///
/// `fixed_position` is the pivot that stays put, `movable_end_position` the
/// straight reference end, `target_position` where that end must land. UVs
/// and triangle topology pass through unchanged; only positions move.
///
/// # Errors
/// [`BendError::InvalidMesh`] when the mesh breaks its invariants, plus the
/// shape errors from [`BendProperties::solve`].
pub fn bend_mesh(
    mesh: &TrackMesh,
    fixed_position: Point3,
    movable_end_position: Point3,
    target_position: Point3,
) -> Result<(TrackMesh, BendDiagnostics), BendError> {
    mesh.validate()
        .map_err(|reason| BendError::InvalidMesh { reason })?;
    let frame = BendFrame::new(fixed_position, movable_end_position, target_position)?;

    let mut positions = Vec::with_capacity(mesh.positions.len());
    let mut max_displacement = 0.0f64;
    for pos in &mesh.positions {
        let p = Point3::from_array(*pos);
        let bent = frame.apply(p)?;
        max_displacement = max_displacement.max(bent.distance_to(p));
        positions.push(bent.to_array());
    }

    let bent_length = frame.props.bent_length(frame.axis_length);
    debug!(
        "bend_mesh: {} vertices, turn {:.4} rad, length {:.4}",
        positions.len(),
        frame.phi,
        bent_length
    );

    let diagnostics = BendDiagnostics {
        vertex_count: positions.len(),
        bent_length,
        max_displacement,
        warnings: Vec::new(),
    };
    Ok((
        TrackMesh::new(positions, mesh.uvs.clone(), mesh.indices.clone()),
        diagnostics,
    ))
}

/// Apply the bend transform to an arbitrary point array in the straight
/// reference pose.
///
/// # Errors
/// Shape errors from [`BendProperties::solve`]; Fresnel range errors for
/// points far outside the reference segment.
pub fn bend_points(
    points: &[Point3],
    fixed_position: Point3,
    movable_end_position: Point3,
    target_position: Point3,
) -> Result<Vec<Point3>, BendError> {
    let frame = BendFrame::new(fixed_position, movable_end_position, target_position)?;
    points.iter().map(|&p| frame.apply(p)).collect()
}

/// Evaluate the bent curve at the given arc-length positions.
///
/// This is the rail-generation path: feed it the output of the rail
/// sampler and it returns the 3-D points terrain matching and collision
/// placement consume.
///
/// # Errors
/// Shape errors from [`BendProperties::solve`].
pub fn bend_arc_points(
    arc_positions: &[f64],
    fixed_position: Point3,
    movable_end_position: Point3,
    target_position: Point3,
) -> Result<Vec<Point3>, BendError> {
    let frame = BendFrame::new(fixed_position, movable_end_position, target_position)?;
    arc_positions
        .iter()
        .map(|&s| frame.point_at_arc_length(s))
        .collect()
}
