//! Vertex cropping: clip a track mesh against an axis-aligned box.
//!
//! Used to truncate a track section's tail model when its length shrinks.
//! Each triangle is handled by how many of its vertices sit inside the box:
//!
//! - **3 inside**: kept unchanged.
//! - **2 inside**: the outside vertex is moved toward each inside vertex
//!   independently, turning the triangle into a quad (two triangles).
//! - **1 inside**: both outside vertices are moved toward the inside one,
//!   keeping a single triangle.
//! - **0 inside**: the triangle may still overlap the box through its edges;
//!   one crossing edge yields a corner-snapped triangle, two yield a quad,
//!   anything else drops the triangle.
//!
//! Moved vertices interpolate their UVs by the same ratio as their
//! positions, original winding is preserved, and a vertex moved toward the
//! same neighbor from several triangles is created once and reused.

use log::debug;
use thiserror::Error;

use super::mesh::TrackMesh;
use super::{BBox, Point3, Tolerance};

/// Triangle edges in cyclic order.
const TRIANGLE_EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];

/// Errors from the cropping operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CropError {
    /// The input mesh violates its invariants; a caller contract breach.
    #[error("mesh violates its invariants: {reason}")]
    InvalidMesh { reason: String },

    /// The crop box is non-finite or inverted.
    #[error("crop bounds are degenerate or non-finite")]
    InvalidBounds,
}

/// Per-operation diagnostics for a crop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CropDiagnostics {
    /// Number of vertices in the input mesh.
    pub input_vertex_count: usize,
    /// Number of triangles in the input mesh.
    pub input_triangle_count: usize,
    /// Number of vertices in the result.
    pub output_vertex_count: usize,
    /// Number of triangles in the result.
    pub output_triangle_count: usize,
    /// Triangles kept unchanged (all vertices inside).
    pub kept_triangle_count: usize,
    /// Triangles re-cut against the box.
    pub clipped_triangle_count: usize,
    /// Triangles discarded entirely.
    pub dropped_triangle_count: usize,
    /// Moved vertices served from the per-vertex replacement cache instead
    /// of being created again.
    pub reused_moved_vertex_count: usize,
    /// Warnings generated during the operation.
    pub warnings: Vec<String>,
}

/// Clip `mesh` against `bounds`.
///
/// Every output vertex lies inside the box. Vertices of fully-inside
/// triangles keep their positions and UVs bit-for-bit; vertices created on
/// the boundary interpolate both. A box whose smallest extent is at or
/// below [`Tolerance::DEGENERATE_EXTENT`] discards the whole mesh (empty
/// output plus a warning) instead of attempting an unstable clip.
///
/// # Errors
/// [`CropError::InvalidMesh`] when the mesh breaks its invariants,
/// [`CropError::InvalidBounds`] for a non-finite or inverted box.
pub fn crop_mesh(mesh: &TrackMesh, bounds: BBox) -> Result<(TrackMesh, CropDiagnostics), CropError> {
    mesh.validate()
        .map_err(|reason| CropError::InvalidMesh { reason })?;
    if !bounds.is_finite()
        || bounds.min.x > bounds.max.x
        || bounds.min.y > bounds.max.y
        || bounds.min.z > bounds.max.z
    {
        return Err(CropError::InvalidBounds);
    }

    let mut diagnostics = CropDiagnostics {
        input_vertex_count: mesh.vertex_count(),
        input_triangle_count: mesh.triangle_count(),
        ..Default::default()
    };

    if bounds.min_extent() <= Tolerance::DEGENERATE_EXTENT.eps {
        diagnostics.dropped_triangle_count = mesh.triangle_count();
        diagnostics
            .warnings
            .push("crop box below the degenerate-extent threshold; mesh discarded".to_string());
        return Ok((TrackMesh::empty(), diagnostics));
    }

    let mut builder = CropBuilder::new(mesh, bounds);
    for tri in mesh.indices.chunks_exact(3) {
        builder.clip_triangle([tri[0], tri[1], tri[2]], &mut diagnostics);
    }

    let result = TrackMesh::new(builder.positions, builder.uvs, builder.indices);
    diagnostics.output_vertex_count = result.vertex_count();
    diagnostics.output_triangle_count = result.triangle_count();
    diagnostics.reused_moved_vertex_count = builder.reused;
    debug!(
        "crop_mesh: {} -> {} triangles ({} kept, {} clipped, {} dropped)",
        diagnostics.input_triangle_count,
        diagnostics.output_triangle_count,
        diagnostics.kept_triangle_count,
        diagnostics.clipped_triangle_count,
        diagnostics.dropped_triangle_count
    );
    Ok((result, diagnostics))
}

struct CropBuilder<'a> {
    mesh: &'a TrackMesh,
    bounds: BBox,
    positions: Vec<[f64; 3]>,
    uvs: Vec<[f64; 2]>,
    indices: Vec<u32>,
    /// Output index assigned to each kept original vertex, on first use.
    original_map: Vec<Option<u32>>,
    /// Per-original-vertex list of already-created replacements, keyed by
    /// the vertex they were moved toward.
    moved: Vec<Vec<(u32, u32)>>,
    reused: usize,
}

impl<'a> CropBuilder<'a> {
    fn new(mesh: &'a TrackMesh, bounds: BBox) -> Self {
        Self {
            mesh,
            bounds,
            positions: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            original_map: vec![None; mesh.vertex_count()],
            moved: vec![Vec::new(); mesh.vertex_count()],
            reused: 0,
        }
    }

    fn push_vertex(&mut self, pos: [f64; 3], uv: [f64; 2]) -> u32 {
        let idx = self.positions.len() as u32;
        self.positions.push(pos);
        self.uvs.push(uv);
        idx
    }

    /// Output index of an original (inside) vertex, copying it on first use.
    fn map_original(&mut self, i: u32) -> u32 {
        if let Some(idx) = self.original_map[i as usize] {
            return idx;
        }
        let idx = self.push_vertex(
            self.mesh.positions[i as usize],
            self.mesh.uvs[i as usize],
        );
        self.original_map[i as usize] = Some(idx);
        idx
    }

    /// Output index of `outside` moved toward `towards` onto the box
    /// boundary, reusing an earlier move along the same edge when present.
    fn moved_vert(&mut self, outside: u32, towards: u32) -> u32 {
        if let Some(idx) = self.moved[outside as usize]
            .iter()
            .find(|entry| entry.0 == towards)
            .map(|entry| entry.1)
        {
            self.reused += 1;
            return idx;
        }

        let old = Point3::from_array(self.mesh.positions[outside as usize]);
        let tow = Point3::from_array(self.mesh.positions[towards as usize]);
        let mut ratio = kept_ratio(self.bounds, tow, old);
        let mut moved = tow.lerp(old, ratio);
        if !self.bounds.contains_point(moved) {
            // Floating-point error left the vertex marginally outside.
            ratio = (ratio - Tolerance::BOUNDS_FUDGE.eps).clamp(0.0, 1.0);
            moved = tow.lerp(old, ratio);
        }

        let uv = lerp_uv(
            self.mesh.uvs[towards as usize],
            self.mesh.uvs[outside as usize],
            ratio,
        );
        let idx = self.push_vertex(moved.to_array(), uv);
        self.moved[outside as usize].push((towards, idx));
        idx
    }

    fn clip_triangle(&mut self, tri: [u32; 3], diag: &mut CropDiagnostics) {
        let pts = [
            Point3::from_array(self.mesh.positions[tri[0] as usize]),
            Point3::from_array(self.mesh.positions[tri[1] as usize]),
            Point3::from_array(self.mesh.positions[tri[2] as usize]),
        ];
        let inside = [
            self.bounds.contains_point(pts[0]),
            self.bounds.contains_point(pts[1]),
            self.bounds.contains_point(pts[2]),
        ];
        let inside_count = inside.iter().filter(|&&flag| flag).count();

        match inside_count {
            3 => {
                let mapped = [
                    self.map_original(tri[0]),
                    self.map_original(tri[1]),
                    self.map_original(tri[2]),
                ];
                self.indices.extend_from_slice(&mapped);
                diag.kept_triangle_count += 1;
            }
            2 => {
                // Rotate the outside vertex to the front; the cyclic order
                // keeps the winding.
                let Some(k) = (0..3).find(|&i| !inside[i]) else {
                    return;
                };
                let c = tri[k];
                let a = tri[(k + 1) % 3];
                let b = tri[(k + 2) % 3];
                let c_a = self.moved_vert(c, a);
                let c_b = self.moved_vert(c, b);
                let a_out = self.map_original(a);
                let b_out = self.map_original(b);
                self.indices.extend_from_slice(&[c_a, a_out, b_out]);
                self.indices.extend_from_slice(&[c_a, b_out, c_b]);
                diag.clipped_triangle_count += 1;
            }
            1 => {
                let Some(k) = (0..3).find(|&i| inside[i]) else {
                    return;
                };
                let a = tri[k];
                let b = tri[(k + 1) % 3];
                let c = tri[(k + 2) % 3];
                let a_out = self.map_original(a);
                let b_a = self.moved_vert(b, a);
                let c_a = self.moved_vert(c, a);
                self.indices.extend_from_slice(&[a_out, b_a, c_a]);
                diag.clipped_triangle_count += 1;
            }
            _ => self.clip_outside_triangle(tri, pts, diag),
        }
    }

    /// A triangle with no vertices inside may still overlap the box.
    fn clip_outside_triangle(
        &mut self,
        tri: [u32; 3],
        pts: [Point3; 3],
        diag: &mut CropDiagnostics,
    ) {
        let uvs = [
            self.mesh.uvs[tri[0] as usize],
            self.mesh.uvs[tri[1] as usize],
            self.mesh.uvs[tri[2] as usize],
        ];

        let mut crossings: Vec<(usize, f64, f64)> = Vec::new();
        for (edge, &(i, j)) in TRIANGLE_EDGES.iter().enumerate() {
            if let Some((t0, t1)) = clip_segment(self.bounds, pts[i], pts[j]) {
                crossings.push((edge, t0, t1));
            }
        }

        match crossings.len() {
            1 => {
                let (edge, t0, t1) = crossings[0];
                let (i, j) = TRIANGLE_EDGES[edge];
                let q0 = pts[i].lerp(pts[j], t0);
                let q1 = pts[i].lerp(pts[j], t1);
                let uv0 = lerp_uv(uvs[i], uvs[j], t0);
                let uv1 = lerp_uv(uvs[i], uvs[j], t1);

                let Some((corner, corner_uv)) = snap_corner(self.bounds, pts, uvs) else {
                    diag.dropped_triangle_count += 1;
                    return;
                };

                let i0 = self.push_vertex(q0.to_array(), uv0);
                let i1 = self.push_vertex(q1.to_array(), uv1);
                let ic = self.push_vertex(corner.to_array(), corner_uv);

                let original_normal = (pts[1] - pts[0]).cross(pts[2] - pts[0]);
                let clipped_normal = (q1 - q0).cross(corner - q0);
                if clipped_normal.dot(original_normal) >= 0.0 {
                    self.indices.extend_from_slice(&[i0, i1, ic]);
                } else {
                    self.indices.extend_from_slice(&[i0, ic, i1]);
                }
                diag.clipped_triangle_count += 1;
            }
            2 => {
                // Two crossing edges bound a quad; walking the crossings in
                // boundary order keeps the winding.
                let (edge_a, a0, a1) = crossings[0];
                let (edge_b, b0, b1) = crossings[1];
                let (ia, ja) = TRIANGLE_EDGES[edge_a];
                let (ib, jb) = TRIANGLE_EDGES[edge_b];

                let v0 = self.push_vertex(
                    pts[ia].lerp(pts[ja], a0).to_array(),
                    lerp_uv(uvs[ia], uvs[ja], a0),
                );
                let v1 = self.push_vertex(
                    pts[ia].lerp(pts[ja], a1).to_array(),
                    lerp_uv(uvs[ia], uvs[ja], a1),
                );
                let v2 = self.push_vertex(
                    pts[ib].lerp(pts[jb], b0).to_array(),
                    lerp_uv(uvs[ib], uvs[jb], b0),
                );
                let v3 = self.push_vertex(
                    pts[ib].lerp(pts[jb], b1).to_array(),
                    lerp_uv(uvs[ib], uvs[jb], b1),
                );

                self.indices.extend_from_slice(&[v0, v1, v2]);
                self.indices.extend_from_slice(&[v0, v2, v3]);
                diag.clipped_triangle_count += 1;
            }
            _ => diag.dropped_triangle_count += 1,
        }
    }
}

/// Largest kept fraction of the `towards -> old` direction that stays
/// inside the box on every axis; the tightest axis binds.
fn kept_ratio(bounds: BBox, towards: Point3, old: Point3) -> f64 {
    let t = towards.to_array();
    let o = old.to_array();
    let min = bounds.min.to_array();
    let max = bounds.max.to_array();

    let mut ratio: f64 = 1.0;
    for axis in 0..3 {
        let axis_ratio = if o[axis] > max[axis] {
            (max[axis] - t[axis]) / (o[axis] - t[axis])
        } else if o[axis] < min[axis] {
            (min[axis] - t[axis]) / (o[axis] - t[axis])
        } else {
            1.0
        };
        ratio = ratio.min(axis_ratio);
    }
    ratio.clamp(0.0, 1.0)
}

fn lerp_uv(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// Clip the segment `p -> q` against the box (slab method). Returns the
/// parameter interval of the part inside, or `None` when the overlap is
/// empty or degenerate.
fn clip_segment(bounds: BBox, p: Point3, q: Point3) -> Option<(f64, f64)> {
    let p = p.to_array();
    let q = q.to_array();
    let min = bounds.min.to_array();
    let max = bounds.max.to_array();

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for axis in 0..3 {
        let d = q[axis] - p[axis];
        if d.abs() <= Tolerance::ZERO_LENGTH.eps {
            if p[axis] < min[axis] || p[axis] > max[axis] {
                return None;
            }
        } else {
            let ta = (min[axis] - p[axis]) / d;
            let tb = (max[axis] - p[axis]) / d;
            let (lo, hi) = if ta <= tb { (ta, tb) } else { (tb, ta) };
            t0 = t0.max(lo);
            t1 = t1.min(hi);
            if t0 > t1 {
                return None;
            }
        }
    }
    (t1 - t0 > Tolerance::DEFAULT.eps).then_some((t0, t1))
}

/// Pick the box corner that lies inside the triangle (in the triangle's
/// edge basis) closest to its plane, with the UV that basis implies.
///
/// The corner is expressed as `corner = v0 + s·(v1-v0) + t·(v2-v0)` by a
/// two-unknown linear solve over the triangle's two dominant axes; `s` and
/// `t` then interpolate the UV.
fn snap_corner(
    bounds: BBox,
    pts: [Point3; 3],
    uvs: [[f64; 2]; 3],
) -> Option<(Point3, [f64; 2])> {
    let e1 = pts[1] - pts[0];
    let e2 = pts[2] - pts[0];
    let normal = e1.cross(e2);
    let n_len = normal.length();
    if n_len <= Tolerance::ZERO_LENGTH.eps {
        return None;
    }

    let n_arr = normal.to_array();
    let abs = [n_arr[0].abs(), n_arr[1].abs(), n_arr[2].abs()];
    let drop_axis = if abs[0] >= abs[1] && abs[0] >= abs[2] {
        0
    } else if abs[1] >= abs[2] {
        1
    } else {
        2
    };
    let u = (drop_axis + 1) % 3;
    let v = (drop_axis + 2) % 3;

    let e1a = e1.to_array();
    let e2a = e2.to_array();
    let det = e1a[u] * e2a[v] - e1a[v] * e2a[u];
    if det.abs() <= Tolerance::ZERO_LENGTH.eps {
        return None;
    }

    let mut best: Option<(f64, Point3, [f64; 2])> = None;
    for corner in bounds.corners() {
        let d = corner - pts[0];
        let da = d.to_array();
        let s = (da[u] * e2a[v] - da[v] * e2a[u]) / det;
        let t = (e1a[u] * da[v] - e1a[v] * da[u]) / det;
        if s < -1e-6 || t < -1e-6 || s + t > 1.0 + 1e-6 {
            continue;
        }
        let dist = (d.dot(normal) / n_len).abs();
        if best.as_ref().map_or(true, |(best_dist, _, _)| dist < *best_dist) {
            let uv = [
                uvs[0][0] + s * (uvs[1][0] - uvs[0][0]) + t * (uvs[2][0] - uvs[0][0]),
                uvs[0][1] + s * (uvs[1][1] - uvs[0][1]) + t * (uvs[2][1] - uvs[0][1]),
            ];
            best = Some((dist, corner, uv));
        }
    }
    best.map(|(_, corner, uv)| (corner, uv))
}
