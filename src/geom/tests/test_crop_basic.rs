//! Cropping whole track strips: containment, UV stability, and topology
//! across many triangles at once.

use crate::geom::{BBox, Point3, TrackMesh, Vec3, crop_mesh};

/// A flat grid in the x-y plane, `nx` by `ny` quads over [0,2]x[0,2].
fn grid_mesh(nx: usize, ny: usize) -> TrackMesh {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut indices = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            let u = i as f64 / nx as f64;
            let v = j as f64 / ny as f64;
            positions.push([2.0 * u, 2.0 * v, 0.0]);
            uvs.push([u, v]);
        }
    }
    let stride = (nx + 1) as u32;
    for j in 0..ny as u32 {
        for i in 0..nx as u32 {
            let a = j * stride + i;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, b, d]);
            indices.extend_from_slice(&[a, d, c]);
        }
    }
    TrackMesh::new(positions, uvs, indices)
}

fn assert_contained(mesh: &TrackMesh, bounds: BBox, slack: f64) {
    for p in &mesh.positions {
        assert!(
            p[0] >= bounds.min.x - slack
                && p[0] <= bounds.max.x + slack
                && p[1] >= bounds.min.y - slack
                && p[1] <= bounds.max.y + slack
                && p[2] >= bounds.min.z - slack
                && p[2] <= bounds.max.z + slack,
            "vertex {p:?} outside {bounds:?}"
        );
    }
}

#[test]
fn grid_cropped_to_half_stays_contained() {
    let mesh = grid_mesh(8, 8);
    let bounds = BBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(1.0, 1.0, 0.5));
    let (out, diag) = crop_mesh(&mesh, bounds).unwrap();

    assert!(!out.is_empty());
    assert!(out.validate().is_ok());
    assert_contained(&out, bounds, 1e-4);
    assert_eq!(
        diag.kept_triangle_count + diag.clipped_triangle_count + diag.dropped_triangle_count,
        mesh.triangle_count()
    );
    assert_eq!(diag.output_vertex_count, out.vertex_count());
    assert_eq!(diag.output_triangle_count, out.triangle_count());
}

#[test]
fn interior_vertices_keep_positions_and_uvs_bitwise() {
    let mesh = grid_mesh(8, 8);
    let bounds = BBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(1.0, 1.0, 0.5));
    let (out, _) = crop_mesh(&mesh, bounds).unwrap();

    // Every input vertex strictly inside the box must appear in the output
    // with identical position and UV.
    for (pos, uv) in mesh.positions.iter().zip(mesh.uvs.iter()) {
        if pos[0] < 1.0 && pos[1] < 1.0 {
            let found = out
                .positions
                .iter()
                .zip(out.uvs.iter())
                .any(|(p, q)| p == pos && q == uv);
            assert!(found, "interior vertex {pos:?} lost or altered");
        }
    }
}

#[test]
fn crop_of_fully_contained_grid_is_identity_sized() {
    let mesh = grid_mesh(4, 4);
    let bounds = BBox::from_center_size(Point3::new(1.0, 1.0, 0.0), Vec3::new(10.0, 10.0, 1.0));
    let (out, diag) = crop_mesh(&mesh, bounds).unwrap();

    assert_eq!(out.vertex_count(), mesh.vertex_count());
    assert_eq!(out.triangle_count(), mesh.triangle_count());
    assert_eq!(diag.kept_triangle_count, mesh.triangle_count());
    assert_eq!(diag.clipped_triangle_count, 0);
    assert_eq!(diag.dropped_triangle_count, 0);
}

#[test]
fn crop_reuses_moved_vertices_across_the_cut() {
    // An 8x8 grid cut at x = 1.0 shares many crossing edges between
    // neighboring triangles; every shared move must be served from the
    // replacement cache.
    let mesh = grid_mesh(8, 8);
    let bounds = BBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(1.0, 3.0, 0.5));
    let (out, diag) = crop_mesh(&mesh, bounds).unwrap();

    assert!(diag.reused_moved_vertex_count > 0);
    assert!(out.validate().is_ok());
    assert_contained(&out, bounds, 1e-4);
}

#[test]
fn shrinking_boxes_shrink_the_output() {
    let mesh = grid_mesh(6, 6);
    let big = BBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(1.5, 1.5, 0.5));
    let small = BBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.7, 0.7, 0.5));

    let (out_big, _) = crop_mesh(&mesh, big).unwrap();
    let (out_small, _) = crop_mesh(&mesh, small).unwrap();
    assert!(out_small.triangle_count() < out_big.triangle_count());
    assert_contained(&out_small, small, 1e-4);
}
