use serde::{Deserialize, Serialize};

/// A triangle-list track mesh: the unit the bender and cropper transform.
///
/// Unlike a general render mesh, UVs are mandatory here: the cropper must
/// interpolate them for every vertex it moves, and the track texturing
/// breaks if any vertex lacks one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackMesh {
    /// Vertex positions, `[x, y, z]`.
    pub positions: Vec<[f64; 3]>,
    /// Texture coordinates, one per vertex.
    pub uvs: Vec<[f64; 2]>,
    /// Triangle list; length is a multiple of 3, entries index `positions`.
    pub indices: Vec<u32>,
}

impl TrackMesh {
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, uvs: Vec<[f64; 2]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            uvs,
            indices,
        }
    }

    /// A mesh with no vertices and no triangles.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Returns true if all vertex indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = u32::try_from(self.positions.len()).unwrap_or(u32::MAX);
        self.indices.iter().all(|&i| i < n)
    }

    /// Returns true if indices represent a triangle list.
    #[must_use]
    pub fn has_triangle_indices(&self) -> bool {
        self.indices.len() % 3 == 0
    }

    /// Returns true if the UV buffer matches `positions.len()`.
    #[must_use]
    pub fn has_matching_uvs(&self) -> bool {
        self.uvs.len() == self.positions.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.has_triangle_indices() {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if !self.has_matching_uvs() {
            return Err("mesh UV buffer does not match vertex count".to_string());
        }
        Ok(())
    }
}
