//! Triangle mesh data handed to the renderer and physics host.

use glam::Vec3;

/// A triangle mesh produced by isosurface extraction.
///
/// Indices are always 32-bit. Marching cubes emits three vertices per
/// triangle; vertices are not shared across cubes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions in world space.
    pub positions: Vec<Vec3>,
    /// Triangle indices (triples into `positions`).
    pub indices: Vec<u32>,
    /// Per-vertex normals, if computed. Same length as `positions`.
    pub normals: Option<Vec<Vec3>>,
    /// Per-vertex RGBA colors, if computed. Same length as `positions`.
    pub colors: Option<Vec<[f32; 4]>>,
}

impl MeshData {
    /// Creates an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the mesh holds no geometry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Clears all buffers.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.indices.clear();
        self.normals = None;
        self.colors = None;
    }

    /// Iterates over triangles as position triples.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mesh() {
        let mesh = MeshData::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_triangle_iteration() {
        let mesh = MeshData {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2],
            normals: None,
            colors: None,
        };
        let tris: Vec<_> = mesh.triangles().collect();
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0][1], Vec3::X);
    }

    #[test]
    fn test_clear_drops_attributes() {
        let mut mesh = MeshData {
            positions: vec![Vec3::ZERO; 3],
            indices: vec![0, 1, 2],
            normals: Some(vec![Vec3::Y; 3]),
            colors: Some(vec![[1.0; 4]; 3]),
        };
        mesh.clear();
        assert!(mesh.is_empty());
        assert!(mesh.normals.is_none());
        assert!(mesh.colors.is_none());
    }
}
