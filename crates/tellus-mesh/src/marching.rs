//! Table-driven marching-cubes isosurface extraction.
//!
//! Extracts the zero isosurface of a density lattice. Corner `i` of a cube
//! is "inside" when its density is negative (empty space); the emitted
//! triangles therefore wind so their normals face out of the solid.

use glam::Vec3;
use tellus_common::ChunkError;

use crate::mesh::MeshData;
use crate::tables::{triangles_for, CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE};

/// Densities closer than this to zero (or to each other) are treated as
/// degenerate during edge interpolation.
const INTERP_EPSILON: f32 = 1e-5;

/// Extracts the isosurface of a `(resolution + 1)³` density lattice.
///
/// `sample(x, y, z)` must return the density at lattice index `(x, y, z)`
/// for `0 <= x, y, z <= resolution`. `origin` is the world position of
/// lattice index `(0, 0, 0)` and `voxel_step` the world distance between
/// adjacent samples.
///
/// # Errors
/// Returns [`ChunkError::IndexOverflow`] if the mesh would exceed the
/// 32-bit index budget.
pub fn extract_isosurface(
    resolution: usize,
    voxel_step: f32,
    origin: Vec3,
    sample: impl Fn(usize, usize, usize) -> f32,
) -> Result<MeshData, ChunkError> {
    let mut mesh = MeshData::new();
    let mut normals = Vec::new();

    let mut corner_values = [0.0f32; 8];
    let mut corner_positions = [Vec3::ZERO; 8];
    let mut edge_vertices = [Vec3::ZERO; 12];

    for z in 0..resolution {
        for y in 0..resolution {
            for x in 0..resolution {
                let mut cube_index = 0usize;
                for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
                    #[allow(clippy::cast_sign_loss)]
                    let (cx, cy, cz) = (
                        x + offset[0] as usize,
                        y + offset[1] as usize,
                        z + offset[2] as usize,
                    );
                    let value = sample(cx, cy, cz);
                    corner_values[i] = value;
                    #[allow(clippy::cast_precision_loss)]
                    {
                        corner_positions[i] =
                            origin + Vec3::new(cx as f32, cy as f32, cz as f32) * voxel_step;
                    }
                    if value < 0.0 {
                        cube_index |= 1 << i;
                    }
                }

                let edges = EDGE_TABLE[cube_index];
                if edges == 0 {
                    continue;
                }

                for (edge, corners) in EDGE_CORNERS.iter().enumerate() {
                    if edges & (1 << edge) != 0 {
                        edge_vertices[edge] = interpolate_edge(
                            corner_positions[corners[0]],
                            corner_positions[corners[1]],
                            corner_values[corners[0]],
                            corner_values[corners[1]],
                        );
                    }
                }

                #[allow(clippy::cast_possible_truncation)]
                for tri in triangles_for(cube_index as u8).chunks_exact(3) {
                    if tri[0] < 0 {
                        break;
                    }
                    #[allow(clippy::cast_sign_loss)]
                    let (a, b, c) = (
                        edge_vertices[tri[0] as usize],
                        edge_vertices[tri[1] as usize],
                        edge_vertices[tri[2] as usize],
                    );

                    let base = mesh.positions.len();
                    if base + 3 > u32::MAX as usize {
                        return Err(ChunkError::IndexOverflow {
                            vertices: base + 3,
                        });
                    }

                    let normal = face_normal(a, b, c);
                    mesh.positions.extend_from_slice(&[a, b, c]);
                    normals.extend_from_slice(&[normal; 3]);
                    mesh.indices.extend_from_slice(&[
                        base as u32,
                        base as u32 + 1,
                        base as u32 + 2,
                    ]);
                }
            }
        }
    }

    if !mesh.positions.is_empty() {
        mesh.normals = Some(normals);
    }
    Ok(mesh)
}

/// Interpolates the surface crossing along a cube edge.
///
/// `t = -v1 / (v2 - v1)`; degenerate cases fall back to the nearer endpoint.
#[must_use]
fn interpolate_edge(p1: Vec3, p2: Vec3, v1: f32, v2: f32) -> Vec3 {
    if v1.abs() < INTERP_EPSILON {
        return p1;
    }
    if v2.abs() < INTERP_EPSILON {
        return p2;
    }
    if (v1 - v2).abs() < INTERP_EPSILON {
        return p1;
    }
    let t = -v1 / (v2 - v1);
    p1 + (p2 - p1) * t
}

/// Unit face normal of a triangle, or +Y for degenerate triangles.
fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let n = (b - a).cross(c - a);
    let normalized = n.normalize_or_zero();
    if normalized == Vec3::ZERO {
        Vec3::Y
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lattice with one empty corner at index (0, 0, 0), everything else
    /// solid.
    fn one_corner_lattice(x: usize, y: usize, z: usize) -> f32 {
        if x == 0 && y == 0 && z == 0 {
            -1.0
        } else {
            1.0
        }
    }

    #[test]
    fn test_all_solid_emits_nothing() {
        let mesh = extract_isosurface(4, 1.0, Vec3::ZERO, |_, _, _| 1.0).expect("meshing");
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_all_empty_emits_nothing() {
        let mesh = extract_isosurface(4, 1.0, Vec3::ZERO, |_, _, _| -1.0).expect("meshing");
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_single_corner_emits_one_triangle() {
        let mesh = extract_isosurface(2, 1.0, Vec3::ZERO, one_corner_lattice).expect("meshing");
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        // The crossing sits halfway along each incident edge.
        for p in &mesh.positions {
            assert!((p.length() - 0.5).abs() < 1e-5, "vertex {p:?}");
        }
    }

    #[test]
    fn test_normals_match_vertex_count() {
        let mesh = extract_isosurface(2, 1.0, Vec3::ZERO, one_corner_lattice).expect("meshing");
        let normals = mesh.normals.as_ref().expect("normals present");
        assert_eq!(normals.len(), mesh.vertex_count());
    }

    #[test]
    fn test_flat_slab_area() {
        // Density y - 1.5 flips sign between y=1 and y=2: a flat sheet.
        let mesh = extract_isosurface(4, 1.0, Vec3::ZERO, |_, y, _| {
            #[allow(clippy::cast_precision_loss)]
            {
                1.5 - y as f32
            }
        })
        .expect("meshing");
        assert!(!mesh.is_empty());
        // Every vertex sits on the y = 1.5 plane.
        for p in &mesh.positions {
            assert!((p.y - 1.5).abs() < 1e-5);
        }
        // 4x4 cubes, two triangles each.
        assert_eq!(mesh.triangle_count(), 32);
    }

    #[test]
    fn test_sphere_lattice_produces_shell() {
        // A small sphere centered in the lattice produces a closed surface.
        let r = 8usize;
        let mesh = extract_isosurface(r, 1.0, Vec3::ZERO, |x, y, z| {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::new(x as f32, y as f32, z as f32) - Vec3::splat(4.0);
            3.0 - p.length()
        })
        .expect("meshing");
        assert!(mesh.triangle_count() >= 8, "sphere too coarse");
        // All vertices near the radius-3 shell.
        for p in &mesh.positions {
            let d = (*p - Vec3::splat(4.0)).length();
            assert!((d - 3.0).abs() < 1.0, "vertex {p:?} at distance {d}");
        }
    }

    #[test]
    fn test_interpolation_degeneracy_guards() {
        let p1 = Vec3::ZERO;
        let p2 = Vec3::X;
        assert_eq!(interpolate_edge(p1, p2, 0.0, 1.0), p1);
        assert_eq!(interpolate_edge(p1, p2, 1.0, 0.0), p2);
        assert_eq!(interpolate_edge(p1, p2, 1.0, 1.0 + 1e-7), p1);
        // Regular case: crossing at t = 0.5
        let mid = interpolate_edge(p1, p2, -1.0, 1.0);
        assert!((mid.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_origin_and_step_scale_output() {
        let origin = Vec3::new(10.0, 20.0, 30.0);
        let mesh = extract_isosurface(2, 2.0, origin, one_corner_lattice).expect("meshing");
        for p in &mesh.positions {
            assert!(((*p - origin).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_deterministic_output() {
        let a = extract_isosurface(8, 1.0, Vec3::ZERO, |x, y, z| {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::new(x as f32, y as f32, z as f32);
            3.5 - (p - Vec3::splat(4.0)).length()
        })
        .expect("meshing");
        let b = extract_isosurface(8, 1.0, Vec3::ZERO, |x, y, z| {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::new(x as f32, y as f32, z as f32);
            3.5 - (p - Vec3::splat(4.0)).length()
        })
        .expect("meshing");
        assert_eq!(a.positions, b.positions);
        assert_eq!(a.indices, b.indices);
    }
}
