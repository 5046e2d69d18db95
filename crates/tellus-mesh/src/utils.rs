//! Mesh decoration utilities: surface-crossing tests, vertex tinting, and
//! surface-point sampling for external decorators.

use glam::Vec3;
use tellus_worldgen::density::DensityField;
use tellus_worldgen::surface::SurfacePoint;

use crate::mesh::MeshData;

/// Fallback surface color when no biome selector is configured.
const DEFAULT_SURFACE_COLOR: [f32; 4] = [0.45, 0.42, 0.38, 1.0];
/// Cave color at the shallow end of the cave band.
const CAVE_COLOR_SHALLOW: [f32; 4] = [0.35, 0.25, 0.18, 1.0];
/// Cave color at the deep end of the cave band.
const CAVE_COLOR_DEEP: [f32; 4] = [0.08, 0.06, 0.05, 1.0];
/// How far a cave vertex is pulled toward the cave color.
const CAVE_TINT_STRENGTH: f32 = 0.75;

/// Tests whether a density lattice contains a surface crossing.
///
/// True iff at least one sample is negative and at least one non-negative.
/// Early-exits as soon as both signs have been seen.
#[must_use]
pub fn has_surface_crossing(samples: &[f32]) -> bool {
    let mut seen_solid = false;
    let mut seen_empty = false;
    for &s in samples {
        if s < 0.0 {
            seen_empty = true;
        } else {
            seen_solid = true;
        }
        if seen_solid && seen_empty {
            return true;
        }
    }
    false
}

/// Applies per-vertex colors from the biome palette and cave depth.
///
/// Surface color blends the biome debug colors by selector weight; a vertex
/// inside an open cave region is pulled toward a depth-dependent cave color.
/// When caves are disabled at configuration level no cave tint is applied.
pub fn tint_vertices(mesh: &mut MeshData, field: &DensityField) {
    if mesh.positions.is_empty() {
        mesh.colors = None;
        return;
    }

    let center = field.shape().center_vec();
    let caves = field.caves().filter(|c| c.config().enabled);

    let mut colors = Vec::with_capacity(mesh.positions.len());
    for &position in &mesh.positions {
        let direction = (position - center).normalize_or_zero();

        let mut color = match field.biomes() {
            Some(selector) if selector.biome_count() > 0 => {
                let weights = selector.select(direction);
                let mut blended = [0.0f32; 4];
                for bw in weights.iter() {
                    if let Some(biome) = selector.biome(bw.index) {
                        for (dst, src) in blended.iter_mut().zip(biome.debug_color) {
                            *dst += src * bw.weight;
                        }
                    }
                }
                blended
            }
            _ => DEFAULT_SURFACE_COLOR,
        };

        if let Some(cave_field) = caves {
            if cave_field.is_cave_at(position) {
                let cfg = cave_field.config();
                let span = (cfg.max_depth - cfg.min_depth).max(f32::EPSILON);
                let depth_t =
                    ((cave_field.depth_at(position) - cfg.min_depth) / span).clamp(0.0, 1.0);
                let cave_color = lerp_color(CAVE_COLOR_SHALLOW, CAVE_COLOR_DEEP, depth_t);
                color = lerp_color(color, cave_color, CAVE_TINT_STRENGTH);
            }
        }

        colors.push(color);
    }

    mesh.colors = Some(colors);
}

/// Parameters for surface-point sampling.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSampleParams {
    /// Upper bound on the number of reported points.
    pub target_count: usize,
    /// Minimum dot product between the vertex normal and the radial
    /// direction for a vertex to count as "up-facing".
    pub min_alignment: f32,
    /// Minimum altitude above the nominal surface.
    pub min_altitude: f32,
}

impl Default for SurfaceSampleParams {
    fn default() -> Self {
        Self {
            target_count: 64,
            min_alignment: 0.6,
            min_altitude: -2.0,
        }
    }
}

/// Samples up-facing surface points from a mesh for external decorators.
///
/// Strides over mesh vertices toward `target_count`, keeping those whose
/// normal aligns with the planet-radial direction and whose altitude clears
/// the floor. Each kept vertex is reported with position, normal, slope,
/// altitude, and the dominant biome (when its predicate admits the sample).
#[must_use]
pub fn sample_surface_points(
    mesh: &MeshData,
    field: &DensityField,
    params: &SurfaceSampleParams,
) -> Vec<SurfacePoint> {
    if mesh.positions.is_empty() || params.target_count == 0 {
        return Vec::new();
    }

    let center = field.shape().center_vec();
    let radius = field.shape().radius;
    let stride = (mesh.positions.len() / params.target_count).max(1);

    let mut points = Vec::new();
    for (i, &position) in mesh.positions.iter().enumerate().step_by(stride) {
        if points.len() >= params.target_count {
            break;
        }

        let radial = (position - center).normalize_or_zero();
        if radial == Vec3::ZERO {
            continue;
        }

        let normal = mesh
            .normals
            .as_ref()
            .and_then(|n| n.get(i).copied())
            .unwrap_or(radial);
        if normal.dot(radial) < params.min_alignment {
            continue;
        }

        let altitude = (position - center).length() - radius;
        if altitude < params.min_altitude {
            continue;
        }

        let slope = normal.dot(radial).clamp(-1.0, 1.0).acos().to_degrees();
        let biome = field.biomes().and_then(|selector| {
            let index = selector.primary_biome(radial);
            selector.biome(index).and_then(|biome| {
                biome
                    .predicate
                    .allows(slope, altitude, radial)
                    .then_some(index)
            })
        });

        points.push(SurfacePoint {
            position,
            normal,
            altitude,
            slope,
            biome,
        });
    }
    points
}

/// Linear interpolation between two RGBA colors.
fn lerp_color(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let t = t.clamp(0.0, 1.0);
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_worldgen::biome::{BiomeConfig, BiomeSelectionConfig, BiomeSelector};
    use tellus_worldgen::caves::{CaveConfig, CaveField};
    use tellus_worldgen::density::PlanetShape;
    use tellus_worldgen::layers::{LayerArena, LayerRange};

    fn bare_field(radius: f32) -> DensityField {
        DensityField::new(
            PlanetShape {
                radius,
                ..Default::default()
            },
            LayerArena::new(1, Vec::new()),
            LayerRange::EMPTY,
            None,
            None,
        )
    }

    fn shell_mesh(radius: f32, count: usize) -> MeshData {
        // Ring of vertices on the surface with radial normals.
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for i in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            let dir = Vec3::new(angle.cos(), angle.sin(), 0.0);
            positions.push(dir * radius);
            normals.push(dir);
        }
        MeshData {
            positions,
            indices: (0..count as u32).collect(),
            normals: Some(normals),
            colors: None,
        }
    }

    #[test]
    fn test_surface_crossing() {
        assert!(has_surface_crossing(&[1.0, -1.0]));
        assert!(has_surface_crossing(&[-1.0, 0.0]));
        assert!(!has_surface_crossing(&[1.0, 2.0, 0.0]));
        assert!(!has_surface_crossing(&[-1.0, -2.0]));
        assert!(!has_surface_crossing(&[]));
    }

    #[test]
    fn test_tint_without_biomes_uses_default() {
        let field = bare_field(50.0);
        let mut mesh = shell_mesh(50.0, 4);
        tint_vertices(&mut mesh, &field);
        let colors = mesh.colors.as_ref().expect("colors");
        assert_eq!(colors.len(), 4);
        assert_eq!(colors[0], DEFAULT_SURFACE_COLOR);
    }

    #[test]
    fn test_tint_blends_biome_colors() {
        let biomes = vec![
            BiomeConfig {
                name: "a".into(),
                debug_color: [1.0, 0.0, 0.0, 1.0],
                ..Default::default()
            },
            BiomeConfig {
                name: "b".into(),
                debug_color: [0.0, 1.0, 0.0, 1.0],
                ..Default::default()
            },
        ];
        let selector = BiomeSelector::new(3, biomes, BiomeSelectionConfig::default());
        let field = DensityField::new(
            PlanetShape::default(),
            LayerArena::new(3, Vec::new()),
            LayerRange::EMPTY,
            Some(selector),
            None,
        );
        let mut mesh = shell_mesh(100.0, 8);
        tint_vertices(&mut mesh, &field);
        for color in mesh.colors.as_ref().expect("colors") {
            // Every vertex is some convex blend of the two debug colors.
            assert!((color[0] + color[1] - 1.0).abs() < 1e-4);
            assert!((color[3] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_no_cave_tint_when_caves_disabled() {
        // A disabled cave field must leave surface colors untouched.
        let caves = CaveField::new(9, CaveConfig::default(), Vec3::ZERO, 50.0);
        let field = DensityField::new(
            PlanetShape {
                radius: 50.0,
                ..Default::default()
            },
            LayerArena::new(9, Vec::new()),
            LayerRange::EMPTY,
            None,
            Some(caves),
        );
        let mut mesh = shell_mesh(30.0, 4); // 20 below the surface
        tint_vertices(&mut mesh, &field);
        for color in mesh.colors.as_ref().expect("colors") {
            assert_eq!(*color, DEFAULT_SURFACE_COLOR);
        }
    }

    #[test]
    fn test_sample_points_filters_alignment() {
        let field = bare_field(50.0);
        let mut mesh = shell_mesh(50.0, 16);
        // Flip half the normals sideways so they fail the alignment test.
        if let Some(normals) = mesh.normals.as_mut() {
            for n in normals.iter_mut().take(8) {
                *n = Vec3::Z;
            }
        }
        let points = sample_surface_points(
            &mesh,
            &field,
            &SurfaceSampleParams {
                target_count: 16,
                min_alignment: 0.6,
                min_altitude: -5.0,
            },
        );
        assert_eq!(points.len(), 8);
        for p in &points {
            assert!(p.slope < 1.0);
            assert!(p.altitude.abs() < 1e-3);
        }
    }

    #[test]
    fn test_sample_points_bounded_by_target() {
        let field = bare_field(50.0);
        let mesh = shell_mesh(50.0, 64);
        let points = sample_surface_points(
            &mesh,
            &field,
            &SurfaceSampleParams {
                target_count: 10,
                min_alignment: 0.0,
                min_altitude: -10.0,
            },
        );
        assert!(points.len() <= 10);
        assert!(!points.is_empty());
    }

    #[test]
    fn test_sample_points_altitude_floor() {
        let field = bare_field(50.0);
        let mesh = shell_mesh(40.0, 8); // 10 below the surface
        let points = sample_surface_points(
            &mesh,
            &field,
            &SurfaceSampleParams {
                target_count: 8,
                min_alignment: 0.0,
                min_altitude: -2.0,
            },
        );
        assert!(points.is_empty());
    }
}
