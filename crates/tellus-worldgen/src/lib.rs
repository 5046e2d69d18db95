//! # Tellus Worldgen
//!
//! Deterministic volumetric terrain generation for the Tellus planet engine.
//!
//! This crate provides:
//! - Seeded 3D simplex noise and fractal layering
//! - The planet density function (sphere base + terrain noise + caves)
//! - Direction-based biome selection and blending
//! - Threshold-gated subtractive cave carving with a coarse-cell cache
//! - Surface queries (radial binary search and ray march)
//!
//! The whole world is a pure function of `(seed, configuration)`: every
//! public sampler is deterministic and side-effect free apart from caches.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod biome;
pub mod caves;
pub mod density;
pub mod layers;
pub mod noise;
pub mod surface;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::biome::{
        BiomeConfig, BiomePredicate, BiomeSelectionConfig, BiomeSelector, BiomeWeight,
        BiomeWeights, DirectionCone, SelectionNoiseConfig,
    };
    pub use crate::caves::{CaveConfig, CaveField, CaveStyle};
    pub use crate::density::{DensityField, PlanetShape};
    pub use crate::layers::{LayerArena, LayerRange, NoiseLayerConfig};
    pub use crate::noise::SimplexNoise;
    pub use crate::surface::{radial_surface_query, ray_surface_query, SurfacePoint};
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_surface_query_on_noisy_planet() {
        // The radial distance to the isosurface must equal radius plus the
        // layer value at the sampled direction, within the search tolerance.
        // A wide blend band keeps the blend factor ~1 at the crossing, so
        // the isosurface sits at radius + noise to first order.
        let shape = PlanetShape {
            radius: 100.0,
            surface_blend_distance: 1000.0,
            ..Default::default()
        };
        let arena = LayerArena::new(42, vec![NoiseLayerConfig {
            frequency: 0.05,
            strength: 8.0,
            octaves: 3,
            ..Default::default()
        }]);
        let field = DensityField::new(shape, arena, LayerRange::new(0, 1), None, None);

        let dir = Vec3::Y;
        let hit = radial_surface_query(Vec3::ZERO, 100.0, 20.0, 50.0, dir, |p| field.sample(p))
            .expect("noisy planet still has a surface along +Y");

        let expected = 100.0
            + field
                .arena()
                .evaluate_stack(LayerRange::new(0, 1), dir * 100.0);
        // Blend is 1 near the surface, so d(r) = (100 - r) + noise and the
        // zero crossing sits at r = 100 + noise.
        assert!(
            (hit.position.length() - expected).abs() < 0.5,
            "surface at {} expected {expected}",
            hit.position.length()
        );
    }
}
