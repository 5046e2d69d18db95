//! The planet density function.
//!
//! Sign convention: positive = solid, negative = empty, zero = surface.
//! The field is a pure function of the engine seed and configuration:
//! a spherical base, noise layers (global or biome-blended) windowed to a
//! band around the nominal surface, and a subtractive cave term.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::biome::BiomeSelector;
use crate::caves::CaveField;
use crate::layers::{LayerArena, LayerRange};

/// Geometric parameters of the planet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetShape {
    /// World position of the planet center.
    pub center: [f32; 3],
    /// Nominal surface radius.
    pub radius: f32,
    /// Maximum terrain height above the nominal surface.
    pub max_terrain_height: f32,
    /// Maximum terrain depth below the nominal surface.
    pub max_terrain_depth: f32,
    /// Width of the band around the surface where noise may act.
    pub surface_blend_distance: f32,
    /// Clamp applied to deep interior density before cave subtraction.
    pub max_interior_density: f32,
}

impl Default for PlanetShape {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            radius: 100.0,
            max_terrain_height: 20.0,
            max_terrain_depth: 50.0,
            surface_blend_distance: 25.0,
            max_interior_density: 10.0,
        }
    }
}

impl PlanetShape {
    /// Planet center as a vector.
    #[must_use]
    pub fn center_vec(&self) -> Vec3 {
        Vec3::from_array(self.center)
    }
}

/// Deterministic scalar density field for the whole planet.
#[derive(Debug)]
pub struct DensityField {
    shape: PlanetShape,
    arena: LayerArena,
    global_layers: LayerRange,
    biomes: Option<BiomeSelector>,
    caves: Option<CaveField>,
    nan_events: AtomicU64,
}

impl DensityField {
    /// Assembles a density field from its contributions.
    ///
    /// `global_layers` is used when no biome selector is configured;
    /// with a selector, terrain noise comes from the biome layer stacks.
    #[must_use]
    pub fn new(
        shape: PlanetShape,
        arena: LayerArena,
        global_layers: LayerRange,
        biomes: Option<BiomeSelector>,
        caves: Option<CaveField>,
    ) -> Self {
        info!(
            "Density field: radius={}, layers={}, biomes={}, caves={}",
            shape.radius,
            arena.len(),
            biomes.as_ref().map_or(0, BiomeSelector::biome_count),
            caves.is_some()
        );
        Self {
            shape,
            arena,
            global_layers,
            biomes,
            caves,
            nan_events: AtomicU64::new(0),
        }
    }

    /// The planet shape.
    #[must_use]
    pub fn shape(&self) -> &PlanetShape {
        &self.shape
    }

    /// The biome selector, if configured.
    #[must_use]
    pub fn biomes(&self) -> Option<&BiomeSelector> {
        self.biomes.as_ref()
    }

    /// The cave field, if caves are enabled.
    #[must_use]
    pub fn caves(&self) -> Option<&CaveField> {
        self.caves.as_ref()
    }

    /// The layer arena.
    #[must_use]
    pub fn arena(&self) -> &LayerArena {
        &self.arena
    }

    /// Number of non-finite noise samples seen (and clamped) so far.
    #[must_use]
    pub fn nan_events(&self) -> u64 {
        self.nan_events.load(Ordering::Relaxed)
    }

    /// Evaluates the density at a world position.
    #[must_use]
    pub fn sample(&self, point: Vec3) -> f32 {
        let center = self.shape.center_vec();
        let to_point = point - center;
        let r = to_point.length();
        let base = self.shape.radius - r;

        let blend_distance = self.shape.surface_blend_distance.max(f32::EPSILON);
        let blend = (1.0 - base.abs() / blend_distance).clamp(0.0, 1.0);

        let mut noise = 0.0;
        if blend > 0.0 && r > 1e-6 {
            let dir = to_point / r;
            let sample_point = dir * self.shape.radius;
            noise = match &self.biomes {
                Some(selector) => selector.terrain_noise(&self.arena, dir, sample_point),
                None => self.arena.evaluate_stack(self.global_layers, sample_point),
            };
            if !noise.is_finite() {
                self.nan_events.fetch_add(1, Ordering::Relaxed);
                noise = 0.0;
            }
        }

        let mut terrain = base + noise * blend;

        let cave = self.caves.as_ref().map_or(0.0, |c| c.carve(point));
        // Deep interior density would otherwise swamp the carve term.
        if terrain > self.shape.max_interior_density && cave < 0.0 {
            terrain = self.shape.max_interior_density;
        }

        terrain + cave
    }

    /// Central-difference gradient of the density at a point.
    #[must_use]
    pub fn gradient(&self, point: Vec3, epsilon: f32) -> Vec3 {
        gradient_of(|p| self.sample(p), point, epsilon)
    }
}

/// Central-difference gradient of an arbitrary density source.
#[must_use]
pub fn gradient_of(density: impl Fn(Vec3) -> f32, point: Vec3, epsilon: f32) -> Vec3 {
    let e = epsilon.max(f32::EPSILON);
    let dx = density(point + Vec3::X * e) - density(point - Vec3::X * e);
    let dy = density(point + Vec3::Y * e) - density(point - Vec3::Y * e);
    let dz = density(point + Vec3::Z * e) - density(point - Vec3::Z * e);
    Vec3::new(dx, dy, dz) / (2.0 * e)
}
