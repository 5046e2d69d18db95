//! Subtractive cave carving.
//!
//! Caves are a negative contribution to the density field: threshold-gated
//! noise, windowed to a depth band below the nominal surface and faded out
//! near both bounds. The cave noise is evaluated on a coarse cell lattice
//! and trilinearly interpolated with smoothed interpolants; cell corner
//! samples are cached in a sharded map keyed by packed cell coordinates.

use dashmap::DashMap;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::noise::SimplexNoise;

/// Seed offset for the cave noise.
const CAVE_SEED_OFFSET: i64 = 31_337;
/// Seed offset for the domain-warp noise used by the sponge style.
const WARP_SEED_OFFSET: i64 = 62_674;

/// How octaves are combined into the normalized cave value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaveStyle {
    /// Ridged tunnels following the zero set of the noise.
    #[default]
    Worm,
    /// Large open chambers from plain fractal noise.
    Cavern,
    /// Domain-warped porous pockets.
    Sponge,
}

/// Configuration for the cave field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    /// Whether caves are carved at all.
    pub enabled: bool,
    /// Octave combination style.
    pub style: CaveStyle,
    /// Minimum depth below the nominal surface where caves may appear.
    pub min_depth: f32,
    /// Maximum depth below the nominal surface where caves may appear.
    pub max_depth: f32,
    /// Width of the fade band inside each depth bound.
    pub fade_range: f32,
    /// Normalized noise threshold above which a cave opens.
    pub threshold: f32,
    /// Cave width multiplier applied to the carved strength.
    pub width: f32,
    /// Overall carve strength scale.
    pub cave_density: f32,
    /// Base sampling frequency of the cave noise.
    pub frequency: f32,
    /// Number of octaves.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f32,
    /// Frequency growth per octave.
    pub lacunarity: f32,
    /// Edge length of the coarse evaluation cell in world units.
    pub cell_size: f32,
}

impl Default for CaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            style: CaveStyle::Worm,
            min_depth: 5.0,
            max_depth: 40.0,
            fade_range: 4.0,
            threshold: 0.3,
            width: 3.0,
            cave_density: 0.3,
            frequency: 0.05,
            octaves: 3,
            persistence: 0.5,
            lacunarity: 2.0,
            cell_size: 4.0,
        }
    }
}

/// Threshold-gated subtractive cave field.
#[derive(Debug)]
pub struct CaveField {
    config: CaveConfig,
    noise: SimplexNoise,
    warp: SimplexNoise,
    center: Vec3,
    radius: f32,
    /// Cached coarse corner samples, keyed by packed cell coordinates.
    cells: DashMap<u64, [f32; 8]>,
}

impl CaveField {
    /// Creates a cave field for the given planet shape.
    #[must_use]
    pub fn new(seed: i32, config: CaveConfig, center: Vec3, radius: f32) -> Self {
        Self {
            config,
            noise: SimplexNoise::new(i64::from(seed) + CAVE_SEED_OFFSET),
            warp: SimplexNoise::new(i64::from(seed) + WARP_SEED_OFFSET),
            center,
            radius,
            cells: DashMap::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CaveConfig {
        &self.config
    }

    /// Drops all cached cell samples.
    ///
    /// Must be called whenever the seed, planet center, or radius change.
    pub fn flush_cache(&self) {
        self.cells.clear();
    }

    /// Number of cached cells (diagnostic).
    #[must_use]
    pub fn cached_cells(&self) -> usize {
        self.cells.len()
    }

    /// Depth below the nominal surface at a world point.
    #[must_use]
    pub fn depth_at(&self, point: Vec3) -> f32 {
        self.radius - (point - self.center).length()
    }

    /// Whether a point lies inside an open cave region.
    #[must_use]
    pub fn is_cave_at(&self, point: Vec3) -> bool {
        self.carve(point) < 0.0
    }

    /// Cave contribution to the density at a world point. Always <= 0.
    #[must_use]
    pub fn carve(&self, point: Vec3) -> f32 {
        if !self.config.enabled {
            return 0.0;
        }

        let depth = self.depth_at(point);
        if depth < self.config.min_depth || depth > self.config.max_depth {
            return 0.0;
        }

        let fade = self.depth_fade(depth);
        if fade <= 0.0 {
            return 0.0;
        }

        let value = self.sample_interpolated(point);
        let threshold = self.config.threshold;
        if value <= threshold || threshold >= 1.0 {
            return 0.0;
        }

        let strength =
            ((value - threshold) / (1.0 - threshold)) * self.config.cave_density * fade;
        -strength * self.config.width
    }

    /// Smoothstep fade toward 0 within `fade_range` of both depth bounds.
    fn depth_fade(&self, depth: f32) -> f32 {
        let range = self.config.fade_range.max(f32::EPSILON);
        let from_min = smoothstep(((depth - self.config.min_depth) / range).clamp(0.0, 1.0));
        let from_max = smoothstep(((self.config.max_depth - depth) / range).clamp(0.0, 1.0));
        from_min.min(from_max)
    }

    /// Normalized cave value at a point, interpolated from the coarse lattice.
    #[allow(clippy::cast_possible_truncation)]
    fn sample_interpolated(&self, point: Vec3) -> f32 {
        let cell_size = self.config.cell_size.max(f32::EPSILON);
        let scaled = point / cell_size;
        let base = scaled.floor();
        let ix = base.x as i32;
        let iy = base.y as i32;
        let iz = base.z as i32;

        let corners = self.cell_corners(ix, iy, iz);

        // Smoothed trilinear interpolation
        let tx = smoothstep(scaled.x - base.x);
        let ty = smoothstep(scaled.y - base.y);
        let tz = smoothstep(scaled.z - base.z);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let x00 = lerp(corners[0], corners[1], tx);
        let x10 = lerp(corners[2], corners[3], tx);
        let x01 = lerp(corners[4], corners[5], tx);
        let x11 = lerp(corners[6], corners[7], tx);
        let y0 = lerp(x00, x10, ty);
        let y1 = lerp(x01, x11, ty);
        lerp(y0, y1, tz)
    }

    /// Returns the 8 coarse corner samples surrounding a cell, cached.
    ///
    /// Corner order: x varies fastest, then y, then z.
    fn cell_corners(&self, ix: i32, iy: i32, iz: i32) -> [f32; 8] {
        let key = pack_cell(ix, iy, iz);
        if let Some(entry) = self.cells.get(&key) {
            return *entry;
        }

        let cell_size = self.config.cell_size.max(f32::EPSILON);
        let mut corners = [0.0f32; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::new(
                (ix + (i as i32 & 1)) as f32,
                (iy + ((i as i32 >> 1) & 1)) as f32,
                (iz + ((i as i32 >> 2) & 1)) as f32,
            ) * cell_size;
            *corner = self.raw_value(p);
        }

        self.cells.insert(key, corners);
        corners
    }

    /// Raw normalized cave value in [0, 1] at a world point.
    fn raw_value(&self, point: Vec3) -> f32 {
        let c = &self.config;
        let p = point * c.frequency;

        let value = match c.style {
            CaveStyle::Worm => {
                // Tunnels open along the zero set of the fractal noise.
                let n = self
                    .noise
                    .fbm(p.x, p.y, p.z, c.octaves, c.persistence, c.lacunarity);
                1.0 - n.abs()
            }
            CaveStyle::Cavern => {
                let n = self
                    .noise
                    .fbm(p.x, p.y, p.z, c.octaves, c.persistence, c.lacunarity);
                (n + 1.0) * 0.5
            }
            CaveStyle::Sponge => {
                let warp = Vec3::new(
                    self.warp.noise3(p.x, p.y, p.z),
                    self.warp.noise3(p.y, p.z, p.x),
                    self.warp.noise3(p.z, p.x, p.y),
                );
                let q = p + warp * 0.5;
                let n = self
                    .noise
                    .fbm(q.x, q.y, q.z, c.octaves, c.persistence, c.lacunarity);
                (n + 1.0) * 0.5
            }
        };

        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Packs signed cell coordinates into a 64-bit key (21 bits per axis).
#[must_use]
#[allow(clippy::cast_sign_loss)]
fn pack_cell(ix: i32, iy: i32, iz: i32) -> u64 {
    const MASK: u64 = (1 << 21) - 1;
    ((ix as u64 & MASK) << 42) | ((iy as u64 & MASK) << 21) | (iz as u64 & MASK)
}

/// Hermite smoothstep on [0, 1].
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> CaveConfig {
        CaveConfig {
            enabled: true,
            ..Default::default()
        }
    }

    fn field(config: CaveConfig) -> CaveField {
        CaveField::new(42, config, Vec3::ZERO, 100.0)
    }

    #[test]
    fn test_disabled_caves_never_carve() {
        let field = field(CaveConfig::default());
        for i in 0..50 {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::new(80.0 - i as f32, 0.0, 0.0);
            assert_eq!(field.carve(p), 0.0);
        }
    }

    #[test]
    fn test_depth_window_respected() {
        let field = field(enabled_config());
        // Above min_depth (at the surface) and below max_depth: no carving.
        assert_eq!(field.carve(Vec3::new(99.0, 0.0, 0.0)), 0.0); // depth 1 < 5
        assert_eq!(field.carve(Vec3::new(20.0, 0.0, 0.0)), 0.0); // depth 80 > 40
    }

    #[test]
    fn test_carve_is_never_positive() {
        let field = field(enabled_config());
        for i in 0..500 {
            #[allow(clippy::cast_precision_loss)]
            let angle = i as f32 * 0.05;
            let r = 60.0 + (i % 35) as f32;
            let p = Vec3::new(angle.cos() * r, angle.sin() * r, (angle * 0.6).sin() * 10.0);
            assert!(field.carve(p) <= 0.0);
        }
    }

    #[test]
    fn test_carve_deterministic() {
        let a = field(enabled_config());
        let b = field(enabled_config());
        let p = Vec3::new(70.0, 20.0, 10.0);
        assert_eq!(a.carve(p).to_bits(), b.carve(p).to_bits());
    }

    #[test]
    fn test_strength_formula() {
        // With a full fade band the carve must follow
        // -((v - t) / (1 - t)) * density * width exactly.
        let config = CaveConfig {
            enabled: true,
            min_depth: 0.0,
            max_depth: 200.0,
            fade_range: 0.001,
            threshold: 0.3,
            width: 3.0,
            cave_density: 0.3,
            ..enabled_config()
        };
        let field = field(config);
        let p = Vec3::new(70.0, 5.0, -12.0);
        let v = field.sample_interpolated(p);
        let carved = field.carve(p);

        if v > 0.3 {
            let expected = -((v - 0.3) / 0.7) * 0.3 * 3.0;
            assert!((carved - expected).abs() < 1e-4, "carved={carved} expected={expected}");
        } else {
            assert_eq!(carved, 0.0);
        }
    }

    #[test]
    fn test_fade_reaches_one_mid_band() {
        let field = field(enabled_config());
        // Middle of the [5, 40] band with fade_range 4.
        let fade = field.depth_fade(22.0);
        assert!((fade - 1.0).abs() < 1e-6);
        // At the exact bounds the fade is 0.
        assert_eq!(field.depth_fade(5.0), 0.0);
        assert_eq!(field.depth_fade(40.0), 0.0);
    }

    #[test]
    fn test_cell_cache_populates_and_flushes() {
        let field = field(enabled_config());
        assert_eq!(field.cached_cells(), 0);
        let _ = field.carve(Vec3::new(70.0, 0.0, 0.0));
        assert!(field.cached_cells() > 0);
        field.flush_cache();
        assert_eq!(field.cached_cells(), 0);
    }

    #[test]
    fn test_cached_value_matches_fresh_value() {
        let field = field(enabled_config());
        let p = Vec3::new(72.5, 3.0, 11.0);
        let first = field.carve(p);
        let second = field.carve(p);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_pack_cell_unique_for_neighbors() {
        let mut seen = std::collections::HashSet::new();
        for x in -4..4 {
            for y in -4..4 {
                for z in -4..4 {
                    assert!(seen.insert(pack_cell(x, y, z)), "collision at ({x},{y},{z})");
                }
            }
        }
    }

    #[test]
    fn test_styles_differ() {
        let worm = field(enabled_config());
        let cavern = field(CaveConfig {
            style: CaveStyle::Cavern,
            ..enabled_config()
        });
        // Same seed, different combination: raw values diverge somewhere.
        let diverged = (0..20).any(|i| {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::new(70.0 + i as f32 * 1.7, 10.0, 4.0);
            (worm.raw_value(p) - cavern.raw_value(p)).abs() > 1e-4
        });
        assert!(diverged);
    }
}
