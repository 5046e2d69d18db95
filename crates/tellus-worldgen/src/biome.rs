//! Direction-based biome selection and blending.
//!
//! Biomes are picked by sampling a large-scale noise along the normalized
//! surface direction, mapping it to an index in the ordered biome list, and
//! blending across a band around each interior boundary so that neighboring
//! biomes meet at exactly half weight each.

use glam::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::layers::{LayerArena, LayerRange};
use crate::noise::SimplexNoise;

/// Seed offset applied to the biome selection noise so it stays
/// decorrelated from the terrain layers.
const SELECTION_SEED_OFFSET: i64 = 9999;

/// Position tolerance for the last-sample cache.
const CACHE_EPSILON: f32 = 1e-4;

/// Fractal parameters for the biome selection noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionNoiseConfig {
    /// Base sampling frequency.
    pub frequency: f32,
    /// Number of octaves.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f32,
    /// Frequency growth per octave.
    pub lacunarity: f32,
}

impl Default for SelectionNoiseConfig {
    fn default() -> Self {
        Self {
            frequency: 0.01,
            octaves: 3,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Where a biome may be applied when reporting surface points.
///
/// Selection by direction noise is unconditional; the predicate only filters
/// what external decorators are told about a surface sample.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BiomePredicate {
    /// Maximum surface slope in degrees, if bounded.
    pub max_slope: Option<f32>,
    /// Inclusive altitude band relative to the nominal surface, if bounded.
    pub altitude_range: Option<[f32; 2]>,
    /// Allowed surface directions as a cone, if bounded.
    pub direction: Option<DirectionCone>,
}

impl BiomePredicate {
    /// Tests a surface sample against the predicate.
    #[must_use]
    pub fn allows(&self, slope: f32, altitude: f32, direction: Vec3) -> bool {
        if let Some(max_slope) = self.max_slope {
            if slope > max_slope {
                return false;
            }
        }
        if let Some([lo, hi]) = self.altitude_range {
            if altitude < lo || altitude > hi {
                return false;
            }
        }
        if let Some(cone) = &self.direction {
            let axis = Vec3::from_array(cone.direction).normalize_or_zero();
            if direction.dot(axis) < cone.min_alignment {
                return false;
            }
        }
        true
    }
}

/// A cone of allowed surface directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionCone {
    /// Cone axis (normalized on use).
    pub direction: [f32; 3],
    /// Minimum dot product between the surface direction and the axis.
    pub min_alignment: f32,
}

/// Configuration for a single biome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeConfig {
    /// Human-readable name.
    pub name: String,
    /// Terrain layers owned by this biome (range into the layer arena).
    pub layers: LayerRange,
    /// Multiplier applied to the summed layer noise.
    pub height_multiplier: f32,
    /// Constant height offset.
    pub height_offset: f32,
    /// Debug color used for vertex tinting (RGBA, 0..1).
    pub debug_color: [f32; 4],
    /// Application predicate for surface-point reporting.
    pub predicate: BiomePredicate,
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            layers: LayerRange::EMPTY,
            height_multiplier: 1.0,
            height_offset: 0.0,
            debug_color: [0.5, 0.5, 0.5, 1.0],
            predicate: BiomePredicate::default(),
        }
    }
}

/// Selector-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeSelectionConfig {
    /// Selection noise parameters.
    pub noise: SelectionNoiseConfig,
    /// Radius at which the direction is sampled (scales the noise domain).
    pub sample_radius: f32,
    /// Half-width of the blend band around each boundary, in `t` units.
    pub blend_width: f32,
    /// Contrast exponent shaping the selection value (1 = none).
    pub contrast: f32,
}

impl Default for BiomeSelectionConfig {
    fn default() -> Self {
        Self {
            noise: SelectionNoiseConfig::default(),
            sample_radius: 100.0,
            blend_width: 0.02,
            contrast: 1.0,
        }
    }
}

/// Weight assigned to one biome at a surface direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomeWeight {
    /// Index into the selector's biome list.
    pub index: usize,
    /// Blend weight in [0, 1].
    pub weight: f32,
}

/// Result of a biome selection: one biome, or two blended across a boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomeWeights {
    /// Dominant biome.
    pub primary: BiomeWeight,
    /// Secondary biome inside a blend band, if any.
    pub secondary: Option<BiomeWeight>,
}

impl BiomeWeights {
    /// A single fully-weighted biome.
    #[must_use]
    pub const fn single(index: usize) -> Self {
        Self {
            primary: BiomeWeight { index, weight: 1.0 },
            secondary: None,
        }
    }

    /// Iterates over the present weights.
    pub fn iter(&self) -> impl Iterator<Item = BiomeWeight> + '_ {
        std::iter::once(self.primary).chain(self.secondary)
    }

    /// Sum of the present weights.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.primary.weight + self.secondary.map_or(0.0, |w| w.weight)
    }
}

/// Cached result of the most recent selection.
#[derive(Debug, Clone, Copy)]
struct CachedSelection {
    direction: Vec3,
    weights: BiomeWeights,
}

/// Maps normalized surface directions to weighted biome sets.
#[derive(Debug)]
pub struct BiomeSelector {
    biomes: Vec<BiomeConfig>,
    config: BiomeSelectionConfig,
    noise: SimplexNoise,
    cache: Mutex<Option<CachedSelection>>,
}

impl BiomeSelector {
    /// Creates a selector for the given biome list.
    #[must_use]
    pub fn new(seed: i32, biomes: Vec<BiomeConfig>, config: BiomeSelectionConfig) -> Self {
        Self {
            biomes,
            config,
            noise: SimplexNoise::new(i64::from(seed) + SELECTION_SEED_OFFSET),
            cache: Mutex::new(None),
        }
    }

    /// Number of configured biomes.
    #[must_use]
    pub fn biome_count(&self) -> usize {
        self.biomes.len()
    }

    /// Returns a biome configuration by index.
    #[must_use]
    pub fn biome(&self, index: usize) -> Option<&BiomeConfig> {
        self.biomes.get(index)
    }

    /// Iterates over all biome configurations.
    pub fn biomes(&self) -> impl Iterator<Item = &BiomeConfig> {
        self.biomes.iter()
    }

    /// Computes the selection value `t` in [0, 1] for a direction.
    #[must_use]
    pub fn selection_value(&self, direction: Vec3) -> f32 {
        let p = direction * self.config.sample_radius;
        let raw = self.noise.fbm(
            p.x * self.config.noise.frequency,
            p.y * self.config.noise.frequency,
            p.z * self.config.noise.frequency,
            self.config.noise.octaves,
            self.config.noise.persistence,
            self.config.noise.lacunarity,
        );
        let t = ((raw + 1.0) * 0.5).clamp(0.0, 1.0);

        let contrast = self.config.contrast;
        if (contrast - 1.0).abs() < 1e-6 || contrast <= 0.0 {
            return t;
        }
        let centered = 2.0 * t - 1.0;
        let shaped = centered.abs().powf(1.0 / contrast) * centered.signum();
        (shaped * 0.5 + 0.5).clamp(0.0, 1.0)
    }

    /// Selects biome weights for a normalized surface direction.
    ///
    /// Inside a blend band the two neighboring biomes share weight, meeting
    /// at exactly 0.5/0.5 on the boundary itself; weights always sum to 1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn select(&self, direction: Vec3) -> BiomeWeights {
        let count = self.biomes.len();
        if count == 0 {
            return BiomeWeights::single(0);
        }
        if count == 1 {
            return BiomeWeights::single(0);
        }

        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if cached.direction.abs_diff_eq(direction, CACHE_EPSILON) {
                    return cached.weights;
                }
            }
        }

        let t = self.selection_value(direction);
        let n = count as f32;
        let primary = ((t * n) as usize).min(count - 1);

        // Distance in t-space to the nearest interior boundary.
        let mut weights = BiomeWeights::single(primary);
        let blend = self.config.blend_width;
        if blend > 0.0 {
            let lower_boundary = primary as f32 / n;
            let upper_boundary = (primary + 1) as f32 / n;
            let dist_lower = t - lower_boundary;
            let dist_upper = upper_boundary - t;

            let (dist, neighbor) = if dist_lower <= dist_upper {
                (dist_lower, primary.checked_sub(1))
            } else {
                (dist_upper, (primary + 1 < count).then_some(primary + 1))
            };

            if let Some(neighbor) = neighbor {
                if dist < blend {
                    let s = (dist / blend).clamp(0.0, 1.0);
                    let w = 0.5 + 0.5 * smoothstep(s);
                    weights = BiomeWeights {
                        primary: BiomeWeight {
                            index: primary,
                            weight: w,
                        },
                        secondary: Some(BiomeWeight {
                            index: neighbor,
                            weight: 1.0 - w,
                        }),
                    };
                }
            }
        }

        *self.cache.lock() = Some(CachedSelection {
            direction,
            weights,
        });
        weights
    }

    /// Index of the dominant biome for a direction.
    #[must_use]
    pub fn primary_biome(&self, direction: Vec3) -> usize {
        self.select(direction).primary.index
    }

    /// Biome-weighted terrain noise for a surface direction.
    ///
    /// Each biome's layer stack is evaluated at `sample_point`, scaled by its
    /// height multiplier and offset, combined by blend weight, and normalized
    /// by the weight sum.
    #[must_use]
    pub fn terrain_noise(&self, arena: &LayerArena, direction: Vec3, sample_point: Vec3) -> f32 {
        let weights = self.select(direction);
        let mut total = 0.0;
        let mut weight_sum = 0.0;

        for bw in weights.iter() {
            let Some(biome) = self.biomes.get(bw.index) else {
                continue;
            };
            let stack = arena.evaluate_stack(biome.layers, sample_point);
            total += bw.weight * (stack * biome.height_multiplier + biome.height_offset);
            weight_sum += bw.weight;
        }

        if weight_sum > 0.0 {
            total / weight_sum
        } else {
            0.0
        }
    }
}

/// Hermite smoothstep on [0, 1].
#[must_use]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
