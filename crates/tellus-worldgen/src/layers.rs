//! Stacked terrain noise layers.
//!
//! A layer wraps fractal noise with a fixed post-processing pipeline:
//! sample, invert, floor, mask, strength, minimum gate, in that order.
//! Layers live in a shared arena; biomes and the global terrain stack
//! reference contiguous index ranges into it.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::noise::SimplexNoise;

/// Configuration for a single terrain noise layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayerConfig {
    /// Whether the layer contributes at all.
    pub enabled: bool,
    /// Base sampling frequency.
    pub frequency: f32,
    /// Frequency growth per octave.
    pub lacunarity: f32,
    /// Number of octaves.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f32,
    /// Scalar output multiplier.
    pub strength: f32,
    /// Offset added to the sample point before noise evaluation.
    pub center: [f32; 3],
    /// Negate the raw noise before post-processing.
    pub invert: bool,
    /// Apply the floor subtraction.
    pub use_floor: bool,
    /// Floor subtracted from the raw value when `use_floor` is set.
    pub floor_value: f32,
    /// Multiply the output by the stack's first-layer value when positive.
    pub use_first_layer_as_mask: bool,
    /// Final minimum gate: output is `max(0, output - min_value)`.
    pub min_value: f32,
}

impl Default for NoiseLayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: 1.0,
            lacunarity: 2.0,
            octaves: 4,
            persistence: 0.5,
            strength: 1.0,
            center: [0.0; 3],
            invert: false,
            use_floor: false,
            floor_value: 0.0,
            use_first_layer_as_mask: false,
            min_value: 0.0,
        }
    }
}

impl NoiseLayerConfig {
    /// Evaluates the layer at a world point.
    ///
    /// `first_layer_value` is the value of the first layer in the same stack
    /// and feeds the optional mask step; the first layer itself receives 0.
    #[must_use]
    pub fn evaluate(&self, noise: &SimplexNoise, point: Vec3, first_layer_value: f32) -> f32 {
        if !self.enabled {
            return 0.0;
        }

        let p = point + Vec3::from_array(self.center);
        let mut value = noise.fbm(
            p.x * self.frequency,
            p.y * self.frequency,
            p.z * self.frequency,
            self.octaves,
            self.persistence,
            self.lacunarity,
        );

        if self.invert {
            value = -value;
        }
        if self.use_floor {
            value = (value - self.floor_value).max(0.0);
        }
        if self.use_first_layer_as_mask && first_layer_value > 0.0 {
            value *= first_layer_value;
        }
        value *= self.strength;
        (value - self.min_value).max(0.0)
    }
}

/// A contiguous range of layers within a [`LayerArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LayerRange {
    /// Index of the first layer in the arena.
    pub start: usize,
    /// Number of layers in the range.
    pub len: usize,
}

impl LayerRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// An empty range.
    pub const EMPTY: Self = Self::new(0, 0);

    /// Whether the range holds no layers.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Iterates over arena indices in the range.
    pub fn indices(self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Arena of all configured noise layers.
///
/// Holds one seeded noise generator per layer so evaluation is allocation
/// free and deterministic for a given engine seed.
#[derive(Debug)]
pub struct LayerArena {
    layers: Vec<NoiseLayerConfig>,
    noises: Vec<SimplexNoise>,
}

impl LayerArena {
    /// Builds an arena from layer configurations.
    ///
    /// Layer `i` is seeded with `seed + i` so stacks stay decorrelated while
    /// remaining a pure function of the engine seed.
    #[must_use]
    pub fn new(seed: i32, layers: Vec<NoiseLayerConfig>) -> Self {
        let noises = (0..layers.len())
            .map(|i| SimplexNoise::new(i64::from(seed).wrapping_add(i as i64)))
            .collect();
        Self { layers, noises }
    }

    /// Number of layers in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns a layer configuration by arena index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&NoiseLayerConfig> {
        self.layers.get(index)
    }

    /// Evaluates a stack of layers at a world point and sums the results.
    ///
    /// The first layer of the range is evaluated with a first-layer value of
    /// 0; every later layer receives the first layer's output for masking.
    #[must_use]
    pub fn evaluate_stack(&self, range: LayerRange, point: Vec3) -> f32 {
        let mut sum = 0.0;
        let mut first_value = 0.0;

        for (position, index) in range.indices().enumerate() {
            let (Some(layer), Some(noise)) = (self.layers.get(index), self.noises.get(index))
            else {
                break;
            };
            let value = layer.evaluate(noise, point, first_value);
            if position == 0 {
                first_value = value;
            }
            sum += value;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with(configs: Vec<NoiseLayerConfig>) -> LayerArena {
        LayerArena::new(7, configs)
    }

    #[test]
    fn test_disabled_layer_is_zero() {
        let layer = NoiseLayerConfig {
            enabled: false,
            ..Default::default()
        };
        let noise = SimplexNoise::new(1);
        assert_eq!(layer.evaluate(&noise, Vec3::new(1.0, 2.0, 3.0), 0.0), 0.0);
    }

    #[test]
    fn test_min_value_gate_clamps_to_zero() {
        let layer = NoiseLayerConfig {
            min_value: 10.0,
            ..Default::default()
        };
        let noise = SimplexNoise::new(1);
        // fbm is in [-1, 1]; a gate of 10 forces the output to exactly 0.
        assert_eq!(layer.evaluate(&noise, Vec3::splat(0.4), 0.0), 0.0);
    }

    #[test]
    fn test_invert_negates_raw_noise() {
        let noise = SimplexNoise::new(3);
        let base = NoiseLayerConfig {
            min_value: -100.0,
            ..Default::default()
        };
        let inverted = NoiseLayerConfig {
            invert: true,
            min_value: -100.0,
            ..Default::default()
        };

        let p = Vec3::new(0.7, -0.2, 1.1);
        // With the gate pushed out of the way, invert flips the sign and the
        // gate offset shifts both by the same constant.
        let a = base.evaluate(&noise, p, 0.0) - 100.0;
        let b = inverted.evaluate(&noise, p, 0.0) - 100.0;
        assert!((a + b).abs() < 1e-5, "a={a} b={b}");
    }

    #[test]
    fn test_floor_clamps_below_floor_value() {
        let noise = SimplexNoise::new(9);
        let layer = NoiseLayerConfig {
            use_floor: true,
            floor_value: 2.0,
            ..Default::default()
        };
        // Raw noise never reaches 2, so the floored output is always 0.
        for i in 0..20 {
            #[allow(clippy::cast_precision_loss)]
            let p = Vec3::splat(i as f32 * 0.31);
            assert_eq!(layer.evaluate(&noise, p, 0.0), 0.0);
        }
    }

    #[test]
    fn test_mask_multiplies_by_positive_first_layer() {
        let noise = SimplexNoise::new(11);
        let layer = NoiseLayerConfig {
            use_first_layer_as_mask: true,
            use_floor: true,
            floor_value: -2.0,
            ..Default::default()
        };
        let p = Vec3::new(0.4, 0.9, -0.6);

        let unmasked = layer.evaluate(&noise, p, 0.0);
        let masked = layer.evaluate(&noise, p, 0.5);
        assert!((masked - unmasked * 0.5).abs() < 1e-6);

        // Non-positive mask values leave the output untouched.
        let zero_mask = layer.evaluate(&noise, p, -1.0);
        assert!((zero_mask - unmasked).abs() < 1e-6);
    }

    #[test]
    fn test_strength_scales_output() {
        let noise = SimplexNoise::new(21);
        let weak = NoiseLayerConfig {
            use_floor: true,
            floor_value: -2.0,
            strength: 1.0,
            ..Default::default()
        };
        let strong = NoiseLayerConfig {
            strength: 4.0,
            ..weak.clone()
        };
        let p = Vec3::new(1.0, 0.5, 0.25);
        assert!((strong.evaluate(&noise, p, 0.0) - 4.0 * weak.evaluate(&noise, p, 0.0)).abs() < 1e-5);
    }

    #[test]
    fn test_stack_sums_and_masks() {
        let first = NoiseLayerConfig {
            use_floor: true,
            floor_value: -2.0,
            ..Default::default()
        };
        let second = NoiseLayerConfig {
            use_first_layer_as_mask: true,
            use_floor: true,
            floor_value: -2.0,
            ..Default::default()
        };
        let arena = arena_with(vec![first, second]);
        let p = Vec3::new(3.0, 1.0, -2.0);

        let full = arena.evaluate_stack(LayerRange::new(0, 2), p);
        let first_only = arena.evaluate_stack(LayerRange::new(0, 1), p);
        assert!(full >= first_only, "stack lost the first layer");
    }

    #[test]
    fn test_empty_range_is_zero() {
        let arena = arena_with(vec![NoiseLayerConfig::default()]);
        assert_eq!(arena.evaluate_stack(LayerRange::EMPTY, Vec3::ONE), 0.0);
    }
}
