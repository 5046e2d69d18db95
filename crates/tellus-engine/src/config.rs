//! Engine configuration.
//!
//! All parameters of the planet, chunking, streaming, terrain layers,
//! biomes, and caves. Configuration can be loaded from and saved to a TOML
//! file; validation runs at engine init and is the only failure that
//! crosses the public API.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tellus_common::ConfigError;
use tellus_worldgen::biome::{BiomeConfig, BiomeSelectionConfig};
use tellus_worldgen::caves::CaveConfig;
use tellus_worldgen::density::PlanetShape;
use tellus_worldgen::layers::NoiseLayerConfig;
use tellus_world::streamer::StreamConfig;
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "tellus.toml";

/// Minimum supported chunk resolution.
pub const MIN_RESOLUTION: i32 = 4;
/// Maximum supported chunk resolution.
pub const MAX_RESOLUTION: i32 = 64;

/// Chunk partition parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Chunk side length in world units.
    pub size: f32,
    /// Voxels per chunk edge.
    pub resolution: i32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 16.0,
            resolution: 16,
        }
    }
}

/// Biome list plus the selector that blends it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BiomesConfig {
    /// Ordered biome list. Empty disables biome selection entirely.
    pub biomes: Vec<BiomeConfig>,
    /// Selection noise and blend parameters.
    pub selection: BiomeSelectionConfig,
}

/// Engine configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// World seed; the entire world is a pure function of (seed, config).
    pub seed: i32,
    /// Planet geometry.
    pub planet: PlanetShape,
    /// Chunk partition.
    pub chunk: ChunkConfig,
    /// Streaming behavior.
    pub stream: StreamConfig,
    /// Shared arena of terrain noise layers. With no biomes configured the
    /// whole list acts as the global terrain stack; biome layer ranges
    /// index into this same list.
    pub terrain_layers: Vec<NoiseLayerConfig>,
    /// Biome list and selection.
    pub biomes: BiomesConfig,
    /// Cave carving.
    pub caves: CaveConfig,
}

impl EngineConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found; the engine cannot start on
    /// any of them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.chunk.resolution) {
            return Err(ConfigError::Resolution {
                value: self.chunk.resolution,
                min: MIN_RESOLUTION,
                max: MAX_RESOLUTION,
            });
        }
        if self.planet.radius <= 0.0 || !self.planet.radius.is_finite() {
            return Err(ConfigError::Radius(self.planet.radius));
        }
        if self.chunk.size <= 0.0 || !self.chunk.size.is_finite() {
            return Err(ConfigError::ChunkSize(self.chunk.size));
        }
        if self.planet.surface_blend_distance <= 0.0 {
            return Err(ConfigError::BlendDistance(self.planet.surface_blend_distance));
        }
        if self.stream.unload_distance <= self.stream.load_distance {
            return Err(ConfigError::StreamDistances {
                load: self.stream.load_distance,
                unload: self.stream.unload_distance,
            });
        }

        for (i, biome) in self.biomes.biomes.iter().enumerate() {
            let range = biome.layers;
            if !range.is_empty() && range.start + range.len > self.terrain_layers.len() {
                return Err(ConfigError::Biomes(format!(
                    "biome {i} ({}) references layers {}..{} but only {} exist",
                    biome.name,
                    range.start,
                    range.start + range.len,
                    self.terrain_layers.len()
                )));
            }
            if !biome.height_multiplier.is_finite() || !biome.height_offset.is_finite() {
                return Err(ConfigError::Biomes(format!(
                    "biome {i} ({}) has non-finite height parameters",
                    biome.name
                )));
            }
        }
        if !self.biomes.biomes.is_empty() {
            if self.biomes.selection.blend_width < 0.0 {
                return Err(ConfigError::Biomes(format!(
                    "negative blend width {}",
                    self.biomes.selection.blend_width
                )));
            }
            if self.biomes.selection.contrast <= 0.0 {
                return Err(ConfigError::Biomes(format!(
                    "contrast must be positive, got {}",
                    self.biomes.selection.contrast
                )));
            }
        }

        if self.caves.enabled {
            if self.caves.min_depth >= self.caves.max_depth {
                return Err(ConfigError::Caves(format!(
                    "min_depth {} must be below max_depth {}",
                    self.caves.min_depth, self.caves.max_depth
                )));
            }
            if !(0.0..1.0).contains(&self.caves.threshold) {
                return Err(ConfigError::Caves(format!(
                    "threshold {} outside [0, 1)",
                    self.caves.threshold
                )));
            }
            if self.caves.cell_size <= 0.0 {
                return Err(ConfigError::Caves(format!(
                    "cell size must be positive, got {}",
                    self.caves.cell_size
                )));
            }
        }

        Ok(())
    }

    /// Loads configuration from the default file location.
    ///
    /// Returns defaults if the file doesn't exist or is invalid.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// Returns defaults if the file doesn't exist or is invalid.
    #[must_use]
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            }
        }
    }

    /// Saves configuration to the default file location.
    ///
    /// # Errors
    /// Propagates filesystem errors.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    /// Propagates filesystem and encoding errors.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// The default configuration file path.
    fn config_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_worldgen::layers::LayerRange;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_resolution_bounds() {
        let mut config = EngineConfig::default();
        config.chunk.resolution = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Resolution { .. })
        ));
        config.chunk.resolution = 65;
        assert!(config.validate().is_err());
        config.chunk.resolution = 4;
        assert!(config.validate().is_ok());
        config.chunk.resolution = 64;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let mut config = EngineConfig::default();
        config.planet.radius = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Radius(_))));
        config.planet.radius = -5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_hysteresis_required() {
        let mut config = EngineConfig::default();
        config.stream.load_distance = 100.0;
        config.stream.unload_distance = 100.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StreamDistances { .. })
        ));
        config.stream.unload_distance = 100.1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_biome_layer_range_checked() {
        let mut config = EngineConfig::default();
        config.terrain_layers = vec![NoiseLayerConfig::default()];
        config.biomes.biomes = vec![BiomeConfig {
            name: "broken".into(),
            layers: LayerRange::new(0, 2),
            ..Default::default()
        }];
        assert!(matches!(config.validate(), Err(ConfigError::Biomes(_))));

        config.biomes.biomes[0].layers = LayerRange::new(0, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cave_config_checked() {
        let mut config = EngineConfig::default();
        config.caves.enabled = true;
        config.caves.min_depth = 40.0;
        config.caves.max_depth = 10.0;
        assert!(matches!(config.validate(), Err(ConfigError::Caves(_))));

        config.caves.min_depth = 5.0;
        config.caves.max_depth = 40.0;
        config.caves.threshold = 1.0;
        assert!(config.validate().is_err());

        config.caves.threshold = 0.3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tellus.toml");

        let mut config = EngineConfig::default();
        config.seed = 12345;
        config.planet.radius = 250.0;
        config.terrain_layers = vec![NoiseLayerConfig {
            frequency: 0.05,
            strength: 8.0,
            ..Default::default()
        }];
        config.save_to(&path).expect("save");

        let loaded = EngineConfig::load_from(&path);
        assert_eq!(loaded.seed, 12345);
        assert_eq!(loaded.planet.radius, 250.0);
        assert_eq!(loaded.terrain_layers.len(), 1);
        assert_eq!(loaded.terrain_layers[0].strength, 8.0);
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let config = EngineConfig::load_from("/nonexistent/path/tellus.toml");
        assert_eq!(config.seed, EngineConfig::default().seed);
    }

    #[test]
    fn test_toml_serialization_contains_sections() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).expect("serialize");
        assert!(toml_str.contains("[planet]"));
        assert!(toml_str.contains("[chunk]"));
        assert!(toml_str.contains("[stream]"));
        assert!(toml_str.contains("[caves]"));
    }
}
