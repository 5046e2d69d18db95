//! Error types for the Tellus engine.

use thiserror::Error;

/// Top-level error type for Tellus operations.
#[derive(Debug, Error)]
pub enum TellusError {
    /// Configuration errors (the only kind that crosses the public API)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Chunk-level errors
    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration validation errors. These are fatal at engine init.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Chunk resolution outside the supported range
    #[error("Chunk resolution {value} outside supported range [{min}, {max}]")]
    Resolution {
        /// Configured value
        value: i32,
        /// Minimum supported resolution
        min: i32,
        /// Maximum supported resolution
        max: i32,
    },

    /// Planet radius must be positive
    #[error("Planet radius must be positive, got {0}")]
    Radius(f32),

    /// Chunk size must be positive
    #[error("Chunk size must be positive, got {0}")]
    ChunkSize(f32),

    /// Surface blend distance must be positive
    #[error("Surface blend distance must be positive, got {0}")]
    BlendDistance(f32),

    /// Unload distance must be strictly greater than load distance
    #[error("Unload distance {unload} must exceed load distance {load}")]
    StreamDistances {
        /// Configured load distance
        load: f32,
        /// Configured unload distance
        unload: f32,
    },

    /// Inconsistent biome configuration
    #[error("Invalid biome configuration: {0}")]
    Biomes(String),

    /// Inconsistent cave configuration
    #[error("Invalid cave configuration: {0}")]
    Caves(String),

    /// Failed to read a configuration file
    #[error("Failed to read configuration: {0}")]
    Read(String),

    /// Failed to parse a configuration file
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Chunk pipeline errors. All are recovered internally.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// The chunk task was cancelled mid-generation
    #[error("Chunk generation cancelled")]
    Cancelled,

    /// Mesh exceeded the 32-bit index budget
    #[error("Mesh vertex count {vertices} exceeds the 32-bit index budget")]
    IndexOverflow {
        /// Number of vertices the mesh would need
        vertices: usize,
    },

    /// Encoding a modification record failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Decoding a modification record failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Record magic bytes did not match
    #[error("Invalid modification record format")]
    InvalidFormat,

    /// Record schema version is unsupported
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: u16,
        /// Actual version
        actual: u16,
    },

    /// Compression or decompression failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
}

/// Result type alias for Tellus operations.
pub type TellusResult<T> = Result<T, TellusError>;
