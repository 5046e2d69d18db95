//! # Tellus World
//!
//! Chunked world management for the Tellus planet engine.
//!
//! This crate handles:
//! - The per-chunk density lattice and its lifecycle
//! - Shared boundary samples so neighboring chunks agree bitwise
//! - Streaming chunks around a moving viewpoint with a worker pool
//! - In-place terrain modification with dirty-region re-meshing
//! - Sparse modification records for persistence

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod boundary;
pub mod chunk;
pub mod lattice;
pub mod persist;
pub mod streamer;
pub mod worker;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::boundary::SharedBoundaryStore;
    pub use crate::chunk::{Chunk, MeshOutcome};
    pub use crate::lattice::DensityLattice;
    pub use crate::persist::ModificationRecord;
    pub use crate::streamer::{ChunkStreamer, StreamConfig, StreamEvent, StreamerStats};
    pub use crate::worker::{CancelFlag, WorkerJob, WorkerPool, WorkerResult};
}

pub use prelude::*;
