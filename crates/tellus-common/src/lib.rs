//! # Tellus Common
//!
//! Common types, utilities, and shared abstractions for the Tellus
//! voxel planet engine.
//!
//! This crate provides foundational types used across all Tellus subsystems:
//! - Coordinate types (chunk, axis, face direction)
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
}

pub use prelude::*;
