//! Coordinate types for chunk, lattice, and world positions.

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Chunk coordinate (identifies a cubic chunk in the world grid).
///
/// A chunk occupies the half-open world-space box
/// `[coord * size, (coord + 1) * size)` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
    /// Z coordinate in chunk space
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The origin chunk.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Returns the chunk containing the given world position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_world_pos(pos: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).floor() as i32,
            y: (pos.y / chunk_size).floor() as i32,
            z: (pos.z / chunk_size).floor() as i32,
        }
    }

    /// Returns the world position of the chunk's minimum corner.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn world_min(self, chunk_size: f32) -> Vec3 {
        Vec3::new(
            self.x as f32 * chunk_size,
            self.y as f32 * chunk_size,
            self.z as f32 * chunk_size,
        )
    }

    /// Returns the world position of the chunk's center.
    #[must_use]
    pub fn world_center(self, chunk_size: f32) -> Vec3 {
        self.world_min(chunk_size) + Vec3::splat(chunk_size * 0.5)
    }

    /// Returns the coordinate offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Returns the neighboring coordinate one step along `axis`
    /// (`+1` or `-1` per `positive`).
    #[must_use]
    pub const fn neighbor(self, axis: Axis, positive: bool) -> Self {
        let step = if positive { 1 } else { -1 };
        match axis {
            Axis::X => Self::new(self.x + step, self.y, self.z),
            Axis::Y => Self::new(self.x, self.y + step, self.z),
            Axis::Z => Self::new(self.x, self.y, self.z + step),
        }
    }

    /// Returns the coordinate as an [`IVec3`].
    #[must_use]
    pub const fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Returns the chunk's corner position in lattice space (units of one
    /// voxel), i.e. the coordinate scaled by the per-chunk resolution.
    #[must_use]
    pub const fn lattice_origin(self, resolution: i32) -> IVec3 {
        IVec3::new(
            self.x * resolution,
            self.y * resolution,
            self.z * resolution,
        )
    }

    /// Squared euclidean distance from the chunk center to a world point.
    #[must_use]
    pub fn center_distance_squared(self, chunk_size: f32, point: Vec3) -> f32 {
        self.world_center(chunk_size).distance_squared(point)
    }

    /// Tests whether the chunk's world-space box intersects a sphere.
    #[must_use]
    pub fn intersects_sphere(self, chunk_size: f32, center: Vec3, radius: f32) -> bool {
        let min = self.world_min(chunk_size);
        let max = min + Vec3::splat(chunk_size);
        let closest = center.clamp(min, max);
        closest.distance_squared(center) <= radius * radius
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Axis {
    /// All three axes, in order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Unit vector along the axis.
    #[must_use]
    pub const fn unit(self) -> IVec3 {
        match self {
            Self::X => IVec3::new(1, 0, 0),
            Self::Y => IVec3::new(0, 1, 0),
            Self::Z => IVec3::new(0, 0, 1),
        }
    }

    /// The other two axes, used to walk a face perpendicular to this one.
    #[must_use]
    pub const fn others(self) -> [Self; 2] {
        match self {
            Self::X => [Self::Y, Self::Z],
            Self::Y => [Self::X, Self::Z],
            Self::Z => [Self::X, Self::Y],
        }
    }
}

/// A signed face direction of a cubic chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceDir {
    /// Positive X face
    PosX,
    /// Negative X face
    NegX,
    /// Positive Y face
    PosY,
    /// Negative Y face
    NegY,
    /// Positive Z face
    PosZ,
    /// Negative Z face
    NegZ,
}

impl FaceDir {
    /// All six face directions.
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// The axis the face is perpendicular to.
    #[must_use]
    pub const fn axis(self) -> Axis {
        match self {
            Self::PosX | Self::NegX => Axis::X,
            Self::PosY | Self::NegY => Axis::Y,
            Self::PosZ | Self::NegZ => Axis::Z,
        }
    }

    /// Whether the face points along the positive axis direction.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::PosX | Self::PosY | Self::PosZ)
    }
}
