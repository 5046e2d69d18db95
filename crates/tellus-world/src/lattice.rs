//! The per-chunk density sample lattice.

use glam::IVec3;

/// A cubic lattice of `(resolution + 1)³` density samples.
///
/// Samples sit at cell corners; the cube count per edge is `resolution`.
/// Layout is x-fastest: index `(z * side + y) * side + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityLattice {
    resolution: usize,
    samples: Vec<f32>,
}

impl DensityLattice {
    /// Creates a zero-filled lattice for the given cube resolution.
    #[must_use]
    pub fn new(resolution: usize) -> Self {
        let side = resolution + 1;
        Self {
            resolution,
            samples: vec![0.0; side * side * side],
        }
    }

    /// Cubes per edge.
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Samples per edge (`resolution + 1`).
    #[must_use]
    pub fn side(&self) -> usize {
        self.resolution + 1
    }

    /// Linear index of a lattice position.
    #[must_use]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        let side = self.side();
        debug_assert!(x < side && y < side && z < side);
        (z * side + y) * side + x
    }

    /// Lattice position of a linear index.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn position(&self, index: usize) -> IVec3 {
        let side = self.side();
        IVec3::new(
            (index % side) as i32,
            ((index / side) % side) as i32,
            (index / (side * side)) as i32,
        )
    }

    /// Sample at a lattice position.
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.index(x, y, z)]
    }

    /// Writes a sample at a lattice position.
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let i = self.index(x, y, z);
        self.samples[i] = value;
    }

    /// All samples, x-fastest.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable access to all samples.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Derives the solidity flags in one pass.
    ///
    /// Returns `(all_solid, all_empty)`: all solid when no sample is
    /// negative, all empty when no sample is non-negative.
    #[must_use]
    pub fn derive_flags(&self) -> (bool, bool) {
        let mut any_empty = false;
        let mut any_solid = false;
        for &s in &self.samples {
            if s < 0.0 {
                any_empty = true;
            } else {
                any_solid = true;
            }
            if any_empty && any_solid {
                break;
            }
        }
        (!any_empty, !any_solid)
    }

    /// Trilinear interpolation at a fractional lattice position.
    ///
    /// The position is clamped to the lattice bounds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn sample_trilinear(&self, pos: glam::Vec3) -> f32 {
        let max = self.resolution as f32;
        let p = pos.clamp(glam::Vec3::ZERO, glam::Vec3::splat(max));
        let base = p.floor().min(glam::Vec3::splat(max - 1.0)).max(glam::Vec3::ZERO);
        let t = p - base;
        let (x, y, z) = (base.x as usize, base.y as usize, base.z as usize);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let x00 = lerp(self.get(x, y, z), self.get(x + 1, y, z), t.x);
        let x10 = lerp(self.get(x, y + 1, z), self.get(x + 1, y + 1, z), t.x);
        let x01 = lerp(self.get(x, y, z + 1), self.get(x + 1, y, z + 1), t.x);
        let x11 = lerp(self.get(x, y + 1, z + 1), self.get(x + 1, y + 1, z + 1), t.x);
        let y0 = lerp(x00, x10, t.y);
        let y1 = lerp(x01, x11, t.y);
        lerp(y0, y1, t.z)
    }
}
