//! Shared chunk-boundary sample store.
//!
//! Neighboring chunks share the density samples on their common faces,
//! edges, and corners. Samples are computed once under the owning key's
//! critical section and read by every chunk that touches the boundary
//! (up to 2 per face, 4 per edge, 8 per corner).
//!
//! Ownership convention: the chunk with the lower coordinate on an axis
//! owns the boundary. A face between `c` and `c + e_axis` is keyed by
//! `(c, axis)`; edges and corners are keyed by their minimum lattice
//! position, which all sharing chunks compute identically.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use glam::{IVec3, Vec3};
use std::sync::atomic::{AtomicU64, Ordering};
use tellus_common::{Axis, ChunkCoord, FaceDir};
use tellus_mesh::tables::{CORNER_OFFSETS, EDGE_CORNERS};

/// Key for an edge run of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey {
    /// Minimum lattice position the edge reaches.
    origin: IVec3,
    /// Axis the edge runs along.
    axis: Axis,
}

/// Key for a face grid of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceKey {
    /// Chunk owning the positive face.
    owner: ChunkCoord,
    /// Axis the face is perpendicular to.
    axis: Axis,
}

/// A value stamped with the store epoch it was computed under.
#[derive(Debug, Clone)]
struct Stamped<T> {
    epoch: u64,
    value: T,
}

/// Process-scoped store of density samples on chunk boundaries.
#[derive(Debug)]
pub struct SharedBoundaryStore {
    resolution: i32,
    voxel_step: f32,
    corners: DashMap<IVec3, Stamped<f32>>,
    edges: DashMap<EdgeKey, Stamped<Vec<f32>>>,
    faces: DashMap<FaceKey, Stamped<Vec<f32>>>,
    epoch: AtomicU64,
}

impl SharedBoundaryStore {
    /// Creates a store for the given chunk resolution and size.
    #[must_use]
    pub fn new(resolution: i32, chunk_size: f32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let voxel_step = chunk_size / resolution as f32;
        Self {
            resolution,
            voxel_step,
            corners: DashMap::new(),
            edges: DashMap::new(),
            faces: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    /// Samples per chunk edge minus one.
    #[must_use]
    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    /// World distance between adjacent lattice samples.
    #[must_use]
    pub fn voxel_step(&self) -> f32 {
        self.voxel_step
    }

    /// World position of a lattice-space point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lattice_to_world(&self, lattice: IVec3) -> Vec3 {
        lattice.as_vec3() * self.voxel_step
    }

    /// Current configuration epoch. Entries stamped with an older epoch are
    /// stale and recomputed on access.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Bumps the epoch, marking every cached sample stale.
    ///
    /// Call when the seed or density configuration changes.
    pub fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the density at one of a chunk's 8 corners, computing and
    /// caching it if absent.
    ///
    /// `corner` indexes the corners in marching-cubes order.
    pub fn get_or_create_corner(
        &self,
        chunk: ChunkCoord,
        corner: usize,
        density: impl Fn(Vec3) -> f32,
    ) -> f32 {
        let offset = CORNER_OFFSETS[corner];
        let key = chunk.lattice_origin(self.resolution)
            + IVec3::from_array(offset) * self.resolution;
        let epoch = self.epoch();

        match self.corners.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().epoch == epoch {
                    entry.get().value
                } else {
                    let value = density(self.lattice_to_world(key));
                    entry.insert(Stamped { epoch, value });
                    value
                }
            }
            Entry::Vacant(entry) => {
                let value = density(self.lattice_to_world(key));
                entry.insert(Stamped { epoch, value });
                value
            }
        }
    }

    /// Returns the `resolution + 1` densities along one of a chunk's 12
    /// edges (endpoints included), computing and caching them if absent.
    ///
    /// `edge` indexes the edges in marching-cubes order; the run is ordered
    /// from the edge's minimum lattice position along the positive axis.
    pub fn get_or_create_edge(
        &self,
        chunk: ChunkCoord,
        edge: usize,
        density: impl Fn(Vec3) -> f32,
    ) -> Vec<f32> {
        let key = self.edge_key(chunk, edge);
        let epoch = self.epoch();

        match self.edges.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().epoch == epoch {
                    entry.get().value.clone()
                } else {
                    let value = self.sample_edge(key, &density);
                    entry.insert(Stamped {
                        epoch,
                        value: value.clone(),
                    });
                    value
                }
            }
            Entry::Vacant(entry) => {
                let value = self.sample_edge(key, &density);
                entry.insert(Stamped {
                    epoch,
                    value: value.clone(),
                });
                value
            }
        }
    }

    /// Returns the `(resolution + 1)²` density grid of a chunk face,
    /// computing and caching it if absent.
    ///
    /// A negative-direction request resolves to the positive face of the
    /// neighbor below on that axis. The grid is ordered `v`-major over the
    /// face's two remaining axes in `Axis::others` order.
    pub fn get_or_create_face(
        &self,
        chunk: ChunkCoord,
        face: FaceDir,
        density: impl Fn(Vec3) -> f32,
    ) -> Vec<f32> {
        let key = self.face_key(chunk, face);
        let epoch = self.epoch();

        match self.faces.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().epoch == epoch {
                    entry.get().value.clone()
                } else {
                    let value = self.sample_face(key, &density);
                    entry.insert(Stamped {
                        epoch,
                        value: value.clone(),
                    });
                    value
                }
            }
            Entry::Vacant(entry) => {
                let value = self.sample_face(key, &density);
                entry.insert(Stamped {
                    epoch,
                    value: value.clone(),
                });
                value
            }
        }
    }

    /// Removes every corner, edge, and face entry touching the chunk.
    pub fn invalidate(&self, chunk: ChunkCoord) {
        for corner in 0..CORNER_OFFSETS.len() {
            let offset = CORNER_OFFSETS[corner];
            let key = chunk.lattice_origin(self.resolution)
                + IVec3::from_array(offset) * self.resolution;
            self.corners.remove(&key);
        }
        for edge in 0..EDGE_CORNERS.len() {
            self.edges.remove(&self.edge_key(chunk, edge));
        }
        for face in FaceDir::ALL {
            self.faces.remove(&self.face_key(chunk, face));
        }
    }

    /// Empties all three tables and bumps the epoch.
    pub fn clear(&self) {
        self.corners.clear();
        self.edges.clear();
        self.faces.clear();
        self.bump_epoch();
    }

    /// Entry counts `(corners, edges, faces)` for diagnostics.
    #[must_use]
    pub fn entry_counts(&self) -> (usize, usize, usize) {
        (self.corners.len(), self.edges.len(), self.faces.len())
    }

    /// Canonical key for a chunk edge.
    fn edge_key(&self, chunk: ChunkCoord, edge: usize) -> EdgeKey {
        let [a, b] = EDGE_CORNERS[edge];
        let ca = IVec3::from_array(CORNER_OFFSETS[a]);
        let cb = IVec3::from_array(CORNER_OFFSETS[b]);
        let min = ca.min(cb);
        let delta = (ca - cb).abs();
        let axis = if delta.x == 1 {
            Axis::X
        } else if delta.y == 1 {
            Axis::Y
        } else {
            Axis::Z
        };
        EdgeKey {
            origin: chunk.lattice_origin(self.resolution) + min * self.resolution,
            axis,
        }
    }

    /// Canonical key for a chunk face.
    fn face_key(&self, chunk: ChunkCoord, face: FaceDir) -> FaceKey {
        let axis = face.axis();
        let owner = if face.is_positive() {
            chunk
        } else {
            chunk.neighbor(axis, false)
        };
        FaceKey { owner, axis }
    }

    /// Samples the run of densities along an edge key.
    fn sample_edge(&self, key: EdgeKey, density: &impl Fn(Vec3) -> f32) -> Vec<f32> {
        let step = key.axis.unit();
        (0..=self.resolution)
            .map(|i| density(self.lattice_to_world(key.origin + step * i)))
            .collect()
    }

    /// Samples the grid of densities on a face key.
    fn sample_face(&self, key: FaceKey, density: &impl Fn(Vec3) -> f32) -> Vec<f32> {
        let base = key.owner.lattice_origin(self.resolution) + key.axis.unit() * self.resolution;
        let [u_axis, v_axis] = key.axis.others();
        let (u_step, v_step) = (u_axis.unit(), v_axis.unit());

        let side = self.resolution + 1;
        let mut grid = Vec::with_capacity((side * side) as usize);
        for v in 0..side {
            for u in 0..side {
                grid.push(density(self.lattice_to_world(base + u_step * u + v_step * v)));
            }
        }
        grid
    }
}
