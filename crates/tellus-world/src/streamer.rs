//! Chunk streaming around a moving viewpoint.
//!
//! The streamer owns all chunk bookkeeping on the control thread: the
//! active map, the pending and in-progress sets (mutually disjoint), the
//! distance-sorted generation queue, and the mesh queue. CPU-heavy work is
//! dispatched to the worker pool under per-tick budgets; results are
//! integrated back here, and mesh lifecycle events are handed to the host.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tellus_common::ChunkCoord;
use tellus_mesh::utils::SurfaceSampleParams;
use tellus_worldgen::density::DensityField;
use tracing::{debug, info};

use crate::boundary::SharedBoundaryStore;
use crate::chunk::{Chunk, MeshOutcome};
use crate::worker::{CancelFlag, WorkerJob, WorkerPool, WorkerResult};

/// Streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Chunks whose center is within this distance of the viewpoint load.
    pub load_distance: f32,
    /// Chunks unload only once their center strictly exceeds this distance.
    /// Must be greater than `load_distance` (hysteresis).
    pub unload_distance: f32,
    /// Density generations dispatched per tick.
    pub chunks_per_frame: usize,
    /// Mesh generations dispatched per tick.
    pub meshes_per_frame: usize,
    /// Seconds between search sweeps (a chunk-boundary crossing also
    /// triggers one).
    pub search_interval_s: f32,
    /// Worker threads; 0 picks a count from the available parallelism.
    pub worker_threads: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            load_distance: 80.0,
            unload_distance: 120.0,
            chunks_per_frame: 4,
            meshes_per_frame: 4,
            search_interval_s: 0.5,
            worker_threads: 0,
        }
    }
}

/// Mesh lifecycle notifications for the host, emitted on the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// The chunk has a fresh mesh ready for display/collision.
    MeshReady(ChunkCoord),
    /// The chunk's mesh was removed.
    MeshCleared(ChunkCoord),
}

/// Public streaming statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamerStats {
    /// Chunks currently active.
    pub active: usize,
    /// Chunks waiting to be generated.
    pub pending: usize,
    /// Chunks currently being materialized on workers.
    pub in_progress: usize,
    /// Chunks queued or in flight for meshing.
    pub mesh_queue: usize,
    /// Cumulative generated chunk count.
    pub total_generated: u64,
    /// Cumulative unloaded chunk count.
    pub total_unloaded: u64,
}

/// Streams chunks around a moving viewpoint.
pub struct ChunkStreamer {
    config: StreamConfig,
    chunk_size: f32,
    field: Arc<DensityField>,
    store: Arc<SharedBoundaryStore>,
    pool: WorkerPool,
    sample_params: SurfaceSampleParams,

    chunks: HashMap<ChunkCoord, Chunk>,
    pending: HashSet<ChunkCoord>,
    /// Pending coordinates sorted farthest-first; `pop` yields the nearest.
    queue: Vec<ChunkCoord>,
    queue_dirty: bool,
    queue_viewpoint: Vec3,
    in_progress: HashMap<ChunkCoord, CancelFlag>,
    mesh_queue: VecDeque<ChunkCoord>,
    /// Mesh jobs in flight: chunk -> lattice revision at snapshot time.
    mesh_in_flight: HashMap<ChunkCoord, u64>,

    viewpoint: Vec3,
    last_search_chunk: Option<ChunkCoord>,
    search_timer: f32,
    total_generated: u64,
    total_unloaded: u64,
}

impl ChunkStreamer {
    /// Creates a streamer over the given field and boundary store.
    #[must_use]
    pub fn new(
        config: StreamConfig,
        resolution: usize,
        chunk_size: f32,
        field: Arc<DensityField>,
        store: Arc<SharedBoundaryStore>,
        sample_params: SurfaceSampleParams,
    ) -> Self {
        let threads = if config.worker_threads > 0 {
            config.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(2))
                .unwrap_or(2)
        };
        info!(
            "Creating chunk streamer: load={}, unload={}, workers={threads}",
            config.load_distance, config.unload_distance
        );

        let pool = WorkerPool::new(
            threads,
            Arc::clone(&field),
            Arc::clone(&store),
            resolution,
            chunk_size,
            sample_params,
        );

        Self {
            config,
            chunk_size,
            field,
            store,
            pool,
            sample_params,
            chunks: HashMap::new(),
            pending: HashSet::new(),
            queue: Vec::new(),
            queue_dirty: false,
            queue_viewpoint: Vec3::ZERO,
            in_progress: HashMap::new(),
            mesh_queue: VecDeque::new(),
            mesh_in_flight: HashMap::new(),
            viewpoint: Vec3::ZERO,
            last_search_chunk: None,
            search_timer: 0.0,
            total_generated: 0,
            total_unloaded: 0,
        }
    }

    /// The streaming configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The current viewpoint.
    #[must_use]
    pub fn viewpoint(&self) -> Vec3 {
        self.viewpoint
    }

    /// Updates the viewpoint. Called by the host every tick.
    pub fn set_viewpoint(&mut self, position: Vec3) {
        self.viewpoint = position;
    }

    /// Advances the streamer by one tick.
    ///
    /// Runs the search and unload sweeps, integrates finished worker
    /// results, and dispatches new work under the per-tick budgets.
    /// Returns the mesh lifecycle events produced this tick.
    pub fn tick(&mut self, dt: f32) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        self.search_timer += dt;
        let viewpoint_chunk = ChunkCoord::from_world_pos(self.viewpoint, self.chunk_size);
        let crossed = self.last_search_chunk != Some(viewpoint_chunk);
        if crossed || self.search_timer >= self.config.search_interval_s {
            self.search_timer = 0.0;
            self.search_sweep(viewpoint_chunk);
        }

        self.unload_sweep(&mut events);
        self.integrate_results(&mut events);
        self.rebuild_queue_if_needed();
        self.dispatch_density_jobs(self.config.chunks_per_frame);
        self.dispatch_mesh_jobs(self.config.meshes_per_frame);

        events
    }

    /// Ticks repeatedly until all queues drain or the deadline passes.
    ///
    /// Intended for tests and teardown, where the caller wants the world
    /// fully materialized rather than budgeted across frames.
    pub fn process_until_settled(&mut self, max_wait: Duration) -> Vec<StreamEvent> {
        let deadline = Instant::now() + max_wait;
        let mut events = Vec::new();
        loop {
            events.extend(self.tick(self.config.search_interval_s));
            let idle = self.pending.is_empty()
                && self.in_progress.is_empty()
                && self.mesh_queue.is_empty()
                && self.mesh_in_flight.is_empty();
            if idle || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        events
    }

    /// Applies a spherical terrain edit to every intersecting chunk.
    ///
    /// Dirtied chunks are queued for re-meshing under the per-frame budget;
    /// with `immediate` set they are re-meshed synchronously before
    /// returning (collider refresh). Returns whether any chunk was dirtied
    /// plus the events produced by immediate re-meshing.
    pub fn modify_terrain(
        &mut self,
        center: Vec3,
        radius: f32,
        strength: f32,
        immediate: bool,
    ) -> (bool, Vec<StreamEvent>) {
        let mut events = Vec::new();
        let affected: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|c| c.intersects_sphere(self.chunk_size, center, radius))
            .copied()
            .collect();

        let mut any_dirtied = false;
        for coord in affected {
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };
            if !chunk.modify(center, radius, strength) {
                continue;
            }
            any_dirtied = true;
            debug!("Edit dirtied chunk {coord}");

            if immediate {
                let had_mesh = chunk.mesh().is_some();
                match chunk.generate_mesh(&self.field, &self.sample_params) {
                    MeshOutcome::Ready => events.push(StreamEvent::MeshReady(coord)),
                    MeshOutcome::Cleared => {
                        if had_mesh {
                            events.push(StreamEvent::MeshCleared(coord));
                        }
                    }
                }
            } else {
                self.push_mesh_queue(coord);
            }
        }

        (any_dirtied, events)
    }

    /// Invalidates shared boundaries and regenerates one chunk's densities.
    ///
    /// The chunk is queued for re-meshing. Returns false when the chunk is
    /// not loaded.
    pub fn regenerate_chunk(&mut self, coord: ChunkCoord) -> bool {
        if !self.chunks.contains_key(&coord) {
            return false;
        }
        self.store.invalidate(coord);
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        match chunk.generate_density_field(&self.store, &self.field, None) {
            Ok(()) => {
                self.push_mesh_queue(coord);
                true
            }
            Err(err) => {
                debug!("Regeneration of chunk {coord} failed: {err}");
                false
            }
        }
    }

    /// Regenerates every loaded chunk intersecting a sphere.
    ///
    /// Boundaries of all affected chunks are invalidated before any
    /// regeneration so shared samples are recomputed consistently.
    pub fn regenerate_chunks_in_radius(&mut self, center: Vec3, radius: f32) -> usize {
        let affected: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|c| c.intersects_sphere(self.chunk_size, center, radius))
            .copied()
            .collect();

        for &coord in &affected {
            self.store.invalidate(coord);
        }

        let mut regenerated = 0;
        for coord in affected {
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };
            if chunk
                .generate_density_field(&self.store, &self.field, None)
                .is_ok()
            {
                self.push_mesh_queue(coord);
                regenerated += 1;
            }
        }
        regenerated
    }

    /// Applies a persisted modification record to its loaded chunk and
    /// queues the chunk for re-meshing.
    ///
    /// Returns false when the chunk is not loaded or the record does not
    /// fit it.
    pub fn apply_record(&mut self, record: &crate::persist::ModificationRecord) -> bool {
        let Some(chunk) = self.chunks.get_mut(&record.coord) else {
            return false;
        };
        if let Err(err) = record.apply(chunk) {
            debug!("Rejected modification record for {}: {err}", record.coord);
            return false;
        }
        self.push_mesh_queue(record.coord);
        true
    }

    /// Density at a world position, honoring loaded edits.
    ///
    /// A loaded, modified chunk answers from its lattice; everywhere else
    /// the analytic field answers.
    #[must_use]
    pub fn effective_density(&self, position: Vec3) -> f32 {
        let coord = ChunkCoord::from_world_pos(position, self.chunk_size);
        if let Some(chunk) = self.chunks.get(&coord) {
            if chunk.is_modified() {
                if let Some(value) = chunk.sample_world(position) {
                    return value;
                }
            }
        }
        self.field.sample(position)
    }

    /// Returns a loaded chunk.
    #[must_use]
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Whether a chunk is active.
    #[must_use]
    pub fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Whether a chunk is waiting to be generated (pending or in progress).
    #[must_use]
    pub fn is_chunk_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains(&coord) || self.in_progress.contains_key(&coord)
    }

    /// Iterates over all active chunks.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Current streaming statistics.
    #[must_use]
    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            active: self.chunks.len(),
            pending: self.pending.len(),
            in_progress: self.in_progress.len(),
            mesh_queue: self.mesh_queue.len() + self.mesh_in_flight.len(),
            total_generated: self.total_generated,
            total_unloaded: self.total_unloaded,
        }
    }

    /// Enumerates candidate coordinates around the viewpoint and adds the
    /// survivors to the pending set.
    #[allow(clippy::cast_possible_truncation)]
    fn search_sweep(&mut self, viewpoint_chunk: ChunkCoord) {
        let shape = self.field.shape();
        let planet_center = shape.center_vec();
        let diag = self.chunk_size * 3.0f32.sqrt();
        let shell_min = shape.radius - shape.max_terrain_depth - diag;
        let shell_max = shape.radius + shape.max_terrain_height + diag;

        let radius_chunks = (self.config.load_distance / self.chunk_size).ceil() as i32 + 1;
        let mut added = 0usize;

        for dz in -radius_chunks..=radius_chunks {
            for dy in -radius_chunks..=radius_chunks {
                for dx in -radius_chunks..=radius_chunks {
                    let coord = viewpoint_chunk.offset(dx, dy, dz);
                    if self.chunks.contains_key(&coord)
                        || self.pending.contains(&coord)
                        || self.in_progress.contains_key(&coord)
                    {
                        continue;
                    }

                    let center = coord.world_center(self.chunk_size);
                    if center.distance(self.viewpoint) > self.config.load_distance {
                        continue;
                    }
                    let radial = center.distance(planet_center);
                    if radial < shell_min || radial > shell_max {
                        continue;
                    }

                    self.pending.insert(coord);
                    added += 1;
                }
            }
        }

        if added > 0 {
            debug!("Search sweep queued {added} chunks");
            self.queue_dirty = true;
        }
        self.last_search_chunk = Some(viewpoint_chunk);
    }

    /// Unloads active chunks beyond the unload distance and cancels
    /// in-progress work that drifted out of range.
    fn unload_sweep(&mut self, events: &mut Vec<StreamEvent>) {
        let unload = self.config.unload_distance;
        let viewpoint = self.viewpoint;
        let chunk_size = self.chunk_size;

        let to_unload: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|c| c.world_center(chunk_size).distance(viewpoint) > unload)
            .copied()
            .collect();

        for coord in to_unload {
            if let Some(chunk) = self.chunks.remove(&coord) {
                if chunk.mesh().is_some() {
                    events.push(StreamEvent::MeshCleared(coord));
                }
                self.total_unloaded += 1;
                self.queue_dirty = true;
                debug!("Unloaded chunk {coord}");
            }
            self.mesh_queue.retain(|c| *c != coord);
            self.mesh_in_flight.remove(&coord);
        }

        for (coord, cancel) in &self.in_progress {
            if coord.world_center(chunk_size).distance(viewpoint) > unload {
                cancel.cancel();
            }
        }

        let before = self.pending.len();
        self.pending
            .retain(|c| c.world_center(chunk_size).distance(viewpoint) <= unload);
        if self.pending.len() != before {
            self.queue_dirty = true;
        }
    }

    /// Integrates finished worker results into the active set.
    fn integrate_results(&mut self, events: &mut Vec<StreamEvent>) {
        for result in self.pool.drain_results() {
            match result {
                WorkerResult::Density { coord, lattice } => {
                    let cancelled = self
                        .in_progress
                        .remove(&coord)
                        .is_some_and(|flag| flag.is_cancelled());
                    let Some(lattice) = lattice else {
                        continue; // dropped silently per cancellation policy
                    };
                    if cancelled {
                        continue;
                    }
                    let center = coord.world_center(self.chunk_size);
                    if center.distance(self.viewpoint) > self.config.unload_distance {
                        continue;
                    }

                    let chunk = Chunk::from_lattice(coord, self.chunk_size, lattice);
                    let needs_mesh = !(chunk.all_solid() || chunk.all_empty());
                    self.chunks.insert(coord, chunk);
                    self.total_generated += 1;
                    if needs_mesh {
                        self.push_mesh_queue(coord);
                    }
                }
                WorkerResult::Mesh {
                    coord,
                    revision,
                    mesh,
                    failed,
                } => {
                    if self.mesh_in_flight.get(&coord) == Some(&revision) {
                        self.mesh_in_flight.remove(&coord);
                    }
                    let Some(chunk) = self.chunks.get_mut(&coord) else {
                        continue; // unloaded while meshing
                    };
                    if chunk.revision() != revision {
                        continue; // stale snapshot; a newer re-mesh is queued
                    }
                    if failed {
                        chunk.mark_failed();
                        events.push(StreamEvent::MeshCleared(coord));
                        continue;
                    }

                    let had_mesh = chunk.mesh().is_some();
                    let (mesh_data, points) = match mesh {
                        Some((m, p)) => (Some(m), p),
                        None => (None, Vec::new()),
                    };
                    match chunk.set_mesh(mesh_data, points) {
                        MeshOutcome::Ready => events.push(StreamEvent::MeshReady(coord)),
                        MeshOutcome::Cleared => {
                            if had_mesh {
                                events.push(StreamEvent::MeshCleared(coord));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Rebuilds the distance-sorted queue when it is stale.
    fn rebuild_queue_if_needed(&mut self) {
        let moved = self.viewpoint.distance(self.queue_viewpoint) >= 0.5 * self.chunk_size;
        if !self.queue_dirty && !moved {
            return;
        }

        self.queue = self.pending.iter().copied().collect();
        let viewpoint = self.viewpoint;
        let chunk_size = self.chunk_size;
        // Farthest first, so popping from the back yields the nearest.
        self.queue.sort_by(|a, b| {
            let da = a.center_distance_squared(chunk_size, viewpoint);
            let db = b.center_distance_squared(chunk_size, viewpoint);
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });
        self.queue_viewpoint = viewpoint;
        self.queue_dirty = false;
    }

    /// Moves up to `budget` coordinates from pending to in-progress.
    fn dispatch_density_jobs(&mut self, budget: usize) {
        let mut dispatched = 0;
        while dispatched < budget {
            let Some(coord) = self.queue.pop() else {
                break;
            };
            if !self.pending.remove(&coord) {
                continue; // pruned since the queue was built
            }

            let cancel = CancelFlag::new();
            if self.pool.submit(WorkerJob::Density {
                coord,
                cancel: cancel.clone(),
            }) {
                self.in_progress.insert(coord, cancel);
                dispatched += 1;
            } else {
                // Queue full; try again next tick.
                self.pending.insert(coord);
                self.queue.push(coord);
                break;
            }
        }
    }

    /// Dispatches up to `budget` mesh jobs from the mesh queue.
    fn dispatch_mesh_jobs(&mut self, budget: usize) {
        let mut dispatched = 0;
        while dispatched < budget {
            let Some(coord) = self.mesh_queue.pop_front() else {
                break;
            };
            let Some(chunk) = self.chunks.get(&coord) else {
                continue; // unloaded while queued
            };

            let revision = chunk.revision();
            if self.mesh_in_flight.get(&coord) == Some(&revision) {
                continue; // identical snapshot already in flight
            }

            if self.pool.submit(WorkerJob::Mesh {
                coord,
                revision,
                lattice: chunk.snapshot_lattice(),
            }) {
                self.mesh_in_flight.insert(coord, revision);
                dispatched += 1;
            } else {
                self.mesh_queue.push_front(coord);
                break;
            }
        }
    }

    /// Queues a chunk for re-meshing, deduplicating repeats.
    fn push_mesh_queue(&mut self, coord: ChunkCoord) {
        if !self.mesh_queue.contains(&coord) {
            self.mesh_queue.push_back(coord);
        }
    }
}

impl std::fmt::Debug for ChunkStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStreamer")
            .field("active", &self.chunks.len())
            .field("pending", &self.pending.len())
            .field("in_progress", &self.in_progress.len())
            .field("mesh_queue", &self.mesh_queue.len())
            .field("viewpoint", &self.viewpoint)
            .finish_non_exhaustive()
    }
}
