//! # Tellus Engine
//!
//! The host-facing facade of the Tellus voxel planet engine.
//!
//! An [`Engine`] owns the density field, the shared boundary store, and the
//! chunk streamer. The host drives it with [`Engine::set_viewpoint`] and
//! [`Engine::update`] every tick, edits terrain through
//! [`Engine::modify_terrain`], and receives triangle meshes through a
//! [`MeshSink`] it registers. Rendering and physics stay host-side: the
//! engine only hands out mesh data on the control thread.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use tellus_common::{ChunkCoord, TellusError};
use tellus_mesh::mesh::MeshData;
use tellus_mesh::utils::SurfaceSampleParams;
use tellus_worldgen::biome::BiomeSelector;
use tellus_worldgen::caves::CaveField;
use tellus_worldgen::density::DensityField;
use tellus_worldgen::layers::{LayerArena, LayerRange};
use tellus_worldgen::surface::{radial_surface_query, ray_surface_query, SurfacePoint};
use tellus_world::boundary::SharedBoundaryStore;
use tellus_world::chunk::Chunk;
use tellus_world::persist::ModificationRecord;
use tellus_world::streamer::{ChunkStreamer, StreamEvent, StreamerStats};
use tracing::info;

pub use config::EngineConfig;

/// Host callbacks for chunk mesh lifecycle, invoked on the control thread.
///
/// The host decides whether to also register each mesh as a collider.
pub trait MeshSink {
    /// A chunk has a fresh mesh ready for display.
    fn on_chunk_mesh_ready(&mut self, coord: ChunkCoord, mesh: &MeshData);
    /// A chunk's mesh was removed.
    fn on_chunk_mesh_cleared(&mut self, coord: ChunkCoord);
}

/// The Tellus voxel planet engine.
pub struct Engine {
    config: EngineConfig,
    field: Arc<DensityField>,
    store: Arc<SharedBoundaryStore>,
    streamer: ChunkStreamer,
    sink: Option<Box<dyn MeshSink>>,
}

impl Engine {
    /// Builds an engine from a validated configuration.
    ///
    /// # Errors
    /// Returns [`TellusError::Config`] when validation fails; this is the
    /// only error that crosses the public API.
    pub fn new(config: EngineConfig) -> Result<Self, TellusError> {
        config.validate()?;

        let seed = config.seed;
        let shape = config.planet;
        let arena = LayerArena::new(seed, config.terrain_layers.clone());
        let global_layers = LayerRange::new(0, arena.len());

        let biomes = (!config.biomes.biomes.is_empty()).then(|| {
            BiomeSelector::new(
                seed,
                config.biomes.biomes.clone(),
                config.biomes.selection.clone(),
            )
        });
        let caves = config.caves.enabled.then(|| {
            CaveField::new(
                seed,
                config.caves.clone(),
                shape.center_vec(),
                shape.radius,
            )
        });

        let field = Arc::new(DensityField::new(
            shape,
            arena,
            global_layers,
            biomes,
            caves,
        ));
        let store = Arc::new(SharedBoundaryStore::new(
            config.chunk.resolution,
            config.chunk.size,
        ));

        #[allow(clippy::cast_sign_loss)]
        let streamer = ChunkStreamer::new(
            config.stream.clone(),
            config.chunk.resolution as usize,
            config.chunk.size,
            Arc::clone(&field),
            Arc::clone(&store),
            SurfaceSampleParams::default(),
        );

        info!(
            "Engine initialized: seed={seed}, radius={}, resolution={}",
            shape.radius, config.chunk.resolution
        );

        Ok(Self {
            config,
            field,
            store,
            streamer,
            sink: None,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The density field (read-only host inspection).
    #[must_use]
    pub fn density_field(&self) -> &DensityField {
        &self.field
    }

    /// Registers the host's mesh callbacks.
    pub fn set_mesh_sink(&mut self, sink: Box<dyn MeshSink>) {
        self.sink = Some(sink);
    }

    /// Updates the streaming viewpoint. Called each tick by the host.
    pub fn set_viewpoint(&mut self, position: Vec3) {
        self.streamer.set_viewpoint(position);
    }

    /// Advances the engine by one tick, dispatching mesh callbacks.
    pub fn update(&mut self, dt: f32) {
        let events = self.streamer.tick(dt);
        self.dispatch_events(&events);
    }

    /// Runs the streamer until all queues drain or the deadline passes.
    ///
    /// Useful for warm-up, teardown, and tests; normal hosts should call
    /// [`Engine::update`] once per frame instead.
    pub fn settle(&mut self, max_wait: Duration) {
        let events = self.streamer.process_until_settled(max_wait);
        self.dispatch_events(&events);
    }

    /// Adds a spherical density edit (positive strength fills, negative
    /// digs). Returns true when any chunk was dirtied.
    ///
    /// Dirtied chunks re-mesh under the per-frame budget; with
    /// `immediate_collider` they re-mesh synchronously before returning.
    pub fn modify_terrain(
        &mut self,
        center: Vec3,
        radius: f32,
        strength: f32,
        immediate_collider: bool,
    ) -> bool {
        let (dirtied, events) =
            self.streamer
                .modify_terrain(center, radius, strength, immediate_collider);
        self.dispatch_events(&events);
        dirtied
    }

    /// Invalidates shared boundaries and regenerates one chunk.
    pub fn regenerate_chunk(&mut self, coord: ChunkCoord) -> bool {
        self.streamer.regenerate_chunk(coord)
    }

    /// Regenerates every loaded chunk intersecting a sphere.
    pub fn regenerate_chunks_in_radius(&mut self, center: Vec3, radius: f32) -> usize {
        self.streamer.regenerate_chunks_in_radius(center, radius)
    }

    /// Finds the terrain surface along a direction from the planet center.
    ///
    /// The search runs over the effective density, so loaded edits are
    /// observable. The reported biome is the dominant one at the direction.
    #[must_use]
    pub fn query_surface(&self, direction: Vec3) -> Option<SurfacePoint> {
        let shape = self.field.shape();
        let mut point = radial_surface_query(
            shape.center_vec(),
            shape.radius,
            shape.max_terrain_height,
            shape.max_terrain_depth,
            direction,
            |p| self.streamer.effective_density(p),
        )?;
        point.biome = self.biome_at(direction);
        Some(point)
    }

    /// Finds the first surface crossing along an arbitrary ray.
    #[must_use]
    pub fn query_surface_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        length: f32,
    ) -> Option<SurfacePoint> {
        let shape = self.field.shape();
        #[allow(clippy::cast_precision_loss)]
        let step = self.config.chunk.size / self.config.chunk.resolution as f32;
        let mut point = ray_surface_query(
            shape.center_vec(),
            shape.radius,
            origin,
            direction,
            length,
            step,
            |p| self.streamer.effective_density(p),
        )?;
        let radial = (point.position - shape.center_vec()).normalize_or_zero();
        point.biome = self.biome_at(radial);
        Some(point)
    }

    /// Returns a loaded chunk.
    #[must_use]
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.streamer.get_chunk(coord)
    }

    /// Whether a chunk is active.
    #[must_use]
    pub fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
        self.streamer.is_chunk_loaded(coord)
    }

    /// Whether a chunk is waiting to be generated.
    #[must_use]
    pub fn is_chunk_pending(&self, coord: ChunkCoord) -> bool {
        self.streamer.is_chunk_pending(coord)
    }

    /// Current streaming statistics.
    #[must_use]
    pub fn stats(&self) -> StreamerStats {
        self.streamer.stats()
    }

    /// Captures sparse modification records for every edited chunk.
    ///
    /// Only edits are persisted; the base world regenerates from the seed.
    #[must_use]
    pub fn capture_modifications(&self) -> Vec<ModificationRecord> {
        self.streamer
            .chunks()
            .filter_map(ModificationRecord::capture)
            .collect()
    }

    /// Applies a persisted modification record to its (loaded) chunk and
    /// queues it for re-meshing. Returns false when the chunk is not
    /// loaded or the record does not fit it.
    pub fn apply_modification_record(&mut self, record: &ModificationRecord) -> bool {
        self.streamer.apply_record(record)
    }

    /// Drops every cached boundary sample (e.g. after external changes).
    pub fn clear_boundary_store(&self) {
        self.store.clear();
    }

    /// Sends mesh lifecycle events to the registered sink.
    fn dispatch_events(&mut self, events: &[StreamEvent]) {
        if events.is_empty() {
            return;
        }
        let Some(mut sink) = self.sink.take() else {
            return;
        };
        for event in events {
            match *event {
                StreamEvent::MeshReady(coord) => {
                    if let Some(mesh) = self.streamer.get_chunk(coord).and_then(Chunk::mesh) {
                        sink.on_chunk_mesh_ready(coord, mesh);
                    }
                }
                StreamEvent::MeshCleared(coord) => sink.on_chunk_mesh_cleared(coord),
            }
        }
        self.sink = Some(sink);
    }

    /// Dominant biome index at a surface direction, if biomes are active.
    fn biome_at(&self, direction: Vec3) -> Option<usize> {
        self.field
            .biomes()
            .map(|selector| selector.primary_biome(direction.normalize_or_zero()))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("seed", &self.config.seed)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
