//! Worker pool for CPU-heavy chunk work.
//!
//! Density sampling and meshing run off the control thread on a fixed pool
//! of workers. Jobs and results travel over bounded channels; the control
//! loop drains results once per tick and never blocks on submission in
//! normal operation. Each density job carries a cancellation flag observed
//! at generation phase boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use tellus_common::{ChunkCoord, ChunkError};
use tellus_mesh::mesh::MeshData;
use tellus_mesh::utils::SurfaceSampleParams;
use tellus_worldgen::density::DensityField;
use tellus_worldgen::surface::SurfacePoint;
use tracing::{debug, warn};

use crate::boundary::SharedBoundaryStore;
use crate::chunk::{build_chunk_mesh, generate_lattice};
use crate::lattice::DensityLattice;

/// Channel capacity for jobs and results.
const CHANNEL_CAPACITY: usize = 1024;

/// Shared cancellation flag for an in-flight chunk task.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a fresh, uncancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A unit of work submitted to the pool.
#[derive(Debug)]
pub enum WorkerJob {
    /// Fill a chunk's density lattice.
    Density {
        /// Target chunk.
        coord: ChunkCoord,
        /// Cancellation flag checked at phase boundaries.
        cancel: CancelFlag,
    },
    /// Mesh a lattice snapshot.
    Mesh {
        /// Target chunk.
        coord: ChunkCoord,
        /// Lattice revision the snapshot was taken at.
        revision: u64,
        /// Snapshot of the chunk lattice.
        lattice: DensityLattice,
    },
}

/// A completed unit of work.
#[derive(Debug)]
pub enum WorkerResult {
    /// A finished (or cancelled) density generation.
    Density {
        /// Target chunk.
        coord: ChunkCoord,
        /// The generated lattice; `None` when the job was cancelled.
        lattice: Option<DensityLattice>,
    },
    /// A finished meshing job.
    Mesh {
        /// Target chunk.
        coord: ChunkCoord,
        /// Lattice revision the mesh was built from.
        revision: u64,
        /// The mesh and its surface points; `None` when the lattice has no
        /// surface or meshing failed.
        mesh: Option<(MeshData, Vec<SurfacePoint>)>,
        /// Whether meshing failed outright (index overflow).
        failed: bool,
    },
}

/// Shared read-only context handed to every worker.
struct WorkerContext {
    field: Arc<DensityField>,
    store: Arc<SharedBoundaryStore>,
    resolution: usize,
    chunk_size: f32,
    sample_params: SurfaceSampleParams,
}

/// Fixed pool of worker threads processing chunk jobs.
pub struct WorkerPool {
    job_tx: Option<Sender<WorkerJob>>,
    result_rx: Receiver<WorkerResult>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers sharing the given field and boundary store.
    #[must_use]
    pub fn new(
        threads: usize,
        field: Arc<DensityField>,
        store: Arc<SharedBoundaryStore>,
        resolution: usize,
        chunk_size: f32,
        sample_params: SurfaceSampleParams,
    ) -> Self {
        let threads = threads.max(1);
        let (job_tx, job_rx) = bounded::<WorkerJob>(CHANNEL_CAPACITY);
        let (result_tx, result_rx) = bounded::<WorkerResult>(CHANNEL_CAPACITY);

        let context = Arc::new(WorkerContext {
            field,
            store,
            resolution,
            chunk_size,
            sample_params,
        });

        let handles = (0..threads)
            .map(|index| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let context = Arc::clone(&context);
                std::thread::Builder::new()
                    .name(format!("tellus-worker-{index}"))
                    .spawn(move || worker_loop(&job_rx, &result_tx, &context))
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();

        debug!("Started worker pool with {threads} threads");
        Self {
            job_tx: Some(job_tx),
            result_rx,
            handles,
        }
    }

    /// Submits a job. Returns false when the pool has shut down or the
    /// queue is full.
    pub fn submit(&self, job: WorkerJob) -> bool {
        match &self.job_tx {
            Some(tx) => tx.try_send(job).is_ok(),
            None => false,
        }
    }

    /// Drains all currently available results without blocking.
    pub fn drain_results(&self) -> Vec<WorkerResult> {
        self.result_rx.try_iter().collect()
    }

    /// Blocks up to `timeout` for a single result.
    #[must_use]
    pub fn recv_result_timeout(&self, timeout: std::time::Duration) -> Option<WorkerResult> {
        self.result_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the job channel stops the workers.
        self.job_tx = None;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread panicked during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.handles.len())
            .finish_non_exhaustive()
    }
}

/// Worker thread body: process jobs until the channel closes.
fn worker_loop(
    job_rx: &Receiver<WorkerJob>,
    result_tx: &Sender<WorkerResult>,
    context: &WorkerContext,
) {
    while let Ok(job) = job_rx.recv() {
        let result = match job {
            WorkerJob::Density { coord, cancel } => {
                let lattice = match generate_lattice(
                    coord,
                    context.resolution,
                    context.chunk_size,
                    &context.store,
                    &context.field,
                    Some(&cancel),
                ) {
                    Ok(lattice) => Some(lattice),
                    Err(ChunkError::Cancelled) => None,
                    Err(err) => {
                        warn!("Density generation for chunk {coord} failed: {err}");
                        None
                    }
                };
                WorkerResult::Density { coord, lattice }
            }
            WorkerJob::Mesh {
                coord,
                revision,
                lattice,
            } => {
                let origin = coord.world_min(context.chunk_size);
                #[allow(clippy::cast_precision_loss)]
                let step = context.chunk_size / context.resolution as f32;
                match build_chunk_mesh(
                    &lattice,
                    origin,
                    step,
                    &context.field,
                    &context.sample_params,
                ) {
                    Ok(mesh) => WorkerResult::Mesh {
                        coord,
                        revision,
                        mesh,
                        failed: false,
                    },
                    Err(err) => {
                        warn!("Meshing chunk {coord} failed: {err}");
                        WorkerResult::Mesh {
                            coord,
                            revision,
                            mesh: None,
                            failed: true,
                        }
                    }
                }
            }
        };

        if result_tx.send(result).is_err() {
            break;
        }
    }
}
