//! A cubic chunk of the planet volume.
//!
//! A chunk owns its density lattice and generated mesh. Boundary samples
//! come from the shared store so neighboring chunks agree bitwise at common
//! lattice positions; interior samples are drawn straight from the density
//! function. Edits land in the lattice, expand the dirty region, and are
//! mirrored into a sparse modification map for persistence.

use std::collections::HashMap;

use glam::{IVec3, Vec3};
use tellus_common::{ChunkCoord, ChunkError, FaceDir};
use tellus_mesh::marching::extract_isosurface;
use tellus_mesh::mesh::MeshData;
use tellus_mesh::tables::{CORNER_OFFSETS, EDGE_CORNERS};
use tellus_mesh::utils::{
    has_surface_crossing, sample_surface_points, tint_vertices, SurfaceSampleParams,
};
use tellus_worldgen::density::DensityField;
use tellus_worldgen::surface::SurfacePoint;
use tracing::{error, warn};

use crate::boundary::SharedBoundaryStore;
use crate::lattice::DensityLattice;
use crate::worker::CancelFlag;

/// Outcome of a mesh regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshOutcome {
    /// The chunk now carries a mesh.
    Ready,
    /// The chunk has no surface; any previous mesh was cleared.
    Cleared,
}

/// A cubic chunk carrying a density lattice and at most one mesh.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    chunk_size: f32,
    lattice: DensityLattice,
    mesh: Option<MeshData>,
    /// Dirty lattice region as an inclusive index AABB, empty when `None`.
    dirty: Option<(IVec3, IVec3)>,
    /// True once the player has edited any sample.
    modified: bool,
    /// Sparse map of edited samples: lattice index -> current value.
    modifications: HashMap<u32, f32>,
    surface_points: Vec<SurfacePoint>,
    all_solid: bool,
    all_empty: bool,
    failed: bool,
    revision: u64,
}

impl Chunk {
    /// Creates an ungenerated chunk shell.
    #[must_use]
    pub fn new(coord: ChunkCoord, resolution: usize, chunk_size: f32) -> Self {
        Self {
            coord,
            chunk_size,
            lattice: DensityLattice::new(resolution),
            mesh: None,
            dirty: None,
            modified: false,
            modifications: HashMap::new(),
            surface_points: Vec::new(),
            all_solid: false,
            all_empty: false,
            failed: false,
            revision: 0,
        }
    }

    /// Creates a chunk from a lattice generated elsewhere (worker pool).
    #[must_use]
    pub fn from_lattice(coord: ChunkCoord, chunk_size: f32, lattice: DensityLattice) -> Self {
        let mut chunk = Self::new(coord, lattice.resolution(), chunk_size);
        chunk.install_lattice(lattice);
        chunk
    }

    /// The chunk coordinate.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Cubes per chunk edge.
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.lattice.resolution()
    }

    /// World distance between adjacent lattice samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn voxel_step(&self) -> f32 {
        self.chunk_size / self.lattice.resolution() as f32
    }

    /// World position of lattice index (0, 0, 0).
    #[must_use]
    pub fn world_origin(&self) -> Vec3 {
        self.coord.world_min(self.chunk_size)
    }

    /// The density lattice.
    #[must_use]
    pub fn lattice(&self) -> &DensityLattice {
        &self.lattice
    }

    /// The generated mesh, if any.
    #[must_use]
    pub fn mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    /// Cached surface sample points for external decorators.
    #[must_use]
    pub fn surface_points(&self) -> &[SurfacePoint] {
        &self.surface_points
    }

    /// Whether every sample is non-negative (solid).
    #[must_use]
    pub fn all_solid(&self) -> bool {
        self.all_solid
    }

    /// Whether every sample is negative (empty).
    #[must_use]
    pub fn all_empty(&self) -> bool {
        self.all_empty
    }

    /// Whether the player has edited this chunk.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether the last pipeline step failed; the streamer retries later.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Lattice-edit revision, bumped on every density change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The dirty lattice region, if any (inclusive index bounds).
    #[must_use]
    pub fn dirty_region(&self) -> Option<(IVec3, IVec3)> {
        self.dirty
    }

    /// Sparse map of edited samples (lattice index -> value).
    #[must_use]
    pub fn modifications(&self) -> &HashMap<u32, f32> {
        &self.modifications
    }

    /// Fills the lattice from the shared store and density function.
    ///
    /// # Errors
    /// Returns [`ChunkError::Cancelled`] when the cancel flag fires between
    /// generation phases.
    pub fn generate_density_field(
        &mut self,
        store: &SharedBoundaryStore,
        field: &DensityField,
        cancel: Option<&CancelFlag>,
    ) -> Result<(), ChunkError> {
        let lattice = generate_lattice(
            self.coord,
            self.lattice.resolution(),
            self.chunk_size,
            store,
            field,
            cancel,
        )?;
        self.install_lattice(lattice);
        Ok(())
    }

    /// Expands the dirty region to cover an inclusive lattice index AABB.
    #[allow(clippy::cast_possible_wrap)]
    pub fn mark_dirty(&mut self, index_min: IVec3, index_max: IVec3) {
        let max_index = IVec3::splat(self.lattice.resolution() as i32);
        let lo = index_min.clamp(IVec3::ZERO, max_index);
        let hi = index_max.clamp(IVec3::ZERO, max_index);
        self.dirty = Some(match self.dirty {
            Some((cur_lo, cur_hi)) => (cur_lo.min(lo), cur_hi.max(hi)),
            None => (lo, hi),
        });
    }

    /// Adds a spherical density edit with quadratic falloff.
    ///
    /// Each sample strictly inside `radius` of `center` gains
    /// `strength * (1 - dist/radius)²`. Returns false without touching the
    /// lattice when the sphere misses the chunk entirely.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn modify(&mut self, center: Vec3, radius: f32, strength: f32) -> bool {
        if radius <= 0.0 || strength == 0.0 {
            return false;
        }
        if !self.coord.intersects_sphere(self.chunk_size, center, radius) {
            return false;
        }

        let origin = self.world_origin();
        let step = self.voxel_step();
        let r = self.lattice.resolution() as i32;

        let lo = (((center - Vec3::splat(radius)) - origin) / step)
            .floor()
            .as_ivec3()
            .clamp(IVec3::ZERO, IVec3::splat(r));
        let hi = (((center + Vec3::splat(radius)) - origin) / step)
            .ceil()
            .as_ivec3()
            .clamp(IVec3::ZERO, IVec3::splat(r));

        let mut changed_lo = IVec3::splat(i32::MAX);
        let mut changed_hi = IVec3::splat(i32::MIN);
        let mut changed = false;

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let world = origin + IVec3::new(x, y, z).as_vec3() * step;
                    let dist = world.distance(center);
                    if dist >= radius {
                        continue;
                    }
                    let falloff = 1.0 - dist / radius;
                    let delta = strength * falloff * falloff;
                    if delta == 0.0 {
                        continue;
                    }

                    let index = self
                        .lattice
                        .index(x as usize, y as usize, z as usize);
                    let value = self.lattice.samples()[index] + delta;
                    self.lattice.samples_mut()[index] = value;
                    self.modifications.insert(index as u32, value);

                    changed_lo = changed_lo.min(IVec3::new(x, y, z));
                    changed_hi = changed_hi.max(IVec3::new(x, y, z));
                    changed = true;
                }
            }
        }

        if changed {
            self.modified = true;
            self.revision += 1;
            self.mark_dirty(changed_lo, changed_hi);
            let (all_solid, all_empty) = self.lattice.derive_flags();
            self.all_solid = all_solid;
            self.all_empty = all_empty;
        }
        changed
    }

    /// Regenerates the mesh from the current lattice.
    ///
    /// Clears the mesh when the lattice has no surface crossing; otherwise
    /// runs marching cubes over the full lattice, tints vertices, and
    /// refreshes the surface-point cache. The dirty region is cleared.
    pub fn generate_mesh(
        &mut self,
        field: &DensityField,
        sample_params: &SurfaceSampleParams,
    ) -> MeshOutcome {
        self.dirty = None;

        if !has_surface_crossing(self.lattice.samples()) {
            self.mesh = None;
            self.surface_points.clear();
            return MeshOutcome::Cleared;
        }

        match build_chunk_mesh(
            &self.lattice,
            self.world_origin(),
            self.voxel_step(),
            field,
            sample_params,
        ) {
            Ok(Some((mesh, points))) => {
                self.mesh = Some(mesh);
                self.surface_points = points;
                self.failed = false;
                MeshOutcome::Ready
            }
            Ok(None) => {
                self.mesh = None;
                self.surface_points.clear();
                MeshOutcome::Cleared
            }
            Err(err) => {
                error!("Meshing chunk {} failed: {err}", self.coord);
                self.mesh = None;
                self.surface_points.clear();
                self.failed = true;
                MeshOutcome::Cleared
            }
        }
    }

    /// Installs a mesh produced on a worker. Clears the dirty region.
    pub fn set_mesh(&mut self, mesh: Option<MeshData>, points: Vec<SurfacePoint>) -> MeshOutcome {
        self.dirty = None;
        match mesh {
            Some(mesh) => {
                self.mesh = Some(mesh);
                self.surface_points = points;
                MeshOutcome::Ready
            }
            None => {
                self.mesh = None;
                self.surface_points.clear();
                MeshOutcome::Cleared
            }
        }
    }

    /// Marks the chunk failed and drops its mesh.
    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.mesh = None;
        self.surface_points.clear();
    }

    /// Clones the lattice for off-thread meshing.
    #[must_use]
    pub fn snapshot_lattice(&self) -> DensityLattice {
        self.lattice.clone()
    }

    /// Samples the chunk's effective density at a world position.
    ///
    /// Returns `None` when the position lies outside the chunk box.
    #[must_use]
    pub fn sample_world(&self, position: Vec3) -> Option<f32> {
        let origin = self.world_origin();
        let max = origin + Vec3::splat(self.chunk_size);
        if position.cmplt(origin).any() || position.cmpgt(max).any() {
            return None;
        }
        let local = (position - origin) / self.voxel_step();
        Some(self.lattice.sample_trilinear(local))
    }

    /// Overwrites edited samples from a sparse modification map.
    ///
    /// Used when restoring persisted edits after base regeneration.
    pub fn apply_modifications(&mut self, entries: &[(u32, f32)]) {
        let len = self.lattice.samples().len();
        let mut applied = false;
        for &(index, value) in entries {
            let index = index as usize;
            if index >= len {
                warn!(
                    "Dropping out-of-range modification index {index} for chunk {}",
                    self.coord
                );
                continue;
            }
            self.lattice.samples_mut()[index] = value;
            #[allow(clippy::cast_possible_truncation)]
            self.modifications.insert(index as u32, value);
            let pos = self.lattice.position(index);
            self.mark_dirty(pos, pos);
            applied = true;
        }
        if applied {
            self.modified = true;
            self.revision += 1;
            let (all_solid, all_empty) = self.lattice.derive_flags();
            self.all_solid = all_solid;
            self.all_empty = all_empty;
        }
    }

    /// Replaces the lattice and rederives the solidity flags.
    fn install_lattice(&mut self, mut lattice: DensityLattice) {
        let mut nan_seen = false;
        for sample in lattice.samples_mut() {
            if !sample.is_finite() {
                *sample = 0.0;
                nan_seen = true;
            }
        }
        if nan_seen {
            warn!("Non-finite density samples in chunk {}; clamped to 0", self.coord);
        }

        let (all_solid, all_empty) = lattice.derive_flags();
        self.lattice = lattice;
        self.all_solid = all_solid;
        self.all_empty = all_empty;
        self.failed = false;
        self.dirty = None;
        self.revision += 1;
    }
}

/// Fills a chunk lattice in four phases: shared corners, shared edges,
/// shared faces, then interior samples straight from the density function.
///
/// The cancel flag is observed between phases; a cancelled run drops the
/// partial lattice.
///
/// # Errors
/// Returns [`ChunkError::Cancelled`] when the flag fires.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn generate_lattice(
    coord: ChunkCoord,
    resolution: usize,
    chunk_size: f32,
    store: &SharedBoundaryStore,
    field: &DensityField,
    cancel: Option<&CancelFlag>,
) -> Result<DensityLattice, ChunkError> {
    let r = resolution;
    let ri = r as i32;
    let mut lattice = DensityLattice::new(r);
    let density = |p: Vec3| field.sample(p);

    let check_cancel = |flag: Option<&CancelFlag>| -> Result<(), ChunkError> {
        if flag.is_some_and(CancelFlag::is_cancelled) {
            Err(ChunkError::Cancelled)
        } else {
            Ok(())
        }
    };

    // Phase 1: the 8 shared corners.
    for corner in 0..CORNER_OFFSETS.len() {
        let value = store.get_or_create_corner(coord, corner, density);
        let off = CORNER_OFFSETS[corner];
        lattice.set(
            off[0] as usize * r,
            off[1] as usize * r,
            off[2] as usize * r,
            value,
        );
    }
    check_cancel(cancel)?;

    // Phase 2: the 12 shared edges, endpoints already covered by corners.
    for edge in 0..EDGE_CORNERS.len() {
        let run = store.get_or_create_edge(coord, edge, density);
        let [a, b] = EDGE_CORNERS[edge];
        let ca = IVec3::from_array(CORNER_OFFSETS[a]);
        let cb = IVec3::from_array(CORNER_OFFSETS[b]);
        let origin = ca.min(cb) * ri;
        let axis = (ca - cb).abs();

        for (k, &value) in run.iter().enumerate().take(r).skip(1) {
            let pos = origin + axis * k as i32;
            lattice.set(pos.x as usize, pos.y as usize, pos.z as usize, value);
        }
    }
    check_cancel(cancel)?;

    // Phase 3: the 6 shared faces, skipping the rows covered by edges.
    for face in FaceDir::ALL {
        let grid = store.get_or_create_face(coord, face, density);
        let axis = face.axis();
        let [u_axis, v_axis] = axis.others();
        let base = if face.is_positive() {
            axis.unit() * ri
        } else {
            IVec3::ZERO
        };

        for v in 1..ri {
            for u in 1..ri {
                let pos = base + u_axis.unit() * u + v_axis.unit() * v;
                let value = grid[(v * (ri + 1) + u) as usize];
                lattice.set(pos.x as usize, pos.y as usize, pos.z as usize, value);
            }
        }
    }
    check_cancel(cancel)?;

    // Phase 4: interior samples, straight from the density function.
    let origin = coord.world_min(chunk_size);
    #[allow(clippy::cast_precision_loss)]
    let step = chunk_size / r as f32;
    for z in 1..r {
        for y in 1..r {
            for x in 1..r {
                #[allow(clippy::cast_precision_loss)]
                let world = origin + Vec3::new(x as f32, y as f32, z as f32) * step;
                lattice.set(x, y, z, field.sample(world));
            }
        }
    }
    check_cancel(cancel)?;

    Ok(lattice)
}

/// Meshes a lattice snapshot: marching cubes, vertex tint, surface points.
///
/// Returns `Ok(None)` when the extraction yields no triangles.
///
/// # Errors
/// Propagates [`ChunkError::IndexOverflow`] from the extractor.
pub fn build_chunk_mesh(
    lattice: &DensityLattice,
    origin: Vec3,
    voxel_step: f32,
    field: &DensityField,
    sample_params: &SurfaceSampleParams,
) -> Result<Option<(MeshData, Vec<SurfacePoint>)>, ChunkError> {
    if !has_surface_crossing(lattice.samples()) {
        return Ok(None);
    }

    let mut mesh = extract_isosurface(lattice.resolution(), voxel_step, origin, |x, y, z| {
        lattice.get(x, y, z)
    })?;
    if mesh.is_empty() {
        return Ok(None);
    }

    tint_vertices(&mut mesh, field);
    let points = sample_surface_points(&mesh, field, sample_params);
    Ok(Some((mesh, points)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_worldgen::density::PlanetShape;
    use tellus_worldgen::layers::{LayerArena, LayerRange};

    const RESOLUTION: usize = 16;
    const CHUNK_SIZE: f32 = 16.0;

    fn sphere_field(radius: f32) -> DensityField {
        DensityField::new(
            PlanetShape {
                radius,
                ..Default::default()
            },
            LayerArena::new(1, Vec::new()),
            LayerRange::EMPTY,
            None,
            None,
        )
    }

    fn generated_chunk(coord: ChunkCoord, field: &DensityField) -> (Chunk, SharedBoundaryStore) {
        #[allow(clippy::cast_possible_wrap)]
        let store = SharedBoundaryStore::new(RESOLUTION as i32, CHUNK_SIZE);
        let mut chunk = Chunk::new(coord, RESOLUTION, CHUNK_SIZE);
        chunk
            .generate_density_field(&store, field, None)
            .expect("generation");
        (chunk, store)
    }

    #[test]
    fn test_generated_lattice_matches_density_function() {
        let field = sphere_field(50.0);
        let (chunk, _store) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);

        // Every lattice sample equals the density function at its world
        // position, regardless of which phase wrote it.
        for z in 0..=RESOLUTION {
            for y in 0..=RESOLUTION {
                for x in 0..=RESOLUTION {
                    #[allow(clippy::cast_precision_loss)]
                    let world = chunk.world_origin()
                        + Vec3::new(x as f32, y as f32, z as f32) * chunk.voxel_step();
                    let expected = field.sample(world);
                    let actual = chunk.lattice().get(x, y, z);
                    assert_eq!(
                        actual.to_bits(),
                        expected.to_bits(),
                        "mismatch at ({x}, {y}, {z})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_chunk_containing_center_is_all_solid() {
        let field = sphere_field(50.0);
        let (chunk, _) = generated_chunk(ChunkCoord::new(0, 0, 0), &field);
        assert!(chunk.all_solid());
        assert!(!chunk.all_empty());
    }

    #[test]
    fn test_distant_chunk_is_all_empty() {
        let field = sphere_field(50.0);
        let (chunk, _) = generated_chunk(ChunkCoord::new(5, 5, 5), &field);
        assert!(chunk.all_empty());
        assert!(!chunk.all_solid());
    }

    #[test]
    fn test_boundary_continuity_between_neighbors() {
        let field = sphere_field(50.0);
        #[allow(clippy::cast_possible_wrap)]
        let store = SharedBoundaryStore::new(RESOLUTION as i32, CHUNK_SIZE);

        let mut a = Chunk::new(ChunkCoord::new(2, 0, 0), RESOLUTION, CHUNK_SIZE);
        let mut b = Chunk::new(ChunkCoord::new(3, 0, 0), RESOLUTION, CHUNK_SIZE);
        a.generate_density_field(&store, &field, None).expect("a");
        b.generate_density_field(&store, &field, None).expect("b");

        // The +X face of `a` equals the -X face of `b` at every index.
        for z in 0..=RESOLUTION {
            for y in 0..=RESOLUTION {
                let va = a.lattice().get(RESOLUTION, y, z);
                let vb = b.lattice().get(0, y, z);
                assert_eq!(va.to_bits(), vb.to_bits(), "face mismatch at ({y}, {z})");
            }
        }
    }

    #[test]
    fn test_surface_chunk_meshes() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        assert!(!chunk.all_solid() && !chunk.all_empty());

        let outcome = chunk.generate_mesh(&field, &SurfaceSampleParams::default());
        assert_eq!(outcome, MeshOutcome::Ready);
        let mesh = chunk.mesh().expect("mesh");
        assert!(mesh.triangle_count() >= 1);
        assert!(chunk.dirty_region().is_none());

        // Vertices lie near the radius-50 shell.
        for p in &mesh.positions {
            assert!((p.length() - 50.0).abs() < 2.0, "vertex {p:?}");
        }
    }

    #[test]
    fn test_solid_chunk_has_no_mesh() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(0, 0, 0), &field);
        let outcome = chunk.generate_mesh(&field, &SurfaceSampleParams::default());
        assert_eq!(outcome, MeshOutcome::Cleared);
        assert!(chunk.mesh().is_none());
    }

    #[test]
    fn test_modify_locality_is_bitwise() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        let before = chunk.lattice().samples().to_vec();

        let center = Vec3::new(48.0, 8.0, 8.0);
        let radius = 3.0;
        assert!(chunk.modify(center, radius, -10.0));
        assert!(chunk.is_modified());

        let step = chunk.voxel_step();
        let origin = chunk.world_origin();
        for z in 0..=RESOLUTION {
            for y in 0..=RESOLUTION {
                for x in 0..=RESOLUTION {
                    #[allow(clippy::cast_precision_loss)]
                    let world = origin + Vec3::new(x as f32, y as f32, z as f32) * step;
                    let index = chunk.lattice().index(x, y, z);
                    let unchanged =
                        before[index].to_bits() == chunk.lattice().samples()[index].to_bits();
                    if world.distance(center) >= radius {
                        assert!(unchanged, "sample outside sphere changed at ({x},{y},{z})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_modify_dirty_region_covers_changes() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        let before = chunk.lattice().samples().to_vec();

        let center = Vec3::new(40.0, 8.0, 8.0);
        assert!(chunk.modify(center, 2.5, 5.0));
        let (lo, hi) = chunk.dirty_region().expect("dirty region");

        for (index, (&was, &now)) in before
            .iter()
            .zip(chunk.lattice().samples().iter())
            .enumerate()
        {
            if was.to_bits() != now.to_bits() {
                let pos = chunk.lattice().position(index);
                assert!(
                    pos.cmpge(lo).all() && pos.cmple(hi).all(),
                    "changed sample {pos:?} outside dirty region [{lo:?}, {hi:?}]"
                );
            }
        }
    }

    #[test]
    fn test_modify_missing_sphere_returns_false() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        // Sphere in a different chunk entirely.
        assert!(!chunk.modify(Vec3::new(-100.0, 0.0, 0.0), 3.0, -5.0));
        assert!(!chunk.is_modified());
        assert!(chunk.dirty_region().is_none());
    }

    #[test]
    fn test_modify_carves_a_pit() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        chunk.generate_mesh(&field, &SurfaceSampleParams::default());
        let before_tris = chunk.mesh().map_or(0, MeshData::triangle_count);

        // Dig just below the surface shell inside the chunk.
        let dig = Vec3::new(47.5, 10.0, 10.0);
        assert!(chunk.modify(dig, 4.0, -30.0));
        chunk.generate_mesh(&field, &SurfaceSampleParams::default());
        let after_tris = chunk.mesh().map_or(0, MeshData::triangle_count);
        assert!(after_tris >= 3, "pit should add geometry");
        assert_ne!(before_tris, 0);

        // The effective density at the dig center is now much emptier.
        let sampled = chunk.sample_world(dig).expect("inside chunk");
        assert!(sampled < field.sample(dig));
    }

    #[test]
    fn test_apply_modifications_round_trip() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        assert!(chunk.modify(Vec3::new(48.0, 8.0, 8.0), 3.0, -7.5));
        assert!(chunk.modify(Vec3::new(50.0, 10.0, 8.0), 2.0, 4.0));
        let edited = chunk.lattice().samples().to_vec();

        let mut entries: Vec<(u32, f32)> = chunk
            .modifications()
            .iter()
            .map(|(&k, &v)| (k, v))
            .collect();
        entries.sort_by_key(|(k, _)| *k);

        // Regenerate the base lattice, then re-apply the sparse edits.
        let (mut restored, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        restored.apply_modifications(&entries);

        for (index, (&want, &got)) in edited
            .iter()
            .zip(restored.lattice().samples().iter())
            .enumerate()
        {
            assert_eq!(want.to_bits(), got.to_bits(), "index {index}");
        }
        assert!(restored.is_modified());
    }

    #[test]
    fn test_cancelled_generation_drops_lattice() {
        let field = sphere_field(50.0);
        #[allow(clippy::cast_possible_wrap)]
        let store = SharedBoundaryStore::new(RESOLUTION as i32, CHUNK_SIZE);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = generate_lattice(
            ChunkCoord::new(0, 0, 0),
            RESOLUTION,
            CHUNK_SIZE,
            &store,
            &field,
            Some(&cancel),
        );
        assert!(matches!(result, Err(ChunkError::Cancelled)));
    }

    #[test]
    fn test_mark_dirty_expands() {
        let field = sphere_field(50.0);
        let (mut chunk, _) = generated_chunk(ChunkCoord::new(2, 0, 0), &field);
        chunk.mark_dirty(IVec3::new(2, 2, 2), IVec3::new(4, 4, 4));
        chunk.mark_dirty(IVec3::new(1, 3, 3), IVec3::new(6, 3, 3));
        let (lo, hi) = chunk.dirty_region().expect("dirty");
        assert_eq!(lo, IVec3::new(1, 2, 2));
        assert_eq!(hi, IVec3::new(6, 4, 4));
    }
}
