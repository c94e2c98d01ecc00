use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::Vec3;
use parking_lot::{Mutex, MutexGuard};
use terrastream_core::constants::SUB_CHUNKS_PER_CHUNK;
use terrastream_core::math::{chunk_distance_sq, world_to_chunk};
use terrastream_core::types::ChunkCoord;
use terrastream_tasks::{Priority, SchedulerError, TaskScheduler};

use crate::chunk::{ChunkPhase, Intent};
use crate::error::WorldError;
use crate::mesher::{NeighborBorders, EDGE_OFFSETS};
use crate::pipeline::{run_chunk_task, ChunkTask, SlotClaim, WorldShared};
use crate::render::{sub_chunk_aabb, Frustum, RenderBackend};
use crate::spiral::SpiralScan;
use crate::state_machine::has_block_data;

const MAX_FLUSH_ROUNDS: usize = 16;

/// What one radius check changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadiusUpdate {
    pub loads_queued: usize,
    pub unloads_queued: usize,
    /// In-radius coordinates left unloaded because the pool was full.
    pub loads_deferred: usize,
}

impl RadiusUpdate {
    pub fn changed(&self) -> bool {
        self.loads_queued > 0 || self.unloads_queued > 0
    }
}

/// Result of asking for background work on a resident chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Queued,
    /// The chunk is busy; the request runs once it is free.
    Deferred,
    /// The chunk failed to load and has nothing to work on.
    Skipped,
}

/// Residency bookkeeping, all under one coarse lock.
#[derive(Debug)]
struct Residency {
    loaded: HashMap<ChunkCoord, usize>,
    intents: Vec<Intent>,
    /// Coordinates whose slot is still being torn down.
    tearing_down: HashSet<ChunkCoord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DeferredRequest {
    slot: usize,
    generation: u64,
    task: ChunkTask,
}

/// Counters for overlays and the benchmark runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingStats {
    pub resident: usize,
    pub working: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub pending_tasks: usize,
    pub gpu_meshes: usize,
    pub deferred_requests: usize,
}

/// Main-thread driver of chunk residency.
///
/// Decides what is loaded around the observer, queues background work,
/// and is the only owner of GPU meshes. Nothing here blocks on a worker: a
/// chunk that is still `working` is simply looked at again next frame.
pub struct StreamingManager<R: RenderBackend> {
    shared: Arc<WorldShared>,
    scheduler: TaskScheduler,
    renderer: R,
    residency: Mutex<Residency>,
    /// GPU meshes per slot and sub-chunk. Main thread only.
    gpu: Vec<Vec<Option<R::Mesh>>>,
    deferred: HashMap<DeferredRequest, Priority>,
    radius: u16,
}

impl<R: RenderBackend> StreamingManager<R> {
    pub fn new(shared: Arc<WorldShared>, scheduler: TaskScheduler, renderer: R, radius: u16) -> Self {
        let capacity = shared.pool.capacity();
        let gpu = (0..capacity)
            .map(|_| (0..SUB_CHUNKS_PER_CHUNK).map(|_| None).collect())
            .collect();
        Self {
            shared,
            scheduler,
            renderer,
            residency: Mutex::new(Residency {
                loaded: HashMap::new(),
                intents: vec![Intent::None; capacity],
                tearing_down: HashSet::new(),
            }),
            gpu,
            deferred: HashMap::new(),
            radius,
        }
    }

    fn residency(&self) -> MutexGuard<'_, Residency> {
        self.residency.lock()
    }

    pub fn radius(&self) -> u16 {
        self.radius
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn shared(&self) -> &Arc<WorldShared> {
        &self.shared
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Slot currently assigned to `coord`.
    pub fn slot_for(&self, coord: ChunkCoord) -> Option<usize> {
        self.residency().loaded.get(&coord).copied()
    }

    /// Coordinates in the loaded set.
    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.residency().loaded.keys().copied().collect()
    }

    /// Bring residency in line with the observer's position: queue loads for
    /// missing in-radius columns (nearest first) and unloads for rendered
    /// columns that fell out of radius.
    pub fn check_chunk_radius(&mut self, observer: Vec3) -> RadiusUpdate {
        let center = world_to_chunk(observer);
        let radius_sq = (self.radius as i64).pow(2);
        let mut update = RadiusUpdate::default();
        let mut pool_full = false;

        for coord in SpiralScan::new(center, self.radius) {
            {
                let residency = self.residency();
                if residency.loaded.contains_key(&coord) || residency.tearing_down.contains(&coord) {
                    continue;
                }
            }
            if pool_full {
                update.loads_deferred += 1;
                continue;
            }
            let priority = if chunk_distance_sq(coord, center) <= 1 {
                Priority::High
            } else {
                Priority::Medium
            };
            match self.queue_create_chunk(coord, priority) {
                Ok(true) => update.loads_queued += 1,
                Ok(false) => {
                    pool_full = true;
                    update.loads_deferred += 1;
                }
                Err(e) => {
                    log::warn!("Could not queue chunk<{}, {}>: {e}", coord.x, coord.y);
                    break;
                }
            }
        }

        let outside: Vec<(ChunkCoord, usize)> = self
            .residency()
            .loaded
            .iter()
            .filter(|(coord, _)| chunk_distance_sq(**coord, center) >= radius_sq)
            .map(|(coord, index)| (*coord, *index))
            .collect();

        for (coord, index) in outside {
            let slot = self.shared.pool.slot(index);
            let status = slot.status();
            let rendered = status.failed || status.phase == ChunkPhase::Uploaded;
            if !rendered {
                continue;
            }
            {
                let mut residency = self.residency();
                residency.loaded.remove(&coord);
                residency.tearing_down.insert(coord);
                residency.intents[index] = Intent::Unload;
            }
            update.unloads_queued += 1;
            if status.failed {
                // Nothing to save or free; synchronize recycles it directly.
                continue;
            }
            let generation = slot.generation();
            if let Err(e) = self.request(index, generation, ChunkTask::Unload, Priority::Low) {
                log::warn!("Could not queue unload of chunk<{}, {}>: {e}", coord.x, coord.y);
            }
        }

        if update.changed() {
            self.scheduler.wake_all();
        }
        update
    }

    /// Assign a free slot to `coord` and queue its load. Returns `Ok(false)`
    /// if the coordinate is already resident (or still tearing down) or the
    /// pool has no free slot.
    pub fn queue_create_chunk(
        &mut self,
        coord: ChunkCoord,
        priority: Priority,
    ) -> Result<bool, WorldError> {
        let mut residency = self.residency();
        if residency.loaded.contains_key(&coord) || residency.tearing_down.contains(&coord) {
            return Ok(false);
        }
        let Some(index) = self.shared.pool.find_unloaded_chunk() else {
            return Ok(false);
        };
        let Some(generation) = self.shared.pool.slot(index).assign(coord) else {
            return Ok(false);
        };
        residency.loaded.insert(coord, index);
        residency.intents[index] = Intent::Load;
        drop(residency);

        let claim = SlotClaim::new(Arc::clone(&self.shared), index, generation, None);
        self.dispatch(claim, ChunkTask::Load, priority)?;
        log::trace!("Queued load of chunk<{}, {}> ({priority:?})", coord.x, coord.y);
        Ok(true)
    }

    /// Write an edited chunk to disk in the background.
    pub fn queue_save_chunk(&mut self, coord: ChunkCoord) -> Result<RequestOutcome, WorldError> {
        self.request_for(coord, ChunkTask::Save, Priority::Low)
    }

    /// Recompute lighting and rebuild the mesh of a resident chunk.
    pub fn queue_recalculate_lighting(
        &mut self,
        coord: ChunkCoord,
        priority: Priority,
    ) -> Result<RequestOutcome, WorldError> {
        self.request_for(coord, ChunkTask::Relight, priority)
    }

    /// Rebuild the mesh of a resident chunk. The current GPU mesh keeps
    /// rendering until the new one is uploaded.
    pub fn queue_retesselate_chunk(
        &mut self,
        coord: ChunkCoord,
        priority: Priority,
    ) -> Result<RequestOutcome, WorldError> {
        self.request_for(coord, ChunkTask::Retesselate, priority)
    }

    /// Grow trees into a resident chunk that was generated rather than loaded
    /// from disk. Chunks already decorated are skipped.
    pub fn queue_generate_decorations(
        &mut self,
        coord: ChunkCoord,
        priority: Priority,
    ) -> Result<RequestOutcome, WorldError> {
        let index = self
            .slot_for(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord.x, coord.y))?;
        if let Some(data) = self.shared.pool.slot(index).try_data() {
            if !data.needs_decorations {
                return Ok(RequestOutcome::Skipped);
            }
        }
        self.request_for(coord, ChunkTask::Decorate, priority)
    }

    /// Set whether a resident chunk still wants its tree pass. Takes effect
    /// on the next [`queue_generate_decorations`](Self::queue_generate_decorations).
    pub fn set_needs_decorations(
        &mut self,
        coord: ChunkCoord,
        needs: bool,
    ) -> Result<(), WorldError> {
        let index = self
            .slot_for(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord.x, coord.y))?;
        let mut data = self
            .shared
            .pool
            .slot(index)
            .try_data()
            .ok_or(WorldError::ChunkBusy(coord.x, coord.y))?;
        if !data.has_blocks() {
            return Err(WorldError::ChunkNotLoaded(coord.x, coord.y));
        }
        data.needs_decorations = needs;
        Ok(())
    }

    fn request_for(
        &mut self,
        coord: ChunkCoord,
        task: ChunkTask,
        priority: Priority,
    ) -> Result<RequestOutcome, WorldError> {
        let index = self
            .slot_for(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord.x, coord.y))?;
        let generation = self.shared.pool.slot(index).generation();
        Ok(self.request(index, generation, task, priority)?)
    }

    /// Claim the slot for `task` and queue it, or remember the request if the
    /// slot is busy.
    fn request(
        &mut self,
        index: usize,
        generation: u64,
        task: ChunkTask,
        priority: Priority,
    ) -> Result<RequestOutcome, SchedulerError> {
        let slot = self.shared.pool.slot(index);
        let status = slot.status();
        if !status.loaded || status.failed || slot.generation() != generation {
            return Ok(RequestOutcome::Skipped);
        }
        let unloading = self.residency().intents[index] == Intent::Unload;
        if unloading && task != ChunkTask::Unload {
            return Ok(RequestOutcome::Skipped);
        }

        let fallback = match task {
            ChunkTask::Relight | ChunkTask::Retesselate | ChunkTask::Decorate => slot
                .try_claim(|p| p == ChunkPhase::Uploaded, ChunkPhase::RetesselateVertices)
                .then_some(ChunkPhase::Uploaded),
            ChunkTask::Save | ChunkTask::Unload => slot.try_hold(has_block_data),
            ChunkTask::Load => None,
        };
        let Some(fallback) = fallback else {
            let key = DeferredRequest {
                slot: index,
                generation,
                task,
            };
            let entry = self.deferred.entry(key).or_insert(priority);
            *entry = (*entry).max(priority);
            return Ok(RequestOutcome::Deferred);
        };

        let claim = SlotClaim::new(Arc::clone(&self.shared), index, generation, Some(fallback));
        self.dispatch(claim, task, priority)?;
        Ok(RequestOutcome::Queued)
    }

    fn dispatch(
        &self,
        claim: SlotClaim,
        task: ChunkTask,
        priority: Priority,
    ) -> Result<u64, SchedulerError> {
        let borders = match task {
            ChunkTask::Save | ChunkTask::Unload => NeighborBorders::default(),
            _ => self.neighbor_borders(claim.slot().coord()),
        };
        self.scheduler.queue_task(priority, claim, move |claim| {
            run_chunk_task(claim, task, &borders)
        })
    }

    /// Copy the facing planes of every readable neighbour of `coord`. A
    /// neighbour that is absent or busy leaves its edge open.
    fn neighbor_borders(&self, coord: ChunkCoord) -> NeighborBorders {
        let mut borders = NeighborBorders::default();
        for (edge, offset) in EDGE_OFFSETS.iter().enumerate() {
            let Some(index) = self.slot_for(coord + *offset) else {
                continue;
            };
            if let Some(data) = self.shared.pool.slot(index).try_data() {
                if let Some(blocks) = data.blocks.as_deref() {
                    borders.capture(edge, blocks);
                }
            }
        }
        borders
    }

    /// Per-frame GPU synchronisation. Tears down unloaded slots, uploads
    /// finished meshes, then retries requests that found their chunk busy.
    pub fn synchronize_chunks(&mut self) {
        let capacity = self.shared.pool.capacity();
        for index in 0..capacity {
            let slot = self.shared.pool.slot(index);
            let status = slot.status();
            if status.working || !status.loaded {
                continue;
            }
            let intent = self.residency().intents[index];
            match intent {
                Intent::Unload if !self.unload_pending(index) => self.teardown(index),
                Intent::Load | Intent::None if status.phase.awaits_upload() => {
                    self.upload(index, status.phase)
                }
                _ => {}
            }
        }
        self.retry_deferred();
    }

    /// An unload task for `index` is still waiting to be queued.
    fn unload_pending(&self, index: usize) -> bool {
        self.deferred
            .keys()
            .any(|r| r.slot == index && r.task == ChunkTask::Unload)
    }

    fn teardown(&mut self, index: usize) {
        let slot = self.shared.pool.slot(index);
        let coord = slot.coord();
        for mesh in self.gpu[index].iter_mut() {
            if let Some(mesh) = mesh.take() {
                self.renderer.free_mesh(mesh);
            }
        }
        if let Some(mut data) = slot.try_data() {
            data.free_cpu();
        }
        if !slot.recycle() {
            return;
        }
        let mut residency = self.residency();
        residency.intents[index] = Intent::None;
        residency.tearing_down.remove(&coord);
        log::debug!("Unloaded chunk<{}, {}>", coord.x, coord.y);
    }

    fn upload(&mut self, index: usize, phase: ChunkPhase) {
        let slot = self.shared.pool.slot(index);
        let coord = slot.coord();
        let Some(mut data) = slot.try_data() else {
            return;
        };
        let replace = phase == ChunkPhase::DoneRetesselating;
        let decorate = data.needs_decorations;
        log::debug!("Uploading to GPU chunk<{}, {}>", coord.x, coord.y);

        for sub in 0..SUB_CHUNKS_PER_CHUNK {
            let vertices = data.sub_meshes[sub].take();
            if replace {
                if let Some(old) = self.gpu[index][sub].take() {
                    self.renderer.free_mesh(old);
                }
            }
            if let Some(vertices) = vertices {
                let mesh = self.renderer.upload_mesh(coord, sub, &vertices);
                if let Some(old) = self.gpu[index][sub].replace(mesh) {
                    self.renderer.free_mesh(old);
                }
            }
            slot.set_sub_chunk_phase(sub, ChunkPhase::Uploaded);
        }
        drop(data);

        if !slot.settle(phase, ChunkPhase::Uploaded) {
            return;
        }
        self.residency().intents[index] = Intent::None;
        if decorate {
            let generation = slot.generation();
            if let Err(e) = self.request(index, generation, ChunkTask::Decorate, Priority::Medium) {
                log::warn!("Could not queue decoration of chunk<{}, {}>: {e}", coord.x, coord.y);
            }
        }
    }

    fn retry_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let pending: Vec<(DeferredRequest, Priority)> = self.deferred.drain().collect();
        for (request, priority) in pending {
            let slot = self.shared.pool.slot(request.slot);
            if slot.generation() != request.generation {
                log::trace!("Dropping stale {:?} request for slot {}", request.task, request.slot);
                continue;
            }
            match self.request(request.slot, request.generation, request.task, priority) {
                Ok(RequestOutcome::Queued) => {
                    log::trace!("Retried {:?} for slot {}", request.task, request.slot)
                }
                Ok(_) => {}
                Err(e) => log::warn!("Dropping {:?} request: {e}", request.task),
            }
        }
    }

    /// Draw every GPU-resident sub-chunk inside the frustum. Returns the
    /// number of draw calls.
    pub fn render(&mut self, frustum: &Frustum) -> usize {
        let mut draws = 0;
        for (index, meshes) in self.gpu.iter().enumerate() {
            if meshes.iter().all(Option::is_none) {
                continue;
            }
            let coord = self.shared.pool.slot(index).coord();
            for (sub, mesh) in meshes.iter().enumerate() {
                let Some(mesh) = mesh else {
                    continue;
                };
                let (min, max) = sub_chunk_aabb(coord, sub);
                if frustum.intersects_aabb(min, max) {
                    self.renderer.draw(mesh, coord, sub);
                    draws += 1;
                }
            }
        }
        draws
    }

    /// Block until every queued task ran, then synchronise. For tests,
    /// tools and shutdown; never called from a frame.
    pub fn flush(&mut self) {
        for _ in 0..MAX_FLUSH_ROUNDS {
            self.scheduler.wait_idle();
            self.synchronize_chunks();
            // Retried requests may have queued more work.
            if self.deferred.is_empty() && self.scheduler.pending() == 0 {
                break;
            }
        }
    }

    pub fn stats(&self) -> StreamingStats {
        let mut stats = StreamingStats {
            pending_tasks: self.scheduler.pending(),
            deferred_requests: self.deferred.len(),
            ..StreamingStats::default()
        };
        for (_, slot) in self.shared.pool.iter() {
            let status = slot.status();
            if !status.loaded {
                continue;
            }
            stats.resident += 1;
            if status.working {
                stats.working += 1;
            }
            if status.failed {
                stats.failed += 1;
            }
            if status.phase == ChunkPhase::Uploaded {
                stats.uploaded += 1;
            }
        }
        stats.gpu_meshes = self.gpu.iter().flatten().filter(|m| m.is_some()).count();
        stats
    }

    /// Stop the workers, then save every edited chunk and free everything.
    pub fn shutdown(&mut self) {
        if self.scheduler.is_shut_down() {
            return;
        }
        self.scheduler.shutdown();
        self.deferred.clear();

        let mut saved = 0usize;
        for index in 0..self.shared.pool.capacity() {
            let slot = self.shared.pool.slot(index);
            if !slot.status().loaded {
                continue;
            }
            let coord = slot.coord();
            if let Some(mut data) = slot.try_data() {
                if data.dirty {
                    if let Some(blocks) = data.blocks.as_deref() {
                        match self.shared.store.save(coord, blocks) {
                            Ok(()) => saved += 1,
                            Err(e) => {
                                log::error!("Failed to save chunk<{}, {}>: {e}", coord.x, coord.y)
                            }
                        }
                    }
                }
                data.free_cpu();
            }
            for mesh in self.gpu[index].iter_mut() {
                if let Some(mesh) = mesh.take() {
                    self.renderer.free_mesh(mesh);
                }
            }
            slot.recycle();
        }

        let mut residency = self.residency();
        residency.loaded.clear();
        residency.tearing_down.clear();
        residency.intents.iter_mut().for_each(|i| *i = Intent::None);
        log::info!("Streaming stopped; saved {saved} edited chunks");
    }
}

impl<R: RenderBackend> Drop for StreamingManager<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
