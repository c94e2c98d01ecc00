pub mod chunk;
pub mod chunk_pool;
pub mod config;
pub mod error;
pub mod lighting;
pub mod mesher;
pub mod pipeline;
pub mod render;
pub mod spiral;
pub mod state_machine;
pub mod streaming;
pub mod terrain;

use std::sync::Arc;

use glam::Vec3;
use terrastream_core::constants::CHUNK_HEIGHT;
use terrastream_core::math::{block_to_chunk, block_to_local, boundary_neighbors, local_index};
use terrastream_core::types::{Block, BlockId, BlockPos, ChunkCoord};
use terrastream_persist::ChunkStore;
use terrastream_tasks::{Priority, TaskScheduler};

pub use chunk_pool::ChunkPool;
pub use config::StreamingConfig;
pub use error::{ConfigError, WorldError};
pub use render::{Frustum, RecordingRenderer, RenderBackend};
pub use streaming::{RadiusUpdate, RequestOutcome, StreamingManager, StreamingStats};

use pipeline::WorldShared;
use terrain::TerrainGenerator;

/// What one call to [`World::frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub radius: RadiusUpdate,
    pub draws: usize,
}

/// Primary public struct for the terrastream-world crate.
/// Owns the chunk pool, worker pool, save directory and GPU meshes of one
/// world. Several worlds may live in one process.
pub struct World<R: RenderBackend> {
    streaming: StreamingManager<R>,
}

impl<R: RenderBackend> World<R> {
    /// Open the save directory and start the workers.
    pub fn new(config: &StreamingConfig, renderer: R) -> Result<Self, WorldError> {
        config.validate()?;
        let store = ChunkStore::open(&config.save_root)?;
        let shared = Arc::new(WorldShared {
            pool: ChunkPool::with_capacity(config.capacity()),
            store,
            terrain: TerrainGenerator::new(config.world_seed),
        });
        let scheduler = TaskScheduler::new(config.worker_threads);
        log::info!(
            "World opened: radius {}, {} slots, {} workers, seed {}",
            config.chunk_radius,
            config.capacity(),
            scheduler.worker_count(),
            config.world_seed
        );
        Ok(Self {
            streaming: StreamingManager::new(shared, scheduler, renderer, config.chunk_radius),
        })
    }

    /// One frame on the main thread: radius check, GPU sync, draw.
    pub fn frame(&mut self, observer: Vec3, frustum: &Frustum) -> FrameReport {
        let radius = self.streaming.check_chunk_radius(observer);
        self.streaming.synchronize_chunks();
        let draws = self.streaming.render(frustum);
        FrameReport { radius, draws }
    }

    pub fn check_chunk_radius(&mut self, observer: Vec3) -> RadiusUpdate {
        self.streaming.check_chunk_radius(observer)
    }

    pub fn synchronize_chunks(&mut self) {
        self.streaming.synchronize_chunks();
    }

    pub fn render(&mut self, frustum: &Frustum) -> usize {
        self.streaming.render(frustum)
    }

    /// Wait for background work to drain and synchronise its results.
    pub fn flush(&mut self) {
        self.streaming.flush();
    }

    pub fn queue_create_chunk(&mut self, coord: ChunkCoord) -> Result<bool, WorldError> {
        self.streaming.queue_create_chunk(coord, Priority::Medium)
    }

    pub fn queue_save_chunk(&mut self, coord: ChunkCoord) -> Result<RequestOutcome, WorldError> {
        self.streaming.queue_save_chunk(coord)
    }

    pub fn queue_recalculate_lighting(
        &mut self,
        coord: ChunkCoord,
    ) -> Result<RequestOutcome, WorldError> {
        self.streaming.queue_recalculate_lighting(coord, Priority::Medium)
    }

    pub fn queue_retesselate_chunk(
        &mut self,
        coord: ChunkCoord,
    ) -> Result<RequestOutcome, WorldError> {
        self.streaming.queue_retesselate_chunk(coord, Priority::Medium)
    }

    /// Grow trees into a generated chunk that has not had its tree pass.
    pub fn queue_generate_decorations(
        &mut self,
        coord: ChunkCoord,
    ) -> Result<RequestOutcome, WorldError> {
        self.streaming.queue_generate_decorations(coord, Priority::Medium)
    }

    pub fn set_needs_decorations(
        &mut self,
        coord: ChunkCoord,
        needs: bool,
    ) -> Result<(), WorldError> {
        self.streaming.set_needs_decorations(coord, needs)
    }

    /// Block at a world position. Fails if its chunk is not resident or a
    /// worker currently owns it.
    pub fn get_block(&self, pos: BlockPos) -> Result<Block, WorldError> {
        let (coord, index) = self.locate(pos)?;
        let slot = self.streaming.shared().pool.slot(index);
        let data = slot.try_data().ok_or(WorldError::ChunkBusy(coord.x, coord.y))?;
        let blocks = data
            .blocks
            .as_ref()
            .ok_or(WorldError::ChunkNotLoaded(coord.x, coord.y))?;
        Ok(blocks[local_index(block_to_local(pos))])
    }

    /// Replace the block at a world position and return the previous one.
    ///
    /// Any neighbour sharing the edited face is re-meshed at high priority,
    /// then the owning chunk is relit and re-meshed. Neighbours go first so
    /// their border copy of this chunk is taken before a worker owns it.
    pub fn set_block(&mut self, pos: BlockPos, id: BlockId) -> Result<Block, WorldError> {
        let (coord, index) = self.locate(pos)?;
        let local = block_to_local(pos);
        let previous = {
            let slot = self.streaming.shared().pool.slot(index);
            let mut data = slot.try_data().ok_or(WorldError::ChunkBusy(coord.x, coord.y))?;
            let blocks = data
                .blocks
                .as_mut()
                .ok_or(WorldError::ChunkNotLoaded(coord.x, coord.y))?;
            let cell = &mut blocks[local_index(local)];
            let previous = *cell;
            *cell = Block::new(id);
            data.dirty = true;
            previous
        };

        for neighbor in boundary_neighbors(coord, local) {
            match self.streaming.queue_retesselate_chunk(neighbor, Priority::High) {
                Ok(_) | Err(WorldError::ChunkNotLoaded(..)) => {}
                Err(e) => return Err(e),
            }
        }
        self.streaming.queue_recalculate_lighting(coord, Priority::High)?;
        Ok(previous)
    }

    pub fn remove_block(&mut self, pos: BlockPos) -> Result<Block, WorldError> {
        self.set_block(pos, BlockId::AIR)
    }

    fn locate(&self, pos: BlockPos) -> Result<(ChunkCoord, usize), WorldError> {
        if !(0..CHUNK_HEIGHT).contains(&pos.y) {
            return Err(WorldError::OutOfVerticalRange(pos.y));
        }
        let coord = block_to_chunk(pos);
        let index = self
            .streaming
            .slot_for(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord.x, coord.y))?;
        Ok((coord, index))
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.streaming.slot_for(coord).is_some()
    }

    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.streaming.loaded_coords()
    }

    pub fn stats(&self) -> StreamingStats {
        self.streaming.stats()
    }

    pub fn capacity(&self) -> usize {
        self.streaming.shared().pool.capacity()
    }

    pub fn pool(&self) -> &ChunkPool {
        &self.streaming.shared().pool
    }

    pub fn renderer(&self) -> &R {
        self.streaming.renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        self.streaming.renderer_mut()
    }

    /// Stop the workers, save edited chunks and free every CPU and GPU
    /// resource. Also runs on drop.
    pub fn shutdown(&mut self) {
        self.streaming.shutdown();
    }
}
