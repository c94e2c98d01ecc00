use std::sync::Arc;

use terrastream_persist::ChunkStore;

use crate::chunk::ChunkPhase;
use crate::chunk_pool::{ChunkPool, ChunkSlot};
use crate::lighting::compute_lighting;
use crate::mesher::{mesh_chunk, NeighborBorders};
use crate::terrain::TerrainGenerator;

/// State shared between the main thread and background tasks.
#[derive(Debug)]
pub struct WorldShared {
    pub pool: ChunkPool,
    pub store: ChunkStore,
    pub terrain: TerrainGenerator,
}

/// Background work for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkTask {
    /// Deserialize or generate, light, mesh.
    Load,
    /// Recompute lighting, then rebuild the mesh.
    Relight,
    /// Rebuild the mesh from current blocks and light.
    Retesselate,
    /// Grow trees into freshly generated blocks, then relight and re-mesh.
    Decorate,
    /// Write edited blocks to disk.
    Save,
    /// Save if edited, then free CPU buffers.
    Unload,
}

/// Ownership of a slot's `working` token.
///
/// Taken on the main thread when the task is queued and moved into the task
/// payload. If it is dropped without an explicit release (the task panicked
/// or was dropped at shutdown) the slot is released in a safe state: a
/// resident chunk returns to `fallback`, a half-loaded one is freed and
/// marked failed.
#[derive(Debug)]
pub struct SlotClaim {
    shared: Arc<WorldShared>,
    index: usize,
    generation: u64,
    fallback: Option<ChunkPhase>,
    released: bool,
}

impl SlotClaim {
    pub fn new(
        shared: Arc<WorldShared>,
        index: usize,
        generation: u64,
        fallback: Option<ChunkPhase>,
    ) -> Self {
        Self {
            shared,
            index,
            generation,
            fallback,
            released: false,
        }
    }

    pub fn slot(&self) -> &ChunkSlot {
        self.shared.pool.slot(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the slot still holds the residency this claim was taken for.
    pub fn is_current(&self) -> bool {
        self.slot().generation() == self.generation
    }

    pub fn release(&mut self, phase: ChunkPhase) {
        debug_assert!(!self.released);
        self.slot().release(phase);
        self.released = true;
    }

    pub fn release_failed(&mut self) {
        debug_assert!(!self.released);
        self.slot().lock_data().free_cpu();
        self.slot().release_failed();
        self.released = true;
    }
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let coord = self.slot().coord();
        match self.fallback {
            Some(phase) => {
                log::warn!(
                    "Task for chunk<{}, {}> ended without finishing; restoring {phase:?}",
                    coord.x,
                    coord.y
                );
                self.slot().release(phase);
            }
            None => {
                log::warn!(
                    "Load of chunk<{}, {}> ended without finishing; marking failed",
                    coord.x,
                    coord.y
                );
                self.slot().lock_data().free_cpu();
                self.slot().release_failed();
            }
        }
        self.released = true;
    }
}

/// Entry point of every chunk task on a worker thread.
///
/// `borders` are the neighbour planes captured when the task was queued;
/// meshing tasks cull their edge faces against them.
pub fn run_chunk_task(claim: &mut SlotClaim, task: ChunkTask, borders: &NeighborBorders) {
    if !claim.is_current() {
        let phase = claim.slot().status().phase;
        log::debug!("Discarding stale {task:?} task for slot {}", claim.index());
        claim.release(phase);
        return;
    }
    match task {
        ChunkTask::Load => load_chunk(claim, borders),
        ChunkTask::Relight => rebuild_mesh(claim, true, borders),
        ChunkTask::Retesselate => rebuild_mesh(claim, false, borders),
        ChunkTask::Decorate => {
            if decorate_chunk(claim) {
                rebuild_mesh(claim, true, borders);
            } else {
                claim.release(ChunkPhase::Uploaded);
            }
        }
        ChunkTask::Save => {
            let phase = claim.slot().status().phase;
            save_chunk(claim);
            claim.release(phase);
        }
        ChunkTask::Unload => unload_chunk(claim),
    }
}

fn load_chunk(claim: &mut SlotClaim, borders: &NeighborBorders) {
    let shared = Arc::clone(&claim.shared);
    let slot = claim.slot();
    let coord = slot.coord();
    slot.advance(ChunkPhase::LoadingBlockData);

    let (mut blocks, generated) = if shared.store.exists(coord) {
        match shared.store.load(coord) {
            Ok(blocks) => {
                log::trace!("Deserialized chunk<{}, {}>", coord.x, coord.y);
                (blocks, false)
            }
            Err(e) => {
                log::error!("Failed to load chunk<{}, {}>: {e}", coord.x, coord.y);
                claim.release_failed();
                return;
            }
        }
    } else {
        (shared.terrain.generate_chunk(coord), true)
    };

    slot.advance(ChunkPhase::TesselateVertices);
    compute_lighting(&mut blocks);

    slot.advance(ChunkPhase::TesselatingVertices);
    let meshes = mesh_chunk(&blocks, borders);
    for (sub, mesh) in meshes.iter().enumerate() {
        let phase = if mesh.is_some() {
            ChunkPhase::UploadVerticesToGpu
        } else {
            ChunkPhase::Uploaded
        };
        slot.set_sub_chunk_phase(sub, phase);
    }

    {
        let mut data = slot.lock_data();
        data.blocks = Some(blocks);
        data.sub_meshes = meshes;
        data.dirty = false;
        data.needs_decorations = generated;
    }
    claim.release(ChunkPhase::UploadVerticesToGpu);
}

/// Run the tree pass if the chunk still wants it. Returns whether the blocks
/// changed.
fn decorate_chunk(claim: &SlotClaim) -> bool {
    let slot = claim.slot();
    let coord = slot.coord();
    let mut data = slot.lock_data();
    if !data.needs_decorations {
        return false;
    }
    data.needs_decorations = false;
    let Some(blocks) = data.blocks.as_mut() else {
        return false;
    };
    let trees = claim.shared.terrain.decorate_chunk(coord, blocks);
    log::trace!("Decorated chunk<{}, {}> with {trees} trees", coord.x, coord.y);
    true
}

fn rebuild_mesh(claim: &mut SlotClaim, relight: bool, borders: &NeighborBorders) {
    let slot = claim.slot();
    let rebuilt = {
        let mut data = slot.lock_data();
        match data.blocks.as_mut() {
            Some(blocks) => {
                if relight {
                    compute_lighting(blocks);
                }
                let meshes = mesh_chunk(blocks, borders);
                for (sub, mesh) in meshes.iter().enumerate() {
                    let phase = if mesh.is_some() {
                        ChunkPhase::DoneRetesselating
                    } else {
                        ChunkPhase::Uploaded
                    };
                    slot.set_sub_chunk_phase(sub, phase);
                }
                data.sub_meshes = meshes;
                true
            }
            None => false,
        }
    };

    if rebuilt {
        claim.release(ChunkPhase::DoneRetesselating);
    } else {
        // Nothing to mesh; the current GPU mesh stays.
        claim.release(ChunkPhase::Uploaded);
    }
}

fn save_chunk(claim: &SlotClaim) {
    let slot = claim.slot();
    let coord = slot.coord();
    let mut data = slot.lock_data();
    if !data.dirty {
        return;
    }
    let Some(blocks) = data.blocks.as_deref() else {
        return;
    };
    match claim.shared.store.save(coord, blocks) {
        Ok(()) => {
            data.dirty = false;
            log::debug!("Saved chunk<{}, {}>", coord.x, coord.y);
        }
        Err(e) => log::error!("Failed to save chunk<{}, {}>: {e}", coord.x, coord.y),
    }
}

fn unload_chunk(claim: &mut SlotClaim) {
    save_chunk(claim);
    let phase = {
        let slot = claim.slot();
        slot.lock_data().free_cpu();
        slot.status().phase
    };
    claim.release(phase);
}
