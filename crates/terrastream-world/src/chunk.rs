use terrastream_core::constants::SUB_CHUNKS_PER_CHUNK;
use terrastream_core::types::Block;

use crate::mesher::Vertex;

/// Pipeline phase of a chunk column, and of each of its sub-chunks.
///
/// Declared in pipeline order; see `state_machine` for the legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ChunkPhase {
    /// Slot is free or the sub-chunk has no geometry.
    #[default]
    Unloaded = 0,
    /// Assigned to coordinates; waiting for a worker to populate blocks.
    LoadBlockData = 1,
    /// A worker is generating or deserializing block data.
    LoadingBlockData = 2,
    /// An edit invalidated the mesh; waiting for a worker to rebuild it.
    RetesselateVertices = 3,
    /// Rebuilt vertices are ready to replace the current GPU mesh.
    DoneRetesselating = 4,
    /// Block data is ready; waiting to be meshed.
    TesselateVertices = 5,
    /// A worker is building vertices.
    TesselatingVertices = 6,
    /// Vertices are ready for the first GPU upload.
    UploadVerticesToGpu = 7,
    /// GPU-resident and renderable.
    Uploaded = 8,
}

impl ChunkPhase {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ChunkPhase::LoadBlockData,
            2 => ChunkPhase::LoadingBlockData,
            3 => ChunkPhase::RetesselateVertices,
            4 => ChunkPhase::DoneRetesselating,
            5 => ChunkPhase::TesselateVertices,
            6 => ChunkPhase::TesselatingVertices,
            7 => ChunkPhase::UploadVerticesToGpu,
            8 => ChunkPhase::Uploaded,
            _ => ChunkPhase::Unloaded,
        }
    }

    /// Whether CPU vertices are waiting for the main thread to upload them.
    pub fn awaits_upload(self) -> bool {
        matches!(
            self,
            ChunkPhase::UploadVerticesToGpu | ChunkPhase::DoneRetesselating
        )
    }
}

const PHASE_MASK: u32 = 0xFF;
const WORKING_BIT: u32 = 1 << 8;
const LOADED_BIT: u32 = 1 << 9;
const FAILED_BIT: u32 = 1 << 10;

/// Everything other threads may read about a slot without a lock, packed
/// into one word so phase and flags are always observed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotStatus {
    pub phase: ChunkPhase,
    /// Owned by a background task; CPU buffers are off-limits to the main thread.
    pub working: bool,
    /// Slot is assigned to a coordinate (resident or on its way to it).
    pub loaded: bool,
    /// The last load attempt hit corrupt data.
    pub failed: bool,
}

impl SlotStatus {
    pub const FREE: SlotStatus = SlotStatus {
        phase: ChunkPhase::Unloaded,
        working: false,
        loaded: false,
        failed: false,
    };

    pub fn pack(self) -> u32 {
        let mut bits = self.phase as u32;
        if self.working {
            bits |= WORKING_BIT;
        }
        if self.loaded {
            bits |= LOADED_BIT;
        }
        if self.failed {
            bits |= FAILED_BIT;
        }
        bits
    }

    pub fn unpack(bits: u32) -> Self {
        Self {
            phase: ChunkPhase::from_u8((bits & PHASE_MASK) as u8),
            working: bits & WORKING_BIT != 0,
            loaded: bits & LOADED_BIT != 0,
            failed: bits & FAILED_BIT != 0,
        }
    }

    pub fn with_phase(self, phase: ChunkPhase) -> Self {
        Self { phase, ..self }
    }

    /// Free for assignment: not resident and not owned by a worker.
    pub fn is_free(self) -> bool {
        !self.loaded && !self.working
    }
}

/// Streaming intent for a slot, decided by the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    #[default]
    None,
    /// Upload to the GPU once the worker releases the slot.
    Load,
    /// Tear down GPU state and recycle once the worker releases the slot.
    Unload,
}

/// CPU-side buffers of one slot. Only the holder of the slot's `working`
/// token, or the main thread while `working` is clear, may touch these.
#[derive(Debug)]
pub struct ChunkData {
    /// Block buffer; `None` while the slot holds no CPU data.
    pub blocks: Option<Vec<Block>>,
    /// Vertices built by a worker, one buffer per sub-chunk, consumed on upload.
    pub sub_meshes: Vec<Option<Vec<Vertex>>>,
    /// Edited since the last save.
    pub dirty: bool,
    /// Freshly generated blocks still waiting for their tree pass.
    pub needs_decorations: bool,
}

impl Default for ChunkData {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkData {
    pub fn new() -> Self {
        Self {
            blocks: None,
            sub_meshes: vec![None; SUB_CHUNKS_PER_CHUNK],
            dirty: false,
            needs_decorations: false,
        }
    }

    /// Release every CPU buffer.
    pub fn free_cpu(&mut self) {
        self.blocks = None;
        for mesh in &mut self.sub_meshes {
            *mesh = None;
        }
        self.dirty = false;
        self.needs_decorations = false;
    }

    pub fn has_blocks(&self) -> bool {
        self.blocks.is_some()
    }
}
