use std::fs;
use std::path::{Path, PathBuf};

use terrastream_core::types::{Block, ChunkCoord};

use crate::error::PersistError;
use crate::load::decode_chunk;
use crate::save::encode_chunk;

/// One file per chunk column under a world save root.
///
/// The existence of a chunk's file is the only signal used to decide
/// between deserializing and regenerating it.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Open (and create if missing) a world save directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        log::info!("Chunk store opened at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `coord`.
    pub fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.root.join(format!("chunk_{}_{}.bin", coord.x, coord.y))
    }

    /// Whether a save file exists for `coord`.
    pub fn exists(&self, coord: ChunkCoord) -> bool {
        self.chunk_path(coord).is_file()
    }

    /// Write one chunk's blocks. The file is written under a temporary name
    /// and renamed so a crash mid-write never leaves a half file behind.
    pub fn save(&self, coord: ChunkCoord, blocks: &[Block]) -> Result<(), PersistError> {
        let bytes = encode_chunk(coord, blocks);
        let path = self.chunk_path(coord);
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        log::trace!(
            "Saved chunk<{}, {}> ({} bytes)",
            coord.x,
            coord.y,
            bytes.len()
        );
        Ok(())
    }

    /// Read and decode one chunk's blocks.
    pub fn load(&self, coord: ChunkCoord) -> Result<Vec<Block>, PersistError> {
        let bytes = fs::read(self.chunk_path(coord))?;
        decode_chunk(&bytes, coord)
    }
}
