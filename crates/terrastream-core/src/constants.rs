//! Single source of truth for shared constants.
//! Chunk geometry is used by the mesher, the persistence format and the
//! streaming radius math, so every crate pulls it from here.

/// Width of a chunk column along X, in blocks.
pub const CHUNK_WIDTH: i32 = 16;

/// Depth of a chunk column along Z, in blocks.
pub const CHUNK_DEPTH: i32 = 16;

/// Height of a chunk column along Y, in blocks.
pub const CHUNK_HEIGHT: i32 = 256;

/// Height of one vertical sub-chunk (the unit of meshing and GPU upload).
pub const SUB_CHUNK_HEIGHT: i32 = 16;

/// Number of sub-chunks stacked in one chunk column.
pub const SUB_CHUNKS_PER_CHUNK: usize = (CHUNK_HEIGHT / SUB_CHUNK_HEIGHT) as usize;

/// Total blocks per chunk column (16 * 256 * 16).
pub const BLOCKS_PER_CHUNK: usize = (CHUNK_WIDTH * CHUNK_HEIGHT * CHUNK_DEPTH) as usize;

/// Bytes per packed block.
pub const BLOCK_BYTES: usize = 4;

/// Total bytes of one chunk's block buffer.
pub const BYTES_PER_CHUNK: usize = BLOCKS_PER_CHUNK * BLOCK_BYTES;

/// Maximum light level for both sky light and block light (4-bit).
pub const MAX_LIGHT_LEVEL: u8 = 15;

/// Default streaming radius in chunks.
pub const DEFAULT_CHUNK_RADIUS: u16 = 8;

/// Default number of background worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Sea level in world-space block Y coordinate.
pub const SEA_LEVEL: i32 = 64;

/// Largest accepted streaming radius, in chunks.
pub const MAX_CHUNK_RADIUS: u16 = 1024;

/// Pool capacity for a given radius. The area of the streaming circle is
/// pi * r^2; pi is rounded up to 4 and r padded by one to leave slack for
/// chunks that are still being torn down.
pub const fn pool_capacity_for_radius(radius: u16) -> usize {
    let r = radius as usize + 1;
    r * r * 4
}
