use crate::constants::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};
use crate::types::{BlockPos, ChunkCoord};
use glam::{IVec2, IVec3, Vec3};

/// Convert an observer position in world space to the chunk column containing it.
/// Uses floor division so that -0.5 lands in chunk -1, not chunk 0.
pub fn world_to_chunk(position: Vec3) -> ChunkCoord {
    let block = position.floor().as_ivec3();
    block_to_chunk(block)
}

/// Convert a block position to the chunk column containing it.
pub fn block_to_chunk(block: BlockPos) -> ChunkCoord {
    IVec2::new(block.x.div_euclid(CHUNK_WIDTH), block.z.div_euclid(CHUNK_DEPTH))
}

/// Convert a block position to its local offset within its chunk column.
/// Y is passed through unchanged (columns span the full world height).
pub fn block_to_local(block: BlockPos) -> IVec3 {
    IVec3::new(
        block.x.rem_euclid(CHUNK_WIDTH),
        block.y,
        block.z.rem_euclid(CHUNK_DEPTH),
    )
}

/// Convert a chunk coordinate and local offset back to a world block position.
pub fn chunk_local_to_block(chunk: ChunkCoord, local: IVec3) -> BlockPos {
    IVec3::new(
        chunk.x * CHUNK_WIDTH + local.x,
        local.y,
        chunk.y * CHUNK_DEPTH + local.z,
    )
}

/// Whether a local position lies inside a chunk column.
pub fn local_in_bounds(local: IVec3) -> bool {
    local.x >= 0
        && local.x < CHUNK_WIDTH
        && local.y >= 0
        && local.y < CHUNK_HEIGHT
        && local.z >= 0
        && local.z < CHUNK_DEPTH
}

/// Flat index of a local position in a chunk block buffer.
/// Layout is Y-major so one sub-chunk is a contiguous slice.
pub fn local_index(local: IVec3) -> usize {
    (local.y * CHUNK_WIDTH * CHUNK_DEPTH + local.z * CHUNK_WIDTH + local.x) as usize
}

/// Squared chunk-space distance between two columns. Widened to `i64` so
/// columns at opposite ends of the coordinate range do not overflow.
pub fn chunk_distance_sq(a: ChunkCoord, b: ChunkCoord) -> i64 {
    let d = a.as_i64vec2() - b.as_i64vec2();
    d.x * d.x + d.y * d.y
}

/// Neighbouring columns whose meshes share a face with the edited local position.
/// Returns up to two coordinates (an edit in a corner touches two neighbours).
pub fn boundary_neighbors(chunk: ChunkCoord, local: IVec3) -> Vec<ChunkCoord> {
    let mut neighbors = Vec::with_capacity(2);
    if local.x == 0 {
        neighbors.push(chunk + IVec2::new(-1, 0));
    } else if local.x == CHUNK_WIDTH - 1 {
        neighbors.push(chunk + IVec2::new(1, 0));
    }
    if local.z == 0 {
        neighbors.push(chunk + IVec2::new(0, -1));
    } else if local.z == CHUNK_DEPTH - 1 {
        neighbors.push(chunk + IVec2::new(0, 1));
    }
    neighbors
}
