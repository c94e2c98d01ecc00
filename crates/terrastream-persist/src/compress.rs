use terrastream_core::constants::BLOCKS_PER_CHUNK;
use terrastream_core::types::Block;

use crate::error::PersistError;
use crate::format::{CHUNK_DATA_SIZE, FILL_PAYLOAD_SIZE};

/// Compress a chunk's block buffer using LZ4.
pub fn compress_chunk(blocks: &[Block]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(bytemuck::cast_slice(blocks))
}

/// Decompress an LZ4-compressed chunk, validating the output size.
pub fn decompress_chunk(compressed: &[u8]) -> Result<Vec<Block>, PersistError> {
    let decompressed = lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| PersistError::DecompressError(e.to_string()))?;

    if decompressed.len() != CHUNK_DATA_SIZE {
        return Err(PersistError::InvalidChunkSize {
            expected: CHUNK_DATA_SIZE,
            actual: decompressed.len(),
        });
    }

    Ok(decompressed
        .chunks_exact(FILL_PAYLOAD_SIZE)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Check if all blocks in a chunk are identical (e.g. an all-air column).
/// Returns that block if so.
pub fn detect_fill(blocks: &[Block]) -> Option<Block> {
    if blocks.len() != BLOCKS_PER_CHUNK {
        return None;
    }
    let first = blocks[0];
    blocks.iter().all(|b| *b == first).then_some(first)
}

/// Encode a fill record: the repeated block's 4 raw bytes.
pub fn encode_fill(block: Block) -> [u8; FILL_PAYLOAD_SIZE] {
    bytemuck::cast(block)
}

/// Expand a 4-byte fill record back to a full block buffer.
pub fn expand_fill(data: &[u8]) -> Result<Vec<Block>, PersistError> {
    if data.len() != FILL_PAYLOAD_SIZE {
        return Err(PersistError::InvalidFillChunk(data.len()));
    }
    let block: Block = bytemuck::pod_read_unaligned(data);
    Ok(vec![block; BLOCKS_PER_CHUNK])
}
