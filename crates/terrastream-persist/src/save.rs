use terrastream_core::types::{Block, ChunkCoord};

use crate::compress;
use crate::format::*;

/// Serialize one chunk column into the chunk file binary format.
///
/// Layout: header (16B) + payload. Uniform columns are stored as a 4-byte
/// fill record, everything else as a size-prepended LZ4 block.
pub fn encode_chunk(coord: ChunkCoord, blocks: &[Block]) -> Vec<u8> {
    let (encoding, payload) = match compress::detect_fill(blocks) {
        Some(block) => (ENCODING_FILL, compress::encode_fill(block).to_vec()),
        None => (ENCODING_LZ4, compress::compress_chunk(blocks)),
    };

    let header = ChunkFileHeader {
        magic: MAGIC,
        version: FORMAT_VERSION,
        encoding,
        x: coord.x,
        z: coord.y,
    };

    let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
    output.extend_from_slice(bytemuck::bytes_of(&header));
    output.extend_from_slice(&payload);
    output
}
