use terrastream_core::types::{Block, ChunkCoord};

use crate::compat;
use crate::compress;
use crate::error::PersistError;
use crate::format::*;

/// Parse a chunk file from raw bytes, checking it belongs to `coord`.
pub fn decode_chunk(bytes: &[u8], coord: ChunkCoord) -> Result<Vec<Block>, PersistError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PersistError::FileTooSmall(bytes.len(), HEADER_SIZE));
    }

    let header: ChunkFileHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    compat::validate_header(&header, coord)?;

    let payload = &bytes[HEADER_SIZE..];
    match header.encoding {
        ENCODING_FILL => compress::expand_fill(payload),
        _ => compress::decompress_chunk(payload),
    }
}
