use terrastream_core::constants::BYTES_PER_CHUNK;

/// Magic bytes identifying a terrastream chunk file.
pub const MAGIC: [u8; 4] = *b"TSCK";

/// Current chunk file format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Payload is an LZ4 block with the decompressed size prepended.
pub const ENCODING_LZ4: u16 = 0;

/// Payload is a single 4-byte block repeated over the whole column.
pub const ENCODING_FILL: u16 = 1;

/// Size of a fill payload in bytes (one packed block).
pub const FILL_PAYLOAD_SIZE: usize = 4;

/// Expected decompressed chunk size in bytes.
pub const CHUNK_DATA_SIZE: usize = BYTES_PER_CHUNK;

/// Chunk file header. Fixed 16 bytes, repr(C) for byte-level serialization.
/// The coordinates are repeated inside the file so a renamed or misplaced
/// file is rejected instead of loading the wrong terrain.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ChunkFileHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub encoding: u16,
    pub x: i32,
    pub z: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<ChunkFileHeader>(), HEADER_SIZE);
    }
}
