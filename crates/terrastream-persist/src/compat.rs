use terrastream_core::types::ChunkCoord;

use crate::error::PersistError;
use crate::format::{ChunkFileHeader, ENCODING_FILL, ENCODING_LZ4, FORMAT_VERSION, MAGIC};

/// Validate a chunk file header against the coordinates it was looked up by.
pub fn validate_header(header: &ChunkFileHeader, coord: ChunkCoord) -> Result<(), PersistError> {
    if header.magic != MAGIC {
        return Err(PersistError::InvalidMagic);
    }

    if header.version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(header.version));
    }

    if header.encoding != ENCODING_LZ4 && header.encoding != ENCODING_FILL {
        return Err(PersistError::UnknownEncoding(header.encoding));
    }

    if header.x != coord.x || header.z != coord.y {
        return Err(PersistError::CoordMismatch {
            expected_x: coord.x,
            expected_z: coord.y,
            found_x: header.x,
            found_z: header.z,
        });
    }

    Ok(())
}
