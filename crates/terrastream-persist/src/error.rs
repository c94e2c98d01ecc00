/// Errors that can occur while reading or writing a chunk file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("chunk file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid magic bytes (expected TSCK)")]
    InvalidMagic,

    #[error("unsupported chunk format version {0}")]
    UnsupportedVersion(u16),

    #[error("unknown block encoding {0}")]
    UnknownEncoding(u16),

    #[error("chunk file holds <{found_x}, {found_z}>, expected <{expected_x}, {expected_z}>")]
    CoordMismatch {
        expected_x: i32,
        expected_z: i32,
        found_x: i32,
        found_z: i32,
    },

    #[error("file too small ({0} bytes, minimum {1})")]
    FileTooSmall(usize, usize),

    #[error("LZ4 decompression failed: {0}")]
    DecompressError(String),

    #[error("invalid chunk size: expected {expected}, got {actual}")]
    InvalidChunkSize { expected: usize, actual: usize },

    #[error("invalid fill chunk data (expected 4 bytes, got {0})")]
    InvalidFillChunk(usize),
}
