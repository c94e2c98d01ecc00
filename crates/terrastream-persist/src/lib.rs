pub mod compat;
pub mod compress;
pub mod error;
pub mod format;
pub mod load;
pub mod save;
pub mod store;

pub use error::PersistError;
pub use format::ChunkFileHeader;
pub use load::decode_chunk;
pub use save::encode_chunk;
pub use store::ChunkStore;
