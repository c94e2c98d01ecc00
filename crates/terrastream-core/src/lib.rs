pub mod constants;
pub mod math;
pub mod types;

pub use types::{Block, BlockId, BlockPos, ChunkCoord};
