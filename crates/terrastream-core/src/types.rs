use glam::{IVec2, IVec3};

/// Chunk column coordinate in chunk-space: `x` is world X / 16, `y` is world Z / 16.
pub type ChunkCoord = IVec2;

/// World coordinate of a single block.
pub type BlockPos = IVec3;

/// Newtype for block type identifiers. 0 = air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: BlockId = BlockId(0);
    pub const STONE: BlockId = BlockId(1);
    pub const DIRT: BlockId = BlockId(2);
    pub const GRASS: BlockId = BlockId(3);
    pub const SAND: BlockId = BlockId(4);
    pub const WATER: BlockId = BlockId(5);
    pub const BEDROCK: BlockId = BlockId(6);
    pub const GLOWSTONE: BlockId = BlockId(7);
    pub const LOG: BlockId = BlockId(8);
    pub const LEAVES: BlockId = BlockId(9);

    /// Whether light and visibility are blocked by this block.
    pub fn is_opaque(self) -> bool {
        !matches!(self, BlockId::AIR | BlockId::WATER | BlockId::LEAVES)
    }

    /// Whether the block produces geometry at all.
    pub fn is_visible(self) -> bool {
        self != BlockId::AIR
    }

    /// Block light emitted by this block type.
    pub fn emission(self) -> u8 {
        match self {
            BlockId::GLOWSTONE => 14,
            _ => 0,
        }
    }
}

/// Packed block: 4 bytes, `repr(C)` so whole chunk buffers can be cast to
/// bytes for persistence.
///
/// Layout:
///   id     u16  block type
///   light  u8   high nibble sky light, low nibble block light
///   flags  u8   reserved for gameplay state (orientation etc.)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Block {
    pub id: u16,
    pub light: u8,
    pub flags: u8,
}

impl Block {
    pub const AIR: Block = Block::new(BlockId::AIR);

    pub const fn new(id: BlockId) -> Self {
        Self {
            id: id.0,
            light: 0,
            flags: 0,
        }
    }

    pub fn block_id(&self) -> BlockId {
        BlockId(self.id)
    }

    pub fn is_air(&self) -> bool {
        self.id == BlockId::AIR.0
    }

    pub fn sky_light(&self) -> u8 {
        self.light >> 4
    }

    pub fn block_light(&self) -> u8 {
        self.light & 0x0F
    }

    pub fn set_sky_light(&mut self, level: u8) {
        self.light = (self.light & 0x0F) | (level.min(15) << 4);
    }

    pub fn set_block_light(&mut self, level: u8) {
        self.light = (self.light & 0xF0) | level.min(15);
    }

    /// Brightest of sky and block light.
    pub fn combined_light(&self) -> u8 {
        self.sky_light().max(self.block_light())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size() {
        assert_eq!(std::mem::size_of::<Block>(), crate::constants::BLOCK_BYTES);
    }

    #[test]
    fn test_light_nibbles_independent() {
        let mut block = Block::new(BlockId::STONE);
        block.set_sky_light(12);
        block.set_block_light(5);
        assert_eq!(block.sky_light(), 12);
        assert_eq!(block.block_light(), 5);
        block.set_sky_light(3);
        assert_eq!(block.block_light(), 5);
        assert_eq!(block.combined_light(), 5);
    }

    #[test]
    fn test_light_clamped_to_four_bits() {
        let mut block = Block::AIR;
        block.set_block_light(200);
        assert_eq!(block.block_light(), 15);
    }

    #[test]
    fn test_opacity() {
        assert!(BlockId::STONE.is_opaque());
        assert!(BlockId::GLOWSTONE.is_opaque());
        assert!(!BlockId::AIR.is_opaque());
        assert!(!BlockId::WATER.is_opaque());
        assert!(!BlockId::LEAVES.is_opaque());
    }
}
