use glam::IVec3;
use terrastream_core::constants::*;
use terrastream_core::math::{local_in_bounds, local_index};
use terrastream_core::types::{Block, BlockId, ChunkCoord};

/// Roughly one column in this many carries a buried glowstone block.
const GLOWSTONE_RARITY: u32 = 97;
/// Roughly one grass column in this many roots a tree.
const TREE_RARITY: u32 = 53;
const TREE_SALT: u64 = 0x7EE5_0000_0000_0001;
/// Horizontal reach of a canopy from its trunk.
const CANOPY_RADIUS: i32 = 2;
const MIN_TRUNK_HEIGHT: i32 = 4;

/// A tree standing on the surface block at `root`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tree {
    pub root: IVec3,
    pub trunk_height: i32,
}

impl Tree {
    /// World position of the highest log.
    pub fn top(&self) -> IVec3 {
        self.root + IVec3::new(0, self.trunk_height, 0)
    }
}

/// Deterministic heightmap terrain from 2D simplex noise.
///
/// Output is a pure function of the seed and the chunk coordinates, so a
/// regenerated chunk is identical to the one that was first streamed in.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    seed: u64,
    /// Permutation table for simplex noise (doubled for wrapping).
    perm: [u8; 512],
}

impl TerrainGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            perm: Self::build_permutation(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate the block buffer of one 16x256x16 column.
    ///
    /// Layers from the bottom: bedrock at y=0, stone, three blocks of dirt,
    /// then grass (sand near the waterline). Water fills up to sea level
    /// above low terrain.
    pub fn generate_chunk(&self, coord: ChunkCoord) -> Vec<Block> {
        let mut blocks = vec![Block::AIR; BLOCKS_PER_CHUNK];
        let base_x = coord.x * CHUNK_WIDTH;
        let base_z = coord.y * CHUNK_DEPTH;

        for lz in 0..CHUNK_DEPTH {
            for lx in 0..CHUNK_WIDTH {
                let wx = base_x + lx;
                let wz = base_z + lz;
                let height = self.terrain_height(wx, wz);

                for ly in 0..CHUNK_HEIGHT {
                    let id = Self::layer_at(ly, height);
                    if id != BlockId::AIR {
                        blocks[local_index(IVec3::new(lx, ly, lz))] = Block::new(id);
                    }
                }

                if self.column_hash(wx, wz, 0) % GLOWSTONE_RARITY == 0 && height > 8 {
                    let y = height - 6;
                    blocks[local_index(IVec3::new(lx, y, lz))] = Block::new(BlockId::GLOWSTONE);
                }
            }
        }

        blocks
    }

    fn layer_at(y: i32, height: i32) -> BlockId {
        if y == 0 {
            BlockId::BEDROCK
        } else if y < height - 3 {
            BlockId::STONE
        } else if y < height {
            BlockId::DIRT
        } else if y == height {
            if height <= SEA_LEVEL + 1 {
                BlockId::SAND
            } else {
                BlockId::GRASS
            }
        } else if y <= SEA_LEVEL {
            BlockId::WATER
        } else {
            BlockId::AIR
        }
    }

    /// Surface height at a world-space (x, z) column using 3-octave simplex noise.
    pub fn terrain_height(&self, wx: i32, wz: i32) -> i32 {
        let x = wx as f64;
        let z = wz as f64;

        let scale = 0.01;
        let mut h = 0.0f64;
        h += self.simplex2d(x * scale, z * scale) * 24.0;
        h += self.simplex2d(x * scale * 2.0 + 100.0, z * scale * 2.0 + 100.0) * 8.0;
        h += self.simplex2d(x * scale * 4.0 + 200.0, z * scale * 4.0 + 200.0) * 3.0;

        let height = (SEA_LEVEL as f64 + 6.0 + h).round() as i32;
        height.clamp(1, CHUNK_HEIGHT - 2)
    }

    /// Tree rooted in world column (`wx`, `wz`), if one grows there.
    pub fn tree_at(&self, wx: i32, wz: i32) -> Option<Tree> {
        let hash = self.column_hash(wx, wz, TREE_SALT);
        if hash % TREE_RARITY != 0 {
            return None;
        }
        let height = self.terrain_height(wx, wz);
        // Sand and water columns stay bare.
        if height <= SEA_LEVEL + 1 {
            return None;
        }
        Some(Tree {
            root: IVec3::new(wx, height, wz),
            trunk_height: MIN_TRUNK_HEIGHT + ((hash / TREE_RARITY) % 3) as i32,
        })
    }

    /// Every tree whose canopy reaches into `coord`, including trees rooted
    /// in the neighbouring columns.
    pub fn trees_touching(&self, coord: ChunkCoord) -> Vec<Tree> {
        let base_x = coord.x * CHUNK_WIDTH;
        let base_z = coord.y * CHUNK_DEPTH;
        let mut trees = Vec::new();
        for wz in base_z - CANOPY_RADIUS..base_z + CHUNK_DEPTH + CANOPY_RADIUS {
            for wx in base_x - CANOPY_RADIUS..base_x + CHUNK_WIDTH + CANOPY_RADIUS {
                if let Some(tree) = self.tree_at(wx, wz) {
                    trees.push(tree);
                }
            }
        }
        trees
    }

    /// Grow trees into a generated column. Returns how many trees touched it.
    ///
    /// Leaves only fill air and logs only replace air or leaves, so the result
    /// is independent of placement order and running it twice changes nothing.
    /// A tree on a chunk border comes out whole once both columns are
    /// decorated.
    pub fn decorate_chunk(&self, coord: ChunkCoord, blocks: &mut [Block]) -> usize {
        let origin = IVec3::new(coord.x * CHUNK_WIDTH, 0, coord.y * CHUNK_DEPTH);
        let trees = self.trees_touching(coord);
        let mut place = |world: IVec3, id: BlockId| {
            let local = world - origin;
            if !local_in_bounds(local) {
                return;
            }
            let cell = &mut blocks[local_index(local)];
            let current = cell.block_id();
            let replaceable = current == BlockId::AIR
                || (id == BlockId::LOG && current == BlockId::LEAVES);
            if replaceable {
                *cell = Block::new(id);
            }
        };

        for tree in &trees {
            let top = tree.top();
            for dy in -2..=1 {
                let reach = if dy < 0 { CANOPY_RADIUS } else { 1 };
                for dz in -reach..=reach {
                    for dx in -reach..=reach {
                        let corner = dx.abs() == reach && dz.abs() == reach;
                        // Round the wide layers and leave a cross on top.
                        if corner && (reach == CANOPY_RADIUS || dy == 1) {
                            continue;
                        }
                        place(top + IVec3::new(dx, dy, dz), BlockId::LEAVES);
                    }
                }
            }
            for dy in 1..=tree.trunk_height {
                place(tree.root + IVec3::new(0, dy, 0), BlockId::LOG);
            }
        }
        trees.len()
    }

    fn column_hash(&self, wx: i32, wz: i32, salt: u64) -> u32 {
        let mut h = (self.seed ^ salt).wrapping_mul(0xD6E8_FEB8_6659_FD93);
        h ^= 0x9E37_79B9_7F4A_7C15;
        h ^= (wx as u32 as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = h.rotate_left(31);
        h ^= (wz as u32 as u64).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 29;
        (h >> 32) as u32
    }

    /// 2D simplex noise. Returns value in [-1, 1].
    fn simplex2d(&self, x: f64, z: f64) -> f64 {
        const F2: f64 = 0.5 * (1.7320508075688772 - 1.0);
        const G2: f64 = (3.0 - 1.7320508075688772) / 6.0;

        let s = (x + z) * F2;
        let i = (x + s).floor();
        let j = (z + s).floor();

        let t = (i + j) * G2;
        let x0 = x - (i - t);
        let y0 = z - (j - t);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + G2;
        let y1 = y0 - j1 as f64 + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;

        let gi0 = self.perm[ii + self.perm[jj] as usize] as usize % 12;
        let gi1 = self.perm[ii + i1 + self.perm[jj + j1] as usize] as usize % 12;
        let gi2 = self.perm[ii + 1 + self.perm[jj + 1] as usize] as usize % 12;

        let n0 = Self::corner_contribution(gi0, x0, y0);
        let n1 = Self::corner_contribution(gi1, x1, y1);
        let n2 = Self::corner_contribution(gi2, x2, y2);

        70.0 * (n0 + n1 + n2)
    }

    fn corner_contribution(gi: usize, x: f64, y: f64) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let t = t * t;
            t * t * Self::grad2d(gi, x, y)
        }
    }

    fn grad2d(hash: usize, x: f64, y: f64) -> f64 {
        const GRAD: [[f64; 2]; 8] = [
            [1.0, 1.0],
            [-1.0, 1.0],
            [1.0, -1.0],
            [-1.0, -1.0],
            [1.0, 0.0],
            [-1.0, 0.0],
            [0.0, 1.0],
            [0.0, -1.0],
        ];
        let g = &GRAD[hash % 8];
        g[0] * x + g[1] * y
    }

    fn build_permutation(seed: u64) -> [u8; 512] {
        let mut p: [u8; 256] = [0; 256];
        for (i, val) in p.iter_mut().enumerate() {
            *val = i as u8;
        }

        // Fisher-Yates with an LCG stream
        let mut rng = seed;
        for i in (1..256).rev() {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let j = (rng >> 33) as usize % (i + 1);
            p.swap(i, j);
        }

        let mut perm = [0u8; 512];
        for (i, val) in perm.iter_mut().enumerate() {
            *val = p[i & 255];
        }
        perm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    fn count(blocks: &[Block], id: BlockId) -> usize {
        blocks.iter().filter(|b| b.block_id() == id).count()
    }

    #[test]
    fn test_terrain_deterministic() {
        let a = TerrainGenerator::new(42).generate_chunk(IVec2::new(3, -7));
        let b = TerrainGenerator::new(42).generate_chunk(IVec2::new(3, -7));
        assert_eq!(a, b, "terrain generation must be deterministic");
    }

    #[test]
    fn test_seed_changes_terrain() {
        let a = TerrainGenerator::new(1).generate_chunk(IVec2::new(10, 10));
        let b = TerrainGenerator::new(2).generate_chunk(IVec2::new(10, 10));
        assert_ne!(a, b);
    }

    #[test]
    fn test_chunk_size() {
        let blocks = TerrainGenerator::new(42).generate_chunk(IVec2::ZERO);
        assert_eq!(blocks.len(), BLOCKS_PER_CHUNK);
    }

    #[test]
    fn test_bedrock_floor_and_air_ceiling() {
        let blocks = TerrainGenerator::new(42).generate_chunk(IVec2::new(-2, 5));
        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let floor = blocks[local_index(IVec3::new(x, 0, z))];
                assert_eq!(floor.block_id(), BlockId::BEDROCK);
                let top = blocks[local_index(IVec3::new(x, CHUNK_HEIGHT - 1, z))];
                assert!(top.is_air());
            }
        }
    }

    #[test]
    fn test_layers_present() {
        let blocks = TerrainGenerator::new(42).generate_chunk(IVec2::new(4, 4));
        assert!(count(&blocks, BlockId::STONE) > 0);
        assert!(count(&blocks, BlockId::DIRT) > 0);
        assert_eq!(count(&blocks, BlockId::GRASS) + count(&blocks, BlockId::SAND), 256);
    }

    #[test]
    fn test_heights_in_range() {
        let gen = TerrainGenerator::new(7);
        for wx in (-500..500).step_by(37) {
            for wz in (-500..500).step_by(41) {
                let h = gen.terrain_height(wx, wz);
                assert!((1..CHUNK_HEIGHT - 1).contains(&h));
            }
        }
    }

    fn decorated(gen: &TerrainGenerator, coord: IVec2) -> Vec<Block> {
        let mut blocks = gen.generate_chunk(coord);
        gen.decorate_chunk(coord, &mut blocks);
        blocks
    }

    #[test]
    fn test_decoration_deterministic_and_idempotent() {
        let gen = TerrainGenerator::new(42);
        let coord = IVec2::new(2, -1);
        let once = decorated(&gen, coord);
        assert_eq!(once, decorated(&TerrainGenerator::new(42), coord));
        let mut twice = once.clone();
        gen.decorate_chunk(coord, &mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_trees_grow_on_grass() {
        let gen = TerrainGenerator::new(42);
        let mut logs = 0;
        let mut leaves = 0;
        for cz in -2..2 {
            for cx in -2..2 {
                let coord = IVec2::new(cx, cz);
                let blocks = decorated(&gen, coord);
                logs += count(&blocks, BlockId::LOG);
                leaves += count(&blocks, BlockId::LEAVES);
                for tree in gen.trees_touching(coord) {
                    let wx = tree.root.x - cx * CHUNK_WIDTH;
                    let wz = tree.root.z - cz * CHUNK_DEPTH;
                    let root = IVec3::new(wx, tree.root.y, wz);
                    if local_in_bounds(root) {
                        assert_eq!(blocks[local_index(root)].block_id(), BlockId::GRASS);
                        let trunk = root + IVec3::Y;
                        assert_eq!(blocks[local_index(trunk)].block_id(), BlockId::LOG);
                    }
                }
            }
        }
        assert!(logs > 0, "no trees in a 4x4 chunk area");
        assert!(leaves > logs);
    }

    #[test]
    fn test_undecorated_chunk_has_no_trees() {
        let blocks = TerrainGenerator::new(42).generate_chunk(IVec2::new(1, 1));
        assert_eq!(count(&blocks, BlockId::LOG), 0);
        assert_eq!(count(&blocks, BlockId::LEAVES), 0);
    }

    #[test]
    fn test_border_tree_matches_on_both_sides() {
        let gen = TerrainGenerator::new(42);
        // Find a tree rooted on the last x column of some chunk; its canopy
        // spills into the +x neighbour.
        let tree = (-40..40)
            .flat_map(|cz: i32| (-40..40).map(move |cx: i32| IVec2::new(cx, cz)))
            .flat_map(|coord| gen.trees_touching(coord))
            .find(|t| t.root.x.rem_euclid(CHUNK_WIDTH) == CHUNK_WIDTH - 1)
            .expect("a tree on a chunk border");
        let west = IVec2::new(
            tree.root.x.div_euclid(CHUNK_WIDTH),
            tree.root.z.div_euclid(CHUNK_DEPTH),
        );
        let east = west + IVec2::X;
        let bare_east = gen.generate_chunk(east);
        let east_blocks = decorated(&gen, east);

        // The canopy layer just under the top of the trunk reaches two
        // blocks across the border wherever the neighbour has open air.
        let lz = tree.root.z.rem_euclid(CHUNK_DEPTH);
        let y = tree.top().y - 1;
        if y < CHUNK_HEIGHT {
            for lx in 0..CANOPY_RADIUS {
                let index = local_index(IVec3::new(lx, y, lz));
                if bare_east[index].is_air() {
                    let id = east_blocks[index].block_id();
                    assert!(id == BlockId::LEAVES || id == BlockId::LOG, "{id:?} at x {lx}");
                }
            }
        }
        let west_blocks = decorated(&gen, west);
        let trunk = IVec3::new(CHUNK_WIDTH - 1, tree.root.y + 1, lz);
        assert_eq!(west_blocks[local_index(trunk)].block_id(), BlockId::LOG);
    }

    #[test]
    fn test_water_never_above_sea_level() {
        let gen = TerrainGenerator::new(42);
        for cx in -3..3 {
            let blocks = gen.generate_chunk(IVec2::new(cx, 0));
            for (i, block) in blocks.iter().enumerate() {
                if block.block_id() == BlockId::WATER {
                    let y = (i / (CHUNK_WIDTH * CHUNK_DEPTH) as usize) as i32;
                    assert!(y <= SEA_LEVEL);
                }
            }
        }
    }
}
