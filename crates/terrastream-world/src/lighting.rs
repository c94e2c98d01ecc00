use std::collections::VecDeque;

use glam::IVec3;
use terrastream_core::constants::*;
use terrastream_core::math::{local_in_bounds, local_index};
use terrastream_core::types::Block;

const NEIGHBOR_OFFSETS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

#[derive(Clone, Copy)]
enum Channel {
    Sky,
    Block,
}

impl Channel {
    fn get(self, block: &Block) -> u8 {
        match self {
            Channel::Sky => block.sky_light(),
            Channel::Block => block.block_light(),
        }
    }

    fn set(self, block: &mut Block, level: u8) {
        match self {
            Channel::Sky => block.set_sky_light(level),
            Channel::Block => block.set_block_light(level),
        }
    }
}

fn index_to_local(index: usize) -> IVec3 {
    let i = index as i32;
    let layer = CHUNK_WIDTH * CHUNK_DEPTH;
    IVec3::new(i % CHUNK_WIDTH, i / layer, (i % layer) / CHUNK_WIDTH)
}

/// Recompute sky and block light for one column from scratch.
///
/// Light is confined to the column: neighbouring chunks neither contribute
/// nor receive light. Sky light falls straight down at full strength until
/// the first opaque block, then spreads sideways losing one level per step.
/// Emissive blocks seed block light the same way.
pub fn compute_lighting(blocks: &mut [Block]) {
    debug_assert_eq!(blocks.len(), BLOCKS_PER_CHUNK);
    let mut sky_seeds = VecDeque::new();
    let mut block_seeds = VecDeque::new();

    for block in blocks.iter_mut() {
        block.light = 0;
    }

    for z in 0..CHUNK_DEPTH {
        for x in 0..CHUNK_WIDTH {
            for y in (0..CHUNK_HEIGHT).rev() {
                let index = local_index(IVec3::new(x, y, z));
                if blocks[index].block_id().is_opaque() {
                    break;
                }
                blocks[index].set_sky_light(MAX_LIGHT_LEVEL);
                sky_seeds.push_back(index);
            }
        }
    }

    for (index, block) in blocks.iter_mut().enumerate() {
        let emission = block.block_id().emission();
        if emission > 0 {
            block.set_block_light(emission);
            block_seeds.push_back(index);
        }
    }

    propagate(blocks, sky_seeds, Channel::Sky);
    propagate(blocks, block_seeds, Channel::Block);
}

fn propagate(blocks: &mut [Block], mut queue: VecDeque<usize>, channel: Channel) {
    while let Some(index) = queue.pop_front() {
        let level = channel.get(&blocks[index]);
        if level <= 1 {
            continue;
        }
        let local = index_to_local(index);
        for offset in NEIGHBOR_OFFSETS {
            let next = local + offset;
            if !local_in_bounds(next) {
                continue;
            }
            let next_index = local_index(next);
            let neighbor = &mut blocks[next_index];
            if neighbor.block_id().is_opaque() || channel.get(neighbor) >= level - 1 {
                continue;
            }
            channel.set(neighbor, level - 1);
            queue.push_back(next_index);
        }
    }
}
