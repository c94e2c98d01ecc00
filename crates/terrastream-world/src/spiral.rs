use glam::IVec2;
use terrastream_core::types::ChunkCoord;

/// Spiral walk over chunk coordinates around a center, nearest rings first.
///
/// Directions cycle +x, +z, -x, -z and the step length grows by one every
/// two turns. Each position is checked before moving. The walk ends once
/// the step length exceeds twice the radius, which covers the whole disc.
/// Only coordinates with `dx² + dz² < radius²` are yielded.
#[derive(Debug, Clone)]
pub struct SpiralScan {
    center: ChunkCoord,
    radius_sq: i64,
    limit: i32,
    offset: IVec2,
    direction: usize,
    step_len: i32,
    steps_taken: i32,
    turns: u32,
    done: bool,
}

const DIRECTIONS: [IVec2; 4] = [
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(0, -1),
];

impl SpiralScan {
    pub fn new(center: ChunkCoord, radius: u16) -> Self {
        let radius = radius as i32;
        Self {
            center,
            radius_sq: (radius as i64).pow(2),
            limit: radius * 2,
            offset: IVec2::ZERO,
            direction: 0,
            step_len: 1,
            steps_taken: 0,
            turns: 0,
            done: radius == 0,
        }
    }

    fn advance(&mut self) {
        self.offset += DIRECTIONS[self.direction];
        self.steps_taken += 1;
        if self.steps_taken == self.step_len {
            self.steps_taken = 0;
            self.direction = (self.direction + 1) % DIRECTIONS.len();
            self.turns += 1;
            if self.turns % 2 == 0 {
                self.step_len += 1;
            }
        }
        if self.step_len > self.limit {
            self.done = true;
        }
    }
}

impl Iterator for SpiralScan {
    type Item = ChunkCoord;

    fn next(&mut self) -> Option<ChunkCoord> {
        while !self.done {
            let offset = self.offset;
            self.advance();
            if offset.as_i64vec2().length_squared() < self.radius_sq {
                return Some(self.center + offset);
            }
        }
        None
    }
}
