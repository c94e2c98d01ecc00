use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use glam::IVec2;
use parking_lot::{Mutex, MutexGuard};
use terrastream_core::constants::SUB_CHUNKS_PER_CHUNK;
use terrastream_core::types::ChunkCoord;

use crate::chunk::{ChunkData, ChunkPhase, SlotStatus};
use crate::state_machine::is_legal;

/// One preallocated chunk record.
///
/// Cross-thread state lives in atomics. The CPU buffers sit behind a mutex
/// that is uncontended by construction: a worker only locks it while it
/// holds the `working` token, the main thread only `try_lock`s it while the
/// token is clear.
#[derive(Debug)]
pub struct ChunkSlot {
    status: AtomicU32,
    coord: AtomicU64,
    generation: AtomicU64,
    sub_chunks: [AtomicU8; SUB_CHUNKS_PER_CHUNK],
    data: Mutex<ChunkData>,
}

fn pack_coord(coord: ChunkCoord) -> u64 {
    ((coord.x as u32 as u64) << 32) | coord.y as u32 as u64
}

fn unpack_coord(bits: u64) -> ChunkCoord {
    IVec2::new((bits >> 32) as u32 as i32, bits as u32 as i32)
}

impl Default for ChunkSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkSlot {
    pub fn new() -> Self {
        Self {
            status: AtomicU32::new(SlotStatus::FREE.pack()),
            coord: AtomicU64::new(pack_coord(IVec2::ZERO)),
            generation: AtomicU64::new(0),
            sub_chunks: std::array::from_fn(|_| AtomicU8::new(ChunkPhase::Unloaded as u8)),
            data: Mutex::new(ChunkData::new()),
        }
    }

    pub fn status(&self) -> SlotStatus {
        SlotStatus::unpack(self.status.load(Ordering::Acquire))
    }

    pub fn coord(&self) -> ChunkCoord {
        unpack_coord(self.coord.load(Ordering::Acquire))
    }

    /// Residency counter, bumped on every assignment. Tasks carry the value
    /// they were queued with so work for a recycled slot is discarded.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn sub_chunk_phase(&self, index: usize) -> ChunkPhase {
        ChunkPhase::from_u8(self.sub_chunks[index].load(Ordering::Acquire))
    }

    pub fn set_sub_chunk_phase(&self, index: usize, phase: ChunkPhase) {
        self.sub_chunks[index].store(phase as u8, Ordering::Release);
    }

    /// Apply `update` with compare-and-swap. Returns the status it replaced,
    /// or the current status if `update` declined.
    pub fn transition(
        &self,
        update: impl Fn(SlotStatus) -> Option<SlotStatus>,
    ) -> Result<SlotStatus, SlotStatus> {
        self.status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                update(SlotStatus::unpack(bits)).map(SlotStatus::pack)
            })
            .map(SlotStatus::unpack)
            .map_err(SlotStatus::unpack)
    }

    /// Assign a free slot to `coord` and take the `working` token for its
    /// load task in one step. Returns the new generation.
    pub fn assign(&self, coord: ChunkCoord) -> Option<u64> {
        let assigned = SlotStatus {
            phase: ChunkPhase::LoadBlockData,
            working: true,
            loaded: true,
            failed: false,
        };
        self.transition(|s| s.is_free().then_some(assigned)).ok()?;
        self.coord.store(pack_coord(coord), Ordering::Release);
        for sub in &self.sub_chunks {
            sub.store(ChunkPhase::Unloaded as u8, Ordering::Release);
        }
        Some(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Take the `working` token of a resident slot whose phase satisfies
    /// `accept`, moving it to `next`. Fails if a task already holds the slot.
    pub fn try_claim(&self, accept: impl Fn(ChunkPhase) -> bool, next: ChunkPhase) -> bool {
        self.transition(|s| {
            (s.loaded && !s.working && !s.failed && accept(s.phase)).then_some(SlotStatus {
                phase: next,
                working: true,
                ..s
            })
        })
        .is_ok()
    }

    /// Take the `working` token without changing the phase. Returns the
    /// phase the slot is held in.
    pub fn try_hold(&self, accept: impl Fn(ChunkPhase) -> bool) -> Option<ChunkPhase> {
        self.transition(|s| {
            (s.loaded && !s.working && !s.failed && accept(s.phase)).then_some(SlotStatus {
                working: true,
                ..s
            })
        })
        .ok()
        .map(|s| s.phase)
    }

    /// Move a held slot to `phase`, keeping the token.
    pub fn advance(&self, phase: ChunkPhase) {
        let result = self.transition(|s| s.working.then_some(s.with_phase(phase)));
        match result {
            Ok(previous) => debug_assert!(
                is_legal(previous.phase, phase),
                "illegal transition {:?} -> {phase:?}",
                previous.phase
            ),
            Err(_) => debug_assert!(false, "advanced a slot nobody held"),
        }
    }

    /// Give the `working` token back, leaving the slot in `phase`.
    pub fn release(&self, phase: ChunkPhase) {
        let result = self.transition(|s| {
            Some(SlotStatus {
                phase,
                working: false,
                ..s
            })
        });
        if let Ok(previous) = result {
            debug_assert!(previous.working, "released a slot nobody held");
            debug_assert!(
                is_legal(previous.phase, phase),
                "illegal transition {:?} -> {phase:?}",
                previous.phase
            );
        }
    }

    /// Main-thread phase change on a slot nobody holds. Fails if a worker
    /// took the slot or the phase moved on.
    pub fn settle(&self, expected: ChunkPhase, phase: ChunkPhase) -> bool {
        self.transition(|s| (!s.working && s.phase == expected).then_some(s.with_phase(phase)))
            .is_ok()
    }

    /// Give the token back after a failed load; the slot stays resident but
    /// is never rendered.
    pub fn release_failed(&self) {
        let _ = self.transition(|s| {
            Some(SlotStatus {
                phase: ChunkPhase::Unloaded,
                working: false,
                failed: true,
                ..s
            })
        });
    }

    /// Return the slot to the free list. Main thread only, after teardown.
    pub fn recycle(&self) -> bool {
        let recycled = self
            .transition(|s| (!s.working).then_some(SlotStatus::FREE))
            .is_ok();
        if recycled {
            for sub in &self.sub_chunks {
                sub.store(ChunkPhase::Unloaded as u8, Ordering::Release);
            }
        }
        recycled
    }

    /// Lock the CPU buffers. Worker side, while holding the `working` token.
    pub fn lock_data(&self) -> MutexGuard<'_, ChunkData> {
        self.data.lock()
    }

    /// Non-blocking access for the main thread. `None` while a worker holds
    /// the slot or its buffers.
    pub fn try_data(&self) -> Option<MutexGuard<'_, ChunkData>> {
        if self.status().working {
            return None;
        }
        self.data.try_lock()
    }
}

/// Fixed-capacity arena of chunk slots, addressed by index.
///
/// Slots are never freed during steady state; only their internal buffers
/// are released and reacquired.
#[derive(Debug)]
pub struct ChunkPool {
    slots: Box<[ChunkSlot]>,
}

impl ChunkPool {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| ChunkSlot::new()).collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> &ChunkSlot {
        &self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ChunkSlot)> {
        self.slots.iter().enumerate()
    }

    /// First slot that is neither resident nor owned by a worker.
    pub fn find_unloaded_chunk(&self) -> Option<usize> {
        let found = self.slots.iter().position(|slot| slot.status().is_free());
        if found.is_none() {
            log::warn!(
                "Ran out of room for loaded chunks. Number of chunks allowed {}",
                self.capacity()
            );
        }
        found
    }

    /// Slots currently assigned to a coordinate.
    pub fn resident_count(&self) -> usize {
        self.slots.iter().filter(|s| s.status().loaded).count()
    }

    /// Slots currently owned by a background task.
    pub fn working_count(&self) -> usize {
        self.slots.iter().filter(|s| s.status().working).count()
    }
}
