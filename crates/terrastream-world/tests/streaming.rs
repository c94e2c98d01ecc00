use std::collections::HashSet;
use std::path::Path;

use glam::{IVec2, IVec3, Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use terrastream_core::types::BlockId;
use terrastream_world::{
    Frustum, RadiusUpdate, RecordingRenderer, RequestOutcome, StreamingConfig, World, WorldError,
};

fn config(dir: &Path, radius: u16) -> StreamingConfig {
    StreamingConfig {
        chunk_radius: radius,
        worker_threads: 3,
        world_seed: 1234,
        save_root: dir.to_path_buf(),
        ..StreamingConfig::default()
    }
}

fn open(dir: &Path, radius: u16) -> World<RecordingRenderer> {
    World::new(&config(dir, radius), RecordingRenderer::new()).expect("world")
}

/// Observer standing in the middle of a chunk column.
fn observer_at(chunk: IVec2) -> Vec3 {
    Vec3::new(chunk.x as f32 * 16.0 + 8.0, 90.0, chunk.y as f32 * 16.0 + 8.0)
}

fn disc(center: IVec2, radius: i32) -> HashSet<IVec2> {
    let mut set = HashSet::new();
    for dz in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dz * dz < radius * radius {
                set.insert(center + IVec2::new(dx, dz));
            }
        }
    }
    set
}

fn loaded_set(world: &World<RecordingRenderer>) -> HashSet<IVec2> {
    world.loaded_coords().into_iter().collect()
}

/// Coordinates of every slot the pool considers assigned, duplicates kept.
fn assigned_coords(world: &World<RecordingRenderer>) -> Vec<IVec2> {
    world
        .pool()
        .iter()
        .filter(|(_, slot)| slot.status().loaded)
        .map(|(_, slot)| slot.coord())
        .collect()
}

#[test]
fn test_end_to_end_load_then_move() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 2);

    let update = world.check_chunk_radius(observer_at(IVec2::ZERO));
    assert_eq!(update.loads_queued, 9);
    world.flush();
    assert_eq!(loaded_set(&world), disc(IVec2::ZERO, 2));
    assert_eq!(world.stats().uploaded, 9);
    assert_eq!(world.renderer().live_columns().len(), 9);

    let update = world.check_chunk_radius(observer_at(IVec2::new(5, 0)));
    assert_eq!(update.loads_queued, 9);
    assert_eq!(update.unloads_queued, 9);
    assert!(world.stats().resident <= world.capacity());
    world.flush();

    assert_eq!(loaded_set(&world), disc(IVec2::new(5, 0), 2));
    let stats = world.stats();
    assert_eq!(stats.resident, 9);
    assert_eq!(stats.working, 0);
    let live = world.renderer().live_columns();
    assert!(live.iter().all(|c| c.x >= 4), "old meshes freed: {live:?}");
}

#[test]
fn test_teleport_far_from_origin_unloads_old_area() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 2);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();

    // 1e9 blocks out is chunk x = 62_500_000; squared distances there do not
    // fit in 32 bits.
    let update = world.check_chunk_radius(Vec3::new(1.0e9, 80.0, 8.0));
    assert_eq!(update.unloads_queued, 9);
    assert_eq!(update.loads_queued, 9);
    world.flush();

    let far = IVec2::new(62_500_000, 0);
    assert_eq!(loaded_set(&world), disc(far, 2));
    assert!(world.renderer().live_columns().iter().all(|c| c.x > 62_499_000));
}

#[test]
fn test_radius_check_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 3);
    world.check_chunk_radius(observer_at(IVec2::new(-2, 7)));
    world.flush();
    let before = world.stats();
    let loaded = loaded_set(&world);

    let update = world.check_chunk_radius(observer_at(IVec2::new(-2, 7)));
    assert_eq!(update, RadiusUpdate::default());
    world.synchronize_chunks();
    assert_eq!(world.stats(), before);
    assert_eq!(loaded_set(&world), loaded);
}

#[test]
fn test_negative_positions_floor_to_chunk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 1);
    world.check_chunk_radius(Vec3::new(-0.5, 80.0, -0.5));
    world.flush();
    assert_eq!(loaded_set(&world), HashSet::from([IVec2::new(-1, -1)]));
}

#[test]
fn test_no_coordinate_in_two_slots_under_random_moves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 3);
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut chunk = IVec2::ZERO;

    for step in 0..60 {
        chunk += IVec2::new(rng.gen_range(-3..=3), rng.gen_range(-3..=3));
        world.check_chunk_radius(observer_at(chunk));
        if rng.gen_bool(0.3) {
            world.flush();
        } else {
            world.synchronize_chunks();
        }

        let assigned = assigned_coords(&world);
        let unique: HashSet<IVec2> = assigned.iter().copied().collect();
        assert_eq!(unique.len(), assigned.len(), "duplicate slot at step {step}");
        assert!(assigned.len() <= world.capacity());
    }

    // Settle: the first pass unloads stragglers, the next refills freed slots.
    for _ in 0..3 {
        world.flush();
        world.check_chunk_radius(observer_at(chunk));
    }
    world.flush();
    assert_eq!(loaded_set(&world), disc(chunk, 3));
}

#[test]
fn test_pool_exhaustion_defers_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = StreamingConfig {
        pool_capacity: Some(4),
        ..config(dir.path(), 2)
    };
    let mut world = World::new(&config, RecordingRenderer::new()).expect("world");

    let update = world.check_chunk_radius(observer_at(IVec2::ZERO));
    assert_eq!(update.loads_queued, 4);
    assert_eq!(update.loads_deferred, 5);
    world.flush();
    assert_eq!(world.stats().resident, 4);
    // The nearest columns won the slots.
    assert!(loaded_set(&world).contains(&IVec2::ZERO));
}

#[test]
fn test_corrupt_save_fails_only_that_chunk() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("chunk_1_0.bin"), b"definitely not a chunk").expect("write");

    let mut world = open(dir.path(), 2);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();

    let stats = world.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.uploaded, 8);
    assert!(!world.renderer().live_columns().contains(&IVec2::new(1, 0)));
    assert!(matches!(
        world.get_block(IVec3::new(20, 10, 3)),
        Err(WorldError::ChunkNotLoaded(1, 0))
    ));
    assert_eq!(
        world.queue_recalculate_lighting(IVec2::new(1, 0)).expect("request"),
        RequestOutcome::Skipped
    );

    // Not retried while the observer stays put.
    let update = world.check_chunk_radius(observer_at(IVec2::ZERO));
    assert_eq!(update.loads_queued, 0);

    // Leaving recycles the failed slot.
    world.check_chunk_radius(observer_at(IVec2::new(10, 0)));
    world.flush();
    assert_eq!(world.stats().failed, 0);
}

#[test]
fn test_edits_persist_across_worlds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pos = IVec3::new(3, 200, -5);
    {
        let mut world = open(dir.path(), 2);
        world.check_chunk_radius(observer_at(IVec2::ZERO));
        world.flush();
        world.set_block(pos, BlockId::GLOWSTONE).expect("set");
        world.flush();
        assert_eq!(world.get_block(pos).expect("get").block_id(), BlockId::GLOWSTONE);
        world.shutdown();
    }
    assert!(dir.path().join("chunk_0_-1.bin").is_file());

    let mut world = open(dir.path(), 2);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();
    let block = world.get_block(pos).expect("get");
    assert_eq!(block.block_id(), BlockId::GLOWSTONE);
    // Relit on load: glowstone lights its neighbours.
    let beside = world.get_block(pos + IVec3::X).expect("get");
    assert!(beside.block_light() > 0);
}

#[test]
fn test_unload_saves_edited_chunk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 2);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();
    world.remove_block(IVec3::new(8, 0, 8)).expect("remove");
    world.flush();
    assert!(!dir.path().join("chunk_0_0.bin").exists());

    world.check_chunk_radius(observer_at(IVec2::new(20, 20)));
    world.flush();
    assert!(dir.path().join("chunk_0_0.bin").is_file());
    assert!(!world.is_loaded(IVec2::ZERO));
}

#[test]
fn test_queue_save_chunk_writes_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 2);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();
    world.set_block(IVec3::new(-3, 150, 2), BlockId::LOG).expect("set");
    world.flush();

    let outcome = world.queue_save_chunk(IVec2::new(-1, 0)).expect("save");
    assert_ne!(outcome, RequestOutcome::Skipped);
    world.flush();
    assert!(dir.path().join("chunk_-1_0.bin").is_file());
}

#[test]
fn test_requests_for_unloaded_chunk_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 2);
    assert!(matches!(
        world.queue_retesselate_chunk(IVec2::new(40, 40)),
        Err(WorldError::ChunkNotLoaded(40, 40))
    ));
}

#[test]
fn test_busy_request_deferred_then_applied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 2);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();

    let first = world.queue_retesselate_chunk(IVec2::ZERO).expect("first");
    let second = world.queue_retesselate_chunk(IVec2::ZERO).expect("second");
    assert_eq!(first, RequestOutcome::Queued);
    // The first rebuild still owns the chunk, or is waiting for upload.
    assert_eq!(second, RequestOutcome::Deferred);
    world.flush();
    let stats = world.stats();
    assert_eq!(stats.deferred_requests, 0);
    assert_eq!(stats.working, 0);
    assert_eq!(stats.uploaded, 9);
}

#[test]
fn test_frustum_culls_columns_behind_camera() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = open(dir.path(), 4);
    world.check_chunk_radius(observer_at(IVec2::ZERO));
    world.flush();

    let eye = observer_at(IVec2::ZERO);
    let proj = Mat4::perspective_rh(70f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0);
    let view = Mat4::look_at_rh(eye, eye + Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
    let frustum = Frustum::from_view_projection(proj * view);

    let culled = world.render(&frustum);
    let everything = world.render(&Frustum::unbounded());
    assert!(culled > 0);
    assert!(culled < everything);
}

#[test]
fn test_worlds_are_independent() {
    let a_dir = tempfile::tempdir().expect("tempdir");
    let b_dir = tempfile::tempdir().expect("tempdir");
    let mut a = open(a_dir.path(), 2);
    let mut b = open(b_dir.path(), 3);
    a.check_chunk_radius(observer_at(IVec2::ZERO));
    b.check_chunk_radius(observer_at(IVec2::new(100, 100)));
    a.flush();
    b.flush();
    assert_eq!(loaded_set(&a), disc(IVec2::ZERO, 2));
    assert_eq!(loaded_set(&b), disc(IVec2::new(100, 100), 3));
}
