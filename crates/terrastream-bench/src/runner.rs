use std::time::Instant;

use glam::{Mat4, Vec3};
use terrastream_world::{Frustum, RecordingRenderer, StreamingConfig, World, WorldError};

use crate::scenes::SceneConfig;

/// Timing data for a single benchmark run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Result of a single scene benchmark.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkResult {
    pub scene_name: String,
    pub frame_count: u32,
    pub chunk_radius: u16,
    pub loads_queued: usize,
    pub unloads_queued: usize,
    pub loads_deferred: usize,
    pub gpu_uploads: u64,
    pub peak_resident: usize,
    pub timings: TimingSeries,
}

/// Drives a world along each scene's observer path with an in-memory
/// render backend and times the main-thread frame.
pub struct BenchmarkRunner {
    config: StreamingConfig,
    frame_count: u32,
}

impl BenchmarkRunner {
    pub fn new(config: StreamingConfig, frame_count: u32) -> Self {
        Self {
            config,
            frame_count,
        }
    }

    /// Run a single scene. Each scene streams into its own fresh save
    /// directory under the configured root, removed afterwards.
    pub fn run_scene(&self, scene: &SceneConfig) -> Result<BenchmarkResult, WorldError> {
        let save_root = self.config.save_root.join(scene.name);
        if save_root.exists() {
            std::fs::remove_dir_all(&save_root).map_err(io_error)?;
        }
        let config = StreamingConfig {
            save_root: save_root.clone(),
            ..self.config.clone()
        };

        log::info!(
            "Scene '{}': {} frames, radius {}",
            scene.name,
            self.frame_count,
            config.chunk_radius
        );

        let mut world = World::new(&config, RecordingRenderer::new())?;
        let projection = Mat4::perspective_rh(70f32.to_radians(), 16.0 / 9.0, 0.1, 2000.0);

        let mut frame_times = Vec::with_capacity(self.frame_count as usize);
        let mut loads_queued = 0;
        let mut unloads_queued = 0;
        let mut loads_deferred = 0;
        let mut peak_resident = 0;

        for frame in 0..self.frame_count {
            let eye = scene.observer_at(frame);
            let view = Mat4::look_at_rh(eye, eye + scene.view_direction(frame), Vec3::Y);
            let frustum = Frustum::from_view_projection(projection * view);

            let frame_start = Instant::now();
            let report = world.frame(eye, &frustum);
            let elapsed = frame_start.elapsed().as_secs_f64() * 1000.0;
            frame_times.push(elapsed);

            loads_queued += report.radius.loads_queued;
            unloads_queued += report.radius.unloads_queued;
            loads_deferred += report.radius.loads_deferred;
            peak_resident = peak_resident.max(world.stats().resident);
        }

        let gpu_uploads = world.renderer().uploads;
        world.shutdown();
        drop(world);
        if let Err(e) = std::fs::remove_dir_all(&save_root) {
            log::warn!("Could not remove {}: {e}", save_root.display());
        }

        let timings = compute_timings(&frame_times);
        log::info!(
            "  Done: mean={:.3}ms, p95={:.3}ms, p99={:.3}ms",
            timings.mean_ms,
            timings.p95_ms,
            timings.p99_ms
        );

        Ok(BenchmarkResult {
            scene_name: scene.name.to_string(),
            frame_count: self.frame_count,
            chunk_radius: config.chunk_radius,
            loads_queued,
            unloads_queued,
            loads_deferred,
            gpu_uploads,
            peak_resident,
            timings,
        })
    }
}

fn io_error(e: std::io::Error) -> WorldError {
    WorldError::Config(terrastream_world::ConfigError::Io(e))
}

pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;
    let p99_idx = ((n as f64) * 0.99).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        p99_ms: sorted[p99_idx.min(n - 1)],
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}
