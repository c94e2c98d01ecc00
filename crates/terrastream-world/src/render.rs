use glam::{IVec2, Mat4, Vec3, Vec4};
use terrastream_core::constants::{CHUNK_DEPTH, CHUNK_WIDTH, SUB_CHUNK_HEIGHT};
use terrastream_core::types::ChunkCoord;

use crate::mesher::Vertex;

/// Graphics-side collaborator. Every method is called on the main thread only.
pub trait RenderBackend {
    /// Opaque handle to one uploaded sub-chunk mesh.
    type Mesh;

    fn upload_mesh(&mut self, coord: ChunkCoord, sub_chunk: usize, vertices: &[Vertex])
        -> Self::Mesh;

    fn free_mesh(&mut self, mesh: Self::Mesh);

    fn draw(&mut self, mesh: &Self::Mesh, coord: ChunkCoord, sub_chunk: usize);
}

/// World-space bounds of one sub-chunk.
pub fn sub_chunk_aabb(coord: ChunkCoord, sub_chunk: usize) -> (Vec3, Vec3) {
    let min = Vec3::new(
        (coord.x * CHUNK_WIDTH) as f32,
        (sub_chunk as i32 * SUB_CHUNK_HEIGHT) as f32,
        (coord.y * CHUNK_DEPTH) as f32,
    );
    let max = min + Vec3::new(CHUNK_WIDTH as f32, SUB_CHUNK_HEIGHT as f32, CHUNK_DEPTH as f32);
    (min, max)
}

/// View frustum as six inward-facing planes (xyz normal, w distance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from a combined view-projection matrix with a 0..1
    /// depth range. Order: left, right, bottom, top, near, far.
    pub fn from_view_projection(view_proj: Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|p| {
            let len = p.truncate().length();
            if len > 0.0 {
                p / len
            } else {
                p
            }
        });
        Self { planes }
    }

    /// Frustum that accepts everything, for headless drivers.
    pub fn unbounded() -> Self {
        Self {
            planes: [Vec4::new(0.0, 0.0, 0.0, 1.0); 6],
        }
    }

    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            // Corner furthest along the plane normal.
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), max, min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}

/// One call observed by [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Upload {
        mesh: u64,
        coord: ChunkCoord,
        sub_chunk: usize,
        vertices: usize,
    },
    Free {
        mesh: u64,
    },
}

/// Backend that keeps meshes in memory and counts calls. Used by the
/// benchmark runner and tests in place of a GPU.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    next_id: u64,
    live: std::collections::HashMap<u64, (ChunkCoord, usize)>,
    pub events: Vec<RenderEvent>,
    pub uploads: u64,
    pub frees: u64,
    pub draws: u64,
    pub uploaded_vertices: u64,
    /// Keep a log of upload/free events in `events`.
    pub record_events: bool,
}

/// Mesh handle handed out by [`RecordingRenderer`].
#[derive(Debug, PartialEq, Eq)]
pub struct RecordedMesh {
    pub id: u64,
    pub vertex_count: usize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_log() -> Self {
        Self {
            record_events: true,
            ..Self::default()
        }
    }

    /// Meshes uploaded and not yet freed.
    pub fn live_meshes(&self) -> usize {
        self.live.len()
    }

    /// Columns that currently own at least one live mesh.
    pub fn live_columns(&self) -> std::collections::HashSet<IVec2> {
        self.live.values().map(|(coord, _)| *coord).collect()
    }
}

impl RenderBackend for RecordingRenderer {
    type Mesh = RecordedMesh;

    fn upload_mesh(&mut self, coord: ChunkCoord, sub_chunk: usize, vertices: &[Vertex]) -> RecordedMesh {
        let id = self.next_id;
        self.next_id += 1;
        self.uploads += 1;
        self.uploaded_vertices += vertices.len() as u64;
        self.live.insert(id, (coord, sub_chunk));
        if self.record_events {
            self.events.push(RenderEvent::Upload {
                mesh: id,
                coord,
                sub_chunk,
                vertices: vertices.len(),
            });
        }
        RecordedMesh {
            id,
            vertex_count: vertices.len(),
        }
    }

    fn free_mesh(&mut self, mesh: RecordedMesh) {
        self.frees += 1;
        self.live.remove(&mesh.id);
        if self.record_events {
            self.events.push(RenderEvent::Free { mesh: mesh.id });
        }
    }

    fn draw(&mut self, _mesh: &RecordedMesh, _coord: ChunkCoord, _sub_chunk: usize) {
        self.draws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Frustum {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 500.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 80.0, 0.0), Vec3::new(0.0, 80.0, -10.0), Vec3::Y);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let f = camera();
        assert!(f.intersects_aabb(Vec3::new(-8.0, 72.0, -40.0), Vec3::new(8.0, 88.0, -24.0)));
    }

    #[test]
    fn test_box_behind_is_culled() {
        let f = camera();
        assert!(!f.intersects_aabb(Vec3::new(-8.0, 72.0, 24.0), Vec3::new(8.0, 88.0, 40.0)));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let f = camera();
        assert!(!f.intersects_aabb(
            Vec3::new(-8.0, 72.0, -1000.0),
            Vec3::new(8.0, 88.0, -900.0)
        ));
    }

    #[test]
    fn test_box_containing_camera_is_visible() {
        let f = camera();
        assert!(f.intersects_aabb(Vec3::new(-1.0, 79.0, -1.0), Vec3::new(1.0, 81.0, 1.0)));
    }

    #[test]
    fn test_unbounded_accepts_everything() {
        let f = Frustum::unbounded();
        assert!(f.intersects_aabb(Vec3::splat(-1e6), Vec3::splat(-1e6 + 1.0)));
    }

    #[test]
    fn test_sub_chunk_aabb() {
        let (min, max) = sub_chunk_aabb(IVec2::new(-1, 2), 3);
        assert_eq!(min, Vec3::new(-16.0, 48.0, 32.0));
        assert_eq!(max, Vec3::new(0.0, 64.0, 48.0));
    }

    #[test]
    fn test_recording_renderer_tracks_live_meshes() {
        let mut r = RecordingRenderer::with_event_log();
        let a = r.upload_mesh(IVec2::ZERO, 0, &[]);
        let b = r.upload_mesh(IVec2::ONE, 4, &[]);
        assert_eq!(r.live_meshes(), 2);
        r.free_mesh(a);
        assert_eq!(r.live_meshes(), 1);
        assert_eq!(r.live_columns().into_iter().collect::<Vec<_>>(), vec![IVec2::ONE]);
        r.draw(&b, IVec2::ONE, 4);
        assert_eq!(r.draws, 1);
        assert_eq!(r.events.len(), 3);
    }
}
