use glam::Vec3;
use terrastream_core::constants::CHUNK_WIDTH;

/// Eye height used by every scene, a little above typical terrain.
const EYE_HEIGHT: f32 = 100.0;

/// How the observer moves during a scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObserverPath {
    /// Stand still at the origin.
    Stationary,
    /// Walk along +x at `speed` blocks per frame.
    Line { speed: f32 },
    /// Orbit the origin at `radius` blocks, one revolution every `period` frames.
    Orbit { radius: f32, period: u32 },
    /// Jump `distance` blocks along +z every `interval` frames.
    Teleport { distance: f32, interval: u32 },
}

/// Configuration for a single benchmark scene.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub name: &'static str,
    pub path: ObserverPath,
}

impl SceneConfig {
    /// Observer position at `frame`.
    pub fn observer_at(&self, frame: u32) -> Vec3 {
        let t = frame as f32;
        match self.path {
            ObserverPath::Stationary => Vec3::new(0.5, EYE_HEIGHT, 0.5),
            ObserverPath::Line { speed } => Vec3::new(t * speed, EYE_HEIGHT, 0.5),
            ObserverPath::Orbit { radius, period } => {
                let angle = t / period.max(1) as f32 * std::f32::consts::TAU;
                Vec3::new(radius * angle.cos(), EYE_HEIGHT, radius * angle.sin())
            }
            ObserverPath::Teleport { distance, interval } => {
                let jumps = frame / interval.max(1);
                Vec3::new(0.5, EYE_HEIGHT, jumps as f32 * distance)
            }
        }
    }

    /// Direction the observer looks at `frame`: along its motion, or -z when still.
    pub fn view_direction(&self, frame: u32) -> Vec3 {
        let delta = self.observer_at(frame + 1) - self.observer_at(frame);
        let flat = Vec3::new(delta.x, 0.0, delta.z);
        if flat.length_squared() > f32::EPSILON {
            flat.normalize()
        } else {
            Vec3::NEG_Z
        }
    }
}

/// The standard suite, from no movement to constant cache misses.
pub fn standard_scenes() -> Vec<SceneConfig> {
    let chunk = CHUNK_WIDTH as f32;
    vec![
        SceneConfig {
            name: "stationary",
            path: ObserverPath::Stationary,
        },
        SceneConfig {
            name: "walk",
            path: ObserverPath::Line { speed: 0.25 * chunk },
        },
        SceneConfig {
            name: "sprint",
            path: ObserverPath::Line { speed: chunk },
        },
        SceneConfig {
            name: "orbit",
            path: ObserverPath::Orbit {
                radius: 12.0 * chunk,
                period: 240,
            },
        },
        SceneConfig {
            name: "teleport",
            path: ObserverPath::Teleport {
                distance: 40.0 * chunk,
                interval: 30,
            },
        },
    ]
}
