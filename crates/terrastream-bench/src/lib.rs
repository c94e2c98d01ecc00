//! Headless streaming benchmark: drives a [`terrastream_world::World`] along
//! scripted observer paths and times each frame.

pub mod report;
pub mod runner;
pub mod scenes;
