use std::path::{Path, PathBuf};

use serde::Deserialize;
use terrastream_core::constants::{
    pool_capacity_for_radius, DEFAULT_CHUNK_RADIUS, DEFAULT_WORKER_THREADS, MAX_CHUNK_RADIUS,
};

use crate::error::ConfigError;

/// Tunables of a streaming world.
///
/// ```ron
/// (
///     chunk_radius: 8,
///     worker_threads: 2,
///     world_seed: 1337,
///     save_root: "saves/world",
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Columns within `dx² + dz² < radius²` of the observer stay loaded.
    pub chunk_radius: u16,
    /// Slot count; derived from the radius when absent.
    pub pool_capacity: Option<usize>,
    pub worker_threads: usize,
    pub world_seed: u64,
    pub save_root: PathBuf,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_radius: DEFAULT_CHUNK_RADIUS,
            pool_capacity: None,
            worker_threads: DEFAULT_WORKER_THREADS,
            world_seed: 0,
            save_root: PathBuf::from("saves/world"),
        }
    }
}

impl StreamingConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let options = ron::Options::default();
        let config: StreamingConfig = options
            .from_str(ron_str)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_radius == 0 {
            return Err(ConfigError::Invalid("chunk_radius must be at least 1".into()));
        }
        if self.chunk_radius > MAX_CHUNK_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "chunk_radius {} exceeds the maximum of {MAX_CHUNK_RADIUS}",
                self.chunk_radius
            )));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be at least 1".into()));
        }
        if self.pool_capacity == Some(0) {
            return Err(ConfigError::Invalid("pool_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Number of slots to preallocate: `(radius + 1)² × 4` unless overridden.
    pub fn capacity(&self) -> usize {
        self.pool_capacity
            .unwrap_or_else(|| pool_capacity_for_radius(self.chunk_radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = StreamingConfig::from_ron_str(
            r#"(
                chunk_radius: 4,
                pool_capacity: Some(200),
                worker_threads: 3,
                world_seed: 99,
                save_root: "/tmp/terrastream",
            )"#,
        )
        .expect("parse");
        assert_eq!(config.chunk_radius, 4);
        assert_eq!(config.capacity(), 200);
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.world_seed, 99);
        assert_eq!(config.save_root, PathBuf::from("/tmp/terrastream"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = StreamingConfig::from_ron_str("(chunk_radius: 3)").expect("parse");
        assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
        assert_eq!(config.pool_capacity, None);
        assert_eq!(config.capacity(), 64);
    }

    #[test]
    fn test_zero_radius_rejected() {
        let err = StreamingConfig::from_ron_str("(chunk_radius: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_oversized_radius_rejected() {
        let config = StreamingConfig {
            chunk_radius: 50_000,
            pool_capacity: Some(4),
            ..StreamingConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let edge = StreamingConfig {
            chunk_radius: MAX_CHUNK_RADIUS,
            ..StreamingConfig::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = StreamingConfig::from_ron_str("(worker_threads: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_ron() {
        let err = StreamingConfig::from_ron_str("(chunk_radius: \"far\")").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stream.ron");
        std::fs::write(&path, "(chunk_radius: 2, world_seed: 5)").expect("write");
        let config = StreamingConfig::load(&path).expect("load");
        assert_eq!(config.chunk_radius, 2);
        assert_eq!(config.world_seed, 5);
    }
}
