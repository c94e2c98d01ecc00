use terrastream_persist::PersistError;
use terrastream_tasks::SchedulerError;

/// Errors surfaced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("chunk <{0}, {1}> is not loaded")]
    ChunkNotLoaded(i32, i32),

    #[error("chunk <{0}, {1}> is owned by a background task")]
    ChunkBusy(i32, i32),

    #[error("block y={0} is outside the world's vertical range")]
    OutOfVerticalRange(i32),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or validating a [`crate::config::StreamingConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse streaming config RON: {0}")]
    Parse(String),

    #[error("invalid streaming config: {0}")]
    Invalid(String),
}
