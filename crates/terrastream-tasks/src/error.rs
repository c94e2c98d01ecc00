/// Errors returned when submitting work to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("task scheduler has shut down; task dropped")]
    ShutDown,
}
