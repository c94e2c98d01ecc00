//! Fixed pool of worker threads draining one priority-ordered queue.
//!
//! No dependency graph and no task affinity: every task is independent, runs
//! once, and is ordered only by its [`Priority`] and arrival sequence.

pub mod error;
pub mod priority;
pub mod scheduler;
pub mod task;

pub use error::SchedulerError;
pub use priority::Priority;
pub use scheduler::TaskScheduler;
pub use task::Task;
