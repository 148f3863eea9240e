//! Worker pool errors.

use std::sync::Arc;
use thiserror::Error;

/// Errors returned when scheduling work or building a pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The bounded queue is at `max_queue_depth`.
    #[error("worker pool queue is full")]
    QueueFull,

    /// `shutdown` has been called; no more work is accepted.
    #[error("worker pool has been shut down")]
    Shutdown,

    /// Construction parameters are unusable (zero workers, zero depth).
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Errors observed while waiting on a [`crate::Task`].
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The result was not ready before the wait deadline. The job may still
    /// complete later; nobody is waiting for it any more.
    #[error("timed out waiting for task result")]
    Timeout,

    /// The job ran and returned an error.
    #[error("task failed: {0}")]
    Failed(Arc<anyhow::Error>),

    /// The job panicked on the worker thread.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The job was dropped without running (pool torn down).
    #[error("task was abandoned before it ran")]
    Abandoned,

    /// The value was already taken by an earlier successful wait.
    #[error("task result was already consumed")]
    Consumed,
}

impl TaskError {
    /// True when the error is the wait deadline rather than the job itself.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout)
    }
}
