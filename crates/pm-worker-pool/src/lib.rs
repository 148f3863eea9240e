//! # PM Worker Pool
//!
//! Fixed-size thread pool used by the federation subsystem to fan out
//! short-lived blocking I/O (per-domain announcements, per-domain crawls).
//!
//! ## Contract
//!
//! - `size` worker threads are spawned at construction.
//! - The queue is bounded by `max_queue_depth`. [`WorkerPool::schedule`]
//!   never blocks: a full queue yields [`PoolError::QueueFull`] and the caller
//!   picks its own fallback (run inline or skip).
//! - Every scheduled job gets a [`Task`] handle that transitions exactly once
//!   to fulfilled or rejected. [`Task::wait`] is bounded by a timeout and a
//!   timeout does not cancel the job.
//! - [`WorkerPool::shutdown`] is idempotent and bounded by its own timeout.
//! - The pool never retries.
//!
//! ## Example
//!
//! ```rust
//! use pm_worker_pool::{PoolConfig, WorkerPool};
//! use std::time::Duration;
//!
//! let pool = WorkerPool::new("docs", PoolConfig::new(2, 8, Duration::from_secs(5))).unwrap();
//! let task = pool.schedule(|| Ok(21 * 2)).unwrap();
//! assert_eq!(task.wait(Some(Duration::from_secs(5))).unwrap(), 42);
//! pool.shutdown(Duration::from_secs(1));
//! ```

pub mod error;
pub mod pool;
pub mod task;

pub use error::{PoolError, TaskError};
pub use pool::{PoolConfig, PoolStats, WorkerPool};
pub use task::{Task, TaskStatus};
