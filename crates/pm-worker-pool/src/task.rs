//! Awaitable task handles.
//!
//! A [`Task`] is the caller's half of a scheduled job; the worker holds the
//! matching [`TaskCompleter`]. If the completer is dropped while the task is
//! still pending (the queued job was discarded) the task is rejected with
//! [`TaskError::Abandoned`], so waiters never hang on a job that cannot run.

use crate::error::TaskError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Observable lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued or running.
    Pending,
    /// Completed with a value.
    Fulfilled,
    /// Completed with an error.
    Rejected,
}

enum TaskState<T> {
    Pending,
    Fulfilled(T),
    Rejected(TaskError),
    Consumed,
}

struct Slot<T> {
    state: Mutex<TaskState<T>>,
    settled: Condvar,
}

/// Handle to one scheduled job.
pub struct Task<T> {
    id: u64,
    slot: Arc<Slot<T>>,
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Task<T> {
    pub(crate) fn new(id: u64) -> (Self, TaskCompleter<T>) {
        let slot = Arc::new(Slot {
            state: Mutex::new(TaskState::Pending),
            settled: Condvar::new(),
        });
        (
            Self {
                id,
                slot: Arc::clone(&slot),
            },
            TaskCompleter { slot: Some(slot) },
        )
    }

    /// Pool-local sequence number of this task.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current status without blocking.
    pub fn status(&self) -> TaskStatus {
        match &*self.slot.state.lock() {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Fulfilled(_) | TaskState::Consumed => TaskStatus::Fulfilled,
            TaskState::Rejected(_) => TaskStatus::Rejected,
        }
    }

    /// True once the job has settled either way.
    pub fn is_complete(&self) -> bool {
        self.status() != TaskStatus::Pending
    }

    /// Block until the job settles or `timeout` elapses.
    ///
    /// `None` waits indefinitely. `Some(Duration::ZERO)` only inspects the
    /// current state. On success the value is moved out; a second successful
    /// wait returns [`TaskError::Consumed`].
    pub fn wait(&self, timeout: Option<Duration>) -> Result<T, TaskError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.slot.state.lock();

        while matches!(*state, TaskState::Pending) {
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(TaskError::Timeout);
                    }
                    let _ = self.slot.settled.wait_until(&mut state, deadline);
                }
                None => self.slot.settled.wait(&mut state),
            }
        }

        match std::mem::replace(&mut *state, TaskState::Consumed) {
            TaskState::Fulfilled(value) => Ok(value),
            TaskState::Rejected(err) => {
                *state = TaskState::Rejected(err.clone());
                Err(err)
            }
            TaskState::Consumed => Err(TaskError::Consumed),
            TaskState::Pending => unreachable!("loop exits only once settled"),
        }
    }
}

/// Worker-side half of a task. Settles the task exactly once.
pub(crate) struct TaskCompleter<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> TaskCompleter<T> {
    pub(crate) fn fulfill(mut self, value: T) {
        if let Some(slot) = self.slot.take() {
            Self::settle(&slot, TaskState::Fulfilled(value));
        }
    }

    pub(crate) fn reject(mut self, err: TaskError) {
        if let Some(slot) = self.slot.take() {
            Self::settle(&slot, TaskState::Rejected(err));
        }
    }

    fn settle(slot: &Slot<T>, outcome: TaskState<T>) {
        let mut state = slot.state.lock();
        if matches!(*state, TaskState::Pending) {
            *state = outcome;
            slot.settled.notify_all();
        }
    }
}

impl<T> Drop for TaskCompleter<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            Self::settle(&slot, TaskState::Rejected(TaskError::Abandoned));
        }
    }
}
