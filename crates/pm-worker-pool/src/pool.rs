//! # Bounded Worker Pool
//!
//! Workers block on a shared FIFO guarded by one mutex and condvar. The queue
//! bound is checked at enqueue time only; shutdown sentinels bypass it so a
//! saturated pool can still be stopped.

use crate::error::{PoolError, TaskError};
use crate::task::{Task, TaskCompleter};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Join polling granularity during shutdown.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pool sizing and default wait budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub size: usize,
    /// Maximum number of jobs waiting in the queue.
    pub max_queue_depth: usize,
    /// Default budget callers use when waiting on a task.
    pub task_timeout: Duration,
}

impl PoolConfig {
    pub fn new(size: usize, max_queue_depth: usize, task_timeout: Duration) -> Self {
        Self {
            size,
            max_queue_depth,
            task_timeout,
        }
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.size == 0 {
            return Err(PoolError::InvalidConfig("size must be at least 1".into()));
        }
        if self.max_queue_depth == 0 {
            return Err(PoolError::InvalidConfig(
                "max_queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            max_queue_depth: 64,
            task_timeout: Duration::from_secs(30),
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub workers: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: u64,
    pub accepting: bool,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Terminate,
}

struct Queue {
    messages: VecDeque<Message>,
    /// Jobs only; sentinels are not counted against the depth bound.
    queued_jobs: usize,
    accepting: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    active: AtomicUsize,
    completed: AtomicU64,
}

/// Fixed-size pool of named worker threads.
pub struct WorkerPool {
    name: String,
    config: PoolConfig,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_task_id: AtomicU64,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `config.size` workers.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] for a zero size or depth,
    /// [`PoolError::Spawn`] if a thread cannot be created.
    pub fn new(name: impl Into<String>, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let name = name.into();

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                messages: VecDeque::with_capacity(config.max_queue_depth + config.size),
                queued_jobs: 0,
                accepting: true,
            }),
            available: Condvar::new(),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
        });

        let pool = Self {
            name,
            config,
            shared,
            workers: Mutex::new(Vec::new()),
            next_task_id: AtomicU64::new(1),
        };

        for index in 0..pool.config.size {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", pool.name, index))
                .spawn(move || worker_loop(&shared))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            pool.workers.lock().push(handle);
        }

        debug!(
            pool = %pool.name,
            size = pool.config.size,
            max_queue_depth = pool.config.max_queue_depth,
            "worker pool started"
        );

        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Default wait budget for tasks scheduled on this pool.
    pub fn task_timeout(&self) -> Duration {
        self.config.task_timeout
    }

    pub fn is_shutdown(&self) -> bool {
        !self.shared.queue.lock().accepting
    }

    pub fn stats(&self) -> PoolStats {
        let queue = self.shared.queue.lock();
        PoolStats {
            workers: self.config.size,
            queued: queue.queued_jobs,
            active: self.shared.active.load(Ordering::SeqCst),
            completed: self.shared.completed.load(Ordering::SeqCst),
            accepting: queue.accepting,
        }
    }

    /// Enqueue `job` without blocking.
    ///
    /// # Errors
    ///
    /// [`PoolError::Shutdown`] after [`WorkerPool::shutdown`],
    /// [`PoolError::QueueFull`] when `max_queue_depth` jobs are waiting.
    pub fn schedule<F, T>(&self, job: F) -> Result<Task<T>, PoolError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut queue = self.shared.queue.lock();
        if !queue.accepting {
            return Err(PoolError::Shutdown);
        }
        if queue.queued_jobs >= self.config.max_queue_depth {
            return Err(PoolError::QueueFull);
        }

        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (task, completer) = Task::new(id);
        queue.messages.push_back(Message::Run(wrap_job(job, completer)));
        queue.queued_jobs += 1;
        drop(queue);

        self.shared.available.notify_one();
        Ok(task)
    }

    /// Stop accepting work and join workers for at most `timeout`.
    ///
    /// Jobs already queued ahead of the sentinels still run. Workers that
    /// are still busy at the deadline are detached; whatever they left in the
    /// queue is dropped and its tasks reject with [`TaskError::Abandoned`].
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self, timeout: Duration) {
        {
            let mut queue = self.shared.queue.lock();
            if !queue.accepting {
                return;
            }
            queue.accepting = false;
            for _ in 0..self.config.size {
                queue.messages.push_back(Message::Terminate);
            }
        }
        self.shared.available.notify_all();

        let deadline = Instant::now() + timeout;
        let handles = std::mem::take(&mut *self.workers.lock());
        let mut stragglers = 0usize;

        for handle in handles {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL_INTERVAL);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!(pool = %self.name, "worker thread exited with a panic");
                }
            } else {
                stragglers += 1;
            }
        }

        if stragglers > 0 {
            let dropped: Vec<Message> = {
                let mut queue = self.shared.queue.lock();
                queue.queued_jobs = 0;
                let dropped = queue.messages.drain(..).collect();
                // Busy workers still need a sentinel once their job returns.
                for _ in 0..stragglers {
                    queue.messages.push_back(Message::Terminate);
                }
                dropped
            };
            warn!(
                pool = %self.name,
                stragglers,
                dropped_jobs = dropped.iter().filter(|m| matches!(m, Message::Run(_))).count(),
                "worker pool shutdown timed out; detaching busy workers"
            );
        } else {
            debug!(pool = %self.name, "worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(Duration::from_secs(1));
    }
}

fn wrap_job<F, T>(job: F, completer: TaskCompleter<T>) -> Job
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Box::new(move || match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(value)) => completer.fulfill(value),
        Ok(Err(err)) => completer.reject(TaskError::Failed(Arc::new(err))),
        Err(payload) => completer.reject(TaskError::Panicked(panic_message(payload.as_ref()))),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let message = {
            let mut queue = shared.queue.lock();
            while queue.messages.is_empty() {
                shared.available.wait(&mut queue);
            }
            let message = queue.messages.pop_front();
            if matches!(message, Some(Message::Run(_))) {
                queue.queued_jobs = queue.queued_jobs.saturating_sub(1);
                shared.active.fetch_add(1, Ordering::SeqCst);
            }
            message
        };

        match message {
            Some(Message::Run(job)) => {
                job();
                shared.active.fetch_sub(1, Ordering::SeqCst);
                shared.completed.fetch_add(1, Ordering::SeqCst);
            }
            Some(Message::Terminate) | None => break,
        }
    }
}

#[cfg(test)]
mod tests;
