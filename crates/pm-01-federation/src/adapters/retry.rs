//! Busy-retry wrapper around any instance store.

use crate::domain::{InstanceRecord, StoreError, Timestamp};
use crate::ports::InstanceStore;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries [`StoreError::Busy`] with linear backoff (`backoff * attempt`).
/// Other errors, and the last busy error, propagate unchanged.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    attempts: u32,
    backoff: Duration,
}

impl<S: InstanceStore> RetryingStore<S> {
    pub fn new(inner: S, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn retry<T>(&self, op: &str, mut f: impl FnMut(&S) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut attempt = 1;
        loop {
            match f(&self.inner) {
                Err(err) if err.is_busy() && attempt < self.attempts => {
                    debug!(op, attempt, "store busy, retrying");
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_busy() {
                        warn!(op, attempts = self.attempts, "store still busy, giving up");
                    }
                    return Err(err);
                }
                ok => return ok,
            }
        }
    }
}

impl<S: InstanceStore> InstanceStore for RetryingStore<S> {
    fn find_by_domain(&self, domain: &str) -> Result<Option<InstanceRecord>, StoreError> {
        self.retry("find_by_domain", |s| s.find_by_domain(domain))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<InstanceRecord>, StoreError> {
        self.retry("find_by_id", |s| s.find_by_id(id))
    }

    fn upsert(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        self.retry("upsert", |s| s.upsert(record))
    }

    fn replace_for_domain(&self, record: &InstanceRecord) -> Result<Vec<String>, StoreError> {
        self.retry("replace_for_domain", |s| s.replace_for_domain(record))
    }

    fn updated_since(&self, since: Timestamp) -> Result<Vec<InstanceRecord>, StoreError> {
        self.retry("updated_since", |s| s.updated_since(since))
    }
}
