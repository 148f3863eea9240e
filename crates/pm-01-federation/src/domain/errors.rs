//! Federation error taxonomy.
//!
//! Validation and security failures are handled where they occur (logged,
//! candidate discarded). Scheduling failures trigger per-component fallbacks.
//! Nothing here is meant to reach dashboard users.

use pm_worker_pool::{PoolError, TaskError};
use thiserror::Error;

/// Syntactic rejection of a candidate domain, before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,
    #[error("domain must not include a scheme")]
    HasScheme,
    #[error("domain must not include a path, query or fragment")]
    HasPath,
    #[error("domain must not include credentials")]
    HasCredentials,
    #[error("invalid port `{0}`")]
    InvalidPort(String),
    #[error("invalid host `{0}`")]
    InvalidHost(String),
}

/// SSRF guard veto or resolution failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Every resolved address is loopback/private/link-local/unspecified.
    #[error("restricted domain: {0}")]
    Restricted(String),
    #[error("failed to resolve {host}: {reason}")]
    Resolution { host: String, reason: String },
}

/// Failure of an outbound peer request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid domain: {0}")]
    InvalidDomain(#[from] DomainError),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error("federation is shutting down")]
    ShuttingDown,
    /// The last candidate URI that failed and why.
    #[error("request to {uri} failed: {reason}")]
    Failed { uri: String, reason: String },
}

/// Persistence collaborator failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transient lock contention; safe to retry.
    #[error("store is busy")]
    Busy,
    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::Busy)
    }
}

/// Failures while establishing this instance's identity.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid instance key: {0}")]
    InvalidKey(String),
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("key file {path}: {reason}")]
    KeyFile { path: String, reason: String },
    #[error("no usable instance domain could be determined")]
    NoDomain,
}

/// Top-level federation error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FederationError {
    #[error("worker pool queue is full")]
    QueueFull,
    #[error("worker pool has been shut down")]
    PoolShutdown,
    #[error("timed out waiting for task result")]
    TaskTimeout,
    #[error("invalid domain: {0}")]
    InvalidDomain(#[from] DomainError),
    #[error("restricted address: {0}")]
    RestrictedAddress(String),
    #[error("signature verification failed for {0}")]
    SignatureInvalid(String),
    #[error("stale or insufficient nodes: {fresh} fresh, {required} required")]
    StaleOrInsufficientNodes { fresh: usize, required: usize },
    #[error("fetch failed for {uri}: {reason}")]
    FetchFailed { uri: String, reason: String },
    #[error("malformed instance record: {0}")]
    MalformedRecord(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("instance {0} is private")]
    PrivateInstance(String),
    #[error("instance record for {0} is stale")]
    StaleRecord(String),
    #[error("record describes this instance")]
    SelfRecord,
    #[error("federation is disabled")]
    Disabled,
    #[error("federation is shutting down")]
    ShuttingDown,
    #[error("task failed: {0}")]
    TaskFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FederationError {
    /// Short machine-readable reason, used in logs and inbound responses.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::PoolShutdown => "pool_shutdown",
            Self::TaskTimeout => "task_timeout",
            Self::InvalidDomain(_) => "invalid_domain",
            Self::RestrictedAddress(_) => "restricted_address",
            Self::SignatureInvalid(_) => "invalid_signature",
            Self::StaleOrInsufficientNodes { .. } => "insufficient_nodes",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::MalformedRecord(_) => "malformed",
            Self::MissingField(_) => "missing_field",
            Self::PrivateInstance(_) => "private",
            Self::StaleRecord(_) => "stale_record",
            Self::SelfRecord => "self",
            Self::Disabled => "disabled",
            Self::ShuttingDown => "shutting_down",
            Self::TaskFailed(_) => "task_failed",
            Self::Store(_) => "store",
        }
    }
}

impl From<PoolError> for FederationError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::QueueFull => Self::QueueFull,
            PoolError::Shutdown | PoolError::InvalidConfig(_) | PoolError::Spawn(_) => {
                Self::PoolShutdown
            }
        }
    }
}

impl From<TaskError> for FederationError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Timeout => Self::TaskTimeout,
            other => Self::TaskFailed(other.to_string()),
        }
    }
}

impl From<GuardError> for FederationError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Restricted(host) => Self::RestrictedAddress(host),
            GuardError::Resolution { host, reason } => Self::FetchFailed { uri: host, reason },
        }
    }
}

impl From<FetchError> for FederationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidDomain(e) => Self::InvalidDomain(e),
            FetchError::Guard(e) => e.into(),
            FetchError::ShuttingDown => Self::ShuttingDown,
            FetchError::Failed { uri, reason } => Self::FetchFailed { uri, reason },
        }
    }
}
