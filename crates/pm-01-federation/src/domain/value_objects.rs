//! Value objects: timestamps and the federation configuration surface.

use pm_worker_pool::PoolConfig;
use std::time::Duration;

/// Unix timestamp in whole seconds.
///
/// Clamped to year 9999 so hostile `lastUpdateTime` values cannot overflow
/// window arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seed instance every deployment knows about out of the box.
pub const DEFAULT_SEED_DOMAIN: &str = "potatomesh.net";

/// Federation configuration.
///
/// Every field has a default; hosts override from file or environment.
#[derive(Debug, Clone, PartialEq)]
pub struct FederationConfig {
    /// Master switch. When off, nothing is announced or crawled.
    pub enabled: bool,
    /// Explicit domain override (`host[:port]`).
    pub instance_domain: Option<String>,
    /// Domains always announced to and crawled.
    pub seed_domains: Vec<String>,
    /// Period of the announcement loop.
    pub announce_interval: Duration,
    /// Delay before the first announcement after start.
    pub announce_initial_delay: Duration,
    /// Period of the crawl loop.
    pub crawl_interval: Duration,
    /// Minimum gap between two crawls of the same domain.
    pub crawl_cooldown: Duration,
    /// Entries examined per `/api/instances` response.
    pub per_response_limit: usize,
    /// Domains visited per top-level crawl.
    pub overall_crawl_limit: usize,
    /// Worker pool sizing and default task wait.
    pub pool: PoolConfig,
    /// TCP/TLS connect budget per candidate URI.
    pub open_timeout: Duration,
    /// Response budget per candidate URI.
    pub read_timeout: Duration,
    /// Redirects followed by outbound requests. Zero keeps every dial behind
    /// the address guard.
    pub max_redirects: usize,
    /// Minimum fresh nodes a peer must report.
    pub min_peer_nodes: usize,
    /// Maximum age of a node's `last_heard` to count as fresh.
    pub max_node_age: Duration,
    /// Records updated within this window are announce/crawl targets and
    /// remote records older than it are stale.
    pub recent_window: Duration,
    /// `limit` for the windowed `/api/nodes` query.
    pub node_query_limit: usize,
    /// Attempts for busy persistence operations.
    pub store_retry_attempts: u32,
    /// Linear backoff step between busy retries.
    pub store_retry_backoff: Duration,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            instance_domain: None,
            seed_domains: vec![DEFAULT_SEED_DOMAIN.to_string()],
            announce_interval: Duration::from_secs(8 * 60 * 60),
            announce_initial_delay: Duration::from_secs(30),
            crawl_interval: Duration::from_secs(60 * 60),
            crawl_cooldown: Duration::from_secs(15 * 60),
            per_response_limit: 64,
            overall_crawl_limit: 256,
            pool: PoolConfig::new(4, 64, Duration::from_secs(30)),
            open_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(12),
            max_redirects: 0,
            min_peer_nodes: 10,
            max_node_age: Duration::from_secs(24 * 60 * 60),
            recent_window: Duration::from_secs(7 * 24 * 60 * 60),
            node_query_limit: 1000,
            store_retry_attempts: 5,
            store_retry_backoff: Duration::from_millis(50),
        }
    }
}

impl FederationConfig {
    /// Small limits and short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            seed_domains: Vec::new(),
            announce_interval: Duration::from_millis(200),
            announce_initial_delay: Duration::from_millis(10),
            crawl_interval: Duration::from_millis(200),
            crawl_cooldown: Duration::from_secs(60),
            per_response_limit: 16,
            overall_crawl_limit: 32,
            pool: PoolConfig::new(2, 16, Duration::from_secs(5)),
            open_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
            min_peer_nodes: 10,
            store_retry_backoff: Duration::from_millis(1),
            ..Self::default()
        }
    }
}
