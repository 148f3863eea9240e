//! Federation settings from TOML plus `PM_*` environment overrides.
//!
//! # Config File Format
//!
//! ```toml
//! [instance]
//! domain = "mesh.example.org"
//! name = "Berlin Mesh"
//! channel = "LongFast"
//! frequency = "868"
//! latitude = 52.52
//! longitude = 13.40
//! contact_link = "#berlin-mesh:matrix.org"
//! private = false
//! key_path = "data/instance.pem"
//!
//! [federation]
//! enabled = true
//! seeds = ["potatomesh.net"]
//! announce_interval_secs = 28800
//! crawl_interval_secs = 3600
//! crawl_cooldown_secs = 900
//! pool_size = 4
//! pool_queue_depth = 64
//! task_timeout_secs = 30
//! min_peer_nodes = 10
//! max_node_age_secs = 86400
//! ```
//!
//! Every key is optional.

use crate::domain::FederationConfig;
use crate::service::InstanceProfile;
use pm_worker_pool::PoolConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default location of the instance key.
pub const DEFAULT_KEY_PATH: &str = "data/instance.pem";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid value for {key}: `{value}`")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    instance: InstanceSection,
    #[serde(default)]
    federation: FederationSection,
}

#[derive(Debug, Deserialize, Default)]
struct InstanceSection {
    domain: Option<String>,
    id: Option<String>,
    name: Option<String>,
    channel: Option<String>,
    frequency: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    contact_link: Option<String>,
    private: Option<bool>,
    key_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct FederationSection {
    enabled: Option<bool>,
    seeds: Option<Vec<String>>,
    announce_interval_secs: Option<u64>,
    announce_initial_delay_secs: Option<u64>,
    crawl_interval_secs: Option<u64>,
    crawl_cooldown_secs: Option<u64>,
    per_response_limit: Option<usize>,
    overall_crawl_limit: Option<usize>,
    pool_size: Option<usize>,
    pool_queue_depth: Option<usize>,
    task_timeout_secs: Option<u64>,
    open_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
    max_redirects: Option<usize>,
    min_peer_nodes: Option<usize>,
    max_node_age_secs: Option<u64>,
    recent_window_secs: Option<u64>,
    node_query_limit: Option<usize>,
    store_retry_attempts: Option<u32>,
    store_retry_backoff_ms: Option<u64>,
}

/// Everything the host needs to build the federation context.
#[derive(Debug, Clone, PartialEq)]
pub struct FederationSettings {
    pub config: FederationConfig,
    pub profile: InstanceProfile,
    pub key_path: PathBuf,
    /// Explicit id; otherwise one is stored next to the key.
    pub instance_id: Option<String>,
}

impl Default for FederationSettings {
    fn default() -> Self {
        Self {
            config: FederationConfig::default(),
            profile: InstanceProfile::default(),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            instance_id: None,
        }
    }
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl FederationSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML document. Unknown tables (e.g. `[logging]`) are ignored.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = FederationConfig::default();
        let fed = file.federation;
        let inst = file.instance;

        let pool = PoolConfig::new(
            fed.pool_size.unwrap_or(defaults.pool.size),
            fed.pool_queue_depth.unwrap_or(defaults.pool.max_queue_depth),
            secs(fed.task_timeout_secs, defaults.pool.task_timeout),
        );

        let config = FederationConfig {
            enabled: fed.enabled.unwrap_or(defaults.enabled),
            instance_domain: non_empty(inst.domain),
            seed_domains: fed.seeds.unwrap_or_else(|| defaults.seed_domains.clone()),
            announce_interval: secs(fed.announce_interval_secs, defaults.announce_interval),
            announce_initial_delay: secs(fed.announce_initial_delay_secs, defaults.announce_initial_delay),
            crawl_interval: secs(fed.crawl_interval_secs, defaults.crawl_interval),
            crawl_cooldown: secs(fed.crawl_cooldown_secs, defaults.crawl_cooldown),
            per_response_limit: fed.per_response_limit.unwrap_or(defaults.per_response_limit),
            overall_crawl_limit: fed.overall_crawl_limit.unwrap_or(defaults.overall_crawl_limit),
            pool,
            open_timeout: secs(fed.open_timeout_secs, defaults.open_timeout),
            read_timeout: secs(fed.read_timeout_secs, defaults.read_timeout),
            max_redirects: fed.max_redirects.unwrap_or(defaults.max_redirects),
            min_peer_nodes: fed.min_peer_nodes.unwrap_or(defaults.min_peer_nodes),
            max_node_age: secs(fed.max_node_age_secs, defaults.max_node_age),
            recent_window: secs(fed.recent_window_secs, defaults.recent_window),
            node_query_limit: fed.node_query_limit.unwrap_or(defaults.node_query_limit),
            store_retry_attempts: fed.store_retry_attempts.unwrap_or(defaults.store_retry_attempts),
            store_retry_backoff: fed
                .store_retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_retry_backoff),
        };

        let base = InstanceProfile::default();
        let profile = InstanceProfile {
            name: non_empty(inst.name),
            version: base.version,
            channel: non_empty(inst.channel),
            frequency: non_empty(inst.frequency),
            latitude: inst.latitude,
            longitude: inst.longitude,
            contact_link: non_empty(inst.contact_link),
            is_private: inst.private.unwrap_or(false),
        };

        Ok(Self {
            config,
            profile,
            key_path: inst.key_path.unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_PATH)),
            instance_id: non_empty(inst.id),
        })
    }

    /// Apply `PM_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `PM_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PM_FEDERATION") {
            self.config.enabled = parse_flag("PM_FEDERATION", &v)?;
        }
        if let Some(v) = get("PM_PRIVATE") {
            self.profile.is_private = parse_flag("PM_PRIVATE", &v)?;
        }
        if let Some(v) = get("PM_INSTANCE_DOMAIN") {
            self.config.instance_domain = Some(v.trim().to_string());
        }
        if let Some(v) = get("PM_FEDERATION_SEEDS") {
            self.config.seed_domains = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("PM_POOL_SIZE") {
            self.config.pool.size = parse_number("PM_POOL_SIZE", &v)?;
        }
        if let Some(v) = get("PM_POOL_QUEUE_DEPTH") {
            self.config.pool.max_queue_depth = parse_number("PM_POOL_QUEUE_DEPTH", &v)?;
        }
        if let Some(v) = get("PM_MIN_PEER_NODES") {
            self.config.min_peer_nodes = parse_number("PM_MIN_PEER_NODES", &v)?;
        }
        if let Some(v) = get("PM_INSTANCE_NAME") {
            self.profile.name = Some(v.trim().to_string());
        }
        if let Some(v) = get("PM_CONTACT_LINK") {
            self.profile.contact_link = Some(v.trim().to_string());
        }
        if let Some(v) = get("PM_KEY_PATH") {
            self.key_path = PathBuf::from(v.trim());
        }
        Ok(())
    }
}
