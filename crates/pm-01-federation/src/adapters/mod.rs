//! # Adapters
//!
//! Concrete implementations of the driven ports.
//!
//! - Always available: in-memory store, busy-retry wrapper, system clock,
//!   key files and TOML settings.
//! - `network` feature: reqwest/rustls peer client and hickory resolver.

pub mod config;
pub mod key_store;
pub mod retry;
pub mod store;
pub mod time;

#[cfg(feature = "network")]
pub mod http_client;
#[cfg(feature = "network")]
pub mod resolver;
#[cfg(feature = "network")]
pub mod tls;

pub use config::{ConfigError, FederationSettings, DEFAULT_KEY_PATH};
pub use key_store::{instance_id_path, load_or_create_instance_id, load_or_generate_key};
pub use retry::RetryingStore;
pub use store::MemoryInstanceStore;
pub use time::SystemTimeSource;

#[cfg(feature = "network")]
pub use http_client::{HttpSettings, RemoteInstanceClient};
#[cfg(feature = "network")]
pub use resolver::{SystemLocalNetwork, SystemResolver};
#[cfg(feature = "network")]
pub use tls::{build_tls_config, CrlTolerantVerifier};
