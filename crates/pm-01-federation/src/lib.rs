//! # PotatoMesh Federation Subsystem
//!
//! Lets independent PotatoMesh instances discover each other. Each instance
//! periodically announces a signed self-description to known peers and
//! crawls the peers' instance lists recursively. A peer is only accepted if
//! its record is signed with the key it publishes, its domain resolves to
//! public addresses, and it serves enough recently heard mesh nodes.
//!
//! ## Architecture
//!
//! Hexagonal, like the other subsystems:
//! - **Domain:** records, canonical payloads, signatures, domain syntax,
//!   address classes, crawl bookkeeping
//! - **Ports:** `InstanceStore`, `HostResolver`, `PeerTransport`, `TimeSource`, ...
//! - **Service:** guard, validator, announcer, crawler, inbound handler, runtime
//! - **Adapters:** in-memory store, key files, TOML settings and
//!   (feature `network`) reqwest/rustls/hickory
//!
//! Blocking I/O fans out through [`pm_worker_pool::WorkerPool`].
//!
//! ## Example
//!
//! ```rust
//! use pm_01_federation::{sanitize_domain, InstanceKey, InstanceRecord, verify_record};
//!
//! let domain = sanitize_domain(" Mesh.Example.ORG. ").unwrap();
//! assert_eq!(domain.as_str(), "mesh.example.org");
//!
//! let key = InstanceKey::generate(1024).unwrap();
//! let mut record = InstanceRecord {
//!     id: "instance-1".into(),
//!     domain: domain.to_string(),
//!     pubkey: key.public_key_pem().to_string(),
//!     last_update_time: Some(1_700_000_000),
//!     ..Default::default()
//! };
//! record.signature = Some(key.sign_record(&record));
//! assert!(verify_record(&record));
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// In-memory port doubles.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Domain
pub use domain::{
    canonical_payload, check_freshness, classify, count_fresh_nodes, is_restricted, sanitize_domain,
    verify_bytes, verify_record, AddressClass, ClaimOutcome, CrawlSession, CrawlState, DomainError, DomainName,
    FederationConfig, FederationError, FetchError, GuardError, IdentityError, InstanceKey, InstanceRecord,
    ShutdownSignal, SkipReason, StoreError, Timestamp, DEFAULT_SEED_DOMAIN,
};

// Ports
pub use ports::{
    AnnouncementResponse, FederationApi, HostResolver, InstanceStore, LocalNetwork, MeshStats, PeerTransport,
    TimeSource,
};

// Services
pub use service::{
    resolve_instance_domain, AnnounceReport, CrawlEnqueue, CrawlReport, DomainGuard, DomainSource,
    FederationAnnouncer, FederationContext, FederationCrawler, FederationHandle, FederationRuntime,
    InboundHandler, InstanceIdentity, InstanceProfile, RecordValidator,
};

// Adapters
pub use adapters::{
    load_or_create_instance_id, load_or_generate_key, ConfigError, FederationSettings, MemoryInstanceStore,
    RetryingStore, SystemTimeSource,
};

#[cfg(feature = "network")]
pub use adapters::{HttpSettings, RemoteInstanceClient, SystemLocalNetwork, SystemResolver};
