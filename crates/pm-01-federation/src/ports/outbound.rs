//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application provides to the federation core:
//! persistence, name resolution, local addressing, peer HTTP and time.

use crate::domain::{DomainName, FetchError, GuardError, InstanceRecord, StoreError, Timestamp};
use serde_json::Value;
use std::net::IpAddr;

/// Narrow read/write view of the `instances` table.
///
/// Rows are keyed by `id` and `domain` is unique. When both conflict the
/// domain wins: [`replace_for_domain`](InstanceStore::replace_for_domain)
/// drops any other row holding the domain in the same write.
pub trait InstanceStore: Send + Sync {
    fn find_by_domain(&self, domain: &str) -> Result<Option<InstanceRecord>, StoreError>;

    fn find_by_id(&self, id: &str) -> Result<Option<InstanceRecord>, StoreError>;

    /// Insert or replace the row with `record.id`.
    fn upsert(&self, record: &InstanceRecord) -> Result<(), StoreError>;

    /// Upsert `record` and delete every row with its domain and another id,
    /// atomically. Returns the ids that were deleted.
    fn replace_for_domain(&self, record: &InstanceRecord) -> Result<Vec<String>, StoreError>;

    /// Rows whose `last_update_time` is at or after `since`, in stable order.
    fn updated_since(&self, since: Timestamp) -> Result<Vec<InstanceRecord>, StoreError>;
}

/// DNS lookups.
pub trait HostResolver: Send + Sync {
    /// Every A/AAAA address for `host`. An empty list is not an error.
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, GuardError>;

    /// First PTR name for `ip`, without trailing dot.
    fn reverse(&self, ip: IpAddr) -> Option<String>;
}

/// Addresses assigned to this host.
pub trait LocalNetwork: Send + Sync {
    fn local_addresses(&self) -> Vec<IpAddr>;
}

/// JSON-over-HTTP access to peer instances.
///
/// Implementations must pass every dial through the address guard.
pub trait PeerTransport: Send + Sync {
    /// `GET {path}` on `domain`, decoded as JSON.
    fn get_json(&self, domain: &DomainName, path: &str) -> Result<Value, FetchError>;

    /// `POST {path}` with a JSON body; any 2xx is success.
    fn post_json(&self, domain: &DomainName, path: &str, body: &Value) -> Result<(), FetchError>;
}

/// Abstract interface for time-related operations.
///
/// Enables deterministic testing by injecting controllable time sources.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Local mesh statistics from the ingestion side.
pub trait MeshStats: Send + Sync {
    /// Nodes heard at or after `since`.
    fn active_nodes_since(&self, since: Timestamp) -> u64;
}
