//! Test utilities for federation.
//!
//! In-memory doubles for the driven ports so services can be exercised
//! without sockets, DNS or wall-clock time. Enable with the `test-utils`
//! feature flag.
//!
//! # Example
//!
//! ```rust
//! use pm_01_federation::test_utils::ControllableTimeSource;
//! use pm_01_federation::TimeSource;
//!
//! let time = ControllableTimeSource::new(1_000);
//! time.advance(30);
//! assert_eq!(time.now().as_secs(), 1_030);
//! ```

use crate::adapters::MemoryInstanceStore;
use crate::domain::{
    sanitize_domain, DomainName, FederationConfig, FetchError, GuardError, InstanceKey, InstanceRecord,
    Timestamp,
};
use crate::ports::{HostResolver, LocalNetwork, MeshStats, PeerTransport, TimeSource};
use crate::service::{DomainSource, FederationContext, InstanceIdentity, InstanceProfile};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Fixed "now" used across federation tests.
pub const TEST_NOW: u64 = 1_700_000_000;

/// Public address every unknown host resolves to under [`StaticResolver::public`].
pub const TEST_PUBLIC_IP: &str = "93.184.216.34";

/// Time source that only moves when told to.
#[derive(Debug, Clone)]
pub struct ControllableTimeSource {
    secs: Arc<AtomicU64>,
}

impl ControllableTimeSource {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

/// Resolver backed by fixed tables. Unknown hosts fail resolution unless a
/// default answer is set.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
    reverse: HashMap<IpAddr, String>,
    default: Option<Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unknown host resolves to [`TEST_PUBLIC_IP`].
    pub fn public() -> Self {
        let ip = TEST_PUBLIC_IP.parse().ok();
        Self {
            default: ip.map(|ip| vec![ip]),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: &str, addrs: Vec<IpAddr>) -> Self {
        self.hosts.insert(host.to_string(), addrs);
        self
    }

    pub fn with_reverse(mut self, ip: IpAddr, name: &str) -> Self {
        self.reverse.insert(ip, name.to_string());
        self
    }
}

impl HostResolver for StaticResolver {
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        self.hosts
            .get(host)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| GuardError::Resolution {
                host: host.to_string(),
                reason: "no such host".into(),
            })
    }

    fn reverse(&self, ip: IpAddr) -> Option<String> {
        self.reverse.get(&ip).cloned()
    }
}

/// Fixed list of local addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalNetwork {
    addrs: Vec<IpAddr>,
}

impl StaticLocalNetwork {
    pub fn new(addrs: Vec<IpAddr>) -> Self {
        Self { addrs }
    }
}

impl LocalNetwork for StaticLocalNetwork {
    fn local_addresses(&self) -> Vec<IpAddr> {
        self.addrs.clone()
    }
}

/// Mesh statistics returning a constant node count.
#[derive(Debug, Clone, Copy)]
pub struct FixedMeshStats(pub u64);

impl MeshStats for FixedMeshStats {
    fn active_nodes_since(&self, _since: Timestamp) -> u64 {
        self.0
    }
}

type PostHandler = Box<dyn Fn(&DomainName, &Value) -> Result<(), FetchError> + Send + Sync>;

/// A recorded `POST`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    pub domain: String,
    pub path: String,
    pub body: Value,
}

/// Route table standing in for remote instances.
///
/// `GET` routes match the exact path first, then the path without its query
/// string. Unrouted requests fail like an unreachable peer.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(String, String), Value>>,
    gets: Mutex<Vec<(String, String)>>,
    posts: Mutex<Vec<RecordedPost>>,
    post_handlers: Mutex<HashMap<String, Arc<PostHandler>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `GET path` on `domain`.
    pub fn route(&self, domain: &str, path: &str, body: Value) {
        self.routes
            .lock()
            .insert((domain.to_string(), path.to_string()), body);
    }

    /// Deliver `POST`s for `domain` to `handler` instead of just recording them.
    pub fn on_post<F>(&self, domain: &str, handler: F)
    where
        F: Fn(&DomainName, &Value) -> Result<(), FetchError> + Send + Sync + 'static,
    {
        self.post_handlers
            .lock()
            .insert(domain.to_string(), Arc::new(Box::new(handler)));
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().clone()
    }

    pub fn posts_to(&self, domain: &str) -> usize {
        self.posts.lock().iter().filter(|p| p.domain == domain).count()
    }

    /// Number of `GET`s issued for `path` (query included) on `domain`.
    pub fn get_count(&self, domain: &str, path: &str) -> usize {
        self.gets
            .lock()
            .iter()
            .filter(|(d, p)| d == domain && p == path)
            .count()
    }

    /// Number of `GET`s for any path on `domain`.
    pub fn gets_to(&self, domain: &str) -> usize {
        self.gets.lock().iter().filter(|(d, _)| d == domain).count()
    }
}

impl PeerTransport for MockTransport {
    fn get_json(&self, domain: &DomainName, path: &str) -> Result<Value, FetchError> {
        self.gets
            .lock()
            .push((domain.as_str().to_string(), path.to_string()));

        let routes = self.routes.lock();
        let exact = (domain.as_str().to_string(), path.to_string());
        let bare = path.split('?').next().unwrap_or(path);
        let fallback = (domain.as_str().to_string(), bare.to_string());
        routes
            .get(&exact)
            .or_else(|| routes.get(&fallback))
            .cloned()
            .ok_or_else(|| FetchError::Failed {
                uri: format!("http://{domain}{path}"),
                reason: "connection refused".into(),
            })
    }

    fn post_json(&self, domain: &DomainName, path: &str, body: &Value) -> Result<(), FetchError> {
        self.posts.lock().push(RecordedPost {
            domain: domain.as_str().to_string(),
            path: path.to_string(),
            body: body.clone(),
        });
        let handler = self.post_handlers.lock().get(domain.as_str()).cloned();
        match handler {
            Some(handler) => (handler.as_ref())(domain, body),
            None => Ok(()),
        }
    }
}

/// One 1024-bit key shared by every test in the process.
pub fn shared_test_key() -> InstanceKey {
    static KEY: OnceLock<InstanceKey> = OnceLock::new();
    KEY.get_or_init(|| match InstanceKey::generate(1024) {
        Ok(key) => key,
        Err(err) => panic!("test key generation failed: {err}"),
    })
    .clone()
}

/// `/api/nodes` body with `count` nodes last heard at `heard_at`.
pub fn node_list(count: usize, heard_at: Timestamp) -> Value {
    Value::Array(
        (0..count)
            .map(|i| json!({"node_id": format!("!{i:08x}"), "last_heard": heard_at.as_secs()}))
            .collect(),
    )
}

/// A remote instance served through a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct FakePeer {
    pub id: String,
    pub domain: String,
    pub key: InstanceKey,
    pub is_private: bool,
}

impl FakePeer {
    pub fn new(domain: &str) -> Self {
        Self {
            id: format!("id-{domain}"),
            domain: domain.to_string(),
            key: shared_test_key(),
            is_private: false,
        }
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Signed self record as of `now`.
    pub fn record(&self, now: Timestamp) -> InstanceRecord {
        let mut record = InstanceRecord {
            id: self.id.clone(),
            domain: self.domain.clone(),
            pubkey: self.key.public_key_pem().to_string(),
            name: Some(format!("Mesh at {}", self.domain)),
            last_update_time: Some(now.as_secs()),
            is_private: Some(self.is_private),
            ..Default::default()
        };
        record.signature = Some(self.key.sign_record(&record));
        record
    }

    pub fn serve_nodes(&self, transport: &MockTransport, count: usize, heard_at: Timestamp) {
        transport.route(&self.domain, "/api/nodes", node_list(count, heard_at));
    }

    pub fn serve_instances(&self, transport: &MockTransport, entries: Vec<Value>) {
        transport.route(&self.domain, "/api/instances", Value::Array(entries));
    }
}

/// Identity with a configured domain, signed by [`shared_test_key`].
pub fn test_identity(domain: &str) -> InstanceIdentity {
    let domain = match sanitize_domain(domain) {
        Ok(domain) => domain,
        Err(err) => panic!("invalid test domain {domain}: {err}"),
    };
    InstanceIdentity::new(
        format!("id-{domain}"),
        domain,
        DomainSource::Configured,
        shared_test_key(),
        InstanceProfile::default(),
    )
}

/// Context over in-memory collaborators. Hostnames resolve to a public address.
pub fn test_context(
    config: FederationConfig,
    identity: InstanceIdentity,
    store: Arc<MemoryInstanceStore>,
    transport: Arc<MockTransport>,
    time: ControllableTimeSource,
) -> FederationContext {
    FederationContext::new(
        config,
        identity,
        store,
        transport,
        Arc::new(StaticResolver::public()),
        Arc::new(time),
    )
}
