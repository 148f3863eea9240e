use crate::domain::{FederationConfig, ShutdownSignal, Timestamp};
use crate::ports::{HostResolver, InstanceStore, MeshStats, PeerTransport, TimeSource};
use crate::service::guard::DomainGuard;
use crate::service::identity::InstanceIdentity;
use std::sync::Arc;

/// Collaborators shared by the announcer, crawler and inbound handler.
pub struct FederationContext {
    pub config: FederationConfig,
    pub identity: Arc<InstanceIdentity>,
    pub store: Arc<dyn InstanceStore>,
    pub transport: Arc<dyn PeerTransport>,
    pub guard: DomainGuard,
    pub time: Arc<dyn TimeSource>,
    pub mesh_stats: Option<Arc<dyn MeshStats>>,
    pub shutdown: ShutdownSignal,
}

impl FederationContext {
    pub fn new(
        config: FederationConfig,
        identity: InstanceIdentity,
        store: Arc<dyn InstanceStore>,
        transport: Arc<dyn PeerTransport>,
        resolver: Arc<dyn HostResolver>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            identity: Arc::new(identity),
            store,
            transport,
            guard: DomainGuard::new(resolver),
            time,
            mesh_stats: None,
            shutdown: ShutdownSignal::new(),
        }
    }

    #[must_use]
    pub fn with_mesh_stats(mut self, stats: Arc<dyn MeshStats>) -> Self {
        self.mesh_stats = Some(stats);
        self
    }

    /// Share an existing flag, e.g. the one the HTTP client watches.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.time.now()
    }

    /// Enabled and not private. A private instance never federates.
    pub fn federates(&self) -> bool {
        self.config.enabled && !self.identity.is_private()
    }

    /// Locally observed active nodes, reported as our `nodesCount`.
    pub fn local_node_count(&self) -> Option<u64> {
        let since = self.now().sub_secs(self.config.max_node_age.as_secs());
        self.mesh_stats
            .as_ref()
            .map(|stats| stats.active_nodes_since(since))
    }
}
