//! Wiring the system adapters into a [`FederationRuntime`].

use anyhow::{Context, Result};
use pm_01_federation::adapters::{
    load_or_create_instance_id, load_or_generate_key, HttpSettings, MemoryInstanceStore, RemoteInstanceClient,
    RetryingStore, SystemLocalNetwork, SystemResolver, SystemTimeSource,
};
use pm_01_federation::domain::DEFAULT_KEY_BITS;
use pm_01_federation::{
    resolve_instance_domain, DomainGuard, FederationContext, FederationRuntime, FederationSettings,
    InstanceIdentity, ShutdownSignal,
};
use std::sync::Arc;
use tracing::info;

/// Build the runtime from settings. Blocking: touches the filesystem and DNS.
pub fn build_runtime(settings: &FederationSettings) -> Result<FederationRuntime> {
    let config = settings.config.clone();

    let key = load_or_generate_key(&settings.key_path, DEFAULT_KEY_BITS)
        .with_context(|| format!("instance key {}", settings.key_path.display()))?;
    let id = match &settings.instance_id {
        Some(id) => id.clone(),
        None => load_or_create_instance_id(&settings.key_path).context("instance id")?,
    };

    let resolver = Arc::new(SystemResolver::from_system_conf().context("system DNS configuration")?);
    let (domain, source) =
        resolve_instance_domain(config.instance_domain.as_deref(), &SystemLocalNetwork, resolver.as_ref())
            .context("instance domain")?;
    let identity = InstanceIdentity::new(id, domain, source, key, settings.profile.clone());

    let store = Arc::new(RetryingStore::new(
        MemoryInstanceStore::new(),
        config.store_retry_attempts,
        config.store_retry_backoff,
    ));

    let shutdown = ShutdownSignal::new();
    let transport = Arc::new(RemoteInstanceClient::new(
        DomainGuard::new(resolver.clone()),
        HttpSettings {
            open_timeout: config.open_timeout,
            read_timeout: config.read_timeout,
            max_redirects: config.max_redirects,
        },
        shutdown.clone(),
    ));

    info!(
        seeds = config.seed_domains.len(),
        pool_size = config.pool.size,
        queue_depth = config.pool.max_queue_depth,
        "federation configured"
    );

    let ctx = FederationContext::new(config, identity, store, transport, resolver, Arc::new(SystemTimeSource))
        .with_shutdown(shutdown);
    FederationRuntime::new(ctx).context("worker pool configuration")
}
