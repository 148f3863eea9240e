//! Self-announcement fan-out.
//!
//! One cycle: build and sign the self record, resolve targets, fan out via
//! the pool (inline when the pool refuses), then await every scheduled task.

use crate::domain::{sanitize_domain, DomainName, FederationError};
use crate::ports::PeerTransport;
use crate::service::context::FederationContext;
use crate::service::registry::persist_instance;
use anyhow::Context;
use pm_telemetry::{log_event, log_peer_event};
use pm_worker_pool::{Task, WorkerPool};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const INSTANCES_PATH: &str = "/api/instances";

/// What happened during one announcement cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceReport {
    pub targets: usize,
    /// Handed to the pool.
    pub scheduled: usize,
    /// Announced inline because the pool refused the job.
    pub synchronous: usize,
    pub delivered: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub self_registered: bool,
    /// Federation disabled or this instance is private.
    pub skipped: bool,
}

fn announce_to_domain(transport: &dyn PeerTransport, domain: &DomainName, body: &Value) -> anyhow::Result<()> {
    transport
        .post_json(domain, INSTANCES_PATH, body)
        .with_context(|| format!("announcing to {domain}"))
}

pub struct FederationAnnouncer {
    ctx: Arc<FederationContext>,
    pool: Arc<WorkerPool>,
}

impl FederationAnnouncer {
    pub fn new(ctx: Arc<FederationContext>, pool: Arc<WorkerPool>) -> Self {
        Self { ctx, pool }
    }

    /// Seeds, then domains of records updated within the rolling window.
    /// Self excluded, duplicates dropped, first occurrence wins.
    pub fn resolve_targets(&self) -> Vec<DomainName> {
        let ctx = &self.ctx;
        let since = ctx.now().sub_secs(ctx.config.recent_window.as_secs());
        let known = match ctx.store.updated_since(since) {
            Ok(records) => records,
            Err(err) => {
                warn!(reason = %err, "could not load known instances, using seeds only");
                Vec::new()
            }
        };

        let candidates = ctx.config.seed_domains.iter().map(String::as_str).chain(
            known
                .iter()
                .filter(|record| !record.is_private())
                .map(|record| record.domain.as_str()),
        );

        let self_domain = ctx.identity.domain();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for raw in candidates {
            let domain = match sanitize_domain(raw) {
                Ok(domain) => domain,
                Err(err) => {
                    debug!(domain = raw, reason = %err, "skipping invalid announce target");
                    continue;
                }
            };
            if domain == *self_domain || !seen.insert(domain.as_str().to_string()) {
                continue;
            }
            targets.push(domain);
        }
        targets
    }

    /// Run one full announcement cycle.
    pub fn announce_once(&self) -> AnnounceReport {
        let ctx = &self.ctx;
        let mut report = AnnounceReport::default();
        if !ctx.federates() {
            debug!(
                enabled = ctx.config.enabled,
                private = ctx.identity.is_private(),
                "announcement skipped"
            );
            report.skipped = true;
            return report;
        }

        let record = ctx.identity.signed_record(ctx.now(), ctx.local_node_count());
        if ctx.identity.may_self_register(&ctx.guard) {
            match persist_instance(ctx.store.as_ref(), &record) {
                Ok(()) => report.self_registered = true,
                Err(err) => log_event!(error, "announcer", "failed to persist self record", reason = %err),
            }
        }

        let targets = self.resolve_targets();
        report.targets = targets.len();
        let body = Arc::new(record.to_json());

        let pending = self.fan_out(&targets, &body, &mut report);
        self.await_results(pending, &mut report);

        log_event!(
            info,
            "announcer",
            "announcement cycle finished",
            targets = report.targets,
            delivered = report.delivered,
            failed = report.failed,
            timed_out = report.timed_out,
            synchronous = report.synchronous
        );
        report
    }

    fn fan_out(
        &self,
        targets: &[DomainName],
        body: &Arc<Value>,
        report: &mut AnnounceReport,
    ) -> Vec<(DomainName, Task<()>)> {
        let mut pending = Vec::with_capacity(targets.len());
        let mut pool_gone = false;

        for domain in targets {
            if self.ctx.shutdown.is_raised() {
                debug!("shutdown raised, ending fan-out");
                break;
            }

            if !pool_gone {
                let transport = self.ctx.transport.clone();
                let job_body = body.clone();
                let job_domain = domain.clone();
                let scheduled = self
                    .pool
                    .schedule(move || announce_to_domain(transport.as_ref(), &job_domain, &job_body));
                match scheduled.map_err(FederationError::from) {
                    Ok(task) => {
                        report.scheduled += 1;
                        pending.push((domain.clone(), task));
                        continue;
                    }
                    Err(FederationError::QueueFull) => {
                        debug!(%domain, "pool saturated, announcing inline");
                    }
                    Err(err) => {
                        debug!(%domain, reason = err.reason(), "pool unavailable, announcing inline for rest of cycle");
                        pool_gone = true;
                    }
                }
            }

            report.synchronous += 1;
            match announce_to_domain(self.ctx.transport.as_ref(), domain, body) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    debug!(%domain, reason = %format!("{err:#}"), "announcement failed");
                    report.failed += 1;
                }
            }
        }
        pending
    }

    fn await_results(&self, pending: Vec<(DomainName, Task<()>)>, report: &mut AnnounceReport) {
        let timeout = self.pool.task_timeout();
        for (domain, task) in pending {
            match task.wait(Some(timeout)).map_err(FederationError::from) {
                Ok(()) => report.delivered += 1,
                Err(FederationError::TaskTimeout) => {
                    log_peer_event!(warn, "announcer", "announcement still running, no longer awaited", domain, ?timeout);
                    report.timed_out += 1;
                }
                Err(err) => {
                    debug!(%domain, reason = err.reason(), detail = %err, "announcement failed");
                    report.failed += 1;
                }
            }
        }
    }
}
