//! Recursive peer discovery over `/api/instances`.
//!
//! Each top-level crawl runs as one pool task and walks depth-first with its
//! own [`CrawlSession`]. Overlap between top-level crawls is prevented by the
//! shared [`CrawlState`]: a domain is claimed before scheduling and released
//! when the task ends.

use crate::domain::{
    sanitize_domain, ClaimOutcome, CrawlSession, CrawlState, DomainError, DomainName, FederationError,
    SkipReason,
};
use crate::service::context::FederationContext;
use crate::service::registry::persist_instance;
use crate::service::validator::RecordValidator;
use pm_telemetry::{log_event, log_peer_event};
use pm_worker_pool::{Task, WorkerPool};
use std::sync::Arc;
use tracing::debug;

const INSTANCES_PATH: &str = "/api/instances";

/// Counters for one top-level crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub visited: usize,
    pub accepted: usize,
    pub discarded: usize,
    pub failed_fetches: usize,
}

/// Outcome of [`FederationCrawler::enqueue_crawl`].
pub enum CrawlEnqueue {
    Scheduled(Task<CrawlReport>),
    Skipped(SkipReason),
    Rejected(DomainError),
}

impl CrawlEnqueue {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, CrawlEnqueue::Scheduled(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            CrawlEnqueue::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn into_task(self) -> Option<Task<CrawlReport>> {
        match self {
            CrawlEnqueue::Scheduled(task) => Some(task),
            _ => None,
        }
    }
}

impl std::fmt::Debug for CrawlEnqueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlEnqueue::Scheduled(task) => f.debug_tuple("Scheduled").field(&task.id()).finish(),
            CrawlEnqueue::Skipped(reason) => f.debug_tuple("Skipped").field(reason).finish(),
            CrawlEnqueue::Rejected(err) => f.debug_tuple("Rejected").field(err).finish(),
        }
    }
}

/// Releases an in-flight claim when dropped.
///
/// Moved into the scheduled job. A job that started records completion even
/// if the crawl panicked; a job that never ran (schedule failed or the pool
/// abandoned it) releases the claim without starting a cooldown.
struct ClaimGuard {
    state: Arc<CrawlState>,
    ctx: Arc<FederationContext>,
    domain: String,
    started: bool,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let completed_at = self.started.then(|| self.ctx.now());
        self.state.release(&self.domain, completed_at);
    }
}

#[derive(Clone)]
pub struct FederationCrawler {
    ctx: Arc<FederationContext>,
    validator: RecordValidator,
    pool: Arc<WorkerPool>,
    state: Arc<CrawlState>,
}

impl FederationCrawler {
    pub fn new(ctx: Arc<FederationContext>, pool: Arc<WorkerPool>) -> Self {
        let state = Arc::new(CrawlState::new(ctx.config.crawl_cooldown));
        Self {
            validator: RecordValidator::new(ctx.clone()),
            ctx,
            pool,
            state,
        }
    }

    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    /// Claim `domain` and schedule a crawl of it.
    ///
    /// Crawling is best-effort: when the pool cannot take the job the claim is
    /// dropped and the skip is logged, nothing runs inline.
    pub fn enqueue_crawl(&self, domain: &str) -> CrawlEnqueue {
        let domain = match sanitize_domain(domain) {
            Ok(domain) => domain,
            Err(err) => {
                debug!(domain, reason = %err, "rejecting crawl of invalid domain");
                return CrawlEnqueue::Rejected(err);
            }
        };
        if !self.ctx.federates() {
            return CrawlEnqueue::Skipped(SkipReason::Disabled);
        }
        if domain == *self.ctx.identity.domain() {
            debug!(%domain, "not crawling self");
            return CrawlEnqueue::Skipped(SkipReason::Disabled);
        }

        match self.state.try_claim(domain.as_str(), self.ctx.now()) {
            ClaimOutcome::Skipped(reason) => {
                debug!(%domain, reason = reason.as_str(), "crawl skipped");
                return CrawlEnqueue::Skipped(reason);
            }
            ClaimOutcome::Claimed => {}
        }

        let claim = ClaimGuard {
            state: self.state.clone(),
            ctx: self.ctx.clone(),
            domain: domain.as_str().to_string(),
            started: false,
        };
        let crawler = self.clone();
        let target = domain.clone();
        let scheduled = self.pool.schedule(move || {
            let mut claim = claim;
            claim.started = true;
            let report = crawler.crawl(&target);
            drop(claim);
            Ok(report)
        });

        match scheduled.map_err(FederationError::from) {
            Ok(task) => CrawlEnqueue::Scheduled(task),
            Err(err) => {
                let reason = match err {
                    FederationError::QueueFull => SkipReason::QueueFull,
                    _ => SkipReason::PoolShutdown,
                };
                debug!(%domain, reason = reason.as_str(), detail = %err, "crawl not scheduled");
                CrawlEnqueue::Skipped(reason)
            }
        }
    }

    /// Run one top-level crawl of `domain` on the calling thread.
    pub fn crawl(&self, domain: &DomainName) -> CrawlReport {
        let config = &self.ctx.config;
        let mut session = CrawlSession::new(config.per_response_limit, config.overall_crawl_limit);
        let mut report = CrawlReport::default();
        self.crawl_domain(domain, &mut session, &mut report);
        report.visited = session.visited_count();
        log_peer_event!(
            info,
            "crawler",
            "crawl finished",
            domain,
            visited = report.visited,
            accepted = report.accepted,
            discarded = report.discarded,
            failed = report.failed_fetches
        );
        report
    }

    fn crawl_domain(&self, domain: &DomainName, session: &mut CrawlSession, report: &mut CrawlReport) {
        if self.ctx.shutdown.is_raised() || !session.visit(domain.as_str()) {
            return;
        }

        let body = match self.ctx.transport.get_json(domain, INSTANCES_PATH) {
            Ok(body) => body,
            Err(err) => {
                log_peer_event!(warn, "crawler", "instance list fetch failed", domain, reason = %err);
                report.failed_fetches += 1;
                return;
            }
        };
        let Some(entries) = body.as_array() else {
            debug!(%domain, "instance list is not an array");
            return;
        };

        for entry in entries.iter().take(session.per_response_limit()) {
            if self.ctx.shutdown.is_raised() {
                return;
            }
            let validated = match self.validator.validate(entry) {
                Ok(validated) => validated,
                Err(err) => {
                    debug!(source = %domain, reason = err.reason(), detail = %err, "discarding instance entry");
                    report.discarded += 1;
                    continue;
                }
            };

            if let Err(err) = persist_instance(self.ctx.store.as_ref(), &validated.record) {
                log_peer_event!(error, "crawler", "failed to persist instance", validated.domain, reason = %err);
                continue;
            }
            log_event!(
                info,
                "crawler",
                "accepted federated instance",
                domain = %validated.domain,
                nodes = validated.fresh_nodes,
                source = %domain
            );
            report.accepted += 1;

            if session.has_visited(validated.domain.as_str()) {
                continue;
            }
            self.crawl_domain(&validated.domain, session, report);
        }
    }
}
