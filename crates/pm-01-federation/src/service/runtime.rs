//! Background loops and their lifecycle handle.
//!
//! `FederationRuntime::start` spawns the initial announcement, the periodic
//! announcer and the periodic crawler, and returns a [`FederationHandle`]
//! that owns them. Nothing is stored in ambient global state.

use crate::domain::sanitize_domain;
use crate::service::announcer::FederationAnnouncer;
use crate::service::context::FederationContext;
use crate::service::crawler::{CrawlEnqueue, FederationCrawler};
use crate::service::inbound::InboundHandler;
use pm_worker_pool::{PoolError, PoolStats, WorkerPool};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Wires the pool, announcer, crawler and inbound handler around one context.
pub struct FederationRuntime {
    ctx: Arc<FederationContext>,
    pool: Arc<WorkerPool>,
    announcer: Arc<FederationAnnouncer>,
    crawler: FederationCrawler,
    inbound: InboundHandler,
}

impl FederationRuntime {
    /// Build the pool and services. Fails only on an invalid pool config.
    pub fn new(ctx: FederationContext) -> Result<Self, PoolError> {
        let ctx = Arc::new(ctx);
        let pool = Arc::new(WorkerPool::new("federation", ctx.config.pool.clone())?);
        let crawler = FederationCrawler::new(ctx.clone(), pool.clone());
        Ok(Self {
            announcer: Arc::new(FederationAnnouncer::new(ctx.clone(), pool.clone())),
            inbound: InboundHandler::new(ctx.clone(), crawler.clone()),
            crawler,
            pool,
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<FederationContext> {
        &self.ctx
    }

    pub fn announcer(&self) -> &FederationAnnouncer {
        &self.announcer
    }

    pub fn crawler(&self) -> &FederationCrawler {
        &self.crawler
    }

    pub fn inbound(&self) -> &InboundHandler {
        &self.inbound
    }

    /// Spawn the loops. With federation off (disabled or private) no loop
    /// is spawned but the handle still serves inbound requests.
    pub fn start(self) -> std::io::Result<FederationHandle> {
        let mut threads = Vec::new();

        if self.ctx.federates() {
            let config = &self.ctx.config;

            let announcer = self.announcer.clone();
            let shutdown = self.ctx.shutdown.clone();
            let initial_delay = config.announce_initial_delay;
            threads.push(spawn_loop("federation-initial", move || {
                if shutdown.sleep(initial_delay) {
                    announcer.announce_once();
                }
            })?);

            let announcer = self.announcer.clone();
            let shutdown = self.ctx.shutdown.clone();
            let interval = config.announce_interval;
            threads.push(spawn_loop("federation-announce", move || {
                while shutdown.sleep(interval) {
                    announcer.announce_once();
                }
            })?);

            let crawler = self.crawler.clone();
            let ctx = self.ctx.clone();
            threads.push(spawn_loop("federation-crawl", move || {
                if !ctx.shutdown.sleep(ctx.config.announce_initial_delay) {
                    return;
                }
                loop {
                    crawl_known_domains(&ctx, &crawler);
                    if !ctx.shutdown.sleep(ctx.config.crawl_interval) {
                        break;
                    }
                }
            })?);

            info!(
                domain = %self.ctx.identity.domain(),
                announce_every = ?config.announce_interval,
                crawl_every = ?config.crawl_interval,
                "federation started"
            );
        } else {
            info!(
                enabled = self.ctx.config.enabled,
                private = self.ctx.identity.is_private(),
                "federation loops not started"
            );
        }

        Ok(FederationHandle {
            ctx: self.ctx,
            pool: self.pool,
            inbound: self.inbound,
            crawler: self.crawler,
            threads,
        })
    }
}

fn spawn_loop<F>(name: &str, body: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(body)
}

/// Queue crawls for seeds and recently updated peers.
fn crawl_known_domains(ctx: &FederationContext, crawler: &FederationCrawler) {
    let since = ctx.now().sub_secs(ctx.config.recent_window.as_secs());
    let known = ctx.store.updated_since(since).unwrap_or_else(|err| {
        warn!(reason = %err, "could not load known instances, crawling seeds only");
        Vec::new()
    });

    let mut seen = HashSet::new();
    let domains = ctx
        .config
        .seed_domains
        .iter()
        .cloned()
        .chain(known.into_iter().map(|record| record.domain));

    let mut scheduled = 0usize;
    for raw in domains {
        let Ok(domain) = sanitize_domain(&raw) else {
            continue;
        };
        if !seen.insert(domain.as_str().to_string()) {
            continue;
        }
        match crawler.enqueue_crawl(domain.as_str()) {
            CrawlEnqueue::Scheduled(_) => scheduled += 1,
            other => debug!(%domain, outcome = ?other, "crawl not queued"),
        }
    }
    debug!(scheduled, "crawl round queued");
}

/// Owns the running loops and the pool. Consumed by [`FederationHandle::shutdown`].
pub struct FederationHandle {
    ctx: Arc<FederationContext>,
    pool: Arc<WorkerPool>,
    inbound: InboundHandler,
    crawler: FederationCrawler,
    threads: Vec<JoinHandle<()>>,
}

impl FederationHandle {
    pub fn inbound(&self) -> &InboundHandler {
        &self.inbound
    }

    pub fn crawler(&self) -> &FederationCrawler {
        &self.crawler
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn loop_count(&self) -> usize {
        self.threads.len()
    }

    /// Raise the shutdown flag, join loops until `timeout`, then shut the
    /// pool down with whatever time is left. Loops still running at the
    /// deadline are detached.
    pub fn shutdown(self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        self.ctx.shutdown.raise();

        let mut remaining = self.threads;
        while !remaining.is_empty() && Instant::now() < deadline {
            let (finished, running): (Vec<_>, Vec<_>) =
                remaining.into_iter().partition(|handle| handle.is_finished());
            for handle in finished {
                let name = handle.thread().name().unwrap_or("federation").to_string();
                if handle.join().is_err() {
                    warn!(thread = %name, "federation loop panicked");
                }
            }
            remaining = running;
            if !remaining.is_empty() {
                thread::sleep(JOIN_POLL);
            }
        }
        for handle in &remaining {
            warn!(
                thread = handle.thread().name().unwrap_or("federation"),
                "federation loop did not stop in time, detaching"
            );
        }

        self.pool
            .shutdown(deadline.saturating_duration_since(Instant::now()));
        info!("federation stopped");
    }
}
