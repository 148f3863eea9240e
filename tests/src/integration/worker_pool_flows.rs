//! # Worker Pool Flows
//!
//! The federation services under a saturated or stopped pool.
//!
//! 1. **Saturation**: announcements the pool refuses run inline, none are lost
//! 2. **Shutdown**: crawls are skipped, never run inline, claims are released

#[cfg(test)]
mod tests {
    use pm_01_federation::test_utils::{
        test_context, test_identity, ControllableTimeSource, MockTransport, TEST_NOW,
    };
    use pm_01_federation::{
        CrawlEnqueue, FederationConfig, FederationRuntime, MemoryInstanceStore, SkipReason,
    };
    use pm_worker_pool::PoolConfig;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn runtime(config: FederationConfig) -> (FederationRuntime, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let ctx = test_context(
            config,
            test_identity("home.example"),
            Arc::new(MemoryInstanceStore::new()),
            transport.clone(),
            ControllableTimeSource::new(TEST_NOW),
        );
        (FederationRuntime::new(ctx).unwrap(), transport)
    }

    #[test]
    fn test_saturated_pool_still_delivers_every_announcement() {
        let seeds: Vec<String> = (1..=5).map(|i| format!("seed{i}.example")).collect();
        let config = FederationConfig {
            seed_domains: seeds.clone(),
            pool: PoolConfig::new(1, 1, Duration::from_secs(5)),
            ..FederationConfig::for_testing()
        };
        let (runtime, transport) = runtime(config);
        // Keeps the only worker busy while the rest of the fan-out happens.
        transport.on_post("seed1.example", |_, _| {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        });

        let report = runtime.announcer().announce_once();

        assert_eq!(report.targets, 5);
        assert_eq!(report.delivered, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(report.scheduled + report.synchronous, 5);
        assert!(report.synchronous >= 3, "pool accepted more than it can hold: {report:?}");
        for seed in &seeds {
            assert_eq!(transport.posts_to(seed), 1);
        }
    }

    #[test]
    fn test_stopped_pool_skips_crawls_without_leaking_claims() {
        let (runtime, transport) = runtime(FederationConfig::for_testing());
        let crawler = runtime.crawler().clone();
        let handle = runtime.start().unwrap();
        handle.shutdown(Duration::from_secs(2));

        let outcome = crawler.enqueue_crawl("peer.example");
        assert_eq!(outcome.skip_reason(), Some(SkipReason::PoolShutdown));
        assert!(!matches!(outcome, CrawlEnqueue::Scheduled(_)));
        assert!(!crawler.state().is_in_flight("peer.example"));
        assert_eq!(crawler.state().last_completed_at("peer.example"), None);
        assert_eq!(transport.gets_to("peer.example"), 0);
    }
}
