//! # Federation Flows
//!
//! Two instances, `alpha.example` and `beta.example`, each with its own
//! store, pool and transport. Alpha's transport delivers posts to beta's
//! inbound handler, so an announcement travels the same path a real
//! `POST /api/instances` would.
//!
//! ## Flows Tested:
//!
//! 1. **Announce → validate → persist → crawl**
//! 2. **Recursive discovery** across a chain of peers
//! 3. **Domain wins over id** when a peer re-keys its row
//! 4. **Crawl cooldown** between repeated announcements

#[cfg(test)]
mod tests {
    use pm_01_federation::test_utils::{
        test_context, test_identity, ControllableTimeSource, FakePeer, MockTransport, TEST_NOW,
    };
    use pm_01_federation::{
        DomainName, FederationApi, FederationConfig, FederationRuntime, FetchError, InstanceStore,
        MemoryInstanceStore, Timestamp,
    };
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Instance {
        runtime: FederationRuntime,
        store: Arc<MemoryInstanceStore>,
        transport: Arc<MockTransport>,
        time: ControllableTimeSource,
    }

    fn instance(domain: &str, config: FederationConfig) -> Instance {
        let store = Arc::new(MemoryInstanceStore::new());
        let transport = Arc::new(MockTransport::new());
        let time = ControllableTimeSource::new(TEST_NOW);
        let ctx = test_context(config, test_identity(domain), store.clone(), transport.clone(), time.clone());
        Instance {
            runtime: FederationRuntime::new(ctx).unwrap(),
            store,
            transport,
            time,
        }
    }

    fn now() -> Timestamp {
        Timestamp::new(TEST_NOW)
    }

    /// Alpha seeds on beta; beta's transport sees alpha as a live peer that
    /// lists a private instance and an under-populated one.
    fn alpha_and_beta() -> (Instance, Instance) {
        let alpha = instance(
            "alpha.example",
            FederationConfig {
                seed_domains: vec!["beta.example".into()],
                ..FederationConfig::for_testing()
            },
        );
        let beta = instance("beta.example", FederationConfig::for_testing());

        let charlie = FakePeer::new("charlie.example").private();
        let delta = FakePeer::new("delta.example");
        charlie.serve_nodes(&beta.transport, 12, now());
        delta.serve_nodes(&beta.transport, 3, now());

        let alpha_peer = FakePeer::new("alpha.example");
        alpha_peer.serve_nodes(&beta.transport, 12, now());
        alpha_peer.serve_instances(
            &beta.transport,
            vec![charlie.record(now()).to_json(), delta.record(now()).to_json()],
        );

        let inbound = beta.runtime.inbound().clone();
        alpha.transport.on_post("beta.example", move |domain, body| {
            let response = inbound.handle_announcement(body);
            if response.accepted {
                Ok(())
            } else {
                Err(FetchError::Failed {
                    uri: format!("https://{domain}/api/instances"),
                    reason: response.reason.unwrap_or_default(),
                })
            }
        });

        (alpha, beta)
    }

    fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn wait_for_crawl(instance: &Instance, domain: &str, count: usize) {
        wait_for("crawl to start", || {
            instance.transport.get_count(domain, "/api/instances") >= count
        });
        let state = instance.runtime.crawler().state().clone();
        wait_for("crawl to finish", || !state.is_in_flight(domain));
    }

    // =============================================================================
    // FLOW 1: ANNOUNCE → VALIDATE → PERSIST → CRAWL
    // =============================================================================

    #[test]
    fn test_announcement_is_accepted_and_announcer_is_crawled() {
        let (alpha, beta) = alpha_and_beta();

        let report = alpha.runtime.announcer().announce_once();
        assert_eq!(report.targets, 1);
        assert_eq!(report.delivered, 1);
        assert!(report.self_registered);
        assert!(alpha.store.find_by_domain("alpha.example").unwrap().is_some());

        let stored = beta.store.find_by_domain("alpha.example").unwrap().unwrap();
        assert_eq!(stored.id, "id-alpha.example");
        assert_eq!(stored.nodes_count, Some(12));

        wait_for_crawl(&beta, "alpha.example", 1);
        assert!(beta.store.find_by_domain("charlie.example").unwrap().is_none());
        assert!(beta.store.find_by_domain("delta.example").unwrap().is_none());

        let listed = beta.runtime.inbound().public_instances();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].domain, "alpha.example");
    }

    #[test]
    fn test_rejected_announcement_is_reported_as_failed() {
        let (alpha, beta) = alpha_and_beta();
        // Beta no longer sees enough live nodes behind alpha.
        FakePeer::new("alpha.example").serve_nodes(&beta.transport, 2, now());

        let report = alpha.runtime.announcer().announce_once();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);
        assert!(beta.store.is_empty());
        assert_eq!(beta.transport.get_count("alpha.example", "/api/instances"), 0);
    }

    // =============================================================================
    // FLOW 2: RECURSIVE DISCOVERY
    // =============================================================================

    #[test]
    fn test_crawl_discovers_chain_of_peers() {
        let beta = instance("beta.example", FederationConfig::for_testing());
        let alpha = FakePeer::new("alpha.example");
        let echo = FakePeer::new("echo.example");
        let foxtrot = FakePeer::new("foxtrot.example");
        for peer in [&alpha, &echo, &foxtrot] {
            peer.serve_nodes(&beta.transport, 12, now());
        }
        alpha.serve_instances(
            &beta.transport,
            vec![
                alpha.record(now()).to_json(),
                echo.record(now()).to_json(),
                FakePeer::new("beta.example").record(now()).to_json(),
            ],
        );
        echo.serve_instances(&beta.transport, vec![foxtrot.record(now()).to_json()]);
        foxtrot.serve_instances(&beta.transport, vec![echo.record(now()).to_json()]);

        let report = beta
            .runtime
            .crawler()
            .crawl(&DomainName::parse("alpha.example").unwrap());

        assert_eq!(report.visited, 3);
        // alpha, echo, foxtrot, then echo again from foxtrot's list
        assert_eq!(report.accepted, 4);
        // beta's own record
        assert_eq!(report.discarded, 1);
        assert_eq!(beta.store.len(), 3);
        assert_eq!(beta.transport.get_count("echo.example", "/api/instances"), 1);
    }

    // =============================================================================
    // FLOW 3: DOMAIN WINS OVER ID
    // =============================================================================

    #[test]
    fn test_reannouncement_with_new_id_replaces_row_for_domain() {
        let (_alpha, beta) = alpha_and_beta();
        let old = FakePeer {
            id: "alpha-old-id".into(),
            ..FakePeer::new("alpha.example")
        };
        beta.store.upsert(&old.record(now())).unwrap();

        let response = beta
            .runtime
            .inbound()
            .handle_announcement(&FakePeer::new("alpha.example").record(now()).to_json());
        assert!(response.accepted);

        assert!(beta.store.find_by_id("alpha-old-id").unwrap().is_none());
        let row = beta.store.find_by_domain("alpha.example").unwrap().unwrap();
        assert_eq!(row.id, "id-alpha.example");
        assert_eq!(beta.store.len(), 1);
    }

    // =============================================================================
    // FLOW 4: CRAWL COOLDOWN
    // =============================================================================

    #[test]
    fn test_repeated_announcements_crawl_once_per_cooldown() {
        let (_alpha, beta) = alpha_and_beta();
        let body = FakePeer::new("alpha.example").record(now()).to_json();
        let inbound = beta.runtime.inbound();

        assert!(inbound.handle_announcement(&body).accepted);
        wait_for_crawl(&beta, "alpha.example", 1);

        // Inside the cooldown the announcement is still accepted, but not crawled.
        beta.time.advance(10);
        assert!(inbound.handle_announcement(&body).accepted);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(beta.transport.get_count("alpha.example", "/api/instances"), 1);

        let cooldown = beta.runtime.context().config.crawl_cooldown.as_secs();
        beta.time.advance(cooldown);
        assert!(inbound.handle_announcement(&body).accepted);
        wait_for_crawl(&beta, "alpha.example", 2);
    }
}
