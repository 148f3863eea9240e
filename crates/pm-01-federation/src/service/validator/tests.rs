//! Tests for RecordValidator

use super::*;
use crate::adapters::MemoryInstanceStore;
use crate::domain::{FederationConfig, Timestamp};
use crate::service::context::FederationContext;
use crate::test_utils::{
    test_context, test_identity, ControllableTimeSource, FakePeer, MockTransport, StaticResolver, TEST_NOW,
};
use serde_json::json;

struct Fixture {
    transport: Arc<MockTransport>,
    validator: RecordValidator,
    now: Timestamp,
}

fn fixture() -> Fixture {
    fixture_with(StaticResolver::public())
}

fn fixture_with(resolver: StaticResolver) -> Fixture {
    let transport = Arc::new(MockTransport::new());
    let time = ControllableTimeSource::new(TEST_NOW);
    let ctx = FederationContext::new(
        FederationConfig::for_testing(),
        test_identity("home.example"),
        Arc::new(MemoryInstanceStore::new()),
        transport.clone(),
        Arc::new(resolver),
        Arc::new(time),
    );
    Fixture {
        transport,
        validator: RecordValidator::new(Arc::new(ctx)),
        now: Timestamp::new(TEST_NOW),
    }
}

#[test]
fn test_live_signed_peer_is_accepted() {
    let f = fixture();
    let peer = FakePeer::new("peer.example");
    peer.serve_nodes(&f.transport, 12, f.now);

    let validated = f.validator.validate(&peer.record(f.now).to_json()).unwrap();
    assert_eq!(validated.domain.as_str(), "peer.example");
    assert_eq!(validated.fresh_nodes, 12);
    assert_eq!(validated.record.nodes_count, Some(12));
}

#[test]
fn test_windowed_query_is_tried_first() {
    let f = fixture();
    let peer = FakePeer::new("peer.example");
    peer.serve_nodes(&f.transport, 12, f.now);

    f.validator.validate(&peer.record(f.now).to_json()).unwrap();

    let since = f.now.sub_secs(FederationConfig::for_testing().max_node_age.as_secs());
    let windowed = format!("/api/nodes?since={}&limit=1000", since.as_secs());
    assert_eq!(f.transport.get_count("peer.example", &windowed), 1);
    assert_eq!(f.transport.get_count("peer.example", "/api/nodes"), 0);
}

#[test]
fn test_windowed_query_falls_back_to_plain_listing() {
    let f = fixture();
    let peer = FakePeer::new("peer.example");
    // Old peers answer the windowed query with an error object.
    let since = f.now.sub_secs(FederationConfig::for_testing().max_node_age.as_secs());
    let windowed = format!("/api/nodes?since={}&limit=1000", since.as_secs());
    f.transport.route("peer.example", &windowed, json!({"error": "unsupported"}));
    peer.serve_nodes(&f.transport, 11, f.now);

    let validated = f.validator.validate(&peer.record(f.now).to_json()).unwrap();
    assert_eq!(validated.fresh_nodes, 11);
    assert_eq!(f.transport.get_count("peer.example", "/api/nodes"), 1);
}

#[test]
fn test_insufficient_nodes_are_rejected() {
    let f = fixture();
    let peer = FakePeer::new("small.example");
    peer.serve_nodes(&f.transport, 3, f.now);

    assert_eq!(
        f.validator.validate(&peer.record(f.now).to_json()).unwrap_err(),
        FederationError::StaleOrInsufficientNodes { fresh: 3, required: 10 }
    );
}

#[test]
fn test_stale_nodes_do_not_count() {
    let f = fixture();
    let peer = FakePeer::new("old-nodes.example");
    peer.serve_nodes(&f.transport, 50, f.now.sub_secs(3 * 86_400));

    assert!(matches!(
        f.validator.validate(&peer.record(f.now).to_json()),
        Err(FederationError::StaleOrInsufficientNodes { fresh: 0, .. })
    ));
}

#[test]
fn test_private_peer_is_rejected_before_any_fetch() {
    let f = fixture();
    let peer = FakePeer::new("hidden.example").private();
    peer.serve_nodes(&f.transport, 12, f.now);

    assert!(matches!(
        f.validator.validate(&peer.record(f.now).to_json()),
        Err(FederationError::PrivateInstance(_))
    ));
    assert_eq!(f.transport.gets_to("hidden.example"), 0);
}

#[test]
fn test_tampered_record_fails_signature() {
    let f = fixture();
    let peer = FakePeer::new("peer.example");
    peer.serve_nodes(&f.transport, 12, f.now);

    let mut wire = peer.record(f.now).to_json();
    wire["name"] = json!("Someone Else");

    assert_eq!(
        f.validator.validate(&wire).unwrap_err(),
        FederationError::SignatureInvalid("peer.example".into())
    );
}

#[test]
fn test_missing_signature_is_missing_field() {
    let f = fixture();
    let mut record = FakePeer::new("peer.example").record(f.now);
    record.signature = None;

    assert_eq!(
        f.validator.validate(&record.to_json()).unwrap_err(),
        FederationError::MissingField("signature")
    );
}

#[test]
fn test_old_and_future_records_are_stale() {
    let f = fixture();
    let peer = FakePeer::new("peer.example");
    peer.serve_nodes(&f.transport, 12, f.now);

    let old = peer.record(f.now.sub_secs(8 * 86_400));
    assert!(matches!(f.validator.validate(&old.to_json()), Err(FederationError::StaleRecord(_))));

    let future = peer.record(f.now.add_secs(3_600));
    assert!(matches!(f.validator.validate(&future.to_json()), Err(FederationError::StaleRecord(_))));
}

#[test]
fn test_own_record_is_rejected() {
    let f = fixture();
    let me = FakePeer::new("home.example");
    assert_eq!(
        f.validator.validate(&me.record(f.now).to_json()).unwrap_err(),
        FederationError::SelfRecord
    );
}

#[test]
fn test_invalid_domain_is_rejected() {
    let f = fixture();
    let mut record = FakePeer::new("peer.example").record(f.now);
    record.domain = "http://peer.example/".into();

    assert!(matches!(
        f.validator.validate(&record.to_json()),
        Err(FederationError::InvalidDomain(_))
    ));
}

#[test]
fn test_restricted_domain_is_rejected_without_fetch() {
    let f = fixture_with(
        StaticResolver::public().with_host("internal.example", vec!["10.0.0.7".parse().unwrap()]),
    );
    let peer = FakePeer::new("internal.example");
    peer.serve_nodes(&f.transport, 12, f.now);

    assert_eq!(
        f.validator.validate(&peer.record(f.now).to_json()).unwrap_err(),
        FederationError::RestrictedAddress("internal.example".into())
    );
    assert_eq!(f.transport.gets_to("internal.example"), 0);
}

#[test]
fn test_unreachable_peer_is_fetch_failure() {
    let f = fixture();
    let peer = FakePeer::new("down.example");

    assert!(matches!(
        f.validator.validate(&peer.record(f.now).to_json()),
        Err(FederationError::FetchFailed { .. })
    ));
}

#[test]
fn test_context_helper_builds_equivalent_validator() {
    let transport = Arc::new(MockTransport::new());
    let ctx = test_context(
        FederationConfig::for_testing(),
        test_identity("home.example"),
        Arc::new(MemoryInstanceStore::new()),
        transport.clone(),
        ControllableTimeSource::new(TEST_NOW),
    );
    let validator = RecordValidator::new(Arc::new(ctx));
    let peer = FakePeer::new("peer.example");
    peer.serve_nodes(&transport, 10, Timestamp::new(TEST_NOW));

    assert!(validator.validate(&peer.record(Timestamp::new(TEST_NOW)).to_json()).is_ok());
}
