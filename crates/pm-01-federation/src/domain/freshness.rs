//! Liveness check over a peer's `/api/nodes` response.

use crate::domain::errors::FederationError;
use crate::domain::value_objects::Timestamp;
use serde_json::Value;
use std::time::Duration;

/// Largest clock skew tolerated on a remote `lastUpdateTime`.
pub const MAX_FUTURE_SKEW: Duration = Duration::from_secs(10 * 60);

/// `last_heard` of a node entry. Accepts both spellings and numeric strings.
fn last_heard(node: &Value) -> Option<u64> {
    let raw = node.get("last_heard").or_else(|| node.get("lastHeard"))?;
    match raw {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64),
        _ => None,
    }
}

/// Nodes heard within `max_age` of `now`.
pub fn count_fresh_nodes(nodes: &[Value], now: Timestamp, max_age: Duration) -> usize {
    let cutoff = now.sub_secs(max_age.as_secs());
    nodes
        .iter()
        .filter_map(last_heard)
        .filter(|heard| Timestamp::new(*heard) >= cutoff)
        .count()
}

/// Require at least `min_nodes` fresh nodes in a `/api/nodes` body.
///
/// Returns the fresh count, which becomes the record's `nodesCount`.
pub fn check_freshness(
    body: &Value,
    now: Timestamp,
    max_age: Duration,
    min_nodes: usize,
) -> Result<usize, FederationError> {
    let nodes = body
        .as_array()
        .ok_or_else(|| FederationError::MalformedRecord("node list is not an array".into()))?;
    let fresh = count_fresh_nodes(nodes, now, max_age);
    if fresh < min_nodes {
        return Err(FederationError::StaleOrInsufficientNodes {
            fresh,
            required: min_nodes,
        });
    }
    Ok(fresh)
}

/// Whether a remote record's `lastUpdateTime` falls inside the accepted band:
/// not older than `window`, not further ahead than [`MAX_FUTURE_SKEW`].
pub fn record_is_current(updated_at: Timestamp, now: Timestamp, window: Duration) -> bool {
    updated_at >= now.sub_secs(window.as_secs()) && updated_at <= now.add_secs(MAX_FUTURE_SKEW.as_secs())
}
