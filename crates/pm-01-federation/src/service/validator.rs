//! Validation pipeline shared by the crawler and inbound announcements.
//!
//! parse → required fields → domain syntax → not self → not private →
//! record age → signature → address guard → peer liveness

use crate::domain::{
    check_freshness, record_is_current, sanitize_domain, verify_record, DomainName, FederationError,
    InstanceRecord,
};
use crate::service::context::FederationContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const NODES_PATH: &str = "/api/nodes";

/// A remote record that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    pub record: InstanceRecord,
    pub domain: DomainName,
    pub fresh_nodes: usize,
}

#[derive(Clone)]
pub struct RecordValidator {
    ctx: Arc<FederationContext>,
}

impl RecordValidator {
    pub fn new(ctx: Arc<FederationContext>) -> Self {
        Self { ctx }
    }

    pub fn validate(&self, entry: &Value) -> Result<ValidatedRecord, FederationError> {
        let mut record = InstanceRecord::from_json(entry)?;
        record.check_required_fields()?;
        let domain = sanitize_domain(&record.domain)?;

        let identity = &self.ctx.identity;
        if domain == *identity.domain() || record.id == identity.id() {
            return Err(FederationError::SelfRecord);
        }
        if record.is_private() {
            return Err(FederationError::PrivateInstance(domain.to_string()));
        }

        let now = self.ctx.now();
        let current = record
            .updated_at()
            .is_some_and(|at| record_is_current(at, now, self.ctx.config.recent_window));
        if !current {
            return Err(FederationError::StaleRecord(domain.to_string()));
        }

        if !verify_record(&record) {
            return Err(FederationError::SignatureInvalid(domain.to_string()));
        }

        self.ctx.guard.check_domain(&domain)?;

        let fresh_nodes = self.check_liveness(&domain)?;
        record.nodes_count = Some(fresh_nodes as u64);

        Ok(ValidatedRecord {
            record,
            domain,
            fresh_nodes,
        })
    }

    /// Count the peer's recently heard nodes.
    ///
    /// Uses the windowed query first and the plain listing when the peer
    /// rejects it or answers with something other than a list.
    pub fn check_liveness(&self, domain: &DomainName) -> Result<usize, FederationError> {
        let config = &self.ctx.config;
        let now = self.ctx.now();
        let since = now.sub_secs(config.max_node_age.as_secs());
        let windowed = format!("{NODES_PATH}?since={}&limit={}", since.as_secs(), config.node_query_limit);

        let transport = &self.ctx.transport;
        let body = match transport.get_json(domain, &windowed) {
            Ok(body) if body.is_array() => body,
            Ok(_) => {
                debug!(%domain, "windowed node query returned no list, retrying plain listing");
                transport.get_json(domain, NODES_PATH)?
            }
            Err(err) => {
                debug!(%domain, reason = %err, "windowed node query failed, retrying plain listing");
                transport.get_json(domain, NODES_PATH)?
            }
        };

        check_freshness(&body, now, config.max_node_age, config.min_peer_nodes)
    }
}

#[cfg(test)]
mod tests;
