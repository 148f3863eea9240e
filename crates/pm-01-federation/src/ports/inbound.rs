//! # Driving Ports (Inbound API)
//!
//! What the federation core offers the web layer that serves
//! `/api/instances` to peers.

use crate::domain::InstanceRecord;
use serde::Serialize;
use serde_json::Value;

/// Outcome of an inbound `POST /api/instances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncementResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Short rejection code, e.g. `invalid_signature`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AnnouncementResponse {
    pub fn accepted(domain: impl Into<String>) -> Self {
        Self {
            accepted: true,
            domain: Some(domain.into()),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            domain: None,
            reason: Some(reason.into()),
        }
    }

    /// HTTP status the web layer should answer with.
    pub fn status_code(&self) -> u16 {
        match (self.accepted, self.reason.as_deref()) {
            (true, _) => 201,
            (false, Some("disabled")) => 404,
            (false, Some("insufficient_nodes" | "fetch_failed")) => 422,
            (false, _) => 400,
        }
    }
}

/// Federation API consumed by the web layer.
pub trait FederationApi: Send + Sync {
    /// Validate and persist a peer's self-announcement.
    fn handle_announcement(&self, body: &Value) -> AnnouncementResponse;

    /// Records served at `GET /api/instances`.
    fn public_instances(&self) -> Vec<InstanceRecord>;
}
