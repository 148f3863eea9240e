//! Instance records as stored locally and exchanged on the wire.
//!
//! The same struct is the row shape handed to the persistence collaborator
//! and the camelCase JSON object served at and posted to `/api/instances`.
//! Optional attributes stay `Option` end to end: a field that was absent
//! when the peer signed must stay absent when we re-derive the payload.
//! Records parsed from a peer also keep the signed attributes exactly as
//! sent, since `52` and `52.0` are different bytes to the signature.

use crate::domain::canonical::SIGNED_FIELDS;
use crate::domain::errors::FederationError;
use crate::domain::value_objects::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One known instance, including this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub domain: String,
    /// PEM-encoded RSA public key.
    #[serde(default)]
    pub pubkey: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_link: Option<String>,
    /// Not signed; recomputed locally from the freshness check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes_count: Option<u64>,
    /// Base64 signature over the canonical payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Signed attributes as the peer sent them. `None` for records built locally.
    #[serde(skip)]
    pub claimed: Option<Map<String, Value>>,
}

impl InstanceRecord {
    /// Parse one entry of a peer's `/api/instances` response or an inbound
    /// announcement body.
    pub fn from_json(value: &Value) -> Result<Self, FederationError> {
        if !value.is_object() {
            return Err(FederationError::MalformedRecord("entry is not an object".into()));
        }
        let mut record: Self = serde_json::from_value(value.clone())
            .map_err(|e| FederationError::MalformedRecord(e.to_string()))?;
        record.claimed = value.as_object().map(|object| {
            object
                .iter()
                .filter(|(key, value)| SIGNED_FIELDS.contains(&key.as_str()) && !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        });
        Ok(record)
    }

    /// Wire form. Claimed attributes are re-emitted verbatim so the record
    /// still verifies when served on to other peers.
    pub fn to_json(&self) -> Value {
        let mut wire = serde_json::to_value(self).unwrap_or(Value::Null);
        if let (Some(claimed), Value::Object(object)) = (&self.claimed, &mut wire) {
            for (key, value) in claimed {
                object.insert(key.clone(), value.clone());
            }
        }
        wire
    }

    pub fn is_private(&self) -> bool {
        self.is_private.unwrap_or(false)
    }

    pub fn updated_at(&self) -> Option<Timestamp> {
        self.last_update_time.map(Timestamp::new)
    }

    /// Fields a remote record cannot be accepted without.
    pub fn check_required_fields(&self) -> Result<(), FederationError> {
        if self.id.trim().is_empty() {
            return Err(FederationError::MissingField("id"));
        }
        if self.domain.trim().is_empty() {
            return Err(FederationError::MissingField("domain"));
        }
        if self.pubkey.trim().is_empty() {
            return Err(FederationError::MissingField("pubkey"));
        }
        if self.signature.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(FederationError::MissingField("signature"));
        }
        if self.last_update_time.is_none() {
            return Err(FederationError::MissingField("lastUpdateTime"));
        }
        Ok(())
    }
}
