//! Canonical signing payload.
//!
//! Only the signed attribute subset is included, only when present, keyed by
//! wire name and serialized with sorted keys. Signer and verifier must derive
//! byte-identical output from the same attributes.

use crate::domain::record::InstanceRecord;
use serde_json::Value;
use std::collections::BTreeMap;

/// Wire names of every attribute covered by the signature.
pub const SIGNED_FIELDS: [&str; 12] = [
    "id",
    "domain",
    "pubkey",
    "name",
    "version",
    "channel",
    "frequency",
    "latitude",
    "longitude",
    "lastUpdateTime",
    "isPrivate",
    "contactLink",
];

/// Build the sorted key/value map for `record`.
///
/// A record parsed from a peer is re-derived from the attributes it claimed,
/// not from the typed fields, so number formatting round-trips exactly.
pub fn canonical_fields(record: &InstanceRecord) -> BTreeMap<&'static str, Value> {
    if let Some(claimed) = &record.claimed {
        return SIGNED_FIELDS
            .iter()
            .filter_map(|key| claimed.get(*key).map(|value| (*key, value.clone())))
            .collect();
    }

    let mut fields = BTreeMap::new();
    fields.insert("id", Value::from(record.id.as_str()));
    fields.insert("domain", Value::from(record.domain.as_str()));
    fields.insert("pubkey", Value::from(record.pubkey.as_str()));

    let optional: [(&'static str, Option<Value>); 9] = [
        ("name", record.name.as_deref().map(Value::from)),
        ("version", record.version.as_deref().map(Value::from)),
        ("channel", record.channel.as_deref().map(Value::from)),
        ("frequency", record.frequency.as_deref().map(Value::from)),
        ("latitude", record.latitude.map(Value::from)),
        ("longitude", record.longitude.map(Value::from)),
        ("lastUpdateTime", record.last_update_time.map(Value::from)),
        ("isPrivate", record.is_private.map(Value::from)),
        ("contactLink", record.contact_link.as_deref().map(Value::from)),
    ];
    for (key, value) in optional {
        // NaN latitude/longitude become null in JSON; treat as absent.
        if let Some(value) = value.filter(|v| !v.is_null()) {
            fields.insert(key, value);
        }
    }
    fields
}

/// Exact bytes that get signed and verified.
pub fn canonical_payload(record: &InstanceRecord) -> Vec<u8> {
    serde_json::to_vec(&canonical_fields(record)).unwrap_or_default()
}
