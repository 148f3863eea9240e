//! RSA PKCS#1 v1.5 / SHA-256 signing over the canonical payload.
//!
//! Verification never fails loudly: malformed PEM, base64 or signature bytes
//! all collapse to `false`.

use crate::domain::canonical::canonical_payload;
use crate::domain::errors::IdentityError;
use crate::domain::record::InstanceRecord;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Key size for newly generated instance keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// This instance's RSA key pair.
#[derive(Clone)]
pub struct InstanceKey {
    private: RsaPrivateKey,
    public_pem: String,
}

impl std::fmt::Debug for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceKey")
            .field("public_pem", &self.public_pem)
            .finish_non_exhaustive()
    }
}

impl InstanceKey {
    pub fn generate(bits: usize) -> Result<Self, IdentityError> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        Self::from_private(private)
    }

    /// Parse a PKCS#8 PEM, falling back to legacy PKCS#1 (`BEGIN RSA PRIVATE KEY`).
    pub fn from_pem(pem: &str) -> Result<Self, IdentityError> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        Self::from_private(private)
    }

    fn from_private(private: RsaPrivateKey) -> Result<Self, IdentityError> {
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        Ok(Self {
            private,
            public_pem,
        })
    }

    /// PKCS#8 PEM for writing to the key file.
    pub fn to_pem(&self) -> Result<String, IdentityError> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))
    }

    /// SPKI PEM published as `pubkey`.
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Sign raw payload bytes, returning base64.
    pub fn sign_bytes(&self, payload: &[u8]) -> String {
        let signing_key = SigningKey::<Sha256>::new(self.private.clone());
        let signature: Signature = signing_key.sign(payload);
        STANDARD.encode(signature.to_bytes())
    }

    /// Sign the canonical payload of `record`.
    pub fn sign_record(&self, record: &InstanceRecord) -> String {
        self.sign_bytes(&canonical_payload(record))
    }
}

fn parse_public_key(pem: &str) -> Option<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem.trim())
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem.trim()))
        .ok()
}

/// Verify a base64 signature over `payload` with a PEM public key.
pub fn verify_bytes(pubkey_pem: &str, payload: &[u8], signature_b64: &str) -> bool {
    let Some(public) = parse_public_key(pubkey_pem) else {
        return false;
    };
    let Ok(raw) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public)
        .verify(payload, &signature)
        .is_ok()
}

/// Verify a record's signature against its own claimed `pubkey`.
pub fn verify_record(record: &InstanceRecord) -> bool {
    match record.signature.as_deref() {
        Some(signature) => verify_bytes(&record.pubkey, &canonical_payload(record), signature),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_key() -> &'static InstanceKey {
        static KEY: OnceLock<InstanceKey> = OnceLock::new();
        KEY.get_or_init(|| InstanceKey::generate(1024).unwrap())
    }

    fn signed_record() -> InstanceRecord {
        let key = test_key();
        let mut record = InstanceRecord {
            id: "3f0c".into(),
            domain: "mesh.example".into(),
            pubkey: key.public_key_pem().to_string(),
            name: Some("Mesh".into()),
            version: Some("0.5.0".into()),
            channel: Some("LongFast".into()),
            frequency: Some("868".into()),
            latitude: Some(52.52),
            longitude: Some(13.40),
            last_update_time: Some(1_700_000_000),
            is_private: Some(false),
            contact_link: Some("#mesh:matrix.org".into()),
            ..Default::default()
        };
        record.signature = Some(key.sign_record(&record));
        record
    }

    #[test]
    fn test_sign_then_verify_succeeds() {
        assert!(verify_record(&signed_record()));
    }

    #[test]
    fn test_flipping_any_signed_field_fails() {
        let base = signed_record();
        let mutations: Vec<Box<dyn Fn(&mut InstanceRecord)>> = vec![
            Box::new(|r| r.id.push('x')),
            Box::new(|r| r.domain = "evil.example".into()),
            Box::new(|r| r.name = Some("Other".into())),
            Box::new(|r| r.version = None),
            Box::new(|r| r.channel = Some("ShortFast".into())),
            Box::new(|r| r.frequency = Some("915".into())),
            Box::new(|r| r.latitude = Some(1.0)),
            Box::new(|r| r.longitude = None),
            Box::new(|r| r.last_update_time = Some(1_700_000_001)),
            Box::new(|r| r.is_private = Some(true)),
            Box::new(|r| r.contact_link = None),
        ];
        for mutate in mutations {
            let mut tampered = base.clone();
            mutate(&mut tampered);
            assert!(!verify_record(&tampered), "tampered record verified: {tampered:?}");
        }
    }

    #[test]
    fn test_unsigned_nodes_count_does_not_matter() {
        let mut record = signed_record();
        record.nodes_count = Some(999);
        assert!(verify_record(&record));
    }

    #[test]
    fn test_peer_signed_integer_latitude_verifies() {
        let key = test_key();
        let mut wire = serde_json::json!({
            "id": "peer-1",
            "domain": "peer.example",
            "pubkey": key.public_key_pem(),
            "latitude": 52,
            "longitude": 13,
            "lastUpdateTime": 1_700_000_000u64,
            "isPrivate": false
        });
        let payload = serde_json::to_vec(&wire).unwrap();
        wire["signature"] = serde_json::Value::from(key.sign_bytes(&payload));

        let record = InstanceRecord::from_json(&wire).unwrap();
        assert_eq!(canonical_payload(&record), payload);
        assert!(verify_record(&record));

        let served = InstanceRecord::from_json(&record.to_json()).unwrap();
        assert!(verify_record(&served));
    }

    #[test]
    fn test_malformed_inputs_return_false() {
        let record = signed_record();
        let payload = canonical_payload(&record);
        let signature = record.signature.clone().unwrap();

        assert!(!verify_bytes("not a pem", &payload, &signature));
        assert!(!verify_bytes(&record.pubkey, &payload, "%%% not base64"));
        assert!(!verify_bytes(&record.pubkey, &payload, "AAAA"));
        assert!(!verify_bytes(&record.pubkey, &payload, ""));
    }

    #[test]
    fn test_other_key_does_not_verify() {
        let mut record = signed_record();
        let other = InstanceKey::generate(1024).unwrap();
        record.pubkey = other.public_key_pem().to_string();
        assert!(!verify_record(&record));
    }

    #[test]
    fn test_pem_round_trip_keeps_public_key() {
        let key = test_key();
        let restored = InstanceKey::from_pem(&key.to_pem().unwrap()).unwrap();
        assert_eq!(restored.public_key_pem(), key.public_key_pem());
    }
}
