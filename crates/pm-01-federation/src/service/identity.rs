//! This instance's identity: domain, key pair and published attributes.

use crate::domain::{
    classify, sanitize_domain, AddressClass, DomainName, GuardError, IdentityError, InstanceKey,
    InstanceRecord, Timestamp,
};
use crate::ports::{HostResolver, LocalNetwork};
use crate::service::guard::DomainGuard;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Where the instance domain came from. Only `Configured` may self-register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainSource {
    Configured,
    ReverseDns,
    PublicAddress,
    PrivateAddress,
    AnyAddress,
}

/// Self-described attributes published with every announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceProfile {
    pub name: Option<String>,
    pub version: Option<String>,
    pub channel: Option<String>,
    pub frequency: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact_link: Option<String>,
    pub is_private: bool,
}

impl Default for InstanceProfile {
    fn default() -> Self {
        Self {
            name: None,
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            channel: None,
            frequency: None,
            latitude: None,
            longitude: None,
            contact_link: None,
            is_private: false,
        }
    }
}

/// Pick the instance domain. First success wins:
///
/// 1. explicit configuration (must pass syntax checks)
/// 2. reverse DNS of a non-loopback, non-link-local local address
/// 3. a public local address
/// 4. a private local address
/// 5. any local address, IPv4 first
pub fn resolve_instance_domain(
    configured: Option<&str>,
    network: &dyn LocalNetwork,
    resolver: &dyn HostResolver,
) -> Result<(DomainName, DomainSource), IdentityError> {
    if let Some(raw) = configured.filter(|s| !s.trim().is_empty()) {
        match sanitize_domain(raw) {
            Ok(domain) => return Ok((domain, DomainSource::Configured)),
            Err(err) => warn!(configured = raw, reason = %err, "ignoring invalid instance domain"),
        }
    }

    let addrs = network.local_addresses();

    for ip in addrs.iter().copied() {
        if matches!(
            classify(ip),
            AddressClass::Loopback | AddressClass::LinkLocal | AddressClass::Unspecified
        ) {
            continue;
        }
        if let Some(name) = resolver.reverse(ip) {
            match sanitize_domain(name.trim_end_matches('.')) {
                Ok(domain) => return Ok((domain, DomainSource::ReverseDns)),
                Err(err) => debug!(%ip, name, reason = %err, "unusable reverse DNS name"),
            }
        }
    }

    let by_class = |class: AddressClass| addrs.iter().copied().find(|ip| classify(*ip) == class);
    if let Some(ip) = by_class(AddressClass::Public) {
        return ip_domain(ip, DomainSource::PublicAddress);
    }
    if let Some(ip) = by_class(AddressClass::Private) {
        return ip_domain(ip, DomainSource::PrivateAddress);
    }

    let any = addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied());
    match any {
        Some(ip) => ip_domain(ip, DomainSource::AnyAddress),
        None => Err(IdentityError::NoDomain),
    }
}

fn ip_domain(ip: IpAddr, source: DomainSource) -> Result<(DomainName, DomainSource), IdentityError> {
    sanitize_domain(&ip.to_string())
        .map(|domain| (domain, source))
        .map_err(|_| IdentityError::NoDomain)
}

/// This deployment as seen by its peers.
#[derive(Debug, Clone)]
pub struct InstanceIdentity {
    id: String,
    domain: DomainName,
    source: DomainSource,
    key: InstanceKey,
    profile: InstanceProfile,
}

impl InstanceIdentity {
    pub fn new(
        id: impl Into<String>,
        domain: DomainName,
        source: DomainSource,
        key: InstanceKey,
        profile: InstanceProfile,
    ) -> Self {
        let identity = Self {
            id: id.into(),
            domain,
            source,
            key,
            profile,
        };
        info!(
            id = %identity.id,
            domain = %identity.domain,
            source = ?identity.source,
            private = identity.profile.is_private,
            "instance identity established"
        );
        identity
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &DomainName {
        &self.domain
    }

    pub fn source(&self) -> DomainSource {
        self.source
    }

    pub fn profile(&self) -> &InstanceProfile {
        &self.profile
    }

    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    pub fn is_private(&self) -> bool {
        self.profile.is_private
    }

    /// Build and sign the self record as of `now`.
    pub fn signed_record(&self, now: Timestamp, nodes_count: Option<u64>) -> InstanceRecord {
        let profile = &self.profile;
        let mut record = InstanceRecord {
            id: self.id.clone(),
            domain: self.domain.as_str().to_string(),
            pubkey: self.key.public_key_pem().to_string(),
            name: profile.name.clone(),
            version: profile.version.clone(),
            channel: profile.channel.clone(),
            frequency: profile.frequency.clone(),
            latitude: profile.latitude,
            longitude: profile.longitude,
            last_update_time: Some(now.as_secs()),
            is_private: Some(profile.is_private),
            contact_link: profile.contact_link.clone(),
            nodes_count,
            signature: None,
            claimed: None,
        };
        record.signature = Some(self.key.sign_record(&record));
        record
    }

    /// Whether the self record may be written to the local store.
    ///
    /// Requires a configured domain that does not resolve only to
    /// restricted addresses. A failed lookup does not veto.
    pub fn may_self_register(&self, guard: &DomainGuard) -> bool {
        if self.source != DomainSource::Configured {
            debug!(domain = %self.domain, source = ?self.source, "skipping self-registration for guessed domain");
            return false;
        }
        match guard.check_domain(&self.domain) {
            Ok(_) => true,
            Err(GuardError::Restricted(_)) => {
                debug!(domain = %self.domain, "skipping self-registration for restricted domain");
                false
            }
            Err(err) => {
                debug!(domain = %self.domain, reason = %err, "self domain did not resolve");
                true
            }
        }
    }
}
