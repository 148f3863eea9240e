//! SSRF guard: the address list every outbound dial is pinned to.

use crate::domain::{is_restricted, DomainName, GuardError};
use crate::ports::HostResolver;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct DomainGuard {
    resolver: Arc<dyn HostResolver>,
}

impl DomainGuard {
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve `host` and drop restricted addresses.
    ///
    /// IP literals skip DNS. When resolution yields addresses and all of
    /// them are restricted the result is [`GuardError::Restricted`]; an
    /// empty resolution is returned as an empty list.
    pub fn resolve_safe_addresses(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        let resolved = match host.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => self.resolver.lookup(host)?,
        };
        if resolved.is_empty() {
            return Ok(resolved);
        }

        let mut safe: Vec<IpAddr> = Vec::with_capacity(resolved.len());
        for ip in resolved {
            if is_restricted(ip) {
                debug!(host, %ip, "dropping restricted address");
            } else if !safe.contains(&ip) {
                safe.push(ip);
            }
        }
        if safe.is_empty() {
            return Err(GuardError::Restricted(host.to_string()));
        }
        Ok(safe)
    }

    pub fn check_domain(&self, domain: &DomainName) -> Result<Vec<IpAddr>, GuardError> {
        self.resolve_safe_addresses(domain.host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticResolver;

    fn guard(resolver: StaticResolver) -> DomainGuard {
        DomainGuard::new(Arc::new(resolver))
    }

    #[test]
    fn test_loopback_and_private_literals_are_restricted() {
        let guard = guard(StaticResolver::new());
        assert_eq!(
            guard.resolve_safe_addresses("127.0.0.1"),
            Err(GuardError::Restricted("127.0.0.1".into()))
        );
        assert_eq!(
            guard.resolve_safe_addresses("10.0.0.5"),
            Err(GuardError::Restricted("10.0.0.5".into()))
        );
    }

    #[test]
    fn test_public_literal_passes_unfiltered() {
        let guard = guard(StaticResolver::new());
        let ip: IpAddr = "93.184.216.34".parse().unwrap();
        assert_eq!(guard.resolve_safe_addresses("93.184.216.34"), Ok(vec![ip]));
    }

    #[test]
    fn test_mixed_resolution_keeps_only_public() {
        let public: IpAddr = "93.184.216.34".parse().unwrap();
        let guard = guard(
            StaticResolver::new().with_host("mixed.example", vec!["10.1.1.1".parse().unwrap(), public]),
        );
        assert_eq!(guard.resolve_safe_addresses("mixed.example"), Ok(vec![public]));
    }

    #[test]
    fn test_all_private_resolution_is_restricted() {
        let guard = guard(
            StaticResolver::new().with_host("rebind.example", vec!["192.168.0.10".parse().unwrap()]),
        );
        assert!(matches!(
            guard.resolve_safe_addresses("rebind.example"),
            Err(GuardError::Restricted(_))
        ));
    }

    #[test]
    fn test_empty_resolution_is_not_restricted() {
        let guard = guard(StaticResolver::new().with_host("void.example", vec![]));
        assert_eq!(guard.resolve_safe_addresses("void.example"), Ok(vec![]));
    }

    #[test]
    fn test_unknown_host_is_resolution_error() {
        let guard = guard(StaticResolver::new());
        assert!(matches!(
            guard.resolve_safe_addresses("missing.example"),
            Err(GuardError::Resolution { .. })
        ));
    }
}
