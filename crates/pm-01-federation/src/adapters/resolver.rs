//! System DNS and local address discovery.

use crate::domain::GuardError;
use crate::ports::{HostResolver, LocalNetwork};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::Resolver;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tracing::warn;

/// [`HostResolver`] backed by the system resolver configuration.
pub struct SystemResolver {
    resolver: Resolver,
}

impl SystemResolver {
    pub fn from_system_conf() -> std::io::Result<Self> {
        Ok(Self {
            resolver: Resolver::from_system_conf()?,
        })
    }
}

impl HostResolver for SystemResolver {
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        match self.resolver.lookup_ip(host) {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(err) => {
                // NXDOMAIN and empty answers are "no addresses", not a failure.
                if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
                    Ok(Vec::new())
                } else {
                    Err(GuardError::Resolution {
                        host: host.to_string(),
                        reason: err.to_string(),
                    })
                }
            }
        }
    }

    fn reverse(&self, ip: IpAddr) -> Option<String> {
        let lookup = self.resolver.reverse_lookup(ip).ok()?;
        let name = lookup.iter().next()?.to_string();
        let name = name.trim_end_matches('.');
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Probe addresses used to learn the outbound source address. Nothing is sent.
const PROBE_V4: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);
const PROBE_V6: SocketAddr = SocketAddr::new(
    IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888)),
    80,
);

/// [`LocalNetwork`] using connected UDP sockets to discover source addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLocalNetwork;

impl SystemLocalNetwork {
    fn source_address(bind: SocketAddr, probe: SocketAddr) -> Option<IpAddr> {
        let socket = UdpSocket::bind(bind).ok()?;
        socket.connect(probe).ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    }
}

impl LocalNetwork for SystemLocalNetwork {
    fn local_addresses(&self) -> Vec<IpAddr> {
        let candidates = [
            Self::source_address(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0), PROBE_V4),
            Self::source_address(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0), PROBE_V6),
        ];
        let mut seen = HashSet::new();
        let addresses: Vec<IpAddr> = candidates
            .into_iter()
            .flatten()
            .filter(|ip| seen.insert(*ip))
            .collect();
        if addresses.is_empty() {
            warn!("no local addresses discovered");
        }
        addresses
    }
}
