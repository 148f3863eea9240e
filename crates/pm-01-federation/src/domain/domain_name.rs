//! Syntactic validation of instance domains (`host[:port]`).

use crate::domain::errors::DomainError;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A sanitized `host[:port]`.
///
/// Hostnames are lowercased without a trailing dot. IPv6 literals are kept in
/// bracketed form so the canonical string is always a valid URL authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    canonical: String,
    host: String,
    port: Option<u16>,
    ip: Option<IpAddr>,
}

impl DomainName {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        sanitize_domain(input)
    }

    /// Canonical `host[:port]` as stored and compared.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Host without port or brackets; what gets resolved.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Set when the host is an IP literal.
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Validate and canonicalize a candidate domain.
///
/// Rejects schemes, credentials, paths/queries/fragments, bad ports and hosts
/// that are neither IP literals nor RFC 1123 hostnames.
pub fn sanitize_domain(input: &str) -> Result<DomainName, DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Empty);
    }
    if trimmed.contains("://") {
        return Err(DomainError::HasScheme);
    }
    if trimmed.contains('@') {
        return Err(DomainError::HasCredentials);
    }
    if trimmed.contains(['/', '?', '#', '\\']) {
        return Err(DomainError::HasPath);
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(DomainError::InvalidHost(trimmed.to_string()));
    }

    let lowered = trimmed.to_ascii_lowercase();

    if let Some(rest) = lowered.strip_prefix('[') {
        let (addr, after) = rest
            .split_once(']')
            .ok_or_else(|| DomainError::InvalidHost(lowered.clone()))?;
        let v6: Ipv6Addr = addr
            .parse()
            .map_err(|_| DomainError::InvalidHost(lowered.clone()))?;
        let port = match after {
            "" => None,
            _ => {
                let raw = after
                    .strip_prefix(':')
                    .ok_or_else(|| DomainError::InvalidHost(lowered.clone()))?;
                Some(parse_port(raw)?)
            }
        };
        return Ok(build_ipv6(v6, port));
    }

    // Bare IPv6 literal without brackets cannot carry a port.
    if lowered.matches(':').count() > 1 {
        let v6: Ipv6Addr = lowered
            .parse()
            .map_err(|_| DomainError::InvalidHost(lowered.clone()))?;
        return Ok(build_ipv6(v6, None));
    }

    let (host, port) = match lowered.split_once(':') {
        Some((host, raw)) => (host, Some(parse_port(raw)?)),
        None => (lowered.as_str(), None),
    };
    let host = host.strip_suffix('.').unwrap_or(host);

    let ip = match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            validate_hostname(host)?;
            None
        }
    };

    let canonical = match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(DomainName {
        canonical,
        host: host.to_string(),
        port,
        ip,
    })
}

fn build_ipv6(addr: Ipv6Addr, port: Option<u16>) -> DomainName {
    let canonical = match port {
        Some(port) => format!("[{addr}]:{port}"),
        None => format!("[{addr}]"),
    };
    DomainName {
        canonical,
        host: addr.to_string(),
        port,
        ip: Some(IpAddr::V6(addr)),
    }
}

fn parse_port(raw: &str) -> Result<u16, DomainError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::InvalidPort(raw.to_string()));
    }
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(DomainError::InvalidPort(raw.to_string())),
        Ok(port) => Ok(port),
    }
}

fn validate_hostname(host: &str) -> Result<(), DomainError> {
    let invalid = || DomainError::InvalidHost(host.to_string());
    if host.is_empty() || host.len() > MAX_HOST_LEN {
        return Err(invalid());
    }
    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(invalid());
        }
    }
    Ok(())
}
