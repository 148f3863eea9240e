//! Address classification for the SSRF guard and domain resolution.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Reachability class of an IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Unspecified,
    Loopback,
    LinkLocal,
    /// RFC 1918, CGNAT (100.64/10) and IPv6 unique/site-local.
    Private,
    /// Multicast and broadcast; never a unicast peer.
    Reserved,
    /// Globally routable.
    Public,
}

impl AddressClass {
    pub fn is_restricted(self) -> bool {
        !matches!(self, AddressClass::Public)
    }
}

pub fn classify(ip: IpAddr) -> AddressClass {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => classify_v4(v4),
            None => classify_v6(v6),
        },
    }
}

/// True when the guard must never dial `ip`.
pub fn is_restricted(ip: IpAddr) -> bool {
    classify(ip).is_restricted()
}

fn classify_v4(ip: Ipv4Addr) -> AddressClass {
    let [a, b, ..] = ip.octets();
    if ip.is_unspecified() || a == 0 {
        AddressClass::Unspecified
    } else if ip.is_loopback() {
        AddressClass::Loopback
    } else if ip.is_link_local() {
        AddressClass::LinkLocal
    } else if ip.is_private() || (a == 100 && (64..128).contains(&b)) {
        AddressClass::Private
    } else if ip.is_multicast() || ip.is_broadcast() || a >= 240 {
        AddressClass::Reserved
    } else {
        AddressClass::Public
    }
}

fn classify_v6(ip: Ipv6Addr) -> AddressClass {
    let first = ip.segments()[0];
    if ip.is_unspecified() {
        AddressClass::Unspecified
    } else if ip.is_loopback() {
        AddressClass::Loopback
    } else if first & 0xffc0 == 0xfe80 {
        AddressClass::LinkLocal
    } else if first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfec0 {
        AddressClass::Private
    } else if ip.is_multicast() {
        AddressClass::Reserved
    } else {
        AddressClass::Public
    }
}
