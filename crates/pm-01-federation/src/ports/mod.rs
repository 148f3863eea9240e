//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** what the web layer calls into
//! - **Driven Ports (Outbound):** what the host supplies (store, DNS, HTTP, time)

pub mod inbound;
pub mod outbound;

pub use inbound::{AnnouncementResponse, FederationApi};
pub use outbound::{HostResolver, InstanceStore, LocalNetwork, MeshStats, PeerTransport, TimeSource};
