//! Cross-instance flows wired through in-memory transports.

pub mod federation_flows;
pub mod worker_pool_flows;
