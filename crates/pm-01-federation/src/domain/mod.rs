//! Domain Layer - Pure federation logic with no I/O
//!
//! - Instance records and their camelCase wire form
//! - Canonical signing payload and RSA signatures
//! - Domain syntax and address classification
//! - Crawl bookkeeping (in-flight claims, cooldowns, visit sets)
//! - Peer liveness (fresh node counting, record age)

pub mod canonical;
pub mod crawl_state;
pub mod domain_name;
pub mod errors;
pub mod freshness;
pub mod ip_policy;
pub mod record;
pub mod shutdown;
pub mod signature;
pub mod value_objects;

pub use canonical::*;
pub use crawl_state::*;
pub use domain_name::*;
pub use errors::*;
pub use freshness::*;
pub use ip_policy::*;
pub use record::*;
pub use shutdown::*;
pub use signature::*;
pub use value_objects::*;
