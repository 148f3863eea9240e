//! # PotatoMesh Federation Runtime
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (TOML file, then `PM_*` environment overrides)
//! 2. Initialize logging
//! 3. Load or generate the instance key and id
//! 4. Resolve the instance domain (configured, reverse DNS, local address)
//! 5. Wire store, resolver and HTTP client into the federation context
//! 6. Start the announce and crawl loops
//! 7. On Ctrl+C, stop the loops and drain the worker pool

pub mod bootstrap;
pub mod config;

pub use bootstrap::build_runtime;
pub use config::NodeConfig;
