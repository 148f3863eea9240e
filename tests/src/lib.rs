//! # PotatoMesh Federation Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── federation_flows.rs   # Two instances announcing and crawling each other
//!     └── worker_pool_flows.rs  # Saturation and shutdown fallbacks end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pm-tests
//! cargo test -p pm-tests integration::federation_flows
//! ```

pub mod integration;
