//! # PotatoMesh Telemetry
//!
//! Structured logging for the federation runtime, built on `tracing` and
//! `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pm_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config).expect("logging");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PM_SERVICE_NAME` | `potatomesh-federation` | Service name |
//! | `PM_LOG_LEVEL` / `RUST_LOG` | `info` | `EnvFilter` directive |
//! | `PM_CONSOLE_OUTPUT` | `true` | Write events to stdout |
//! | `PM_JSON_LOGS` | `false` (`true` in containers) | JSON lines instead of text |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}
