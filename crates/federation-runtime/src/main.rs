//! # PotatoMesh Federation
//!
//! Runs federation for one PotatoMesh instance until Ctrl+C.
//!
//! ```text
//! potatomesh-federation [config.toml]
//! ```

use anyhow::{Context, Result};
use federation_runtime::config::NodeConfig;
use federation_runtime::build_runtime;
use pm_01_federation::FederationApi;
use std::time::Duration;
use tracing::info;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let lookup = |key: &str| std::env::var(key).ok();
    let path = NodeConfig::locate(std::env::args().nth(1), lookup);
    let config = NodeConfig::load(path.as_deref(), lookup)?;

    pm_telemetry::init_logging(&config.logging).context("logging")?;
    if let Some(path) = &path {
        info!(path = %path.display(), "configuration loaded");
    }

    // DNS and key setup block; keep them off any async runtime.
    let runtime = build_runtime(&config.federation)?;
    let handle = runtime.start().context("failed to spawn federation loops")?;
    info!(
        loops = handle.loop_count(),
        known = handle.inbound().public_instances().len(),
        "federation running. Press Ctrl+C to stop."
    );

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("signal runtime")?
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for Ctrl+C")?;

    info!("initiating graceful shutdown");
    handle.shutdown(SHUTDOWN_TIMEOUT);
    Ok(())
}
