//! # Node Configuration
//!
//! One TOML file feeds both the federation settings (`[instance]`,
//! `[federation]`) and logging (`[logging]`). Environment variables win over
//! the file.

use anyhow::{Context, Result};
use pm_01_federation::FederationSettings;
use pm_telemetry::TelemetryConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file used when neither an argument nor `PM_CONFIG` names one.
pub const DEFAULT_CONFIG_PATH: &str = "potatomesh.toml";

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Federation settings.
    pub federation: FederationSettings,
    /// Logging configuration.
    pub logging: TelemetryConfig,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingFile {
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingSection {
    level: Option<String>,
    json: Option<bool>,
    service_name: Option<String>,
}

impl NodeConfig {
    /// Pick the config path: first CLI argument, then `PM_CONFIG`, then
    /// [`DEFAULT_CONFIG_PATH`] if it exists.
    pub fn locate(arg: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        arg.or_else(|| lookup("PM_CONFIG"))
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            })
    }

    /// Load from `path` (or defaults when `None`) and apply overrides.
    pub fn load(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = match path {
            Some(path) => {
                fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?
            }
            None => String::new(),
        };
        Self::from_toml(&content, lookup)
    }

    pub fn from_toml(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut federation = FederationSettings::parse(content).context("invalid federation settings")?;
        federation
            .apply_overrides(&lookup)
            .context("invalid federation environment override")?;

        let file: LoggingFile = toml::from_str(content).context("invalid [logging] table")?;
        let env = TelemetryConfig::from_lookup(&lookup);
        let section = file.logging;
        let logging = TelemetryConfig {
            log_level: lookup("PM_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .or(section.level)
                .unwrap_or(env.log_level),
            json_logs: match lookup("PM_JSON_LOGS") {
                Some(_) => env.json_logs,
                None => section.json.unwrap_or(env.json_logs),
            },
            service_name: lookup("PM_SERVICE_NAME")
                .or(section.service_name)
                .unwrap_or(env.service_name),
            console_output: env.console_output,
        };

        Ok(Self { federation, logging })
    }
}
