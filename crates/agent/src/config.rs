//! Agent configuration
//!
//! Loaded from an optional file named by `VITALS_CONFIG`, overridden by
//! environment variables such as `VITALS__API_PORT=9000` or
//! `VITALS__MONITOR__SAMPLER__INTERVAL_SECS=5`. Every field has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vitals_lib::{MonitorConfig, SysinfoSource};

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "VITALS_CONFIG";

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Host label attached to logs and alerts
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// Port for probes, metrics and the status API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            api_port: default_api_port(),
            monitor: MonitorConfig::default(),
        }
    }
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| SysinfoSource::host_name())
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok();
        Self::from_sources(file.as_deref().map(Path::new), environment())
    }

    /// Layer an optional file under the given environment source
    pub fn from_sources(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

/// `VITALS__`-prefixed environment variables, `__` separating nested keys
pub fn environment() -> config::Environment {
    config::Environment::with_prefix("VITALS")
        .separator("__")
        .try_parsing(true)
}
