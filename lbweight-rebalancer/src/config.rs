//! Rebalancer settings
//!
//! Loaded from a TOML file, then environment variables, then command line.

use lbweight_core::{DEFAULT_AGENT_PORT, DEFAULT_HARDWARE_PATH, DEFAULT_HEALTH_PATH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Settings file read when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Rebalancer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Envoy document listing the clusters and their EDS files
    #[serde(default)]
    pub envoy_config: PathBuf,

    /// Port the sidecar agent listens on, on every endpoint
    #[serde(default = "default_port")]
    pub port: u16,

    /// Agent path answering the health check
    #[serde(default = "default_health_path")]
    pub path_health: String,

    /// Agent path serving the hardware report
    #[serde(default = "default_hardware_path")]
    pub path_hardware: String,

    /// Per-request probe timeout; unset keeps the HTTP client's default
    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            envoy_config: PathBuf::new(),
            port: default_port(),
            path_health: default_health_path(),
            path_hardware: default_hardware_path(),
            probe_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings the way the binary does: file, then environment, then
    /// the command line override, then validation. An unreadable file is an
    /// error even at the default location.
    pub fn load(
        path: impl AsRef<Path>,
        envoy_config: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let settings = Self::from_file(path)?
            .with_env_overrides()
            .with_overrides(envoy_config);
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command line overrides
    pub fn with_overrides(mut self, envoy_config: Option<PathBuf>) -> Self {
        if let Some(path) = envoy_config {
            self.envoy_config = path;
        }
        self
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("LBWEIGHT_ENVOY_CONFIG") {
            self.envoy_config = PathBuf::from(path);
        }

        if let Ok(port) = std::env::var("LBWEIGHT_AGENT_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }

        if let Ok(path) = std::env::var("LBWEIGHT_PATH_HEALTH") {
            self.path_health = path;
        }

        if let Ok(path) = std::env::var("LBWEIGHT_PATH_HARDWARE") {
            self.path_hardware = path;
        }

        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.envoy_config.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "envoy_config must point to the Envoy cluster document".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "port must be non-zero".to_string(),
            ));
        }

        for (name, path) in [
            ("path_health", &self.path_health),
            ("path_hardware", &self.path_hardware),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "{} must start with '/': {:?}",
                    name, path
                )));
            }
        }

        Ok(())
    }

    /// Get probe timeout as Duration
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_secs.map(Duration::from_secs)
    }
}

fn default_port() -> u16 {
    DEFAULT_AGENT_PORT
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_hardware_path() -> String {
    DEFAULT_HARDWARE_PATH.to_string()
}
