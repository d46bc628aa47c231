//! Agent configuration

use lbweight_core::{DEFAULT_AGENT_PORT, DEFAULT_HARDWARE_PATH, DEFAULT_HEALTH_PATH};
use std::time::Duration;
use thiserror::Error;

use crate::hardware::DEFAULT_SAMPLE_WINDOW;

/// Paths the agent always serves for toggling health
pub const TOGGLE_PATHS: [&str; 2] = ["/up", "/down"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub port: u16,
    pub health_path: String,
    pub hardware_path: String,
    /// CPU sampling window per hardware request
    pub sample_window: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_AGENT_PORT,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            hardware_path: DEFAULT_HARDWARE_PATH.to_string(),
            sample_window: DEFAULT_SAMPLE_WINDOW,
        }
    }
}

impl AgentConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "port must be non-zero".to_string(),
            ));
        }

        for (name, path) in [
            ("health_path", &self.health_path),
            ("hardware_path", &self.hardware_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "{} must start with '/': {:?}",
                    name, path
                )));
            }

            // Route captures and wildcards are not plain paths
            if path.contains([':', '*', '{', '}']) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a literal path: {:?}",
                    name, path
                )));
            }

            if TOGGLE_PATHS.contains(&path.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "{} collides with the toggle route {:?}",
                    name, path
                )));
            }
        }

        if self.health_path == self.hardware_path {
            return Err(ConfigError::ValidationError(format!(
                "health_path and hardware_path are both {:?}",
                self.health_path
            )));
        }

        Ok(())
    }
}
