//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::CadenceConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full Cadence configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<CadenceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: CadenceConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &CadenceConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.store.backend.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "store.backend must not be empty".to_string(),
        ));
    }
    if config.store.backend == "redis" && config.store.connection_url.is_none() {
        return Err(ConfigError::Invalid(
            "store.connection_url is required for the redis backend".to_string(),
        ));
    }

    if config.queue.backend.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "queue.backend must not be empty".to_string(),
        ));
    }
    if config.queue.backend == "redis" && config.queue.connection_url.is_none() {
        return Err(ConfigError::Invalid(
            "queue.connection_url is required for the redis backend".to_string(),
        ));
    }

    if config.worker.visibility_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "worker.visibility_timeout_secs must be > 0".to_string(),
        ));
    }
    if config.worker.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "worker.poll_interval_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}
