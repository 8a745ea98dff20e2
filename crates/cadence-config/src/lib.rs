//! # Cadence Config
//!
//! Typed configuration for the plan engine: which backends persist plans and
//! carry triggers, how the consumer worker polls, and how logging is
//! initialized. Loaded once at bootstrap from a single YAML file.

mod loader;
mod observability;

pub use loader::{load_config, ConfigError};
pub use observability::init_tracing_if_needed;

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CadenceConfig {
    /// Config schema version; must be > 0
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerTuning,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            store: StoreConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerTuning::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_version() -> u32 {
    1
}

/// Application identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "cadence".to_string(),
        }
    }
}

/// Plan store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend kind: "memory" or "redis"
    pub backend: String,
    /// Connection URL, required for the redis backend
    #[serde(default)]
    pub connection_url: Option<String>,
    /// Key prefix for the redis backend
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            connection_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

/// Trigger queue backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Backend kind: "memory" or "redis"
    pub backend: String,
    /// Connection URL, required for the redis backend
    #[serde(default)]
    pub connection_url: Option<String>,
    /// Key prefix for the redis backend
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            connection_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "cadence".to_string()
}

/// Consumer worker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerTuning {
    /// How long a claimed trigger stays invisible before redelivery
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
    /// How long the worker sleeps when the queue is empty
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerTuning {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: default_visibility_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Fallback log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
