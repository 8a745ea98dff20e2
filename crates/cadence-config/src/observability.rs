//! Tracing initialization.

use std::sync::OnceLock;

use crate::ObservabilityConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber once per process.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies. Later
/// calls are no-ops, so library consumers that already installed a
/// subscriber keep theirs.
pub fn init_tracing_if_needed(observability: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let fallback_level = match observability
            .log_level
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        };

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        tracing::info!(log_level = %observability.log_level, "tracing initialized");
    });
}
