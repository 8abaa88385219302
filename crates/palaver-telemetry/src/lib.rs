//! Telemetry for Palaver
//!
//! Structured logging via the `tracing` ecosystem: an env-filtered
//! subscriber with either human-readable or JSON-line output.

use palaver_config::TelemetryConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber from configuration
///
/// The filter resolves in order: `RUST_LOG`, the configured
/// `log_filter`, then `"info"`.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let fallback = config.log_filter.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    }

    Ok(())
}
