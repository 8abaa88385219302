use serde::Deserialize;

/// Telemetry configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Log filter directive (e.g. "info", "palaver=debug")
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}
