#![allow(clippy::must_use_candidate)]

mod env;
pub mod history;
mod loader;
pub mod models;
pub mod moderation;
pub mod provider;
pub mod quota;
pub mod rate_limit;
pub mod resume;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use history::*;
pub use models::*;
pub use moderation::*;
pub use provider::*;
pub use quota::*;
pub use rate_limit::*;
pub use resume::*;
pub use server::*;
pub use telemetry::TelemetryConfig;

/// Top-level Palaver configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream provider credentials
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Model catalog and selection defaults
    #[serde(default)]
    pub models: ModelsConfig,
    /// Daily credit quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Content moderation configuration
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Chat history storage configuration
    #[serde(default)]
    pub history: HistoryConfig,
    /// Resumable stream configuration
    #[serde(default)]
    pub resume: Option<ResumeConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
