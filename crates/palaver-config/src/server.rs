use std::net::SocketAddr;

use serde::Deserialize;

use crate::rate_limit::RateLimitConfig;

/// HTTP server configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address, defaults to 0.0.0.0:3000
    pub listen_address: Option<SocketAddr>,
    /// Whether guest cookies carry the `Secure` attribute
    #[serde(default)]
    pub secure_cookies: bool,
    /// Health check endpoint
    #[serde(default)]
    pub health: HealthConfig,
    /// Request rate limiting
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

/// Health check endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is exposed
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path the health endpoint is served on
    #[serde(default = "default_health_path")]
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_health_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_health_path() -> String {
    "/health".to_owned()
}
