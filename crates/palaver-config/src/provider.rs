use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Upstream inference provider configuration
///
/// Multiple API keys may be configured; each becomes a fallback handle
/// in configuration order, so the first key is always preferred and
/// later keys only absorb rate-limit or billing failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL override for the inference router
    #[serde(default)]
    pub base_url: Option<Url>,
    /// API keys in fallback priority order
    #[serde(default)]
    pub api_keys: Vec<SecretString>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}
