use serde::Deserialize;
use url::Url;

/// Resumable stream configuration
///
/// Absent entirely, streams are not resumable and disconnected clients
/// simply lose the tail of the response.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResumeConfig {
    /// Redis connection URL backing the stream registry
    pub url: Url,
    /// Seconds recorded streams are retained for reattachment
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300
}
