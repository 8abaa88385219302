use serde::Deserialize;
use url::Url;

/// Chat history storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Storage backend
    #[serde(default)]
    pub storage: HistoryStorage,
}

/// History storage backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryStorage {
    /// In-memory storage (single instance only)
    #[default]
    Memory,
    /// Redis-backed storage
    Redis {
        /// Redis connection URL
        url: Url,
    },
}
