use serde::Deserialize;
use url::Url;

/// Daily credit quota configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Daily allotment for guest identities
    #[serde(default = "default_guest_daily")]
    pub guest_daily_credits: u32,
    /// Daily allotment for account identities
    #[serde(default = "default_regular_daily")]
    pub regular_daily_credits: u32,
    /// Maximum credits borrowable from the next day's allotment
    #[serde(default = "default_max_borrow")]
    pub max_borrow: u32,
    /// Cost multiplier applied under provider cost pressure
    #[serde(default = "default_multiplier")]
    pub active_multiplier: f64,
    /// Storage backend for the ledger
    #[serde(default)]
    pub storage: QuotaStorage,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            guest_daily_credits: default_guest_daily(),
            regular_daily_credits: default_regular_daily(),
            max_borrow: default_max_borrow(),
            active_multiplier: default_multiplier(),
            storage: QuotaStorage::default(),
        }
    }
}

/// Quota ledger storage backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuotaStorage {
    /// In-memory storage (single instance only)
    #[default]
    Memory,
    /// Redis-backed storage (distributed)
    Redis {
        /// Redis connection URL
        url: Url,
    },
}

fn default_guest_daily() -> u32 {
    40
}

fn default_regular_daily() -> u32 {
    120
}

fn default_max_borrow() -> u32 {
    20
}

fn default_multiplier() -> f64 {
    1.0
}
