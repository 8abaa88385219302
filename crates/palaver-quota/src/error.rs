use thiserror::Error;

/// Quota ledger errors
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Storage backend connection or command error
    #[error("quota backend: {0}")]
    Backend(String),
}
