use http::StatusCode;
use thiserror::Error;

/// Upstream provider failures, classified into a closed set of kinds
///
/// Classification happens once, at the adapter layer, from the HTTP
/// status of the upstream response. Retry policy elsewhere depends on
/// these kinds only, never on message substrings.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credential is rate limited by the upstream
    #[error("provider rate limited")]
    RateLimited,

    /// Credential has exhausted its upstream quota or billing
    #[error("provider quota or billing exhausted")]
    QuotaExceeded,

    /// Upstream rejected the credential
    #[error("provider rejected credentials")]
    Unauthorized,

    /// Upstream denied access to the requested model
    #[error("provider denied access")]
    Forbidden,

    /// Upstream returned a 5xx-class error
    #[error("provider server error: status {status}")]
    ServerError {
        /// HTTP status returned by the provider
        status: u16,
    },

    /// Anything else: malformed responses, transport failures, 4xx
    /// statuses outside the classified set
    #[error("provider request failed: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Whether the next credential in a fallback chain should be tried
    ///
    /// Rate-limit, quota/billing, and auth/permission failures are
    /// credential-specific, and 5xx responses are transient, so another
    /// credential may succeed. Everything else aborts the chain.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::QuotaExceeded | Self::Unauthorized | Self::Forbidden | Self::ServerError { .. }
        )
    }

    /// Classify an upstream HTTP error status
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            402 => Self::QuotaExceeded,
            403 => Self::Forbidden,
            429 => Self::RateLimited,
            s if s >= 500 => Self::ServerError { status: s },
            s => {
                let snippet: String = body.chars().take(200).collect();
                Self::Unknown(format!("provider returned {s}: {snippet}"))
            }
        }
    }
}
