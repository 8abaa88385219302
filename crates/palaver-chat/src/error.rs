use http::StatusCode;
use palaver_core::HttpError;
use palaver_history::HistoryError;
use palaver_moderation::ModerationError;
use palaver_quota::QuotaError;
use thiserror::Error;

/// Errors surfaced by the chat orchestration pipeline
///
/// Validation and authorization errors fail before any state mutation;
/// quota failures fail before generation starts. The optimistic quota
/// charge is never rolled back on downstream failure (a stated policy,
/// not an oversight).
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed request shape or unknown model id
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Request requires an account identity
    #[error("authentication required")]
    Unauthorized,

    /// Identity mismatch on a conversation
    #[error("access denied: {0}")]
    Forbidden(String),

    /// Inbound content was blocked by the moderation gate
    #[error("message blocked by content moderation")]
    ContentBlocked,

    /// Daily quota exhausted; carries figures for client display
    #[error("insufficient credits: {remaining} remaining, {required} required, {borrow_available} borrowable")]
    RateLimited {
        /// Credits remaining today
        remaining: u32,
        /// Credits the request would cost
        required: u32,
        /// Borrow headroom still available
        borrow_available: u32,
    },

    /// No provider credentials configured, or the chain is exhausted
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Moderation classifier transport failure
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// History store failure
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Quota store failure
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Unexpected internal error, logged with a correlation id at the
    /// server layer
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HttpError for ChatError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::ContentBlocked => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) | Self::Moderation(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::History(_) | Self::Quota(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::BadRequest(_) => "invalid_request_error",
            Self::Unauthorized => "authentication_error",
            Self::Forbidden(_) => "forbidden_error",
            Self::ContentBlocked => "content_moderation_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::ServiceUnavailable(_) => "service_unavailable_error",
            Self::Moderation(_) => "moderation_unavailable_error",
            Self::History(_) | Self::Quota(_) | Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::History(_) | Self::Quota(_) | Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_details_from_clients() {
        let error = ChatError::Internal(anyhow::anyhow!("connection string leaked"));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.client_message(), "an internal error occurred");
    }

    #[test]
    fn rate_limited_carries_figures() {
        let error = ChatError::RateLimited {
            remaining: 2,
            required: 5,
            borrow_available: 10,
        };
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(error.client_message().contains('2'));
        assert!(error.client_message().contains('5'));
        assert!(error.client_message().contains("10"));
    }
}
