use axum::Json;
use axum::response::{IntoResponse, Response};
use palaver_chat::ChatError;
use palaver_core::HttpError;
use uuid::Uuid;

/// Render a domain error as a structured JSON response
pub(crate) fn error_response<E: HttpError>(error: &E) -> Response {
    let status = error.status_code();
    let body = serde_json::json!({
        "error": {
            "message": error.client_message(),
            "type": error.error_type(),
            "code": serde_json::Value::Null,
        }
    });

    (status, Json(body)).into_response()
}

/// Render a chat pipeline error, logging internals with a correlation id
///
/// Clients see only the generic message plus the correlation id they
/// can quote back to support.
pub(crate) fn chat_error_response(error: &ChatError) -> Response {
    match error {
        ChatError::History(_) | ChatError::Quota(_) | ChatError::Internal(_) => {
            let correlation_id = Uuid::new_v4();
            tracing::error!(%correlation_id, error = %error, "request failed");

            let body = serde_json::json!({
                "error": {
                    "message": error.client_message(),
                    "type": error.error_type(),
                    "code": serde_json::Value::Null,
                    "correlation_id": correlation_id,
                }
            });
            (error.status_code(), Json(body)).into_response()
        }
        other => error_response(other),
    }
}
