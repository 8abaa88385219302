use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Response};
use palaver_chat::ChatError;
use palaver_core::Identity;
use palaver_history::{Cursor, HistoryError};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::errors::{chat_error_response, error_response};

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    starting_after: Option<Uuid>,
    #[serde(default)]
    ending_before: Option<Uuid>,
}

fn default_limit() -> usize {
    10
}

/// Handle `GET /api/history`
pub(crate) async fn list_history(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let cursor = match (query.starting_after, query.ending_before) {
        (Some(_), Some(_)) => {
            return error_response(&ChatError::BadRequest(
                "only one of starting_after or ending_before can be provided".to_owned(),
            ));
        }
        (Some(id), None) => Some(Cursor::After(id)),
        (None, Some(id)) => Some(Cursor::Before(id)),
        (None, None) => None,
    };

    match state.history.list_chats(identity.key(), query.limit, cursor).await {
        Ok(page) => Json(page).into_response(),
        Err(HistoryError::NotFound) => error_response(&ChatError::BadRequest("unknown pagination cursor".to_owned())),
        Err(e) => chat_error_response(&ChatError::History(e)),
    }
}

/// Handle `DELETE /api/history`
///
/// Deletes all of the account user's conversations; guests cannot.
pub(crate) async fn delete_history(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    if !identity.is_account() {
        return error_response(&ChatError::Unauthorized);
    }

    match state.history.delete_chats_for_user(identity.key()).await {
        Ok(deleted) => Json(serde_json::json!({ "deleted": deleted })).into_response(),
        Err(e) => chat_error_response(&ChatError::History(e)),
    }
}
