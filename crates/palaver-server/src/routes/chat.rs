use std::convert::Infallible;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use palaver_chat::{ChatError, ChatRequest, ChatStream};
use palaver_core::Identity;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::errors::{chat_error_response, error_response};

/// Handle `POST /api/chat`
///
/// Validation failures return a structured `bad_request` error before
/// any side effect; everything after that streams as SSE.
pub(crate) async fn post_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return error_response(&ChatError::BadRequest(rejection.body_text())),
    };

    match state.orchestrator.run(&identity, request).await {
        Ok(stream) => sse_response(stream),
        Err(e) => chat_error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteChatQuery {
    id: Uuid,
}

/// Handle `DELETE /api/chat?id=`
///
/// Guests cannot delete conversations; owners only.
pub(crate) async fn delete_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<DeleteChatQuery>,
) -> Response {
    if !identity.is_account() {
        return error_response(&ChatError::Unauthorized);
    }

    match state.history.get_chat(query.id).await {
        Ok(Some(chat)) if chat.user_id == identity.key() => match state.history.delete_chat(query.id).await {
            Ok(()) => Json(serde_json::json!({ "deleted": query.id })).into_response(),
            Err(e) => chat_error_response(&ChatError::History(e)),
        },
        Ok(_) => error_response(&ChatError::Forbidden("conversation belongs to another user".to_owned())),
        Err(e) => chat_error_response(&ChatError::History(e)),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResumeQuery {
    #[serde(default)]
    stream_id: Option<Uuid>,
    #[serde(default)]
    chat_id: Option<Uuid>,
}

/// Handle `GET /api/chat/resume`
///
/// Reattaches to an in-flight or recently finished stream by stream id,
/// or by conversation id (most recent stream).
pub(crate) async fn resume_chat(State(state): State<AppState>, Query(query): Query<ResumeQuery>) -> Response {
    let Some(ref registry) = state.resume else {
        return error_response(&ChatError::BadRequest("resumable streams are not configured".to_owned()));
    };

    let stream_id = match (query.stream_id, query.chat_id) {
        (Some(id), _) => Some(id),
        (None, Some(chat_id)) => match registry.latest_for_chat(chat_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "failed to look up resumable stream");
                None
            }
        },
        (None, None) => {
            return error_response(&ChatError::BadRequest(
                "one of stream_id or chat_id is required".to_owned(),
            ));
        }
    };

    match stream_id {
        Some(id) => sse_response(registry.attach(id)),
        None => error_response(&ChatError::BadRequest("no resumable stream found".to_owned())),
    }
}

/// Map the orchestrator's event stream onto SSE
pub(crate) fn sse_response(stream: ChatStream) -> Response {
    let events = stream.map(|event| {
        let name = event.event_name();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().event(name).data(data))
    });

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
