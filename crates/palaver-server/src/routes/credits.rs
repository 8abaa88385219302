use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use jiff::Timestamp;
use palaver_chat::ChatError;
use palaver_core::{Identity, UserClass};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::errors::{chat_error_response, error_response};

/// Credit state for client display
#[derive(Debug, Serialize)]
struct CreditsView {
    user_type: UserClass,
    remaining_credits: u32,
    daily_credits: u32,
    borrowed: u32,
    reset_at: Timestamp,
    active_multiplier: f64,
}

/// Handle `GET /api/credits`
///
/// The identity middleware has already provisioned a guest identity if
/// none existed, mirroring the chat endpoint's bootstrap.
pub(crate) async fn get_credits(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> Response {
    match state.ledger.snapshot(&identity).await {
        Ok(snapshot) => {
            let active_multiplier = state.pricing.active_multiplier().await;
            Json(CreditsView {
                user_type: snapshot.class,
                remaining_credits: snapshot.remaining,
                daily_credits: snapshot.daily,
                borrowed: snapshot.borrowed,
                reset_at: snapshot.reset_at,
                active_multiplier,
            })
            .into_response()
        }
        Err(e) => chat_error_response(&ChatError::Quota(e)),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BorrowRequest {
    amount: u32,
}

/// Handle `POST /api/credits/borrow`
///
/// Explicit user-initiated borrow against the next day's allotment,
/// bounded by the same ceiling the debit path uses.
pub(crate) async fn borrow_credits(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<BorrowRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(json) => json,
        Err(rejection) => return error_response(&ChatError::BadRequest(rejection.body_text())),
    };

    let amount = body.amount.max(1);

    match state.ledger.borrow(&identity, amount).await {
        Ok(outcome) if outcome.allowed => Json(serde_json::json!({
            "borrowed": outcome.borrowed,
            "remaining_credits": outcome.remaining,
            "borrow_available": outcome.borrow_available,
        }))
        .into_response(),
        Ok(outcome) => error_response(&ChatError::RateLimited {
            remaining: outcome.remaining,
            required: amount,
            borrow_available: outcome.borrow_available,
        }),
        Err(e) => chat_error_response(&ChatError::Quota(e)),
    }
}
