//! Mock inference backend for integration tests
//!
//! Implements a minimal OpenAI-compatible chat completions API. The
//! moderation classifier model replies with a verdict keyed off the
//! classified text, the title model replies with a fixed title, and
//! the chat model streams canned content. Failures can be injected per
//! bearer key for the chat model only, so the classifier and title
//! delegate calls always succeed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Model id the gateway config points moderation at
pub const MODERATION_MODEL: &str = "mock-moderation";

/// Model id the gateway config points title generation at
pub const TITLE_MODEL: &str = "mock-title";

/// Default streamed chat response
pub const DEFAULT_RESPONSE: &str = "Hello from the mock provider";

/// Mock backend with scripted responses
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    response_content: String,
    /// Bearer key -> HTTP status to fail chat completions with
    fail_bearers: HashMap<String, u16>,
    chat_completion_count: AtomicU32,
}

impl MockProvider {
    /// Start a mock that always succeeds with the default response
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(DEFAULT_RESPONSE.to_owned(), HashMap::new()).await
    }

    /// Start a mock with custom chat response content
    pub async fn start_with_response(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(content.to_owned(), HashMap::new()).await
    }

    /// Start a mock that fails chat completions for specific bearer keys
    pub async fn start_failing_bearers(fail: &[(&str, u16)]) -> anyhow::Result<Self> {
        let fail_bearers = fail
            .iter()
            .map(|(key, status)| ((*key).to_owned(), *status))
            .collect();
        Self::start_inner(DEFAULT_RESPONSE.to_owned(), fail_bearers).await
    }

    async fn start_inner(response_content: String, fail_bearers: HashMap<String, u16>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            response_content,
            fail_bearers,
            chat_completion_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as the provider router
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of chat-model completion requests received
    pub fn chat_completion_count(&self) -> u32 {
        self.state.chat_completion_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Wire types --

#[derive(Debug, Deserialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(default)]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[allow(dead_code)]
    role: String,
    #[serde(default)]
    content: serde_json::Value,
}

// -- Handler --

async fn handle_chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(req): Json<ChatCompletionRequest>,
) -> impl IntoResponse {
    // Delegate models: classifier verdict and fixed title
    if req.model == MODERATION_MODEL {
        let prompt = last_message_text(&req);
        let verdict = if prompt.contains("contraband") {
            "BLOCK"
        } else if prompt.contains("grisly") {
            "REVIEW"
        } else {
            "ALLOW"
        };
        return completion_json(&req.model, verdict).into_response();
    }

    if req.model == TITLE_MODEL {
        return completion_json(&req.model, "Mock chat title").into_response();
    }

    state.chat_completion_count.fetch_add(1, Ordering::Relaxed);

    // Failure injection applies to the chat model only
    if let Some(status) = bearer(&headers).and_then(|key| state.fail_bearers.get(&key)) {
        let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            code,
            Json(serde_json::json!({
                "error": { "message": "mock provider injected failure", "type": "mock_error" }
            })),
        )
            .into_response();
    }

    if req.stream.unwrap_or(false) {
        return streaming_response(&req.model, &state.response_content).into_response();
    }

    completion_json(&req.model, &state.response_content).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn last_message_text(req: &ChatCompletionRequest) -> String {
    req.messages
        .last()
        .map(|message| match &message.content {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn completion_json(model: &str, content: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": "chatcmpl-mock-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    }))
}

/// Build an SSE body streaming the content one token at a time
fn streaming_response(model: &str, content: &str) -> impl IntoResponse {
    let mut body = String::new();

    for token in content.split_inclusive(' ') {
        let chunk = serde_json::json!({
            "id": "chatcmpl-mock-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{
                "index": 0,
                "delta": { "content": token },
                "finish_reason": serde_json::Value::Null
            }]
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }

    body.push_str("data: [DONE]\n\n");

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}
