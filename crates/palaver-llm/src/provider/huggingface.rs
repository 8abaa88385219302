//! Hugging Face router provider
//!
//! Speaks the OpenAI-compatible chat completions protocol exposed by
//! the HF inference router. One client is constructed per configured
//! API key; together they form the credential fallback chain.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use palaver_core::{MessagePart, Role};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::{TextGenerator, TokenStream};
use crate::error::ProviderError;
use crate::types::{GenerationRequest, StreamEvent};

/// Default inference router base URL
const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1";

/// One credential-bound client for the inference router
pub struct HuggingFaceClient {
    label: String,
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HuggingFaceClient {
    /// Create a client bound to one API key
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (should never happen).
    #[must_use]
    pub fn new(label: String, api_key: SecretString, base_url: Option<Url>, timeout: Duration) -> Self {
        let base_url = base_url.unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            label,
            client,
            base_url,
            api_key,
        }
    }

    /// Build the chat completions endpoint URL
    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(handle = %self.label, error = %e, "upstream request failed");
                ProviderError::Unknown(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(handle = %self.label, status = %status, "upstream returned error");
            return Err(ProviderError::from_status(status, &body));
        }

        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceClient {
    fn label(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let body = wire_request(request, false);
        let response = self.send(&body).await?;

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("failed to parse response: {e}")))?;

        wire.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Unknown("response contained no choices".to_owned()))
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError> {
        let body = wire_request(request, true);
        let response = self.send(&body).await?;

        let event_stream = response.bytes_stream().eventsource();

        let mapped = event_stream
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }

                    match serde_json::from_str::<WireStreamChunk>(&data) {
                        Ok(chunk) => chunk
                            .choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .filter(|content| !content.is_empty())
                            .map(|content| Ok(StreamEvent::Delta(content)))
                            .collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(ProviderError::Unknown(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(mapped))
    }
}

/// Build the OpenAI-compatible request body
fn wire_request(request: &GenerationRequest, stream: bool) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(ref system) = request.system {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }

    for turn in &request.messages {
        messages.push(serde_json::json!({
            "role": role_name(turn.role),
            "content": wire_content(&turn.parts),
        }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
        "stream": stream,
    });

    if let Some(temperature) = request.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }

    body
}

const fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Convert message parts to wire content
///
/// Text-only messages are sent as a plain string; messages with image
/// parts use the structured content array. Non-image files are dropped
/// here since the protocol has no slot for them.
fn wire_content(parts: &[MessagePart]) -> serde_json::Value {
    let has_images = parts.iter().any(MessagePart::is_image);

    if !has_images {
        return serde_json::Value::String(palaver_core::joined_text(parts));
    }

    let blocks: Vec<serde_json::Value> = parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
            MessagePart::File { media_type, url, data } if media_type.starts_with("image/") => {
                let image_url = data.as_ref().map_or_else(
                    || url.clone().unwrap_or_default(),
                    |bytes| format!("data:{media_type};base64,{bytes}"),
                );
                Some(serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": image_url },
                }))
            }
            MessagePart::File { media_type, .. } => {
                tracing::debug!(%media_type, "dropping non-image file part from wire request");
                None
            }
        })
        .collect();

    serde_json::Value::Array(blocks)
}

// -- Wire response types --

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireStreamDelta,
}

#[derive(Debug, Deserialize)]
struct WireStreamDelta {
    #[serde(default)]
    content: Option<String>,
}
