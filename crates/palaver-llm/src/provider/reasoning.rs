//! Reasoning extraction wrapper
//!
//! Reasoning variants stream their internal deliberation inside
//! `<think>` tags. This wrapper separates those segments into
//! [`StreamEvent::Thinking`] events so they are never surfaced as
//! ordinary content, and rewrites the variant id to the base model id
//! before delegating.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, future, stream};

use super::{TextGenerator, TokenStream};
use crate::error::ProviderError;
use crate::types::{GenerationRequest, StreamEvent};

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Wraps a base handle, separating `<think>` segments from the stream
pub struct ReasoningExtractor {
    inner: Arc<dyn TextGenerator>,
    label: String,
}

impl ReasoningExtractor {
    /// Wrap a base handle
    #[must_use]
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        let label = format!("{}+reasoning", inner.label());
        Self { inner, label }
    }

    /// Rewrite the request to target the base model
    fn base_request(request: &GenerationRequest) -> GenerationRequest {
        let mut base = request.clone();
        if let Some(stripped) = base.model.strip_suffix("-thinking") {
            base.model = stripped.to_owned();
        }
        base
    }
}

#[async_trait]
impl TextGenerator for ReasoningExtractor {
    fn label(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let base = Self::base_request(request);
        let raw = self.inner.generate(&base).await?;

        let mut scanner = TagScanner::new();
        let mut events = scanner.push(&raw);
        events.extend(scanner.finish());

        let visible: String = events
            .into_iter()
            .filter_map(|event| match event {
                StreamEvent::Delta(text) => Some(text),
                _ => None,
            })
            .collect();

        Ok(visible)
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError> {
        let base = Self::base_request(request);
        let upstream = self.inner.generate_stream(&base).await?;

        let extracted = upstream
            .scan(TagScanner::new(), |scanner, item| {
                let out: Vec<Result<StreamEvent, ProviderError>> = match item {
                    Ok(StreamEvent::Delta(text)) => scanner.push(&text).into_iter().map(Ok).collect(),
                    Ok(StreamEvent::Done) => {
                        let mut tail: Vec<_> = scanner.finish().into_iter().map(Ok).collect();
                        tail.push(Ok(StreamEvent::Done));
                        tail
                    }
                    other => vec![other],
                };
                future::ready(Some(out))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(extracted))
    }
}

/// Incremental `<think>` tag scanner
///
/// Holds back the longest trailing fragment that could still become a
/// tag marker, so markers split across chunk boundaries are detected.
struct TagScanner {
    in_think: bool,
    carry: String,
}

impl TagScanner {
    const fn new() -> Self {
        Self {
            in_think: false,
            carry: String::new(),
        }
    }

    fn push(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.carry.push_str(chunk);
        let mut out = Vec::new();

        loop {
            let marker = if self.in_think { CLOSE_TAG } else { OPEN_TAG };

            if let Some(i) = self.carry.find(marker) {
                if i > 0 {
                    let segment: String = self.carry.drain(..i).collect();
                    out.push(self.wrap(segment));
                }
                self.carry.drain(..marker.len());
                self.in_think = !self.in_think;
            } else {
                let keep = holdback(&self.carry, marker);
                let emit = self.carry.len() - keep;
                if emit > 0 {
                    let segment: String = self.carry.drain(..emit).collect();
                    out.push(self.wrap(segment));
                }
                break;
            }
        }

        out
    }

    /// Flush any held-back fragment at end of stream
    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.carry.is_empty() {
            return Vec::new();
        }
        let segment = std::mem::take(&mut self.carry);
        vec![self.wrap(segment)]
    }

    fn wrap(&self, text: String) -> StreamEvent {
        if self.in_think {
            StreamEvent::Thinking(text)
        } else {
            StreamEvent::Delta(text)
        }
    }
}

/// Length of the longest suffix of `s` that is a proper prefix of `marker`
fn holdback(s: &str, marker: &str) -> usize {
    for k in (1..marker.len()).rev() {
        if s.ends_with(&marker[..k]) {
            return k;
        }
    }
    0
}
