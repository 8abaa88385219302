use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::StreamExt;
use palaver_core::MessagePart;

use crate::request::IncomingMessage;

/// Inlines remote file attachments as base64 payloads
///
/// Runs with bounded concurrency across the parts of one request and
/// completes before generation begins; it is never interleaved with
/// streaming. Fetch failures leave the part untouched so a broken
/// attachment degrades to a missing one rather than failing the turn.
pub struct AttachmentInliner {
    client: reqwest::Client,
    concurrency: usize,
}

impl Default for AttachmentInliner {
    fn default() -> Self {
        Self::new(4)
    }
}

impl AttachmentInliner {
    /// Create an inliner with the given fetch concurrency
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            concurrency: concurrency.max(1),
        }
    }

    /// Inline every un-inlined file part across the message list
    pub async fn inline(&self, messages: Vec<IncomingMessage>) -> Vec<IncomingMessage> {
        let mut out = Vec::with_capacity(messages.len());

        for mut message in messages {
            let parts = std::mem::take(&mut message.parts);
            // `buffered` keeps part order while fetching concurrently
            message.parts = futures_util::stream::iter(parts.into_iter().map(|part| self.inline_part(part)))
                .buffered(self.concurrency)
                .collect()
                .await;
            out.push(message);
        }

        out
    }

    async fn inline_part(&self, part: MessagePart) -> MessagePart {
        match part {
            MessagePart::File {
                media_type,
                url: Some(url),
                data: None,
            } => match self.fetch(&url).await {
                Ok(encoded) => MessagePart::File {
                    media_type,
                    url: Some(url),
                    data: Some(encoded),
                },
                Err(e) => {
                    tracing::warn!(%url, error = %e, "failed to inline file attachment");
                    MessagePart::File {
                        media_type,
                        url: Some(url),
                        data: None,
                    }
                }
            },
            other => other,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(BASE64.encode(&bytes))
    }
}
