use std::time::Duration;

use futures_util::StreamExt;
use palaver_config::ResumeConfig;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{ChatEvent, ChatStream};

/// Resumable stream errors
#[derive(Debug, Error)]
pub enum ResumeError {
    /// Redis connection or command error
    #[error("resume backend: {0}")]
    Backend(String),
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls with no new events before an attached stream gives up
const MAX_IDLE_POLLS: u32 = 120;

/// Registry mapping in-flight streams to their recorded events
///
/// Active only when a Redis backing store is configured; its absence
/// degrades the gateway to "no resumability" without affecting the
/// primary request path. Events are appended as the orchestrator emits
/// them, and a reattaching client replays the recording then follows
/// the live tail until the terminal event.
#[derive(Clone)]
pub struct ResumableStreamRegistry {
    client: redis::Client,
    ttl: Duration,
    key_prefix: String,
}

impl ResumableStreamRegistry {
    /// Create a registry over a Redis backing store
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis URL is invalid
    pub fn new(url: &str, ttl: Duration) -> Result<Self, ResumeError> {
        let client = redis::Client::open(url).map_err(|e| ResumeError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self {
            client,
            ttl,
            key_prefix: "palaver:stream".to_owned(),
        })
    }

    /// Create a registry from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis URL is invalid
    pub fn from_config(config: &ResumeConfig) -> Result<Self, ResumeError> {
        Self::new(config.url.as_str(), Duration::from_secs(config.ttl_secs))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, ResumeError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ResumeError::Backend(format!("connection failed: {e}")))
    }

    fn chat_key(&self, chat_id: Uuid) -> String {
        format!("{}:chat:{chat_id}", self.key_prefix)
    }

    fn events_key(&self, stream_id: Uuid) -> String {
        format!("{}:events:{stream_id}", self.key_prefix)
    }

    /// Persist the stream-to-conversation mapping
    ///
    /// Called before the stream is exposed to the client so a
    /// disconnecting client can always find the stream id again.
    ///
    /// # Errors
    ///
    /// Returns an error on connection or command failure
    pub async fn register(&self, stream_id: Uuid, chat_id: Uuid) -> Result<(), ResumeError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(self.chat_key(chat_id), stream_id.to_string(), self.ttl.as_secs())
            .await
            .map_err(|e| ResumeError::Backend(format!("SET failed: {e}")))?;

        Ok(())
    }

    /// Most recently registered stream for a conversation
    ///
    /// # Errors
    ///
    /// Returns an error on connection or command failure
    pub async fn latest_for_chat(&self, chat_id: Uuid) -> Result<Option<Uuid>, ResumeError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(self.chat_key(chat_id))
            .await
            .map_err(|e| ResumeError::Backend(format!("GET failed: {e}")))?;

        Ok(raw.and_then(|value| value.parse().ok()))
    }

    /// Record an emitted event, best effort
    ///
    /// Failures are logged and never fail the primary stream.
    pub async fn append(&self, stream_id: Uuid, event: &ChatEvent) {
        use redis::AsyncCommands;

        let Ok(data) = serde_json::to_string(event) else {
            return;
        };

        let key = self.events_key(stream_id);
        match self.connection().await {
            Ok(mut conn) => {
                let appended: Result<(), _> = conn.rpush(&key, data).await;
                if let Err(e) = appended {
                    tracing::warn!(error = %e, "failed to record stream event");
                    return;
                }
                let _: Result<(), _> = conn.expire(&key, self.ttl.as_secs().try_into().unwrap_or(i64::MAX)).await;
            }
            Err(e) => tracing::warn!(error = %e, "failed to record stream event"),
        }
    }

    /// Replay a recorded stream and follow its live tail
    ///
    /// Ends after the terminal event, or after a quiet period with no
    /// new events (the producer is gone).
    #[must_use]
    pub fn attach(&self, stream_id: Uuid) -> ChatStream {
        struct AttachState {
            registry: ResumableStreamRegistry,
            key: String,
            cursor: usize,
            idle_polls: u32,
            done: bool,
        }

        let state = AttachState {
            registry: self.clone(),
            key: self.events_key(stream_id),
            cursor: 0,
            idle_polls: 0,
            done: false,
        };

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                let batch = state.registry.read_events(&state.key, state.cursor).await;
                match batch {
                    Ok(events) if events.is_empty() => {
                        if state.idle_polls >= MAX_IDLE_POLLS {
                            tracing::debug!("attached stream went quiet; closing");
                            return None;
                        }
                        state.idle_polls += 1;
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                    Ok(events) => {
                        state.cursor += events.len();
                        state.idle_polls = 0;
                        state.done = events.iter().any(ChatEvent::is_terminal);
                        return Some((events, state));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read recorded stream");
                        return None;
                    }
                }
            }
        })
        .flat_map(futures_util::stream::iter);

        Box::pin(stream)
    }

    /// Recorded events from `cursor` onward
    async fn read_events(&self, key: &str, cursor: usize) -> Result<Vec<ChatEvent>, ResumeError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let start = isize::try_from(cursor).map_err(|e| ResumeError::Backend(e.to_string()))?;

        let raw: Vec<String> = conn
            .lrange(key, start, -1)
            .await
            .map_err(|e| ResumeError::Backend(format!("LRANGE failed: {e}")))?;

        Ok(raw
            .into_iter()
            .filter_map(|data| serde_json::from_str(&data).ok())
            .collect())
    }
}
