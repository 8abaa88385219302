use std::pin::Pin;

use futures_util::Stream;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbound event stream for one chat turn
pub type ChatStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Typed event on the outbound stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatEvent {
    /// Incremental content; transient deltas are advisory and not part
    /// of the persisted message
    TextDelta {
        /// Text fragment
        delta: String,
        /// Advisory-only marker
        #[serde(default, skip_serializing_if = "is_false")]
        transient: bool,
    },
    /// Conversation title, once the background generation finishes
    ChatTitle {
        /// Generated title
        title: String,
    },
    /// Metadata for the persisted assistant message
    MessageMetadata {
        /// Persisted message id
        message_id: Uuid,
        /// Whether moderation flagged the message
        moderation: bool,
        /// Persistence time
        created_at: Timestamp,
    },
    /// Terminal failure; distinguishes "generation failed" from a
    /// normal finish
    Error {
        /// Stable machine-readable code
        code: String,
        /// Human-readable description
        message: String,
    },
    /// Normal completion
    Finish,
}

impl ChatEvent {
    /// SSE event name for this event
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ChatTitle { .. } => "chat-title",
            Self::MessageMetadata { .. } => "message-metadata",
            Self::Error { .. } => "error",
            Self::Finish => "finish",
        }
    }

    /// Whether this event ends the stream
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Finish)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}
