use jiff::Timestamp;
use palaver_core::{MessagePart, Role};
use palaver_history::{MessageRecord, Visibility};
use palaver_llm::ChatTurn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;

/// One inbound chat request
///
/// Carries either `message` (a single new turn) or `messages` (the
/// full list for a tool-approval continuation), never both.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Conversation id; created lazily on the first user turn
    pub id: Uuid,
    /// The new message for a normal turn
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    /// Full message list for a tool-approval continuation
    #[serde(default)]
    pub messages: Option<Vec<IncomingMessage>>,
    /// Logical model id, possibly `"auto"`
    pub selected_model_id: String,
    /// Visibility for a newly created conversation
    #[serde(default)]
    pub visibility: Visibility,
}

/// A message as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Caller-assigned message id
    pub id: Uuid,
    /// Author role
    pub role: Role,
    /// Ordered typed parts
    pub parts: Vec<MessagePart>,
}

impl IncomingMessage {
    /// Convert to a provider conversation turn
    #[must_use]
    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn {
            role: self.role,
            parts: self.parts.clone(),
        }
    }

    /// Rehydrate from a persisted record
    #[must_use]
    pub fn from_record(record: &MessageRecord) -> Self {
        Self {
            id: record.id,
            role: record.role,
            parts: record.parts.clone(),
        }
    }

    /// Build a persistence record for this message
    #[must_use]
    pub fn to_record(&self, chat_id: Uuid, moderation: bool, created_at: Timestamp) -> MessageRecord {
        MessageRecord {
            id: self.id,
            chat_id,
            role: self.role,
            parts: self.parts.clone(),
            created_at,
            moderation,
        }
    }
}

impl ChatRequest {
    /// Whether this request is a tool-approval continuation
    #[must_use]
    pub const fn is_tool_approval(&self) -> bool {
        self.messages.is_some()
    }

    /// Check the request shape before any side effect
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` on a malformed shape
    pub fn validate(&self) -> Result<(), ChatError> {
        match (&self.message, &self.messages) {
            (Some(_), Some(_)) => Err(ChatError::BadRequest(
                "provide either message or messages, not both".to_owned(),
            )),
            (None, None) => Err(ChatError::BadRequest("one of message or messages is required".to_owned())),
            (Some(message), None) => {
                if message.parts.is_empty() {
                    return Err(ChatError::BadRequest("message has no parts".to_owned()));
                }
                if message.role == Role::System {
                    return Err(ChatError::BadRequest("system messages cannot be submitted".to_owned()));
                }
                Ok(())
            }
            (None, Some(messages)) => {
                if messages.is_empty() {
                    return Err(ChatError::BadRequest("messages must not be empty".to_owned()));
                }
                Ok(())
            }
        }
    }
}
