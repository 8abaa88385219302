//! Chat history persistence for Palaver
//!
//! A narrow record API over conversations and messages. The gateway
//! treats the durable store as an external collaborator; this crate
//! provides the contract plus an in-memory backend (default, and used
//! throughout tests) and a Redis backend for deployments.

mod memory;
mod redis;

use async_trait::async_trait;
use jiff::Timestamp;
use palaver_core::{MessagePart, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use self::memory::MemoryHistory;
pub use self::redis::RedisHistory;

/// History store errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Referenced record does not exist
    #[error("record not found")]
    NotFound,
    /// Storage backend connection or command error
    #[error("history backend: {0}")]
    Backend(String),
    /// Record serialization error
    #[error("history serialization: {0}")]
    Serialization(String),
}

/// Conversation visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to the owner only
    #[default]
    Private,
    /// Shareable by link
    Public,
}

/// A conversation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Conversation id
    pub id: Uuid,
    /// Owning user id (account or guest)
    pub user_id: String,
    /// Display title
    pub title: String,
    /// Visibility setting
    pub visibility: Visibility,
    /// Creation time
    pub created_at: Timestamp,
}

/// A message record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message id
    pub id: Uuid,
    /// Parent conversation id
    pub chat_id: Uuid,
    /// Author role
    pub role: Role,
    /// Ordered typed parts
    pub parts: Vec<MessagePart>,
    /// Creation time
    pub created_at: Timestamp,
    /// Whether the message was flagged by moderation
    pub moderation: bool,
}

/// Pagination cursor for chat listings
///
/// Exactly one direction may be supplied per request; the HTTP layer
/// rejects requests carrying both.
#[derive(Debug, Clone, Copy)]
pub enum Cursor {
    /// Items strictly after this chat in newest-first order
    After(Uuid),
    /// Items strictly before this chat in newest-first order
    Before(Uuid),
}

/// One page of a chat listing, newest first
#[derive(Debug, Clone, Serialize)]
pub struct ChatPage {
    /// Chats on this page
    pub chats: Vec<ChatRecord>,
    /// Whether more items exist beyond this page
    pub has_more: bool,
}

/// The persistence contract the orchestrator calls into
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetch a conversation by id
    async fn get_chat(&self, id: Uuid) -> Result<Option<ChatRecord>, HistoryError>;

    /// Create a conversation
    async fn create_chat(&self, record: ChatRecord) -> Result<(), HistoryError>;

    /// Update a conversation's title
    async fn update_title(&self, id: Uuid, title: &str) -> Result<(), HistoryError>;

    /// Delete a conversation and its messages
    async fn delete_chat(&self, id: Uuid) -> Result<(), HistoryError>;

    /// List a user's conversations, newest first
    async fn list_chats(&self, user_id: &str, limit: usize, cursor: Option<Cursor>) -> Result<ChatPage, HistoryError>;

    /// Delete all of a user's conversations, returning the count
    async fn delete_chats_for_user(&self, user_id: &str) -> Result<u64, HistoryError>;

    /// List a conversation's messages in creation order
    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<MessageRecord>, HistoryError>;

    /// Append message records
    async fn save_messages(&self, messages: Vec<MessageRecord>) -> Result<(), HistoryError>;

    /// Replace the parts of an existing message
    async fn update_message(&self, id: Uuid, parts: Vec<MessagePart>) -> Result<(), HistoryError>;
}
