use palaver_core::{MessagePart, Role};
use serde::{Deserialize, Serialize};

/// One conversation turn supplied to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Role of the turn author
    pub role: Role,
    /// Ordered message parts
    pub parts: Vec<MessagePart>,
}

/// A text generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Concrete model identifier to send upstream
    pub model: String,
    /// System directive, prepended as a system message
    pub system: Option<String>,
    /// Conversation turns in order
    pub messages: Vec<ChatTurn>,
    /// Sampling temperature; 0 pins the output for classifier use
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Build a single-turn prompt request, as used by the moderation
    /// classifier and title generator
    #[must_use]
    pub fn prompt(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: vec![ChatTurn {
                role: Role::User,
                parts: vec![MessagePart::Text { text: text.into() }],
            }],
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Event yielded while streaming a generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental visible content
    Delta(String),
    /// Incremental internal reasoning, separated by the extraction
    /// wrapper and never forwarded as ordinary content
    Thinking(String),
    /// Stream has completed
    Done,
}
