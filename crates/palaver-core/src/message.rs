use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// Individual part within a message
///
/// File parts carry an optional inline base64 payload; the orchestrator
/// fills `data` from `url` before generation so providers never fetch
/// remote bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Text content block
    Text {
        /// The text string
        text: String,
    },
    /// File reference, optionally with inlined bytes
    File {
        /// MIME type (e.g. `image/png`)
        media_type: String,
        /// Remote location of the file, if not yet inlined
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Base64-encoded file bytes, once inlined
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
}

impl MessagePart {
    /// Whether this part references an image
    #[must_use]
    pub fn is_image(&self) -> bool {
        match self {
            Self::File { media_type, .. } => media_type.starts_with("image/"),
            Self::Text { .. } => false,
        }
    }
}

/// Concatenate the text parts of a message, space-separated
#[must_use]
pub fn joined_text(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::Text { text } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}
