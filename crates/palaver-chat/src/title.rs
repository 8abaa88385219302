use std::sync::Arc;

use palaver_llm::{GenerationRequest, TextGenerator};

const TITLE_PROMPT: &str = "Write a very short title (at most 6 words, no quotes, no punctuation \
at the end) summarizing this opening message of a conversation:\n\n";

const MAX_TITLE_CHARS: usize = 80;

/// Generates a conversation title from the first user turn
///
/// Runs as a detached background task; a failure is logged and never
/// fails or blocks the main response.
#[derive(Clone)]
pub struct TitleGenerator {
    handle: Option<Arc<dyn TextGenerator>>,
    model: String,
}

impl TitleGenerator {
    /// Create a generator over the title model handle
    #[must_use]
    pub fn new(handle: Option<Arc<dyn TextGenerator>>, model: impl Into<String>) -> Self {
        Self {
            handle,
            model: model.into(),
        }
    }

    /// Generate a title, or `None` on any failure
    pub async fn generate(&self, first_user_text: &str) -> Option<String> {
        let handle = self.handle.as_ref()?;

        let mut request = GenerationRequest::prompt(self.model.clone(), format!("{TITLE_PROMPT}{first_user_text}"));
        request.max_tokens = Some(32);

        match handle.generate(&request).await {
            Ok(raw) => {
                let title = clean_title(&raw);
                if title.is_empty() { None } else { Some(title) }
            }
            Err(e) => {
                tracing::warn!(error = %e, "title generation failed");
                None
            }
        }
    }
}

/// Normalize a raw title reply: first line, stripped quotes, capped length
fn clean_title(raw: &str) -> String {
    let line = raw.lines().next().unwrap_or_default();
    let trimmed = line.trim().trim_matches(['"', '\'', '`']).trim();
    trimmed.chars().take(MAX_TITLE_CHARS).collect()
}
