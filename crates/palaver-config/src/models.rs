use serde::Deserialize;

/// Virtual model id resolved to a concrete catalog entry per request
pub const AUTO_MODEL_ID: &str = "auto";

/// Model catalog and selection defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Default general-purpose model id
    #[serde(default)]
    pub default: String,
    /// Model used for chat title generation
    #[serde(default)]
    pub title_model: Option<String>,
    /// Available models
    #[serde(default)]
    pub catalog: Vec<ModelEntry>,
}

/// One entry in the static model catalog
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    /// Logical model id users select
    pub id: String,
    /// Display name
    pub name: String,
    /// Provider label (informational)
    pub provider: String,
    /// Base credit cost per request
    #[serde(default = "default_cost")]
    pub credit_cost: u32,
    /// Whether the model supports tool calling
    #[serde(default)]
    pub supports_tools: bool,
    /// Whether the model accepts image input
    #[serde(default)]
    pub supports_vision: bool,
    /// Whether the model is preferred for code-heavy prompts
    #[serde(default)]
    pub coding: bool,
}

impl ModelEntry {
    /// Whether this id names a reasoning/thinking variant
    ///
    /// Reasoning variants are served by wrapping the base model with an
    /// extraction step in the provider layer.
    #[must_use]
    pub fn is_reasoning(&self) -> bool {
        is_reasoning_model(&self.id)
    }
}

/// Whether a model id names a reasoning/thinking variant
#[must_use]
pub fn is_reasoning_model(id: &str) -> bool {
    id.contains("reasoning") || id.ends_with("-thinking")
}

impl ModelsConfig {
    /// Look up a catalog entry by id
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&ModelEntry> {
        self.catalog.iter().find(|entry| entry.id == id)
    }

    /// Whether the id is the virtual auto id or a catalog entry
    #[must_use]
    pub fn is_known(&self, id: &str) -> bool {
        id == AUTO_MODEL_ID || self.entry(id).is_some()
    }

    /// First vision-capable catalog entry, if any
    #[must_use]
    pub fn first_vision(&self) -> Option<&ModelEntry> {
        self.catalog.iter().find(|entry| entry.supports_vision)
    }

    /// First coding-flagged catalog entry, if any
    #[must_use]
    pub fn first_coding(&self) -> Option<&ModelEntry> {
        self.catalog.iter().find(|entry| entry.coding)
    }

    /// Model id used for title generation, falling back to the default
    #[must_use]
    pub fn title_model(&self) -> &str {
        self.title_model.as_deref().unwrap_or(&self.default)
    }
}

fn default_cost() -> u32 {
    1
}
