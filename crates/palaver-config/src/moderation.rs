use serde::Deserialize;

/// Content moderation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    /// Model used for the moderation classifier
    #[serde(default = "default_moderation_model")]
    pub model: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            model: default_moderation_model(),
        }
    }
}

fn default_moderation_model() -> String {
    "meta-llama/Llama-3.1-8B-Instruct".to_owned()
}
