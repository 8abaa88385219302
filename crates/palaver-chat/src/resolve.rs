use std::sync::OnceLock;

use palaver_config::{AUTO_MODEL_ID, ModelEntry, ModelsConfig};
use regex::Regex;

use crate::error::ChatError;

/// A concrete model selected for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Catalog id to generate with
    pub id: String,
    /// Base credit cost before the pricing multiplier
    pub credit_cost: u32,
    /// Whether tool calling may be enabled
    pub supports_tools: bool,
    /// Whether image input is accepted
    pub supports_vision: bool,
}

/// Outcome of model resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A model was selected
    Model(ResolvedModel),
    /// Images are present but no vision-capable model exists; the
    /// request short-circuits with an informational notice and no
    /// generation or charge
    NoVisionAvailable,
}

/// Resolve the selected model id to a concrete catalog entry
///
/// `"auto"` resolves deterministically: an attached image picks the
/// first vision-capable model, else code-like text picks the coding
/// model, else the configured default. A non-vision selection with an
/// image present force-switches to any vision model.
///
/// # Errors
///
/// Returns `BadRequest` if the id is not in the catalog.
pub fn resolve_model(
    models: &ModelsConfig,
    selected: &str,
    user_text: &str,
    has_images: bool,
) -> Result<Resolution, ChatError> {
    if !models.is_known(selected) {
        return Err(ChatError::BadRequest(format!("unsupported model \"{selected}\"")));
    }

    let id = if selected == AUTO_MODEL_ID {
        pick_auto(models, user_text, has_images)
    } else {
        selected.to_owned()
    };

    let entry = models
        .entry(&id)
        .ok_or_else(|| ChatError::BadRequest(format!("unsupported model \"{id}\"")))?;

    if has_images && !entry.supports_vision {
        return match models.first_vision() {
            Some(vision) => Ok(Resolution::Model(from_entry(vision))),
            None => Ok(Resolution::NoVisionAvailable),
        };
    }

    Ok(Resolution::Model(from_entry(entry)))
}

/// Deterministic heuristic behind the `"auto"` virtual model
fn pick_auto(models: &ModelsConfig, user_text: &str, has_images: bool) -> String {
    // Vision takes priority when images are present
    if has_images && let Some(vision) = models.first_vision() {
        return vision.id.clone();
    }

    if looks_like_code(user_text) && let Some(coder) = models.first_coding() {
        return coder.id.clone();
    }

    models.default.clone()
}

/// Whether the text reads like a code-heavy prompt
fn looks_like_code(text: &str) -> bool {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"function|const\s+\w+\s*=\s*\(|class\s+\w+|def\s+\w+|import\s+\w+")
                .expect("must be valid regex")
        })
    }

    text.contains("```") || re().is_match(&text.to_lowercase())
}

fn from_entry(entry: &ModelEntry) -> ResolvedModel {
    ResolvedModel {
        id: entry.id.clone(),
        credit_cost: entry.credit_cost,
        supports_tools: entry.supports_tools,
        supports_vision: entry.supports_vision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vision: bool, coding: bool) -> ModelEntry {
        ModelEntry {
            id: id.to_owned(),
            name: id.to_owned(),
            provider: "test".to_owned(),
            credit_cost: 1,
            supports_tools: true,
            supports_vision: vision,
            coding,
        }
    }

    fn catalog(with_vision: bool) -> ModelsConfig {
        let mut entries = vec![entry("general", false, false), entry("coder", false, true)];
        if with_vision {
            entries.push(entry("vision", true, false));
        }
        ModelsConfig {
            default: "general".to_owned(),
            title_model: None,
            catalog: entries,
        }
    }

    fn resolved_id(resolution: Resolution) -> String {
        match resolution {
            Resolution::Model(model) => model.id,
            Resolution::NoVisionAvailable => panic!("expected a model"),
        }
    }

    #[test]
    fn unknown_model_rejected() {
        let result = resolve_model(&catalog(true), "unlisted", "", false);
        assert!(matches!(result, Err(ChatError::BadRequest(_))));
    }

    #[test]
    fn auto_with_images_picks_vision_and_skips_code_heuristic() {
        let code_text = "```rust\nfn main() {}\n```";
        let resolution = resolve_model(&catalog(true), AUTO_MODEL_ID, code_text, true).unwrap();
        assert_eq!(resolved_id(resolution), "vision");
    }

    #[test]
    fn auto_with_code_text_picks_coding_model() {
        let resolution = resolve_model(&catalog(true), AUTO_MODEL_ID, "def fib(n): return n", false).unwrap();
        assert_eq!(resolved_id(resolution), "coder");
    }

    #[test]
    fn auto_defaults_to_general_model() {
        let resolution = resolve_model(&catalog(true), AUTO_MODEL_ID, "tell me a story", false).unwrap();
        assert_eq!(resolved_id(resolution), "general");
    }

    #[test]
    fn images_force_switch_to_vision_model() {
        let resolution = resolve_model(&catalog(true), "general", "look at this", true).unwrap();
        assert_eq!(resolved_id(resolution), "vision");
    }

    #[test]
    fn images_without_vision_model_short_circuit() {
        let resolution = resolve_model(&catalog(false), "general", "look at this", true).unwrap();
        assert_eq!(resolution, Resolution::NoVisionAvailable);
    }

    #[test]
    fn explicit_model_passes_through() {
        let resolution = resolve_model(&catalog(true), "coder", "", false).unwrap();
        assert_eq!(resolved_id(resolution), "coder");
    }
}
