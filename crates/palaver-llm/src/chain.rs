//! Credential fallback chain construction
//!
//! One handle exists per configured API key, in configuration order.
//! The first key is always preferred; later keys only absorb failures
//! classified as retryable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use palaver_config::{ProviderConfig, is_reasoning_model};
use secrecy::ExposeSecret;

use crate::provider::TextGenerator;
use crate::provider::huggingface::HuggingFaceClient;
use crate::provider::reasoning::ReasoningExtractor;

/// Source of ordered fallback chains for a logical model
///
/// Abstracted as a trait so orchestration can be exercised against
/// scripted handles in tests.
pub trait ChainSource: Send + Sync {
    /// Whether any credentials are configured at all
    fn has_credentials(&self) -> bool;

    /// Ordered handles to try for the given model
    ///
    /// Empty only when zero credentials are configured; callers must
    /// treat that as service unavailable rather than skip generation.
    fn chain(&self, model_id: &str) -> Vec<Arc<dyn TextGenerator>>;

    /// First handle for the given model, for single-shot delegate calls
    fn single(&self, model_id: &str) -> Option<Arc<dyn TextGenerator>> {
        self.chain(model_id).into_iter().next()
    }
}

/// Registry of provider handles built once at process start
///
/// Explicitly constructed and injected; there is no hidden process-wide
/// client state.
pub struct ProviderRegistry {
    clients: Vec<Arc<HuggingFaceClient>>,
}

impl ProviderRegistry {
    /// Build clients from configuration, one per unique API key
    ///
    /// Duplicate keys are dropped, preserving first-seen order.
    #[must_use]
    pub fn from_config(config: &ProviderConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut seen = HashSet::new();
        let mut clients = Vec::new();

        for (index, key) in config.api_keys.iter().enumerate() {
            let exposed = key.expose_secret().trim();
            if exposed.is_empty() || !seen.insert(exposed.to_owned()) {
                continue;
            }

            clients.push(Arc::new(HuggingFaceClient::new(
                format!("hf-key-{index}"),
                key.clone(),
                config.base_url.clone(),
                timeout,
            )));
        }

        if clients.is_empty() {
            tracing::warn!("no provider API keys configured");
        }

        Self { clients }
    }

    /// Number of distinct credentials
    #[must_use]
    pub fn credential_count(&self) -> usize {
        self.clients.len()
    }
}

impl ChainSource for ProviderRegistry {
    fn has_credentials(&self) -> bool {
        !self.clients.is_empty()
    }

    fn chain(&self, model_id: &str) -> Vec<Arc<dyn TextGenerator>> {
        let reasoning = is_reasoning_model(model_id);

        self.clients
            .iter()
            .map(|client| {
                let base: Arc<dyn TextGenerator> = Arc::clone(client) as Arc<dyn TextGenerator>;
                if reasoning {
                    Arc::new(ReasoningExtractor::new(base)) as Arc<dyn TextGenerator>
                } else {
                    base
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config_with_keys(keys: &[&str]) -> ProviderConfig {
        ProviderConfig {
            base_url: None,
            api_keys: keys.iter().map(|k| SecretString::from(*k)).collect(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn duplicate_keys_deduplicated_in_order() {
        let registry = ProviderRegistry::from_config(&config_with_keys(&["a", "b", "a", "c"]));
        assert_eq!(registry.credential_count(), 3);

        let chain = registry.chain("some-model");
        let labels: Vec<&str> = chain.iter().map(|h| h.label()).collect();
        assert_eq!(labels, vec!["hf-key-0", "hf-key-1", "hf-key-3"]);
    }

    #[test]
    fn empty_keys_produce_empty_chain() {
        let registry = ProviderRegistry::from_config(&config_with_keys(&[]));
        assert!(!registry.has_credentials());
        assert!(registry.chain("any").is_empty());
    }

    #[test]
    fn reasoning_models_get_wrapped_handles() {
        let registry = ProviderRegistry::from_config(&config_with_keys(&["a"]));

        let chain = registry.chain("qwen3-32b-thinking");
        assert_eq!(chain[0].label(), "hf-key-0+reasoning");

        let chain = registry.chain("qwen3-32b");
        assert_eq!(chain[0].label(), "hf-key-0");
    }
}
