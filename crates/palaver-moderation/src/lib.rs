//! Classifier-backed content moderation for Palaver
//!
//! Classifies a text blob into allow/review/block using a delegate
//! generation call pinned to temperature 0 with a constrained output
//! vocabulary. Replies outside the vocabulary fail open to allow (and
//! are logged as anomalous); transport failures of the delegate call
//! itself do NOT fail open — they surface as an error so the request
//! fails rather than silently bypassing moderation.

use std::sync::Arc;

use palaver_llm::{GenerationRequest, TextGenerator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Moderation errors
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The delegate classifier call failed at the transport level
    #[error("moderation classifier unavailable: {0}")]
    Unavailable(String),
}

/// Moderation decision for a text blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Content is acceptable
    Allow,
    /// Content is borderline; keep it but flag for review
    Review,
    /// Content must be suppressed
    Block,
}

impl Verdict {
    /// Whether the message should carry the moderation flag
    #[must_use]
    pub const fn flags_message(self) -> bool {
        matches!(self, Self::Review | Self::Block)
    }
}

const CLASSIFIER_PROMPT: &str = "You are a strict content safety classifier. \
Classify the following message. Respond with exactly one word: \
ALLOW if the message is acceptable, \
REVIEW if it is borderline and should be flagged for human review, \
BLOCK if it is clearly unsafe (violence, sexual content involving minors, \
credible threats, instructions for serious harm).\n\nMessage:\n";

/// Classifier-backed moderation gate
///
/// Applied twice per chat turn: to the inbound user text before any
/// quota debit, and to the complete outbound model text after
/// generation finishes.
pub struct ModerationGate {
    classifier: Option<Arc<dyn TextGenerator>>,
    model: String,
}

impl ModerationGate {
    /// Create a gate over a delegate classifier handle
    ///
    /// `classifier` is `None` when no provider credentials are
    /// configured; classification then fails as unavailable rather
    /// than silently allowing content through.
    #[must_use]
    pub fn new(classifier: Option<Arc<dyn TextGenerator>>, model: impl Into<String>) -> Self {
        Self {
            classifier,
            model: model.into(),
        }
    }

    /// Classify a text blob
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::Unavailable`] if the delegate call
    /// fails; parse anomalies are not errors.
    pub async fn classify(&self, text: &str) -> Result<Verdict, ModerationError> {
        let Some(ref classifier) = self.classifier else {
            return Err(ModerationError::Unavailable("no classifier handle configured".to_owned()));
        };

        let mut request = GenerationRequest::prompt(self.model.clone(), format!("{CLASSIFIER_PROMPT}{text}"));
        // Zero variance so identical input always yields the same verdict
        request.temperature = Some(0.0);
        request.max_tokens = Some(8);

        let raw = classifier
            .generate(&request)
            .await
            .map_err(|e| ModerationError::Unavailable(e.to_string()))?;

        Ok(parse_verdict(&raw))
    }
}

/// Map a raw classifier reply onto the verdict vocabulary
///
/// Out-of-vocabulary replies are treated as allow to minimize false
/// positives, but logged as anomalous for follow-up.
fn parse_verdict(raw: &str) -> Verdict {
    match raw.trim().to_uppercase().as_str() {
        "BLOCK" => Verdict::Block,
        "REVIEW" => Verdict::Review,
        "ALLOW" => Verdict::Allow,
        other => {
            tracing::warn!(reply = %other, "moderation classifier returned an unexpected response");
            Verdict::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_llm::{ProviderError, TokenStream};

    /// Stub classifier with a fixed reply
    struct FixedClassifier {
        reply: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for FixedClassifier {
        fn label(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
            self.reply
                .clone()
                .ok_or_else(|| ProviderError::Unknown("connection refused".to_owned()))
        }

        async fn generate_stream(&self, _request: &GenerationRequest) -> Result<TokenStream, ProviderError> {
            Err(ProviderError::Unknown("not used".to_owned()))
        }
    }

    fn gate(reply: Option<&str>) -> ModerationGate {
        ModerationGate::new(
            Some(Arc::new(FixedClassifier {
                reply: reply.map(str::to_owned),
            })),
            "classifier-model",
        )
    }

    #[tokio::test]
    async fn vocabulary_parses_case_insensitively() {
        assert_eq!(gate(Some("BLOCK")).classify("x").await.unwrap(), Verdict::Block);
        assert_eq!(gate(Some(" review \n")).classify("x").await.unwrap(), Verdict::Review);
        assert_eq!(gate(Some("allow")).classify("x").await.unwrap(), Verdict::Allow);
    }

    #[tokio::test]
    async fn out_of_vocabulary_fails_open_to_allow() {
        let verdict = gate(Some("I think this message is fine."))
            .classify("x")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[tokio::test]
    async fn transport_failure_is_not_fail_open() {
        let result = gate(None).classify("x").await;
        assert!(matches!(result, Err(ModerationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn missing_classifier_is_unavailable() {
        let gate = ModerationGate::new(None, "classifier-model");
        assert!(matches!(gate.classify("x").await, Err(ModerationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn identical_input_yields_identical_verdicts() {
        let gate = gate(Some("REVIEW"));
        let first = gate.classify("same input").await.unwrap();
        for _ in 0..10 {
            assert_eq!(gate.classify("same input").await.unwrap(), first);
        }
    }

    #[test]
    fn review_and_block_flag_the_message() {
        assert!(Verdict::Review.flags_message());
        assert!(Verdict::Block.flags_message());
        assert!(!Verdict::Allow.flags_message());
    }
}
