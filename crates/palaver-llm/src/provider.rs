//! Provider trait and implementations for inference backends

pub mod huggingface;
pub mod reasoning;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ProviderError;
use crate::types::{GenerationRequest, StreamEvent};

/// Stream of generation events from a provider
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Trait implemented by each text generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable handle label for logging
    fn label(&self) -> &str;

    /// Generate a complete response
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    /// Generate a response as an incremental token stream
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError>;
}
