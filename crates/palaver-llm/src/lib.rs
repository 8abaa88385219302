//! Provider adapter layer for Palaver
//!
//! Wraps upstream inference APIs behind the [`TextGenerator`] trait,
//! classifies upstream failures into a closed set of typed kinds, and
//! builds ordered credential fallback chains.

mod chain;
mod error;
pub mod provider;
mod types;

pub use chain::{ChainSource, ProviderRegistry};
pub use error::ProviderError;
pub use provider::huggingface::HuggingFaceClient;
pub use provider::reasoning::ReasoningExtractor;
pub use provider::{TextGenerator, TokenStream};
pub use types::{ChatTurn, GenerationRequest, StreamEvent};
