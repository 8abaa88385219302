//! Shared types for the Palaver chat gateway
//!
//! Kept deliberately small: the identity sum type threaded through the
//! request pipeline, the message part vocabulary shared by the history
//! store and the provider layer, and the `HttpError` trait feature
//! crates implement so the server layer can render domain errors.

mod error;
mod identity;
mod message;

pub use error::HttpError;
pub use identity::{Identity, UserClass};
pub use message::{MessagePart, Role, joined_text};
