//! Endpoint facades built on top of a [`Client`](crate::client::Client).

pub mod chat;
pub mod completions;
pub mod embeddings;
pub mod images;
pub mod structured;

// Re-export for convenience
pub use chat::{Chat, ChatInput, ChatSession};
pub use completions::Completions;
pub use embeddings::Embeddings;
pub use images::Images;
pub use structured::Structured;
