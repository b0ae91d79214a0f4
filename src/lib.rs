//! # chatwire - typed client for a hosted LLM HTTP API
//!
//! A small, pragmatic Rust library wrapping chat, text completion, vision,
//! embedding and structured-output endpoints.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Parameters validated when they are set, not when they are sent
//! - Retry on rate limiting (429) and server errors (5xx)
//! - Streaming support via Server-Sent Events with in-order callbacks
//! - Multi-turn sessions that own their history
//! - Schema-constrained generation hydrated into your own types
//!
//! ## Architecture
//!
//! Calls flow through the same pipeline:
//!
//! 1. **Facade** (`Chat`, `Completions`, `Images`, `Embeddings`, `Structured`)
//! 2. **Request builder** validates input and produces a `RequestPayload`
//! 3. **Transport** posts it with auth headers and the retry policy
//! 4. **Response parser** turns the body into a result model or a `ClientError`
//!
//! ## Example
//! ```no_run
//! use chatwire::options::{Config, ParameterSet};
//! use chatwire::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chatwire::ClientError> {
//!     let client = Client::new(Config::new("your-api-key"))?;
//!
//!     let params = ParameterSet::new()
//!         .with_temperature(0.2)?
//!         .with_system_message("Answer in one sentence.");
//!     let reply = client
//!         .chat()
//!         .generate_with_options("Why is the sky blue?", &params)
//!         .await?;
//!     println!("{}", reply.content().unwrap_or_default());
//!
//!     let mut session = client.begin_conversation();
//!     session.send("My name is Alice.").await?;
//!     let reply = session.send("What is my name?").await?;
//!     println!("{:?}", reply.content());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod http;
pub mod model;
pub mod options;
pub mod request;
pub mod response;
pub mod result;
pub mod schema;
pub mod sse;
pub mod stream;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use client::{Client, ClientError, ErrorDetails};
pub use endpoints::{Chat, ChatInput, ChatSession, Completions, Embeddings, Images, Structured};
pub use model::{ContentPart, Message, ModelDescriptor, Role};
pub use options::{Config, ParameterSet};
pub use result::{ChatMessage, Completion, EmbeddingResult, FinishReason, ImageAnalysis, Usage};
pub use schema::{FieldSpec, FieldType, SchemaDescriptor, StructuredOutput};
pub use stream::StreamSummary;
