//! Top-level client and error types.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::endpoints::{Chat, ChatSession, Completions, Embeddings, Images, Structured};
use crate::http::{ByteStream, HttpTransport, Transport};
use crate::model::ModelDescriptor;
use crate::options::{Config, ParameterSet};
use crate::response::{self, FromEnvelope};

/// Context attached to errors that came back from the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// HTTP status code.
    pub code: Option<u16>,
    /// Value of the `x-request-id` response header.
    pub request_id: Option<String>,
    /// `type` from an API error body.
    pub kind: Option<String>,
    /// `param` from an API error body.
    pub param: Option<String>,
    /// `code` from an API error body.
    pub api_code: Option<String>,
}

impl ErrorDetails {
    pub fn with_status(code: u16) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }
}

/// Errors that can occur during client operations.
///
/// Every failed call yields exactly one of these; match on the variant to
/// decide how to react.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Unusable configuration, e.g. a missing API key.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Caller input rejected before any network activity.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Connection failure or a non-2xx status without a decodable error body.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        details: ErrorDetails,
    },

    /// Error body returned by the remote service.
    #[error("API error: {message}")]
    Api {
        message: String,
        details: ErrorDetails,
    },

    /// Response body was not JSON or lacked mandatory fields.
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        details: ErrorDetails,
    },
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        ClientError::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>, code: Option<u16>) -> Self {
        ClientError::Transport {
            message: message.into(),
            details: ErrorDetails {
                code,
                ..ErrorDetails::default()
            },
        }
    }

    pub fn api(message: impl Into<String>, details: ErrorDetails) -> Self {
        ClientError::Api {
            message: message.into(),
            details,
        }
    }

    pub fn parse(message: impl Into<String>, code: Option<u16>) -> Self {
        ClientError::Parse {
            message: message.into(),
            details: ErrorDetails {
                code,
                ..ErrorDetails::default()
            },
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ClientError::Config { message }
            | ClientError::Validation { message }
            | ClientError::Transport { message, .. }
            | ClientError::Api { message, .. }
            | ClientError::Parse { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            ClientError::Transport { details, .. }
            | ClientError::Api { details, .. }
            | ClientError::Parse { details, .. } => Some(details),
            ClientError::Config { .. } | ClientError::Validation { .. } => None,
        }
    }

    /// HTTP status code, where one applies.
    pub fn status(&self) -> Option<u16> {
        self.details().and_then(|d| d.code)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.details().and_then(|d| d.request_id.as_deref())
    }

    /// Rate limiting and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { details, .. } | ClientError::Api { details, .. } => {
                matches!(details.code, Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }

    pub(crate) fn with_request_id(mut self, id: Option<String>) -> Self {
        if let ClientError::Transport { details, .. }
        | ClientError::Api { details, .. }
        | ClientError::Parse { details, .. } = &mut self
        {
            if details.request_id.is_none() {
                details.request_id = id;
            }
        }
        self
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let code = err.status().map(|s| s.as_u16());
        ClientError::transport(err.to_string(), code)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::parse(err.to_string(), None)
    }
}

/// Entry point of the library.
///
/// Owns the shared, read-only configuration and the transport; endpoint
/// facades are cheap handles created from it. Cloning a `Client` shares the
/// same configuration and connection pool.
///
/// # Example
/// ```no_run
/// use chatwire::{Client, options::Config};
///
/// #[tokio::main]
/// async fn main() -> Result<(), chatwire::ClientError> {
///     let client = Client::new(Config::new("xai-..."))?;
///     let reply = client.chat().generate("Hello!").await?;
///     println!("{}", reply.content().unwrap_or_default());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    model: ModelDescriptor,
}

impl Client {
    /// Create a client that talks HTTP to `config.base_url`.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            model: ModelDescriptor::default(),
        })
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            model: ModelDescriptor::default(),
        })
    }

    /// Set the default model used when a call does not name one.
    pub fn with_model(mut self, model: ModelDescriptor) -> Self {
        self.model = model;
        self
    }

    pub fn model(&self) -> ModelDescriptor {
        self.model
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chat(&self) -> Chat {
        Chat::new(self.clone())
    }

    /// Start a multi-turn session with an empty history.
    pub fn begin_conversation(&self) -> ChatSession {
        ChatSession::new(self.clone())
    }

    pub fn completions(&self) -> Completions {
        Completions::new(self.clone())
    }

    pub fn images(&self) -> Images {
        Images::new(self.clone())
    }

    pub fn embeddings(&self) -> Embeddings {
        Embeddings::new(self.clone())
    }

    pub fn structured(&self) -> Structured {
        Structured::new(self.clone())
    }

    /// Model for a call: the one named in `params`, else the client default.
    pub(crate) fn resolve_model(&self, params: &ParameterSet) -> Result<ModelDescriptor, ClientError> {
        match params.model() {
            Some(name) => name.parse(),
            None => Ok(self.model),
        }
    }

    pub(crate) async fn post<T, P>(&self, path: &str, payload: &P) -> Result<T, ClientError>
    where
        T: FromEnvelope,
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(payload)?;
        debug!(path, "dispatching request");
        let raw = self.transport.post(path, &body).await?;
        response::parse(&raw)
    }

    pub(crate) async fn post_stream<P>(&self, path: &str, payload: &P) -> Result<ByteStream, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(payload)?;
        debug!(path, "dispatching streaming request");
        self.transport.post_stream(path, &body).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
