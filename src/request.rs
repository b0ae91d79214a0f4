//! Request payload construction and input validation.
//!
//! Every builder validates its inputs and fails before anything touches the
//! network. Payloads are immutable once built.

use nonempty::NonEmpty;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::client::ClientError;
use crate::model::{ContentPart, Message, ModelDescriptor, Role};
use crate::options::ParameterSet;

pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const COMPLETIONS_PATH: &str = "/v1/completions";
pub const EMBEDDINGS_PATH: &str = "/v1/embeddings";
pub const TOKENIZE_PATH: &str = "/v1/tokenize";

/// Prompt used for image analysis when none is given.
pub const DEFAULT_IMAGE_PROMPT: &str = "Analyze this image.";

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Input of an embedding request: one text or an ordered batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn len(&self) -> usize {
        match self {
            EmbeddingInput::Single(_) => 1,
            EmbeddingInput::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that there is at least one text and that none is blank.
    pub fn validate(&self) -> Result<ValidatedInput, ClientError> {
        let items: &[String] = match self {
            EmbeddingInput::Single(text) => std::slice::from_ref(text),
            EmbeddingInput::Batch(items) => items,
        };
        if let Some(pos) = items.iter().position(|s| s.trim().is_empty()) {
            return Err(ClientError::validation(format!(
                "embedding input item {} is empty",
                pos
            )));
        }
        match self {
            EmbeddingInput::Single(text) => Ok(ValidatedInput::Single(text.clone())),
            EmbeddingInput::Batch(items) => NonEmpty::from_vec(items.clone())
                .map(ValidatedInput::Batch)
                .ok_or_else(|| ClientError::validation("embedding input must not be empty")),
        }
    }
}

/// Embedding input that passed validation, in its wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ValidatedInput {
    Single(String),
    Batch(NonEmpty<String>),
}

impl ValidatedInput {
    /// Number of texts; never zero.
    pub fn len(&self) -> usize {
        match self {
            ValidatedInput::Single(_) => 1,
            ValidatedInput::Batch(items) => items.len(),
        }
    }

    pub fn texts(&self) -> Vec<&str> {
        match self {
            ValidatedInput::Single(text) => vec![text.as_str()],
            ValidatedInput::Batch(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for EmbeddingInput {
    fn from(text: &str) -> Self {
        EmbeddingInput::Single(text.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(text: String) -> Self {
        EmbeddingInput::Single(text)
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(items: Vec<String>) -> Self {
        EmbeddingInput::Batch(items)
    }
}

impl From<Vec<&str>> for EmbeddingInput {
    fn from(items: Vec<&str>) -> Self {
        EmbeddingInput::Batch(items.into_iter().map(str::to_string).collect())
    }
}

/// Serialized body of one API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPayload {
    model: ModelDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<ValidatedInput>,
    #[serde(flatten)]
    params: Map<String, Value>,
}

impl RequestPayload {
    pub fn model(&self) -> ModelDescriptor {
        self.model
    }

    pub fn messages(&self) -> Option<&[Message]> {
        self.messages.as_deref()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn input(&self) -> Option<&ValidatedInput> {
        self.input.as_ref()
    }

    /// Flattened generation parameters.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn is_stream(&self) -> bool {
        self.params.get("stream").and_then(Value::as_bool) == Some(true)
    }

    pub fn to_json(&self) -> Result<Value, ClientError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn check_messages(messages: &[Message]) -> Result<(), ClientError> {
    if messages.is_empty() {
        return Err(ClientError::validation("message list must not be empty"));
    }
    for (pos, message) in messages.iter().enumerate() {
        if message.role == Role::User && message.content.is_empty() {
            return Err(ClientError::validation(format!(
                "user message {} has empty content",
                pos
            )));
        }
    }
    Ok(())
}

fn check_streaming(params: &ParameterSet, model: ModelDescriptor) -> Result<(), ClientError> {
    if params.stream() == Some(true) && !model.supports_streaming() {
        return Err(ClientError::validation(format!(
            "model '{}' does not support streaming",
            model
        )));
    }
    Ok(())
}

/// Build a chat request. System messages queued on `params` come first.
pub fn build_chat_request(
    messages: &[Message],
    params: &ParameterSet,
    model: ModelDescriptor,
) -> Result<RequestPayload, ClientError> {
    check_messages(messages)?;
    check_streaming(params, model)?;

    let merged = params.merged_over(&ParameterSet::chat_defaults());
    let all: Vec<Message> = merged
        .system_messages()
        .iter()
        .chain(messages)
        .cloned()
        .collect();

    Ok(RequestPayload {
        model,
        messages: Some(all),
        prompt: None,
        input: None,
        params: merged.to_payload()?,
    })
}

/// Build a text completion request.
pub fn build_completion_request(
    prompt: &str,
    params: &ParameterSet,
    model: ModelDescriptor,
) -> Result<RequestPayload, ClientError> {
    if prompt.trim().is_empty() {
        return Err(ClientError::validation("prompt must not be empty"));
    }
    check_streaming(params, model)?;

    let merged = params.merged_over(&ParameterSet::chat_defaults());
    Ok(RequestPayload {
        model,
        messages: None,
        prompt: Some(prompt.to_string()),
        input: None,
        params: merged.to_payload()?,
    })
}

/// Check that `url` is a well-formed URL naming a supported image format.
pub fn validate_image_url(url: &str) -> Result<Url, ClientError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| ClientError::validation(format!("invalid image URL '{}': {}", url, e)))?;

    let extension = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(parsed),
        _ => Err(ClientError::validation(format!(
            "unsupported image format for '{}'; expected one of {}",
            url,
            IMAGE_EXTENSIONS.join(", ")
        ))),
    }
}

/// Build a vision request: one user message with the image followed by the prompt.
pub fn build_image_analysis_request(
    image_url: &str,
    prompt: Option<&str>,
    params: &ParameterSet,
    model: ModelDescriptor,
) -> Result<RequestPayload, ClientError> {
    if image_url.trim().is_empty() {
        return Err(ClientError::validation("image URL is required"));
    }
    let url = validate_image_url(image_url)?;
    if !model.supports_vision() {
        return Err(ClientError::validation(format!(
            "model '{}' does not support image input",
            model
        )));
    }

    let prompt = prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_IMAGE_PROMPT);

    let message = Message::user_parts(vec![
        ContentPart::image(url.as_str()),
        ContentPart::text(prompt),
    ]);
    build_chat_request(&[message], params, model)
}

/// Build an embedding request. No generation defaults are applied.
pub fn build_embedding_request(
    input: &EmbeddingInput,
    params: &ParameterSet,
    model: ModelDescriptor,
) -> Result<RequestPayload, ClientError> {
    let input = input.validate()?;
    if !model.supports_embeddings() {
        return Err(ClientError::validation(format!(
            "model '{}' does not produce embeddings",
            model
        )));
    }

    Ok(RequestPayload {
        model,
        messages: None,
        prompt: None,
        input: Some(input),
        params: params.to_payload()?,
    })
}

/// Body of a tokenize call.
pub fn build_tokenize_request(text: &str) -> Result<Value, ClientError> {
    if text.is_empty() {
        return Err(ClientError::validation("text to tokenize must not be empty"));
    }
    Ok(serde_json::json!({ "text": text }))
}
