//! Typed, read-only views over decoded responses.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::client::ClientError;
use crate::model::Message;
use crate::response::FromEnvelope;

/// Token or character count. Floats are truncated; null, negative or
/// non-numeric values read as zero.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    })
}

/// Fractional quantity; anything that is not a number reads as zero.
fn lenient_float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(Value::as_f64)
        .unwrap_or(0.0))
}

/// Token usage information. Missing, null or malformed fields read as zero,
/// so a reply never fails to decode because of its usage block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub completion_tokens: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_tokens: u64,
    #[serde(default, deserialize_with = "lenient_float")]
    pub cost: f64,
    #[serde(default, deserialize_with = "lenient_float")]
    pub latency_ms: f64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_characters: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub response_characters: u64,
}

fn lenient_usage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Usage>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| serde_json::from_value(v).ok()))
}

/// Reason for finishing the response generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl From<&str> for FinishReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Message (or streamed delta) inside a choice.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// A string, a list of typed parts, or absent.
    #[serde(default)]
    pub content: Option<Value>,
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub delta: Option<ChoiceMessage>,
    /// Completion text.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub logprobs: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default, deserialize_with = "lenient_usage")]
    usage: Option<Usage>,
    #[serde(default)]
    system_fingerprint: Option<String>,
}

impl Envelope {
    fn decode(value: Value, what: &str) -> Result<Self, ClientError> {
        require_array(&value, "choices", what)?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::parse(format!("malformed {} response: {}", what, e), None))
    }

    fn first(&self) -> Option<&Choice> {
        self.choices.first()
    }

    fn first_message(&self) -> Option<&ChoiceMessage> {
        self.first().and_then(|c| c.message.as_ref())
    }
}

fn require_array(value: &Value, key: &str, what: &str) -> Result<(), ClientError> {
    match value.get(key) {
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(ClientError::parse(
            format!("{} response field `{}` is not an array", what, key),
            None,
        )),
        None => Err(ClientError::parse(
            format!("{} response is missing required `{}` array", what, key),
            None,
        )),
    }
}

fn part_type(part: &Value) -> Option<&str> {
    part.get("type").and_then(Value::as_str)
}

/// Text of a content value; text parts are joined with a single space.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(itertools::join(
            parts
                .iter()
                .filter(|p| part_type(p) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str)),
            " ",
        )),
        _ => None,
    }
}

fn part_image_url(part: &Value) -> Option<&str> {
    match part.get("image_url") {
        Some(Value::String(url)) => Some(url.as_str()),
        Some(Value::Object(inner)) => inner.get("url").and_then(Value::as_str),
        _ => part.get("url").and_then(Value::as_str),
    }
}

macro_rules! envelope_accessors {
    ($ty:ty) => {
        impl $ty {
            pub fn id(&self) -> Option<&str> {
                self.envelope.id.as_deref()
            }

            pub fn object(&self) -> Option<&str> {
                self.envelope.object.as_deref()
            }

            /// Unix timestamp of creation.
            pub fn created(&self) -> Option<i64> {
                self.envelope.created
            }

            pub fn model(&self) -> Option<&str> {
                self.envelope.model.as_deref()
            }

            pub fn system_fingerprint(&self) -> Option<&str> {
                self.envelope.system_fingerprint.as_deref()
            }

            pub fn choices(&self) -> &[Choice] {
                &self.envelope.choices
            }

            /// Usage with every missing field reported as zero.
            pub fn usage(&self) -> Usage {
                self.envelope.usage.unwrap_or_default()
            }

            /// Finish reason of the first choice.
            pub fn finish_reason(&self) -> Option<FinishReason> {
                self.envelope
                    .first()
                    .and_then(|c| c.finish_reason.as_deref())
                    .map(FinishReason::from)
            }
        }
    };
}

/// A chat completion, or one chunk of a streamed one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    envelope: Envelope,
}

envelope_accessors!(ChatMessage);

impl ChatMessage {
    /// Assistant content of the first choice.
    pub fn content(&self) -> Option<String> {
        self.envelope
            .first_message()
            .and_then(|m| m.content.as_ref())
            .and_then(content_text)
    }

    pub fn role(&self) -> Option<&str> {
        self.envelope.first_message().and_then(|m| m.role.as_deref())
    }

    /// Streamed chunks carry `delta` instead of `message`.
    pub fn is_stream_chunk(&self) -> bool {
        self.envelope.first().is_some_and(|c| c.delta.is_some())
    }

    pub fn stream_content(&self) -> Option<&str> {
        self.envelope
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_ref())
            .and_then(Value::as_str)
    }

    /// True once a finish reason has been reported.
    pub fn is_finished(&self) -> bool {
        self.envelope
            .first()
            .is_some_and(|c| c.finish_reason.is_some())
    }

    /// The reply as an assistant message suitable for history.
    pub fn to_message(&self) -> Message {
        Message::assistant(self.content().unwrap_or_default())
    }
}

impl FromEnvelope for ChatMessage {
    fn from_envelope(value: Value) -> Result<Self, ClientError> {
        Ok(Self {
            envelope: Envelope::decode(value, "chat")?,
        })
    }
}

/// A text completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    envelope: Envelope,
}

envelope_accessors!(Completion);

impl Completion {
    /// Text of the first choice.
    pub fn text(&self) -> Option<String> {
        let choice = self.envelope.first()?;
        if let Some(text) = &choice.text {
            return Some(text.clone());
        }
        choice
            .message
            .as_ref()
            .or(choice.delta.as_ref())
            .and_then(|m| m.content.as_ref())
            .and_then(content_text)
    }

    /// Texts of every choice, in order.
    pub fn texts(&self) -> Vec<String> {
        self.split()
            .into_iter()
            .filter_map(|c| c.text())
            .collect()
    }

    /// One completion per choice, each sharing id, model and usage.
    pub fn split(&self) -> Vec<Completion> {
        self.envelope
            .choices
            .iter()
            .map(|choice| Completion {
                envelope: Envelope {
                    choices: vec![choice.clone()],
                    ..self.envelope.clone()
                },
            })
            .collect()
    }
}

impl FromEnvelope for Completion {
    fn from_envelope(value: Value) -> Result<Self, ClientError> {
        Ok(Self {
            envelope: Envelope::decode(value, "completion")?,
        })
    }
}

/// Result of a vision request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnalysis {
    envelope: Envelope,
}

envelope_accessors!(ImageAnalysis);

impl ImageAnalysis {
    fn content(&self) -> Option<&Value> {
        self.envelope
            .first_message()
            .and_then(|m| m.content.as_ref())
    }

    /// All text parts joined with a single space.
    pub fn analysis(&self) -> String {
        self.content().and_then(content_text).unwrap_or_default()
    }

    /// URL of the first image part, if the reply contains one.
    pub fn image_url(&self) -> Option<&str> {
        self.content()?
            .as_array()?
            .iter()
            .filter(|p| matches!(part_type(p), Some("image") | Some("image_url")))
            .find_map(part_image_url)
    }
}

impl FromEnvelope for ImageAnalysis {
    fn from_envelope(value: Value) -> Result<Self, ClientError> {
        Ok(Self {
            envelope: Envelope::decode(value, "image")?,
        })
    }
}

/// One embedding vector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Embedding {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct EmbeddingEnvelope {
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    model: Option<String>,
    data: Vec<Embedding>,
    #[serde(default, deserialize_with = "lenient_usage")]
    usage: Option<Usage>,
}

/// Embedding vectors ordered like the input.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    object: Option<String>,
    model: Option<String>,
    data: Vec<Embedding>,
    usage: Usage,
}

impl EmbeddingResult {
    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.data
    }

    pub fn vectors(&self) -> Vec<&[f32]> {
        self.data.iter().map(|e| e.embedding.as_slice()).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }
}

impl FromEnvelope for EmbeddingResult {
    fn from_envelope(value: Value) -> Result<Self, ClientError> {
        require_array(&value, "data", "embedding")?;
        let mut envelope: EmbeddingEnvelope = serde_json::from_value(value).map_err(|e| {
            ClientError::parse(format!("malformed embedding response: {}", e), None)
        })?;
        envelope.data.sort_by_key(|e| e.index);
        Ok(Self {
            object: envelope.object,
            model: envelope.model,
            data: envelope.data,
            usage: envelope.usage.unwrap_or_default(),
        })
    }
}

/// Response of the tokenize endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCount(pub u64);

impl FromEnvelope for TokenCount {
    fn from_envelope(value: Value) -> Result<Self, ClientError> {
        value
            .get("token_count")
            .and_then(Value::as_u64)
            .map(TokenCount)
            .ok_or_else(|| ClientError::parse("tokenize response is missing `token_count`", None))
    }
}
