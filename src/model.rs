//! Conversation messages and the supported model catalog.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::client::ClientError;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Image reference inside a content part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of a multi-part message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Message body: plain text or an ordered list of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.trim().is_empty(),
            Content::Parts(parts) => parts.is_empty(),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::Text(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A user message made of several parts, e.g. an image followed by a question.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: Content::Parts(parts),
        }
    }

    /// Text of the message; text parts are joined with a single space.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => itertools::join(
                parts.iter().filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                }),
                " ",
            ),
        }
    }
}

/// Models supported by the remote API.
///
/// Parse from a canonical identifier or any recognized alias:
/// ```rust
/// use chatwire::model::ModelDescriptor;
///
/// let model: ModelDescriptor = "grok-2-latest".parse()?;
/// assert_eq!(model, ModelDescriptor::Grok2);
/// assert!("gpt-unknown".parse::<ModelDescriptor>().is_err());
/// # Ok::<(), chatwire::ClientError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelDescriptor {
    #[default]
    Grok2,
    Grok2Vision,
    GrokBeta,
    GrokVisionBeta,
    Grok3,
    Grok3Mini,
    EmbeddingBeta,
}

impl ModelDescriptor {
    pub const ALL: [ModelDescriptor; 7] = [
        ModelDescriptor::Grok2,
        ModelDescriptor::Grok2Vision,
        ModelDescriptor::GrokBeta,
        ModelDescriptor::GrokVisionBeta,
        ModelDescriptor::Grok3,
        ModelDescriptor::Grok3Mini,
        ModelDescriptor::EmbeddingBeta,
    ];

    /// Identifier sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelDescriptor::Grok2 => "grok-2",
            ModelDescriptor::Grok2Vision => "grok-2-vision",
            ModelDescriptor::GrokBeta => "grok-beta",
            ModelDescriptor::GrokVisionBeta => "grok-vision-beta",
            ModelDescriptor::Grok3 => "grok-3",
            ModelDescriptor::Grok3Mini => "grok-3-mini",
            ModelDescriptor::EmbeddingBeta => "v1",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ModelDescriptor::Grok2 => &["grok-2-latest", "grok-2-1212"],
            ModelDescriptor::Grok2Vision => &["grok-2-vision-latest", "grok-2-vision-1212"],
            ModelDescriptor::GrokBeta => &[],
            ModelDescriptor::GrokVisionBeta => &[],
            ModelDescriptor::Grok3 => &["grok-3-latest"],
            ModelDescriptor::Grok3Mini => &["grok-3-mini-latest"],
            ModelDescriptor::EmbeddingBeta => &["embedding-beta"],
        }
    }

    pub fn supports_streaming(&self) -> bool {
        !matches!(self, ModelDescriptor::EmbeddingBeta)
    }

    pub fn supports_vision(&self) -> bool {
        matches!(
            self,
            ModelDescriptor::Grok2Vision | ModelDescriptor::GrokVisionBeta
        )
    }

    pub fn supports_embeddings(&self) -> bool {
        matches!(self, ModelDescriptor::EmbeddingBeta)
    }

    /// Maximum context window in tokens.
    pub fn context_window(&self) -> u32 {
        match self {
            ModelDescriptor::Grok2 | ModelDescriptor::GrokBeta => 131_072,
            ModelDescriptor::Grok2Vision | ModelDescriptor::GrokVisionBeta => 8_192,
            ModelDescriptor::Grok3 | ModelDescriptor::Grok3Mini => 131_072,
            ModelDescriptor::EmbeddingBeta => 8_192,
        }
    }
}

impl FromStr for ModelDescriptor {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ModelDescriptor::ALL
            .into_iter()
            .find(|model| model.as_str() == wanted || model.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| ClientError::validation(format!("unsupported model '{}'", s)))
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ModelDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
