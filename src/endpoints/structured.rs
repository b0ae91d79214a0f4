//! Schema-constrained generation.

use serde_json::Value;
use tracing::debug;

use crate::client::{Client, ClientError};
use crate::endpoints::Chat;
use crate::options::ParameterSet;
use crate::schema::{SchemaDescriptor, StructuredOutput};

/// Asks the chat endpoint for JSON matching a schema and decodes the reply.
#[derive(Debug, Clone)]
pub struct Structured {
    chat: Chat,
}

impl Structured {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            chat: Chat::new(client),
        }
    }

    /// Generate JSON for a caller-supplied schema and return it as-is.
    pub async fn generate(&self, prompt: &str, schema: &SchemaDescriptor) -> Result<Value, ClientError> {
        self.generate_with_options(prompt, schema, &ParameterSet::default())
            .await
    }

    pub async fn generate_with_options(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
        params: &ParameterSet,
    ) -> Result<Value, ClientError> {
        let params = params.clone().with_response_format(schema.response_format());
        let reply = self.chat.generate_with_options(prompt, &params).await?;

        let content = reply
            .content()
            .ok_or_else(|| ClientError::parse("structured reply has no content", None))?;
        debug!(len = content.len(), "decoding structured reply");
        serde_json::from_str(content.trim()).map_err(|e| {
            ClientError::parse(format!("structured reply is not valid JSON: {}", e), None)
        })
    }

    /// Generate an instance of `T` using the schema it describes.
    ///
    /// The schema is derived before any request is made, so a bad
    /// description never costs a network call.
    pub async fn generate_typed<T: StructuredOutput>(&self, prompt: &str) -> Result<T, ClientError> {
        self.generate_typed_with_options(prompt, &ParameterSet::default())
            .await
    }

    pub async fn generate_typed_with_options<T: StructuredOutput>(
        &self,
        prompt: &str,
        params: &ParameterSet,
    ) -> Result<T, ClientError> {
        let schema = SchemaDescriptor::for_type::<T>()?;
        let value = self.generate_with_options(prompt, &schema, params).await?;
        serde_json::from_value(value).map_err(|e| {
            ClientError::parse(format!("structured reply does not match the type: {}", e), None)
        })
    }
}
