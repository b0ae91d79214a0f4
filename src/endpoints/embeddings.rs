//! Embedding vectors for one text or a batch.

use crate::client::{Client, ClientError};
use crate::model::ModelDescriptor;
use crate::options::ParameterSet;
use crate::request::{build_embedding_request, EmbeddingInput, EMBEDDINGS_PATH};
use crate::result::EmbeddingResult;

/// Access to `/v1/embeddings`.
#[derive(Debug, Clone)]
pub struct Embeddings {
    client: Client,
}

impl Embeddings {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, input: impl Into<EmbeddingInput>) -> Result<EmbeddingResult, ClientError> {
        self.create_with_options(input, &ParameterSet::default())
            .await
    }

    /// Embed `input`; the result holds one vector per input item, in input order.
    pub async fn create_with_options(
        &self,
        input: impl Into<EmbeddingInput>,
        params: &ParameterSet,
    ) -> Result<EmbeddingResult, ClientError> {
        let input = input.into();
        let model = match params.model() {
            Some(_) => self.client.resolve_model(params)?,
            None if self.client.model().supports_embeddings() => self.client.model(),
            None => ModelDescriptor::EmbeddingBeta,
        };
        let payload = build_embedding_request(&input, params, model)?;

        let result: EmbeddingResult = self.client.post(EMBEDDINGS_PATH, &payload).await?;
        if result.len() != input.len() {
            return Err(ClientError::parse(
                format!(
                    "expected {} embeddings, response contained {}",
                    input.len(),
                    result.len()
                ),
                None,
            ));
        }
        Ok(result)
    }
}
