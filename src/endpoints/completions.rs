//! Text completions and token counting.

use crate::client::{Client, ClientError};
use crate::options::ParameterSet;
use crate::request::{build_completion_request, build_tokenize_request, COMPLETIONS_PATH, TOKENIZE_PATH};
use crate::result::{Completion, TokenCount};
use crate::stream::{self, StreamSummary};

/// Access to `/v1/completions` and `/v1/tokenize`.
#[derive(Debug, Clone)]
pub struct Completions {
    client: Client,
}

impl Completions {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, prompt: &str) -> Result<Completion, ClientError> {
        self.create_with_options(prompt, &ParameterSet::default())
            .await
    }

    pub async fn create_with_options(
        &self,
        prompt: &str,
        params: &ParameterSet,
    ) -> Result<Completion, ClientError> {
        let params = params.clone().with_stream(false);
        let model = self.client.resolve_model(&params)?;
        let payload = build_completion_request(prompt, &params, model)?;
        self.client.post(COMPLETIONS_PATH, &payload).await
    }

    /// Request `n` alternatives in one call and return one completion per choice.
    ///
    /// Each returned completion carries the shared id, model and usage of the
    /// single underlying response.
    pub async fn create_multiple(&self, prompt: &str, n: u32) -> Result<Vec<Completion>, ClientError> {
        self.create_multiple_with_options(prompt, n, &ParameterSet::default())
            .await
    }

    pub async fn create_multiple_with_options(
        &self,
        prompt: &str,
        n: u32,
        params: &ParameterSet,
    ) -> Result<Vec<Completion>, ClientError> {
        let params = params.clone().with_n(n)?;
        let completion = self.create_with_options(prompt, &params).await?;

        let choices = completion.split();
        if choices.len() < n as usize {
            return Err(ClientError::parse(
                format!("expected {} choices, response contained {}", n, choices.len()),
                None,
            ));
        }
        Ok(choices.into_iter().take(n as usize).collect())
    }

    /// Stream a completion, calling `callback` once per chunk in arrival order.
    pub async fn stream<F>(&self, prompt: &str, callback: F) -> Result<StreamSummary, ClientError>
    where
        F: FnMut(Completion),
    {
        self.stream_with_options(prompt, &ParameterSet::default(), callback)
            .await
    }

    pub async fn stream_with_options<F>(
        &self,
        prompt: &str,
        params: &ParameterSet,
        callback: F,
    ) -> Result<StreamSummary, ClientError>
    where
        F: FnMut(Completion),
    {
        let params = params.clone().with_stream(true);
        let model = self.client.resolve_model(&params)?;
        let payload = build_completion_request(prompt, &params, model)?;

        let bytes = self.client.post_stream(COMPLETIONS_PATH, &payload).await?;
        let config = self.client.config();
        stream::deliver(bytes, config.stream_buffer_size, config.timeout, callback).await
    }

    /// Number of tokens the API counts for `text`.
    pub async fn token_count(&self, text: &str) -> Result<u64, ClientError> {
        let body = build_tokenize_request(text)?;
        let count: TokenCount = self.client.post(TOKENIZE_PATH, &body).await?;
        Ok(count.0)
    }
}
