//! Image analysis through vision-capable chat models.

use crate::client::{Client, ClientError};
use crate::model::ModelDescriptor;
use crate::options::ParameterSet;
use crate::request::{build_image_analysis_request, CHAT_PATH};
use crate::result::ImageAnalysis;

/// Vision requests against `/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct Images {
    client: Client,
}

impl Images {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Analyze the image at `url`.
    ///
    /// The URL must be well formed and end in jpg, jpeg, png, gif or webp.
    /// Without a prompt the model is asked to "Analyze this image."
    pub async fn analyze(&self, url: &str, prompt: Option<&str>) -> Result<ImageAnalysis, ClientError> {
        self.analyze_with_options(url, prompt, &ParameterSet::default())
            .await
    }

    pub async fn analyze_with_options(
        &self,
        url: &str,
        prompt: Option<&str>,
        params: &ParameterSet,
    ) -> Result<ImageAnalysis, ClientError> {
        let params = params.clone().with_stream(false);
        let model = self.vision_model(&params)?;
        let payload = build_image_analysis_request(url, prompt, &params, model)?;
        self.client.post(CHAT_PATH, &payload).await
    }

    /// The model named in `params`, else the client default when it can see,
    /// else the default vision model.
    fn vision_model(&self, params: &ParameterSet) -> Result<ModelDescriptor, ClientError> {
        if params.model().is_some() {
            return self.client.resolve_model(params);
        }
        let model = self.client.model();
        Ok(if model.supports_vision() {
            model
        } else {
            ModelDescriptor::Grok2Vision
        })
    }
}
