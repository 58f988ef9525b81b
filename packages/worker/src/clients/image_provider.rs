use async_trait::async_trait;
use common::{CorrelationKey, GeneratedImage, GenerationStrategy, PipelineError, Upstream};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use super::transport;
use crate::config::ProviderConfig;
use crate::stages::ImageGenerator;

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedUrl>,
}

#[derive(Debug, Deserialize)]
struct GeneratedUrl {
    url: String,
}

/// Image generation through a remote HTTP provider that answers with a URL.
#[derive(Debug, Clone)]
pub struct RemoteHttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    size: String,
}

impl RemoteHttpGenerator {
    pub fn new(client: reqwest::Client, api_key: &str, config: &ProviderConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            size: config.size.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for RemoteHttpGenerator {
    fn strategy(&self) -> GenerationStrategy {
        GenerationStrategy::RemoteHttp
    }

    #[instrument(skip_all, fields(storage_key = %key.storage_key))]
    async fn generate(
        &self,
        prompt: &str,
        key: &CorrelationKey,
    ) -> Result<GeneratedImage, PipelineError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&GenerationBody {
                model: &self.model,
                prompt,
                size: &self.size,
                n: 1,
            })
            .send()
            .await
            .map_err(transport(Upstream::ImageProvider))?;

        // Anything but a plain 200 is a failure, including other 2xx codes.
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Image provider rejected request");
            return Err(PipelineError::upstream_status(
                Upstream::ImageProvider,
                status.as_u16(),
                body,
            ));
        }

        let body: GenerationResponse = response.json().await.map_err(|e| {
            PipelineError::upstream(
                Upstream::ImageProvider,
                format!("invalid provider response: {e}"),
            )
        })?;

        body.data
            .into_iter()
            .next()
            .map(|image| GeneratedImage::from_url(image.url))
            .ok_or_else(|| PipelineError::ImageDecode("provider returned no images".into()))
    }
}
