use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{CorrelationKey, GeneratedImage, GenerationStrategy, PipelineError, Upstream};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{status_error, transport};
use crate::config::ModelConfig;
use crate::stages::ImageGenerator;

/// Images are always square.
const IMAGE_SIDE: u32 = 1024;
const CFG_SCALE: f32 = 8.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextToImageRequest<'a> {
    task_type: &'static str,
    text_to_image_params: TextToImageParams<'a>,
    image_generation_config: ImageGenerationConfig,
}

#[derive(Debug, Serialize)]
struct TextToImageParams<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageGenerationConfig {
    number_of_images: u32,
    height: u32,
    width: u32,
    cfg_scale: f32,
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Synchronous model invocation. The response carries the image itself,
/// base64-encoded.
#[derive(Debug, Clone)]
pub struct InlineModelGenerator {
    client: reqwest::Client,
    invoke_url: String,
}

impl InlineModelGenerator {
    pub fn new(client: reqwest::Client, endpoint: &str, config: &ModelConfig) -> Self {
        Self {
            client,
            invoke_url: format!(
                "{}/model/{}/invoke",
                endpoint.trim_end_matches('/'),
                config.model_id
            ),
        }
    }

    fn request<'a>(&self, prompt: &'a str) -> TextToImageRequest<'a> {
        TextToImageRequest {
            task_type: "TEXT_IMAGE",
            text_to_image_params: TextToImageParams { text: prompt },
            image_generation_config: ImageGenerationConfig {
                number_of_images: 1,
                height: IMAGE_SIDE,
                width: IMAGE_SIDE,
                cfg_scale: CFG_SCALE,
            },
        }
    }
}

/// Decode the first image of a model response. Later images are ignored.
fn first_image(response: TextToImageResponse) -> Result<Vec<u8>, PipelineError> {
    let Some(encoded) = response.images.first() else {
        let reason = response.error.unwrap_or_else(|| "no images returned".into());
        return Err(PipelineError::ImageDecode(reason));
    };
    STANDARD
        .decode(encoded)
        .map_err(|e| PipelineError::ImageDecode(format!("invalid base64 image: {e}")))
}

#[async_trait]
impl ImageGenerator for InlineModelGenerator {
    fn strategy(&self) -> GenerationStrategy {
        GenerationStrategy::InlineModel
    }

    #[instrument(skip_all, fields(storage_key = %key.storage_key))]
    async fn generate(
        &self,
        prompt: &str,
        key: &CorrelationKey,
    ) -> Result<GeneratedImage, PipelineError> {
        let response = self
            .client
            .post(&self.invoke_url)
            .header(reqwest::header::ACCEPT, "*/*")
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(transport(Upstream::ImageModel))?;

        if !response.status().is_success() {
            return Err(status_error(Upstream::ImageModel, response).await);
        }

        let body: TextToImageResponse = response.json().await.map_err(|e| {
            PipelineError::upstream(Upstream::ImageModel, format!("invalid model response: {e}"))
        })?;
        debug!(images = body.images.len(), "Model responded");

        first_image(body).map(GeneratedImage::from_bytes)
    }
}
