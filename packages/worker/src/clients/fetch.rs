use async_trait::async_trait;
use common::{PipelineError, Upstream};
use reqwest::StatusCode;
use tracing::debug;

use super::{status_error, transport};

/// Download of a provider-hosted image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport(Upstream::ImageFetch))?;

        if response.status() != StatusCode::OK {
            return Err(status_error(Upstream::ImageFetch, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(transport(Upstream::ImageFetch))?;
        debug!(url = %url, size = bytes.len(), "Image fetched");
        Ok(bytes.to_vec())
    }
}
