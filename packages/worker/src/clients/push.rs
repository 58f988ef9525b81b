use async_trait::async_trait;
use common::config::PushConfig;
use common::{ConnectionId, PipelineError};
use reqwest::{StatusCode, Url};

/// Push-to-connection API of the gateway holding client connections.
#[async_trait]
pub trait ConnectionPusher: Send + Sync {
    /// Fail early when the pusher cannot possibly deliver.
    fn check(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn push(&self, connection: &ConnectionId, body: &[u8]) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone)]
pub struct GatewayPusher {
    client: reqwest::Client,
    config: PushConfig,
}

impl GatewayPusher {
    pub fn new(client: reqwest::Client, config: PushConfig) -> Self {
        Self { client, config }
    }

    /// The configured endpoint, parsed. Must be an absolute http(s) URL.
    fn base_url(&self) -> Result<Url, PipelineError> {
        let endpoint = self.config.require_endpoint()?;
        let url = Url::parse(endpoint).map_err(|e| {
            PipelineError::Configuration(format!("invalid gateway.push_endpoint: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(PipelineError::Configuration(format!(
                "invalid gateway.push_endpoint: {endpoint} is not an http(s) URL"
            )));
        }
        Ok(url)
    }

    /// `{push_endpoint}/@connections/{id}`, with the id percent-encoded as a
    /// single path segment.
    fn connection_url(&self, connection: &ConnectionId) -> Result<Url, PipelineError> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| {
                PipelineError::Configuration("gateway.push_endpoint cannot be a base URL".into())
            })?
            .pop_if_empty()
            .push("@connections")
            .push(connection.as_str());
        Ok(url)
    }
}

#[async_trait]
impl ConnectionPusher for GatewayPusher {
    fn check(&self) -> Result<(), PipelineError> {
        self.base_url().map(|_| ())
    }

    async fn push(&self, connection: &ConnectionId, body: &[u8]) -> Result<(), PipelineError> {
        let url = self.connection_url(connection)?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| PipelineError::Delivery(format!("push failed: {e}")))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::GONE => Err(PipelineError::Delivery(format!(
                "connection {connection} is gone"
            ))),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(PipelineError::Delivery(format!(
                    "push rejected with status {}: {body}",
                    s.as_u16()
                )))
            }
        }
    }
}
