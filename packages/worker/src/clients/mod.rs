//! HTTP clients for the services the stages depend on.

pub mod fetch;
pub mod image_provider;
pub mod model_runtime;
pub mod push;
pub mod text_analysis;

use std::time::Duration;

use common::config::HttpConfig;
use common::{PipelineError, Upstream};
use reqwest::Response;

pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use image_provider::RemoteHttpGenerator;
pub use model_runtime::InlineModelGenerator;
pub use push::{ConnectionPusher, GatewayPusher};
pub use text_analysis::{HttpTextAnalyzer, SentimentScores, TextAnalyzer};

/// Build the shared outbound client. One per process.
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PipelineError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a transport failure to an upstream error of `service`.
pub(crate) fn transport(service: Upstream) -> impl FnOnce(reqwest::Error) -> PipelineError {
    move |e| PipelineError::upstream(service, format!("HTTP request failed: {e}"))
}

/// Turn a non-success response into an upstream error carrying its body.
pub(crate) async fn status_error(service: Upstream, response: Response) -> PipelineError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PipelineError::upstream_status(service, status, body)
}
