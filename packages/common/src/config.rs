use serde::Deserialize;

use crate::error::PipelineError;
use crate::image::ArtifactTarget;

/// Treat unset and blank values alike.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Event bus configuration shared by the gateway and the worker.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL identifying the event bus. Required.
    #[serde(default)]
    pub url: Option<String>,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Ingestion → enrichment queue. Default: "prepare_prompt".
    #[serde(default = "default_prepare_prompt_queue")]
    pub prepare_prompt_queue: String,
    /// Enrichment → generation queue. Default: "generate_image".
    #[serde(default = "default_generate_image_queue")]
    pub generate_image_queue: String,
    /// Remote provider → persistence queue. Default: "upload_image".
    #[serde(default = "default_upload_image_queue")]
    pub upload_image_queue: String,
}

fn default_mq_pool_size() -> u8 {
    5
}
fn default_prepare_prompt_queue() -> String {
    "prepare_prompt".into()
}
fn default_generate_image_queue() -> String {
    "generate_image".into()
}
fn default_upload_image_queue() -> String {
    "upload_image".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_mq_pool_size(),
            prepare_prompt_queue: default_prepare_prompt_queue(),
            generate_image_queue: default_generate_image_queue(),
            upload_image_queue: default_upload_image_queue(),
        }
    }
}

impl MqAppConfig {
    pub fn require_url(&self) -> Result<&str, PipelineError> {
        non_empty(&self.url).ok_or_else(|| PipelineError::missing_setting("mq.url"))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    S3,
    Filesystem,
}

/// Object storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Which store objects are written to. Default: s3.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Bucket name. Required by the persisting stages.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Bucket region. Required by the persisting stages.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Root directory for the filesystem backend. Default: "./data/objects".
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Largest accepted object in bytes. Default: 32 MiB.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,
}

fn default_storage_root() -> String {
    "./data/objects".into()
}
fn default_max_object_size() -> u64 {
    32 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: None,
            region: None,
            endpoint: None,
            root: default_storage_root(),
            max_object_size: default_max_object_size(),
        }
    }
}

impl StorageConfig {
    /// Resolve the bucket/region pair public URLs are derived from.
    pub fn target(&self) -> Result<ArtifactTarget, PipelineError> {
        let bucket =
            non_empty(&self.bucket).ok_or_else(|| PipelineError::missing_setting("storage.bucket"))?;
        let region =
            non_empty(&self.region).ok_or_else(|| PipelineError::missing_setting("storage.region"))?;
        Ok(ArtifactTarget::new(bucket, region))
    }
}

/// Where the delivery stage reaches the gateway's push-to-connection API.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PushConfig {
    /// Base URL of the gateway, e.g. "http://gateway:3000". Required by the
    /// delivering stages.
    #[serde(default)]
    pub push_endpoint: Option<String>,
}

impl PushConfig {
    pub fn require_endpoint(&self) -> Result<&str, PipelineError> {
        non_empty(&self.push_endpoint)
            .map(|e| e.trim_end_matches('/'))
            .ok_or_else(|| PipelineError::missing_setting("gateway.push_endpoint"))
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-request deadline in seconds. Default: 120.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    120
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}
