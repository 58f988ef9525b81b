use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{HttpConfig, MqAppConfig, PushConfig, StorageConfig};
use common::PipelineError;

use crate::pipeline::StageNode;

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Concurrent invocations per consumed queue. Default: 10.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Stage consumers this process runs. Default: all of them.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageNode>,
}

fn default_worker_id() -> String {
    "worker-1".into()
}
fn default_concurrency() -> usize {
    10
}
fn default_stages() -> Vec<StageNode> {
    StageNode::consumers().to_vec()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            concurrency: default_concurrency(),
            stages: default_stages(),
        }
    }
}

impl WorkerConfig {
    pub fn runs(&self, node: StageNode) -> bool {
        self.stages.contains(&node)
    }
}

/// Text analysis service used by the enrichment stage.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Base URL of the sentiment/key-phrase service.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Language of submitted text. Default: "en".
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

fn default_language_code() -> String {
    "en".into()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            language_code: default_language_code(),
        }
    }
}

/// Inline image model runtime.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Base URL of the model runtime.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Default: "amazon.titan-image-generator-v1".
    #[serde(default = "default_model_id")]
    pub model_id: String,
}

fn default_model_id() -> String {
    "amazon.titan-image-generator-v1".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_id: default_model_id(),
        }
    }
}

/// Remote image generation provider.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Default: "https://api.openai.com/v1/images/generations".
    #[serde(default = "default_provider_endpoint")]
    pub endpoint: String,
    /// Bearer token. Required by the remote strategy.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Default: "dall-e-3".
    #[serde(default = "default_provider_model")]
    pub model: String,
    /// Default: "1024x1024".
    #[serde(default = "default_provider_size")]
    pub size: String,
}

fn default_provider_endpoint() -> String {
    "https://api.openai.com/v1/images/generations".into()
}
fn default_provider_model() -> String {
    "dall-e-3".into()
}
fn default_provider_size() -> String {
    "1024x1024".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_provider_endpoint(),
            api_key: None,
            model: default_provider_model(),
            size: default_provider_size(),
        }
    }
}

fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, PipelineError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::missing_setting(name))
}

impl AnalysisConfig {
    pub fn require_endpoint(&self) -> Result<&str, PipelineError> {
        require(&self.endpoint, "analysis.endpoint").map(|e| e.trim_end_matches('/'))
    }
}

impl ModelConfig {
    pub fn require_endpoint(&self) -> Result<&str, PipelineError> {
        require(&self.endpoint, "model.endpoint").map(|e| e.trim_end_matches('/'))
    }
}

impl ProviderConfig {
    pub fn require_api_key(&self) -> Result<&str, PipelineError> {
        require(&self.api_key, "provider.api_key")
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gateway: PushConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("IMAGINE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("worker.id", "worker-1")?
            .set_default("worker.concurrency", 10_i64)?
            .set_default("mq.pool_size", 5_i64)?
            .set_default("http.timeout_secs", 120_i64)?
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., IMAGINE__STORAGE__BUCKET)
            .add_source(
                Environment::with_prefix("IMAGINE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("worker.stages")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
