//! Pipeline stages and the pieces they share.

pub mod deliver;
pub mod enrich;
pub mod generate;
pub mod persist;
pub mod upload;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    ArtifactTarget, CorrelationKey, GeneratedImage, GenerationStrategy, PipelineError,
    StoredArtifact,
};

pub use deliver::Deliverer;
pub use enrich::{EnrichStage, build_prompt, sentiment_token, top_sentiment};
pub use generate::GenerateStage;
pub use persist::Persister;
pub use upload::UploadStage;

/// One way of turning a prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn strategy(&self) -> GenerationStrategy;

    async fn generate(
        &self,
        prompt: &str,
        key: &CorrelationKey,
    ) -> Result<GeneratedImage, PipelineError>;
}

/// Generators available to this process, one per strategy.
#[derive(Clone, Default)]
pub struct Generators {
    by_strategy: HashMap<GenerationStrategy, Arc<dyn ImageGenerator>>,
}

impl Generators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.by_strategy.insert(generator.strategy(), generator);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.by_strategy.is_empty()
    }

    pub fn select(
        &self,
        strategy: GenerationStrategy,
    ) -> Result<&Arc<dyn ImageGenerator>, PipelineError> {
        self.by_strategy.get(&strategy).ok_or_else(|| {
            PipelineError::Configuration(format!("no generator configured for {strategy}"))
        })
    }
}

/// Persistence followed by delivery, shared by the inline generation path
/// and the upload stage.
#[derive(Clone)]
pub struct Finisher {
    persister: Persister,
    deliverer: Deliverer,
}

impl Finisher {
    pub fn new(persister: Persister, deliverer: Deliverer) -> Self {
        Self {
            persister,
            deliverer,
        }
    }

    /// Resolve everything persistence and delivery need. Runs before any
    /// external call of the invocation.
    pub fn preflight(&self) -> Result<ArtifactTarget, PipelineError> {
        let target = self.persister.target()?;
        self.deliverer.check()?;
        Ok(target)
    }

    /// Store the image and tell the client where it is. Delivery failures
    /// do not fail the invocation.
    pub async fn finish(
        &self,
        target: &ArtifactTarget,
        key: &CorrelationKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, PipelineError> {
        let artifact = self
            .persister
            .persist(target, &key.storage_key, data, content_type)
            .await?;
        self.deliverer
            .deliver(&key.connection_id, &artifact)
            .await;
        Ok(artifact)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process stand-ins for the external services.

    use std::path::Path;

    use async_trait::async_trait;
    use common::config::StorageConfig;
    use common::storage::filesystem::FilesystemObjectStore;
    use common::{ConnectionId, StorageKey};
    use tokio::sync::Mutex;

    use super::*;
    use crate::clients::{ConnectionPusher, ImageFetcher, SentimentScores, TextAnalyzer};

    pub fn key() -> CorrelationKey {
        CorrelationKey::new(ConnectionId::new("conn-1"), StorageKey::new("abc123"))
    }

    pub fn storage(bucket: Option<&str>) -> StorageConfig {
        StorageConfig {
            bucket: bucket.map(str::to_string),
            region: Some("us-east-1".into()),
            ..StorageConfig::default()
        }
    }

    pub async fn store(root: &Path) -> Arc<FilesystemObjectStore> {
        Arc::new(
            FilesystemObjectStore::new(root.to_path_buf(), 1024 * 1024)
                .await
                .unwrap(),
        )
    }

    #[derive(Default)]
    pub struct RecordingPusher {
        pub pushed: Mutex<Vec<(ConnectionId, String)>>,
        pub fail: bool,
        pub unconfigured: bool,
    }

    #[async_trait]
    impl ConnectionPusher for RecordingPusher {
        fn check(&self) -> Result<(), PipelineError> {
            if self.unconfigured {
                return Err(PipelineError::missing_setting("gateway.push_endpoint"));
            }
            Ok(())
        }

        async fn push(&self, connection: &ConnectionId, body: &[u8]) -> Result<(), PipelineError> {
            if self.fail {
                return Err(PipelineError::Delivery("connection is gone".into()));
            }
            self.pushed.lock().await.push((
                connection.clone(),
                String::from_utf8_lossy(body).into_owned(),
            ));
            Ok(())
        }
    }

    pub struct FakeAnalyzer {
        pub scores: SentimentScores,
        pub phrases: Vec<String>,
        pub fail: bool,
    }

    #[async_trait]
    impl TextAnalyzer for FakeAnalyzer {
        async fn sentiment(&self, _text: &str) -> Result<SentimentScores, PipelineError> {
            if self.fail {
                return Err(PipelineError::upstream_status(
                    common::Upstream::TextAnalysis,
                    500,
                    "unavailable",
                ));
            }
            Ok(self.scores)
        }

        async fn key_phrases(&self, _text: &str) -> Result<Vec<String>, PipelineError> {
            Ok(self.phrases.clone())
        }
    }

    /// Returns a canned result and counts calls.
    pub struct StaticGenerator {
        pub strategy: GenerationStrategy,
        pub result: fn() -> Result<GeneratedImage, PipelineError>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticGenerator {
        pub fn new(
            strategy: GenerationStrategy,
            result: fn() -> Result<GeneratedImage, PipelineError>,
        ) -> Self {
            Self {
                strategy,
                result,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for StaticGenerator {
        fn strategy(&self) -> GenerationStrategy {
            self.strategy
        }

        async fn generate(
            &self,
            prompt: &str,
            _key: &CorrelationKey,
        ) -> Result<GeneratedImage, PipelineError> {
            self.calls.lock().await.push(prompt.to_string());
            (self.result)()
        }
    }

    pub struct StaticFetcher {
        pub body: Vec<u8>,
        pub calls: Mutex<usize>,
    }

    #[async_trait]
    impl ImageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, PipelineError> {
            *self.calls.lock().await += 1;
            Ok(self.body.clone())
        }
    }
}
