use std::sync::Arc;

use async_trait::async_trait;
use common::image::sniff_content_type;
use common::{ImageReady, PipelineError};
use tracing::instrument;

use super::Finisher;
use crate::clients::ImageFetcher;
use crate::pipeline::{Emit, Stage, StageNode};

/// Fetches a provider-hosted image, stores it and delivers its public URL.
pub struct UploadStage {
    fetcher: Arc<dyn ImageFetcher>,
    finisher: Finisher,
}

impl UploadStage {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, finisher: Finisher) -> Self {
        Self { fetcher, finisher }
    }
}

#[async_trait]
impl Stage for UploadStage {
    type Input = ImageReady;

    fn node(&self) -> StageNode {
        StageNode::Upload
    }

    #[instrument(skip_all, fields(connection_id = %input.key.connection_id, storage_key = %input.key.storage_key))]
    async fn handle(&self, input: ImageReady) -> Result<Option<Emit>, PipelineError> {
        let target = self.finisher.preflight()?;

        let data = self.fetcher.fetch(&input.url).await?;
        let content_type = sniff_content_type(&data);

        self.finisher
            .finish(&target, &input.key, &data, content_type)
            .await?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{RecordingPusher, StaticFetcher, key, storage, store};
    use crate::stages::{Deliverer, Persister};
    use common::StorageKey;
    use common::storage::ObjectStore;
    use tokio::sync::Mutex;

    const JPEG: &[u8] = b"\xff\xd8\xff\xe0rest";

    fn ready() -> ImageReady {
        ImageReady {
            key: key(),
            url: "https://provider.example/img".into(),
        }
    }

    #[tokio::test]
    async fn upload_stores_with_sniffed_type_and_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let pusher = Arc::new(RecordingPusher::default());
        let stage = UploadStage::new(
            Arc::new(StaticFetcher {
                body: JPEG.to_vec(),
                calls: Mutex::new(0),
            }),
            Finisher::new(
                Persister::new(store.clone(), storage(Some("images"))),
                Deliverer::new(pusher.clone()),
            ),
        );

        assert!(stage.handle(ready()).await.unwrap().is_none());

        let key = StorageKey::new("abc123");
        assert_eq!(store.get(&key).await.unwrap(), JPEG);
        assert_eq!(store.content_type(&key).await.unwrap(), "image/jpeg");
        let pushed = pusher.pushed.lock().await;
        assert_eq!(pushed[0].0.as_str(), "conn-1");
        assert_eq!(
            pushed[0].1,
            r#"{"url":"https://images.s3.us-east-1.amazonaws.com/abc123"}"#
        );
    }

    #[tokio::test]
    async fn missing_bucket_aborts_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let pusher = Arc::new(RecordingPusher::default());
        let fetcher = Arc::new(StaticFetcher {
            body: JPEG.to_vec(),
            calls: Mutex::new(0),
        });
        let stage = UploadStage::new(
            fetcher.clone(),
            Finisher::new(
                Persister::new(store.clone(), storage(None)),
                Deliverer::new(pusher.clone()),
            ),
        );

        let err = stage.handle(ready()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(*fetcher.calls.lock().await, 0);
        assert!(!store.exists(&StorageKey::new("abc123")).await.unwrap());
        assert!(pusher.pushed.lock().await.is_empty());
    }
}
