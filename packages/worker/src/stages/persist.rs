use std::sync::Arc;

use common::config::StorageConfig;
use common::storage::ObjectStore;
use common::{ArtifactTarget, PipelineError, StorageKey, StoredArtifact};
use tracing::info;

/// Writes images to object storage under the request's storage key.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn ObjectStore>,
    storage: StorageConfig,
}

impl Persister {
    pub fn new(store: Arc<dyn ObjectStore>, storage: StorageConfig) -> Self {
        Self { store, storage }
    }

    pub fn target(&self) -> Result<ArtifactTarget, PipelineError> {
        self.storage.target()
    }

    /// Store `data`, replacing whatever the key held before.
    pub async fn persist(
        &self,
        target: &ArtifactTarget,
        key: &StorageKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, PipelineError> {
        self.store.put(key, data, content_type).await?;

        let public_url = target.public_url(key);
        info!(
            storage_key = %key,
            content_type,
            size = data.len(),
            url = %public_url,
            "Image persisted"
        );
        Ok(StoredArtifact {
            storage_key: key.clone(),
            public_url,
        })
    }
}
