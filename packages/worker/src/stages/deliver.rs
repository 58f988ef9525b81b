use std::sync::Arc;

use common::{ConnectionId, DeliveryMessage, PipelineError, StoredArtifact};
use tracing::{info, warn};

use crate::clients::ConnectionPusher;

/// Pushes the public URL of a stored image to the client connection.
#[derive(Clone)]
pub struct Deliverer {
    pusher: Arc<dyn ConnectionPusher>,
}

impl Deliverer {
    pub fn new(pusher: Arc<dyn ConnectionPusher>) -> Self {
        Self { pusher }
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        self.pusher.check()
    }

    /// Fire and forget. A failure is logged and goes no further.
    pub async fn deliver(&self, connection: &ConnectionId, artifact: &StoredArtifact) {
        match self.try_deliver(connection, artifact).await {
            Ok(()) => {
                info!(connection_id = %connection, url = %artifact.public_url, "Image delivered");
            }
            Err(e) => {
                warn!(
                    connection_id = %connection,
                    storage_key = %artifact.storage_key,
                    kind = e.kind(),
                    error = %e,
                    "Delivery failed, stored image is left in place"
                );
            }
        }
    }

    async fn try_deliver(
        &self,
        connection: &ConnectionId,
        artifact: &StoredArtifact,
    ) -> Result<(), PipelineError> {
        let body = serde_json::to_vec(&DeliveryMessage {
            url: artifact.public_url.clone(),
        })
        .map_err(|e| PipelineError::Delivery(format!("failed to encode message: {e}")))?;
        self.pusher.push(connection, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::RecordingPusher;
    use common::StorageKey;

    fn artifact() -> StoredArtifact {
        StoredArtifact {
            storage_key: StorageKey::new("abc123"),
            public_url: "https://images.s3.us-east-1.amazonaws.com/abc123".into(),
        }
    }

    #[tokio::test]
    async fn deliver_pushes_url_json() {
        let pusher = Arc::new(RecordingPusher::default());
        let deliverer = Deliverer::new(pusher.clone());

        deliverer
            .deliver(&ConnectionId::new("conn-1"), &artifact())
            .await;

        let pushed = pusher.pushed.lock().await;
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, ConnectionId::new("conn-1"));
        assert_eq!(
            pushed[0].1,
            r#"{"url":"https://images.s3.us-east-1.amazonaws.com/abc123"}"#
        );
    }

    #[tokio::test]
    async fn failed_push_is_swallowed() {
        let pusher = Arc::new(RecordingPusher {
            fail: true,
            ..RecordingPusher::default()
        });
        let deliverer = Deliverer::new(pusher.clone());

        deliverer
            .deliver(&ConnectionId::new("gone"), &artifact())
            .await;
        assert!(pusher.pushed.lock().await.is_empty());
    }
}
