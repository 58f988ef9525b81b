//! Turns a client frame into a correlation-tagged generation request.

use common::mq::MessageEnvelope;
use common::{
    ConnectionId, CorrelationKey, GenerationRequest, GenerationStrategy, PipelineError, StorageKey,
};
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::state::AppState;

/// Source label stamped on envelopes published by the gateway.
pub const GATEWAY_SOURCE: &str = "gateway";

/// Frame a client sends to ask for an image.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    pub text: String,
    #[serde(alias = "s3Key")]
    pub storage_key: String,
    /// `true` selects the inline model, anything else the remote provider.
    #[serde(default, deserialize_with = "null_as_false")]
    pub bedrock: bool,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

impl IngestPayload {
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(raw)
            .map_err(|e| PipelineError::Validation(format!("invalid ingestion payload: {e}")))
    }

    pub fn into_request(self, connection_id: ConnectionId) -> GenerationRequest {
        GenerationRequest {
            key: CorrelationKey::new(connection_id, StorageKey::new(self.storage_key)),
            text: self.text,
            strategy: GenerationStrategy::from_selector(self.bedrock),
        }
    }
}

/// Validate `raw` and publish it on the ingestion edge.
pub async fn ingest(
    state: &AppState,
    connection_id: &ConnectionId,
    raw: &str,
) -> Result<GenerationRequest, PipelineError> {
    let request = IngestPayload::parse(raw)?.into_request(connection_id.clone());

    let envelope = MessageEnvelope::from_message(&request, Some(GATEWAY_SOURCE))?;
    state.bus.publish(&state.ingest_queue, &envelope).await?;

    info!(
        connection_id = %connection_id,
        storage_key = %request.key.storage_key,
        strategy = %request.strategy,
        message_id = %envelope.message_id,
        "Generation request published"
    );
    Ok(request)
}
