use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Core trait for all events carried on the bus
pub trait Message: Serialize + DeserializeOwned + Debug + Send + Sync + Clone {
    /// Fixed event-type label. Only the consumer of this label decodes the payload.
    fn message_type() -> &'static str
    where
        Self: Sized;

    fn metadata(&self) -> MessageMetadata {
        MessageMetadata::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Unix timestamp (ms) at which the envelope was created.
    pub timestamp: i64,
    /// Component that published the event, e.g. "gateway".
    pub source: Option<String>,
}

/// Message envelope for transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_type: String,
    pub message_id: String,
    pub metadata: MessageMetadata,
    pub payload: serde_json::Value,
}

impl MessageEnvelope {
    /// Create envelope from typed message
    pub fn from_message<M: Message>(message: &M, source: Option<&str>) -> Result<Self, MqError> {
        let message_type = M::message_type().to_string();
        let message_id = uuid::Uuid::new_v4().to_string();

        debug!(
            message_type = %message_type,
            message_id = %message_id,
            "Creating message envelope"
        );

        let mut metadata = message.metadata();
        metadata.timestamp = chrono::Utc::now().timestamp_millis();
        if metadata.source.is_none() {
            metadata.source = source.map(str::to_string);
        }

        Ok(Self {
            message_type,
            message_id,
            metadata,
            payload: serde_json::to_value(message)?,
        })
    }

    /// Deserialize into typed message
    pub fn into_message<M: Message>(self) -> Result<M, MqError> {
        if self.message_type != M::message_type() {
            error!(
                expected = M::message_type(),
                actual = %self.message_type,
                message_id = %self.message_id,
                "Message type mismatch"
            );
            return Err(MqError::TypeMismatch {
                expected: M::message_type().to_string(),
                actual: self.message_type,
            });
        }

        debug!(
            message_type = %self.message_type,
            message_id = %self.message_id,
            "Deserializing message"
        );

        serde_json::from_value(self.payload).map_err(|e| {
            error!(error = %e, message_id = %self.message_id, "Deserialization failed");
            MqError::Serialization(e)
        })
    }
}

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Message type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Publish side of the event bus connecting stages.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, queue: &str, envelope: &MessageEnvelope) -> Result<(), MqError>;
}

/// In-process bus backed by per-queue FIFOs. Used for local runs and tests;
/// consumers pull with [`MemoryBus::pop`].
#[derive(Debug, Default)]
pub struct MemoryBus {
    queues: Mutex<HashMap<String, VecDeque<MessageEnvelope>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest envelope from `queue`.
    pub async fn pop(&self, queue: &str) -> Option<MessageEnvelope> {
        self.queues.lock().await.get_mut(queue)?.pop_front()
    }

    /// Take every pending envelope from `queue`, oldest first.
    pub async fn drain(&self, queue: &str) -> Vec<MessageEnvelope> {
        self.queues
            .lock()
            .await
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, queue: &str) -> usize {
        self.queues.lock().await.get(queue).map_or(0, VecDeque::len)
    }

    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, queue: &str, envelope: &MessageEnvelope) -> Result<(), MqError> {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(envelope.clone());
        Ok(())
    }
}
