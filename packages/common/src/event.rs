use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mq::Message;

/// Event-type label of the ingestion → enrichment edge.
pub const PREPARE_PROMPT: &str = "PreparePrompt";
/// Event-type label of the enrichment → generation edge.
pub const GENERATE_IMAGE: &str = "GenerateImage";
/// Event-type label of the remote-provider → persistence edge.
pub const UPLOAD_IMAGE: &str = "UploadImage";

/// Opaque identifier of a client connection held by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque object-store key chosen by the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (connection, storage key) pair that ties every event back to the
/// request that produced it. Stages copy it forward and never look inside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationKey {
    pub connection_id: ConnectionId,
    pub storage_key: StorageKey,
}

impl CorrelationKey {
    pub fn new(connection_id: ConnectionId, storage_key: StorageKey) -> Self {
        Self {
            connection_id,
            storage_key,
        }
    }
}

/// Which image-generation variant handles a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Synchronous model invocation returning image bytes.
    InlineModel,
    /// Remote HTTP provider returning an image URL.
    RemoteHttp,
}

impl GenerationStrategy {
    /// Map the client's boolean selector (`true` = inline model).
    pub fn from_selector(inline: bool) -> Self {
        if inline {
            Self::InlineModel
        } else {
            Self::RemoteHttp
        }
    }

    /// Whether generation yields bytes that are persisted and delivered in
    /// the same invocation, rather than a reference handled downstream.
    pub fn persists_inline(&self) -> bool {
        matches!(self, Self::InlineModel)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InlineModel => "inline_model",
            Self::RemoteHttp => "remote_http",
        }
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client's raw ask, published by the gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(flatten)]
    pub key: CorrelationKey,
    pub text: String,
    pub strategy: GenerationStrategy,
}

impl Message for GenerationRequest {
    fn message_type() -> &'static str {
        PREPARE_PROMPT
    }
}

/// Text turned into a generation instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPrompt {
    #[serde(flatten)]
    pub key: CorrelationKey,
    pub prompt: String,
    pub strategy: GenerationStrategy,
}

impl Message for EnrichedPrompt {
    fn message_type() -> &'static str {
        GENERATE_IMAGE
    }
}

/// Remote provider result awaiting fetch, persistence and delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageReady {
    #[serde(flatten)]
    pub key: CorrelationKey,
    pub url: String,
}

impl Message for ImageReady {
    fn message_type() -> &'static str {
        UPLOAD_IMAGE
    }
}

/// Final payload pushed to the client connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMessage {
    pub url: String,
}
