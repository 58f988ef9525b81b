pub mod config;
pub mod error;
pub mod event;
pub mod image;
pub mod mq;
pub mod storage;

pub use error::{PipelineError, Upstream};
pub use event::{
    ConnectionId, CorrelationKey, DeliveryMessage, EnrichedPrompt, GenerationRequest,
    GenerationStrategy, ImageReady, StorageKey,
};
pub use image::{ArtifactTarget, GeneratedImage, StoredArtifact};
