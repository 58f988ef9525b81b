use std::fmt;

use thiserror::Error;

use crate::mq::MqError;
use crate::storage::StorageError;

/// External collaborator that an [`PipelineError::Upstream`] failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    TextAnalysis,
    ImageModel,
    ImageProvider,
    ImageFetch,
    ObjectStore,
    EventBus,
}

impl Upstream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextAnalysis => "text_analysis",
            Self::ImageModel => "image_model",
            Self::ImageProvider => "image_provider",
            Self::ImageFetch => "image_fetch",
            Self::ObjectStore => "object_store",
            Self::EventBus => "event_bus",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a stage invocation can fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required setting is missing. Raised before any external call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The inbound payload is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{service} failed{}: {message}", status_suffix(.status))]
    Upstream {
        service: Upstream,
        status: Option<u16>,
        message: String,
    },

    /// The generation provider returned no usable image.
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// Pushing to the client connection failed.
    #[error("Delivery error: {0}")]
    Delivery(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl PipelineError {
    pub fn upstream(service: Upstream, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: None,
            message: message.into(),
        }
    }

    pub fn upstream_status(service: Upstream, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn missing_setting(name: &str) -> Self {
        Self::Configuration(format!("missing required setting `{name}`"))
    }

    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Upstream { .. } => "upstream",
            Self::ImageDecode(_) => "image_decode",
            Self::Delivery(_) => "delivery",
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Backend {
                status: Some(status),
                ref message,
            } => Self::upstream_status(Upstream::ObjectStore, status, message.as_str()),
            other => Self::upstream(Upstream::ObjectStore, other.to_string()),
        }
    }
}

impl From<MqError> for PipelineError {
    fn from(err: MqError) -> Self {
        match err {
            MqError::TypeMismatch { .. } | MqError::Serialization(_) => {
                Self::Validation(err.to_string())
            }
            other => Self::upstream(Upstream::EventBus, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display_includes_status_when_known() {
        let err = PipelineError::upstream_status(Upstream::ImageProvider, 500, "boom");
        assert_eq!(err.to_string(), "image_provider failed with status 500: boom");

        let err = PipelineError::upstream(Upstream::ObjectStore, "disk full");
        assert_eq!(err.to_string(), "object_store failed: disk full");
    }

    #[test]
    fn bus_decode_errors_are_validation() {
        let err: PipelineError = MqError::TypeMismatch {
            expected: "a".into(),
            actual: "b".into(),
        }
        .into();
        assert_eq!(err.kind(), "validation");

        let err: PipelineError = MqError::Publish("redis down".into()).into();
        assert!(matches!(
            err,
            PipelineError::Upstream {
                service: Upstream::EventBus,
                ..
            }
        ));
    }

    #[test]
    fn storage_errors_are_upstream() {
        let err: PipelineError = StorageError::NotFound("k".into()).into();
        assert!(matches!(
            err,
            PipelineError::Upstream {
                service: Upstream::ObjectStore,
                status: None,
                ..
            }
        ));
    }

    #[test]
    fn rejected_storage_write_keeps_status() {
        let err: PipelineError = StorageError::Backend {
            status: Some(403),
            message: "AccessDenied".into(),
        }
        .into();
        assert!(matches!(
            &err,
            PipelineError::Upstream {
                service: Upstream::ObjectStore,
                status: Some(403),
                message,
            } if message == "AccessDenied"
        ));
    }
}
