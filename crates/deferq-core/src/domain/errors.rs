//! Error taxonomy.
//!
//! - `DeserializationError`: the stored handler cannot be turned back into a
//!   payload. Recoverable; only the affected job is impacted.
//! - `PerformError`: raised by payload code (`perform` or a lifecycle hook).
//! - `StoreError`: raised by the storage collaborator.
//! - `QueueError`: what enqueue and job execution surface to callers.
//!
//! Losing a lease race is not an error and has no variant here.

use super::JobId;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeserializationError {
    #[error("job failed to load: handler carries no type tag. Handler: {handler:?}")]
    MissingTag { handler: String },

    #[error("job failed to load: payload type `{tag}` is not registered")]
    UnknownType { tag: String },

    #[error("job failed to load: payload type `{tag}` is denied")]
    Denied { tag: String },

    #[error("job failed to load: {reason}. Handler: {handler:?}")]
    Malformed { reason: String, handler: String },
}

#[derive(Debug, thiserror::Error)]
#[error("failed to encode payload `{tag}`: {source}")]
pub struct EncodeError {
    pub tag: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Failure raised by payload code.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PerformError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl PerformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn from_source(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job is not persisted yet")]
    NotPersisted,

    #[error("store backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The payload type cannot be enqueued (unregistered or denied), so no
    /// worker would ever be able to decode it.
    #[error("cannot enqueue payload type `{0}`: it is not decodable by this queue")]
    InvalidPayload(String),

    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Perform(#[from] PerformError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn perform_error_keeps_source_message() {
        let io = std::io::Error::other("disk full");
        let err = PerformError::from_source(io);

        assert_eq!(err.message(), "disk full");
        assert!(err.source().is_some());
    }

    #[test]
    fn queue_error_is_transparent_over_perform_error() {
        let err: QueueError = PerformError::new("boom").into();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn deserialization_error_mentions_tag() {
        let err = DeserializationError::UnknownType {
            tag: "mailer.welcome.v1".to_string(),
        };
        assert!(err.to_string().contains("mailer.welcome.v1"));
    }
}
