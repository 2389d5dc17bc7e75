//! Error types for change-event parsing.

use thiserror::Error;

/// Errors that can occur when parsing subscription frames.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The frame is not a valid event envelope.
    #[error("malformed event frame: {0}")]
    Malformed(String),

    /// A `resource.change` event without `data.resource`.
    #[error("event data has no resource")]
    MissingResource,

    /// The resource does not match the expected shape for its type.
    #[error("invalid {kind} resource: {reason}")]
    InvalidResource { kind: String, reason: String },
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Malformed(err.to_string())
    }
}
