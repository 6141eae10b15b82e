use thiserror::Error;

use crate::upstream::UpstreamError;

/// Errors that can occur in chorustap-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("schema violation in '{stream}' at '{field}': {reason}")]
    SchemaViolation {
        stream: String,
        field: String,
        reason: String,
    },

    #[error("unresolvable cursor in '{stream}' at '{field}': {reason}")]
    CursorViolation {
        stream: String,
        field: String,
        reason: String,
    },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),

    #[error("invalid stream definition '{stream}': {reason}")]
    InvalidDefinition { stream: String, reason: String },

    #[error("unknown stream: {0}")]
    UnknownStream(String),
}

impl Error {
    /// Whether the error should stop the current stream rather than skip one record.
    pub fn is_fatal_for_stream(&self) -> bool {
        !matches!(self, Error::SchemaViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
