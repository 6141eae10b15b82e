use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid start_date '{value}': expected an RFC 3339 date-time")]
    InvalidStartDate { value: String },

    #[error("invalid api_url '{value}': expected an http(s) URL")]
    InvalidApiUrl { value: String },

    #[error("unknown stream '{name}': expected one of {known}")]
    UnknownStream { name: String, known: String },

    #[error("state.flush_every must be a positive integer, got {0}")]
    InvalidFlushEvery(i64),

    #[error("stream registry error: {0}")]
    Registry(#[from] chorustap_core::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
