//! Error types for camrelay
//!
//! The relay core (registry, fanout, identification) has no fallible
//! operations visible to callers; failures there are logged and absorbed.
//! The errors below cover the surrounding layers: device configuration
//! persistence, image ingestion and server bootstrap.

use std::path::PathBuf;

/// Crate-level result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure (socket bind, config file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Device configuration could not be persisted
    #[error("failed to persist configuration to {path}: {source}")]
    ConfigPersist {
        /// Target file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Device configuration update was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Image ingestion failed
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Errors raised while accepting an uploaded image
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Upload carried no bytes
    #[error("no image received")]
    EmptyPayload,

    /// Multipart upload had no file field
    #[error("no file field in multipart upload")]
    MissingField,

    /// Request body could not be read
    #[error("failed to read upload: {0}")]
    Body(String),

    /// Outbound envelope could not be encoded
    #[error("failed to encode image envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IngestError {
    /// Whether this failure was caused by the client's request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::EmptyPayload | IngestError::MissingField | IngestError::Body(_)
        )
    }
}

/// Errors raised while decoding an identification message
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame was not valid JSON
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Binary frame was not valid UTF-8
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
}
