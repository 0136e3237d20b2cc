//! HTTP error responses

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{Error, IngestError};

/// Error returned by route handlers, rendered as a plain-text body
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Response status
    pub status: StatusCode,
    /// Response body
    pub message: String,
}

impl ApiError {
    /// Error with an explicit status
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 with `message` as the body
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500; `message` must not leak internal details
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            tracing::error!(error = %err, "Image processing failed");
            ApiError::internal("Internal server error")
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidConfig(msg) => ApiError::bad_request(msg),
            Error::Ingest(e) => e.into(),
            Error::ConfigPersist { .. } => {
                tracing::error!(error = %err, "Configuration save failed");
                ApiError::internal("Failed to save configuration")
            }
            Error::Io(_) | Error::Json(_) => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("Internal server error")
            }
        }
    }
}
