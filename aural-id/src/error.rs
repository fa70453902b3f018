//! Error types for aural-id
//!
//! HTTP error responses share one JSON shape: `{"error":{"code","message"}}`.
//! Codes are stable strings; messages are human-readable and never carry
//! stack traces, internal identifiers, or filesystem paths.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Stored audio file missing or unreachable (404, distinct code)
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Invalid request (400) with a stable error code
    #[error("Invalid request [{code}]: {message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    /// Missing, wrong, or unconfigured admin key (403)
    #[error("Forbidden [{code}]: {message}")]
    Auth {
        code: &'static str,
        message: String,
    },

    /// Another ingestion is in progress (429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Backend dependency failed (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// All requested search lanes exceeded their budget (504)
    #[error("Search timed out: {0}")]
    SearchTimeout(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// aural-common error
    #[error("Common error: {0}")]
    Common(#[from] aural_common::Error),
}

impl ApiError {
    /// Shorthand for a 400 with a stable code
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a 403 with a stable code
    pub fn auth(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Auth {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            ApiError::Internal(_) | ApiError::Io(_) | ApiError::Other(_) | ApiError::Common(_)
        ) {
            // Detail is logged server-side; the client gets a generic body.
            tracing::error!(error = %self, "Internal error");
        }

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::FileNotFound(msg) => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND", msg),
            ApiError::Validation { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Auth { code, message } => (StatusCode::FORBIDDEN, code, message),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiError::SearchTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "SEARCH_TIMEOUT", msg),
            ApiError::Internal(_) | ApiError::Io(_) | ApiError::Other(_) | ApiError::Common(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An unexpected error occurred.".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
