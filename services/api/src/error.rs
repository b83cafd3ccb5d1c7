//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant renders as an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use datagen_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A missing or empty required field in the request.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, or expired bearer token.
    #[error("Invalid token")]
    Unauthorized,

    /// No such record, or the record belongs to a different account.
    #[error("{0}")]
    NotFound(String),

    /// The account's balance cannot cover the generation cost.
    #[error("Not enough credits")]
    InsufficientCredits,

    /// The ML or scraper collaborator was unreachable or returned an error.
    #[error("Upstream service failure: {0}")]
    Upstream(String),

    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ApiError::NotFound(msg),
            PortError::Conflict(msg) => ApiError::Validation(msg),
            PortError::InsufficientCredits => ApiError::InsufficientCredits,
            PortError::Unexpected(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    /// Maps the error taxonomy onto status codes. Every body is a small
    /// `{"msg": ...}` object; internal detail is logged, never leaked.
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InsufficientCredits => {
                (StatusCode::BAD_REQUEST, "Not enough credits".to_string())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(detail) => {
                error!("Upstream failure: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
            other => {
                error!("Internal error: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(json!({ "msg": msg }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One arm per port variant; the match in `From` keeps this exhaustive.
    #[test]
    fn port_errors_map_onto_the_http_taxonomy() {
        assert!(matches!(
            ApiError::from(PortError::NotFound("dataset".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(PortError::Conflict("user".into())),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(PortError::InsufficientCredits),
            ApiError::InsufficientCredits
        ));
        assert!(matches!(
            ApiError::from(PortError::Unexpected("boom".into())),
            ApiError::Internal(_)
        ));
    }
}
