//! # Error Handling Module
//!
//! Error types for the trigger ingestion API, with an axum response
//! mapping so handlers can bubble errors with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the trigger API service.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Storage and database errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Kafka publish errors
    #[error("Kafka error: {message}")]
    Kafka { message: String },

    /// Request validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Missing or invalid credentials
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Requested resource does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Token encryption errors
    #[error("Crypto error: {message}")]
    Crypto { message: String },

    /// Internal service errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn kafka(message: impl Into<String>) -> Self {
        Self::Kafka {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short category label for logs and response bodies.
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Configuration { .. } => "configuration",
            ApiError::Storage { .. } => "storage",
            ApiError::Kafka { .. } => "kafka",
            ApiError::Validation { .. } => "validation",
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Crypto { .. } => "crypto",
            ApiError::Internal { .. } => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Kafka { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::storage(error.to_string())
    }
}

/// Error response body for failed operations.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.category().to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for the trigger API service.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::not_found("form").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::kafka("broker down").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(ApiError::storage("x").category(), "storage");
        assert_eq!(ApiError::not_found("zap").category(), "not_found");
    }
}
