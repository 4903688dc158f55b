//! HTTP error responses.
//!
//! [`ApiError`] maps a [`RuntimeError`] to a status code and a JSON body of
//! the form `{"error": "..."}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use polyglot_common::RuntimeError;

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code.
    pub status: StatusCode,
    /// Message placed in the body.
    pub message: String,
}

impl ApiError {
    /// Create an error with an explicit status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(error: RuntimeError) -> Self {
        let status = match &error {
            RuntimeError::UnknownLanguage { .. } | RuntimeError::Unsupported { .. } => {
                StatusCode::BAD_REQUEST
            }
            RuntimeError::InitializationFailed { .. } | RuntimeError::ContextUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RuntimeError::ExecutionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RuntimeError::ExecutionFailed { .. } | RuntimeError::CompilationFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RuntimeError::Network { .. } => StatusCode::BAD_GATEWAY,
            RuntimeError::Io(_) | RuntimeError::InvalidConfig { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_is_bad_request() {
        let err = ApiError::from(RuntimeError::unknown_language("cobol"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Unknown language: cobol");
    }

    #[test]
    fn test_initialization_failure_is_unavailable() {
        let err = ApiError::from(RuntimeError::initialization_failed("python", "no interpreter"));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_timeout() {
        let err = ApiError::from(RuntimeError::ExecutionTimeout { duration_ms: 5000 });
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_into_response() {
        let response = ApiError::new(StatusCode::NOT_FOUND, "missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
