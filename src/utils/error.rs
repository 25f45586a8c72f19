//! Error types and handling
//!
//! Errors surfaced by the host-facing layer. Recording outcomes themselves
//! are reported as [`RecordingReason`](crate::recorder::RecordingReason)
//! codes and never travel through this type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Call store error: {0}")]
    Store(String),

    #[error("Call {0} not found")]
    CallNotFound(i64),

    #[error("Invalid recording path: {0}")]
    InvalidPath(String),

    #[error("Recording file not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Error response for HTTP clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Store(_) => "STORE_ERROR",
            AppError::CallNotFound(_) => "CALL_NOT_FOUND",
            AppError::InvalidPath(_) => "INVALID_PATH",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Task(_) => "TASK_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let response = ErrorResponse::from(AppError::CallNotFound(4));
        assert_eq!(response.code, "CALL_NOT_FOUND");
        assert_eq!(response.message, "Call 4 not found");

        let response = ErrorResponse::from(AppError::InvalidPath("../mic.wav".to_string()));
        assert_eq!(response.code, "INVALID_PATH");

        let json = serde_json::to_value(ErrorResponse::from(AppError::Config("bad".into()))).unwrap();
        assert_eq!(json["code"], "CONFIG_ERROR");
        assert_eq!(json["message"], "Configuration error: bad");
    }
}
