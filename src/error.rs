#[cfg(feature = "api")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// Main error type for the application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// I/O errors (file operations, socket binding, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// An uploaded payload could not be decoded as an image
    #[error("Invalid image in '{field}': {reason}")]
    InvalidImage {
        /// The multipart field that carried the payload.
        field: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The encoder produced a vector that cannot be normalized
    #[error("Degenerate embedding: {0}")]
    DegenerateEmbedding(String),

    /// The encoder failed or returned malformed output
    #[error("Model inference error: {0}")]
    ModelInference(String),

    /// Inference did not finish within the configured budget
    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upload errors
    #[error("Upload error: {0}")]
    UploadError(String),

    /// Request body exceeded the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Standard error response format
#[derive(Serialize)]
#[derive(Debug)]
pub struct ErrorResponse {
    /// Error code (HTTP status code)
    pub code: u16,
    /// Error message
    pub message: String,
}

impl AppError {
    /// Numeric HTTP status for this error
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidImage { .. } => 400,
            Self::UploadError(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::DegenerateEmbedding(_) => 422,
            Self::Timeout(_) => 504,
            _ => 500,
        }
    }

    #[cfg(feature = "api")]
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether the caller, not the service, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidImage { .. }
                | Self::UploadError(_)
                | Self::PayloadTooLarge(_)
                | Self::DegenerateEmbedding(_)
        )
    }

    /// Convert the error to a JSON response
    pub fn to_json(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[cfg(feature = "api")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            log::warn!("Rejected request: {}", self);
        } else {
            log::error!("Request failed: {}", self);
        }

        (status, Json(self.to_json())).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Task join error: {}", err))
    }
}

#[cfg(feature = "api")]
impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::UploadError(err.body_text())
        }
    }
}

#[cfg(feature = "embeddings")]
impl From<tch::TchError> for AppError {
    fn from(err: tch::TchError) -> Self {
        AppError::ModelInference(format!("PyTorch error: {}", err))
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
