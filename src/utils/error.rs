//! Error types and handling
//!
//! Common error types used across the application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::CaptureError;
use crate::catalog::CatalogError;
use crate::compile::CompileError;
use crate::media::MediaError;
use crate::recorder::RecorderError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Camera not available: {0}")]
    DeviceUnavailable(String),

    #[error("Recorder unavailable: {0}")]
    RecorderUnavailable(String),

    #[error("Compilation failed: {0}")]
    CompilationFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CaptureError> for AppError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::DeviceUnavailable(reason) => AppError::DeviceUnavailable(reason.to_string()),
            other => AppError::Recording(other.to_string()),
        }
    }
}

impl From<RecorderError> for AppError {
    fn from(error: RecorderError) -> Self {
        match error {
            RecorderError::RecorderUnavailable => {
                AppError::RecorderUnavailable("no active stream".to_string())
            }
            other => AppError::Recording(other.to_string()),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(error: MediaError) -> Self {
        AppError::Recording(error.to_string())
    }
}

impl From<CompileError> for AppError {
    fn from(error: CompileError) -> Self {
        AppError::CompilationFailure(error.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NotFound { .. } => AppError::NotFound(error.to_string()),
            CatalogError::Io(e) => AppError::Io(e),
            CatalogError::Json(e) => AppError::Serialization(e),
            CatalogError::InvalidTemplate(msg) => AppError::Config(msg),
        }
    }
}

/// Error response for the presentation layer
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
            AppError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            AppError::RecorderUnavailable(_) => "RECORDER_UNAVAILABLE",
            AppError::CompilationFailure(_) => "COMPILATION_FAILURE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
