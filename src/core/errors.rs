//! Custom error types for translation operations

use thiserror::Error;

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Missing required field in a request
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// Request body could not be understood
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Parser message
        message: String,
    },

    /// Blob storage fetch failed
    #[error("Storage error for '{blob}': {status:?} - {message}")]
    StorageError {
        /// Blob name
        blob: String,
        /// HTTP status, if a response arrived
        status: Option<u16>,
        /// Response body or transport error
        message: String,
    },

    /// Model or tokenizer could not be loaded
    #[error("Model load error: {message}")]
    ModelLoadError {
        /// Underlying failure
        message: String,
    },

    /// Tokenization, inference or decoding failed
    #[error("Generation error: {message}")]
    GenerationError {
        /// Underlying failure
        message: String,
    },

    /// Model returned a different number of units than it was given
    #[error("Model returned {actual} units for a batch of {expected}")]
    UnitCountMismatch {
        /// Units sent
        expected: usize,
        /// Units returned
        actual: usize,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is wrong
        message: String,
    },

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        /// Path involved
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Wrapper for anyhow errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TranslationError {
    /// Whether the caller, not the service, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranslationError::MissingField { .. } | TranslationError::InvalidRequest { .. }
        )
    }

    /// HTTP status code this error is reported with
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Short machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            TranslationError::MissingField { .. } | TranslationError::InvalidRequest { .. } => {
                "invalid_request"
            }
            TranslationError::StorageError { .. } | TranslationError::ModelLoadError { .. } => {
                "model_unavailable"
            }
            TranslationError::GenerationError { .. }
            | TranslationError::UnitCountMismatch { .. } => "translation_error",
            _ => "internal_error",
        }
    }
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        TranslationError::InternalError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for TranslationError {
    fn from(err: tokio::task::JoinError) -> Self {
        TranslationError::InternalError(format!("blocking task failed: {}", err))
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
