//! Error types for media-dl
//!
//! This module provides the error taxonomy for the library:
//! - Domain-specific error types (store, download pipeline)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.tasks_file")
        key: Option<String>,
    },

    /// Persistent document store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Synchronous download pipeline failure
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// A required request field is missing or invalid
    #[error("{0}")]
    Validation(String),

    /// Missing or unknown credential
    #[error("{0}")]
    Unauthorized(String),

    /// Insufficient permission, or a path outside the served root
    #[error("{0}")]
    Forbidden(String),

    /// Unknown task, key or file
    #[error("{0} not found")]
    NotFound(String),

    /// A metadata query matched none of the document's fields
    #[error("No matching parameters")]
    NoMatch,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted document is not a JSON object
    #[error("document '{document}' is corrupted: {reason}")]
    Corrupted {
        /// Name of the document ("tasks" or "keys")
        document: String,
        /// Parser message
        reason: String,
    },

    /// Acquiring or releasing an advisory lock failed
    #[error("failed to lock document '{document}': {reason}")]
    Lock {
        /// Name of the document ("tasks" or "keys")
        document: String,
        /// OS error message
        reason: String,
    },

    /// The blocking I/O task was cancelled or panicked
    #[error("store worker failed: {0}")]
    Join(String),
}

/// Tagged failure reasons of the synchronous download path
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request is missing a required field
    #[error("{0}")]
    Validation(String),

    /// The quota gate refused the estimated size
    #[error("quota exceeded for '{key_name}': requested {requested} bytes, {remaining} bytes remaining")]
    QuotaExceeded {
        /// Caller identity the quota belongs to
        key_name: String,
        /// Estimated size of the download in bytes
        requested: u64,
        /// Bytes still available to the caller
        remaining: u64,
    },

    /// The media engine failed (estimate or download)
    #[error("{0}")]
    EngineFailure(String),

    /// The engine finished but left no file in the working directory
    #[error("Download failed - no file created")]
    NoOutputProduced,
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "task not found"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::Download(DownloadError::Validation(_)) => 400,

            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,

            Error::NotFound(_) => 404,
            Error::NoMatch => 404,

            // The download pipeline reports everything else as a plain 500
            Error::Download(_) => 500,

            Error::Store(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Store(e) => match e {
                StoreError::Corrupted { .. } => "data_corruption",
                StoreError::Lock { .. } => "lock_failed",
                StoreError::Join(_) => "store_error",
            },
            Error::Download(e) => match e {
                DownloadError::Validation(_) => "validation_error",
                DownloadError::QuotaExceeded { .. } => "quota_exceeded",
                DownloadError::EngineFailure(_) => "engine_failure",
                DownloadError::NoOutputProduced => "no_output_produced",
            },
            Error::Validation(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::NoMatch => "no_match",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Download(DownloadError::QuotaExceeded {
                requested,
                remaining,
                ..
            }) => Some(serde_json::json!({
                "requested_bytes": requested,
                "remaining_bytes": remaining,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
