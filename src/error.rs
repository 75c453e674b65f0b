//! Error types for manuscript-export
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Upstream, Archive)
//! - HTTP status code mapping for API integration (including 499 for
//!   caller-cancelled jobs)
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::ManuscriptId;

/// Result type alias for manuscript-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manuscript-export
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "upstream.base_url")
        key: Option<String>,
    },

    /// Upstream content service error
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Archive packaging error — fatal for the job, never silently downgraded
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The export was cancelled by the caller; not a failure
    #[error("export of {manuscript_id} cancelled after {files_completed} file(s)")]
    Cancelled {
        /// Manuscript whose export was cancelled
        manuscript_id: ManuscriptId,
        /// Files fully processed before the cancellation point
        files_completed: usize,
    },

    /// No files matched the requested scope; no archive was attempted
    #[error("no files of manuscript {manuscript_id} match scope {scope}")]
    EmptyScope {
        /// Manuscript the request targeted
        manuscript_id: ManuscriptId,
        /// Label of the scope that matched nothing
        scope: String,
    },

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

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

/// Upstream content service errors
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Metadata (file list) fetch failed — the orchestrator falls back to
    /// the degraded fixed file set instead of failing the job
    #[error("metadata fetch for manuscript {manuscript_id} failed: {reason}")]
    MetadataFetchFailed {
        /// Manuscript whose metadata could not be fetched
        manuscript_id: ManuscriptId,
        /// Why the fetch failed
        reason: String,
    },

    /// A single file fetch failed — recorded as an error entry, the job
    /// continues
    #[error("fetch of file {file_id} ({name}) failed: {reason}")]
    FileFetchFailed {
        /// Upstream id of the file that failed
        file_id: i64,
        /// Declared name of the file that failed
        name: String,
        /// Why the fetch failed
        reason: String,
    },

    /// The upstream answered with a non-success status
    #[error("upstream returned {status} for {url}")]
    UnexpectedStatus {
        /// Requested URL
        url: String,
        /// HTTP status the upstream answered with
        status: u16,
    },

    /// A declared file URI could not be resolved against the upstream base
    #[error("invalid file URI {uri}: {reason}")]
    InvalidUri {
        /// The URI that failed to parse
        uri: String,
        /// Why it failed to parse
        reason: String,
    },
}

/// Archive packaging errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing one entry into the archive failed
    #[error("failed to write archive entry {name}: {reason}")]
    EntryFailed {
        /// Name of the entry that failed
        name: String,
        /// Why the write failed
        reason: String,
    },

    /// Serializing the manifest into the archive failed
    #[error("failed to serialize manifest for job {job_id}: {reason}")]
    ManifestFailed {
        /// Job whose manifest could not be written
        job_id: String,
        /// Why serialization failed
        reason: String,
    },

    /// Finalizing the zip stream failed
    #[error("failed to finalize archive: {reason}")]
    FinalizeFailed {
        /// Why finalization failed
        reason: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "empty_scope",
///     "message": "no files of manuscript MS-1 match scope figures",
///     "details": {
///       "manuscript_id": "MS-1",
///       "scope": "figures"
///     }
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
    /// Machine-readable error code (e.g., "not_found", "cancelled")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like manuscript_id, scope, file names, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Cancelled {
                manuscript_id,
                files_completed,
            } => Some(serde_json::json!({
                "manuscript_id": manuscript_id,
                "files_completed": files_completed,
            })),
            Error::EmptyScope {
                manuscript_id,
                scope,
            } => Some(serde_json::json!({
                "manuscript_id": manuscript_id,
                "scope": scope,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::Upstream(UpstreamError::FileFetchFailed { file_id, name, .. }) => {
                Some(serde_json::json!({
                    "file_id": file_id,
                    "name": name,
                }))
            }
            Error::Upstream(UpstreamError::UnexpectedStatus { url, status }) => {
                Some(serde_json::json!({
                    "url": url,
                    "status": status,
                }))
            }
            Error::Archive(ArchiveError::EntryFailed { name, .. }) => {
                Some(serde_json::json!({ "entry": name }))
            }
            _ => None,
        };

        Self {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,

            // 404 Not Found - Missing resource or empty resolved file set
            Error::NotFound(_) => 404,
            Error::EmptyScope { .. } => 404,

            // 499 Client Closed Request - caller cancelled, not an error
            Error::Cancelled { .. } => 499,

            // 500 Internal Server Error - Server-side issues
            Error::Archive(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Upstream(_) => 502,
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "configuration_error",
            Error::NotFound(_) => "not_found",
            Error::EmptyScope { .. } => "empty_scope",
            Error::Cancelled { .. } => "cancelled",
            Error::Archive(ArchiveError::EntryFailed { .. }) => "archive_entry_failed",
            Error::Archive(ArchiveError::ManifestFailed { .. }) => "manifest_failed",
            Error::Archive(ArchiveError::FinalizeFailed { .. }) => "archive_failed",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
            Error::Upstream(UpstreamError::MetadataFetchFailed { .. }) => "metadata_fetch_failed",
            Error::Upstream(UpstreamError::FileFetchFailed { .. }) => "file_fetch_failed",
            Error::Upstream(UpstreamError::UnexpectedStatus { .. }) => "upstream_status",
            Error::Upstream(UpstreamError::InvalidUri { .. }) => "invalid_uri",
            Error::Network(_) => "network_error",
        }
    }
}
