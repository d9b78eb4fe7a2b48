//! Error types for tubarr
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Job, Tool, Source, Metadata, Database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for tubarr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tubarr
///
/// Each variant carries enough context (job id, tool name, path) to explain
/// the failure in a job's message log without further lookups.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "media.crf")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Job lifecycle error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// External process error (yt-dlp, ffmpeg, ImageMagick)
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Tracked source error
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Metadata normalisation or lookup error
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid client input
    #[error("validation error: {0}")]
    Validation(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Job lifecycle errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not present in the job table
    #[error("job {id} not found")]
    NotFound {
        /// The job id that was not found
        id: String,
    },

    /// Required external binaries are absent or not executable
    #[error("missing dependencies: {}", missing.join(", "))]
    MissingDependencies {
        /// Names of the binaries that could not be located
        missing: Vec<String>,
    },

    /// Episode start is neither an integer nor "auto"
    #[error("invalid episode start: {value}")]
    InvalidEpisodeStart {
        /// The rejected value
        value: String,
    },

    /// The job was cancelled while a stage was running
    #[error("job {id} was cancelled")]
    Cancelled {
        /// The cancelled job id
        id: String,
    },

    /// The download stage produced nothing usable
    #[error("download failed: {reason}")]
    DownloadFailed {
        /// Why the download was considered failed
        reason: String,
    },
}

/// External process errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// The process could not be started
    #[error("failed to execute {tool}: {reason}")]
    SpawnFailed {
        /// Binary name or path
        tool: String,
        /// Spawn error text
        reason: String,
    },

    /// The process exited unsuccessfully
    #[error("{tool} exited with code {}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Failed {
        /// Binary name or path
        tool: String,
        /// Exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
    },

    /// The process did not finish within its time budget
    #[error("{tool} timed out after {seconds}s")]
    TimedOut {
        /// Binary name or path
        tool: String,
        /// Elapsed budget in seconds
        seconds: u64,
    },

    /// The process output could not be interpreted
    #[error("unexpected output from {tool}: {reason}")]
    BadOutput {
        /// Binary name or path
        tool: String,
        /// What was wrong with the output
        reason: String,
    },
}

/// Tracked source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// No tracked source with this id
    #[error("source {id} not found")]
    NotFound {
        /// The source id that was not found
        id: String,
    },

    /// A source with this id is already tracked
    #[error("{reason}")]
    AlreadyExists {
        /// The conflicting source id
        id: String,
        /// Human-readable conflict description
        reason: String,
    },

    /// Retention settings could not be normalised
    #[error("{0}")]
    InvalidRetention(String),

    /// The remote item list could not be fetched or parsed
    #[error("failed to list {url}: {reason}")]
    Listing {
        /// The source URL
        url: String,
        /// Why listing failed
        reason: String,
    },

    /// Ledger file could not be read or written
    #[error("ledger {path} unavailable: {reason}")]
    Ledger {
        /// Path of the ledger file
        path: PathBuf,
        /// Underlying I/O error text
        reason: String,
    },
}

/// Metadata normalisation and lookup errors
#[derive(Debug, Error)]
pub enum MetadataError {
    /// An item could not be mapped to an episode number
    #[error("could not resolve episode for {item}: {reason}")]
    Resolution {
        /// Title or file name of the item
        item: String,
        /// Why resolution failed
        reason: String,
    },

    /// A third-party lookup service failed
    #[error("{service} lookup failed: {reason}")]
    Lookup {
        /// Service name (e.g. "tvdb", "tmdb")
        service: String,
        /// Failure description
        reason: String,
    },

    /// A sidecar description file was unreadable
    #[error("invalid sidecar {path}: {reason}")]
    Sidecar {
        /// Path of the sidecar file
        path: PathBuf,
        /// Parse or read error text
        reason: String,
    },
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 1f0c... not found",
///     "details": { "job_id": "1f0c..." }
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
            Error::Job(JobError::InvalidEpisodeStart { .. }) => 400,
            Error::Source(SourceError::InvalidRetention(_)) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Source(SourceError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Source(SourceError::AlreadyExists { .. }) => 409,
            Error::Job(JobError::Cancelled { .. }) => 409,

            // 422 Unprocessable Entity
            Error::Job(JobError::DownloadFailed { .. }) => 422,
            Error::Metadata(MetadataError::Resolution { .. }) => 422,
            Error::Metadata(MetadataError::Sidecar { .. }) => 422,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Yaml(_) => 500,
            Error::Source(SourceError::Ledger { .. }) => 500,
            Error::Tool(ToolError::Failed { .. }) => 500,
            Error::Tool(ToolError::BadOutput { .. }) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,
            Error::Source(SourceError::Listing { .. }) => 502,
            Error::Metadata(MetadataError::Lookup { .. }) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::Job(JobError::MissingDependencies { .. }) => 503,
            Error::Tool(ToolError::SpawnFailed { .. }) => 503,

            // 504 Gateway Timeout
            Error::Tool(ToolError::TimedOut { .. }) => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::MissingDependencies { .. } => "missing_dependencies",
                JobError::InvalidEpisodeStart { .. } => "invalid_episode_start",
                JobError::Cancelled { .. } => "cancelled",
                JobError::DownloadFailed { .. } => "download_failed",
            },
            Error::Tool(e) => match e {
                ToolError::SpawnFailed { .. } => "tool_spawn_failed",
                ToolError::Failed { .. } => "tool_failed",
                ToolError::TimedOut { .. } => "tool_timed_out",
                ToolError::BadOutput { .. } => "tool_bad_output",
            },
            Error::Source(e) => match e {
                SourceError::NotFound { .. } => "source_not_found",
                SourceError::AlreadyExists { .. } => "source_exists",
                SourceError::InvalidRetention(_) => "invalid_retention",
                SourceError::Listing { .. } => "listing_failed",
                SourceError::Ledger { .. } => "ledger_error",
            },
            Error::Metadata(e) => match e {
                MetadataError::Resolution { .. } => "resolution_failed",
                MetadataError::Lookup { .. } => "lookup_failed",
                MetadataError::Sidecar { .. } => "invalid_sidecar",
            },
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Yaml(_) => "yaml_error",
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
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::MissingDependencies { missing }) => Some(serde_json::json!({
                "missing": missing,
            })),
            Error::Source(SourceError::NotFound { id })
            | Error::Source(SourceError::AlreadyExists { id, .. }) => Some(serde_json::json!({
                "source_id": id,
            })),
            Error::Tool(ToolError::Failed { tool, exit_code }) => Some(serde_json::json!({
                "tool": tool,
                "exit_code": exit_code,
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
