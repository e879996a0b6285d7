//! Error types for log retrieval, caching and search.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::LogId;

/// Errors surfaced to callers of the log cache.
#[derive(Debug, Error)]
pub enum LogError {
    /// Caller input was rejected before any I/O took place.
    #[error("validation error: {0}")]
    Validation(String),

    /// The search pattern is not a valid regular expression.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The remote service reported no logs for the run.
    #[error("no logs found for run {run_id} of pipeline {pipeline_id} in project {project}")]
    NoLogs {
        /// Project the run belongs to.
        project: String,
        /// Pipeline identifier.
        pipeline_id: u64,
        /// Run identifier.
        run_id: u64,
    },

    /// The requested log is not present in the run's cache directory.
    #[error("log {log_id} not found at {}", path.display())]
    LogFileNotFound {
        /// Requested log id.
        log_id: LogId,
        /// Path that was expected to hold the log.
        path: PathBuf,
    },

    /// The remote service rejected our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote service failed while listing logs.
    #[error("remote service error: {0}")]
    Remote(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogError {
    /// Returns true for the "nothing exists" family of errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoLogs { .. } | Self::LogFileNotFound { .. })
    }

    /// Returns true if the error was raised while validating caller input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidPattern(_))
    }
}

/// Failure to fetch a single log's content.
///
/// Never escapes a download batch; the fetcher records it as a skip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The content URL answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The request could not be completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The fetch did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type alias for log cache operations.
pub type Result<T> = std::result::Result<T, LogError>;
