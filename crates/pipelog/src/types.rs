//! Core types shared by the cache, fetcher, reader and search engine.
//!
//! This module provides:
//! - [`LogId`] - Identifier of one log within a run
//! - [`CacheKey`] - (project, pipeline, run) triple naming a run's log set
//! - [`LogListing`] / [`RemoteLog`] - What the remote service reports for a run
//! - [`DownloadReport`] - Per-batch outcome with successes and skips
//! - [`LogSlice`] - A paginated window over one log file
//! - [`SearchOptions`], [`SearchMatch`], [`FileMatches`], [`SearchResults`]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, LogError, Result};

/// Largest number of context lines a search may request on either side.
pub const MAX_CONTEXT_LINES: usize = 10;

/// Identifier of a single log within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub u32);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one run's log set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    project: String,
    pipeline_id: u64,
    run_id: u64,
}

impl CacheKey {
    /// Creates a key, rejecting empty projects and non-positive ids.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Validation`] if any component is invalid.
    pub fn new(project: impl Into<String>, pipeline_id: u64, run_id: u64) -> Result<Self> {
        let project = project.into();
        if project.trim().is_empty() {
            return Err(LogError::Validation("project must not be empty".to_string()));
        }
        if pipeline_id == 0 {
            return Err(LogError::Validation(
                "pipeline id must be a positive integer".to_string(),
            ));
        }
        if run_id == 0 {
            return Err(LogError::Validation(
                "run id must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            project,
            pipeline_id,
            run_id,
        })
    }

    /// Project the run belongs to.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Pipeline identifier.
    #[must_use]
    pub const fn pipeline_id(&self) -> u64 {
        self.pipeline_id
    }

    /// Run identifier.
    #[must_use]
    pub const fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Builds the "no logs" error for this run.
    #[must_use]
    pub fn no_logs(&self) -> LogError {
        LogError::NoLogs {
            project: self.project.clone(),
            pipeline_id: self.pipeline_id,
            run_id: self.run_id,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.pipeline_id, self.run_id)
    }
}

/// A log as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLog {
    /// Log identifier within the run.
    pub id: LogId,
    /// Line count claimed by the remote service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u64>,
    /// Signed download URL, if the service provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RemoteLog {
    /// Creates a remote log entry with a download URL.
    #[must_use]
    pub fn new(id: u32, url: impl Into<String>) -> Self {
        Self {
            id: LogId(id),
            line_count: None,
            url: Some(url.into()),
        }
    }

    /// Creates a remote log entry that has no download URL.
    #[must_use]
    pub const fn without_url(id: u32) -> Self {
        Self {
            id: LogId(id),
            line_count: None,
            url: None,
        }
    }
}

/// The list of logs the remote service holds for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogListing {
    /// Logs in the order the service reported them.
    #[serde(default)]
    pub logs: Vec<RemoteLog>,
}

impl LogListing {
    /// Creates a listing from remote log entries.
    #[must_use]
    pub const fn new(logs: Vec<RemoteLog>) -> Self {
        Self { logs }
    }

    /// Returns true if the service reported no logs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

/// A log that was fetched and written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedLog {
    /// Log identifier.
    pub log_id: LogId,
    /// File name inside the run directory.
    pub file_name: String,
    /// Number of lines in the written file.
    pub line_count: usize,
    /// Size of the written file in bytes.
    pub byte_size: u64,
}

/// Why a log was left out of a download batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The remote listing carried no URL for the log.
    MissingUrl,
    /// The content URL answered with a non-success status.
    HttpStatus {
        /// Status code returned.
        status: u16,
    },
    /// The request failed before a response arrived.
    Transport {
        /// Underlying error message.
        message: String,
    },
    /// The fetch exceeded its timeout.
    Timeout {
        /// Timeout that elapsed, in milliseconds.
        after_ms: u64,
    },
    /// The content arrived but could not be written.
    Write {
        /// Underlying error message.
        message: String,
    },
}

impl From<FetchError> for SkipReason {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status(status) => Self::HttpStatus { status },
            FetchError::Transport(message) => Self::Transport { message },
            FetchError::Timeout(after) => Self::Timeout {
                after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            },
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUrl => write!(f, "no download URL"),
            Self::HttpStatus { status } => write!(f, "HTTP status {status}"),
            Self::Transport { message } => write!(f, "transport error: {message}"),
            Self::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            Self::Write { message } => write!(f, "write failed: {message}"),
        }
    }
}

/// A log that was listed but not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLog {
    /// Log identifier.
    pub log_id: LogId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of one download batch.
///
/// Partial failure is not an error: skipped logs are reported here and the
/// corresponding files are simply absent from the run directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    /// Number of logs the remote service listed.
    pub listed: usize,
    /// Logs written to disk, in ascending log-id order.
    pub downloaded: Vec<DownloadedLog>,
    /// Logs that could not be retrieved, in ascending log-id order.
    pub skipped: Vec<SkippedLog>,
}

impl DownloadReport {
    /// Returns true if every listed log was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.downloaded.len() == self.listed
    }

    /// Total bytes written in this batch.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.downloaded.iter().map(|log| log.byte_size).sum()
    }
}

/// A window of lines read from one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSlice {
    /// The selected lines joined by `\n`, or the whole file when unpaginated.
    pub content: String,
    /// Number of lines in `content`.
    pub line_count: usize,
    /// Number of lines in the whole file.
    pub total_lines: usize,
    /// Whether lines remain after this window.
    pub has_more: bool,
}

/// Options controlling a pattern search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Match case-insensitively.
    #[serde(default)]
    pub ignore_case: bool,
    /// Report lines that do NOT match.
    #[serde(default)]
    pub invert_match: bool,
    /// Lines of context before each match.
    #[serde(default)]
    pub before_context: usize,
    /// Lines of context after each match.
    #[serde(default)]
    pub after_context: usize,
    /// Global cap on matches across all files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_matches: Option<usize>,
    /// Restrict the search to these logs (all logs when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_ids: Option<Vec<LogId>>,
}

impl SearchOptions {
    /// Creates options with defaults: case-sensitive, no context, no cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets case-insensitive matching.
    #[must_use]
    pub const fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Sets inverted matching.
    #[must_use]
    pub const fn with_invert_match(mut self, invert_match: bool) -> Self {
        self.invert_match = invert_match;
        self
    }

    /// Sets lines of context before each match.
    #[must_use]
    pub const fn with_before_context(mut self, lines: usize) -> Self {
        self.before_context = lines;
        self
    }

    /// Sets lines of context after each match.
    #[must_use]
    pub const fn with_after_context(mut self, lines: usize) -> Self {
        self.after_context = lines;
        self
    }

    /// Sets the same context on both sides of each match.
    #[must_use]
    pub const fn with_context(self, lines: usize) -> Self {
        self.with_before_context(lines).with_after_context(lines)
    }

    /// Caps the total number of matches.
    #[must_use]
    pub const fn with_max_matches(mut self, max: usize) -> Self {
        self.max_matches = Some(max);
        self
    }

    /// Restricts the search to the given logs.
    #[must_use]
    pub fn with_log_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.log_ids = Some(ids.into_iter().map(LogId).collect());
        self
    }

    /// Checks the option ranges.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Validation`] for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.before_context > MAX_CONTEXT_LINES {
            return Err(LogError::Validation(format!(
                "beforeContext must be between 0 and {MAX_CONTEXT_LINES}"
            )));
        }
        if self.after_context > MAX_CONTEXT_LINES {
            return Err(LogError::Validation(format!(
                "afterContext must be between 0 and {MAX_CONTEXT_LINES}"
            )));
        }
        if self.max_matches == Some(0) {
            return Err(LogError::Validation(
                "maxMatches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One matching line with optional context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// 1-based line number.
    pub line_number: usize,
    /// The matching line.
    pub line_text: String,
    /// Preceding lines, present when before-context was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_context: Option<Vec<String>>,
    /// Following lines, present when after-context was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_context: Option<Vec<String>>,
}

/// Matches found in one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMatches {
    /// Log identifier.
    pub log_id: LogId,
    /// File name inside the run directory.
    pub file_name: String,
    /// Matches in ascending line order.
    pub matches: Vec<SearchMatch>,
    /// Number of matches in this file.
    pub match_count_in_file: usize,
}

/// Result of a multi-file search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Files with at least one match, in ascending log-id order.
    pub matches: Vec<FileMatches>,
    /// Matches across all files.
    pub total_matches: usize,
    /// Files that were read.
    pub files_searched: usize,
    /// True if the scan stopped early at the match cap.
    pub truncated: bool,
}
