//! Paginated reads of a single cached log.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{LogError, Result};
use crate::paths::log_path;
use crate::types::{LogId, LogSlice};

/// Lines returned when a caller paginates without a limit.
pub const DEFAULT_READ_LIMIT: usize = 1000;

/// Largest window a single read may return.
pub const MAX_READ_LIMIT: usize = 5000;

/// Serves offset/limit windows over cached log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogReader {
    default_limit: usize,
    max_limit: usize,
}

impl Default for LogReader {
    fn default() -> Self {
        Self::new(DEFAULT_READ_LIMIT, MAX_READ_LIMIT)
    }
}

impl LogReader {
    /// Creates a reader with the given default and maximum window sizes.
    #[must_use]
    pub const fn new(default_limit: usize, max_limit: usize) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }

    /// Reads a window of `log_id` from the run directory `dir`.
    ///
    /// Without `offset` and `limit` the whole file is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::LogFileNotFound`] if the log is not cached.
    pub async fn read(
        &self,
        dir: &Path,
        log_id: LogId,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<LogSlice> {
        let content = read_log_text(dir, log_id).await?;
        Ok(self.slice(content, offset, limit))
    }

    /// Cuts a window out of already loaded log text.
    #[must_use]
    pub fn slice(&self, content: String, offset: Option<usize>, limit: Option<usize>) -> LogSlice {
        if offset.is_none() && limit.is_none() {
            let total_lines = content.lines().count();
            return LogSlice {
                content,
                line_count: total_lines,
                total_lines,
                has_more: false,
            };
        }

        let lines = split_lines(&content);
        let total_lines = lines.len();
        let offset = offset.unwrap_or(0);
        let limit = limit.unwrap_or(self.default_limit).min(self.max_limit);
        let start = offset.min(total_lines);
        let end = offset.saturating_add(limit).min(total_lines);
        let window = &lines[start..end];

        LogSlice {
            content: window.join("\n"),
            line_count: window.len(),
            total_lines,
            has_more: offset.saturating_add(limit) < total_lines,
        }
    }
}

/// Splits log text into lines.
///
/// Lines end at `\n` or `\r\n`; a final newline does not start an extra line.
#[must_use]
pub fn split_lines(content: &str) -> Vec<&str> {
    content.lines().collect()
}

/// Loads a cached log as text, replacing invalid UTF-8.
pub(crate) async fn read_log_text(dir: &Path, log_id: LogId) -> Result<String> {
    let path = log_path(dir, log_id);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(LogError::LogFileNotFound { log_id, path }),
        Err(e) => Err(e.into()),
    }
}
