//! Deterministic on-disk layout for cached runs.
//!
//! ```text
//! <base_dir>/<project>/pipeline-<id>/run-<id>/log-001.txt
//!                                            /log-002.txt
//!                                            /summary.json
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::types::{CacheKey, LogId};

/// Name of the per-batch summary file inside a run directory.
pub const SUMMARY_FILE_NAME: &str = "summary.json";

const LOG_FILE_PREFIX: &str = "log-";
const LOG_FILE_SUFFIX: &str = ".txt";

/// Resolves cache keys to directories under a base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    base_dir: PathBuf,
}

impl StoragePaths {
    /// Creates a resolver rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root of all run directories.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the logs of one run.
    #[must_use]
    pub fn run_dir(&self, key: &CacheKey) -> PathBuf {
        self.base_dir
            .join(encode_component(key.project()))
            .join(format!("pipeline-{}", key.pipeline_id()))
            .join(format!("run-{}", key.run_id()))
    }
}

/// File name of a log inside a run directory, e.g. `log-007.txt`.
#[must_use]
pub fn log_file_name(id: LogId) -> String {
    format!("{LOG_FILE_PREFIX}{:03}{LOG_FILE_SUFFIX}", id.0)
}

/// Full path of a log inside `dir`.
#[must_use]
pub fn log_path(dir: &Path, id: LogId) -> PathBuf {
    dir.join(log_file_name(id))
}

/// Extracts the log id from a file name produced by [`log_file_name`].
#[must_use]
pub fn parse_log_file_name(name: &str) -> Option<LogId> {
    let digits = name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(LogId)
}

/// Escapes a project name into a single safe path component.
///
/// Alphanumerics, `-` and `_` pass through, as do dots that are not leading.
/// Everything else becomes `%XX`, so distinct projects never share a directory.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if keep {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
