//! Batch summaries and cached-file introspection.
//!
//! A [`DownloadSummary`] is written next to the logs after each download
//! batch. It is informational only: reads and searches never consult it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::paths::SUMMARY_FILE_NAME;
use crate::types::{CacheKey, DownloadReport, DownloadedLog, SkippedLog};

/// Metadata recorded for one download batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    /// Project the run belongs to.
    pub project: String,
    /// Pipeline identifier.
    pub pipeline_id: u64,
    /// Run identifier.
    pub run_id: u64,
    /// When the batch finished.
    pub downloaded_at: DateTime<Utc>,
    /// Number of logs written.
    pub total_logs: usize,
    /// Bytes written across all logs.
    pub total_bytes: u64,
    /// Per-log metadata for written files.
    pub logs: Vec<DownloadedLog>,
    /// Logs the batch could not retrieve.
    #[serde(default)]
    pub skipped: Vec<SkippedLog>,
}

impl DownloadSummary {
    /// Builds a summary from a finished batch.
    #[must_use]
    pub fn from_report(key: &CacheKey, report: &DownloadReport, downloaded_at: DateTime<Utc>) -> Self {
        Self {
            project: key.project().to_string(),
            pipeline_id: key.pipeline_id(),
            run_id: key.run_id(),
            downloaded_at,
            total_logs: report.downloaded.len(),
            total_bytes: report.total_bytes(),
            logs: report.downloaded.clone(),
            skipped: report.skipped.clone(),
        }
    }

    /// Writes the summary into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(dir.join(SUMMARY_FILE_NAME), json).await?;
        Ok(())
    }

    /// Loads the summary from `dir`, if one was written and is readable.
    pub async fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(SUMMARY_FILE_NAME);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read download summary");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt download summary");
                None
            }
        }
    }
}

/// A file present in a run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFile {
    /// File name inside the run directory.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, where the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
}

/// Contents of a run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFiles {
    /// The directory that was listed.
    pub directory: PathBuf,
    /// Files sorted by name, excluding the summary.
    pub files: Vec<CachedFile>,
    /// The batch summary, if one was persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<DownloadSummary>,
}

/// Lists the files of a run directory together with its summary.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub async fn list_cached_files(dir: &Path) -> Result<CachedFiles> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name == SUMMARY_FILE_NAME {
            continue;
        }
        files.push(CachedFile {
            file_name,
            size: metadata.len(),
            modified_time: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(CachedFiles {
        directory: dir.to_path_buf(),
        files,
        summary: DownloadSummary::load(dir).await,
    })
}
