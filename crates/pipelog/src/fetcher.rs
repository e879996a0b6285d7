//! Batch download of a run's logs into a local directory.
//!
//! Only an empty (or failed) listing aborts a batch. Every per-log problem
//! is logged and recorded as a [`SkippedLog`]; the batch always completes
//! with whatever subset could be written.
//!
//! A batch is written into a staging sibling of the run directory and moved
//! into place once complete, so the run directory never holds a partial batch.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::paths::log_file_name;
use crate::reader::split_lines;
use crate::source::{ContentClient, LogSource};
use crate::summary::DownloadSummary;
use crate::types::{CacheKey, DownloadReport, DownloadedLog, RemoteLog, SkipReason, SkippedLog};

/// Logs fetched in parallel within one batch.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 3;

/// Per-log fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads every log of a run into a directory.
#[derive(Clone)]
pub struct LogFetcher {
    source: Arc<dyn LogSource>,
    client: Arc<dyn ContentClient>,
    concurrency: usize,
    fetch_timeout: Duration,
    write_summary: bool,
}

impl LogFetcher {
    /// Creates a fetcher with default concurrency and timeout.
    #[must_use]
    pub fn new(source: Arc<dyn LogSource>, client: Arc<dyn ContentClient>) -> Self {
        Self {
            source,
            client,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            write_summary: true,
        }
    }

    /// Sets how many logs are fetched at once (at least one).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the timeout applied to each individual fetch.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Enables or disables writing `summary.json` after each batch.
    #[must_use]
    pub const fn with_summary(mut self, write_summary: bool) -> Self {
        self.write_summary = write_summary;
        self
    }

    /// Downloads the run's logs into `dest`, replacing its previous contents.
    ///
    /// `dest` keeps its previous batch until the new one is complete.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::NoLogs`](crate::LogError::NoLogs) if the remote
    /// service lists no logs (nothing is written in that case), any error
    /// raised by the listing call, or an I/O error if the batch cannot be
    /// staged or moved into `dest`. Failures of individual logs are never
    /// returned.
    pub async fn download(&self, key: &CacheKey, dest: &Path) -> Result<DownloadReport> {
        let listing = self.source.list_logs(key).await?;
        if listing.is_empty() {
            return Err(key.no_logs());
        }

        let listed = listing.logs.len();
        let mut seen = HashSet::new();
        let logs: Vec<RemoteLog> = listing
            .logs
            .into_iter()
            .filter(|log| {
                let first = seen.insert(log.id);
                if !first {
                    warn!(run = %key, log_id = %log.id, "duplicate log id in listing, keeping first");
                }
                first
            })
            .collect();

        let staging = sibling_dir(dest, "partial");
        tokio::fs::create_dir_all(&staging).await?;

        let fetches: Vec<_> = logs
            .iter()
            .map(|log| self.fetch_one(key, log, &staging))
            .collect();
        let outcomes: Vec<std::result::Result<DownloadedLog, SkippedLog>> = stream::iter(fetches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = DownloadReport {
            listed,
            ..DownloadReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(log) => report.downloaded.push(log),
                Err(skip) => report.skipped.push(skip),
            }
        }
        report.downloaded.sort_by_key(|log| log.log_id);
        report.skipped.sort_by_key(|skip| skip.log_id);

        info!(
            run = %key,
            dir = %dest.display(),
            listed,
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            bytes = report.total_bytes(),
            "download batch complete"
        );

        if self.write_summary {
            let summary = DownloadSummary::from_report(key, &report, Utc::now());
            if let Err(e) = summary.write(&staging).await {
                warn!(run = %key, error = %e, "failed to write download summary");
            }
        }

        if let Err(e) = publish(&staging, dest).await {
            if let Err(cleanup) = remove_dir(&staging).await {
                warn!(dir = %staging.display(), error = %cleanup, "failed to remove staging directory");
            }
            return Err(e);
        }

        Ok(report)
    }

    async fn fetch_one(
        &self,
        key: &CacheKey,
        log: &RemoteLog,
        dest: &Path,
    ) -> std::result::Result<DownloadedLog, SkippedLog> {
        let skip = |reason: SkipReason| {
            warn!(run = %key, log_id = %log.id, %reason, "skipping log");
            SkippedLog {
                log_id: log.id,
                reason,
            }
        };

        let Some(url) = log.url.as_deref() else {
            return Err(skip(SkipReason::MissingUrl));
        };

        let body = match tokio::time::timeout(self.fetch_timeout, self.client.fetch(url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(skip(e.into())),
            Err(_) => {
                return Err(skip(SkipReason::Timeout {
                    after_ms: u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                }));
            }
        };

        let file_name = log_file_name(log.id);
        let path = dest.join(&file_name);
        if let Err(e) = write_file(&path, &body).await {
            return Err(skip(SkipReason::Write {
                message: e.to_string(),
            }));
        }
        let byte_size = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => body.len() as u64,
        };
        let line_count = split_lines(&String::from_utf8_lossy(&body)).len();

        debug!(run = %key, log_id = %log.id, line_count, byte_size, "log written");
        Ok(DownloadedLog {
            log_id: log.id,
            file_name,
            line_count,
            byte_size,
        })
    }
}

/// Unique sibling of `dir` named `<dir>.<tag>-<pid>-<n>`.
fn sibling_dir(dir: &Path, tag: &str) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let name = dir
        .file_name()
        .map_or_else(|| "run".into(), |name| name.to_string_lossy().into_owned());
    dir.with_file_name(format!("{name}.{tag}-{}-{n}", std::process::id()))
}

/// Moves a complete batch from `staging` to `dest`, retiring the old batch.
async fn publish(staging: &Path, dest: &Path) -> Result<()> {
    let retired = sibling_dir(dest, "retired");
    let had_previous = match tokio::fs::rename(dest, &retired).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = tokio::fs::rename(staging, dest).await {
        if had_previous {
            if let Err(restore) = tokio::fs::rename(&retired, dest).await {
                warn!(dir = %retired.display(), error = %restore, "failed to restore previous batch");
            }
        }
        return Err(e.into());
    }
    if had_previous {
        if let Err(e) = remove_dir(&retired).await {
            warn!(dir = %retired.display(), error = %e, "failed to remove previous batch");
        }
    }
    Ok(())
}

async fn remove_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Writes `body` next to `path` and renames it into place.
///
/// A failed write leaves no partial file behind.
async fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = match tokio::fs::write(&part, body).await {
        Ok(()) => tokio::fs::rename(&part, path).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        if let Err(e) = tokio::fs::remove_file(&part).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %part.display(), error = %e, "failed to remove partial log");
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, LogError};
    use crate::paths::SUMMARY_FILE_NAME;
    use crate::testing::{FakeClient, FakeSource};
    use crate::types::LogId;
    use tempfile::TempDir;

    fn key() -> CacheKey {
        CacheKey::new("web", 12, 345).expect("valid key")
    }

    fn make_fetcher(
        source: FakeSource,
        client: FakeClient,
    ) -> (LogFetcher, Arc<FakeSource>, Arc<FakeClient>) {
        let source = Arc::new(source);
        let client = Arc::new(client);
        let fetcher = LogFetcher::new(source.clone(), client.clone());
        (fetcher, source, client)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn downloads_every_listed_log() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "u1"), RemoteLog::new(2, "u2")]),
            FakeClient::new().with_body("u1", "a\nb\n").with_body("u2", "c"),
        );

        let report = fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(report.listed, 2);
        assert!(report.is_complete());
        assert_eq!(report.downloaded[0].file_name, "log-001.txt");
        assert_eq!(report.downloaded[0].line_count, 2);
        assert_eq!(report.downloaded[0].byte_size, 4);
        assert_eq!(report.downloaded[1].line_count, 1);
        assert_eq!(
            std::fs::read_to_string(dest.join("log-002.txt")).expect("read"),
            "c"
        );
    }

    #[tokio::test]
    async fn partial_failures_are_skipped_not_raised() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![
                RemoteLog::new(1, "ok"),
                RemoteLog::new(2, "server-error"),
                RemoteLog::new(3, "reset"),
                RemoteLog::without_url(4),
                RemoteLog::new(5, "ok-too"),
            ]),
            FakeClient::new()
                .with_body("ok", "first\n")
                .with_error("server-error", FetchError::Status(500))
                .with_error("reset", FetchError::Transport("connection reset".to_string()))
                .with_body("ok-too", "second\n"),
        );

        let report = fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(report.listed, 5);
        assert_eq!(report.downloaded.len(), 2);
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(
            report.skipped.iter().map(|s| s.reason.clone()).collect::<Vec<_>>(),
            vec![
                SkipReason::HttpStatus { status: 500 },
                SkipReason::Transport {
                    message: "connection reset".to_string()
                },
                SkipReason::MissingUrl,
            ]
        );
        assert_eq!(
            file_names(&dest),
            vec!["log-001.txt", "log-005.txt", SUMMARY_FILE_NAME]
        );
    }

    #[tokio::test]
    async fn empty_listing_is_not_found_and_writes_nothing() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, client) = make_fetcher(FakeSource::new(vec![]), FakeClient::new());

        let err = fetcher.download(&key(), &dest).await.expect_err("must fail");

        assert!(matches!(err, LogError::NoLogs { run_id: 345, .. }));
        assert!(!dest.exists());
        assert_eq!(client.fetches(), 0);
    }

    #[tokio::test]
    async fn authentication_failure_propagates() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(FakeSource::unauthorized(), FakeClient::new());

        let err = fetcher.download(&key(), &dest).await.expect_err("must fail");

        assert!(matches!(err, LogError::Authentication(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn slow_fetch_times_out_alone() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "slow"), RemoteLog::new(2, "fast")]),
            FakeClient::new()
                .with_body("slow", "late")
                .with_delay("slow", Duration::from_secs(5))
                .with_body("fast", "on time"),
        );
        let fetcher = fetcher.with_fetch_timeout(Duration::from_millis(50));

        let report = fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.downloaded[0].log_id, LogId(2));
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::Timeout { after_ms: 50 }
        );
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let mut client = FakeClient::new();
        let mut logs = Vec::new();
        for id in 1..=10u32 {
            let url = format!("u{id}");
            client = client
                .with_body(&url, "x")
                .with_delay(&url, Duration::from_millis(20));
            logs.push(RemoteLog::new(id, url));
        }
        let (fetcher, _, client) = make_fetcher(FakeSource::new(logs), client);
        let fetcher = fetcher.with_concurrency(3);

        let report = fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(report.downloaded.len(), 10);
        assert!(client.max_in_flight() <= 3);
        assert!(client.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn report_is_ordered_regardless_of_completion() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![
                RemoteLog::new(3, "u3"),
                RemoteLog::new(1, "u1"),
                RemoteLog::new(2, "u2"),
            ]),
            FakeClient::new()
                .with_body("u1", "1")
                .with_delay("u1", Duration::from_millis(40))
                .with_body("u2", "2")
                .with_delay("u2", Duration::from_millis(20))
                .with_body("u3", "3"),
        );

        let report = fetcher.download(&key(), &dest).await.expect("download");

        let ids: Vec<LogId> = report.downloaded.iter().map(|l| l.log_id).collect();
        assert_eq!(ids, vec![LogId(1), LogId(2), LogId(3)]);
    }

    #[tokio::test]
    async fn refresh_replaces_previous_batch() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        std::fs::create_dir_all(&dest).expect("mkdir");
        std::fs::write(dest.join("log-009.txt"), "stale").expect("write");

        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "u1")]),
            FakeClient::new().with_body("u1", "fresh"),
        );
        let fetcher = fetcher.with_summary(false);

        fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(file_names(&dest), vec!["log-001.txt"]);
    }

    #[tokio::test]
    async fn previous_batch_survives_until_new_one_is_complete() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        std::fs::create_dir_all(&dest).expect("mkdir");
        std::fs::write(dest.join("log-001.txt"), "old").expect("write");

        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "u1")]),
            FakeClient::new()
                .with_body("u1", "new")
                .with_delay("u1", Duration::from_millis(200)),
        );

        let download_key = key();
        let download = fetcher.download(&download_key, &dest);
        let observe = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::read_to_string(dest.join("log-001.txt")).expect("read mid-download")
        };
        let (report, seen) = tokio::join!(download, observe);

        report.expect("download");
        assert_eq!(seen, "old");
        assert_eq!(
            std::fs::read_to_string(dest.join("log-001.txt")).expect("read"),
            "new"
        );
        assert_eq!(file_names(dir.path()), vec!["run"]);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_file_behind() {
        let dir = TempDir::new().expect("create temp dir");
        let target = dir.path().join("log-001.txt");
        std::fs::create_dir(&target).expect("occupy target with a directory");

        let result = write_file(&target, b"truncated?").await;

        assert!(result.is_err());
        assert_eq!(file_names(dir.path()), vec!["log-001.txt"]);
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn write_file_replaces_contents() {
        let dir = TempDir::new().expect("create temp dir");
        let target = dir.path().join("log-001.txt");

        write_file(&target, b"body").await.expect("write");

        assert_eq!(std::fs::read(&target).expect("read"), b"body");
        assert_eq!(file_names(dir.path()), vec!["log-001.txt"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn download_runs_on_a_spawned_task() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "u1"), RemoteLog::new(2, "u2")]),
            FakeClient::new().with_body("u1", "a").with_body("u2", "b"),
        );

        let task_dest = dest.clone();
        let report = tokio::spawn(async move { fetcher.download(&key(), &task_dest).await })
            .await
            .expect("task completes")
            .expect("download");

        assert_eq!(report.downloaded.len(), 2);
        assert!(dest.join("log-002.txt").exists());
    }

    #[tokio::test]
    async fn line_counts_come_from_content_not_listing() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let mut remote = RemoteLog::new(1, "u1");
        remote.line_count = Some(999);
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![remote]),
            FakeClient::new().with_body("u1", "one\r\ntwo\r\nthree"),
        );

        let report = fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(report.downloaded[0].line_count, 3);
    }

    #[tokio::test]
    async fn duplicate_ids_are_fetched_once() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, client) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "first"), RemoteLog::new(1, "second")]),
            FakeClient::new()
                .with_body("first", "kept")
                .with_body("second", "dropped"),
        );

        let report = fetcher.download(&key(), &dest).await.expect("download");

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(client.fetches(), 1);
        assert_eq!(
            std::fs::read_to_string(dest.join("log-001.txt")).expect("read"),
            "kept"
        );
    }

    #[tokio::test]
    async fn summary_records_batch() {
        let dir = TempDir::new().expect("create temp dir");
        let dest = dir.path().join("run");
        let (fetcher, _, _) = make_fetcher(
            FakeSource::new(vec![RemoteLog::new(1, "u1"), RemoteLog::without_url(2)]),
            FakeClient::new().with_body("u1", "abc\n"),
        );

        fetcher.download(&key(), &dest).await.expect("download");
        let summary = DownloadSummary::load(&dest).await.expect("summary written");

        assert_eq!(summary.run_id, 345);
        assert_eq!(summary.total_logs, 1);
        assert_eq!(summary.total_bytes, 4);
        assert_eq!(summary.skipped.len(), 1);
    }
}
