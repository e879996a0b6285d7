//! Request-serving facade over the cache, reader and search engine.
//!
//! Every operation validates its arguments before touching the network or
//! disk, then resolves the run through the [`LogCache`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::cache::LogCache;
use crate::config::LogCacheConfig;
use crate::error::{LogError, Result};
use crate::fetcher::LogFetcher;
use crate::reader::LogReader;
use crate::search::{compile_pattern, search};
use crate::source::{ContentClient, LogSource};
use crate::summary::{CachedFiles, list_cached_files};
use crate::types::{CacheKey, LogId, LogSlice, SearchOptions, SearchResults};

/// Serves log reads and searches for pipeline runs.
pub struct LogService {
    cache: LogCache,
    reader: LogReader,
}

impl LogService {
    /// Builds a service from configuration and the remote collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] if the configuration is invalid.
    pub fn new(
        config: &LogCacheConfig,
        source: Arc<dyn LogSource>,
        client: Arc<dyn ContentClient>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = LogFetcher::new(source, client)
            .with_concurrency(config.fetch_concurrency)
            .with_fetch_timeout(config.fetch_timeout())
            .with_summary(config.write_summary);
        let cache = LogCache::new(config.storage_paths(), fetcher, config.ttl())
            .with_disk_reuse(config.reuse_disk);
        Ok(Self::from_parts(cache, config.reader()))
    }

    /// Builds a service from prepared components.
    #[must_use]
    pub fn from_parts(cache: LogCache, reader: LogReader) -> Self {
        Self { cache, reader }
    }

    /// The underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &LogCache {
        &self.cache
    }

    /// Returns the local directory of a run, downloading it if needed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad ids, or the download failure.
    #[instrument(skip(self))]
    pub async fn get_or_download(
        &self,
        project: &str,
        pipeline_id: u64,
        run_id: u64,
    ) -> Result<PathBuf> {
        let key = CacheKey::new(project, pipeline_id, run_id)?;
        self.cache.resolve(&key).await
    }

    /// Reads one log of a run, optionally paginated.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad ids, the download failure, or
    /// [`LogError::LogFileNotFound`] if the run has no such log.
    #[instrument(skip(self))]
    pub async fn read_log(
        &self,
        project: &str,
        pipeline_id: u64,
        run_id: u64,
        log_id: u32,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<LogSlice> {
        let key = CacheKey::new(project, pipeline_id, run_id)?;
        let log_id = validate_log_id(log_id)?;

        let dir = self.cache.resolve(&key).await?;
        self.reader.read(&dir, log_id, offset, limit).await
    }

    /// Searches the logs of a run for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad ids, options or patterns (before
    /// anything is downloaded), or the download or read failure.
    #[instrument(skip(self, options))]
    pub async fn search_logs(
        &self,
        project: &str,
        pipeline_id: u64,
        run_id: u64,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults> {
        let key = CacheKey::new(project, pipeline_id, run_id)?;
        options.validate()?;
        if let Some(ids) = &options.log_ids {
            for id in ids {
                validate_log_id(id.0)?;
            }
        }
        compile_pattern(pattern, options)?;

        let dir = self.cache.resolve(&key).await?;
        search(&dir, pattern, options).await
    }

    /// Lists the files of a run directory without downloading anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn list_cached_files(&self, dir: &Path) -> Result<CachedFiles> {
        list_cached_files(dir).await
    }

    /// Resolves a run and lists its cached files.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad ids, or the download or read failure.
    pub async fn run_files(
        &self,
        project: &str,
        pipeline_id: u64,
        run_id: u64,
    ) -> Result<CachedFiles> {
        let dir = self.get_or_download(project, pipeline_id, run_id).await?;
        list_cached_files(&dir).await
    }

    /// Drops the cache entry for a run so the next request refetches it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad ids.
    pub fn invalidate(&self, project: &str, pipeline_id: u64, run_id: u64) -> Result<bool> {
        let key = CacheKey::new(project, pipeline_id, run_id)?;
        let removed = self.cache.invalidate(&key);
        debug!(run = %key, removed, "invalidated cache entry");
        Ok(removed)
    }

    /// Drops a run from the cache and deletes its directory.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad ids, or an I/O error if the
    /// directory cannot be removed.
    pub async fn purge(&self, project: &str, pipeline_id: u64, run_id: u64) -> Result<bool> {
        let key = CacheKey::new(project, pipeline_id, run_id)?;
        self.cache.purge(&key).await
    }

    /// Removes everything this service downloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if a run directory cannot be removed.
    pub async fn shutdown(&self) -> Result<()> {
        self.cache.clear().await
    }
}

fn validate_log_id(log_id: u32) -> Result<LogId> {
    if log_id == 0 {
        return Err(LogError::Validation(
            "log id must be a positive integer".to_string(),
        ));
    }
    Ok(LogId(log_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClient, FakeSource};
    use crate::types::RemoteLog;
    use tempfile::TempDir;

    fn service(source: FakeSource) -> (LogService, Arc<FakeSource>, TempDir) {
        let dir = TempDir::new().expect("create temp dir");
        let source = Arc::new(source);
        let client = Arc::new(FakeClient::new().with_body("u1", "alpha\nbeta\ngamma\n"));
        let config = LogCacheConfig::default().with_base_dir(dir.path());
        let service = LogService::new(&config, source.clone(), client).expect("valid config");
        (service, source, dir)
    }

    fn one_log() -> FakeSource {
        FakeSource::new(vec![RemoteLog::new(1, "u1")])
    }

    #[test]
    fn rejects_invalid_config() {
        let config = LogCacheConfig::default().with_fetch_concurrency(0);
        let result = LogService::new(
            &config,
            Arc::new(one_log()),
            Arc::new(FakeClient::new()),
        );
        assert!(matches!(result, Err(LogError::Config(_))));
    }

    #[tokio::test]
    async fn invalid_ids_rejected_without_io() {
        let (svc, source, _dir) = service(one_log());

        let cases = [
            svc.read_log("", 1, 1, 1, None, None).await,
            svc.read_log("web", 0, 1, 1, None, None).await,
            svc.read_log("web", 1, 0, 1, None, None).await,
            svc.read_log("web", 1, 1, 0, None, None).await,
        ];

        for result in cases {
            assert!(result.expect_err("must fail").is_validation());
        }
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn bad_search_input_rejected_without_io() {
        let (svc, source, _dir) = service(one_log());

        let bad_pattern = svc
            .search_logs("web", 1, 1, "[", &SearchOptions::new())
            .await;
        let bad_context = svc
            .search_logs("web", 1, 1, "x", &SearchOptions::new().with_after_context(11))
            .await;
        let bad_cap = svc
            .search_logs("web", 1, 1, "x", &SearchOptions::new().with_max_matches(0))
            .await;
        let bad_ids = svc
            .search_logs("web", 1, 1, "x", &SearchOptions::new().with_log_ids([0]))
            .await;

        for result in [bad_pattern, bad_context, bad_cap, bad_ids] {
            assert!(result.expect_err("must fail").is_validation());
        }
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn read_and_search_share_one_download() {
        let (svc, source, _dir) = service(one_log());

        let slice = svc
            .read_log("web", 1, 2, 1, Some(1), Some(1))
            .await
            .expect("read");
        let results = svc
            .search_logs("web", 1, 2, "a$", &SearchOptions::new())
            .await
            .expect("search");

        assert_eq!(slice.content, "beta");
        assert_eq!(results.total_matches, 3);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn purge_deletes_run_directory() {
        let (svc, _source, _dir) = service(one_log());

        let dir = svc.get_or_download("web", 1, 2).await.expect("resolve");
        assert!(svc.purge("web", 1, 2).await.expect("purge"));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn invalidate_then_shutdown() {
        let (svc, source, _dir) = service(one_log());

        let dir = svc.get_or_download("web", 1, 2).await.expect("resolve");
        assert!(svc.invalidate("web", 1, 2).expect("valid ids"));
        svc.get_or_download("web", 1, 2).await.expect("resolve");
        assert_eq!(source.calls(), 2);

        svc.shutdown().await.expect("shutdown");
        assert!(!dir.exists());
        assert!(svc.cache().is_empty());
    }
}
