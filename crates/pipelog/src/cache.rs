//! TTL cache mapping runs to downloaded log directories.
//!
//! ```text
//! ABSENT ──resolve──► DOWNLOADING ──► CACHED ──(age ≥ ttl)──► STALE
//!                          ▲                                    │
//!                          └──────────────resolve───────────────┘
//! ```
//!
//! Resolution for a single key is serialized through a per-key async lock,
//! so concurrent callers for the same run share one download while other
//! runs proceed independently. Expired entries are dropped lazily on every
//! [`LogCache::resolve`] call; there is no background sweeper.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fetcher::LogFetcher;
use crate::paths::StoragePaths;
use crate::summary::DownloadSummary;
use crate::types::CacheKey;

/// Default time-to-live of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// A run whose logs are materialized on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The run.
    pub key: CacheKey,
    /// Directory holding the run's logs.
    pub directory: PathBuf,
    /// When the directory was (re)populated.
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry at `now`; zero if the clock went backwards.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true once the entry's age reaches `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) >= ttl
    }
}

/// Per-key async locks, created on demand and dropped when idle.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn handle(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(key.clone()).or_default())
    }

    fn release(&self, key: &CacheKey, handle: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        // Idle when only the map and `handle` reference it.
        let idle = locks
            .get(key)
            .is_some_and(|held| Arc::ptr_eq(held, &handle) && Arc::strong_count(&handle) == 2);
        if idle {
            locks.remove(key);
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Owns the run → directory map and keeps it fresh.
///
/// Construct one per process (or per test) and share it behind an [`Arc`];
/// call [`LogCache::clear`] on shutdown to remove what it downloaded.
pub struct LogCache {
    paths: StoragePaths,
    fetcher: LogFetcher,
    ttl: Duration,
    reuse_disk: bool,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    locks: KeyLocks,
}

impl LogCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(paths: StoragePaths, fetcher: LogFetcher, ttl: Duration) -> Self {
        Self {
            paths,
            fetcher,
            ttl,
            reuse_disk: false,
            entries: RwLock::new(HashMap::new()),
            locks: KeyLocks::default(),
        }
    }

    /// Lets a miss adopt a run directory left by an earlier process.
    ///
    /// The directory is adopted only if its download summary matches the run
    /// and is younger than the TTL; the entry keeps the summary's timestamp.
    #[must_use]
    pub const fn with_disk_reuse(mut self, reuse_disk: bool) -> Self {
        self.reuse_disk = reuse_disk;
        self
    }

    /// Entry time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path resolver used for run directories.
    #[must_use]
    pub const fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Returns a ready directory for `key`, downloading the run if needed.
    ///
    /// A fresh entry whose directory still exists is returned as is. A
    /// missing, stale or vanished entry triggers a download, after which the
    /// entry is replaced with a new timestamp.
    ///
    /// # Errors
    ///
    /// Propagates hard download failures (no logs, authentication, listing
    /// and directory errors). The entry is dropped in that case.
    pub async fn resolve(&self, key: &CacheKey) -> Result<PathBuf> {
        self.evict_expired();

        if let Some(dir) = self.fresh_dir(key).await {
            debug!(run = %key, dir = %dir.display(), "cache hit");
            return Ok(dir);
        }

        let handle = self.locks.handle(key);
        let result = {
            let _guard = handle.lock().await;
            self.resolve_locked(key).await
        };
        self.locks.release(key, handle);
        result
    }

    async fn resolve_locked(&self, key: &CacheKey) -> Result<PathBuf> {
        // Another caller may have finished the download while we waited.
        if let Some(dir) = self.fresh_dir(key).await {
            debug!(run = %key, "cache filled by concurrent resolve");
            return Ok(dir);
        }
        // Callers arriving during the refresh must queue on the key lock.
        self.entries.write().remove(key);

        let dir = self.paths.run_dir(key);
        if self.reuse_disk {
            if let Some(entry) = self.adopt(key, &dir).await {
                debug!(run = %key, dir = %dir.display(), "adopted run directory from disk");
                self.entries.write().insert(key.clone(), entry);
                return Ok(dir);
            }
        }

        match self.fetcher.download(key, &dir).await {
            Ok(report) => {
                let entry = CacheEntry {
                    key: key.clone(),
                    directory: dir.clone(),
                    created_at: Utc::now(),
                };
                self.entries.write().insert(key.clone(), entry);
                info!(
                    run = %key,
                    dir = %dir.display(),
                    downloaded = report.downloaded.len(),
                    skipped = report.skipped.len(),
                    "cache entry refreshed"
                );
                Ok(dir)
            }
            Err(e) => {
                warn!(run = %key, error = %e, "failed to populate cache entry");
                Err(e)
            }
        }
    }

    async fn fresh_dir(&self, key: &CacheKey) -> Option<PathBuf> {
        let entry = self.entries.read().get(key).cloned()?;
        if entry.is_expired(self.ttl, Utc::now()) {
            debug!(run = %key, "cache entry stale");
            return None;
        }
        if tokio::fs::try_exists(&entry.directory).await.unwrap_or(false) {
            Some(entry.directory)
        } else {
            debug!(run = %key, dir = %entry.directory.display(), "cached directory vanished");
            None
        }
    }

    async fn adopt(&self, key: &CacheKey, dir: &Path) -> Option<CacheEntry> {
        let summary = DownloadSummary::load(dir).await?;
        let matches = summary.project == key.project()
            && summary.pipeline_id == key.pipeline_id()
            && summary.run_id == key.run_id();
        let entry = CacheEntry {
            key: key.clone(),
            directory: dir.to_path_buf(),
            created_at: summary.downloaded_at,
        };
        (matches && !entry.is_expired(self.ttl, Utc::now())).then_some(entry)
    }

    /// Drops every expired entry and returns how many were removed.
    ///
    /// Directories stay on disk; the next download of the run replaces them.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "evicted expired cache entries");
        }
        evicted
    }

    /// Forgets `key` so the next resolve downloads it again.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Forgets `key` and deletes its run directory.
    ///
    /// Returns true if an entry or a directory was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub async fn purge(&self, key: &CacheKey) -> Result<bool> {
        let handle = self.locks.handle(key);
        let result = {
            let _guard = handle.lock().await;
            let had_entry = self.invalidate(key);
            purge_run(&self.paths, key).await.map(|had_dir| had_entry || had_dir)
        };
        self.locks.release(key, handle);
        result
    }

    /// Snapshot of the entry for `key`.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Number of entries in the map, including not yet evicted stale ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry and deletes the directories they pointed at.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error other than a directory already being gone.
    pub async fn clear(&self) -> Result<()> {
        let drained: Vec<CacheEntry> = self.entries.write().drain().map(|(_, e)| e).collect();
        for entry in drained {
            remove_dir(&entry.directory).await?;
        }
        Ok(())
    }
}

/// Deletes the run directory of `key` under `paths`.
///
/// Needs no [`LogCache`]; a process that never resolved the run can still
/// remove what an earlier one downloaded. Returns true if a directory was
/// removed.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub async fn purge_run(paths: &StoragePaths, key: &CacheKey) -> Result<bool> {
    let dir = paths.run_dir(key);
    let had_dir = tokio::fs::try_exists(&dir).await.unwrap_or(false);
    remove_dir(&dir).await?;
    if had_dir {
        debug!(run = %key, dir = %dir.display(), "removed run directory");
    }
    Ok(had_dir)
}

async fn remove_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
