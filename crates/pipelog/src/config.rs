//! Cache configuration.
//!
//! Settings come from defaults, an optional JSON file and `PIPELOG_*`
//! environment variables, applied in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{LogError, Result};
use crate::fetcher::{DEFAULT_FETCH_CONCURRENCY, DEFAULT_FETCH_TIMEOUT};
use crate::paths::StoragePaths;
use crate::reader::{DEFAULT_READ_LIMIT, LogReader, MAX_READ_LIMIT};

/// Overrides [`LogCacheConfig::base_dir`].
pub const ENV_CACHE_DIR: &str = "PIPELOG_CACHE_DIR";
/// Overrides [`LogCacheConfig::ttl_ms`].
pub const ENV_CACHE_TTL_MS: &str = "PIPELOG_CACHE_TTL_MS";
/// Overrides [`LogCacheConfig::fetch_concurrency`].
pub const ENV_FETCH_CONCURRENCY: &str = "PIPELOG_FETCH_CONCURRENCY";
/// Overrides [`LogCacheConfig::fetch_timeout_ms`].
pub const ENV_FETCH_TIMEOUT_MS: &str = "PIPELOG_FETCH_TIMEOUT_MS";

/// Configuration for the log cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCacheConfig {
    /// Root directory for cached runs.
    pub base_dir: PathBuf,
    /// Milliseconds a downloaded run stays fresh.
    pub ttl_ms: u64,
    /// Logs fetched in parallel within one download.
    pub fetch_concurrency: usize,
    /// Per-log fetch timeout in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Lines returned by a paginated read without a limit.
    pub default_read_limit: usize,
    /// Largest window a paginated read may return.
    pub max_read_limit: usize,
    /// Whether to persist `summary.json` after each download.
    pub write_summary: bool,
    /// Whether a cache miss may adopt a fresh run directory already on disk.
    pub reuse_disk: bool,
}

impl Default for LogCacheConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            ttl_ms: millis(DEFAULT_CACHE_TTL),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            fetch_timeout_ms: millis(DEFAULT_FETCH_TIMEOUT),
            default_read_limit: DEFAULT_READ_LIMIT,
            max_read_limit: MAX_READ_LIMIT,
            write_summary: true,
            reuse_disk: false,
        }
    }
}

/// `<user cache dir>/pipelog`, or under the temp dir where there is none.
#[must_use]
pub fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pipelog")
}

impl LogCacheConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LogError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| LogError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or the result is invalid.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Overrides fields from `PIPELOG_*` variables found through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not a number or the result is invalid.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|d| !d.is_empty()) {
            self.base_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup(ENV_CACHE_TTL_MS) {
            self.ttl_ms = parse_var(ENV_CACHE_TTL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_FETCH_CONCURRENCY) {
            self.fetch_concurrency = parse_var(ENV_FETCH_CONCURRENCY, &v)?;
        }
        if let Some(v) = lookup(ENV_FETCH_TIMEOUT_MS) {
            self.fetch_timeout_ms = parse_var(ENV_FETCH_TIMEOUT_MS, &v)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(LogError::Config("base_dir cannot be empty".to_string()));
        }

        if self.fetch_concurrency == 0 {
            return Err(LogError::Config(
                "fetch_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout_ms == 0 {
            return Err(LogError::Config(
                "fetch_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.default_read_limit == 0 || self.max_read_limit == 0 {
            return Err(LogError::Config(
                "read limits must be greater than 0".to_string(),
            ));
        }

        if self.reuse_disk && !self.write_summary {
            return Err(LogError::Config(
                "reuse_disk requires write_summary".to_string(),
            ));
        }

        if self.default_read_limit > self.max_read_limit {
            return Err(LogError::Config(format!(
                "default_read_limit ({}) cannot exceed max_read_limit ({})",
                self.default_read_limit, self.max_read_limit
            )));
        }

        Ok(())
    }

    /// Set the cache root.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Set the entry TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = millis(ttl);
        self
    }

    /// Set the fetch concurrency.
    #[must_use]
    pub const fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency;
        self
    }

    /// Set the per-log fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = millis(timeout);
        self
    }

    /// Set the reader limits.
    #[must_use]
    pub const fn with_read_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_read_limit = default_limit;
        self.max_read_limit = max_limit;
        self
    }

    /// Enable or disable `summary.json`.
    #[must_use]
    pub const fn with_summary(mut self, write_summary: bool) -> Self {
        self.write_summary = write_summary;
        self
    }

    /// Enable or disable adopting run directories left by earlier processes.
    #[must_use]
    pub const fn with_disk_reuse(mut self, reuse_disk: bool) -> Self {
        self.reuse_disk = reuse_disk;
        self
    }

    /// Entry TTL as a duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Per-log fetch timeout as a duration.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Path resolver rooted at [`Self::base_dir`].
    #[must_use]
    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.base_dir)
    }

    /// Reader using the configured limits.
    #[must_use]
    pub const fn reader(&self) -> LogReader {
        LogReader::new(self.default_read_limit, self.max_read_limit)
    }
}

/// Whole milliseconds in `d`, saturating.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LogError::Config(format!("{name} must be a non-negative integer, got '{value}'")))
}
