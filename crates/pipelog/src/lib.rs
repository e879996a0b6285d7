//! # pipelog
//!
//! Local cache and search engine for CI pipeline run logs.
//!
//! This crate provides:
//!
//! - [`StoragePaths`] - Deterministic directory layout per run
//! - [`LogFetcher`] - Bounded-concurrency download with per-log failure isolation
//! - [`LogCache`] - TTL cache with single-flight resolution per run
//! - [`LogReader`] - Offset/limit pagination over one log
//! - [`search`] - Regex search with context lines across a run's logs
//! - [`LogService`] - Facade validating requests and dispatching to the above
//! - [`HttpLogSource`] / [`HttpContentClient`] - HTTP adapters for the remote service
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pipelog::{HttpContentClient, HttpLogSource, LogCacheConfig, LogService, SearchOptions};
//!
//! # async fn run() -> pipelog::Result<()> {
//! let config = LogCacheConfig::from_env()?;
//! let source = HttpLogSource::new("https://dev.example.com/acme", config.fetch_timeout())?;
//! let client = HttpContentClient::new(Duration::from_secs(60))?;
//! let service = LogService::new(&config, Arc::new(source), Arc::new(client))?;
//!
//! let results = service
//!     .search_logs("web", 12, 345, "error", &SearchOptions::new().with_ignore_case(true))
//!     .await?;
//! println!("{} matches", results.total_matches);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod paths;
pub mod reader;
pub mod search;
pub mod service;
pub mod source;
pub mod summary;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types
pub use cache::{CacheEntry, LogCache, purge_run};
pub use config::LogCacheConfig;
pub use error::{FetchError, LogError, Result};
pub use fetcher::LogFetcher;
pub use paths::StoragePaths;
pub use reader::LogReader;
pub use search::search;
pub use service::LogService;
pub use source::{ContentClient, HttpContentClient, HttpLogSource, LogSource};
pub use summary::{CachedFile, CachedFiles, DownloadSummary, list_cached_files};
pub use types::{
    CacheKey, DownloadReport, DownloadedLog, FileMatches, LogId, LogListing, LogSlice, RemoteLog,
    SearchMatch, SearchOptions, SearchResults, SkipReason, SkippedLog,
};
