//! # pipelog-cli
//!
//! Command-line interface to the pipeline log cache.
//!
//! Provides commands for:
//! - Downloading a run's logs into the local cache
//! - Reading a log, whole or paginated
//! - Searching a run's logs with context lines
//! - Listing and removing cached runs
//!
//! # Architecture
//!
//! Every invocation builds a [`pipelog::LogService`] over the HTTP adapters.
//! The cache directory outlives the process, so the service is configured to
//! adopt run directories that are still within their TTL.
//!
//! ```text
//! ┌──────────────┐   LogService   ┌───────────────┐   HTTPS   ┌───────────────────┐
//! │ pipelog-cli  │───────────────►│ cache on disk │◄─────────►│ pipelines service │
//! └──────────────┘                └───────────────┘           └───────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, FilesArgs, Format, ReadArgs, RunRef, SearchArgs};
pub use error::CliError;
pub use output::OutputFormat;
