//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`fetch`] - Download a run into the cache
//! - [`read`] - Print a log or a window of it
//! - [`search`] - Regex search across a run's logs
//! - [`files`] - List cached files
//! - [`invalidate`] - Remove a run from the cache

pub mod fetch;
pub mod files;
pub mod invalidate;
pub mod read;
pub mod search;

pub use fetch::FetchCommand;
pub use files::FilesCommand;
pub use invalidate::InvalidateCommand;
pub use read::ReadCommand;
pub use search::SearchCommand;
