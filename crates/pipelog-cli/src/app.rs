//! Assembles a [`LogService`] from command-line arguments.

use std::sync::Arc;

use pipelog::{HttpContentClient, HttpLogSource, LogCacheConfig, LogService};
use tracing::debug;

use crate::cli::Cli;
use crate::error::CliError;

/// Resolves the cache configuration: file or defaults, then environment,
/// then `--cache-dir`.
///
/// Run directories left by earlier invocations are reused whenever download
/// summaries are written, since that is what reuse is checked against.
///
/// # Errors
///
/// Returns an error if the file or an environment variable is invalid.
pub fn load_config(
    cli: &Cli,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LogCacheConfig, CliError> {
    let config = match &cli.config {
        Some(path) => LogCacheConfig::from_file(path)?,
        None => LogCacheConfig::default(),
    };
    let mut config = config.apply_env(lookup)?;
    let reuse = config.write_summary;
    config = config.with_disk_reuse(reuse);
    if let Some(dir) = &cli.cache_dir {
        config = config.with_base_dir(dir);
    }
    config.validate()?;
    Ok(config)
}

/// Builds the service, or `None` when no service URL was given.
///
/// # Errors
///
/// Returns an error if the URL is invalid or an HTTP client cannot be built.
pub fn build_service(cli: &Cli, config: &LogCacheConfig) -> Result<Option<LogService>, CliError> {
    let Some(base_url) = &cli.base_url else {
        return Ok(None);
    };

    let mut source = HttpLogSource::new(base_url, config.fetch_timeout())?;
    if let Some(token) = &cli.token {
        source = source.with_bearer_token(token);
    }
    let client = HttpContentClient::new(config.fetch_timeout())?;

    debug!(
        base_url = %base_url,
        cache_dir = %config.base_dir.display(),
        ttl_ms = config.ttl_ms,
        "log service configured"
    );
    Ok(Some(LogService::new(config, Arc::new(source), Arc::new(client))?))
}

/// Like [`build_service`], failing when no service URL was given.
///
/// # Errors
///
/// Returns [`CliError::Config`] without a service URL, or any error from
/// [`build_service`].
pub fn require_service(cli: &Cli, config: &LogCacheConfig) -> Result<LogService, CliError> {
    build_service(cli, config)?.ok_or_else(|| {
        CliError::Config("no service URL; pass --base-url or set PIPELOG_BASE_URL".into())
    })
}
