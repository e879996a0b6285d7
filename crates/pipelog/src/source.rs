//! Seams to the remote CI service.
//!
//! The cache needs two things from the outside world: the list of logs for a
//! run ([`LogSource`]) and the bytes behind each signed URL
//! ([`ContentClient`]). Both are object safe so the cache can hold them as
//! `Arc<dyn ...>` and tests can substitute in-memory fakes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::{FetchError, LogError, Result};
use crate::types::{CacheKey, LogId, LogListing, RemoteLog};

const API_VERSION: &str = "7.1";

/// Lists the logs the remote service holds for a run.
pub trait LogSource: Send + Sync {
    /// Returns the run's logs with their download URLs.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Authentication`] when credentials are rejected and
    /// [`LogError::Remote`] for other service failures.
    fn list_logs<'a>(
        &'a self,
        key: &'a CacheKey,
    ) -> Pin<Box<dyn Future<Output = Result<LogListing>> + Send + 'a>>;
}

/// Fetches the content behind a log's download URL.
pub trait ContentClient: Send + Sync {
    /// Downloads the full body at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] for non-success statuses and transport failures.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Vec<u8>, FetchError>> + Send + 'a>>;
}

/// Plain HTTP GET content client.
#[derive(Debug, Clone)]
pub struct HttpContentClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpContentClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl ContentClient for HttpContentClient {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Vec<u8>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| self.classify(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let body = response.bytes().await.map_err(|e| self.classify(&e))?;
            Ok(body.to_vec())
        })
    }
}

/// Lists run logs from a pipelines REST endpoint.
///
/// Requests `GET {base}/{project}/_apis/pipelines/{pipeline}/runs/{run}/logs`
/// with `$expand=signedContent`, so every listed log carries a pre-signed
/// download URL.
#[derive(Debug, Clone)]
pub struct HttpLogSource {
    client: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpLogSource {
    /// Creates a source for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] if the URL is not a valid base URL or the
    /// HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LogError::Config(format!("invalid service URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LogError::Config(format!(
                "service URL '{base_url}' cannot be used as a base"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            bearer_token: None,
        })
    }

    /// Sends `token` as a bearer credential on listing requests.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Builds the listing URL for a run.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] if the base URL cannot take path segments.
    pub fn listing_url(&self, key: &CacheKey) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                LogError::Config(format!("service URL '{}' cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.push(key.project());
            segments.extend(["_apis", "pipelines"]);
            segments.push(&key.pipeline_id().to_string());
            segments.push("runs");
            segments.push(&key.run_id().to_string());
            segments.push("logs");
        }
        url.query_pairs_mut()
            .append_pair("$expand", "signedContent")
            .append_pair("api-version", API_VERSION);
        Ok(url)
    }
}

impl LogSource for HttpLogSource {
    fn list_logs<'a>(
        &'a self,
        key: &'a CacheKey,
    ) -> Pin<Box<dyn Future<Output = Result<LogListing>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.listing_url(key)?;
            debug!(%url, run = %key, "listing run logs");

            let mut request = self.client.get(url);
            if let Some(ref token) = self.bearer_token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| LogError::Remote(format!("listing logs for {key} failed: {e}")))?;

            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(LogError::Authentication(format!(
                        "listing logs for {key} returned {}",
                        response.status()
                    )));
                }
                StatusCode::NOT_FOUND => return Err(key.no_logs()),
                status if !status.is_success() => {
                    return Err(LogError::Remote(format!(
                        "listing logs for {key} returned {status}"
                    )));
                }
                _ => {}
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| LogError::Remote(format!("reading log listing for {key}: {e}")))?;
            parse_listing(&body)
        })
    }
}

/// Parses a listing response body.
///
/// # Errors
///
/// Returns [`LogError::Serialization`] if the body is not a listing.
pub fn parse_listing(body: &[u8]) -> Result<LogListing> {
    let wire: WireListing = serde_json::from_slice(body)?;
    Ok(LogListing::new(
        wire.logs.into_iter().map(RemoteLog::from).collect(),
    ))
}

#[derive(Deserialize)]
struct WireListing {
    #[serde(default)]
    logs: Vec<WireLog>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLog {
    id: u32,
    #[serde(default)]
    line_count: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    signed_content: Option<WireSignedContent>,
}

#[derive(Deserialize)]
struct WireSignedContent {
    #[serde(default)]
    url: Option<String>,
}

impl From<WireLog> for RemoteLog {
    fn from(wire: WireLog) -> Self {
        Self {
            id: LogId(wire.id),
            line_count: wire.line_count,
            url: wire.signed_content.and_then(|s| s.url).or(wire.url),
        }
    }
}
