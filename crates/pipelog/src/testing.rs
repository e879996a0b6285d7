//! In-memory fakes for the remote seams, shared by unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{FetchError, LogError, Result};
use crate::source::{ContentClient, LogSource};
use crate::types::{CacheKey, LogListing, RemoteLog};

/// Scripted listing response.
pub enum Listing {
    Logs(LogListing),
    Unauthorized,
}

/// A [`LogSource`] that answers every run with the same listing.
pub struct FakeSource {
    listing: Mutex<Listing>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeSource {
    pub fn new(logs: Vec<RemoteLog>) -> Self {
        Self {
            listing: Mutex::new(Listing::Logs(LogListing::new(logs))),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            listing: Mutex::new(Listing::Unauthorized),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Delays every listing call, widening race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_logs(&self, logs: Vec<RemoteLog>) {
        *self.listing.lock() = Listing::Logs(LogListing::new(logs));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LogSource for FakeSource {
    fn list_logs<'a>(
        &'a self,
        key: &'a CacheKey,
    ) -> Pin<Box<dyn Future<Output = Result<LogListing>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &*self.listing.lock() {
                Listing::Logs(listing) => Ok(listing.clone()),
                Listing::Unauthorized => Err(LogError::Authentication(format!(
                    "listing logs for {key} returned 401 Unauthorized"
                ))),
            }
        })
    }
}

/// A [`ContentClient`] serving canned bodies keyed by URL.
#[derive(Default)]
pub struct FakeClient {
    responses: HashMap<String, std::result::Result<Vec<u8>, FetchError>>,
    delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), Ok(body.as_bytes().to_vec()));
        self
    }

    pub fn with_error(mut self, url: &str, err: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ContentClient for FakeClient {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Vec<u8>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        })
    }
}
