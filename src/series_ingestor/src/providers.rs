//! Session providers for the upstream market-data source.
//!
//! This module defines the [`SessionProvider`] trait, the seam between the
//! poll loops and whatever actually talks HTTP. The upstream refuses API calls
//! from a cold client, so a provider is responsible for warming up a session
//! (cookie handshake) before each real request.
//!
//! Transport failures are retried forever by [`SessionProvider::acquire`]; a
//! caller never sees them. A non-2xx status is not a transport failure: the
//! payload comes back with its status and the poll loop decides what to do.
//!
//! The trait supports dynamic dispatch (`Arc<dyn SessionProvider>`) so the
//! orchestrator can share one provider across all feed workers and tests can
//! swap in a scripted one.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use series_ingestor::providers::{FetchedPayload, ProviderError, SessionProvider};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl SessionProvider for Canned {
//!     async fn try_fetch(&self, _path: &str) -> Result<FetchedPayload, ProviderError> {
//!         Ok(FetchedPayload { status: 200, body: "{}".into() })
//!     }
//! }
//! ```

pub mod nse;

use std::time::Duration;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};
use tracing::warn;

/// Raw result of one upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPayload {
    pub status: u16,
    pub body: String,
}

impl FetchedPayload {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Obtains authenticated responses from the upstream source.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// One handshake-plus-request attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any transport-level failure.
    async fn try_fetch(&self, path: &str) -> Result<FetchedPayload, ProviderError>;

    /// Fetches `path`, retrying transport failures every `retry_delay` until
    /// one attempt succeeds. Never returns an error.
    async fn acquire(&self, path: &str, retry_delay: Duration) -> FetchedPayload {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.try_fetch(path).await {
                Ok(payload) => return payload,
                Err(e) => {
                    warn!(path, attempt, error = %e, "upstream request failed, retrying");
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// A configured header name is not a valid HTTP token.
    #[snafu(display("Invalid header name {name:?}: {source}"))]
    InvalidHeaderName {
        name: String,
        source: reqwest::header::InvalidHeaderName,
        backtrace: Backtrace,
    },

    /// A configured header value contains characters HTTP does not allow.
    #[snafu(display("Invalid value for header {name:?}: {source}"))]
    InvalidHeaderValue {
        name: String,
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Transport-level failures inside a provider.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The warm-up request to the base origin failed.
    #[snafu(display("Session handshake with {url} failed: {source}"))]
    Handshake {
        url: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The real request failed before a status line arrived.
    #[snafu(display("Request to {url} failed: {source}"))]
    Request {
        url: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The status arrived but the body could not be read.
    #[snafu(display("Reading response body from {url} failed: {source}"))]
    Body {
        url: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}
