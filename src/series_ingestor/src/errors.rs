use thiserror::Error;

use crate::{extract::ExtractionFailure, providers::ProviderInitError, store::StoreError};

/// The unified error type for the `series_ingestor` crate.
///
/// Only startup and offline paths surface it. Inside a running poll loop every
/// failure is turned into an iteration outcome instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0:#}")]
    Config(anyhow::Error),

    /// The HTTP session could not be built from the configured headers.
    #[error("Provider initialization error: {0}")]
    ProviderInit(#[from] ProviderInitError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionFailure),

    #[error("Unknown feed {0:?}")]
    UnknownFeed(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
