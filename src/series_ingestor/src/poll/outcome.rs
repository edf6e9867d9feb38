use std::fmt;

use thiserror::Error;

use crate::{extract::ExtractionFailure, store::StoreError};

/// Store step an unexpected error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Stage,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Stage => "stage",
            Stage::Commit => "commit",
        })
    }
}

#[derive(Debug, Error)]
pub enum IterationError {
    #[error("store {stage} failed: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

/// Why an iteration produced no row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Upstream answered with a non-2xx status.
    HttpStatus(u16),
    Extraction(ExtractionFailure),
    /// The store refused the observation.
    Invalid(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::HttpStatus(status) => write!(f, "upstream returned HTTP {status}"),
            SkipReason::Extraction(e) => write!(f, "extraction failed: {e}"),
            SkipReason::Invalid(reason) => write!(f, "rejected by store: {reason}"),
        }
    }
}

/// Result of one poll-loop iteration.
#[derive(Debug)]
pub enum IterationOutcome {
    Written { rows: usize },
    Duplicate,
    Skipped(SkipReason),
    Failed(IterationError),
}

/// Per-feed counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub feed: String,
    pub iterations: u64,
    pub written: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl FeedReport {
    pub fn new(feed: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &IterationOutcome) {
        self.iterations += 1;
        match outcome {
            IterationOutcome::Written { .. } => self.written += 1,
            IterationOutcome::Duplicate => self.duplicates += 1,
            IterationOutcome::Skipped(_) => self.skipped += 1,
            IterationOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for FeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} iterations, {} written, {} duplicates, {} skipped, {} failed",
            self.feed, self.iterations, self.written, self.duplicates, self.skipped, self.failed
        )
    }
}
