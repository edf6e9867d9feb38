//! Per-feed polling worker.

pub mod orchestrator;
pub mod outcome;

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

pub use orchestrator::Orchestrator;
pub use outcome::{FeedReport, IterationError, IterationOutcome, SkipReason, Stage};

use crate::{
    clock::Clock,
    config::Timing,
    extract,
    gate::MarketGate,
    models::Feed,
    providers::SessionProvider,
    store::{SeriesStore, Staged},
};

/// Polls one feed until the market gate reports closed.
///
/// The loop owns its feed and store handle; the session provider, gate and
/// clock are shared read-only with the other workers.
pub struct PollLoop {
    feed: Feed,
    session: Arc<dyn SessionProvider>,
    gate: Arc<dyn MarketGate>,
    store: SeriesStore,
    clock: Arc<dyn Clock>,
    timing: Timing,
}

impl PollLoop {
    pub fn new(
        feed: Feed,
        session: Arc<dyn SessionProvider>,
        gate: Arc<dyn MarketGate>,
        store: SeriesStore,
        clock: Arc<dyn Clock>,
        timing: Timing,
    ) -> Self {
        Self {
            feed,
            session,
            gate,
            store,
            clock,
            timing,
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub async fn run(self) -> FeedReport {
        let mut report = FeedReport::new(&self.feed.key);

        if self.feed.initial_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.feed.initial_delay_ms)).await;
        }

        while self.gate.is_open().await {
            let outcome = self.iterate().await;
            report.record(&outcome);
            match &outcome {
                IterationOutcome::Written { rows } => {
                    info!(feed = %self.feed.key, rows, "sample written");
                    tokio::time::sleep(self.timing.post_write_delay).await;
                }
                IterationOutcome::Duplicate => {
                    debug!(feed = %self.feed.key, "value unchanged, sample dropped");
                }
                IterationOutcome::Skipped(reason) => {
                    warn!(feed = %self.feed.key, %reason, "sample skipped");
                    tokio::time::sleep(self.timing.error_backoff).await;
                }
                IterationOutcome::Failed(err) => {
                    let IterationError::Store { stage, .. } = err;
                    error!(feed = %self.feed.key, %stage, error = %err, "iteration failed");
                    tokio::time::sleep(self.timing.error_backoff).await;
                }
            }
        }

        info!(feed = %self.feed.key, %report, "market closed, worker done");
        report
    }

    /// Fetch, extract and store one sample.
    pub async fn iterate(&self) -> IterationOutcome {
        let payload = self
            .session
            .acquire(&self.feed.path, self.timing.retry_delay)
            .await;
        if !payload.is_success() {
            return IterationOutcome::Skipped(SkipReason::HttpStatus(payload.status));
        }

        let day = self.clock.today();
        let observation = match extract::extract_body(&payload.body, &self.feed, day) {
            Ok(o) => o,
            Err(e) => return IterationOutcome::Skipped(SkipReason::Extraction(e)),
        };

        let staged = match self.store.stage(&self.feed, day, &observation) {
            Ok(Staged::Ready(write)) => write,
            Ok(Staged::DuplicateRejected) => return IterationOutcome::Duplicate,
            Ok(Staged::Invalid(reason)) => {
                return IterationOutcome::Skipped(SkipReason::Invalid(reason));
            }
            Err(source) => {
                return IterationOutcome::Failed(IterationError::Store {
                    stage: Stage::Stage,
                    source,
                });
            }
        };

        tokio::time::sleep(self.timing.settle_delay).await;

        match self.store.commit(staged) {
            Ok(rows) => IterationOutcome::Written { rows },
            Err(source) => IterationOutcome::Failed(IterationError::Store {
                stage: Stage::Commit,
                source,
            }),
        }
    }
}
