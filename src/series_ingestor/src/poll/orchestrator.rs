//! Runs every configured feed concurrently for one trading session.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

use super::{FeedReport, PollLoop};
use crate::{
    clock::{Clock, SystemClock},
    config::{IngestorConfig, Timing},
    errors::Error,
    gate::{MarketGate, build_gate},
    models::Feed,
    providers::{SessionProvider, nse::NseSession},
    store::SeriesStore,
};

pub struct Orchestrator {
    feeds: Vec<Feed>,
    session: Arc<dyn SessionProvider>,
    gate: Arc<dyn MarketGate>,
    clock: Arc<dyn Clock>,
    store: SeriesStore,
    timing: Timing,
}

impl Orchestrator {
    pub fn new(
        feeds: Vec<Feed>,
        session: Arc<dyn SessionProvider>,
        gate: Arc<dyn MarketGate>,
        clock: Arc<dyn Clock>,
        store: SeriesStore,
        timing: Timing,
    ) -> Self {
        Self {
            feeds,
            session,
            gate,
            clock,
            store,
            timing,
        }
    }

    /// Wire the production session, clock and gate from a loaded config.
    pub fn from_config(config: IngestorConfig) -> Result<Self, Error> {
        let tz = config.upstream.tz().map_err(Error::Config)?;
        let timing = Timing::from(config.timing);
        let session: Arc<dyn SessionProvider> = Arc::new(NseSession::new(
            config.upstream.base_url.clone(),
            &config.upstream.headers,
        )?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));
        let gate = build_gate(&config.gate, session.clone(), clock.clone(), &timing)
            .map_err(Error::Config)?;
        let store = SeriesStore::new(config.storage.root);

        Ok(Self::new(config.feeds, session, gate, clock, store, timing))
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    /// Wait for the market to open, then poll every feed until it closes.
    ///
    /// A worker that panics is logged and left out of the returned reports;
    /// the others keep running.
    pub async fn run(&self) -> Vec<FeedReport> {
        if !self.gate.wait_until_open(self.timing.gate_poll).await {
            info!("market will not open again today, nothing to do");
            return Vec::new();
        }

        let day = self.clock.today();
        info!(%day, feeds = self.feeds.len(), "market open, starting workers");

        let mut workers = JoinSet::new();
        for feed in &self.feeds {
            if let Err(e) = self.store.create_if_absent(feed, day) {
                warn!(feed = %feed.key, error = %e, "could not prepare series file");
            }
            let span = info_span!("feed", feed = %feed.key);
            let worker = PollLoop::new(
                feed.clone(),
                self.session.clone(),
                self.gate.clone(),
                self.store.clone(),
                self.clock.clone(),
                self.timing,
            );
            workers.spawn(worker.run().instrument(span));
        }

        let mut reports = Vec::with_capacity(self.feeds.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "feed worker aborted"),
            }
        }
        reports.sort_by(|a, b| a.feed.cmp(&b.feed));
        reports
    }
}
