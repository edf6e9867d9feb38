//! Market open/closed gate.
//!
//! Poll loops ask the gate once per iteration and stop as soon as it reports
//! closed. The orchestrator additionally blocks on [`MarketGate::wait_until_open`]
//! before spawning any worker.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveTime;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    config::{GateConfig, Timing},
    providers::{SessionProvider, nse::MarketStatusResponse},
};

const OPEN_STATUS: &str = "Open";

#[async_trait]
pub trait MarketGate: Send + Sync {
    async fn is_open(&self) -> bool;

    /// Sleep until the gate reports open.
    ///
    /// Returns `false` when the gate can tell the market will not open again
    /// today; the default implementation never gives up.
    async fn wait_until_open(&self, poll: Duration) -> bool {
        loop {
            if self.is_open().await {
                return true;
            }
            debug!(?poll, "market closed, waiting");
            tokio::time::sleep(poll).await;
        }
    }
}

/// Open iff local time is in `[open, close)`.
pub struct TimeWindowGate {
    open: NaiveTime,
    close: NaiveTime,
    clock: Arc<dyn Clock>,
}

impl TimeWindowGate {
    pub fn new(open: NaiveTime, close: NaiveTime, clock: Arc<dyn Clock>) -> Self {
        Self { open, close, clock }
    }

    pub fn is_open_at(&self, t: NaiveTime) -> bool {
        self.open <= t && t < self.close
    }
}

#[async_trait]
impl MarketGate for TimeWindowGate {
    async fn is_open(&self) -> bool {
        self.is_open_at(self.clock.time_of_day())
    }

    async fn wait_until_open(&self, poll: Duration) -> bool {
        loop {
            let now = self.clock.time_of_day();
            if self.is_open_at(now) {
                return true;
            }
            if now >= self.close {
                info!(%now, close = %self.close, "trading window already over for today");
                return false;
            }
            debug!(%now, open = %self.open, "before trading window, waiting");
            tokio::time::sleep(poll).await;
        }
    }
}

/// Asks the upstream market-status endpoint through the session provider.
pub struct StatusQueryGate {
    session: Arc<dyn SessionProvider>,
    path: String,
    index: String,
    retry_delay: Duration,
}

impl StatusQueryGate {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        path: impl Into<String>,
        index: impl Into<String>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            session,
            path: path.into(),
            index: index.into(),
            retry_delay,
        }
    }

    /// Query until the endpoint gives a usable answer.
    async fn query(&self) -> String {
        loop {
            let payload = self.session.acquire(&self.path, self.retry_delay).await;
            if !payload.is_success() {
                warn!(status = payload.status, "market status query rejected, retrying");
            } else {
                match serde_json::from_str::<MarketStatusResponse>(&payload.body) {
                    Ok(parsed) => match parsed.status_for(&self.index) {
                        Some(status) => return status.to_string(),
                        None => warn!(index = %self.index, "index missing from market status"),
                    },
                    Err(e) => warn!(error = %e, "unparseable market status, retrying"),
                }
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

#[async_trait]
impl MarketGate for StatusQueryGate {
    async fn is_open(&self) -> bool {
        let status = self.query().await;
        debug!(index = %self.index, %status, "market status");
        status == OPEN_STATUS
    }
}

/// Build the configured gate.
pub fn build_gate(
    cfg: &GateConfig,
    session: Arc<dyn SessionProvider>,
    clock: Arc<dyn Clock>,
    timing: &Timing,
) -> anyhow::Result<Arc<dyn MarketGate>> {
    let gate: Arc<dyn MarketGate> = match cfg {
        GateConfig::TimeWindow { .. } => {
            let Some((open, close)) = cfg.window()? else {
                anyhow::bail!("time window gate without a window");
            };
            Arc::new(TimeWindowGate::new(open, close, clock))
        }
        GateConfig::StatusQuery { path, index } => Arc::new(StatusQueryGate::new(
            session,
            path.clone(),
            index.clone(),
            timing.retry_delay,
        )),
    };
    Ok(gate)
}
