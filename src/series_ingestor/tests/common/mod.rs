#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Asia::Kolkata;
use serde_json::json;
use series_ingestor::{
    clock::FixedClock,
    gate::MarketGate,
    models::{DiffColumn, DiffStrategy, Envelope, ExpiryFilter, ExtractSpec, Feed},
    providers::{FetchedPayload, ProviderError, SessionProvider},
};

pub fn trading_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn clock_at(h: u32, m: u32) -> FixedClock {
    FixedClock::at_local(Kolkata, trading_day().and_hms_opt(h, m, 0).unwrap())
}

pub fn ok(body: impl Into<String>) -> FetchedPayload {
    FetchedPayload {
        status: 200,
        body: body.into(),
    }
}

pub fn status(code: u16) -> FetchedPayload {
    FetchedPayload {
        status: code,
        body: String::new(),
    }
}

/// Bare turnover payload: one `data` entry per value.
pub fn turnover_body(time: &str, values: &[i64]) -> String {
    let data: Vec<_> = values.iter().map(|v| json!({"totalTurnover": v})).collect();
    json!({
        "timestamp": format!("19-Oct-2026 {time}:00"),
        "data": data,
    })
    .to_string()
}

/// `records`-wrapped option chain with a single contract.
pub fn chain_body(time: &str, ce_volume: i64, pe_volume: i64) -> String {
    json!({"records": {
        "timestamp": format!("19-Oct-2026 {time}:00"),
        "expiryDates": ["23-Oct-2026"],
        "data": [{
            "expiryDate": "23-Oct-2026",
            "CE": {"totalTradedVolume": ce_volume, "totalBuyQuantity": 1, "totalSellQuantity": 2},
            "PE": {"totalTradedVolume": pe_volume, "totalBuyQuantity": 3, "totalSellQuantity": 4}
        }]
    }})
    .to_string()
}

pub fn turnover_feed(key: &str) -> Feed {
    Feed {
        key: key.into(),
        path: format!("api/liveEquity-derivatives?index={key}"),
        envelope: Envelope::Bare,
        columns: vec!["turnover".into(), "diff".into(), "time".into()],
        primary: "turnover".into(),
        extract: ExtractSpec::FieldSum {
            field: "totalTurnover".into(),
            column: "turnover".into(),
        },
        diffs: vec![DiffColumn {
            column: "diff".into(),
            source: "turnover".into(),
        }],
        diff_strategy: DiffStrategy::PreviousRow,
        require_open_status: false,
        initial_delay_ms: 0,
    }
}

pub fn chain_feed(key: &str) -> Feed {
    Feed {
        key: key.into(),
        path: format!("api/option-chain-indices?symbol={key}"),
        envelope: Envelope::Records,
        columns: vec!["vol".into(), "buy".into(), "sell".into(), "time".into()],
        primary: "vol".into(),
        extract: ExtractSpec::OptionChain {
            expiries: ExpiryFilter::Nearest(10),
            volume: "vol".into(),
            buy: "buy".into(),
            sell: "sell".into(),
        },
        diffs: vec![],
        diff_strategy: DiffStrategy::PreviousRow,
        require_open_status: false,
        initial_delay_ms: 0,
    }
}

/// Serves canned payloads per path, in order. Once a path's script is used
/// up its last payload is repeated.
#[derive(Default)]
pub struct ScriptedSession {
    scripts: Mutex<HashMap<String, VecDeque<FetchedPayload>>>,
    last: Mutex<HashMap<String, FetchedPayload>>,
    calls: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, path: &str, payloads: Vec<FetchedPayload>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), payloads.into());
        self
    }

    pub fn remaining(&self) -> usize {
        self.scripts.lock().unwrap().values().map(VecDeque::len).sum()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for ScriptedSession {
    async fn try_fetch(&self, path: &str) -> Result<FetchedPayload, ProviderError> {
        tokio::task::yield_now().await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().unwrap();
        match next {
            Some(payload) => {
                last.insert(path.to_string(), payload.clone());
                Ok(payload)
            }
            None => Ok(last.get(path).cloned().unwrap_or_else(|| status(404))),
        }
    }
}

/// Open for a fixed number of checks.
pub struct CountdownGate(AtomicUsize);

impl CountdownGate {
    pub fn new(open_checks: usize) -> Self {
        Self(AtomicUsize::new(open_checks))
    }
}

#[async_trait]
impl MarketGate for CountdownGate {
    async fn is_open(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Open while the session still has unserved scripted payloads.
pub struct DrainGate(pub Arc<ScriptedSession>);

#[async_trait]
impl MarketGate for DrainGate {
    async fn is_open(&self) -> bool {
        self.0.remaining() > 0
    }
}
