//! Ingestor configuration: parsing, normalization, validation and loading.
//!
//! The whole process is described by one TOML document:
//! - `[upstream]`: base URL, exchange time zone and the browser-like headers
//!   sent with every request
//! - `[gate]`: which market gate to use (`time_window` or `status_query`)
//! - `[timing]`: retry, backoff and write-settle delays in milliseconds
//! - `[storage]`: root directory of the per-symbol daily series files
//! - `[[feeds]]`: one entry per polled (endpoint, symbol, schema) unit
//!
//! Entrypoints:
//! - Parse + normalize + validate from a TOML string: [`load_config_str`]
//! - Same from a file path: [`load_config_path`]
//! - Environment overrides on top of a loaded config: [`apply_env_overrides`]
//!
//! The resulting [`IngestorConfig`] is immutable once the orchestrator starts.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use chrono::NaiveTime;
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var_opt, parse_env_var_opt};

use crate::models::{ExtractSpec, Feed, TIME_COLUMN};

/// Environment variable that replaces `storage.root`.
pub const DATA_DIR_ENV: &str = "SERIES_INGESTOR_DATA_DIR";
/// Environment variable that replaces `timing.retry_delay_ms`.
pub const RETRY_DELAY_ENV: &str = "SERIES_INGESTOR_RETRY_DELAY_MS";

const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
const DEFAULT_STATUS_PATH: &str = "api/marketStatus";
const DEFAULT_STATUS_INDEX: &str = "NIFTY 50";
const WINDOW_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestorConfig {
    pub upstream: UpstreamConfig,
    pub gate: GateConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub feeds: Vec<Feed>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// IANA zone of the exchange. Sample dates and the time window use it.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl UpstreamConfig {
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("unknown time zone {:?}: {e}", self.timezone))
    }
}

/// Market gate selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateConfig {
    /// Open iff local time is in `[open, close)`, both `HH:MM`.
    TimeWindow { open: String, close: String },
    /// Ask the upstream market-status endpoint.
    StatusQuery {
        #[serde(default = "default_status_path")]
        path: String,
        #[serde(default = "default_status_index")]
        index: String,
    },
}

impl GateConfig {
    /// Parsed `(open, close)` for the time-window gate, `None` for status queries.
    pub fn window(&self) -> anyhow::Result<Option<(NaiveTime, NaiveTime)>> {
        match self {
            GateConfig::TimeWindow { open, close } => {
                let open_t = NaiveTime::parse_from_str(open.trim(), WINDOW_FORMAT)
                    .with_context(|| format!("bad gate.open {open:?}, expected HH:MM"))?;
                let close_t = NaiveTime::parse_from_str(close.trim(), WINDOW_FORMAT)
                    .with_context(|| format!("bad gate.close {close:?}, expected HH:MM"))?;
                Ok(Some((open_t, close_t)))
            }
            GateConfig::StatusQuery { .. } => Ok(None),
        }
    }
}

/// Delays in milliseconds, as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub retry_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub settle_delay_ms: u64,
    pub post_write_delay_ms: u64,
    pub gate_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 3_000,
            error_backoff_ms: 5_000,
            settle_delay_ms: 1_000,
            post_write_delay_ms: 3_000,
            gate_poll_ms: 3_000,
        }
    }
}

/// Runtime view of [`TimingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Between failed session attempts and unanswered gate queries.
    pub retry_delay: Duration,
    /// After a skipped or failed iteration.
    pub error_backoff: Duration,
    /// Between staging an upsert and committing it.
    pub settle_delay: Duration,
    /// After a committed write.
    pub post_write_delay: Duration,
    /// Between gate checks while waiting for the market to open.
    pub gate_poll: Duration,
}

impl Timing {
    /// No sleeping at all. Used by tests.
    pub fn zero() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            error_backoff: Duration::ZERO,
            settle_delay: Duration::ZERO,
            post_write_delay: Duration::ZERO,
            gate_poll: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        TimingConfig::default().into()
    }
}

impl From<TimingConfig> for Timing {
    fn from(cfg: TimingConfig) -> Self {
        Self {
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            error_backoff: Duration::from_millis(cfg.error_backoff_ms),
            settle_delay: Duration::from_millis(cfg.settle_delay_ms),
            post_write_delay: Duration::from_millis(cfg.post_write_delay_ms),
            gate_poll: Duration::from_millis(cfg.gate_poll_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("history"),
        }
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Feed keys that changed when lowercasing/trimming.
    pub keys_renamed: usize,
    /// Column names that changed when trimming.
    pub columns_trimmed: usize,
    /// Configured `accept-encoding` headers removed from the upstream header set.
    pub headers_dropped: usize,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_status_path() -> String {
    DEFAULT_STATUS_PATH.to_string()
}

fn default_status_index() -> String {
    DEFAULT_STATUS_INDEX.to_string()
}

/// Normalize a config in place.
///
/// - Trim + lowercase feed keys, trim endpoint paths
/// - Trim every column name (schema, primary, extractor outputs, diffs)
/// - Lowercase + trim header names; drop `accept-encoding`
pub fn normalize_config(cfg: &mut IngestorConfig) -> NormalizationReport {
    let mut report = NormalizationReport::default();

    let headers = std::mem::take(&mut cfg.upstream.headers);
    for (name, value) in headers {
        let name = name.trim().to_lowercase();
        if name == "accept-encoding" {
            report.headers_dropped += 1;
            continue;
        }
        cfg.upstream.headers.insert(name, value);
    }

    for feed in &mut cfg.feeds {
        let key = feed.key.trim().to_lowercase();
        if key != feed.key {
            report.keys_renamed += 1;
            feed.key = key;
        }
        feed.path = feed.path.trim().to_string();

        let mut trim = |s: &mut String| {
            let t = s.trim();
            if t.len() != s.len() {
                report.columns_trimmed += 1;
                *s = t.to_string();
            }
        };
        feed.columns.iter_mut().for_each(&mut trim);
        trim(&mut feed.primary);
        for diff in &mut feed.diffs {
            trim(&mut diff.column);
            trim(&mut diff.source);
        }
        match &mut feed.extract {
            ExtractSpec::OptionChain {
                volume, buy, sell, ..
            } => {
                trim(volume);
                trim(buy);
                trim(sell);
            }
            ExtractSpec::FieldSum { column, field } => {
                trim(column);
                trim(field);
            }
            ExtractSpec::Strike {
                ce_volume,
                pe_volume,
                ce_oi,
                pe_oi,
                expiry,
                ..
            } => {
                trim(ce_volume);
                trim(pe_volume);
                trim(ce_oi);
                trim(pe_oi);
                trim(expiry);
            }
        }
    }

    report
}

/// Check cross-field rules a TOML schema can't express.
pub fn validate_config(cfg: &IngestorConfig) -> anyhow::Result<()> {
    cfg.upstream.tz()?;
    if cfg.upstream.base_url.trim().is_empty() {
        bail!("upstream.base_url cannot be empty");
    }

    if let Some((open, close)) = cfg.gate.window()? {
        if open >= close {
            bail!("gate.open ({open}) must be earlier than gate.close ({close})");
        }
    }

    if cfg.feeds.is_empty() {
        bail!("at least one [[feeds]] entry is required");
    }

    let mut seen = HashSet::new();
    for feed in &cfg.feeds {
        validate_feed(feed).with_context(|| format!("feed {:?}", feed.key))?;
        if !seen.insert(feed.key.as_str()) {
            bail!("duplicate feed key {:?}", feed.key);
        }
    }
    Ok(())
}

fn validate_feed(feed: &Feed) -> anyhow::Result<()> {
    if feed.key.is_empty() {
        bail!("feed key cannot be empty");
    }
    if feed.key.contains(['/', '\\']) || feed.key == "." || feed.key == ".." {
        bail!("feed key must be a plain directory name");
    }
    if feed.path.is_empty() {
        bail!("endpoint path cannot be empty");
    }

    let mut columns = HashSet::new();
    for c in &feed.columns {
        if c.is_empty() {
            bail!("column names cannot be empty");
        }
        if !columns.insert(c.as_str()) {
            bail!("column {c:?} appears twice in the schema");
        }
    }
    if !columns.contains(TIME_COLUMN) {
        bail!("schema must contain the {TIME_COLUMN:?} column");
    }
    if !columns.contains(feed.primary.as_str()) {
        bail!("primary column {:?} is not in the schema", feed.primary);
    }

    let outputs = feed.extract.output_columns();
    for c in &outputs {
        if !columns.contains(c) {
            bail!("extracted column {c:?} is not in the schema");
        }
        if *c == TIME_COLUMN {
            bail!("extracted column cannot be named {TIME_COLUMN:?}");
        }
    }
    if !outputs.contains(&feed.primary.as_str()) {
        bail!(
            "primary column {:?} is not produced by the extractor",
            feed.primary
        );
    }

    for diff in &feed.diffs {
        if !columns.contains(diff.column.as_str()) {
            bail!("diff column {:?} is not in the schema", diff.column);
        }
        if !outputs.contains(&diff.source.as_str()) {
            bail!(
                "diff source {:?} is not produced by the extractor",
                diff.source
            );
        }
        if outputs.contains(&diff.column.as_str()) {
            bail!("diff column {:?} clashes with an extracted column", diff.column);
        }
    }
    Ok(())
}

/// Load from a TOML string, then normalize and validate.
pub fn load_config_str(s: &str) -> anyhow::Result<(IngestorConfig, NormalizationReport)> {
    let mut cfg: IngestorConfig = toml::from_str(s).context("parse ingestor TOML")?;
    let report = normalize_config(&mut cfg);
    validate_config(&cfg)?;
    Ok((cfg, report))
}

/// Load from a file path, then normalize and validate.
pub fn load_config_path(
    path: impl AsRef<Path>,
) -> anyhow::Result<(IngestorConfig, NormalizationReport)> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read ingestor config {}", path.display()))?;
    load_config_str(&s).with_context(|| format!("load ingestor config {}", path.display()))
}

/// Apply environment overrides on top of a loaded config.
///
/// Returns the names of the variables that took effect.
pub fn apply_env_overrides(
    cfg: &mut IngestorConfig,
) -> anyhow::Result<Vec<&'static str>> {
    let mut applied = Vec::new();
    if let Some(root) = get_env_var_opt(DATA_DIR_ENV) {
        cfg.storage.root = PathBuf::from(root);
        applied.push(DATA_DIR_ENV);
    }
    if let Some(ms) = parse_env_var_opt::<u64>(RETRY_DELAY_ENV)? {
        cfg.timing.retry_delay_ms = ms;
        applied.push(RETRY_DELAY_ENV);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::models::{DiffStrategy, Envelope};

    const SAMPLE: &str = r#"
        [upstream]
        base_url = "https://www.nseindia.com/"
        [upstream.headers]
        User-Agent = "Mozilla/5.0"
        Accept-Encoding = "gzip, deflate, br"

        [gate]
        kind = "time_window"
        open = "09:15"
        close = "15:30"

        [storage]
        root = "history"

        [[feeds]]
        key = " NiftyVolume "
        path = "api/option-chain-indices?symbol=NIFTY"
        envelope = "records"
        columns = ["niftyvolume", "niftybuyorders", "niftysellorders", "time"]
        primary = "niftyvolume"
        [feeds.extract]
        mode = "option_chain"
        expiries = { nearest = 3 }
        volume = "niftyvolume"
        buy = "niftybuyorders"
        sell = "niftysellorders"

        [[feeds]]
        key = "nifty"
        path = "api/liveEquity-derivatives?index=nse50_opt"
        columns = ["niftytotalTurnover", "niftydiff", "time"]
        primary = "niftytotalTurnover"
        diff_strategy = "zero_gated"
        diffs = [{ column = "niftydiff", source = "niftytotalTurnover" }]
        [feeds.extract]
        mode = "field_sum"
        field = "totalTurnover"
        column = "niftytotalTurnover"
    "#;

    #[test]
    fn loads_and_normalizes_sample() {
        let (cfg, report) = load_config_str(SAMPLE).unwrap();
        assert_eq!(cfg.feeds[0].key, "niftyvolume");
        assert_eq!(report.keys_renamed, 1);
        assert_eq!(report.headers_dropped, 1);
        assert!(cfg.upstream.headers.contains_key("user-agent"));
        assert!(!cfg.upstream.headers.contains_key("accept-encoding"));
        assert_eq!(cfg.upstream.tz().unwrap(), chrono_tz::Asia::Kolkata);
        assert_eq!(cfg.feeds[0].envelope, Envelope::Records);
        assert_eq!(cfg.feeds[1].diff_strategy, DiffStrategy::ZeroGated);

        let timing: Timing = cfg.timing.into();
        assert_eq!(timing.retry_delay, Duration::from_secs(3));
        assert_eq!(timing.error_backoff, Duration::from_secs(5));
        assert_eq!(timing.settle_delay, Duration::from_secs(1));
    }

    #[test]
    fn status_query_gate_defaults() {
        let gate: GateConfig = toml::from_str(r#"kind = "status_query""#).unwrap();
        assert_eq!(
            gate,
            GateConfig::StatusQuery {
                path: "api/marketStatus".into(),
                index: "NIFTY 50".into(),
            }
        );
        assert!(gate.window().unwrap().is_none());
    }

    #[test]
    fn rejects_duplicate_feed_keys_after_normalization() {
        let doubled = SAMPLE.replace("key = \"nifty\"", "key = \"NIFTYVOLUME\"");
        let err = load_config_str(&doubled).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate feed key"));
    }

    #[test]
    fn rejects_schema_without_time() {
        let broken = SAMPLE.replace(
            r#"columns = ["niftytotalTurnover", "niftydiff", "time"]"#,
            r#"columns = ["niftytotalTurnover", "niftydiff"]"#,
        );
        let err = load_config_str(&broken).unwrap_err();
        assert!(format!("{err:#}").contains("\"time\""));
    }

    #[test]
    fn rejects_inverted_window() {
        let inverted = SAMPLE.replace("open = \"09:15\"", "open = \"16:00\"");
        let err = load_config_str(&inverted).unwrap_err();
        assert!(format!("{err:#}").contains("must be earlier"));
    }

    #[test]
    fn rejects_diff_source_not_extracted() {
        let broken = SAMPLE.replace(
            r#"source = "niftytotalTurnover""#,
            r#"source = "niftyvolume""#,
        );
        assert!(load_config_str(&broken).is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_replace_root_and_retry_delay() {
        let (mut cfg, _) = load_config_str(SAMPLE).unwrap();
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/var/lib/series");
            std::env::set_var(RETRY_DELAY_ENV, "750");
        }
        let applied = apply_env_overrides(&mut cfg).unwrap();
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
            std::env::remove_var(RETRY_DELAY_ENV);
        }
        assert_eq!(applied, vec![DATA_DIR_ENV, RETRY_DELAY_ENV]);
        assert_eq!(cfg.storage.root, PathBuf::from("/var/lib/series"));
        assert_eq!(cfg.timing.retry_delay_ms, 750);

        let (mut cfg, _) = load_config_str(SAMPLE).unwrap();
        assert!(apply_env_overrides(&mut cfg).unwrap().is_empty());
        assert_eq!(cfg.storage.root, PathBuf::from("history"));
    }

    #[test]
    #[serial]
    fn bad_retry_delay_override_is_an_error() {
        let (mut cfg, _) = load_config_str(SAMPLE).unwrap();
        unsafe { std::env::set_var(RETRY_DELAY_ENV, "soon") };
        let result = apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var(RETRY_DELAY_ENV) };
        assert!(result.is_err());
    }
}
