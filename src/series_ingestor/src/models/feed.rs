//! Feed definitions: which endpoint to poll, how to read it, and where the
//! numbers land.
//!
//! A [`Feed`] is built once from configuration (see [`crate::config`]) and is
//! never mutated after the orchestrator starts. Everything a poll loop needs to
//! know about its upstream, its extraction rules and its file schema lives
//! here.

use serde::{Deserialize, Serialize};

/// Name of the key column every series file carries.
pub const TIME_COLUMN: &str = "time";

/// Default number of nearest expiries kept by the option-chain aggregation.
pub const DEFAULT_NEAREST_EXPIRIES: usize = 10;

/// How the interesting part of the payload is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    /// `timestamp` and `data` sit at the top level.
    #[default]
    Bare,
    /// Everything is nested under a `records` object (option-chain endpoints).
    Records,
}

/// Which expiries contribute to an option-chain aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryFilter {
    /// Every entry, regardless of expiry.
    All,
    /// Only the first N dates of the record's own `expiryDates` list.
    Nearest(usize),
}

impl Default for ExpiryFilter {
    fn default() -> Self {
        Self::Nearest(DEFAULT_NEAREST_EXPIRIES)
    }
}

/// Extraction rule plus the columns it writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractSpec {
    /// Sum call/put traded volume and order-book pressure over the filtered
    /// option chain.
    ///
    /// Buy pressure pairs call buyers with put sellers, sell pressure pairs
    /// call sellers with put buyers.
    OptionChain {
        #[serde(default)]
        expiries: ExpiryFilter,
        volume: String,
        buy: String,
        sell: String,
    },
    /// Sum one integer field over every entry in `data`.
    FieldSum { field: String, column: String },
    /// Call/put volume and open interest of one strike on one expiry.
    Strike {
        strike: f64,
        expiry: String,
        ce_volume: String,
        pe_volume: String,
        ce_oi: String,
        pe_oi: String,
    },
}

impl ExtractSpec {
    /// Columns this rule fills, in the order it fills them.
    pub fn output_columns(&self) -> Vec<&str> {
        match self {
            Self::OptionChain {
                volume, buy, sell, ..
            } => vec![volume.as_str(), buy.as_str(), sell.as_str()],
            Self::FieldSum { column, .. } => vec![column.as_str()],
            Self::Strike {
                ce_volume,
                pe_volume,
                ce_oi,
                pe_oi,
                ..
            } => vec![
                ce_volume.as_str(),
                pe_volume.as_str(),
                ce_oi.as_str(),
                pe_oi.as_str(),
            ],
        }
    }
}

/// How derived diff columns are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStrategy {
    /// Difference against the chronologically preceding row; the first row is 0.
    #[default]
    PreviousRow,
    /// Legacy rule: stay at 0 until a 0 is already present in the diff column,
    /// then diff against the last stored row and reject samples that would go
    /// negative.
    ZeroGated,
}

/// A derived column: `column = source(current) - source(previous)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffColumn {
    pub column: String,
    pub source: String,
}

/// One independently polled (endpoint, symbol, schema) unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Feed {
    /// Symbol key. Also the name of the per-feed storage directory.
    pub key: String,
    /// Endpoint path relative to the upstream base URL, query included.
    pub path: String,
    #[serde(default)]
    pub envelope: Envelope,
    /// File header, in order. Must contain [`TIME_COLUMN`].
    pub columns: Vec<String>,
    /// Column checked by the duplicate-value guard.
    pub primary: String,
    pub extract: ExtractSpec,
    #[serde(default)]
    pub diffs: Vec<DiffColumn>,
    #[serde(default)]
    pub diff_strategy: DiffStrategy,
    /// Skip samples whose payload says `marketStatus.marketOpenOrClose != "Open"`.
    #[serde(default)]
    pub require_open_status: bool,
    /// Delay before the first poll, used to stagger workers.
    #[serde(default)]
    pub initial_delay_ms: u64,
}

impl Feed {
    /// Header line as written to a fresh file.
    pub fn header(&self) -> String {
        self.columns.join(",")
    }

    pub fn is_diff_column(&self, column: &str) -> bool {
        self.diffs.iter().any(|d| d.column == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_option_chain_feed_with_defaults() {
        let toml_str = r#"
            key = "niftyvolume"
            path = "api/option-chain-indices?symbol=NIFTY"
            envelope = "records"
            columns = ["niftyvolume", "niftybuyorders", "niftysellorders", "time"]
            primary = "niftyvolume"
            [extract]
            mode = "option_chain"
            volume = "niftyvolume"
            buy = "niftybuyorders"
            sell = "niftysellorders"
        "#;
        let feed: Feed = toml::from_str(toml_str).unwrap();
        assert_eq!(feed.envelope, Envelope::Records);
        assert_eq!(feed.diff_strategy, DiffStrategy::PreviousRow);
        assert!(feed.diffs.is_empty());
        match &feed.extract {
            ExtractSpec::OptionChain { expiries, .. } => {
                assert_eq!(*expiries, ExpiryFilter::Nearest(10));
            }
            other => panic!("unexpected extract spec {other:?}"),
        }
        assert_eq!(
            feed.header(),
            "niftyvolume,niftybuyorders,niftysellorders,time"
        );
    }

    #[test]
    fn parses_turnover_feed_with_zero_gated_diff() {
        let toml_str = r#"
            key = "nifty"
            path = "api/liveEquity-derivatives?index=nse50_opt"
            columns = ["niftytotalTurnover", "niftydiff", "time"]
            primary = "niftytotalTurnover"
            diff_strategy = "zero_gated"
            require_open_status = true
            diffs = [{ column = "niftydiff", source = "niftytotalTurnover" }]
            [extract]
            mode = "field_sum"
            field = "totalTurnover"
            column = "niftytotalTurnover"
        "#;
        let feed: Feed = toml::from_str(toml_str).unwrap();
        assert_eq!(feed.diff_strategy, DiffStrategy::ZeroGated);
        assert!(feed.require_open_status);
        assert!(feed.is_diff_column("niftydiff"));
        assert!(!feed.is_diff_column("niftytotalTurnover"));
        assert_eq!(feed.extract.output_columns(), vec!["niftytotalTurnover"]);
    }

    #[test]
    fn all_expiries_is_a_plain_string() {
        let spec: ExtractSpec = toml::from_str(
            r#"
            mode = "option_chain"
            expiries = "all"
            volume = "v"
            buy = "b"
            sell = "s"
        "#,
        )
        .unwrap();
        assert!(matches!(
            spec,
            ExtractSpec::OptionChain {
                expiries: ExpiryFilter::All,
                ..
            }
        ));
    }
}
