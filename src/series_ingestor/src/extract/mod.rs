//! Record extraction: turns one parsed upstream payload into an
//! [`Observation`] or a typed [`ExtractionFailure`].
//!
//! Extraction never produces a partial row. Either every configured column
//! gets a value or the sample is rejected.

mod field_sum;
mod json;
mod option_chain;
mod strike;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Envelope, ExtractSpec, Feed, Observation, SampleTime};

const RECORDS_KEY: &str = "records";
const TIMESTAMP_KEY: &str = "timestamp";
const STATUS_KEY: &str = "marketStatus";
const STATUS_FIELD: &str = "marketOpenOrClose";
const OPEN_STATUS: &str = "Open";
const TIMESTAMP_DATE_FORMAT: &str = "%d-%b-%Y";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing field {0:?}")]
    MissingField(String),

    #[error("field {field:?} has unexpected type {found}")]
    WrongType { field: String, found: &'static str },

    #[error("unusable timestamp {0:?}")]
    BadTimestamp(String),

    #[error("sample dated {found}, expected {expected}")]
    StaleDate { found: NaiveDate, expected: NaiveDate },

    #[error("payload reports market status {0:?}")]
    MarketNotOpen(String),

    #[error("no option contracts in the selected expiries")]
    NoContracts,

    #[error("array {0:?} has no entries")]
    EmptyData(String),

    #[error("strike {strike} expiring {expiry} not found")]
    StrikeNotFound { strike: String, expiry: String },

    #[error("negative value {value} for column {column:?}")]
    NegativeValue { column: String, value: i64 },

    #[error("integer overflow in {0:?}")]
    Overflow(String),
}

/// Parse a response body into a JSON object.
pub fn parse_record(body: &str) -> Result<Value, ExtractionFailure> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ExtractionFailure::MalformedJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ExtractionFailure::MalformedJson(format!(
            "top level is {}, expected object",
            json::kind(&value)
        )));
    }
    Ok(value)
}

/// [`parse_record`] followed by [`extract`].
pub fn extract_body(
    body: &str,
    feed: &Feed,
    trading_day: NaiveDate,
) -> Result<Observation, ExtractionFailure> {
    let record = parse_record(body)?;
    extract(&record, feed, trading_day)
}

/// Extract one observation for `feed` from a parsed payload.
pub fn extract(
    record: &Value,
    feed: &Feed,
    trading_day: NaiveDate,
) -> Result<Observation, ExtractionFailure> {
    let top = json::as_object(record, "$")?;

    if feed.require_open_status {
        check_embedded_status(top)?;
    }

    let root = match feed.envelope {
        Envelope::Bare => top,
        Envelope::Records => json::as_object(json::required(top, RECORDS_KEY)?, RECORDS_KEY)?,
    };

    let time = sample_time(json::required_str(root, TIMESTAMP_KEY)?, trading_day)?;
    let mut observation = Observation::new(time);

    match &feed.extract {
        ExtractSpec::OptionChain {
            expiries,
            volume,
            buy,
            sell,
        } => {
            let totals = option_chain::aggregate(root, *expiries)?;
            observation.insert(volume.as_str(), totals.volume);
            observation.insert(buy.as_str(), totals.buy);
            observation.insert(sell.as_str(), totals.sell);
        }
        ExtractSpec::FieldSum { field, column } => {
            observation.insert(column.as_str(), field_sum::sum(root, field, column)?);
        }
        ExtractSpec::Strike {
            strike,
            expiry,
            ce_volume,
            pe_volume,
            ce_oi,
            pe_oi,
        } => {
            let snap = strike::snapshot(root, *strike, expiry)?;
            observation.insert(ce_volume.as_str(), snap.ce_volume);
            observation.insert(pe_volume.as_str(), snap.pe_volume);
            observation.insert(ce_oi.as_str(), snap.ce_oi);
            observation.insert(pe_oi.as_str(), snap.pe_oi);
        }
    }

    if let Some((column, value)) = observation.first_negative() {
        return Err(ExtractionFailure::NegativeValue {
            column: column.to_string(),
            value,
        });
    }
    Ok(observation)
}

/// `"19-Oct-2026 15:30:00"` -> `15:30`, after checking the date part.
fn sample_time(timestamp: &str, trading_day: NaiveDate) -> Result<SampleTime, ExtractionFailure> {
    let bad = || ExtractionFailure::BadTimestamp(timestamp.to_string());

    let date_part = timestamp.split(' ').next().ok_or_else(bad)?;
    let date = NaiveDate::parse_from_str(date_part, TIMESTAMP_DATE_FORMAT).map_err(|_| bad())?;
    if date != trading_day {
        return Err(ExtractionFailure::StaleDate {
            found: date,
            expected: trading_day,
        });
    }

    let time = SampleTime::new(timestamp.get(12..17).ok_or_else(bad)?);
    if time.parse().is_none() {
        return Err(bad());
    }
    Ok(time)
}

fn check_embedded_status(top: &Map<String, Value>) -> Result<(), ExtractionFailure> {
    let status = json::as_object(json::required(top, STATUS_KEY)?, STATUS_KEY)?;
    let state = json::required_str(status, STATUS_FIELD)?;
    if state.trim() != OPEN_STATUS {
        return Err(ExtractionFailure::MarketNotOpen(state.to_string()));
    }
    Ok(())
}
