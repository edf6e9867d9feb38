use serde_json::{Map, Value};

use super::{ExtractionFailure, json};

const DATA_KEY: &str = "data";
const STRIKE_KEY: &str = "strikePrice";
const EXPIRY_KEY: &str = "expiryDate";

/// Call/put activity at one strike.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct StrikeSnapshot {
    pub ce_volume: i64,
    pub pe_volume: i64,
    pub ce_oi: i64,
    pub pe_oi: i64,
}

/// Find the entry for `strike` on `expiry` and read both legs.
///
/// A matching entry with neither a `CE` nor a `PE` leg counts as no contracts.
pub(super) fn snapshot(
    root: &Map<String, Value>,
    strike: f64,
    expiry: &str,
) -> Result<StrikeSnapshot, ExtractionFailure> {
    for (i, entry) in json::required_array(root, DATA_KEY)?.iter().enumerate() {
        let entry = json::as_object(entry, &format!("{DATA_KEY}[{i}]"))?;
        let same_expiry = entry
            .get(EXPIRY_KEY)
            .and_then(Value::as_str)
            .is_some_and(|e| e.trim() == expiry);
        let same_strike = entry
            .get(STRIKE_KEY)
            .and_then(strike_of)
            .is_some_and(|s| (s - strike).abs() < 1e-6);
        if !(same_expiry && same_strike) {
            continue;
        }
        if !["CE", "PE"].iter().any(|leg| entry.get(*leg).is_some_and(Value::is_object)) {
            return Err(ExtractionFailure::NoContracts);
        }
        return Ok(StrikeSnapshot {
            ce_volume: json::leg_int(entry, "CE", "totalTradedVolume")?,
            pe_volume: json::leg_int(entry, "PE", "totalTradedVolume")?,
            ce_oi: json::leg_int(entry, "CE", "openInterest")?,
            pe_oi: json::leg_int(entry, "PE", "openInterest")?,
        });
    }
    Err(ExtractionFailure::StrikeNotFound {
        strike: strike.to_string(),
        expiry: expiry.to_string(),
    })
}

fn strike_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
