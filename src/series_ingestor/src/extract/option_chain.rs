use serde_json::{Map, Value};

use super::{ExtractionFailure, json};
use crate::models::ExpiryFilter;

const DATA_KEY: &str = "data";
const EXPIRY_DATES_KEY: &str = "expiryDates";
const EXPIRY_KEY: &str = "expiryDate";
const CALL: &str = "CE";
const PUT: &str = "PE";

#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct ChainTotals {
    pub volume: i64,
    pub buy: i64,
    pub sell: i64,
}

pub(super) fn aggregate(
    root: &Map<String, Value>,
    expiries: ExpiryFilter,
) -> Result<ChainTotals, ExtractionFailure> {
    let allowed: Option<Vec<&str>> = match expiries {
        ExpiryFilter::All => None,
        ExpiryFilter::Nearest(n) => Some(
            json::required_array(root, EXPIRY_DATES_KEY)?
                .iter()
                .take(n)
                .filter_map(Value::as_str)
                .collect(),
        ),
    };

    let mut totals = ChainTotals::default();
    let mut contracts = 0usize;

    for (i, entry) in json::required_array(root, DATA_KEY)?.iter().enumerate() {
        let entry = json::as_object(entry, &format!("{DATA_KEY}[{i}]"))?;
        if let Some(allowed) = &allowed {
            let expiry = entry.get(EXPIRY_KEY).and_then(Value::as_str);
            if !expiry.is_some_and(|e| allowed.contains(&e)) {
                continue;
            }
        }
        if [CALL, PUT]
            .iter()
            .any(|side| entry.get(*side).is_some_and(Value::is_object))
        {
            contracts += 1;
        }

        let leg = |side: &str, field: &str| json::leg_int(entry, side, field);
        totals.volume = json::checked_sum(
            totals.volume,
            json::checked_sum(leg(CALL, "totalTradedVolume")?, leg(PUT, "totalTradedVolume")?, "volume")?,
            "volume",
        )?;
        totals.buy = json::checked_sum(
            totals.buy,
            json::checked_sum(leg(CALL, "totalBuyQuantity")?, leg(PUT, "totalSellQuantity")?, "buy")?,
            "buy",
        )?;
        totals.sell = json::checked_sum(
            totals.sell,
            json::checked_sum(leg(CALL, "totalSellQuantity")?, leg(PUT, "totalBuyQuantity")?, "sell")?,
            "sell",
        )?;
    }

    if contracts == 0 {
        return Err(ExtractionFailure::NoContracts);
    }
    Ok(totals)
}
