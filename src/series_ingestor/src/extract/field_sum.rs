use serde_json::{Map, Value};

use super::{ExtractionFailure, json};

const DATA_KEY: &str = "data";

/// Sum `field` over every entry of `data`. An empty `data` is a failure, not zero.
pub(super) fn sum(
    root: &Map<String, Value>,
    field: &str,
    column: &str,
) -> Result<i64, ExtractionFailure> {
    let entries = json::required_array(root, DATA_KEY)?;
    if entries.is_empty() {
        return Err(ExtractionFailure::EmptyData(DATA_KEY.to_string()));
    }
    let mut total: i64 = 0;
    for (i, entry) in entries.iter().enumerate() {
        let entry = json::as_object(entry, &format!("{DATA_KEY}[{i}]"))?;
        let value = json::required(entry, field)
            .map_err(|_| ExtractionFailure::MissingField(format!("{DATA_KEY}[{i}].{field}")))?;
        let value = json::to_int(value, &format!("{DATA_KEY}[{i}].{field}"))?;
        total = json::checked_sum(total, value, column)?;
    }
    Ok(total)
}
