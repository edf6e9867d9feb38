//! Derived difference columns.

use super::table::SeriesTable;
use crate::models::{DiffColumn, Observation};

/// Recompute every diff cell against the chronologically preceding row.
///
/// Expects a sorted table. The first row, and any row whose predecessor has
/// no numeric source value, gets 0. A row without a numeric source value
/// gets an empty cell. Diffs may be negative.
pub fn rederive_previous_row(table: &mut SeriesTable, diffs: &[DiffColumn]) {
    for diff in diffs {
        let mut previous: Option<i64> = None;
        for row in table.rows_mut() {
            let current = row.value(&diff.source);
            let cell = match (current, previous) {
                (Some(c), Some(p)) => c.saturating_sub(p).to_string(),
                (Some(_), None) => "0".to_string(),
                (None, _) => String::new(),
            };
            row.cells.insert(diff.column.clone(), cell);
            previous = current;
        }
    }
}

/// Legacy diff rule for one incoming observation.
///
/// While the diff column holds no 0 yet, the diff is 0. Once it does, the diff
/// is taken against the last stored row and must not be negative.
pub fn zero_gated(
    table: &SeriesTable,
    diff: &DiffColumn,
    observation: &Observation,
) -> Result<i64, String> {
    let armed = table
        .rows()
        .iter()
        .any(|r| r.value(&diff.column) == Some(0));
    if !armed {
        return Ok(0);
    }

    let current = observation
        .metric(&diff.source)
        .ok_or_else(|| format!("observation has no value for {:?}", diff.source))?;
    let Some(last) = table.last() else {
        return Ok(0);
    };
    let previous = last.value(&diff.source).ok_or_else(|| {
        format!(
            "row {} has no numeric value for {:?}",
            last.time, diff.source
        )
    })?;

    let value = current.saturating_sub(previous);
    if value < 0 {
        return Err(format!(
            "{} would be negative ({current} - {previous})",
            diff.column
        ));
    }
    Ok(value)
}
