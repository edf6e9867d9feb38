//! Minute-resolution sample times, as stored in the `time` column.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

const MINUTE_FORMAT: &str = "%H:%M";

/// The `HH:MM` key of one row.
///
/// The raw text is kept as written so that rows coming back from disk
/// round-trip unchanged, even when a downstream tool left something
/// unparseable in the column. Surrounding whitespace is never significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleTime(String);

impl SampleTime {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the key as `HH:MM`. Anything else (including seconds) is `None`.
    pub fn parse(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.0, MINUTE_FORMAT).ok()
    }

    /// Chronological order with unparseable keys after every valid one.
    pub fn chronological(&self, other: &Self) -> Ordering {
        match (self.parse(), other.parse()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl From<NaiveTime> for SampleTime {
    fn from(t: NaiveTime) -> Self {
        Self(t.format(MINUTE_FORMAT).to_string())
    }
}

impl fmt::Display for SampleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
