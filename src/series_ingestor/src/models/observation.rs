//! One extracted row, ready for the series store.

use indexmap::IndexMap;

use crate::models::sample_time::SampleTime;

/// A time-keyed set of metric values produced by the extractor.
///
/// Metric order follows insertion order, which the extractor keeps aligned
/// with the feed's configured columns. Derived diff values are not part of an
/// observation; the store computes them against what is already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub time: SampleTime,
    pub metrics: IndexMap<String, i64>,
}

impl Observation {
    pub fn new(time: SampleTime) -> Self {
        Self {
            time,
            metrics: IndexMap::new(),
        }
    }

    /// Builder-style insert, handy in tests and fixtures.
    pub fn with_metric(mut self, column: impl Into<String>, value: i64) -> Self {
        self.metrics.insert(column.into(), value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: i64) {
        self.metrics.insert(column.into(), value);
    }

    pub fn metric(&self, column: &str) -> Option<i64> {
        self.metrics.get(column).copied()
    }

    /// First metric below zero, if any.
    pub fn first_negative(&self) -> Option<(&str, i64)> {
        self.metrics
            .iter()
            .find(|(_, v)| **v < 0)
            .map(|(k, v)| (k.as_str(), *v))
    }
}
