//! In-memory view of one day's series file.

use std::{cmp::Ordering, fs, io::Write, path::Path};

use indexmap::IndexMap;
use snafu::{OptionExt, ResultExt};
use tempfile::NamedTempFile;

use super::{
    CsvSnafu, IoSnafu, MissingTimeColumnSnafu, PersistSnafu, StoreError,
};
use crate::models::{SampleTime, TIME_COLUMN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRow {
    pub time: SampleTime,
    /// Every non-time column, keyed by header name. Values are kept verbatim.
    pub cells: IndexMap<String, String>,
}

impl SeriesRow {
    /// Numeric value of `column`, accepting `1500` and `1500.0`.
    pub fn value(&self, column: &str) -> Option<i64> {
        let raw = self.cells.get(column)?.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Some(i);
        }
        let f = raw.parse::<f64>().ok()?;
        (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
    }
}

/// Header plus rows of one series file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesTable {
    columns: Vec<String>,
    rows: Vec<SeriesRow>,
}

impl SeriesTable {
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [SeriesRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&SeriesRow> {
        self.rows.last()
    }

    pub fn times(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.time.as_str())
    }

    pub fn contains_value(&self, column: &str, value: i64) -> bool {
        self.rows.iter().any(|r| r.value(column) == Some(value))
    }

    /// Drop every row keyed by `time`. Returns how many were removed.
    pub fn remove_time(&mut self, time: &SampleTime) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| r.time != *time);
        before - self.rows.len()
    }

    pub fn push(&mut self, row: SeriesRow) {
        self.rows.push(row);
    }

    /// Stable sort by clock time; unparseable times go last.
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| a.time.chronological(&b.time));
    }

    pub fn is_sorted(&self) -> bool {
        self.rows
            .windows(2)
            .all(|w| w[0].time.chronological(&w[1].time) != Ordering::Greater)
    }

    /// Read a series file. An empty file gets `fallback` as its header.
    pub fn read_from(path: &Path, fallback: &[String]) -> Result<Self, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .context(CsvSnafu { path })?;

        let header = reader.headers().context(CsvSnafu { path })?.clone();
        let columns: Vec<String> = if header.is_empty() {
            fallback.to_vec()
        } else {
            header.iter().map(str::to_string).collect()
        };
        let time_idx = columns
            .iter()
            .position(|c| c == TIME_COLUMN)
            .context(MissingTimeColumnSnafu { path })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context(CsvSnafu { path })?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let time = SampleTime::new(record.get(time_idx).unwrap_or_default());
            let cells = columns
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != time_idx)
                .map(|(i, c)| (c.clone(), record.get(i).unwrap_or_default().to_string()))
                .collect();
            rows.push(SeriesRow { time, cells });
        }

        Ok(Self { columns, rows })
    }

    /// Rewrite `path` with this table through a temp file in the same directory.
    pub fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).context(IoSnafu { path: dir })?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            writer
                .write_record(&self.columns)
                .context(CsvSnafu { path })?;
            for row in &self.rows {
                writer
                    .write_record(self.columns.iter().map(|c| {
                        if c == TIME_COLUMN {
                            row.time.as_str()
                        } else {
                            row.cells.get(c).map(String::as_str).unwrap_or_default()
                        }
                    }))
                    .context(CsvSnafu { path })?;
            }
            writer.flush().context(IoSnafu { path })?;
        }
        tmp.as_file_mut().flush().context(IoSnafu { path })?;
        tmp.as_file().sync_all().context(IoSnafu { path })?;
        tmp.persist(path).context(PersistSnafu { path })?;
        Ok(())
    }

    /// Write only the header to a brand-new file. Fails if `path` exists.
    pub(crate) fn write_header_new(path: &Path, columns: &[String]) -> Result<bool, StoreError> {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", columns.join(",")).context(IoSnafu { path })?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).context(IoSnafu { path }),
        }
    }
}
