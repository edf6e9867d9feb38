//! Durable per-feed, per-day series files.
//!
//! Layout: `<root>/<feed key>/<YYYY-MM-DD>.csv`, comma-delimited, header equal
//! to the feed's column list.
//!
//! Every successful write leaves the file with unique `time` keys, rows in
//! ascending clock order (unparseable times last) and no negative extracted
//! metric. Derived diff columns are exempt: a falling source gives a negative
//! `previous_row` diff.
//! Writes go through a temp file in the same directory followed by a rename,
//! so readers never observe a half-written table.

pub mod diff;
pub mod table;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use snafu::{ResultExt, Snafu};
use tracing::debug;

pub use table::{SeriesRow, SeriesTable};

use crate::models::{DiffStrategy, Feed, Observation, SampleTime, TIME_COLUMN};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("CSV error in {}: {source}", path.display()))]
    Csv { path: PathBuf, source: csv::Error },

    #[snafu(display("{} has no {TIME_COLUMN:?} column", path.display()))]
    MissingTimeColumn { path: PathBuf },

    #[snafu(display("Failed to replace {}: {source}", path.display()))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

/// A fully prepared table waiting to be persisted.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    pub path: PathBuf,
    pub time: SampleTime,
    /// Rows dropped because they shared the incoming `time`.
    pub replaced: usize,
    pub table: SeriesTable,
}

/// Decision taken by [`SeriesStore::stage`].
#[derive(Debug, Clone)]
pub enum Staged {
    Ready(StagedWrite),
    DuplicateRejected,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written { rows: usize },
    DuplicateRejected,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, feed: &Feed, day: NaiveDate) -> PathBuf {
        self.root
            .join(&feed.key)
            .join(format!("{}.csv", day.format("%Y-%m-%d")))
    }

    pub fn exists(&self, feed: &Feed, day: NaiveDate) -> bool {
        self.path(feed, day).is_file()
    }

    /// Create the feed directory and a header-only file. Returns `true` when
    /// a new file was created.
    pub fn create_if_absent(&self, feed: &Feed, day: NaiveDate) -> Result<bool, StoreError> {
        let path = self.path(feed, day);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).context(IoSnafu { path: dir })?;
        }
        let created = SeriesTable::write_header_new(&path, &feed.columns)?;
        if created {
            debug!(feed = %feed.key, path = %path.display(), "created series file");
        }
        Ok(created)
    }

    pub fn load(&self, feed: &Feed, day: NaiveDate) -> Result<SeriesTable, StoreError> {
        SeriesTable::read_from(&self.path(feed, day), &feed.columns)
    }

    /// Decide what an upsert of `observation` would do, without writing.
    pub fn stage(
        &self,
        feed: &Feed,
        day: NaiveDate,
        observation: &Observation,
    ) -> Result<Staged, StoreError> {
        self.create_if_absent(feed, day)?;
        let path = self.path(feed, day);
        let mut table = SeriesTable::read_from(&path, &feed.columns)?;

        let Some(primary) = observation.metric(&feed.primary) else {
            return Ok(Staged::Invalid(format!(
                "observation has no value for primary column {:?}",
                feed.primary
            )));
        };
        if table.contains_value(&feed.primary, primary) {
            return Ok(Staged::DuplicateRejected);
        }

        if let Some((column, value)) = observation.first_negative() {
            return Ok(Staged::Invalid(format!("negative {column} = {value}")));
        }
        if let Some(column) = observation
            .metrics
            .keys()
            .find(|c| c.as_str() == TIME_COLUMN || !table.has_column(c))
        {
            return Ok(Staged::Invalid(format!(
                "column {column:?} is not a metric column of {}",
                path.display()
            )));
        }

        let replaced = table.remove_time(&observation.time);

        let mut cells: IndexMap<String, String> = IndexMap::new();
        for column in table.columns().iter().filter(|c| *c != TIME_COLUMN) {
            let cell = observation
                .metric(column)
                .map(|v| v.to_string())
                .unwrap_or_default();
            cells.insert(column.clone(), cell);
        }

        if feed.diff_strategy == DiffStrategy::ZeroGated {
            for d in &feed.diffs {
                match diff::zero_gated(&table, d, observation) {
                    Ok(v) => {
                        cells.insert(d.column.clone(), v.to_string());
                    }
                    Err(reason) => return Ok(Staged::Invalid(reason)),
                }
            }
        }

        table.push(SeriesRow {
            time: observation.time.clone(),
            cells,
        });
        table.sort();

        if feed.diff_strategy == DiffStrategy::PreviousRow {
            diff::rederive_previous_row(&mut table, &feed.diffs);
        }

        Ok(Staged::Ready(StagedWrite {
            path,
            time: observation.time.clone(),
            replaced,
            table,
        }))
    }

    /// Persist a staged table. Returns the number of rows written.
    pub fn commit(&self, staged: StagedWrite) -> Result<usize, StoreError> {
        staged.table.write_to(&staged.path)?;
        debug!(
            path = %staged.path.display(),
            time = %staged.time,
            replaced = staged.replaced,
            rows = staged.table.len(),
            "series file rewritten"
        );
        Ok(staged.table.len())
    }

    /// [`stage`](Self::stage) followed by [`commit`](Self::commit).
    pub fn upsert(
        &self,
        feed: &Feed,
        day: NaiveDate,
        observation: &Observation,
    ) -> Result<UpsertOutcome, StoreError> {
        Ok(match self.stage(feed, day, observation)? {
            Staged::Ready(write) => UpsertOutcome::Written {
                rows: self.commit(write)?,
            },
            Staged::DuplicateRejected => UpsertOutcome::DuplicateRejected,
            Staged::Invalid(reason) => UpsertOutcome::Invalid(reason),
        })
    }
}
