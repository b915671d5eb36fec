//! Historical household consumption keyed by time of day.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

const SECONDS_PER_DAY: u32 = 86_400;

/// Failure to load a consumption table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot read consumption table: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed consumption table: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: invalid time of day \"{value}\"")]
    InvalidTime { row: usize, value: String },
    #[error("row {row}: invalid consumption value \"{value}\"")]
    InvalidValue { row: usize, value: String },
}

/// Consumption values indexed by second of day.
///
/// Loaded from a two-column table with a header row: time of day
/// (`HH:MM:SS` or `HH:MM`) and consumption. The date part of a query is
/// ignored; the nearest tabulated time of day answers, wrapping at midnight.
/// An empty table answers 0.0 everywhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionTable {
    entries: Vec<(u32, f64)>,
}

impl ConsumptionTable {
    /// Reads a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns a `TableError` if the file cannot be opened or a row is malformed.
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads a table from any CSV source.
    ///
    /// # Errors
    ///
    /// Returns a `TableError` on CSV syntax errors or unparsable cells.
    pub fn from_reader(reader: impl Read) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let row = i + 2; // 1-based, after the header
            let time = record.get(0).unwrap_or_default();
            let value = record.get(1).unwrap_or_default();

            let second = parse_time_of_day(time).ok_or_else(|| TableError::InvalidTime {
                row,
                value: time.to_string(),
            })?;
            let value: f64 = value.parse().map_err(|_| TableError::InvalidValue {
                row,
                value: value.to_string(),
            })?;
            entries.push((second, value));
        }

        Ok(Self::from_entries(entries))
    }

    /// Builds a table from `(second_of_day, value)` pairs. Later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut entries: Vec<(u32, f64)> = entries
            .into_iter()
            .map(|(s, v)| (s % SECONDS_PER_DAY, v))
            .collect();
        entries.reverse();
        entries.sort_by_key(|(s, _)| *s);
        entries.dedup_by_key(|(s, _)| *s);
        Self { entries }
    }

    /// Number of tabulated times of day.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumption at the tabulated time of day nearest to `at`.
    pub fn lookup(&self, at: NaiveTime) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }

        let second = at.num_seconds_from_midnight();
        let idx = self.entries.partition_point(|(s, _)| *s < second);
        let after = self.entries.get(idx).unwrap_or(&self.entries[0]);
        let before = if idx == 0 {
            &self.entries[self.entries.len() - 1]
        } else {
            &self.entries[idx - 1]
        };

        if circular_distance(after.0, second) <= circular_distance(before.0, second) {
            after.1
        } else {
            before.1
        }
    }
}

fn parse_time_of_day(s: &str) -> Option<u32> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
        .map(|t| t.num_seconds_from_midnight())
}

fn circular_distance(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b);
    d.min(SECONDS_PER_DAY - d)
}
