//! Core data structures for barn report processing.
//!
//! Defines the raw and decoded report tables, per-barn summaries and the
//! statistics reported at the end of a run.

use serde::{Deserialize, Serialize};

/// Raw character grid read from the report file, rows of text cells
pub type RawGrid = Vec<Vec<String>>;

/// Data row cells; `None` where the export left a cell empty or missing
pub type Row = Vec<Option<String>>;

/// Top and sub label for one column of the two-row header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPair {
    pub top: String,
    pub sub: String,
}

impl HeaderPair {
    pub fn new(top: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            top: top.into(),
            sub: sub.into(),
        }
    }
}

/// Report decoded with its two-level header still intact
#[derive(Debug, Clone)]
pub struct TwoLevelTable {
    /// Index of the first header row within the raw grid
    pub header_row: usize,
    pub headers: Vec<HeaderPair>,
    pub rows: Vec<Row>,
}

/// Report with single flat column names
///
/// Duplicate column names are allowed; lookups resolve to the first column
/// carrying the exact name.
#[derive(Debug, Clone, Default)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ReportTable {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Index of the first column named exactly `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate rows as borrowed records
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record { values })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One flattened data row, addressed by column position
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    values: &'a [Option<String>],
}

impl<'a> Record<'a> {
    /// Raw text at a column position
    pub fn at(&self, index: usize) -> Option<&'a str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }
}

/// Derived performance summary for one barn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarnSummary {
    pub code: String,
    pub breed: String,
    pub age_days: String,
    pub chick_in: i64,
    pub mortality: i64,
    /// Chick-in minus mortality; negative values are passed through
    pub live_birds: i64,
    pub mortality_pct: f64,
    pub feed_total_kg: i64,
    pub avg_body_weight_kg: f64,
    pub fcr: String,
    pub eef: String,
}

/// Statistics for one report run
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    /// Number of data rows below the header
    pub data_rows: usize,
    /// Number of barns with a summary block
    pub barns_summarised: usize,
    /// Number of message chunks built from the blocks
    pub chunks: usize,
    /// Subscribers registered when the broadcast started
    pub subscribers: usize,
    /// Chunk deliveries that reached a subscriber
    pub deliveries_succeeded: usize,
    /// Chunk deliveries that failed, after any retry
    pub deliveries_failed: usize,
    /// Total processing time in milliseconds
    pub processing_time_ms: u128,
}
