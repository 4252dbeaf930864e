//! Per-barn aggregation of the flattened report.
//!
//! The export lists each barn as one "main" row followed by sub-rows (one per
//! feed delivery, for instance) that leave the house code blank. Aggregation
//! forward-fills the code, drops header remnants and footer rows, sums every
//! feed quantity column per barn and reads the scalar fields from the first
//! row of each barn that carries a batch identifier.

use crate::constants::{
    ABSENT_INDEX_PLACEHOLDER, BARN_CODE_PATTERN, BATCH_ID_COLUMN, BATCH_ID_JUNK_VALUES,
    DEFAULT_AGE_DAYS, FEED_COLUMN_PREFIX, FEED_QTY_SEGMENT, HOUSE_CODE_COLUMN, columns,
};
use crate::error::{BarnError, Result};
use crate::models::{BarnSummary, Record, ReportTable};
use crate::sequence::{first_per_key, forward_fill};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Coerce a count cell: strip thousands separators and whitespace, default 0
pub fn to_int(value: Option<&str>) -> i64 {
    value
        .map(|v| v.replace(',', ""))
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Coerce a measurement cell: strip thousands separators and whitespace, default 0.0
pub fn to_float(value: Option<&str>) -> f64 {
    value
        .map(|v| v.replace(',', ""))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Whether a flat column name is one of the feed quantity columns
pub fn is_feed_quantity_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.starts_with(FEED_COLUMN_PREFIX) && lower.contains(FEED_QTY_SEGMENT)
}

fn is_blank(value: &Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Counters describing how the report rows were consumed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregationStats {
    /// Number of rows in the flattened table
    pub input_rows: usize,
    /// Repeated header rows dropped by code or batch value
    pub header_remnants: usize,
    /// Rows dropped because their code does not start with a digit
    pub invalid_codes: usize,
    /// Number of distinct barn codes kept
    pub barns: usize,
    /// Barns skipped because no row carries a batch identifier
    pub barns_without_main_row: usize,
}

/// Summaries in main-row order plus row accounting
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub summaries: Vec<BarnSummary>,
    pub stats: AggregationStats,
}

/// Column positions resolved once per table
#[derive(Debug)]
struct ColumnLayout {
    house_code: usize,
    batch_id: Option<usize>,
    feed: Vec<usize>,
    breed: Option<usize>,
    age_days: Option<usize>,
    chick_in: Option<usize>,
    mortality: Option<usize>,
    avg_body_weight: Option<usize>,
    fcr: Option<usize>,
    eef: Option<usize>,
}

impl ColumnLayout {
    fn resolve(table: &ReportTable) -> Result<Self> {
        let house_code = table
            .column_index(HOUSE_CODE_COLUMN)
            .ok_or_else(|| BarnError::missing_column(HOUSE_CODE_COLUMN))?;

        let feed = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| is_feed_quantity_column(name))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        Ok(Self {
            house_code,
            batch_id: table.column_index(BATCH_ID_COLUMN),
            feed,
            breed: table.column_index(columns::BREED),
            age_days: table.column_index(columns::AGE_DAYS),
            chick_in: table.column_index(columns::CHICK_IN),
            mortality: table
                .column_index(columns::MORTALITY_DEAD)
                .or_else(|| table.column_index(columns::MORTALITY)),
            avg_body_weight: table.column_index(columns::AVG_BODY_WEIGHT),
            fcr: table.column_index(columns::FCR_ACTUAL),
            eef: table.column_index(columns::EEF_ACTUAL),
        })
    }
}

/// A data row that survived filtering, with its inherited barn code
#[derive(Debug, Clone, Copy)]
struct BarnRow<'a> {
    code: &'a str,
    record: Record<'a>,
}

/// Builds barn summaries from a flattened report table
#[derive(Debug, Clone)]
pub struct BarnAggregator {
    code_pattern: Regex,
}

impl BarnAggregator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            code_pattern: Regex::new(BARN_CODE_PATTERN)?,
        })
    }

    /// Whether a house code identifies a real barn
    pub fn is_barn_code(&self, code: &str) -> bool {
        self.code_pattern.is_match(code)
    }

    pub fn aggregate(&self, table: &ReportTable) -> Result<AggregationResult> {
        let layout = ColumnLayout::resolve(table)?;
        let mut stats = AggregationStats {
            input_rows: table.row_count(),
            ..Default::default()
        };

        if layout.batch_id.is_none() {
            warn!("Report has no '{}' column; no barn will have a main row", BATCH_ID_COLUMN);
        }
        if layout.feed.is_empty() {
            warn!("Report has no feed quantity columns; feed totals will be zero");
        }
        debug!("Found {} feed quantity columns", layout.feed.len());

        let codes = forward_fill(
            table.records().map(|r| r.at(layout.house_code)),
            None,
            is_blank,
        );

        let mut rows = Vec::with_capacity(codes.len());
        for (record, code) in table.records().zip(codes) {
            let Some(code) = code else {
                stats.invalid_codes += 1;
                continue;
            };

            let batch = layout.batch_id.and_then(|i| record.at(i)).map(str::trim);
            if code == HOUSE_CODE_COLUMN
                || batch.is_some_and(|b| BATCH_ID_JUNK_VALUES.contains(&b))
            {
                stats.header_remnants += 1;
                continue;
            }

            if !self.is_barn_code(code) {
                stats.invalid_codes += 1;
                continue;
            }

            rows.push(BarnRow {
                code: code.trim(),
                record,
            });
        }

        let totals = feed_totals(&rows, &layout.feed);
        stats.barns = totals.len();

        let main_rows = first_per_key(
            rows.iter().copied(),
            |row| row.code,
            |row| !is_blank(&layout.batch_id.and_then(|i| row.record.at(i))),
        );
        stats.barns_without_main_row = stats.barns - main_rows.len();

        let summaries = main_rows
            .into_iter()
            .map(|row| {
                let feed_total = totals.get(row.code).copied().unwrap_or(0);
                summarise(&layout, row, feed_total)
            })
            .collect::<Vec<_>>();

        debug!(
            "Aggregated {} rows into {} barns ({} summarised, {} header remnants, {} invalid codes)",
            stats.input_rows,
            stats.barns,
            summaries.len(),
            stats.header_remnants,
            stats.invalid_codes
        );

        Ok(AggregationResult { summaries, stats })
    }
}

/// Sum every feed quantity column over every row of each barn
///
/// Sums saturate at the `i64` bounds instead of overflowing.
fn feed_totals<'a>(rows: &[BarnRow<'a>], feed_columns: &[usize]) -> HashMap<&'a str, i64> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for row in rows {
        let row_total = feed_columns
            .iter()
            .map(|&i| to_int(row.record.at(i)))
            .fold(0i64, i64::saturating_add);
        let total = totals.entry(row.code).or_insert(0);
        *total = total.saturating_add(row_total);
    }
    totals
}

fn text_or(record: &Record<'_>, index: Option<usize>, default: &str) -> String {
    index
        .and_then(|i| record.at(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn summarise(layout: &ColumnLayout, row: BarnRow<'_>, feed_total_kg: i64) -> BarnSummary {
    let record = &row.record;
    let field = |index: Option<usize>| index.and_then(|i| record.at(i));

    let chick_in = to_int(field(layout.chick_in));
    let mortality = to_int(field(layout.mortality));
    let mortality_pct = if chick_in != 0 {
        mortality as f64 / chick_in as f64 * 100.0
    } else {
        0.0
    };

    BarnSummary {
        code: row.code.to_string(),
        breed: text_or(record, layout.breed, ""),
        age_days: text_or(record, layout.age_days, DEFAULT_AGE_DAYS),
        chick_in,
        mortality,
        live_birds: chick_in.saturating_sub(mortality),
        mortality_pct,
        feed_total_kg,
        avg_body_weight_kg: to_float(field(layout.avg_body_weight)) / 1000.0,
        fcr: text_or(record, layout.fcr, ABSENT_INDEX_PLACEHOLDER),
        eef: text_or(record, layout.eef, ABSENT_INDEX_PLACEHOLDER),
    }
}
