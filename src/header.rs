//! Report decoding and two-row header detection.
//!
//! Farm management exports prepend an arbitrary number of title rows before
//! the real table. The first row containing the header marker starts a
//! two-row header block; every row after the block is data. All cells stay as
//! text so thousands separators and blanks survive until coercion.

use crate::constants::HEADER_MARKER;
use crate::error::{BarnError, Result};
use crate::models::{HeaderPair, RawGrid, Row, TwoLevelTable};
use crate::sequence::first_satisfying;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Read and decode a report file into a two-level table
pub fn decode_report(file_path: &Path) -> Result<TwoLevelTable> {
    let grid = read_raw_grid(file_path)?;
    decode_grid(grid, file_path)
}

/// Read a report file into a raw grid of text cells
pub fn read_raw_grid(file_path: &Path) -> Result<RawGrid> {
    let file = File::open(file_path)?;
    read_raw_grid_from_reader(file)
}

/// Read comma-separated text into a raw grid; rows may be ragged
pub fn read_raw_grid_from_reader<R: Read>(reader: R) -> Result<RawGrid> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut grid = Vec::new();
    for record in csv_reader.byte_records() {
        let record = record?;
        // Exports are not always UTF-8; keep what we can rather than failing
        let row: Vec<String> = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).into_owned())
            .collect();
        grid.push(row);
    }

    if let Some(first) = grid.first_mut().and_then(|row| row.first_mut()) {
        if first.starts_with('\u{feff}') {
            *first = first.trim_start_matches('\u{feff}').to_string();
        }
    }

    Ok(grid)
}

/// Index of the first row with a cell containing `marker` (case-sensitive)
pub fn locate_header_row(grid: &RawGrid, marker: &str) -> Option<usize> {
    first_satisfying(grid.iter(), |row| {
        row.iter().any(|cell| cell.contains(marker))
    })
    .map(|(index, _)| index)
}

/// Split a raw grid into its two-row header and data rows
pub fn decode_grid(mut grid: RawGrid, source: &Path) -> Result<TwoLevelTable> {
    let header_row = locate_header_row(&grid, HEADER_MARKER)
        .ok_or_else(|| BarnError::missing_header_marker(source, HEADER_MARKER))?;

    let data = grid.split_off(header_row);
    let mut rows = data.into_iter();

    // locate_header_row guarantees the marker row exists
    let top_row = rows.next().unwrap_or_default();
    let sub_row = rows.next().unwrap_or_else(|| {
        warn!(
            "Header marker found on the last row of {}; sub labels will be empty",
            source.display()
        );
        Vec::new()
    });

    let width = top_row.len().max(sub_row.len());
    let headers = (0..width)
        .map(|i| {
            HeaderPair::new(
                top_row.get(i).cloned().unwrap_or_default(),
                sub_row.get(i).cloned().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>();

    let rows: Vec<Row> = rows.map(|raw| normalise_row(raw, width)).collect();

    debug!(
        "Decoded {}: header at row {}, {} columns, {} data rows",
        source.display(),
        header_row,
        width,
        rows.len()
    );

    Ok(TwoLevelTable {
        header_row,
        headers,
        rows,
    })
}

/// Pad or truncate a raw row to `width`, turning empty cells into `None`
fn normalise_row(raw: Vec<String>, width: usize) -> Row {
    let mut row: Row = raw
        .into_iter()
        .take(width)
        .map(|cell| if cell.is_empty() { None } else { Some(cell) })
        .collect();
    row.resize(width, None);
    row
}
