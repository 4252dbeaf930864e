//! Two-level header flattening.
//!
//! Spreadsheet exports write a merged top cell once and leave the cells it
//! spans blank (or auto-labelled "Unnamed: N_level_0"). Forward-filling the
//! top label recovers the merge, and each column becomes
//! `"<top> | <sub>"`, or just `"<top>"` when it has no sub label.

use crate::constants::{FLAT_NAME_SEPARATOR, PLACEHOLDER_LABEL_PREFIX};
use crate::models::{HeaderPair, ReportTable, TwoLevelTable};
use crate::sequence::forward_fill;

/// Whether a header label is blank or an auto-generated placeholder
pub fn is_placeholder(label: &str) -> bool {
    let trimmed = label.trim();
    trimmed.is_empty()
        || trimmed
            .to_lowercase()
            .starts_with(PLACEHOLDER_LABEL_PREFIX)
}

/// Resolve one flat name per header pair
pub fn flatten_headers(headers: &[HeaderPair]) -> Vec<String> {
    let tops = forward_fill(
        headers.iter().map(|h| h.top.trim().to_string()),
        String::new(),
        |top| is_placeholder(top),
    );

    headers
        .iter()
        .zip(tops)
        .map(|(header, top)| {
            let sub = header.sub.trim();
            if is_placeholder(sub) {
                top
            } else {
                format!("{top}{FLAT_NAME_SEPARATOR}{sub}")
            }
        })
        .collect()
}

/// Collapse a two-level table into a flat one; rows are moved unchanged
pub fn flatten_table(table: TwoLevelTable) -> ReportTable {
    let columns = flatten_headers(&table.headers);
    ReportTable::new(columns, table.rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(labels: &[(&str, &str)]) -> Vec<HeaderPair> {
        labels.iter().map(|(t, s)| HeaderPair::new(*t, *s)).collect()
    }

    #[test]
    fn test_flatten_forward_fills_top_labels() {
        let headers = pairs(&[
            ("House Code", ""),
            ("Feed Used (Kg)", "Qty"),
            ("", "Type"),
            ("Unnamed: 3_level_0", "Qty"),
            ("MORTALITY", "Dead"),
            ("Unnamed: 5_level_0", "Unnamed: 5_level_1"),
        ]);

        assert_eq!(
            flatten_headers(&headers),
            vec![
                "House Code",
                "Feed Used (Kg) | Qty",
                "Feed Used (Kg) | Type",
                "Feed Used (Kg) | Qty",
                "MORTALITY | Dead",
                "MORTALITY",
            ]
        );
    }

    #[test]
    fn test_flatten_trims_labels() {
        let headers = pairs(&[("  Avg BW ", "  "), (" FCR", " Act ")]);
        assert_eq!(flatten_headers(&headers), vec!["Avg BW", "FCR | Act"]);
    }

    #[test]
    fn test_flatten_leading_placeholders_resolve_to_empty() {
        let headers = pairs(&[("Unnamed: 0_level_0", ""), ("", "Qty"), ("Batch ID", "")]);
        assert_eq!(flatten_headers(&headers), vec!["", " | Qty", "Batch ID"]);
    }

    #[test]
    fn test_flatten_names_non_empty_when_first_top_present() {
        let headers = pairs(&[("House Code", ""), ("", ""), ("UNNAMED: 2", ""), ("", "x")]);
        assert!(flatten_headers(&headers).iter().all(|n| !n.is_empty()));
    }

    #[test]
    fn test_flatten_idempotent_on_flat_header() {
        let headers = pairs(&[("Age Days", ""), ("FCR | Act", ""), ("Avg BW", "Unnamed: 2")]);
        let once = flatten_headers(&headers);
        assert_eq!(once, vec!["Age Days", "FCR | Act", "Avg BW"]);

        let again: Vec<HeaderPair> = once.iter().map(|n| HeaderPair::new(n.as_str(), "")).collect();
        assert_eq!(flatten_headers(&again), once);
    }

    #[test]
    fn test_flatten_tolerates_duplicates() {
        let headers = pairs(&[("Feed", "Qty"), ("", "Qty")]);
        assert_eq!(flatten_headers(&headers), vec!["Feed | Qty", "Feed | Qty"]);
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("Unnamed: 7_level_1"));
        assert!(!is_placeholder("Qty"));
    }
}
