//! Row ordering against the master sequence.

use crate::record::{normalize_code, ExtractedRow};
use std::collections::HashMap;

/// Map normalized code → position. A code listed twice keeps its last
/// position.
pub fn position_map(master: &[String]) -> HashMap<&str, usize> {
    master
        .iter()
        .enumerate()
        .filter_map(|(i, code)| normalize_code(code).map(|c| (c, i)))
        .collect()
}

/// Stable sort of `rows` by their item code's position in `master`.
///
/// Codes missing from `master` sort after every listed code and keep their
/// relative input order. An empty `master` leaves `rows` untouched.
pub fn order_rows(mut rows: Vec<ExtractedRow>, master: &[String]) -> Vec<ExtractedRow> {
    if master.is_empty() {
        return rows;
    }
    let positions = position_map(master);
    rows.sort_by_key(|row| {
        normalize_code(&row.item_code)
            .and_then(|code| positions.get(code).copied())
            .unwrap_or(usize::MAX)
    });
    rows
}

/// How many rows have a code listed in `master`.
pub fn rows_in_master(rows: &[ExtractedRow], master: &[String]) -> usize {
    let positions = position_map(master);
    rows.iter()
        .filter(|row| {
            normalize_code(&row.item_code).is_some_and(|code| positions.contains_key(code))
        })
        .count()
}
