//! Order-header extraction: read the order id from the first table on page 1.
//!
//! The invoices open with a small boxed table, header row first:
//!
//! ```text
//! FECHA      PEDIDO    PROVEEDOR   ...
//! 12/05/24   4532      ...
//! ```
//!
//! Plain page text loses the column structure, so this step works on the
//! positioned text fragments of page 1 instead. Fragments are grouped into
//! visual rows by their vertical centre, each row is split into cells where
//! the horizontal gap between fragments is wider than a word space, and the
//! first run of at least two consecutive multi-cell rows is taken as the
//! table. Its second row holds the date (cell 1) and order id (cell 2).
//!
//! Failure is always local: [`resolve_order_header`] turns any
//! [`HeaderError`] into the placeholder header plus a warning.

use crate::error::ExtractionWarning;
use crate::output::OrderHeader;
use crate::pipeline::text::TextFragment;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, warn};

/// Why the header table could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("page 1 has no positioned text")]
    NoFragments,
    #[error("no table found on page 1")]
    NoTable,
}

/// Gap between fragments, in units of fragment height, above which a new
/// cell starts.
const CELL_GAP_FACTOR: f32 = 0.8;

/// Group fragments into rows (top to bottom) of cells (left to right).
pub fn layout_rows(fragments: &[TextFragment]) -> Vec<Vec<String>> {
    let mut frags: Vec<&TextFragment> = fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .collect();
    // PDF y grows upwards: highest centre first.
    frags.sort_by(|a, b| {
        b.centre_y()
            .partial_cmp(&a.centre_y())
            .unwrap_or(Ordering::Equal)
            .then(a.left.partial_cmp(&b.left).unwrap_or(Ordering::Equal))
    });

    let mut rows: Vec<Vec<&TextFragment>> = Vec::new();
    for frag in frags {
        match rows.last_mut() {
            Some(row) if same_row(row[0], frag) => row.push(frag),
            _ => rows.push(vec![frag]),
        }
    }

    rows.into_iter().map(split_cells).collect()
}

fn same_row(anchor: &TextFragment, frag: &TextFragment) -> bool {
    let tolerance = (anchor.height().max(frag.height()) * 0.5).max(1.0);
    (anchor.centre_y() - frag.centre_y()).abs() <= tolerance
}

fn split_cells(mut row: Vec<&TextFragment>) -> Vec<String> {
    row.sort_by(|a, b| a.left.partial_cmp(&b.left).unwrap_or(Ordering::Equal));

    let mut cells: Vec<String> = Vec::new();
    let mut prev_right: Option<f32> = None;
    for frag in row {
        let text = frag.text.trim();
        let gap_limit = (frag.height() * CELL_GAP_FACTOR).max(3.0);
        match (prev_right, cells.last_mut()) {
            (Some(right), Some(cell)) if frag.left - right < gap_limit => {
                cell.push(' ');
                cell.push_str(text);
            }
            _ => cells.push(text.to_string()),
        }
        prev_right = Some(prev_right.map_or(frag.right, |r| r.max(frag.right)));
    }
    cells
}

/// The first run of ≥ 2 consecutive rows that each have ≥ 2 cells.
pub fn first_table(rows: &[Vec<String>]) -> Option<&[Vec<String>]> {
    let mut start = None;
    for (i, row) in rows.iter().enumerate() {
        if row.len() >= 2 {
            let s = *start.get_or_insert(i);
            if i > s {
                let end = rows[i..]
                    .iter()
                    .position(|r| r.len() < 2)
                    .map_or(rows.len(), |p| i + p);
                return Some(&rows[s..end]);
            }
        } else {
            start = None;
        }
    }
    None
}

/// Read the order header from page-1 fragments.
pub fn read_order_header(fragments: &[TextFragment]) -> Result<OrderHeader, HeaderError> {
    if fragments.is_empty() {
        return Err(HeaderError::NoFragments);
    }
    let rows = layout_rows(fragments);
    let table = first_table(&rows).ok_or(HeaderError::NoTable)?;
    debug!("Header table: {} rows, first row {:?}", table.len(), table[0]);

    // Table rows have ≥ 2 non-blank cells.
    let [date, order_id, ..] = table[1].as_slice() else {
        return Err(HeaderError::NoTable);
    };

    Ok(OrderHeader {
        order_id: order_id.clone(),
        order_date: Some(date.replace('/', "-")),
        resolved: true,
    })
}

/// Like [`read_order_header`], but never fails: errors become the
/// placeholder header and a [`ExtractionWarning::HeaderUnresolved`].
pub fn resolve_order_header(
    fragments: &[TextFragment],
) -> (OrderHeader, Option<ExtractionWarning>) {
    match read_order_header(fragments) {
        Ok(header) => (header, None),
        Err(e) => {
            warn!("Could not read order header: {e}");
            (
                OrderHeader::unresolved(),
                Some(ExtractionWarning::HeaderUnresolved {
                    reason: e.to_string(),
                }),
            )
        }
    }
}
