//! Table emission: ordered rows → xlsx bytes with one named, styled table.

use crate::error::InvoiceError;
use crate::record::{ExtractedRow, COLUMNS};
use rust_xlsxwriter::{Table, TableColumn, TableStyle, Workbook};
use std::path::Path;
use tracing::debug;

pub const SHEET_NAME: &str = "Datos";
pub const TABLE_NAME: &str = "TablaDatos";

/// Stem used when the input name has none.
const FALLBACK_STEM: &str = "documento";

/// Write `rows` as the body of the `TablaDatos` table on sheet `Datos`.
///
/// Every cell is written as text. A table needs at least one body row, so
/// the table always spans `max(rows.len(), 1)` body rows: zero rows produce
/// a header plus one empty row.
pub fn emit_table(rows: &[ExtractedRow]) -> Result<Vec<u8>, InvoiceError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (r, row) in rows.iter().enumerate() {
        let xl_row = r as u32 + 1;
        for (c, value) in row.cells().iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(xl_row, c as u16, *value)?;
            }
        }
    }

    let columns: Vec<TableColumn> = COLUMNS
        .iter()
        .map(|header| TableColumn::new().set_header(*header))
        .collect();
    let table = Table::new()
        .set_name(TABLE_NAME)
        .set_style(TableStyle::Medium9)
        .set_banded_rows(true)
        .set_first_column(false)
        .set_last_column(false)
        .set_columns(&columns);

    let last_row = rows.len().max(1) as u32;
    let last_col = (COLUMNS.len() - 1) as u16;
    sheet.add_table(0, 0, last_row, last_col, &table)?;

    for (c, header) in COLUMNS.iter().enumerate() {
        sheet.set_column_width(c as u16, column_width(header))?;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Emitted {} rows ({} bytes)", rows.len(), bytes.len());
    Ok(bytes)
}

/// Width that fits the header text plus the filter button.
fn column_width(header: &str) -> f64 {
    (header.chars().count() as f64 + 4.0).max(10.0)
}

/// Output display name: `<prefix><stem>.xlsx`, whitespace in the stem
/// replaced by `_`.
pub fn output_file_name(prefix: &str, input_name: &str) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string());
    let stem: String = stem
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{prefix}{stem}.xlsx")
}
