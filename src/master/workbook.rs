//! Reading named tables out of xlsx bytes with calamine.

use crate::config::WorkbookLocation;
use crate::error::MasterOrderError;
use calamine::{open_workbook_from_rs, Data, Xlsx};
use std::io::Cursor;
use tracing::debug;

/// A named table as plain strings: header names plus body rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NamedTable {
    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<String>> {
        let idx = self.columns.iter().position(|c| c.trim() == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect(),
        )
    }
}

/// Load table `table` from sheet `sheet` of an xlsx workbook.
pub fn read_named_table(
    bytes: &[u8],
    sheet: &str,
    table: &str,
) -> Result<NamedTable, MasterOrderError> {
    let mut workbook = open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(bytes)).map_err(|e| {
        MasterOrderError::Workbook {
            detail: e.to_string(),
        }
    })?;
    workbook
        .load_tables()
        .map_err(|e| MasterOrderError::Workbook {
            detail: e.to_string(),
        })?;

    let not_found = || MasterOrderError::TableNotFound {
        sheet: sheet.to_string(),
        table: table.to_string(),
    };
    let found = workbook.table_by_name(table).map_err(|_| not_found())?;
    if found.sheet_name() != sheet {
        debug!(
            "Table '{}' is on sheet '{}', expected '{}'",
            table,
            found.sheet_name(),
            sheet
        );
        return Err(not_found());
    }

    let rows = found
        .data()
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(NamedTable {
        columns: found.columns().to_vec(),
        rows,
    })
}

/// Raw values of the configured code column.
pub fn read_code_column(
    bytes: &[u8],
    location: &WorkbookLocation,
) -> Result<Vec<String>, MasterOrderError> {
    let table = read_named_table(bytes, &location.sheet, &location.table)?;
    table
        .column(&location.column)
        .ok_or_else(|| MasterOrderError::ColumnNotFound {
            table: location.table.clone(),
            column: location.column.clone(),
        })
}

/// Cell value as text. Integral floats drop the `.0` so numeric codes
/// read the same as text ones.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
