//! Result types returned by the conversion entry points.

use crate::error::ExtractionWarning;
use crate::record::{ExtractedRow, UNRESOLVED_ORDER_ID};
use serde::{Deserialize, Serialize};

/// Order-level data read once from the first table on page 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    /// Order number (`PC<order_id>` in the store label).
    pub order_id: String,
    /// Order date with `/` normalised to `-`, when the table had one.
    pub order_date: Option<String>,
    /// False when `order_id` is the placeholder.
    pub resolved: bool,
}

impl OrderHeader {
    pub fn unresolved() -> Self {
        Self {
            order_id: UNRESOLVED_ORDER_ID.to_string(),
            order_date: None,
            resolved: false,
        }
    }
}

/// Where the master-order sequence used for a conversion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterFreshness {
    /// Fetched from the source during this call.
    Fetched,
    /// Served from the cache within its TTL.
    Cached,
    /// The refresh failed; the previous sequence was served.
    Stale,
    /// The refresh failed; an empty sequence was used.
    Unavailable,
}

/// Statistics for a completed conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub pages_without_text: usize,
    pub rows_extracted: usize,
    /// Item-pattern lines skipped because they had no quantity token.
    pub dropped_lines: usize,
    /// Rows whose code appears in the master sequence.
    pub rows_in_master: usize,
    pub master_order_len: usize,
    pub master_freshness: MasterFreshness,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced for one invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The xlsx artifact.
    #[serde(skip)]
    pub spreadsheet: Vec<u8>,
    /// Display name derived from the input file name.
    pub file_name: String,
    pub header: OrderHeader,
    /// Rows in final (master) order, as written to the table.
    pub rows: Vec<ExtractedRow>,
    pub warnings: Vec<ExtractionWarning>,
    pub stats: ConversionStats,
}
