//! # invoice2xlsx
//!
//! Turn supplier invoice PDFs into a spreadsheet table ready to paste into the
//! purchasing workbook.
//!
//! ## Why this crate?
//!
//! The invoices are laid out for people: one `TIENDA nnn` heading per
//! destination store, item lines underneath, and the order number in a small
//! table on page 1. Keying them in by hand is slow and error-prone. This crate
//! reads the PDF text, groups item lines under their store, sorts them by the
//! warehouse picking order kept in a SharePoint workbook, and writes a styled
//! xlsx table with the destination column layout.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Input     check %PDF magic
//!  ├─ 2. Text      page text + page-1 fragments via pdfium (spawn_blocking)
//!  │               ∥ master order from Graph / local workbook (TTL cache)
//!  ├─ 3. Header    order id from the first table on page 1
//!  ├─ 4. Rows      TIENDA markers + item lines → ExtractedRow
//!  ├─ 5. Order     stable sort by master position
//!  └─ 6. Emit      xlsx with table "TablaDatos" + Factura_<name>.xlsx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2xlsx::{ConversionConfig, Converter, GraphWorkbookSource, MasterSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let source = MasterSource::from(GraphWorkbookSource::from_config(&config)?);
//!     let converter = Converter::new(config, source);
//!
//!     let token = std::env::var("GRAPH_ACCESS_TOKEN")?;
//!     let bytes = std::fs::read("pedido.pdf")?;
//!     let output = converter.convert(bytes, "pedido.pdf", &token).await?;
//!     std::fs::write(&output.file_name, &output.spreadsheet)?;
//!     eprintln!("{} rows", output.stats.rows_extracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2xlsx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! invoice2xlsx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod master;
pub mod output;
pub mod pipeline;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, MarkerPolicy, MasterOrderPolicy, WorkbookLocation,
};
pub use convert::Converter;
pub use error::{ExtractionWarning, InvoiceError, MasterOrderError};
pub use master::{
    GraphWorkbookSource, LocalWorkbookSource, MasterOrder, MasterOrderCache, MasterOrderSource,
    MasterSource, StaticOrder,
};
pub use output::{ConversionOutput, ConversionStats, MasterFreshness, OrderHeader};
pub use pipeline::text::{DocumentText, PageText, TextFragment};
pub use record::{ExtractedRow, COLUMNS};
