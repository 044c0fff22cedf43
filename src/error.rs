//! Error types for the invoice2xlsx library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`InvoiceError`] (fatal): the conversion cannot produce an artifact
//!   (not a PDF, PDFium missing, master order unavailable under a fail-closed
//!   policy). Returned as `Err(InvoiceError)` from the `convert*` functions.
//!
//! * [`MasterOrderError`]: the remote (or local) master-order read failed.
//!   Kept separate so the cache policy can decide what to do with it before
//!   it is wrapped into [`InvoiceError::MasterOrder`].
//!
//! * [`ExtractionWarning`] (non-fatal): a header table that could not be
//!   read, a page without text, an item line without a quantity. Recovered
//!   locally and reported in [`crate::output::ConversionOutput::warnings`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the invoice2xlsx library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The caller handed over zero bytes.
    #[error("Input '{name}' is empty")]
    EmptyInput { name: String },

    /// The bytes were read, but they are not a PDF.
    #[error("Input '{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Install libpdfium system-wide (e.g. from bblanchon/pdfium-binaries).\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or containing directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Master order ──────────────────────────────────────────────────────
    /// The master order could not be obtained and the policy is fail-closed.
    #[error("Master order unavailable: {0}")]
    MasterOrder(#[from] MasterOrderError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter rejected the workbook.
    #[error("Failed to build spreadsheet: {detail}")]
    SpreadsheetWrite { detail: String },

    /// Could not create or write the output spreadsheet file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rust_xlsxwriter::XlsxError> for InvoiceError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        InvoiceError::SpreadsheetWrite {
            detail: e.to_string(),
        }
    }
}

/// Failure reading the master-order sequence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MasterOrderError {
    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// HTTP 401/403: the bearer credential was rejected.
    #[error("Credential rejected by {url} (HTTP {status})")]
    Unauthorized { url: String, status: u16 },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The response body did not have the expected shape.
    #[error("Malformed response: {detail}")]
    MalformedResponse { detail: String },

    /// The downloaded or local file is not a readable xlsx workbook.
    #[error("Cannot read master workbook: {detail}")]
    Workbook { detail: String },

    /// The named table does not exist on the named sheet.
    #[error("Table '{table}' not found on sheet '{sheet}'")]
    TableNotFound { sheet: String, table: String },

    /// The named column is not part of the table.
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// No credential was supplied for a source that needs one.
    #[error("No bearer credential supplied for the master-order source")]
    MissingCredential,
}

/// A non-fatal problem recovered during extraction.
///
/// Stored in [`crate::output::ConversionOutput::warnings`]; the artifact is
/// still produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// The order header could not be read; the placeholder id was used.
    #[error("Order header unresolved ({reason}); using placeholder order id")]
    HeaderUnresolved { reason: String },

    /// A page produced no extractable text and was skipped.
    #[error("Page {page}: no extractable text")]
    PageWithoutText { page: usize },

    /// A line looked like an item line but had no quantity token.
    #[error("Page {page}, line {line}: item {code} has no quantity, line dropped")]
    LineDropped {
        page: usize,
        line: usize,
        code: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_order_error_wraps_into_invoice_error() {
        let e: InvoiceError = MasterOrderError::Unauthorized {
            url: "https://graph.microsoft.com/v1.0/sites/x".into(),
            status: 401,
        }
        .into();
        let msg = e.to_string();
        assert!(msg.starts_with("Master order unavailable"), "got: {msg}");
        assert!(msg.contains("401"), "got: {msg}");
    }

    #[test]
    fn test_timeout_display() {
        let e = MasterOrderError::Timeout {
            url: "https://example.test".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn test_not_a_pdf_display() {
        let e = InvoiceError::NotAPdf {
            name: "factura.pdf".into(),
            magic: b"PK\x03\x04".to_vec(),
        };
        assert!(e.to_string().contains("factura.pdf"));
    }

    #[test]
    fn test_line_dropped_display() {
        let w = ExtractionWarning::LineDropped {
            page: 2,
            line: 14,
            code: "99".into(),
        };
        let msg = w.to_string();
        assert!(msg.contains("Page 2"));
        assert!(msg.contains("item 99"));
    }

    #[test]
    fn test_warnings_serialise_with_kind_tag() {
        let w = ExtractionWarning::PageWithoutText { page: 3 };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"kind":"page_without_text","page":3}"#);
    }
}
