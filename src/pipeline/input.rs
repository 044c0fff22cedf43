//! Input validation and local file loading.
//!
//! Callers hand over raw bytes plus the original file name. We check the
//! PDF magic bytes (`%PDF`) before anything else so a mislabelled upload
//! gets a meaningful error rather than a pdfium failure deep in extraction.

use crate::error::InvoiceError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Reject empty input and anything that does not start with `%PDF`.
pub fn validate_pdf(bytes: &[u8], name: &str) -> Result<(), InvoiceError> {
    if bytes.is_empty() {
        return Err(InvoiceError::EmptyInput {
            name: name.to_string(),
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(InvoiceError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

/// The file-name component of `path`, used as the input's display name.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a local PDF, returning its bytes and display name.
pub async fn read_local(path: &Path) -> Result<(Vec<u8>, String), InvoiceError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => InvoiceError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => InvoiceError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    let name = display_name(path);
    validate_pdf(&bytes, &name)?;
    debug!("Read local PDF {} ({} bytes)", path.display(), bytes.len());
    Ok((bytes, name))
}
