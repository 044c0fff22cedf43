//! Page text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which keeps
//! thread-local state and is not safe to drive from async contexts.
//! [`extract_document_text`] moves the whole document walk onto the blocking
//! pool so Tokio workers stay free (the master-order fetch runs alongside).
//!
//! Two views of the document come out of one pass:
//! - the plain text of every page, in page order, for line classification;
//! - the positioned text objects of page 1, for the order-header table.

use crate::error::InvoiceError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A piece of text with its bounding box in PDF points (y grows upwards).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl TextFragment {
    pub fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }

    pub fn centre_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Plain text of one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_num: usize,
    /// `None` when the page has no extractable text (scans, blank pages).
    pub text: Option<String>,
}

/// Everything the extraction stages need from a PDF.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentText {
    pub pages: Vec<PageText>,
    /// Positioned text of page 1.
    pub header_fragments: Vec<TextFragment>,
}

impl DocumentText {
    /// Build from plain page texts, without positioned fragments.
    ///
    /// Useful when text comes from somewhere other than pdfium; the order
    /// header will resolve to the placeholder.
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let text: String = text.into();
                PageText {
                    page_num: i + 1,
                    text: (!text.trim().is_empty()).then_some(text),
                }
            })
            .collect();
        Self {
            pages,
            header_fragments: Vec::new(),
        }
    }

    pub fn with_header_fragments(mut self, fragments: Vec<TextFragment>) -> Self {
        self.header_fragments = fragments;
        self
    }
}

/// Extract page texts and page-1 fragments from PDF bytes.
///
/// This runs inside `spawn_blocking` since pdfium calls are blocking.
pub async fn extract_document_text(
    bytes: Vec<u8>,
    name: String,
    password: Option<String>,
    library_path: Option<PathBuf>,
) -> Result<DocumentText, InvoiceError> {
    tokio::task::spawn_blocking(move || {
        extract_blocking(&bytes, &name, password.as_deref(), library_path.as_deref())
    })
    .await
    .map_err(|e| InvoiceError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Bind pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system library.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, InvoiceError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let explicit = library_path.map(Path::to_path_buf).or(env_path);

    let bindings = match explicit {
        Some(path) => {
            let lib = if path.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib).map_err(|e| {
                InvoiceError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| InvoiceError::PdfiumBindingFailed(format!("system library: {:?}", e)))?,
    };

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_blocking(
    bytes: &[u8],
    name: &str,
    password: Option<&str>,
    library_path: Option<&Path>,
) -> Result<DocumentText, InvoiceError> {
    let pdfium = bind_pdfium(library_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    InvoiceError::WrongPassword {
                        name: name.to_string(),
                    }
                } else {
                    InvoiceError::PasswordRequired {
                        name: name.to_string(),
                    }
                }
            } else {
                InvoiceError::CorruptPdf {
                    name: name.to_string(),
                    detail: err_str,
                }
            }
        })?;

    let mut out = DocumentText::default();

    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx + 1;

        if idx == 0 {
            out.header_fragments = page_fragments(&page);
            debug!("Page 1: {} positioned fragments", out.header_fragments.len());
        }

        let text = match page.text() {
            Ok(t) => Some(t.all()).filter(|s| !s.trim().is_empty()),
            Err(e) => {
                warn!("Page {}: text extraction failed: {:?}", page_num, e);
                None
            }
        };
        out.pages.push(PageText { page_num, text });
    }

    info!("Extracted text from {} pages of '{}'", out.pages.len(), name);
    Ok(out)
}

/// Positioned text objects of a page.
fn page_fragments(page: &PdfPage) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    for object in page.objects().iter() {
        let Some(text_obj) = object.as_text_object() else {
            continue;
        };
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let text = text_obj.text();
        if text.trim().is_empty() {
            continue;
        }
        fragments.push(TextFragment {
            text,
            left: bounds.left().value,
            bottom: bounds.bottom().value,
            right: bounds.right().value,
            top: bounds.top().value,
        });
    }
    fragments
}
