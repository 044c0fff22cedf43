//! Conversion entry points.
//!
//! A [`Converter`] owns the configuration and the master-order cache, so one
//! instance (or its clones) can convert many invoices while fetching the
//! master sequence at most once per TTL.
//!
//! ```text
//! bytes ─▶ validate ─┬─▶ text extraction (blocking pool) ─┐
//!                    └─▶ master order (cache / remote) ────┴▶ header ▶ rows ▶ order ▶ emit
//! ```

use crate::config::ConversionConfig;
use crate::error::InvoiceError;
use crate::master::{MasterOrder, MasterOrderCache, MasterOrderSource, MasterSource};
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::emit::{emit_table, output_file_name};
use crate::pipeline::header::resolve_order_header;
use crate::pipeline::input;
use crate::pipeline::order::{order_rows, rows_in_master};
use crate::pipeline::rows::build_rows;
use crate::pipeline::text::{extract_document_text, DocumentText};
use futures::future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Invoice-to-spreadsheet converter with a shared master-order cache.
///
/// Cloning is cheap and clones share the cache.
#[derive(Debug)]
pub struct Converter<S = MasterSource> {
    config: ConversionConfig,
    master: Arc<MasterOrderCache<S>>,
}

impl<S> Clone for Converter<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            master: Arc::clone(&self.master),
        }
    }
}

impl<S: MasterOrderSource> Converter<S> {
    /// Build a converter whose cache TTL and failure policy come from
    /// `config`.
    pub fn new(config: ConversionConfig, source: S) -> Self {
        let master = Arc::new(MasterOrderCache::from_config(source, &config));
        Self { config, master }
    }

    /// Convert PDF bytes.
    ///
    /// Text extraction and the master-order fetch run concurrently. Errors
    /// surface in pipeline order: input, extraction, master order, emit.
    pub async fn convert(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        credential: &str,
    ) -> Result<ConversionOutput, InvoiceError> {
        let total_start = Instant::now();
        info!("Starting conversion: {} ({} bytes)", file_name, bytes.len());

        input::validate_pdf(&bytes, file_name)?;

        let extraction = async {
            let start = Instant::now();
            let doc = extract_document_text(
                bytes,
                file_name.to_string(),
                self.config.password.clone(),
                self.config.pdfium_library_path.clone(),
            )
            .await;
            (doc, start.elapsed().as_millis() as u64)
        };
        let ((doc, extract_ms), master) =
            future::join(extraction, self.master.get_master_order(credential)).await;

        let doc = doc?;
        let master = master?;
        self.assemble(doc, master, file_name, extract_ms, total_start)
    }

    /// Run the pipeline on text that was already extracted.
    pub async fn convert_text(
        &self,
        doc: DocumentText,
        file_name: &str,
        credential: &str,
    ) -> Result<ConversionOutput, InvoiceError> {
        let total_start = Instant::now();
        let master = self.master.get_master_order(credential).await?;
        self.assemble(doc, master, file_name, 0, total_start)
    }

    /// Read a local PDF and convert it.
    pub async fn convert_file(
        &self,
        path: impl AsRef<Path>,
        credential: &str,
    ) -> Result<ConversionOutput, InvoiceError> {
        let (bytes, name) = input::read_local(path.as_ref()).await?;
        self.convert(bytes, &name, credential).await
    }

    /// Convert a local PDF and write `<dir>/<file_name>`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn convert_to_dir(
        &self,
        path: impl AsRef<Path>,
        dir: impl AsRef<Path>,
        credential: &str,
    ) -> Result<(PathBuf, ConversionOutput), InvoiceError> {
        let output = self.convert_file(path, credential).await?;
        let out_path = dir.as_ref().join(&output.file_name);
        write_atomic(&out_path, &output.spreadsheet).await?;
        info!("Wrote {}", out_path.display());
        Ok((out_path, output))
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn convert_sync(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        credential: &str,
    ) -> Result<ConversionOutput, InvoiceError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(bytes, file_name, credential))
    }

    /// Header → rows → order → emit.
    fn assemble(
        &self,
        doc: DocumentText,
        master: MasterOrder,
        file_name: &str,
        extract_duration_ms: u64,
        total_start: Instant,
    ) -> Result<ConversionOutput, InvoiceError> {
        let (header, header_warning) = resolve_order_header(&doc.header_fragments);
        debug!("Order id: {}", header.order_id);

        let extraction = build_rows(&doc, &header.order_id, self.config.marker_policy);
        let rows_extracted = extraction.rows.len();
        let matched = rows_in_master(&extraction.rows, master.codes());
        let rows = order_rows(extraction.rows, master.codes());

        let spreadsheet = emit_table(&rows)?;

        let mut warnings = Vec::with_capacity(extraction.warnings.len() + 1);
        warnings.extend(header_warning);
        warnings.extend(extraction.warnings);

        let stats = ConversionStats {
            total_pages: doc.pages.len(),
            pages_without_text: extraction.pages_without_text,
            rows_extracted,
            dropped_lines: extraction.dropped_lines,
            rows_in_master: matched,
            master_order_len: master.codes().len(),
            master_freshness: master.freshness,
            extract_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Converted '{}': {} rows ({} in master order, {} lines dropped)",
            file_name, stats.rows_extracted, stats.rows_in_master, stats.dropped_lines
        );

        Ok(ConversionOutput {
            spreadsheet,
            file_name: output_file_name(&self.config.output_prefix, file_name),
            header,
            rows,
            warnings,
            stats,
        })
    }
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InvoiceError> {
    let write_err = |e| InvoiceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MasterOrderPolicy;
    use crate::error::{ExtractionWarning, MasterOrderError};
    use crate::master::StaticOrder;
    use crate::output::MasterFreshness;
    use crate::pipeline::text::TextFragment;

    struct Unreachable;

    impl MasterOrderSource for Unreachable {
        async fn fetch(&self, _credential: &str) -> Result<Vec<String>, MasterOrderError> {
            Err(MasterOrderError::Request {
                url: "https://graph.test".into(),
                reason: "connection refused".into(),
            })
        }

        fn kind(&self) -> &'static str {
            "unreachable"
        }
    }

    fn invoice_text() -> DocumentText {
        DocumentText::from_pages([[
            "FACTURA 2024/118",
            "TIENDA 015",
            "845  BOTTLE OF SAUCE  6,000  1,20  7,20",
            "TIENDA 022",
            "120  JAR OF OLIVES  3,000  2,50  7,50",
        ]
        .join("\n")])
    }

    fn header_fragments() -> Vec<TextFragment> {
        let frag = |text: &str, left: f32, y: f32| TextFragment {
            text: text.to_string(),
            left,
            bottom: y,
            right: left + 30.0,
            top: y + 10.0,
        };
        vec![
            frag("FECHA", 40.0, 760.0),
            frag("PEDIDO", 140.0, 760.0),
            frag("12/05/24", 40.0, 745.0),
            frag("4532", 140.0, 745.0),
        ]
    }

    fn converter<S: MasterOrderSource>(source: S, policy: MasterOrderPolicy) -> Converter<S> {
        let config = ConversionConfig::builder()
            .master_policy(policy)
            .build()
            .unwrap();
        Converter::new(config, source)
    }

    #[tokio::test]
    async fn test_scenario_rows_follow_master_order() {
        let conv = converter(StaticOrder::new(["120", "845"]), MasterOrderPolicy::FailClosed);
        let doc = invoice_text().with_header_fragments(header_fragments());
        let out = conv.convert_text(doc, "pedido 12.pdf", "t").await.unwrap();

        let rows: Vec<(&str, &str)> = out
            .rows
            .iter()
            .map(|r| (r.item_code.as_str(), r.store_label.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("120", "PEDIDO PC4532 TIENDA 022"),
                ("845", "PEDIDO PC4532 TIENDA 015"),
            ]
        );
        assert_eq!(out.file_name, "Factura_pedido_12.xlsx");
        assert_eq!(out.header.order_date.as_deref(), Some("12-05-24"));
        assert!(out.warnings.is_empty());
        assert_eq!(out.stats.rows_in_master, 2);
        assert_eq!(out.stats.master_freshness, MasterFreshness::Fetched);
        assert!(out.spreadsheet.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_empty_master_keeps_extraction_order() {
        let conv = converter(StaticOrder::empty(), MasterOrderPolicy::FailClosed);
        let out = conv.convert_text(invoice_text(), "a.pdf", "").await.unwrap();
        let codes: Vec<&str> = out.rows.iter().map(|r| r.item_code.as_str()).collect();
        assert_eq!(codes, vec!["845", "120"]);
    }

    #[tokio::test]
    async fn test_missing_header_uses_placeholder_and_warns() {
        let conv = converter(StaticOrder::empty(), MasterOrderPolicy::FailClosed);
        let out = conv.convert_text(invoice_text(), "a.pdf", "").await.unwrap();
        assert!(!out.header.resolved);
        assert!(out.rows[0].store_label.starts_with("PEDIDO PCPEDIDO_NO_ENCONTRADO"));
        assert!(matches!(
            out.warnings.first(),
            Some(ExtractionWarning::HeaderUnresolved { .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_closed_master_error_is_fatal() {
        let conv = converter(Unreachable, MasterOrderPolicy::FailClosed);
        let err = conv
            .convert_text(invoice_text(), "a.pdf", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::MasterOrder(_)));
    }

    #[tokio::test]
    async fn test_degrade_to_empty_still_converts() {
        let conv = converter(Unreachable, MasterOrderPolicy::DegradeToEmpty);
        let out = conv.convert_text(invoice_text(), "a.pdf", "t").await.unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.stats.master_freshness, MasterFreshness::Unavailable);
    }

    #[tokio::test]
    async fn test_non_pdf_input_fails_before_master_lookup() {
        let conv = converter(Unreachable, MasterOrderPolicy::FailClosed);
        let err = conv
            .convert(b"PK\x03\x04".to_vec(), "a.pdf", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::NotAPdf { .. }));
    }

    #[test]
    fn test_convert_sync_rejects_non_pdf_input() {
        let conv = converter(Unreachable, MasterOrderPolicy::FailClosed);
        let err = conv
            .convert_sync(b"GIF89a".to_vec(), "a.pdf", "t")
            .unwrap_err();
        assert!(matches!(err, InvoiceError::NotAPdf { .. }), "got: {err}");

        let err = conv.convert_sync(Vec::new(), "a.pdf", "t").unwrap_err();
        assert!(matches!(err, InvoiceError::EmptyInput { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn test_clones_share_the_cache() {
        let conv = converter(StaticOrder::new(["1"]), MasterOrderPolicy::FailClosed);
        let twin = conv.clone();
        conv.convert_text(invoice_text(), "a.pdf", "").await.unwrap();
        let out = twin.convert_text(invoice_text(), "b.pdf", "").await.unwrap();
        assert_eq!(out.stats.master_freshness, MasterFreshness::Cached);
    }

    #[tokio::test]
    async fn test_failed_conversion_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.pdf");
        std::fs::write(&input, b"not a pdf").unwrap();
        let out_dir = dir.path().join("out");

        let conv = converter(StaticOrder::empty(), MasterOrderPolicy::FailClosed);
        assert!(conv.convert_to_dir(&input, &out_dir, "").await.is_err());
        assert!(!out_dir.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("Factura_a.xlsx");
        write_atomic(&path, b"PK").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
        assert!(!path.with_extension("xlsx.tmp").exists());
    }
}
