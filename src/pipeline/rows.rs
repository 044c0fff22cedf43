//! Row building: turn the classified line stream into [`ExtractedRow`]s.
//!
//! Pages are walked in document order as one continuous stream, so a store
//! marker at the bottom of page 1 still governs the items at the top of
//! page 2. The current marker starts empty for every document.
//!
//! How an item line picks its store depends on [`MarkerPolicy`]:
//!
//! - `Forward`: the most recent marker *above* the item.
//! - `Lookback`: the first marker *below* the item. Items are held back
//!   until a marker arrives; whatever is still held at the end of the
//!   document takes the last marker seen.

use crate::config::MarkerPolicy;
use crate::error::ExtractionWarning;
use crate::pipeline::classify::{classify_line, split_lines, LineKind};
use crate::pipeline::text::DocumentText;
use crate::record::{store_label, ExtractedRow};
use tracing::{debug, warn};

/// Rows plus everything recovered along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Rows in document order.
    pub rows: Vec<ExtractedRow>,
    pub warnings: Vec<ExtractionWarning>,
    pub dropped_lines: usize,
    pub pages_without_text: usize,
}

/// Mutable parse state for one document.
struct RowBuilder<'a> {
    order_id: &'a str,
    policy: MarkerPolicy,
    marker: String,
    /// Lookback only: `(code, quantity)` pairs waiting for a marker.
    pending: Vec<(String, String)>,
    out: Extraction,
}

impl<'a> RowBuilder<'a> {
    fn new(order_id: &'a str, policy: MarkerPolicy) -> Self {
        Self {
            order_id,
            policy,
            marker: String::new(),
            pending: Vec::new(),
            out: Extraction::default(),
        }
    }

    fn line(&mut self, page: usize, line_no: usize, line: &str) {
        match classify_line(line) {
            LineKind::StoreMarker(store) => {
                debug!("Page {page}, line {line_no}: store marker {store}");
                self.marker = store.to_string();
                self.flush_pending();
            }
            LineKind::Item { code, quantity } => match self.policy {
                MarkerPolicy::Forward => self.emit(code, quantity),
                MarkerPolicy::Lookback => {
                    self.pending.push((code.to_string(), quantity.to_string()))
                }
            },
            LineKind::ItemWithoutQuantity { code } => {
                debug!("Page {page}, line {line_no}: item {code} without quantity");
                self.out.dropped_lines += 1;
                self.out.warnings.push(ExtractionWarning::LineDropped {
                    page,
                    line: line_no,
                    code: code.to_string(),
                });
            }
            LineKind::Other => {}
        }
    }

    fn emit(&mut self, code: &str, quantity: &str) {
        let label = store_label(self.order_id, &self.marker);
        self.out.rows.push(ExtractedRow::new(label, code, quantity));
    }

    fn flush_pending(&mut self) {
        for (code, quantity) in std::mem::take(&mut self.pending) {
            self.emit(&code, &quantity);
        }
    }

    fn finish(mut self) -> Extraction {
        self.flush_pending();
        self.out
    }
}

/// Build rows for a whole document.
///
/// `order_id` is the resolved order id or the placeholder; it is stamped on
/// every row's store label.
pub fn build_rows(doc: &DocumentText, order_id: &str, policy: MarkerPolicy) -> Extraction {
    let mut builder = RowBuilder::new(order_id, policy);

    for page in &doc.pages {
        let Some(text) = page.text.as_deref() else {
            builder.out.pages_without_text += 1;
            builder
                .out
                .warnings
                .push(ExtractionWarning::PageWithoutText {
                    page: page.page_num,
                });
            continue;
        };
        for (idx, line) in split_lines(text).enumerate() {
            builder.line(page.page_num, idx + 1, line);
        }
    }

    let out = builder.finish();
    if out.dropped_lines > 0 {
        warn!(
            "{} item line(s) without a quantity were dropped",
            out.dropped_lines
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes_and_labels(ex: &Extraction) -> Vec<(&str, &str)> {
        ex.rows
            .iter()
            .map(|r| (r.item_code.as_str(), r.store_label.as_str()))
            .collect()
    }

    fn sample_invoice() -> DocumentText {
        DocumentText::from_pages([[
            "FACTURA 2024/118",
            "TIENDA 015",
            "845  BOTTLE OF SAUCE  6,000  1,20  7,20",
            "TIENDA 022",
            "120  JAR OF OLIVES  3,000  2,50  7,50",
        ]
        .join("\n")])
    }

    #[test]
    fn test_forward_stamps_the_marker_above() {
        let ex = build_rows(&sample_invoice(), "4532", MarkerPolicy::Forward);
        assert_eq!(
            codes_and_labels(&ex),
            vec![
                ("845", "PEDIDO PC4532 TIENDA 015"),
                ("120", "PEDIDO PC4532 TIENDA 022"),
            ]
        );
        assert_eq!(ex.rows[0].quantity, "6,000");
        assert_eq!(ex.rows[1].quantity, "3,000");
        assert!(ex.warnings.is_empty());
    }

    #[test]
    fn test_marker_later_in_document_still_applies() {
        let doc = DocumentText::from_pages([
            "TIENDA  42\nsome header text",
            "123  WIDGET  BLUE  6,000  1,00",
        ]);
        let ex = build_rows(&doc, "1", MarkerPolicy::Forward);
        assert_eq!(ex.rows.len(), 1);
        assert_eq!(ex.rows[0].item_code, "123");
        assert!(ex.rows[0].store_label.contains("TIENDA 42"));
    }

    #[test]
    fn test_item_without_quantity_is_dropped_with_warning() {
        let doc = DocumentText::from_pages(["99  MYSTERY ITEM no-quantity-here"]);
        let ex = build_rows(&doc, "1", MarkerPolicy::Forward);
        assert!(ex.rows.is_empty());
        assert_eq!(ex.dropped_lines, 1);
        assert_eq!(
            ex.warnings,
            vec![ExtractionWarning::LineDropped {
                page: 1,
                line: 1,
                code: "99".into()
            }]
        );

        let again = build_rows(&doc, "1", MarkerPolicy::Forward);
        assert_eq!(again.rows.len(), ex.rows.len());
    }

    #[test]
    fn test_item_before_any_marker_gets_empty_store() {
        let doc = DocumentText::from_pages(["845  SAUCE  6,000"]);
        let ex = build_rows(&doc, "7", MarkerPolicy::Forward);
        assert_eq!(ex.rows[0].store_label, "PEDIDO PC7 TIENDA ");
    }

    #[test]
    fn test_lookback_stamps_the_marker_below() {
        let doc = DocumentText::from_pages([[
            "845  SAUCE  6,000",
            "TIENDA 015",
            "120  OLIVES  3,000",
            "121  CAPERS  1,000",
            "TIENDA 022",
        ]
        .join("\n")]);
        let ex = build_rows(&doc, "1", MarkerPolicy::Lookback);
        assert_eq!(
            codes_and_labels(&ex),
            vec![
                ("845", "PEDIDO PC1 TIENDA 015"),
                ("120", "PEDIDO PC1 TIENDA 022"),
                ("121", "PEDIDO PC1 TIENDA 022"),
            ]
        );
    }

    #[test]
    fn test_lookback_trailing_items_take_last_marker() {
        let doc = DocumentText::from_pages(["TIENDA 015\n845  SAUCE  6,000"]);
        let ex = build_rows(&doc, "1", MarkerPolicy::Lookback);
        assert_eq!(codes_and_labels(&ex), vec![("845", "PEDIDO PC1 TIENDA 015")]);
    }

    #[test]
    fn test_pages_without_text_are_counted_and_skipped() {
        let doc = DocumentText::from_pages(["", "TIENDA 3\n845  SAUCE  6,000"]);
        let ex = build_rows(&doc, "1", MarkerPolicy::Forward);
        assert_eq!(ex.pages_without_text, 1);
        assert_eq!(ex.rows.len(), 1);
        assert_eq!(
            ex.warnings,
            vec![ExtractionWarning::PageWithoutText { page: 1 }]
        );
    }

    #[test]
    fn test_placeholder_order_id_is_stamped() {
        let doc = DocumentText::from_pages(["TIENDA 9\n845  SAUCE  6,000"]);
        let ex = build_rows(
            &doc,
            crate::record::UNRESOLVED_ORDER_ID,
            MarkerPolicy::Forward,
        );
        assert_eq!(
            ex.rows[0].store_label,
            "PEDIDO PCPEDIDO_NO_ENCONTRADO TIENDA 9"
        );
    }
}
