//! The destination record shape and its fixed column schema.

use serde::{Deserialize, Serialize};

/// Column headers of the destination table, in order.
pub const COLUMNS: [&str; 12] = [
    "Tienda",
    "Código",
    "Descripción de artículo",
    "Cantidad",
    "Precio por unidad",
    "% de descuento",
    "Precio después del descuento",
    "Indicador de impuestos",
    "Total (ML)",
    "Unidad de negocio",
    "Código de unidad de medida",
    "Precio de coste Departamento",
];

/// Constant written to the business-unit column of every row.
pub const BUSINESS_UNIT: &str = "001";

/// Constant written to the department-cost column of every row.
pub const DEPARTMENT_COST: &str = "985";

/// Placeholder order id used when the header table cannot be read.
pub const UNRESOLVED_ORDER_ID: &str = "PEDIDO_NO_ENCONTRADO";

/// One invoice line item in destination-schema shape.
///
/// Only `store_label`, `item_code` and `quantity` are filled from the PDF; the
/// rest are passthrough fields the downstream workbook fills in itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRow {
    pub store_label: String,
    pub item_code: String,
    pub description: String,
    /// Locale decimal string, e.g. `6,000`.
    pub quantity: String,
    pub unit_price: String,
    pub discount_pct: String,
    pub discounted_price: String,
    pub tax_indicator: String,
    pub total: String,
    pub business_unit: String,
    pub uom_code: String,
    pub department_cost: String,
}

impl ExtractedRow {
    /// Build a row with the passthrough fields at their fixed values.
    pub fn new(
        store_label: impl Into<String>,
        item_code: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            store_label: store_label.into(),
            item_code: item_code.into(),
            description: String::new(),
            quantity: quantity.into(),
            unit_price: String::new(),
            discount_pct: String::new(),
            discounted_price: String::new(),
            tax_indicator: String::new(),
            total: String::new(),
            business_unit: BUSINESS_UNIT.to_string(),
            uom_code: String::new(),
            department_cost: DEPARTMENT_COST.to_string(),
        }
    }

    /// Cell values in [`COLUMNS`] order.
    pub fn cells(&self) -> [&str; 12] {
        [
            &self.store_label,
            &self.item_code,
            &self.description,
            &self.quantity,
            &self.unit_price,
            &self.discount_pct,
            &self.discounted_price,
            &self.tax_indicator,
            &self.total,
            &self.business_unit,
            &self.uom_code,
            &self.department_cost,
        ]
    }

    /// Inverse of [`ExtractedRow::cells`]; `None` unless exactly 12 cells.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        let [store_label, item_code, description, quantity, unit_price, discount_pct, discounted_price, tax_indicator, total, business_unit, uom_code, department_cost] =
            cells
        else {
            return None;
        };
        let s = |c: &S| c.as_ref().to_string();
        Some(Self {
            store_label: s(store_label),
            item_code: s(item_code),
            description: s(description),
            quantity: s(quantity),
            unit_price: s(unit_price),
            discount_pct: s(discount_pct),
            discounted_price: s(discounted_price),
            tax_indicator: s(tax_indicator),
            total: s(total),
            business_unit: s(business_unit),
            uom_code: s(uom_code),
            department_cost: s(department_cost),
        })
    }
}

/// Format the composite store label written to the first column.
pub fn store_label(order_id: &str, store: &str) -> String {
    format!("PEDIDO PC{order_id} TIENDA {store}")
}

/// Item-code comparison key: surrounding whitespace and leading zeros dropped.
///
/// Returns `None` when nothing is left (blank or all-zero input).
pub fn normalize_code(raw: &str) -> Option<&str> {
    let code = raw.trim().trim_start_matches('0');
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
