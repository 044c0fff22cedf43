//! Line classification: decide what each line of invoice text is.
//!
//! Invoice text as extracted from the PDF is a flat list of lines. Only two
//! kinds matter:
//!
//! - **store markers** (`TIENDA 015`) which name the destination store of the
//!   item lines that follow, and
//! - **item lines** (`845  SALSA BRAVA 250G  6,000  1,20 ...`) which start with
//!   the item code and carry a quantity in `d,ddd` form somewhere after it.
//!
//! Each pattern is a separate function over a single `Lazy<Regex>` so it can
//! be tested on its own. [`classify_line`] combines them; a marker wins over
//! an item when a line matches both.

use once_cell::sync::Lazy;
use regex::Regex;

/// The kind of a single trimmed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `TIENDA <digits>`; carries the digits.
    StoreMarker(&'a str),
    /// Leading digit run plus a quantity token.
    Item { code: &'a str, quantity: &'a str },
    /// Leading digit run, but no quantity token anywhere on the line.
    ItemWithoutQuantity { code: &'a str },
    Other,
}

// ── Pattern 1: store marker ─────────────────────────────────────────────────

static RE_STORE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)TIENDA\s+(\d+)").unwrap());

/// Digits following `TIENDA` (any case), anywhere on the line.
pub fn store_marker(line: &str) -> Option<&str> {
    RE_STORE_MARKER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// ── Pattern 2: item code ────────────────────────────────────────────────────

static RE_ITEM_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s").unwrap());

/// Leading digit run of a line that continues after whitespace.
pub fn item_code(line: &str) -> Option<&str> {
    RE_ITEM_CODE
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// ── Pattern 3: quantity ─────────────────────────────────────────────────────

static RE_QUANTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+,\d{3}$").unwrap());

/// First whitespace-separated token shaped like `6,000`.
pub fn quantity_token(line: &str) -> Option<&str> {
    line.split_whitespace().find(|tok| RE_QUANTITY.is_match(tok))
}

/// Classify one line. The line is trimmed first.
pub fn classify_line(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if let Some(marker) = store_marker(line) {
        return LineKind::StoreMarker(marker);
    }
    match item_code(line) {
        Some(code) => match quantity_token(line) {
            Some(quantity) => LineKind::Item { code, quantity },
            None => LineKind::ItemWithoutQuantity { code },
        },
        None => LineKind::Other,
    }
}

/// Split page text into trimmed lines, accepting `\n`, `\r\n` and bare `\r`.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().flat_map(|l| l.split('\r')).map(str::trim)
}
