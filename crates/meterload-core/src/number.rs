//! Locale-independent numeric normalization of raw cells

use crate::grid::CellValue;

/// Normalize a raw cell into a quantity.
///
/// Numbers pass through unchanged. Text is trimmed, a comma is read as the
/// decimal separator, and every character other than digits, `.` and `-` is
/// dropped before parsing. Anything that still fails to parse, and blank
/// cells, normalize to `0.0`: one malformed cell must not abort a
/// multi-file import.
///
/// The parse is strict. Thousands separators are not recognised, so
/// `"1.234,5"` becomes `"1.234.5"` after the comma swap and normalizes to
/// `0.0` rather than `1234.5`.
pub fn parse_number(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => parse_number_str(s),
        CellValue::Blank => 0.0,
    }
}

/// Text half of [`parse_number`]
pub fn parse_number_str(s: &str) -> f64 {
    let cleaned: String = s
        .trim()
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}
