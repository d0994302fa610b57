//! Cell grid types for representing a single spreadsheet sheet

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub(crate) static BLANK: CellValue = CellValue::Blank;

/// Read access to a rectangular grid of cells, indexed by zero-based row and column.
///
/// The extraction algorithm only needs this trait, so any loader (CSV text,
/// workbook sheet, in-memory fixture) can feed it.
pub trait CellAccessor {
    /// Number of rows in the grid (rows may have different lengths)
    fn row_count(&self) -> usize;

    /// Get a cell, or `None` if the coordinate is outside the grid
    fn cell(&self, row: usize, col: usize) -> Option<&CellValue>;

    /// Get a cell, treating anything outside the grid as blank
    fn value(&self, row: usize, col: usize) -> &CellValue {
        self.cell(row, col).unwrap_or(&BLANK)
    }
}

/// The first sheet of one source file, as loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// Row data; rows are not padded
    pub rows: Vec<Vec<CellValue>>,
    /// Source file path
    pub source_path: PathBuf,
}

impl Grid {
    /// Create a new empty grid
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            rows: Vec::new(),
            source_path,
        }
    }

    /// Create a grid from already-typed rows
    pub fn from_rows(source_path: impl AsRef<Path>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            rows,
            source_path: source_path.as_ref().to_path_buf(),
        }
    }

    /// Width of the widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl CellAccessor for Grid {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// A raw cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Numeric value (plain numbers and spreadsheet date serials)
    Number(f64),
    /// Text value, as written in the source
    Text(String),
    /// Empty/null cell
    Blank,
}

impl CellValue {
    /// Parse a text field into a CellValue, detecting plain numbers.
    ///
    /// Only dot-decimal notation becomes `Number`; `"12,5"` stays text and is
    /// handled by the value normalizer. Digit strings a float cannot hold
    /// exactly (`"0012345678"`, ids longer than 15 digits) also stay text.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Blank;
        }
        if is_code_like(trimmed) {
            return CellValue::Text(trimmed.to_string());
        }

        let plain = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        if plain {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return CellValue::Number(f);
                }
            }
        }

        CellValue::Text(trimmed.to_string())
    }

    /// Blank cells and whitespace-only text both count as blank
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Blank => String::new(),
        }
    }
}

/// Leading zeros or too many digits to survive a round trip through `f64`
fn is_code_like(s: &str) -> bool {
    let digits = s.strip_prefix(|c| c == '-' || c == '+').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    (digits.len() > 1 && digits.starts_with('0')) || digits.len() > 15
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_parse_number() {
        assert_eq!(CellValue::parse("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::parse("-2.5"), CellValue::Number(-2.5));
        assert_eq!(CellValue::parse(" 45000.5 "), CellValue::Number(45000.5));
    }

    #[test]
    fn test_cell_value_parse_comma_decimal_stays_text() {
        assert_eq!(CellValue::parse("12,5"), CellValue::Text("12,5".to_string()));
    }

    #[test]
    fn test_cell_value_parse_words_stay_text() {
        assert_eq!(CellValue::parse("inf"), CellValue::Text("inf".to_string()));
        assert_eq!(CellValue::parse("NaN"), CellValue::Text("NaN".to_string()));
        assert_eq!(
            CellValue::parse("15/03/2023"),
            CellValue::Text("15/03/2023".to_string())
        );
    }

    #[test]
    fn test_cell_value_parse_keeps_digit_codes() {
        assert_eq!(
            CellValue::parse("0012345678"),
            CellValue::Text("0012345678".to_string())
        );
        assert_eq!(
            CellValue::parse("1234567890123456789"),
            CellValue::Text("1234567890123456789".to_string())
        );
        assert_eq!(CellValue::parse("0"), CellValue::Number(0.0));
        assert_eq!(CellValue::parse("0.5"), CellValue::Number(0.5));
        assert_eq!(CellValue::parse("-0.25"), CellValue::Number(-0.25));
        assert_eq!(
            CellValue::parse("123456789012345"),
            CellValue::Number(123456789012345.0)
        );
    }

    #[test]
    fn test_cell_value_parse_empty() {
        assert_eq!(CellValue::parse(""), CellValue::Blank);
        assert_eq!(CellValue::parse("   "), CellValue::Blank);
    }

    #[test]
    fn test_cell_value_is_blank() {
        assert!(CellValue::Blank.is_blank());
        assert!(CellValue::Text("  ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_grid_out_of_bounds_reads_blank() {
        let grid = Grid::from_rows("t.csv", vec![vec![CellValue::Number(1.0)]]);
        assert_eq!(grid.cell(5, 5), None);
        assert_eq!(grid.value(5, 5), &CellValue::Blank);
        assert_eq!(grid.value(0, 0), &CellValue::Number(1.0));
    }

    #[test]
    fn test_column_count_uses_widest_row() {
        let grid = Grid::from_rows(
            "t.csv",
            vec![vec![CellValue::Blank], vec![CellValue::Blank; 4], vec![]],
        );
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.column_count(), 4);
    }

    #[test]
    fn test_number_display_drops_integral_fraction() {
        assert_eq!(CellValue::Number(1234567.0).to_string_value(), "1234567");
        assert_eq!(CellValue::Number(2.5).to_string_value(), "2.5");
    }
}
