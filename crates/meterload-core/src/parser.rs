//! Loaders that turn a source file's first sheet into a [`Grid`]

use crate::error::{Error, Result};
use crate::grid::{CellValue, Grid};
use calamine::{open_workbook_auto, Data, Reader};
use std::fs;
use std::path::Path;

const TEXT_EXTENSIONS: &[&str] = &["csv", "txt", "tsv"];
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Source formats that can be loaded into a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text
    Text,
    /// Spreadsheet workbook (first sheet only)
    Workbook,
}

impl SourceFormat {
    /// Detect the format from the file extension
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Text)
        } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Workbook)
        } else {
            None
        }
    }
}

/// Load the first sheet of a spreadsheet or delimited text file
pub fn load_grid<P: AsRef<Path>>(path: P) -> Result<Grid> {
    let path = path.as_ref();
    let grid = match SourceFormat::detect(path) {
        Some(SourceFormat::Text) => parse_csv(path)?,
        Some(SourceFormat::Workbook) => parse_workbook(path)?,
        None => return Err(Error::UnsupportedFormat(path.to_path_buf())),
    };

    tracing::debug!(
        path = %path.display(),
        rows = grid.rows.len(),
        columns = grid.column_count(),
        "loaded grid"
    );
    Ok(grid)
}

/// Parse a delimited text file into a Grid.
///
/// Files that are not valid UTF-8 (older metering exports are often Latin-1)
/// are decoded lossily rather than rejected.
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Grid> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let content = String::from_utf8_lossy(&bytes);
    parse_csv_str(&content, path)
}

/// Parse delimited text from a string (useful for testing)
pub fn parse_csv_str<P: AsRef<Path>>(content: &str, source: P) -> Result<Grid> {
    let path = source.as_ref();
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let delimiter = sniff_delimiter(content);

    // csv skips blank lines; keep them as rows so anchors match the sheet
    let padded: Vec<String> = content
        .lines()
        .map(|l| {
            if l.trim().is_empty() {
                (delimiter as char).to_string()
            } else {
                l.to_string()
            }
        })
        .collect();
    let padded = padded.join("\n");

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Allow varying number of fields
        .delimiter(delimiter)
        .from_reader(padded.as_bytes());

    let mut grid = Grid::new(path.to_path_buf());
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        grid.rows.push(record.iter().map(CellValue::parse).collect());
    }

    Ok(grid)
}

/// Non-empty lines inspected when sniffing the delimiter
const SNIFF_LINES: usize = 20;

/// Pick the field separator: the candidate present on the most of the first
/// non-empty lines, preferring `;`, then tab, then `,` on a tie.
///
/// Counting lines rather than a single line lets a separator-free title row
/// through, and a decimal comma on every `;` row only ties with `;`.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best = (0, b',');
    for candidate in [b';', b'\t', b','] {
        let hits = sample
            .iter()
            .filter(|l| l.as_bytes().contains(&candidate))
            .count();
        if hits > best.0 {
            best = (hits, candidate);
        }
    }
    best.1
}

/// Load the first sheet of a workbook.
///
/// Grid coordinates are absolute sheet coordinates: a used range starting
/// at B3 still puts B3 at row 2, column 1.
pub fn parse_workbook<P: AsRef<Path>>(path: P) -> Result<Grid> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path).map_err(|e| Error::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::EmptyWorkbook(path.to_path_buf()))?
        .map_err(|e| Error::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let (first_row, first_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid = Grid::new(path.to_path_buf());
    grid.rows.resize_with(first_row, Vec::new);
    for row in range.rows() {
        let mut cells = vec![CellValue::Blank; first_col];
        cells.extend(row.iter().map(convert_cell));
        grid.rows.push(cells);
    }

    Ok(grid)
}

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Blank
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::Error(_) | Data::Empty => CellValue::Blank,
    }
}
