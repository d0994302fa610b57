//! Walks a grid with a [`FieldMapping`] and emits typed readings

use crate::grid::{CellAccessor, CellValue, BLANK};
use crate::mapping::FieldMapping;
use crate::number::parse_number;
use crate::reading::{Quantity, RawReading};
use crate::timestamp::resolve_timestamp;

/// Readings from one grid, plus how many rows were dropped
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub readings: Vec<RawReading>,
    /// Rows from the date row onward whose timestamp did not resolve
    pub skipped_rows: usize,
}

/// Extract readings from every row at or below the mapped date row.
///
/// Rows whose timestamp cannot be resolved are skipped silently (headers
/// repeated mid-sheet, totals, trailing notes). A quantity whose offset row
/// falls outside the grid reads as `0.0` instead of dropping the reading.
pub fn extract<G: CellAccessor + ?Sized>(grid: &G, mapping: &FieldMapping) -> Extraction {
    let time_offset = mapping.time_offset();
    let offsets: Vec<(Quantity, Option<(i64, usize)>)> = Quantity::ALL
        .iter()
        .map(|q| {
            let anchor = mapping
                .quantity(*q)
                .map(|a| (a.row_offset_from(mapping.date), a.col));
            (*q, anchor)
        })
        .collect();

    let mut extraction = Extraction::default();
    for row in mapping.date.row..grid.row_count() {
        let date = grid.value(row, mapping.date.col);
        let time = mapping
            .time
            .map(|t| offset_value(grid, row, time_offset, t.col));

        let Some(timestamp) = resolve_timestamp(date, time) else {
            extraction.skipped_rows += 1;
            continue;
        };

        let mut reading = RawReading {
            timestamp,
            active: 0.0,
            inductive: 0.0,
            capacitive: 0.0,
        };
        for (quantity, anchor) in &offsets {
            let value = anchor
                .map(|(offset, col)| parse_number(offset_value(grid, row, offset, col)))
                .unwrap_or(0.0);
            match quantity {
                Quantity::Active => reading.active = value,
                Quantity::Inductive => reading.inductive = value,
                Quantity::Capacitive => reading.capacitive = value,
            }
        }
        extraction.readings.push(reading);
    }

    tracing::trace!(
        readings = extraction.readings.len(),
        skipped = extraction.skipped_rows,
        "extracted grid"
    );
    extraction
}

/// Read the installation identifier at its fixed anchor (never row-offset)
pub fn read_cpe<G: CellAccessor + ?Sized>(grid: &G, mapping: &FieldMapping) -> Option<String> {
    let anchor = mapping.cpe?;
    match grid.value(anchor.row, anchor.col) {
        CellValue::Blank => None,
        CellValue::Text(s) if s.trim().is_empty() => None,
        cell => Some(cell.to_string_value().trim().to_string()),
    }
}

fn offset_value<G: CellAccessor + ?Sized>(
    grid: &G,
    row: usize,
    offset: i64,
    col: usize,
) -> &CellValue {
    let target = row as i64 + offset;
    if target < 0 {
        return &BLANK;
    }
    grid.value(target as usize, col)
}
