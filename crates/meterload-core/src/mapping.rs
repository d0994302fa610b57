//! Declarative row/column mapping from grid cells to semantic fields

use crate::error::{Error, Result};
use crate::reading::Quantity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A zero-based (row, column) anchor in a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row distance from `base`, negative when this anchor sits above it
    pub fn row_offset_from(&self, base: CellRef) -> i64 {
        self.row as i64 - base.row as i64
    }
}

/// Which cell holds each semantic field.
///
/// Anchors are taken from the first file's layout. While walking data rows,
/// every field except the date and CPE is read at the same row distance from
/// the current date row as its anchor is from the date anchor, so one mapping
/// covers every row of every file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// First data row and the column holding the date (or full timestamp)
    pub date: CellRef,
    /// Separate time-of-day column, if the export splits date and time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<CellRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<CellRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inductive: Option<CellRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacitive: Option<CellRef>,
    /// Installation identifier, read once from the first file at this fixed cell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpe: Option<CellRef>,
}

impl FieldMapping {
    /// Create a mapping with only the date anchor set
    pub fn new(date: CellRef) -> Self {
        Self {
            date,
            time: None,
            active: None,
            inductive: None,
            capacitive: None,
            cpe: None,
        }
    }

    /// Anchor for a quantity column, if mapped
    pub fn quantity(&self, quantity: Quantity) -> Option<CellRef> {
        match quantity {
            Quantity::Active => self.active,
            Quantity::Inductive => self.inductive,
            Quantity::Capacitive => self.capacitive,
        }
    }

    /// Row distance of the time cell from the date cell (0 when unmapped)
    pub fn time_offset(&self) -> i64 {
        self.time
            .map(|t| t.row_offset_from(self.date))
            .unwrap_or(0)
    }

    /// True when at least one quantity column is mapped
    pub fn has_quantities(&self) -> bool {
        Quantity::ALL.iter().any(|q| self.quantity(*q).is_some())
    }

    /// Reject mappings that point two fields at the same cell.
    ///
    /// Unmapped quantities are fine; they read as zero (a mapping with none
    /// at all is logged).
    pub fn validate(&self) -> Result<()> {
        let mut taken = vec![("date", self.date)];
        if let Some(time) = self.time {
            taken.push(("time", time));
        }
        for quantity in Quantity::ALL {
            if let Some(anchor) = self.quantity(quantity) {
                taken.push((quantity.name(), anchor));
            }
        }

        for (i, (name, anchor)) in taken.iter().enumerate() {
            if let Some((other, _)) = taken[..i].iter().find(|(_, a)| a == anchor) {
                return Err(Error::InvalidMapping(format!(
                    "{name} and {other} both point at row {}, column {}",
                    anchor.row, anchor.col
                )));
            }
        }

        if !self.has_quantities() {
            tracing::warn!("mapping has no quantity columns; every value will read 0");
        }
        Ok(())
    }

    /// A starting point for hand-editing: date/time/active/inductive/capacitive
    /// in columns A..E with data from the second row, CPE in B1
    pub fn template() -> Self {
        Self {
            date: CellRef::new(1, 0),
            time: Some(CellRef::new(1, 1)),
            active: Some(CellRef::new(1, 2)),
            inductive: Some(CellRef::new(1, 3)),
            capacitive: Some(CellRef::new(1, 4)),
            cpe: Some(CellRef::new(0, 1)),
        }
    }

    /// Load a mapping from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the mapping to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_offset() {
        let mut mapping = FieldMapping::new(CellRef::new(5, 0));
        assert_eq!(mapping.time_offset(), 0);

        mapping.time = Some(CellRef::new(6, 0));
        assert_eq!(mapping.time_offset(), 1);

        mapping.time = Some(CellRef::new(3, 2));
        assert_eq!(mapping.time_offset(), -2);
    }

    #[test]
    fn test_quantity_lookup() {
        let mapping = FieldMapping::template();
        assert_eq!(mapping.quantity(Quantity::Inductive), Some(CellRef::new(1, 3)));
        assert!(mapping.has_quantities());
        assert!(!FieldMapping::new(CellRef::new(0, 0)).has_quantities());
    }

    #[test]
    fn test_mapping_json_round_trip_omits_unmapped() {
        let mut mapping = FieldMapping::new(CellRef::new(2, 0));
        mapping.active = Some(CellRef::new(2, 3));

        let json = serde_json::to_string(&mapping).unwrap();
        assert!(!json.contains("inductive"));

        let loaded: FieldMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, mapping);
    }

    #[test]
    fn test_validate_rejects_shared_cells() {
        assert!(FieldMapping::template().validate().is_ok());

        let mut mapping = FieldMapping::new(CellRef::new(1, 0));
        mapping.active = Some(CellRef::new(1, 2));
        mapping.capacitive = Some(CellRef::new(1, 2));
        let err = mapping.validate().unwrap_err();
        assert!(err.to_string().contains("capacitive and active"));

        mapping.capacitive = None;
        mapping.time = Some(CellRef::new(1, 0));
        assert!(matches!(mapping.validate(), Err(Error::InvalidMapping(_))));
    }

    #[test]
    fn test_mapping_requires_date() {
        let err = serde_json::from_str::<FieldMapping>(r#"{"active": {"row": 1, "col": 2}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");

        FieldMapping::template().save(&path).unwrap();
        let loaded = FieldMapping::load(&path).unwrap();
        assert_eq!(loaded, FieldMapping::template());
    }
}
