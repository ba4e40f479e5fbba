//! Worksheet type

use ahash::AHashMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet: sparse cell content keyed by (row, col)
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: AHashMap<(u32, u16), CellValue>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: AHashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Raw content at a position, `None` for never-written cells
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Get cell content by address string (e.g., "A1")
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col).cloned().unwrap_or_default()
    }

    // === Cell Modification ===

    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Store a value; writing `CellValue::Empty` removes the cell
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        Self::validate_cell_position(row, col)?;
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&(row, col));
            }
            value => {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }

    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Store formula text ('=' is added when missing)
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.set_cell_value_at(row, col, CellValue::formula(formula))
    }

    pub fn clear_cell(&mut self, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.clear_cell_at(addr.row, addr.col);
        Ok(())
    }

    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(&(row, col));
    }

    // === Enumeration ===

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Every formula cell as (row, col, text), in no particular order
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter()
            .filter_map(|(&(row, col), value)| value.formula_text().map(|text| (row, col, text)))
    }

    /// Bounds of all stored cells
    pub fn used_range(&self) -> Option<CellRange> {
        let mut keys = self.cells.keys();
        let &(row, col) = keys.next()?;
        let (mut min_row, mut min_col, mut max_row, mut max_col) = (row, col, row, col);
        for &(row, col) in keys {
            min_row = min_row.min(row);
            max_row = max_row.max(row);
            min_col = min_col.min(col);
            max_col = max_col.max(col);
        }
        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    fn validate_cell_position(row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_get_values() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value("B2", 42.0).unwrap();
        ws.set_cell_formula("C3", "B2*2").unwrap();

        assert_eq!(ws.get_value("B2").unwrap(), CellValue::Number(42.0));
        assert_eq!(ws.get_value("C3").unwrap().formula_text(), Some("=B2*2"));
        assert_eq!(ws.get_value("Z9").unwrap(), CellValue::Empty);
        assert_eq!(ws.cell_count(), 2);
    }

    #[test]
    fn test_empty_value_removes_cell() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value_at(0, 0, 1.0).unwrap();
        ws.set_cell_value_at(0, 0, CellValue::Empty).unwrap();
        assert!(ws.cell_at(0, 0).is_none());
    }

    #[test]
    fn test_formula_cells_and_used_range() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_formula("D5", "=A1").unwrap();

        let formulas: Vec<_> = ws.formula_cells().collect();
        assert_eq!(formulas, vec![(4, 3, "=A1")]);
        assert_eq!(ws.used_range().unwrap().to_string(), "A1:D5");
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut ws = Worksheet::new("Data");
        assert!(ws.set_cell_value_at(MAX_ROWS, 0, 1.0).is_err());
        assert!(ws.set_cell_value_at(0, MAX_COLS, 1.0).is_err());
    }
}
