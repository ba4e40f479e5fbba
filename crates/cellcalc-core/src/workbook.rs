//! Workbook type - sheets plus defined names

use crate::cell::CellValue;
use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// An in-memory workbook
///
/// Sheets are addressed by index; indices are stable because sheets can be
/// added and renamed but not removed or reordered.
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    named_ranges: NamedRangeCollection,
}

impl Workbook {
    /// Create a workbook with one sheet named "Sheet1"
    pub fn new() -> Self {
        Self {
            worksheets: vec![Worksheet::new("Sheet1")],
            named_ranges: NamedRangeCollection::new(),
        }
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            named_ranges: NamedRangeCollection::new(),
        }
    }

    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Index of a sheet by name (case-insensitive, as in formulas)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a sheet named "SheetN" with the first free N
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = (self.worksheets.len() + 1..)
            .map(|n| format!("Sheet{}", n))
            .find(|name| self.sheet_index(name).is_none())
            .ok_or_else(|| Error::InvalidSheetName("no free sheet name".into()))?;
        self.add_worksheet_with_name(&name)
    }

    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name, None)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        let count = self.worksheets.len();
        self.validate_sheet_name(new_name, Some(index))?;
        let sheet = self
            .worksheets
            .get_mut(index)
            .ok_or(Error::SheetOutOfBounds(index, count))?;
        sheet.set_name(new_name);
        Ok(())
    }

    /// Raw content of a cell; `None` for unknown sheets and blank cells
    pub fn cell_content(&self, sheet: usize, row: u32, col: u16) -> Option<&CellValue> {
        self.worksheets.get(sheet)?.cell_at(row, col)
    }

    // ==================== Named Ranges ====================

    /// Define a workbook-scoped name
    ///
    /// ```
    /// use cellcalc_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// assert!(wb.get_named_range("taxrate", 0).is_some());
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.named_ranges
            .define(NamedRange::new(name, refers_to, NameScope::Workbook))
    }

    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        if sheet_index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(sheet_index, self.worksheets.len()));
        }
        self.named_ranges
            .define(NamedRange::sheet_scope(name, refers_to, sheet_index))
    }

    /// Look a name up from a formula on `current_sheet`
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    pub fn remove_name(&mut self, name: &str) -> Option<NamedRange> {
        self.named_ranges.remove(name, NameScope::Workbook)
    }

    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| [':', '\\', '/', '?', '*', '[', ']'].contains(c))
        {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot start or end with an apostrophe".into(),
            ));
        }

        match self.sheet_index(name) {
            Some(i) if Some(i) != exclude_index => Err(Error::DuplicateSheetName(name.into())),
            _ => Ok(()),
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
        assert_eq!(Workbook::empty().sheet_count(), 0);
    }

    #[test]
    fn test_add_worksheets() {
        let mut wb = Workbook::new();
        assert_eq!(wb.add_worksheet().unwrap(), 1);
        assert_eq!(wb.worksheet(1).unwrap().name(), "Sheet2");
        assert_eq!(wb.add_worksheet_with_name("My Data").unwrap(), 2);
        assert_eq!(wb.sheet_index("my data"), Some(2));
    }

    #[test]
    fn test_invalid_and_duplicate_names() {
        let mut wb = Workbook::new();
        assert!(wb.add_worksheet_with_name("SHEET1").is_err());
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("Sheet/1").is_err());
        assert!(wb.add_worksheet_with_name("'quoted").is_err());
        assert!(wb
            .add_worksheet_with_name(&"A".repeat(MAX_SHEET_NAME_LEN + 1))
            .is_err());
        assert!(wb.add_worksheet_with_name("Bob's sheet").is_ok());
    }

    #[test]
    fn test_rename_keeps_index() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.rename_worksheet(1, "Inputs").unwrap();
        assert_eq!(wb.sheet_index("Inputs"), Some(1));
        assert!(wb.rename_worksheet(0, "inputs").is_err());
        assert!(wb.rename_worksheet(0, "Sheet1").is_ok());
    }

    #[test]
    fn test_cell_content_and_names() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_value("A1", 5.0).unwrap();
        assert_eq!(wb.cell_content(0, 0, 0), Some(&CellValue::Number(5.0)));
        assert_eq!(wb.cell_content(4, 0, 0), None);

        wb.define_name("Rate", "0.5").unwrap();
        wb.define_name_for_sheet("Rate", "0.7", 0).unwrap();
        assert_eq!(wb.get_named_range("rate", 0).unwrap().refers_to, "0.7");
        assert!(wb.define_name_for_sheet("Other", "1", 9).is_err());
        assert!(wb.remove_name("RATE").is_some());
    }
}
