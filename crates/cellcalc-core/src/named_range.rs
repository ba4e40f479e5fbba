//! Defined names
//!
//! A name maps to the text of a reference, constant or expression. The
//! formula engine compiles `refers_to` when the name is used:
//!
//! ```text
//! workbook.define_name("TaxRate", "Sheet1!$B$1")?;
//! =Price * TaxRate
//! ```

use ahash::AHashMap;

use crate::cell::CellAddress;
use crate::error::{Error, Result};

/// Scope of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Visible only from formulas on one sheet; shadows a workbook name
    Sheet(usize),
}

/// A defined name
///
/// `refers_to` can be:
/// - a single cell: `Sheet1!$A$1`
/// - a range: `Sheet1!$A$1:$D$10`
/// - a constant: `0.0725`
/// - an expression, with or without '=': `=SUM(Sales)`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// The name as written; lookups are case-insensitive
    pub name: String,
    pub scope: NameScope,
    pub refers_to: String,
    pub comment: Option<String>,
}

impl NamedRange {
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
            comment: None,
        }
    }

    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The expression to compile, without a leading '='
    pub fn expression(&self) -> &str {
        self.refers_to
            .strip_prefix('=')
            .unwrap_or(&self.refers_to)
            .trim()
    }

    /// Names start with a letter, '_' or '\\', continue with letters, digits,
    /// '_' or '.', and must not read as a cell address or a boolean.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        let first_ok = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '\\');
        first_ok
            && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
            && CellAddress::parse(name).is_err()
            && !name.eq_ignore_ascii_case("TRUE")
            && !name.eq_ignore_ascii_case("FALSE")
    }
}

/// Defined names indexed by (lower-case name, scope)
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    ranges: AHashMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Define a new name; fails on an invalid name or a duplicate in the same scope
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        if !NamedRange::is_valid_name(&range.name) {
            return Err(Error::InvalidName(range.name));
        }

        let key = Self::key(&range.name, range.scope);
        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' already exists in this scope",
                range.name
            )));
        }

        self.ranges.insert(key, range);
        Ok(())
    }

    /// Define or replace a name
    pub fn define_or_update(&mut self, range: NamedRange) -> Result<()> {
        if !NamedRange::is_valid_name(&range.name) {
            return Err(Error::InvalidName(range.name));
        }
        self.ranges.insert(Self::key(&range.name, range.scope), range);
        Ok(())
    }

    /// Look a name up from a formula on `current_sheet`
    ///
    /// A sheet-scoped name wins over a workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.ranges
            .get(&Self::key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.ranges.get(&Self::key(name, NameScope::Workbook)))
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.ranges.remove(&Self::key(name, scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.ranges.values()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_strips_equals() {
        let nr = NamedRange::workbook_scope("Total", "=SUM(A1:A10)");
        assert_eq!(nr.expression(), "SUM(A1:A10)");
        let nr = NamedRange::workbook_scope("TaxRate", "Sheet1!$B$1");
        assert_eq!(nr.expression(), "Sheet1!$B$1");
    }

    #[test]
    fn test_name_validation() {
        assert!(NamedRange::is_valid_name("TaxRate"));
        assert!(NamedRange::is_valid_name("_private.rate2"));
        assert!(!NamedRange::is_valid_name("A1"));
        assert!(!NamedRange::is_valid_name("XFD100"));
        assert!(!NamedRange::is_valid_name("1abc"));
        assert!(!NamedRange::is_valid_name("true"));
        assert!(!NamedRange::is_valid_name("has space"));
    }

    #[test]
    fn test_sheet_scope_shadows_workbook_scope() {
        let mut coll = NamedRangeCollection::new();
        coll.define(NamedRange::workbook_scope("Rate", "0.05")).unwrap();
        coll.define(NamedRange::sheet_scope("Rate", "0.08", 0)).unwrap();

        assert_eq!(coll.get("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(coll.get("Rate", 1).unwrap().refers_to, "0.05");
    }

    #[test]
    fn test_case_insensitive_lookup_and_duplicates() {
        let mut coll = NamedRangeCollection::new();
        coll.define(NamedRange::workbook_scope("TaxRate", "0.05")).unwrap();

        assert!(coll.get("taxrate", 0).is_some());
        assert!(coll.get("TAXRATE", 3).is_some());
        assert!(coll
            .define(NamedRange::workbook_scope("TAXRATE", "0.10"))
            .is_err());

        coll.define_or_update(NamedRange::workbook_scope("TAXRATE", "0.10"))
            .unwrap();
        assert_eq!(coll.get("taxrate", 0).unwrap().refers_to, "0.10");
        assert_eq!(coll.len(), 1);
    }
}
