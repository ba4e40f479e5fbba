//! Pseudo-table queries behind the conditional aggregation functions
//!
//! A conditional aggregate lays its ranges out as named columns of one
//! transient table, selects the rows where every criterion holds and folds
//! the value column over those rows.

use cellcalc_core::CellError;

use crate::functions::criteria::Criterion;
use crate::value::FormulaValue;

/// Criteria column of the single-criterion functions
pub const CONDITION: &str = "CONDITION";

/// Column folded by the aggregate
pub const VALUE: &str = "VALUE";

/// Name of the `n`th criteria column of a multi-criteria function (1-based)
pub fn conditional_column(n: usize) -> String {
    format!("CONDITIONAL {}", n)
}

/// How matching rows of the value column are folded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Average,
    Min,
    Max,
}

/// Named columns of equal length
#[derive(Debug, Clone, Default)]
pub struct PseudoTable {
    columns: Vec<(String, Vec<FormulaValue>)>,
}

impl PseudoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; every column is padded with blanks to the longest one
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<FormulaValue>) -> Self {
        self.columns.push((name.into(), values));
        let rows = self.len();
        for (_, column) in &mut self.columns {
            column.resize(rows, FormulaValue::Empty);
        }
        self
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[FormulaValue]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Rows where every criterion matches its column
    ///
    /// A criterion on an unknown column matches no row.
    pub fn filter(&self, criteria: &[(&str, Criterion)]) -> Vec<usize> {
        let columns: Option<Vec<(&[FormulaValue], &Criterion)>> = criteria
            .iter()
            .map(|(name, criterion)| self.column(name).map(|c| (c, criterion)))
            .collect();
        let Some(columns) = columns else {
            return Vec::new();
        };

        (0..self.len())
            .filter(|&row| {
                columns
                    .iter()
                    .all(|(column, criterion)| criterion.matches(&column[row]))
            })
            .collect()
    }

    /// Fold `column` over `rows`
    ///
    /// Sum, Average, Min and Max read numbers only; the first error in a
    /// selected row is the result. Average of nothing is `#DIV/0!`, Min and
    /// Max of nothing are 0.
    pub fn aggregate(&self, column: &str, rows: &[usize], aggregate: Aggregate) -> FormulaValue {
        if aggregate == Aggregate::Count {
            return FormulaValue::Number(rows.len() as f64);
        }

        let values = self.column(column).unwrap_or(&[]);
        let mut numbers = Vec::with_capacity(rows.len());
        for value in rows.iter().filter_map(|&row| values.get(row)) {
            match value {
                FormulaValue::Number(n) => numbers.push(*n),
                FormulaValue::Error(e) => return FormulaValue::Error(*e),
                _ => {}
            }
        }

        match aggregate {
            Aggregate::Count => FormulaValue::Number(rows.len() as f64),
            Aggregate::Sum => FormulaValue::Number(numbers.iter().sum()),
            Aggregate::Average if numbers.is_empty() => FormulaValue::Error(CellError::Div0),
            Aggregate::Average => {
                FormulaValue::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
            Aggregate::Min => FormulaValue::Number(numbers.iter().copied().reduce(f64::min).unwrap_or(0.0)),
            Aggregate::Max => FormulaValue::Number(numbers.iter().copied().reduce(f64::max).unwrap_or(0.0)),
        }
    }
}
