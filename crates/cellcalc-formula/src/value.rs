//! Runtime values produced while evaluating formulas

use std::fmt;

use cellcalc_core::{CellError, CellValue};

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Rectangular grid (array constant, range read or array result)
    Array(Grid),
    /// Blank cell or omitted argument
    Empty,
}

impl FormulaValue {
    /// Numeric view used by arithmetic: blanks are 0, booleans 0/1, and text
    /// only when it reads as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => parse_number(s),
            FormulaValue::Empty => Some(0.0),
            FormulaValue::Error(_) | FormulaValue::Array(_) => None,
        }
    }

    /// Arithmetic coercion: errors pass through, other failures are `#VALUE!`
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            other => other.as_number().ok_or(CellError::Value),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Some(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Some(false),
            _ => None,
        }
    }

    /// Logical coercion: errors pass through, other failures are `#VALUE!`
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            other => other.as_bool().ok_or(CellError::Value),
        }
    }

    /// Text view used by `&` and the text functions
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(grid) => grid.top_left().as_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FormulaValue::Array(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FormulaValue::Empty)
    }

    pub fn error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Collapse a grid to its top-left value; scalars are returned as is
    pub fn into_scalar(self) -> FormulaValue {
        match self {
            FormulaValue::Array(grid) => grid.top_left().clone(),
            other => other,
        }
    }

    /// All values in row-major order (a scalar yields itself)
    pub fn flatten(&self) -> Vec<FormulaValue> {
        match self {
            FormulaValue::Array(grid) => grid.values().to_vec(),
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Array(grid) => write!(f, "{}", grid),
            other => f.write_str(&other.as_string()),
        }
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::String(s) => FormulaValue::String(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
            // Formula cells are resolved by the calculation engine, never here
            CellValue::Formula { .. } => FormulaValue::Error(CellError::Calc),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::String(s)
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

impl From<Grid> for FormulaValue {
    fn from(grid: Grid) -> Self {
        FormulaValue::Array(grid)
    }
}

/// Rectangular, row-major grid of values
///
/// A grid has at least one row and one column and never contains another
/// grid: constructors replace a nested grid by its top-left value.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    values: Vec<FormulaValue>,
}

impl Grid {
    /// Build a grid from row-major values; `None` when the shape is empty or
    /// does not match the number of values
    pub fn new(rows: usize, cols: usize, values: Vec<FormulaValue>) -> Option<Self> {
        if rows == 0 || cols == 0 || rows.checked_mul(cols)? != values.len() {
            return None;
        }
        let values = values.into_iter().map(FormulaValue::into_scalar).collect();
        Some(Self { rows, cols, values })
    }

    /// Build a grid from rows; `None` for no rows, empty rows or ragged rows
    pub fn from_rows(rows: Vec<Vec<FormulaValue>>) -> Option<Self> {
        let cols = rows.first()?.len();
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        let row_count = rows.len();
        Self::new(row_count, cols, rows.into_iter().flatten().collect())
    }

    /// Single-row grid
    pub fn row(values: Vec<FormulaValue>) -> Option<Self> {
        Self::new(1, values.len(), values)
    }

    /// Grid of one repeated value (dimensions below 1 are raised to 1)
    pub fn filled(rows: usize, cols: usize, value: FormulaValue) -> Self {
        let (rows, cols) = (rows.max(1), cols.max(1));
        Self {
            rows,
            cols,
            values: vec![value.into_scalar(); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&FormulaValue> {
        if row < self.rows && col < self.cols {
            self.values.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn top_left(&self) -> &FormulaValue {
        &self.values[0]
    }

    /// Values in row-major order
    pub fn values(&self) -> &[FormulaValue] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormulaValue> {
        self.values.iter()
    }

    pub fn into_values(self) -> Vec<FormulaValue> {
        self.values
    }

    /// Copy out as nested rows
    pub fn to_rows(&self) -> Vec<Vec<FormulaValue>> {
        self.values.chunks(self.cols).map(<[_]>::to_vec).collect()
    }

    /// Apply `f` to every value, keeping the shape
    pub fn map(&self, f: impl FnMut(&FormulaValue) -> FormulaValue) -> Grid {
        Grid {
            rows: self.rows,
            cols: self.cols,
            values: self
                .values
                .iter()
                .map(f)
                .map(FormulaValue::into_scalar)
                .collect(),
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (r, row) in self.values.chunks(self.cols).enumerate() {
            if r > 0 {
                f.write_str(";")?;
            }
            for (c, value) in row.iter().enumerate() {
                if c > 0 {
                    f.write_str(",")?;
                }
                match value {
                    FormulaValue::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\""))?,
                    other => write!(f, "{}", other)?,
                }
            }
        }
        f.write_str("}")
    }
}

/// Read text as a number the way arithmetic coercion does
///
/// Accepts an optional sign, digits with an optional fraction and exponent,
/// and a trailing `%`. Surrounding whitespace is ignored.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let (body, scale) = match text.strip_suffix('%') {
        Some(body) => (body.trim_end(), 0.01),
        None => (text, 1.0),
    };

    let digits = body.trim_start_matches(|c| c == '+' || c == '-');
    if digits.is_empty()
        || body.len() - digits.len() > 1
        || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }

    body.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n * scale)
}

/// General number format: integers without a fraction, otherwise at most 15
/// significant digits
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded: f64 = format!("{:.14e}", n).parse().unwrap_or(n);
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-1.5e2"), Some(-150.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("50%"), Some(0.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("--1"), None);
        assert_eq!(parse_number("1e400"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(FormulaValue::Empty.to_number(), Ok(0.0));
        assert_eq!(FormulaValue::Boolean(true).to_number(), Ok(1.0));
        assert_eq!(FormulaValue::from(" 7 ").to_number(), Ok(7.0));
        assert_eq!(FormulaValue::from("seven").to_number(), Err(CellError::Value));
        assert_eq!(
            FormulaValue::Error(CellError::Na).to_number(),
            Err(CellError::Na)
        );
        assert_eq!(FormulaValue::from("true").to_bool(), Ok(true));
        assert_eq!(FormulaValue::Number(0.0).to_bool(), Ok(false));
        assert_eq!(FormulaValue::Boolean(false).as_string(), "FALSE");
    }

    #[test]
    fn test_grid_shape_rules() {
        assert!(Grid::new(0, 1, vec![]).is_none());
        assert!(Grid::new(2, 2, vec![FormulaValue::Empty; 3]).is_none());
        assert!(Grid::from_rows(vec![vec![1.0.into()], vec![]]).is_none());

        let grid = Grid::from_rows(vec![
            vec![1.0.into(), 2.0.into()],
            vec![3.0.into(), 4.0.into()],
        ])
        .unwrap();
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid.get(1, 0), Some(&FormulaValue::Number(3.0)));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.to_string(), "{1,2;3,4}");
    }

    #[test]
    fn test_grids_do_not_nest() {
        let inner = Grid::row(vec![5.0.into(), 6.0.into()]).unwrap();
        let outer = Grid::row(vec![FormulaValue::Array(inner), "x".into()]).unwrap();
        assert_eq!(outer.values()[0], FormulaValue::Number(5.0));
        assert_eq!(outer.to_string(), "{5,\"x\"}");
    }
}
