//! Argument coercion shared by the function implementations

use cellcalc_core::CellError;

use crate::value::{parse_number, FormulaValue};

/// Argument `index`, or blank when it was not supplied
pub fn arg(args: &[FormulaValue], index: usize) -> &FormulaValue {
    static EMPTY: FormulaValue = FormulaValue::Empty;
    args.get(index).unwrap_or(&EMPTY)
}

/// Number, blank (0), boolean (0/1) or numeric text
///
/// Errors are returned as is; any other text is `#VALUE!`.
pub fn numeric_null_bool(value: &FormulaValue) -> Result<f64, CellError> {
    match value {
        FormulaValue::Number(n) => Ok(*n),
        FormulaValue::Empty => Ok(0.0),
        FormulaValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        FormulaValue::String(s) => parse_number(s).ok_or(CellError::Value),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(grid) => numeric_null_bool(grid.top_left()),
    }
}

/// Number or numeric text; blank becomes `substitute` or `#VALUE!` when there
/// is none; booleans are `#VALUE!`
pub fn numeric_null_substitution(
    value: &FormulaValue,
    substitute: Option<f64>,
) -> Result<f64, CellError> {
    match value {
        FormulaValue::Number(n) => Ok(*n),
        FormulaValue::Empty => substitute.ok_or(CellError::Value),
        FormulaValue::String(s) => parse_number(s).ok_or(CellError::Value),
        FormulaValue::Boolean(_) => Err(CellError::Value),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(grid) => numeric_null_substitution(grid.top_left(), substitute),
    }
}

/// Optional numeric argument: omitted gives `default`, supplied values go
/// through [`numeric_null_bool`]
pub fn optional_number(args: &[FormulaValue], index: usize, default: f64) -> Result<f64, CellError> {
    match args.get(index) {
        Some(value) => numeric_null_bool(value),
        None => Ok(default),
    }
}

/// Text view of a scalar argument; errors pass through
pub fn text(value: &FormulaValue) -> Result<String, CellError> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(grid) => text(grid.top_left()),
        other => Ok(other.as_string()),
    }
}

/// Wrap a computed number, mapping NaN and infinities to `#NUM!`
pub fn number_result(n: f64) -> FormulaValue {
    if n.is_finite() {
        FormulaValue::Number(n)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// Turn a coercion result into a value
pub fn into_value(result: Result<f64, CellError>) -> FormulaValue {
    match result {
        Ok(n) => number_result(n),
        Err(e) => FormulaValue::Error(e),
    }
}
