//! Information functions

use cellcalc_core::CellError;

use super::args::arg;
use super::{FunctionContext, FunctionRegistry};
use crate::broadcast;
use crate::value::FormulaValue;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("ISBLANK", 1, Some(1), fn_isblank);
    registry.add("ISNUMBER", 1, Some(1), fn_isnumber);
    registry.add("ISTEXT", 1, Some(1), fn_istext);
    registry.add("ISLOGICAL", 1, Some(1), fn_islogical);
    registry.add("ISERROR", 1, Some(1), fn_iserror);
    registry.add("ISERR", 1, Some(1), fn_iserr);
    registry.add("ISNA", 1, Some(1), fn_isna);
    registry.add("NA", 0, Some(0), fn_na);
}

fn test_each(args: &[FormulaValue], predicate: fn(&FormulaValue) -> bool) -> FormulaValue {
    broadcast::map(arg(args, 0), |v| FormulaValue::Boolean(predicate(v)))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, FormulaValue::is_empty)
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, |v| matches!(v, FormulaValue::Boolean(_)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, FormulaValue::is_error)
}

/// ISERR(value) - any error except `#N/A`
pub fn fn_iserr(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, |v| v.is_error() && v.error() != Some(CellError::Na))
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    test_each(args, |v| v.error() == Some(CellError::Na))
}

/// NA()
pub fn fn_na(_args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    FormulaValue::Error(CellError::Na)
}
