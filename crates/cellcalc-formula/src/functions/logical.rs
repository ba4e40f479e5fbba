//! Logical functions

use cellcalc_core::CellError;

use super::args::arg;
use super::{FunctionContext, FunctionRegistry};
use crate::broadcast::{self, has_array};
use crate::value::FormulaValue;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("IF", 1, Some(3), fn_if);
    registry.add("AND", 1, None, fn_and);
    registry.add("OR", 1, None, fn_or);
    registry.add("XOR", 1, None, fn_xor);
    registry.add("NOT", 1, Some(1), fn_not);
    registry.add("IFERROR", 2, Some(2), fn_iferror);
    registry.add("IFNA", 2, Some(2), fn_ifna);
    registry.add("TRUE", 0, Some(0), fn_true);
    registry.add("FALSE", 0, Some(0), fn_false);
}

/// A blank result slot reads as 0, the way an empty argument does in a cell
fn result(value: &FormulaValue) -> FormulaValue {
    match value {
        FormulaValue::Empty => FormulaValue::Number(0.0),
        other => other.clone(),
    }
}

/// IF(condition, [value_if_true], [value_if_false])
///
/// An omitted true branch gives 0 and an omitted false branch gives FALSE.
pub fn fn_if(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_if(a, ctx));
    }

    let condition = match arg(args, 0).to_bool() {
        Ok(b) => b,
        Err(e) => return FormulaValue::Error(e),
    };

    if condition {
        result(arg(args, 1))
    } else if args.len() < 3 {
        FormulaValue::Boolean(false)
    } else {
        result(arg(args, 2))
    }
}

/// Fold the logical values of every argument
///
/// Inside grids only numbers and booleans count; direct text must read as
/// TRUE or FALSE. `#VALUE!` when nothing logical was seen.
fn fold_logical(
    args: &[FormulaValue],
    init: bool,
    f: impl Fn(bool, bool) -> bool,
) -> FormulaValue {
    let mut acc = init;
    let mut seen = false;

    for value in args {
        match value {
            FormulaValue::Array(grid) => {
                for item in grid.iter() {
                    match item {
                        FormulaValue::Error(e) => return FormulaValue::Error(*e),
                        FormulaValue::Number(_) | FormulaValue::Boolean(_) => {
                            acc = f(acc, item.as_bool().unwrap_or(false));
                            seen = true;
                        }
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => match other.to_bool() {
                Ok(b) => {
                    acc = f(acc, b);
                    seen = true;
                }
                Err(e) => return FormulaValue::Error(e),
            },
        }
    }

    if seen {
        FormulaValue::Boolean(acc)
    } else {
        FormulaValue::Error(CellError::Value)
    }
}

/// AND(logical1, ...)
pub fn fn_and(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    fold_logical(args, true, |acc, b| acc && b)
}

/// OR(logical1, ...)
pub fn fn_or(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    fold_logical(args, false, |acc, b| acc || b)
}

/// XOR(logical1, ...) - TRUE when an odd number of values are TRUE
pub fn fn_xor(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    fold_logical(args, false, |acc, b| acc ^ b)
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    broadcast::map(arg(args, 0), |v| match v.to_bool() {
        Ok(b) => FormulaValue::Boolean(!b),
        Err(e) => FormulaValue::Error(e),
    })
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_iferror(a, ctx));
    }
    match arg(args, 0) {
        FormulaValue::Error(_) => result(arg(args, 1)),
        value => result(value),
    }
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_ifna(a, ctx));
    }
    match arg(args, 0) {
        FormulaValue::Error(CellError::Na) => result(arg(args, 1)),
        value => result(value),
    }
}

pub fn fn_true(_args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    FormulaValue::Boolean(true)
}

pub fn fn_false(_args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    FormulaValue::Boolean(false)
}
