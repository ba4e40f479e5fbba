//! Text functions

use cellcalc_core::CellError;

use super::args::{arg, numeric_null_bool, text};
use super::{FunctionContext, FunctionRegistry};
use crate::broadcast::{self, has_array};
use crate::value::FormulaValue;

/// Longest text a cell can hold
pub const MAX_TEXT_LEN: usize = 32767;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("LEN", 1, Some(1), fn_len);
    registry.add("UPPER", 1, Some(1), fn_upper);
    registry.add("LOWER", 1, Some(1), fn_lower);
    registry.add("TRIM", 1, Some(1), fn_trim);
    registry.add("LEFT", 1, Some(2), fn_left);
    registry.add("RIGHT", 1, Some(2), fn_right);
    registry.add("MID", 3, Some(3), fn_mid);
    registry.add("CONCAT", 1, None, fn_concat);
    registry.add("CONCATENATE", 1, None, fn_concatenate);
}

fn map_text(args: &[FormulaValue], f: fn(&str) -> FormulaValue) -> FormulaValue {
    broadcast::map(arg(args, 0), |v| match text(v) {
        Ok(s) => f(&s),
        Err(e) => FormulaValue::Error(e),
    })
}

/// Character count argument: truncated, negative is `#VALUE!`
fn char_count(value: &FormulaValue) -> Result<usize, CellError> {
    let n = numeric_null_bool(value)?.trunc();
    if n < 0.0 {
        Err(CellError::Value)
    } else {
        Ok(n.min(MAX_TEXT_LEN as f64) as usize)
    }
}

fn checked_text(s: String) -> FormulaValue {
    if s.chars().count() > MAX_TEXT_LEN {
        FormulaValue::Error(CellError::Value)
    } else {
        FormulaValue::String(s)
    }
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    map_text(args, |s| FormulaValue::Number(s.chars().count() as f64))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    map_text(args, |s| FormulaValue::String(s.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    map_text(args, |s| FormulaValue::String(s.to_lowercase()))
}

/// TRIM(text) - strips the ends and collapses inner runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    map_text(args, |s| {
        FormulaValue::String(s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
    })
}

fn slice_text(
    args: &[FormulaValue],
    take: impl Fn(&str, usize) -> String,
) -> FormulaValue {
    let s = match text(arg(args, 0)) {
        Ok(s) => s,
        Err(e) => return FormulaValue::Error(e),
    };
    let n = match args.get(1) {
        Some(value) => match char_count(value) {
            Ok(n) => n,
            Err(e) => return FormulaValue::Error(e),
        },
        None => 1,
    };
    FormulaValue::String(take(&s, n))
}

/// LEFT(text, [num_chars=1])
pub fn fn_left(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_left(a, ctx));
    }
    slice_text(args, |s, n| s.chars().take(n).collect())
}

/// RIGHT(text, [num_chars=1])
pub fn fn_right(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_right(a, ctx));
    }
    slice_text(args, |s, n| {
        let len = s.chars().count();
        s.chars().skip(len.saturating_sub(n)).collect()
    })
}

/// MID(text, start_num, num_chars) - `start_num` is 1-based
pub fn fn_mid(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_mid(a, ctx));
    }
    let s = match text(arg(args, 0)) {
        Ok(s) => s,
        Err(e) => return FormulaValue::Error(e),
    };
    let start = match numeric_null_bool(arg(args, 1)) {
        Ok(n) if n.trunc() >= 1.0 => n.trunc().min(MAX_TEXT_LEN as f64 + 1.0) as usize,
        Ok(_) => return FormulaValue::Error(CellError::Value),
        Err(e) => return FormulaValue::Error(e),
    };
    match char_count(arg(args, 2)) {
        Ok(n) => FormulaValue::String(s.chars().skip(start - 1).take(n).collect()),
        Err(e) => FormulaValue::Error(e),
    }
}

/// CONCAT(text1, ...) - ranges are joined row-major
pub fn fn_concat(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    let mut out = String::new();
    for value in args.iter().flat_map(FormulaValue::flatten) {
        match value {
            FormulaValue::Error(e) => return FormulaValue::Error(e),
            other => out.push_str(&other.as_string()),
        }
    }
    checked_text(out)
}

/// CONCATENATE(text1, ...) - grids broadcast element-wise
pub fn fn_concatenate(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_concatenate(a, ctx));
    }
    let mut out = String::new();
    for value in args {
        match text(value) {
            Ok(s) => out.push_str(&s),
            Err(e) => return FormulaValue::Error(e),
        }
    }
    checked_text(out)
}
