//! Rounding functions: ROUND, ROUNDUP, ROUNDDOWN, MROUND, EVEN, ODD
//!
//! Scaled values are first re-rounded to 15 significant digits so binary
//! representation noise (`0.1 + 0.2`, `2.345 * 100`) does not push a value
//! across a rounding boundary.

use cellcalc_core::CellError;

use super::args::{arg, into_value, numeric_null_bool, numeric_null_substitution};
use super::{FunctionContext, FunctionRegistry};
use crate::broadcast::{self, has_array};
use crate::value::FormulaValue;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("ROUND", 1, Some(2), fn_round);
    registry.add("ROUNDUP", 1, Some(2), fn_roundup);
    registry.add("ROUNDDOWN", 1, Some(2), fn_rounddown);
    registry.add("MROUND", 2, Some(2), fn_mround);
    registry.add("EVEN", 1, Some(1), fn_even);
    registry.add("ODD", 1, Some(1), fn_odd);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    HalfAwayFromZero,
    AwayFromZero,
    TowardZero,
}

/// Round to 15 significant digits
fn pre_round(x: f64) -> f64 {
    format!("{:.14e}", x).parse().unwrap_or(x)
}

fn digits_arg(value: f64) -> i32 {
    value.trunc().clamp(-400.0, 400.0) as i32
}

fn round_digits(number: f64, digits: i32, mode: Mode) -> f64 {
    let digits = digits.clamp(-308, 308);
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits >= 0 {
        number * factor
    } else {
        number / factor
    };
    // Already finer than 15 significant digits can express
    if !scaled.is_finite() || scaled.abs() >= 1e15 {
        return number;
    }

    let scaled = pre_round(scaled);
    let rounded = match mode {
        Mode::HalfAwayFromZero => scaled.round(),
        Mode::AwayFromZero if scaled < 0.0 => scaled.floor(),
        Mode::AwayFromZero => scaled.ceil(),
        Mode::TowardZero => scaled.trunc(),
    };

    let result = if digits >= 0 {
        rounded / factor
    } else {
        rounded * factor
    };
    if result.is_finite() {
        result
    } else {
        number
    }
}

fn sign(n: f64) -> f64 {
    if n < 0.0 {
        -1.0
    } else {
        1.0
    }
}

fn even(n: f64) -> f64 {
    let significance = 2.0 * sign(n);
    (n / significance).ceil() * significance
}

/// ROUND(number, [num_digits]) - half away from zero
pub fn fn_round(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_round(a, ctx));
    }

    into_value(round_half(args))
}

fn round_half(args: &[FormulaValue]) -> Result<f64, CellError> {
    let number = numeric_null_bool(arg(args, 0))?;
    let digits = numeric_null_bool(arg(args, 1))?;
    Ok(round_digits(number, digits_arg(digits), Mode::HalfAwayFromZero))
}

fn round_directed(args: &[FormulaValue], mode: Mode) -> Result<f64, CellError> {
    let number = numeric_null_bool(arg(args, 0))?;
    let digits = match args.get(1) {
        Some(value) => numeric_null_substitution(value, None)?,
        None => 0.0,
    };
    if number == 0.0 {
        return Ok(0.0);
    }
    Ok(round_digits(number, digits_arg(digits), mode))
}

/// ROUNDUP(number, [num_digits]) - away from zero
pub fn fn_roundup(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_roundup(a, ctx));
    }
    into_value(round_directed(args, Mode::AwayFromZero))
}

/// ROUNDDOWN(number, [num_digits]) - toward zero
pub fn fn_rounddown(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_rounddown(a, ctx));
    }
    into_value(round_directed(args, Mode::TowardZero))
}

/// MROUND(number, multiple) - nearest multiple
pub fn fn_mround(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_mround(a, ctx));
    }

    let number = match numeric_null_substitution(arg(args, 0), Some(0.0)) {
        Ok(n) => n,
        Err(e) => return FormulaValue::Error(e),
    };
    let multiple = match numeric_null_substitution(arg(args, 1), None) {
        Ok(n) => n,
        Err(e) => return FormulaValue::Error(e),
    };

    if number == 0.0 || multiple == 0.0 {
        return FormulaValue::Number(0.0);
    }
    if sign(number) != sign(multiple) {
        return FormulaValue::Error(CellError::Num);
    }

    let quotient = pre_round(number / multiple).round();
    into_value(Ok(pre_round(quotient * multiple)))
}

/// EVEN(number) - away from zero to the next even integer
pub fn fn_even(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    broadcast::map(arg(args, 0), |v| into_value(numeric_null_bool(v).map(even)))
}

/// ODD(number) - away from zero to the next odd integer
pub fn fn_odd(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    broadcast::map(arg(args, 0), |v| {
        into_value(numeric_null_bool(v).map(|n| {
            let significance = sign(n);
            let mut result = (n / significance).ceil() * significance;
            if result == even(result) {
                result += significance;
            }
            result
        }))
    })
}
