//! Date functions
//!
//! Dates are serial day numbers in the 1900 date system. Serial 1 is
//! 1900-01-01 and serial 60 is the fictional 1900-02-29, so from March 1900
//! on a serial is the number of days since 1899-12-30.

use cellcalc_core::CellError;
use chrono::{Datelike, Duration, Local, NaiveDate, Timelike};

use super::args::{arg, numeric_null_bool};
use super::{FunctionContext, FunctionRegistry};
use crate::broadcast::{self, has_array};
use crate::value::FormulaValue;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("DATE", 3, Some(3), fn_date);
    registry.add("YEAR", 1, Some(1), fn_year);
    registry.add("MONTH", 1, Some(1), fn_month);
    registry.add("DAY", 1, Some(1), fn_day);
    registry.add_volatile("TODAY", 0, Some(0), fn_today);
    registry.add_volatile("NOW", 0, Some(0), fn_now);
}

/// Largest serial (9999-12-31)
const MAX_SERIAL: i64 = 2_958_465;

/// First serial that matches the real calendar
const LEAP_BUG_SERIAL: i64 = 60;

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Serial number of a calendar date
pub fn date_to_serial(date: NaiveDate) -> Option<i64> {
    let days = (date - epoch()?).num_days();
    Some(if days <= LEAP_BUG_SERIAL { days - 1 } else { days })
}

/// Calendar date of a serial, `None` for the fictional 1900-02-29 and for
/// serials outside 1..=9999-12-31
pub fn serial_to_date(serial: i64) -> Option<NaiveDate> {
    if !(0..=MAX_SERIAL).contains(&serial) || serial == LEAP_BUG_SERIAL {
        return None;
    }
    let days = if serial < LEAP_BUG_SERIAL { serial + 1 } else { serial };
    epoch()?.checked_add_signed(Duration::days(days))
}

fn serial_to_ymd(serial: i64) -> Option<(i32, u32, u32)> {
    if serial == LEAP_BUG_SERIAL {
        return Some((1900, 2, 29));
    }
    if serial == 0 {
        return Some((1900, 1, 0));
    }
    serial_to_date(serial).map(|d| (d.year(), d.month(), d.day()))
}

fn date_serial(year: f64, month: f64, day: f64) -> Result<f64, CellError> {
    let mut year = year.trunc() as i64;
    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return Err(CellError::Num);
    }

    let months = year * 12 + month.trunc() as i64 - 1;
    let first = NaiveDate::from_ymd_opt(months.div_euclid(12) as i32, months.rem_euclid(12) as u32 + 1, 1)
        .ok_or(CellError::Num)?;
    let date = first
        .checked_add_signed(Duration::days(day.trunc() as i64 - 1))
        .ok_or(CellError::Num)?;
    let serial = date_to_serial(date).ok_or(CellError::Num)?;
    if !(0..=MAX_SERIAL).contains(&serial) {
        return Err(CellError::Num);
    }
    Ok(serial as f64)
}

/// DATE(year, month, day)
///
/// Years below 1900 are offsets from 1900; months and days roll over.
pub fn fn_date(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_date(a, ctx));
    }
    let parts = (
        numeric_null_bool(arg(args, 0)),
        numeric_null_bool(arg(args, 1)),
        numeric_null_bool(arg(args, 2)),
    );
    match parts {
        (Ok(y), Ok(m), Ok(d)) => match date_serial(y, m, d) {
            Ok(serial) => FormulaValue::Number(serial),
            Err(e) => FormulaValue::Error(e),
        },
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => FormulaValue::Error(e),
    }
}

fn date_part(args: &[FormulaValue], part: fn((i32, u32, u32)) -> f64) -> FormulaValue {
    broadcast::map(arg(args, 0), |v| match numeric_null_bool(v) {
        Ok(n) if n < 0.0 => FormulaValue::Error(CellError::Num),
        Ok(n) => match serial_to_ymd(n.floor() as i64) {
            Some(ymd) => FormulaValue::Number(part(ymd)),
            None => FormulaValue::Error(CellError::Num),
        },
        Err(e) => FormulaValue::Error(e),
    })
}

/// YEAR(serial)
pub fn fn_year(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    date_part(args, |(y, _, _)| y as f64)
}

/// MONTH(serial)
pub fn fn_month(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    date_part(args, |(_, m, _)| m as f64)
}

/// DAY(serial)
pub fn fn_day(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    date_part(args, |(_, _, d)| d as f64)
}

/// TODAY() - current local date
pub fn fn_today(_args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    match date_to_serial(Local::now().date_naive()) {
        Some(serial) => FormulaValue::Number(serial as f64),
        None => FormulaValue::Error(CellError::Num),
    }
}

/// NOW() - current local date and time of day as a fraction
pub fn fn_now(_args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    let now = Local::now();
    match date_to_serial(now.date_naive()) {
        Some(serial) => {
            let seconds = now.num_seconds_from_midnight() as f64;
            FormulaValue::Number(serial as f64 + seconds / 86_400.0)
        }
        None => FormulaValue::Error(CellError::Num),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate_formula;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaValue {
        evaluate_formula(formula).unwrap()
    }

    #[test]
    fn test_date_serials() {
        assert_eq!(eval("=DATE(1900,1,1)"), FormulaValue::Number(1.0));
        assert_eq!(eval("=DATE(1900,3,1)"), FormulaValue::Number(61.0));
        assert_eq!(eval("=DATE(2024,1,15)"), FormulaValue::Number(45306.0));
        assert_eq!(eval("=DATE(124,1,15)"), FormulaValue::Number(45306.0));
        assert_eq!(eval("=DATE(2023,13,1)"), eval("=DATE(2024,1,1)"));
        assert_eq!(eval("=DATE(2024,3,0)"), eval("=DATE(2024,2,29)"));
        assert_eq!(eval("=DATE(10000,1,1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=DATE(\"x\",1,1)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval("=YEAR(45306)"), FormulaValue::Number(2024.0));
        assert_eq!(eval("=MONTH(45306.75)"), FormulaValue::Number(1.0));
        assert_eq!(eval("=DAY(45306)"), FormulaValue::Number(15.0));
        assert_eq!(eval("=DAY(60)"), FormulaValue::Number(29.0));
        assert_eq!(eval("=YEAR(-1)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_serial_conversion() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(date_to_serial(date), Some(45306));
        assert_eq!(serial_to_date(45306), Some(date));
        assert_eq!(serial_to_date(60), None);
        assert_eq!(serial_to_date(1), NaiveDate::from_ymd_opt(1900, 1, 1));
    }

    #[test]
    fn test_today_and_now() {
        let FormulaValue::Number(today) = eval("=TODAY()") else {
            panic!("TODAY must return a number");
        };
        let FormulaValue::Number(now) = eval("=NOW()") else {
            panic!("NOW must return a number");
        };
        assert_eq!(today.fract(), 0.0);
        assert!(now >= today && now < today + 2.0);
        assert!(today > 45000.0);
    }
}
