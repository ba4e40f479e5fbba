//! Statistical functions: STDEVA and the beta and negative binomial
//! distributions
//!
//! The distributions broadcast; STDEVA is an aggregate. Gamma and beta
//! functions are computed in log space (Lanczos) and the regularized
//! incomplete beta by its continued fraction.

use std::f64::consts::PI;

use cellcalc_core::CellError;

use super::args::{arg, number_result, numeric_null_bool, optional_number};
use super::{FunctionContext, FunctionRegistry};
use crate::broadcast::{self, has_array};
use crate::config::Compatibility;
use crate::value::{parse_number, FormulaValue};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("STDEVA", 1, None, fn_stdeva);
    registry.add("BETADIST", 3, Some(5), fn_betadist);
    registry.add("BETA.DIST", 4, Some(6), fn_beta_dist);
    registry.add("NEGBINOMDIST", 3, Some(3), fn_negbinomdist);
    registry.add("NEGBINOM.DIST", 4, Some(4), fn_negbinom_dist);
}

/// STDEVA(value1, ...) - sample standard deviation counting text and logicals
///
/// Inside grids text counts as 0 and logicals as 0/1; blanks are skipped.
/// A direct argument that is text but not a number is `#VALUE!`, except in
/// OpenOffice mode where it counts as 0. Fewer than two values is `#DIV/0!`.
pub fn fn_stdeva(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    let compatibility = ctx.config().compatibility;
    let mut values = Vec::new();

    for value in args {
        match value {
            FormulaValue::Array(grid) => {
                for cell in grid.iter() {
                    match cell {
                        FormulaValue::Number(n) => values.push(*n),
                        FormulaValue::Boolean(b) => values.push(f64::from(u8::from(*b))),
                        FormulaValue::String(_) => values.push(0.0),
                        FormulaValue::Error(e) => return FormulaValue::Error(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            FormulaValue::String(s) => match parse_number(s) {
                Some(n) => values.push(n),
                None if compatibility == Compatibility::OpenOffice => values.push(0.0),
                None => return FormulaValue::Error(CellError::Value),
            },
            other => match numeric_null_bool(other) {
                Ok(n) => values.push(n),
                Err(e) => return FormulaValue::Error(e),
            },
        }
    }

    if values.len() < 2 {
        return FormulaValue::Error(CellError::Div0);
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    number_result((squares / (count - 1.0)).sqrt())
}

/// BETADIST(x, alpha, beta, [A], [B]) - cumulative beta distribution
pub fn fn_betadist(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_betadist(a, ctx));
    }
    match beta_arguments(args, 3) {
        Ok((x, alpha, beta, _)) => number_result(beta_cdf(x, alpha, beta)),
        Err(e) => FormulaValue::Error(e),
    }
}

/// BETA.DIST(x, alpha, beta, cumulative, [A], [B])
pub fn fn_beta_dist(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_beta_dist(a, ctx));
    }
    let cumulative = match numeric_null_bool(arg(args, 3)) {
        Ok(flag) => flag != 0.0,
        Err(e) => return FormulaValue::Error(e),
    };
    match beta_arguments(args, 4) {
        Ok((x, alpha, beta, _)) if cumulative => number_result(beta_cdf(x, alpha, beta)),
        Ok((x, alpha, beta, width)) => number_result(beta_pdf(x, alpha, beta) / width),
        Err(e) => FormulaValue::Error(e),
    }
}

/// `(x scaled to 0..1, alpha, beta, B - A)`; the bounds start at `bounds`
fn beta_arguments(args: &[FormulaValue], bounds: usize) -> Result<(f64, f64, f64, f64), CellError> {
    let x = numeric_null_bool(arg(args, 0))?;
    let alpha = numeric_null_bool(arg(args, 1))?;
    let beta = numeric_null_bool(arg(args, 2))?;
    let lower = optional_number(args, bounds, 0.0)?;
    let upper = optional_number(args, bounds + 1, 1.0)?;
    let (lower, upper) = if lower > upper { (upper, lower) } else { (lower, upper) };

    if alpha <= 0.0 || beta <= 0.0 || lower == upper || x < lower || x > upper {
        return Err(CellError::Num);
    }
    let width = upper - lower;
    Ok(((x - lower) / width, alpha, beta, width))
}

/// NEGBINOMDIST(number_f, number_s, probability_s) - probability mass
pub fn fn_negbinomdist(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_negbinomdist(a, ctx));
    }
    match negbinom_arguments(args) {
        Ok((failures, successes, p)) => number_result(negbinom_pmf(failures, successes, p)),
        Err(e) => FormulaValue::Error(e),
    }
}

/// NEGBINOM.DIST(number_f, number_s, probability_s, cumulative)
pub fn fn_negbinom_dist(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    if has_array(args) {
        return broadcast::apply(args, |a| fn_negbinom_dist(a, ctx));
    }
    let cumulative = match numeric_null_bool(arg(args, 3)) {
        Ok(flag) => flag != 0.0,
        Err(e) => return FormulaValue::Error(e),
    };
    match negbinom_arguments(args) {
        Ok((failures, successes, p)) if cumulative => {
            number_result(beta_cdf(p, successes, failures + 1.0))
        }
        Ok((failures, successes, p)) => number_result(negbinom_pmf(failures, successes, p)),
        Err(e) => FormulaValue::Error(e),
    }
}

/// Failures and successes are truncated to integers
fn negbinom_arguments(args: &[FormulaValue]) -> Result<(f64, f64, f64), CellError> {
    let failures = numeric_null_bool(arg(args, 0))?.trunc();
    let successes = numeric_null_bool(arg(args, 1))?.trunc();
    let p = numeric_null_bool(arg(args, 2))?;
    if failures < 0.0 || successes < 1.0 || !(0.0..=1.0).contains(&p) {
        return Err(CellError::Num);
    }
    Ok((failures, successes, p))
}

fn negbinom_pmf(failures: f64, successes: f64, p: f64) -> f64 {
    let ln_combinations = ln_gamma(failures + successes) - ln_gamma(successes) - ln_gamma(failures + 1.0);
    ln_combinations.exp() * p.powf(successes) * (1.0 - p).powf(failures)
}

const LANCZOS_G: f64 = 7.0;

#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

/// Natural log of the gamma function for positive `x`
fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS[1..]
        .iter()
        .enumerate()
        .fold(LANCZOS[0], |sum, (i, c)| sum + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

fn beta_pdf(x: f64, a: f64, b: f64) -> f64 {
    x.powf(a - 1.0) * (1.0 - x).powf(b - 1.0) / ln_beta(a, b).exp()
}

/// Regularized incomplete beta function I_x(a, b)
fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (a * x.ln() + b * (1.0 - x).ln() - ln_beta(a, b)).exp();
    // The fraction converges fast only below the mean; use symmetry above it
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_fraction(1.0 - x, b, a) / b
    }
}

/// Continued fraction of the incomplete beta function (modified Lentz)
fn beta_fraction(x: f64, a: f64, b: f64) -> f64 {
    const TINY: f64 = 1e-300;
    const EPSILON: f64 = 1e-16;
    const MAX_TERMS: u32 = 1000;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - (a + b) * x / (a + 1.0));
    let mut fraction = d;

    for m in 1..=MAX_TERMS {
        let m = f64::from(m);
        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        d = 1.0 / guard(1.0 + even * d);
        c = guard(1.0 + even / c);
        fraction *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        d = 1.0 / guard(1.0 + odd * d);
        c = guard(1.0 + odd / c);
        let delta = d * c;
        fraction *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::evaluator::evaluate_formula;
    use crate::value::Grid;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn eval(formula: &str) -> FormulaValue {
        evaluate_formula(formula).unwrap()
    }

    fn assert_approx(result: FormulaValue, expected: f64) {
        match result {
            FormulaValue::Number(n) => assert!(
                (n - expected).abs() < 1e-12,
                "expected {}, got {}",
                expected,
                n
            ),
            other => panic!("expected {}, got {:?}", expected, other),
        }
    }

    fn assert_grid(result: FormulaValue, expected: &[[f64; 2]; 2]) {
        let FormulaValue::Array(grid) = result else {
            panic!("expected a grid, got {:?}", result);
        };
        assert_eq!(grid.shape(), (2, 2));
        for (row, expected_row) in grid.to_rows().iter().zip(expected) {
            for (value, e) in row.iter().zip(expected_row) {
                assert_approx(value.clone(), *e);
            }
        }
    }

    #[test]
    fn test_ln_gamma() {
        assert!(ln_gamma(1.0).abs() < 1e-14);
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-13);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-13);
    }

    #[test]
    fn test_stdeva() {
        assert_approx(eval("=STDEVA(2,4,4,4,5,5,7,9)"), 2.138089935299395);
        assert_approx(eval("=STDEVA({1,TRUE,\"x\"},3)"), 1.2583057392117916);
        assert_approx(eval("=STDEVA(\"3\",TRUE)"), std::f64::consts::SQRT_2);
        assert_eq!(eval("=STDEVA(1,\"x\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=STDEVA({1,#N/A})"), FormulaValue::Error(CellError::Na));
        assert_eq!(eval("=STDEVA(5)"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=STDEVA(A1:A5)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_stdeva_openoffice_counts_direct_text() {
        let excel = EngineConfig::default();
        let openoffice = EngineConfig::new().with_compatibility(Compatibility::OpenOffice);
        let args = [
            FormulaValue::Number(1.0),
            FormulaValue::from("x"),
            FormulaValue::Array(Grid::row(vec![FormulaValue::Boolean(true), FormulaValue::from("")]).unwrap()),
        ];

        assert_eq!(
            fn_stdeva(&args, &FunctionContext::new(&excel)),
            FormulaValue::Error(CellError::Value)
        );
        // 1, 0, 1, 0
        assert_approx(fn_stdeva(&args, &FunctionContext::new(&openoffice)), 0.5773502691896257);
    }

    #[test]
    fn test_betadist() {
        assert_approx(eval("=BETADIST(0.25,5,10)"), 0.25846539810299873);
        assert_approx(eval("=BETADIST(2,8,10,1,3)"), 0.6854705810546875);
        assert_approx(eval("=BETADIST(0.5,1,1)"), 0.5);
        assert_eq!(eval("=BETADIST(2,8,10)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=BETADIST(0.5,0,10)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=BETADIST(1,8,10,1,1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=BETADIST(\"x\",8,10)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_betadist_broadcasts() {
        assert_grid(
            eval("=BETADIST(0.25, {5, 7.5}, {10; 12})"),
            &[[0.25846539810299873, 0.05696312425682317], [0.3698138247709718, 0.10449584381010533]],
        );
    }

    #[test]
    fn test_beta_dist() {
        assert_approx(eval("=BETA.DIST(2,8,10,TRUE,1,3)"), 0.6854705810546875);
        assert_approx(eval("=BETA.DIST(2,8,10,FALSE,1,3)"), 1.4837646484375);
        assert_approx(eval("=BETA.DIST(0.5,1,1,FALSE)"), 1.0);
        assert_approx(eval("=BETA.DIST(0,1,1,FALSE)"), 1.0);
        assert_eq!(eval("=BETA.DIST(0.5,1,1,\"x\")"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_negbinomdist() {
        assert_approx(eval("=NEGBINOMDIST(10,5,0.25)"), 0.05504866037517786);
        assert_approx(eval("=NEGBINOMDIST(0,1,1)"), 1.0);
        assert_eq!(eval("=NEGBINOMDIST(-1,5,0.25)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=NEGBINOMDIST(10,0,0.25)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=NEGBINOMDIST(10,5,1.5)"), FormulaValue::Error(CellError::Num));
        assert_grid(
            eval("=NEGBINOMDIST({7; 12}, {3, 5}, 0.25)"),
            &[[0.07508468627929688, 0.04301726818084717], [0.04503981303423643, 0.05629976629279554]],
        );
    }

    #[test]
    fn test_negbinom_dist() {
        assert_approx(eval("=NEGBINOM.DIST(10,5,0.25,FALSE)"), 0.05504866037517786);
        assert_approx(eval("=NEGBINOM.DIST(10,5,0.25,TRUE)"), 0.3135140584781766);
        assert_approx(eval("=NEGBINOM.DIST(0,2,0.5,TRUE)"), 0.25);
    }

    proptest! {
        #[test]
        fn negbinom_cdf_is_sum_of_pmf(failures in 0u32..30, successes in 1u32..10, p in 0.05f64..0.95) {
            let (f, s) = (f64::from(failures), f64::from(successes));
            let sum: f64 = (0..=failures).map(|k| negbinom_pmf(f64::from(k), s, p)).sum();
            prop_assert!((beta_cdf(p, s, f + 1.0) - sum).abs() < 1e-10);
        }

        #[test]
        fn beta_cdf_is_symmetric(x in 0.01f64..0.99, a in 0.5f64..20.0, b in 0.5f64..20.0) {
            prop_assert!((beta_cdf(x, a, b) + beta_cdf(1.0 - x, b, a) - 1.0).abs() < 1e-10);
        }
    }
}
