//! Criteria matching for COUNTIF, SUMIF, AVERAGEIF and the *IFS family
//!
//! A criterion is a value, optionally written as text with a leading
//! comparison operator:
//! - `5`, `TRUE`, `#N/A`: equality
//! - `">=10"`, `"<>0"`, `"<b"`: comparison against the rest of the text,
//!   which is read as a number, boolean or error literal when it looks like
//!   one
//! - `"a*"`, `"?at"`: `*` matches any run of characters, `?` exactly one
//! - `""` (or a blank cell): matches blanks and empty text

use std::cmp::Ordering;

use cellcalc_core::CellError;
use lazy_regex::regex_captures;

use crate::value::{parse_number, FormulaValue};

/// Comparison applied by a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl CriterionOp {
    fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "<>" => CriterionOp::NotEqual,
            "<=" => CriterionOp::LessEqual,
            ">=" => CriterionOp::GreaterEqual,
            "<" => CriterionOp::LessThan,
            ">" => CriterionOp::GreaterThan,
            _ => CriterionOp::Equal,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CriterionOp::Equal => ordering == Ordering::Equal,
            CriterionOp::NotEqual => ordering != Ordering::Equal,
            CriterionOp::LessThan => ordering == Ordering::Less,
            CriterionOp::LessEqual => ordering != Ordering::Greater,
            CriterionOp::GreaterThan => ordering == Ordering::Greater,
            CriterionOp::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

/// Parsed criterion: `op` applied against `operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    op: CriterionOp,
    operand: FormulaValue,
    wildcard: bool,
}

impl Criterion {
    pub fn new(op: CriterionOp, operand: FormulaValue) -> Self {
        let wildcard = matches!(&operand, FormulaValue::String(s) if s.contains(['*', '?']));
        Self {
            op,
            operand,
            wildcard,
        }
    }

    /// Read a criterion argument; a grid criterion uses its top-left value
    pub fn parse(value: &FormulaValue) -> Self {
        match value {
            FormulaValue::Array(grid) => Self::parse(grid.top_left()),
            FormulaValue::Empty => Self::new(CriterionOp::Equal, FormulaValue::String(String::new())),
            FormulaValue::String(text) => Self::parse_text(text),
            other => Self::new(CriterionOp::Equal, other.clone()),
        }
    }

    fn parse_text(text: &str) -> Self {
        let (prefix, rest) = match regex_captures!(r"^(<>|<=|>=|<|>|=)?(.*)$"s, text) {
            Some((_, prefix, rest)) => (prefix, rest),
            None => ("", text),
        };

        let operand = if let Some(n) = parse_number(rest) {
            FormulaValue::Number(n)
        } else if rest.eq_ignore_ascii_case("TRUE") {
            FormulaValue::Boolean(true)
        } else if rest.eq_ignore_ascii_case("FALSE") {
            FormulaValue::Boolean(false)
        } else if let Some(e) = CellError::parse(rest) {
            FormulaValue::Error(e)
        } else {
            FormulaValue::String(rest.to_string())
        };

        Self::new(CriterionOp::from_prefix(prefix), operand)
    }

    pub fn op(&self) -> CriterionOp {
        self.op
    }

    pub fn operand(&self) -> &FormulaValue {
        &self.operand
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Test one cell value
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match self.op {
            CriterionOp::Equal => self.equals(value),
            CriterionOp::NotEqual => !self.equals(value),
            op => match self.order(value) {
                Some(ordering) => op.accepts(ordering),
                None => false,
            },
        }
    }

    fn equals(&self, value: &FormulaValue) -> bool {
        match (&self.operand, value) {
            (FormulaValue::String(pattern), _) if pattern.is_empty() => match value {
                FormulaValue::Empty => true,
                FormulaValue::String(s) => s.is_empty(),
                _ => false,
            },
            (FormulaValue::String(pattern), FormulaValue::String(s)) => {
                if self.wildcard {
                    wildcard_match(&pattern.to_lowercase(), &s.to_lowercase())
                } else {
                    pattern.to_lowercase() == s.to_lowercase()
                }
            }
            (FormulaValue::Number(a), FormulaValue::Number(b)) => same_number(*a, *b),
            (FormulaValue::Boolean(a), FormulaValue::Boolean(b)) => a == b,
            (FormulaValue::Error(a), FormulaValue::Error(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering of `value` relative to the operand, when both have the same type
    fn order(&self, value: &FormulaValue) -> Option<Ordering> {
        match (value, &self.operand) {
            (FormulaValue::Number(v), FormulaValue::Number(o)) => v.partial_cmp(o),
            (FormulaValue::String(v), FormulaValue::String(o)) => {
                Some(v.to_lowercase().cmp(&o.to_lowercase()))
            }
            (FormulaValue::Boolean(v), FormulaValue::Boolean(o)) => Some(v.cmp(o)),
            _ => None,
        }
    }
}

/// Match with wildcards: `*` any run of characters, `?` a single character
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            // let the last star swallow one more character
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

/// Equal to 15 significant digits, whatever the magnitude
fn same_number(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= 1e-15 * a.abs().max(b.abs())
}
