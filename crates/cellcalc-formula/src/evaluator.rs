//! Formula evaluator
//!
//! Runs a compiled [`Program`] over a value stack. Evaluation never fails as
//! a Rust error: every problem surfaces as a [`CellError`] value.

use std::cmp::Ordering;

use cellcalc_core::CellError;
use tracing::trace;

use crate::ast::{BinaryOperator, CellReference, RangeReference, UnaryOperator};
use crate::broadcast;
use crate::config::EngineConfig;
use crate::error::FormulaResult;
use crate::functions::{self, FunctionContext};
use crate::program::{Instruction, Program};
use crate::value::{FormulaValue, Grid};

/// Storage seam between the evaluator and whatever holds the cells
///
/// Reads take `&mut self` so an implementation can record what was read
/// and compute formula cells on demand.
pub trait EvaluationContext {
    /// Value of one cell (blank cells are [`FormulaValue::Empty`])
    fn cell_value(&mut self, reference: &CellReference) -> FormulaValue;

    /// Values of a range as a grid
    fn range_values(&mut self, reference: &RangeReference) -> FormulaValue;

    /// Value of a defined name
    fn resolve_name(&mut self, name: &str) -> FormulaValue;

    fn config(&self) -> &EngineConfig;
}

/// Context without a workbook: every cell is blank and no names exist
#[derive(Debug, Clone, Default)]
pub struct SimpleContext {
    config: EngineConfig,
}

impl SimpleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EvaluationContext for SimpleContext {
    fn cell_value(&mut self, _reference: &CellReference) -> FormulaValue {
        FormulaValue::Empty
    }

    fn range_values(&mut self, reference: &RangeReference) -> FormulaValue {
        let range = &reference.range;
        FormulaValue::Array(Grid::filled(
            range.row_count() as usize,
            range.col_count() as usize,
            FormulaValue::Empty,
        ))
    }

    fn resolve_name(&mut self, _name: &str) -> FormulaValue {
        FormulaValue::Error(CellError::Name)
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Compile and evaluate formula text without a workbook
///
/// ```rust
/// use cellcalc_formula::{evaluate_formula, FormulaValue};
///
/// assert_eq!(evaluate_formula("=ROUND(2.345, 2)").unwrap(), FormulaValue::Number(2.35));
/// ```
pub fn evaluate_formula(formula: &str) -> FormulaResult<FormulaValue> {
    let program = Program::compile(formula)?;
    Ok(evaluate(&program, &mut SimpleContext::new()))
}

/// Evaluate a compiled program
pub fn evaluate(program: &Program, ctx: &mut dyn EvaluationContext) -> FormulaValue {
    let mut stack: Vec<FormulaValue> = Vec::with_capacity(program.instructions().len());

    for instruction in program.instructions() {
        let value = match instruction {
            Instruction::Push(value) => value.clone(),
            Instruction::PushCell(reference) => ctx.cell_value(reference),
            Instruction::PushRange(reference) => ctx.range_values(reference),
            Instruction::PushName(name) => ctx.resolve_name(name),
            Instruction::Unary(op) => {
                let operand = pop(&mut stack);
                evaluate_unary_op(*op, operand)
            }
            Instruction::Binary(op) => {
                let right = pop(&mut stack);
                let left = pop(&mut stack);
                evaluate_binary_op(*op, left, right)
            }
            Instruction::Call { name, arity } => {
                let split = stack.len().saturating_sub(*arity);
                let args = stack.split_off(split);
                evaluate_function(name, &args, ctx.config())
            }
        };
        stack.push(value);
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(value), true) => value,
        _ => FormulaValue::Error(CellError::Value),
    }
}

fn pop(stack: &mut Vec<FormulaValue>) -> FormulaValue {
    stack.pop().unwrap_or(FormulaValue::Error(CellError::Value))
}

fn evaluate_function(name: &str, args: &[FormulaValue], config: &EngineConfig) -> FormulaValue {
    let canonical = config.locale.canonical_name(name);
    let def = match functions::registry().get(&canonical) {
        Some(def) => def,
        None => {
            trace!(function = %name, "unknown function");
            return FormulaValue::Error(CellError::Name);
        }
    };

    if args.len() < def.min_args || def.max_args.map_or(false, |max| args.len() > max) {
        return FormulaValue::Error(CellError::Value);
    }

    (def.implementation)(args, &FunctionContext::new(config))
}

fn evaluate_unary_op(op: UnaryOperator, operand: FormulaValue) -> FormulaValue {
    match op {
        UnaryOperator::Plus => operand,
        UnaryOperator::Negate => broadcast::map(&operand, |v| match v.to_number() {
            Ok(n) => FormulaValue::Number(-n),
            Err(e) => FormulaValue::Error(e),
        }),
        UnaryOperator::Percent => broadcast::map(&operand, |v| match v.to_number() {
            Ok(n) => FormulaValue::Number(n / 100.0),
            Err(e) => FormulaValue::Error(e),
        }),
    }
}

fn evaluate_binary_op(op: BinaryOperator, left: FormulaValue, right: FormulaValue) -> FormulaValue {
    if op == BinaryOperator::Union {
        let mut values = left.flatten();
        values.extend(right.flatten());
        return Grid::row(values)
            .map_or(FormulaValue::Error(CellError::Value), FormulaValue::Array);
    }

    if left.is_array() || right.is_array() {
        return broadcast::apply(&[left, right], |args| {
            evaluate_scalar_op(op, &args[0], &args[1])
        });
    }

    evaluate_scalar_op(op, &left, &right)
}

fn evaluate_scalar_op(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    // Left error wins
    if let Some(e) = left.error().or_else(|| right.error()) {
        return FormulaValue::Error(e);
    }

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => {
            let (l, r) = match (left.to_number(), right.to_number()) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(e), _) | (_, Err(e)) => return FormulaValue::Error(e),
            };
            arithmetic(op, l, r)
        }

        BinaryOperator::Concat => {
            FormulaValue::String(format!("{}{}", left.as_string(), right.as_string()))
        }

        BinaryOperator::Equal => FormulaValue::Boolean(compare_values(left, right).is_eq()),
        BinaryOperator::NotEqual => FormulaValue::Boolean(compare_values(left, right).is_ne()),
        BinaryOperator::LessThan => FormulaValue::Boolean(compare_values(left, right).is_lt()),
        BinaryOperator::LessEqual => FormulaValue::Boolean(compare_values(left, right).is_le()),
        BinaryOperator::GreaterThan => FormulaValue::Boolean(compare_values(left, right).is_gt()),
        BinaryOperator::GreaterEqual => FormulaValue::Boolean(compare_values(left, right).is_ge()),

        BinaryOperator::Union => FormulaValue::Error(CellError::Value),
    }
}

fn arithmetic(op: BinaryOperator, l: f64, r: f64) -> FormulaValue {
    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            l / r
        }
        BinaryOperator::Power => {
            if l == 0.0 && r == 0.0 {
                return FormulaValue::Error(CellError::Num);
            }
            if l == 0.0 && r < 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            l.powf(r)
        }
        _ => return FormulaValue::Error(CellError::Value),
    };

    if result.is_finite() {
        FormulaValue::Number(result)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// Order two scalars the way comparison operators do
///
/// A blank adopts the other side's type; text compares case-insensitively;
/// across types numbers sort before text and text before booleans.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    fn blank_as(other: &FormulaValue) -> FormulaValue {
        match other {
            FormulaValue::String(_) => FormulaValue::String(String::new()),
            FormulaValue::Boolean(_) => FormulaValue::Boolean(false),
            _ => FormulaValue::Number(0.0),
        }
    }

    fn rank(value: &FormulaValue) -> u8 {
        match value {
            FormulaValue::Number(_) | FormulaValue::Empty => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            FormulaValue::Error(_) | FormulaValue::Array(_) => 3,
        }
    }

    let left = match left {
        FormulaValue::Empty => blank_as(right),
        other => other.clone(),
    };
    let right = match right {
        FormulaValue::Empty => blank_as(&left),
        other => other.clone(),
    };

    match (&left, &right) {
        (FormulaValue::Number(a), FormulaValue::Number(b)) => {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(a), FormulaValue::String(b)) => {
            a.to_lowercase().cmp(&b.to_lowercase())
        }
        (FormulaValue::Boolean(a), FormulaValue::Boolean(b)) => a.cmp(b),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}
