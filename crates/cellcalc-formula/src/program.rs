//! Compiled formulas
//!
//! A [`Program`] is the postfix (RPN) form of a parsed formula. It is built
//! once per formula text and shared read-only afterwards.

use std::fmt;

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::config::Locale;
use crate::error::FormulaResult;
use crate::functions;
use crate::parser::parse_formula;
use crate::value::FormulaValue;

/// One postfix step
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Push(FormulaValue),
    PushCell(CellReference),
    PushRange(RangeReference),
    PushName(String),
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    /// Pop `arity` arguments and call `name`
    Call { name: String, arity: usize },
}

/// A formula compiled to postfix instructions
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    instructions: Vec<Instruction>,
}

impl Program {
    /// Parse and compile formula text (with or without the leading `=`)
    ///
    /// ```rust
    /// use cellcalc_formula::Program;
    ///
    /// let program = Program::compile("=SUM(A1:A3)*2").unwrap();
    /// assert_eq!(program.instructions().len(), 4);
    /// assert_eq!(program.range_references().count(), 1);
    /// ```
    pub fn compile(source: &str) -> FormulaResult<Self> {
        let expr = parse_formula(source)?;
        Ok(Self::from_expr(source, &expr))
    }

    pub fn from_expr(source: &str, expr: &FormulaExpr) -> Self {
        let mut instructions = Vec::new();
        lower(expr, &mut instructions);
        Self {
            source: source.to_string(),
            instructions,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Cells named literally in the formula
    pub fn cell_references(&self) -> impl Iterator<Item = &CellReference> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::PushCell(r) => Some(r),
            _ => None,
        })
    }

    /// Ranges named literally in the formula
    pub fn range_references(&self) -> impl Iterator<Item = &RangeReference> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::PushRange(r) => Some(r),
            _ => None,
        })
    }

    /// Defined names the formula reads
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::PushName(n) => Some(n.as_str()),
            _ => None,
        })
    }

    /// Whether the formula calls a function that must run on every recalculation
    pub fn is_volatile(&self) -> bool {
        self.is_volatile_in(&Locale::default())
    }

    /// [`Program::is_volatile`] with function names read in `locale`
    pub fn is_volatile_in(&self, locale: &Locale) -> bool {
        self.instructions.iter().any(|i| match i {
            Instruction::Call { name, .. } => functions::registry()
                .get(&locale.canonical_name(name))
                .map_or(false, |def| def.volatile),
            _ => false,
        })
    }
}

fn lower(expr: &FormulaExpr, out: &mut Vec<Instruction>) {
    match expr {
        FormulaExpr::Number(n) => out.push(Instruction::Push(FormulaValue::Number(*n))),
        FormulaExpr::String(s) => out.push(Instruction::Push(FormulaValue::String(s.clone()))),
        FormulaExpr::Boolean(b) => out.push(Instruction::Push(FormulaValue::Boolean(*b))),
        FormulaExpr::Error(e) => out.push(Instruction::Push(FormulaValue::Error(*e))),
        FormulaExpr::Array(grid) => out.push(Instruction::Push(FormulaValue::Array(grid.clone()))),
        FormulaExpr::Missing => out.push(Instruction::Push(FormulaValue::Empty)),
        FormulaExpr::CellRef(r) => out.push(Instruction::PushCell(r.clone())),
        FormulaExpr::RangeRef(r) => out.push(Instruction::PushRange(r.clone())),
        FormulaExpr::NameRef(n) => out.push(Instruction::PushName(n.clone())),
        FormulaExpr::UnaryOp { op, operand } => {
            lower(operand, out);
            out.push(Instruction::Unary(*op));
        }
        FormulaExpr::BinaryOp { op, left, right } => {
            lower(left, out);
            lower(right, out);
            out.push(Instruction::Binary(*op));
        }
        FormulaExpr::Function { name, args } => {
            for arg in args {
                lower(arg, out);
            }
            out.push(Instruction::Call {
                name: name.clone(),
                arity: args.len(),
            });
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(FormulaValue::String(s)) => write!(f, "PUSH \"{}\"", s),
            Instruction::Push(FormulaValue::Empty) => f.write_str("PUSH <missing>"),
            Instruction::Push(value) => write!(f, "PUSH {}", value),
            Instruction::PushCell(r) => write!(f, "CELL {}", r),
            Instruction::PushRange(r) => write!(f, "RANGE {}", r),
            Instruction::PushName(n) => write!(f, "NAME {}", n),
            Instruction::Unary(UnaryOperator::Negate) => f.write_str("NEG"),
            Instruction::Unary(op) => write!(f, "UNARY {}", op.symbol()),
            Instruction::Binary(BinaryOperator::Union) => f.write_str("UNION"),
            Instruction::Binary(op) => write!(f, "OP {}", op.symbol()),
            Instruction::Call { name, arity } => write!(f, "CALL {}/{}", name, arity),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{:04} {}", i, instruction)?;
        }
        Ok(())
    }
}
