//! Formula syntax tree types

use std::fmt;

use cellcalc_core::{CellAddress, CellError, CellRange};

use crate::value::Grid;

/// Formula expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Array constant such as `{1,2;3,4}`
    Array(Grid),
    /// Empty argument slot, as in `ROUND(1,)`
    Missing,

    // === References ===
    CellRef(CellReference),
    RangeRef(RangeReference),
    /// Defined name
    NameRef(String),

    // === Operators ===
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function { name: String, args: Vec<FormulaExpr> },
}

impl FormulaExpr {
    /// Whether the expression denotes cells rather than a computed value
    pub fn is_reference(&self) -> bool {
        match self {
            FormulaExpr::CellRef(_) | FormulaExpr::RangeRef(_) | FormulaExpr::NameRef(_) => true,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Union,
                ..
            } => true,
            _ => false,
        }
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

fn write_sheet(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    match sheet {
        Some(name) if name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') => {
            write!(f, "{}!", name)
        }
        Some(name) => write!(f, "'{}'!", name.replace('\'', "''")),
        None => Ok(()),
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet(f, &self.sheet)?;
        write!(f, "{}", self.address)
    }
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet(f, &self.sheet)?;
        write!(f, "{}:{}", self.range.start, self.range.end)
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Reference union, `(A1:A3,C1)`
    Union,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::Union => ",",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    /// Unary plus; evaluates to the operand unchanged
    Plus,
    Percent,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Percent => "%",
        }
    }
}
