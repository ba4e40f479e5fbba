//! # cellcalc-formula
//!
//! Formula engine for cellcalc.
//!
//! This crate provides:
//! - Tokenizing and parsing (text → tokens → AST → RPN [`Program`])
//! - Evaluation over a value stack against an [`EvaluationContext`]
//! - Element-wise broadcasting of scalar functions over grids
//! - Built-in functions (math, rounding, statistics, logical, text, date, criteria)
//! - Dependency tracking for calculation chains
//!
//! ## Example
//!
//! ```rust
//! use cellcalc_formula::{evaluate, FormulaValue, Program, SimpleContext};
//!
//! let program = Program::compile("=SUMIF({1,5,10}, \">2\")").unwrap();
//! let value = evaluate(&program, &mut SimpleContext::new());
//! assert_eq!(value, FormulaValue::Number(15.0));
//! ```

pub mod ast;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod program;
pub mod query;
pub mod tokenizer;
pub mod value;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use cache::{CacheBackend, MemoryCache};
pub use config::{Compatibility, EngineConfig, HttpClient, HttpError, Locale};
pub use dependency::{CellId, CellKey, DependencyGraph, RangeKey};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{compare_values, evaluate, evaluate_formula, EvaluationContext, SimpleContext};
pub use functions::criteria::{Criterion, CriterionOp};
pub use functions::{registry, FunctionContext, FunctionDef, FunctionRegistry};
pub use parser::parse_formula;
pub use program::{Instruction, Program};
pub use query::{Aggregate, PseudoTable};
pub use tokenizer::{tokenize, Token, TokenKind};
pub use value::{FormulaValue, Grid};
