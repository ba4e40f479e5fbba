//! # cellcalc
//!
//! A spreadsheet formula calculation engine.
//!
//! cellcalc compiles Excel-style formulas, evaluates them against an
//! in-memory workbook and keeps calculated values cached until an edit
//! makes them stale.
//!
//! ## Features
//!
//! - Excel-compatible operators, coercions and error values
//! - Array literals and element-wise broadcasting
//! - Math, statistical, logical, text, date and conditional-aggregate functions
//! - Dependency tracking with minimal recalculation after edits
//! - Circular reference detection, with optional iterative calculation
//! - Workbook- and sheet-scoped named ranges
//!
//! ## Example
//!
//! ```rust
//! use cellcalc::prelude::*;
//!
//! let mut sheet = Spreadsheet::new();
//! sheet.set_cell_value(0, "A1", "apple").unwrap();
//! sheet.set_cell_value(0, "A2", "pear").unwrap();
//! sheet.set_cell_value(0, "B1", 3.0).unwrap();
//! sheet.set_cell_value(0, "B2", 4.0).unwrap();
//! sheet.set_cell_formula(0, "C1", "=SUMIF(A1:A2, \"p*\", B1:B2)").unwrap();
//!
//! assert_eq!(sheet.calculated_value(0, "C1").unwrap(), FormulaValue::Number(4.0));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{CalculationEngine, CalculationOptions, CalculationStats, Spreadsheet};

// Re-export core types
pub use cellcalc_core::{
    CellAddress, CellError, CellRange, CellValue, Error, NameScope, NamedRange, Result,
    SharedString, Workbook, Worksheet, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use cellcalc_formula::{
    evaluate, evaluate_formula, parse_formula, tokenize, CacheBackend, CellKey, Compatibility,
    Criterion, EngineConfig, EvaluationContext, FormulaError, FormulaExpr, FormulaResult,
    FormulaValue, Grid, HttpClient, HttpError, Locale, MemoryCache, Program,
};
