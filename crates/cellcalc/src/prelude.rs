//! Prelude module - common imports for cellcalc users
//!
//! ```rust
//! use cellcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationEngine,
    CalculationOptions,
    CalculationStats,
    CacheBackend,
    CellAddress,
    CellError,
    CellKey,
    CellRange,
    CellValue,
    Compatibility,
    EngineConfig,
    // Error types
    Error,
    FormulaError,
    FormulaValue,
    Grid,
    HttpClient,
    HttpError,
    Locale,
    MemoryCache,
    Program,
    Result,
    Spreadsheet,
    Workbook,
    Worksheet,
};
