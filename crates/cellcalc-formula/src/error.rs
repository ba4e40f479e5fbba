//! Formula error types
//!
//! Only structural problems (text that cannot be tokenized or parsed) are
//! Rust errors. Everything that goes wrong while evaluating is a
//! [`CellError`] value inside [`crate::FormulaValue::Error`].

use cellcalc_core::CellError;
use thiserror::Error;

/// Result type for formula compilation
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Structural failures raised while compiling formula text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Tokenizer failure (unterminated string, stray character, ...)
    #[error("Lex error at offset {offset}: {message}")]
    Lex { offset: usize, message: String },

    /// Grammar failure
    #[error("Parse error at offset {offset}: expected {expected}")]
    Parse { offset: usize, expected: String },

    /// Grid literal whose rows have different widths
    #[error("Malformed array constant at offset {offset}: rows must have equal length")]
    MalformedGrid { offset: usize },
}

impl FormulaError {
    pub(crate) fn lex(offset: usize, message: impl Into<String>) -> Self {
        FormulaError::Lex {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn parse(offset: usize, expected: impl Into<String>) -> Self {
        FormulaError::Parse {
            offset,
            expected: expected.into(),
        }
    }

    /// Source offset the failure points at
    pub fn offset(&self) -> usize {
        match self {
            FormulaError::Lex { offset, .. }
            | FormulaError::Parse { offset, .. }
            | FormulaError::MalformedGrid { offset } => *offset,
        }
    }

    /// The value stored in a cell whose formula failed to compile
    ///
    /// Text the tokenizer cannot read becomes `#NAME?`; text that tokenizes
    /// but does not form an expression becomes `#VALUE!`.
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::Lex { .. } => CellError::Name,
            FormulaError::Parse { .. } | FormulaError::MalformedGrid { .. } => CellError::Value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_and_mapping() {
        let err = FormulaError::parse(4, "')'");
        assert_eq!(err.to_string(), "Parse error at offset 4: expected ')'");
        assert_eq!(err.offset(), 4);
        assert_eq!(err.to_cell_error(), CellError::Value);

        let err = FormulaError::lex(2, "unterminated string");
        assert_eq!(err.to_cell_error(), CellError::Name);
        assert_eq!(FormulaError::MalformedGrid { offset: 0 }.to_cell_error(), CellError::Value);
    }
}
