//! Formula parser
//!
//! A recursive descent parser over the tokenizer's output, one function per
//! precedence level.

use crate::ast::{BinaryOperator, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::tokenizer::{tokenize, Token, TokenKind};
use crate::value::{FormulaValue, Grid};
use cellcalc_core::CellRange;

/// Parse a formula string into an AST
///
/// The leading `=` is optional.
///
/// # Example
/// ```rust
/// use cellcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let trimmed = formula.trim_start();
    let (body, base) = match trimmed.strip_prefix('=') {
        Some(rest) => (rest, formula.len() - rest.len()),
        None => (trimmed, formula.len() - trimmed.len()),
    };

    let tokens = tokenize(body).map_err(|e| shift(e, base))?;
    let mut parser = FormulaParser {
        tokens,
        pos: 0,
        end: body.len(),
    };
    let expr = parser.parse_formula_body().map_err(|e| shift(e, base))?;
    Ok(expr)
}

/// Report offsets relative to the text the caller passed in
fn shift(err: FormulaError, base: usize) -> FormulaError {
    match err {
        FormulaError::Lex { offset, message } => FormulaError::Lex {
            offset: offset + base,
            message,
        },
        FormulaError::Parse { offset, expected } => FormulaError::Parse {
            offset: offset + base,
            expected,
        },
        FormulaError::MalformedGrid { offset } => FormulaError::MalformedGrid {
            offset: offset + base,
        },
    }
}

struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Offset reported for errors at end of input
    end: usize,
}

impl FormulaParser {
    fn parse_formula_body(&mut self) -> FormulaResult<FormulaExpr> {
        if self.tokens.is_empty() {
            return Err(FormulaError::parse(self.end, "expression"));
        }
        let expr = self.parse_expression()?;
        if self.current().is_some() {
            return Err(self.unexpected("end of formula"));
        }
        Ok(expr)
    }

    // === Token helpers ===

    fn current(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.offset)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current() == Some(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> FormulaResult<()> {
        if self.check(&kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> FormulaError {
        FormulaError::parse(self.offset(), expected)
    }

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    // === Precedence levels, lowest first ===

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current() {
                Some(TokenKind::Equal) => BinaryOperator::Equal,
                Some(TokenKind::NotEqual) => BinaryOperator::NotEqual,
                Some(TokenKind::LessThan) => BinaryOperator::LessThan,
                Some(TokenKind::LessEqual) => BinaryOperator::LessEqual,
                Some(TokenKind::GreaterThan) => BinaryOperator::GreaterThan,
                Some(TokenKind::GreaterEqual) => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_concatenation()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while self.check(&TokenKind::Ampersand) {
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Self::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Subtract,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current() {
                Some(TokenKind::Star) => BinaryOperator::Multiply,
                Some(TokenKind::Slash) => BinaryOperator::Divide,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_exponent()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_percent()?;

        if self.check(&TokenKind::Caret) {
            self.pos += 1;
            // Right associative
            let right = self.parse_exponent()?;
            return Ok(Self::binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_percent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut expr = self.parse_unary()?;

        while self.check(&TokenKind::Percent) {
            self.pos += 1;
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        let op = match self.current() {
            Some(TokenKind::Minus) => UnaryOperator::Negate,
            Some(TokenKind::Plus) => UnaryOperator::Plus,
            _ => return self.parse_range(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;

        // Fold signs into numeric literals so `-1` stays a constant
        match (op, operand) {
            (UnaryOperator::Negate, FormulaExpr::Number(n)) => Ok(FormulaExpr::Number(-n)),
            (UnaryOperator::Plus, FormulaExpr::Number(n)) => Ok(FormulaExpr::Number(n)),
            (op, operand) => Ok(FormulaExpr::UnaryOp {
                op,
                operand: Box::new(operand),
            }),
        }
    }

    /// `A1 : B2` written with spaces; the tokenizer already joins `A1:B2`
    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let start_offset = self.offset();
        let left = self.parse_primary()?;

        if !self.check(&TokenKind::Colon) {
            return Ok(left);
        }
        self.pos += 1;
        let right_offset = self.offset();
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                let sheet = match (start.sheet, end.sheet) {
                    (Some(a), Some(b)) if !a.eq_ignore_ascii_case(&b) => {
                        return Err(FormulaError::parse(
                            right_offset,
                            "a reference on the same sheet",
                        ))
                    }
                    (a, b) => a.or(b),
                };
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            (FormulaExpr::CellRef(_), _) => {
                Err(FormulaError::parse(right_offset, "cell reference"))
            }
            _ => Err(FormulaError::parse(start_offset, "cell reference")),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let offset = self.offset();
        let token = match self.consume() {
            Some(token) => token,
            None => return Err(FormulaError::parse(offset, "operand")),
        };

        match token.kind {
            TokenKind::Number(n) => Ok(FormulaExpr::Number(n)),
            TokenKind::Text(s) => Ok(FormulaExpr::String(s)),
            TokenKind::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            TokenKind::Error(e) => Ok(FormulaExpr::Error(e)),
            TokenKind::CellRef(r) => Ok(FormulaExpr::CellRef(r)),
            TokenKind::RangeRef(r) => Ok(FormulaExpr::RangeRef(r)),
            TokenKind::Name(name) => Ok(FormulaExpr::NameRef(name)),
            TokenKind::Function(name) => self.parse_function_call(name),
            TokenKind::LeftParen => self.parse_group(),
            TokenKind::LeftBrace => self.parse_array(offset),
            _ => Err(FormulaError::parse(offset, "operand")),
        }
    }

    /// Parenthesized expression, or a union of references `(A1:A3,C1)`
    fn parse_group(&mut self) -> FormulaResult<FormulaExpr> {
        if self.check(&TokenKind::RightParen) {
            return Err(self.unexpected("expression"));
        }

        let first_offset = self.offset();
        let mut expr = self.parse_expression()?;

        if self.check(&TokenKind::Comma) {
            if !expr.is_reference() {
                return Err(FormulaError::parse(first_offset, "reference before ','"));
            }
            while self.check(&TokenKind::Comma) {
                self.pos += 1;
                let operand_offset = self.offset();
                let operand = self.parse_expression()?;
                if !operand.is_reference() {
                    return Err(FormulaError::parse(operand_offset, "reference"));
                }
                expr = Self::binary(BinaryOperator::Union, expr, operand);
            }
        }

        self.expect(TokenKind::RightParen)?;
        Ok(expr)
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(TokenKind::LeftParen)?;

        let mut args = Vec::new();
        if self.check(&TokenKind::RightParen) {
            self.pos += 1;
            return Ok(FormulaExpr::Function { name, args });
        }

        loop {
            match self.current() {
                Some(TokenKind::Comma) | Some(TokenKind::RightParen) => {
                    args.push(FormulaExpr::Missing)
                }
                _ => args.push(self.parse_expression()?),
            }

            match self.current() {
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::RightParen) => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }

        Ok(FormulaExpr::Function { name, args })
    }

    /// Array constant `{1,2;3,4}`
    fn parse_array(&mut self, open_offset: usize) -> FormulaResult<FormulaExpr> {
        let mut rows: Vec<Vec<FormulaValue>> = vec![Vec::new()];

        loop {
            let value = self.parse_array_element()?;
            if let Some(row) = rows.last_mut() {
                row.push(value);
            }

            match self.current() {
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::Semicolon) => {
                    self.pos += 1;
                    rows.push(Vec::new());
                }
                Some(TokenKind::RightBrace) => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected("',', ';' or '}'")),
            }
        }

        Grid::from_rows(rows)
            .map(FormulaExpr::Array)
            .ok_or(FormulaError::MalformedGrid {
                offset: open_offset,
            })
    }

    fn parse_array_element(&mut self) -> FormulaResult<FormulaValue> {
        let offset = self.offset();
        let sign = match self.current() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                Some(-1.0)
            }
            Some(TokenKind::Plus) => {
                self.pos += 1;
                Some(1.0)
            }
            _ => None,
        };

        let value = match (self.consume().map(|t| t.kind), sign) {
            (Some(TokenKind::Number(n)), sign) => FormulaValue::Number(n * sign.unwrap_or(1.0)),
            (Some(TokenKind::Text(s)), None) => FormulaValue::String(s),
            (Some(TokenKind::Boolean(b)), None) => FormulaValue::Boolean(b),
            (Some(TokenKind::Error(e)), None) => FormulaValue::Error(e),
            _ => return Err(FormulaError::parse(offset, "constant")),
        };
        Ok(value)
    }
}
