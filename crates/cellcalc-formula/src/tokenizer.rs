//! Formula tokenizer
//!
//! Turns formula text (without its leading `=`) into a flat list of
//! [`Token`]s. References are resolved to [`CellReference`] /
//! [`RangeReference`] here so the parser only deals with structure.

use cellcalc_core::{CellAddress, CellError, CellRange};

use crate::ast::{CellReference, RangeReference};
use crate::error::{FormulaError, FormulaResult};

/// A token with its raw source text and byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),

    // References and identifiers
    CellRef(CellReference),
    RangeRef(RangeReference),
    /// Identifier directly followed by '(' (upper-cased)
    Function(String),
    /// Any other identifier, resolved as a defined name
    Name(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,

    // Separators and delimiters
    Comma,
    Semicolon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
}

impl TokenKind {
    /// Short human-readable description for parse errors
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Number(_) => "number",
            TokenKind::Text(_) => "text",
            TokenKind::Boolean(_) => "boolean",
            TokenKind::Error(_) => "error value",
            TokenKind::CellRef(_) => "cell reference",
            TokenKind::RangeRef(_) => "range reference",
            TokenKind::Function(_) => "function name",
            TokenKind::Name(_) => "name",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            _ => "operator",
        }
    }
}

/// Tokenize formula text
///
/// ```rust
/// use cellcalc_formula::tokenizer::{tokenize, TokenKind};
///
/// let tokens = tokenize("SUM(A1:B2)*50%").unwrap();
/// assert!(matches!(tokens[0].kind, TokenKind::Function(ref n) if n == "SUM"));
/// assert!(matches!(tokens[2].kind, TokenKind::RangeRef(_)));
/// assert_eq!(tokens[5].kind, TokenKind::Number(0.5));
/// ```
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();

    loop {
        lexer.skip_whitespace();
        if lexer.is_at_end() {
            return Ok(tokens);
        }
        let start = lexer.pos;
        let kind = lexer.scan_token()?;
        tokens.push(Token {
            kind,
            text: input[start..lexer.pos].to_string(),
            offset: start,
        });
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn scan_token(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Err(FormulaError::lex(start, "unexpected end of formula")),
        };

        let single = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '^' => Some(TokenKind::Caret),
            '%' => Some(TokenKind::Percent),
            '&' => Some(TokenKind::Ampersand),
            '=' => Some(TokenKind::Equal),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            '{' => Some(TokenKind::LeftBrace),
            '}' => Some(TokenKind::RightBrace),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(kind);
        }

        match c {
            '<' => {
                self.advance();
                Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        TokenKind::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        TokenKind::NotEqual
                    }
                    _ => TokenKind::LessThan,
                })
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Ok(TokenKind::GreaterEqual)
                } else {
                    Ok(TokenKind::GreaterThan)
                }
            }
            '"' => self.scan_string(),
            '#' => self.scan_error(),
            '\'' => {
                let sheet = self.scan_quoted_sheet()?;
                self.scan_qualified_reference(sheet, start)
            }
            c if c.is_ascii_digit() => self.scan_number(),
            '.' if self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' => self.scan_word(),
            other => Err(FormulaError::lex(
                start,
                format!("unexpected character '{}'", other),
            )),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        self.advance();

        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => return Err(FormulaError::lex(start, "unterminated string literal")),
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    text.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::Text(text));
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        self.eat_digits();

        if self.peek_char() == Some('.') {
            self.advance();
            self.eat_digits();
        }

        // Exponent only counts when digits follow ("1E" alone is not a number)
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign = matches!(self.peek_char_at(1), Some('+' | '-')) as usize;
            if self
                .peek_char_at(1 + sign)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..=sign {
                    self.advance();
                }
                self.eat_digits();
            }
        }

        let value: f64 = self.input[start..self.pos]
            .parse()
            .map_err(|_| FormulaError::lex(start, "invalid number"))?;
        if !value.is_finite() {
            return Err(FormulaError::lex(start, "number out of range"));
        }

        if self.peek_char() == Some('%') {
            self.advance();
            return Ok(TokenKind::Number(value / 100.0));
        }
        Ok(TokenKind::Number(value))
    }

    fn scan_error(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '/' | '!' | '?' | '_'))
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        CellError::parse(text)
            .map(TokenKind::Error)
            .ok_or_else(|| FormulaError::lex(start, format!("unknown error literal '{}'", text)))
    }

    /// Identifier, boolean, cell/range reference, function name or the
    /// unquoted sheet prefix of a qualified reference
    fn scan_word(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        let word = self.eat_word();

        if self.peek_char() == Some('!') {
            return self.scan_qualified_reference(word.to_string(), start);
        }

        if self.peek_char() == Some('(') {
            return Ok(TokenKind::Function(word.to_uppercase()));
        }

        if word.eq_ignore_ascii_case("TRUE") {
            return Ok(TokenKind::Boolean(true));
        }
        if word.eq_ignore_ascii_case("FALSE") {
            return Ok(TokenKind::Boolean(false));
        }

        match CellAddress::parse(word) {
            Ok(address) => Ok(self.finish_reference(None, address)),
            Err(_) if word.contains('$') => Err(FormulaError::lex(
                start,
                format!("invalid cell reference '{}'", word),
            )),
            Err(_) => Ok(TokenKind::Name(word.to_string())),
        }
    }

    /// `'Sheet Name'` with `''` standing for an apostrophe
    fn scan_quoted_sheet(&mut self) -> FormulaResult<String> {
        let start = self.pos;
        self.advance();

        let mut name = String::new();
        loop {
            match self.peek_char() {
                None => return Err(FormulaError::lex(start, "unterminated sheet name")),
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    return Ok(name);
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }
    }

    /// After a sheet name: `!A1` or `!A1:B2`
    fn scan_qualified_reference(&mut self, sheet: String, start: usize) -> FormulaResult<TokenKind> {
        if self.peek_char() != Some('!') {
            return Err(FormulaError::lex(self.pos, "expected '!' after sheet name"));
        }
        self.advance();

        let word_start = self.pos;
        let word = self.eat_word();
        match CellAddress::parse(word) {
            Ok(address) if !word.is_empty() => Ok(self.finish_reference(Some(sheet), address)),
            _ => Err(FormulaError::lex(
                word_start.max(start),
                format!("expected a cell reference after '{}!'", sheet),
            )),
        }
    }

    /// Extend a cell reference into a range when `:address` follows directly
    fn finish_reference(&mut self, sheet: Option<String>, address: CellAddress) -> TokenKind {
        if self.peek_char() == Some(':') {
            let checkpoint = self.pos;
            self.advance();
            let word = self.eat_word();
            if let Ok(end) = CellAddress::parse(word) {
                if !word.is_empty() && self.peek_char() != Some('!') && self.peek_char() != Some('(')
                {
                    return TokenKind::RangeRef(RangeReference {
                        sheet,
                        range: CellRange::new(address, end),
                    });
                }
            }
            self.pos = checkpoint;
        }

        TokenKind::CellRef(CellReference { sheet, address })
    }

    // === Helper methods ===

    fn eat_word(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '\\'))
        {
            self.advance();
        }
        &input[start..self.pos]
    }

    fn eat_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}
