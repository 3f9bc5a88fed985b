use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;

/*
The scanner's job is to scan source text as a sequence of characters and group runs of
characters into lexemes. Each lexeme is then evaluated into a token for the parser.

Maximal munch: a sequence of characters that can match two or more possible tokens always
matches the token with the most characters (`<=` over `<` followed by `=`, etc).
*/

pub static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("var", TokenKind::Var);
    m.insert("if", TokenKind::If);
    m.insert("else", TokenKind::Else);
    m.insert("while", TokenKind::While);
    m.insert("do", TokenKind::Do);
    m
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // keywords
    Var,
    If,
    Else,
    While,
    Do,

    // identifiers / literals
    Id,
    Literal,

    // punctuation
    Semicolon,
    Comma,
    OpenBrace,
    CloseBrace,
    OpenCurly,
    CloseCurly,
    Assign,

    // operators (precedence table lives in `crate::grammar`)
    Plus,
    Minus,
    Increment,
    Decrement,
    LogicAnd,
    LogicOr,
    LogicXor,
    LogicNot,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    Equal,
    NotEqual,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single scanned token. `lexeme` holds the source text; `value` holds the
/// literal's numeric value for `Literal` tokens only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub value: Option<u8>,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, value: Option<u8>, line: usize) -> Self {
        Self { kind, lexeme: lexeme.into(), value, line }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.lexeme)
    }
}

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self) -> Result<Vec<Token>, CompileError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        log::debug!("lexer produced {} tokens", self.tokens.len());
        Ok(self.tokens)
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.current];
        self.current += 1;
        ch
    }

    fn scan_token(&mut self) -> Result<(), CompileError> {
        let ch = self.advance();
        match ch {
            '(' => self.add_token(TokenKind::OpenBrace),
            ')' => self.add_token(TokenKind::CloseBrace),
            '{' => self.add_token(TokenKind::OpenCurly),
            '}' => self.add_token(TokenKind::CloseCurly),
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            '+' => {
                if self.match_char('+') {
                    self.add_token(TokenKind::Increment);
                } else {
                    self.add_token(TokenKind::Plus);
                }
            }
            '-' => {
                if self.match_char('-') {
                    self.add_token(TokenKind::Decrement);
                } else {
                    self.add_token(TokenKind::Minus);
                }
            }
            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Equal);
                } else {
                    self.add_token(TokenKind::Assign);
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::NotEqual);
                } else {
                    self.add_token(TokenKind::LogicNot);
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::LessThanEquals);
                } else if self.match_char('<') {
                    self.add_token(TokenKind::ShiftLeft);
                } else {
                    self.add_token(TokenKind::LessThan);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::GreaterThanEquals);
                } else if self.match_char('>') {
                    self.add_token(TokenKind::ShiftRight);
                } else {
                    self.add_token(TokenKind::GreaterThan);
                }
            }
            '&' => {
                if self.match_char('&') {
                    self.add_token(TokenKind::LogicAnd);
                } else {
                    self.add_token(TokenKind::BitAnd);
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.add_token(TokenKind::LogicOr);
                } else {
                    self.add_token(TokenKind::BitOr);
                }
            }
            '^' => {
                if self.match_char('^') {
                    self.add_token(TokenKind::LogicXor);
                } else {
                    self.add_token(TokenKind::BitXor);
                }
            }
            '~' => self.add_token(TokenKind::BitNot),
            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_char('*') {
                    self.block_comment()?;
                } else {
                    return Err(CompileError::lexical(self.line, "unexpected character '/'"));
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            c if c.is_ascii_digit() => self.number()?,
            c if is_ident_start(c) => self.identifier(),
            c => return Err(CompileError::lexical(self.line, format!("unexpected character '{c}'"))),
        }
        Ok(())
    }

    fn block_comment(&mut self) -> Result<(), CompileError> {
        let start_line = self.line;
        loop {
            if self.is_at_end() {
                return Err(CompileError::lexical(start_line, "unterminated block comment"));
            }
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return Ok(());
            }
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }
    }

    fn number(&mut self) -> Result<(), CompileError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let value: u32 = text.parse().expect("digit run parses as an integer");
        if value > u8::MAX as u32 {
            return Err(CompileError::lexical(
                self.line,
                format!("integer literal {value} out of 8-bit range"),
            ));
        }
        self.add_token_with_value(TokenKind::Literal, value as u8);
        Ok(())
    }

    fn identifier(&mut self) {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        match KEYWORDS.get(text.as_str()) {
            Some(kind) => self.add_token(*kind),
            None => self.add_token(TokenKind::Id),
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        if self.is_at_end() { '\0' } else { self.source[self.current] }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() { '\0' } else { self.source[self.current + 1] }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn add_token(&mut self, kind: TokenKind) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, text, None, self.line));
    }

    fn add_token_with_value(&mut self, kind: TokenKind, value: u8) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, text, Some(value), self.line));
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).scan_tokens().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_declaration() {
        let kinds = kinds("var x = 5;");
        assert_eq!(
            kinds,
            vec![TokenKind::Var, TokenKind::Id, TokenKind::Assign, TokenKind::Literal, TokenKind::Semicolon]
        );
    }

    #[test]
    fn maximal_munch_operators() {
        assert_eq!(kinds("<="), vec![TokenKind::LessThanEquals]);
        assert_eq!(kinds("<<"), vec![TokenKind::ShiftLeft]);
        assert_eq!(kinds("<"), vec![TokenKind::LessThan]);
        assert_eq!(kinds("++"), vec![TokenKind::Increment]);
        assert_eq!(kinds("^^"), vec![TokenKind::LogicXor]);
    }

    #[test]
    fn skips_line_and_block_comments() {
        let kinds = kinds("var x = 1; // trailing\n/* block\ncomment */ var y = 2;");
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Var).count(), 2);
    }

    #[test]
    fn unterminated_block_comment_is_lexical_error() {
        let err = Lexer::new("/* never closed").scan_tokens().unwrap_err();
        assert!(matches!(err, CompileError::Lexical { .. }));
    }

    #[test]
    fn literal_out_of_range_is_lexical_error() {
        let err = Lexer::new("var x = 256;").scan_tokens().unwrap_err();
        assert!(matches!(err, CompileError::Lexical { .. }));
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let tokens = Lexer::new("var x = 1;\nvar y = 2;").scan_tokens().unwrap();
        let second_var = tokens.iter().filter(|t| t.kind == TokenKind::Var).nth(1).unwrap();
        assert_eq!(second_var.line, 2);
    }
}
