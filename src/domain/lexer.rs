//! Formula lexer.
//!
//! Single pass over the input producing positioned tokens. Identifiers are upper-cased;
//! `#`/`//` line comments and `{ }` block comments are dropped along with whitespace.

use crate::domain::error::LexError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    LParen,
    RParen,
    Comma,
    Semicolon,
    LBracket,
    RBracket,
    Assign,
    Colon,
    Dot,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Ident(name) => write!(f, "identifier {name}"),
            TokenKind::And => f.write_str("'AND'"),
            TokenKind::Or => f.write_str("'OR'"),
            TokenKind::Not => f.write_str("'NOT'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Caret => f.write_str("'^'"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Ge => f.write_str("'>='"),
            TokenKind::Le => f.write_str("'<='"),
            TokenKind::Eq => f.write_str("'='"),
            TokenKind::Ne => f.write_str("'<>'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Assign => f.write_str("':='"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.advance() {
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skips whitespace and comments; errors on an unterminated `{`.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_second() == Some('/') => self.skip_line(),
                Some('{') => {
                    let start = self.pos;
                    match self.remaining().find('}') {
                        Some(end) => self.pos += end + 1,
                        None => {
                            return Err(LexError {
                                message: "unterminated '{' comment".into(),
                                character: '{',
                                position: start,
                            });
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn eat_digits(&mut self) -> usize {
        let mut count = 0;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            count += 1;
        }
        count
    }

    fn malformed(&self, start: usize, reason: &str) -> LexError {
        LexError {
            message: format!("malformed number '{}': {reason}", &self.input[start..self.pos]),
            character: self.input[start..].chars().next().unwrap_or('0'),
            position: start,
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.eat_digits();

        if self.peek() == Some('.') {
            self.advance();
            if self.eat_digits() == 0 {
                return Err(self.malformed(start, "expected digits after '.'"));
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if self.eat_digits() == 0 {
                return Err(self.malformed(start, "expected exponent digits"));
            }
        }

        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
            return Err(self.malformed(start, "identifiers cannot start with a digit"));
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.malformed(start, "not a number"))
    }

    fn lex_word(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word = self.input[start..self.pos].to_uppercase();
        match word.as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            _ => TokenKind::Ident(word),
        }
    }

    /// Operators and punctuation, longest match first.
    fn lex_symbol(&mut self, ch: char) -> Result<TokenKind, LexError> {
        let start = self.pos;
        let next = self.peek_second();
        let (kind, width) = match (ch, next) {
            (':', Some('=')) => (TokenKind::Assign, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('<', Some('>')) => (TokenKind::Ne, 2),
            ('!', Some('=')) => (TokenKind::Ne, 2),
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('^', _) => (TokenKind::Caret, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('=', _) => (TokenKind::Eq, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            _ => return Err(LexError::unexpected(ch, start)),
        };
        for _ in 0..width {
            self.advance();
        }
        Ok(kind)
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let position = self.pos;
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    position,
                });
                return Ok(tokens);
            };
            let kind = if ch.is_ascii_digit() {
                self.lex_number()?
            } else if ch.is_alphabetic() || ch == '_' {
                self.lex_word()
            } else {
                self.lex_symbol(ch)?
            };
            tokens.push(Token { kind, position });
        }
    }
}

/// Converts formula text into tokens terminated by [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}
