//! Lexer module
//!
//! Turns `.stg` source text into a token stream. Identifiers follow the
//! Unicode XID rules; `@meta`, `@mauto` and `@port` are single tokens.

pub mod tokens;


pub use tokens::{LexError, Token, TokenKind};

use crate::util::span::{Position, Span};
use std::iter::Peekable;
use std::str::Chars;
use tokens::{keyword_from_str, marker_from_str};

/// Tokenize source code
///
/// The returned stream always ends with a [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    tracing::trace!("Tokenizing {} bytes", source.len());
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    let eof = lexer.position();
    tokens.push(Token::new(TokenKind::Eof, Span::new(eof, eof)));
    tracing::trace!("Tokenized into {} tokens", tokens.len());
    Ok(tokens)
}

/// Main lexer structure
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
    line: usize,
    column: usize,
    start: Position,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            start: Position::with_offset(1, 1, 0),
        }
    }

    /// Get current position
    pub fn position(&self) -> Position {
        Position::with_offset(self.line, self.column, self.offset)
    }

    /// Get span of current token
    fn span(&self) -> Span {
        Span::new(self.start, self.position())
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Peek at next character
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Peek at character after next
    fn peek_next(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    /// Consume `expected` if it is next
    fn eat(
        &mut self,
        expected: char,
    ) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    self.start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(LexError::UnterminatedComment { span: self.span() })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia()?;
        self.start = self.position();

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(None),
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::Neq
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' if self.eat('&') => TokenKind::And,
            '|' if self.eat('|') => TokenKind::Or,
            '.' => {
                if self.eat('.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '"' => self.scan_string()?,
            '@' => self.scan_marker()?,
            c if c.is_ascii_digit() => self.scan_number(c)?,
            c if is_identifier_start(c) => {
                let word = self.scan_word(c);
                keyword_from_str(&word).unwrap_or(TokenKind::Identifier(word))
            }
            ch => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    span: self.span(),
                })
            }
        };

        Ok(Some(Token::new(kind, self.span())))
    }

    fn scan_word(
        &mut self,
        first: char,
    ) -> String {
        let mut word = String::from(first);
        while let Some(c) = self.peek() {
            if !is_identifier_char(c) {
                break;
            }
            word.push(c);
            self.advance();
        }
        word
    }

    fn scan_marker(&mut self) -> Result<TokenKind, LexError> {
        let word = match self.peek() {
            Some(c) if is_identifier_start(c) => {
                self.advance();
                self.scan_word(c)
            }
            _ => String::new(),
        };
        marker_from_str(&word).ok_or_else(|| LexError::UnknownMarker {
            name: word,
            span: self.span(),
        })
    }

    fn scan_number(
        &mut self,
        first: char,
    ) -> Result<TokenKind, LexError> {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek().is_some_and(is_identifier_start) {
            while let Some(c) = self.peek().filter(|c| is_identifier_char(*c)) {
                text.push(c);
                self.advance();
            }
            return Err(LexError::InvalidNumber {
                text,
                span: self.span(),
            });
        }
        text.replace('_', "")
            .parse::<i64>()
            .map(TokenKind::IntLiteral)
            .map_err(|_| LexError::InvalidNumber {
                text,
                span: self.span(),
            })
    }

    fn scan_string(&mut self) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(TokenKind::StringLiteral(value)),
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(LexError::InvalidEscape {
                                sequence: other,
                                span: self.span(),
                            })
                        }
                        None => return Err(LexError::UnterminatedString { span: self.span() }),
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
                None => return Err(LexError::UnterminatedString { span: self.span() }),
            }
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

fn is_identifier_char(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}
