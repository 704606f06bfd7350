//! Parser state and token stream management

use super::ParseError;
use crate::frontend::lexer::tokens::*;
use crate::util::span::Span;

/// Binding power levels for Pratt parser
pub const BP_LOWEST: u8 = 0;
pub const BP_OR: u8 = 20;
pub const BP_AND: u8 = 30;
pub const BP_EQ: u8 = 40;
pub const BP_CMP: u8 = 50;
pub const BP_ADD: u8 = 60;
pub const BP_MUL: u8 = 70;
pub const BP_UNARY: u8 = 80;
pub const BP_CALL: u8 = 90;

/// Parser result alias
pub type PResult<T> = Result<T, ParseError>;

/// Parser state for tracking position in the token stream
#[derive(Debug)]
pub struct ParserState<'a> {
    /// Token stream
    tokens: &'a [Token],
    /// Current position in token stream
    pos: usize,
    /// Span of the most recently consumed token
    prev_span: Span,
}

impl<'a> ParserState<'a> {
    /// Create a new parser state
    #[inline]
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            prev_span: Span::dummy(),
        }
    }

    /// Check if at end of token stream
    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len() || matches!(self.tokens[self.pos].kind, TokenKind::Eof)
    }

    /// Get current token
    #[inline]
    pub fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Get current token kind
    #[inline]
    pub fn current_kind(&self) -> &TokenKind {
        self.current().map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    /// Check whether the current token is `kind`
    #[inline]
    pub fn at(
        &self,
        kind: &TokenKind,
    ) -> bool {
        self.current_kind() == kind
    }

    /// Peek at the token after the current one
    #[inline]
    pub fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Advance to next token
    #[inline]
    pub fn bump(&mut self) {
        if let Some(token) = self.current() {
            self.prev_span = token.span;
        }
        if !self.at_end() {
            self.pos += 1;
        }
    }

    /// Skip a specific token
    #[inline]
    pub fn skip(
        &mut self,
        kind: &TokenKind,
    ) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Expect a specific token
    pub fn expect(
        &mut self,
        kind: &TokenKind,
    ) -> PResult<Span> {
        if self.at(kind) {
            let span = self.span();
            self.bump();
            Ok(span)
        } else {
            Err(ParseError::ExpectedToken {
                expected: kind.clone(),
                found: self.current_kind().clone(),
                span: self.span(),
            })
        }
    }

    /// Expect an identifier and return its name
    pub fn expect_identifier(&mut self) -> PResult<(String, Span)> {
        match self.current_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.span();
                self.bump();
                Ok((name, span))
            }
            other => Err(ParseError::ExpectedIdentifier {
                found: other.clone(),
                span: self.span(),
            }),
        }
    }

    /// Span of the current token
    #[inline]
    pub fn span(&self) -> Span {
        self.current().map(|t| t.span).unwrap_or(self.prev_span)
    }

    /// Span from `start` up to the last consumed token
    #[inline]
    pub fn span_from(
        &self,
        start: Span,
    ) -> Span {
        start.to(self.prev_span)
    }

    /// Error for a token that cannot appear here
    pub fn unexpected(&self) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.current_kind().clone(),
            span: self.span(),
        }
    }
}
