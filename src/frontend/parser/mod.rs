//! Parser module
//!
//! This module implements a Pratt Parser for `.stg` source.
//! The parser transforms tokens into an Abstract Syntax Tree (AST).

pub mod ast;
mod expr;
mod led;
mod nud;
mod state;
mod stmt;
mod type_parser;

pub use state::{ParserState, BP_LOWEST};

use crate::frontend::lexer::tokens::*;
use crate::util::span::Span;
use ast::*;

/// Parse tokens into an AST module
///
/// # Example
/// ```text
/// @meta let j = 0;
/// fn main() {
///     print(j);
/// }
/// ```
pub fn parse(tokens: &[Token]) -> Result<Module, ParseError> {
    let mut state = ParserState::new(tokens);
    let mut items = Vec::new();

    while !state.at_end() {
        // Stray semicolons between items are empty statements
        if state.skip(&TokenKind::Semicolon) {
            continue;
        }
        items.push(state.parse_item()?);
    }

    tracing::debug!("Parsed {} items", items.len());
    Ok(Module { items })
}

/// Parse a single expression
pub fn parse_expression(tokens: &[Token]) -> Result<Expr, ParseError> {
    let mut state = ParserState::new(tokens);
    let expr = state.parse_expression(BP_LOWEST)?;
    if !state.at_end() {
        return Err(state.unexpected());
    }
    Ok(expr)
}

/// Parse error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: {found}")]
    UnexpectedToken { found: TokenKind, span: Span },

    #[error("Expected {expected}, found {found}")]
    ExpectedToken {
        expected: TokenKind,
        found: TokenKind,
        span: Span,
    },

    #[error("Expected identifier, found {found}")]
    ExpectedIdentifier { found: TokenKind, span: Span },

    #[error("Expected expression, found {found}")]
    ExpectedExpression { found: TokenKind, span: Span },

    #[error("Expected a declaration, found {found}")]
    ExpectedItem { found: TokenKind, span: Span },

    #[error("Expected type, found {found}")]
    ExpectedType { found: TokenKind, span: Span },

    #[error("Unknown type `{name}`")]
    UnknownType { name: String, span: Span },

    #[error("Invalid assignment target")]
    InvalidAssignTarget { span: Span },

    #[error("Unterminated block")]
    UnterminatedBlock { span: Span },
}

impl ParseError {
    /// Location of the error
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::ExpectedToken { span, .. }
            | ParseError::ExpectedIdentifier { span, .. }
            | ParseError::ExpectedExpression { span, .. }
            | ParseError::ExpectedItem { span, .. }
            | ParseError::ExpectedType { span, .. }
            | ParseError::UnknownType { span, .. }
            | ParseError::InvalidAssignTarget { span }
            | ParseError::UnterminatedBlock { span } => *span,
        }
    }
}

#[cfg(test)]
mod tests;
