//! Token types

use crate::util::span::Span;
use std::fmt;

/// Lexer error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character '{ch}' at {span}")]
    UnexpectedChar { ch: char, span: Span },
    #[error("Unterminated string starting at {span}")]
    UnterminatedString { span: Span },
    #[error("Unterminated block comment starting at {span}")]
    UnterminatedComment { span: Span },
    #[error("Invalid escape sequence: \\{sequence}")]
    InvalidEscape { sequence: char, span: Span },
    #[error("Invalid number literal: {text}")]
    InvalidNumber { text: String, span: Span },
    #[error("Unknown stage marker: @{name}")]
    UnknownMarker { name: String, span: Span },
}

impl LexError {
    /// Location of the error
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::InvalidEscape { span, .. }
            | LexError::InvalidNumber { span, .. }
            | LexError::UnknownMarker { span, .. } => *span,
        }
    }
}

/// Token kind
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwFn,
    KwLet,
    KwIf,
    KwElse,
    KwFor,
    KwIn,
    KwWhile,
    KwReturn,
    KwConsteval,
    KwConstexpr,
    KwConst,

    // Stage markers
    AtMeta,
    AtMauto,
    AtPort,

    // Identifiers
    Identifier(String),

    // Literals
    IntLiteral(i64),
    BoolLiteral(bool),
    StringLiteral(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    PlusEq,
    MinusEq,
    PlusPlus,
    MinusMinus,
    DotDot,
    Dot,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,

    // Special
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let text = match self {
            TokenKind::KwFn => "fn",
            TokenKind::KwLet => "let",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwFor => "for",
            TokenKind::KwIn => "in",
            TokenKind::KwWhile => "while",
            TokenKind::KwReturn => "return",
            TokenKind::KwConsteval => "consteval",
            TokenKind::KwConstexpr => "constexpr",
            TokenKind::KwConst => "const",
            TokenKind::AtMeta => "@meta",
            TokenKind::AtMauto => "@mauto",
            TokenKind::AtPort => "@port",
            TokenKind::Identifier(name) => return write!(f, "identifier `{}`", name),
            TokenKind::IntLiteral(n) => return write!(f, "integer `{}`", n),
            TokenKind::BoolLiteral(b) => return write!(f, "`{}`", b),
            TokenKind::StringLiteral(s) => return write!(f, "string {:?}", s),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::Neq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::DotDot => "..",
            TokenKind::Dot => ".",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Eof => "end of file",
        };
        write!(f, "`{}`", text)
    }
}

/// Token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Create a new token
    pub fn new(
        kind: TokenKind,
        span: Span,
    ) -> Self {
        Self { kind, span }
    }
}

/// Convert an identifier to a keyword token
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "fn" => Some(TokenKind::KwFn),
        "let" => Some(TokenKind::KwLet),
        "if" => Some(TokenKind::KwIf),
        "else" => Some(TokenKind::KwElse),
        "for" => Some(TokenKind::KwFor),
        "in" => Some(TokenKind::KwIn),
        "while" => Some(TokenKind::KwWhile),
        "return" => Some(TokenKind::KwReturn),
        "consteval" => Some(TokenKind::KwConsteval),
        "constexpr" => Some(TokenKind::KwConstexpr),
        "const" => Some(TokenKind::KwConst),

        // Boolean literals
        "true" => Some(TokenKind::BoolLiteral(true)),
        "false" => Some(TokenKind::BoolLiteral(false)),

        _ => None,
    }
}

/// Convert the word after `@` to a stage marker token
pub fn marker_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "meta" => Some(TokenKind::AtMeta),
        "mauto" => Some(TokenKind::AtMauto),
        "port" => Some(TokenKind::AtPort),
        _ => None,
    }
}
