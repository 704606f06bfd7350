//! Type annotation parsing

use super::state::*;
use super::ParseError;
use crate::frontend::lexer::tokens::*;
use crate::frontend::types::TypeDesc;

impl<'a> ParserState<'a> {
    /// Parse a type: `int`, `bool`, `str`, `()` or `[T]`
    pub fn parse_type(&mut self) -> PResult<TypeDesc> {
        match self.current_kind() {
            TokenKind::LParen => {
                self.bump();
                self.expect(&TokenKind::RParen)?;
                Ok(TypeDesc::Unit)
            }
            TokenKind::LBracket => {
                self.bump();
                let elem = self.parse_type()?;
                self.expect(&TokenKind::RBracket)?;
                Ok(TypeDesc::vec_of(elem))
            }
            TokenKind::Identifier(name) => {
                let ty = match name.as_str() {
                    "int" => TypeDesc::Int,
                    "bool" => TypeDesc::Bool,
                    "str" => TypeDesc::Str,
                    _ => {
                        return Err(ParseError::UnknownType {
                            name: name.clone(),
                            span: self.span(),
                        })
                    }
                };
                self.bump();
                Ok(ty)
            }
            other => Err(ParseError::ExpectedType {
                found: other.clone(),
                span: self.span(),
            }),
        }
    }

    /// Parse an optional `: type` annotation
    pub fn parse_type_annotation(&mut self) -> PResult<Option<TypeDesc>> {
        if self.skip(&TokenKind::Colon) {
            self.parse_type().map(Some)
        } else {
            Ok(None)
        }
    }
}
