//! Infix expression parsing (led - left denotation)

use super::ast::*;
use super::state::*;
use crate::frontend::lexer::tokens::*;

/// Infix parser entry: left operand and right binding power
pub(crate) type InfixFn<'a> = fn(&mut ParserState<'a>, Expr, u8) -> PResult<Expr>;

impl<'a> ParserState<'a> {
    /// Get infix binding powers and parser for current token
    #[inline]
    pub(crate) fn infix_info(&self) -> Option<(u8, u8, InfixFn<'a>)> {
        match self.current_kind() {
            // Logical OR
            TokenKind::Or => Some((BP_OR, BP_OR + 1, Self::parse_binary)),
            // Logical AND
            TokenKind::And => Some((BP_AND, BP_AND + 1, Self::parse_binary)),
            // Equality
            TokenKind::EqEq | TokenKind::Neq => Some((BP_EQ, BP_EQ + 1, Self::parse_binary)),
            // Comparison
            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => {
                Some((BP_CMP, BP_CMP + 1, Self::parse_binary))
            }
            // Addition/Subtraction
            TokenKind::Plus | TokenKind::Minus => Some((BP_ADD, BP_ADD + 1, Self::parse_binary)),
            // Multiplication/Division/Modulo
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
                Some((BP_MUL, BP_MUL + 1, Self::parse_binary))
            }
            // Method call
            TokenKind::Dot => Some((BP_CALL, BP_CALL + 1, Self::parse_method)),
            // Indexing
            TokenKind::LBracket => Some((BP_CALL, BP_CALL + 1, Self::parse_index)),
            _ => None,
        }
    }

    /// Parse binary operator expression
    fn parse_binary(
        &mut self,
        lhs: Expr,
        right_bp: u8,
    ) -> PResult<Expr> {
        let op = match self.current_kind() {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Neq => BinOp::Neq,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::And => BinOp::And,
            TokenKind::Or => BinOp::Or,
            _ => return Err(self.unexpected()),
        };
        self.bump();

        let rhs = self.parse_expression(right_bp)?;
        let span = lhs.span.to(rhs.span);
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    /// Parse `receiver.method(args)`
    fn parse_method(
        &mut self,
        receiver: Expr,
        _right_bp: u8,
    ) -> PResult<Expr> {
        self.expect(&TokenKind::Dot)?;
        let (method, _) = self.expect_identifier()?;
        let args = self.parse_args()?;
        let span = self.span_from(receiver.span);
        Ok(Expr::new(
            ExprKind::Method {
                receiver: Box::new(receiver),
                method,
                args,
            },
            span,
        ))
    }

    /// Parse `base[index]`
    fn parse_index(
        &mut self,
        base: Expr,
        _right_bp: u8,
    ) -> PResult<Expr> {
        self.expect(&TokenKind::LBracket)?;
        let index = self.parse_expression(BP_LOWEST)?;
        self.expect(&TokenKind::RBracket)?;
        let span = self.span_from(base.span);
        Ok(Expr::new(
            ExprKind::Index {
                base: Box::new(base),
                index: Box::new(index),
            },
            span,
        ))
    }
}
