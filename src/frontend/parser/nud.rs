//! Prefix expression parsing (nud - null denotation)

use super::ast::*;
use super::state::*;
use crate::frontend::lexer::tokens::*;

/// Prefix parser entry
pub(crate) type PrefixFn<'a> = fn(&mut ParserState<'a>) -> PResult<Expr>;

impl<'a> ParserState<'a> {
    /// Get the prefix parser for the current token
    #[inline]
    pub(crate) fn prefix_info(&self) -> Option<PrefixFn<'a>> {
        match self.current_kind() {
            // Unary operators
            TokenKind::Minus | TokenKind::Not => Some(Self::parse_unary),
            // Literals
            TokenKind::IntLiteral(_) | TokenKind::BoolLiteral(_) | TokenKind::StringLiteral(_) => {
                Some(Self::parse_literal)
            }
            // Name or call
            TokenKind::Identifier(_) => Some(Self::parse_identifier),
            // Grouped expression
            TokenKind::LParen => Some(Self::parse_group),
            // List literal
            TokenKind::LBracket => Some(Self::parse_list),
            // Porting request
            TokenKind::AtPort => Some(Self::parse_port),
            _ => None,
        }
    }

    /// Parse unary operator expression
    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.span();
        let op = match self.current_kind() {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Not => UnOp::Not,
            _ => return Err(self.unexpected()),
        };
        self.bump();

        let operand = self.parse_expression(BP_UNARY)?;
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
            span,
        ))
    }

    /// Parse integer, boolean or string literal
    fn parse_literal(&mut self) -> PResult<Expr> {
        let span = self.span();
        let kind = match self.current_kind() {
            TokenKind::IntLiteral(n) => ExprKind::Int(*n),
            TokenKind::BoolLiteral(b) => ExprKind::Bool(*b),
            TokenKind::StringLiteral(s) => ExprKind::Str(s.clone()),
            _ => return Err(self.unexpected()),
        };
        self.bump();
        Ok(Expr::new(kind, span))
    }

    /// Parse a name, or a call when followed by `(`
    fn parse_identifier(&mut self) -> PResult<Expr> {
        let (name, span) = self.expect_identifier()?;
        if !self.at(&TokenKind::LParen) {
            return Ok(Expr::new(ExprKind::Var(name), span));
        }

        let args = self.parse_args()?;
        Ok(Expr::new(
            ExprKind::Call { callee: name, args },
            self.span_from(span),
        ))
    }

    /// Parse `( expr, ... )` argument list
    pub(crate) fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let args = self.parse_comma_list(&TokenKind::RParen)?;
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    /// Parse comma separated expressions up to (not including) `close`
    fn parse_comma_list(
        &mut self,
        close: &TokenKind,
    ) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.at(close) {
            items.push(self.parse_expression(BP_LOWEST)?);
            if !self.skip(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// Parse `( expr )`
    fn parse_group(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::LParen)?;
        let mut inner = self.parse_expression(BP_LOWEST)?;
        self.expect(&TokenKind::RParen)?;
        inner.span = self.span_from(start);
        Ok(inner)
    }

    /// Parse `[a, b, c]`
    fn parse_list(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::LBracket)?;
        let items = self.parse_comma_list(&TokenKind::RBracket)?;
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::List(items), self.span_from(start)))
    }

    /// Parse `@port(expr)`
    fn parse_port(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::AtPort)?;
        self.expect(&TokenKind::LParen)?;
        let inner = self.parse_expression(BP_LOWEST)?;
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::new(
            ExprKind::Port(Box::new(inner)),
            self.span_from(start),
        ))
    }
}
