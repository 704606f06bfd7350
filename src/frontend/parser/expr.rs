//! Pratt Parser expression parsing

use super::ast::*;
use super::state::*;

impl<'a> ParserState<'a> {
    /// Parse an expression using Pratt parser
    ///
    /// # Algorithm
    /// 1. Parse prefix expression (nud)
    /// 2. While next token is infix operator with binding power >= bp:
    ///    parse infix expression (led) with the operator's right binding power
    /// 3. Return expression
    pub fn parse_expression(
        &mut self,
        min_bp: u8,
    ) -> PResult<Expr> {
        let prefix_fn = match self.prefix_info() {
            Some(prefix_fn) => prefix_fn,
            None => {
                return Err(super::ParseError::ExpectedExpression {
                    found: self.current_kind().clone(),
                    span: self.span(),
                })
            }
        };

        let mut lhs = (prefix_fn)(self)?;

        while let Some((left_bp, right_bp, infix_fn)) = self.infix_info() {
            if left_bp < min_bp {
                break;
            }
            lhs = (infix_fn)(self, lhs, right_bp)?;
        }

        Ok(lhs)
    }
}
