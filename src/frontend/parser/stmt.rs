//! Statement and item parsing

use super::ast::*;
use super::state::*;
use super::ParseError;
use crate::frontend::lexer::tokens::*;
use crate::util::span::Span;

impl<'a> ParserState<'a> {
    /// Parse a top-level item
    pub fn parse_item(&mut self) -> PResult<Item> {
        let start = self.span();
        match self.current_kind() {
            TokenKind::KwFn => self.parse_fn(FnKind::Ordinary, start).map(Item::Function),
            TokenKind::AtMauto => {
                self.bump();
                self.parse_fn(FnKind::Mauto, start).map(Item::Function)
            }
            TokenKind::KwConsteval => {
                self.bump();
                self.parse_fn(FnKind::Consteval, start).map(Item::Function)
            }
            TokenKind::KwConstexpr => {
                self.bump();
                self.parse_fn(FnKind::Constexpr, start).map(Item::Function)
            }
            TokenKind::KwLet => {
                self.bump();
                let (name, _) = self.expect_identifier()?;
                let ty = self.parse_type_annotation()?;
                self.expect(&TokenKind::Eq)?;
                let init = self.parse_expression(BP_LOWEST)?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Item::Global(GlobalDecl {
                    name,
                    ty,
                    init,
                    span: self.span_from(start),
                }))
            }
            TokenKind::AtMeta => self.parse_stmt().map(Item::Meta),
            _ => Err(ParseError::ExpectedItem {
                found: self.current_kind().clone(),
                span: start,
            }),
        }
    }

    /// Parse `fn name(params) (: ret)? { body }`
    fn parse_fn(
        &mut self,
        kind: FnKind,
        start: Span,
    ) -> PResult<FnDecl> {
        self.expect(&TokenKind::KwFn)?;
        let (name, _) = self.expect_identifier()?;

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            params.push(self.parse_param()?);
            if !self.skip(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;

        let ret = self.parse_type_annotation()?;
        let body = self.parse_block()?;

        Ok(FnDecl {
            name,
            kind,
            params,
            ret,
            body,
            span: self.span_from(start),
        })
    }

    /// Parse `(const)? name: type`
    fn parse_param(&mut self) -> PResult<Param> {
        let start = self.span();
        let is_const = self.skip(&TokenKind::KwConst);
        let (name, _) = self.expect_identifier()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param {
            name,
            ty,
            is_const,
            span: self.span_from(start),
        })
    }

    /// Parse `{ stmt* }`
    pub fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at_end() {
                return Err(ParseError::UnterminatedBlock { span: start });
            }
            if self.skip(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    /// Parse a statement
    pub fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.span();

        let kind = match self.current_kind() {
            // meta-stage statement
            TokenKind::AtMeta => {
                self.bump();
                StmtKind::Meta(Box::new(self.parse_stmt()?))
            }
            TokenKind::KwLet => self.parse_let()?,
            TokenKind::KwIf => self.parse_if()?,
            TokenKind::KwFor => self.parse_for()?,
            TokenKind::KwWhile => {
                self.bump();
                let cond = self.parse_expression(BP_LOWEST)?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::KwReturn => {
                self.bump();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression(BP_LOWEST)?)
                };
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            // `++x;` / `--x;`
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.at(&TokenKind::PlusPlus) {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                self.bump();
                let target = self.parse_expression(BP_UNARY)?;
                self.check_place(&target)?;
                self.expect(&TokenKind::Semicolon)?;
                let one = Expr::new(ExprKind::Int(1), target.span);
                compound_assign(target, op, one)
            }
            _ => self.parse_expr_or_assign()?,
        };

        Ok(Stmt::new(kind, self.span_from(start)))
    }

    /// Parse `let name (: ty)? = init;`
    fn parse_let(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenKind::KwLet)?;
        let (name, _) = self.expect_identifier()?;
        let ty = self.parse_type_annotation()?;
        self.expect(&TokenKind::Eq)?;
        let init = self.parse_expression(BP_LOWEST)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(StmtKind::Let { name, ty, init })
    }

    /// Parse `if cond { } (else if ... | else { })?`
    fn parse_if(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenKind::KwIf)?;
        let cond = self.parse_expression(BP_LOWEST)?;
        let then_block = self.parse_block()?;

        let else_block = if self.skip(&TokenKind::KwElse) {
            if self.at(&TokenKind::KwIf) {
                let start = self.span();
                let nested = self.parse_if()?;
                let span = self.span_from(start);
                Some(Block {
                    stmts: vec![Stmt::new(nested, span)],
                    span,
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    /// Parse `for var in start..end { body }`
    fn parse_for(&mut self) -> PResult<StmtKind> {
        self.expect(&TokenKind::KwFor)?;
        let (var, _) = self.expect_identifier()?;
        self.expect(&TokenKind::KwIn)?;
        let start = self.parse_expression(BP_LOWEST)?;
        self.expect(&TokenKind::DotDot)?;
        let end = self.parse_expression(BP_LOWEST)?;
        let body = self.parse_block()?;
        Ok(StmtKind::For {
            var,
            start,
            end,
            body,
        })
    }

    /// Parse an expression statement or an assignment
    fn parse_expr_or_assign(&mut self) -> PResult<StmtKind> {
        let expr = self.parse_expression(BP_LOWEST)?;

        let kind = match self.current_kind() {
            TokenKind::Eq => {
                self.bump();
                self.check_place(&expr)?;
                let value = self.parse_expression(BP_LOWEST)?;
                StmtKind::Assign {
                    target: expr,
                    value,
                }
            }
            TokenKind::PlusEq | TokenKind::MinusEq => {
                let op = if self.at(&TokenKind::PlusEq) {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                self.bump();
                self.check_place(&expr)?;
                let value = self.parse_expression(BP_LOWEST)?;
                compound_assign(expr, op, value)
            }
            _ => StmtKind::Expr(expr),
        };

        self.expect(&TokenKind::Semicolon)?;
        Ok(kind)
    }

    /// Only names and index expressions rooted at a name can be assigned
    fn check_place(
        &self,
        target: &Expr,
    ) -> PResult<()> {
        if target.root_name().is_some() {
            Ok(())
        } else {
            Err(ParseError::InvalidAssignTarget { span: target.span })
        }
    }
}

/// `target op= value` becomes `target = target op value`
fn compound_assign(
    target: Expr,
    op: BinOp,
    value: Expr,
) -> StmtKind {
    let span = target.span.to(value.span);
    let combined = Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(target.clone()),
            rhs: Box::new(value),
        },
        span,
    );
    StmtKind::Assign {
        target,
        value: combined,
    }
}
