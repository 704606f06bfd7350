//! Surface-syntax printer for the residual program

use super::ir::*;
use crate::frontend::parser::ast::{PREC_POSTFIX, PREC_UNARY};
use std::fmt;

const INDENT: &str = "    ";

/// Pretty printer; in inline mode line breaks become single spaces
struct Printer {
    out: String,
    depth: usize,
    inline: bool,
}

impl Printer {
    fn new(inline: bool) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            inline,
        }
    }

    fn newline(&mut self) {
        if self.inline {
            self.out.push(' ');
        } else {
            self.out.push('\n');
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
        }
    }

    fn literal(
        &mut self,
        literal: &Literal,
    ) {
        match literal {
            Literal::Unit => self.out.push_str("()"),
            Literal::Int(n) => self.out.push_str(&n.to_string()),
            Literal::Bool(b) => self.out.push_str(&b.to_string()),
            Literal::Str(s) => self.out.push_str(&format!("{:?}", s)),
        }
    }

    fn expr_list(
        &mut self,
        items: &[ObjExpr],
    ) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(item, 0);
        }
    }

    fn expr(
        &mut self,
        expr: &ObjExpr,
        min_prec: u8,
    ) {
        let prec = precedence(expr);
        let parens = prec < min_prec;
        if parens {
            self.out.push('(');
        }
        match expr {
            ObjExpr::Lit(literal) => self.literal(literal),
            ObjExpr::Var(name) => self.out.push_str(name),
            ObjExpr::Unary { op, expr } => {
                self.out.push_str(op.symbol());
                self.expr(expr, PREC_UNARY);
            }
            ObjExpr::Binary { op, lhs, rhs } => {
                self.expr(lhs, op.precedence());
                self.out.push_str(&format!(" {} ", op.symbol()));
                self.expr(rhs, op.precedence() + 1);
            }
            ObjExpr::Call { callee, args } => {
                self.out.push_str(callee);
                self.out.push('(');
                self.expr_list(args);
                self.out.push(')');
            }
            ObjExpr::Index { base, index } => {
                self.expr(base, PREC_POSTFIX);
                self.out.push('[');
                self.expr(index, 0);
                self.out.push(']');
            }
            ObjExpr::Method {
                receiver,
                method,
                args,
            } => {
                self.expr(receiver, PREC_POSTFIX);
                self.out.push('.');
                self.out.push_str(method);
                self.out.push('(');
                self.expr_list(args);
                self.out.push(')');
            }
            ObjExpr::List { items, .. } => {
                self.out.push('[');
                self.expr_list(items);
                self.out.push(']');
            }
            ObjExpr::Block { stmts, result } => {
                let was_inline = std::mem::replace(&mut self.inline, true);
                self.out.push('{');
                for stmt in stmts {
                    self.out.push(' ');
                    self.stmt(stmt);
                }
                self.out.push(' ');
                self.expr(result, 0);
                self.out.push_str(" }");
                self.inline = was_inline;
            }
        }
        if parens {
            self.out.push(')');
        }
    }

    fn body(
        &mut self,
        stmts: &[ObjStmt],
    ) {
        self.out.push('{');
        self.depth += 1;
        for stmt in stmts {
            self.newline();
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.newline();
        self.out.push('}');
    }

    fn stmt(
        &mut self,
        stmt: &ObjStmt,
    ) {
        match stmt {
            ObjStmt::Let { name, init } => {
                self.out.push_str(&format!("let {} = ", name));
                self.expr(init, 0);
                self.out.push(';');
            }
            ObjStmt::Assign {
                name,
                indices,
                value,
            } => {
                self.out.push_str(name);
                for index in indices {
                    self.out.push('[');
                    self.expr(index, 0);
                    self.out.push(']');
                }
                self.out.push_str(" = ");
                self.expr(value, 0);
                self.out.push(';');
            }
            ObjStmt::Expr(expr) => {
                self.expr(expr, 0);
                self.out.push(';');
            }
            ObjStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.out.push_str("if ");
                self.expr(cond, 0);
                self.out.push(' ');
                self.body(then_body);
                if !else_body.is_empty() {
                    self.out.push_str(" else ");
                    self.body(else_body);
                }
            }
            ObjStmt::While { cond, body } => {
                self.out.push_str("while ");
                self.expr(cond, 0);
                self.out.push(' ');
                self.body(body);
            }
            ObjStmt::For {
                var,
                start,
                end,
                body,
            } => {
                self.out.push_str(&format!("for {} in ", var));
                self.expr(start, 0);
                self.out.push_str("..");
                self.expr(end, 0);
                self.out.push(' ');
                self.body(body);
            }
            ObjStmt::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value, 0);
                }
                self.out.push(';');
            }
            ObjStmt::Block(body) => self.body(body),
        }
    }

    fn function(
        &mut self,
        function: &ObjFunction,
    ) {
        let params = function
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect::<Vec<_>>()
            .join(", ");
        self.out
            .push_str(&format!("fn {}({})", function.name, params));
        if let Some(ret) = &function.ret {
            self.out.push_str(&format!(": {}", ret));
        }
        self.out.push(' ');
        self.body(&function.body);
    }
}

fn precedence(expr: &ObjExpr) -> u8 {
    match expr {
        ObjExpr::Binary { op, .. } => op.precedence(),
        ObjExpr::Unary { .. } => PREC_UNARY,
        ObjExpr::Lit(Literal::Int(n)) if *n < 0 => PREC_UNARY,
        _ => PREC_POSTFIX,
    }
}

impl fmt::Display for ObjExpr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut printer = Printer::new(true);
        printer.expr(self, 0);
        f.write_str(&printer.out)
    }
}

impl fmt::Display for ObjStmt {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut printer = Printer::new(false);
        printer.stmt(self);
        f.write_str(&printer.out)
    }
}

impl fmt::Display for ObjFunction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut printer = Printer::new(false);
        printer.function(self);
        f.write_str(&printer.out)
    }
}

impl fmt::Display for ResidualProgram {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut printer = Printer::new(false);
        for global in &self.globals {
            printer.stmt(&ObjStmt::Let {
                name: global.name.clone(),
                init: global.init.clone(),
            });
            printer.out.push('\n');
        }
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 || !self.globals.is_empty() {
                printer.out.push('\n');
            }
            printer.function(function);
            printer.out.push('\n');
        }
        f.write_str(&printer.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::ast::BinOp;
    use crate::frontend::types::TypeDesc;

    fn mul(
        lhs: ObjExpr,
        rhs: ObjExpr,
    ) -> ObjExpr {
        ObjExpr::Binary {
            op: BinOp::Mul,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn test_literal_products_stay_verbatim() {
        let e = mul(mul(ObjExpr::int(100), ObjExpr::int(100)), ObjExpr::int(0));
        assert_eq!(e.to_string(), "100 * 100 * 0");
    }

    #[test]
    fn test_parenthesizes_by_precedence() {
        let sum = ObjExpr::Binary {
            op: BinOp::Add,
            lhs: Box::new(ObjExpr::Var("a".into())),
            rhs: Box::new(ObjExpr::int(-1)),
        };
        assert_eq!(mul(sum, ObjExpr::int(2)).to_string(), "(a + -1) * 2");
    }

    #[test]
    fn test_program_layout() {
        let program = ResidualProgram {
            globals: vec![ObjGlobal {
                name: "c".into(),
                init: ObjExpr::List {
                    elem: TypeDesc::Int,
                    items: vec![ObjExpr::int(0), ObjExpr::int(1)],
                },
            }],
            functions: vec![ObjFunction {
                name: "main".into(),
                params: vec![],
                ret: None,
                body: vec![
                    ObjStmt::Let {
                        name: "r".into(),
                        init: ObjExpr::Block {
                            stmts: vec![ObjStmt::Let {
                                name: "i_1".into(),
                                init: ObjExpr::int(100),
                            }],
                            result: Box::new(ObjExpr::Var("i_1".into())),
                        },
                    },
                    ObjStmt::Expr(ObjExpr::Call {
                        callee: "print".into(),
                        args: vec![ObjExpr::Var("r".into())],
                    }),
                ],
            }],
        };
        assert_eq!(
            program.to_string(),
            "let c = [0, 1];\n\nfn main() {\n    let r = { let i_1 = 100; i_1 };\n    print(r);\n}\n"
        );
    }
}
