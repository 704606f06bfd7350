//! Abstract Syntax Tree definitions

use crate::frontend::types::TypeDesc;
use crate::util::span::Span;
use serde::Serialize;
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// Binding strength used by the printers (higher binds tighter)
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Neq => 3,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 6,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

/// Precedence of unary and postfix forms in the printers
pub const PREC_UNARY: u8 = 7;
pub const PREC_POSTFIX: u8 = 8;

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Str(String),
    Var(String),
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Method {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
    /// `@port(expr)`: lower a meta-stage aggregate into an initializer list
    Port(Box<Expr>),
}

impl Expr {
    /// Create a new expression
    pub fn new(
        kind: ExprKind,
        span: Span,
    ) -> Self {
        Self { kind, span }
    }

    /// Visit every variable name read by this expression
    pub fn for_each_var(
        &self,
        f: &mut dyn FnMut(&str, Span),
    ) {
        match &self.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Str(_) => {}
            ExprKind::Var(name) => f(name, self.span),
            ExprKind::Unary { expr, .. } | ExprKind::Port(expr) => expr.for_each_var(f),
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.for_each_var(f);
                rhs.for_each_var(f);
            }
            ExprKind::Call { args, .. } | ExprKind::List(args) => {
                for arg in args {
                    arg.for_each_var(f);
                }
            }
            ExprKind::Index { base, index } => {
                base.for_each_var(f);
                index.for_each_var(f);
            }
            ExprKind::Method { receiver, args, .. } => {
                receiver.for_each_var(f);
                for arg in args {
                    arg.for_each_var(f);
                }
            }
        }
    }

    /// Whether some call in this expression satisfies `pred`
    pub fn any_call(
        &self,
        pred: &mut dyn FnMut(&str) -> bool,
    ) -> bool {
        match &self.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Str(_) | ExprKind::Var(_) => false,
            ExprKind::Unary { expr, .. } | ExprKind::Port(expr) => expr.any_call(pred),
            ExprKind::Binary { lhs, rhs, .. } => lhs.any_call(pred) || rhs.any_call(pred),
            ExprKind::Call { callee, args } => {
                pred(callee) || args.iter().any(|arg| arg.any_call(pred))
            }
            ExprKind::List(items) => items.iter().any(|item| item.any_call(pred)),
            ExprKind::Index { base, index } => base.any_call(pred) || index.any_call(pred),
            ExprKind::Method { receiver, args, .. } => {
                receiver.any_call(pred) || args.iter().any(|arg| arg.any_call(pred))
            }
        }
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Unary { .. } => PREC_UNARY,
            _ => PREC_POSTFIX,
        }
    }

    fn fmt_operand(
        &self,
        f: &mut fmt::Formatter<'_>,
        min_prec: u8,
    ) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(n) => write!(f, "{}", n),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Str(s) => write!(f, "{:?}", s),
            ExprKind::Var(name) => write!(f, "{}", name),
            ExprKind::Unary { op, expr } => {
                write!(f, "{}", op.symbol())?;
                expr.fmt_operand(f, PREC_UNARY)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                lhs.fmt_operand(f, op.precedence())?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, op.precedence() + 1)
            }
            ExprKind::Call { callee, args } => {
                write!(f, "{}(", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Index { base, index } => {
                base.fmt_operand(f, PREC_POSTFIX)?;
                write!(f, "[{}]", index)
            }
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                receiver.fmt_operand(f, PREC_POSTFIX)?;
                write!(f, ".{}(", method)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            ExprKind::Port(expr) => write!(f, "@port({})", expr),
        }
    }
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    items: &[Expr],
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Block of statements
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `@meta stmt`
    Meta(Box<Stmt>),
    /// `let name (: ty)? = init;`
    Let {
        name: String,
        ty: Option<TypeDesc>,
        init: Expr,
    },
    /// `target = value;` where target is a name or an index expression.
    /// `++x`, `x += e` and friends are desugared into this form.
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// `for var in start..end { body }`
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Block(Block),
}

impl Stmt {
    /// Create a new statement
    pub fn new(
        kind: StmtKind,
        span: Span,
    ) -> Self {
        Self { kind, span }
    }

    /// Name assigned by this statement, if it is an assignment
    pub fn assigned_name(&self) -> Option<&str> {
        match &self.kind {
            StmtKind::Assign { target, .. } => target.root_name(),
            _ => None,
        }
    }

    /// Collect every name assigned anywhere inside this statement
    pub fn collect_assigned(
        &self,
        out: &mut Vec<String>,
    ) {
        match &self.kind {
            StmtKind::Meta(inner) => inner.collect_assigned(out),
            StmtKind::Assign { .. } => {
                if let Some(name) = self.assigned_name() {
                    out.push(name.to_string());
                }
            }
            StmtKind::Expr(expr) => expr.collect_mutated(out),
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                then_block.collect_assigned(out);
                if let Some(block) = else_block {
                    block.collect_assigned(out);
                }
            }
            StmtKind::For { body, .. } | StmtKind::While { body, .. } => {
                body.collect_assigned(out)
            }
            StmtKind::Block(block) => block.collect_assigned(out),
            StmtKind::Let { .. } | StmtKind::Return(_) => {}
        }
    }
}

impl Expr {
    /// Root variable of a place expression (`x`, `x[i]`, `x[i][j]`)
    pub fn root_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            ExprKind::Index { base, .. } => base.root_name(),
            _ => None,
        }
    }

    /// Names mutated through method calls such as `v.push(x)`
    pub fn collect_mutated(
        &self,
        out: &mut Vec<String>,
    ) {
        if let ExprKind::Method {
            receiver, method, ..
        } = &self.kind
        {
            if method == "push" {
                if let Some(name) = receiver.root_name() {
                    out.push(name.to_string());
                }
            }
        }
    }
}

impl Block {
    /// Collect every name assigned anywhere inside this block
    pub fn collect_assigned(
        &self,
        out: &mut Vec<String>,
    ) {
        for stmt in &self.stmts {
            stmt.collect_assigned(out);
        }
    }
}

/// Function kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FnKind {
    /// `fn`
    Ordinary,
    /// `@mauto fn`: expanded at each call site
    Mauto,
    /// `consteval fn`: every call is evaluated during translation
    Consteval,
    /// `constexpr fn`: folded when called with constant arguments
    Constexpr,
}

impl fmt::Display for FnKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            FnKind::Ordinary => write!(f, "fn"),
            FnKind::Mauto => write!(f, "@mauto fn"),
            FnKind::Consteval => write!(f, "consteval fn"),
            FnKind::Constexpr => write!(f, "constexpr fn"),
        }
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeDesc,
    /// Declared `const`: callers must pass a constant expression
    pub is_const: bool,
    pub span: Span,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    pub kind: FnKind,
    pub params: Vec<Param>,
    pub ret: Option<TypeDesc>,
    pub body: Block,
    pub span: Span,
}

/// Object-stage global: `let name = init;` at file scope
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub name: String,
    pub ty: Option<TypeDesc>,
    pub init: Expr,
    pub span: Span,
}

/// Top-level items
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FnDecl),
    Global(GlobalDecl),
    /// `@meta stmt` at file scope
    Meta(Stmt),
}

/// Module (a translation unit)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub items: Vec<Item>,
}
