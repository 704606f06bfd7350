//! Intermediate Representation of the residual program

use crate::frontend::parser::ast::{BinOp, UnOp};
use crate::frontend::types::TypeDesc;
use crate::runtime::Value;
use serde::Serialize;

/// Object-stage literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    Unit,
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Literal {
    /// Literal form of a value, if it has one
    pub fn from_value(value: &Value) -> Option<Literal> {
        match value {
            Value::Unit => Some(Literal::Unit),
            Value::Int(n) => Some(Literal::Int(*n)),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Str(s) => Some(Literal::Str(s.clone())),
            Value::Vec { .. } => None,
        }
    }

    /// Runtime value of the literal
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Unit => Value::Unit,
            Literal::Int(n) => Value::Int(*n),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// Object-stage expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ObjExpr {
    Lit(Literal),
    Var(String),
    Unary {
        op: UnOp,
        expr: Box<ObjExpr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<ObjExpr>,
        rhs: Box<ObjExpr>,
    },
    /// Call of a residual function or the `print` builtin
    Call {
        callee: String,
        args: Vec<ObjExpr>,
    },
    Index {
        base: Box<ObjExpr>,
        index: Box<ObjExpr>,
    },
    Method {
        receiver: Box<ObjExpr>,
        method: String,
        args: Vec<ObjExpr>,
    },
    /// Initializer list; `elem` is the element type
    List {
        elem: TypeDesc,
        items: Vec<ObjExpr>,
    },
    /// Statements followed by a result, produced by inline expansion
    Block {
        stmts: Vec<ObjStmt>,
        result: Box<ObjExpr>,
    },
}

impl ObjExpr {
    /// Literal expression
    #[inline]
    pub fn lit(literal: Literal) -> Self {
        ObjExpr::Lit(literal)
    }

    /// Integer literal expression
    #[inline]
    pub fn int(n: i64) -> Self {
        ObjExpr::Lit(Literal::Int(n))
    }

    /// Whether this expression is a literal
    #[inline]
    pub fn is_lit(&self) -> bool {
        matches!(self, ObjExpr::Lit(_))
    }

    /// Visit every name read by the expression
    pub fn for_each_var(
        &self,
        f: &mut dyn FnMut(&str),
    ) {
        match self {
            ObjExpr::Lit(_) => {}
            ObjExpr::Var(name) => f(name),
            ObjExpr::Unary { expr, .. } => expr.for_each_var(f),
            ObjExpr::Binary { lhs, rhs, .. } => {
                lhs.for_each_var(f);
                rhs.for_each_var(f);
            }
            ObjExpr::Call { args, .. } | ObjExpr::List { items: args, .. } => {
                for arg in args {
                    arg.for_each_var(f);
                }
            }
            ObjExpr::Index { base, index } => {
                base.for_each_var(f);
                index.for_each_var(f);
            }
            ObjExpr::Method { receiver, args, .. } => {
                receiver.for_each_var(f);
                for arg in args {
                    arg.for_each_var(f);
                }
            }
            ObjExpr::Block { stmts, result } => {
                visit_body(stmts, f);
                result.for_each_var(f);
            }
        }
    }
}

/// Object-stage statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ObjStmt {
    Let {
        name: String,
        init: ObjExpr,
    },
    /// `name[i][j].. = value`
    Assign {
        name: String,
        indices: Vec<ObjExpr>,
        value: ObjExpr,
    },
    Expr(ObjExpr),
    If {
        cond: ObjExpr,
        then_body: Vec<ObjStmt>,
        else_body: Vec<ObjStmt>,
    },
    While {
        cond: ObjExpr,
        body: Vec<ObjStmt>,
    },
    For {
        var: String,
        start: ObjExpr,
        end: ObjExpr,
        body: Vec<ObjStmt>,
    },
    Return(Option<ObjExpr>),
    Block(Vec<ObjStmt>),
}

impl ObjStmt {
    /// Visit every name read by the statement
    pub fn for_each_var(
        &self,
        f: &mut dyn FnMut(&str),
    ) {
        match self {
            ObjStmt::Let { init, .. } => init.for_each_var(f),
            ObjStmt::Assign {
                name,
                indices,
                value,
            } => {
                f(name);
                for index in indices {
                    index.for_each_var(f);
                }
                value.for_each_var(f);
            }
            ObjStmt::Expr(expr) | ObjStmt::Return(Some(expr)) => expr.for_each_var(f),
            ObjStmt::Return(None) => {}
            ObjStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                cond.for_each_var(f);
                visit_body(then_body, f);
                visit_body(else_body, f);
            }
            ObjStmt::While { cond, body } => {
                cond.for_each_var(f);
                visit_body(body, f);
            }
            ObjStmt::For {
                start, end, body, ..
            } => {
                start.for_each_var(f);
                end.for_each_var(f);
                visit_body(body, f);
            }
            ObjStmt::Block(body) => visit_body(body, f),
        }
    }
}

fn visit_body(
    body: &[ObjStmt],
    f: &mut dyn FnMut(&str),
) {
    for stmt in body {
        stmt.for_each_var(f);
    }
}

/// Parameter of a residual function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjParam {
    pub name: String,
    pub ty: TypeDesc,
}

/// Residual function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjFunction {
    pub name: String,
    pub params: Vec<ObjParam>,
    pub ret: Option<TypeDesc>,
    pub body: Vec<ObjStmt>,
}

/// Residual global with its run-time initializer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjGlobal {
    pub name: String,
    pub init: ObjExpr,
}

/// The residual program handed to the object-stage runner
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResidualProgram {
    /// ODR-used globals in declaration order
    pub globals: Vec<ObjGlobal>,
    pub functions: Vec<ObjFunction>,
}

impl ResidualProgram {
    /// Look up a function by name
    pub fn function(
        &self,
        name: &str,
    ) -> Option<&ObjFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up a global by name
    pub fn global(
        &self,
        name: &str,
    ) -> Option<&ObjGlobal> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
