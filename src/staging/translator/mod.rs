//! Staged translation
//!
//! One forward pass over the unit in translation order. Meta-stage code runs
//! against the [`StageStore`] as soon as it is reached; object-stage code is
//! lowered into a [`ResidualProgram`] in which every meta sub-expression has
//! already been replaced by a literal or a ported initializer list.

use super::classifier::{Classification, ExprStage, StageClassifier};
use super::constancy::ConstancyChecker;
use super::error::StageError;
use super::functions::{FunctionTable, IS_META, PRINT};
use super::meta::{builtin_arity, MetaFrame};
use super::odr::OdrTriggers;
use super::porting::{embed_literal, PortingTranslator};
use super::scope::{Binding, Lookup, ObjectLocal, ScopeStack};
use super::store::{MetaVarId, StageStore};
use super::value::StageValue;
use crate::frontend::parser::ast::*;
use crate::frontend::types::TypeDesc;
use crate::middle::{Literal, ObjExpr, ObjFunction, ObjParam, ObjStmt, ResidualProgram};
use crate::runtime::{ops, Value};
use crate::util::config::TranslationConfig;
use crate::util::span::Span;
use indexmap::IndexMap;
use std::fmt;

/// Result of translating a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Object-stage program
    pub program: ResidualProgram,
    /// Lines printed by meta-stage code, in execution order
    pub meta_output: Vec<String>,
}

/// Translate a module against `store`
pub fn translate(
    module: &Module,
    store: &mut StageStore,
    config: &TranslationConfig,
) -> Result<Translation, StageError> {
    Translator::new(store, config.clone()).translate(module)
}

/// What is being translated, for call chains in diagnostics
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Context {
    File,
    Function(String),
    Global(String),
}

impl fmt::Display for Context {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Context::File => write!(f, "<file scope>"),
            Context::Function(name) => write!(f, "{}", name),
            Context::Global(name) => write!(f, "global {}", name),
        }
    }
}

/// State of one `@mauto` expansion
#[derive(Debug)]
struct Expansion {
    suffix: usize,
    result: Option<ObjExpr>,
    /// Depth of object-stage control flow around the current statement
    nesting: usize,
}

impl Expansion {
    fn returned(&self) -> bool {
        self.result.is_some()
    }
}

/// How a `@mauto` argument reaches the expanded body
enum ArgBinding {
    Meta(Value),
    Substituted(ObjectLocal),
    Bound(ObjExpr, Option<Value>),
}

/// Staged translator
pub struct Translator<'s> {
    pub(super) store: &'s mut StageStore,
    pub(super) config: TranslationConfig,
    pub(super) functions: FunctionTable,
    pub(super) odr: OdrTriggers,
    pub(super) scopes: ScopeStack,
    pub(super) porter: PortingTranslator,
    pub(super) meta_output: Vec<String>,
    pub(super) frames: Vec<MetaFrame>,
    pub(super) call_depth: usize,
    pub(super) context: Context,
    /// Nonzero while a constexpr call is folded speculatively
    pub(super) folding: usize,
    /// Meta slots ported in the current function, one layer per expansion
    pub(super) ported: Vec<IndexMap<MetaVarId, Span>>,
    expansions: Vec<Expansion>,
    expansion_count: usize,
}

impl<'s> Translator<'s> {
    /// Create a translator writing meta state into `store`
    pub fn new(
        store: &'s mut StageStore,
        config: TranslationConfig,
    ) -> Self {
        Self {
            store,
            config,
            functions: FunctionTable::new(),
            odr: OdrTriggers::new(),
            scopes: ScopeStack::new(),
            porter: PortingTranslator::new(),
            meta_output: Vec::new(),
            frames: Vec::new(),
            call_depth: 0,
            context: Context::File,
            folding: 0,
            ported: Vec::new(),
            expansions: Vec::new(),
            expansion_count: 0,
        }
    }

    /// Translate every item in order
    pub fn translate(
        mut self,
        module: &Module,
    ) -> Result<Translation, StageError> {
        self.declare_items(module)?;

        let mut program = ResidualProgram::default();
        for item in &module.items {
            match item {
                Item::Function(decl) => {
                    ConstancyChecker::new(&self.functions, self.store, &self.odr)
                        .check_function(decl)?;
                    match decl.kind {
                        FnKind::Ordinary | FnKind::Constexpr => {
                            program.functions.push(self.translate_function(decl)?);
                        }
                        FnKind::Mauto | FnKind::Consteval => {
                            tracing::debug!("{} `{}` is not emitted", decl.kind, decl.name);
                        }
                    }
                }
                Item::Global(decl) => {
                    ConstancyChecker::new(&self.functions, self.store, &self.odr)
                        .check_global(decl)?;
                    self.translate_global(decl)?;
                }
                Item::Meta(stmt) => {
                    ConstancyChecker::new(&self.functions, self.store, &self.odr)
                        .check_meta_item(stmt)?;
                    self.context = Context::File;
                    self.scopes = ScopeStack::new();
                    self.ported.clear();
                    self.run_file_meta(stmt)?;
                }
            }
        }

        program.globals = self.odr.residual_globals();
        tracing::debug!(
            "translated {} function(s), {} used global(s), {} meta slot(s)",
            program.functions.len(),
            program.globals.len(),
            self.store.len()
        );
        Ok(Translation {
            program,
            meta_output: self.meta_output,
        })
    }

    fn declare_items(
        &mut self,
        module: &Module,
    ) -> Result<(), StageError> {
        for item in &module.items {
            match item {
                Item::Function(decl) => self.functions.declare(decl)?,
                Item::Global(decl) => {
                    if self.functions.get(&decl.name).is_some() || !self.odr.register(decl) {
                        return Err(StageError::InvalidDeclaration {
                            detail: format!("global `{}` is defined more than once", decl.name),
                            span: decl.span,
                        });
                    }
                }
                Item::Meta(_) => {}
            }
        }
        Ok(())
    }

    /// `@meta` item at file scope; a top-level `let` declares a meta global
    fn run_file_meta(
        &mut self,
        stmt: &Stmt,
    ) -> Result<(), StageError> {
        let mut stmt = stmt;
        while let StmtKind::Meta(inner) = &stmt.kind {
            stmt = inner;
        }
        if let StmtKind::Let { name, ty, init } = &stmt.kind {
            let value = self.eval_meta(init, false)?;
            let value = coerce(value, ty.as_ref(), init.span)?;
            tracing::debug!("meta global `{}` = {}", name, value);
            if self.odr.contains(name) {
                return Err(duplicate_global(name, stmt.span));
            }
            return match self.store.declare_global(name, StageValue::meta(value)) {
                Some(_) => Ok(()),
                None => Err(duplicate_global(name, stmt.span)),
            };
        }
        self.exec_meta_root(stmt)
    }

    fn classifier(&self) -> StageClassifier<'_> {
        StageClassifier::new(&self.scopes, &self.functions, self.store, &self.odr)
    }

    fn translate_function(
        &mut self,
        decl: &FnDecl,
    ) -> Result<ObjFunction, StageError> {
        tracing::debug!("translating {} `{}`", decl.kind, decl.name);
        self.context = Context::Function(decl.name.clone());
        self.scopes = ScopeStack::new();
        self.scopes.push_barrier();
        self.ported = vec![IndexMap::new()];
        for param in &decl.params {
            self.scopes.bind_object(
                &param.name,
                ObjectLocal {
                    residual: ObjExpr::Var(param.name.clone()),
                    known: None,
                },
            );
        }
        let mut body = Vec::new();
        for stmt in &decl.body.stmts {
            self.translate_stmt(stmt, &mut body)?;
        }
        self.scopes.pop();
        Ok(ObjFunction {
            name: decl.name.clone(),
            params: decl
                .params
                .iter()
                .map(|p| ObjParam {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                })
                .collect(),
            ret: decl.ret.clone(),
            body,
        })
    }

    fn translate_global(
        &mut self,
        decl: &GlobalDecl,
    ) -> Result<(), StageError> {
        tracing::debug!("translating global `{}`", decl.name);
        self.context = Context::Global(decl.name.clone());
        self.scopes = ScopeStack::new();
        self.scopes.push_barrier();
        self.ported = vec![IndexMap::new()];
        let init = self.residualize(&decl.init)?;
        if let (Some(ty), Some(value)) = (&decl.ty, self.fold_residual(&init)) {
            coerce(value, Some(ty), decl.init.span)?;
        }
        self.scopes.pop();
        self.odr.set_residual(&decl.name, init);
        Ok(())
    }

    fn translate_block(
        &mut self,
        block: &Block,
    ) -> Result<Vec<ObjStmt>, StageError> {
        self.scopes.push();
        let mut out = Vec::new();
        let result = block
            .stmts
            .iter()
            .try_for_each(|stmt| self.translate_stmt(stmt, &mut out));
        self.scopes.pop();
        result.map(|_| out)
    }

    /// Translate a block nested in object-stage control flow
    fn translate_nested(
        &mut self,
        block: &Block,
    ) -> Result<Vec<ObjStmt>, StageError> {
        if let Some(expansion) = self.expansions.last_mut() {
            expansion.nesting += 1;
        }
        let result = self.translate_block(block);
        if let Some(expansion) = self.expansions.last_mut() {
            expansion.nesting -= 1;
        }
        result
    }

    /// Object statements after an expansion's `return` are dropped
    fn skipping_object_code(&self) -> bool {
        self.expansions.last().is_some_and(Expansion::returned)
    }

    fn translate_stmt(
        &mut self,
        stmt: &Stmt,
        out: &mut Vec<ObjStmt>,
    ) -> Result<(), StageError> {
        let class = self.classifier().classify_stmt(stmt);
        match class {
            Classification::Ambiguous(ambiguity) => Err(ambiguity.into()),
            Classification::MustRunMeta => match &stmt.kind {
                StmtKind::Meta(inner) => self.translate_meta_stmt(inner, out),
                _ => self.exec_meta_root(stmt),
            },
            Classification::MustRunObject if self.skipping_object_code() => {
                tracing::trace!("dropping object statement after expansion result");
                Ok(())
            }
            Classification::MustRunObject => self.translate_object_stmt(stmt, out),
        }
    }

    /// `@meta <stmt>` inside object-stage code
    fn translate_meta_stmt(
        &mut self,
        stmt: &Stmt,
        out: &mut Vec<ObjStmt>,
    ) -> Result<(), StageError> {
        match &stmt.kind {
            StmtKind::Meta(inner) => self.translate_meta_stmt(inner, out),
            StmtKind::Let { name, ty, init } => {
                let value = self.eval_meta(init, false)?;
                let value = coerce(value, ty.as_ref(), init.span)?;
                let id = self.store.declare(name, StageValue::meta(value));
                self.scopes.bind_meta(name, id, stmt.span);
                Ok(())
            }
            StmtKind::Assign { .. } | StmtKind::Expr(_) => self.exec_meta_root(stmt),
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.eval_meta_int(start)?;
                let end = self.eval_meta_int(end)?;
                let id = self.store.declare(var, StageValue::meta(Value::Int(start)));
                self.scopes.push();
                self.scopes.bind_meta(var, id, stmt.span);
                let result = self.unroll_range(var, id, start..end, body, stmt.span, out);
                self.scopes.pop();
                result
            }
            StmtKind::While { cond, body } => {
                let mut count = 0;
                while self.eval_meta_bool(cond)? {
                    self.check_unroll(count, stmt.span)?;
                    count += 1;
                    let iteration = self.translate_block(body)?;
                    push_scoped(out, iteration);
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let chosen = if self.eval_meta_bool(cond)? {
                    Some(then_block)
                } else {
                    else_block.as_ref()
                };
                if let Some(block) = chosen {
                    let stmts = self.translate_block(block)?;
                    push_scoped(out, stmts);
                }
                Ok(())
            }
            StmtKind::Block(block) => {
                let stmts = self.translate_block(block)?;
                push_scoped(out, stmts);
                Ok(())
            }
            StmtKind::Return(_) => Err(StageError::UnsupportedConstruct {
                detail: "`@meta return` is not supported; return from object-stage code instead"
                    .to_string(),
                span: stmt.span,
            }),
        }
    }

    /// Translate `body` once per value of the meta loop variable
    fn unroll_range(
        &mut self,
        var: &str,
        id: MetaVarId,
        range: std::ops::Range<i64>,
        body: &Block,
        span: Span,
        out: &mut Vec<ObjStmt>,
    ) -> Result<(), StageError> {
        for (count, i) in range.enumerate() {
            self.check_unroll(count, span)?;
            self.store.write(id, StageValue::meta(Value::Int(i)));
            tracing::trace!("unrolling `{}` = {}", var, i);
            let iteration = self.translate_block(body)?;
            push_scoped(out, iteration);
        }
        Ok(())
    }

    fn check_unroll(
        &self,
        count: usize,
        span: Span,
    ) -> Result<(), StageError> {
        if count >= self.config.max_unroll {
            return Err(StageError::UnrollLimit {
                limit: self.config.max_unroll,
                span,
            });
        }
        Ok(())
    }

    fn eval_meta_int(
        &mut self,
        expr: &Expr,
    ) -> Result<i64, StageError> {
        let value = self.eval_meta(expr, false)?;
        value.as_int().ok_or_else(|| StageError::TypeMismatch {
            detail: format!("expected `int`, found `{}`", value.type_name()),
            span: expr.span,
        })
    }

    fn eval_meta_bool(
        &mut self,
        expr: &Expr,
    ) -> Result<bool, StageError> {
        let value = self.eval_meta(expr, false)?;
        value.as_bool().ok_or_else(|| StageError::TypeMismatch {
            detail: format!("expected `bool`, found `{}`", value.type_name()),
            span: expr.span,
        })
    }

    fn local_name(
        &self,
        name: &str,
    ) -> String {
        match self.expansions.last() {
            Some(expansion) => format!("{}_{}", name, expansion.suffix),
            None => name.to_string(),
        }
    }

    fn translate_object_stmt(
        &mut self,
        stmt: &Stmt,
        out: &mut Vec<ObjStmt>,
    ) -> Result<(), StageError> {
        match &stmt.kind {
            StmtKind::Let { name, ty, init } => {
                let residual = self.residualize(init)?;
                let known = match self.fold_residual(&residual) {
                    Some(value) => Some(coerce(value, ty.as_ref(), init.span)?),
                    None => None,
                };
                let local = self.local_name(name);
                out.push(ObjStmt::Let {
                    name: local.clone(),
                    init: residual,
                });
                self.scopes.bind_object(
                    name,
                    ObjectLocal {
                        residual: ObjExpr::Var(local),
                        known,
                    },
                );
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                let value = self.residualize(value)?;
                let mut indices = Vec::new();
                let mut place = target;
                while let ExprKind::Index { base, index } = &place.kind {
                    indices.push(self.residualize(index)?);
                    place = base;
                }
                indices.reverse();
                let name = match &place.kind {
                    ExprKind::Var(name) => name,
                    _ => {
                        return Err(StageError::UnsupportedConstruct {
                            detail: format!("`{}` is not assignable", target),
                            span: target.span,
                        })
                    }
                };
                let residual_name = match self.resolve_var(name, place.span)? {
                    ObjExpr::Var(residual) => residual,
                    _ => {
                        return Err(StageError::UnsupportedConstruct {
                            detail: format!("`{}` is bound to a constant and cannot be assigned", name),
                            span: target.span,
                        })
                    }
                };
                self.scopes.invalidate(name);
                out.push(ObjStmt::Assign {
                    name: residual_name,
                    indices,
                    value,
                });
                Ok(())
            }
            StmtKind::Expr(expr) => {
                let residual = self.residualize(expr)?;
                let mut mutated = Vec::new();
                expr.collect_mutated(&mut mutated);
                for name in &mutated {
                    self.scopes.invalidate(name);
                }
                if residual != ObjExpr::Lit(Literal::Unit) {
                    out.push(ObjStmt::Expr(residual));
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.residualize(cond)?;
                let then_body = self.translate_nested(then_block)?;
                let else_body = match else_block {
                    Some(block) => self.translate_nested(block)?,
                    None => Vec::new(),
                };
                out.push(ObjStmt::If {
                    cond,
                    then_body,
                    else_body,
                });
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.invalidate_assigned(body);
                let cond = self.residualize(cond)?;
                let body = self.translate_nested(body)?;
                out.push(ObjStmt::While { cond, body });
                Ok(())
            }
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                self.invalidate_assigned(body);
                let start = self.residualize(start)?;
                let end = self.residualize(end)?;
                let local = self.local_name(var);
                self.scopes.push();
                self.scopes.bind_object(
                    var,
                    ObjectLocal {
                        residual: ObjExpr::Var(local.clone()),
                        known: None,
                    },
                );
                let body = self.translate_nested(body);
                self.scopes.pop();
                out.push(ObjStmt::For {
                    var: local,
                    start,
                    end,
                    body: body?,
                });
                Ok(())
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => Some(self.residualize(expr)?),
                    None => None,
                };
                match self.expansions.last_mut() {
                    Some(expansion) if expansion.nesting == 0 => {
                        expansion.result = Some(value.unwrap_or(ObjExpr::Lit(Literal::Unit)));
                    }
                    Some(_) => {
                        return Err(StageError::UnsupportedConstruct {
                            detail: "`return` inside object-stage control flow of an `@mauto` function"
                                .to_string(),
                            span: stmt.span,
                        })
                    }
                    None => out.push(ObjStmt::Return(value)),
                }
                Ok(())
            }
            StmtKind::Block(block) => {
                let stmts = self.translate_block(block)?;
                out.push(ObjStmt::Block(stmts));
                Ok(())
            }
            StmtKind::Meta(inner) => self.translate_meta_stmt(inner, out),
        }
    }

    fn invalidate_assigned(
        &mut self,
        body: &Block,
    ) {
        let mut assigned = Vec::new();
        body.collect_assigned(&mut assigned);
        for name in &assigned {
            self.scopes.invalidate(name);
        }
    }

    /// Lower an expression into residual code, folding its meta parts
    pub(super) fn residualize(
        &mut self,
        expr: &Expr,
    ) -> Result<ObjExpr, StageError> {
        let stage = self.classifier().expr_stage(expr)?;
        if stage == ExprStage::Meta {
            if !self.functions.calls_constexpr(expr) {
                let value = self.eval_meta(expr, true)?;
                return embed_literal(&value, expr.span);
            }
            // otherwise lowered piecewise; each constexpr call folds or stays a call
            if let Some(literal) = self.try_fold(expr, |this| this.eval_meta(expr, true)) {
                return Ok(literal);
            }
        }

        match &expr.kind {
            ExprKind::Int(n) => Ok(ObjExpr::int(*n)),
            ExprKind::Bool(b) => Ok(ObjExpr::Lit(Literal::Bool(*b))),
            ExprKind::Str(s) => Ok(ObjExpr::Lit(Literal::Str(s.clone()))),
            ExprKind::Var(name) => self.resolve_var(name, expr.span),
            ExprKind::Unary { op, expr } => Ok(ObjExpr::Unary {
                op: *op,
                expr: Box::new(self.residualize(expr)?),
            }),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.residualize(lhs)?;
                let rhs = self.residualize(rhs)?;
                Ok(ObjExpr::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            ExprKind::Index { base, index } => {
                if self.classifier().expr_stage(base)? == ExprStage::Meta {
                    let value = self.eval_meta(expr, true)?;
                    return embed_literal(&value, expr.span);
                }
                let base = self.residualize(base)?;
                let index = self.residualize(index)?;
                Ok(ObjExpr::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                })
            }
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                if self.classifier().expr_stage(receiver)? == ExprStage::Meta {
                    let value = self.eval_meta(expr, true)?;
                    return embed_literal(&value, expr.span);
                }
                let receiver = self.residualize(receiver)?;
                let args = self.residualize_all(args)?;
                Ok(ObjExpr::Method {
                    receiver: Box::new(receiver),
                    method: method.clone(),
                    args,
                })
            }
            ExprKind::List(items) => {
                let items = self.residualize_all(items)?;
                let elem = items
                    .first()
                    .and_then(|item| self.fold_residual(item))
                    .map(|value| value.type_desc())
                    .unwrap_or(TypeDesc::Unknown);
                Ok(ObjExpr::List { elem, items })
            }
            ExprKind::Call { callee, args } => self.residualize_call(callee, args, expr),
            ExprKind::Port(inner) => {
                if !self.classifier().expr_stage(inner)?.is_static() {
                    return Err(StageError::UnsupportedConstruct {
                        detail: format!("@port expects a compile-time aggregate, found `{}`", inner),
                        span: inner.span,
                    });
                }
                let value = self.eval_meta(inner, true)?;
                let ported = self.porter.port(&value, expr.span)?;
                self.mark_ported(inner, expr.span);
                Ok(ported)
            }
        }
    }

    fn residualize_all(
        &mut self,
        exprs: &[Expr],
    ) -> Result<Vec<ObjExpr>, StageError> {
        exprs.iter().map(|expr| self.residualize(expr)).collect()
    }

    fn residualize_call(
        &mut self,
        callee: &str,
        args: &[Expr],
        call: &Expr,
    ) -> Result<ObjExpr, StageError> {
        if callee == IS_META {
            if !args.is_empty() {
                return Err(builtin_arity(IS_META, args.len(), call.span));
            }
            return Ok(ObjExpr::Lit(Literal::Bool(false)));
        }
        if callee == PRINT {
            return Ok(ObjExpr::Call {
                callee: callee.to_string(),
                args: self.residualize_all(args)?,
            });
        }
        let Some(decl) = self.functions.get(callee).cloned() else {
            return Err(StageError::UndefinedFunction {
                name: callee.to_string(),
                span: call.span,
            });
        };
        check_arity(&decl, args.len(), call.span)?;

        match decl.kind {
            FnKind::Ordinary => Ok(ObjExpr::Call {
                callee: callee.to_string(),
                args: self.residualize_all(args)?,
            }),
            FnKind::Consteval => {
                for arg in args {
                    if !self.classifier().expr_stage(arg)?.is_static() {
                        return Err(StageError::ConstancyViolation {
                            argument: arg.to_string(),
                            callee: callee.to_string(),
                            chain: format!("{} -> {}", self.context, callee),
                            span: arg.span,
                        });
                    }
                }
                let value = self.eval_meta(call, true)?;
                embed_literal(&value, call.span)
            }
            FnKind::Constexpr => {
                let args = self.residualize_all(args)?;
                let folded = args
                    .iter()
                    .map(|arg| self.fold_residual(arg))
                    .collect::<Option<Vec<_>>>();
                if let Some(values) = folded {
                    if let Some(literal) =
                        self.try_fold(call, |this| this.call_meta(&decl, values, call.span))
                    {
                        return Ok(literal);
                    }
                }
                Ok(ObjExpr::Call {
                    callee: callee.to_string(),
                    args,
                })
            }
            FnKind::Mauto => self.expand_mauto(&decl, args, call.span),
        }
    }

    /// Evaluate `expr` during translation if that has no observable effect
    ///
    /// Any failure, including an effect such as `print` or a meta-stage
    /// write, leaves the expression to run time; nothing is recorded.
    fn try_fold(
        &mut self,
        expr: &Expr,
        eval: impl FnOnce(&mut Self) -> Result<Value, StageError>,
    ) -> Option<ObjExpr> {
        self.folding += 1;
        let result = eval(self);
        self.folding -= 1;
        match result.and_then(|value| embed_literal(&value, expr.span)) {
            Ok(literal) => {
                tracing::trace!("folded `{}`", expr);
                Some(literal)
            }
            Err(err) => {
                tracing::debug!("`{}` left to run time: {}", expr, err);
                None
            }
        }
    }

    /// Freeze the meta slot behind a ported aggregate for this evaluation
    fn mark_ported(
        &mut self,
        inner: &Expr,
        span: Span,
    ) {
        let Some(name) = inner.root_name() else {
            return;
        };
        let id = match self.scopes.lookup(name) {
            Lookup::Found(Binding::Meta(id)) => Some(*id),
            Lookup::NotFound => self.store.global(name),
            _ => None,
        };
        if let (Some(id), Some(layer)) = (id, self.ported.last_mut()) {
            layer.entry(id).or_insert(span);
        }
    }

    /// Inline a `@mauto` function at this call site
    fn expand_mauto(
        &mut self,
        decl: &FnDecl,
        args: &[Expr],
        span: Span,
    ) -> Result<ObjExpr, StageError> {
        if self.expansions.len() >= self.config.max_recursion_depth {
            return Err(StageError::RecursionTooDeep {
                depth: self.config.max_recursion_depth,
                span,
            });
        }
        self.expansion_count += 1;
        let suffix = self.expansion_count;
        tracing::debug!("expanding `{}` at call site #{}", decl.name, suffix);

        let mut assigned = Vec::new();
        decl.body.collect_assigned(&mut assigned);

        let mut bindings = Vec::with_capacity(args.len());
        for (param, arg) in decl.params.iter().zip(args) {
            let binding = if param.is_const {
                let value = self.eval_meta(arg, true)?;
                ArgBinding::Meta(coerce(value, Some(&param.ty), arg.span)?)
            } else {
                let residual = self.residualize(arg)?;
                let known = self.fold_residual(&residual);
                let simple = matches!(residual, ObjExpr::Lit(_) | ObjExpr::Var(_));
                if simple && !assigned.contains(&param.name) {
                    ArgBinding::Substituted(ObjectLocal { residual, known })
                } else {
                    ArgBinding::Bound(residual, known)
                }
            };
            bindings.push(binding);
        }

        let mut stmts = Vec::new();
        self.scopes.push_barrier();
        for (param, binding) in decl.params.iter().zip(bindings) {
            match binding {
                ArgBinding::Meta(value) => {
                    let id = self.store.declare(&param.name, StageValue::meta(value));
                    self.scopes.bind_meta(&param.name, id, param.span);
                }
                ArgBinding::Substituted(local) => self.scopes.bind_object(&param.name, local),
                ArgBinding::Bound(init, known) => {
                    let local = format!("{}_{}", param.name, suffix);
                    stmts.push(ObjStmt::Let {
                        name: local.clone(),
                        init,
                    });
                    self.scopes.bind_object(
                        &param.name,
                        ObjectLocal {
                            residual: ObjExpr::Var(local),
                            known,
                        },
                    );
                }
            }
        }

        self.expansions.push(Expansion {
            suffix,
            result: None,
            nesting: 0,
        });
        self.ported.push(IndexMap::new());
        let result = decl
            .body
            .stmts
            .iter()
            .try_for_each(|stmt| self.translate_stmt(stmt, &mut stmts));
        self.ported.pop();
        let expansion = self.expansions.pop();
        self.scopes.pop();
        result?;

        let value = expansion
            .and_then(|e| e.result)
            .unwrap_or(ObjExpr::Lit(Literal::Unit));
        if stmts.is_empty() {
            Ok(value)
        } else {
            Ok(ObjExpr::Block {
                stmts,
                result: Box::new(value),
            })
        }
    }

    /// Residual form of a name read by object-stage code
    fn resolve_var(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<ObjExpr, StageError> {
        match self.scopes.lookup(name) {
            Lookup::Found(Binding::Object(local)) => return Ok(local.residual.clone()),
            Lookup::Found(Binding::Meta(id)) => {
                let id = *id;
                return match self.store.read(id) {
                    Some(slot) => embed_literal(&slot.value, span),
                    None => Err(undefined(name, span)),
                };
            }
            Lookup::Retired(_) => {
                return Err(StageError::ScopeViolation {
                    name: name.to_string(),
                    detail: format!(
                        "value `{}` is not available outside its meta-stage binding scope",
                        name
                    ),
                    span,
                })
            }
            Lookup::NotFound => {}
        }
        if let Some(id) = self.store.global(name) {
            return match self.store.read(id) {
                Some(slot) => embed_literal(&slot.value, span),
                None => Err(undefined(name, span)),
            };
        }
        if self.odr.contains(name) {
            match &self.context {
                Context::Global(from) => {
                    let from = from.clone();
                    self.odr.add_dep(&from, name);
                }
                _ => self.odr.mark_used(name),
            }
            return Ok(ObjExpr::Var(name.to_string()));
        }
        Err(undefined(name, span))
    }

    /// Value of a residual expression when every name in it is known here
    pub fn fold_residual(
        &self,
        expr: &ObjExpr,
    ) -> Option<Value> {
        match expr {
            ObjExpr::Lit(literal) => Some(literal.to_value()),
            ObjExpr::Var(name) => self.scopes.known_by_residual(name).cloned(),
            ObjExpr::Unary { op, expr } => ops::unary(*op, &self.fold_residual(expr)?).ok(),
            ObjExpr::Binary { op, lhs, rhs } => {
                ops::binary(*op, &self.fold_residual(lhs)?, &self.fold_residual(rhs)?).ok()
            }
            ObjExpr::Index { base, index } => {
                ops::index(&self.fold_residual(base)?, &self.fold_residual(index)?).ok()
            }
            ObjExpr::Method {
                receiver,
                method,
                args,
            } if !ops::is_mutating_method(method) => {
                let mut receiver = self.fold_residual(receiver)?;
                let args = args
                    .iter()
                    .map(|arg| self.fold_residual(arg))
                    .collect::<Option<Vec<_>>>()?;
                ops::method(&mut receiver, method, args).ok()
            }
            ObjExpr::List { elem, items } => {
                let items = items
                    .iter()
                    .map(|item| self.fold_residual(item))
                    .collect::<Option<Vec<_>>>()?;
                let elem = items.first().map(Value::type_desc).unwrap_or_else(|| elem.clone());
                Some(Value::Vec { elem, items })
            }
            ObjExpr::Method { .. } | ObjExpr::Call { .. } | ObjExpr::Block { .. } => None,
        }
    }
}

/// Statements of an unrolled iteration; wrapped when they declare locals
fn push_scoped(
    out: &mut Vec<ObjStmt>,
    stmts: Vec<ObjStmt>,
) {
    if stmts.iter().any(|s| matches!(s, ObjStmt::Let { .. })) {
        out.push(ObjStmt::Block(stmts));
    } else {
        out.extend(stmts);
    }
}

pub(super) fn check_arity(
    decl: &FnDecl,
    found: usize,
    span: Span,
) -> Result<(), StageError> {
    if decl.params.len() != found {
        return Err(StageError::ArgCountMismatch {
            callee: decl.name.clone(),
            expected: decl.params.len(),
            found,
            span,
        });
    }
    Ok(())
}

/// Check `value` against a declared type, settling the element type of
/// empty sequences
pub(super) fn coerce(
    value: Value,
    ty: Option<&TypeDesc>,
    span: Span,
) -> Result<Value, StageError> {
    let Some(ty) = ty else {
        return Ok(value);
    };
    if !value.type_desc().conforms_to(ty) {
        return Err(StageError::TypeMismatch {
            detail: format!("expected `{}`, found `{}`", ty, value.type_desc()),
            span,
        });
    }
    Ok(match (value, ty) {
        (Value::Vec { elem, items }, TypeDesc::Vec(declared)) if elem == TypeDesc::Unknown => {
            Value::Vec {
                elem: (**declared).clone(),
                items,
            }
        }
        (value, _) => value,
    })
}

pub(super) fn undefined(
    name: &str,
    span: Span,
) -> StageError {
    StageError::UndefinedName {
        name: name.to_string(),
        span,
    }
}

fn duplicate_global(
    name: &str,
    span: Span,
) -> StageError {
    StageError::InvalidDeclaration {
        detail: format!("global `{}` is defined more than once", name),
        span,
    }
}
