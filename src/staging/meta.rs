//! 元阶段解释器
//!
//! 在翻译期间直接执行元阶段代码。读写经由 [`StageStore`](super::StageStore)
//! 持久保存；调用帧中的局部变量是临时的，帧弹出即销毁。
//!
//! 名称解析顺序：
//! 1. 调用帧局部变量（由内向外，遇到屏障帧即停止）
//! 2. 正在翻译的函数作用域（元绑定读存储；对象局部仅在允许读取已知值时可见）
//! 3. 文件作用域元变量
//! 4. 对象阶段全局变量（首次引用时在编译期运行其初始化式，仅一次）

use super::error::StageError;
use super::functions::{IS_META, PRINT};
use super::odr::MetaInit;
use super::scope::{Binding, Lookup};
use super::store::MetaVarId;
use super::translator::{check_arity, coerce, undefined, Translator};
use super::value::StageValue;
use crate::frontend::parser::ast::*;
use crate::runtime::{ops, OpError, Value};
use crate::util::span::Span;
use indexmap::IndexMap;

/// 元阶段调用帧
#[derive(Debug)]
pub(super) struct MetaFrame {
    scopes: Vec<IndexMap<String, Value>>,
    /// 函数调用帧：看不到调用者的任何名字
    barrier: bool,
    /// 允许读取已知值的对象局部（常量实参求值）
    read_known: bool,
}

impl MetaFrame {
    fn new(
        barrier: bool,
        read_known: bool,
    ) -> Self {
        Self {
            scopes: vec![IndexMap::new()],
            barrier,
            read_known,
        }
    }

    fn bind(
        &mut self,
        name: &str,
        value: Value,
    ) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn get_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut Value> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }
}

/// 语句执行结果
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
}

impl<'s> Translator<'s> {
    /// 在编译期求值表达式
    pub(super) fn eval_meta(
        &mut self,
        expr: &Expr,
        read_known: bool,
    ) -> Result<Value, StageError> {
        self.frames.push(MetaFrame::new(false, read_known));
        let result = self.eval(expr);
        self.frames.pop();
        result
    }

    /// 在编译期执行一条语句
    pub(super) fn exec_meta_root(
        &mut self,
        stmt: &Stmt,
    ) -> Result<(), StageError> {
        tracing::trace!("meta statement at {}", stmt.span);
        self.frames.push(MetaFrame::new(false, false));
        let result = self.exec(stmt);
        self.frames.pop();
        match result? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(StageError::UnsupportedConstruct {
                detail: "`return` outside of a function".to_string(),
                span: stmt.span,
            }),
        }
    }

    /// 在编译期调用函数
    pub(super) fn call_meta(
        &mut self,
        decl: &FnDecl,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, StageError> {
        if self.call_depth >= self.config.max_recursion_depth {
            return Err(StageError::RecursionTooDeep {
                depth: self.config.max_recursion_depth,
                span,
            });
        }
        let mut frame = MetaFrame::new(true, false);
        for (param, value) in decl.params.iter().zip(args) {
            frame.bind(&param.name, coerce(value, Some(&param.ty), span)?);
        }
        tracing::trace!("meta call `{}` (depth {})", decl.name, self.call_depth);

        self.call_depth += 1;
        self.frames.push(frame);
        let result = self.exec_stmts(&decl.body.stmts);
        self.frames.pop();
        self.call_depth -= 1;

        let value = match result? {
            Flow::Return(value) => value,
            Flow::Normal => Value::Unit,
        };
        coerce(value, decl.ret.as_ref(), span)
    }

    fn bind_local(
        &mut self,
        name: &str,
        value: Value,
    ) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bind(name, value);
        }
    }

    fn exec_block(
        &mut self,
        block: &Block,
    ) -> Result<Flow, StageError> {
        self.with_scope(|this| this.exec_stmts(&block.stmts))
    }

    fn with_scope(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Flow, StageError>,
    ) -> Result<Flow, StageError> {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(IndexMap::new());
        }
        let result = f(self);
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
        result
    }

    fn exec_stmts(
        &mut self,
        stmts: &[Stmt],
    ) -> Result<Flow, StageError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(
        &mut self,
        stmt: &Stmt,
    ) -> Result<Flow, StageError> {
        match &stmt.kind {
            StmtKind::Meta(inner) => self.exec(inner),
            StmtKind::Let { name, ty, init } => {
                let value = self.eval(init)?;
                let value = coerce(value, ty.as_ref(), init.span)?;
                self.bind_local(name, value);
                Ok(Flow::Normal)
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)?;
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval_bool(cond)? {
                    self.exec_block(then_block)
                } else if let Some(block) = else_block {
                    self.exec_block(block)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.eval_int(start)?;
                let end = self.eval_int(end)?;
                for (count, i) in (start..end).enumerate() {
                    self.check_iterations(count, stmt.span)?;
                    let flow = self.with_scope(|this| {
                        this.bind_local(var, Value::Int(i));
                        this.exec_block(body)
                    })?;
                    if let Flow::Return(value) = flow {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::While { cond, body } => {
                let mut count = 0;
                while self.eval_bool(cond)? {
                    self.check_iterations(count, stmt.span)?;
                    count += 1;
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Block(block) => self.exec_block(block),
        }
    }

    fn check_iterations(
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

    fn eval_int(
        &mut self,
        expr: &Expr,
    ) -> Result<i64, StageError> {
        let value = self.eval(expr)?;
        value.as_int().ok_or_else(|| StageError::TypeMismatch {
            detail: format!("expected `int`, found `{}`", value.type_name()),
            span: expr.span,
        })
    }

    fn eval_bool(
        &mut self,
        expr: &Expr,
    ) -> Result<bool, StageError> {
        let value = self.eval(expr)?;
        value.as_bool().ok_or_else(|| StageError::TypeMismatch {
            detail: format!("expected `bool`, found `{}`", value.type_name()),
            span: expr.span,
        })
    }

    fn eval(
        &mut self,
        expr: &Expr,
    ) -> Result<Value, StageError> {
        let span = expr.span;
        let op_err = |err: OpError| StageError::from_op(err, span);
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Var(name) => self.read_var(name, span),
            ExprKind::Unary { op, expr } => {
                let value = self.eval(expr)?;
                ops::unary(*op, &value).map_err(op_err)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                // 短路求值
                match (op, lhs.as_bool()) {
                    (BinOp::And, Some(false)) => return Ok(Value::Bool(false)),
                    (BinOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let rhs = self.eval(rhs)?;
                ops::binary(*op, &lhs, &rhs).map_err(op_err)
            }
            ExprKind::Index { base, index } => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                ops::index(&base, &index).map_err(op_err)
            }
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                let mut current = self.eval(receiver)?;
                let args = self.eval_all(args)?;
                let result = ops::method(&mut current, method, args).map_err(op_err)?;
                if ops::is_mutating_method(method) && receiver.root_name().is_some() {
                    self.assign(receiver, current)?;
                }
                Ok(result)
            }
            ExprKind::List(items) => {
                let items = self.eval_all(items)?;
                let elem = items
                    .first()
                    .map(Value::type_desc)
                    .unwrap_or(crate::frontend::types::TypeDesc::Unknown);
                if let Some(odd) = items.iter().find(|item| !item.type_desc().conforms_to(&elem)) {
                    return Err(StageError::TypeMismatch {
                        detail: format!(
                            "list elements must share one type: `{}` and `{}`",
                            elem,
                            odd.type_desc()
                        ),
                        span,
                    });
                }
                Ok(Value::Vec { elem, items })
            }
            ExprKind::Call { callee, args } => {
                let args = self.eval_all(args)?;
                if callee == IS_META {
                    if !args.is_empty() {
                        return Err(builtin_arity(IS_META, args.len(), span));
                    }
                    // 对象上下文中的折叠求值不算编译期调用
                    let in_call = self.frames.last().is_some_and(|frame| !frame.read_known);
                    return Ok(Value::Bool(in_call));
                }
                if callee == PRINT {
                    self.check_effect_allowed("print", span)?;
                    let line = args
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(" ");
                    tracing::debug!("compile-time output: {}", line);
                    self.meta_output.push(line);
                    return Ok(Value::Unit);
                }
                let Some(decl) = self.functions.get(callee).cloned() else {
                    return Err(StageError::UndefinedFunction {
                        name: callee.clone(),
                        span,
                    });
                };
                check_arity(&decl, args.len(), span)?;
                self.call_meta(&decl, args, span)
            }
            // 元阶段内移植只是复制
            ExprKind::Port(inner) => self.eval(inner),
        }
    }

    fn eval_all(
        &mut self,
        exprs: &[Expr],
    ) -> Result<Vec<Value>, StageError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn read_var(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<Value, StageError> {
        let mut read_known = false;
        let mut sees_scope = true;
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
            read_known |= frame.read_known;
            if frame.barrier {
                sees_scope = false;
                break;
            }
        }

        if sees_scope {
            match self.scopes.lookup(name) {
                Lookup::Found(Binding::Meta(id)) => return self.read_slot(*id, name, span),
                Lookup::Found(Binding::Object(local)) => {
                    return match (&local.known, read_known) {
                        (Some(value), true) => Ok(value.clone()),
                        _ => Err(StageError::ScopeViolation {
                            name: name.to_string(),
                            detail: format!(
                                "run-time value `{}` cannot be accessed at compile time",
                                name
                            ),
                            span,
                        }),
                    };
                }
                Lookup::Retired(_) => return Err(retired(name, span)),
                Lookup::NotFound => {}
            }
        }

        if let Some(id) = self.store.global(name) {
            return self.read_slot(id, name, span);
        }
        if self.odr.contains(name) {
            return self.init_global(name, span);
        }
        Err(undefined(name, span))
    }

    fn read_slot(
        &self,
        id: MetaVarId,
        name: &str,
        span: Span,
    ) -> Result<Value, StageError> {
        self.store
            .read(id)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| undefined(name, span))
    }

    /// 元阶段引用对象全局变量：在编译期运行一次初始化式
    fn init_global(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<Value, StageError> {
        match self.odr.meta_state(name).cloned() {
            Some(MetaInit::Ready(value)) => Ok(value),
            Some(MetaInit::InProgress) => Err(StageError::InvalidDeclaration {
                detail: format!("initializer of global `{}` depends on itself", name),
                span,
            }),
            Some(MetaInit::Pending) => {
                let Some(decl) = self.odr.decl(name).cloned() else {
                    return Err(undefined(name, span));
                };
                tracing::debug!("running initializer of global `{}` at compile time", name);
                self.odr.set_meta_state(name, MetaInit::InProgress);
                self.frames.push(MetaFrame::new(true, false));
                let result = self.eval(&decl.init);
                self.frames.pop();
                let result = result.and_then(|v| coerce(v, decl.ty.as_ref(), decl.init.span));
                let value = match result {
                    Ok(value) => value,
                    Err(err) => {
                        self.odr.set_meta_state(name, MetaInit::Pending);
                        return Err(err);
                    }
                };
                self.odr
                    .set_meta_state(name, MetaInit::Ready(value.clone()));
                Ok(value)
            }
            None => Err(undefined(name, span)),
        }
    }

    /// 折叠 constexpr 调用时不允许可观察的副作用
    fn check_effect_allowed(
        &self,
        what: &str,
        span: Span,
    ) -> Result<(), StageError> {
        if self.folding > 0 {
            return Err(StageError::UnsupportedConstruct {
                detail: format!("`{}` has an observable effect and cannot be folded", what),
                span,
            });
        }
        Ok(())
    }

    /// `target = value`，目标可以带下标
    fn assign(
        &mut self,
        target: &Expr,
        value: Value,
    ) -> Result<(), StageError> {
        let mut indices = Vec::new();
        let mut place = target;
        while let ExprKind::Index { base, index } = &place.kind {
            indices.push(self.eval(index)?);
            place = base;
        }
        indices.reverse();
        let ExprKind::Var(name) = &place.kind else {
            return Err(StageError::UnsupportedConstruct {
                detail: format!("`{}` is not assignable", target),
                span: target.span,
            });
        };

        let value = if indices.is_empty() {
            value
        } else {
            let mut current = self.read_var(name, place.span)?;
            set_path(&mut current, &indices, value)
                .map_err(|err| StageError::from_op(err, target.span))?;
            current
        };
        self.write_var(name, value, target.span)
    }

    fn write_var(
        &mut self,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), StageError> {
        let mut sees_scope = true;
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = coerce(value, Some(&slot.type_desc()), span)?;
                return Ok(());
            }
            if frame.barrier {
                sees_scope = false;
                break;
            }
        }

        if sees_scope {
            match self.scopes.lookup(name) {
                Lookup::Found(Binding::Meta(id)) => {
                    let id = *id;
                    return self.write_slot(id, name, value, span);
                }
                Lookup::Found(Binding::Object(_)) => {
                    return Err(StageError::ScopeViolation {
                        name: name.to_string(),
                        detail: format!(
                            "`{}` is a run-time value and cannot be modified at compile time",
                            name
                        ),
                        span,
                    })
                }
                Lookup::Retired(_) => return Err(retired(name, span)),
                Lookup::NotFound => {}
            }
        }

        if let Some(id) = self.store.global(name) {
            return self.write_slot(id, name, value, span);
        }
        if self.odr.contains(name) {
            return Err(StageError::ScopeViolation {
                name: name.to_string(),
                detail: format!(
                    "global `{}` is initialized at run time and cannot be modified at compile time",
                    name
                ),
                span,
            });
        }
        Err(undefined(name, span))
    }

    fn write_slot(
        &mut self,
        id: MetaVarId,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), StageError> {
        self.check_effect_allowed(name, span)?;
        if let Some(ported_at) = self.ported.iter().rev().find_map(|layer| layer.get(&id)) {
            return Err(StageError::ScopeViolation {
                name: name.to_string(),
                detail: format!(
                    "meta-stage value `{}` cannot be modified after it was ported at {}",
                    name, ported_at
                ),
                span,
            });
        }
        let Some(current) = self.store.read(id) else {
            return Err(undefined(name, span));
        };
        let value = coerce(value, Some(&current.ty), span)?;
        self.store.write(id, StageValue::meta(value));
        Ok(())
    }
}

/// `base[i][j].. = value`
fn set_path(
    base: &mut Value,
    indices: &[Value],
    value: Value,
) -> Result<(), OpError> {
    match indices {
        [] => {
            *base = value;
            Ok(())
        }
        [last] => ops::set_index(base, last, value),
        [first, rest @ ..] => {
            let mut inner = ops::index(base, first)?;
            set_path(&mut inner, rest, value)?;
            ops::set_index(base, first, inner)
        }
    }
}

fn retired(
    name: &str,
    span: Span,
) -> StageError {
    StageError::ScopeViolation {
        name: name.to_string(),
        detail: format!(
            "value `{}` is not available outside its meta-stage binding scope",
            name
        ),
        span,
    }
}

pub(super) fn builtin_arity(
    callee: &str,
    found: usize,
    span: Span,
) -> StageError {
    StageError::ArgCountMismatch {
        callee: callee.to_string(),
        expected: 0,
        found,
        span,
    }
}
