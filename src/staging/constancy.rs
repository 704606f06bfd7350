//! 常量性检查
//!
//! 对带有常量义务的调用（`consteval` 函数的全部参数、`@mauto` 函数的
//! `const` 参数），在调用点验证每个受约束的实参在调用者自身的上下文中
//! 是可证明的常量表达式。
//!
//! 检查在声明处静态完成，沿函数体前向遍历：
//! - 外层函数的受约束参数视为常量
//! - 局部变量仅当初始化式为常量且使用前从未被重新赋值时才视为常量
//! - 任何赋值都会使标记失效，无论新值是什么
//! - 进入循环前，循环体内任何位置赋值的外层变量都先失效

use super::error::StageError;
use super::functions::{FunctionTable, IS_META, PRINT};
use super::odr::OdrTriggers;
use super::store::StageStore;
use crate::frontend::parser::ast::*;
use crate::runtime::ops;
use indexmap::IndexMap;

/// 常量义务：逐参数记录实参是否必须为常量
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstancyObligation {
    pub params: Vec<bool>,
}

impl ConstancyObligation {
    /// 在声明时确定义务，之后不再重新推导
    pub fn for_decl(decl: &FnDecl) -> Result<Self, StageError> {
        let params = match decl.kind {
            FnKind::Consteval => vec![true; decl.params.len()],
            FnKind::Mauto => decl.params.iter().map(|p| p.is_const).collect(),
            FnKind::Ordinary | FnKind::Constexpr => {
                if let Some(param) = decl.params.iter().find(|p| p.is_const) {
                    return Err(StageError::InvalidDeclaration {
                        detail: format!(
                            "`const` parameter `{}` is only allowed on `@mauto` functions",
                            param.name
                        ),
                        span: param.span,
                    });
                }
                vec![false; decl.params.len()]
            }
        };
        Ok(Self { params })
    }

    /// 第 `index` 个参数是否受约束
    #[inline]
    pub fn is_obligated(
        &self,
        index: usize,
    ) -> bool {
        self.params.get(index).copied().unwrap_or(false)
    }

    /// 是否存在任何受约束的参数
    #[inline]
    pub fn any(&self) -> bool {
        self.params.iter().any(|p| *p)
    }
}

/// 名称的常量性标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    /// 元阶段绑定，总是常量
    Meta,
    /// 参数或局部变量，携带“仍可证明为常量”标记
    Tracked(bool),
}

type Scope = IndexMap<String, Tag>;

/// 常量性检查器
pub struct ConstancyChecker<'a> {
    functions: &'a FunctionTable,
    store: &'a StageStore,
    globals: &'a OdrTriggers,
    /// 调用链起点：外层函数名、`<file scope>` 或 `global x`
    context: String,
    scopes: Vec<Scope>,
    /// 元执行上下文中一切皆为常量
    meta_depth: usize,
}

impl<'a> ConstancyChecker<'a> {
    /// 创建检查器
    pub fn new(
        functions: &'a FunctionTable,
        store: &'a StageStore,
        globals: &'a OdrTriggers,
    ) -> Self {
        Self {
            functions,
            store,
            globals,
            context: String::new(),
            scopes: Vec::new(),
            meta_depth: 0,
        }
    }

    /// 检查函数体
    pub fn check_function(
        &mut self,
        decl: &FnDecl,
    ) -> Result<(), StageError> {
        tracing::debug!("constancy check of {} `{}`", decl.kind, decl.name);
        self.context = decl.name.clone();
        let obligation = ConstancyObligation::for_decl(decl)?;
        let mut scope = Scope::new();
        for (index, param) in decl.params.iter().enumerate() {
            scope.insert(param.name.clone(), Tag::Tracked(obligation.is_obligated(index)));
        }
        self.scopes = vec![scope];
        self.check_block(&decl.body)
    }

    /// 检查全局变量初始化式
    pub fn check_global(
        &mut self,
        decl: &GlobalDecl,
    ) -> Result<(), StageError> {
        self.context = format!("global {}", decl.name);
        self.scopes = vec![Scope::new()];
        self.check_expr(&decl.init)
    }

    /// 检查文件作用域元语句
    pub fn check_meta_item(
        &mut self,
        stmt: &Stmt,
    ) -> Result<(), StageError> {
        self.context = "<file scope>".to_string();
        self.scopes = vec![Scope::new()];
        self.meta_depth += 1;
        let result = self.check_stmt(stmt);
        self.meta_depth -= 1;
        result
    }

    fn check_block(
        &mut self,
        block: &Block,
    ) -> Result<(), StageError> {
        self.scopes.push(Scope::new());
        let result = block.stmts.iter().try_for_each(|stmt| self.check_stmt(stmt));
        self.scopes.pop();
        result
    }

    fn declare(
        &mut self,
        name: &str,
        tag: Tag,
    ) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), tag);
        }
    }

    /// 赋值使标记失效；元阶段绑定不受影响
    fn invalidate(
        &mut self,
        name: &str,
    ) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(tag) = scope.get_mut(name) {
                if let Tag::Tracked(constant) = tag {
                    *constant = false;
                }
                return;
            }
        }
    }

    fn invalidate_assigned_in(
        &mut self,
        body: &Block,
    ) {
        let mut assigned = Vec::new();
        body.collect_assigned(&mut assigned);
        for name in &assigned {
            self.invalidate(name);
        }
    }

    /// 以元阶段身份检查（`@meta` 语句中的表达式）
    fn in_meta<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, StageError>,
    ) -> Result<T, StageError> {
        self.meta_depth += 1;
        let result = f(self);
        self.meta_depth -= 1;
        result
    }

    fn check_stmt(
        &mut self,
        stmt: &Stmt,
    ) -> Result<(), StageError> {
        match &stmt.kind {
            StmtKind::Meta(inner) => self.check_meta_stmt(inner),
            StmtKind::Let { name, init, .. } => {
                self.check_expr(init)?;
                let tag = if self.meta_depth > 0 {
                    Tag::Meta
                } else {
                    Tag::Tracked(self.is_constant(init))
                };
                self.declare(name, tag);
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                self.check_expr(target)?;
                self.check_expr(value)?;
                if let Some(name) = target.root_name() {
                    self.invalidate(name);
                }
                Ok(())
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr)?;
                let mut mutated = Vec::new();
                expr.collect_mutated(&mut mutated);
                for name in &mutated {
                    self.invalidate(name);
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_expr(cond)?;
                let before = self.scopes.clone();
                self.check_block(then_block)?;
                let after_then = std::mem::replace(&mut self.scopes, before);
                if let Some(block) = else_block {
                    self.check_block(block)?;
                }
                self.merge(&after_then);
                Ok(())
            }
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                self.check_expr(start)?;
                self.check_expr(end)?;
                self.invalidate_assigned_in(body);
                self.scopes.push(Scope::new());
                let tag = if self.meta_depth > 0 {
                    Tag::Meta
                } else {
                    Tag::Tracked(false)
                };
                self.declare(var, tag);
                let result = self.check_block(body);
                self.scopes.pop();
                result
            }
            StmtKind::While { cond, body } => {
                self.invalidate_assigned_in(body);
                self.check_expr(cond)?;
                self.check_block(body)
            }
            StmtKind::Return(value) => match value {
                Some(expr) => self.check_expr(expr),
                None => Ok(()),
            },
            StmtKind::Block(block) => self.check_block(block),
        }
    }

    /// `@meta` 复合语句：控制流在元阶段，循环体语句各自分类
    fn check_meta_stmt(
        &mut self,
        inner: &Stmt,
    ) -> Result<(), StageError> {
        match &inner.kind {
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                self.in_meta(|this| {
                    this.check_expr(start)?;
                    this.check_expr(end)
                })?;
                self.invalidate_assigned_in(body);
                self.scopes.push(Scope::new());
                self.declare(var, Tag::Meta);
                let result = self.check_block(body);
                self.scopes.pop();
                result
            }
            StmtKind::While { cond, body } => {
                self.invalidate_assigned_in(body);
                self.in_meta(|this| this.check_expr(cond))?;
                self.check_block(body)
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.in_meta(|this| this.check_expr(cond))?;
                self.check_block(then_block)?;
                match else_block {
                    Some(block) => self.check_block(block),
                    None => Ok(()),
                }
            }
            StmtKind::Block(block) => self.check_block(block),
            _ => self.in_meta(|this| this.check_stmt(inner)),
        }
    }

    /// 分支汇合：两条路径都保持常量的名字才仍为常量
    fn merge(
        &mut self,
        other: &[Scope],
    ) {
        for (scope, other_scope) in self.scopes.iter_mut().zip(other) {
            for (name, tag) in scope.iter_mut() {
                if let (Tag::Tracked(constant), Some(Tag::Tracked(false))) =
                    (tag, other_scope.get(name))
                {
                    *constant = false;
                }
            }
        }
    }

    /// 遍历表达式，在每个受约束调用处核对实参
    fn check_expr(
        &mut self,
        expr: &Expr,
    ) -> Result<(), StageError> {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Str(_) | ExprKind::Var(_) => Ok(()),
            ExprKind::Unary { expr, .. } | ExprKind::Port(expr) => self.check_expr(expr),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs)?;
                self.check_expr(rhs)
            }
            ExprKind::Index { base, index } => {
                self.check_expr(base)?;
                self.check_expr(index)
            }
            ExprKind::Method { receiver, args, .. } => {
                self.check_expr(receiver)?;
                args.iter().try_for_each(|arg| self.check_expr(arg))
            }
            ExprKind::List(items) => items.iter().try_for_each(|item| self.check_expr(item)),
            ExprKind::Call { callee, args } => {
                args.iter().try_for_each(|arg| self.check_expr(arg))?;
                self.check_call(callee, args)
            }
        }
    }

    /// `check(call_site, target_obligation) -> Accept | Reject(reason)`
    fn check_call(
        &self,
        callee: &str,
        args: &[Expr],
    ) -> Result<(), StageError> {
        let Some(obligation) = self.functions.obligation(callee) else {
            return Ok(());
        };
        for (index, arg) in args.iter().enumerate() {
            if obligation.is_obligated(index) && !self.is_constant(arg) {
                tracing::debug!(
                    "constancy violation: `{}` passed to `{}` in {}",
                    arg,
                    callee,
                    self.context
                );
                return Err(StageError::ConstancyViolation {
                    argument: arg.to_string(),
                    callee: callee.to_string(),
                    chain: format!("{} -> {}", self.context, callee),
                    span: arg.span,
                });
            }
        }
        Ok(())
    }

    fn lookup(
        &self,
        name: &str,
    ) -> Option<Tag> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// 表达式在当前上下文中是否可证明为常量
    pub fn is_constant(
        &self,
        expr: &Expr,
    ) -> bool {
        if self.meta_depth > 0 {
            return true;
        }
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Str(_) => true,
            ExprKind::Var(name) => match self.lookup(name) {
                Some(Tag::Meta) => true,
                Some(Tag::Tracked(constant)) => constant,
                // 文件作用域元变量是常量；对象阶段全局变量在运行时初始化
                None if self.store.global(name).is_some() => true,
                None => !self.globals.contains(name),
            },
            ExprKind::Unary { expr, .. } => self.is_constant(expr),
            ExprKind::Binary { lhs, rhs, .. } => self.is_constant(lhs) && self.is_constant(rhs),
            ExprKind::Index { base, index } => self.is_constant(base) && self.is_constant(index),
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                !ops::is_mutating_method(method)
                    && self.is_constant(receiver)
                    && args.iter().all(|arg| self.is_constant(arg))
            }
            ExprKind::List(items) => items.iter().all(|item| self.is_constant(item)),
            ExprKind::Call { callee, args } if callee == IS_META => args.is_empty(),
            ExprKind::Call { callee, args } => {
                callee != PRINT
                    && matches!(
                        self.functions.kind(callee),
                        Some(FnKind::Consteval | FnKind::Constexpr)
                    )
                    && args.iter().all(|arg| self.is_constant(arg))
            }
            ExprKind::Port(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;

    /// 依次检查所有条目，返回第一个错误
    fn check(source: &str) -> Result<(), StageError> {
        let module = parse(&tokenize(source).unwrap()).unwrap();
        let mut functions = FunctionTable::new();
        let mut globals = OdrTriggers::new();
        for item in &module.items {
            match item {
                Item::Function(decl) => functions.declare(decl)?,
                Item::Global(decl) => {
                    globals.register(decl);
                }
                Item::Meta(_) => {}
            }
        }
        let store = StageStore::new();
        let mut checker = ConstancyChecker::new(&functions, &store, &globals);
        for item in &module.items {
            match item {
                Item::Function(decl) => checker.check_function(decl)?,
                Item::Global(decl) => checker.check_global(decl)?,
                Item::Meta(stmt) => checker.check_meta_item(stmt)?,
            }
        }
        Ok(())
    }

    const PRELUDE: &str = "consteval fn f(p: int): int { return p; }\n";

    #[test]
    fn test_literal_argument_is_accepted() {
        assert!(check(&format!("{}fn h() {{ let r = f(42); }}", PRELUDE)).is_ok());
    }

    #[test]
    fn test_untouched_constant_local_is_accepted() {
        let source = format!("{}fn h() {{ let r = f(42); let s = f(r + 1); }}", PRELUDE);
        assert!(check(&source).is_ok());
    }

    #[test]
    fn test_reassigned_local_is_rejected() {
        // same value, still invalidated
        let source = format!("{}fn h() {{ let r = 42; r = 42; let s = f(r); }}", PRELUDE);
        match check(&source) {
            Err(StageError::ConstancyViolation {
                argument,
                callee,
                chain,
                ..
            }) => {
                assert_eq!(argument, "r");
                assert_eq!(callee, "f");
                assert_eq!(chain, "h -> f");
            }
            other => panic!("expected a constancy violation, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_obligation_discharged_by_parameter() {
        let source = format!(
            "{}consteval fn g(p: int): int {{ return f(p); }}\nfn h() {{ let x = g(42); }}",
            PRELUDE
        );
        assert!(check(&source).is_ok());
    }

    #[test]
    fn test_local_copy_of_parameter_reassigned_inside_consteval() {
        let source = format!(
            "{}consteval fn g(p: int): int {{ let q = p; q = q + 1; return f(q); }}",
            PRELUDE
        );
        match check(&source).unwrap_err() {
            // reported at the inner call site, where the chain starts
            StageError::ConstancyViolation {
                argument, chain, ..
            } => {
                assert_eq!(argument, "q");
                assert_eq!(chain, "g -> f");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_constexpr_parameter_does_not_discharge() {
        let source = format!("{}constexpr fn g(p: int): int {{ return f(p); }}", PRELUDE);
        assert!(matches!(
            check(&source),
            Err(StageError::ConstancyViolation { .. })
        ));
    }

    #[test]
    fn test_loop_entry_invalidates_before_use() {
        let source = format!(
            "{}fn h() {{ let n = 1; while true {{ let y = f(n); n = 2; }} }}",
            PRELUDE
        );
        assert!(check(&source).is_err());
    }

    #[test]
    fn test_branch_assignment_invalidates_after_if() {
        let ok = format!(
            "{}fn h(c: bool) {{ let n = 1; if c {{ let m = f(n); }} else {{ let m = f(n); }} }}",
            PRELUDE
        );
        assert!(check(&ok).is_ok());
        let bad = format!(
            "{}fn h(c: bool) {{ let n = 1; if c {{ n = 1; }} let m = f(n); }}",
            PRELUDE
        );
        assert!(check(&bad).is_err());
    }

    #[test]
    fn test_meta_bindings_are_constant() {
        let source = format!(
            "{}fn h() {{ @meta let k = 3; @meta for i in 0..k {{ let v = f(i * k); }} }}",
            PRELUDE
        );
        assert!(check(&source).is_ok());
    }

    #[test]
    fn test_runtime_values_are_rejected() {
        let param = format!("{}fn h(x: int) {{ let y = f(x); }}", PRELUDE);
        assert!(check(&param).is_err());
        let global = format!("{}let c = 1;\nfn h() {{ let y = f(c); }}", PRELUDE);
        assert!(check(&global).is_err());
        let printed = format!("{}fn h() {{ let y = f(print(1)); }}", PRELUDE);
        assert!(check(&printed).is_err());
    }

    #[test]
    fn test_mauto_const_parameter() {
        let source = "@mauto fn m(const n: int, x: int): int { return n + x; }\n\
                      fn h(a: int) { let ok = m(3, a); let bad = m(a, 3); }";
        match check(source) {
            Err(StageError::ConstancyViolation { argument, .. }) => assert_eq!(argument, "a"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_const_parameter_outside_mauto_is_a_declaration_error() {
        let err = check("fn h(const n: int) { }").unwrap_err();
        assert_eq!(err.category(), "DeclarationError");
    }

    #[test]
    fn test_file_scope_meta_is_constant() {
        let source = format!("{}@meta let x = 1;\n@meta print(f(x));", PRELUDE);
        assert!(check(&source).is_ok());
    }

    #[test]
    fn test_stage_query_is_constant() {
        let source = "consteval fn b(p: bool): bool { return p; }\n\
                      fn h() { let r = b(is_meta()); }";
        assert!(check(source).is_ok());
    }
}
