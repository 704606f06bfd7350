//! Stage classification
//!
//! Decides, for each statement and expression of object-stage code, whether
//! it executes during translation or is emitted for run time. Expressions get
//! a finer [`ExprStage`] that the translator uses to fold constant parts.

use super::error::StageError;
use super::functions::{FunctionTable, IS_META, PRINT};
use super::odr::OdrTriggers;
use super::scope::{Binding, Lookup, ObjectLocal, ScopeStack};
use super::store::StageStore;
use crate::frontend::parser::ast::*;
use crate::runtime::ops;
use crate::util::span::Span;

/// Where a statement or expression runs
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    MustRunMeta,
    MustRunObject,
    /// Mixes a meta-only entity with run-time data; always rejected
    Ambiguous(Ambiguity),
}

/// Why a construct could not be assigned a stage
#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguity {
    pub name: String,
    pub detail: String,
    pub span: Span,
}

impl From<Ambiguity> for StageError {
    fn from(ambiguity: Ambiguity) -> Self {
        StageError::ScopeViolation {
            name: ambiguity.name,
            detail: ambiguity.detail,
            span: ambiguity.span,
        }
    }
}

/// Stage of an expression, ordered from most to least foldable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExprStage {
    /// Literals only; stays verbatim in residual code
    Neutral,
    /// Reads meta bindings only
    Meta,
    /// Reads object locals whose value is known here
    ConstObject,
    /// Needs run-time data
    Object,
}

impl ExprStage {
    /// Stage of a compound expression
    #[inline]
    pub fn join(
        self,
        other: ExprStage,
    ) -> ExprStage {
        self.max(other)
    }

    /// Whether the value is available during translation
    #[inline]
    pub fn is_static(self) -> bool {
        self != ExprStage::Object
    }
}

type StageResult = Result<ExprStage, Ambiguity>;

/// Stage classifier over the current translation scopes
pub struct StageClassifier<'a> {
    scopes: &'a ScopeStack,
    functions: &'a FunctionTable,
    store: &'a StageStore,
    globals: &'a OdrTriggers,
}

impl<'a> StageClassifier<'a> {
    pub fn new(
        scopes: &'a ScopeStack,
        functions: &'a FunctionTable,
        store: &'a StageStore,
        globals: &'a OdrTriggers,
    ) -> Self {
        Self {
            scopes,
            functions,
            store,
            globals,
        }
    }

    /// Classify an expression appearing in object-stage code
    pub fn classify_expr(
        &self,
        expr: &Expr,
    ) -> Classification {
        match self.expr_stage(expr) {
            Ok(ExprStage::Meta) => Classification::MustRunMeta,
            // literals and known locals stay in the residual verbatim
            Ok(_) => Classification::MustRunObject,
            Err(ambiguity) => Classification::Ambiguous(ambiguity),
        }
    }

    /// Classify a statement appearing in object-stage code
    pub fn classify_stmt(
        &self,
        stmt: &Stmt,
    ) -> Classification {
        match self.stmt_class(stmt) {
            Ok(class) => class,
            Err(ambiguity) => Classification::Ambiguous(ambiguity),
        }
    }

    fn stmt_class(
        &self,
        stmt: &Stmt,
    ) -> Result<Classification, Ambiguity> {
        let class = match &stmt.kind {
            StmtKind::Meta(_) => Classification::MustRunMeta,
            StmtKind::Let { init, .. } => {
                self.expr_stage(init)?;
                Classification::MustRunObject
            }
            StmtKind::Assign { target, value } => {
                let value_stage = self.expr_stage(value)?;
                self.assign_class(target, value_stage)?
            }
            // a constexpr call keeps its run-time effects unless it folds
            StmtKind::Expr(expr) => match self.expr_stage(expr)? {
                ExprStage::Meta if !self.functions.calls_constexpr(expr) => {
                    Classification::MustRunMeta
                }
                _ => Classification::MustRunObject,
            },
            StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
                self.expr_stage(cond)?;
                Classification::MustRunObject
            }
            StmtKind::For { start, end, .. } => {
                self.expr_stage(start)?;
                self.expr_stage(end)?;
                Classification::MustRunObject
            }
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.expr_stage(expr)?;
                }
                Classification::MustRunObject
            }
            StmtKind::Block(_) => Classification::MustRunObject,
        };
        Ok(class)
    }

    /// Unmarked assignment: the stage of the target decides
    fn assign_class(
        &self,
        target: &Expr,
        value_stage: ExprStage,
    ) -> Result<Classification, Ambiguity> {
        let mut index_stage = ExprStage::Neutral;
        let mut place = target;
        while let ExprKind::Index { base, index } = &place.kind {
            index_stage = index_stage.join(self.expr_stage(index)?);
            place = base;
        }
        let Some(name) = place.root_name() else {
            return Ok(Classification::MustRunObject);
        };
        let meta_target = match self.scopes.lookup(name) {
            Lookup::Found(Binding::Meta(_)) => true,
            Lookup::Found(Binding::Object(_)) => false,
            Lookup::Retired(_) => return Err(retired(name, place.span)),
            Lookup::NotFound => self.store.global(name).is_some(),
        };
        if !meta_target {
            return Ok(Classification::MustRunObject);
        }
        if value_stage > ExprStage::Meta || index_stage > ExprStage::Meta {
            return Err(Ambiguity {
                name: name.to_string(),
                detail: format!(
                    "meta-stage variable `{}` cannot be assigned a run-time value",
                    name
                ),
                span: target.span,
            });
        }
        Ok(Classification::MustRunMeta)
    }

    /// Stage of an expression; `Err` when it is ambiguous
    pub fn expr_stage(
        &self,
        expr: &Expr,
    ) -> StageResult {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Str(_) => Ok(ExprStage::Neutral),
            ExprKind::Var(name) => self.var_stage(name, expr.span),
            ExprKind::Unary { expr, .. } => self.expr_stage(expr),
            ExprKind::Binary { lhs, rhs, .. } => {
                Ok(self.expr_stage(lhs)?.join(self.expr_stage(rhs)?))
            }
            ExprKind::List(items) => self.join_all(items),
            ExprKind::Index { base, index } => {
                let base_stage = self.expr_stage(base)?;
                let index_stage = self.expr_stage(index)?;
                if base_stage == ExprStage::Meta && index_stage == ExprStage::Object {
                    return Err(Ambiguity {
                        name: base.root_name().unwrap_or_default().to_string(),
                        detail: format!(
                            "meta-stage value `{}` cannot be indexed by the run-time value `{}`",
                            base, index
                        ),
                        span: expr.span,
                    });
                }
                Ok(base_stage.join(index_stage))
            }
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                let receiver_stage = self.expr_stage(receiver)?;
                let args_stage = self.join_all(args)?;
                if receiver_stage == ExprStage::Meta {
                    let limit = if ops::is_mutating_method(method) {
                        ExprStage::Meta
                    } else {
                        ExprStage::ConstObject
                    };
                    if args_stage > limit {
                        return Err(Ambiguity {
                            name: receiver.root_name().unwrap_or_default().to_string(),
                            detail: format!(
                                "run-time value passed to `{}` on meta-stage value `{}`",
                                method, receiver
                            ),
                            span: expr.span,
                        });
                    }
                }
                Ok(receiver_stage.join(args_stage))
            }
            ExprKind::Call { callee, args } => {
                let args_stage = self.join_all(args)?;
                if callee == PRINT {
                    return Ok(ExprStage::Object);
                }
                if callee == IS_META {
                    return Ok(ExprStage::Neutral);
                }
                match self.functions.kind(callee) {
                    Some(FnKind::Consteval) => Ok(ExprStage::Meta),
                    Some(FnKind::Constexpr) if args_stage.is_static() => Ok(ExprStage::Meta),
                    _ => Ok(ExprStage::Object),
                }
            }
            ExprKind::Port(inner) => {
                self.expr_stage(inner)?;
                Ok(ExprStage::Object)
            }
        }
    }

    fn join_all(
        &self,
        exprs: &[Expr],
    ) -> StageResult {
        exprs.iter().try_fold(ExprStage::Neutral, |stage, expr| {
            Ok(stage.join(self.expr_stage(expr)?))
        })
    }

    fn var_stage(
        &self,
        name: &str,
        span: Span,
    ) -> StageResult {
        match self.scopes.lookup(name) {
            Lookup::Found(Binding::Meta(_)) => Ok(ExprStage::Meta),
            Lookup::Found(Binding::Object(ObjectLocal { known: Some(_), .. })) => {
                Ok(ExprStage::ConstObject)
            }
            Lookup::Found(Binding::Object(_)) => Ok(ExprStage::Object),
            Lookup::Retired(_) => Err(retired(name, span)),
            Lookup::NotFound if self.store.global(name).is_some() => Ok(ExprStage::Meta),
            // globals are initialized at run time; unknown names are
            // reported by the translator
            Lookup::NotFound => {
                if !self.globals.contains(name) {
                    tracing::trace!("unresolved name `{}` classified as object", name);
                }
                Ok(ExprStage::Object)
            }
        }
    }
}

fn retired(
    name: &str,
    span: Span,
) -> Ambiguity {
    Ambiguity {
        name: name.to_string(),
        detail: format!(
            "value `{}` is not available outside its meta-stage binding scope",
            name
        ),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse_expression;
    use crate::middle::ObjExpr;
    use crate::runtime::Value;
    use crate::staging::value::StageValue;

    struct Fixture {
        scopes: ScopeStack,
        functions: FunctionTable,
        store: StageStore,
        globals: OdrTriggers,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = StageStore::new();
            let ints = Value::Vec {
                elem: crate::frontend::types::TypeDesc::Int,
                items: vec![Value::Int(1), Value::Int(2)],
            };
            store.declare_global("ints", StageValue::meta(ints));
            let k = store.declare("k", StageValue::meta(Value::Int(3)));

            let mut scopes = ScopeStack::new();
            scopes.push_barrier();
            scopes.bind_meta("k", k, Span::dummy());
            scopes.bind_object(
                "x",
                ObjectLocal {
                    residual: ObjExpr::Var("x".into()),
                    known: None,
                },
            );
            scopes.bind_object(
                "c",
                ObjectLocal {
                    residual: ObjExpr::Var("c".into()),
                    known: Some(Value::Int(1)),
                },
            );
            Self {
                scopes,
                functions: FunctionTable::new(),
                store,
                globals: OdrTriggers::new(),
            }
        }

        fn classifier(&self) -> StageClassifier<'_> {
            StageClassifier::new(&self.scopes, &self.functions, &self.store, &self.globals)
        }

        fn stage(
            &self,
            source: &str,
        ) -> StageResult {
            let expr = parse_expression(&tokenize(source).unwrap()).unwrap();
            self.classifier().expr_stage(&expr)
        }
    }

    #[test]
    fn test_expression_stages() {
        let fx = Fixture::new();
        assert_eq!(fx.stage("1 + 2"), Ok(ExprStage::Neutral));
        assert_eq!(fx.stage("k * 2"), Ok(ExprStage::Meta));
        assert_eq!(fx.stage("ints.len()"), Ok(ExprStage::Meta));
        assert_eq!(fx.stage("ints[k]"), Ok(ExprStage::Meta));
        assert_eq!(fx.stage("c + k"), Ok(ExprStage::ConstObject));
        assert_eq!(fx.stage("ints[c]"), Ok(ExprStage::ConstObject));
        assert_eq!(fx.stage("x + k"), Ok(ExprStage::Object));
        assert_eq!(fx.stage("print(k)"), Ok(ExprStage::Object));
    }

    #[test]
    fn test_meta_aggregate_indexed_at_run_time_is_ambiguous() {
        let fx = Fixture::new();
        let err = fx.stage("ints[x]").unwrap_err();
        assert_eq!(err.name, "ints");
        assert!(fx.stage("ints.push(x)").is_err());
        assert!(fx.stage("ints.push(c)").is_err());
    }

    #[test]
    fn test_retired_meta_name_is_ambiguous() {
        let mut fx = Fixture::new();
        fx.scopes.push();
        fx.scopes.bind_meta("i", crate::staging::MetaVarId(1), Span::dummy());
        assert_eq!(fx.stage("i"), Ok(ExprStage::Meta));
        fx.scopes.pop();
        let stmt = Stmt::new(
            StmtKind::Expr(parse_expression(&tokenize("print(i)").unwrap()).unwrap()),
            Span::dummy(),
        );
        match fx.classifier().classify_stmt(&stmt) {
            Classification::Ambiguous(ambiguity) => {
                let err = StageError::from(ambiguity);
                assert_eq!(err.category(), "ScopeViolation");
                assert!(err.to_string().contains("meta-stage binding scope"));
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_statement_classes() {
        let fx = Fixture::new();
        let classify = |source: &str| {
            let module = crate::frontend::parser::parse(
                &tokenize(&format!("fn t() {{ {} }}", source)).unwrap(),
            )
            .unwrap();
            let Item::Function(decl) = &module.items[0] else {
                unreachable!()
            };
            fx.classifier().classify_stmt(&decl.body.stmts[0])
        };
        assert_eq!(classify("@meta print(1);"), Classification::MustRunMeta);
        assert_eq!(classify("ints.push(4);"), Classification::MustRunMeta);
        assert_eq!(classify("k += 1;"), Classification::MustRunMeta);
        assert_eq!(classify("x = k;"), Classification::MustRunObject);
        assert_eq!(classify("let y = k;"), Classification::MustRunObject);
        assert_eq!(classify("print(x);"), Classification::MustRunObject);
        assert!(matches!(classify("k = x;"), Classification::Ambiguous(_)));
    }
}
