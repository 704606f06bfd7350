//! ODR-use triggers
//!
//! A global's initializer runs at run time only if object-stage code
//! references the global, directly or through the initializer of another
//! used global. A meta-stage reference runs the initializer once during
//! translation instead.

use crate::frontend::parser::ast::GlobalDecl;
use crate::middle::{ObjExpr, ObjGlobal};
use crate::runtime::Value;
use indexmap::{IndexMap, IndexSet};

/// Meta-stage initialization state of a global
#[derive(Debug, Clone, PartialEq)]
pub enum MetaInit {
    Pending,
    InProgress,
    Ready(Value),
}

#[derive(Debug, Clone)]
struct Trigger {
    decl: GlobalDecl,
    residual: Option<ObjExpr>,
    used: bool,
    deps: IndexSet<String>,
    meta: MetaInit,
}

/// Per-global "used" flags and dependencies
#[derive(Debug, Default)]
pub struct OdrTriggers {
    globals: IndexMap<String, Trigger>,
}

impl OdrTriggers {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global declaration; `false` if the name is taken
    pub fn register(
        &mut self,
        decl: &GlobalDecl,
    ) -> bool {
        if self.globals.contains_key(&decl.name) {
            return false;
        }
        self.globals.insert(
            decl.name.clone(),
            Trigger {
                decl: decl.clone(),
                residual: None,
                used: false,
                deps: IndexSet::new(),
                meta: MetaInit::Pending,
            },
        );
        true
    }

    /// Whether `name` is a registered global
    #[inline]
    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.globals.contains_key(name)
    }

    /// Declaration of a global
    pub fn decl(
        &self,
        name: &str,
    ) -> Option<&GlobalDecl> {
        self.globals.get(name).map(|t| &t.decl)
    }

    /// Record the translated run-time initializer
    pub fn set_residual(
        &mut self,
        name: &str,
        init: ObjExpr,
    ) {
        if let Some(trigger) = self.globals.get_mut(name) {
            trigger.residual = Some(init);
        }
    }

    /// Object-stage code referenced `name`
    pub fn mark_used(
        &mut self,
        name: &str,
    ) {
        if let Some(trigger) = self.globals.get_mut(name) {
            if !trigger.used {
                tracing::debug!("ODR-use of global `{}`", name);
                trigger.used = true;
            }
        }
    }

    /// The initializer of `from` references `to`
    pub fn add_dep(
        &mut self,
        from: &str,
        to: &str,
    ) {
        if let Some(trigger) = self.globals.get_mut(from) {
            trigger.deps.insert(to.to_string());
        }
    }

    /// Meta-stage initialization state
    pub fn meta_state(
        &self,
        name: &str,
    ) -> Option<&MetaInit> {
        self.globals.get(name).map(|t| &t.meta)
    }

    /// Update the meta-stage initialization state
    pub fn set_meta_state(
        &mut self,
        name: &str,
        state: MetaInit,
    ) {
        if let Some(trigger) = self.globals.get_mut(name) {
            trigger.meta = state;
        }
    }

    /// Names whose initializers must run, following dependencies
    pub fn used_closure(&self) -> IndexSet<String> {
        let mut used = IndexSet::new();
        let mut pending: Vec<&str> = self
            .globals
            .iter()
            .filter(|(_, t)| t.used)
            .map(|(name, _)| name.as_str())
            .collect();
        while let Some(name) = pending.pop() {
            if !used.insert(name.to_string()) {
                continue;
            }
            if let Some(trigger) = self.globals.get(name) {
                pending.extend(trigger.deps.iter().map(String::as_str));
            }
        }
        used
    }

    /// Used globals with their initializers, in declaration order
    pub fn residual_globals(&self) -> Vec<ObjGlobal> {
        let used = self.used_closure();
        self.globals
            .iter()
            .filter(|(name, _)| used.contains(name.as_str()))
            .filter_map(|(name, trigger)| {
                trigger.residual.as_ref().map(|init| ObjGlobal {
                    name: name.clone(),
                    init: init.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::ast::{Expr, ExprKind};
    use crate::util::span::Span;

    fn global(name: &str) -> GlobalDecl {
        GlobalDecl {
            name: name.to_string(),
            ty: None,
            init: Expr::new(ExprKind::Int(0), Span::dummy()),
            span: Span::dummy(),
        }
    }

    fn table(names: &[&str]) -> OdrTriggers {
        let mut odr = OdrTriggers::new();
        for name in names {
            assert!(odr.register(&global(name)));
            odr.set_residual(name, ObjExpr::int(0));
        }
        odr
    }

    #[test]
    fn test_unused_globals_are_dropped() {
        let mut odr = table(&["a", "b", "c"]);
        odr.mark_used("b");
        let names: Vec<_> = odr.residual_globals().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_dependencies_follow_initializers() {
        let mut odr = table(&["a", "b", "c"]);
        odr.add_dep("c", "a");
        odr.mark_used("c");
        let names: Vec<_> = odr.residual_globals().into_iter().map(|g| g.name).collect();
        // declaration order, not discovery order
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut odr = table(&["a"]);
        assert!(!odr.register(&global("a")));
        assert_eq!(odr.meta_state("a"), Some(&MetaInit::Pending));
    }
}
