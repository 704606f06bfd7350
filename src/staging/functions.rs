//! Declared functions and their constancy obligations

use super::constancy::ConstancyObligation;
use super::error::StageError;
use crate::frontend::parser::ast::{Expr, FnDecl, FnKind};
use indexmap::IndexMap;

/// Name of the built-in output function
pub const PRINT: &str = "print";

/// Name of the stage query: `true` while a call is evaluated during
/// translation, `false` in residual code
pub const IS_META: &str = "is_meta";

/// Whether `name` is reserved for a builtin
#[inline]
pub fn is_builtin(name: &str) -> bool {
    name == PRINT || name == IS_META
}

/// All functions of the unit, collected before translation starts
#[derive(Debug, Default)]
pub struct FunctionTable {
    decls: IndexMap<String, FnDecl>,
    obligations: IndexMap<String, ConstancyObligation>,
}

impl FunctionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration, fixing its obligation
    pub fn declare(
        &mut self,
        decl: &FnDecl,
    ) -> Result<(), StageError> {
        if is_builtin(&decl.name) || self.decls.contains_key(&decl.name) {
            return Err(StageError::InvalidDeclaration {
                detail: format!("function `{}` is defined more than once", decl.name),
                span: decl.span,
            });
        }
        let obligation = ConstancyObligation::for_decl(decl)?;
        self.obligations.insert(decl.name.clone(), obligation);
        self.decls.insert(decl.name.clone(), decl.clone());
        Ok(())
    }

    /// Look up a declaration
    #[inline]
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&FnDecl> {
        self.decls.get(name)
    }

    /// Kind of a declared function
    #[inline]
    pub fn kind(
        &self,
        name: &str,
    ) -> Option<FnKind> {
        self.decls.get(name).map(|d| d.kind)
    }

    /// Whether any call made by `expr` targets a `constexpr` function
    pub fn calls_constexpr(
        &self,
        expr: &Expr,
    ) -> bool {
        expr.any_call(&mut |callee| self.kind(callee) == Some(FnKind::Constexpr))
    }

    /// Obligation attached to a declared function
    #[inline]
    pub fn obligation(
        &self,
        name: &str,
    ) -> Option<&ConstancyObligation> {
        self.obligations.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::{parse, parse_expression};
    use crate::frontend::parser::ast::Item;

    fn table(source: &str) -> Result<FunctionTable, StageError> {
        let module = parse(&tokenize(source).unwrap()).unwrap();
        let mut functions = FunctionTable::new();
        for item in &module.items {
            if let Item::Function(decl) = item {
                functions.declare(decl)?;
            }
        }
        Ok(functions)
    }

    #[test]
    fn test_builtin_names_are_reserved() {
        let err = table("fn is_meta(): bool { return true; }").unwrap_err();
        assert_eq!(err.category(), "DeclarationError");
        assert!(table("fn print() {}").is_err());
    }

    #[test]
    fn test_calls_constexpr_looks_through_operands() {
        let functions = table(
            "constexpr fn sq(x: int): int { return x * x; }\n\
             fn id(x: int): int { return x; }",
        )
        .unwrap();
        let expr = |source: &str| parse_expression(&tokenize(source).unwrap()).unwrap();
        assert!(functions.calls_constexpr(&expr("1 + id(sq(3))")));
        assert!(!functions.calls_constexpr(&expr("id(2) + 1")));
    }
}
