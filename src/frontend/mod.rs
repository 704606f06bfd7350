//! Frontend compilation pipeline
//!
//! This module contains the lexer and parser, and the [`Compiler`] driver
//! that runs them and hands the syntax tree to the staged translator.

use crate::staging::{self, StageError, StageStore, Translation};
use crate::util::config::StageConfig;
use crate::util::diagnostic::{codes, Diagnostic};
use crate::util::span::Span;
use thiserror::Error;
use tracing::debug;

pub mod lexer;
pub mod parser;
pub mod types;

pub use lexer::LexError;
pub use parser::{ast, ParseError};

/// Compiler context
///
/// The meta-stage store lives as long as the compiler: meta globals
/// declared by one unit stay visible to units compiled later.
#[derive(Debug, Default)]
pub struct Compiler {
    /// Configuration
    config: StageConfig,
    /// Persistent meta-stage state
    store: StageStore,
}

impl Compiler {
    /// Create a new compiler with the default configuration
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler with an explicit configuration
    #[inline]
    pub fn with_config(config: StageConfig) -> Self {
        Self {
            config,
            store: StageStore::new(),
        }
    }

    /// Configuration in use
    #[inline]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Meta-stage store after the units compiled so far
    #[inline]
    pub fn store(&self) -> &StageStore {
        &self.store
    }

    /// Tokenize and parse without translating
    pub fn parse(
        &self,
        source: &str,
    ) -> Result<ast::Module, CompileError> {
        debug!("Compiling source code ({} bytes)", source.len());
        let tokens = lexer::tokenize(source)?;
        debug!("Tokenized into {} tokens", tokens.len());

        let module = parser::parse(&tokens)?;
        debug!("Parsing successful, got {} items", module.items.len());
        Ok(module)
    }

    /// Compile source code into a residual program
    pub fn compile(
        &mut self,
        source: &str,
    ) -> Result<Translation, CompileError> {
        let module = self.parse(source)?;

        debug!("Starting staged translation...");
        let translation = staging::translate(&module, &mut self.store, &self.config.translation)?;
        debug!(
            "Translation successful: {} function(s), {} global(s), {} meta line(s)",
            translation.program.functions.len(),
            translation.program.globals.len(),
            translation.meta_output.len()
        );
        Ok(translation)
    }
}

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Stage(#[from] StageError),
}

impl CompileError {
    /// Location of the error
    pub fn span(&self) -> Span {
        match self {
            CompileError::Lex(e) => e.span(),
            CompileError::Parse(e) => e.span(),
            CompileError::Stage(e) => e.span(),
        }
    }

    /// Stable category name
    pub fn category(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => codes::LEX_ERROR.category,
            CompileError::Parse(_) => codes::PARSE_ERROR.category,
            CompileError::Stage(e) => e.category(),
        }
    }

    /// Staged-translation error, if that is what failed
    pub fn as_stage(&self) -> Option<&StageError> {
        match self {
            CompileError::Stage(e) => Some(e),
            _ => None,
        }
    }

    /// Convert to a renderable diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let definition = match self {
            CompileError::Lex(_) => &codes::LEX_ERROR,
            CompileError::Parse(_) => &codes::PARSE_ERROR,
            CompileError::Stage(e) => return e.to_diagnostic(),
        };
        Diagnostic::error(
            definition.code,
            definition.category,
            self.to_string(),
            Some(self.span()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_pipeline() {
        let mut compiler = Compiler::new();
        let translation = compiler
            .compile("@meta let n = 2;\nfn main() { print(n * 21); }")
            .unwrap();
        let main = translation.program.function("main").unwrap();
        assert_eq!(main.body.len(), 1);
        assert_eq!(compiler.store().len(), 1);
    }

    #[test]
    fn test_error_categories() {
        let mut compiler = Compiler::new();

        let lex = compiler.compile("fn main() { # }").unwrap_err();
        assert_eq!(lex.category(), "LexError");
        assert_eq!(lex.to_diagnostic().code, "E0001");

        let parse = compiler.compile("fn main( {").unwrap_err();
        assert_eq!(parse.category(), "ParseError");

        let stage = compiler
            .compile("fn main() { @meta for i in 0..2 { } print(i); }")
            .unwrap_err();
        assert_eq!(stage.category(), "ScopeViolation");
        assert!(stage.as_stage().is_some());
        assert_eq!(stage.span().start.line, 1);
    }

    #[test]
    fn test_store_persists_between_units() {
        let mut compiler = Compiler::new();
        compiler.compile("@meta let total = 40;").unwrap();
        let translation = compiler
            .compile("fn main() { @meta total += 2; print(total); }")
            .unwrap();
        assert_eq!(
            translation.program.function("main").unwrap().body.len(),
            1
        );
        assert_eq!(compiler.store().len(), 1);
    }
}
