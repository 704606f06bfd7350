//! Translation-time errors
//!
//! Every error is fatal: translation halts at the first one.

use crate::runtime::OpError;
use crate::util::diagnostic::{codes, Diagnostic, ErrorCodeDefinition};
use crate::util::span::Span;
use thiserror::Error;

/// Errors raised while translating a unit
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("{detail}")]
    ScopeViolation {
        name: String,
        detail: String,
        span: Span,
    },

    #[error("argument `{argument}` of `{callee}` is not a constant expression (call chain: {chain})")]
    ConstancyViolation {
        argument: String,
        callee: String,
        chain: String,
        span: Span,
    },

    #[error("only literal types can be ported: element type `{ty}` is not a literal type")]
    NonLiteralPortError { ty: String, span: Span },

    #[error("cannot find `{name}` in this scope")]
    UndefinedName { name: String, span: Span },

    #[error("cannot find function `{name}`")]
    UndefinedFunction { name: String, span: Span },

    #[error("{detail}")]
    TypeMismatch { detail: String, span: Span },

    #[error("`{callee}` takes {expected} argument(s) but {found} were supplied")]
    ArgCountMismatch {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("division by zero during meta-stage evaluation")]
    DivisionByZero { span: Span },

    #[error("integer overflow in `{op}` during meta-stage evaluation")]
    Overflow { op: String, span: Span },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize, span: Span },

    #[error("meta-stage recursion exceeded depth {depth}")]
    RecursionTooDeep { depth: usize, span: Span },

    #[error("meta loop exceeded {limit} iterations")]
    UnrollLimit { limit: usize, span: Span },

    #[error("{detail}")]
    InvalidDeclaration { detail: String, span: Span },

    #[error("{detail}")]
    UnsupportedConstruct { detail: String, span: Span },
}

impl StageError {
    /// Attach a location to a primitive operation failure
    pub fn from_op(
        err: OpError,
        span: Span,
    ) -> Self {
        match err {
            OpError::DivisionByZero => StageError::DivisionByZero { span },
            OpError::Overflow { op } => StageError::Overflow {
                op: op.to_string(),
                span,
            },
            OpError::IndexOutOfBounds { index, len } => {
                StageError::IndexOutOfBounds { index, len, span }
            }
            other @ (OpError::TypeMismatch { .. } | OpError::UnknownMethod { .. }) => {
                StageError::TypeMismatch {
                    detail: other.to_string(),
                    span,
                }
            }
        }
    }

    /// Code registry entry for this error
    pub fn definition(&self) -> &'static ErrorCodeDefinition {
        match self {
            StageError::ScopeViolation { .. } => &codes::SCOPE_VIOLATION,
            StageError::ConstancyViolation { .. } => &codes::CONSTANCY_VIOLATION,
            StageError::NonLiteralPortError { .. } => &codes::NON_LITERAL_PORT,
            StageError::UndefinedName { .. } | StageError::UndefinedFunction { .. } => {
                &codes::UNDEFINED_NAME
            }
            StageError::TypeMismatch { .. } | StageError::ArgCountMismatch { .. } => {
                &codes::TYPE_ERROR
            }
            StageError::DivisionByZero { .. }
            | StageError::Overflow { .. }
            | StageError::IndexOutOfBounds { .. }
            | StageError::RecursionTooDeep { .. }
            | StageError::UnrollLimit { .. } => &codes::EVALUATION_ERROR,
            StageError::InvalidDeclaration { .. } | StageError::UnsupportedConstruct { .. } => {
                &codes::DECLARATION_ERROR
            }
        }
    }

    /// Stable, human-readable category name
    pub fn category(&self) -> &'static str {
        self.definition().category
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        self.definition().code
    }

    /// Location of the offending construct
    pub fn span(&self) -> Span {
        match self {
            StageError::ScopeViolation { span, .. }
            | StageError::ConstancyViolation { span, .. }
            | StageError::NonLiteralPortError { span, .. }
            | StageError::UndefinedName { span, .. }
            | StageError::UndefinedFunction { span, .. }
            | StageError::TypeMismatch { span, .. }
            | StageError::ArgCountMismatch { span, .. }
            | StageError::DivisionByZero { span }
            | StageError::Overflow { span, .. }
            | StageError::IndexOutOfBounds { span, .. }
            | StageError::RecursionTooDeep { span, .. }
            | StageError::UnrollLimit { span, .. }
            | StageError::InvalidDeclaration { span, .. }
            | StageError::UnsupportedConstruct { span, .. } => *span,
        }
    }

    /// Fill in a location for errors raised without one
    pub(crate) fn or_span(
        mut self,
        fallback: Span,
    ) -> Self {
        if self.span().is_dummy() {
            match &mut self {
                StageError::ScopeViolation { span, .. }
                | StageError::ConstancyViolation { span, .. }
                | StageError::NonLiteralPortError { span, .. }
                | StageError::UndefinedName { span, .. }
                | StageError::UndefinedFunction { span, .. }
                | StageError::TypeMismatch { span, .. }
                | StageError::ArgCountMismatch { span, .. }
                | StageError::DivisionByZero { span }
                | StageError::Overflow { span, .. }
                | StageError::IndexOutOfBounds { span, .. }
                | StageError::RecursionTooDeep { span, .. }
                | StageError::UnrollLimit { span, .. }
                | StageError::InvalidDeclaration { span, .. }
                | StageError::UnsupportedConstruct { span, .. } => *span = fallback,
            }
        }
        self
    }

    /// Convert to a renderable diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let definition = self.definition();
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
    fn test_categories_are_stable() {
        let span = Span::dummy();
        let scope = StageError::ScopeViolation {
            name: "i".into(),
            detail: "value `i` is not available outside its meta-stage binding scope".into(),
            span,
        };
        assert_eq!(scope.category(), "ScopeViolation");
        assert_eq!(scope.code(), "E0301");

        let port = StageError::NonLiteralPortError {
            ty: "[int]".into(),
            span,
        };
        assert_eq!(port.category(), "NonLiteralPortError");
        assert!(port.to_string().contains("[int]"));

        let constancy = StageError::ConstancyViolation {
            argument: "r".into(),
            callee: "f".into(),
            chain: "h -> f".into(),
            span,
        };
        assert_eq!(constancy.category(), "ConstancyViolation");
        assert_eq!(
            constancy.to_diagnostic().to_string(),
            "error[E0302] ConstancyViolation: argument `r` of `f` is not a constant expression (call chain: h -> f)"
        );
    }

    #[test]
    fn test_op_errors_map_to_evaluation_errors() {
        let err = StageError::from_op(OpError::DivisionByZero, Span::dummy());
        assert_eq!(err.category(), "EvaluationError");
        let err = StageError::from_op(
            OpError::TypeMismatch {
                op: "+",
                operands: "int and bool".into(),
            },
            Span::dummy(),
        );
        assert_eq!(err.category(), "TypeError");
    }
}
