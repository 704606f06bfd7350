//! VM errors

use crate::runtime::OpError;
use thiserror::Error;

/// VM result
pub type VMResult<T> = Result<T, RuntimeError>;

/// Run-time errors of the residual program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in `{op}`")]
    Overflow { op: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Undefined function `{0}`")]
    UndefinedFunction(String),

    #[error("Undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("`{callee}` takes {expected} argument(s) but {found} were supplied")]
    ArgCountMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("Call stack overflow (depth {0})")]
    StackOverflow(usize),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<OpError> for RuntimeError {
    fn from(err: OpError) -> Self {
        match err {
            OpError::DivisionByZero => RuntimeError::DivisionByZero,
            OpError::Overflow { op } => RuntimeError::Overflow { op: op.to_string() },
            OpError::IndexOutOfBounds { index, len } => RuntimeError::IndexOutOfBounds { index, len },
            other @ (OpError::TypeMismatch { .. } | OpError::UnknownMethod { .. }) => {
                RuntimeError::TypeError(other.to_string())
            }
        }
    }
}
