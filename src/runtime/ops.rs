//! Primitive operations on runtime values

use super::value::Value;
use crate::frontend::parser::ast::{BinOp, UnOp};
use crate::frontend::types::TypeDesc;
use thiserror::Error;

/// Errors raised by primitive operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in `{op}`")]
    Overflow { op: &'static str },

    #[error("Cannot apply `{op}` to {operands}")]
    TypeMismatch { op: &'static str, operands: String },

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("No method `{method}` on {ty}")]
    UnknownMethod { method: String, ty: String },
}

fn mismatch(
    op: &'static str,
    values: &[&Value],
) -> OpError {
    let operands = values
        .iter()
        .map(|v| v.type_name())
        .collect::<Vec<_>>()
        .join(" and ");
    OpError::TypeMismatch { op, operands }
}

/// Apply a binary operator
pub fn binary(
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
) -> Result<Value, OpError> {
    let sym = op.symbol();
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or(OpError::Overflow { op: sym }),
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => a
            .checked_sub(*b)
            .map(Value::Int)
            .ok_or(OpError::Overflow { op: sym }),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => a
            .checked_mul(*b)
            .map(Value::Int)
            .ok_or(OpError::Overflow { op: sym }),
        (BinOp::Div | BinOp::Mod, Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
        (BinOp::Div, Value::Int(a), Value::Int(b)) => a
            .checked_div(*b)
            .map(Value::Int)
            .ok_or(OpError::Overflow { op: sym }),
        (BinOp::Mod, Value::Int(a), Value::Int(b)) => a
            .checked_rem(*b)
            .map(Value::Int)
            .ok_or(OpError::Overflow { op: sym }),
        (BinOp::Eq, a, b) if a.type_desc().conforms_to(&b.type_desc()) => Ok(Value::Bool(a == b)),
        (BinOp::Neq, a, b) if a.type_desc().conforms_to(&b.type_desc()) => {
            Ok(Value::Bool(a != b))
        }
        (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, Value::Int(a), Value::Int(b)) => {
            Ok(Value::Bool(compare(op, a.cmp(b))))
        }
        (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, Value::Str(a), Value::Str(b)) => {
            Ok(Value::Bool(compare(op, a.cmp(b))))
        }
        (BinOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        _ => Err(mismatch(sym, &[lhs, rhs])),
    }
}

fn compare(
    op: BinOp,
    ordering: std::cmp::Ordering,
) -> bool {
    match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }
}

/// Apply a unary operator
pub fn unary(
    op: UnOp,
    value: &Value,
) -> Result<Value, OpError> {
    match (op, value) {
        (UnOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(OpError::Overflow { op: "-" }),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(mismatch(op.symbol(), &[value])),
    }
}

fn checked_slot(
    items_len: usize,
    index: &Value,
    base: &Value,
) -> Result<usize, OpError> {
    let i = match index {
        Value::Int(i) => *i,
        other => return Err(mismatch("[]", &[base, other])),
    };
    if i < 0 || i as usize >= items_len {
        return Err(OpError::IndexOutOfBounds {
            index: i,
            len: items_len,
        });
    }
    Ok(i as usize)
}

/// Read `base[index]`
pub fn index(
    base: &Value,
    index: &Value,
) -> Result<Value, OpError> {
    match base {
        Value::Vec { items, .. } => {
            let slot = checked_slot(items.len(), index, base)?;
            Ok(items[slot].clone())
        }
        other => Err(mismatch("[]", &[other, index])),
    }
}

/// Write `base[index] = value`
pub fn set_index(
    base: &mut Value,
    index: &Value,
    value: Value,
) -> Result<(), OpError> {
    let base_ty = base.type_name();
    let (elem, items) = match base {
        Value::Vec { elem, items } => (elem, items),
        _ => {
            return Err(OpError::TypeMismatch {
                op: "[]",
                operands: format!("{} and {}", base_ty, index.type_name()),
            })
        }
    };
    let slot = match index {
        Value::Int(i) if *i >= 0 && (*i as usize) < items.len() => *i as usize,
        Value::Int(i) => {
            return Err(OpError::IndexOutOfBounds {
                index: *i,
                len: items.len(),
            })
        }
        other => {
            return Err(OpError::TypeMismatch {
                op: "[]",
                operands: format!("{} and {}", base_ty, other.type_name()),
            })
        }
    };
    if !value.type_desc().conforms_to(elem) {
        return Err(OpError::TypeMismatch {
            op: "=",
            operands: format!("{} and {}", base_ty, value.type_name()),
        });
    }
    items[slot] = value;
    Ok(())
}

/// Call a built-in method: `len()` on sequences and strings, `push(v)` on sequences
pub fn method(
    receiver: &mut Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    let receiver_ty = receiver.type_name();
    match (name, receiver) {
        ("len", Value::Vec { items, .. }) if args.is_empty() => Ok(Value::Int(items.len() as i64)),
        ("len", Value::Str(s)) if args.is_empty() => Ok(Value::Int(s.chars().count() as i64)),
        ("push", Value::Vec { elem, items }) if args.len() == 1 => {
            let value = args.into_iter().next().unwrap_or(Value::Unit);
            let value_ty = value.type_desc();
            if *elem == TypeDesc::Unknown {
                *elem = value_ty;
            } else if !value_ty.conforms_to(elem) {
                return Err(OpError::TypeMismatch {
                    op: "push",
                    operands: format!("{} and {}", receiver_ty, value_ty),
                });
            }
            items.push(value);
            Ok(Value::Unit)
        }
        _ => Err(OpError::UnknownMethod {
            method: name.to_string(),
            ty: receiver_ty,
        }),
    }
}

/// Whether `name` is a method that mutates its receiver
#[inline]
pub fn is_mutating_method(name: &str) -> bool {
    name == "push"
}
