//! Runtime value type
//!
//! `Value` is the representation of all values, both when meta-stage code
//! executes during translation and when the residual program runs. Values
//! have copy semantics: cloning a `Vec` duplicates its buffer.

use crate::frontend::types::TypeDesc;
use std::fmt;

/// Runtime value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Empty value
    Unit,
    /// 64-bit signed integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// Immutable string
    Str(String),
    /// Resizable sequence with a declared element type
    Vec { elem: TypeDesc, items: Vec<Value> },
}

impl Value {
    /// Empty sequence of `elem`
    pub fn empty_vec(elem: TypeDesc) -> Self {
        Value::Vec {
            elem,
            items: Vec::new(),
        }
    }

    /// Type descriptor of this value
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Value::Unit => TypeDesc::Unit,
            Value::Int(_) => TypeDesc::Int,
            Value::Bool(_) => TypeDesc::Bool,
            Value::Str(_) => TypeDesc::Str,
            Value::Vec { elem, .. } => TypeDesc::vec_of(elem.clone()),
        }
    }

    /// Whether the value can be written down as an object-stage literal
    #[inline]
    pub fn is_literal(&self) -> bool {
        !matches!(self, Value::Vec { .. })
    }

    /// Get integer value
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get boolean value
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> String {
        self.type_desc().to_string()
    }
}

impl fmt::Display for Value {
    /// Formats the value the way `print` shows it
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Vec { items, .. } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_desc_and_literal_gate() {
        let v = Value::Vec {
            elem: TypeDesc::Int,
            items: vec![Value::Int(1)],
        };
        assert_eq!(v.type_desc(), TypeDesc::vec_of(TypeDesc::Int));
        assert!(!v.is_literal());
        assert!(Value::Str("a".into()).is_literal());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Value::Vec {
            elem: TypeDesc::Int,
            items: vec![Value::Int(1), Value::Int(2)],
        };
        let mut copy = original.clone();
        if let Value::Vec { items, .. } = &mut copy {
            items[0] = Value::Int(99);
        }
        assert_eq!(original.to_string(), "[1, 2]");
        assert_eq!(copy.to_string(), "[99, 2]");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Unit.to_string(), "()");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        let words = Value::Vec {
            elem: TypeDesc::Str,
            items: vec![Value::Str("a".into())],
        };
        assert_eq!(words.to_string(), "[\"a\"]");
    }
}
