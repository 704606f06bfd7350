//! Type descriptors
//!
//! The staged engine needs only enough typing to decide literal-ness:
//! whether a value can be written down as an object-stage constant.

use serde::Serialize;
use std::fmt;

/// Type descriptor supplied by the front-end
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeDesc {
    /// `()`
    Unit,
    /// `int` (64-bit signed)
    Int,
    /// `bool`
    Bool,
    /// `str` (immutable string literal)
    Str,
    /// `[T]`, a resizable sequence that owns its buffer
    Vec(Box<TypeDesc>),
    /// Element type of an empty sequence, not yet known
    Unknown,
}

impl TypeDesc {
    /// `[elem]`
    pub fn vec_of(elem: TypeDesc) -> Self {
        TypeDesc::Vec(Box::new(elem))
    }

    /// Literal types are trivially copyable and representable as a
    /// constant expression; sequences own a buffer and are not.
    pub fn is_literal(&self) -> bool {
        match self {
            TypeDesc::Unit | TypeDesc::Int | TypeDesc::Bool | TypeDesc::Str => true,
            TypeDesc::Vec(_) => false,
            TypeDesc::Unknown => true,
        }
    }

    /// Whether a value of type `self` may be stored where `expected` is declared
    pub fn conforms_to(
        &self,
        expected: &TypeDesc,
    ) -> bool {
        match (self, expected) {
            (TypeDesc::Unknown, _) | (_, TypeDesc::Unknown) => true,
            (TypeDesc::Vec(a), TypeDesc::Vec(b)) => a.conforms_to(b),
            (a, b) => a == b,
        }
    }

    /// Human readable name
    pub fn type_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TypeDesc::Unit => write!(f, "()"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Str => write!(f, "str"),
            TypeDesc::Vec(elem) => write!(f, "[{}]", elem),
            TypeDesc::Unknown => write!(f, "_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_types() {
        assert!(TypeDesc::Int.is_literal());
        assert!(TypeDesc::Str.is_literal());
        assert!(!TypeDesc::vec_of(TypeDesc::Int).is_literal());
        assert!(!TypeDesc::vec_of(TypeDesc::vec_of(TypeDesc::Int)).is_literal());
    }

    #[test]
    fn test_conformance() {
        let empty = TypeDesc::vec_of(TypeDesc::Unknown);
        assert!(empty.conforms_to(&TypeDesc::vec_of(TypeDesc::Int)));
        assert!(!TypeDesc::Bool.conforms_to(&TypeDesc::Int));
        assert_eq!(TypeDesc::vec_of(TypeDesc::vec_of(TypeDesc::Int)).to_string(), "[[int]]");
    }
}
