//! VM call frames

use crate::runtime::Value;
use indexmap::IndexMap;

/// Call frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Function name
    pub name: String,
    /// Block scopes, innermost last
    scopes: Vec<IndexMap<String, Value>>,
}

impl Frame {
    /// Create a new frame with one scope
    pub fn new(name: String) -> Self {
        Self {
            name,
            scopes: vec![IndexMap::new()],
        }
    }

    /// Enter a block
    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// Leave a block
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declare a local in the innermost scope, shadowing outer ones
    pub fn declare(
        &mut self,
        name: &str,
        value: Value,
    ) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Read a local
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Mutable access to a local
    pub fn get_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut Value> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    /// Number of live scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
