//! Lexical scopes of the function being translated
//!
//! Frames map source names to either a meta-stage store slot or an
//! object-stage local. A barrier frame starts a new function body (or an
//! inline expansion), so lookups never see the caller's locals. When a
//! frame is popped its meta names are retired: a later reference from
//! object code is a stage violation, not an unknown name.

use super::store::MetaVarId;
use crate::middle::ObjExpr;
use crate::runtime::Value;
use crate::util::span::Span;
use indexmap::IndexMap;

/// Object-stage local
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLocal {
    /// Expression that reads the local in residual code
    pub residual: ObjExpr,
    /// Value when the local is provably constant here
    pub known: Option<Value>,
}

/// What a name is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Meta(MetaVarId),
    Object(ObjectLocal),
}

/// Result of a name lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Binding),
    /// Bound only inside a meta-stage scope that has ended
    Retired(Span),
    NotFound,
}

#[derive(Debug, Default)]
struct Frame {
    bindings: IndexMap<String, Binding>,
    retired: IndexMap<String, Span>,
    barrier: bool,
    /// Where each meta binding of this frame was declared
    meta_spans: IndexMap<String, Span>,
}

/// Scope stack for one translation context
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Create an empty scope stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a nested block
    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Enter a function body or inline expansion
    pub fn push_barrier(&mut self) {
        self.frames.push(Frame {
            barrier: true,
            ..Frame::default()
        });
    }

    /// Leave the innermost frame, retiring its meta names
    pub fn pop(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if frame.barrier {
            return;
        }
        // a name still bound further out stays visible
        let meta: Vec<_> = frame
            .meta_spans
            .into_iter()
            .filter(|(name, _)| !self.is_bound(name))
            .collect();
        let retired: Vec<_> = frame
            .retired
            .into_iter()
            .filter(|(name, _)| !self.is_bound(name))
            .collect();
        if let Some(parent) = self.frames.last_mut() {
            for (name, span) in meta {
                parent.retired.insert(name, span);
            }
            for (name, span) in retired {
                parent.retired.entry(name).or_insert(span);
            }
        }
    }

    fn is_bound(
        &self,
        name: &str,
    ) -> bool {
        matches!(self.lookup(name), Lookup::Found(_))
    }

    /// Number of frames
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind a meta-stage name in the innermost frame
    pub fn bind_meta(
        &mut self,
        name: &str,
        id: MetaVarId,
        span: Span,
    ) {
        if let Some(frame) = self.frames.last_mut() {
            frame.retired.shift_remove(name);
            frame.meta_spans.insert(name.to_string(), span);
            frame.bindings.insert(name.to_string(), Binding::Meta(id));
        }
    }

    /// Bind an object-stage local in the innermost frame
    pub fn bind_object(
        &mut self,
        name: &str,
        local: ObjectLocal,
    ) {
        if let Some(frame) = self.frames.last_mut() {
            frame.retired.shift_remove(name);
            frame.meta_spans.shift_remove(name);
            frame.bindings.insert(name.to_string(), Binding::Object(local));
        }
    }

    /// Resolve a name, innermost frame first, stopping at a barrier
    pub fn lookup(
        &self,
        name: &str,
    ) -> Lookup<'_> {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.bindings.get(name) {
                return Lookup::Found(binding);
            }
            if let Some(span) = frame.retired.get(name) {
                return Lookup::Retired(*span);
            }
            if frame.barrier {
                break;
            }
        }
        Lookup::NotFound
    }

    fn object_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut ObjectLocal> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.bindings.get_mut(name) {
                return match binding {
                    Binding::Object(local) => Some(local),
                    Binding::Meta(_) => None,
                };
            }
            if frame.barrier {
                break;
            }
        }
        None
    }

    /// Drop the constancy tag of an object local
    pub fn invalidate(
        &mut self,
        name: &str,
    ) {
        if let Some(local) = self.object_mut(name) {
            if local.known.take().is_some() {
                tracing::trace!("constancy tag of `{}` invalidated", name);
            }
        }
    }

    /// Known value of the object local read by the residual name `residual`
    pub fn known_by_residual(
        &self,
        residual: &str,
    ) -> Option<&Value> {
        for frame in self.frames.iter().rev() {
            for binding in frame.bindings.values().rev() {
                if let Binding::Object(ObjectLocal {
                    residual: ObjExpr::Var(name),
                    known,
                }) = binding
                {
                    if name == residual {
                        return known.as_ref();
                    }
                }
            }
            if frame.barrier {
                break;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> ObjectLocal {
        ObjectLocal {
            residual: ObjExpr::Var(name.to_string()),
            known: Some(Value::Int(1)),
        }
    }

    #[test]
    fn test_meta_names_retire_when_frame_pops() {
        let mut scopes = ScopeStack::new();
        scopes.push_barrier();
        scopes.push();
        scopes.bind_meta("i", MetaVarId(0), Span::dummy());
        assert!(matches!(scopes.lookup("i"), Lookup::Found(Binding::Meta(_))));
        scopes.pop();
        assert!(matches!(scopes.lookup("i"), Lookup::Retired(_)));
        scopes.bind_object("i", local("i"));
        assert!(matches!(scopes.lookup("i"), Lookup::Found(Binding::Object(_))));
    }

    #[test]
    fn test_retiring_keeps_outer_binding_visible() {
        let mut scopes = ScopeStack::new();
        scopes.push_barrier();
        scopes.bind_object("i", local("i"));
        scopes.push();
        scopes.push();
        scopes.bind_meta("i", MetaVarId(0), Span::dummy());
        scopes.pop();
        assert!(matches!(scopes.lookup("i"), Lookup::Found(Binding::Object(_))));
        scopes.pop();
        assert!(matches!(scopes.lookup("i"), Lookup::Found(Binding::Object(_))));
    }

    #[test]
    fn test_barrier_hides_outer_locals() {
        let mut scopes = ScopeStack::new();
        scopes.push_barrier();
        scopes.bind_object("x", local("x"));
        scopes.push_barrier();
        assert_eq!(scopes.lookup("x"), Lookup::NotFound);
        scopes.pop();
        assert!(matches!(scopes.lookup("x"), Lookup::Found(_)));
    }

    #[test]
    fn test_invalidate_clears_known_value() {
        let mut scopes = ScopeStack::new();
        scopes.push_barrier();
        scopes.bind_object("x", local("x_1"));
        scopes.push();
        assert_eq!(scopes.known_by_residual("x_1"), Some(&Value::Int(1)));
        scopes.invalidate("x");
        assert_eq!(scopes.known_by_residual("x_1"), None);
    }
}
