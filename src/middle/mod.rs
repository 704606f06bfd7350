//! Residual program
//!
//! The object-stage output of translation: every meta sub-expression has
//! already been replaced by a literal or a ported initializer list.

pub mod ir;
mod printer;

pub use ir::*;
