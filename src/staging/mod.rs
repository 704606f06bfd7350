//! 分期求值引擎
//!
//! Two-stage evaluation: meta-stage code runs while the program is being
//! translated and keeps its state in a [`StageStore`] for the whole unit;
//! object-stage code is lowered into a [`ResidualProgram`](crate::middle::ResidualProgram).
//!
//! - [`classifier`] decides the stage of every statement and expression
//! - [`store`] holds meta-stage bindings
//! - [`constancy`] gates calls that require constant arguments
//! - [`porting`] lowers meta aggregates into initializer lists
//! - [`odr`] tracks which globals need their initializers run
//! - [`translator`] drives all of the above in translation order

pub mod classifier;
pub mod constancy;
pub mod error;
pub mod functions;
mod meta;
pub mod odr;
pub mod porting;
pub mod scope;
pub mod store;
pub mod translator;
pub mod value;

pub use classifier::{Ambiguity, Classification, ExprStage, StageClassifier};
pub use constancy::{ConstancyChecker, ConstancyObligation};
pub use error::StageError;
pub use odr::OdrTriggers;
pub use porting::{AggregateArena, PortableAggregate, PortingTranslator};
pub use store::{MetaVarId, StageStore};
pub use translator::{translate, Translation, Translator};
pub use value::StageValue;

use serde::Serialize;
use std::fmt;

/// Stage at which a value is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    /// Translation time
    Meta,
    /// Run time
    Object,
}

impl fmt::Display for Stage {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Stage::Meta => write!(f, "meta"),
            Stage::Object => write!(f, "object"),
        }
    }
}
