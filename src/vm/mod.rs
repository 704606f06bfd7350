//! Object-stage runner
//!
//! Tree-walking interpreter over the residual program. It stands in for the
//! ordinary back end: used globals are initialized in declaration order,
//! then `main` runs.

pub use errors::{RuntimeError, VMResult};
pub use executor::{VMConfig, VM};

mod errors;
mod executor;
mod frames;

#[cfg(test)]
mod tests;
