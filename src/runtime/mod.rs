//! Runtime values
//!
//! Values and primitive operations shared by the meta-stage interpreter
//! and the object-stage runner.

pub mod ops;
pub mod value;

pub use ops::OpError;
pub use value::Value;
