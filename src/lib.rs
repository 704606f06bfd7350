//! metastage
//!
//! A two-stage (meta / object) partial evaluator. `@meta` code runs while a
//! unit is translated, keeps its state in a persistent store, and leaves an
//! object-stage residual program behind for the run-time interpreter.
//!
//! # Example
//!
//! ```
//! let output = metastage::run(r#"
//!     @meta let j = 0;
//!     fn main() {
//!         @meta ++j;
//!         print(j * 10);
//!     }
//! "#).unwrap();
//! assert_eq!(output.runtime, vec!["10".to_string()]);
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod frontend;
pub mod middle;
pub mod runtime;
pub mod staging;
pub mod vm;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use frontend::{CompileError, Compiler};
pub use util::config::StageConfig;

use std::fs;
use std::path::Path;
use tracing::debug;

/// Language version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Language name
pub const NAME: &str = "metastage";

/// Everything a program printed, split by stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// Printed by meta-stage code during translation
    pub compile_time: Vec<String>,
    /// Printed by the residual program
    pub runtime: Vec<String>,
}

/// Translate and run source code with the default configuration
pub fn run(source: &str) -> Result<RunOutput> {
    run_with_config(source, &StageConfig::default())
}

/// Translate and run source code
///
/// Output is captured; nothing is written to stdout.
pub fn run_with_config(
    source: &str,
    config: &StageConfig,
) -> Result<RunOutput> {
    debug!("run called");
    let mut compiler = Compiler::with_config(config.clone());
    let translation = compiler.compile(source)?;

    debug!("VM start");
    let mut vm = vm::VM::new(&translation.program);
    vm.run()?;
    debug!("VM complete");
    let runtime = vm.into_output();

    Ok(RunOutput {
        compile_time: translation.meta_output,
        runtime,
    })
}

/// Translate and run a file
pub fn run_file(path: &Path) -> Result<RunOutput> {
    debug!("Running file {}", path.display());
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    run(&source)
}
