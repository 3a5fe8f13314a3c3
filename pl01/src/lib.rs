//! Front end of a PL/0.1 compiler: scanning, parsing, semantic analysis and
//! lowering onto an abstract IR builder.

pub mod backends;
pub mod error;
pub mod ir;
pub mod lower;
pub mod parser;
pub mod runtime;
pub mod sema;

pub use error::{CompileError, Diagnostic, Stage};
pub use lower::IrBuilder;
pub use sema::{AnalyzedProgram, Options};

use tracing::debug;

/// Scans, parses and analyzes one compilation unit.
pub fn check(source: &str, options: &Options) -> Result<AnalyzedProgram, CompileError> {
    let program = parser::parse(source)?;
    sema::analyze(program, options)
}

/// Runs the whole pipeline, lowering onto `builder`.
pub fn compile<B: IrBuilder>(
    source: &str,
    options: &Options,
    builder: &mut B,
) -> Result<Option<B::Value>, CompileError> {
    let analyzed = check(source, options)?;
    debug!("analysis clean, lowering");
    Ok(lower::lower_program(&analyzed, builder))
}
