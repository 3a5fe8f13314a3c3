pub mod analyzer;
pub mod env;

use tracing::debug;

use crate::error::{CompileError, Diagnostic};
use crate::ir::ast::Program;
use crate::runtime::PRIMITIVES;

use analyzer::Context;
use env::{Environment, ScopeId, Symbol, SymbolKind};

/// Settings for semantic analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Pre-declare the runtime primitives in the root scope.
    pub prelude: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { prelude: true }
    }
}

/// Outcome of one analysis run, successful or not.
#[derive(Debug)]
pub struct Report {
    pub env: Environment,
    pub root: ScopeId,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }
}

/// Annotates `program` in place and collects every semantic error.
pub fn analyze_program(program: &mut Program, options: &Options) -> Report {
    let mut env = Environment::new();
    let root = env.push_scope(None);

    if options.prelude {
        for primitive in PRIMITIVES {
            let symbol = Symbol::callable(SymbolKind::Func, primitive.arity);
            let inserted = env.insert(root, primitive.name, symbol);
            debug_assert!(inserted.is_ok(), "duplicate primitive {}", primitive.name);
        }
        debug!(count = PRIMITIVES.len(), "runtime prelude installed");
    }

    let mut cx = Context::new(&mut env, root);
    analyzer::analyze_block_in(&mut program.block, root, &mut cx);
    let diagnostics = cx.into_diagnostics();
    debug!(errors = diagnostics.len(), scopes = env.len(), "analysis finished");

    Report {
        env,
        root,
        diagnostics,
    }
}

/// An annotated program that passed analysis without errors. Only
/// [`analyze`] constructs one.
#[derive(Debug)]
pub struct AnalyzedProgram {
    program: Program,
    env: Environment,
    root: ScopeId,
}

impl AnalyzedProgram {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn root_scope(&self) -> ScopeId {
        self.root
    }
}

pub fn analyze(mut program: Program, options: &Options) -> Result<AnalyzedProgram, CompileError> {
    let report = analyze_program(&mut program, options);
    if report.error_count() > 0 {
        return Err(CompileError::SemanticError {
            count: report.error_count(),
        });
    }
    Ok(AnalyzedProgram {
        program,
        env: report.env,
        root: report.root,
    })
}
