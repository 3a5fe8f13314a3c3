use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Syntax error at line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("Lexer error at line {line}: {message}")]
    LexerError { line: usize, message: String },

    #[error("Semantic analysis failed with {count} error(s)")]
    SemanticError { count: usize },

    #[error("Compilation failed with {count} error(s)")]
    Failed { count: usize },

    #[error("Unknown target: {name}")]
    UnknownTarget { name: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Analyzer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexer => write!(f, "lexer"),
            Stage::Parser => write!(f, "parser"),
            Stage::Analyzer => write!(f, "analyzer"),
        }
    }
}

/// One counted error, rendered as
/// `<stage> (line <n>[, id: <identifier>]): error: <message>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} (line {line}{}): error: {message}", ident_suffix(.ident))]
pub struct Diagnostic {
    pub stage: Stage,
    pub line: usize,
    pub ident: Option<String>,
    pub message: String,
}

fn ident_suffix(ident: &Option<String>) -> String {
    match ident {
        Some(id) => format!(", id: {}", id),
        None => String::new(),
    }
}

impl Diagnostic {
    pub fn new(stage: Stage, line: usize, message: impl Into<String>) -> Self {
        Self {
            stage,
            line,
            ident: None,
            message: message.into(),
        }
    }

    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = Some(ident.into());
        self
    }

    /// Writes the diagnostic line to stderr.
    pub fn emit(&self) {
        eprintln!("{}", self);
    }
}
