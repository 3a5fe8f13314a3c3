pub mod text;

use crate::error::CompileError;
use crate::sema::AnalyzedProgram;

pub trait Backend {
    fn compile(&mut self, program: &AnalyzedProgram) -> Result<Vec<u8>, CompileError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Text,
    // Llvm,
}

impl BackendType {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Text,
            // Self::Llvm,
        ]
    }

    pub fn from_name(name: &str) -> Result<Self, CompileError> {
        Self::all()
            .into_iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| CompileError::UnknownTarget {
                name: name.to_string(),
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Text => "Readable SSA-style IR listing",
        }
    }

    /// Default output file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "ll",
        }
    }

    pub fn create(&self) -> Box<dyn Backend> {
        match self {
            Self::Text => Box::new(text::TextBackend::new()),
        }
    }
}
