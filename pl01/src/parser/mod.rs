pub mod lexer;
pub mod parser;

use crate::error::CompileError;
use crate::ir::ast;

/// Scans and parses one compilation unit.
pub fn parse(source: &str) -> Result<ast::Program, CompileError> {
    let mut parser = parser::Parser::new(source);
    parser.parse_program()
}
