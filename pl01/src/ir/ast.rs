use crate::parser::lexer::Operator;
use crate::sema::env::{ScopeId, SymbolKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub block: Block,
}

/// `[consts] [vars] {procedure|function} statement`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub line: usize,
    pub consts: Option<Decls>,
    pub vars: Option<Decls>,
    pub routines: Vec<Routine>,
    pub body: Option<Stmt>,
    /// Scope created for this block, set by analysis.
    pub scope: Option<ScopeId>,
}

/// A `const` or `var` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Decls {
    pub line: usize,
    pub defs: Vec<Definition>,
    pub scope: Option<ScopeId>,
}

/// `id = expr`; `init` is always present in a const section.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub line: usize,
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Routine {
    Procedure(Procedure),
    Function(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub line: usize,
    pub name: String,
    pub block: Block,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub line: usize,
    pub name: String,
    pub params: Vec<String>,
    pub block: Block,
    /// Parameter scope holding the return slot and the parameters.
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// target := value
    Assign {
        target: Reference,
        value: Expr,
    },
    /// begin ... end
    Sequence(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Option<Box<Stmt>>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Option<Box<Stmt>>,
    },
    /// Raw text of an `asm begin ... end` block.
    Asm(String),
    Control(LoopControl),
    Call(Call),
    /// Bare identifier: procedure call or zero-argument function call.
    Identifier(Reference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub line: usize,
    pub kind: ExprKind,
    /// Result classification; `Error` until analyzed.
    pub class: SymbolKind,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Odd(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call(Call),
    Identifier(Reference),
    Number(i32),
}

/// A use of a named symbol. `binding` is the kind the name resolved to
/// during analysis (`Error` until then).
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub binding: SymbolKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Reference,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    NotEqual,
    Equal,
}

impl BinaryOp {
    pub fn from_operator(op: Operator) -> Option<Self> {
        let op = match op {
            Operator::Add => BinaryOp::Add,
            Operator::Sub => BinaryOp::Sub,
            Operator::Mul => BinaryOp::Mul,
            Operator::Div => BinaryOp::Div,
            Operator::Less => BinaryOp::Less,
            Operator::LessEqual => BinaryOp::LessEqual,
            Operator::Greater => BinaryOp::Greater,
            Operator::GreaterEqual => BinaryOp::GreaterEqual,
            Operator::NotEqual => BinaryOp::NotEqual,
            Operator::Equal => BinaryOp::Equal,
            Operator::Assign => return None,
        };
        Some(op)
    }

    pub fn is_relational(&self) -> bool {
        !matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: SymbolKind::Error,
        }
    }
}

impl Stmt {
    pub fn new(line: usize, kind: StmtKind) -> Self {
        Self { line, kind, scope: None }
    }
}

impl Expr {
    pub fn new(line: usize, kind: ExprKind) -> Self {
        Self {
            line,
            kind,
            class: SymbolKind::Error,
            scope: None,
        }
    }

    pub fn binary(line: usize, op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            line,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }
}

impl Routine {
    pub fn name(&self) -> &str {
        match self {
            Routine::Procedure(p) => &p.name,
            Routine::Function(f) => &f.name,
        }
    }
}
