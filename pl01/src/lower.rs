//! Second walk over an analyzed tree, driving an [`IrBuilder`].
//!
//! Sub-trees whose evaluation point the builder decides (declaration
//! sections, routine bodies, branches, loop conditions and bodies) are
//! handed over as [`Lazy`] thunks. A thunk only borrows the tree; the
//! builder passes itself back in when it forces one.

use tracing::debug;

use crate::ir::ast::{
    BinaryOp, Block, Call, Decls, Expr, ExprKind, LoopControl, Routine, Stmt, StmtKind,
};
use crate::sema::AnalyzedProgram;
use crate::sema::env::SymbolKind;

/// A deferred computation that needs a builder to run.
pub struct Lazy<'a, B: ?Sized, T> {
    run: Box<dyn FnOnce(&mut B) -> T + 'a>,
}

impl<'a, B: ?Sized, T> Lazy<'a, B, T> {
    pub fn new(run: impl FnOnce(&mut B) -> T + 'a) -> Self {
        Self { run: Box::new(run) }
    }

    pub fn force(self, builder: &mut B) -> T {
        (self.run)(builder)
    }
}

/// Thunk for a statement-like sub-tree.
pub type StmtThunk<'a, B> = Lazy<'a, B, Option<<B as IrBuilder>::Value>>;
/// Thunk for an expression.
pub type ExprThunk<'a, B> = Lazy<'a, B, <B as IrBuilder>::Value>;

/// Code generation backend. Every method corresponds to one construct and
/// may return an opaque value that lowering threads into later calls.
pub trait IrBuilder {
    type Value;

    /// `routines` lowers every nested procedure and function in order.
    fn block(
        &mut self,
        consts: Option<StmtThunk<'_, Self>>,
        vars: Option<StmtThunk<'_, Self>>,
        routines: StmtThunk<'_, Self>,
        body: Option<StmtThunk<'_, Self>>,
    ) -> Option<Self::Value>;

    fn constant(&mut self, name: &str, value: Self::Value);

    fn variable(&mut self, name: &str, init: Option<Self::Value>);

    fn procedure(&mut self, name: &str, block: StmtThunk<'_, Self>) -> Option<Self::Value>;

    fn function(
        &mut self,
        name: &str,
        params: &[String],
        block: StmtThunk<'_, Self>,
    ) -> Option<Self::Value>;

    /// `target` is `Var`, or `Ret` when storing a function's result.
    fn assign(&mut self, name: &str, target: SymbolKind, value: Self::Value) -> Option<Self::Value>;

    fn if_then(
        &mut self,
        cond: Self::Value,
        then_branch: Option<StmtThunk<'_, Self>>,
        else_branch: Option<StmtThunk<'_, Self>>,
    ) -> Option<Self::Value>;

    fn while_loop(
        &mut self,
        cond: ExprThunk<'_, Self>,
        body: Option<StmtThunk<'_, Self>>,
    ) -> Option<Self::Value>;

    fn inline_asm(&mut self, text: &str) -> Option<Self::Value>;

    fn control(&mut self, control: LoopControl) -> Option<Self::Value>;

    fn odd(&mut self, operand: Self::Value) -> Self::Value;

    fn binary(&mut self, op: BinaryOp, lhs: Self::Value, rhs: Self::Value) -> Self::Value;

    fn call(&mut self, name: &str, args: Vec<Self::Value>) -> Self::Value;

    /// `kind` is what the name resolved to: `Const`/`Var` load a value,
    /// `Func`/`Ret` call with no arguments, `Proc` runs the procedure.
    fn identifier(&mut self, name: &str, kind: SymbolKind) -> Option<Self::Value>;

    fn number(&mut self, value: i32) -> Self::Value;
}

pub fn lower_program<B: IrBuilder>(program: &AnalyzedProgram, builder: &mut B) -> Option<B::Value> {
    debug!("lowering program");
    lower_block(&program.program().block, builder)
}

pub fn lower_block<'a, B: IrBuilder>(block: &'a Block, builder: &mut B) -> Option<B::Value> {
    let consts = block
        .consts
        .as_ref()
        .map(|decls| Lazy::new(move |b: &mut B| lower_consts(decls, b)));
    let vars = block
        .vars
        .as_ref()
        .map(|decls| Lazy::new(move |b: &mut B| lower_vars(decls, b)));
    let routines = Lazy::new(move |b: &mut B| {
        for routine in &block.routines {
            lower_routine(routine, b);
        }
        None
    });
    let body = block
        .body
        .as_ref()
        .map(|stmt| Lazy::new(move |b: &mut B| lower_stmt(stmt, b)));
    builder.block(consts, vars, routines, body)
}

fn lower_consts<B: IrBuilder>(decls: &Decls, builder: &mut B) -> Option<B::Value> {
    for def in &decls.defs {
        if let Some(init) = &def.init {
            let value = lower_expr(init, builder);
            builder.constant(&def.name, value);
        }
    }
    None
}

fn lower_vars<B: IrBuilder>(decls: &Decls, builder: &mut B) -> Option<B::Value> {
    for def in &decls.defs {
        let init = def.init.as_ref().map(|expr| lower_expr(expr, builder));
        builder.variable(&def.name, init);
    }
    None
}

pub fn lower_routine<'a, B: IrBuilder>(routine: &'a Routine, builder: &mut B) -> Option<B::Value> {
    match routine {
        Routine::Procedure(procedure) => {
            debug!(name = %procedure.name, "lowering procedure");
            let block = &procedure.block;
            builder.procedure(&procedure.name, Lazy::new(move |b: &mut B| lower_block(block, b)))
        }
        Routine::Function(function) => {
            debug!(name = %function.name, "lowering function");
            let block = &function.block;
            builder.function(
                &function.name,
                &function.params,
                Lazy::new(move |b: &mut B| lower_block(block, b)),
            )
        }
    }
}

pub fn lower_stmt<'a, B: IrBuilder>(stmt: &'a Stmt, builder: &mut B) -> Option<B::Value> {
    match &stmt.kind {
        StmtKind::Assign { target, value } => {
            let value = lower_expr(value, builder);
            builder.assign(&target.name, target.binding, value)
        }
        StmtKind::Sequence(stmts) => {
            for stmt in stmts {
                lower_stmt(stmt, builder);
            }
            None
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = lower_expr(cond, builder);
            let then_branch = then_branch
                .as_deref()
                .map(|stmt| Lazy::new(move |b: &mut B| lower_stmt(stmt, b)));
            let else_branch = else_branch
                .as_deref()
                .map(|stmt| Lazy::new(move |b: &mut B| lower_stmt(stmt, b)));
            builder.if_then(cond, then_branch, else_branch)
        }
        StmtKind::While { cond, body } => {
            let cond = Lazy::new(move |b: &mut B| lower_expr(cond, b));
            let body = body
                .as_deref()
                .map(|stmt| Lazy::new(move |b: &mut B| lower_stmt(stmt, b)));
            builder.while_loop(cond, body)
        }
        StmtKind::Asm(text) => builder.inline_asm(text),
        StmtKind::Control(control) => builder.control(*control),
        StmtKind::Call(call) => {
            let value = lower_call(call, builder);
            Some(value)
        }
        StmtKind::Identifier(reference) => builder.identifier(&reference.name, reference.binding),
    }
}

fn lower_call<B: IrBuilder>(call: &Call, builder: &mut B) -> B::Value {
    let args = call.args.iter().map(|arg| lower_expr(arg, builder)).collect();
    builder.call(&call.callee.name, args)
}

/// Lowers an expression that analysis classified as a value.
pub fn lower_expr<B: IrBuilder>(expr: &Expr, builder: &mut B) -> B::Value {
    match &expr.kind {
        ExprKind::Odd(operand) => {
            let operand = lower_expr(operand, builder);
            builder.odd(operand)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = lower_expr(lhs, builder);
            let rhs = lower_expr(rhs, builder);
            builder.binary(*op, lhs, rhs)
        }
        ExprKind::Call(call) => lower_call(call, builder),
        ExprKind::Identifier(reference) => {
            match builder.identifier(&reference.name, reference.binding) {
                Some(value) => value,
                // Only a procedure yields nothing, and analysis rejects
                // procedures as operands.
                None => builder.number(0),
            }
        }
        ExprKind::Number(value) => builder.number(*value),
    }
}
