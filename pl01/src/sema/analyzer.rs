use tracing::debug;

use crate::error::{Diagnostic, Stage};
use crate::ir::ast::{
    Block, Call, Decls, Expr, ExprKind, Function, Procedure, Reference, Routine, Stmt, StmtKind,
};
use super::env::{Environment, ScopeId, Symbol, SymbolKind};

/// Mutable state threaded through one analysis run.
pub struct Context<'e> {
    env: &'e mut Environment,
    scope: ScopeId,
    loop_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'e> Context<'e> {
    pub fn new(env: &'e mut Environment, scope: ScopeId) -> Self {
        Self {
            env,
            scope,
            loop_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn loop_depth(&self) -> usize {
        self.loop_depth
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn report(&mut self, diag: Diagnostic) -> SymbolKind {
        diag.emit();
        self.diagnostics.push(diag);
        SymbolKind::Error
    }

    fn error(&mut self, line: usize, message: &str) -> SymbolKind {
        self.report(Diagnostic::new(Stage::Analyzer, line, message))
    }

    fn error_at(&mut self, line: usize, id: &str, message: &str) -> SymbolKind {
        self.report(Diagnostic::new(Stage::Analyzer, line, message).with_ident(id))
    }

    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.env.lookup(self.scope, name)
    }

    /// Binds `name` in `scope`; reports a redefinition if it is taken there.
    fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol, line: usize) -> bool {
        if self.env.insert(scope, name, symbol).is_err() {
            self.error_at(line, name, "identifier has already been defined");
            return false;
        }
        true
    }
}

fn status(ok: bool) -> SymbolKind {
    if ok { SymbolKind::Void } else { SymbolKind::Error }
}

/// Analyzes a nested block in a fresh child of the current scope.
pub fn analyze_block(block: &mut Block, cx: &mut Context) -> SymbolKind {
    let scope = cx.env.push_scope(Some(cx.scope));
    analyze_block_in(block, scope, cx)
}

/// Analyzes `block` with `scope` as its own scope. Every section is visited
/// even after an error so all diagnostics are collected.
pub fn analyze_block_in(block: &mut Block, scope: ScopeId, cx: &mut Context) -> SymbolKind {
    let outer = std::mem::replace(&mut cx.scope, scope);
    block.scope = Some(scope);

    let mut ok = true;
    if let Some(consts) = &mut block.consts {
        ok &= analyze_decls(consts, SymbolKind::Const, cx) != SymbolKind::Error;
    }
    if let Some(vars) = &mut block.vars {
        ok &= analyze_decls(vars, SymbolKind::Var, cx) != SymbolKind::Error;
    }
    for routine in &mut block.routines {
        ok &= analyze_routine(routine, cx) != SymbolKind::Error;
    }
    if let Some(body) = &mut block.body {
        ok &= analyze_stmt(body, cx) != SymbolKind::Error;
    }

    cx.scope = outer;
    status(ok)
}

/// `kind` is `Const` for a const section and `Var` for a var section. A name
/// whose initializer is rejected is still bound.
pub fn analyze_decls(decls: &mut Decls, kind: SymbolKind, cx: &mut Context) -> SymbolKind {
    decls.scope = Some(cx.scope);
    let mut ok = true;

    for def in &mut decls.defs {
        let init = def.init.as_mut().map(|expr| analyze_expr(expr, cx));
        match init {
            Some(SymbolKind::Error) => ok = false,
            Some(init) if kind == SymbolKind::Const && init != SymbolKind::Const => {
                cx.error_at(def.line, &def.name, "initialize with non-constant value");
                ok = false;
            }
            Some(init) if !init.is_value() => {
                cx.error_at(def.line, &def.name, "invalid initial value");
                ok = false;
            }
            None if kind == SymbolKind::Const => {
                cx.error_at(def.line, &def.name, "constant requires an initializer");
                ok = false;
            }
            _ => {}
        }
        let scope = cx.scope;
        ok &= cx.declare(scope, &def.name, Symbol::new(kind), def.line);
    }
    status(ok)
}

pub fn analyze_routine(routine: &mut Routine, cx: &mut Context) -> SymbolKind {
    match routine {
        Routine::Procedure(procedure) => analyze_procedure(procedure, cx),
        Routine::Function(function) => analyze_function(function, cx),
    }
}

fn analyze_procedure(procedure: &mut Procedure, cx: &mut Context) -> SymbolKind {
    debug!(name = %procedure.name, line = procedure.line, "analyzing procedure");
    procedure.scope = Some(cx.scope);
    let scope = cx.scope;
    let mut ok = cx.declare(scope, &procedure.name, Symbol::new(SymbolKind::Proc), procedure.line);
    ok &= analyze_block(&mut procedure.block, cx) != SymbolKind::Error;
    status(ok)
}

/// The function's own name is bound as `Ret` in a parameter scope of its own
/// (so the body can assign to it and recurse), the parameters as `Var` in
/// that scope, and the name as `Func` in the enclosing scope.
fn analyze_function(function: &mut Function, cx: &mut Context) -> SymbolKind {
    debug!(name = %function.name, line = function.line, "analyzing function");
    let outer = cx.scope;
    let arity = function.params.len();
    let params = cx.env.push_scope(Some(outer));
    function.scope = Some(params);

    let line = function.line;
    let mut ok = cx.declare(params, &function.name, Symbol::callable(SymbolKind::Ret, arity), line);
    for param in &function.params {
        ok &= cx.declare(params, param, Symbol::new(SymbolKind::Var), line);
    }
    ok &= cx.declare(outer, &function.name, Symbol::callable(SymbolKind::Func, arity), line);

    cx.scope = params;
    ok &= analyze_block(&mut function.block, cx) != SymbolKind::Error;
    cx.scope = outer;
    status(ok)
}

/// Statements classify as `Void`, or `Error`.
pub fn analyze_stmt(stmt: &mut Stmt, cx: &mut Context) -> SymbolKind {
    stmt.scope = Some(cx.scope);
    let line = stmt.line;

    match &mut stmt.kind {
        StmtKind::Assign { target, value } => {
            let value = analyze_expr(value, cx);
            let Some(symbol) = cx.lookup(&target.name) else {
                return cx.error_at(line, &target.name, "identifier has not been defined");
            };
            target.binding = symbol.kind;
            if !matches!(symbol.kind, SymbolKind::Var | SymbolKind::Ret) {
                return cx.error_at(line, &target.name, "try to assign a value to a non-variable");
            }
            if value == SymbolKind::Error {
                return SymbolKind::Error;
            }
            if !value.is_value() {
                return cx.error_at(line, &target.name, "invalid assignment");
            }
            SymbolKind::Void
        }
        StmtKind::Sequence(stmts) => {
            let mut ok = true;
            for stmt in stmts {
                ok &= analyze_stmt(stmt, cx) != SymbolKind::Error;
            }
            status(ok)
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let mut ok = analyze_expr(cond, cx) != SymbolKind::Error;
            if let Some(branch) = then_branch {
                ok &= analyze_stmt(branch, cx) != SymbolKind::Error;
            }
            if let Some(branch) = else_branch {
                ok &= analyze_stmt(branch, cx) != SymbolKind::Error;
            }
            status(ok)
        }
        StmtKind::While { cond, body } => {
            let mut ok = analyze_expr(cond, cx) != SymbolKind::Error;
            cx.loop_depth += 1;
            if let Some(body) = body {
                ok &= analyze_stmt(body, cx) != SymbolKind::Error;
            }
            cx.loop_depth -= 1;
            status(ok)
        }
        StmtKind::Asm(_) => SymbolKind::Void,
        StmtKind::Control(_) => {
            if cx.loop_depth == 0 {
                return cx.error(line, "try to use break/continue outside 'while' loop");
            }
            SymbolKind::Void
        }
        StmtKind::Call(call) => status(analyze_call(call, line, cx) != SymbolKind::Error),
        StmtKind::Identifier(reference) => {
            status(analyze_identifier(reference, line, cx) != SymbolKind::Error)
        }
    }
}

/// Expressions classify as `Const`, `Var`, `Void` (bare procedure name) or
/// `Error`. The result is also stored in `expr.class`.
pub fn analyze_expr(expr: &mut Expr, cx: &mut Context) -> SymbolKind {
    expr.scope = Some(cx.scope);
    let line = expr.line;

    let class = match &mut expr.kind {
        ExprKind::Odd(operand) => match analyze_expr(operand, cx) {
            SymbolKind::Error => SymbolKind::Error,
            kind if kind.is_value() => kind,
            _ => cx.error(line, "invalid operand"),
        },
        ExprKind::Binary { lhs, rhs, .. } => {
            let lhs = analyze_expr(lhs, cx);
            let rhs = analyze_expr(rhs, cx);
            if lhs == SymbolKind::Error || rhs == SymbolKind::Error {
                SymbolKind::Error
            } else if !lhs.is_value() {
                cx.error(line, "invalid lhs")
            } else if !rhs.is_value() {
                cx.error(line, "invalid rhs")
            } else if lhs == SymbolKind::Const && rhs == SymbolKind::Const {
                SymbolKind::Const
            } else {
                SymbolKind::Var
            }
        }
        ExprKind::Call(call) => analyze_call(call, line, cx),
        ExprKind::Identifier(reference) => analyze_identifier(reference, line, cx),
        ExprKind::Number(_) => SymbolKind::Const,
    };

    expr.class = class;
    class
}

fn analyze_call(call: &mut Call, line: usize, cx: &mut Context) -> SymbolKind {
    let mut ok = true;
    for arg in &mut call.args {
        match analyze_expr(arg, cx) {
            SymbolKind::Error => ok = false,
            kind if kind.is_value() => {}
            _ => {
                cx.error_at(line, &call.callee.name, "invalid argument");
                ok = false;
            }
        }
    }

    let name = &call.callee.name;
    let Some(symbol) = cx.lookup(name) else {
        return cx.error_at(line, name, "identifier has not been defined");
    };
    call.callee.binding = symbol.kind;
    let name = &call.callee.name;
    if !symbol.kind.is_callable() {
        return cx.error_at(line, name, "try to call a non-function");
    }
    if symbol.arity != call.args.len() {
        return cx.error_at(line, name, "argument count mismatch");
    }
    if ok { SymbolKind::Var } else { SymbolKind::Error }
}

/// A bare name: procedures run, functions are called with no arguments,
/// constants and variables are read.
fn analyze_identifier(reference: &mut Reference, line: usize, cx: &mut Context) -> SymbolKind {
    let Some(symbol) = cx.lookup(&reference.name) else {
        return cx.error_at(line, &reference.name, "identifier has not been defined");
    };
    reference.binding = symbol.kind;
    match symbol.kind {
        SymbolKind::Proc => SymbolKind::Void,
        SymbolKind::Func | SymbolKind::Ret if symbol.arity != 0 => {
            cx.error_at(line, &reference.name, "argument count mismatch")
        }
        SymbolKind::Func | SymbolKind::Ret => SymbolKind::Var,
        SymbolKind::Const | SymbolKind::Var => symbol.kind,
        SymbolKind::Error | SymbolKind::Void => {
            cx.error_at(line, &reference.name, "invalid identifier")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{BinaryOp, LoopControl};

    fn number(value: i32) -> Expr {
        Expr::new(1, ExprKind::Number(value))
    }

    fn ident(name: &str) -> Expr {
        Expr::new(1, ExprKind::Identifier(Reference::new(name)))
    }

    fn root_with(symbols: &[(&str, Symbol)]) -> (Environment, ScopeId) {
        let mut env = Environment::new();
        let root = env.push_scope(None);
        for (name, symbol) in symbols {
            env.insert(root, name, *symbol).unwrap();
        }
        (env, root)
    }

    #[test]
    fn constant_folding_classification() {
        let (mut env, root) = root_with(&[
            ("c", Symbol::new(SymbolKind::Const)),
            ("v", Symbol::new(SymbolKind::Var)),
        ]);
        let mut cx = Context::new(&mut env, root);

        let mut both_const = Expr::binary(1, BinaryOp::Mul, ident("c"), number(2));
        assert_eq!(analyze_expr(&mut both_const, &mut cx), SymbolKind::Const);

        let mut mixed = Expr::binary(1, BinaryOp::Add, ident("c"), ident("v"));
        assert_eq!(analyze_expr(&mut mixed, &mut cx), SymbolKind::Var);
        assert_eq!(mixed.class, SymbolKind::Var);
        assert_eq!(mixed.scope, Some(root));
        assert_eq!(cx.error_count(), 0);
    }

    #[test]
    fn odd_passes_operand_class_through() {
        let (mut env, root) = root_with(&[("v", Symbol::new(SymbolKind::Var))]);
        let mut cx = Context::new(&mut env, root);
        let mut odd_const = Expr::new(1, ExprKind::Odd(Box::new(number(3))));
        let mut odd_var = Expr::new(1, ExprKind::Odd(Box::new(ident("v"))));
        assert_eq!(analyze_expr(&mut odd_const, &mut cx), SymbolKind::Const);
        assert_eq!(analyze_expr(&mut odd_var, &mut cx), SymbolKind::Var);
    }

    #[test]
    fn procedure_is_not_an_operand() {
        let (mut env, root) = root_with(&[("p", Symbol::new(SymbolKind::Proc))]);
        let mut cx = Context::new(&mut env, root);
        let mut expr = Expr::binary(1, BinaryOp::Add, ident("p"), number(1));
        assert_eq!(analyze_expr(&mut expr, &mut cx), SymbolKind::Error);
        assert_eq!(cx.diagnostics()[0].message, "invalid lhs");
    }

    #[test]
    fn undefined_operand_does_not_cascade() {
        let (mut env, root) = root_with(&[]);
        let mut cx = Context::new(&mut env, root);
        let mut expr = Expr::binary(1, BinaryOp::Add, ident("nope"), number(1));
        assert_eq!(analyze_expr(&mut expr, &mut cx), SymbolKind::Error);
        assert_eq!(cx.error_count(), 1);
        assert_eq!(cx.diagnostics()[0].ident.as_deref(), Some("nope"));
    }

    #[test]
    fn control_depends_on_loop_depth() {
        let (mut env, root) = root_with(&[]);
        let mut cx = Context::new(&mut env, root);

        let mut stray = Stmt::new(3, StmtKind::Control(LoopControl::Break));
        assert_eq!(analyze_stmt(&mut stray, &mut cx), SymbolKind::Error);

        let body = Stmt::new(4, StmtKind::Control(LoopControl::Continue));
        let cond = Expr::binary(4, BinaryOp::Less, number(0), number(1));
        let mut looped = Stmt::new(
            4,
            StmtKind::While {
                cond,
                body: Some(Box::new(body)),
            },
        );
        assert_eq!(analyze_stmt(&mut looped, &mut cx), SymbolKind::Void);
        assert_eq!(cx.loop_depth(), 0);
        assert_eq!(cx.error_count(), 1);
    }

    #[test]
    fn zero_arity_function_used_bare_is_a_call() {
        let (mut env, root) = root_with(&[
            ("now", Symbol::callable(SymbolKind::Func, 0)),
            ("twice", Symbol::callable(SymbolKind::Func, 1)),
        ]);
        let mut cx = Context::new(&mut env, root);
        assert_eq!(analyze_expr(&mut ident("now"), &mut cx), SymbolKind::Var);
        assert_eq!(analyze_expr(&mut ident("twice"), &mut cx), SymbolKind::Error);
        assert_eq!(cx.diagnostics()[0].message, "argument count mismatch");
    }
}
