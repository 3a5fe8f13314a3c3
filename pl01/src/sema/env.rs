use std::collections::HashMap;

use tracing::trace;

/// Classification of an identifier's role, and of an analyzed construct's
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Error,
    Const,
    Var,
    Proc,
    Func,
    /// A function's own name inside its body: assignable (sets the return
    /// value) and callable (recursion).
    Ret,
    Void,
}

impl SymbolKind {
    pub fn is_value(self) -> bool {
        matches!(self, SymbolKind::Const | SymbolKind::Var)
    }

    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Func | SymbolKind::Ret)
    }
}

/// Handle of a scope inside an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// Argument count for `Func`/`Ret`, zero otherwise.
    pub arity: usize,
}

impl Symbol {
    pub fn new(kind: SymbolKind) -> Self {
        Self { kind, arity: 0 }
    }

    pub fn callable(kind: SymbolKind, arity: usize) -> Self {
        Self { kind, arity }
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

/// Arena of nested scopes. Scopes refer to their parent by handle, and are
/// never removed, so handles stay valid for the arena's lifetime.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            symbols: HashMap::new(),
        });
        trace!(scope = id.0, parent = ?parent.map(|p| p.0), "new scope");
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn is_root(&self, scope: ScopeId) -> bool {
        self.parent(scope).is_none()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Adds `name` to `scope`. Returns the existing symbol if the name is
    /// already defined in that same scope.
    pub fn insert(&mut self, scope: ScopeId, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        let symbols = &mut self.scopes[scope.0].symbols;
        if let Some(existing) = symbols.get(name) {
            return Err(*existing);
        }
        trace!(scope = scope.0, name, kind = ?symbol.kind, "insert symbol");
        symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Looks `name` up in `scope` only.
    pub fn get_local(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        self.scopes[scope.0].symbols.get(name).copied()
    }

    /// Looks `name` up in `scope`, then in each enclosing scope.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let found = self.get_local(id, name);
            if found.is_some() {
                return found;
            }
            current = self.parent(id);
        }
        None
    }
}
