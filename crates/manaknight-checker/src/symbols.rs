//! Scoped symbol table with shadow prohibition
//!
//! Scopes form a parent chain: global, module, function, block, lambda
//! body, match arm. Declaring a name that already exists in the current
//! scope or any enclosing scope is rejected; resolution walks upward.

use crate::ResolvedType;
use manaknight_ast::Span;

/// A symbol definition
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: ResolvedType,
    /// Generic symbols (prelude helpers) are freshened at each reference
    pub generic: bool,
    pub span: Span,
}

/// Kind of symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Type,
    Constructor,
    Effect,
    Module,
}

/// A scope in the chain, with an optional name for diagnostics.
#[derive(Debug)]
struct Scope {
    name: Option<String>,
    symbols: Vec<Symbol>,
}

/// Symbol table mapping names to their definitions.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    /// Create a table with the global scope already open.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                name: Some("global".to_string()),
                symbols: Vec::new(),
            }],
        }
    }

    /// Enter a new child scope.
    pub fn enter_scope(&mut self, name: Option<String>) {
        self.scopes.push(Scope {
            name,
            symbols: Vec::new(),
        });
    }

    /// Exit the current scope, invalidating its symbols.
    pub fn exit_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot exit the global scope");
        self.scopes.pop();
    }

    /// Define a new symbol in the current scope.
    ///
    /// Fails with the span of the previous definition when the name is
    /// already present in this scope or any enclosing one (shadow
    /// prohibition).
    pub fn define(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        ty: ResolvedType,
        span: Span,
    ) -> Result<(), Span> {
        let name = name.into();
        if let Some(existing) = self.lookup(&name) {
            return Err(existing.span);
        }
        self.scopes
            .last_mut()
            .expect("at least the global scope exists")
            .symbols
            .push(Symbol {
                name,
                kind,
                ty,
                generic: false,
                span,
            });
        Ok(())
    }

    /// Define a generic symbol (freshened at each reference).
    pub fn define_generic(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        ty: ResolvedType,
        span: Span,
    ) -> Result<(), Span> {
        self.define(name, kind, ty, span)?;
        if let Some(symbol) = self
            .scopes
            .last_mut()
            .and_then(|s| s.symbols.last_mut())
        {
            symbol.generic = true;
        }
        Ok(())
    }

    /// Look up a symbol, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(symbol) = scope.symbols.iter().find(|s| s.name == name) {
                return Some(symbol);
            }
        }
        None
    }

    /// Name of the innermost named scope, for diagnostics.
    pub fn current_scope_name(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.name.as_deref())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::dummy()
    }

    #[test]
    fn define_and_lookup() {
        let mut table = SymbolTable::new();
        table
            .define("x", SymbolKind::Variable, ResolvedType::Int, span())
            .unwrap();
        let sym = table.lookup("x").unwrap();
        assert_eq!(sym.ty, ResolvedType::Int);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        table
            .define("x", SymbolKind::Variable, ResolvedType::Int, span())
            .unwrap();
        assert!(table
            .define("x", SymbolKind::Variable, ResolvedType::Bool, span())
            .is_err());
    }

    #[test]
    fn shadowing_in_nested_scope_is_rejected() {
        let mut table = SymbolTable::new();
        table
            .define("x", SymbolKind::Variable, ResolvedType::Int, span())
            .unwrap();
        table.enter_scope(Some("inner".to_string()));
        assert!(table
            .define("x", SymbolKind::Variable, ResolvedType::Int, span())
            .is_err());
    }

    #[test]
    fn sibling_scopes_may_reuse_names() {
        let mut table = SymbolTable::new();
        table.enter_scope(None);
        table
            .define("x", SymbolKind::Variable, ResolvedType::Int, span())
            .unwrap();
        table.exit_scope();
        table.enter_scope(None);
        assert!(table
            .define("x", SymbolKind::Variable, ResolvedType::Int, span())
            .is_ok());
    }

    #[test]
    fn lookup_walks_upward() {
        let mut table = SymbolTable::new();
        table
            .define("outer", SymbolKind::Variable, ResolvedType::Bool, span())
            .unwrap();
        table.enter_scope(None);
        assert!(table.lookup("outer").is_some());
        assert!(table.lookup("missing").is_none());
    }
}
