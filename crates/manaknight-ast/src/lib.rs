//! Manaknight AST - Core types for the abstract syntax tree
//!
//! This crate defines all AST node types, spans for source locations,
//! stable node identities, and the canonical printer used by the
//! formatter. The tree is built once by the parser and never mutated;
//! analyzers attach their results to side tables keyed by `NodeId`.

mod decl;
mod expr;
mod printer;
mod span;
mod stmt;
mod types;

pub use decl::*;
pub use expr::*;
pub use printer::*;
pub use span::*;
pub use stmt::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// A complete Manaknight program: the transitively resolved modules plus
/// the top-level API routes, in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub modules: Vec<Module>,
    pub routes: Vec<ApiRoute>,
    pub span: Span,
}

/// A module: qualified dotted name, declarations, explicit export list.
/// Functions default to private; only names in `exports` are visible to
/// importers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub decls: Vec<Declaration>,
    pub exports: Vec<String>,
    /// True for the synthesized module that holds a file's loose
    /// declarations; the printer omits the `module` wrapper for it.
    pub implicit: bool,
    /// Source file this module was parsed from; spans inside the module
    /// are byte offsets into that file.
    pub file: String,
    pub span: Span,
}

impl Module {
    /// Iterate the function declarations of this module in source order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|d| match &d.kind {
            DeclarationKind::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Iterate the type declarations of this module in source order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.iter().filter_map(|d| match &d.kind {
            DeclarationKind::Type(t) => Some(t),
            _ => None,
        })
    }
}
