//! Statement and pattern AST nodes

use crate::{Expr, MatchArm, NodeId, Span, Type};
use serde::{Deserialize, Serialize};

/// A block: ordered statements plus an optional tail expression that is
/// the block's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Statement>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

/// A statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatementKind {
    /// Let binding: `let x = expr` (immutable, no reassignment exists)
    Let {
        name: String,
        ty: Option<Type>,
        value: Expr,
    },

    /// Expression statement: `log_info("hi")`
    Expr(Expr),

    /// If statement; `else` is mandatory in statement position too
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Block,
    },

    /// Match statement
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
    },
}

/// Pattern in a match arm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PatternKind {
    /// Constructor pattern: `Some(x)`, `None`
    Constructor { name: String, fields: Vec<Pattern> },

    /// Field binder inside a constructor pattern: `x`
    Binding(String),

    /// Wildcard: `_`
    Wildcard,
}

impl Pattern {
    /// The constructor name, if this is a constructor pattern.
    pub fn constructor_name(&self) -> Option<&str> {
        match &self.kind {
            PatternKind::Constructor { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.kind, PatternKind::Wildcard)
    }
}
