//! Expression AST nodes

use crate::{Block, NodeId, Pattern, Span};
use serde::{Deserialize, Serialize};

/// An expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal value: `42`, `"hello"`, `true`, `()`
    Literal(Literal),

    /// Identifier: `x`, `user`
    Ident(String),

    /// Function call: `foo(a, b)`
    Call { callee: Box<Expr>, args: Vec<Expr> },

    /// Constructor application: `Some(x)`, `User(name: "A", age: 3)`, `None`
    Ctor { name: String, args: Vec<CtorArg> },

    /// Lambda: `fn (x: Int) => x + 1` (always pure)
    Lambda {
        params: Vec<LambdaParam>,
        body: Box<Expr>,
    },

    /// Unary operation: `-x`, `!b`
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation: `a + b`, `x == y`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// If expression: `if cond { ... } else { ... }`
    If {
        condition: Box<Expr>,
        then_branch: Block,
        else_branch: Block,
    },

    /// Match expression: `match x { Some(v) => v  None => 0 }`
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },

    /// Pipe: `a |> f`, equivalent to `f(a)`
    Pipe { left: Box<Expr>, right: Box<Expr> },

    /// Block expression: `{ let x = 1  x + 1 }`
    Block(Block),
}

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    String(String),
    Bool(bool),
    Unit,
}

/// An argument to a constructor application.
///
/// Record construction uses named arguments; union variant constructors
/// use positional arguments in declared field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtorArg {
    pub name: Option<String>,
    pub value: Expr,
    pub span: Span,
}

/// Lambda parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaParam {
    pub name: String,
    pub ty: crate::Type,
    pub span: Span,
}

/// A match arm: `pattern => expr`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

/// Unary operators; there is no unary `+`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }
}
