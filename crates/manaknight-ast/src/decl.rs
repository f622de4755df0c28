//! Declaration AST nodes (top-level items)

use crate::{Block, Span, Type};
use serde::{Deserialize, Serialize};

/// A top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclarationKind {
    /// Function declaration: `fn inc(x: Int) -> Int { x + 1 }`
    Function(FunctionDecl),

    /// Type declaration: record or tagged union
    Type(TypeDecl),

    /// Effect declaration: `effect time` (operations are host-provided)
    Effect(EffectDecl),

    /// Import declaration: `import auth.user as u`
    Import(ImportDecl),
}

/// Function declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    /// Declared effect set; empty means pure
    pub effects: Vec<EffectName>,
    pub body: Block,
    pub span: Span,
}

/// Function or route parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// A reference to an effect in a `uses { ... }` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectName {
    pub name: String,
    pub span: Span,
}

/// Type declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub body: TypeBody,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeBody {
    /// Record: `type User = { name: String, age: Int }`
    Record(Vec<FieldDecl>),
    /// Tagged union: `type Shape = Circle(radius: Int) | Square(side: Int)`
    Union(Vec<VariantDecl>),
}

/// Named field of a record or variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// Constructor variant of a tagged union
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

/// Effect declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDecl {
    pub name: String,
    pub span: Span,
}

/// Import declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Dotted module path: `auth.user`
    pub path: String,
    pub alias: Option<String>,
    pub span: Span,
}

/// An API route: `api GET "/u/:id" (id: String) -> String { ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRoute {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub effects: Vec<EffectName>,
    pub body: Block,
    /// Source file the route was parsed from.
    pub file: String,
    pub span: Span,
}

/// Accepted HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn from_str(s: &str) -> Option<HttpMethod> {
        match s {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }
}
