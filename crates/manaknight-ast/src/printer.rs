//! Canonical text printer for the Manaknight AST
//!
//! Re-emits source with canonical whitespace: four-space indentation,
//! one blank line between top-level items, trailing newline. Purely
//! cosmetic: re-parsing the output yields the identical tree (modulo
//! spans), and formatting is idempotent.

use crate::{
    ApiRoute, Block, CtorArg, Declaration, DeclarationKind, Expr, ExprKind, FunctionDecl, Literal,
    MatchArm, Module, Parameter, Pattern, PatternKind, Program, Statement, StatementKind, Type,
    TypeBody, TypeDecl, TypeKind, UnaryOp,
};

/// Trait for converting AST nodes to canonical `.mk` text.
pub trait ToMk {
    /// Convert to canonical source with the given indentation level.
    fn to_mk(&self, indent: usize) -> String;
}

/// Four spaces per level.
fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}

/// Escape a string literal body for output.
fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            _ => result.push(c),
        }
    }
    result
}

// Binding powers, tightest to loosest. A child is parenthesized when its
// own level is below what the context requires.
const PREC_ATOM: u8 = 8;
const PREC_UNARY: u8 = 7;
const PREC_MUL: u8 = 6;
const PREC_ADD: u8 = 5;
const PREC_CMP: u8 = 4;
const PREC_LOGIC: u8 = 3;
const PREC_PIPE: u8 = 2;
const PREC_LOOSE: u8 = 1;

fn expr_prec(e: &Expr) -> u8 {
    match &e.kind {
        ExprKind::Literal(_)
        | ExprKind::Ident(_)
        | ExprKind::Call { .. }
        | ExprKind::Ctor { .. }
        | ExprKind::Block(_) => PREC_ATOM,
        ExprKind::Unary { .. } => PREC_UNARY,
        ExprKind::Binary { op, .. } => {
            if op.is_arithmetic() {
                match op.symbol() {
                    "*" | "/" | "%" => PREC_MUL,
                    _ => PREC_ADD,
                }
            } else if op.is_comparison() || op.is_equality() {
                PREC_CMP
            } else {
                PREC_LOGIC
            }
        }
        ExprKind::Pipe { .. } => PREC_PIPE,
        ExprKind::Lambda { .. } | ExprKind::If { .. } | ExprKind::Match { .. } => PREC_LOOSE,
    }
}

fn print_expr(e: &Expr, min_prec: u8, indent: usize) -> String {
    let text = print_expr_inner(e, indent);
    if expr_prec(e) < min_prec {
        format!("({})", text)
    } else {
        text
    }
}

fn print_expr_inner(e: &Expr, indent: usize) -> String {
    match &e.kind {
        ExprKind::Literal(lit) => lit.to_mk(0),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Call { callee, args } => {
            let args_str: Vec<String> = args.iter().map(|a| print_expr(a, PREC_LOOSE, indent)).collect();
            format!(
                "{}({})",
                print_expr(callee, PREC_ATOM, indent),
                args_str.join(", ")
            )
        }
        ExprKind::Ctor { name, args } => {
            if args.is_empty() {
                name.clone()
            } else {
                let args_str: Vec<String> = args.iter().map(|a| a.to_mk(indent)).collect();
                format!("{}({})", name, args_str.join(", "))
            }
        }
        ExprKind::Lambda { params, body } => {
            let params_str: Vec<String> = params
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty.to_mk(0)))
                .collect();
            format!(
                "fn ({}) => {}",
                params_str.join(", "),
                print_expr(body, PREC_LOOSE, indent)
            )
        }
        ExprKind::Unary { op, operand } => {
            let sym = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("{}{}", sym, print_expr(operand, PREC_UNARY, indent))
        }
        ExprKind::Binary { op, left, right } => {
            let level = expr_prec(e);
            // Comparisons are non-associative: both sides must bind tighter.
            let (lmin, rmin) = if op.is_comparison() || op.is_equality() {
                (level + 1, level + 1)
            } else {
                (level, level + 1)
            };
            format!(
                "{} {} {}",
                print_expr(left, lmin, indent),
                op.symbol(),
                print_expr(right, rmin, indent)
            )
        }
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            format!(
                "if {} {} else {}",
                print_expr(condition, PREC_PIPE, indent),
                then_branch.to_mk(indent),
                else_branch.to_mk(indent)
            )
        }
        ExprKind::Match { scrutinee, arms } => print_match(scrutinee, arms, indent),
        ExprKind::Pipe { left, right } => {
            format!(
                "{} |> {}",
                print_expr(left, PREC_PIPE, indent),
                print_expr(right, PREC_LOGIC, indent)
            )
        }
        ExprKind::Block(block) => block.to_mk(indent),
    }
}

fn print_match(scrutinee: &Expr, arms: &[MatchArm], indent: usize) -> String {
    let ind = indent_str(indent);
    let mut lines = vec![format!(
        "match {} {{",
        print_expr(scrutinee, PREC_PIPE, indent)
    )];
    for arm in arms {
        lines.push(format!("{}{}", indent_str(indent + 1), arm.to_mk(indent + 1)));
    }
    lines.push(format!("{}}}", ind));
    lines.join("\n")
}

impl ToMk for Literal {
    fn to_mk(&self, _indent: usize) -> String {
        match self {
            Literal::Int(n) => n.to_string(),
            Literal::String(s) => format!("\"{}\"", escape_string(s)),
            Literal::Bool(b) => b.to_string(),
            Literal::Unit => "()".to_string(),
        }
    }
}

impl ToMk for Type {
    fn to_mk(&self, _indent: usize) -> String {
        match &self.kind {
            TypeKind::Primitive(p) => p.name().to_string(),
            TypeKind::Named(name) => name.clone(),
            TypeKind::Generic { name, args } => {
                let args_str: Vec<String> = args.iter().map(|t| t.to_mk(0)).collect();
                format!("{}<{}>", name, args_str.join(", "))
            }
            TypeKind::Function {
                params,
                ret,
                effects,
            } => {
                let params_str: Vec<String> = params.iter().map(|t| t.to_mk(0)).collect();
                let base = format!("({}) -> {}", params_str.join(", "), ret.to_mk(0));
                if effects.is_empty() {
                    base
                } else {
                    format!("{} uses {{ {} }}", base, effects.join(", "))
                }
            }
        }
    }
}

impl ToMk for CtorArg {
    fn to_mk(&self, indent: usize) -> String {
        match &self.name {
            Some(name) => format!("{}: {}", name, print_expr(&self.value, PREC_LOOSE, indent)),
            None => print_expr(&self.value, PREC_LOOSE, indent),
        }
    }
}

impl ToMk for Pattern {
    fn to_mk(&self, _indent: usize) -> String {
        match &self.kind {
            PatternKind::Constructor { name, fields } => {
                if fields.is_empty() {
                    name.clone()
                } else {
                    let fields_str: Vec<String> = fields.iter().map(|p| p.to_mk(0)).collect();
                    format!("{}({})", name, fields_str.join(", "))
                }
            }
            PatternKind::Binding(name) => name.clone(),
            PatternKind::Wildcard => "_".to_string(),
        }
    }
}

impl ToMk for MatchArm {
    fn to_mk(&self, indent: usize) -> String {
        format!(
            "{} => {}",
            self.pattern.to_mk(0),
            print_expr(&self.body, PREC_LOOSE, indent)
        )
    }
}

impl ToMk for Block {
    fn to_mk(&self, indent: usize) -> String {
        let ind = indent_str(indent);
        if self.statements.is_empty() && self.tail.is_none() {
            return "{}".to_string();
        }
        let mut lines = vec!["{".to_string()];
        for stmt in &self.statements {
            lines.push(format!("{}{}", indent_str(indent + 1), stmt.to_mk(indent + 1)));
        }
        if let Some(tail) = &self.tail {
            lines.push(format!(
                "{}{}",
                indent_str(indent + 1),
                print_expr(tail, PREC_LOOSE, indent + 1)
            ));
        }
        lines.push(format!("{}}}", ind));
        lines.join("\n")
    }
}

impl ToMk for Statement {
    fn to_mk(&self, indent: usize) -> String {
        match &self.kind {
            StatementKind::Let { name, ty, value } => match ty {
                Some(t) => format!(
                    "let {}: {} = {}",
                    name,
                    t.to_mk(0),
                    print_expr(value, PREC_LOOSE, indent)
                ),
                None => format!("let {} = {}", name, print_expr(value, PREC_LOOSE, indent)),
            },
            StatementKind::Expr(e) => print_expr(e, PREC_LOOSE, indent),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "if {} {} else {}",
                print_expr(condition, PREC_PIPE, indent),
                then_branch.to_mk(indent),
                else_branch.to_mk(indent)
            ),
            StatementKind::Match { scrutinee, arms } => print_match(scrutinee, arms, indent),
        }
    }
}

impl ToMk for Parameter {
    fn to_mk(&self, _indent: usize) -> String {
        format!("{}: {}", self.name, self.ty.to_mk(0))
    }
}

impl ToMk for FunctionDecl {
    fn to_mk(&self, indent: usize) -> String {
        let params_str: Vec<String> = self.params.iter().map(|p| p.to_mk(0)).collect();
        let uses = if self.effects.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = self.effects.iter().map(|e| e.name.as_str()).collect();
            format!(" uses {{ {} }}", names.join(", "))
        };
        format!(
            "fn {}({}) -> {}{} {}",
            self.name,
            params_str.join(", "),
            self.return_type.to_mk(0),
            uses,
            self.body.to_mk(indent)
        )
    }
}

impl ToMk for TypeDecl {
    fn to_mk(&self, _indent: usize) -> String {
        let params = if self.type_params.is_empty() {
            String::new()
        } else {
            format!("<{}>", self.type_params.join(", "))
        };
        let body = match &self.body {
            TypeBody::Record(fields) => {
                let fields_str: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.ty.to_mk(0)))
                    .collect();
                format!("{{ {} }}", fields_str.join(", "))
            }
            TypeBody::Union(variants) => {
                let variants_str: Vec<String> = variants
                    .iter()
                    .map(|v| {
                        if v.fields.is_empty() {
                            v.name.clone()
                        } else {
                            let fields_str: Vec<String> = v
                                .fields
                                .iter()
                                .map(|f| format!("{}: {}", f.name, f.ty.to_mk(0)))
                                .collect();
                            format!("{}({})", v.name, fields_str.join(", "))
                        }
                    })
                    .collect();
                variants_str.join(" | ")
            }
        };
        format!("type {}{} = {}", self.name, params, body)
    }
}

impl ToMk for Declaration {
    fn to_mk(&self, indent: usize) -> String {
        match &self.kind {
            DeclarationKind::Function(f) => f.to_mk(indent),
            DeclarationKind::Type(t) => t.to_mk(indent),
            DeclarationKind::Effect(e) => format!("effect {}", e.name),
            DeclarationKind::Import(i) => match &i.alias {
                Some(alias) => format!("import {} as {}", i.path, alias),
                None => format!("import {}", i.path),
            },
        }
    }
}

impl ToMk for ApiRoute {
    fn to_mk(&self, indent: usize) -> String {
        let params_str: Vec<String> = self.params.iter().map(|p| p.to_mk(0)).collect();
        let uses = if self.effects.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = self.effects.iter().map(|e| e.name.as_str()).collect();
            format!(" uses {{ {} }}", names.join(", "))
        };
        format!(
            "api {} \"{}\" ({}) -> {}{} {}",
            self.method.as_str(),
            self.path,
            params_str.join(", "),
            self.return_type.to_mk(0),
            uses,
            self.body.to_mk(indent)
        )
    }
}

impl ToMk for Module {
    fn to_mk(&self, indent: usize) -> String {
        if self.implicit {
            let mut items = Vec::new();
            for decl in &self.decls {
                items.push(decl.to_mk(indent));
            }
            return items.join("\n\n");
        }
        let ind = indent_str(indent);
        let mut lines = vec![format!("module {} {{", self.name)];
        if !self.exports.is_empty() {
            lines.push(format!(
                "{}export {{ {} }}",
                indent_str(indent + 1),
                self.exports.join(", ")
            ));
        }
        for decl in &self.decls {
            lines.push(format!(
                "{}{}",
                indent_str(indent + 1),
                decl.to_mk(indent + 1)
            ));
        }
        lines.push(format!("{}}}", ind));
        lines.join("\n")
    }
}

/// Format a whole program back to canonical source.
pub fn format_program(program: &Program) -> String {
    let mut items = Vec::new();
    for module in &program.modules {
        let text = module.to_mk(0);
        if !text.is_empty() {
            items.push(text);
        }
    }
    for route in &program.routes {
        items.push(route.to_mk(0));
    }
    let mut out = items.join("\n\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeId, Span};

    fn dummy_span() -> Span {
        Span::dummy()
    }

    fn lit(l: Literal) -> Expr {
        Expr {
            id: NodeId::dummy(),
            kind: ExprKind::Literal(l),
            span: dummy_span(),
        }
    }

    #[test]
    fn literal_to_mk() {
        assert_eq!(Literal::Int(42).to_mk(0), "42");
        assert_eq!(Literal::String("hi".into()).to_mk(0), "\"hi\"");
        assert_eq!(Literal::Bool(true).to_mk(0), "true");
        assert_eq!(Literal::Unit.to_mk(0), "()");
    }

    #[test]
    fn escape_string_handles_quotes_and_backslashes() {
        assert_eq!(escape_string("a\"b"), "a\\\"b");
        assert_eq!(escape_string("a\\b"), "a\\\\b");
    }

    #[test]
    fn binary_precedence_inserts_parens() {
        use crate::BinaryOp;
        // (1 + 2) * 3 keeps its parentheses
        let sum = Expr {
            id: NodeId::dummy(),
            kind: ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(lit(Literal::Int(1))),
                right: Box::new(lit(Literal::Int(2))),
            },
            span: dummy_span(),
        };
        let product = Expr {
            id: NodeId::dummy(),
            kind: ExprKind::Binary {
                op: BinaryOp::Mul,
                left: Box::new(sum),
                right: Box::new(lit(Literal::Int(3))),
            },
            span: dummy_span(),
        };
        assert_eq!(print_expr(&product, PREC_LOOSE, 0), "(1 + 2) * 3");
    }

    #[test]
    fn pattern_to_mk() {
        let p = Pattern {
            kind: PatternKind::Constructor {
                name: "Some".into(),
                fields: vec![Pattern {
                    kind: PatternKind::Binding("x".into()),
                    span: dummy_span(),
                }],
            },
            span: dummy_span(),
        };
        assert_eq!(p.to_mk(0), "Some(x)");
    }

    #[test]
    fn function_type_with_effects() {
        use crate::PrimitiveType;
        let t = Type {
            kind: TypeKind::Function {
                params: vec![Type::primitive(PrimitiveType::Int, dummy_span())],
                ret: Box::new(Type::primitive(PrimitiveType::String, dummy_span())),
                effects: vec!["http".into()],
            },
            span: dummy_span(),
        };
        assert_eq!(t.to_mk(0), "(Int) -> String uses { http }");
    }
}
