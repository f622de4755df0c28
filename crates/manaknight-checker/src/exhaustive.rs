//! Exhaustiveness checking for `match`
//!
//! For each match, the constructor set of the scrutinee's union type
//! must be covered exactly once, or closed by a single terminal
//! wildcard that is not redundant. The checker pass has already
//! reported non-union scrutinees (E4002), so those matches are skipped
//! here.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use manaknight_ast::*;
use manaknight_diag::{Diagnostic, ErrorCode, SourceMap};

use crate::{AdtInfo, ResolvedType, TypeTable};

/// Check every `match` in the program for coverage.
pub fn check_exhaustiveness(
    program: &Program,
    types: &TypeTable,
    adts: &BTreeMap<String, AdtInfo>,
    maps: &HashMap<String, SourceMap>,
    poisoned: &BTreeSet<String>,
) -> Vec<Diagnostic> {
    let mut checker = MatchChecker {
        types,
        adts,
        maps,
        diagnostics: Vec::new(),
        current_file: String::new(),
    };

    for module in &program.modules {
        if poisoned.contains(&module.file) {
            continue;
        }
        checker.current_file = module.file.clone();
        for func in module.functions() {
            checker.walk_block(&func.body);
        }
    }
    for route in &program.routes {
        if poisoned.contains(&route.file) {
            continue;
        }
        checker.current_file = route.file.clone();
        checker.walk_block(&route.body);
    }

    checker.diagnostics
}

struct MatchChecker<'a> {
    types: &'a TypeTable,
    adts: &'a BTreeMap<String, AdtInfo>,
    maps: &'a HashMap<String, SourceMap>,
    diagnostics: Vec<Diagnostic>,
    current_file: String,
}

impl<'a> MatchChecker<'a> {
    fn walk_block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.walk_stmt(stmt);
        }
        if let Some(tail) = &block.tail {
            self.walk_expr(tail);
        }
    }

    fn walk_stmt(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Let { value, .. } => self.walk_expr(value),
            StatementKind::Expr(e) => self.walk_expr(e),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(condition);
                self.walk_block(then_branch);
                self.walk_block(else_branch);
            }
            StatementKind::Match { scrutinee, arms } => {
                self.walk_expr(scrutinee);
                self.check_match(scrutinee, arms, stmt.span);
                for arm in arms {
                    self.walk_expr(&arm.body);
                }
            }
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => {}
            ExprKind::Call { callee, args } => {
                self.walk_expr(callee);
                for arg in args {
                    self.walk_expr(arg);
                }
            }
            ExprKind::Ctor { args, .. } => {
                for arg in args {
                    self.walk_expr(&arg.value);
                }
            }
            ExprKind::Lambda { body, .. } => self.walk_expr(body),
            ExprKind::Unary { operand, .. } => self.walk_expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(condition);
                self.walk_block(then_branch);
                self.walk_block(else_branch);
            }
            ExprKind::Match { scrutinee, arms } => {
                self.walk_expr(scrutinee);
                self.check_match(scrutinee, arms, expr.span);
                for arm in arms {
                    self.walk_expr(&arm.body);
                }
            }
            ExprKind::Pipe { left, right } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            ExprKind::Block(block) => self.walk_block(block),
        }
    }

    fn check_match(&mut self, scrutinee: &Expr, arms: &[MatchArm], span: Span) {
        let (adt_name, all): (String, Vec<String>) = match self.types.get(&scrutinee.id) {
            Some(ResolvedType::Adt { name, .. }) => match self.adts.get(name) {
                Some(info) if info.is_matchable_union() => (
                    info.name.clone(),
                    info.variants().iter().map(|v| v.name.clone()).collect(),
                ),
                _ => return,
            },
            _ => return,
        };

        let mut covered: BTreeSet<String> = BTreeSet::new();
        let mut closed = false;

        for arm in arms {
            if closed {
                self.report(
                    ErrorCode::E4003,
                    "unreachable arm after a wildcard".to_string(),
                    arm.span,
                );
                continue;
            }
            match &arm.pattern.kind {
                PatternKind::Constructor { name, .. } => {
                    let base = name.clone();
                    if !all.contains(&base) {
                        // Foreign constructor, already reported by the checker.
                        continue;
                    }
                    if !covered.insert(base.clone()) {
                        self.report(
                            ErrorCode::E4003,
                            format!("duplicate pattern for constructor `{}`", base),
                            arm.span,
                        );
                    }
                }
                PatternKind::Wildcard | PatternKind::Binding(_) => {
                    if covered.len() == all.len() {
                        self.report(
                            ErrorCode::E4003,
                            "wildcard arm is unreachable; every constructor is already covered"
                                .to_string(),
                            arm.span,
                        );
                    }
                    closed = true;
                }
            }
        }

        if !closed && covered.len() < all.len() {
            let missing: Vec<String> = all
                .iter()
                .filter(|name| !covered.contains(*name))
                .cloned()
                .collect();
            self.report(
                ErrorCode::E4001,
                format!(
                    "match on `{}` is not exhaustive; missing: {}",
                    adt_name,
                    missing.join(", ")
                ),
                span,
            );
        }
    }

    fn report(&mut self, code: ErrorCode, message: String, span: Span) {
        let (line, column) = match self.maps.get(&self.current_file) {
            Some(map) => map.position(span.start),
            None => (1, 1),
        };
        self.diagnostics.push(Diagnostic::new(
            code,
            message,
            self.current_file.clone(),
            line,
            column,
        ));
    }
}
