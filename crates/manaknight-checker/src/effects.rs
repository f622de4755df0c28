//! Effect inference and capability checking
//!
//! Runs after type checking, bottom-up, assigning an effect set to
//! every expression and block. A function's inferred set must be a
//! subset of its declared set; lambdas must infer empty. Spurious
//! declared effects are allowed.

use std::collections::{BTreeSet, HashMap};

use manaknight_ast::*;
use manaknight_diag::{Diagnostic, ErrorCode, SourceMap};

use crate::{ResolvedType, TypeTable};

/// An unordered set of effect names; empty means pure.
pub type EffectSet = BTreeSet<String>;

/// Side table of inferred effect sets, keyed by node identity.
pub type EffectTable = HashMap<NodeId, EffectSet>;

pub struct EffectOutput {
    pub effects: EffectTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Infer effect sets for every function and route body and check them
/// against the declared sets.
pub fn analyze_effects(
    program: &Program,
    types: &TypeTable,
    maps: &HashMap<String, SourceMap>,
    poisoned: &BTreeSet<String>,
) -> EffectOutput {
    let mut analyzer = EffectAnalyzer {
        types,
        maps,
        table: EffectTable::new(),
        diagnostics: Vec::new(),
        current_file: String::new(),
        first_effectful: None,
    };

    for module in &program.modules {
        if poisoned.contains(&module.file) {
            continue;
        }
        analyzer.current_file = module.file.clone();
        for func in module.functions() {
            analyzer.check_function(func);
        }
    }
    for route in &program.routes {
        if poisoned.contains(&route.file) {
            continue;
        }
        analyzer.current_file = route.file.clone();
        analyzer.check_route(route);
    }

    EffectOutput {
        effects: analyzer.table,
        diagnostics: analyzer.diagnostics,
    }
}

struct EffectAnalyzer<'a> {
    types: &'a TypeTable,
    maps: &'a HashMap<String, SourceMap>,
    table: EffectTable,
    diagnostics: Vec<Diagnostic>,
    current_file: String,
    /// First call site that introduced an effect in the current body
    first_effectful: Option<(Span, EffectSet)>,
}

impl<'a> EffectAnalyzer<'a> {
    fn check_function(&mut self, func: &FunctionDecl) {
        let declared: EffectSet = func.effects.iter().map(|e| e.name.clone()).collect();
        self.first_effectful = None;
        let inferred = self.infer_block(&func.body);
        self.check_declared(&func.name, &declared, &inferred, func.span);
    }

    fn check_route(&mut self, route: &ApiRoute) {
        let declared: EffectSet = route.effects.iter().map(|e| e.name.clone()).collect();
        self.first_effectful = None;
        let inferred = self.infer_block(&route.body);
        let name = format!("{} {}", route.method.as_str(), route.path);
        self.check_declared(&name, &declared, &inferred, route.span);
    }

    fn check_declared(&mut self, name: &str, declared: &EffectSet, inferred: &EffectSet, span: Span) {
        if inferred.is_empty() {
            return;
        }
        if declared.is_empty() {
            // A pure signature with an effectful body: one diagnostic,
            // anchored at the call that introduced the first effect.
            let (at, set) = self
                .first_effectful
                .clone()
                .unwrap_or((span, inferred.clone()));
            let names: Vec<&str> = set.iter().map(|e| e.as_str()).collect();
            self.report(
                ErrorCode::E3002,
                format!(
                    "pure function `{}` performs effect(s) {{ {} }}",
                    name,
                    names.join(", ")
                ),
                at,
            );
            return;
        }
        for missing in inferred.difference(declared) {
            self.report(
                ErrorCode::E3001,
                format!("`{}` uses effect `{}` without declaring it", name, missing),
                span,
            );
        }
    }

    fn infer_block(&mut self, block: &Block) -> EffectSet {
        let mut set = EffectSet::new();
        for stmt in &block.statements {
            set.extend(self.infer_stmt(stmt));
        }
        if let Some(tail) = &block.tail {
            set.extend(self.infer_expr(tail));
        }
        self.table.insert(block.id, set.clone());
        set
    }

    fn infer_stmt(&mut self, stmt: &Statement) -> EffectSet {
        match &stmt.kind {
            StatementKind::Let { value, .. } => self.infer_expr(value),
            StatementKind::Expr(e) => self.infer_expr(e),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut set = self.infer_expr(condition);
                set.extend(self.infer_block(then_branch));
                set.extend(self.infer_block(else_branch));
                set
            }
            StatementKind::Match { scrutinee, arms } => {
                let mut set = self.infer_expr(scrutinee);
                for arm in arms {
                    set.extend(self.infer_expr(&arm.body));
                }
                set
            }
        }
    }

    fn infer_expr(&mut self, expr: &Expr) -> EffectSet {
        let set = self.infer_expr_inner(expr);
        self.table.insert(expr.id, set.clone());
        set
    }

    fn infer_expr_inner(&mut self, expr: &Expr) -> EffectSet {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => EffectSet::new(),
            ExprKind::Call { callee, args } => {
                let mut set = self.infer_expr(callee);
                for arg in args {
                    set.extend(self.infer_expr(arg));
                }
                set.extend(self.callee_effects(callee, expr.span));
                set
            }
            ExprKind::Pipe { left, right } => {
                let mut set = self.infer_expr(left);
                set.extend(self.infer_expr(right));
                set.extend(self.callee_effects(right, expr.span));
                set
            }
            ExprKind::Ctor { args, .. } => {
                let mut set = EffectSet::new();
                for arg in args {
                    set.extend(self.infer_expr(&arg.value));
                }
                set
            }
            ExprKind::Lambda { body, .. } => {
                let body_set = self.infer_expr(body);
                if !body_set.is_empty() {
                    let names: Vec<&str> = body_set.iter().map(|e| e.as_str()).collect();
                    self.report(
                        ErrorCode::E3004,
                        format!(
                            "lambdas must be pure; body performs {{ {} }}",
                            names.join(", ")
                        ),
                        expr.span,
                    );
                }
                // The lambda value itself is pure.
                EffectSet::new()
            }
            ExprKind::Unary { operand, .. } => self.infer_expr(operand),
            ExprKind::Binary { left, right, .. } => {
                let mut set = self.infer_expr(left);
                set.extend(self.infer_expr(right));
                set
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut set = self.infer_expr(condition);
                set.extend(self.infer_block(then_branch));
                set.extend(self.infer_block(else_branch));
                set
            }
            ExprKind::Match { scrutinee, arms } => {
                let mut set = self.infer_expr(scrutinee);
                for arm in arms {
                    set.extend(self.infer_expr(&arm.body));
                }
                set
            }
            ExprKind::Block(block) => self.infer_block(block),
        }
    }

    /// Effects contributed by calling through `callee`, read from its
    /// resolved type.
    fn callee_effects(&mut self, callee: &Expr, call_span: Span) -> EffectSet {
        let set = match self.types.get(&callee.id) {
            Some(ResolvedType::Function { effects, .. }) => {
                effects.iter().cloned().collect::<EffectSet>()
            }
            _ => EffectSet::new(),
        };
        if !set.is_empty() && self.first_effectful.is_none() {
            self.first_effectful = Some((call_span, set.clone()));
        }
        set
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
