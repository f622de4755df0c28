//! Lowering to the restricted JavaScript subset
//!
//! The target subset: function definitions, `const` bindings,
//! `if`/`else`, object and array literals, strict equality, numeric and
//! string arithmetic, explicit `return`. Never emitted: `var`, `let`
//! reassignment, `class`, `this`, `eval`, `with`, `try`/`throw`,
//! `null`/`undefined`, loops, dynamic property access.
//!
//! Evaluation order in the output matches the source: arguments
//! left-to-right, pipe stages left-to-right, the match scrutinee
//! exactly once, match arms top-to-bottom.

use std::collections::{BTreeMap, HashMap};

use manaknight_ast::*;
use manaknight_checker::{AdtInfo, AdtKind, ResolvedType, TypeTable};

use crate::manifest::EffectManifest;

/// JS reserved words; colliding identifiers get a `_` suffix.
const JS_RESERVED: &[&str] = &[
    "arguments",
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "eval",
    "export",
    "extends",
    "finally",
    "for",
    "function",
    "if",
    "implements",
    "import",
    "in",
    "instanceof",
    "interface",
    "let",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "static",
    "super",
    "switch",
    "this",
    "throw",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

fn sanitize(name: &str) -> String {
    if JS_RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).expect("strings always serialize")
}

pub struct JsEmitter<'a> {
    program: &'a Program,
    types: &'a TypeTable,
    adts: &'a BTreeMap<String, AdtInfo>,
    manifest: &'a EffectManifest,
    /// (module, function) -> emitted JS name
    fn_names: BTreeMap<(String, String), String>,
    /// alias or module name -> module, for the module being emitted
    imports: HashMap<String, String>,
    current_module: String,
    out: String,
    indent: usize,
}

impl<'a> JsEmitter<'a> {
    pub fn new(
        program: &'a Program,
        types: &'a TypeTable,
        adts: &'a BTreeMap<String, AdtInfo>,
        manifest: &'a EffectManifest,
    ) -> Self {
        let mut fn_names = BTreeMap::new();
        for module in &program.modules {
            for func in module.functions() {
                let emitted = if module.implicit {
                    sanitize(&func.name)
                } else {
                    sanitize(&format!(
                        "{}_{}",
                        module.name.replace('.', "_"),
                        func.name
                    ))
                };
                fn_names.insert((module.name.clone(), func.name.clone()), emitted);
            }
        }
        Self {
            program,
            types,
            adts,
            manifest,
            fn_names,
            imports: HashMap::new(),
            current_module: String::new(),
            out: String::new(),
            indent: 0,
        }
    }

    /// Emit the whole program as one JS module. Deterministic: a given
    /// typed AST produces a byte-identical string.
    pub fn emit(mut self) -> String {
        let program = self.program;

        self.line("\"use strict\";");
        self.line("");
        self.emit_meta();
        self.line("const __unit = { tag: \"Unit\" };");
        self.line("");

        for module in &program.modules {
            self.current_module = module.name.clone();
            self.imports = module
                .decls
                .iter()
                .filter_map(|d| match &d.kind {
                    DeclarationKind::Import(i) => Some(i),
                    _ => None,
                })
                .flat_map(|i| {
                    let mut pairs = vec![(i.path.clone(), i.path.clone())];
                    if let Some(alias) = &i.alias {
                        pairs.push((alias.clone(), i.path.clone()));
                    }
                    pairs
                })
                .collect();
            for func in module.functions() {
                self.emit_function(module, func);
                self.line("");
            }
        }

        for route in &program.routes {
            // Route bodies resolve against the module of their file.
            if let Some(module) = program.modules.iter().find(|m| m.file == route.file) {
                self.current_module = module.name.clone();
            }
            self.emit_route(route);
            self.line("");
        }

        self.out
    }

    fn emit_meta(&mut self) {
        let manifest = self.manifest;
        let effects_list: Vec<String> = manifest
            .effects_list
            .iter()
            .map(|e| js_string(e))
            .collect();
        let line = format!(
            "const __meta = {{ languageVersion: {}, stdlibVersion: {}, effectsHash: {}, effectsList: [{}] }};",
            js_string(&manifest.language_version),
            js_string(&manifest.stdlib_version),
            js_string(&manifest.effects_hash),
            effects_list.join(", ")
        );
        self.line(&line);
    }

    fn emit_function(&mut self, module: &Module, func: &FunctionDecl) {
        let name = self.fn_names[&(module.name.clone(), func.name.clone())].clone();
        let mut params: Vec<String> = func.params.iter().map(|p| sanitize(&p.name)).collect();
        if !func.effects.is_empty() {
            params.push("__effects".to_string());
        }
        self.line(&format!("function {}({}) {{", name, params.join(", ")));
        self.indent += 1;
        self.emit_body(&func.body);
        self.indent -= 1;
        self.line("}");
    }

    fn emit_route(&mut self, route: &ApiRoute) {
        let mut params: Vec<String> = route.params.iter().map(|p| sanitize(&p.name)).collect();
        params.push("__effects".to_string());
        self.line(&format!(
            "__router.register({}, {}, function handler({}) {{",
            js_string(route.method.as_str()),
            js_string(&route.path),
            params.join(", ")
        ));
        self.indent += 1;
        self.emit_body(&route.body);
        self.indent -= 1;
        self.line("});");
    }

    /// Function body: statements, then `return <tail>;`.
    fn emit_body(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.emit_stmt(stmt);
        }
        match &block.tail {
            Some(tail) => {
                let value = self.expr(tail);
                self.line(&format!("return {};", value));
            }
            None => {
                self.line("return __unit;");
            }
        }
    }

    fn emit_stmt(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Let { name, value, .. } => {
                let value = self.expr(value);
                self.line(&format!("const {} = {};", sanitize(name), value));
            }
            StatementKind::Expr(e) => {
                let value = self.expr(e);
                self.line(&format!("{};", value));
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(condition);
                self.line(&format!("if ({}) {{", cond));
                self.indent += 1;
                self.emit_block_stmts(then_branch);
                self.indent -= 1;
                self.line("} else {");
                self.indent += 1;
                self.emit_block_stmts(else_branch);
                self.indent -= 1;
                self.line("}");
            }
            StatementKind::Match { scrutinee, arms } => {
                // Statement-position match still evaluates arm bodies;
                // lower through the expression encoding and discard.
                let value = self.match_expr(scrutinee, arms);
                self.line(&format!("{};", value));
            }
        }
    }

    /// Block in statement position: bindings and statements, value
    /// discarded.
    fn emit_block_stmts(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.emit_stmt(stmt);
        }
        if let Some(tail) = &block.tail {
            let value = self.expr(tail);
            self.line(&format!("{};", value));
        }
    }

    // === Expressions ===

    fn expr(&mut self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(n) => n.to_string(),
                Literal::String(s) => js_string(s),
                Literal::Bool(b) => b.to_string(),
                Literal::Unit => "__unit".to_string(),
            },
            ExprKind::Ident(name) => self.ident(name),
            ExprKind::Call { callee, args } => {
                let callee_js = self.expr(callee);
                let mut args_js: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                if self.callee_is_effectful(callee) {
                    args_js.push("__effects".to_string());
                }
                format!("{}({})", callee_js, args_js.join(", "))
            }
            ExprKind::Ctor { name, args } => self.ctor(name, args),
            ExprKind::Lambda { params, body } => {
                let params_js: Vec<String> =
                    params.iter().map(|p| sanitize(&p.name)).collect();
                let body_js = self.expr(body);
                format!(
                    "function ({}) {{ return {}; }}",
                    params_js.join(", "),
                    body_js
                )
            }
            ExprKind::Unary { op, operand } => {
                let operand_js = self.expr(operand);
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                format!("{}({})", sym, operand_js)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.expr(left);
                let r = self.expr(right);
                match op {
                    BinaryOp::Eq => format!("({} === {})", l, r),
                    BinaryOp::Ne => format!("({} !== {})", l, r),
                    // Integer division truncates toward zero.
                    BinaryOp::Div => format!("Math.trunc({} / {})", l, r),
                    other => format!("({} {} {})", l, other.symbol(), r),
                }
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(condition);
                if block_is_simple(then_branch) && block_is_simple(else_branch) {
                    let t = self.expr(then_branch.tail.as_ref().expect("simple block has tail"));
                    let f = self.expr(else_branch.tail.as_ref().expect("simple block has tail"));
                    format!("({} ? {} : {})", cond, t, f)
                } else {
                    // A block is required: an immediately-invoked
                    // function keeps the bindings scoped.
                    let mut inner = String::new();
                    std::mem::swap(&mut inner, &mut self.out);
                    let saved_indent = self.indent;
                    self.indent += 1;
                    self.line(&format!("if ({}) {{", cond));
                    self.indent += 1;
                    self.emit_return_block(then_branch);
                    self.indent -= 1;
                    self.line("} else {");
                    self.indent += 1;
                    self.emit_return_block(else_branch);
                    self.indent -= 1;
                    self.line("}");
                    self.indent = saved_indent;
                    std::mem::swap(&mut inner, &mut self.out);
                    format!(
                        "(function () {{\n{}{}}})()",
                        inner,
                        "    ".repeat(self.indent)
                    )
                }
            }
            ExprKind::Match { scrutinee, arms } => self.match_expr(scrutinee, arms),
            ExprKind::Pipe { left, right } => {
                let value = self.expr(left);
                let func = self.expr(right);
                if self.callee_is_effectful(right) {
                    format!("{}({}, __effects)", func, value)
                } else {
                    format!("{}({})", func, value)
                }
            }
            ExprKind::Block(block) => {
                if block_is_simple(block) {
                    self.expr(block.tail.as_ref().expect("simple block has tail"))
                } else {
                    let mut inner = String::new();
                    std::mem::swap(&mut inner, &mut self.out);
                    let saved_indent = self.indent;
                    self.indent += 1;
                    self.emit_body(block);
                    self.indent = saved_indent;
                    std::mem::swap(&mut inner, &mut self.out);
                    format!(
                        "(function () {{\n{}{}}})()",
                        inner,
                        "    ".repeat(self.indent)
                    )
                }
            }
        }
    }

    /// Block lowered inside an IIFE: statements then a `return`.
    fn emit_return_block(&mut self, block: &Block) {
        self.emit_body(block);
    }

    fn ident(&mut self, name: &str) -> String {
        if let Some(dot) = name.find('.') {
            // Qualified reference through an import.
            let parts: Vec<&str> = name.split('.').collect();
            for i in (1..parts.len()).rev() {
                let prefix = parts[..i].join(".");
                if let Some(target) = self.imports.get(&prefix) {
                    let member = parts[i..].join(".");
                    if let Some(emitted) = self.fn_names.get(&(target.clone(), member.clone())) {
                        return emitted.clone();
                    }
                }
            }
            let _ = dot;
            return sanitize(&name.replace('.', "_"));
        }
        if let Some(emitted) = self
            .fn_names
            .get(&(self.current_module.clone(), name.to_string()))
        {
            return emitted.clone();
        }
        sanitize(name)
    }

    fn ctor(&mut self, name: &str, args: &[CtorArg]) -> String {
        let base = name.rsplit('.').next().unwrap_or(name);
        let adts = self.adts;

        // Union variant: positional args in declared field order.
        for adt in adts.values() {
            if let AdtKind::Union { variants } = &adt.kind {
                if let Some(variant) = variants.iter().find(|v| v.name == base) {
                    let mut fields = vec![format!("tag: {}", js_string(base))];
                    let field_names: Vec<String> =
                        variant.fields.iter().map(|f| f.name.clone()).collect();
                    for (i, arg) in args.iter().enumerate() {
                        let field_name = field_names
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| format!("field{}", i));
                        let value = self.expr(&arg.value);
                        fields.push(format!("{}: {}", sanitize(&field_name), value));
                    }
                    return format!("{{ {} }}", fields.join(", "));
                }
            }
        }

        // Record construction: named args, emitted in written order so
        // evaluation order matches the source.
        let mut fields = Vec::new();
        for arg in args {
            let field_name = arg.name.clone().unwrap_or_default();
            let value = self.expr(&arg.value);
            fields.push(format!("{}: {}", sanitize(&field_name), value));
        }
        if fields.is_empty() {
            format!("{{ tag: {} }}", js_string(base))
        } else {
            format!("{{ {} }}", fields.join(", "))
        }
    }

    fn match_expr(&mut self, scrutinee: &Expr, arms: &[MatchArm]) -> String {
        let scrutinee_js = self.expr(scrutinee);

        let mut inner = String::new();
        std::mem::swap(&mut inner, &mut self.out);
        let saved_indent = self.indent;
        self.indent += 1;
        self.line(&format!("const __m = {};", scrutinee_js));

        let mut first = true;
        let mut closed = false;
        for arm in arms {
            match &arm.pattern.kind {
                PatternKind::Constructor { .. } => {
                    let mut conditions = Vec::new();
                    let mut bindings = Vec::new();
                    collect_pattern(&arm.pattern, "__m", self.adts, &mut conditions, &mut bindings);
                    let keyword = if first { "if" } else { "} else if" };
                    self.line(&format!("{} ({}) {{", keyword, conditions.join(" && ")));
                    self.indent += 1;
                    for (name, path) in &bindings {
                        self.line(&format!("const {} = {};", sanitize(name), path));
                    }
                    let body = self.expr(&arm.body);
                    self.line(&format!("return {};", body));
                    self.indent -= 1;
                    first = false;
                }
                PatternKind::Wildcard | PatternKind::Binding(_) => {
                    if first {
                        // A lone catch-all arm.
                        if let PatternKind::Binding(name) = &arm.pattern.kind {
                            self.line(&format!("const {} = __m;", sanitize(name)));
                        }
                        let body = self.expr(&arm.body);
                        self.line(&format!("return {};", body));
                    } else {
                        self.line("} else {");
                        self.indent += 1;
                        if let PatternKind::Binding(name) = &arm.pattern.kind {
                            self.line(&format!("const {} = __m;", sanitize(name)));
                        }
                        let body = self.expr(&arm.body);
                        self.line(&format!("return {};", body));
                        self.indent -= 1;
                        self.line("}");
                    }
                    closed = true;
                    break;
                }
            }
        }
        if !closed && !first {
            // Exhaustiveness has proven this unreachable; the terminal
            // branch keeps corrupted data from becoming undefined
            // behavior and surfaces E7004 at the host instead.
            self.line("} else {");
            self.indent += 1;
            self.line("return { tag: \"E7004\" };");
            self.indent -= 1;
            self.line("}");
        }

        self.indent = saved_indent;
        std::mem::swap(&mut inner, &mut self.out);
        format!(
            "(function () {{\n{}{}}})()",
            inner,
            "    ".repeat(self.indent)
        )
    }

    fn callee_is_effectful(&self, callee: &Expr) -> bool {
        matches!(
            self.types.get(&callee.id),
            Some(ResolvedType::Function { effects, .. }) if !effects.is_empty()
        )
    }

    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        self.out.push_str(&"    ".repeat(self.indent));
        self.out.push_str(text);
        self.out.push('\n');
    }
}

/// A block with no statements and a tail lowers to a plain expression.
fn block_is_simple(block: &Block) -> bool {
    block.statements.is_empty() && block.tail.is_some()
}

/// Walk a pattern, producing tag conditions and `const` bindings with
/// their access paths.
fn collect_pattern(
    pattern: &Pattern,
    path: &str,
    adts: &BTreeMap<String, AdtInfo>,
    conditions: &mut Vec<String>,
    bindings: &mut Vec<(String, String)>,
) {
    match &pattern.kind {
        PatternKind::Wildcard => {}
        PatternKind::Binding(name) => {
            bindings.push((name.clone(), path.to_string()));
        }
        PatternKind::Constructor { name, fields } => {
            let base = name.rsplit('.').next().unwrap_or(name);
            conditions.push(format!("{}.tag === {}", path, js_string(base)));
            let field_names: Vec<String> = adts
                .values()
                .filter_map(|adt| match &adt.kind {
                    AdtKind::Union { variants } => variants
                        .iter()
                        .find(|v| v.name == base)
                        .map(|v| v.fields.iter().map(|f| f.name.clone()).collect()),
                    AdtKind::Record { .. } => None,
                })
                .next()
                .unwrap_or_default();
            for (i, sub) in fields.iter().enumerate() {
                let field_name = match field_names.get(i) {
                    Some(name) => name.clone(),
                    None => continue,
                };
                let sub_path = format!("{}.{}", path, field_name);
                collect_pattern(sub, &sub_path, adts, conditions, bindings);
            }
        }
    }
}
