//! Type checker
//!
//! Bottom-up over the immutable AST: every expression node gets its
//! resolved type recorded in a side table keyed by node id. Two passes
//! per program: collect all type, effect, and function declarations,
//! then check bodies. Totality and return-type enforcement happen here;
//! effect inference and match exhaustiveness are separate passes that
//! consume the type table this pass produces.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use manaknight_ast::*;
use manaknight_diag::{Diagnostic, ErrorCode, SourceMap};
use manaknight_resolver::{prelude_functions, prelude_types, PRELUDE_EFFECTS};

use crate::{AdtInfo, AdtKind, FieldInfo, ResolvedType, Subst, SymbolKind, SymbolTable, VariantInfo};

/// Side table of resolved expression and block types.
pub type TypeTable = HashMap<NodeId, ResolvedType>;

/// Everything later passes need from type checking.
pub struct CheckOutput {
    pub types: TypeTable,
    pub adts: BTreeMap<String, AdtInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-module view used for qualified references.
struct ModuleEnv {
    functions: BTreeMap<String, ResolvedType>,
    exports: BTreeSet<String>,
}

pub struct Checker<'a> {
    maps: &'a HashMap<String, SourceMap>,
    poisoned: &'a BTreeSet<String>,
    symbols: SymbolTable,
    subst: Subst,
    adts: BTreeMap<String, AdtInfo>,
    /// Constructor name -> owning ADT name
    ctors: BTreeMap<String, String>,
    module_envs: BTreeMap<String, ModuleEnv>,
    effects_declared: BTreeSet<String>,
    types: TypeTable,
    diagnostics: Vec<Diagnostic>,
    current_file: String,
    /// alias or module name -> target module, for the module being checked
    imports: HashMap<String, String>,
}

impl<'a> Checker<'a> {
    pub fn new(maps: &'a HashMap<String, SourceMap>, poisoned: &'a BTreeSet<String>) -> Self {
        let mut checker = Self {
            maps,
            poisoned,
            symbols: SymbolTable::new(),
            subst: Subst::new(),
            adts: BTreeMap::new(),
            ctors: BTreeMap::new(),
            module_envs: BTreeMap::new(),
            effects_declared: BTreeSet::new(),
            types: TypeTable::new(),
            diagnostics: Vec::new(),
            current_file: String::new(),
            imports: HashMap::new(),
        };
        checker.install_prelude();
        checker
    }

    pub fn check_program(mut self, program: &Program) -> CheckOutput {
        // Pass 1: collect declarations so forward and cross-module
        // references resolve.
        for module in &program.modules {
            self.current_file = module.file.clone();
            self.collect_module(module);
        }

        // Pass 2: check bodies, module by module. Routes are checked in
        // the scope of the first module of the file they appear in.
        let mut route_files: BTreeSet<String> = BTreeSet::new();
        for module in &program.modules {
            if self.poisoned.contains(&module.file) {
                continue;
            }
            self.current_file = module.file.clone();
            let owns_routes = route_files.insert(module.file.clone());
            self.check_module(module, program, owns_routes);
        }

        // Resolve every recorded type through the final substitution.
        let types = self
            .types
            .iter()
            .map(|(id, ty)| (*id, self.subst.apply(ty)))
            .collect();

        CheckOutput {
            types,
            adts: self.adts,
            diagnostics: self.diagnostics,
        }
    }

    // === Prelude ===

    fn install_prelude(&mut self) {
        for effect in PRELUDE_EFFECTS {
            self.effects_declared.insert(effect.to_string());
            let _ = self
                .symbols
                .define(*effect, SymbolKind::Effect, ResolvedType::Unit, Span::dummy());
        }

        for decl in prelude_types() {
            self.register_adt(&decl);
        }

        for func in prelude_functions() {
            let mut params_map = HashMap::new();
            for tp in func.type_params {
                let var = self.subst.fresh();
                params_map.insert(tp.to_string(), var);
            }
            let params = func
                .params
                .iter()
                .map(|(_, ty)| self.resolve_type(ty, &params_map))
                .collect();
            let ret = self.resolve_type(&func.ret, &params_map);
            let ty = ResolvedType::Function {
                params,
                ret: Box::new(ret),
                effects: func.effects.iter().map(|e| e.to_string()).collect(),
            };
            let _ = self
                .symbols
                .define_generic(func.name, SymbolKind::Function, ty, Span::dummy());
        }
    }

    // === Collection pass ===

    fn collect_module(&mut self, module: &Module) {
        // Module names live in the global scope.
        if !module.implicit {
            if let Err(previous) =
                self.symbols
                    .define(&module.name, SymbolKind::Module, ResolvedType::Unit, module.span)
            {
                self.report_shadow(&module.name, module.span, previous);
            }
        }

        for decl in &module.decls {
            match &decl.kind {
                DeclarationKind::Effect(e) => {
                    if let Err(previous) =
                        self.symbols
                            .define(&e.name, SymbolKind::Effect, ResolvedType::Unit, e.span)
                    {
                        self.report_shadow(&e.name, e.span, previous);
                    } else {
                        self.effects_declared.insert(e.name.clone());
                    }
                }
                DeclarationKind::Type(t) => self.register_adt(t),
                _ => {}
            }
        }

        let mut env = ModuleEnv {
            functions: BTreeMap::new(),
            exports: module.exports.iter().cloned().collect(),
        };
        for func in module.functions() {
            let ty = self.function_type(func);
            env.functions.insert(func.name.clone(), ty);
        }
        self.module_envs.insert(module.name.clone(), env);
    }

    fn register_adt(&mut self, decl: &TypeDecl) {
        if let Err(previous) =
            self.symbols
                .define(&decl.name, SymbolKind::Type, ResolvedType::Unit, decl.span)
        {
            self.report_shadow(&decl.name, decl.span, previous);
            return;
        }

        let kind = match &decl.body {
            TypeBody::Record(fields) => AdtKind::Record {
                fields: fields
                    .iter()
                    .map(|f| FieldInfo {
                        name: f.name.clone(),
                        ty: f.ty.clone(),
                    })
                    .collect(),
            },
            TypeBody::Union(variants) => AdtKind::Union {
                variants: variants
                    .iter()
                    .map(|v| VariantInfo {
                        name: v.name.clone(),
                        fields: v
                            .fields
                            .iter()
                            .map(|f| FieldInfo {
                                name: f.name.clone(),
                                ty: f.ty.clone(),
                            })
                            .collect(),
                    })
                    .collect(),
            },
        };

        if let TypeBody::Union(variants) = &decl.body {
            for variant in variants {
                if let Err(previous) = self.symbols.define(
                    &variant.name,
                    SymbolKind::Constructor,
                    ResolvedType::Unit,
                    variant.span,
                ) {
                    self.report_shadow(&variant.name, variant.span, previous);
                    continue;
                }
                self.ctors.insert(variant.name.clone(), decl.name.clone());
            }
        }

        self.adts.insert(
            decl.name.clone(),
            AdtInfo {
                name: decl.name.clone(),
                type_params: decl.type_params.clone(),
                kind,
                span: decl.span,
            },
        );
    }

    fn function_type(&mut self, func: &FunctionDecl) -> ResolvedType {
        let empty = HashMap::new();
        let params = func
            .params
            .iter()
            .map(|p| self.resolve_type(&p.ty, &empty))
            .collect();
        let ret = self.resolve_type(&func.return_type, &empty);
        ResolvedType::Function {
            params,
            ret: Box::new(ret),
            effects: func.effects.iter().map(|e| e.name.clone()).collect(),
        }
    }

    // === Body pass ===

    fn check_module(&mut self, module: &Module, program: &Program, owns_routes: bool) {
        self.symbols.enter_scope(Some(module.name.clone()));
        self.imports.clear();

        for decl in &module.decls {
            if let DeclarationKind::Import(import) = &decl.kind {
                self.imports
                    .insert(import.path.clone(), import.path.clone());
                if let Some(alias) = &import.alias {
                    self.imports.insert(alias.clone(), import.path.clone());
                    if let Err(previous) = self.symbols.define(
                        alias,
                        SymbolKind::Module,
                        ResolvedType::Unit,
                        import.span,
                    ) {
                        self.report_shadow(alias, import.span, previous);
                    }
                }
            }
        }

        for func in module.functions() {
            let ty = self
                .module_envs
                .get(&module.name)
                .and_then(|env| env.functions.get(&func.name))
                .cloned()
                .unwrap_or(ResolvedType::Error);
            if let Err(previous) =
                self.symbols
                    .define(&func.name, SymbolKind::Function, ty, func.span)
            {
                self.report_shadow(&func.name, func.span, previous);
            }
        }

        for func in module.functions() {
            self.check_function(func);
        }

        if owns_routes {
            for route in &program.routes {
                if route.file == module.file {
                    self.check_route(route);
                }
            }
        }

        self.symbols.exit_scope();
    }

    fn check_function(&mut self, func: &FunctionDecl) {
        for effect in &func.effects {
            if !self.effects_declared.contains(&effect.name) {
                self.report(
                    ErrorCode::E3005,
                    format!("effect `{}` is not declared anywhere", effect.name),
                    effect.span,
                );
            }
        }

        self.symbols.enter_scope(Some(func.name.clone()));
        let empty = HashMap::new();
        for param in &func.params {
            let ty = self.resolve_type(&param.ty, &empty);
            if let Err(previous) =
                self.symbols
                    .define(&param.name, SymbolKind::Variable, ty, param.span)
            {
                self.report_shadow(&param.name, param.span, previous);
            }
        }

        let body_ty = self.infer_block(&func.body);
        let declared_ret = self.resolve_type(&func.return_type, &empty);
        if !self.subst.unify(&body_ty, &declared_ret) {
            self.report(
                ErrorCode::E2004,
                format!(
                    "function `{}` returns `{}` but its body produces `{}`",
                    func.name,
                    self.subst.apply(&declared_ret).display(),
                    self.subst.apply(&body_ty).display()
                ),
                func.span,
            );
        }

        if !block_is_total(&func.body) {
            self.report(
                ErrorCode::E2005,
                format!(
                    "function `{}` does not produce a value on every path",
                    func.name
                ),
                func.span,
            );
        }

        self.symbols.exit_scope();
    }

    fn check_route(&mut self, route: &ApiRoute) {
        for effect in &route.effects {
            if !self.effects_declared.contains(&effect.name) {
                self.report(
                    ErrorCode::E6005,
                    format!(
                        "route `{}` uses undeclared effect `{}`",
                        route.path, effect.name
                    ),
                    effect.span,
                );
            }
        }

        self.symbols
            .enter_scope(Some(format!("{} {}", route.method.as_str(), route.path)));
        let empty = HashMap::new();
        for param in &route.params {
            let ty = self.resolve_type(&param.ty, &empty);
            if let Err(previous) =
                self.symbols
                    .define(&param.name, SymbolKind::Variable, ty, param.span)
            {
                self.report_shadow(&param.name, param.span, previous);
            }
        }

        let body_ty = self.infer_block(&route.body);
        let declared_ret = self.resolve_type(&route.return_type, &empty);
        if !self.subst.unify(&body_ty, &declared_ret) {
            self.report(
                ErrorCode::E2004,
                format!(
                    "route `{}` responds with `{}` but its body produces `{}`",
                    route.path,
                    self.subst.apply(&declared_ret).display(),
                    self.subst.apply(&body_ty).display()
                ),
                route.span,
            );
        }

        if !block_is_total(&route.body) {
            self.report(
                ErrorCode::E2005,
                format!(
                    "route `{}` does not produce a value on every path",
                    route.path
                ),
                route.span,
            );
        }

        self.symbols.exit_scope();
    }

    // === Blocks and statements ===

    fn infer_block(&mut self, block: &Block) -> ResolvedType {
        self.symbols.enter_scope(None);
        for stmt in &block.statements {
            self.check_statement(stmt);
        }
        let ty = match &block.tail {
            Some(tail) => self.infer_expr(tail),
            None => ResolvedType::Unit,
        };
        self.symbols.exit_scope();
        self.types.insert(block.id, ty.clone());
        ty
    }

    fn check_statement(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Let { name, ty, value } => {
                let value_ty = self.infer_expr(value);
                let final_ty = match ty {
                    Some(declared) => {
                        let declared_ty = self.resolve_type(declared, &HashMap::new());
                        if !self.subst.unify(&declared_ty, &value_ty) {
                            self.report(
                                ErrorCode::E2002,
                                format!(
                                    "`{}` is declared as `{}` but bound to `{}`",
                                    name,
                                    self.subst.apply(&declared_ty).display(),
                                    self.subst.apply(&value_ty).display()
                                ),
                                stmt.span,
                            );
                        }
                        declared_ty
                    }
                    None => value_ty,
                };
                if let Err(previous) =
                    self.symbols
                        .define(name, SymbolKind::Variable, final_ty, stmt.span)
                {
                    self.report_shadow(name, stmt.span, previous);
                }
            }
            StatementKind::Expr(e) => {
                self.infer_expr(e);
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition);
                self.infer_block(then_branch);
                self.infer_block(else_branch);
            }
            StatementKind::Match { scrutinee, arms } => {
                self.check_match(scrutinee, arms, false);
            }
        }
    }

    fn check_condition(&mut self, condition: &Expr) {
        let ty = self.infer_expr(condition);
        if !self.subst.unify(&ty, &ResolvedType::Bool) {
            self.report(
                ErrorCode::E2007,
                format!(
                    "condition must be `Bool`, found `{}`",
                    self.subst.apply(&ty).display()
                ),
                condition.span,
            );
        }
    }

    // === Expressions ===

    fn infer_expr(&mut self, expr: &Expr) -> ResolvedType {
        let ty = self.infer_expr_inner(expr);
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn infer_expr_inner(&mut self, expr: &Expr) -> ResolvedType {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(_) => ResolvedType::Int,
                Literal::String(_) => ResolvedType::String,
                Literal::Bool(_) => ResolvedType::Bool,
                Literal::Unit => ResolvedType::Unit,
            },
            ExprKind::Ident(name) => self.resolve_ident(name, expr.span),
            ExprKind::Call { callee, args } => {
                let callee_ty = self.infer_expr(callee);
                let arg_tys: Vec<ResolvedType> = args.iter().map(|a| self.infer_expr(a)).collect();
                self.check_call(&callee_ty, &arg_tys, args, expr.span)
            }
            ExprKind::Ctor { name, args } => self.check_ctor(name, args, expr.span),
            ExprKind::Lambda { params, body } => {
                self.symbols.enter_scope(Some("lambda".to_string()));
                let empty = HashMap::new();
                let mut param_tys = Vec::new();
                for param in params {
                    let ty = self.resolve_type(&param.ty, &empty);
                    param_tys.push(ty.clone());
                    if let Err(previous) =
                        self.symbols
                            .define(&param.name, SymbolKind::Variable, ty, param.span)
                    {
                        self.report_shadow(&param.name, param.span, previous);
                    }
                }
                let ret = self.infer_expr(body);
                self.symbols.exit_scope();
                ResolvedType::Function {
                    params: param_tys,
                    ret: Box::new(ret),
                    effects: BTreeSet::new(),
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.infer_expr(operand);
                let expected = match op {
                    UnaryOp::Neg => ResolvedType::Int,
                    UnaryOp::Not => ResolvedType::Bool,
                };
                if !self.subst.unify(&operand_ty, &expected) {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "operand of unary `{}` must be `{}`, found `{}`",
                            match op {
                                UnaryOp::Neg => "-",
                                UnaryOp::Not => "!",
                            },
                            expected.display(),
                            self.subst.apply(&operand_ty).display()
                        ),
                        operand.span,
                    );
                }
                expected
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.infer_expr(left);
                let right_ty = self.infer_expr(right);
                self.check_binary(*op, &left_ty, &right_ty, expr.span)
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition);
                let then_ty = self.infer_block(then_branch);
                let else_ty = self.infer_block(else_branch);
                if !self.subst.unify(&then_ty, &else_ty) {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "if branches disagree: `{}` versus `{}`",
                            self.subst.apply(&then_ty).display(),
                            self.subst.apply(&else_ty).display()
                        ),
                        expr.span,
                    );
                }
                then_ty
            }
            ExprKind::Match { scrutinee, arms } => self.check_match(scrutinee, arms, true),
            ExprKind::Pipe { left, right } => {
                let value_ty = self.infer_expr(left);
                let func_ty = self.infer_expr(right);
                self.check_call(&func_ty, &[value_ty], std::slice::from_ref(&**left), expr.span)
            }
            ExprKind::Block(block) => self.infer_block(block),
        }
    }

    fn check_call(
        &mut self,
        callee_ty: &ResolvedType,
        arg_tys: &[ResolvedType],
        args: &[Expr],
        span: Span,
    ) -> ResolvedType {
        let callee_ty = self.subst.apply(callee_ty);
        match callee_ty {
            ResolvedType::Function { params, ret, .. } => {
                if params.len() != arg_tys.len() {
                    self.report(
                        ErrorCode::E2003,
                        format!(
                            "expected {} argument(s), found {}",
                            params.len(),
                            arg_tys.len()
                        ),
                        span,
                    );
                    return *ret;
                }
                for (i, (param, arg)) in params.iter().zip(arg_tys.iter()).enumerate() {
                    if !self.subst.unify(param, arg) {
                        let arg_span = args.get(i).map(|a| a.span).unwrap_or(span);
                        self.report(
                            ErrorCode::E2002,
                            format!(
                                "argument {} has type `{}`, expected `{}`",
                                i + 1,
                                self.subst.apply(arg).display(),
                                self.subst.apply(param).display()
                            ),
                            arg_span,
                        );
                    }
                }
                *ret
            }
            ResolvedType::Error => ResolvedType::Error,
            other => {
                self.report(
                    ErrorCode::E2003,
                    format!("`{}` is not callable", other.display()),
                    span,
                );
                ResolvedType::Error
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: &ResolvedType,
        right: &ResolvedType,
        span: Span,
    ) -> ResolvedType {
        let l = self.subst.apply(left);
        let r = self.subst.apply(right);
        if l.is_error() || r.is_error() {
            return if op.is_arithmetic() {
                ResolvedType::Error
            } else {
                ResolvedType::Bool
            };
        }

        match op {
            BinaryOp::Add => {
                // `+` is Int addition and String concatenation.
                if self.subst.unify(&l, &ResolvedType::Int)
                    && self.subst.unify(&r, &ResolvedType::Int)
                {
                    ResolvedType::Int
                } else if matches!(self.subst.apply(&l), ResolvedType::String)
                    && matches!(self.subst.apply(&r), ResolvedType::String)
                {
                    ResolvedType::String
                } else {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "`+` needs two Ints or two Strings, found `{}` and `{}`",
                            l.display(),
                            r.display()
                        ),
                        span,
                    );
                    ResolvedType::Error
                }
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let ok = self.subst.unify(&l, &ResolvedType::Int)
                    && self.subst.unify(&r, &ResolvedType::Int);
                if !ok {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "`{}` needs Int operands, found `{}` and `{}`",
                            op.symbol(),
                            l.display(),
                            r.display()
                        ),
                        span,
                    );
                }
                ResolvedType::Int
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let both_int = matches!(&l, ResolvedType::Int) && matches!(&r, ResolvedType::Int);
                let both_string =
                    matches!(&l, ResolvedType::String) && matches!(&r, ResolvedType::String);
                let both_vars = self.subst.unify(&l, &r)
                    && matches!(self.subst.apply(&l), ResolvedType::Var(_));
                if !(both_int || both_string || both_vars) {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "`{}` compares two Ints or two Strings, found `{}` and `{}`",
                            op.symbol(),
                            l.display(),
                            r.display()
                        ),
                        span,
                    );
                }
                ResolvedType::Bool
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if !self.subst.unify(&l, &r) {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "`{}` needs operands of the same type, found `{}` and `{}`",
                            op.symbol(),
                            l.display(),
                            r.display()
                        ),
                        span,
                    );
                } else if !self.subst.apply(&l).is_comparable() {
                    self.report(
                        ErrorCode::E2002,
                        "function values are not comparable".to_string(),
                        span,
                    );
                }
                ResolvedType::Bool
            }
            BinaryOp::And | BinaryOp::Or => {
                let ok = self.subst.unify(&l, &ResolvedType::Bool)
                    && self.subst.unify(&r, &ResolvedType::Bool);
                if !ok {
                    self.report(
                        ErrorCode::E2002,
                        format!(
                            "`{}` needs Bool operands, found `{}` and `{}`",
                            op.symbol(),
                            l.display(),
                            r.display()
                        ),
                        span,
                    );
                }
                ResolvedType::Bool
            }
        }
    }

    fn check_ctor(&mut self, name: &str, args: &[CtorArg], span: Span) -> ResolvedType {
        let base = name.rsplit('.').next().unwrap_or(name).to_string();

        if let Some(adt_name) = self.ctors.get(&base).cloned() {
            return self.check_variant_ctor(&adt_name, &base, args, span);
        }
        if self.adts.get(&base).is_some() {
            return self.check_record_ctor(&base, args, span);
        }
        self.report(
            ErrorCode::E2001,
            format!("unknown constructor `{}`", base),
            span,
        );
        for arg in args {
            self.infer_expr(&arg.value);
        }
        ResolvedType::Error
    }

    fn check_variant_ctor(
        &mut self,
        adt_name: &str,
        ctor: &str,
        args: &[CtorArg],
        span: Span,
    ) -> ResolvedType {
        let adt = self.adts.get(adt_name).cloned().expect("ctor owner exists");
        let variant = adt
            .variants()
            .iter()
            .find(|v| v.name == ctor)
            .cloned()
            .expect("ctor listed in owner");

        let params_map = self.instantiate(&adt.type_params);
        let result = ResolvedType::Adt {
            name: adt.name.clone(),
            args: adt
                .type_params
                .iter()
                .map(|p| params_map[p].clone())
                .collect(),
        };

        if args.iter().any(|a| a.name.is_some()) {
            self.report(
                ErrorCode::E2002,
                format!(
                    "constructor `{}` takes positional arguments in declared field order",
                    ctor
                ),
                span,
            );
        }
        if args.len() != variant.fields.len() {
            self.report(
                ErrorCode::E2003,
                format!(
                    "constructor `{}` expects {} argument(s), found {}",
                    ctor,
                    variant.fields.len(),
                    args.len()
                ),
                span,
            );
        }
        for (arg, fld) in args.iter().zip(variant.fields.iter()) {
            let arg_ty = self.infer_expr(&arg.value);
            let field_ty = self.resolve_type(&fld.ty, &params_map);
            if !self.subst.unify(&field_ty, &arg_ty) {
                self.report(
                    ErrorCode::E2002,
                    format!(
                        "field `{}` of `{}` has type `{}`, found `{}`",
                        fld.name,
                        ctor,
                        self.subst.apply(&field_ty).display(),
                        self.subst.apply(&arg_ty).display()
                    ),
                    arg.span,
                );
            }
        }
        // Excess arguments still get types recorded.
        for arg in args.iter().skip(variant.fields.len()) {
            self.infer_expr(&arg.value);
        }

        result
    }

    fn check_record_ctor(&mut self, adt_name: &str, args: &[CtorArg], span: Span) -> ResolvedType {
        let adt = self.adts.get(adt_name).cloned().expect("checked by caller");
        let fields = match &adt.kind {
            AdtKind::Record { fields } => fields.clone(),
            AdtKind::Union { .. } => {
                self.report(
                    ErrorCode::E2002,
                    format!(
                        "`{}` is a tagged union; construct it through one of its variants",
                        adt_name
                    ),
                    span,
                );
                for arg in args {
                    self.infer_expr(&arg.value);
                }
                return ResolvedType::Error;
            }
        };

        let params_map = self.instantiate(&adt.type_params);
        let result = ResolvedType::Adt {
            name: adt.name.clone(),
            args: adt
                .type_params
                .iter()
                .map(|p| params_map[p].clone())
                .collect(),
        };

        let mut seen = BTreeSet::new();
        for arg in args {
            let arg_ty = self.infer_expr(&arg.value);
            let name = match &arg.name {
                Some(name) => name,
                None => {
                    self.report(
                        ErrorCode::E2002,
                        format!("record `{}` requires named arguments", adt_name),
                        arg.span,
                    );
                    continue;
                }
            };
            if !seen.insert(name.clone()) {
                self.report(
                    ErrorCode::E2002,
                    format!("field `{}` given more than once", name),
                    arg.span,
                );
                continue;
            }
            match fields.iter().find(|f| &f.name == name) {
                Some(fld) => {
                    let field_ty = self.resolve_type(&fld.ty, &params_map);
                    if !self.subst.unify(&field_ty, &arg_ty) {
                        self.report(
                            ErrorCode::E2002,
                            format!(
                                "field `{}` of `{}` has type `{}`, found `{}`",
                                name,
                                adt_name,
                                self.subst.apply(&field_ty).display(),
                                self.subst.apply(&arg_ty).display()
                            ),
                            arg.span,
                        );
                    }
                }
                None => {
                    self.report(
                        ErrorCode::E2002,
                        format!("`{}` has no field `{}`", adt_name, name),
                        arg.span,
                    );
                }
            }
        }
        for fld in &fields {
            if !seen.contains(&fld.name) {
                self.report(
                    ErrorCode::E2002,
                    format!("missing field `{}` of `{}`", fld.name, adt_name),
                    span,
                );
            }
        }

        result
    }

    fn check_match(&mut self, scrutinee: &Expr, arms: &[MatchArm], require_join: bool) -> ResolvedType {
        let scrutinee_ty = self.infer_expr(scrutinee);
        let applied = self.subst.apply(&scrutinee_ty);

        let adt = match &applied {
            ResolvedType::Adt { name, .. } => self.adts.get(name).cloned(),
            _ => None,
        };
        let adt = match adt {
            Some(info) if info.is_matchable_union() => Some(info),
            _ => {
                if !applied.is_error() {
                    self.report(
                        ErrorCode::E4002,
                        format!("cannot match on `{}`", applied.display()),
                        scrutinee.span,
                    );
                }
                None
            }
        };

        let type_args = match &applied {
            ResolvedType::Adt { args, .. } => args.clone(),
            _ => Vec::new(),
        };

        let mut result: Option<ResolvedType> = None;
        for arm in arms {
            self.symbols.enter_scope(None);
            self.bind_pattern(&arm.pattern, adt.as_ref(), &type_args, &applied);
            let arm_ty = self.infer_expr(&arm.body);
            self.symbols.exit_scope();

            if require_join {
                match &result {
                    None => result = Some(arm_ty),
                    Some(first) => {
                        if !self.subst.unify(first, &arm_ty) {
                            self.report(
                                ErrorCode::E4004,
                                format!(
                                    "match arms disagree: `{}` versus `{}`",
                                    self.subst.apply(first).display(),
                                    self.subst.apply(&arm_ty).display()
                                ),
                                arm.span,
                            );
                        }
                    }
                }
            }
        }

        if require_join {
            result.unwrap_or(ResolvedType::Error)
        } else {
            ResolvedType::Unit
        }
    }

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        adt: Option<&AdtInfo>,
        type_args: &[ResolvedType],
        scrutinee_ty: &ResolvedType,
    ) {
        match &pattern.kind {
            PatternKind::Wildcard => {}
            PatternKind::Binding(name) => {
                if let Err(previous) = self.symbols.define(
                    name,
                    SymbolKind::Variable,
                    scrutinee_ty.clone(),
                    pattern.span,
                ) {
                    self.report_shadow(name, pattern.span, previous);
                }
            }
            PatternKind::Constructor { name, fields } => {
                let adt = match adt {
                    Some(info) => info,
                    None => return,
                };
                let owner = self.ctors.get(name).cloned();
                if owner.as_deref() != Some(adt.name.as_str()) {
                    let code = if owner.is_none() {
                        ErrorCode::E2001
                    } else {
                        ErrorCode::E4002
                    };
                    self.report(
                        code,
                        format!("`{}` is not a variant of `{}`", name, adt.name),
                        pattern.span,
                    );
                    return;
                }
                let variant = adt
                    .variants()
                    .iter()
                    .find(|v| v.name == *name)
                    .cloned()
                    .expect("owner lists its variants");
                if fields.len() != variant.fields.len() {
                    self.report(
                        ErrorCode::E4002,
                        format!(
                            "pattern `{}` expects {} field(s), found {}",
                            name,
                            variant.fields.len(),
                            fields.len()
                        ),
                        pattern.span,
                    );
                }
                let params_map: HashMap<String, ResolvedType> = adt
                    .type_params
                    .iter()
                    .cloned()
                    .zip(type_args.iter().cloned())
                    .collect();
                for (sub, fld) in fields.iter().zip(variant.fields.iter()) {
                    let field_ty = self.resolve_type(&fld.ty, &params_map);
                    match &sub.kind {
                        PatternKind::Binding(bind_name) => {
                            if let Err(previous) = self.symbols.define(
                                bind_name,
                                SymbolKind::Variable,
                                field_ty,
                                sub.span,
                            ) {
                                self.report_shadow(bind_name, sub.span, previous);
                            }
                        }
                        PatternKind::Wildcard => {}
                        PatternKind::Constructor { .. } => {
                            let applied = self.subst.apply(&field_ty);
                            let inner_adt = match &applied {
                                ResolvedType::Adt { name, .. } => self.adts.get(name).cloned(),
                                _ => None,
                            };
                            let inner_args = match &applied {
                                ResolvedType::Adt { args, .. } => args.clone(),
                                _ => Vec::new(),
                            };
                            match inner_adt {
                                Some(info) if info.is_matchable_union() => {
                                    self.bind_pattern(sub, Some(&info), &inner_args, &applied);
                                }
                                _ => {
                                    self.report(
                                        ErrorCode::E4002,
                                        format!("cannot match on `{}`", applied.display()),
                                        sub.span,
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    // === Names and types ===

    fn resolve_ident(&mut self, name: &str, span: Span) -> ResolvedType {
        if !name.contains('.') {
            return match self.symbols.lookup(name) {
                Some(symbol) => {
                    if symbol.kind == SymbolKind::Module {
                        self.report(
                            ErrorCode::E2001,
                            format!("`{}` is a module, not a value", name),
                            span,
                        );
                        return ResolvedType::Error;
                    }
                    let ty = symbol.ty.clone();
                    let generic = symbol.generic;
                    if generic {
                        self.freshen(&ty)
                    } else {
                        ty
                    }
                }
                None => {
                    self.report(
                        ErrorCode::E2001,
                        format!("unknown identifier `{}`", name),
                        span,
                    );
                    ResolvedType::Error
                }
            };
        }

        // Qualified reference: longest module prefix wins.
        let parts: Vec<&str> = name.split('.').collect();
        for i in (1..parts.len()).rev() {
            let prefix = parts[..i].join(".");
            let target = match self.imports.get(&prefix) {
                Some(target) => target.clone(),
                None => continue,
            };
            let member = parts[i..].join(".");
            let env = match self.module_envs.get(&target) {
                // Import failed to resolve; already reported as E5001.
                None => return ResolvedType::Error,
                Some(env) => env,
            };
            let ty = match env.functions.get(&member) {
                Some(ty) => ty.clone(),
                None => {
                    self.report(
                        ErrorCode::E2001,
                        format!("module `{}` has no function `{}`", target, member),
                        span,
                    );
                    return ResolvedType::Error;
                }
            };
            if !env.exports.contains(&member) {
                self.report(
                    ErrorCode::E5003,
                    format!("`{}` is not exported by module `{}`", member, target),
                    span,
                );
            }
            return ty;
        }

        self.report(
            ErrorCode::E2001,
            format!("unknown identifier `{}`", name),
            span,
        );
        ResolvedType::Error
    }

    fn resolve_type(
        &mut self,
        ty: &manaknight_ast::Type,
        params: &HashMap<String, ResolvedType>,
    ) -> ResolvedType {
        match &ty.kind {
            TypeKind::Primitive(p) => match p {
                PrimitiveType::Int => ResolvedType::Int,
                PrimitiveType::Bool => ResolvedType::Bool,
                PrimitiveType::String => ResolvedType::String,
                PrimitiveType::Unit => ResolvedType::Unit,
            },
            TypeKind::Named(name) => {
                let base = name.rsplit('.').next().unwrap_or(name);
                if let Some(bound) = params.get(base) {
                    return bound.clone();
                }
                match self.adts.get(base) {
                    Some(adt) => {
                        if !adt.type_params.is_empty() {
                            self.report(
                                ErrorCode::E2002,
                                format!(
                                    "type `{}` expects {} type argument(s)",
                                    base,
                                    adt.type_params.len()
                                ),
                                ty.span,
                            );
                            return ResolvedType::Error;
                        }
                        ResolvedType::Adt {
                            name: base.to_string(),
                            args: Vec::new(),
                        }
                    }
                    None => {
                        self.report(
                            ErrorCode::E2001,
                            format!("unknown type `{}`", base),
                            ty.span,
                        );
                        ResolvedType::Error
                    }
                }
            }
            TypeKind::Generic { name, args } => {
                let base = name.rsplit('.').next().unwrap_or(name);
                let resolved_args: Vec<ResolvedType> =
                    args.iter().map(|a| self.resolve_type(a, params)).collect();
                match self.adts.get(base) {
                    Some(adt) => {
                        if adt.type_params.len() != resolved_args.len() {
                            self.report(
                                ErrorCode::E2002,
                                format!(
                                    "type `{}` expects {} type argument(s), found {}",
                                    base,
                                    adt.type_params.len(),
                                    resolved_args.len()
                                ),
                                ty.span,
                            );
                            return ResolvedType::Error;
                        }
                        ResolvedType::Adt {
                            name: base.to_string(),
                            args: resolved_args,
                        }
                    }
                    None => {
                        self.report(
                            ErrorCode::E2001,
                            format!("unknown type `{}`", base),
                            ty.span,
                        );
                        ResolvedType::Error
                    }
                }
            }
            TypeKind::Function {
                params: param_tys,
                ret,
                effects,
            } => {
                let params_resolved = param_tys
                    .iter()
                    .map(|p| self.resolve_type(p, params))
                    .collect();
                let ret_resolved = self.resolve_type(ret, params);
                ResolvedType::Function {
                    params: params_resolved,
                    ret: Box::new(ret_resolved),
                    effects: effects.iter().cloned().collect(),
                }
            }
        }
    }

    /// Fresh unification variables for a generic declaration's params.
    fn instantiate(&mut self, type_params: &[String]) -> HashMap<String, ResolvedType> {
        type_params
            .iter()
            .map(|p| (p.clone(), self.subst.fresh()))
            .collect()
    }

    /// Replace every variable in a generic symbol's type with a fresh
    /// one, consistently.
    fn freshen(&mut self, ty: &ResolvedType) -> ResolvedType {
        let mut mapping = HashMap::new();
        self.freshen_inner(ty, &mut mapping)
    }

    fn freshen_inner(
        &mut self,
        ty: &ResolvedType,
        mapping: &mut HashMap<u32, ResolvedType>,
    ) -> ResolvedType {
        match ty {
            ResolvedType::Var(v) => mapping
                .entry(*v)
                .or_insert_with(|| self.subst.fresh())
                .clone(),
            ResolvedType::Adt { name, args } => ResolvedType::Adt {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| self.freshen_inner(a, mapping))
                    .collect(),
            },
            ResolvedType::Function {
                params,
                ret,
                effects,
            } => ResolvedType::Function {
                params: params
                    .iter()
                    .map(|p| self.freshen_inner(p, mapping))
                    .collect(),
                ret: Box::new(self.freshen_inner(ret, mapping)),
                effects: effects.clone(),
            },
            other => other.clone(),
        }
    }

    // === Reporting ===

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

    fn report_shadow(&mut self, name: &str, span: Span, _previous: Span) {
        let scope = self
            .symbols
            .current_scope_name()
            .unwrap_or("this scope")
            .to_string();
        self.report(
            ErrorCode::E2006,
            format!(
                "`{}` is already declared in an enclosing scope (seen from {})",
                name, scope
            ),
            span,
        );
    }
}

/// A block is total when it ends in a tail expression whose every
/// control path produces a value.
pub fn block_is_total(block: &Block) -> bool {
    match &block.tail {
        Some(tail) => expr_is_total(tail),
        None => false,
    }
}

fn expr_is_total(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::If {
            then_branch,
            else_branch,
            ..
        } => block_is_total(then_branch) && block_is_total(else_branch),
        ExprKind::Match { arms, .. } => arms.iter().all(|arm| expr_is_total(&arm.body)),
        ExprKind::Block(block) => block_is_total(block),
        _ => true,
    }
}
