//! Manaknight Parser - recursive descent parser
//!
//! Parses Manaknight source into an AST. The parser never aborts: parse
//! problems are accumulated as diagnostics (E1001-E1006, plus the
//! parse-time API rules E6001-E6004) and the parser resynchronizes at
//! the next declaration boundary, so one invocation reports as many
//! independent errors as possible.

mod error;
mod parser;

pub use error::*;
pub use parser::*;

use manaknight_ast::Program;
use manaknight_diag::{Diagnostic, SourceMap};
use manaknight_lexer::tokenize;

/// Parse one source file into a `Program` plus diagnostics.
///
/// Loose declarations end up in an implicit module named `main`;
/// explicit `module` blocks keep their own names.
pub fn parse(file: &str, source: &str) -> (Program, Vec<Diagnostic>) {
    let map = SourceMap::new(file, source);
    parse_with_map(&map)
}

/// Parse using a pre-built source map (the resolver reuses maps).
pub fn parse_with_map(map: &SourceMap) -> (Program, Vec<Diagnostic>) {
    let (program, diagnostics, _) = parse_with_id_base(map, 0);
    (program, diagnostics)
}

/// Parse with an explicit starting node id; returns the next free id so
/// the resolver can keep ids unique across the whole module graph.
pub fn parse_with_id_base(map: &SourceMap, id_base: u32) -> (Program, Vec<Diagnostic>, u32) {
    let (tokens, lex_errors) = tokenize(map.source());

    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .iter()
        .map(|e| {
            let (line, column) = map.position(e.span().start);
            Diagnostic::new(e.code(), e.to_string(), map.file(), line, column)
        })
        .collect();

    let parser = Parser::with_id_base(map.source(), tokens, map, id_base);
    let (program, parse_diags, next_id) = parser.parse_program();
    diagnostics.extend(parse_diags);
    (program, diagnostics, next_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use manaknight_ast::*;
    use manaknight_diag::ErrorCode;

    fn parse_ok(source: &str) -> Program {
        let (program, diagnostics) = parse("test.mk", source);
        assert!(
            diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            diagnostics
        );
        program
    }

    fn parse_codes(source: &str) -> Vec<ErrorCode> {
        parse("test.mk", source).1.iter().map(|d| d.code).collect()
    }

    #[test]
    fn parse_hello() {
        let program = parse_ok(r#"fn main() -> String { "hi" }"#);
        assert_eq!(program.modules.len(), 1);
        assert!(program.modules[0].implicit);
        let func = program.modules[0].functions().next().unwrap();
        assert_eq!(func.name, "main");
        assert!(func.body.tail.is_some());
    }

    #[test]
    fn parse_function_with_effects() {
        let program = parse_ok("fn log_twice(msg: String) -> Unit uses { log } { log_info(msg) }");
        let func = program.modules[0].functions().next().unwrap();
        assert_eq!(func.effects.len(), 1);
        assert_eq!(func.effects[0].name, "log");
    }

    #[test]
    fn function_keyword_is_synonym_for_fn() {
        let program = parse_ok("function id(x: Int) -> Int { x }");
        assert_eq!(program.modules[0].functions().count(), 1);
    }

    #[test]
    fn parse_union_type_decl() {
        let program = parse_ok("type Shape = Circle(radius: Int) | Square(side: Int)");
        let decl = program.modules[0].types().next().unwrap();
        match &decl.body {
            TypeBody::Union(variants) => {
                assert_eq!(variants.len(), 2);
                assert_eq!(variants[0].name, "Circle");
                assert_eq!(variants[1].fields[0].name, "side");
            }
            TypeBody::Record(_) => panic!("expected union"),
        }
    }

    #[test]
    fn parse_record_type_decl() {
        let program = parse_ok("type User = { name: String, age: Int }");
        let decl = program.modules[0].types().next().unwrap();
        match &decl.body {
            TypeBody::Record(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name, "name");
            }
            TypeBody::Union(_) => panic!("expected record"),
        }
    }

    #[test]
    fn parse_generic_type_decl() {
        let program = parse_ok("type Pair<A, B> = Both(first: A, second: B)");
        let decl = program.modules[0].types().next().unwrap();
        assert_eq!(decl.type_params, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn parse_module_with_exports() {
        let program = parse_ok(
            r#"
            module auth.user {
                export { find }
                fn find(id: Int) -> Int { id }
                fn hidden(id: Int) -> Int { id }
            }
            "#,
        );
        assert_eq!(program.modules.len(), 1);
        let module = &program.modules[0];
        assert_eq!(module.name, "auth.user");
        assert_eq!(module.exports, vec!["find".to_string()]);
        assert!(!module.implicit);
    }

    #[test]
    fn parse_import_with_alias() {
        let program = parse_ok("import auth.user as u\nfn f() -> Int { 1 }");
        let import = program.modules[0]
            .decls
            .iter()
            .find_map(|d| match &d.kind {
                DeclarationKind::Import(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(import.path, "auth.user");
        assert_eq!(import.alias.as_deref(), Some("u"));
    }

    #[test]
    fn parse_pipe_and_precedence() {
        let program = parse_ok("fn f(x: Int) -> Int { 1 + 2 * 3 |> inc }");
        let func = program.modules[0].functions().next().unwrap();
        let tail = func.body.tail.as_ref().unwrap();
        match &tail.kind {
            ExprKind::Pipe { left, .. } => match &left.kind {
                ExprKind::Binary { op, right, .. } => {
                    assert_eq!(*op, BinaryOp::Add);
                    assert!(matches!(
                        right.kind,
                        ExprKind::Binary {
                            op: BinaryOp::Mul,
                            ..
                        }
                    ));
                }
                other => panic!("expected binary lhs, got {:?}", other),
            },
            other => panic!("expected pipe, got {:?}", other),
        }
    }

    #[test]
    fn parse_match_expression() {
        let program = parse_ok(
            r#"
            fn unwrap_or_zero(o: Option<Int>) -> Int {
                match o {
                    Some(x) => x
                    None => 0
                }
            }
            "#,
        );
        let func = program.modules[0].functions().next().unwrap();
        let tail = func.body.tail.as_ref().unwrap();
        match &tail.kind {
            ExprKind::Match { arms, .. } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(arms[0].pattern.constructor_name(), Some("Some"));
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn parse_lambda() {
        let program = parse_ok("fn f() -> Int { apply(fn (x: Int) => x + 1) }");
        assert_eq!(program.modules[0].functions().count(), 1);
    }

    #[test]
    fn parse_named_ctor_args() {
        let program = parse_ok(r#"fn f() -> User { User(name: "A", age: 3) }"#);
        let func = program.modules[0].functions().next().unwrap();
        let tail = func.body.tail.as_ref().unwrap();
        match &tail.kind {
            ExprKind::Ctor { name, args } => {
                assert_eq!(name, "User");
                assert_eq!(args[0].name.as_deref(), Some("name"));
            }
            other => panic!("expected ctor, got {:?}", other),
        }
    }

    #[test]
    fn parse_api_route() {
        let program = parse_ok(r#"api GET "/u/:id" (id: String) -> String { "ok: " + id }"#);
        assert_eq!(program.routes.len(), 1);
        let route = &program.routes[0];
        assert_eq!(route.method, HttpMethod::Get);
        assert_eq!(route.path, "/u/:id");
        assert_eq!(route.params.len(), 1);
    }

    #[test]
    fn bad_http_method_is_e6001() {
        let codes = parse_codes(r#"api YEET "/x" () -> String { "x" }"#);
        assert_eq!(codes, vec![ErrorCode::E6001]);
    }

    #[test]
    fn empty_path_segment_is_e6002() {
        let codes = parse_codes(r#"api GET "/a//b" () -> String { "x" }"#);
        assert_eq!(codes, vec![ErrorCode::E6002]);
    }

    #[test]
    fn missing_response_type_is_e6003() {
        let codes = parse_codes(r#"api GET "/x" () { "x" }"#);
        assert_eq!(codes, vec![ErrorCode::E6003]);
    }

    #[test]
    fn non_primitive_route_param_is_e6004() {
        let codes = parse_codes(r#"api GET "/x" (u: User) -> String { "x" }"#);
        assert_eq!(codes, vec![ErrorCode::E6004]);
    }

    #[test]
    fn empty_function_body_is_e1006() {
        let codes = parse_codes("fn f() -> Unit { }");
        assert_eq!(codes, vec![ErrorCode::E1006]);
    }

    #[test]
    fn trailing_comma_is_rejected() {
        let codes = parse_codes("fn f(a: Int,) -> Int { a }");
        assert!(codes.contains(&ErrorCode::E1001));
    }

    #[test]
    fn recovery_reports_multiple_errors() {
        // Two broken functions, both reported
        let codes = parse_codes("fn f( -> Int { 1 }\nfn g( -> Int { 2 }");
        assert!(codes.len() >= 2, "expected two diagnostics, got {:?}", codes);
    }

    #[test]
    fn version_header_is_accepted() {
        let program = parse_ok("language v1.0\nfn f() -> Int { 1 }");
        assert_eq!(program.modules[0].functions().count(), 1);
    }

    #[test]
    fn semicolons_are_tolerated() {
        let program = parse_ok("fn f() -> Int { let x = 1; x }");
        let func = program.modules[0].functions().next().unwrap();
        assert_eq!(func.body.statements.len(), 1);
        assert!(func.body.tail.is_some());
    }

    #[test]
    fn trailing_if_becomes_tail_expression() {
        let program = parse_ok("fn f(c: Bool) -> Int { if c { 1 } else { 2 } }");
        let func = program.modules[0].functions().next().unwrap();
        assert!(func.body.statements.is_empty());
        assert!(matches!(
            func.body.tail.as_ref().unwrap().kind,
            ExprKind::If { .. }
        ));
    }

    #[test]
    fn node_ids_are_unique() {
        let program = parse_ok("fn f(x: Int) -> Int { x + 1 + 2 }");
        let mut seen = std::collections::HashSet::new();
        fn walk(e: &Expr, seen: &mut std::collections::HashSet<NodeId>) {
            assert!(seen.insert(e.id), "duplicate node id {:?}", e.id);
            if let ExprKind::Binary { left, right, .. } = &e.kind {
                walk(left, seen);
                walk(right, seen);
            }
        }
        let func = program.modules[0].functions().next().unwrap();
        walk(func.body.tail.as_ref().unwrap(), &mut seen);
        assert!(seen.len() >= 5);
    }
}
