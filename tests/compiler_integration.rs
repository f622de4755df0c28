//! End-to-end scenarios through the full driver pipeline.

mod common;

use common::{codes, compile_str, compile_str_with};
use manaknight::diag::ErrorCode;
use manaknight::CompileOptions;
use pretty_assertions::assert_eq;

#[test]
fn hello_compiles_to_a_js_module() {
    let output = compile_str(r#"fn main() -> String { "hi" }"#, &[]);
    assert!(output.is_clean(), "{:?}", output.diagnostics);

    let js = output.js.expect("clean compile emits");
    assert!(js.starts_with("\"use strict\";\n"));
    assert!(js.contains("function main() {"));
    assert!(js.contains("return \"hi\";"));

    let manifest = output.manifest.expect("clean compile has a manifest");
    assert!(manifest.effects_list.is_empty());
}

#[test]
fn effect_escalation_is_exactly_e3002() {
    let output = compile_str("fn pure_time() -> Int { now() }", &[]);
    assert_eq!(codes(&output), vec![ErrorCode::E3002]);
}

#[test]
fn non_exhaustive_match_names_the_missing_constructor() {
    let output = compile_str(
        "fn f(o: Option<Int>) -> Int { match o { Some(x) => x } }",
        &[],
    );
    assert_eq!(codes(&output), vec![ErrorCode::E4001]);
    assert!(
        output.diagnostics[0].message.contains("None"),
        "message should name the missing constructor: {}",
        output.diagnostics[0].message
    );
}

#[test]
fn shadowing_is_exactly_e2006_at_the_inner_binding() {
    let output = compile_str("fn f() -> Int { let x = 1; { let x = 2 }; x }", &[]);
    assert_eq!(codes(&output), vec![ErrorCode::E2006]);
}

#[test]
fn pipeline_typing_lowers_to_a_direct_call() {
    let output = compile_str(
        "fn inc(x: Int) -> Int { x + 1 }\nfn main() -> Int { 1 |> inc }",
        &[],
    );
    assert!(output.is_clean(), "{:?}", output.diagnostics);
    let js = output.js.unwrap();
    assert!(js.contains("return inc(1);"));
}

#[test]
fn api_route_registers_and_appears_in_openapi() {
    let options = CompileOptions {
        check_only: false,
        openapi: true,
    };
    let output = compile_str_with(
        r#"api GET "/u/:id" (id: String) -> String { "ok: " + id }"#,
        &[],
        &options,
    );
    assert!(output.is_clean(), "{:?}", output.diagnostics);

    let js = output.js.unwrap();
    assert!(js.contains(
        "__router.register(\"GET\", \"/u/:id\", function handler(id, __effects) {"
    ));
    assert!(js.contains("return (\"ok: \" + id);"));

    let doc = output.openapi.expect("openapi requested");
    let schema =
        &doc["paths"]["/u/:id"]["get"]["responses"]["200"]["content"]["application/json"]["schema"];
    assert_eq!(schema["type"], "string");
}

#[test]
fn cross_module_call_through_alias() {
    let output = compile_str(
        "import auth.user as u\nfn main() -> Int { u.find(7) }",
        &[(
            "auth/user.mk",
            "export { find }\nfn find(id: Int) -> Int { id }",
        )],
    );
    assert!(output.is_clean(), "{:?}", output.diagnostics);
    let js = output.js.unwrap();
    assert!(js.contains("function auth_user_find(id) {"));
    assert!(js.contains("return auth_user_find(7);"));
}

#[test]
fn importing_a_private_symbol_is_e5003() {
    let output = compile_str(
        "import auth.user as u\nfn main() -> Int { u.hidden(7) }",
        &[(
            "auth/user.mk",
            "export { find }\nfn find(id: Int) -> Int { id }\nfn hidden(id: Int) -> Int { id }",
        )],
    );
    assert_eq!(codes(&output), vec![ErrorCode::E5003]);
}

#[test]
fn module_cycle_is_e5004() {
    let output = compile_str(
        "import a\nfn main() -> Int { 1 }",
        &[
            ("a.mk", "import b\nfn fa() -> Int { 1 }"),
            ("b.mk", "import a\nfn fb() -> Int { 2 }"),
        ],
    );
    assert!(
        codes(&output).contains(&ErrorCode::E5004),
        "{:?}",
        output.diagnostics
    );
}

#[test]
fn one_run_reports_independent_errors_across_modules() {
    let output = compile_str(
        "import good\nfn main() -> Int { nope }",
        &[("good.mk", "fn g() -> Int { also_nope }")],
    );
    // Both unknown identifiers reported in one invocation.
    let unknowns = codes(&output)
        .iter()
        .filter(|c| **c == ErrorCode::E2001)
        .count();
    assert_eq!(unknowns, 2, "{:?}", output.diagnostics);
}

#[test]
fn diagnostics_are_sorted_by_file_then_position() {
    let output = compile_str(
        "import zmod\nfn main() -> Int { nope }",
        &[("zmod.mk", "fn g() -> Int { also_nope }")],
    );
    let files: Vec<&str> = output
        .diagnostics
        .iter()
        .map(|d| d.file.as_str())
        .collect();
    let mut sorted = files.clone();
    sorted.sort();
    assert_eq!(files, sorted);
}

#[test]
fn check_only_suppresses_emission() {
    let options = CompileOptions {
        check_only: true,
        openapi: false,
    };
    let output = compile_str_with(r#"fn main() -> String { "hi" }"#, &[], &options);
    assert!(output.is_clean());
    assert!(output.js.is_none());
}

#[test]
fn errors_gate_emission() {
    let output = compile_str("fn main() -> Int { nope }", &[]);
    assert!(!output.is_clean());
    assert!(output.js.is_none());
    assert!(output.manifest.is_none());
}

#[test]
fn container_helpers_flow_through_the_pipeline() {
    let output = compile_str(
        "fn bump(xs: List<Int>) -> Int { match list_get(list_push(xs, 1), 0) { Some(x) => x  None => 0 } }",
        &[],
    );
    assert!(output.is_clean(), "{:?}", output.diagnostics);
    let js = output.js.unwrap();
    assert!(js.contains("list_get(list_push(xs, 1), 0)"));
    assert!(js.contains("__m.tag === \"Some\""));
}

#[test]
fn effectful_pipeline_threads_capabilities() {
    let output = compile_str(
        "fn stamp() -> String uses { time } { int_to_string(now()) }\n\
         api GET \"/when\" () -> String uses { time } { stamp() }",
        &[],
    );
    assert!(output.is_clean(), "{:?}", output.diagnostics);
    let js = output.js.unwrap();
    assert!(js.contains("function stamp(__effects) {"));
    assert!(js.contains("stamp(__effects)"));
    let manifest = output.manifest.unwrap();
    assert_eq!(manifest.effects_list, vec!["time".to_string()]);
}
