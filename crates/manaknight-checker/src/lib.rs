//! Manaknight semantic analysis
//!
//! Symbol resolution with shadow prohibition, type checking with
//! totality, effect inference with capability checking, and match
//! exhaustiveness. Each pass consumes the frozen AST plus the side
//! tables of earlier passes and accumulates diagnostics instead of
//! aborting.

mod checker;
mod effects;
mod exhaustive;
mod symbols;
mod types;

pub use checker::{block_is_total, CheckOutput, Checker, TypeTable};
pub use effects::{analyze_effects, EffectOutput, EffectSet, EffectTable};
pub use exhaustive::check_exhaustiveness;
pub use symbols::{Symbol, SymbolKind, SymbolTable};
pub use types::{AdtInfo, AdtKind, FieldInfo, ResolvedType, Subst, VariantInfo};

use std::collections::{BTreeSet, HashMap};

use manaknight_ast::Program;
use manaknight_diag::SourceMap;

/// Run the type checking pass over a resolved program.
pub fn check(
    program: &Program,
    maps: &HashMap<String, SourceMap>,
    poisoned: &BTreeSet<String>,
) -> CheckOutput {
    Checker::new(maps, poisoned).check_program(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use manaknight_diag::ErrorCode;
    use manaknight_parser::parse;

    fn check_source(source: &str) -> (CheckOutput, EffectOutput, Vec<manaknight_diag::Diagnostic>) {
        let map = SourceMap::new("test.mk", source);
        let (program, parse_diags) = parse("test.mk", source);
        assert!(
            parse_diags.is_empty(),
            "test source must parse cleanly: {:?}",
            parse_diags
        );
        let maps: HashMap<String, SourceMap> = [("test.mk".to_string(), map)].into();
        let poisoned = BTreeSet::new();
        let checked = check(&program, &maps, &poisoned);
        let effects = analyze_effects(&program, &checked.types, &maps, &poisoned);
        let matches = check_exhaustiveness(&program, &checked.types, &checked.adts, &maps, &poisoned);
        (checked, effects, matches)
    }

    fn all_codes(source: &str) -> Vec<ErrorCode> {
        let (checked, effects, matches) = check_source(source);
        checked
            .diagnostics
            .iter()
            .chain(effects.diagnostics.iter())
            .chain(matches.iter())
            .map(|d| d.code)
            .collect()
    }

    #[test]
    fn hello_typechecks() {
        let codes = all_codes(r#"fn main() -> String { "hi" }"#);
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn unknown_identifier_is_e2001() {
        let codes = all_codes("fn f() -> Int { nope }");
        assert_eq!(codes, vec![ErrorCode::E2001]);
    }

    #[test]
    fn return_type_mismatch_is_e2004() {
        let codes = all_codes(r#"fn f() -> Int { "hi" }"#);
        assert_eq!(codes, vec![ErrorCode::E2004]);
    }

    #[test]
    fn let_only_body_is_e2005() {
        let codes = all_codes("fn f() -> Unit { let x = 1 }");
        assert_eq!(codes, vec![ErrorCode::E2005]);
    }

    #[test]
    fn shadowing_is_e2006() {
        let codes = all_codes("fn f() -> Int { let x = 1; { let x = 2; x }; x }");
        assert_eq!(codes, vec![ErrorCode::E2006]);
    }

    #[test]
    fn parameter_shadowing_is_e2006() {
        let codes = all_codes("fn f(x: Int) -> Int { let x = 2; x }");
        assert_eq!(codes, vec![ErrorCode::E2006]);
    }

    #[test]
    fn non_bool_condition_is_e2007() {
        let codes = all_codes("fn f() -> Int { if 1 { 2 } else { 3 } }");
        assert_eq!(codes, vec![ErrorCode::E2007]);
    }

    #[test]
    fn arity_mismatch_is_e2003() {
        let codes = all_codes("fn inc(x: Int) -> Int { x + 1 }\nfn f() -> Int { inc(1, 2) }");
        assert_eq!(codes, vec![ErrorCode::E2003]);
    }

    #[test]
    fn argument_type_mismatch_is_e2002() {
        let codes = all_codes(r#"fn inc(x: Int) -> Int { x + 1 }\nfn f() -> Int { inc("a") }"#);
        assert!(codes.contains(&ErrorCode::E2002), "{:?}", codes);
    }

    #[test]
    fn pipe_types_like_a_call() {
        let codes = all_codes("fn inc(x: Int) -> Int { x + 1 }\nfn f() -> Int { 1 |> inc }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn plus_concatenates_strings() {
        let codes = all_codes(r#"fn f(a: String) -> String { "x: " + a }"#);
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn comparing_int_to_string_is_e2002() {
        let codes = all_codes(r#"fn f() -> Bool { 1 < "a" }"#);
        assert_eq!(codes, vec![ErrorCode::E2002]);
    }

    #[test]
    fn function_equality_is_e2002() {
        let codes = all_codes(
            "fn id(x: Int) -> Int { x }\nfn f() -> Bool { id == id }",
        );
        assert_eq!(codes, vec![ErrorCode::E2002]);
    }

    #[test]
    fn generic_option_instantiation() {
        let codes = all_codes(
            "fn f(o: Option<Int>) -> Int { match o { Some(x) => x  None => 0 } }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn match_arm_type_mismatch_is_e4004() {
        let codes = all_codes(
            r#"fn f(o: Option<Int>) -> Int { match o { Some(x) => x  None => "zero" } }"#,
        );
        assert!(codes.contains(&ErrorCode::E4004), "{:?}", codes);
    }

    #[test]
    fn match_on_int_is_e4002() {
        let codes = all_codes("fn f(x: Int) -> Int { match x { _ => 0 } }");
        assert_eq!(codes, vec![ErrorCode::E4002]);
    }

    #[test]
    fn missing_constructor_is_e4001() {
        let codes = all_codes("fn f(o: Option<Int>) -> Int { match o { Some(x) => x } }");
        assert_eq!(codes, vec![ErrorCode::E4001]);
    }

    #[test]
    fn duplicate_constructor_arm_is_e4003() {
        let codes = all_codes(
            "fn f(o: Option<Int>) -> Int { match o { Some(x) => x  Some(y) => y  None => 0 } }",
        );
        assert_eq!(codes, vec![ErrorCode::E4003]);
    }

    #[test]
    fn redundant_wildcard_is_e4003() {
        let codes = all_codes(
            "fn f(o: Option<Int>) -> Int { match o { Some(x) => x  None => 0  _ => 1 } }",
        );
        assert_eq!(codes, vec![ErrorCode::E4003]);
    }

    #[test]
    fn effect_leak_into_pure_is_e3002() {
        let codes = all_codes("fn pure_fn() -> Int { now() }");
        assert_eq!(codes, vec![ErrorCode::E3002]);
    }

    #[test]
    fn declared_effect_passes() {
        let codes = all_codes("fn timed() -> Int uses { time } { now() }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn missing_effect_is_e3001() {
        let codes = all_codes(
            "fn both() -> Int uses { time } { log_info(\"x\"); now() }",
        );
        assert_eq!(codes, vec![ErrorCode::E3001]);
    }

    #[test]
    fn spurious_declared_effect_is_allowed() {
        let codes = all_codes("fn quiet() -> Int uses { time, log } { now() }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn effect_in_lambda_is_e3004() {
        let codes =
            all_codes("fn f() -> Unit uses { time } { let g = fn (x: Int) => now(); () }");
        assert!(codes.contains(&ErrorCode::E3004), "{:?}", codes);
    }

    #[test]
    fn unknown_effect_is_e3005() {
        let codes = all_codes("fn f() -> Int uses { telepathy } { 1 }");
        assert_eq!(codes, vec![ErrorCode::E3005]);
    }

    #[test]
    fn user_declared_effect_is_known() {
        let codes = all_codes("effect gpu\nfn f() -> Int uses { gpu } { 1 }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn user_adt_roundtrip() {
        let codes = all_codes(
            "type Shape = Circle(radius: Int) | Square(side: Int)\n\
             fn area_ish(s: Shape) -> Int { match s { Circle(r) => r * r  Square(w) => w * w } }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn record_requires_named_arguments() {
        let codes = all_codes(
            "type User = { name: String, age: Int }\n\
             fn f() -> User { User(\"A\", 3) }",
        );
        assert!(codes.contains(&ErrorCode::E2002), "{:?}", codes);
    }

    #[test]
    fn record_named_construction_passes() {
        let codes = all_codes(
            "type User = { name: String, age: Int }\n\
             fn f() -> User { User(name: \"A\", age: 3) }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn record_missing_field_is_e2002() {
        let codes = all_codes(
            "type User = { name: String, age: Int }\n\
             fn f() -> User { User(name: \"A\") }",
        );
        assert_eq!(codes, vec![ErrorCode::E2002]);
    }

    #[test]
    fn variant_arity_is_e2003() {
        let codes = all_codes("fn f() -> Option<Int> { Some(1, 2) }");
        assert!(codes.contains(&ErrorCode::E2003), "{:?}", codes);
    }

    #[test]
    fn route_effects_are_checked() {
        let codes = all_codes(r#"api GET "/t" () -> Int uses { time } { now() }"#);
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn route_unknown_effect_is_e6005() {
        let codes = all_codes(r#"api GET "/t" () -> Int uses { warp } { 1 }"#);
        assert_eq!(codes, vec![ErrorCode::E6005]);
    }

    #[test]
    fn route_effect_leak_is_e3002() {
        let codes = all_codes(r#"api GET "/t" () -> Int { now() }"#);
        assert_eq!(codes, vec![ErrorCode::E3002]);
    }

    #[test]
    fn prelude_helpers_are_in_scope() {
        let codes = all_codes("fn f() -> Int { identity(41) + 1 }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn prelude_generics_freshen_per_use() {
        let codes = all_codes(
            r#"fn f() -> Bool { equals(identity(1), 1) && equals(identity("a"), "a") }"#,
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn list_helpers_check_end_to_end() {
        let codes = all_codes("fn total(xs: List<Int>) -> Int { list_len(list_push(xs, 4)) }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn list_get_returns_an_option() {
        let codes = all_codes(
            "fn first_or_zero(xs: List<Int>) -> Int { match list_get(xs, 0) { Some(x) => x  None => 0 } }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn list_element_types_unify() {
        let codes = all_codes(r#"fn bad(xs: List<Int>) -> List<Int> { list_push(xs, "a") }"#);
        assert!(codes.contains(&ErrorCode::E2002), "{:?}", codes);
    }

    #[test]
    fn containers_are_built_from_the_empty_constructors() {
        let codes =
            all_codes("fn singleton(x: Int) -> List<Int> { list_push(list_empty(), x) }");
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn map_helpers_check_end_to_end() {
        let codes = all_codes(
            "fn lookup(m: Map<String, Int>) -> Int { match map_get(map_set(m, \"k\", 1), \"k\") { Some(v) => v  None => 0 } }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn map_built_from_empty_constructor() {
        let codes = all_codes(
            "fn seed() -> Map<String, Int> { map_set(map_empty(), \"a\", 1) }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn match_on_an_opaque_list_is_e4002() {
        let codes = all_codes("fn f(xs: List<Int>) -> Int { match xs { _ => 0 } }");
        assert_eq!(codes, vec![ErrorCode::E4002]);
    }

    #[test]
    fn string_helpers_check_end_to_end() {
        let codes = all_codes(
            "fn shout(s: String) -> String { string_concat(s, int_to_string(string_len(s))) }",
        );
        assert!(codes.is_empty(), "{:?}", codes);
    }

    #[test]
    fn totality_through_if_branches() {
        let codes = all_codes(
            "fn f(c: Bool) -> Int { if c { 1 } else { let x = 2 } }",
        );
        assert!(codes.contains(&ErrorCode::E2005), "{:?}", codes);
    }

    #[test]
    fn every_expression_gets_a_type() {
        let (checked, _, _) = check_source("fn f(x: Int) -> Int { x + 1 }");
        // parameter ref, literal, binary, block: all recorded
        assert!(checked.types.len() >= 4);
    }

    #[test]
    fn every_expression_gets_an_effect_set() {
        let (_, effects, _) = check_source("fn f() -> Int uses { time } { now() + 1 }");
        assert!(effects.effects.values().any(|set| set.contains("time")));
    }
}
