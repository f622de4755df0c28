//! The compiler's advertised properties, exercised over a small corpus.

mod common;

use common::compile_str;
use manaknight::format_source;
use pretty_assertions::assert_eq;

/// Syntactically valid programs in assorted styles.
const CORPUS: &[&str] = &[
    r#"fn main() -> String { "hi" }"#,
    "fn inc(x: Int) -> Int { x + 1 }\nfn main() -> Int { 1 |> inc }",
    "type User = { name: String, age: Int }\nfn f() -> User { User(name: \"A\", age: 3) }",
    "type Shape = Circle(radius: Int) | Square(side: Int)\n\
     fn area_ish(s: Shape) -> Int { match s { Circle(r) => r * r  Square(w) => w * w } }",
    "fn f(o: Option<Int>) -> Int { match o { Some(x) => x  None => 0 } }",
    "fn stamp() -> Int uses { time } { now() }",
    "fn choose(c: Bool) -> Int { if c { 1 } else { 2 } }",
    "fn g() -> Int { let x = 2 * (3 + 4)\n x % 5 }",
    "fn h() -> Bool { 1 < 2 && 3 >= 2 || false }",
    "fn apply_twice(f: (Int) -> Int, x: Int) -> Int { f(f(x)) }",
    "fn k() -> Int { apply(fn (x: Int) => x + 1) }\nfn apply(f: (Int) -> Int) -> Int { f(41) }",
    "module auth.user {\n    export { find }\n    fn find(id: Int) -> Int { id }\n}",
    r#"api GET "/u/:id" (id: String) -> String { "ok: " + id }"#,
    r#"api POST "/items" (name: String) -> Int uses { log } { log_info(name); 1 }"#,
    "fn nested(o: Option<Int>) -> Int {\n    let base = 10\n    match o {\n        Some(x) => x + base\n        None => base\n    }\n}",
    "fn total(xs: List<Int>) -> Int { list_len(list_push(xs, 4)) }",
    "fn first_or_zero(xs: List<Int>) -> Int {\n    match list_get(xs, 0) {\n        Some(x) => x\n        None => 0\n    }\n}",
    "fn seed() -> Map<String, Int> { map_set(map_empty(), \"a\", 1) }",
    "fn lookup(m: Map<String, Int>) -> Option<Int> { map_get(m, \"a\") }",
];

#[test]
fn format_is_idempotent() {
    for source in CORPUS {
        let once = format_source("test.mk", source)
            .unwrap_or_else(|e| panic!("corpus entry failed to parse: {:?}\n{}", e, source));
        let twice = format_source("test.mk", &once)
            .unwrap_or_else(|e| panic!("formatted output failed to re-parse: {:?}\n{}", e, once));
        assert_eq!(once, twice, "format not idempotent for:\n{}", source);
    }
}

#[test]
fn format_round_trips_through_the_parser() {
    for source in CORPUS {
        let formatted = format_source("test.mk", source).unwrap();
        // Structural identity modulo spans: the canonical form of both
        // parses must agree.
        let reformatted = format_source("test.mk", &formatted).unwrap();
        assert_eq!(formatted, reformatted, "round trip failed for:\n{}", source);
    }
}

#[test]
fn formatted_output_ends_with_a_newline() {
    for source in CORPUS {
        let formatted = format_source("test.mk", source).unwrap();
        assert!(formatted.ends_with('\n'));
        assert!(!formatted.ends_with("\n\n"));
    }
}

#[test]
fn codegen_is_deterministic_across_runs() {
    for source in CORPUS {
        let first = compile_str(source, &[]);
        let second = compile_str(source, &[]);
        assert_eq!(
            first.js, second.js,
            "emission differs across runs for:\n{}",
            source
        );
        if let (Some(a), Some(b)) = (&first.manifest, &second.manifest) {
            assert_eq!(a.effects_hash, b.effects_hash);
        }
    }
}

#[test]
fn emitted_js_avoids_forbidden_constructs() {
    for source in CORPUS {
        let output = compile_str(source, &[]);
        let js = match &output.js {
            Some(js) => js,
            None => continue,
        };
        for forbidden in [
            "eval(", "with (", "this.", "class ", "throw ", "try {", " null", "undefined",
            "var ", "let ", "for (", "while (",
        ] {
            assert!(
                !js.contains(forbidden),
                "forbidden `{}` in output of:\n{}\n---\n{}",
                forbidden,
                source,
                js
            );
        }
    }
}

#[test]
fn clean_programs_have_sound_effect_rows() {
    // Every corpus entry that declares effects compiles clean, meaning
    // the inferred set was a subset of the declared set.
    for source in CORPUS {
        let output = compile_str(source, &[]);
        assert!(
            output.is_clean(),
            "corpus entry should compile clean: {}\n{:?}",
            source,
            output.diagnostics
        );
    }
}
