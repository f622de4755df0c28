//! The always-imported prelude
//!
//! Core types, constructors, helpers, and the fixed effect vocabulary.
//! Signatures are expressed as syntactic types so the checker installs
//! them through exactly the same path as user declarations; the runtime
//! bodies live in the host's JS standard library and are out of scope
//! for the compiler.
//!
//! The effectful builtins correspond to host-injected operations. The
//! container and string helpers are the compiler's own minimal surface
//! for `List`/`Map`, which have no literal syntax.

use manaknight_ast::{
    FieldDecl, PrimitiveType, Span, Type, TypeBody, TypeDecl, TypeKind, VariantDecl,
};

/// The effects every program may use without declaring them itself.
pub const PRELUDE_EFFECTS: &[&str] = &["time", "random", "http", "log", "crypto"];

/// A prelude function signature. `type_params` are freshened at every
/// reference, which is the only generic instantiation the language has.
pub struct PreludeFunction {
    pub name: &'static str,
    pub type_params: &'static [&'static str],
    pub params: Vec<(&'static str, Type)>,
    pub ret: Type,
    pub effects: &'static [&'static str],
}

fn prim(p: PrimitiveType) -> Type {
    Type::primitive(p, Span::dummy())
}

fn named(name: &str) -> Type {
    Type {
        kind: TypeKind::Named(name.to_string()),
        span: Span::dummy(),
    }
}

fn generic(name: &str, args: Vec<Type>) -> Type {
    Type {
        kind: TypeKind::Generic {
            name: name.to_string(),
            args,
        },
        span: Span::dummy(),
    }
}

fn func(params: Vec<Type>, ret: Type) -> Type {
    Type {
        kind: TypeKind::Function {
            params,
            ret: Box::new(ret),
            effects: Vec::new(),
        },
        span: Span::dummy(),
    }
}

fn field(name: &str, ty: Type) -> FieldDecl {
    FieldDecl {
        name: name.to_string(),
        ty,
        span: Span::dummy(),
    }
}

fn variant(name: &str, fields: Vec<FieldDecl>) -> VariantDecl {
    VariantDecl {
        name: name.to_string(),
        fields,
        span: Span::dummy(),
    }
}

/// The prelude type declarations: `Option<T>`, `Result<T, E>`, and the
/// opaque builtin containers `List<T>` and `Map<K, V>`.
pub fn prelude_types() -> Vec<TypeDecl> {
    vec![
        TypeDecl {
            name: "Option".to_string(),
            type_params: vec!["T".to_string()],
            body: TypeBody::Union(vec![
                variant("Some", vec![field("value", named("T"))]),
                variant("None", vec![]),
            ]),
            span: Span::dummy(),
        },
        TypeDecl {
            name: "Result".to_string(),
            type_params: vec!["T".to_string(), "E".to_string()],
            body: TypeBody::Union(vec![
                variant("Ok", vec![field("value", named("T"))]),
                variant("Err", vec![field("error", named("E"))]),
            ]),
            span: Span::dummy(),
        },
        // Opaque containers: no constructors, built through helpers.
        TypeDecl {
            name: "List".to_string(),
            type_params: vec!["T".to_string()],
            body: TypeBody::Union(vec![]),
            span: Span::dummy(),
        },
        TypeDecl {
            name: "Map".to_string(),
            type_params: vec!["K".to_string(), "V".to_string()],
            body: TypeBody::Union(vec![]),
            span: Span::dummy(),
        },
    ]
}

/// The prelude helper functions, pure first, then the effectful host
/// builtins bound to the fixed effect vocabulary.
pub fn prelude_functions() -> Vec<PreludeFunction> {
    use PrimitiveType::*;

    vec![
        PreludeFunction {
            name: "identity",
            type_params: &["T"],
            params: vec![("x", named("T"))],
            ret: named("T"),
            effects: &[],
        },
        PreludeFunction {
            name: "equals",
            type_params: &["T"],
            params: vec![("a", named("T")), ("b", named("T"))],
            ret: prim(Bool),
            effects: &[],
        },
        PreludeFunction {
            name: "hash",
            type_params: &["T"],
            params: vec![("value", named("T"))],
            ret: prim(Int),
            effects: &[],
        },
        PreludeFunction {
            name: "pipe",
            type_params: &["A", "B"],
            params: vec![
                ("value", named("A")),
                ("f", func(vec![named("A")], named("B"))),
            ],
            ret: named("B"),
            effects: &[],
        },
        PreludeFunction {
            name: "compose",
            type_params: &["A", "B", "C"],
            params: vec![
                ("f", func(vec![named("A")], named("B"))),
                ("g", func(vec![named("B")], named("C"))),
            ],
            ret: func(vec![named("A")], named("C")),
            effects: &[],
        },
        PreludeFunction {
            name: "not",
            type_params: &[],
            params: vec![("value", prim(Bool))],
            ret: prim(Bool),
            effects: &[],
        },
        PreludeFunction {
            name: "and",
            type_params: &[],
            params: vec![("a", prim(Bool)), ("b", prim(Bool))],
            ret: prim(Bool),
            effects: &[],
        },
        PreludeFunction {
            name: "or",
            type_params: &[],
            params: vec![("a", prim(Bool)), ("b", prim(Bool))],
            ret: prim(Bool),
            effects: &[],
        },
        PreludeFunction {
            name: "list_empty",
            type_params: &["T"],
            params: vec![],
            ret: generic("List", vec![named("T")]),
            effects: &[],
        },
        PreludeFunction {
            name: "list_len",
            type_params: &["T"],
            params: vec![("list", generic("List", vec![named("T")]))],
            ret: prim(Int),
            effects: &[],
        },
        PreludeFunction {
            name: "list_get",
            type_params: &["T"],
            params: vec![
                ("list", generic("List", vec![named("T")])),
                ("index", prim(Int)),
            ],
            ret: generic("Option", vec![named("T")]),
            effects: &[],
        },
        PreludeFunction {
            name: "list_push",
            type_params: &["T"],
            params: vec![
                ("list", generic("List", vec![named("T")])),
                ("value", named("T")),
            ],
            ret: generic("List", vec![named("T")]),
            effects: &[],
        },
        PreludeFunction {
            name: "map_empty",
            type_params: &["K", "V"],
            params: vec![],
            ret: generic("Map", vec![named("K"), named("V")]),
            effects: &[],
        },
        PreludeFunction {
            name: "map_get",
            type_params: &["K", "V"],
            params: vec![
                ("map", generic("Map", vec![named("K"), named("V")])),
                ("key", named("K")),
            ],
            ret: generic("Option", vec![named("V")]),
            effects: &[],
        },
        PreludeFunction {
            name: "map_set",
            type_params: &["K", "V"],
            params: vec![
                ("map", generic("Map", vec![named("K"), named("V")])),
                ("key", named("K")),
                ("value", named("V")),
            ],
            ret: generic("Map", vec![named("K"), named("V")]),
            effects: &[],
        },
        PreludeFunction {
            name: "string_len",
            type_params: &[],
            params: vec![("s", prim(String))],
            ret: prim(Int),
            effects: &[],
        },
        PreludeFunction {
            name: "string_concat",
            type_params: &[],
            params: vec![("a", prim(String)), ("b", prim(String))],
            ret: prim(String),
            effects: &[],
        },
        PreludeFunction {
            name: "int_to_string",
            type_params: &[],
            params: vec![("value", prim(Int))],
            ret: prim(String),
            effects: &[],
        },
        PreludeFunction {
            name: "now",
            type_params: &[],
            params: vec![],
            ret: prim(Int),
            effects: &["time"],
        },
        PreludeFunction {
            name: "random_int",
            type_params: &[],
            params: vec![("low", prim(Int)), ("high", prim(Int))],
            ret: prim(Int),
            effects: &["random"],
        },
        PreludeFunction {
            name: "http_get",
            type_params: &[],
            params: vec![("url", prim(String))],
            ret: generic("Result", vec![prim(String), prim(String)]),
            effects: &["http"],
        },
        PreludeFunction {
            name: "log_info",
            type_params: &[],
            params: vec![("message", prim(String))],
            ret: prim(Unit),
            effects: &["log"],
        },
        PreludeFunction {
            name: "sha256",
            type_params: &[],
            params: vec![("data", prim(String))],
            ret: prim(String),
            effects: &["crypto"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_and_result_have_their_constructors() {
        let types = prelude_types();
        let option = types.iter().find(|t| t.name == "Option").unwrap();
        match &option.body {
            TypeBody::Union(variants) => {
                let names: Vec<_> = variants.iter().map(|v| v.name.as_str()).collect();
                assert_eq!(names, vec!["Some", "None"]);
            }
            _ => panic!("Option must be a union"),
        }
        let result = types.iter().find(|t| t.name == "Result").unwrap();
        assert_eq!(result.type_params.len(), 2);
    }

    #[test]
    fn effectful_builtins_carry_their_effect() {
        let fns = prelude_functions();
        let now = fns.iter().find(|f| f.name == "now").unwrap();
        assert_eq!(now.effects, &["time"]);
        let log = fns.iter().find(|f| f.name == "log_info").unwrap();
        assert_eq!(log.effects, &["log"]);
    }

    #[test]
    fn effect_vocabulary_is_fixed() {
        assert_eq!(
            PRELUDE_EFFECTS,
            &["time", "random", "http", "log", "crypto"]
        );
    }

    #[test]
    fn containers_have_constructors_and_accessors() {
        let fns = prelude_functions();
        for name in [
            "list_empty",
            "list_len",
            "list_get",
            "list_push",
            "map_empty",
            "map_get",
            "map_set",
        ] {
            assert!(
                fns.iter().any(|f| f.name == name),
                "prelude is missing `{}`",
                name
            );
        }
    }
}
