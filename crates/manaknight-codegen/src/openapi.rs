//! OpenAPI artifact
//!
//! When requested, the compiler emits an OpenAPI 3.0.0 document whose
//! `paths` map is assembled from the route declarations. The shape is
//! stable: `paths[path][method].responses["200"]` always carries a JSON
//! schema derived from the route's return type. serde_json's map keeps
//! keys sorted, so the document is deterministic.

use serde_json::{json, Map, Value};

use manaknight_ast::{PrimitiveType, Program, Type, TypeKind};
use manaknight_checker::{AdtInfo, AdtKind};
use std::collections::BTreeMap;

/// Build the OpenAPI document for a program's API routes.
pub fn build_openapi(program: &Program, adts: &BTreeMap<String, AdtInfo>) -> Value {
    let mut paths = Map::new();

    for route in &program.routes {
        let method = route.method.as_str().to_lowercase();

        let parameters: Vec<Value> = route
            .params
            .iter()
            .map(|p| {
                let in_path = route.path.contains(&format!(":{}", p.name));
                json!({
                    "name": p.name,
                    "in": if in_path { "path" } else { "query" },
                    "required": in_path,
                    "schema": type_schema(&p.ty, adts),
                })
            })
            .collect();

        let operation = json!({
            "parameters": parameters,
            "responses": {
                "200": {
                    "description": "Success",
                    "content": {
                        "application/json": {
                            "schema": type_schema(&route.return_type, adts),
                        }
                    }
                }
            }
        });

        let entry = paths
            .entry(route.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            methods.insert(method, operation);
        }
    }

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Manaknight API",
            "version": "1.0.0",
        },
        "paths": Value::Object(paths),
    })
}

/// JSON schema for a source-level type.
fn type_schema(ty: &Type, adts: &BTreeMap<String, AdtInfo>) -> Value {
    match &ty.kind {
        TypeKind::Primitive(p) => match p {
            PrimitiveType::Int => json!({ "type": "integer", "format": "int64" }),
            PrimitiveType::Bool => json!({ "type": "boolean" }),
            PrimitiveType::String => json!({ "type": "string" }),
            PrimitiveType::Unit => json!({ "type": "object" }),
        },
        TypeKind::Named(name) => adt_schema(name, &[], adts),
        TypeKind::Generic { name, args } => match name.as_str() {
            "Option" => {
                let mut inner = type_schema(args.first().unwrap_or(ty), adts);
                if let Value::Object(map) = &mut inner {
                    map.insert("nullable".to_string(), Value::Bool(true));
                }
                inner
            }
            "List" => json!({
                "type": "array",
                "items": args.first().map(|a| type_schema(a, adts)).unwrap_or(json!({})),
            }),
            "Map" => json!({
                "type": "object",
                "additionalProperties": args.get(1).map(|a| type_schema(a, adts)).unwrap_or(json!({})),
            }),
            _ => adt_schema(name, args, adts),
        },
        TypeKind::Function { .. } => json!({ "type": "object" }),
    }
}

/// Records become object schemas; tagged unions become a `oneOf` over
/// their variants, each with its discriminating `tag`.
fn adt_schema(name: &str, _args: &[Type], adts: &BTreeMap<String, AdtInfo>) -> Value {
    let base = name.rsplit('.').next().unwrap_or(name);
    let adt = match adts.get(base) {
        Some(info) => info,
        None => return json!({ "type": "object" }),
    };
    match &adt.kind {
        AdtKind::Record { fields } => {
            let mut properties = Map::new();
            for field in fields {
                properties.insert(field.name.clone(), type_schema(&field.ty, adts));
            }
            json!({
                "type": "object",
                "properties": Value::Object(properties),
            })
        }
        AdtKind::Union { variants } => {
            let options: Vec<Value> = variants
                .iter()
                .map(|v| {
                    let mut properties = Map::new();
                    properties.insert("tag".to_string(), json!({ "type": "string", "enum": [v.name] }));
                    for field in &v.fields {
                        properties.insert(field.name.clone(), type_schema(&field.ty, adts));
                    }
                    json!({
                        "type": "object",
                        "properties": Value::Object(properties),
                    })
                })
                .collect();
            if options.is_empty() {
                json!({ "type": "object" })
            } else {
                json!({ "oneOf": options })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manaknight_parser::parse;

    fn openapi_for(source: &str) -> Value {
        let (program, diagnostics) = parse("test.mk", source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        build_openapi(&program, &BTreeMap::new())
    }

    #[test]
    fn route_appears_under_its_path_and_method() {
        let doc = openapi_for(r#"api GET "/u/:id" (id: String) -> String { "ok: " + id }"#);
        assert_eq!(doc["openapi"], "3.0.0");
        let op = &doc["paths"]["/u/:id"]["get"];
        assert_eq!(
            op["responses"]["200"]["content"]["application/json"]["schema"]["type"],
            "string"
        );
    }

    #[test]
    fn path_parameters_are_required() {
        let doc = openapi_for(r#"api GET "/u/:id" (id: String) -> String { "x" }"#);
        let param = &doc["paths"]["/u/:id"]["get"]["parameters"][0];
        assert_eq!(param["name"], "id");
        assert_eq!(param["in"], "path");
        assert_eq!(param["required"], true);
    }

    #[test]
    fn int_return_is_int64() {
        let doc = openapi_for(r#"api GET "/n" () -> Int { 1 }"#);
        let schema = &doc["paths"]["/n"]["get"]["responses"]["200"]["content"]["application/json"]["schema"];
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["format"], "int64");
    }

    #[test]
    fn two_methods_share_a_path() {
        let doc = openapi_for(
            "api GET \"/x\" () -> Int { 1 }\napi POST \"/x\" () -> Int { 2 }",
        );
        assert!(doc["paths"]["/x"]["get"].is_object());
        assert!(doc["paths"]["/x"]["post"].is_object());
    }
}
