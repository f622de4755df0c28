//! Manaknight codegen
//!
//! Lowers the typed AST to a restricted JavaScript subset, emits the
//! effect manifest, and (on request) the OpenAPI artifact. Emission is
//! deterministic: the same typed AST produces byte-identical output.

mod js;
mod manifest;
mod openapi;

pub use js::JsEmitter;
pub use manifest::{
    build_manifest, hash_effects, EffectManifest, EntryKind, ManifestEntry, LANGUAGE_VERSION,
    STDLIB_VERSION,
};
pub use openapi::build_openapi;

use std::collections::BTreeMap;

use manaknight_ast::Program;
use manaknight_checker::{AdtInfo, TypeTable};

/// Emit the JS module and its manifest for a fully checked program.
pub fn emit(
    program: &Program,
    types: &TypeTable,
    adts: &BTreeMap<String, AdtInfo>,
) -> (String, EffectManifest) {
    let manifest = build_manifest(program);
    let js = JsEmitter::new(program, types, adts, &manifest).emit();
    (js, manifest)
}
