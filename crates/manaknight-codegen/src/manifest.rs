//! Effect manifest
//!
//! The compile-time record of the capabilities each entry point
//! requires. The runtime contract: the host constructs an object whose
//! keys are exactly the listed effects and injects it as `__effects`;
//! bytecode whose `effectsHash` does not match is rejected with E7004.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use manaknight_ast::Program;

pub const LANGUAGE_VERSION: &str = "1.0";
pub const STDLIB_VERSION: &str = "1.0";

/// One effectful (or pure) entry point visible to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub kind: EntryKind,
    pub effects: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Function,
    Route,
}

/// The manifest emitted next to the JS module and inlined as `__meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectManifest {
    pub language_version: String,
    pub stdlib_version: String,
    /// Deterministic hash over the sorted effect set of all entries
    pub effects_hash: String,
    /// Sorted union of all required effects
    pub effects_list: Vec<String>,
    pub entries: Vec<ManifestEntry>,
}

/// Build the manifest for a program: API routes plus the entry module's
/// functions and every exported function of the other modules.
pub fn build_manifest(program: &Program) -> EffectManifest {
    let mut entries = Vec::new();

    for (index, module) in program.modules.iter().enumerate() {
        let is_entry = index == 0;
        for func in module.functions() {
            if !is_entry && !module.exports.contains(&func.name) {
                continue;
            }
            let mut effects: Vec<String> =
                func.effects.iter().map(|e| e.name.clone()).collect();
            effects.sort();
            effects.dedup();
            let name = if module.implicit {
                func.name.clone()
            } else {
                format!("{}.{}", module.name, func.name)
            };
            entries.push(ManifestEntry {
                name,
                kind: EntryKind::Function,
                effects,
            });
        }
    }

    for route in &program.routes {
        let mut effects: Vec<String> =
            route.effects.iter().map(|e| e.name.clone()).collect();
        effects.sort();
        effects.dedup();
        entries.push(ManifestEntry {
            name: format!("{} {}", route.method.as_str(), route.path),
            kind: EntryKind::Route,
            effects,
        });
    }

    let mut effects_list: Vec<String> = entries
        .iter()
        .flat_map(|e| e.effects.iter().cloned())
        .collect();
    effects_list.sort();
    effects_list.dedup();

    let effects_hash = hash_effects(&effects_list);

    EffectManifest {
        language_version: LANGUAGE_VERSION.to_string(),
        stdlib_version: STDLIB_VERSION.to_string(),
        effects_hash,
        effects_list,
        entries,
    }
}

/// SHA-256 over the sorted, comma-joined effect names.
pub fn hash_effects(effects: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(effects.join(",").as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
