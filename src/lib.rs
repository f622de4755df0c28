//! Manaknight - a deterministic, capability-safe, purely functional
//! language compiling to a sandboxed JavaScript subset
//!
//! This root crate is the driver: it threads the compilation passes
//! (resolve, type check, effect analysis, exhaustiveness, lowering),
//! carries diagnostics across them, and gates emission on a clean run.
//! A fatal diagnostic in one module still lets later passes analyze
//! sibling modules, so one invocation reports as many independent
//! errors as possible.

pub use manaknight_ast as ast;
pub use manaknight_checker as checker;
pub use manaknight_codegen as codegen;
pub use manaknight_diag as diag;
pub use manaknight_lexer as lexer;
pub use manaknight_parser as parser;
pub use manaknight_resolver as resolver;

use std::path::{Path, PathBuf};

use manaknight_ast::format_program;
use manaknight_checker::{analyze_effects, check, check_exhaustiveness};
use manaknight_codegen::{build_openapi, emit, EffectManifest};
use manaknight_diag::{sort_diagnostics, Diagnostic};
use manaknight_resolver::{resolve, FsLoader, ModuleLoader};

/// What the driver should produce.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Type-check only; skip lowering even on a clean run
    pub check_only: bool,
    /// Also build the OpenAPI artifact
    pub openapi: bool,
}

/// Everything one invocation produces.
pub struct CompileOutput {
    pub js: Option<String>,
    pub manifest: Option<EffectManifest>,
    pub openapi: Option<serde_json::Value>,
    /// Sorted by file, then (line, column), then code
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Compile the program rooted at `input`, resolving imports relative to
/// its parent directory.
pub fn compile(input: &Path, options: &CompileOptions) -> CompileOutput {
    let base = input.parent().map(Path::to_path_buf).unwrap_or_default();
    compile_with_loader(input, &base, &FsLoader, options)
}

/// Compile with an explicit loader and base directory (tests resolve
/// from memory).
pub fn compile_with_loader(
    input: &Path,
    base: &Path,
    loader: &dyn ModuleLoader,
    options: &CompileOptions,
) -> CompileOutput {
    let resolved = resolve(input, base, loader);
    let mut diagnostics = resolved.diagnostics;

    let checked = check(&resolved.program, &resolved.maps, &resolved.poisoned_files);
    diagnostics.extend(checked.diagnostics);

    let effect_output = analyze_effects(
        &resolved.program,
        &checked.types,
        &resolved.maps,
        &resolved.poisoned_files,
    );
    diagnostics.extend(effect_output.diagnostics);

    diagnostics.extend(check_exhaustiveness(
        &resolved.program,
        &checked.types,
        &checked.adts,
        &resolved.maps,
        &resolved.poisoned_files,
    ));

    sort_diagnostics(&mut diagnostics);

    if !diagnostics.is_empty() || options.check_only {
        return CompileOutput {
            js: None,
            manifest: None,
            openapi: None,
            diagnostics,
        };
    }

    let (js, manifest) = emit(&resolved.program, &checked.types, &checked.adts);
    let openapi = options
        .openapi
        .then(|| build_openapi(&resolved.program, &checked.adts));

    CompileOutput {
        js: Some(js),
        manifest: Some(manifest),
        openapi,
        diagnostics,
    }
}

/// Canonical formatter entry: parse one file and re-emit it. Fails with
/// the parse diagnostics when the source is not syntactically valid.
pub fn format_source(file: &str, source: &str) -> Result<String, Vec<Diagnostic>> {
    let (program, diagnostics) = manaknight_parser::parse(file, source);
    if diagnostics.is_empty() {
        Ok(format_program(&program))
    } else {
        Err(diagnostics)
    }
}

/// Default output path: the input with its extension replaced by `.js`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut path = input.to_path_buf();
    path.set_extension("js");
    path
}
