use std::path::Path;

use manaknight::diag::{Diagnostic, ErrorCode};
use manaknight::resolver::MemoryLoader;
use manaknight::{compile_with_loader, CompileOptions, CompileOutput};

/// Compile an in-memory program: `entry` is `main.mk`, extra files are
/// addressable by module path.
pub fn compile_str(entry: &str, files: &[(&str, &str)]) -> CompileOutput {
    compile_str_with(entry, files, &CompileOptions::default())
}

pub fn compile_str_with(
    entry: &str,
    files: &[(&str, &str)],
    options: &CompileOptions,
) -> CompileOutput {
    let mut loader = MemoryLoader::new().with("main.mk", entry);
    for (path, source) in files {
        loader = loader.with(*path, *source);
    }
    compile_with_loader(Path::new("main.mk"), Path::new(""), &loader, options)
}

#[allow(dead_code)]
pub fn codes(output: &CompileOutput) -> Vec<ErrorCode> {
    output.diagnostics.iter().map(|d| d.code).collect()
}

#[allow(dead_code)]
pub fn messages(output: &CompileOutput) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .map(Diagnostic::render)
        .collect()
}
