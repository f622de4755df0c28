//! Manaknight module resolver
//!
//! Maps dotted module names to files under the compilation root, loads
//! and parses each referenced module exactly once, and rejects edges
//! that would make the dependency graph cyclic. The output is a single
//! merged `Program` with stable node ids across all loaded files.

mod cycle;
mod loader;
mod prelude;

pub use cycle::{edge_creates_cycle, render_cycle};
pub use loader::{module_path, FsLoader, MemoryLoader, ModuleLoader};
pub use prelude::{prelude_functions, prelude_types, PreludeFunction, PRELUDE_EFFECTS};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use manaknight_ast::{DeclarationKind, Module, Program, Span};
use manaknight_diag::{Diagnostic, ErrorCode, SourceMap};
use manaknight_parser::parse_with_id_base;

/// Result of resolving the module graph rooted at one entry file.
pub struct ResolveOutput {
    pub program: Program,
    /// Source map per file, for span-to-position translation downstream.
    pub maps: HashMap<String, SourceMap>,
    pub diagnostics: Vec<Diagnostic>,
    /// Files whose parse produced syntax diagnostics; semantic passes
    /// skip modules from these files.
    pub poisoned_files: BTreeSet<String>,
}

/// Resolve the program rooted at `entry`, loading imports relative to
/// `base`.
pub fn resolve(entry: &Path, base: &Path, loader: &dyn ModuleLoader) -> ResolveOutput {
    let mut resolver = Resolver {
        base: base.to_path_buf(),
        loader,
        registered: BTreeMap::new(),
        modules: Vec::new(),
        routes: Vec::new(),
        maps: HashMap::new(),
        edges: BTreeMap::new(),
        diagnostics: Vec::new(),
        poisoned_files: BTreeSet::new(),
        next_id: 0,
    };

    let entry_name = entry.display().to_string();
    match loader.load(entry) {
        Some(source) => {
            resolver.process_file(&entry_name, &source, None);
        }
        None => {
            resolver.diagnostics.push(Diagnostic::new(
                ErrorCode::E5001,
                format!("module file `{}` not found", entry_name),
                entry_name.clone(),
                1,
                1,
            ));
        }
    }

    let span = Span::dummy();
    ResolveOutput {
        program: Program {
            modules: resolver.modules,
            routes: resolver.routes,
            span,
        },
        maps: resolver.maps,
        diagnostics: resolver.diagnostics,
        poisoned_files: resolver.poisoned_files,
    }
}

struct Resolver<'a> {
    base: PathBuf,
    loader: &'a dyn ModuleLoader,
    /// Module name -> file it was defined in.
    registered: BTreeMap<String, String>,
    modules: Vec<Module>,
    routes: Vec<manaknight_ast::ApiRoute>,
    maps: HashMap<String, SourceMap>,
    edges: BTreeMap<String, BTreeSet<String>>,
    diagnostics: Vec<Diagnostic>,
    poisoned_files: BTreeSet<String>,
    next_id: u32,
}

impl<'a> Resolver<'a> {
    /// Parse one file and register its modules; `import_as` renames the
    /// implicit module of an imported file to the import path.
    fn process_file(&mut self, file: &str, source: &str, import_as: Option<&str>) {
        let map = SourceMap::new(file, source);
        let (mut program, diagnostics, next_id) = parse_with_id_base(&map, self.next_id);
        self.next_id = next_id;
        if !diagnostics.is_empty() {
            self.poisoned_files.insert(file.to_string());
        }
        self.diagnostics.extend(diagnostics);
        self.maps.insert(file.to_string(), map);

        if let Some(name) = import_as {
            for module in &mut program.modules {
                if module.implicit {
                    module.name = name.to_string();
                }
            }
        }

        self.routes.append(&mut program.routes);

        let mut admitted = Vec::new();
        for module in program.modules {
            if let Some(previous_file) = self.registered.get(&module.name) {
                let map = &self.maps[file];
                let (line, column) = map.position(module.span.start);
                self.diagnostics.push(Diagnostic::new(
                    ErrorCode::E5002,
                    format!(
                        "module `{}` is already defined in `{}`",
                        module.name, previous_file
                    ),
                    file,
                    line,
                    column,
                ));
                continue;
            }
            self.registered
                .insert(module.name.clone(), file.to_string());
            admitted.push(module);
        }

        // Admit this file's modules first, then resolve their imports;
        // the merged program keeps the entry file's modules in front.
        let jobs: Vec<(String, String, Vec<manaknight_ast::ImportDecl>)> = admitted
            .iter()
            .map(|module| {
                let imports = module
                    .decls
                    .iter()
                    .filter_map(|d| match &d.kind {
                        DeclarationKind::Import(i) => Some(i.clone()),
                        _ => None,
                    })
                    .collect();
                (module.name.clone(), module.file.clone(), imports)
            })
            .collect();
        self.modules.extend(admitted);

        for (module_name, module_file, imports) in jobs {
            for import in imports {
                self.resolve_import(&module_name, &module_file, &import);
            }
        }
    }

    fn resolve_import(
        &mut self,
        module_name: &str,
        module_file: &str,
        import: &manaknight_ast::ImportDecl,
    ) {
        let target = import.path.clone();

        if let Some(cycle) = edge_creates_cycle(&self.edges, module_name, &target) {
            self.report_at(
                ErrorCode::E5004,
                format!("circular module dependency: {}", render_cycle(&cycle)),
                module_file,
                import.span,
            );
            return;
        }
        self.edges
            .entry(module_name.to_string())
            .or_default()
            .insert(target.clone());

        if self.registered.contains_key(&target) {
            return;
        }

        let path = module_path(&self.base, &target);
        let file_name = path.display().to_string();
        match self.loader.load(&path) {
            Some(source) => {
                self.process_file(&file_name, &source, Some(&target));
                if !self.registered.contains_key(&target) {
                    self.report_at(
                        ErrorCode::E5001,
                        format!("file `{}` does not define module `{}`", file_name, target),
                        module_file,
                        import.span,
                    );
                }
            }
            None => {
                self.report_at(
                    ErrorCode::E5001,
                    format!("module `{}` not found (expected `{}`)", target, file_name),
                    module_file,
                    import.span,
                );
            }
        }
    }

    fn report_at(&mut self, code: ErrorCode, message: String, file: &str, span: Span) {
        let (line, column) = match self.maps.get(file) {
            Some(map) => map.position(span.start),
            None => (1, 1),
        };
        self.diagnostics
            .push(Diagnostic::new(code, message, file, line, column));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_mem(entry_source: &str, files: &[(&str, &str)]) -> ResolveOutput {
        let mut loader = MemoryLoader::new().with("main.mk", entry_source);
        for (path, source) in files {
            loader = loader.with(*path, *source);
        }
        resolve(Path::new("main.mk"), Path::new(""), &loader)
    }

    fn codes(output: &ResolveOutput) -> Vec<ErrorCode> {
        output.diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn single_file_resolves() {
        let output = resolve_mem("fn main() -> Int { 1 }", &[]);
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.program.modules.len(), 1);
    }

    #[test]
    fn import_loads_module_file() {
        let output = resolve_mem(
            "import util\nfn main() -> Int { 1 }",
            &[("util.mk", "export { helper }\nfn helper() -> Int { 2 }")],
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let names: Vec<_> = output
            .program
            .modules
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["main", "util"]);
    }

    #[test]
    fn nested_import_path() {
        let output = resolve_mem(
            "import auth.user\nfn main() -> Int { 1 }",
            &[("auth/user.mk", "fn find() -> Int { 2 }")],
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert!(output
            .program
            .modules
            .iter()
            .any(|m| m.name == "auth.user"));
    }

    #[test]
    fn missing_module_is_e5001() {
        let output = resolve_mem("import nope\nfn main() -> Int { 1 }", &[]);
        assert_eq!(codes(&output), vec![ErrorCode::E5001]);
    }

    #[test]
    fn duplicate_module_is_e5002() {
        let output = resolve_mem(
            "module util { fn a() -> Int { 1 } }\nmodule util { fn b() -> Int { 2 } }",
            &[],
        );
        assert_eq!(codes(&output), vec![ErrorCode::E5002]);
    }

    #[test]
    fn import_cycle_is_e5004() {
        let output = resolve_mem(
            "import a\nfn main() -> Int { 1 }",
            &[("a.mk", "import b\nfn fa() -> Int { 1 }"), ("b.mk", "import a\nfn fb() -> Int { 2 }")],
        );
        assert!(
            codes(&output).contains(&ErrorCode::E5004),
            "{:?}",
            output.diagnostics
        );
    }

    #[test]
    fn modules_are_loaded_once() {
        let output = resolve_mem(
            "import a\nimport b\nfn main() -> Int { 1 }",
            &[
                ("a.mk", "import shared\nfn fa() -> Int { 1 }"),
                ("b.mk", "import shared\nfn fb() -> Int { 2 }"),
                ("shared.mk", "fn s() -> Int { 3 }"),
            ],
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let shared_count = output
            .program
            .modules
            .iter()
            .filter(|m| m.name == "shared")
            .count();
        assert_eq!(shared_count, 1);
    }

    #[test]
    fn parse_errors_poison_only_their_file() {
        let output = resolve_mem(
            "import bad\nfn main() -> Int { 1 }",
            &[("bad.mk", "fn broken( -> Int { 1 }")],
        );
        assert!(output.poisoned_files.contains("bad.mk"));
        assert!(!output.poisoned_files.contains("main.mk"));
    }
}
