//! Module source loading
//!
//! Resolution is strictly static: a dotted module name maps to exactly
//! one path under the compilation root, with no search path. The loader
//! trait is the seam that lets tests resolve from memory.

use std::fs;
use std::path::{Path, PathBuf};

/// Provides module sources by path.
pub trait ModuleLoader {
    /// Returns the file contents, or `None` when the file does not exist.
    fn load(&self, path: &Path) -> Option<String>;
}

/// Loads modules from the file system.
pub struct FsLoader;

impl ModuleLoader for FsLoader {
    fn load(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }
}

/// In-memory loader for tests.
#[derive(Default)]
pub struct MemoryLoader {
    files: std::collections::HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.files.insert(path.into(), source.into());
        self
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Map a dotted module name to its path: `a.b.c` -> `<base>/a/b/c.mk`.
pub fn module_path(base: &Path, name: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in name.split('.') {
        path.push(part);
    }
    path.set_extension("mk");
    path
}
