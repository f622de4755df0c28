//! Manaknight error catalog and diagnostics
//!
//! The error taxonomy is the public contract of the compiler: codes are
//! stable once assigned and grouped into nine fixed ranges. Every pass
//! accumulates `Diagnostic` values instead of aborting, and the driver
//! sorts the combined list by (file, line, column, code) before handing
//! it to the caller.

mod catalog;
mod source_map;

pub use catalog::{Category, ErrorCode};
pub use source_map::SourceMap;

use serde::{Deserialize, Serialize};

/// A single compiler diagnostic.
///
/// Serializes to the documented shape:
/// `{ code: "E2006", category, message, file, line, column }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub category: Category,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Diagnostic {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            code,
            category: code.category(),
            message: message.into(),
            file: file.into(),
            line,
            column,
        }
    }

    /// The CLI failure line: `Error E2006: shadowing ... at main.mk:3:9`.
    pub fn render(&self) -> String {
        format!(
            "Error {}: {} at {}:{}:{}",
            self.code, self.message, self.file, self.line, self.column
        )
    }
}

/// Sort diagnostics deterministically: by file, then position, then code.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(a.line.cmp(&b.line))
            .then(a.column.cmp(&b.column))
            .then(a.code.number().cmp(&b.code.number()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_line_format() {
        let d = Diagnostic::new(ErrorCode::E2006, "shadowing of `x`", "main.mk", 3, 9);
        assert_eq!(d.render(), "Error E2006: shadowing of `x` at main.mk:3:9");
    }

    #[test]
    fn sorting_is_by_file_then_position_then_code() {
        let mut list = vec![
            Diagnostic::new(ErrorCode::E2002, "b", "b.mk", 1, 1),
            Diagnostic::new(ErrorCode::E4001, "a2", "a.mk", 2, 5),
            Diagnostic::new(ErrorCode::E2001, "a1", "a.mk", 2, 5),
            Diagnostic::new(ErrorCode::E1001, "a0", "a.mk", 1, 9),
        ];
        sort_diagnostics(&mut list);
        let codes: Vec<_> = list.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                ErrorCode::E1001,
                ErrorCode::E2001,
                ErrorCode::E4001,
                ErrorCode::E2002
            ]
        );
    }

    #[test]
    fn category_is_derived_from_code() {
        let d = Diagnostic::new(ErrorCode::E5004, "cycle", "m.mk", 1, 1);
        assert_eq!(d.category, Category::Module);
    }
}
