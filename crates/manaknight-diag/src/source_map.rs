//! Byte offset to line/column translation
//!
//! Tokens and AST nodes carry byte-offset spans; diagnostics report
//! 1-based line and column numbers counted in codepoints, with the
//! column resetting after every line feed.

/// Precomputed line starts for one source file.
#[derive(Debug, Clone)]
pub struct SourceMap {
    file: String,
    line_starts: Vec<usize>,
    source: String,
}

impl SourceMap {
    pub fn new(file: impl Into<String>, source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            file: file.into(),
            line_starts,
            source: source.to_string(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based (line, column) of a byte offset; columns count codepoints.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line_idx];
        let end = offset.min(self.source.len());
        let column = self.source[line_start..end].chars().count() + 1;
        (line_idx as u32 + 1, column as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_positions() {
        let map = SourceMap::new("m.mk", "let x = 1");
        assert_eq!(map.position(0), (1, 1));
        assert_eq!(map.position(4), (1, 5));
    }

    #[test]
    fn column_resets_after_newline() {
        let map = SourceMap::new("m.mk", "ab\ncd\nef");
        assert_eq!(map.position(3), (2, 1));
        assert_eq!(map.position(4), (2, 2));
        assert_eq!(map.position(6), (3, 1));
    }

    #[test]
    fn columns_count_codepoints_not_bytes() {
        // "é" is two bytes but one codepoint
        let map = SourceMap::new("m.mk", "é x");
        assert_eq!(map.position(2), (1, 2));
    }
}
