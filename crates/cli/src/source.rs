// Multi-file source handling: the files concatenate into one program text
// (declaration order follows the path order), and spans map back to their
// file, line, and column through the offset table.

use std::path::{Path, PathBuf};

use lang_ast::Span;

pub struct SourceMap {
    text: String,
    files: Vec<FileEntry>,
}

struct FileEntry {
    path: PathBuf,
    start: u32,
    end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl SourceMap {
    pub fn load(paths: &[PathBuf]) -> Result<Self, String> {
        let mut text = String::new();
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            let start = text.len() as u32;
            text.push_str(&content);
            if !text.ends_with('\n') {
                text.push('\n');
            }
            files.push(FileEntry {
                path: path.clone(),
                start,
                end: text.len() as u32,
            });
        }
        Ok(SourceMap { text, files })
    }

    #[cfg(test)]
    pub fn from_source(path: &str, content: &str) -> Self {
        let mut text = content.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        let end = text.len() as u32;
        SourceMap {
            text,
            files: vec![FileEntry {
                path: PathBuf::from(path),
                start: 0,
                end,
            }],
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Map a span's start offset to file, 1-based line, and column.
    pub fn locate(&self, span: Span) -> Option<Location> {
        let entry = self
            .files
            .iter()
            .find(|f| span.start >= f.start && span.start < f.end)?;
        let local = &self.text[entry.start as usize..span.start as usize];
        let line = local.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
        let column = match local.rfind('\n') {
            Some(i) => (local.len() - i) as u32,
            None => local.len() as u32 + 1,
        };
        Some(Location {
            path: entry.path.clone(),
            line,
            column,
        })
    }

    pub fn snippet(&self, span: Span) -> &str {
        let start = span.start as usize;
        let line_start = self.text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = self.text[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(self.text.len());
        &self.text[line_start..line_end]
    }
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_lines_and_columns() {
        let map = SourceMap::from_source("demo.tarn", "abc\ndef g\n");
        let loc = map.locate(Span::new(4, 5)).expect("in range");
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 1);
        let loc = map.locate(Span::new(8, 9)).expect("in range");
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 5);
    }

    #[test]
    fn snippet_is_the_surrounding_line() {
        let map = SourceMap::from_source("demo.tarn", "first\nsecond line\nthird");
        assert_eq!(map.snippet(Span::new(8, 9)), "second line");
    }
}
