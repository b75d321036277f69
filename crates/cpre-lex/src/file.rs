//! Source files as logical-line arrays with a cursor.
//!
//! A file is read fully on open, split into lines (`\n` with an optional
//! preceding `\r`), and then only the line array and the cursor remain; the
//! handle is closed before lexing starts. The display name and row offset
//! are mutable because `#line` rewrites both.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Longest logical line the lexer accepts; anything longer is a fatal
/// diagnostic at shift time.
pub const MAX_LINE_LEN: usize = 4096;

/// Error loading a source file.
#[derive(Debug, Error)]
pub enum FileError {
    /// The underlying read failed.
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A loaded source file on the lexer's file stack.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Physical name the file was opened under; include resolution uses
    /// this for the "directory of the including file" rule.
    pub name: String,
    /// Display name reported in diagnostics; `#line` may replace it.
    pub display: String,
    /// Logical lines without their terminators.
    pub lines: Vec<String>,
    /// Cursor row (physical, zero-based).
    pub row: usize,
    /// Cursor column (byte within the current line, zero-based).
    pub col: usize,
    /// Added to the physical row to produce the reported (one-based) line
    /// number; `#line` adjusts it.
    pub offset: i64,
    /// Predefined sources get system semantics (macro definitions made in
    /// them override silently and warn on user redefinition).
    pub system: bool,
    /// Set once a non-whitespace, non-`#` character has been seen on the
    /// current line; a later `#` then cannot open a directive.
    pub no_directive: bool,
}

impl SourceFile {
    /// Loads a file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<SourceFile, FileError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path.to_string_lossy().into_owned();
        Ok(Self::from_bytes(name, &bytes))
    }

    /// Builds a file from in-memory content, for tests and synthetic
    /// sources.
    pub fn from_string(name: impl Into<String>, content: &str) -> SourceFile {
        Self::from_bytes(name.into(), content.as_bytes())
    }

    fn from_bytes(name: String, bytes: &[u8]) -> SourceFile {
        let text = String::from_utf8_lossy(bytes);
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        // splitting "a\n" yields a phantom empty line after the terminator
        if lines.last().is_some_and(|l| l.is_empty()) && text.ends_with('\n') {
            lines.pop();
        }
        SourceFile {
            display: name.clone(),
            name,
            lines,
            row: 0,
            col: 0,
            offset: 1,
            system: false,
            no_directive: false,
        }
    }

    /// The synthetic `<define>` file that holds predefined `#define` and
    /// `#undef` lines. It sits on top of the stack so predefinitions are
    /// processed before the primary file, and it carries system semantics.
    pub fn predefine_source() -> SourceFile {
        let mut file = Self::from_bytes("<define>".to_string(), b"");
        file.system = true;
        file
    }

    /// The line under the cursor, or `None` past the end of the file.
    pub fn current_line(&self) -> Option<&str> {
        self.lines.get(self.row).map(String::as_str)
    }

    /// Reported (one-based) row for the cursor position.
    pub fn reported_row(&self) -> i64 {
        self.row as i64 + self.offset
    }

    /// Directory containing this file, for `"…"` include resolution.
    pub fn directory(&self) -> PathBuf {
        let path = Path::new(&self.name);
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_splitting() {
        let f = SourceFile::from_string("t.c", "a\nb\nc");
        assert_eq!(f.lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crlf_stripping() {
        let f = SourceFile::from_string("t.c", "a\r\nb\r\n");
        assert_eq!(f.lines, vec!["a", "b"]);
    }

    #[test]
    fn test_trailing_newline_has_no_phantom_line() {
        let f = SourceFile::from_string("t.c", "a\n");
        assert_eq!(f.lines, vec!["a"]);
    }

    #[test]
    fn test_empty_file() {
        let f = SourceFile::from_string("t.c", "");
        assert_eq!(f.lines, vec![""]);
        assert_eq!(f.current_line(), Some(""));
    }

    #[test]
    fn test_reported_row_follows_offset() {
        let mut f = SourceFile::from_string("t.c", "a\nb");
        assert_eq!(f.reported_row(), 1);
        f.row = 1;
        assert_eq!(f.reported_row(), 2);
        // "#line 10" on physical row 1 makes the next row report as 10
        f.offset = 10 - f.row as i64 - 1;
        f.row += 1;
        assert_eq!(f.reported_row(), 10);
    }

    #[test]
    fn test_predefine_source() {
        let f = SourceFile::predefine_source();
        assert!(f.system);
        assert_eq!(f.display, "<define>");
    }

    #[test]
    fn test_directory_of_bare_name() {
        let f = SourceFile::from_string("t.c", "");
        assert_eq!(f.directory(), PathBuf::from("."));
        let f = SourceFile::from_string("sub/dir/t.c", "");
        assert_eq!(f.directory(), PathBuf::from("sub/dir"));
    }

    #[test]
    fn test_open_missing_file_errors() {
        let err = SourceFile::open("/nonexistent/really/not/here.c");
        assert!(err.is_err());
    }
}
