//! Source location tracking.
//!
//! A [`SourceLoc`] names a point in a source file by display name, reported
//! row and column. Both are one-based as the user should see them; the row
//! is signed because `#line` may renumber a file arbitrarily.

use std::fmt;

/// A point in a source file, as the user should see it.
///
/// # Examples
///
/// ```
/// use cpre_util::SourceLoc;
///
/// let loc = SourceLoc::new("main.c", 5, 3);
/// assert_eq!(loc.to_string(), "main.c:5:3");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceLoc {
    /// Display name of the file (mutable via `#line`, hence not a path).
    pub file: String,
    /// Reported row, one-based. Includes any `#line` offset.
    pub row: i64,
    /// Column, one-based.
    pub col: usize,
}

impl SourceLoc {
    /// Creates a location from its parts.
    pub fn new(file: impl Into<String>, row: i64, col: usize) -> Self {
        Self {
            file: file.into(),
            row,
            col,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let loc = SourceLoc::new("a.c", 1, 1);
        assert_eq!(loc.to_string(), "a.c:1:1");
    }

    #[test]
    fn test_renumbered_row() {
        // "#line 0" style renumbering can push the reported row to zero or
        // below; display must not panic.
        let loc = SourceLoc::new("a.c", 0, 4);
        assert_eq!(loc.to_string(), "a.c:0:4");
    }
}
