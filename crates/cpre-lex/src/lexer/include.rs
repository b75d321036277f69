//! Include-file resolution.
//!
//! `"name"` first probes the directory of the including file, then the
//! system include paths in order; `<name>` probes only the system paths.
//! `#include_next` resumes the search after the entry that produced the
//! including file, matched by canonicalized directory identity.
//!
//! `check_only` drives `__has_include`: the search runs without loading
//! anything and without raising diagnostics.

use std::fs;
use std::path::{Path, PathBuf};

use crate::file::SourceFile;

use super::{LexResult, Lexer};

/// Joins a search directory and an include spelling; absolute spellings
/// stand alone.
fn path_concat(base: &Path, name: &str) -> PathBuf {
    if name.starts_with('/') {
        PathBuf::from(name)
    } else {
        base.join(name)
    }
}

impl Lexer {
    /// Resolves and (unless probing) pushes an include file. Returns
    /// whether the file was found; in probe mode failures are silent.
    pub(super) fn load_include(&mut self, fname: &str, check_only: bool) -> LexResult<bool> {
        let mut load = true;
        let mut next = false;
        let mut found = false;
        let mut next_dir: Option<PathBuf> = None;

        // absolute paths make "_next" meaningless
        if fname.starts_with('/') && self.include_next {
            self.include_next = false;
            self.warning("#include_next with absolute path");
        }

        if self.include_next {
            if self.files.len() == 1 {
                self.warning("#include_next in primary source file");
            }
            let dir = self.file().directory();
            match fs::canonicalize(&dir) {
                Ok(canonical) => next_dir = Some(canonical),
                Err(err) => {
                    if check_only {
                        return Ok(false);
                    }
                    return Err(self.error(format!(
                        "Cannot read directory '{}': {err}",
                        dir.display()
                    )));
                }
            }
            // for <...> the search starts after the producing entry
            if self.include_sys {
                load = false;
            }
            next = true;
        }

        // the including file's own directory comes first for "..."
        if !next && !self.include_sys {
            let path = path_concat(&self.file().directory(), fname);
            if path.exists() {
                found = true;
                if !self.push_file(&path, check_only) {
                    if check_only {
                        return Ok(false);
                    }
                    return Err(self.error(format!("Cannot open include file '{fname}'")));
                }
            }
        }

        let search_dirs = self.include_paths.clone();
        for dir in search_dirs {
            if found {
                break;
            }
            let mut load_after = load;
            if next {
                match fs::canonicalize(&dir) {
                    Err(_) => continue,
                    Ok(canonical) => {
                        if Some(&canonical) == next_dir.as_ref() {
                            load = false;
                            load_after = true;
                        }
                    }
                }
            }
            if load {
                let path = path_concat(&dir, fname);
                if path.exists() {
                    found = true;
                    if !self.push_file(&path, check_only) {
                        if check_only {
                            return Ok(false);
                        }
                        return Err(self.error(format!("Cannot open include file '{fname}'")));
                    }
                }
            }
            load = load_after;
        }

        if found {
            return Ok(true);
        }
        if check_only {
            return Ok(false);
        }
        Err(self.error(format!(
            "Cannot open include file '{fname}': No such file or directory"
        )))
    }

    /// Opens and (unless probing) pushes a file onto the stack.
    fn push_file(&mut self, path: &Path, check_only: bool) -> bool {
        match SourceFile::open(path) {
            Ok(file) => {
                if !check_only {
                    self.files.push(file);
                }
                true
            }
            Err(_) => false,
        }
    }
}
