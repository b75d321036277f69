//! cpre-drv - Driver for the cpre preprocessor.
//!
//! The driver wires the configuration surface of [`cpre_lex::Lexer`] to the
//! outside world: command-line flags and an optional TOML file feed a
//! [`Config`], a [`Session`] runs the lexer to completion, and the token
//! stream is re-printed with brace-driven indentation so the output stays
//! readable.

pub mod config;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use cpre_lex::{GnuExt, Lexer, Operator, SourceFile, Token, TokenKind};

pub use config::{split_define, FileConfig, CONFIG_FILE_NAME};

/// Everything a preprocessing run needs.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// The primary source file.
    pub input: PathBuf,
    /// System include search directories, in order.
    pub include_paths: Vec<PathBuf>,
    /// Library search directories.
    pub library_paths: Vec<PathBuf>,
    /// Predefined macros, `NAME` or `NAME=VALUE`.
    pub defines: Vec<String>,
    /// Names undefined before lexing starts.
    pub undefs: Vec<String>,
    /// `__has_builtin` names.
    pub builtins: Vec<String>,
    /// `__has_feature` names.
    pub features: Vec<String>,
    /// `__has_extension` names.
    pub extensions: Vec<String>,
    /// Allow `$` in identifiers.
    pub dollar_idents: bool,
    /// Allow the `\e` escape.
    pub escape_e: bool,
    /// Reserve `__VA_OPT__` in variadic bodies.
    pub va_opt: bool,
}

impl Config {
    /// Folds a configuration file underneath this config; existing entries
    /// keep priority by coming later (lexer options are append-only, so
    /// file entries are simply applied first).
    pub fn apply_file(&mut self, file: &FileConfig) {
        let prepend = |target: &mut Vec<PathBuf>, source: &[String]| {
            let mut merged: Vec<PathBuf> = source.iter().map(PathBuf::from).collect();
            merged.append(target);
            *target = merged;
        };
        prepend(&mut self.include_paths, &file.include_paths);
        prepend(&mut self.library_paths, &file.library_paths);
        let prepend_names = |target: &mut Vec<String>, source: &[String]| {
            let mut merged = source.to_vec();
            merged.append(target);
            *target = merged;
        };
        prepend_names(&mut self.defines, &file.defines);
        prepend_names(&mut self.undefs, &file.undefs);
        prepend_names(&mut self.builtins, &file.builtins);
        prepend_names(&mut self.features, &file.features);
        prepend_names(&mut self.extensions, &file.extensions);
    }
}

/// One preprocessing run over one input file.
pub struct Session {
    config: Config,
}

impl Session {
    /// Creates a session for the given configuration.
    pub fn new(config: Config) -> Session {
        Session { config }
    }

    /// Builds the configured lexer.
    fn build_lexer(&self) -> anyhow::Result<Lexer> {
        let file = SourceFile::open(&self.config.input)
            .with_context(|| format!("cannot open '{}'", self.config.input.display()))?;
        let mut lexer = Lexer::new(file);
        for dir in &self.config.include_paths {
            lexer.add_include_path(dir.clone());
        }
        for dir in &self.config.library_paths {
            lexer.add_library_path(dir.clone());
        }
        for spec in &self.config.defines {
            let (name, value) = split_define(spec);
            lexer.define(name, value);
        }
        for name in &self.config.undefs {
            lexer.undef(name);
        }
        for name in &self.config.builtins {
            lexer.add_builtin(name);
        }
        for name in &self.config.features {
            lexer.add_feature(name);
        }
        for name in &self.config.extensions {
            lexer.add_extension(name);
        }
        lexer.set_gnu_ext(GnuExt::DollarIdent, self.config.dollar_idents);
        lexer.set_gnu_ext(GnuExt::EscapeChar, self.config.escape_e);
        lexer.set_gnu_ext(GnuExt::VaOptMacro, self.config.va_opt);
        Ok(lexer)
    }

    /// Preprocesses the input and pretty-prints the token stream. Returns
    /// false when the lexer was poisoned by a diagnostic.
    pub fn run(&self, out: &mut impl Write) -> anyhow::Result<bool> {
        let mut lexer = self.build_lexer()?;
        debug!(input = %self.config.input.display(), "starting preprocessing");

        let mut printer = TokenPrinter::new();
        while let Some(token) = lexer.next_token() {
            printer.print(&token, out)?;
        }
        printer.finish(out)?;

        debug!(poisoned = lexer.poisoned(), "preprocessing finished");
        Ok(!lexer.poisoned())
    }

    /// Preprocesses the input and returns the token texts, for tests and
    /// embedding.
    pub fn tokens(&self) -> anyhow::Result<(Vec<Token>, bool)> {
        let mut lexer = self.build_lexer()?;
        let tokens: Vec<Token> = std::iter::from_fn(|| lexer.next_token()).collect();
        let clean = !lexer.poisoned();
        Ok((tokens, clean))
    }
}

/// Re-prints a token stream with brace indentation: `{`/`}` get their own
/// lines, `;` ends a line, and a closing brace directly followed by `;`
/// stays on one line (type definitions read naturally that way).
struct TokenPrinter {
    /// Tokens printed on the current line.
    on_line: usize,
    /// Current indent, in spaces.
    indent: usize,
    /// A `}` was seen and may still merge with a following `;`.
    pending_close: bool,
}

impl TokenPrinter {
    fn new() -> TokenPrinter {
        TokenPrinter {
            on_line: 0,
            indent: 0,
            pending_close: false,
        }
    }

    fn pad(&self, out: &mut impl Write, width: usize) -> std::io::Result<()> {
        write!(out, "{:width$}", "")
    }

    fn print(&mut self, token: &Token, out: &mut impl Write) -> std::io::Result<()> {
        match &token.kind {
            TokenKind::Operator(Operator::LBrace) => {
                if self.pending_close {
                    self.pending_close = false;
                    self.indent = self.indent.saturating_sub(4);
                    self.pad(out, self.indent)?;
                    writeln!(out, "}}")?;
                }
                let width = if self.on_line == 0 { self.indent } else { 0 };
                self.pad(out, width)?;
                writeln!(out, "{{")?;
                self.on_line = 0;
                self.indent += 4;
            }
            TokenKind::Operator(Operator::RBrace) => {
                if self.pending_close {
                    self.on_line = 0;
                    self.indent = self.indent.saturating_sub(4);
                    self.pad(out, self.indent)?;
                    writeln!(out, "}}")?;
                }
                self.pending_close = true;
            }
            TokenKind::Operator(Operator::Semicolon) => {
                if self.pending_close {
                    self.pending_close = false;
                    self.indent = self.indent.saturating_sub(4);
                    self.pad(out, self.indent)?;
                    write!(out, "}} ")?;
                }
                self.on_line = 0;
                writeln!(out, ";")?;
            }
            _ => {
                if self.pending_close {
                    self.pending_close = false;
                    self.on_line = 0;
                    self.indent = self.indent.saturating_sub(4);
                    self.pad(out, self.indent)?;
                    writeln!(out, "}}")?;
                }
                if self.on_line == 0 {
                    self.pad(out, self.indent)?;
                }
                self.on_line += 1;
                write!(out, "{} ", token.text())?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        if self.pending_close {
            self.pending_close = false;
            writeln!(out, "}}")?;
        } else if self.on_line > 0 {
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_source(source: &str) -> String {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.c");
        std::fs::write(&path, source).expect("write input");
        let session = Session::new(Config {
            input: path,
            ..Config::default()
        });
        let mut out = Vec::new();
        session.run(&mut out).expect("session runs");
        String::from_utf8(out).expect("utf-8 output")
    }

    #[test]
    fn test_statement_per_line() {
        let text = run_source("int x = 1; int y = 2;");
        assert_eq!(text, "int x = 1 ;\nint y = 2 ;\n");
    }

    #[test]
    fn test_brace_indentation() {
        let text = run_source("void f() { g(); }");
        assert_eq!(text, "void f ( ) {\n    g ( ) ;\n}\n");
    }

    #[test]
    fn test_struct_close_merges_with_semicolon() {
        let text = run_source("struct s { int a; };");
        assert!(text.ends_with("} ;\n"), "got: {text:?}");
    }
}
