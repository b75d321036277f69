//! cpre-util - Shared infrastructure for the cpre preprocessor.
//!
//! This crate holds the types every other crate in the workspace agrees on:
//! source locations, diagnostics, and the hash containers used throughout
//! the pipeline. It deliberately knows nothing about tokens or files; those
//! live in `cpre-lex`.

pub mod diag;
pub mod loc;

pub use diag::{CollectedDiagnostics, Diagnostic, DiagnosticSink, ErrorReported, Level, StderrSink};
pub use loc::SourceLoc;

// Re-export commonly used hash containers so downstream crates agree on the
// hasher without naming the dependency themselves.
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
