//! Diagnostics - error and warning reporting infrastructure.
//!
//! The lexer never prints anything itself. Every problem it finds becomes a
//! [`Diagnostic`] handed to a caller-installed [`DiagnosticSink`]. The sink
//! answers with a continue flag: warnings may be suppressed into hard stops,
//! errors always poison the producer.
//!
//! # Examples
//!
//! ```
//! use cpre_util::diag::{Diagnostic, DiagnosticSink, Level};
//! use cpre_util::SourceLoc;
//!
//! struct Quiet;
//!
//! impl DiagnosticSink for Quiet {
//!     fn report(&mut self, _diag: &Diagnostic) -> bool {
//!         true
//!     }
//! }
//! ```

use std::fmt;

use crate::loc::SourceLoc;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// A warning; the producer keeps going unless the sink says otherwise.
    Warning,
    /// An error that poisons the producer.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// A single diagnostic message with severity and location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub level: Level,
    /// Where the problem was found.
    pub loc: SourceLoc,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    pub fn new(level: Level, loc: SourceLoc, message: impl Into<String>) -> Self {
        Self {
            level,
            loc,
            message: message.into(),
        }
    }

    /// Creates an error diagnostic.
    pub fn error(loc: SourceLoc, message: impl Into<String>) -> Self {
        Self::new(Level::Error, loc, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(loc: SourceLoc, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, loc, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "* {}: ({}) {}", self.level, self.loc, self.message)
    }
}

/// Receiver for diagnostics.
///
/// `report` returns whether the producer should continue. The return value
/// is honored for warnings; errors stop the producer regardless.
pub trait DiagnosticSink {
    /// Reports one diagnostic; returns the continue flag.
    fn report(&mut self, diag: &Diagnostic) -> bool;
}

/// Default sink: prints to stderr, continues on warnings, stops on errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diag: &Diagnostic) -> bool {
        eprintln!("{diag}");
        diag.level != Level::Error
    }
}

/// Sink that records every diagnostic, for tests and batch drivers.
#[derive(Clone, Debug, Default)]
pub struct CollectedDiagnostics {
    /// Everything reported so far, in order.
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectedDiagnostics {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any error-level diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    /// Messages of all recorded diagnostics, for assertions.
    pub fn messages(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.message.as_str()).collect()
    }
}

impl DiagnosticSink for CollectedDiagnostics {
    fn report(&mut self, diag: &Diagnostic) -> bool {
        let keep_going = diag.level != Level::Error;
        self.diagnostics.push(diag.clone());
        keep_going
    }
}

// A shared handle to a collection, so callers can keep reading what the
// producer reports.
impl DiagnosticSink for std::rc::Rc<std::cell::RefCell<CollectedDiagnostics>> {
    fn report(&mut self, diag: &Diagnostic) -> bool {
        self.borrow_mut().report(diag)
    }
}

/// Marker returned by fallible lexer operations after a diagnostic has
/// already been emitted through the sink. Carrying no payload keeps `?`
/// chains cheap and makes "silent" failures impossible to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorReported;

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLoc {
        SourceLoc::new("t.c", 3, 6)
    }

    #[test]
    fn test_display_format() {
        let d = Diagnostic::error(loc(), "bad token");
        assert_eq!(d.to_string(), "* ERROR: (t.c:3:6) bad token");
    }

    #[test]
    fn test_collected_sink_stops_on_error() {
        let mut sink = CollectedDiagnostics::new();
        assert!(sink.report(&Diagnostic::warning(loc(), "w")));
        assert!(!sink.report(&Diagnostic::error(loc(), "e")));
        assert!(sink.has_errors());
        assert_eq!(sink.messages(), vec!["w", "e"]);
    }

    #[test]
    fn test_warning_keeps_going() {
        let mut sink = CollectedDiagnostics::new();
        assert!(sink.report(&Diagnostic::warning(loc(), "only a warning")));
        assert!(!sink.has_errors());
    }
}
