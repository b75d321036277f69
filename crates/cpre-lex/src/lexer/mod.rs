//! The combined lexer and preprocessor.
//!
//! A single pull operation drives everything: [`Lexer::next_token`] runs the
//! primary state machine until a fully-preprocessed token is available or
//! the source is exhausted. Two character-level machines share the cursor:
//! the full tokenizer (substate dispatch, [`substate`]) while the innermost
//! conditional branch is active, and a cheap directive-spotting scanner
//! ([`conditional`]) while it is not. Directive lines are collected on the
//! token chain and applied by the directive engine ([`directive`]), which
//! calls into include resolution ([`include`]), the macro engine
//! ([`macros`]) and the constant-expression evaluator ([`eval`]).

mod conditional;
mod directive;
mod eval;
mod include;
mod macros;
mod substate;

use std::path::PathBuf;

use cpre_util::diag::{Diagnostic, DiagnosticSink, ErrorReported, StderrSink};
use cpre_util::{FxHashSet, SourceLoc};
use indexmap::IndexMap;

use crate::chain::TokenChain;
use crate::file::{SourceFile, MAX_LINE_LEN};
use crate::predef;
use crate::symbol::{Builtin, MacroSymbol};
use crate::token::{keyword_from_ident, Token, TokenKind};

pub(crate) type LexResult<T> = Result<T, ErrorReported>;

pub(crate) use conditional::{CondScanner, CondState};
pub(crate) use directive::{DefineState, Directive};

/// Primary lexer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Fresh lexer; no character read yet.
    Init,
    /// Read the next character from the active file.
    Shift,
    /// Active file exhausted; flush and pop the file stack.
    PopFile,
    /// End of logical line; flush and advance the cursor.
    NextLine,
    /// `\` line continuation; advance the cursor without flushing.
    NextLineCont,
    /// A character is ready in `ch`.
    GotChar,
    /// A `#` opened a directive line.
    GotDirective,
    /// Apply the collected directive line.
    Commit,
    /// A token was committed; the trigger character was consumed.
    Accept,
    /// A token was committed; re-process the trigger character.
    AcceptKeep,
    /// A fatal diagnostic was raised.
    Reject,
    /// Terminal: only the end-of-source sentinel remains.
    End,
}

/// Substate: which partial token the tokenizer is assembling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubState {
    Idle,
    Ident,
    Str,
    StrEscape,
    StrEscapeHex,
    StrEscapeHexDigit,
    StrEscapeHexEnd,
    StrEscapeOct2,
    StrEscapeOct3,
    IncludeFile,
    Number,
    NumberZero,
    NumberOrDot,
    NumberBin,
    NumberBinDigits,
    NumberHex,
    NumberHexDigits,
    NumberOct,
    NumberSuffixU,
    NumberSuffixL,
    NumberSuffixUl,
    Decimal,
    DecimalExp,
    DecimalExpDigits,
    DecimalExpSign,
    OpPlus,
    OpMinus,
    OpStar,
    OpSlash,
    OpPercent,
    OpAssign,
    OpGt,
    OpShr,
    OpLt,
    OpShl,
    OpNot,
    OpAnd,
    OpOr,
    OpXor,
    OpHash,
    OpEllipsis,
    LineComment,
    BlockComment,
    BlockCommentStar,
}

/// One frame per open `#if`/`#ifdef`/`#ifndef` group.
#[derive(Clone, Copy, Debug)]
struct CondFrame {
    /// Value of the current branch; zero means inactive.
    value: i64,
    /// A branch of this group already succeeded; later `#elif`/`#else`
    /// branches are forced inactive.
    taken: bool,
}

/// Optional lexer extensions, GNU-compatible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GnuExt {
    /// Allow `$` in identifiers.
    DollarIdent,
    /// Allow the `\e` (ESC) escape in char and string literals.
    EscapeChar,
    /// Reserve `__VA_OPT__` handling (accepted in variadic bodies).
    VaOptMacro,
}

#[derive(Clone, Copy, Debug, Default)]
struct GnuExts {
    dollar_ident: bool,
    escape_char: bool,
    va_opt_macro: bool,
}

/// The combined lexer and preprocessor.
///
/// Owns the file stack, symbol table, pending-token chain, conditional
/// stack, include paths and feature sets. Pulling tokens drives the whole
/// pipeline; configuration calls are only legal before the first pull.
///
/// # Example
///
/// ```
/// use cpre_lex::{Lexer, SourceFile};
///
/// let file = SourceFile::from_string("demo.c", "#define ANSWER 42\nint x = ANSWER;\n");
/// let mut lexer = Lexer::new(file);
/// let tokens: Vec<String> = std::iter::from_fn(|| lexer.next_token())
///     .map(|t| t.text())
///     .collect();
/// assert_eq!(tokens, ["int", "x", "=", "42", ";"]);
/// ```
pub struct Lexer {
    // ownership
    files: Vec<SourceFile>,
    symbols: IndexMap<String, MacroSymbol>,
    tokens: TokenChain,
    eval_stack: Vec<CondFrame>,

    // lexeme assembly
    token_buffer: String,
    source: String,

    // state machine
    state: State,
    substate: SubState,
    cond: CondScanner,

    // flags
    flag_eof: bool,
    flag_eol: bool,
    in_directive: bool,
    char_seq: bool,
    substituting: bool,
    subst_level: usize,
    newly_committed: bool,
    end_of_source: bool,
    had_error: bool,

    // current directive
    directive: Option<Directive>,
    include_next: bool,
    include_sys: bool,
    define: DefineState,

    // current position
    ch: char,
    loc: SourceLoc,

    // configuration
    include_paths: Vec<PathBuf>,
    library_paths: Vec<PathBuf>,
    builtins: FxHashSet<String>,
    features: FxHashSet<String>,
    extensions: FxHashSet<String>,
    gnuext: GnuExts,
    sccs_msgs: Vec<String>,
    sink: Box<dyn DiagnosticSink>,
}

impl Lexer {
    /// Creates a lexer over a primary source file.
    ///
    /// The synthetic `<define>` file is stacked on top of the primary file
    /// so the predefined macro set is processed first.
    pub fn new(file: SourceFile) -> Lexer {
        let mut lexer = Lexer {
            files: vec![file],
            symbols: IndexMap::new(),
            tokens: TokenChain::new(),
            eval_stack: Vec::new(),
            token_buffer: String::new(),
            source: String::new(),
            state: State::Init,
            substate: SubState::Idle,
            cond: CondScanner::new(),
            flag_eof: false,
            flag_eol: false,
            in_directive: false,
            char_seq: false,
            substituting: false,
            subst_level: 0,
            newly_committed: false,
            end_of_source: false,
            had_error: false,
            directive: None,
            include_next: false,
            include_sys: false,
            define: DefineState::default(),
            ch: '\0',
            loc: SourceLoc::default(),
            include_paths: Vec::new(),
            library_paths: Vec::new(),
            builtins: FxHashSet::default(),
            features: FxHashSet::default(),
            extensions: FxHashSet::default(),
            gnuext: GnuExts::default(),
            sccs_msgs: Vec::new(),
            sink: Box::new(StderrSink),
        };
        lexer.files.push(SourceFile::predefine_source());
        for (name, value) in predef::all_defines() {
            lexer.define(name, Some(value));
        }
        lexer.register_builtins();
        lexer
    }

    /// Convenience constructor over in-memory source, mostly for tests.
    pub fn from_source(name: &str, content: &str) -> Lexer {
        Self::new(SourceFile::from_string(name, content))
    }

    fn register_builtins(&mut self) {
        let object = [
            ("__FILE__", Builtin::File),
            ("__LINE__", Builtin::Line),
            ("__DATE__", Builtin::Date),
            ("__TIME__", Builtin::Time),
            ("__TIMESTAMP__", Builtin::Timestamp),
            ("__BASE_FILE__", Builtin::BaseFile),
            ("__INCLUDE_LEVEL__", Builtin::IncludeLevel),
            ("__func__", Builtin::Identity),
            ("__FUNCTION__", Builtin::Identity),
        ];
        let function = [
            ("defined", Builtin::Defined),
            ("__has_include", Builtin::HasInclude),
            ("__has_include_next", Builtin::HasIncludeNext),
            ("__has_builtin", Builtin::HasBuiltin),
            ("__has_feature", Builtin::HasFeature),
            ("__has_extension", Builtin::HasExtension),
        ];
        for (name, builtin) in object {
            self.symbols
                .insert(name.to_string(), MacroSymbol::builtin_object(name, builtin));
        }
        for (name, builtin) in function {
            self.symbols
                .insert(name.to_string(), MacroSymbol::builtin_function(name, builtin));
        }
    }

    // ------------------------------------------------------------------
    // configuration (before the first pull only)
    // ------------------------------------------------------------------

    fn assert_configurable(&self) {
        assert!(
            self.state == State::Init,
            "lexer configuration is only legal before the first token is pulled"
        );
    }

    /// Pre-defines a macro by synthesizing a `#define` line in `<define>`.
    pub fn define(&mut self, name: &str, value: Option<&str>) {
        self.assert_configurable();
        let line = match value {
            Some(value) => format!("#define {name} {value}"),
            None => format!("#define {name}"),
        };
        self.predef_file().lines.push(line);
    }

    /// Pre-undefines a macro by synthesizing an `#undef` line.
    pub fn undef(&mut self, name: &str) {
        self.assert_configurable();
        let line = format!("#undef {name}");
        self.predef_file().lines.push(line);
    }

    fn predef_file(&mut self) -> &mut SourceFile {
        self.files.last_mut().expect("file stack cannot be empty")
    }

    /// Appends a system include search directory.
    pub fn add_include_path(&mut self, path: impl Into<PathBuf>) {
        self.assert_configurable();
        self.include_paths.push(path.into());
    }

    /// Appends a library search directory.
    pub fn add_library_path(&mut self, path: impl Into<PathBuf>) {
        self.assert_configurable();
        self.library_paths.push(path.into());
    }

    /// Registers a name for `__has_builtin`.
    pub fn add_builtin(&mut self, name: &str) {
        self.assert_configurable();
        self.builtins.insert(name.to_string());
    }

    /// Registers a name for `__has_feature`.
    pub fn add_feature(&mut self, name: &str) {
        self.assert_configurable();
        self.features.insert(name.to_string());
    }

    /// Registers a name for `__has_extension`.
    pub fn add_extension(&mut self, name: &str) {
        self.assert_configurable();
        self.extensions.insert(name.to_string());
    }

    /// Toggles a GNU-compatible lexer extension.
    pub fn set_gnu_ext(&mut self, ext: GnuExt, enabled: bool) {
        self.assert_configurable();
        match ext {
            GnuExt::DollarIdent => self.gnuext.dollar_ident = enabled,
            GnuExt::EscapeChar => self.gnuext.escape_char = enabled,
            GnuExt::VaOptMacro => self.gnuext.va_opt_macro = enabled,
        }
    }

    /// Installs the diagnostic sink, returning the previous one.
    pub fn set_diagnostic_sink(&mut self, sink: Box<dyn DiagnosticSink>) -> Box<dyn DiagnosticSink> {
        std::mem::replace(&mut self.sink, sink)
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    /// Messages collected from `#sccs` directives, in order.
    pub fn sccs_messages(&self) -> &[String] {
        &self.sccs_msgs
    }

    /// Library search directories, kept for the driver's later stages.
    pub fn library_search_paths(&self) -> &[PathBuf] {
        &self.library_paths
    }

    /// Current value of a GNU-compatible extension toggle.
    pub fn gnu_ext(&self, ext: GnuExt) -> bool {
        match ext {
            GnuExt::DollarIdent => self.gnuext.dollar_ident,
            GnuExt::EscapeChar => self.gnuext.escape_char,
            GnuExt::VaOptMacro => self.gnuext.va_opt_macro,
        }
    }

    /// True once a fatal diagnostic has poisoned the lexer.
    pub fn poisoned(&self) -> bool {
        self.had_error
    }

    /// True if a macro with this name is currently defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    // ------------------------------------------------------------------
    // pull API
    // ------------------------------------------------------------------

    /// Returns the next fully-preprocessed token, with identifier-to-
    /// keyword promotion applied, or `None` at end of source (and forever
    /// after a fatal diagnostic).
    pub fn next_token(&mut self) -> Option<Token> {
        if self.tokens.is_empty() && !self.advance() {
            return None;
        }
        let mut token = self.tokens.pop_front()?;
        if let TokenKind::Ident(name) = &token.kind {
            if let Some(kw) = keyword_from_ident(name) {
                token.kind = TokenKind::Keyword(kw);
            }
        }
        Some(token)
    }

    /// Runs the state machine until tokens are available or the source is
    /// exhausted. Returns false after a fatal diagnostic.
    fn advance(&mut self) -> bool {
        loop {
            match self.state {
                State::Init => {
                    self.state = State::Shift;
                    self.file_mut().no_directive = false;
                    self.token_buffer.clear();
                }

                State::Shift => {
                    if self.shift_char().is_err() {
                        continue;
                    }
                }

                State::PopFile => {
                    if self.pop_file().is_err() {
                        continue;
                    }
                }

                State::NextLine => {
                    self.flag_eol = true;
                    let flushed = if self.dropping_chars() {
                        self.handle_condition()
                    } else {
                        self.handle_substate()
                    };
                    if flushed.is_err() {
                        continue;
                    }
                    let file = self.file_mut();
                    file.row += 1;
                    file.col = 0;
                    file.no_directive = false;
                }

                State::NextLineCont => {
                    let file = self.file_mut();
                    file.row += 1;
                    file.col = 0;
                    self.state = State::Shift;
                }

                State::GotChar => {
                    if self.got_char().is_err() {
                        continue;
                    }
                }

                State::GotDirective => {
                    self.state = State::Shift;
                    self.in_directive = true;
                    self.file_mut().no_directive = true;
                }

                State::Commit => {
                    let handled = self.handle_directive();
                    self.file_mut().no_directive = false;
                    if handled.is_err() || self.state == State::Reject {
                        continue;
                    }
                    let _ = self.commit_directive();
                }

                State::Accept | State::AcceptKeep => {
                    if let Some(ready) = self.on_accept() {
                        return ready;
                    }
                }

                State::Reject => {
                    self.state = State::End;
                    self.substate = SubState::Idle;
                    return false;
                }

                State::End => return true,
            }
        }
    }

    /// Reads the next character, or dispatches end-of-line / end-of-file.
    fn shift_char(&mut self) -> LexResult<()> {
        let (line_len, over_limit, past_eof, at_eol) = {
            let file = self.file();
            match file.current_line() {
                None => (0, false, true, false),
                Some(line) => (
                    line.len(),
                    line.len() > MAX_LINE_LEN,
                    false,
                    file.col >= line.len(),
                ),
            }
        };
        if past_eof {
            self.state = State::PopFile;
            return Ok(());
        }
        if over_limit {
            return Err(self.error("Line too long"));
        }
        if at_eol {
            self.state = State::NextLine;
            return Ok(());
        }

        let (ch, col, row, display, tail_is_blank) = {
            let file = self.file_mut();
            let ch = file.lines[file.row][file.col..]
                .chars()
                .next()
                .expect("column bounds checked above");
            file.col += ch.len_utf8();
            let tail = &file.lines[file.row][file.col..];
            let tail_is_blank = !tail.is_empty() && tail.chars().all(char::is_whitespace);
            (
                ch,
                file.col,
                file.reported_row(),
                file.display.clone(),
                tail_is_blank,
            )
        };
        self.ch = ch;
        self.loc = SourceLoc::new(display, row, col);

        if ch != '\\' {
            self.state = State::GotChar;
        } else if col == line_len {
            self.state = State::NextLineCont;
        } else if tail_is_blank {
            self.state = State::NextLineCont;
            self.warning("Whitespaces after line continuation");
        } else {
            self.state = State::GotChar;
        }
        Ok(())
    }

    /// Flushes the partial token with an EOF pseudo-character, then pops
    /// the file stack or marks end of source.
    fn pop_file(&mut self) -> LexResult<()> {
        if self.substituting {
            return Err(self.error("Unterminated function-like macro invocation"));
        }
        if self.end_of_source {
            if !self.eval_stack.is_empty() {
                return Err(self.error("Unterminated conditional directive"));
            }
            self.state = State::End;
            self.substate = SubState::Idle;
            return Ok(());
        }

        self.flag_eof = true;
        if self.dropping_chars() {
            self.handle_condition()?;
        } else {
            self.handle_substate()?;
        }

        if self.files.len() == 1 {
            self.end_of_source = true;
            return Ok(());
        }
        self.files.pop();
        self.file_mut().no_directive = false;
        Ok(())
    }

    /// Routes the current character to the active machine.
    fn got_char(&mut self) -> LexResult<()> {
        if self.dropping_chars() {
            self.flag_eof = false;
            self.flag_eol = false;
            return self.handle_condition();
        }

        // "#define NAME" has been parsed but the macro kind is still open:
        // the very next character decides, a '(' making it function-like.
        if self.directive == Some(Directive::Define)
            && self.define.name.is_some()
            && !self.define.object_like
            && !self.define.function_like
        {
            if self.ch == '(' {
                self.define.function_like = true;
            } else {
                self.define.object_like = true;
            }
        }

        if !self.flag_eof && !self.flag_eol {
            self.source.push(self.ch);
        }
        self.flag_eof = false;
        self.flag_eol = false;
        self.handle_substate()?;

        if !self.ch.is_whitespace() {
            self.file_mut().no_directive = true;
        }
        Ok(())
    }

    /// A token was accepted. Applies directive collection or the
    /// function-like invocation look-ahead, and decides whether the caller
    /// gets tokens now. `Some(ready)` ends the advance loop.
    fn on_accept(&mut self) -> Option<bool> {
        let keep = self.state == State::AcceptKeep;
        self.state = if keep { State::GotChar } else { State::Shift };
        self.substate = SubState::Idle;
        let newly = std::mem::take(&mut self.newly_committed);

        if self.in_directive {
            let _ = self.handle_directive();
            return None;
        }
        if self.tokens.is_empty() {
            return None;
        }
        if !newly {
            // end-of-line re-entry: nothing new was committed this round
            return if self.substituting { None } else { Some(true) };
        }

        let last = self.tokens.last();
        if !self.substituting {
            let function_like = match self.tokens.get(last).ident() {
                Some(name) => self.symbols.get(name).map(|sym| sym.function_like),
                None => None,
            };
            match function_like {
                Some(true) => {
                    // buffer tokens until the invocation's closing ')'
                    self.substituting = true;
                    self.subst_level = 0;
                    return None;
                }
                Some(false) => {} // object-like: substitute now
                None => return Some(true),
            }
        } else {
            let token = self.tokens.get(last);
            let lparen = token.is_operator(crate::token::Operator::LParen);
            let rparen = token.is_operator(crate::token::Operator::RParen);
            if self.subst_level == 0 && !lparen {
                // the macro name was not an invocation after all
                self.substituting = false;
                return Some(true);
            }
            if !matches!(token.kind, TokenKind::Operator(_)) {
                return None;
            }
            if lparen {
                self.subst_level += 1;
            }
            if rparen {
                self.subst_level -= 1;
            }
            if self.subst_level != 0 {
                return None;
            }
        }

        self.substituting = false;
        self.subst_level = 0;
        match self.subst_pending() {
            Err(_) => None,
            Ok(()) if self.tokens.is_empty() => None,
            Ok(()) => Some(true),
        }
    }

    /// Macro-substitutes the whole pending chain.
    pub(crate) fn subst_pending(&mut self) -> LexResult<()> {
        let mut chain = std::mem::take(&mut self.tokens);
        let begin = chain.first();
        let end = chain.head();
        let result = self.macro_subst(&mut chain, begin, end);
        self.tokens = chain;
        result
    }

    // ------------------------------------------------------------------
    // shared helpers
    // ------------------------------------------------------------------

    fn file(&self) -> &SourceFile {
        self.files.last().expect("file stack cannot be empty")
    }

    fn file_mut(&mut self) -> &mut SourceFile {
        self.files.last_mut().expect("file stack cannot be empty")
    }

    /// True while the innermost conditional branch is inactive and we are
    /// not collecting a directive line.
    fn dropping_chars(&self) -> bool {
        !self.in_directive
            && self
                .eval_stack
                .last()
                .is_some_and(|frame| frame.value == 0)
    }

    /// Emits an error, poisons the state machine, and returns the marker
    /// for `?` propagation.
    fn error(&mut self, message: impl Into<String>) -> ErrorReported {
        let diag = Diagnostic::error(self.loc.clone(), message);
        self.sink.report(&diag);
        self.had_error = true;
        self.state = State::Reject;
        ErrorReported
    }

    /// Emits a warning. If the sink refuses to continue, the lexer is
    /// poisoned as if an error had been raised.
    fn warning(&mut self, message: impl Into<String>) {
        let diag = Diagnostic::warning(self.loc.clone(), message);
        if !self.sink.report(&diag) {
            self.had_error = true;
            self.state = State::Reject;
        }
    }

    /// Reports the current character in an error message, quoting
    /// non-printable characters as hex.
    fn wrong_char(&mut self, message: &str) -> ErrorReported {
        let ch = self.ch;
        if ch.is_ascii_graphic() || ch == ' ' {
            self.error(format!("{message} '{ch}'"))
        } else {
            self.error(format!("{message} '\\x{:02x}'", ch as u32))
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(source: &str) -> Vec<String> {
        let mut lexer = Lexer::from_source("test.c", source);
        std::iter::from_fn(|| lexer.next_token())
            .map(|t| t.text())
            .collect()
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(all_tokens(""), Vec::<String>::new());
    }

    #[test]
    fn test_plain_tokens() {
        assert_eq!(all_tokens("int x = 42;"), ["int", "x", "=", "42", ";"]);
    }

    #[test]
    fn test_configuration_before_pull() {
        let mut lexer = Lexer::from_source("t.c", "A");
        lexer.define("A", Some("1"));
        let tokens: Vec<String> = lexer.map(|t| t.text()).collect();
        assert_eq!(tokens, ["1"]);
    }

    #[test]
    #[should_panic(expected = "before the first token")]
    fn test_configuration_after_pull_panics() {
        let mut lexer = Lexer::from_source("t.c", "x y z");
        let _ = lexer.next_token();
        lexer.define("A", Some("1"));
    }

    #[test]
    fn test_predefined_macros_visible() {
        let lexer = Lexer::from_source("t.c", "");
        // predefines are lines in <define>, not yet symbols
        assert!(!lexer.poisoned());
        assert_eq!(all_tokens("__LCC__"), ["1"]);
        assert_eq!(all_tokens("__STDC_VERSION__"), ["199901L"]);
    }

    #[test]
    fn test_poisoned_after_error() {
        let mut lexer = Lexer::from_source("t.c", "#unknown\nint x;");
        lexer.set_diagnostic_sink(Box::new(cpre_util::diag::CollectedDiagnostics::new()));
        assert!(lexer.next_token().is_none());
        assert!(lexer.poisoned());
        assert!(lexer.next_token().is_none());
    }
}
