//! The directive engine.
//!
//! Directive lines are collected on the token chain. While the line is
//! still being lexed, [`Lexer::handle_directive`] runs after every accepted
//! token: it resolves the directive name and drives the incremental
//! `#define` parser. At end of line [`Lexer::commit_directive`] applies the
//! collected directive.

use crate::chain::TokenId;
use crate::symbol::MacroSymbol;
use crate::token::{LiteralValue, Operator, Token, TokenKind};

use super::{CondState, LexResult, Lexer, State, SubState};

/// Directive kinds. `#include_next` is `Include` plus the lexer's
/// `include_next` flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Directive {
    Null,
    Include,
    Define,
    Undef,
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
    Endif,
    Pragma,
    Error,
    Warning,
    Line,
    Sccs,
}

/// Phase of the function-like `#define` parameter parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum DefinePhase {
    /// Expecting the opening `(`.
    #[default]
    Init,
    /// Expecting a parameter name or `...` or `)`.
    PushArg,
    /// Expecting `,`, `)` or `...`.
    DelimOrEnd,
    /// After `...`: only `)` may follow.
    End,
}

/// Incremental state of the `#define` being parsed.
#[derive(Debug, Default)]
pub(crate) struct DefineState {
    pub(crate) name: Option<String>,
    pub(crate) object_like: bool,
    pub(crate) function_like: bool,
    pub(crate) variadic: bool,
    pub(crate) named_variadic: bool,
    /// Parameter list fully parsed; remaining tokens are the body.
    pub(crate) finished: bool,
    pub(crate) phase: DefinePhase,
    pub(crate) params: Vec<String>,
    pub(crate) va_name: String,
}

impl Lexer {
    /// Runs after each accepted token of a directive line, and once more at
    /// commit time.
    pub(super) fn handle_directive(&mut self) -> LexResult<()> {
        match self.directive {
            None => {
                if self.tokens.is_empty() {
                    self.directive = Some(Directive::Null);
                    return Ok(());
                }
                let first = self.tokens.first();
                let name = match self.tokens.get(first).ident() {
                    Some(name) => name.to_string(),
                    None => return Err(self.error("Directive name expected")),
                };
                let directive = match name.as_str() {
                    "include" => Directive::Include,
                    "include_next" => {
                        self.include_next = true;
                        Directive::Include
                    }
                    "define" => Directive::Define,
                    "undef" => Directive::Undef,
                    "if" => Directive::If,
                    "ifdef" => Directive::Ifdef,
                    "ifndef" => Directive::Ifndef,
                    "elif" => Directive::Elif,
                    "else" => Directive::Else,
                    "endif" => Directive::Endif,
                    "pragma" => Directive::Pragma,
                    "error" => Directive::Error,
                    "warning" => Directive::Warning,
                    "line" => Directive::Line,
                    "sccs" => Directive::Sccs,
                    _ => {
                        return Err(
                            self.error(format!("Unknown compiler directive '{name}'"))
                        )
                    }
                };
                self.directive = Some(directive);
                self.tokens.detach(first);
                Ok(())
            }
            Some(Directive::Define) => self.handle_define(),
            Some(_) => Ok(()),
        }
    }

    /// Incremental `#define` parsing: macro name, then the parameter list
    /// of a function-like definition, one token at a time. Body tokens are
    /// left on the chain for commit.
    fn handle_define(&mut self) -> LexResult<()> {
        if self.define.name.is_none() {
            if self.tokens.is_empty() {
                return Err(self.error("Macro name must be an identifier"));
            }
            let first = self.tokens.first();
            let name = match self.tokens.get(first).ident() {
                Some(name) => name.to_string(),
                None => return Err(self.error("Macro name must be an identifier")),
            };
            // "defined" is the preprocessor's only reserved word
            if name == "defined" {
                return Err(self.error("'defined' is not a valid macro name"));
            }
            self.define.name = Some(name);
            self.define.phase = DefinePhase::Init;
            self.define.va_name = "__VA_ARGS__".to_string();
            self.tokens.detach(first);
            return Ok(());
        }

        // object-like bodies and finished parameter lists accumulate
        if self.define.object_like || self.define.finished {
            return Ok(());
        }

        match self.define.phase {
            DefinePhase::Init => {
                let first = self.expect_define_token("'(' expected")?;
                if !self.tokens.get(first).is_operator(Operator::LParen) {
                    return Err(self.error("'(' expected"));
                }
                self.define.phase = DefinePhase::PushArg;
                self.tokens.detach(first);
            }

            DefinePhase::PushArg => {
                let first = self.expect_define_token("Identifier or '...' expected")?;
                match &self.tokens.get(first).kind {
                    TokenKind::Ident(param) => {
                        let param = param.clone();
                        if self.define.params.contains(&param) {
                            return Err(
                                self.error(format!("Duplicated macro argument: {param}"))
                            );
                        }
                        self.define.phase = DefinePhase::DelimOrEnd;
                        self.define.params.push(param);
                    }
                    TokenKind::Operator(Operator::RParen) => {
                        // a macro with no arguments
                        self.define.finished = true;
                    }
                    TokenKind::Operator(Operator::Ellipsis) => {
                        self.define.variadic = true;
                        self.define.phase = DefinePhase::End;
                    }
                    _ => return Err(self.error("Identifier or '...' expected")),
                }
                self.tokens.detach(first);
            }

            DefinePhase::DelimOrEnd => {
                let first = self.expect_define_token("')', ',' or '...' expected")?;
                match &self.tokens.get(first).kind {
                    TokenKind::Operator(Operator::Comma) => {
                        self.define.phase = DefinePhase::PushArg;
                    }
                    TokenKind::Operator(Operator::RParen) => {
                        self.define.finished = true;
                    }
                    TokenKind::Operator(Operator::Ellipsis) => {
                        // GCC-style named variadic: the last parameter name
                        // becomes the variadic tail's name
                        self.define.va_name = self
                            .define
                            .params
                            .pop()
                            .expect("DelimOrEnd follows at least one parameter");
                        self.define.variadic = true;
                        self.define.named_variadic = true;
                        self.define.phase = DefinePhase::End;
                    }
                    _ => return Err(self.error("')', ',' or '...' expected")),
                }
                self.tokens.detach(first);
            }

            DefinePhase::End => {
                let first = self.expect_define_token("')' expected")?;
                if !self.tokens.get(first).is_operator(Operator::RParen) {
                    return Err(self.error("')' expected"));
                }
                self.define.finished = true;
                self.tokens.detach(first);
            }
        }
        Ok(())
    }

    fn expect_define_token(&mut self, msg: &str) -> LexResult<TokenId> {
        if self.tokens.is_empty() {
            return Err(self.error(msg.to_string()));
        }
        Ok(self.tokens.first())
    }

    /// Applies the collected directive line.
    pub(super) fn commit_directive(&mut self) -> LexResult<()> {
        let directive = self.directive.unwrap_or(Directive::Null);
        match directive {
            Directive::Null => {}

            Directive::Include => {
                let first = self.fetch_token("Missing include file name")?;
                let fname =
                    self.ensure_raw_string(first, "Include file name must be a string")?;
                self.tokens.detach(first);
                self.load_include(&fname, false)?;
            }

            Directive::Define => self.commit_define()?,

            Directive::Undef => {
                let first = self.fetch_token("Missing macro name")?;
                let name = self.ensure_ident(first, "Macro name must be an identifier")?;
                if name == "defined" {
                    return Err(self.error("'defined' is not a valid macro name"));
                }
                self.tokens.detach(first);
                if let Some(old) = self.symbols.shift_remove(&name) {
                    if old.system {
                        self.warning(format!("Undefining builtin macro '{name}'"));
                    }
                }
            }

            Directive::If | Directive::Elif => self.commit_conditional(directive)?,

            Directive::Ifdef | Directive::Ifndef => {
                let first = self.fetch_token("Missing macro name")?;
                let name = self.ensure_ident(first, "Macro name must be an identifier")?;
                if name == "defined" {
                    return Err(self.error("'defined' is not a valid macro name"));
                }
                self.tokens.detach(first);
                let has = self.symbols.contains_key(&name);
                let active = has == (directive == Directive::Ifdef);
                self.cond.state = CondState::Idle;
                self.cond.level = 1;
                self.eval_stack.push(super::CondFrame {
                    value: active as i64,
                    taken: active,
                });
            }

            Directive::Else => {
                if self.eval_stack.is_empty() {
                    return Err(self.error("#else without #if"));
                }
                let top = self.eval_stack.len() - 1;
                let frame = &mut self.eval_stack[top];
                frame.value = if frame.taken {
                    0
                } else {
                    (frame.value == 0) as i64
                };
                self.cond.state = CondState::Idle;
                self.cond.level = 1;
            }

            Directive::Endif => {
                if self.eval_stack.pop().is_none() {
                    return Err(self.error("#endif without #if"));
                }
            }

            Directive::Pragma => {
                // recognised pragmas are a parser concern; drop the tokens
                self.tokens.clear();
            }

            Directive::Error => {
                let message = self.make_message();
                return Err(self.error(message));
            }

            Directive::Warning => {
                let message = self.make_message();
                self.warning(message);
            }

            Directive::Line => self.commit_line()?,

            Directive::Sccs => {
                let first = self.fetch_token("Missing SCCS message")?;
                let message = self.ensure_string_value(first, "SCCS message must be a string")?;
                self.tokens.detach(first);
                self.sccs_msgs.push(message);
            }
        }

        // reset directive state
        self.directive = None;
        self.include_next = false;
        self.include_sys = false;
        self.define = DefineState::default();
        self.in_directive = false;
        self.flag_eof = false;
        self.flag_eol = false;
        self.newly_committed = false;

        if !self.tokens.is_empty() {
            return Err(self.error("Redundant directive parameter"));
        }
        self.state = State::Shift;
        self.substate = SubState::Idle;
        Ok(())
    }

    fn commit_define(&mut self) -> LexResult<()> {
        if self.define.name.is_none() {
            return Err(self.error("Missing macro name"));
        }
        let define = std::mem::take(&mut self.define);
        let name = define.name.expect("checked above");
        let body = std::mem::take(&mut self.tokens);
        let symbol = MacroSymbol {
            name: name.clone(),
            function_like: define.function_like,
            variadic: define.variadic,
            named_variadic: define.named_variadic,
            system: self.file().system,
            in_use: false,
            params: define.params,
            va_name: define.va_name,
            body,
            builtin: None,
        };
        let replaces_system = self
            .symbols
            .get(&name)
            .is_some_and(|old| old.system || old.builtin.is_some());
        let new_is_system = symbol.system;
        let equal = self
            .symbols
            .get(&name)
            .is_some_and(|old| old.builtin.is_none() && symbol.body_equals(old));
        let existed = self.symbols.insert(name.clone(), symbol).is_some();

        if existed && !new_is_system {
            if replaces_system {
                self.warning(format!("Redefining builtin macro '{name}'"));
            } else if !equal {
                self.warning(format!("Symbol '{name}' redefined"));
            }
        }
        Ok(())
    }

    fn commit_conditional(&mut self, directive: Directive) -> LexResult<()> {
        let is_elif = directive == Directive::Elif;
        if is_elif {
            if self.eval_stack.is_empty() {
                return Err(self.error("#elif without #if"));
            }
            let taken = self.eval_stack.last().is_some_and(|f| f.taken);
            if taken {
                // a branch of this group already ran: force inactive
                self.tokens.clear();
                if let Some(frame) = self.eval_stack.last_mut() {
                    frame.value = 0;
                }
                self.cond.state = CondState::Idle;
                self.cond.level = 1;
                return Ok(());
            }
        }

        self.subst_pending()?;
        let value = self.eval_pending()?;
        self.tokens.clear();

        if is_elif {
            if let Some(frame) = self.eval_stack.last_mut() {
                frame.value = value;
                if value != 0 {
                    frame.taken = true;
                }
            }
        } else {
            self.eval_stack.push(super::CondFrame {
                value,
                taken: value != 0,
            });
        }
        self.cond.state = CondState::Idle;
        self.cond.level = 1;
        Ok(())
    }

    fn commit_line(&mut self) -> LexResult<()> {
        // the arguments may be produced by macros
        self.subst_pending()?;

        let first = self.fetch_token("Missing line number")?;
        let raw = self.ensure_raw_int(
            first,
            "#line directive requires a positive integer argument",
        )?;

        // optional replacement file name
        let second = self.tokens.next(first);
        if second != self.tokens.head() {
            let fname = self.ensure_raw_string(second, "Invalid filename for #line directive")?;
            self.tokens.detach(second);
            self.file_mut().display = fname;
        }

        if raw.starts_with('0') && raw.bytes().all(|b| b.is_ascii_digit()) {
            self.warning("#line directive interprets number as decimal, not octal");
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            self.tokens.detach(first);
            return Err(self.error("#line directive requires a simple digit sequence"));
        }
        let value: i64 = raw.parse().unwrap_or(i64::MAX);

        self.tokens.detach(first);
        // the cursor already sits on the line after the directive, which is
        // the one that must report as `value`
        let file = self.file_mut();
        file.offset = value - file.row as i64;
        Ok(())
    }

    /// Joins the remaining tokens into a `#error` / `#warning` message: a
    /// lone string literal contributes its content, anything else the
    /// tokens' texts separated by single spaces.
    fn make_message(&mut self) -> String {
        if self.tokens.is_empty() {
            return String::new();
        }
        let first = self.tokens.first();
        if self.tokens.next(first) == self.tokens.head() {
            if let TokenKind::Literal(lit) = &self.tokens.get(first).kind {
                if let LiteralValue::Str(bytes) = &lit.value {
                    let message = String::from_utf8_lossy(bytes).into_owned();
                    self.tokens.clear();
                    return message;
                }
            }
        }
        let message = self
            .tokens
            .iter()
            .map(Token::text)
            .collect::<Vec<_>>()
            .join(" ");
        self.tokens.clear();
        message
    }

    // ------------------------------------------------------------------
    // token-chain extraction helpers
    // ------------------------------------------------------------------

    fn fetch_token(&mut self, msg: &str) -> LexResult<TokenId> {
        if self.tokens.is_empty() {
            return Err(self.error(msg.to_string()));
        }
        Ok(self.tokens.first())
    }

    fn ensure_ident(&mut self, id: TokenId, msg: &str) -> LexResult<String> {
        match self.tokens.get(id).ident() {
            Some(name) => Ok(name.to_string()),
            None => Err(self.error(msg.to_string())),
        }
    }

    /// Raw spelling of an integer literal.
    fn ensure_raw_int(&mut self, id: TokenId, msg: &str) -> LexResult<String> {
        match &self.tokens.get(id).kind {
            TokenKind::Literal(lit) if lit.value.is_integer() => Ok(lit.raw.clone()),
            _ => Err(self.error(msg.to_string())),
        }
    }

    /// Raw spelling of a string literal with the quotes stripped.
    fn ensure_raw_string(&mut self, id: TokenId, msg: &str) -> LexResult<String> {
        match &self.tokens.get(id).kind {
            TokenKind::Literal(lit) if matches!(lit.value, LiteralValue::Str(_)) => {
                Ok(strip_quotes(&lit.raw))
            }
            _ => Err(self.error(msg.to_string())),
        }
    }

    /// Decoded content of a string literal.
    fn ensure_string_value(&mut self, id: TokenId, msg: &str) -> LexResult<String> {
        match &self.tokens.get(id).kind {
            TokenKind::Literal(lit) => match &lit.value {
                LiteralValue::Str(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
                _ => Err(self.error(msg.to_string())),
            },
            _ => Err(self.error(msg.to_string())),
        }
    }
}

/// Strips one leading and one trailing quote character.
pub(super) fn strip_quotes(raw: &str) -> String {
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    inner.to_string()
}
