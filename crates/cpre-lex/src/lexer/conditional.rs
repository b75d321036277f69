//! The condition scanner: a cheap character DFA used while the innermost
//! conditional branch is inactive.
//!
//! Only five directives can change the active frame, so skipped regions are
//! scanned for exactly those: `#if` / `#ifdef` / `#ifndef` (nesting up),
//! `#elif` / `#else` (re-arm at nesting one), `#endif` (nesting down). The
//! scanner tracks `//` and `/* */` comments so a directive spelled inside a
//! comment stays invisible, and it only honours `#` at the start of a
//! logical line. On a root-level match it re-enables the full lexer and
//! hands the directive to the commit machinery.

use super::{Directive, LexResult, Lexer, State, SubState};

/// Condition-scanner state, one step of directive spelling at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CondState {
    /// Start of a logical line (only whitespace seen so far).
    Idle,
    /// `/` seen; maybe a comment opener.
    Slash,
    /// An ordinary source line; nothing on it can matter.
    Source,
    /// `#` seen at the start of the line.
    HashSeen,
    /// Inside `//`; swallow the rest of the line.
    LineComment,
    /// Inside `/* ... */`.
    BlockComment,
    /// Inside a block comment, `*` seen.
    BlockCommentStar,
    SeenE,
    SeenEl,
    SeenEls,
    SeenEli,
    /// `#elif` matched; awaiting the separating space.
    MatchElif,
    SeenEn,
    SeenEnd,
    SeenEndi,
    /// `#endif` matched; commits at end of line.
    MatchEndif,
    /// `#else` matched; commits at end of line.
    MatchElse,
    SeenI,
    SeenIf,
    SeenIfn,
    SeenIfd,
    SeenIfde,
    /// `#ifdef` / `#ifndef` matched; bumps the nesting level.
    MatchIfdef,
}

/// Scanner bookkeeping: current and saved state plus the nesting level of
/// conditionals opened inside the skipped region.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CondScanner {
    pub(crate) state: CondState,
    pub(crate) save: CondState,
    pub(crate) level: usize,
}

impl CondScanner {
    pub(crate) fn new() -> Self {
        Self {
            state: CondState::Idle,
            save: CondState::Idle,
            level: 0,
        }
    }
}

impl Lexer {
    /// Feeds the scanner one character, or an end-of-line/end-of-file
    /// event when the corresponding flag is set.
    pub(super) fn handle_condition(&mut self) -> LexResult<()> {
        if self.flag_eof {
            return Err(self.error("Unterminated conditional directive"));
        }

        while self.flag_eol {
            match self.cond.state {
                CondState::Idle => {
                    self.state = State::Shift;
                    self.substate = SubState::Idle;
                    return Ok(());
                }

                CondState::MatchElse => {
                    if self.cond.level != 1 {
                        self.cond.state = CondState::Idle;
                        continue;
                    }
                    self.inject_directive(Directive::Else);
                    return Ok(());
                }

                CondState::MatchEndif => {
                    self.cond.level -= 1;
                    if self.cond.level != 0 {
                        self.cond.state = CondState::Idle;
                        continue;
                    }
                    self.inject_directive(Directive::Endif);
                    return Ok(());
                }

                CondState::MatchIfdef => {
                    return Err(self.error("Missing macro name"));
                }

                CondState::BlockComment | CondState::BlockCommentStar => {
                    // newlines are fine inside a block comment
                    self.state = State::Shift;
                    self.substate = SubState::Idle;
                    self.cond.state = CondState::BlockComment;
                    return Ok(());
                }

                _ => {
                    self.cond.state = self.cond.save;
                    self.cond.save = CondState::Idle;
                }
            }
        }

        loop {
            let mut again = false;
            let ch = self.ch;
            match self.cond.state {
                CondState::Idle => {
                    match ch {
                        '/' => self.cond.state = CondState::Slash,
                        '#' => self.cond.state = CondState::HashSeen,
                        _ if !ch.is_whitespace() => self.cond.state = CondState::Source,
                        _ => {}
                    }
                    self.cond.save = CondState::Source;
                }

                CondState::Slash => match ch {
                    '/' => self.cond.state = CondState::LineComment,
                    '*' => self.cond.state = CondState::BlockComment,
                    _ => {
                        again = true;
                        self.cond.state = self.cond.save;
                    }
                },

                CondState::Source => {
                    if ch == '/' {
                        self.cond.state = CondState::Slash;
                        self.cond.save = CondState::Source;
                    }
                }

                CondState::HashSeen => match ch {
                    'e' => self.cond.state = CondState::SeenE,
                    'i' => self.cond.state = CondState::SeenI,
                    _ if !ch.is_whitespace() => self.cond.state = CondState::Source,
                    _ => {}
                },

                CondState::LineComment => {}

                CondState::BlockComment => {
                    if ch == '*' {
                        self.cond.state = CondState::BlockCommentStar;
                    }
                }

                CondState::BlockCommentStar => {
                    if ch == '/' {
                        self.cond.state = self.cond.save;
                    } else if ch != '*' {
                        self.cond.state = CondState::BlockComment;
                    }
                }

                CondState::SeenE => {
                    self.cond.state = match ch {
                        'n' => CondState::SeenEn,
                        'l' => CondState::SeenEl,
                        _ => CondState::Source,
                    };
                }

                CondState::SeenEl => {
                    self.cond.state = match ch {
                        'i' => CondState::SeenEli,
                        's' => CondState::SeenEls,
                        _ => CondState::Source,
                    };
                }

                CondState::SeenEls => {
                    self.cond.state = if ch == 'e' {
                        CondState::MatchElse
                    } else {
                        CondState::Source
                    };
                }

                CondState::SeenEli => {
                    self.cond.state = if ch == 'f' {
                        CondState::MatchElif
                    } else {
                        CondState::Source
                    };
                }

                CondState::MatchElif => {
                    if !ch.is_whitespace() || self.cond.level != 1 {
                        self.cond.state = CondState::Source;
                    } else {
                        // re-enter the token lexer mid-line: the rest of
                        // the line is the #elif expression
                        self.in_directive = true;
                        self.directive = Some(Directive::Elif);
                    }
                }

                CondState::SeenEn => {
                    self.cond.state = if ch == 'd' {
                        CondState::SeenEnd
                    } else {
                        CondState::Source
                    };
                }

                CondState::SeenEnd => {
                    self.cond.state = if ch == 'i' {
                        CondState::SeenEndi
                    } else {
                        CondState::Source
                    };
                }

                CondState::SeenEndi => {
                    self.cond.state = if ch == 'f' {
                        CondState::MatchEndif
                    } else {
                        CondState::Source
                    };
                }

                CondState::MatchElse | CondState::MatchEndif => {
                    if !ch.is_whitespace() {
                        if ch != '/' {
                            return Err(self.error("Redundant directive parameter"));
                        }
                        self.cond.save = self.cond.state;
                        self.cond.state = CondState::Slash;
                    }
                }

                CondState::SeenI => {
                    self.cond.state = if ch == 'f' {
                        CondState::SeenIf
                    } else {
                        CondState::Source
                    };
                }

                CondState::SeenIf => match ch {
                    'd' => self.cond.state = CondState::SeenIfd,
                    'n' => self.cond.state = CondState::SeenIfn,
                    _ => {
                        if ch.is_whitespace() {
                            self.cond.level += 1;
                        }
                        self.cond.state = CondState::Source;
                    }
                },

                CondState::SeenIfn => {
                    self.cond.state = if ch == 'd' {
                        CondState::SeenIfd
                    } else {
                        CondState::Source
                    };
                }

                CondState::SeenIfd => {
                    self.cond.state = if ch == 'e' {
                        CondState::SeenIfde
                    } else {
                        CondState::Source
                    };
                }

                CondState::SeenIfde => {
                    self.cond.state = if ch == 'f' {
                        CondState::MatchIfdef
                    } else {
                        CondState::Source
                    };
                }

                CondState::MatchIfdef => {
                    if !ch.is_whitespace() {
                        if ch == '/' {
                            self.cond.state = CondState::Slash;
                            self.cond.save = CondState::MatchIfdef;
                        } else {
                            self.cond.state = CondState::Source;
                            self.cond.level += 1;
                        }
                    }
                }
            }

            if again {
                continue;
            }
            self.state = State::Shift;
            self.substate = SubState::Idle;
            return Ok(());
        }
    }

    /// A root-level `#else` / `#endif` (or mid-line `#elif`) recognised in
    /// a skipped region: arrange for the directive engine to run.
    fn inject_directive(&mut self, directive: Directive) {
        self.in_directive = true;
        self.directive = Some(directive);
        self.state = State::Commit;
        self.substate = SubState::Idle;
    }
}
