//! Substate dispatch: the DFA that assembles one token at a time.
//!
//! Each call handles exactly one character (or an end-of-line/end-of-file
//! flush) against the current substate. Committing a token appends it to the
//! pending chain and swaps the source-text buffer, so every token carries
//! its verbatim spelling including leading trivia.

use crate::token::{NumberKind, Operator, Token};

use super::{Directive, LexResult, Lexer, State, SubState};

impl Lexer {
    pub(super) fn handle_substate(&mut self) -> LexResult<()> {
        if self.flag_eof || self.flag_eol {
            return self.flush_partial();
        }

        match self.substate {
            SubState::Idle => self.idle_char()?,

            SubState::Ident => {
                let ch = self.ch;
                if ch == '_'
                    || ch.is_ascii_alphanumeric()
                    || (ch == '$' && self.gnuext.dollar_ident)
                {
                    self.state = State::Shift;
                    self.token_buffer.push(ch);
                } else {
                    self.commit_ident(false)?;
                    self.state = State::AcceptKeep;
                }
            }

            SubState::Str => match self.ch {
                '"' if !self.char_seq => {
                    self.commit_string(true);
                    self.state = State::Accept;
                }
                '\'' if self.char_seq => {
                    if self.token_buffer.is_empty() {
                        return Err(self.error("Empty character constant"));
                    }
                    self.commit_chars(true);
                    self.state = State::Accept;
                }
                '\\' => {
                    self.state = State::Shift;
                    self.substate = SubState::StrEscape;
                    self.token_buffer.push('\\');
                }
                ch => {
                    self.state = State::Shift;
                    self.token_buffer.push(ch);
                }
            },

            SubState::StrEscape => {
                match self.ch {
                    'a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v' | '?' | '"' | '\'' | '\\' => {
                        self.substate = SubState::Str;
                    }
                    'e' if self.gnuext.escape_char => {
                        self.substate = SubState::Str;
                    }
                    'x' | 'X' => {
                        self.substate = SubState::StrEscapeHex;
                    }
                    '0'..='3' => {
                        self.substate = SubState::StrEscapeOct2;
                    }
                    '4'..='7' => {
                        self.substate = SubState::StrEscapeOct3;
                    }
                    _ => return Err(self.wrong_char("Unknown escape character")),
                }
                self.state = State::Shift;
                let ch = self.ch;
                self.token_buffer.push(ch);
            }

            SubState::StrEscapeHex | SubState::StrEscapeHexDigit => {
                if self.ch.is_ascii_hexdigit() {
                    self.substate = if self.substate == SubState::StrEscapeHex {
                        SubState::StrEscapeHexDigit
                    } else {
                        SubState::StrEscapeHexEnd
                    };
                    self.state = State::Shift;
                    let ch = self.ch;
                    self.token_buffer.push(ch);
                } else {
                    return Err(self.wrong_char("Invalid hexadecimal digit"));
                }
            }

            SubState::StrEscapeHexEnd => {
                if self.ch.is_ascii_hexdigit() {
                    return Err(self.error("Hex escape sequence out of range"));
                }
                // the escape is complete; the character belongs to the string
                self.substate = SubState::Str;
                return self.handle_substate();
            }

            SubState::StrEscapeOct2 | SubState::StrEscapeOct3 => {
                if !('0'..='7').contains(&self.ch) {
                    self.substate = SubState::Str;
                    return self.handle_substate();
                }
                let ch = self.ch;
                if self.substate == SubState::StrEscapeOct3 {
                    self.substate = SubState::Str;
                } else {
                    self.substate = SubState::StrEscapeOct3;
                }
                self.state = State::Shift;
                self.token_buffer.push(ch);
            }

            SubState::Number | SubState::Decimal => self.number_char()?,
            SubState::NumberZero => self.number_zero_char()?,

            SubState::NumberOrDot => {
                if self.ch == '.' {
                    self.state = State::Shift;
                    self.substate = SubState::OpEllipsis;
                } else if self.ch.is_ascii_digit() {
                    let ch = self.ch;
                    self.state = State::Shift;
                    self.substate = SubState::Decimal;
                    self.token_buffer.push('.');
                    self.token_buffer.push(ch);
                } else {
                    self.state = State::AcceptKeep;
                    self.commit_operator(Operator::Dot, false);
                }
            }

            SubState::NumberBin
            | SubState::NumberBinDigits
            | SubState::NumberHex
            | SubState::NumberHexDigits => self.number_radix_char()?,

            SubState::NumberOct => match self.ch {
                'u' | 'U' => self.number_shift(SubState::NumberSuffixU),
                'l' | 'L' => self.number_shift(SubState::NumberSuffixL),
                '0'..='7' => self.number_shift(SubState::NumberOct),
                _ => {
                    self.commit_number(NumberKind::Int, false);
                    self.state = State::AcceptKeep;
                }
            },

            SubState::NumberSuffixU => {
                if matches!(self.ch, 'l' | 'L') {
                    self.number_shift(SubState::NumberSuffixUl);
                } else {
                    self.commit_number(NumberKind::UInt, false);
                    self.state = State::AcceptKeep;
                }
            }

            SubState::NumberSuffixL => {
                if matches!(self.ch, 'l' | 'L') {
                    let ch = self.ch;
                    self.state = State::Accept;
                    self.token_buffer.push(ch);
                    self.commit_number(NumberKind::LongLong, true);
                } else {
                    self.commit_number(NumberKind::Long, false);
                    self.state = State::AcceptKeep;
                }
            }

            SubState::NumberSuffixUl => {
                if matches!(self.ch, 'l' | 'L') {
                    let ch = self.ch;
                    self.state = State::Accept;
                    self.token_buffer.push(ch);
                    self.commit_number(NumberKind::ULongLong, true);
                } else {
                    self.commit_number(NumberKind::ULong, false);
                    self.state = State::AcceptKeep;
                }
            }

            SubState::DecimalExp => match self.ch {
                '+' | '-' => self.number_shift(SubState::DecimalExpSign),
                '0'..='9' => self.number_shift(SubState::DecimalExpDigits),
                _ => return Err(self.error("'+', '-' or digits expected")),
            },

            SubState::DecimalExpDigits => match self.ch {
                'f' | 'F' => {
                    let ch = self.ch;
                    self.state = State::Accept;
                    self.token_buffer.push(ch);
                    self.commit_number(NumberKind::Float, true);
                }
                'l' | 'L' => {
                    let ch = self.ch;
                    self.state = State::Accept;
                    self.token_buffer.push(ch);
                    self.commit_number(NumberKind::LongDouble, true);
                }
                '0'..='9' => self.number_shift(SubState::DecimalExpDigits),
                _ => {
                    self.commit_number(NumberKind::Double, false);
                    self.state = State::AcceptKeep;
                }
            },

            SubState::DecimalExpSign => {
                if self.ch.is_ascii_digit() {
                    self.number_shift(SubState::DecimalExpDigits);
                } else {
                    return Err(self.error("Digits expected"));
                }
            }

            // * *=
            SubState::OpStar => self.op2('=', Operator::MulAssign, Operator::Star),
            // % %=
            SubState::OpPercent => self.op2('=', Operator::ModAssign, Operator::Percent),
            // = ==
            SubState::OpAssign => self.op2('=', Operator::Eq, Operator::Assign),
            // ! !=
            SubState::OpNot => self.op2('=', Operator::Neq, Operator::LNot),
            // ^ ^=
            SubState::OpXor => self.op2('=', Operator::XorAssign, Operator::BXor),
            // + ++ +=
            SubState::OpPlus => {
                self.op3('+', Operator::Incr, '=', Operator::AddAssign, Operator::Plus)
            }
            // & && &=
            SubState::OpAnd => {
                self.op3('&', Operator::LAnd, '=', Operator::AndAssign, Operator::BAnd)
            }
            // | || |=
            SubState::OpOr => self.op3('|', Operator::LOr, '=', Operator::OrAssign, Operator::BOr),
            // >> >>=
            SubState::OpShr => self.op2('=', Operator::ShrAssign, Operator::Shr),
            // << <<=
            SubState::OpShl => self.op2('=', Operator::ShlAssign, Operator::Shl),

            // - -- -= ->
            SubState::OpMinus => match self.ch {
                '=' => {
                    self.state = State::Accept;
                    self.commit_operator(Operator::SubAssign, true);
                }
                '-' => {
                    self.state = State::Accept;
                    self.commit_operator(Operator::Decr, true);
                }
                '>' => {
                    self.state = State::Accept;
                    self.commit_operator(Operator::Arrow, true);
                }
                _ => {
                    self.state = State::AcceptKeep;
                    self.commit_operator(Operator::Minus, false);
                }
            },

            // > >> >= >>=
            SubState::OpGt => match self.ch {
                '>' => {
                    self.state = State::Shift;
                    self.substate = SubState::OpShr;
                }
                '=' => {
                    self.state = State::Accept;
                    self.commit_operator(Operator::Geq, true);
                }
                _ => {
                    self.state = State::AcceptKeep;
                    self.commit_operator(Operator::Gt, false);
                }
            },

            // < << <= <<=, or the #include <...> file name
            SubState::OpLt => {
                if self.directive == Some(Directive::Include) {
                    let ch = self.ch;
                    self.state = State::Shift;
                    self.include_sys = true;
                    self.substate = SubState::IncludeFile;
                    self.token_buffer.push(ch);
                } else {
                    match self.ch {
                        '<' => {
                            self.state = State::Shift;
                            self.substate = SubState::OpShl;
                        }
                        '=' => {
                            self.state = State::Accept;
                            self.commit_operator(Operator::Leq, true);
                        }
                        _ => {
                            self.state = State::AcceptKeep;
                            self.commit_operator(Operator::Lt, false);
                        }
                    }
                }
            }

            SubState::IncludeFile => {
                if self.ch == '>' {
                    self.commit_string(true);
                    self.state = State::Accept;
                } else {
                    let ch = self.ch;
                    self.state = State::Shift;
                    self.token_buffer.push(ch);
                }
            }

            // / /= // /*
            SubState::OpSlash => match self.ch {
                '=' => {
                    self.state = State::Accept;
                    self.commit_operator(Operator::DivAssign, true);
                }
                '/' => {
                    self.state = State::Shift;
                    self.substate = SubState::LineComment;
                }
                '*' => {
                    self.state = State::Shift;
                    self.substate = SubState::BlockComment;
                }
                _ => {
                    self.state = State::AcceptKeep;
                    self.commit_operator(Operator::Slash, false);
                }
            },

            // # ##
            SubState::OpHash => {
                if self.ch == '#' {
                    self.state = State::Accept;
                    self.commit_operator(Operator::HashHash, true);
                } else {
                    self.state = State::AcceptKeep;
                    self.commit_operator(Operator::Hash, false);
                }
            }

            SubState::OpEllipsis => {
                if self.ch != '.' {
                    return Err(self.wrong_char("Invalid character"));
                }
                self.state = State::Accept;
                self.commit_operator(Operator::Ellipsis, true);
            }

            SubState::LineComment => {
                self.state = State::Shift;
            }

            SubState::BlockComment => {
                self.state = State::Shift;
                self.substate = if self.ch == '*' {
                    SubState::BlockCommentStar
                } else {
                    SubState::BlockComment
                };
            }

            SubState::BlockCommentStar => {
                self.state = State::Shift;
                match self.ch {
                    '/' => {
                        // the comment is trivia, not part of any token's text
                        self.source.clear();
                        self.substate = SubState::Idle;
                    }
                    '*' => self.substate = SubState::BlockCommentStar,
                    _ => self.substate = SubState::BlockComment,
                }
            }
        }

        Ok(())
    }

    /// First character of a new token decides the substate.
    fn idle_char(&mut self) -> LexResult<()> {
        let ch = self.ch;
        match ch {
            '_' | 'a'..='z' | 'A'..='Z' => {
                self.substate = SubState::Ident;
                self.token_buffer.push(ch);
            }
            '\'' => {
                self.char_seq = true;
                self.substate = SubState::Str;
            }
            '"' => {
                self.char_seq = false;
                self.substate = SubState::Str;
            }
            '0' => {
                self.substate = SubState::NumberZero;
                self.token_buffer.push(ch);
            }
            '1'..='9' => {
                self.substate = SubState::Number;
                self.token_buffer.push(ch);
            }
            '.' => {
                self.substate = SubState::NumberOrDot;
            }
            '~' | '(' | ')' | '[' | ']' | '{' | '}' | ':' | ',' | ';' | '?' => {
                let op = match ch {
                    '~' => Operator::BInv,
                    '(' => Operator::LParen,
                    ')' => Operator::RParen,
                    '[' => Operator::LBracket,
                    ']' => Operator::RBracket,
                    '{' => Operator::LBrace,
                    '}' => Operator::RBrace,
                    ':' => Operator::Colon,
                    ',' => Operator::Comma,
                    ';' => Operator::Semicolon,
                    _ => Operator::Question,
                };
                self.commit_operator(op, true);
                self.state = State::Accept;
                return Ok(());
            }
            '+' => self.substate = SubState::OpPlus,
            '-' => self.substate = SubState::OpMinus,
            '*' => self.substate = SubState::OpStar,
            '/' => self.substate = SubState::OpSlash,
            '%' => self.substate = SubState::OpPercent,
            '=' => self.substate = SubState::OpAssign,
            '>' => self.substate = SubState::OpGt,
            '<' => self.substate = SubState::OpLt,
            '!' => self.substate = SubState::OpNot,
            '&' => self.substate = SubState::OpAnd,
            '|' => self.substate = SubState::OpOr,
            '^' => self.substate = SubState::OpXor,
            '#' => {
                if self.in_directive {
                    self.state = State::Shift;
                    self.substate = SubState::OpHash;
                    return Ok(());
                }
                if !self.file().no_directive {
                    self.state = State::GotDirective;
                    self.substate = SubState::Idle;
                    return Ok(());
                }
                return Err(self.error("Invalid character '#'"));
            }
            '$' if self.gnuext.dollar_ident => {
                self.substate = SubState::Ident;
                self.token_buffer.push(ch);
            }
            ch if ch.is_whitespace() => {}
            _ => return Err(self.wrong_char("Invalid character")),
        }
        self.state = State::Shift;
        Ok(())
    }

    /// Decimal integers and the integral part of floats.
    fn number_char(&mut self) -> LexResult<()> {
        let decimal = self.substate == SubState::Decimal;
        match self.ch {
            '.' if !decimal => {
                self.number_shift(SubState::Decimal);
            }
            'e' | 'E' => {
                self.number_shift(SubState::DecimalExp);
            }
            '0'..='9' => {
                let ch = self.ch;
                self.state = State::Shift;
                self.token_buffer.push(ch);
            }
            'f' | 'F' => {
                let ch = self.ch;
                self.state = State::Accept;
                self.token_buffer.push(ch);
                self.commit_number(NumberKind::Float, true);
            }
            'u' | 'U' if !decimal => {
                self.number_shift(SubState::NumberSuffixU);
            }
            'l' | 'L' => {
                if decimal {
                    let ch = self.ch;
                    self.state = State::Accept;
                    self.token_buffer.push(ch);
                    self.commit_number(NumberKind::LongDouble, true);
                } else {
                    self.number_shift(SubState::NumberSuffixL);
                }
            }
            _ => {
                let kind = if decimal {
                    NumberKind::Double
                } else {
                    NumberKind::Int
                };
                self.commit_number(kind, false);
                self.state = State::AcceptKeep;
            }
        }
        Ok(())
    }

    /// After a leading `0`: radix dispatch.
    fn number_zero_char(&mut self) -> LexResult<()> {
        match self.ch {
            '.' => self.number_shift(SubState::Decimal),
            'e' | 'E' => self.number_shift(SubState::DecimalExp),
            'b' | 'B' => self.number_shift(SubState::NumberBin),
            'x' | 'X' => self.number_shift(SubState::NumberHex),
            '0'..='7' => self.number_shift(SubState::NumberOct),
            '8' | '9' => {
                let ch = self.ch;
                return Err(self.error(format!("Invalid octal digit '{ch}'")));
            }
            'f' | 'F' => {
                let ch = self.ch;
                self.state = State::Accept;
                self.token_buffer.push(ch);
                self.commit_number(NumberKind::Float, true);
            }
            'u' | 'U' => self.number_shift(SubState::NumberSuffixU),
            'l' | 'L' => self.number_shift(SubState::NumberSuffixL),
            _ => {
                self.commit_number(NumberKind::Int, false);
                self.state = State::AcceptKeep;
            }
        }
        Ok(())
    }

    /// Binary and hexadecimal digit runs.
    fn number_radix_char(&mut self) -> LexResult<()> {
        let binary = matches!(self.substate, SubState::NumberBin | SubState::NumberBinDigits);
        let first = matches!(self.substate, SubState::NumberBin | SubState::NumberHex);
        let is_digit = if binary {
            matches!(self.ch, '0' | '1')
        } else {
            self.ch.is_ascii_hexdigit()
        };
        if is_digit {
            self.number_shift(if binary {
                SubState::NumberBinDigits
            } else {
                SubState::NumberHexDigits
            });
            return Ok(());
        }
        if first {
            return Err(self.wrong_char(if binary {
                "Invalid binary digit"
            } else {
                "Invalid hexadecimal digit"
            }));
        }
        match self.ch {
            'u' | 'U' => self.number_shift(SubState::NumberSuffixU),
            'l' | 'L' => self.number_shift(SubState::NumberSuffixL),
            _ => {
                self.commit_number(NumberKind::Int, false);
                self.state = State::AcceptKeep;
            }
        }
        Ok(())
    }

    /// Appends the current character and keeps scanning in `next`.
    fn number_shift(&mut self, next: SubState) {
        let ch = self.ch;
        self.state = State::Shift;
        self.substate = next;
        self.token_buffer.push(ch);
    }

    /// One- or two-character operator: `expect` extends, anything else
    /// commits `keep` and re-processes the character.
    fn op2(&mut self, expect: char, extended: Operator, keep: Operator) {
        if self.ch == expect {
            self.state = State::Accept;
            self.commit_operator(extended, true);
        } else {
            self.state = State::AcceptKeep;
            self.commit_operator(keep, false);
        }
    }

    /// Like [`Self::op2`] with two possible extensions (`++` / `+=` family).
    fn op3(&mut self, e1: char, o1: Operator, e2: char, o2: Operator, keep: Operator) {
        if self.ch == e1 {
            self.state = State::Accept;
            self.commit_operator(o1, true);
        } else if self.ch == e2 {
            self.state = State::Accept;
            self.commit_operator(o2, true);
        } else {
            self.state = State::AcceptKeep;
            self.commit_operator(keep, false);
        }
    }

    /// End-of-line or end-of-file reached with a token (possibly) in
    /// flight: close it with the appropriate commit or diagnostic, then
    /// hand control to the directive engine or the caller.
    fn flush_partial(&mut self) -> LexResult<()> {
        match self.substate {
            SubState::Idle => {}

            SubState::LineComment => {
                // the comment text is trivia
                self.source.clear();
            }

            SubState::BlockComment | SubState::BlockCommentStar => {
                if self.flag_eof {
                    self.warning("EOF when parsing block comment");
                } else {
                    // block comments span lines
                    self.state = State::Shift;
                    self.substate = SubState::BlockComment;
                    return Ok(());
                }
            }

            SubState::Ident => self.commit_ident(true)?,

            SubState::Str
            | SubState::StrEscape
            | SubState::StrEscapeHex
            | SubState::StrEscapeHexDigit
            | SubState::StrEscapeHexEnd
            | SubState::StrEscapeOct2
            | SubState::StrEscapeOct3
            | SubState::IncludeFile
            | SubState::NumberBin
            | SubState::NumberHex
            | SubState::DecimalExp
            | SubState::DecimalExpSign
            | SubState::OpEllipsis => {
                if !self.in_directive {
                    let what = if self.flag_eof { "EOF" } else { "EOL" };
                    return Err(self.error(format!("Unexpected {what}")));
                }
                // inside a directive, close it as a string so the directive
                // engine can still report something useful
                self.commit_string(true);
                self.warning("Invalid preprocessor token");
            }

            SubState::Number
            | SubState::NumberZero
            | SubState::NumberBinDigits
            | SubState::NumberHexDigits
            | SubState::NumberOct => self.commit_number(NumberKind::Int, true),
            SubState::NumberSuffixU => self.commit_number(NumberKind::UInt, true),
            SubState::NumberSuffixL => self.commit_number(NumberKind::Long, true),
            SubState::NumberSuffixUl => self.commit_number(NumberKind::ULong, true),
            SubState::Decimal | SubState::DecimalExpDigits => {
                self.commit_number(NumberKind::Double, true)
            }

            SubState::NumberOrDot => self.commit_operator(Operator::Dot, true),
            SubState::OpPlus => self.commit_operator(Operator::Plus, true),
            SubState::OpMinus => self.commit_operator(Operator::Minus, true),
            SubState::OpStar => self.commit_operator(Operator::Star, true),
            SubState::OpSlash => self.commit_operator(Operator::Slash, true),
            SubState::OpPercent => self.commit_operator(Operator::Percent, true),
            SubState::OpAssign => self.commit_operator(Operator::Assign, true),
            SubState::OpGt => self.commit_operator(Operator::Gt, true),
            SubState::OpShr => self.commit_operator(Operator::Shr, true),
            SubState::OpLt => self.commit_operator(Operator::Lt, true),
            SubState::OpShl => self.commit_operator(Operator::Shl, true),
            SubState::OpNot => self.commit_operator(Operator::LNot, true),
            SubState::OpAnd => self.commit_operator(Operator::BAnd, true),
            SubState::OpOr => self.commit_operator(Operator::BOr, true),
            SubState::OpXor => self.commit_operator(Operator::BXor, true),
            SubState::OpHash => self.commit_operator(Operator::Hash, true),
        }

        self.state = if self.in_directive {
            State::Commit
        } else {
            State::Accept
        };
        self.flag_eof = false;
        self.flag_eol = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // token commits
    // ------------------------------------------------------------------

    /// Swaps out the accumulated source text for the next token. With
    /// `keep_tail` false the trigger character is dropped here; it will be
    /// re-appended when it is re-processed.
    fn swap_source(&mut self, keep_tail: bool) -> String {
        let mut old = std::mem::take(&mut self.source);
        if !keep_tail && !old.is_empty() {
            old.pop();
        }
        old
    }

    pub(super) fn commit_ident(&mut self, keep_tail: bool) -> LexResult<()> {
        // __VA_ARGS__ / __VA_OPT__ are reserved outside the body of an
        // anonymous-variadic function-like macro
        if self.token_buffer == "__VA_ARGS__" || self.token_buffer == "__VA_OPT__" {
            let in_variadic_body =
                self.define.variadic && !self.define.named_variadic && self.define.finished;
            if !in_variadic_body {
                let name = self.token_buffer.clone();
                return Err(self.error(format!("'{name}' is not allowed here")));
            }
        }
        let src = self.swap_source(keep_tail);
        let ident = std::mem::take(&mut self.token_buffer);
        let token = Token::from_ident(src, self.loc.clone(), ident);
        self.tokens.push_back(token);
        self.newly_committed = true;
        Ok(())
    }

    pub(super) fn commit_chars(&mut self, keep_tail: bool) {
        let src = self.swap_source(keep_tail);
        let body = std::mem::take(&mut self.token_buffer);
        let token = Token::from_char(src, self.loc.clone(), &body, self.gnuext.escape_char);
        let multi = match &token.kind {
            crate::token::TokenKind::Literal(lit) => match &lit.value {
                crate::token::LiteralValue::Char(bytes) => bytes.len() > 1,
                _ => false,
            },
            _ => false,
        };
        if multi {
            self.warning("Multi-character character constant");
        }
        self.tokens.push_back(token);
        self.newly_committed = true;
    }

    pub(super) fn commit_string(&mut self, keep_tail: bool) {
        let src = self.swap_source(keep_tail);
        let body = std::mem::take(&mut self.token_buffer);
        let token = Token::from_string(src, self.loc.clone(), &body, self.gnuext.escape_char);
        self.tokens.push_back(token);
        self.newly_committed = true;
    }

    pub(super) fn commit_number(&mut self, kind: NumberKind, keep_tail: bool) {
        let src = self.swap_source(keep_tail);
        let text = std::mem::take(&mut self.token_buffer);
        let (token, overflow) = Token::from_number(src, self.loc.clone(), &text, kind);
        if overflow {
            self.warning(format!("Literal {text} is out of range"));
        }
        self.tokens.push_back(token);
        self.newly_committed = true;
    }

    pub(super) fn commit_operator(&mut self, op: Operator, keep_tail: bool) {
        let src = self.swap_source(keep_tail);
        let token = Token::from_operator(src, self.loc.clone(), op);
        self.tokens.push_back(token);
        self.newly_committed = true;
    }
}
