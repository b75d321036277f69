//! The macro engine: prescan and rescan token-chain rewriting.
//!
//! Substitution happens in two passes per invocation. Pass one walks the
//! macro body and substitutes parameters (expanded copies, unless adjacent
//! to `##`), the variadic tail (raw tokens), `#` stringizing and the GNU
//! `, ## __VA_ARGS__` comma rule. Pass two welds tokens around every `##`.
//! The result is spliced into the invocation site and rescanned; while a
//! symbol's expansion is being rescanned its `in_use` bit is set, and any
//! occurrence of its name seen in that window is flagged inert forever.

use std::fs;

use crate::chain::{TokenChain, TokenId};
use crate::symbol::Builtin;
use crate::token::{LiteralValue, Operator, Token, TokenKind};

use super::directive::strip_quotes;
use super::{Directive, LexResult, Lexer};

/// Finds the end of a macro argument: the first top-level `)` (or `,` when
/// `allow_comma`). Returns `None` when the range runs out first.
fn find_arg_end(
    chain: &TokenChain,
    begin: TokenId,
    end: TokenId,
    allow_comma: bool,
) -> Option<TokenId> {
    let mut level = 0usize;
    let mut cur = begin;
    while cur != end {
        if let TokenKind::Operator(op) = chain.get(cur).kind {
            match op {
                Operator::RParen if level == 0 => return Some(cur),
                Operator::Comma if allow_comma && level == 0 => return Some(cur),
                Operator::LParen => level += 1,
                Operator::RParen => level -= 1,
                _ => {}
            }
        }
        cur = chain.next(cur);
    }
    None
}

/// Replaces `[*from, to)` with a single token; the cursor lands on `to`.
fn range_subst(chain: &mut TokenChain, from: &mut TokenId, to: TokenId, token: Token) {
    chain.remove_range(*from, to);
    chain.insert_before(to, token);
    *from = to;
}

impl Lexer {
    /// Substitutes every macro in `[begin, end)`, then rescans once more
    /// from the position before `begin` to catch replacements at the very
    /// front. Warns when the result still contains a literal `defined`.
    pub(crate) fn macro_subst(
        &mut self,
        chain: &mut TokenChain,
        begin: TokenId,
        end: TokenId,
    ) -> LexResult<()> {
        let anchor = chain.prev(begin);
        let mut has_defined = false;
        let mut result = self.macro_scan(chain, begin, end, &mut has_defined);
        if result.is_ok() {
            let restart = chain.next(anchor);
            result = self.macro_scan(chain, restart, end, &mut has_defined);
        }
        if has_defined {
            self.warning("Macro expansion producing 'defined' has undefined behavior");
        }
        result
    }

    /// One substitution sweep over `[begin, end)`.
    fn macro_scan(
        &mut self,
        chain: &mut TokenChain,
        begin: TokenId,
        end: TokenId,
        has_defined: &mut bool,
    ) -> LexResult<()> {
        let mut token = begin;
        while token != end {
            let Some(name) = chain.get(token).ident().map(str::to_string) else {
                token = chain.next(token);
                continue;
            };
            let Some(sym) = self.symbols.get(&name) else {
                token = chain.next(token);
                continue;
            };
            // "defined" only means anything inside #if / #elif
            if sym.builtin == Some(Builtin::Defined)
                && !matches!(self.directive, Some(Directive::If | Directive::Elif))
            {
                token = chain.next(token);
                continue;
            }

            if let Some(builtin) = sym.builtin {
                self.run_builtin(chain, builtin, &mut token, end)?;
                continue;
            }

            let function_like = sym.function_like;
            if chain.get(token).referred || sym.in_use {
                chain.get_mut(token).referred = true;
                token = chain.next(token);
                continue;
            }

            let anchor = chain.prev(token);
            let next_id;

            if !function_like {
                // object-like: splice a copy of the body over the name
                let body: Vec<Token> = self.symbols[&name].body.iter().cloned().collect();
                let after = chain.next(token);
                for t in body {
                    chain.insert_before(after, t);
                }
                chain.detach(token);
                next_id = after;
                self.macro_cat(chain, chain.next(anchor), next_id)?;
            } else {
                // function-like: must be an invocation
                let lparen = chain.next(token);
                if lparen == end || !chain.get(lparen).is_operator(Operator::LParen) {
                    token = chain.next(token);
                    continue;
                }
                if chain.next(lparen) == end {
                    return Err(self.error("Unterminated function-like macro invocation"));
                }

                // split the argument list at top-level commas
                let mut slots: Vec<TokenId> = vec![lparen];
                let mut start = chain.next(lparen);
                let delim;
                loop {
                    let Some(stop) = find_arg_end(chain, start, end, true) else {
                        return Err(self.error("Unterminated function-like macro invocation"));
                    };
                    slots.push(stop);
                    start = chain.next(stop);
                    if chain.get(stop).is_operator(Operator::RParen) {
                        delim = stop;
                        break;
                    }
                }

                let params_len = self.symbols[&name].params.len();
                let variadic = self.symbols[&name].variadic;
                let mut argc = slots.len() - 1;
                // calling a zero-parameter macro with an empty argument
                // list is zero arguments, not one empty one
                if argc == 1 && chain.next(slots[0]) == slots[1] && params_len == 0 {
                    argc = 0;
                }
                if argc < params_len {
                    return Err(
                        self.error("Too few arguments provided to function-like macro invocation")
                    );
                }
                if argc > params_len && !variadic {
                    return Err(
                        self.error("Too many arguments provided to function-like macro invocation")
                    );
                }

                if chain.get(token).referred || self.symbols[&name].in_use {
                    chain.get_mut(token).referred = true;
                    token = chain.next(delim);
                    continue;
                }

                // capture the raw arguments before touching the chain
                let mut args: Vec<Vec<Token>> = Vec::with_capacity(argc);
                for i in 0..argc {
                    args.push(chain.clone_range(chain.next(slots[i]), slots[i + 1]));
                }
                let va_raw: Vec<Token> = if argc > params_len {
                    chain.clone_range(chain.next(slots[params_len]), slots[argc])
                } else {
                    Vec::new()
                };

                let out =
                    self.instantiate_body(&name, &args, &va_raw, argc, params_len, has_defined)?;

                // out with the invocation, in with the substitution
                chain.remove_range(chain.next(token), delim);
                chain.detach(delim);
                let after = chain.next(token);
                for t in out {
                    chain.insert_before(after, t);
                }
                chain.detach(token);
                next_id = after;
            }

            // a substituted sequence spelling "defined" is trouble later
            if !*has_defined {
                let mut p = chain.next(anchor);
                while p != next_id {
                    if chain.get(p).ident() == Some("defined") {
                        *has_defined = true;
                        break;
                    }
                    p = chain.next(p);
                }
            }

            // rescan the substituted range with the self-reference guard up
            if let Some(sym) = self.symbols.get_mut(&name) {
                sym.in_use = true;
            }
            let restart = chain.next(anchor);
            let rescan = self.macro_scan(chain, restart, next_id, has_defined);
            if let Some(sym) = self.symbols.get_mut(&name) {
                sym.in_use = false;
            }
            rescan?;

            token = next_id;
        }
        Ok(())
    }

    /// Pass one and two of function-like body instantiation. Returns the
    /// finished replacement sequence.
    fn instantiate_body(
        &mut self,
        name: &str,
        args: &[Vec<Token>],
        va_raw: &[Token],
        argc: usize,
        params_len: usize,
        has_defined: &mut bool,
    ) -> LexResult<Vec<Token>> {
        let (body, params, va_name) = {
            let sym = &self.symbols[name];
            (
                sym.body.iter().cloned().collect::<Vec<Token>>(),
                sym.params.clone(),
                sym.va_name.clone(),
            )
        };
        let va_empty = argc <= params_len || va_raw.is_empty();

        let mut out = TokenChain::new();
        let mut i = 0;
        while i < body.len() {
            let t = &body[i];
            let next_is_concat = body.get(i + 1).is_some_and(|n| n.is_operator(Operator::HashHash));

            // parameter substitution
            if let Some(pn) = t
                .ident()
                .and_then(|id| params.iter().position(|p| p == id))
            {
                if next_is_concat && args[pn].is_empty() {
                    // "<arg> ## ..." with an empty argument: both vanish
                    i += 2;
                    continue;
                }
                self.attach_argument(&mut out, &args[pn], next_is_concat, has_defined)?;
                i += 1;
                continue;
            }

            // variadic substitution: the raw tail, commas included
            if t.ident() == Some(va_name.as_str()) {
                if next_is_concat && va_empty {
                    i += 2;
                    continue;
                }
                if argc > params_len {
                    self.attach_argument(&mut out, va_raw, next_is_concat, has_defined)?;
                }
                i += 1;
                continue;
            }

            if t.is_operator(Operator::HashHash) {
                if let Some(nid) = body.get(i + 1).and_then(|n| n.ident()) {
                    if let Some(pn) = params.iter().position(|p| p == nid) {
                        if args[pn].is_empty() {
                            // "## <arg>" with an empty argument: both vanish
                            i += 2;
                            continue;
                        }
                        // "## <arg>": paste wants the raw argument
                        out.push_back(t.clone());
                        for a in &args[pn] {
                            out.push_back(a.clone());
                        }
                        i += 2;
                        continue;
                    }
                    if nid == va_name && va_empty {
                        i += 2;
                        continue;
                    }
                }
            }

            // GNU ", ## __VA_ARGS__": the comma goes when the tail is empty
            if t.is_operator(Operator::Comma)
                && body
                    .get(i + 1)
                    .is_some_and(|n| n.is_operator(Operator::HashHash))
                && body.get(i + 2).and_then(|n| n.ident()) == Some(va_name.as_str())
            {
                if argc == params_len {
                    i += 3;
                    continue;
                }
                out.push_back(t.clone());
                i += 2;
                continue;
            }

            // "#" stringize
            if t.is_operator(Operator::Hash) {
                let Some(nid) = body.get(i + 1).and_then(|n| n.ident()) else {
                    return Err(self.error("'#' is not followed by a macro parameter"));
                };
                let arg_tokens: &[Token] =
                    if let Some(pn) = params.iter().position(|p| p == nid) {
                        &args[pn]
                    } else if nid == va_name {
                        va_raw
                    } else {
                        return Err(self.error("'#' is not followed by a macro parameter"));
                    };
                let text: String = arg_tokens.iter().map(|a| a.src.as_str()).collect();
                let value = text.trim().to_string();
                out.push_back(Token::from_raw_string(value.clone(), t.loc.clone(), value));
                i += 2;
                continue;
            }

            out.push_back(t.clone());
            i += 1;
        }

        let first = out.first();
        let head = out.head();
        self.macro_cat(&mut out, first, head)?;
        Ok(out.drain_all())
    }

    /// Copies an argument into the output and, unless the body token was
    /// adjacent to `##`, macro-expands the copy in place.
    fn attach_argument(
        &mut self,
        out: &mut TokenChain,
        arg: &[Token],
        suppress_expand: bool,
        has_defined: &mut bool,
    ) -> LexResult<()> {
        let before = out.last();
        for t in arg {
            out.push_back(t.clone());
        }
        if !suppress_expand {
            let begin = out.next(before);
            let end = out.head();
            self.macro_scan(out, begin, end, has_defined)?;
        }
        Ok(())
    }

    /// Pass two: applies every `##` in `[begin, end)`, left to right.
    fn macro_cat(
        &mut self,
        chain: &mut TokenChain,
        begin: TokenId,
        end: TokenId,
    ) -> LexResult<()> {
        let outside = chain.prev(begin);
        let mut t = begin;
        while t != end {
            if !chain.get(t).is_operator(Operator::HashHash) {
                t = chain.next(t);
                continue;
            }
            if chain.prev(t) == outside || chain.next(t) == end {
                return Err(self.error("'##' cannot appear at either end of a macro expansion"));
            }
            let a = chain.detach(chain.prev(t));
            let b = chain.detach(chain.next(t));
            let after = chain.next(t);
            chain.detach(t);
            let merged = self.concat_tokens(a, b)?;
            chain.insert_before(after, merged);
            t = after;
        }
        Ok(())
    }

    /// Welds two tokens into one, per the paste table.
    fn concat_tokens(&mut self, a: Token, b: Token) -> LexResult<Token> {
        match (&a.kind, &b.kind) {
            (TokenKind::Ident(left), TokenKind::Ident(right)) => {
                let mut token = Token::from_ident(
                    format!("{}{}", a.src, b.src),
                    a.loc.clone(),
                    format!("{left}{right}"),
                );
                token.referred = false;
                Ok(token)
            }
            // an identifier welded to an integer never forms a keyword
            (TokenKind::Ident(left), TokenKind::Literal(lit)) if lit.value.is_integer() => {
                Ok(Token::from_ident(
                    format!("{}{}", a.src, b.src),
                    a.loc.clone(),
                    format!("{left}{}", lit.raw),
                ))
            }
            (TokenKind::Operator(x), TokenKind::Operator(y)) => {
                let merged = match (x, y) {
                    (Operator::Minus, Operator::Gt) => Operator::Arrow,
                    (Operator::Plus, Operator::Plus) => Operator::Incr,
                    (Operator::Minus, Operator::Minus) => Operator::Decr,
                    (Operator::Gt, Operator::Gt) => Operator::Shr,
                    (Operator::Lt, Operator::Lt) => Operator::Shl,
                    (Operator::BAnd, Operator::BAnd) => Operator::LAnd,
                    (Operator::BOr, Operator::BOr) => Operator::LOr,
                    (Operator::Plus, Operator::Assign) => Operator::AddAssign,
                    (Operator::Minus, Operator::Assign) => Operator::SubAssign,
                    (Operator::Star, Operator::Assign) => Operator::MulAssign,
                    (Operator::Slash, Operator::Assign) => Operator::DivAssign,
                    (Operator::Percent, Operator::Assign) => Operator::ModAssign,
                    (Operator::BAnd, Operator::Assign) => Operator::AndAssign,
                    (Operator::BOr, Operator::Assign) => Operator::OrAssign,
                    (Operator::BXor, Operator::Assign) => Operator::XorAssign,
                    (Operator::Gt, Operator::Assign) => Operator::Geq,
                    (Operator::Lt, Operator::Assign) => Operator::Leq,
                    (Operator::Assign, Operator::Assign) => Operator::Eq,
                    (Operator::LNot, Operator::Assign) => Operator::Neq,
                    (Operator::Lt, Operator::Leq) => Operator::ShlAssign,
                    (Operator::Gt, Operator::Geq) => Operator::ShrAssign,
                    (Operator::Shl, Operator::Assign) => Operator::ShlAssign,
                    (Operator::Shr, Operator::Assign) => Operator::ShrAssign,
                    _ => {
                        return Err(self.error(format!(
                            "'{}{}' is an invalid preprocessor token",
                            x.name(),
                            y.name()
                        )))
                    }
                };
                Ok(Token::from_operator(
                    merged.name().to_string(),
                    a.loc.clone(),
                    merged,
                ))
            }
            _ => Err(self.error(format!(
                "'{}{}' is an invalid preprocessor token",
                a.text(),
                b.text()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // builtin extension macros
    // ------------------------------------------------------------------

    /// Executes a builtin extension in place of textual substitution. The
    /// cursor is left on the first token after the rewritten range.
    fn run_builtin(
        &mut self,
        chain: &mut TokenChain,
        builtin: Builtin,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<()> {
        match builtin {
            Builtin::File => {
                let file = self.loc.file.clone();
                let token = Token::from_raw_string(file.clone(), self.loc.clone(), file);
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::Line => {
                let token = Token::from_int(self.loc.row, self.loc.clone());
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::Date => {
                let date = chrono::Local::now().format("%b %e %Y").to_string();
                let token = Token::from_raw_string(date.clone(), self.loc.clone(), date);
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::Time => {
                let time = chrono::Local::now().format("%H:%M:%S").to_string();
                let token = Token::from_raw_string(time.clone(), self.loc.clone(), time);
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::Timestamp => {
                let stamp = fs::metadata(&self.file().name)
                    .and_then(|meta| meta.modified())
                    .map(|mtime| {
                        chrono::DateTime::<chrono::Local>::from(mtime)
                            .format("%a %b %e %T %Y")
                            .to_string()
                    })
                    .unwrap_or_else(|_| "??? ??? ?? ??:??:?? ????".to_string());
                let token = Token::from_raw_string(stamp.clone(), self.loc.clone(), stamp);
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::BaseFile => {
                let base = self.files[0].display.clone();
                let token = Token::from_raw_string(base.clone(), self.loc.clone(), base);
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::IncludeLevel => {
                let level = self.files.len() as i64 - 1;
                let token = Token::from_int(level, self.loc.clone());
                let to = chain.next(*cursor);
                range_subst(chain, cursor, to, token);
            }

            Builtin::Identity => {
                // __func__ / __FUNCTION__ are the parser's problem
                *cursor = chain.next(*cursor);
            }

            Builtin::Defined => self.builtin_defined(chain, cursor, end)?,

            Builtin::HasInclude => self.builtin_has_include(chain, cursor, end, false)?,
            Builtin::HasIncludeNext => self.builtin_has_include(chain, cursor, end, true)?,

            Builtin::HasBuiltin => self.builtin_feature_check(chain, cursor, end, builtin)?,
            Builtin::HasFeature => self.builtin_feature_check(chain, cursor, end, builtin)?,
            Builtin::HasExtension => self.builtin_feature_check(chain, cursor, end, builtin)?,
        }
        Ok(())
    }

    /// `defined X` and `defined(X)`.
    fn builtin_defined(
        &mut self,
        chain: &mut TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<()> {
        let mut tok = chain.next(*cursor);
        if tok == end {
            return Err(self.error("Macro name missing"));
        }
        let parenthesized;
        let ident;
        match &chain.get(tok).kind {
            TokenKind::Ident(name) => {
                parenthesized = false;
                ident = name.clone();
                tok = chain.next(tok);
            }
            TokenKind::Operator(Operator::LParen) => {
                parenthesized = true;
                tok = chain.next(tok);
                match (tok != end).then(|| chain.get(tok).ident()).flatten() {
                    Some(name) => {
                        ident = name.to_string();
                        tok = chain.next(tok);
                    }
                    None => return Err(self.error("Macro name must be an identifier")),
                }
            }
            _ => return Err(self.error("Macro name must be an identifier")),
        }
        if parenthesized {
            if tok == end || !chain.get(tok).is_operator(Operator::RParen) {
                return Err(self.error("Missing ')' after 'defined'"));
            }
            tok = chain.next(tok);
        }
        if ident == "defined" {
            return Err(self.error("'defined' is not a valid macro name"));
        }
        let value = self.symbols.contains_key(&ident) as i64;
        range_subst(chain, cursor, tok, Token::from_int(value, self.loc.clone()));
        Ok(())
    }

    /// `__has_builtin(X)` / `__has_feature(X)` / `__has_extension(X)`.
    fn builtin_feature_check(
        &mut self,
        chain: &mut TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
        builtin: Builtin,
    ) -> LexResult<()> {
        let what = match builtin {
            Builtin::HasBuiltin => "__has_builtin",
            Builtin::HasFeature => "__has_feature",
            _ => "__has_extension",
        };
        let n1 = chain.next(*cursor);
        if n1 == end || !chain.get(n1).is_operator(Operator::LParen) {
            return Err(self.error(format!("Missing '(' after '{what}'")));
        }
        let n2 = chain.next(n1);
        let n3 = if n2 == end { end } else { chain.next(n2) };
        if n2 == end || n3 == end {
            return Err(self.error("Unterminated function-like macro invocation"));
        }
        let Some(ident) = chain.get(n2).ident().map(str::to_string) else {
            return Err(
                self.error("Builtin feature check macro requires a single parenthesized identifier")
            );
        };
        if !chain.get(n3).is_operator(Operator::RParen) {
            return Err(
                self.error("Builtin feature check macro requires a single parenthesized identifier")
            );
        }
        let member = match builtin {
            Builtin::HasBuiltin => self.builtins.contains(&ident),
            Builtin::HasFeature => self.features.contains(&ident),
            _ => self.extensions.contains(&ident),
        };
        let tail = chain.next(n3);
        range_subst(chain, cursor, tail, Token::from_int(member as i64, self.loc.clone()));
        Ok(())
    }

    /// `__has_include("…")`, `__has_include(<…>)` and the `_next` variant:
    /// a probe-only include search.
    fn builtin_has_include(
        &mut self,
        chain: &mut TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
        is_next: bool,
    ) -> LexResult<()> {
        let lparen = chain.next(*cursor);
        if lparen == end || !chain.get(lparen).is_operator(Operator::LParen) {
            return Err(self.error("Missing '(' after '__has_include'"));
        }

        let mut is_sys = true;
        let mut is_macro = false;
        let first_arg = chain.next(lparen);
        if first_arg == end {
            return Err(self.error("Expected \"FILENAME\" or <FILENAME>"));
        }

        // the operand may itself come from macros
        let operand_is_literal = {
            let t = chain.get(first_arg);
            matches!(&t.kind, TokenKind::Literal(lit) if matches!(lit.value, LiteralValue::Str(_)))
                || t.is_operator(Operator::Lt)
        };
        if !operand_is_literal {
            if chain.get(first_arg).ident().is_none() {
                return Err(self.error("Expected \"FILENAME\" or <FILENAME>"));
            }
            let Some(stop) = find_arg_end(chain, first_arg, end, false) else {
                return Err(self.error("Expected value in expression"));
            };
            self.macro_subst(chain, first_arg, stop)?;
            is_macro = true;
        }

        let mut tok = chain.next(lparen);
        if tok == end {
            return Err(self.error("Expected value in expression"));
        }

        let path;
        match &chain.get(tok).kind {
            TokenKind::Literal(lit) if matches!(lit.value, LiteralValue::Str(_)) => {
                is_sys = false;
                path = strip_quotes(&lit.raw);
                tok = chain.next(tok);
            }
            TokenKind::Operator(Operator::Lt) => {
                tok = chain.next(tok);
                let mut collected = String::new();
                while tok != end && !chain.get(tok).is_operator(Operator::Gt) {
                    collected.push_str(&chain.get(tok).src);
                    tok = chain.next(tok);
                }
                if tok == end {
                    return Err(self.error("Expected \"FILENAME\" or <FILENAME>"));
                }
                // macro-substituted spellings carry stray whitespace
                path = if is_macro {
                    collected.trim().to_string()
                } else {
                    collected
                };
                tok = chain.next(tok);
            }
            _ => return Err(self.error("Expected \"FILENAME\" or <FILENAME>")),
        }

        if tok == end || !chain.get(tok).is_operator(Operator::RParen) {
            return Err(self.error("Missing ')' after '__has_include'"));
        }

        let saved_sys = self.include_sys;
        let saved_next = self.include_next;
        if is_sys {
            self.include_sys = true;
        }
        if is_next {
            self.include_next = true;
        }
        let found = self.load_include(&path, true)?;
        self.include_sys = saved_sys;
        self.include_next = saved_next;

        let tail = chain.next(tok);
        range_subst(chain, cursor, tail, Token::from_int(found as i64, self.loc.clone()));
        Ok(())
    }
}
