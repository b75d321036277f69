//! Token model for the preprocessor.
//!
//! Every token carries its verbatim source text (`src`) alongside the
//! decoded value. The source text includes whatever trivia preceded the
//! token since the previous commit; `#`-stringize and diagnostics depend on
//! that exact spelling surviving macro expansion.

use cpre_util::SourceLoc;

/// C keywords recognised after preprocessing (C89 plus the C99 additions).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Auto,
    Bool,
    Break,
    Case,
    Char,
    Complex,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Imaginary,
    Inline,
    Int,
    Long,
    Register,
    Restrict,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,
}

/// Identifier-to-keyword promotion table.
const KEYWORDS: &[(&str, Keyword)] = &[
    ("auto", Keyword::Auto),
    ("_Bool", Keyword::Bool),
    ("break", Keyword::Break),
    ("case", Keyword::Case),
    ("char", Keyword::Char),
    ("_Complex", Keyword::Complex),
    ("const", Keyword::Const),
    ("continue", Keyword::Continue),
    ("default", Keyword::Default),
    ("do", Keyword::Do),
    ("double", Keyword::Double),
    ("else", Keyword::Else),
    ("enum", Keyword::Enum),
    ("extern", Keyword::Extern),
    ("float", Keyword::Float),
    ("for", Keyword::For),
    ("goto", Keyword::Goto),
    ("if", Keyword::If),
    ("_Imaginary", Keyword::Imaginary),
    ("inline", Keyword::Inline),
    ("int", Keyword::Int),
    ("long", Keyword::Long),
    ("register", Keyword::Register),
    ("restrict", Keyword::Restrict),
    ("return", Keyword::Return),
    ("short", Keyword::Short),
    ("signed", Keyword::Signed),
    ("sizeof", Keyword::Sizeof),
    ("static", Keyword::Static),
    ("struct", Keyword::Struct),
    ("switch", Keyword::Switch),
    ("typedef", Keyword::Typedef),
    ("union", Keyword::Union),
    ("unsigned", Keyword::Unsigned),
    ("void", Keyword::Void),
    ("volatile", Keyword::Volatile),
    ("while", Keyword::While),
];

/// Looks up the keyword for an identifier spelling, if any.
///
/// # Examples
///
/// ```
/// use cpre_lex::token::{keyword_from_ident, Keyword};
///
/// assert_eq!(keyword_from_ident("while"), Some(Keyword::While));
/// assert_eq!(keyword_from_ident("whale"), None);
/// ```
pub fn keyword_from_ident(ident: &str) -> Option<Keyword> {
    KEYWORDS
        .iter()
        .find(|(name, _)| *name == ident)
        .map(|(_, kw)| *kw)
}

impl Keyword {
    /// Canonical spelling of the keyword.
    pub fn name(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

/// The full C operator set, plus the preprocessor-only `#` and `##`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Incr,
    Decr,
    Eq,
    Gt,
    Lt,
    Neq,
    Geq,
    Leq,
    LAnd,
    LOr,
    LNot,
    BAnd,
    BOr,
    BXor,
    BInv,
    Shl,
    Shr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,
    Semicolon,
    Arrow,
    Ellipsis,
    Hash,
    HashHash,
}

impl Operator {
    /// Canonical spelling of the operator.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Percent => "%",
            Operator::Incr => "++",
            Operator::Decr => "--",
            Operator::Eq => "==",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Neq => "!=",
            Operator::Geq => ">=",
            Operator::Leq => "<=",
            Operator::LAnd => "&&",
            Operator::LOr => "||",
            Operator::LNot => "!",
            Operator::BAnd => "&",
            Operator::BOr => "|",
            Operator::BXor => "^",
            Operator::BInv => "~",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::Assign => "=",
            Operator::AddAssign => "+=",
            Operator::SubAssign => "-=",
            Operator::MulAssign => "*=",
            Operator::DivAssign => "/=",
            Operator::ModAssign => "%=",
            Operator::ShlAssign => "<<=",
            Operator::ShrAssign => ">>=",
            Operator::AndAssign => "&=",
            Operator::XorAssign => "^=",
            Operator::OrAssign => "|=",
            Operator::Question => "?",
            Operator::LParen => "(",
            Operator::RParen => ")",
            Operator::LBracket => "[",
            Operator::RBracket => "]",
            Operator::LBrace => "{",
            Operator::RBrace => "}",
            Operator::Colon => ":",
            Operator::Comma => ",",
            Operator::Dot => ".",
            Operator::Semicolon => ";",
            Operator::Arrow => "->",
            Operator::Ellipsis => "...",
            Operator::Hash => "#",
            Operator::HashHash => "##",
        }
    }
}

/// Decoded literal value. The variant doubles as the literal's C type.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Long(i64),
    LongLong(i64),
    UInt(u64),
    ULong(u64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    LongDouble(f64),
    /// Character constant: evaluated escape bytes.
    Char(Vec<u8>),
    /// String literal: evaluated escape bytes.
    Str(Vec<u8>),
}

impl LiteralValue {
    /// True for the six integer variants.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            LiteralValue::Int(_)
                | LiteralValue::Long(_)
                | LiteralValue::LongLong(_)
                | LiteralValue::UInt(_)
                | LiteralValue::ULong(_)
                | LiteralValue::ULongLong(_)
        )
    }

    /// Tag used in debug dumps, mirroring the literal's C type.
    pub fn type_name(&self) -> &'static str {
        match self {
            LiteralValue::Int(_) => "INT",
            LiteralValue::Long(_) => "LONG",
            LiteralValue::LongLong(_) => "LONGLONG",
            LiteralValue::UInt(_) => "UINT",
            LiteralValue::ULong(_) => "ULONG",
            LiteralValue::ULongLong(_) => "ULONGLONG",
            LiteralValue::Float(_) => "FLOAT",
            LiteralValue::Double(_) => "DOUBLE",
            LiteralValue::LongDouble(_) => "LONGDOUBLE",
            LiteralValue::Char(_) => "CHARS",
            LiteralValue::Str(_) => "STRING",
        }
    }
}

/// A literal token: decoded value plus the raw spelling it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    /// Decoded value; the variant is the literal's type.
    pub value: LiteralValue,
    /// Raw spelling. Strings and chars keep their quotes here.
    pub raw: String,
}

/// Token kind: the tagged variant of the token model.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Eof,
    Ident(String),
    Literal(Literal),
    Keyword(Keyword),
    Operator(Operator),
}

/// A single preprocessor token.
#[derive(Clone, Debug)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// Verbatim source text, including leading trivia since the previous
    /// token. Never empty for tokens read from a file.
    pub src: String,
    /// Where the token was read (or the macro name for expanded tokens).
    pub loc: SourceLoc,
    /// Set when the token named a macro that was already being expanded.
    /// Such tokens are permanently exempt from further expansion.
    pub referred: bool,
}

/// Integer literal kinds accepted by the number scanner; used to pick the
/// conversion in [`Token::from_number`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
}

impl Token {
    fn new(kind: TokenKind, src: String, loc: SourceLoc) -> Self {
        Self {
            kind,
            src,
            loc,
            referred: false,
        }
    }

    /// An identifier token.
    pub fn from_ident(src: String, loc: SourceLoc, ident: String) -> Self {
        Self::new(TokenKind::Ident(ident), src, loc)
    }

    /// An operator token.
    pub fn from_operator(src: String, loc: SourceLoc, op: Operator) -> Self {
        Self::new(TokenKind::Operator(op), src, loc)
    }

    /// A synthesized integer token (macro engine results such as
    /// `__LINE__` or `defined`). Typed long long, decimal spelling.
    pub fn from_int(value: i64, loc: SourceLoc) -> Self {
        let text = value.to_string();
        Self::new(
            TokenKind::Literal(Literal {
                value: LiteralValue::LongLong(value),
                raw: text.clone(),
            }),
            text,
            loc,
        )
    }

    /// A string literal built from already-decoded content: stringize
    /// results and builtin macros. No escape evaluation is applied.
    pub fn from_raw_string(src: String, loc: SourceLoc, value: String) -> Self {
        Self::new(
            TokenKind::Literal(Literal {
                raw: format!("\"{value}\""),
                value: LiteralValue::Str(value.into_bytes()),
            }),
            src,
            loc,
        )
    }

    /// A character constant from its scanned body (quotes excluded).
    /// Escapes are evaluated; `allow_escape_e` admits the GNU `\e`.
    pub fn from_char(src: String, loc: SourceLoc, body: &str, allow_escape_e: bool) -> Self {
        Self::new(
            TokenKind::Literal(Literal {
                raw: format!("'{body}'"),
                value: LiteralValue::Char(eval_escapes(body, allow_escape_e)),
            }),
            src,
            loc,
        )
    }

    /// A string literal from its scanned body (quotes excluded).
    pub fn from_string(src: String, loc: SourceLoc, body: &str, allow_escape_e: bool) -> Self {
        Self::new(
            TokenKind::Literal(Literal {
                raw: format!("\"{body}\""),
                value: LiteralValue::Str(eval_escapes(body, allow_escape_e)),
            }),
            src,
            loc,
        )
    }

    /// A numeric literal from its scanned spelling. Returns the token and
    /// an overflow flag; overflow commits a clamped value and the caller
    /// warns.
    pub fn from_number(src: String, loc: SourceLoc, text: &str, kind: NumberKind) -> (Self, bool) {
        let (value, overflow) = convert_number(text, kind);
        let token = Self::new(
            TokenKind::Literal(Literal {
                value,
                raw: text.to_string(),
            }),
            src,
            loc,
        );
        (token, overflow)
    }

    /// An end-of-file marker.
    pub fn eof(loc: SourceLoc) -> Self {
        Self::new(TokenKind::Eof, String::new(), loc)
    }

    /// The identifier spelling, if this token is an identifier.
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// True if this token is the given operator.
    pub fn is_operator(&self, op: Operator) -> bool {
        self.kind == TokenKind::Operator(op)
    }

    /// Value equality: kinds and decoded values, ignoring spelling. Used by
    /// the redefinition check, where `0x10` and `16` count as the same
    /// token.
    pub fn same_value(&self, other: &Token) -> bool {
        match (&self.kind, &other.kind) {
            (TokenKind::Literal(a), TokenKind::Literal(b)) => a.value == b.value,
            (a, b) => a == b,
        }
    }

    /// The token's text for message assembly: identifiers and literals use
    /// their spelling, keywords and operators their canonical names.
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Eof => "<EOF>".to_string(),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Literal(lit) => lit.raw.clone(),
            TokenKind::Keyword(kw) => kw.name().to_string(),
            TokenKind::Operator(op) => op.name().to_string(),
        }
    }

    /// A debug rendering of the token, `{KIND:spelling}` style.
    pub fn repr(&self) -> String {
        match &self.kind {
            TokenKind::Eof => "{EOF}".to_string(),
            TokenKind::Ident(name) => format!("{{ID:{name}}}"),
            TokenKind::Keyword(kw) => format!("{{KW:{}}}", kw.name()),
            TokenKind::Operator(op) => format!("{{OP:{}}}", op.name()),
            TokenKind::Literal(lit) => format!("{{{}:{}}}", lit.value.type_name(), lit.raw),
        }
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Evaluates C escape sequences in a scanned char/string body.
///
/// The scanner has already validated the escapes, so this only needs to
/// decode: simple escapes, `\x` hex pairs, one-to-three digit octals, and
/// the GNU `\e` when enabled. Anything unrecognised is copied through.
fn eval_escapes(body: &str, allow_escape_e: bool) -> Vec<u8> {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&b) = bytes.get(i) else {
            out.push(b'\\');
            break;
        };
        match b {
            b'?' | b'"' | b'\'' | b'\\' => {
                out.push(b);
                i += 1;
            }
            b'a' => {
                out.push(0x07);
                i += 1;
            }
            b'b' => {
                out.push(0x08);
                i += 1;
            }
            b'f' => {
                out.push(0x0c);
                i += 1;
            }
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'v' => {
                out.push(0x0b);
                i += 1;
            }
            b'e' if allow_escape_e => {
                out.push(0x1b);
                i += 1;
            }
            b'x' | b'X' => {
                i += 1;
                let mut val = 0u8;
                let mut digits = 0;
                while digits < 2 {
                    match bytes.get(i) {
                        Some(&d) if d.is_ascii_hexdigit() => {
                            val = (val << 4) | hex_value(d);
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(val);
            }
            b'0'..=b'7' => {
                // Octal escapes are at most three digits, and only values
                // that fit a byte: a leading 4-7 admits one more digit.
                let count = if b <= b'3' { 3 } else { 2 };
                let mut val = 0u8;
                let mut digits = 0;
                while digits < count {
                    match bytes.get(i) {
                        Some(&d) if (b'0'..=b'7').contains(&d) => {
                            val = (val << 3) | (d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(val);
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

/// Splits a numeric spelling into (radix, digits) by its prefix.
fn radix_of(text: &str) -> (u32, &str) {
    let lower = text.as_bytes();
    if lower.len() > 2 && lower[0] == b'0' {
        match lower[1] {
            b'x' | b'X' => return (16, &text[2..]),
            b'b' | b'B' => return (2, &text[2..]),
            _ => {}
        }
    }
    if lower.len() > 1 && lower[0] == b'0' {
        return (8, &text[1..]);
    }
    (10, text)
}

fn parse_unsigned(digits: &str, radix: u32) -> (u64, bool) {
    let mut value: u64 = 0;
    let mut overflow = false;
    for b in digits.bytes() {
        let d = match b {
            b'0'..=b'9' => (b - b'0') as u64,
            b'a'..=b'f' => (b - b'a' + 10) as u64,
            b'A'..=b'F' => (b - b'A' + 10) as u64,
            _ => break, // type suffix
        };
        let (mul, o1) = value.overflowing_mul(radix as u64);
        let (add, o2) = mul.overflowing_add(d);
        if o1 || o2 {
            overflow = true;
            value = u64::MAX;
            break;
        }
        value = add;
    }
    (value, overflow)
}

fn parse_signed(digits: &str, radix: u32) -> (i64, bool) {
    let (value, overflow) = parse_unsigned(digits, radix);
    if overflow || value > i64::MAX as u64 {
        (i64::MAX, true)
    } else {
        (value as i64, false)
    }
}

fn parse_float(text: &str) -> (f64, bool) {
    let digits = text.trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L'));
    let value: f64 = digits.parse().unwrap_or(0.0);
    (value, value.is_infinite())
}

/// Converts a scanned numeric spelling to its typed value. Returns the
/// value and whether the conversion overflowed (clamped result).
fn convert_number(text: &str, kind: NumberKind) -> (LiteralValue, bool) {
    match kind {
        NumberKind::Int | NumberKind::Long | NumberKind::LongLong => {
            let (radix, digits) = radix_of(text);
            let (value, overflow) = parse_signed(digits, radix);
            let value = match kind {
                NumberKind::Int => LiteralValue::Int(value),
                NumberKind::Long => LiteralValue::Long(value),
                _ => LiteralValue::LongLong(value),
            };
            (value, overflow)
        }
        NumberKind::UInt | NumberKind::ULong | NumberKind::ULongLong => {
            let (radix, digits) = radix_of(text);
            let (value, overflow) = parse_unsigned(digits, radix);
            let value = match kind {
                NumberKind::UInt => LiteralValue::UInt(value),
                NumberKind::ULong => LiteralValue::ULong(value),
                _ => LiteralValue::ULongLong(value),
            };
            (value, overflow)
        }
        NumberKind::Float => {
            let (value, overflow) = parse_float(text);
            (LiteralValue::Float(value as f32), overflow)
        }
        NumberKind::Double => {
            let (value, overflow) = parse_float(text);
            (LiteralValue::Double(value), overflow)
        }
        NumberKind::LongDouble => {
            let (value, overflow) = parse_float(text);
            (LiteralValue::LongDouble(value), overflow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLoc {
        SourceLoc::new("t.c", 1, 1)
    }

    #[test]
    fn test_keyword_promotion_is_a_function() {
        assert_eq!(keyword_from_ident("_Bool"), Some(Keyword::Bool));
        assert_eq!(keyword_from_ident("restrict"), Some(Keyword::Restrict));
        assert_eq!(keyword_from_ident("_Imaginary"), Some(Keyword::Imaginary));
        assert_eq!(keyword_from_ident("bool"), None);
        // identical text always yields the identical tag
        assert_eq!(keyword_from_ident("while"), keyword_from_ident("while"));
    }

    #[test]
    fn test_keyword_name_round_trip() {
        for (name, kw) in KEYWORDS {
            assert_eq!(kw.name(), *name);
            assert_eq!(keyword_from_ident(name), Some(*kw));
        }
    }

    #[test]
    fn test_escape_evaluation() {
        assert_eq!(eval_escapes("a\\nb", false), b"a\nb");
        assert_eq!(eval_escapes("\\x41\\x4a", false), b"AJ");
        assert_eq!(eval_escapes("\\101", false), b"A");
        assert_eq!(eval_escapes("\\0", false), b"\0");
        assert_eq!(eval_escapes("\\47", false), b"'");
        assert_eq!(eval_escapes("\\\\", false), b"\\");
    }

    #[test]
    fn test_escape_e_is_gated() {
        assert_eq!(eval_escapes("\\e", true), b"\x1b");
        // without the extension, the char is copied through
        assert_eq!(eval_escapes("\\e", false), b"e");
    }

    #[test]
    fn test_octal_escape_width() {
        // a leading digit over 3 only admits two octal digits total
        assert_eq!(eval_escapes("\\3771", false), &[0xff, b'1'][..]);
        assert_eq!(eval_escapes("\\47x", false), &[0x27, b'x'][..]);
    }

    #[test]
    fn test_number_radix_dispatch() {
        let (v, o) = convert_number("0x10", NumberKind::Int);
        assert_eq!(v, LiteralValue::Int(16));
        assert!(!o);
        let (v, _) = convert_number("0b101", NumberKind::Int);
        assert_eq!(v, LiteralValue::Int(5));
        let (v, _) = convert_number("017", NumberKind::Int);
        assert_eq!(v, LiteralValue::Int(15));
        let (v, _) = convert_number("42", NumberKind::Int);
        assert_eq!(v, LiteralValue::Int(42));
        let (v, _) = convert_number("0", NumberKind::Int);
        assert_eq!(v, LiteralValue::Int(0));
    }

    #[test]
    fn test_number_suffix_stops_conversion() {
        let (v, _) = convert_number("10ul", NumberKind::ULong);
        assert_eq!(v, LiteralValue::ULong(10));
        let (v, _) = convert_number("7LL", NumberKind::LongLong);
        assert_eq!(v, LiteralValue::LongLong(7));
    }

    #[test]
    fn test_number_overflow_is_clamped() {
        let (v, o) = convert_number("99999999999999999999999", NumberKind::Int);
        assert_eq!(v, LiteralValue::Int(i64::MAX));
        assert!(o);
        let (v, o) = convert_number("0xffffffffffffffffff", NumberKind::ULongLong);
        assert_eq!(v, LiteralValue::ULongLong(u64::MAX));
        assert!(o);
    }

    #[test]
    fn test_float_conversion() {
        let (v, o) = convert_number("2.5e-3", NumberKind::Double);
        assert_eq!(v, LiteralValue::Double(2.5e-3));
        assert!(!o);
        let (v, _) = convert_number("1.5f", NumberKind::Float);
        assert_eq!(v, LiteralValue::Float(1.5));
    }

    #[test]
    fn test_same_value_ignores_src() {
        let mut a = Token::from_int(3, loc());
        let b = Token::from_int(3, loc());
        a.src = "  3".to_string();
        assert!(a.same_value(&b));
        let c = Token::from_int(4, loc());
        assert!(!a.same_value(&c));
    }

    #[test]
    fn test_char_token_value() {
        let t = Token::from_char("'a'".into(), loc(), "a", false);
        match &t.kind {
            TokenKind::Literal(lit) => {
                assert_eq!(lit.value, LiteralValue::Char(b"a".to_vec()));
                assert_eq!(lit.raw, "'a'");
            }
            _ => panic!("not a literal"),
        }
    }

    #[test]
    fn test_repr() {
        let t = Token::from_int(1, loc());
        assert_eq!(t.repr(), "{LONGLONG:1}");
        let t = Token::from_operator("##".into(), loc(), Operator::HashHash);
        assert_eq!(t.repr(), "{OP:##}");
    }
}
