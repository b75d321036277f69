//! Raw tokenization: literals, operators, comments, continuations and the
//! diagnostics the character machine raises.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use cpre_lex::{GnuExt, Keyword, Lexer, LiteralValue, SourceFile, Token, TokenKind};
use cpre_util::diag::CollectedDiagnostics;

fn lexer(source: &str) -> (Lexer, Rc<RefCell<CollectedDiagnostics>>) {
    let mut lexer = Lexer::new(SourceFile::from_string("test.c", source));
    let sink = Rc::new(RefCell::new(CollectedDiagnostics::new()));
    lexer.set_diagnostic_sink(Box::new(Rc::clone(&sink)));
    (lexer, sink)
}

fn tokens(source: &str) -> Vec<Token> {
    let (mut lexer, _sink) = lexer(source);
    std::iter::from_fn(|| lexer.next_token()).collect()
}

fn texts(source: &str) -> Vec<String> {
    tokens(source).iter().map(Token::text).collect()
}

fn literal_values(source: &str) -> Vec<LiteralValue> {
    tokens(source)
        .into_iter()
        .filter_map(|t| match t.kind {
            TokenKind::Literal(lit) => Some(lit.value),
            _ => None,
        })
        .collect()
}

fn messages(source: &str) -> Vec<String> {
    let (mut lexer, sink) = lexer(source);
    while lexer.next_token().is_some() {}
    let sink = sink.borrow();
    sink.diagnostics.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn keywords_are_promoted() {
    let kinds: Vec<TokenKind> = tokens("while inline _Bool restrict _Imaginary whale")
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Keyword(Keyword::While),
            TokenKind::Keyword(Keyword::Inline),
            TokenKind::Keyword(Keyword::Bool),
            TokenKind::Keyword(Keyword::Restrict),
            TokenKind::Keyword(Keyword::Imaginary),
            TokenKind::Ident("whale".to_string()),
        ]
    );
}

#[test]
fn operators_longest_match() {
    assert_eq!(
        texts("a->b ++ -- << >> <= >= == != && || ... <<= >>= ^= |="),
        [
            "a", "->", "b", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "...",
            "<<=", ">>=", "^=", "|="
        ]
    );
}

#[test]
fn integer_literal_kinds() {
    assert_eq!(
        literal_values("0 42 0x10 017 0b101 7u 7l 7ll 7ul 7ull"),
        vec![
            LiteralValue::Int(0),
            LiteralValue::Int(42),
            LiteralValue::Int(16),
            LiteralValue::Int(15),
            LiteralValue::Int(5),
            LiteralValue::UInt(7),
            LiteralValue::Long(7),
            LiteralValue::LongLong(7),
            LiteralValue::ULong(7),
            LiteralValue::ULongLong(7),
        ]
    );
}

#[test]
fn float_literal_kinds() {
    assert_eq!(
        literal_values("1.5 1.5f 1.5L 2e3 2e-3 0.5 5."),
        vec![
            LiteralValue::Double(1.5),
            LiteralValue::Float(1.5),
            LiteralValue::LongDouble(1.5),
            LiteralValue::Double(2e3),
            LiteralValue::Double(2e-3),
            LiteralValue::Double(0.5),
            LiteralValue::Double(5.0),
        ]
    );
}

#[test]
fn dot_prefixed_float() {
    assert_eq!(
        literal_values("x = .5;"),
        vec![LiteralValue::Double(0.5)]
    );
}

#[test]
fn octal_digit_out_of_range_is_an_error() {
    let msgs = messages("int x = 09;");
    assert!(msgs.iter().any(|m| m.contains("Invalid octal digit")));
}

#[test]
fn integer_overflow_warns_but_commits() {
    let (mut lexer, sink) = lexer("999999999999999999999999999");
    let token = lexer.next_token().expect("token survives overflow");
    match token.kind {
        TokenKind::Literal(lit) => assert_eq!(lit.value, LiteralValue::Int(i64::MAX)),
        other => panic!("unexpected {other:?}"),
    }
    assert!(sink
        .borrow()
        .messages()
        .iter()
        .any(|m| m.contains("out of range")));
}

#[test]
fn string_escapes_evaluate() {
    let values = literal_values(r#"char *s = "a\tb\x41\101\n";"#);
    assert_eq!(values, vec![LiteralValue::Str(b"a\tbAA\n".to_vec())]);
}

#[test]
fn char_literals_evaluate() {
    assert_eq!(
        literal_values("'a' '\\n' '\\x41'"),
        vec![
            LiteralValue::Char(b"a".to_vec()),
            LiteralValue::Char(b"\n".to_vec()),
            LiteralValue::Char(b"A".to_vec()),
        ]
    );
}

#[test]
fn multi_byte_char_warns() {
    let msgs = messages("int c = 'ab';");
    assert!(msgs
        .iter()
        .any(|m| m.contains("Multi-character character constant")));
}

#[test]
fn empty_char_is_an_error() {
    let msgs = messages("int c = '';");
    assert!(msgs.iter().any(|m| m.contains("Empty character constant")));
}

#[test]
fn escape_e_requires_extension() {
    // without the extension, '\e' is an unknown escape
    let msgs = messages(r"char c = '\e';");
    assert!(msgs.iter().any(|m| m.contains("Unknown escape character")));

    let mut lexer = Lexer::new(SourceFile::from_string("t.c", r"'\e'"));
    lexer.set_gnu_ext(GnuExt::EscapeChar, true);
    let token = lexer.next_token().expect("escape accepted");
    match token.kind {
        TokenKind::Literal(lit) => assert_eq!(lit.value, LiteralValue::Char(vec![0x1b])),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn dollar_identifiers_are_gated() {
    let msgs = messages("int a$b;");
    assert!(msgs.iter().any(|m| m.contains("Invalid character")));

    let mut lexer = Lexer::new(SourceFile::from_string("t.c", "a$b"));
    lexer.set_gnu_ext(GnuExt::DollarIdent, true);
    let token = lexer.next_token().expect("dollar identifier");
    assert_eq!(token.ident(), Some("a$b"));
}

#[test]
fn line_comment_is_trivia() {
    assert_eq!(texts("int x; // comment ; until eol\nint y;"), [
        "int", "x", ";", "int", "y", ";"
    ]);
}

#[test]
fn block_comment_spans_lines() {
    assert_eq!(
        texts("int /* one\n two\n three */ x;"),
        ["int", "x", ";"]
    );
}

#[test]
fn unterminated_block_comment_warns() {
    let msgs = messages("int x; /* never closed");
    assert!(msgs
        .iter()
        .any(|m| m.contains("EOF when parsing block comment")));
}

#[test]
fn line_continuation_splices() {
    assert_eq!(texts("int ve\\\nry;"), ["int", "very", ";"]);
}

#[test]
fn continuation_with_trailing_blanks_warns() {
    let (mut lexer, sink) = lexer("int ve\\   \nry;");
    let all: Vec<String> = std::iter::from_fn(|| lexer.next_token())
        .map(|t| t.text())
        .collect();
    assert_eq!(all, ["int", "very", ";"]);
    assert!(sink
        .borrow()
        .messages()
        .iter()
        .any(|m| m.contains("Whitespaces after line continuation")));
}

#[test]
fn stray_hash_mid_line_is_an_error() {
    let msgs = messages("int x # y;");
    assert!(msgs.iter().any(|m| m.contains("Invalid character '#'")));
}

#[test]
fn token_src_preserves_spelling() {
    let all = tokens("x  =  0x10 ;");
    let srcs: Vec<&str> = all.iter().map(|t| t.src.trim_start()).collect();
    assert_eq!(srcs, ["x", "=", "0x10", ";"]);
    // untrimmed, the source keeps the leading trivia
    assert_eq!(all[1].src, "  =");
}

#[test]
fn token_locations_track_lines() {
    let all = tokens("a\nb\nc");
    let rows: Vec<i64> = all.iter().map(|t| t.loc.row).collect();
    assert_eq!(rows, [1, 2, 3]);
    assert!(all.iter().all(|t| t.loc.file == "test.c"));
}

#[test]
fn crlf_input_lexes() {
    assert_eq!(texts("int a;\r\nint b;\r\n"), ["int", "a", ";", "int", "b", ";"]);
}

#[test]
fn line_too_long_is_fatal() {
    let long = format!("int x = {};", "1".repeat(5000));
    let msgs = messages(&long);
    assert!(msgs.iter().any(|m| m.contains("Line too long")));
}

#[test]
fn operators_commit_at_eof() {
    assert_eq!(texts("x +"), ["x", "+"]);
    assert_eq!(texts("x <"), ["x", "<"]);
    assert_eq!(texts("a >"), ["a", ">"]);
}

#[test]
fn adjacent_operators_split_correctly() {
    assert_eq!(texts("a+++b"), ["a", "++", "+", "b"]);
    assert_eq!(texts("a<<<b"), ["a", "<<", "<", "b"]);
}
