//! Property tests for the character machine.

use proptest::prelude::*;

use cpre_lex::token::keyword_from_ident;
use cpre_lex::{Lexer, LiteralValue, SourceFile, TokenKind};

fn lex_one(source: &str) -> Option<TokenKind> {
    let mut lexer = Lexer::new(SourceFile::from_string("prop.c", source));
    let first = lexer.next_token()?.kind;
    assert!(lexer.next_token().is_none(), "expected a single token");
    Some(first)
}

proptest! {
    #[test]
    fn identifiers_lex_as_one_token(name in "[A-Za-z_][A-Za-z0-9_]{0,15}") {
        prop_assume!(keyword_from_ident(&name).is_none());
        // skip the predefined macro space
        prop_assume!(!name.starts_with("__"));
        prop_assume!(name != "defined" && name != "_LP64");
        let kind = lex_one(&name).expect("identifier token");
        prop_assert_eq!(kind, TokenKind::Ident(name));
    }

    #[test]
    fn decimal_integers_round_trip(value in 1i64..=i64::MAX) {
        let kind = lex_one(&value.to_string()).expect("integer token");
        match kind {
            TokenKind::Literal(lit) => prop_assert_eq!(lit.value, LiteralValue::Int(value)),
            other => prop_assert!(false, "unexpected token {:?}", other),
        }
    }

    #[test]
    fn hex_integers_round_trip(value in 0u32..=u32::MAX) {
        let spelled = format!("{value:#x}");
        let kind = lex_one(&spelled).expect("integer token");
        match kind {
            TokenKind::Literal(lit) => {
                prop_assert_eq!(lit.value, LiteralValue::Int(value as i64));
            }
            other => prop_assert!(false, "unexpected token {:?}", other),
        }
    }

    #[test]
    fn string_literals_preserve_plain_text(body in "[ -!#-\\[\\]-~]{0,24}") {
        // printable ASCII minus '"' and '\\'
        let kind = lex_one(&format!("\"{body}\"")).expect("string token");
        match kind {
            TokenKind::Literal(lit) => {
                prop_assert_eq!(lit.value, LiteralValue::Str(body.into_bytes()));
            }
            other => prop_assert!(false, "unexpected token {:?}", other),
        }
    }
}
