//! cpre-lex - C preprocessor and tokenizer.
//!
//! The crate turns C source files into a stream of fully-preprocessed
//! tokens: macro expansion, conditional compilation, file inclusion,
//! `#line`, `#pragma` and the usual builtin extension macros all happen
//! behind one pull interface. Syntactic analysis is out of scope; the
//! pipeline ends at tokens.
//!
//! # Example
//!
//! ```
//! use cpre_lex::{Lexer, SourceFile};
//!
//! let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
//! let mut lexer = Lexer::new(SourceFile::from_string("demo.c", source));
//! let tokens: Vec<String> = std::iter::from_fn(|| lexer.next_token())
//!     .map(|t| t.text())
//!     .collect();
//! assert_eq!(
//!     tokens,
//!     ["int", "y", "=", "(", "(", "3", ")", "*", "(", "3", ")", ")", ";"]
//! );
//! ```

pub mod chain;
pub mod file;
pub mod lexer;
pub mod predef;
pub mod symbol;
pub mod token;

pub use chain::{TokenChain, TokenId};
pub use file::{FileError, SourceFile, MAX_LINE_LEN};
pub use lexer::{GnuExt, Lexer};
pub use symbol::{Builtin, MacroSymbol};
pub use token::{Keyword, Literal, LiteralValue, Operator, Token, TokenKind};
