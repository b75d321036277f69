//! Macro symbols: user definitions and builtin extensions.

use crate::chain::TokenChain;

/// Builtin extension macros. These are first-class symbols whose expansion
/// is computed by the engine instead of substituted from a body; they carry
/// neither body nor parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    /// `__FILE__`: current display name as a string literal.
    File,
    /// `__LINE__`: current reported row as an integer.
    Line,
    /// `__DATE__`: `"Mmm dd yyyy"`.
    Date,
    /// `__TIME__`: `"hh:mm:ss"`.
    Time,
    /// `__TIMESTAMP__`: mtime of the current file.
    Timestamp,
    /// `__BASE_FILE__`: display name at the bottom of the file stack.
    BaseFile,
    /// `__INCLUDE_LEVEL__`: depth of the file stack minus one.
    IncludeLevel,
    /// `__func__` / `__FUNCTION__`: left for the parser to resolve.
    Identity,
    /// `defined(X)` / `defined X`: only live inside `#if` / `#elif`.
    Defined,
    /// `__has_include(...)`.
    HasInclude,
    /// `__has_include_next(...)`.
    HasIncludeNext,
    /// `__has_builtin(X)`.
    HasBuiltin,
    /// `__has_feature(X)`.
    HasFeature,
    /// `__has_extension(X)`.
    HasExtension,
}

/// A named macro definition.
///
/// Invariants: `function_like` and object-like are mutually exclusive (a
/// symbol is object-like iff `function_like` is false); `named_variadic`
/// implies `variadic`; builtin symbols have an empty body and no params.
#[derive(Debug)]
pub struct MacroSymbol {
    /// Macro name.
    pub name: String,
    /// Expansion requires a parenthesised argument list.
    pub function_like: bool,
    /// Last formal accepts zero or more arguments.
    pub variadic: bool,
    /// GCC-style `name...` variadic: the variadic tokens are addressed by
    /// `name` instead of `__VA_ARGS__`.
    pub named_variadic: bool,
    /// Builtin, or defined by a system source: redefinition by the user
    /// warns, redefinition by the system is silent.
    pub system: bool,
    /// Rescanning guard: set while this symbol's expansion is being
    /// rescanned, to mark self-references inert.
    pub in_use: bool,
    /// Ordered formal parameter names.
    pub params: Vec<String>,
    /// Display name of the variadic tail (defaults to `__VA_ARGS__`).
    pub va_name: String,
    /// Replacement token chain.
    pub body: TokenChain,
    /// Present for builtin extension macros.
    pub builtin: Option<Builtin>,
}

impl MacroSymbol {
    /// A builtin object-like extension.
    pub fn builtin_object(name: &str, builtin: Builtin) -> Self {
        Self {
            name: name.to_string(),
            function_like: false,
            variadic: false,
            named_variadic: false,
            system: true,
            in_use: false,
            params: Vec::new(),
            va_name: String::new(),
            body: TokenChain::new(),
            builtin: Some(builtin),
        }
    }

    /// A builtin function-like extension.
    pub fn builtin_function(name: &str, builtin: Builtin) -> Self {
        Self {
            function_like: true,
            ..Self::builtin_object(name, builtin)
        }
    }

    /// True when both definitions expand to the same token sequence.
    /// Source spelling is ignored, per the redefinition rule.
    pub fn body_equals(&self, other: &MacroSymbol) -> bool {
        let mut a = self.body.iter();
        let mut b = other.body.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if x.same_value(y) => continue,
                _ => return false,
            }
        }
    }
}
