//! Predefined macros emitted into the synthetic `<define>` source.
//!
//! The target model is LP64 x86-64 Unix, emulating GCC 4.8.3 the way the
//! reference implementation did.

/// Compiler identity, standard conformance, data model and platform
/// symbols.
pub const CORE_DEFINES: &[(&str, &str)] = &[
    ("__LCC__", "1"),
    ("__VERSION__", "\"cpre 0.1 (GCC 4.8.3 compatible)\""),
    // emulated GCC version
    ("__GNUC__", "4"),
    ("__GNUC_MINOR__", "8"),
    ("__GNUC_PATCHLEVEL__", "3"),
    // standard conformance
    ("__STDC__", "1"),
    ("__STDC_HOSTED__", "1"),
    ("__STDC_VERSION__", "199901L"),
    // data model
    ("_LP64", "1"),
    ("__LP64__", "1"),
    // platform
    ("__unix__", "1"),
    ("__amd64__", "1"),
    ("__x86_64__", "1"),
    // assembler conventions (GAS syntax)
    ("__REGISTER_PREFIX__", "%"),
    ("__USER_LABEL_PREFIX__", "_"),
];

/// Type sizes for the LP64 model.
pub const SIZE_DEFINES: &[(&str, &str)] = &[
    ("__CHAR_BIT__", "8"),
    ("__SIZEOF_SHORT__", "2"),
    ("__SIZEOF_INT__", "4"),
    ("__SIZEOF_LONG__", "8"),
    ("__SIZEOF_LONG_LONG__", "8"),
    ("__SIZEOF_POINTER__", "8"),
    ("__SIZEOF_FLOAT__", "4"),
    ("__SIZEOF_DOUBLE__", "8"),
    ("__SIZEOF_LONG_DOUBLE__", "16"),
    ("__SIZEOF_SIZE_T__", "8"),
    ("__SIZEOF_PTRDIFF_T__", "8"),
    ("__SIZEOF_WCHAR_T__", "4"),
    ("__SIZEOF_WINT_T__", "4"),
];

/// Standard typedef spellings.
pub const TYPE_DEFINES: &[(&str, &str)] = &[
    ("__SIZE_TYPE__", "long unsigned int"),
    ("__PTRDIFF_TYPE__", "long int"),
    ("__WCHAR_TYPE__", "int"),
    ("__WINT_TYPE__", "unsigned int"),
    ("__INTMAX_TYPE__", "long int"),
    ("__UINTMAX_TYPE__", "long unsigned int"),
    ("__CHAR16_TYPE__", "short unsigned int"),
    ("__CHAR32_TYPE__", "unsigned int"),
];

/// Integer limits for the LP64 model.
pub const LIMIT_DEFINES: &[(&str, &str)] = &[
    ("__SCHAR_MAX__", "127"),
    ("__SHRT_MAX__", "32767"),
    ("__INT_MAX__", "2147483647"),
    ("__LONG_MAX__", "9223372036854775807L"),
    ("__LONG_LONG_MAX__", "9223372036854775807LL"),
    ("__WCHAR_MAX__", "2147483647"),
    ("__WINT_MAX__", "4294967295U"),
    ("__SIZE_MAX__", "18446744073709551615UL"),
    ("__PTRDIFF_MAX__", "9223372036854775807L"),
    ("__INTMAX_MAX__", "9223372036854775807L"),
    ("__UINTMAX_MAX__", "18446744073709551615UL"),
];

/// Byte-order symbols (the target is little-endian).
pub const ENDIAN_DEFINES: &[(&str, &str)] = &[
    ("__ORDER_LITTLE_ENDIAN__", "1234"),
    ("__ORDER_BIG_ENDIAN__", "4321"),
    ("__ORDER_PDP_ENDIAN__", "3412"),
    ("__BYTE_ORDER__", "__ORDER_LITTLE_ENDIAN__"),
    ("__FLOAT_WORD_ORDER__", "__ORDER_LITTLE_ENDIAN__"),
];

/// Every predefined macro, in emission order.
pub fn all_defines() -> impl Iterator<Item = (&'static str, &'static str)> {
    CORE_DEFINES
        .iter()
        .chain(SIZE_DEFINES)
        .chain(TYPE_DEFINES)
        .chain(LIMIT_DEFINES)
        .chain(ENDIAN_DEFINES)
        .copied()
}
