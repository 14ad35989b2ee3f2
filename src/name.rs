//! Parameter name normalization.
//!
//! Names are compared case- and separator-insensitively everywhere a lookup
//! happens: `CapitalizedParam`, `CAPITALIZEDPARAM`, and `capitalized-param`
//! all refer to the same parameter. The environment-variable form keeps
//! underscores and uppercases the rest.

/// Canonical form used for equality: lowercase with `-` and `_` removed.
pub fn canonical(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two declared names refer to the same parameter.
pub fn equivalent(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}

/// Environment-variable form: uppercase with `-` mapped to `_`.
pub fn envname(name: &str) -> String {
    name.chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}
