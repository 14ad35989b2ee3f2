//! `${name}` placeholder tokens.
//!
//! A [`ReferenceToken`] wraps one literal `${inner}` occurrence inside a
//! parameter value or command token. Extraction and substitution both walk
//! the string with the same braced-variable pattern; replacement keys are
//! environment-variable names (`UPPER_SNAKE`), so `${param-b}` and
//! `${PARAM_B}` substitute through the same key.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::name;

static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex pattern"));

/// One literal `${inner}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceToken(String);

impl ReferenceToken {
    /// Wrap an already-formed `${...}` token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Build the canonical reference for a parameter name: `${UPPER_SNAKE}`.
    pub fn from_name(param_name: &str) -> Self {
        Self(format!("${{{}}}", name::envname(param_name)))
    }

    /// The text between the braces.
    pub fn inner(&self) -> &str {
        &self.0[2..self.0.len() - 1]
    }

    /// The full `${...}` literal.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Environment-variable key this token substitutes through.
    pub fn envname(&self) -> String {
        name::envname(self.inner())
    }

    /// All `${...}` tokens in `value`, in order of occurrence.
    pub fn find_all(value: &str) -> Vec<ReferenceToken> {
        REFERENCE_PATTERN
            .find_iter(value)
            .map(|m| ReferenceToken(m.as_str().to_string()))
            .collect()
    }

    /// Substitute every `${...}` token in `value` using `replacements`,
    /// whose keys must be environment-variable names.
    ///
    /// A token whose env-name key is absent is a
    /// [`Error::MissingReference`].
    pub fn replace_references(
        value: &str,
        replacements: &HashMap<String, String>,
    ) -> Result<String> {
        let mut result = String::new();
        let mut last_end = 0;

        for cap in REFERENCE_PATTERN.captures_iter(value) {
            let full_match = cap.get(0).expect("capture 0 always present");
            let inner = cap.get(1).expect("capture 1 always present").as_str();

            result.push_str(&value[last_end..full_match.start()]);

            let key = name::envname(inner);
            let replacement = replacements.get(&key).ok_or_else(|| {
                Error::MissingReference(format!(
                    "no replacement for '${{{inner}}}' (key '{key}') in '{value}'"
                ))
            })?;
            result.push_str(replacement);

            last_end = full_match.end();
        }

        result.push_str(&value[last_end..]);
        Ok(result)
    }

    /// Strip a `${...}` wrapper if `key` is exactly one token, otherwise
    /// return `key` unchanged. Lets lookups accept either form.
    pub fn unwrap_key(key: &str) -> &str {
        if key.starts_with("${") && key.ends_with('}') && key.len() > 3 {
            let inner = &key[2..key.len() - 1];
            if !inner.contains('}') {
                return inner;
            }
        }
        key
    }
}

impl std::fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
