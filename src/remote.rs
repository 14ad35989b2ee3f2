//! Opaque remote artifact identifier.
//!
//! The engine never parses or validates a scheme; it only needs equality,
//! display, a suffix join, and a cheap "does this look like a remote
//! identifier" test used when splitting two-sided artifact values.

use serde::{Deserialize, Serialize};

/// An opaque remote identifier, e.g. an `s3://` or `gfs://` URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteUri(String);

impl RemoteUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a relative suffix with exactly one `/` between the parts.
    pub fn join(&self, suffix: &str) -> RemoteUri {
        RemoteUri(format!(
            "{}/{}",
            self.0.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        ))
    }

    /// Whether `value` has the shape of a remote identifier: a
    /// `scheme://` prefix with a non-empty remainder and no whitespace.
    pub fn looks_remote(value: &str) -> bool {
        let Some((scheme, rest)) = value.split_once("://") else {
            return false;
        };
        !scheme.is_empty()
            && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
            && !rest.is_empty()
            && !value.chars().any(char::is_whitespace)
    }
}

impl std::fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteUri {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RemoteUri {
    fn from(value: String) -> Self {
        Self(value)
    }
}
