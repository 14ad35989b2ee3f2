//! Artifact value classification.
//!
//! A resolvable value pairs a local path with a remote identifier. Values
//! arrive as a mapping with `local`/`remote` keys, as a two-sided string
//! `"<side> @ <side>"`, or as a bare string holding only the side that is
//! authoritative for the parameter's role. The two roles differ in which
//! side is synthesized when missing:
//!
//! - [`Downloadable`] (inputs): remote is authoritative; a missing local is
//!   generated deterministically from a hash of the remote.
//! - [`Uploadable`] (outputs): local is authoritative; a missing remote is
//!   filled in later from the configured output prefix.
//!
//! Only the literal `" @ "` (space-at-space) token splits a two-sided
//! string; an `@` embedded in a key never does. Sides must be non-empty and
//! whitespace-free; anything else is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::remote::RemoteUri;

const SEPARATOR: &str = " @ ";

/// Deterministic generated local name: `"tmp"` plus the first 8 hex chars
/// of the sha256 digest of the remote value. Stable across calls.
pub fn generated_local(remote: &str) -> String {
    let digest = Sha256::digest(remote.as_bytes());
    let hex: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("tmp{hex}")
}

/// Final path component of a local value.
pub(crate) fn basename(local: &str) -> &str {
    local
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(local)
}

/// Split on the single literal `" @ "` separator.
///
/// At most two sides; each side must be non-empty and contain no
/// whitespace.
fn split_sides(value: &str) -> Result<(String, Option<String>)> {
    let parts: Vec<&str> = value.split(SEPARATOR).collect();
    if parts.len() > 2 {
        return Err(Error::InvalidValue(format!(
            "more than one '{SEPARATOR}' separator in '{value}'"
        )));
    }
    for part in &parts {
        if part.is_empty() || part.chars().any(char::is_whitespace) {
            return Err(Error::InvalidValue(format!(
                "invalid resolvable side '{part}' in '{value}'"
            )));
        }
    }
    Ok((parts[0].to_string(), parts.get(1).map(|p| p.to_string())))
}

fn mapping_field<'a>(map: &'a serde_json::Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::InvalidValue(format!(
            "resolvable field '{key}' must be a string, got {other}"
        ))),
    }
}

/// An input-role resolvable: remote source, local materialization target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downloadable {
    pub local: String,
    pub remote: RemoteUri,
}

impl Downloadable {
    pub fn new(local: impl Into<String>, remote: impl Into<RemoteUri>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// Parse from the string grammar. With two sides, the side shaped like
    /// a remote identifier is the remote (falling back to the declared
    /// `"<remote> @ <local>"` order); a bare string is the remote, and the
    /// local is generated from its hash unless a default is supplied.
    pub fn from_str_value(value: &str, default_local: Option<&str>) -> Result<Self> {
        let (first, second) = split_sides(value)?;
        match second {
            Some(second) => {
                let (remote, local) = if RemoteUri::looks_remote(&first) {
                    (first, second)
                } else if RemoteUri::looks_remote(&second) {
                    (second, first)
                } else {
                    (first, second)
                };
                Ok(Self::new(local, remote))
            }
            None => {
                let local = default_local
                    .map(str::to_owned)
                    .unwrap_or_else(|| generated_local(&first));
                Ok(Self::new(local, first))
            }
        }
    }

    /// Parse from a string or mapping JSON value. A mapping must carry a
    /// `remote`; a missing `local` is an error unless a default is given.
    pub fn from_value(value: &Value, default_local: Option<&str>) -> Result<Self> {
        match value {
            Value::String(s) => Self::from_str_value(s, default_local),
            Value::Object(map) => {
                let remote = mapping_field(map, "remote")?.ok_or_else(|| {
                    Error::InvalidValue(format!("remote is missing for {value}"))
                })?;
                let local = mapping_field(map, "local")?
                    .or(default_local)
                    .ok_or_else(|| {
                        Error::InvalidValue(format!(
                            "local is missing for {value} and no default provided"
                        ))
                    })?;
                Ok(Self::new(local, remote))
            }
            Value::Array(_) => Err(Error::InvalidValue(
                "a list is not a valid resolvable value".to_string(),
            )),
            other => Err(Error::InvalidValue(format!(
                "unsupported resolvable value: {other}"
            ))),
        }
    }

    /// `"<remote> @ <local>"`.
    pub fn to_str_value(&self) -> String {
        format!("{}{}{}", self.remote, SEPARATOR, self.local)
    }
}

/// An output-role resolvable: local source, optional explicit remote
/// destination. A missing remote is resolved against an output prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploadable {
    pub local: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteUri>,
}

impl Uploadable {
    pub fn new(local: impl Into<String>, remote: Option<RemoteUri>) -> Self {
        Self {
            local: local.into(),
            remote,
        }
    }

    /// Parse from the string grammar. With two sides, the remote-shaped
    /// side is the destination (falling back to the declared
    /// `"<local> @ <remote>"` order); a bare string is the local.
    pub fn from_str_value(value: &str) -> Result<Self> {
        let (first, second) = split_sides(value)?;
        match second {
            Some(second) => {
                let (local, remote) = if RemoteUri::looks_remote(&second) {
                    (first, second)
                } else if RemoteUri::looks_remote(&first) {
                    (second, first)
                } else {
                    (first, second)
                };
                Ok(Self::new(local, Some(RemoteUri::new(remote))))
            }
            None => Ok(Self::new(first, None)),
        }
    }

    /// Parse from a string or mapping JSON value. A mapping's `local` is
    /// required unless a default is given; `remote` is optional.
    pub fn from_value(value: &Value, default_local: Option<&str>) -> Result<Self> {
        match value {
            Value::String(s) => Self::from_str_value(s),
            Value::Object(map) => {
                let remote = mapping_field(map, "remote")?.map(RemoteUri::new);
                let local = mapping_field(map, "local")?
                    .or(default_local)
                    .ok_or_else(|| {
                        Error::InvalidValue(format!(
                            "local is missing for {value} and no default provided"
                        ))
                    })?;
                Ok(Self::new(local, remote))
            }
            Value::Array(_) => Err(Error::InvalidValue(
                "a list is not a valid resolvable value".to_string(),
            )),
            other => Err(Error::InvalidValue(format!(
                "unsupported resolvable value: {other}"
            ))),
        }
    }

    /// Final destination: the embedded remote if present, otherwise
    /// `prefix / basename(local)`.
    pub fn resolve_remote(&self, prefix: Option<&RemoteUri>) -> Result<RemoteUri> {
        match &self.remote {
            Some(remote) => Ok(remote.clone()),
            None => {
                let prefix = prefix.ok_or_else(|| {
                    Error::InvalidValue(format!(
                        "no output prefix configured for local '{}'",
                        self.local
                    ))
                })?;
                Ok(prefix.join(basename(&self.local)))
            }
        }
    }

    /// `"<local> @ <remote>"`, or just the local when no remote is set.
    pub fn to_str_value(&self) -> String {
        match &self.remote {
            Some(remote) => format!("{}{}{}", self.local, SEPARATOR, remote),
            None => self.local.clone(),
        }
    }
}
