//! Resolved job parameter model.
//!
//! A [`JobParam`] is a name/value pair whose value holds no unresolved
//! placeholders. Input parameters resolve to a [`DownloadableJobParam`]
//! (remote is authoritative, value is the local materialization target) and
//! output parameters to an [`UploadableJobParam`] (value is the local
//! artifact, remote is the durable destination).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::name;
use crate::reference::ReferenceToken;
use crate::remote::RemoteUri;

/// A fully resolved name/value parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobParam {
    pub name: String,
    pub value: String,
}

impl JobParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Environment-variable name for this parameter (`UPPER_SNAKE`).
    pub fn envname(&self) -> String {
        name::envname(&self.name)
    }

    /// `${UPPER_SNAKE}` reference to this parameter.
    pub fn envname_reference(&self) -> String {
        ReferenceToken::from_name(&self.name).as_str().to_string()
    }

    /// All `${...}` tokens still present in the value.
    pub fn find_references(&self) -> Vec<ReferenceToken> {
        ReferenceToken::find_all(&self.value)
    }

    /// Write `ENVNAME=value` into `env`. Refuses to clobber an existing
    /// entry unless `overwrite` is set.
    pub fn update_environment(
        &self,
        env: &mut HashMap<String, String>,
        overwrite: bool,
    ) -> Result<()> {
        let key = self.envname();
        if !overwrite && env.contains_key(&key) {
            return Err(Error::InvalidValue(format!(
                "environment variable '{key}' is already set and overwrite is disabled"
            )));
        }
        env.insert(key, self.value.clone());
        Ok(())
    }
}

/// An input parameter: remote artifact to materialize at a local path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DownloadableJobParam {
    pub name: String,
    /// Local materialization target.
    pub value: String,
    /// Authoritative remote source.
    pub remote: RemoteUri,
}

impl DownloadableJobParam {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        remote: impl Into<RemoteUri>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            remote: remote.into(),
        }
    }

    pub fn as_job_param(&self) -> JobParam {
        JobParam::new(self.name.clone(), self.value.clone())
    }
}

/// An output parameter: local artifact bound for a remote destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UploadableJobParam {
    pub name: String,
    /// Authoritative local artifact.
    pub value: String,
    /// Remote destination.
    pub remote: RemoteUri,
}

impl UploadableJobParam {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        remote: impl Into<RemoteUri>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            remote: remote.into(),
        }
    }

    pub fn as_job_param(&self) -> JobParam {
        JobParam::new(self.name.clone(), self.value.clone())
    }
}

/// A resolved parameter with its role attached, for ordered mixed views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResolvedJobParam {
    Downloadable(DownloadableJobParam),
    Uploadable(UploadableJobParam),
    Plain(JobParam),
}

impl ResolvedJobParam {
    pub fn name(&self) -> &str {
        match self {
            Self::Downloadable(p) => &p.name,
            Self::Uploadable(p) => &p.name,
            Self::Plain(p) => &p.name,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Downloadable(p) => &p.value,
            Self::Uploadable(p) => &p.value,
            Self::Plain(p) => &p.value,
        }
    }

    /// Role-stripped name/value view.
    pub fn as_job_param(&self) -> JobParam {
        match self {
            Self::Downloadable(p) => p.as_job_param(),
            Self::Uploadable(p) => p.as_job_param(),
            Self::Plain(p) => p.clone(),
        }
    }

    pub fn update_environment(
        &self,
        env: &mut HashMap<String, String>,
        overwrite: bool,
    ) -> Result<()> {
        self.as_job_param().update_environment(env, overwrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envname_reference() {
        assert_eq!(
            JobParam::new("param_a", "foo").envname_reference(),
            "${PARAM_A}"
        );
        assert_eq!(
            JobParam::new("param-a", "foo").envname_reference(),
            "${PARAM_A}"
        );
    }

    #[test]
    fn test_find_references() {
        let param = JobParam::new("param_a", "foo_${param_b}");
        assert_eq!(
            param.find_references(),
            vec![ReferenceToken::new("${param_b}")]
        );
        assert!(JobParam::new("param_a", "foo").find_references().is_empty());
    }

    #[test]
    fn test_update_environment_respects_overwrite() {
        let param = JobParam::new("param_a", "foo");
        let mut env = HashMap::from([("PARAM_A".to_string(), "bar".to_string())]);

        assert!(param.update_environment(&mut env, false).is_err());
        assert_eq!(env["PARAM_A"], "bar");

        param.update_environment(&mut env, true).unwrap();
        assert_eq!(env["PARAM_A"], "foo");
    }

    #[test]
    fn test_resolved_param_views() {
        let p = ResolvedJobParam::Downloadable(DownloadableJobParam::new(
            "param_in",
            "tmp558ca153",
            RemoteUri::new("s3://bucket/key"),
        ));
        assert_eq!(p.name(), "param_in");
        assert_eq!(p.value(), "tmp558ca153");
        assert_eq!(p.as_job_param(), JobParam::new("param_in", "tmp558ca153"));
    }
}
