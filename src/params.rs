//! Execution parameter facade.
//!
//! [`ExecutionParams`] takes one execution's declared parameters (a flat
//! name/value map, input and output name lists, command tokens, optional
//! pairing overrides) and turns them into fully resolved views: reference-
//! free values, role-classified artifacts, a substituted command, and the
//! input/output pairing used for data lineage.
//!
//! Construction is fail-fast: the whole pipeline runs up front and any
//! validation failure means no object is returned. Mutators revalidate on a
//! scratch copy and commit only on success, so a failed update leaves the
//! previously valid state untouched.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::job_param::{DownloadableJobParam, JobParam, ResolvedJobParam, UploadableJobParam};
use crate::name;
use crate::pairing::{
    self, JobParamPair, JobParamSetPair, Pair, ParamPair, ParamSetPair, ResolvedParamSetPair,
    SetPair,
};
use crate::reference::ReferenceToken;
use crate::remote::RemoteUri;
use crate::resolvable::{Downloadable, Uploadable};
use crate::resolver;

/// An explicit pairing override, accepted either as a single pair
/// (`{"input": ..., "output": ...}`) or as a set pair
/// (`{"inputs": [...], "outputs": [...]}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PairOverride {
    Set(ParamSetPair),
    Single(ParamPair),
}

impl PairOverride {
    pub fn to_set_pair(&self) -> ParamSetPair {
        match self {
            Self::Set(set_pair) => set_pair.clone(),
            Self::Single(pair) => SetPair::new(
                pair.input.iter().cloned(),
                pair.output.iter().cloned(),
            ),
        }
    }
}

impl From<ParamPair> for PairOverride {
    fn from(pair: ParamPair) -> Self {
        Self::Single(pair)
    }
}

impl From<ParamSetPair> for PairOverride {
    fn from(set_pair: ParamSetPair) -> Self {
        Self::Set(set_pair)
    }
}

// Untagged derive cannot tell the two shapes apart (both are structs with
// defaulted fields), so deserialization inspects the keys.
impl<'de> Deserialize<'de> for PairOverride {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;
        let value = Value::deserialize(deserializer)?;
        let object = value
            .as_object()
            .ok_or_else(|| D::Error::custom("pair override must be an object"))?;
        if object.contains_key("inputs") || object.contains_key("outputs") {
            serde_json::from_value(value)
                .map(Self::Set)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Self::Single)
                .map_err(D::Error::custom)
        }
    }
}

/// The raw declaration for one execution. This is the serialized shape;
/// [`ExecutionParams`] is its validated, resolved counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionParamsDecl {
    pub command: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub params: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<RemoteUri>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pair_overrides: Vec<PairOverride>,
}

/// Fully resolved state derived from a declaration.
#[derive(Debug, Clone)]
struct Resolved {
    /// Declaration-order, role-aware resolved parameters.
    job_params: Vec<ResolvedJobParam>,
    /// Canonical name -> (declared name, resolved value).
    values: HashMap<String, (String, String)>,
    command: Vec<String>,
    inputs: Vec<DownloadableJobParam>,
    outputs: Vec<UploadableJobParam>,
    param_set_pairs: Vec<ParamSetPair>,
    param_pairs: Vec<ParamPair>,
    job_param_set_pairs: Vec<JobParamSetPair>,
    job_param_pairs: Vec<JobParamPair>,
    resolved_param_set_pairs: Vec<ResolvedParamSetPair>,
}

/// A validated, resolved execution parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ExecutionParamsDecl", into = "ExecutionParamsDecl")]
pub struct ExecutionParams {
    decl: ExecutionParamsDecl,
    resolved: Resolved,
}

impl TryFrom<ExecutionParamsDecl> for ExecutionParams {
    type Error = Error;

    fn try_from(decl: ExecutionParamsDecl) -> Result<Self> {
        Self::new(decl)
    }
}

impl From<ExecutionParams> for ExecutionParamsDecl {
    fn from(params: ExecutionParams) -> Self {
        params.decl
    }
}

impl PartialEq for ExecutionParams {
    fn eq(&self, other: &Self) -> bool {
        self.decl == other.decl
    }
}

impl ExecutionParams {
    /// Validate and resolve a declaration. Fails fast on any validation
    /// error; no partial object is returned.
    pub fn new(decl: ExecutionParamsDecl) -> Result<Self> {
        let resolved = resolve(&decl)?;
        Ok(Self { decl, resolved })
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let decl: ExecutionParamsDecl = serde_json::from_value(value)?;
        Self::new(decl)
    }

    // ---- declaration views ----

    pub fn decl(&self) -> &ExecutionParamsDecl {
        &self.decl
    }

    pub fn command(&self) -> &[String] {
        &self.decl.command
    }

    pub fn inputs(&self) -> &[String] {
        &self.decl.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.decl.outputs
    }

    pub fn output_prefix(&self) -> Option<&RemoteUri> {
        self.decl.output_prefix.as_ref()
    }

    // ---- resolved views ----

    /// Command tokens with every placeholder substituted.
    pub fn resolved_command(&self) -> &[String] {
        &self.resolved.command
    }

    /// All parameters in declaration order, role-aware.
    pub fn job_params(&self) -> &[ResolvedJobParam] {
        &self.resolved.job_params
    }

    /// Input parameters in declared-input order.
    pub fn downloadable_inputs(&self) -> &[DownloadableJobParam] {
        &self.resolved.inputs
    }

    /// Output parameters in declared-output order.
    pub fn uploadable_outputs(&self) -> &[UploadableJobParam] {
        &self.resolved.outputs
    }

    pub fn param_set_pairs(&self) -> &[ParamSetPair] {
        &self.resolved.param_set_pairs
    }

    pub fn param_pairs(&self) -> &[ParamPair] {
        &self.resolved.param_pairs
    }

    pub fn job_param_set_pairs(&self) -> &[JobParamSetPair] {
        &self.resolved.job_param_set_pairs
    }

    pub fn job_param_pairs(&self) -> &[JobParamPair] {
        &self.resolved.job_param_pairs
    }

    /// Lineage view over remote identifiers only.
    pub fn resolved_param_set_pairs(&self) -> &[ResolvedParamSetPair] {
        &self.resolved.resolved_param_set_pairs
    }

    // ---- lookups (accept bare names or `${NAME}` references) ----

    pub fn get_param(&self, key: &str) -> Option<&str> {
        let canonical = name::canonical(ReferenceToken::unwrap_key(key));
        self.resolved
            .values
            .get(&canonical)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_param(&self, key: &str) -> bool {
        let canonical = name::canonical(ReferenceToken::unwrap_key(key));
        self.resolved.values.contains_key(&canonical)
    }

    /// Resolved name/value parameter under its originally declared name.
    pub fn get_job_param(&self, key: &str) -> Option<JobParam> {
        let canonical = name::canonical(ReferenceToken::unwrap_key(key));
        self.resolved
            .values
            .get(&canonical)
            .map(|(declared, value)| JobParam::new(declared.clone(), value.clone()))
    }

    pub fn get_input_job_param(&self, key: &str) -> Option<&DownloadableJobParam> {
        let key = ReferenceToken::unwrap_key(key);
        self.resolved
            .inputs
            .iter()
            .find(|p| name::equivalent(&p.name, key))
    }

    pub fn get_output_job_param(&self, key: &str) -> Option<&UploadableJobParam> {
        let key = ReferenceToken::unwrap_key(key);
        self.resolved
            .outputs
            .iter()
            .find(|p| name::equivalent(&p.name, key))
    }

    /// Render every resolved parameter as an `ENVNAME=value` entry.
    pub fn export_environment(
        &self,
        env: &mut HashMap<String, String>,
        overwrite: bool,
    ) -> Result<()> {
        for param in &self.resolved.job_params {
            param.update_environment(env, overwrite)?;
        }
        Ok(())
    }

    // ---- mutators (validate on a scratch copy, commit on success) ----

    /// Mark already-declared parameters as inputs. Idempotent for names
    /// already marked; new names are appended in call order.
    pub fn add_inputs<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut decl = self.decl.clone();
        for name in names {
            push_unique(&mut decl.inputs, name.into());
        }
        self.apply(decl)
    }

    /// Declare (or redeclare) parameters and mark them as inputs in one
    /// step. Existing parameters keep their declaration position; their
    /// value is replaced.
    pub fn add_input_params<I, S>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut decl = self.decl.clone();
        for (name, value) in params {
            let name = name.into();
            upsert_param(&mut decl.params, &name, value);
            push_unique(&mut decl.inputs, name);
        }
        self.apply(decl)
    }

    pub fn remove_inputs<'a, I>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut decl = self.decl.clone();
        for name in names {
            decl.inputs.retain(|i| !name::equivalent(i, name));
        }
        self.apply(decl)
    }

    /// Mark already-declared parameters as outputs. Idempotent for names
    /// already marked; new names are appended in call order.
    pub fn add_outputs<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut decl = self.decl.clone();
        for name in names {
            push_unique(&mut decl.outputs, name.into());
        }
        self.apply(decl)
    }

    /// Declare (or redeclare) parameters and mark them as outputs in one
    /// step.
    pub fn add_output_params<I, S>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut decl = self.decl.clone();
        for (name, value) in params {
            let name = name.into();
            upsert_param(&mut decl.params, &name, value);
            push_unique(&mut decl.outputs, name);
        }
        self.apply(decl)
    }

    pub fn remove_outputs<'a, I>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut decl = self.decl.clone();
        for name in names {
            decl.outputs.retain(|o| !name::equivalent(o, name));
        }
        self.apply(decl)
    }

    fn apply(&mut self, decl: ExecutionParamsDecl) -> Result<()> {
        let resolved = resolve(&decl)?;
        self.decl = decl;
        self.resolved = resolved;
        Ok(())
    }
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.iter().any(|n| name::equivalent(n, &name)) {
        names.push(name);
    }
}

fn upsert_param(params: &mut IndexMap<String, Value>, param_name: &str, value: Value) {
    // IndexMap keeps the original position on key replacement, which is
    // exactly the declaration-order rule for redeclared parameters.
    if let Some(existing) = params
        .keys()
        .find(|k| name::equivalent(k, param_name))
        .cloned()
    {
        params.insert(existing, value);
    } else {
        params.insert(param_name.to_string(), value);
    }
}

/// Scalar rendering of a raw parameter value for reference resolution.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Role of a declared parameter, decided by the input/output name lists.
#[derive(Clone, Copy, PartialEq)]
enum Role {
    Input,
    Output,
    Plain,
}

/// Run the whole validation/resolution pipeline over a declaration.
fn resolve(decl: &ExecutionParamsDecl) -> Result<Resolved> {
    debug!(
        params = decl.params.len(),
        inputs = decl.inputs.len(),
        outputs = decl.outputs.len(),
        "resolving execution parameters"
    );

    // Declared-name index; collisions among declared params are rejected
    // again by the resolver, but role assignment needs the index first.
    let mut canonical_names: HashMap<String, String> = HashMap::new();
    for declared in decl.params.keys() {
        if let Some(prev) =
            canonical_names.insert(name::canonical(declared), declared.clone())
        {
            return Err(Error::Collision(format!(
                "parameter names '{prev}' and '{declared}' are equivalent"
            )));
        }
    }

    // Inputs and outputs must name declared params and must not overlap.
    let mut roles: HashMap<String, Role> = HashMap::new();
    for input in &decl.inputs {
        let key = name::canonical(input);
        if !canonical_names.contains_key(&key) {
            return Err(Error::MissingReference(format!(
                "input '{input}' is not a declared parameter"
            )));
        }
        roles.insert(key, Role::Input);
    }
    for output in &decl.outputs {
        let key = name::canonical(output);
        if !canonical_names.contains_key(&key) {
            return Err(Error::MissingReference(format!(
                "output '{output}' is not a declared parameter"
            )));
        }
        if roles.get(&key) == Some(&Role::Input) {
            return Err(Error::Collision(format!(
                "'{output}' is declared as both an input and an output"
            )));
        }
        roles.insert(key, Role::Output);
    }
    if !decl.outputs.is_empty() && decl.output_prefix.is_none() {
        return Err(Error::InvalidValue(
            "outputs are declared but no output prefix is configured".to_string(),
        ));
    }

    // Classify inputs up front; their locals are what `${ref}`s see.
    // Pre-parse outputs far enough to know their local and any embedded
    // remote override, leaving plain strings to the resolver.
    let mut downloadables: HashMap<String, Downloadable> = HashMap::new();
    let mut output_remote_overrides: HashMap<String, RemoteUri> = HashMap::new();
    let mut resolver_params: Vec<JobParam> = Vec::with_capacity(decl.params.len());

    for (declared, value) in &decl.params {
        let key = name::canonical(declared);
        let role = roles.get(&key).copied().unwrap_or(Role::Plain);
        let resolution_value = match role {
            Role::Input => {
                // A mapping without a local still gets the deterministic
                // generated name for the input role.
                let default_local = match value {
                    Value::Object(map) => match map.get("remote") {
                        Some(Value::String(remote)) => {
                            Some(crate::resolvable::generated_local(remote))
                        }
                        _ => None,
                    },
                    _ => None,
                };
                let downloadable = Downloadable::from_value(value, default_local.as_deref())
                    .map_err(|err| {
                        Error::InvalidValue(format!("input '{declared}': {err}"))
                    })?;
                let local = downloadable.local.clone();
                downloadables.insert(key.clone(), downloadable);
                local
            }
            Role::Output => {
                let uploadable = pre_parse_output(declared, value)?;
                if let Some(remote) = uploadable.remote {
                    output_remote_overrides.insert(key.clone(), remote);
                }
                uploadable.local
            }
            Role::Plain => value_to_string(value),
        };
        resolver_params.push(JobParam::new(declared.clone(), resolution_value));
    }

    let resolved_params = resolver::resolve_references(&resolver_params)?;
    let values: HashMap<String, (String, String)> = resolved_params
        .iter()
        .map(|p| (name::canonical(&p.name), (p.name.clone(), p.value.clone())))
        .collect();
    let replacements: HashMap<String, String> = resolved_params
        .iter()
        .map(|p| (p.envname(), p.value.clone()))
        .collect();

    // Build role-aware views in declaration order.
    let mut job_params = Vec::with_capacity(resolved_params.len());
    let mut inputs_by_key: HashMap<String, DownloadableJobParam> = HashMap::new();
    let mut outputs_by_key: HashMap<String, UploadableJobParam> = HashMap::new();
    for param in &resolved_params {
        let key = name::canonical(&param.name);
        let role = roles.get(&key).copied().unwrap_or(Role::Plain);
        let resolved_param = match role {
            Role::Input => {
                let downloadable = &downloadables[&key];
                let job_param = DownloadableJobParam::new(
                    param.name.clone(),
                    param.value.clone(),
                    downloadable.remote.clone(),
                );
                inputs_by_key.insert(key, job_param.clone());
                ResolvedJobParam::Downloadable(job_param)
            }
            Role::Output => {
                let remote = match output_remote_overrides.get(&key) {
                    Some(remote) => remote.clone(),
                    None => Uploadable::new(param.value.clone(), None)
                        .resolve_remote(decl.output_prefix.as_ref())?,
                };
                let job_param =
                    UploadableJobParam::new(param.name.clone(), param.value.clone(), remote);
                outputs_by_key.insert(key, job_param.clone());
                ResolvedJobParam::Uploadable(job_param)
            }
            Role::Plain => ResolvedJobParam::Plain(param.clone()),
        };
        job_params.push(resolved_param);
    }

    // Declared input/output order, not declaration order.
    let input_job_params: Vec<DownloadableJobParam> = decl
        .inputs
        .iter()
        .map(|i| inputs_by_key[&name::canonical(i)].clone())
        .collect();
    let output_job_params: Vec<UploadableJobParam> = decl
        .outputs
        .iter()
        .map(|o| outputs_by_key[&name::canonical(o)].clone())
        .collect();

    // Substitute command tokens with the resolved replacement map.
    let command = decl
        .command
        .iter()
        .map(|token| ReferenceToken::replace_references(token, &replacements))
        .collect::<Result<Vec<String>>>()?;

    // Pairing, by declared param-name spelling.
    let input_names: Vec<String> = input_job_params.iter().map(|p| p.name.clone()).collect();
    let output_names: Vec<String> = output_job_params.iter().map(|p| p.name.clone()).collect();
    let overrides: Vec<ParamSetPair> = decl
        .pair_overrides
        .iter()
        .map(PairOverride::to_set_pair)
        .collect();
    let param_set_pairs = pairing::build_set_pairs(&input_names, &output_names, &overrides)?;
    let param_pairs = Pair::from_set_pairs(&param_set_pairs);

    let job_param_set_pairs: Vec<JobParamSetPair> = param_set_pairs
        .iter()
        .map(|sp| {
            SetPair::new(
                sp.inputs
                    .iter()
                    .map(|i| inputs_by_key[&name::canonical(i)].clone()),
                sp.outputs
                    .iter()
                    .map(|o| outputs_by_key[&name::canonical(o)].clone()),
            )
        })
        .collect();
    let job_param_pairs: Vec<JobParamPair> = param_pairs
        .iter()
        .map(|p| {
            Pair::new(
                p.input
                    .as_ref()
                    .map(|i| inputs_by_key[&name::canonical(i)].clone()),
                p.output
                    .as_ref()
                    .map(|o| outputs_by_key[&name::canonical(o)].clone()),
            )
        })
        .collect();
    let resolved_param_set_pairs: Vec<ResolvedParamSetPair> = job_param_set_pairs
        .iter()
        .map(|sp| {
            SetPair::new(
                sp.inputs.iter().map(|i| i.remote.clone()),
                sp.outputs.iter().map(|o| o.remote.clone()),
            )
        })
        .collect();

    Ok(Resolved {
        job_params,
        values,
        command,
        inputs: input_job_params,
        outputs: output_job_params,
        param_set_pairs,
        param_pairs,
        job_param_set_pairs,
        job_param_pairs,
        resolved_param_set_pairs,
    })
}

/// Parse an output value far enough for resolution: its local side (which
/// may still hold `${ref}`s) and any embedded remote override.
fn pre_parse_output(declared: &str, value: &Value) -> Result<Uploadable> {
    match value {
        // Plain strings go to the resolver untouched unless they use the
        // two-sided grammar.
        Value::String(s) if !s.contains(" @ ") => Ok(Uploadable::new(s.clone(), None)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {
            Ok(Uploadable::new(value_to_string(value), None))
        }
        _ => Uploadable::from_value(value, None)
            .map_err(|err| Error::InvalidValue(format!("output '{declared}': {err}"))),
    }
}
