//! Input/output pairing.
//!
//! A [`Pair`] is one declared or derived edge between an input and an
//! output; either side may be absent. A [`SetPair`] is a merged group of
//! edges, the compact many-to-many form consumed by lineage builders. Both
//! are generic over their element types: the same combinatorics serve bare
//! names and resolved job-parameter values.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::job_param::{DownloadableJobParam, UploadableJobParam};
use crate::name;
use crate::remote::RemoteUri;

/// One input/output edge; either side may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair<I, O> {
    #[serde(default)]
    pub input: Option<I>,
    #[serde(default)]
    pub output: Option<O>,
}

pub type ParamPair = Pair<String, String>;
pub type JobParamPair = Pair<DownloadableJobParam, UploadableJobParam>;

/// A merged group of edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPair<I: Ord, O: Ord> {
    #[serde(default)]
    pub inputs: BTreeSet<I>,
    #[serde(default)]
    pub outputs: BTreeSet<O>,
}

pub type ParamSetPair = SetPair<String, String>;
pub type JobParamSetPair = SetPair<DownloadableJobParam, UploadableJobParam>;

/// Lineage view over remote identifiers only.
pub type ResolvedParamSetPair = SetPair<RemoteUri, RemoteUri>;

impl<I, O> Pair<I, O> {
    pub fn new(input: Option<I>, output: Option<O>) -> Self {
        Self { input, output }
    }
}

impl<I: Clone, O: Clone> Pair<I, O> {
    /// Pair every input with every output, input-major.
    ///
    /// If one side is empty, each element of the other side pairs with
    /// `None`; if both are empty, no pairs are produced.
    pub fn from_sets(inputs: &[I], outputs: &[O]) -> Vec<Self> {
        match (inputs.is_empty(), outputs.is_empty()) {
            (true, true) => Vec::new(),
            (false, true) => inputs
                .iter()
                .map(|i| Self::new(Some(i.clone()), None))
                .collect(),
            (true, false) => outputs
                .iter()
                .map(|o| Self::new(None, Some(o.clone())))
                .collect(),
            (false, false) => {
                let mut pairs = Vec::with_capacity(inputs.len() * outputs.len());
                for input in inputs {
                    for output in outputs {
                        pairs.push(Self::new(Some(input.clone()), Some(output.clone())));
                    }
                }
                pairs
            }
        }
    }
}

impl<I: Clone + Ord, O: Clone + Ord> Pair<I, O> {
    /// Expand set pairs back into their full pairwise form.
    pub fn from_set_pairs<'a>(
        set_pairs: impl IntoIterator<Item = &'a SetPair<I, O>>,
    ) -> Vec<Self>
    where
        I: 'a,
        O: 'a,
    {
        set_pairs
            .into_iter()
            .flat_map(|sp| {
                let inputs: Vec<I> = sp.inputs.iter().cloned().collect();
                let outputs: Vec<O> = sp.outputs.iter().cloned().collect();
                Self::from_sets(&inputs, &outputs)
            })
            .collect()
    }
}

impl<I: Ord, O: Ord> SetPair<I, O> {
    pub fn new(
        inputs: impl IntoIterator<Item = I>,
        outputs: impl IntoIterator<Item = O>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn add_inputs(&mut self, inputs: impl IntoIterator<Item = I>) {
        self.inputs.extend(inputs);
    }

    pub fn remove_inputs<'a>(&mut self, inputs: impl IntoIterator<Item = &'a I>)
    where
        I: 'a,
    {
        for input in inputs {
            self.inputs.remove(input);
        }
    }

    pub fn add_outputs(&mut self, outputs: impl IntoIterator<Item = O>) {
        self.outputs.extend(outputs);
    }

    pub fn remove_outputs<'a>(&mut self, outputs: impl IntoIterator<Item = &'a O>)
    where
        O: 'a,
    {
        for output in outputs {
            self.outputs.remove(output);
        }
    }
}

impl<I: Clone + Ord, O: Clone + Ord> SetPair<I, O> {
    /// Merge pairs into set pairs by output identity, in first-occurrence
    /// order. Pairs sharing an output pool their inputs; all output-less
    /// pairs merge into a single outputs-empty group. `None` placeholders
    /// are dropped from the unions.
    pub fn from_pairs(pairs: impl IntoIterator<Item = Pair<I, O>>) -> Vec<Self> {
        let mut groups: Vec<(Option<O>, BTreeSet<I>)> = Vec::new();
        for pair in pairs {
            let idx = match groups.iter().position(|(o, _)| *o == pair.output) {
                Some(idx) => idx,
                None => {
                    groups.push((pair.output, BTreeSet::new()));
                    groups.len() - 1
                }
            };
            if let Some(input) = pair.input {
                groups[idx].1.insert(input);
            }
        }
        groups
            .into_iter()
            .map(|(output, inputs)| Self {
                inputs,
                outputs: output.into_iter().collect(),
            })
            .collect()
    }
}

/// Build the final set pairs for declared inputs/outputs with explicit
/// overrides applied first.
///
/// Overrides consume the names they reference; a name claimed by more than
/// one override is a [`Error::DuplicateReference`] and a name outside the
/// declared sets is a [`Error::MissingReference`]. Remaining inputs and
/// outputs then undergo the default cross-product merge among themselves.
/// Name matching is case- and separator-insensitive; resulting set pairs
/// carry the declared spellings. Set pairs with both sides empty are
/// dropped.
pub fn build_set_pairs(
    inputs: &[String],
    outputs: &[String],
    overrides: &[ParamSetPair],
) -> Result<Vec<ParamSetPair>> {
    let declared_inputs: HashMap<String, &String> = inputs
        .iter()
        .map(|i| (name::canonical(i), i))
        .collect();
    let declared_outputs: HashMap<String, &String> = outputs
        .iter()
        .map(|o| (name::canonical(o), o))
        .collect();

    let mut claimed_inputs: HashSet<String> = HashSet::new();
    let mut claimed_outputs: HashSet<String> = HashSet::new();
    let mut result: Vec<ParamSetPair> = Vec::new();

    for override_pair in overrides {
        let mut normalized = ParamSetPair::new([], []);
        for input in &override_pair.inputs {
            let key = name::canonical(input);
            let declared = *declared_inputs.get(&key).ok_or_else(|| {
                Error::MissingReference(format!("'{input}' is not a declared input"))
            })?;
            if !claimed_inputs.insert(key) {
                return Err(Error::DuplicateReference(format!(
                    "input '{input}' is claimed by more than one override"
                )));
            }
            normalized.inputs.insert(declared.clone());
        }
        for output in &override_pair.outputs {
            let key = name::canonical(output);
            let declared = *declared_outputs.get(&key).ok_or_else(|| {
                Error::MissingReference(format!("'{output}' is not a declared output"))
            })?;
            if !claimed_outputs.insert(key) {
                return Err(Error::DuplicateReference(format!(
                    "output '{output}' is claimed by more than one override"
                )));
            }
            normalized.outputs.insert(declared.clone());
        }
        if !normalized.is_empty() {
            result.push(normalized);
        }
    }

    let remaining_inputs: Vec<String> = inputs
        .iter()
        .filter(|i| !claimed_inputs.contains(&name::canonical(i)))
        .cloned()
        .collect();
    let remaining_outputs: Vec<String> = outputs
        .iter()
        .filter(|o| !claimed_outputs.contains(&name::canonical(o)))
        .cloned()
        .collect();

    let defaults = ParamPair::from_sets(&remaining_inputs, &remaining_outputs);
    result.extend(
        ParamSetPair::from_pairs(defaults)
            .into_iter()
            .filter(|sp| !sp.is_empty()),
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn pair(input: Option<&str>, output: Option<&str>) -> ParamPair {
        Pair::new(input.map(String::from), output.map(String::from))
    }

    fn set_pair(inputs: &[&str], outputs: &[&str]) -> ParamSetPair {
        SetPair::new(
            inputs.iter().map(|s| s.to_string()),
            outputs.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn test_from_sets_empty() {
        assert!(ParamPair::from_sets(&[], &[]).is_empty());
    }

    #[test]
    fn test_from_sets_one_side_pairs_with_none() {
        assert_eq!(
            ParamPair::from_sets(&strings(&["i1", "i2"]), &[]),
            vec![pair(Some("i1"), None), pair(Some("i2"), None)]
        );
        assert_eq!(
            ParamPair::from_sets(&[], &strings(&["o1", "o2"])),
            vec![pair(None, Some("o1")), pair(None, Some("o2"))]
        );
    }

    #[test]
    fn test_from_sets_cross_product_is_input_major() {
        assert_eq!(
            ParamPair::from_sets(&strings(&["i1", "i2"]), &strings(&["o1", "o2"])),
            vec![
                pair(Some("i1"), Some("o1")),
                pair(Some("i1"), Some("o2")),
                pair(Some("i2"), Some("o1")),
                pair(Some("i2"), Some("o2")),
            ]
        );
    }

    #[test]
    fn test_from_pairs_merges_by_output() {
        let pairs = vec![
            pair(Some("i1"), Some("o1")),
            pair(Some("i1"), Some("o2")),
            pair(Some("i2"), Some("o1")),
            pair(Some("i2"), Some("o2")),
        ];
        assert_eq!(
            ParamSetPair::from_pairs(pairs),
            vec![set_pair(&["i1", "i2"], &["o1"]), set_pair(&["i1", "i2"], &["o2"])]
        );
    }

    #[test]
    fn test_from_pairs_handles_absent_sides() {
        let pairs = vec![
            pair(None, Some("o1")),
            pair(None, Some("o2")),
            pair(Some("i2"), Some("o2")),
            pair(Some("i1"), None),
            pair(Some("i2"), None),
        ];
        assert_eq!(
            ParamSetPair::from_pairs(pairs),
            vec![
                set_pair(&[], &["o1"]),
                set_pair(&["i2"], &["o2"]),
                set_pair(&["i1", "i2"], &[]),
            ]
        );
    }

    #[test]
    fn test_from_set_pairs_expands() {
        let set_pairs = vec![set_pair(&["i1"], &["o1"]), set_pair(&["i2"], &["o2"])];
        assert_eq!(
            ParamPair::from_set_pairs(&set_pairs),
            vec![pair(Some("i1"), Some("o1")), pair(Some("i2"), Some("o2"))]
        );
    }

    #[test]
    fn test_cross_product_round_trips_through_merge() {
        let inputs = strings(&["i1", "i2", "i3"]);
        let outputs = strings(&["o1", "o2"]);
        let pairs = ParamPair::from_sets(&inputs, &outputs);
        let merged = ParamSetPair::from_pairs(pairs.clone());
        assert_eq!(merged.len(), outputs.len());
        for sp in &merged {
            assert_eq!(sp.inputs.len(), inputs.len());
        }
        let expanded = ParamPair::from_set_pairs(&merged);
        let mut expected = pairs;
        let key = |p: &ParamPair| (p.input.clone(), p.output.clone());
        let mut actual = expanded;
        actual.sort_by_key(key);
        expected.sort_by_key(key);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_set_pair_mutators_are_idempotent() {
        let mut p = set_pair(&["i1"], &["o1"]);
        p.add_inputs(["i2".to_string()]);
        assert_eq!(p.inputs, set_pair(&["i1", "i2"], &[]).inputs);
        p.add_inputs(["i1".to_string()]);
        assert_eq!(p.inputs.len(), 2);
        p.remove_inputs(&["i2".to_string()]);
        assert_eq!(p.inputs.len(), 1);
        p.remove_inputs(&["i3".to_string()]);
        assert_eq!(p.inputs.len(), 1);

        p.add_outputs(["o2".to_string()]);
        p.add_outputs(["o1".to_string()]);
        assert_eq!(p.outputs.len(), 2);
        p.remove_outputs(&["o2".to_string()]);
        p.remove_outputs(&["o3".to_string()]);
        assert_eq!(p.outputs.len(), 1);
    }

    #[test]
    fn test_build_set_pairs_no_overrides() {
        let actual =
            build_set_pairs(&strings(&["i1", "i2"]), &strings(&["o1", "o2"]), &[]).unwrap();
        assert_eq!(
            actual,
            vec![set_pair(&["i1", "i2"], &["o1"]), set_pair(&["i1", "i2"], &["o2"])]
        );
    }

    #[test]
    fn test_build_set_pairs_override_consumes_names() {
        let overrides = vec![set_pair(&["i1"], &["o1"])];
        let actual =
            build_set_pairs(&strings(&["i1", "i2"]), &strings(&["o1", "o2"]), &overrides)
                .unwrap();
        assert_eq!(
            actual,
            vec![set_pair(&["i1"], &["o1"]), set_pair(&["i2"], &["o2"])]
        );
    }

    #[test]
    fn test_build_set_pairs_duplicate_claim_rejected() {
        let overrides = vec![set_pair(&["i1"], &["o1"]), set_pair(&["i2"], &["o1"])];
        assert!(matches!(
            build_set_pairs(&strings(&["i1", "i2"]), &strings(&["o1"]), &overrides),
            Err(Error::DuplicateReference(_))
        ));
    }

    #[test]
    fn test_build_set_pairs_unknown_name_rejected() {
        let overrides = vec![set_pair(&["i1", "not_a_param"], &["o1"])];
        assert!(matches!(
            build_set_pairs(&strings(&["i1"]), &strings(&["o1"]), &overrides),
            Err(Error::MissingReference(_))
        ));
    }

    #[test]
    fn test_build_set_pairs_one_sided_overrides() {
        let overrides = vec![set_pair(&["i1"], &[]), set_pair(&[], &["o1"])];
        let actual = build_set_pairs(&strings(&["i1"]), &strings(&["o1"]), &overrides).unwrap();
        assert_eq!(actual, vec![set_pair(&["i1"], &[]), set_pair(&[], &["o1"])]);
    }

    #[test]
    fn test_build_set_pairs_empty_override_is_dropped() {
        let overrides = vec![set_pair(&[], &[])];
        let actual =
            build_set_pairs(&strings(&["i1"]), &strings(&["o1"]), &overrides).unwrap();
        assert_eq!(actual, vec![set_pair(&["i1"], &["o1"])]);
    }

    #[test]
    fn test_serde_stable_order() {
        let sp = set_pair(&["b_in", "a_in"], &["z_out", "a_out"]);
        let value = serde_json::to_value(&sp).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"inputs": ["a_in", "b_in"], "outputs": ["a_out", "z_out"]})
        );
        let back: ParamSetPair = serde_json::from_value(value).unwrap();
        assert_eq!(back, sp);
    }
}
