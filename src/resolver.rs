//! Reference resolution over a declared parameter set.
//!
//! Builds the reference graph implied by `${name}` tokens, rejects name
//! collisions, self references, and cycles, then substitutes every token in
//! dependency order so that each returned value is final before anything
//! that references it.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::job_param::JobParam;
use crate::name;

/// Resolve every `${name}` reference among `params`.
///
/// Returns the parameters in their declared order, with their originally
/// declared names and fully substituted values.
pub fn resolve_references(params: &[JobParam]) -> Result<Vec<JobParam>> {
    debug!(count = params.len(), "resolving parameter references");

    let index = build_index(params)?;
    let deps = build_dependencies(params, &index)?;
    check_cycles(params, &deps)?;

    let mut cache: Vec<Option<String>> = vec![None; params.len()];
    let mut resolved = Vec::with_capacity(params.len());
    for idx in 0..params.len() {
        let value = finalize(idx, params, &deps, &mut cache)?;
        trace!(name = %params[idx].name, %value, "parameter resolved");
        resolved.push(JobParam::new(params[idx].name.clone(), value));
    }
    Ok(resolved)
}

/// Map canonical names to declaration indices, rejecting collisions.
fn build_index(params: &[JobParam]) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(params.len());
    for (idx, param) in params.iter().enumerate() {
        if let Some(prev) = index.insert(name::canonical(&param.name), idx) {
            return Err(Error::Collision(format!(
                "parameter names '{}' and '{}' are equivalent",
                params[prev].name, param.name
            )));
        }
    }
    Ok(index)
}

/// Edges `a -> b` meaning the value of `a` contains `${b}`.
fn build_dependencies(
    params: &[JobParam],
    index: &HashMap<String, usize>,
) -> Result<Vec<Vec<usize>>> {
    let mut deps = Vec::with_capacity(params.len());
    for (idx, param) in params.iter().enumerate() {
        let mut edges = Vec::new();
        for token in param.find_references() {
            let target = *index.get(&name::canonical(token.inner())).ok_or_else(|| {
                Error::MissingReference(format!(
                    "parameter '{}' references undeclared '{}'",
                    param.name, token
                ))
            })?;
            if target == idx {
                return Err(Error::SelfReference(format!(
                    "parameter '{}' references itself via '{}'",
                    param.name, token
                )));
            }
            edges.push(target);
        }
        deps.push(edges);
    }
    Ok(deps)
}

/// Depth-first search with an explicit recursion stack; a back edge is a
/// cycle, reported with the full path.
fn check_cycles(params: &[JobParam], deps: &[Vec<usize>]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(
        idx: usize,
        params: &[JobParam],
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Result<()> {
        marks[idx] = Mark::OnStack;
        stack.push(idx);
        for &dep in &deps[idx] {
            match marks[dep] {
                Mark::OnStack => {
                    let start = stack.iter().position(|&i| i == dep).unwrap_or(0);
                    let path: Vec<&str> = stack[start..]
                        .iter()
                        .chain(std::iter::once(&dep))
                        .map(|&i| params[i].name.as_str())
                        .collect();
                    return Err(Error::CyclicReference(path.join(" -> ")));
                }
                Mark::Unvisited => visit(dep, params, deps, marks, stack)?,
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[idx] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; params.len()];
    let mut stack = Vec::new();
    for idx in 0..params.len() {
        if marks[idx] == Mark::Unvisited {
            visit(idx, params, deps, &mut marks, &mut stack)?;
        }
    }
    Ok(())
}

/// Substitute tokens in dependency order; memoized so every parameter is
/// finalized exactly once. The graph is acyclic by the time this runs.
fn finalize(
    idx: usize,
    params: &[JobParam],
    deps: &[Vec<usize>],
    cache: &mut Vec<Option<String>>,
) -> Result<String> {
    if let Some(value) = &cache[idx] {
        return Ok(value.clone());
    }

    let mut value = params[idx].value.clone();
    if !deps[idx].is_empty() {
        // Edges were built one per token, in token order; key replacements
        // by each token's env-name since its spelling may differ from the
        // declared name of its target.
        let mut replacements = HashMap::new();
        for (token, &dep) in params[idx].find_references().iter().zip(&deps[idx]) {
            let resolved = finalize(dep, params, deps, cache)?;
            replacements.insert(token.envname(), resolved);
        }
        value = crate::reference::ReferenceToken::replace_references(&value, &replacements)?;
    }

    cache[idx] = Some(value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<JobParam> {
        pairs.iter().map(|(n, v)| JobParam::new(*n, *v)).collect()
    }

    #[test]
    fn test_no_references_is_identity() {
        let declared = params(&[
            ("param_foo", "foo"),
            ("param_bar", "bar"),
            ("param_qaz", "qaz"),
        ]);
        assert_eq!(resolve_references(&declared).unwrap(), declared);
    }

    #[test]
    fn test_simple_reference() {
        let declared = params(&[("param_a", "foo_${param_b}"), ("param_b", "bar")]);
        let expected = params(&[("param_a", "foo_bar"), ("param_b", "bar")]);
        assert_eq!(resolve_references(&declared).unwrap(), expected);
    }

    #[test]
    fn test_reference_to_unnormalized_name() {
        let declared = params(&[("param_a", "foo_${param_B}"), ("param-b", "bar")]);
        let expected = params(&[("param_a", "foo_bar"), ("param-b", "bar")]);
        assert_eq!(resolve_references(&declared).unwrap(), expected);
    }

    #[test]
    fn test_nested_references() {
        let declared = params(&[
            ("param_a", "a"),
            ("param_b", "b"),
            ("param_c", "c"),
            ("param_d", "d"),
            ("param_ab", "${param_a}${param_b}"),
            ("param_cd", "${param_c}${param_d}"),
            ("param_abcd", "${param_ab}${param_cd}"),
            ("param_aababcd", "${param_a}${param_ab}${param_ab}${param_cd}"),
        ]);
        let expected = params(&[
            ("param_a", "a"),
            ("param_b", "b"),
            ("param_c", "c"),
            ("param_d", "d"),
            ("param_ab", "ab"),
            ("param_cd", "cd"),
            ("param_abcd", "abcd"),
            ("param_aababcd", "aababcd"),
        ]);
        assert_eq!(resolve_references(&declared).unwrap(), expected);
    }

    #[test]
    fn test_chain_resolves_in_dependency_order() {
        let declared = params(&[("c", "${b}"), ("b", "${a}"), ("a", "a")]);
        let expected = params(&[("c", "a"), ("b", "a"), ("a", "a")]);
        assert_eq!(resolve_references(&declared).unwrap(), expected);
    }

    #[test]
    fn test_self_reference_rejected() {
        let declared = params(&[("param_a", "${param_a}")]);
        assert!(matches!(
            resolve_references(&declared),
            Err(Error::SelfReference(_))
        ));
    }

    #[test]
    fn test_collision_rejected() {
        let declared = params(&[("param_a", "bar"), ("param_A", "foo")]);
        assert!(matches!(
            resolve_references(&declared),
            Err(Error::Collision(_))
        ));
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let declared = params(&[
            ("param_a", "${param_b}"),
            ("param_b", "${param_c}"),
            ("param_c", "${param_a}"),
        ]);
        match resolve_references(&declared) {
            Err(Error::CyclicReference(path)) => {
                assert!(path.contains("param_a"));
                assert!(path.contains("->"));
            }
            other => panic!("expected cyclic reference error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_reference_rejected() {
        let declared = params(&[("param_a", "${param_b}")]);
        assert!(matches!(
            resolve_references(&declared),
            Err(Error::MissingReference(_))
        ));
    }
}
