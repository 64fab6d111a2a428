//! `getJobExecutionPlan` / `getTargetNetworks` (spec §4.6).

use std::collections::BTreeSet;

use deployctl_config::{Job, Network};
use deployctl_graph::DependencyGraph;

use crate::error::OrchestratorError;

pub struct JobPlan {
    /// `fullOrder` filtered down to the selected + transitively-depended-on
    /// jobs, preserving topological order.
    pub job_order: Vec<String>,
    /// Jobs a selector named directly (as opposed to pulled in transitively
    /// as a dependency); used to decide whether a deprecated job runs.
    pub explicitly_targeted: BTreeSet<String>,
}

/// Resolve job selectors against `full_order`. An empty selector list means
/// "run everything" with nothing explicitly targeted (so deprecated-job
/// skipping still applies unless `--run-deprecated` is set).
pub fn select_jobs(
    full_order: &[String],
    jobs: &std::collections::BTreeMap<String, Job>,
    graph: &DependencyGraph,
    selectors: &[String],
) -> Result<JobPlan, OrchestratorError> {
    if selectors.is_empty() {
        return Ok(JobPlan { job_order: full_order.to_vec(), explicitly_targeted: BTreeSet::new() });
    }

    let mut matched: BTreeSet<String> = BTreeSet::new();
    for selector in selectors {
        if selector.contains('*') || selector.contains('?') {
            let pattern = glob::Pattern::new(selector).map_err(|err| OrchestratorError::InvalidJobSelector {
                selector: selector.clone(),
                message: err.to_string(),
            })?;
            let hits: Vec<&String> = jobs.keys().filter(|name| pattern.matches(name)).collect();
            if hits.is_empty() {
                return Err(OrchestratorError::UnknownJobSelector { selector: selector.clone() });
            }
            matched.extend(hits.into_iter().cloned());
        } else {
            if !jobs.contains_key(selector) {
                return Err(OrchestratorError::UnknownJobSelector { selector: selector.clone() });
            }
            matched.insert(selector.clone());
        }
    }

    let mut included: BTreeSet<String> = matched.clone();
    let mut stack: Vec<String> = matched.iter().cloned().collect();
    while let Some(job) = stack.pop() {
        for dep in graph.dependencies_of(&job) {
            if included.insert(dep.to_string()) {
                stack.push(dep.to_string());
            }
        }
    }

    // A deprecated job included only transitively stays iff some other
    // *included, non-deprecated* job names it as a direct dependency.
    let included: BTreeSet<String> = included
        .into_iter()
        .filter(|name| {
            let Some(job) = jobs.get(name) else { return false };
            if !job.deprecated || matched.contains(name) {
                return true;
            }
            jobs.values().any(|candidate| {
                candidate.name != *name
                    && !candidate.deprecated
                    && graph.dependencies_of(&candidate.name).any(|d| d == name)
            })
        })
        .collect();

    let job_order = full_order.iter().filter(|name| included.contains(*name)).cloned().collect();
    Ok(JobPlan { job_order, explicitly_targeted: matched })
}

pub struct NetworkPlan {
    pub networks: Vec<Network>,
    pub warnings: Vec<String>,
}

/// Resolve `--network` tokens. Digits are chain ids; other tokens match
/// network names case-insensitively and may expand to several networks.
pub fn select_networks(all: &[Network], selectors: &[String]) -> Result<NetworkPlan, OrchestratorError> {
    if selectors.is_empty() {
        return Ok(NetworkPlan { networks: all.to_vec(), warnings: Vec::new() });
    }

    let mut seen_ids: BTreeSet<u64> = BTreeSet::new();
    let mut networks = Vec::new();
    let mut warnings = Vec::new();

    for token in selectors {
        if let Ok(chain_id) = token.parse::<u64>() {
            match all.iter().find(|n| n.chain_id == chain_id) {
                Some(network) => {
                    if seen_ids.insert(chain_id) {
                        networks.push(network.clone());
                    }
                }
                None => warnings.push(format!("network selector `{token}` does not match any configured chain id")),
            }
            continue;
        }

        let hits: Vec<&Network> = all.iter().filter(|n| n.name.eq_ignore_ascii_case(token)).collect();
        if hits.is_empty() {
            return Err(OrchestratorError::UnknownNetworkName { token: token.clone() });
        }
        for network in hits {
            if seen_ids.insert(network.chain_id) {
                networks.push(network.clone());
            }
        }
    }

    Ok(NetworkPlan { networks, warnings })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use deployctl_config::JobAction;

    use super::*;

    fn job(name: &str, depends_on: &[&str], deprecated: bool) -> Job {
        Job {
            name: name.to_string(),
            version: "1".to_string(),
            description: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            actions: vec![JobAction {
                name: "noop".into(),
                template: None,
                kind: Some("send-transaction".into()),
                arguments: Default::default(),
                skip_condition: None,
                depends_on: vec![],
                output: None,
            }],
            only_networks: None,
            skip_networks: None,
            skip_condition: None,
            constants: Default::default(),
            deprecated,
            min_evm_version: None,
            source_path: String::new(),
        }
    }

    #[test]
    fn selector_pulls_in_transitive_dependencies() {
        let mut jobs = BTreeMap::new();
        jobs.insert("a".to_string(), job("a", &[], false));
        jobs.insert("b".to_string(), job("b", &["a"], false));
        jobs.insert("c".to_string(), job("c", &["b"], false));
        let graph = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap();
        let full_order = graph.topological_order();

        let plan = select_jobs(&full_order, &jobs, &graph, &["c".to_string()]).unwrap();
        assert_eq!(plan.job_order, vec!["a", "b", "c"]);
        assert_eq!(plan.explicitly_targeted, BTreeSet::from(["c".to_string()]));
    }

    #[test]
    fn unmatched_selector_is_fatal() {
        let jobs: BTreeMap<String, Job> = BTreeMap::new();
        let graph = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap();
        let err = select_jobs(&[], &jobs, &graph, &["ghost".to_string()]).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownJobSelector { .. }));
    }

    #[test]
    fn network_name_token_expands_to_every_match() {
        let networks = vec![
            Network { name: "mainnet".into(), chain_id: 1, rpc_url: "x".into(), supports: vec![], gas_limit: None, testnet: false, evm_version: None },
            Network { name: "Mainnet-Backup".into(), chain_id: 2, rpc_url: "y".into(), supports: vec![], gas_limit: None, testnet: false, evm_version: None },
        ];
        let plan = select_networks(&networks, &["MAINNET".to_string()]).unwrap();
        assert_eq!(plan.networks.len(), 1);
        assert_eq!(plan.networks[0].chain_id, 1);
    }

    #[test]
    fn unresolved_chain_id_warns_instead_of_failing() {
        let networks = vec![Network { name: "mainnet".into(), chain_id: 1, rpc_url: "x".into(), supports: vec![], gas_limit: None, testnet: false, evm_version: None }];
        let plan = select_networks(&networks, &["999".to_string()]).unwrap();
        assert!(plan.networks.is_empty());
        assert_eq!(plan.warnings.len(), 1);
    }
}
