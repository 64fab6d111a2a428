//! The job dependency graph (spec component C5).
//!
//! Edges come from three sources (spec §4.3): explicit `depends_on`, a
//! template's `setup` block containing a `job-completed` condition, and the
//! transitive closure of that through nested template calls.

pub mod error;

use std::collections::{BTreeMap, BTreeSet};

use deployctl_config::{Condition, Job, Template};
pub use error::GraphError;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// job name -> set of jobs it directly depends on.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn build(
        jobs: &BTreeMap<String, Job>,
        templates: &BTreeMap<String, Template>,
    ) -> Result<Self, GraphError> {
        let mut edges = BTreeMap::new();
        let mut memo: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for job in jobs.values() {
            let deps = direct_job_deps(job, templates, &mut memo)?;
            for dep in &deps {
                if !jobs.contains_key(dep) {
                    return Err(GraphError::UnknownJobDependency {
                        dependent: job.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            edges.insert(job.name.clone(), deps);
        }

        let graph = Self { edges };
        graph.detect_cycles()?;
        Ok(graph)
    }

    pub fn dependencies_of(&self, job: &str) -> impl Iterator<Item = &str> {
        self.edges.get(job).into_iter().flatten().map(String::as_str)
    }

    pub fn all_jobs(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// DFS-with-stack cycle detection; reconstructs the path so the first
    /// and last element are equal, per spec §4.3/§8 invariant 3.
    fn detect_cycles(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Done,
        }
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
        let mut stack: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            edges: &'a BTreeMap<String, BTreeSet<String>>,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), GraphError> {
            if let Some(pos) = stack.iter().position(|n| *n == node) {
                let mut path: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
                path.push(node.to_string());
                return Err(GraphError::Cycle { path });
            }
            if marks.get(node) == Some(&Mark::Done) {
                return Ok(());
            }
            stack.push(node);
            if let Some(deps) = edges.get(node) {
                for dep in deps {
                    visit(dep.as_str(), edges, marks, stack)?;
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            Ok(())
        }

        for node in self.edges.keys() {
            visit(node.as_str(), &self.edges, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    /// Kahn's algorithm; ties broken by stable (alphabetical, via `BTreeMap`)
    /// iteration order for determinism (spec §8 invariant 1).
    pub fn topological_order(&self) -> Vec<String> {
        let mut indegree: BTreeMap<&str, usize> =
            self.edges.keys().map(|k| (k.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (job, deps) in &self.edges {
            *indegree.get_mut(job.as_str()).unwrap() += deps.len();
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(job.as_str());
            }
        }

        let mut ready: Vec<&str> =
            indegree.iter().filter(|(_, &d)| d == 0).map(|(&n, _)| n).collect();
        ready.sort();
        let mut queue = std::collections::VecDeque::from(ready);
        let mut order = Vec::new();

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            let mut newly_ready = Vec::new();
            if let Some(dependents) = dependents.get(node) {
                for &dependent in dependents {
                    let entry = indegree.get_mut(dependent).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        newly_ready.push(dependent);
                    }
                }
            }
            newly_ready.sort();
            for n in newly_ready {
                // Keep the queue ordered so ties are resolved by name.
                let pos = queue.iter().position(|q| *q > n).unwrap_or(queue.len());
                queue.insert(pos, n);
            }
        }
        order
    }
}

fn direct_job_deps(
    job: &Job,
    templates: &BTreeMap<String, Template>,
    memo: &mut BTreeMap<String, BTreeSet<String>>,
) -> Result<BTreeSet<String>, GraphError> {
    let mut deps: BTreeSet<String> = job.depends_on.iter().cloned().collect();
    for action in &job.actions {
        if let Some(template_name) = &action.template {
            if !templates.contains_key(template_name) {
                return Err(GraphError::UnknownTemplate {
                    job: job.name.clone(),
                    action: action.name.clone(),
                    template: template_name.clone(),
                });
            }
            let mut stack = Vec::new();
            deps.extend(template_job_deps(template_name, templates, memo, &mut stack)?);
        }
    }
    Ok(deps)
}

/// Job-names discovered via `job-completed` conditions in `template`'s setup
/// block, plus the same recursively for every template reachable from
/// `template`'s action tree (setup actions and main actions both).
fn template_job_deps(
    template_name: &str,
    templates: &BTreeMap<String, Template>,
    memo: &mut BTreeMap<String, BTreeSet<String>>,
    stack: &mut Vec<String>,
) -> Result<BTreeSet<String>, GraphError> {
    if let Some(cached) = memo.get(template_name) {
        return Ok(cached.clone());
    }
    if let Some(pos) = stack.iter().position(|n| n == template_name) {
        let mut path = stack[pos..].to_vec();
        path.push(template_name.to_string());
        return Err(GraphError::TemplateCycle { from: template_name.to_string(), path });
    }

    let Some(template) = templates.get(template_name) else {
        return Err(GraphError::UnknownTemplate {
            job: String::new(),
            action: String::new(),
            template: template_name.to_string(),
        });
    };

    stack.push(template_name.to_string());
    let mut deps = BTreeSet::new();

    if let Some(setup) = &template.setup {
        for condition in setup.skip_condition.iter().flatten() {
            if let Condition::JobCompleted { job_completed } = condition {
                deps.insert(job_completed.job.clone());
            }
        }
        for action in &setup.actions {
            if templates.contains_key(&action.kind) {
                deps.extend(template_job_deps(&action.kind, templates, memo, stack)?);
            }
        }
    }
    for action in &template.actions {
        if templates.contains_key(&action.kind) {
            deps.extend(template_job_deps(&action.kind, templates, memo, stack)?);
        }
    }

    stack.pop();
    memo.insert(template_name.to_string(), deps.clone());
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployctl_config::{Job, JobAction};

    fn job(name: &str, depends_on: &[&str]) -> Job {
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
            deprecated: false,
            min_evm_version: None,
            source_path: String::new(),
        }
    }

    #[test]
    fn topological_order_respects_every_edge() {
        let mut jobs = BTreeMap::new();
        jobs.insert("a".into(), job("a", &[]));
        jobs.insert("b".into(), job("b", &["a"]));
        jobs.insert("c".into(), job("c", &["b"]));

        let graph = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap();
        let order = graph.topological_order();
        let index = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(index("a") < index("b"));
        assert!(index("b") < index("c"));
    }

    #[test]
    fn cycle_is_detected_with_closed_path() {
        let mut jobs = BTreeMap::new();
        jobs.insert("a".into(), job("a", &["b"]));
        jobs.insert("b".into(), job("b", &["c"]));
        jobs.insert("c".into(), job("c", &["a"]));

        let err = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap_err();
        match err {
            GraphError::Cycle { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.len() >= 2);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_is_fatal() {
        let mut jobs = BTreeMap::new();
        jobs.insert("a".into(), job("a", &["ghost"]));
        let err = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownJobDependency { dependent: "a".into(), dependency: "ghost".into() }
        );
    }

    #[test]
    fn determinism_across_runs() {
        let mut jobs = BTreeMap::new();
        jobs.insert("a".into(), job("a", &[]));
        jobs.insert("b".into(), job("b", &[]));
        jobs.insert("c".into(), job("c", &["a", "b"]));

        let graph1 = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap();
        let graph2 = DependencyGraph::build(&jobs, &BTreeMap::new()).unwrap();
        assert_eq!(graph1.topological_order(), graph2.topological_order());
    }
}
