//! Result-store → `output/**/*.json` (spec §4.6 "Result writing").

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use deployctl_config::{Job, OutputSpec};
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::OrchestratorError;
use crate::result_store::{JobNetworkOutcome, ResultStore};

#[derive(Debug, Serialize)]
struct NetworkEntry {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "chainIds")]
    chain_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "chainId")]
    chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<BTreeMap<String, Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct JobOutputFile {
    #[serde(rename = "jobName")]
    job_name: String,
    #[serde(rename = "jobVersion")]
    job_version: String,
    #[serde(rename = "lastRun")]
    last_run: String,
    networks: Vec<NetworkEntry>,
}

/// The outputs map a job's results are grouped by: restricted to actions
/// explicitly marked `output: true` if any exist, otherwise every recorded
/// output (spec §4.6 grouping rule / §3 `output` field).
fn job_level_outputs(job: &Job, outputs: &BTreeMap<String, Json>) -> BTreeMap<String, Json> {
    let explicit_actions: Vec<&str> = job
        .actions
        .iter()
        .filter(|a| matches!(a.output, Some(OutputSpec::Bool(true))))
        .map(|a| a.name.as_str())
        .collect();

    if explicit_actions.is_empty() {
        return outputs.clone();
    }
    outputs
        .iter()
        .filter(|(key, _)| explicit_actions.iter().any(|name| key.starts_with(&format!("{name}."))))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Write one JSON file per job with at least one recorded result.
pub fn write_outputs(
    root: &Path,
    jobs: &BTreeMap<String, Job>,
    store: &ResultStore,
    flat_output: bool,
) -> Result<(), OrchestratorError> {
    let snapshot = store.snapshot();
    let mut by_job: BTreeMap<&str, Vec<(u64, &JobNetworkOutcome)>> = BTreeMap::new();
    for ((job, chain_id), outcome) in &snapshot {
        by_job.entry(job.as_str()).or_default().push((*chain_id, outcome));
    }

    let output_root = root.join("output");
    for (job_name, mut results) in by_job {
        results.sort_by_key(|(chain_id, _)| *chain_id);
        let Some(job) = jobs.get(job_name) else { continue };

        let mut groups: BTreeMap<String, (BTreeSet<u64>, BTreeMap<String, Json>)> = BTreeMap::new();
        let mut error_entries = Vec::new();
        let mut skipped_chain_ids = BTreeSet::new();

        for (chain_id, outcome) in &results {
            match outcome {
                JobNetworkOutcome::Success { outputs } => {
                    let filtered = job_level_outputs(job, outputs);
                    let canonical = serde_json::to_string(&filtered).unwrap_or_default();
                    let entry = groups.entry(canonical).or_insert_with(|| (BTreeSet::new(), filtered.clone()));
                    entry.0.insert(*chain_id);
                }
                JobNetworkOutcome::Failed { message } => {
                    error_entries.push(NetworkEntry {
                        status: "error",
                        chain_ids: None,
                        chain_id: Some(chain_id.to_string()),
                        outputs: None,
                        error: Some(message.clone()),
                    });
                }
                JobNetworkOutcome::Skipped { .. } => {
                    skipped_chain_ids.insert(*chain_id);
                }
            }
        }

        let mut entries: Vec<NetworkEntry> = groups
            .into_values()
            .map(|(chain_ids, outputs)| NetworkEntry {
                status: "success",
                chain_ids: Some(chain_ids.iter().map(u64::to_string).collect()),
                chain_id: None,
                outputs: Some(outputs),
                error: None,
            })
            .collect();
        entries.extend(error_entries);

        if entries.is_empty() {
            continue;
        }

        let file = JobOutputFile {
            job_name: job.name.clone(),
            job_version: job.version.clone(),
            last_run: Utc::now().to_rfc3339(),
            networks: entries,
        };

        let path = if flat_output {
            output_root.join(format!("{job_name}.json"))
        } else {
            relative_output_path(&output_root, job)
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| OrchestratorError::Io { path: parent.to_string_lossy().to_string(), source })?;
        }
        let text = serde_json::to_string_pretty(&file)
            .map_err(|source| OrchestratorError::Serialize { job: job_name.to_string(), source })?;
        std::fs::write(&path, text)
            .map_err(|source| OrchestratorError::Io { path: path.to_string_lossy().to_string(), source })?;
    }

    Ok(())
}

/// Mirror the job YAML's position under `jobs/`, with `.json` replacing the
/// extension; falls back to `<name>.json` if the source path isn't under a
/// `jobs/` directory (e.g. a job constructed in a test).
fn relative_output_path(output_root: &Path, job: &Job) -> PathBuf {
    let source = Path::new(&job.source_path);
    let mut components = source.components().peekable();
    while let Some(c) = components.peek() {
        if c.as_os_str() == "jobs" {
            components.next();
            break;
        }
        components.next();
    }
    let remainder: PathBuf = components.collect();
    if remainder.as_os_str().is_empty() {
        return output_root.join(format!("{}.json", job.name));
    }
    output_root.join(remainder.with_extension("json"))
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyContract {
    pub job: String,
    pub action: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub key_contracts: Vec<KeyContract>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}

/// Build the run summary: per-(job,network) counts plus up to 10 "key
/// contracts" extracted from address-shaped output values, in job-topological
/// then action-declaration order (spec §4.6).
pub fn summarize(job_order: &[String], jobs: &BTreeMap<String, Job>, store: &ResultStore) -> RunSummary {
    let snapshot = store.snapshot();
    let mut success_count = 0;
    let mut failed_count = 0;
    let mut skipped_count = 0;
    for outcome in snapshot.values() {
        match outcome {
            JobNetworkOutcome::Success { .. } => success_count += 1,
            JobNetworkOutcome::Failed { .. } => failed_count += 1,
            JobNetworkOutcome::Skipped { .. } => skipped_count += 1,
        }
    }

    let mut key_contracts = Vec::new();
    'outer: for job_name in job_order {
        let Some(job) = jobs.get(job_name) else { continue };
        let mut outputs_by_network: Vec<&BTreeMap<String, Json>> = Vec::new();
        for ((name, _), outcome) in &snapshot {
            if name == job_name {
                if let JobNetworkOutcome::Success { outputs } = outcome {
                    outputs_by_network.push(outputs);
                }
            }
        }
        for action in &job.actions {
            for outputs in &outputs_by_network {
                for (key, value) in outputs.iter() {
                    if !key.starts_with(&format!("{}.", action.name)) {
                        continue;
                    }
                    if let Some(address) = address_shaped(value) {
                        key_contracts.push(KeyContract { job: job_name.clone(), action: action.name.clone(), address });
                        if key_contracts.len() >= 10 {
                            break 'outer;
                        }
                    }
                }
            }
        }
    }

    RunSummary { success_count, failed_count, skipped_count, key_contracts }
}

fn address_shaped(value: &Json) -> Option<String> {
    match value {
        Json::String(s) if s.starts_with("0x") && s.len() == 42 => Some(s.clone()),
        Json::Object(map) => match map.get("address") {
            Some(Json::String(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}
