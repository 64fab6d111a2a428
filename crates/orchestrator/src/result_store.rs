//! The orchestrator's sole write-shared structure (spec §5): one outcome per
//! (job, network). Coarse-locked; cheap enough at this scale (jobs × networks
//! rarely exceeds a few hundred entries per run).

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value as Json;

#[derive(Debug, Clone)]
pub enum JobNetworkOutcome {
    Success { outputs: BTreeMap<String, Json> },
    Failed { message: String },
    Skipped { reason: String },
}

#[derive(Default)]
pub struct ResultStore {
    inner: Mutex<BTreeMap<(String, u64), JobNetworkOutcome>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: &str, chain_id: u64, outcome: JobNetworkOutcome) {
        self.inner.lock().expect("result store mutex poisoned").insert((job.to_string(), chain_id), outcome);
    }

    pub fn get(&self, job: &str, chain_id: u64) -> Option<JobNetworkOutcome> {
        self.inner.lock().expect("result store mutex poisoned").get(&(job.to_string(), chain_id)).cloned()
    }

    /// All recorded `(job, chainId) -> outcome` pairs, for output writing.
    pub fn snapshot(&self) -> BTreeMap<(String, u64), JobNetworkOutcome> {
        self.inner.lock().expect("result store mutex poisoned").clone()
    }
}
