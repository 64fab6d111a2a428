//! Per (job × network) execution scope (spec component C7, §3).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::Address;
use deployctl_artifacts::{ContractRepository, UniqueHash};
use deployctl_config::Value;
use serde_json::Value as Json;

use crate::transport::ChainTransport;

/// Owns a chain transport and signer, plus the job-scoped and cross-job
/// output maps an action's `{{...}}` expressions resolve against.
///
/// Must be disposed exactly once (spec §8 invariant 7); `dispose` closes the
/// transport, and `Drop` logs a warning if a context was dropped without
/// having been disposed (a backstop, not a substitute for calling it).
pub struct ExecutionContext {
    contracts: Arc<ContractRepository>,
    top_level_constants: Arc<BTreeMap<String, Value>>,
    transport: Arc<dyn ChainTransport>,
    signer: Address,
    depends_on: Vec<String>,
    job_scope: BTreeMap<String, Json>,
    cross_job_scope: BTreeMap<String, Json>,
    deployed_addresses: BTreeMap<UniqueHash, Address>,
    disposed: AtomicBool,
}

impl ExecutionContext {
    pub fn new(
        contracts: Arc<ContractRepository>,
        top_level_constants: Arc<BTreeMap<String, Value>>,
        transport: Arc<dyn ChainTransport>,
        signer: Address,
        depends_on: Vec<String>,
    ) -> Self {
        Self {
            contracts,
            top_level_constants,
            transport,
            signer,
            depends_on,
            job_scope: BTreeMap::new(),
            cross_job_scope: BTreeMap::new(),
            deployed_addresses: BTreeMap::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn contracts(&self) -> &ContractRepository {
        &self.contracts
    }

    pub fn top_level_constants(&self) -> &BTreeMap<String, Value> {
        &self.top_level_constants
    }

    pub fn transport(&self) -> &Arc<dyn ChainTransport> {
        &self.transport
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn job_scope(&self) -> &BTreeMap<String, Json> {
        &self.job_scope
    }

    pub fn cross_job_scope(&self) -> &BTreeMap<String, Json> {
        &self.cross_job_scope
    }

    /// Write an action's produced outputs into the job scope under
    /// `<actionName>.<key>` (spec §4.5 step 3).
    pub fn record_job_output(&mut self, action_name: &str, outputs: &BTreeMap<String, Json>) {
        for (key, value) in outputs {
            self.job_scope.insert(format!("{action_name}.{key}"), value.clone());
        }
    }

    /// Copy a completed dependency's outputs into the cross-job scope under
    /// `<depJob>.<actionName>.<key>` (spec §4.6).
    pub fn record_cross_job_outputs(&mut self, dep_job: &str, outputs: &BTreeMap<String, Json>) {
        for (key, value) in outputs {
            self.cross_job_scope.insert(format!("{dep_job}.{key}"), value.clone());
        }
    }

    pub fn record_deployed_address(&mut self, hash: UniqueHash, address: Address) {
        self.deployed_addresses.insert(hash, address);
    }

    pub fn deployed_address(&self, hash: &str) -> Option<Address> {
        self.deployed_addresses.get(hash).copied()
    }

    /// Close the underlying transport. Guaranteed to run on every exit path
    /// by the caller (the engine/orchestrator use a `finally`-style guard);
    /// idempotent.
    /// A throwaway context sharing this one's transport/contracts/constants
    /// but with `overlay` layered on top of the job scope. Used by the
    /// engine to resolve expressions against sibling-action outputs that
    /// live in a template-call sub-scope rather than the real job scope
    /// (spec §8 invariant 6, "Scope isolation"). Marked disposed up front so
    /// dropping it never warns or closes the shared transport.
    pub(crate) fn snapshot_with_overlay(&self, overlay: &BTreeMap<String, Json>) -> ExecutionContext {
        let mut job_scope = self.job_scope.clone();
        job_scope.extend(overlay.clone());
        ExecutionContext {
            contracts: Arc::clone(&self.contracts),
            top_level_constants: Arc::clone(&self.top_level_constants),
            transport: Arc::clone(&self.transport),
            signer: self.signer,
            depends_on: self.depends_on.clone(),
            job_scope,
            cross_job_scope: self.cross_job_scope.clone(),
            deployed_addresses: self.deployed_addresses.clone(),
            disposed: AtomicBool::new(true),
        }
    }

    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.transport.close().await {
            tracing::warn!(%err, "context_dispose_warning: transport close failed");
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            tracing::warn!("ExecutionContext dropped without dispose() having been called");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::Address;
    use deployctl_artifacts::ContractRepository;

    use super::*;
    use crate::test_support::FakeTransport;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(ContractRepository::new()),
            Arc::new(BTreeMap::new()),
            Arc::new(FakeTransport::default()),
            Address::ZERO,
            vec![],
        )
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let c = ctx();
        c.dispose().await;
        c.dispose().await;
        assert!(c.disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn record_job_output_keys_by_action_dot_key() {
        let mut c = ctx();
        let mut outputs = BTreeMap::new();
        outputs.insert("address".to_string(), Json::String("0xabc".to_string()));
        c.record_job_output("deploy", &outputs);
        assert_eq!(c.job_scope().get("deploy.address"), Some(&Json::String("0xabc".to_string())));
    }

    #[test]
    fn record_cross_job_outputs_keys_by_dep_job_prefix() {
        let mut c = ctx();
        let mut outputs = BTreeMap::new();
        outputs.insert("deploy.address".to_string(), Json::String("0xabc".to_string()));
        c.record_cross_job_outputs("A", &outputs);
        assert_eq!(c.cross_job_scope().get("A.deploy.address"), Some(&Json::String("0xabc".to_string())));
    }
}
