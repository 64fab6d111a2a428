//! Integration tests for the deploy loop against an in-memory fake chain
//! transport, covering spec §8's multi-network / dependency-propagation /
//! selector scenarios end to end.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use deployctl_artifacts::ContractRepository;
use deployctl_config::{Job, JobAction, LoadedProject, Network, OutputSpec, Value};
use deployctl_core::verification::NullVerificationRegistry;
use deployctl_core::{ChainTransport, DeployReceipt, TxReceipt};
use deployctl_events::EventBus;
use deployctl_graph::DependencyGraph;
use deployctl_orchestrator::{Deployer, OrchestratorError, RunOptions, TransportFactory};
use tempfile::TempDir;

struct FakeTransport {
    next_address: AtomicU64,
    fail_deploy: bool,
}

impl FakeTransport {
    fn new() -> Self {
        Self { next_address: AtomicU64::new(1), fail_deploy: false }
    }

    fn always_fails() -> Self {
        Self { next_address: AtomicU64::new(1), fail_deploy: true }
    }
}

#[async_trait]
impl ChainTransport for FakeTransport {
    async fn send_transaction(&self, _to: Address, _data: Bytes, _value: U256) -> Result<TxReceipt, String> {
        Ok(TxReceipt { hash: "0xaaaa".to_string(), block_number: 1, status: true })
    }

    async fn deploy(&self, _init_code: Bytes, _value: U256) -> Result<DeployReceipt, String> {
        if self.fail_deploy {
            return Err("rpc: connection refused".to_string());
        }
        let n = self.next_address.fetch_add(1, Ordering::SeqCst);
        let mut bytes = [0u8; 20];
        bytes[19] = n as u8;
        Ok(DeployReceipt { address: Address::from(bytes), hash: format!("0x{n:064x}"), block_number: n })
    }

    async fn balance_of(&self, _address: Address) -> Result<U256, String> {
        Ok(U256::ZERO)
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, String> {
        Ok(Bytes::new())
    }

    async fn has_code(&self, _address: Address) -> Result<bool, String> {
        Ok(false)
    }
}

struct FakeTransportFactory {
    fail_deploy: bool,
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn build(&self, _network: &Network, _signer: Address) -> Result<Arc<dyn ChainTransport>, OrchestratorError> {
        let transport =
            if self.fail_deploy { FakeTransport::always_fails() } else { FakeTransport::new() };
        Ok(Arc::new(transport))
    }
}

fn network(name: &str, chain_id: u64) -> Network {
    Network {
        name: name.to_string(),
        chain_id,
        rpc_url: "http://localhost:8545".to_string(),
        supports: Vec::new(),
        gas_limit: None,
        testnet: true,
        evm_version: None,
    }
}

fn deploy_job(name: &str, depends_on: Vec<String>, deprecated: bool) -> Job {
    Job {
        name: name.to_string(),
        version: "1".to_string(),
        description: None,
        depends_on,
        actions: vec![JobAction {
            name: "deploy".to_string(),
            template: None,
            kind: Some("create-contract".to_string()),
            arguments: BTreeMap::from([("bytecode".to_string(), Value::literal_str("0x6001"))]),
            skip_condition: None,
            depends_on: Vec::new(),
            output: Some(OutputSpec::Bool(true)),
        }],
        only_networks: None,
        skip_networks: None,
        skip_condition: None,
        constants: BTreeMap::new(),
        deprecated,
        min_evm_version: None,
        source_path: format!("jobs/{name}.yaml"),
    }
}

fn project(jobs: Vec<Job>, networks: Vec<Network>) -> LoadedProject {
    LoadedProject {
        jobs: jobs.into_iter().map(|j| (j.name.clone(), j)).collect(),
        templates: BTreeMap::new(),
        constants: BTreeMap::new(),
        contracts: ContractRepository::default(),
        networks,
        deprecated_jobs: Vec::new(),
        warnings: Vec::new(),
    }
}

#[tokio::test]
async fn deploys_one_job_across_two_networks_and_writes_grouped_output() {
    let proj = project(vec![deploy_job("token", vec![], false)], vec![network("sepolia", 11155111), network("goerli", 5)]);
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: false };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec![],
        network_selectors: vec![],
        fail_early: false,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };

    let root = TempDir::new().unwrap();
    let summary = deployer.run(&options, root.path()).await.unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 0);
    assert_eq!(summary.key_contracts.len(), 2);

    let output_path = root.path().join("output/token.json");
    let contents = std::fs::read_to_string(&output_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let networks = parsed["networks"].as_array().unwrap();
    assert_eq!(networks.len(), 2, "identical outputs across both chains collapse into one entry");
    let chain_ids = networks[0]["chainIds"].as_array().unwrap();
    assert_eq!(chain_ids.len(), 2);
}

#[tokio::test]
async fn dependent_job_fails_when_its_dependency_fails() {
    let proj = project(
        vec![deploy_job("base", vec![], false), deploy_job("extension", vec!["base".to_string()], false)],
        vec![network("sepolia", 11155111)],
    );
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: true };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec![],
        network_selectors: vec![],
        fail_early: false,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };

    let root = TempDir::new().unwrap();
    let summary = deployer.run(&options, root.path()).await.unwrap();

    assert_eq!(summary.failed_count, 2);
    assert!(summary.has_failures());

    let output_path = root.path().join("output/extension.json");
    let contents = std::fs::read_to_string(&output_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let message = parsed["networks"][0]["error"].as_str().unwrap();
    assert_eq!(message, "depends on \"base\", but \"base\" failed");
}

#[tokio::test]
async fn job_selector_pulls_in_transitive_dependency_but_skips_unrelated_job() {
    let proj = project(
        vec![
            deploy_job("base", vec![], false),
            deploy_job("extension", vec!["base".to_string()], false),
            deploy_job("unrelated", vec![], false),
        ],
        vec![network("sepolia", 11155111)],
    );
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: false };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec!["extension".to_string()],
        network_selectors: vec![],
        fail_early: false,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };

    let root = TempDir::new().unwrap();
    let summary = deployer.run(&options, root.path()).await.unwrap();

    assert_eq!(summary.success_count, 2, "base and extension run, unrelated does not");
    assert!(!root.path().join("output/unrelated.json").exists());
    assert!(root.path().join("output/base.json").exists());
}

#[tokio::test]
async fn network_selector_by_chain_id_excludes_non_matching_networks() {
    let proj = project(vec![deploy_job("token", vec![], false)], vec![network("sepolia", 11155111), network("goerli", 5)]);
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: false };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec![],
        network_selectors: vec!["5".to_string()],
        fail_early: false,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };

    let root = TempDir::new().unwrap();
    let summary = deployer.run(&options, root.path()).await.unwrap();
    assert_eq!(summary.success_count, 1);
}

#[tokio::test]
async fn deprecated_job_is_skipped_unless_explicitly_targeted() {
    let proj = project(vec![deploy_job("legacy", vec![], true)], vec![network("sepolia", 11155111)]);
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: false };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec![],
        network_selectors: vec![],
        fail_early: false,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };
    let root = TempDir::new().unwrap();
    let summary = deployer.run(&options, root.path()).await.unwrap();
    assert_eq!(summary.skipped_count, 1, "a deprecated job with no matching selector is skipped, not run");

    let options_targeted = RunOptions { job_selectors: vec!["legacy".to_string()], ..options_like(&proj) };
    let root2 = TempDir::new().unwrap();
    let summary2 = deployer.run(&options_targeted, root2.path()).await.unwrap();
    assert_eq!(summary2.success_count, 1, "explicitly selecting a deprecated job runs it");
}

fn options_like(_proj: &LoadedProject) -> RunOptions {
    RunOptions {
        job_selectors: vec![],
        network_selectors: vec![],
        fail_early: false,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    }
}

#[tokio::test]
async fn fail_early_stops_before_the_second_network() {
    let proj = project(vec![deploy_job("token", vec![], false)], vec![network("sepolia", 11155111), network("goerli", 5)]);
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: true };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec![],
        network_selectors: vec![],
        fail_early: true,
        flat_output: false,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };

    let root = TempDir::new().unwrap();
    let summary = deployer.run(&options, root.path()).await.unwrap();
    assert_eq!(summary.failed_count, 1, "fail_early stops the run after the first failing network");
}

#[tokio::test]
async fn flat_output_writes_to_job_name_instead_of_mirrored_path() {
    let proj = project(vec![deploy_job("token", vec![], false)], vec![network("sepolia", 11155111)]);
    let graph = DependencyGraph::build(&proj.jobs, &proj.templates).unwrap();
    let events = EventBus::new();
    let verification = NullVerificationRegistry;
    let transports = FakeTransportFactory { fail_deploy: false };
    let deployer = Deployer { project: &proj, graph: &graph, events: &events, verification: &verification, transports: &transports };

    let options = RunOptions {
        job_selectors: vec![],
        network_selectors: vec![],
        fail_early: false,
        flat_output: true,
        post_check_enabled: true,
        run_deprecated: false,
        signer: Address::ZERO,
    };

    let root = TempDir::new().unwrap();
    deployer.run(&options, root.path()).await.unwrap();
    assert!(root.path().join("output/token.json").exists());
}

#[tokio::test]
async fn dry_run_reports_ambiguous_contract_reference_without_touching_the_network() {
    let proj = project(vec![deploy_job("token", vec![], false)], vec![network("sepolia", 11155111)]);
    let report = deployctl_orchestrator::validate(&proj).await;
    assert!(report.ambiguous_contract_references.is_empty());
    assert!(report.is_clean());
}
