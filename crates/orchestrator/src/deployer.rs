//! The per-(job, network) execution loop (spec §4.6).

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::Address;
use deployctl_config::{Job, LoadedProject, Network};
use deployctl_core::verification::VerificationRegistry;
use deployctl_core::{ExecutionContext, ExecutionEngine, JobOutcome};
use deployctl_events::{Event, EventBus, EventKind, Level};
use deployctl_graph::DependencyGraph;
use serde_json::json;

use crate::error::OrchestratorError;
use crate::output::{summarize, write_outputs, RunSummary};
use crate::plan::{select_jobs, select_networks};
use crate::result_store::{JobNetworkOutcome, ResultStore};
use crate::transport::TransportFactory;

pub struct RunOptions {
    pub job_selectors: Vec<String>,
    pub network_selectors: Vec<String>,
    pub fail_early: bool,
    pub flat_output: bool,
    pub post_check_enabled: bool,
    pub run_deprecated: bool,
    pub signer: Address,
}

pub struct Deployer<'a> {
    pub project: &'a LoadedProject,
    pub graph: &'a DependencyGraph,
    pub events: &'a EventBus,
    pub verification: &'a dyn VerificationRegistry,
    pub transports: &'a dyn TransportFactory,
}

impl<'a> Deployer<'a> {
    pub async fn run(&self, options: &RunOptions, project_root: &Path) -> Result<RunSummary, OrchestratorError> {
        let full_order = self.graph.topological_order();
        let job_plan = select_jobs(&full_order, &self.project.jobs, self.graph, &options.job_selectors)?;
        let network_plan = select_networks(&self.project.networks, &options.network_selectors)?;
        for warning in &network_plan.warnings {
            tracing::warn!(%warning, "unresolved_network_selector");
        }

        self.events.emit(Event::new(
            EventKind::RunStarted,
            Level::Info,
            json!({ "jobs": job_plan.job_order, "networks": network_plan.networks.iter().map(|n| n.chain_id).collect::<Vec<_>>() }),
        ));

        let store = ResultStore::new();
        let engine = ExecutionEngine::new(&self.project.templates, self.events, self.verification, options.post_check_enabled);
        let contracts = Arc::new(self.project.contracts.clone());

        'networks: for network in &network_plan.networks {
            for job_name in &job_plan.job_order {
                let job = &self.project.jobs[job_name];
                if network_excluded(job, network) {
                    store.insert(job_name, network.chain_id, JobNetworkOutcome::Skipped { reason: "network filtered".to_string() });
                    continue;
                }

                if let Some(outcome) = self.dependency_failure(job, network.chain_id, &store) {
                    store.insert(job_name, network.chain_id, outcome);
                    if options.fail_early {
                        break 'networks;
                    }
                    continue;
                }

                let transport = self.transports.build(network, options.signer).await?;

                let mut ctx = ExecutionContext::new(
                    Arc::clone(&contracts),
                    Arc::new(self.project.constants.clone()),
                    transport,
                    options.signer,
                    job.depends_on.clone(),
                );
                self.populate_dependency_outputs(job, network.chain_id, &store, &mut ctx);

                let explicitly_targeted = job_plan.explicitly_targeted.contains(job_name) || options.run_deprecated;
                let outcome = engine.execute_job(job, &mut ctx, explicitly_targeted).await;
                ctx.dispose().await;

                let fail_early_triggered = matches!(outcome, JobOutcome::Failed { .. }) && options.fail_early;
                store.insert(job_name, network.chain_id, to_store_outcome(outcome));
                if fail_early_triggered {
                    break 'networks;
                }
            }
        }

        write_outputs(project_root, &self.project.jobs, &store, options.flat_output)?;
        let summary = summarize(&job_plan.job_order, &self.project.jobs, &store);

        self.events.emit(Event::new(
            EventKind::RunSummary,
            Level::Info,
            json!({
                "successCount": summary.success_count,
                "failedCount": summary.failed_count,
                "skippedCount": summary.skipped_count,
                "keyContracts": summary.key_contracts,
            }),
        ));
        if summary.has_failures() {
            self.events.emit(Event::new(EventKind::DeploymentFailed, Level::Error, json!({})));
        }

        Ok(summary)
    }

    /// If `job` depends on another job that has already failed on `chain_id`,
    /// this job is failed too without being executed (spec §4.6 / §8 invariant 8).
    fn dependency_failure(&self, job: &Job, chain_id: u64, store: &ResultStore) -> Option<JobNetworkOutcome> {
        for dep in &job.depends_on {
            if let Some(JobNetworkOutcome::Failed { .. }) = store.get(dep, chain_id) {
                self.events.emit(Event::new(
                    EventKind::DependencyFailurePropagated,
                    Level::Error,
                    json!({ "job": job.name, "dependency": dep }),
                ));
                return Some(JobNetworkOutcome::Failed { message: format!("depends on \"{dep}\", but \"{dep}\" failed") });
            }
        }
        None
    }

    fn populate_dependency_outputs(&self, job: &Job, chain_id: u64, store: &ResultStore, ctx: &mut ExecutionContext) {
        for dep in &job.depends_on {
            if let Some(JobNetworkOutcome::Success { outputs }) = store.get(dep, chain_id) {
                ctx.record_cross_job_outputs(dep, &outputs);
            }
        }
    }
}

fn network_excluded(job: &Job, network: &Network) -> bool {
    if let Some(only) = &job.only_networks {
        if !only.contains(&network.chain_id) {
            return true;
        }
    }
    if let Some(skip) = &job.skip_networks {
        if skip.contains(&network.chain_id) {
            return true;
        }
    }
    false
}

fn to_store_outcome(outcome: JobOutcome) -> JobNetworkOutcome {
    match outcome {
        JobOutcome::Success { outputs } => JobNetworkOutcome::Success { outputs },
        JobOutcome::Failed { message } => JobNetworkOutcome::Failed { message },
        JobOutcome::Skipped { reason } => JobNetworkOutcome::Skipped { reason },
    }
}

