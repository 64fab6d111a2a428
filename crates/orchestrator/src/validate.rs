//! `dry-run` / `validate`: resolve every action's arguments without touching
//! the network or dispatching a primitive (SPEC_FULL §"Supplemented
//! Features" 1; needed to make spec §8 S5 testable).

use alloy_primitives::Address;
use deployctl_config::{Job, JobAction, LoadedProject, Value};
use deployctl_core::resolver::{resolve_value, Scope};
use deployctl_core::{ChainTransport, ExecutionContext};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub job: String,
    pub action: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub ambiguous_contract_references: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.ambiguous_contract_references.is_empty() && self.issues.is_empty()
    }
}

/// A transport that fails any attempt at network I/O; `dry-run` must never
/// reach one, but argument resolution (e.g. a `contractExists` skip
/// condition) could in principle try.
struct UnreachableTransport;

#[async_trait::async_trait]
impl ChainTransport for UnreachableTransport {
    async fn send_transaction(
        &self,
        _to: Address,
        _data: alloy_primitives::Bytes,
        _value: alloy_primitives::U256,
    ) -> Result<deployctl_core::TxReceipt, String> {
        Err("dry-run: network access attempted".to_string())
    }
    async fn deploy(
        &self,
        _data: alloy_primitives::Bytes,
        _value: alloy_primitives::U256,
    ) -> Result<deployctl_core::DeployReceipt, String> {
        Err("dry-run: network access attempted".to_string())
    }
    async fn balance_of(&self, _address: Address) -> Result<alloy_primitives::U256, String> {
        Err("dry-run: network access attempted".to_string())
    }
    async fn call(
        &self,
        _to: Address,
        _data: alloy_primitives::Bytes,
    ) -> Result<alloy_primitives::Bytes, String> {
        Err("dry-run: network access attempted".to_string())
    }
    async fn has_code(&self, _address: Address) -> Result<bool, String> {
        Err("dry-run: network access attempted".to_string())
    }
}

/// Resolve every action argument in every job (and every reachable template
/// call) without dispatching a primitive, collecting ambiguous contract
/// references and resolution failures instead of failing fast.
pub async fn validate(project: &LoadedProject) -> ValidationReport {
    let mut report = ValidationReport::default();

    for contract in project.contracts.contracts() {
        if let Some(name) = &contract.contract_name {
            if project.contracts.is_ambiguous(name) && !report.ambiguous_contract_references.contains(name) {
                report.ambiguous_contract_references.push(name.clone());
            }
        }
    }

    let ctx = ExecutionContext::new(
        Arc::new(project.contracts.clone()),
        Arc::new(project.constants.clone()),
        Arc::new(UnreachableTransport),
        Address::ZERO,
        vec![],
    );

    for job in project.jobs.values() {
        for action in &job.actions {
            if let Err(message) = validate_job_action(job, action, &ctx).await {
                report.issues.push(ValidationIssue { job: job.name.clone(), action: action.name.clone(), message });
            }
        }
    }

    ctx.dispose().await;
    report
}

async fn validate_job_action(job: &Job, action: &JobAction, ctx: &ExecutionContext) -> Result<(), String> {
    let scope = Scope {
        ctx,
        template_arguments: None,
        job_constants: &job.constants,
        source_path: &job.source_path,
        enclosing_contract: None,
    };
    resolve_arguments(&action.arguments, &scope).await
}

async fn resolve_arguments(arguments: &BTreeMap<String, Value>, scope: &Scope<'_>) -> Result<(), String> {
    for value in arguments.values() {
        resolve_value(value, scope).await.map_err(|err| err.to_string())?;
    }
    Ok(())
}
