//! Execution engine (spec component C8, §4.5): walks the action tree,
//! evaluating skip-conditions and dispatching primitives or nested
//! templates.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use deployctl_config::{Action, Condition, Job, JobAction, OutputSpec, Template, Value};
use deployctl_events::{Event, EventBus, EventKind, Level};
use serde_json::{json, Value as Json};

use crate::error::{EngineError, ResolverError};
use crate::resolver::{resolve_value, Resolved, Scope};
use crate::verification::{VerificationOutcome, VerificationRegistry, VerificationRequest};
use crate::ExecutionContext;

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success { outputs: BTreeMap<String, Json> },
    Skipped { reason: String },
    Failed { message: String },
}

#[derive(Debug, Clone)]
enum ActionOutcome {
    Success { outputs: BTreeMap<String, Json> },
    Skipped { reason: String },
    Failed { message: String },
}

pub struct ExecutionEngine<'a> {
    templates: &'a BTreeMap<String, Template>,
    events: &'a EventBus,
    verification: &'a dyn VerificationRegistry,
    post_check_enabled: bool,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(
        templates: &'a BTreeMap<String, Template>,
        events: &'a EventBus,
        verification: &'a dyn VerificationRegistry,
        post_check_enabled: bool,
    ) -> Self {
        Self { templates, events, verification, post_check_enabled }
    }

    /// `executeJob(job, ctx)` (spec §4.5).
    pub async fn execute_job(
        &self,
        job: &Job,
        ctx: &mut ExecutionContext,
        explicitly_targeted: bool,
    ) -> JobOutcome {
        {
            let scope = self.job_scope(job, ctx);
            if let Some(conditions) = &job.skip_condition {
                match evaluate_any(conditions, &scope).await {
                    Ok(true) => return JobOutcome::Skipped { reason: "skip_condition".to_string() },
                    Ok(false) => {}
                    Err(e) => return JobOutcome::Failed { message: e.to_string() },
                }
            }
        }
        if job.deprecated && !explicitly_targeted {
            return JobOutcome::Skipped { reason: "deprecated".to_string() };
        }

        self.events.emit(Event::new(
            EventKind::JobStarted,
            Level::Info,
            json!({ "job": job.name }),
        ));

        let mut prior: BTreeMap<String, ActionOutcome> = BTreeMap::new();
        for action in &job.actions {
            let outcome = self.execute_job_action(job, action, ctx, &prior).await;
            match &outcome {
                ActionOutcome::Success { outputs } => ctx.record_job_output(&action.name, outputs),
                ActionOutcome::Failed { message } => {
                    self.events.emit(Event::new(
                        EventKind::JobFailed,
                        Level::Error,
                        json!({ "job": job.name, "action": action.name, "message": message }),
                    ));
                    prior.insert(action.name.clone(), outcome);
                    return JobOutcome::Failed { message: message.clone() };
                }
                ActionOutcome::Skipped { .. } => {}
            }
            prior.insert(action.name.clone(), outcome);
        }

        self.events.emit(Event::new(EventKind::JobCompleted, Level::Info, json!({ "job": job.name })));
        JobOutcome::Success { outputs: ctx.job_scope().clone() }
    }

    fn job_scope<'s>(&self, job: &'s Job, ctx: &'s ExecutionContext) -> Scope<'s> {
        Scope {
            ctx,
            template_arguments: None,
            job_constants: &job.constants,
            source_path: &job.source_path,
            enclosing_contract: None,
        }
    }

    async fn execute_job_action(
        &self,
        job: &Job,
        action: &JobAction,
        ctx: &mut ExecutionContext,
        prior: &BTreeMap<String, ActionOutcome>,
    ) -> ActionOutcome {
        if let Some(blocked) = action.depends_on.iter().find(|dep| {
            matches!(prior.get(dep.as_str()), Some(ActionOutcome::Failed { .. }))
        }) {
            return ActionOutcome::Skipped { reason: format!("sibling action `{blocked}` failed") };
        }

        if let Some(conditions) = &action.skip_condition {
            let scope = self.job_scope(job, ctx);
            match evaluate_any(conditions, &scope).await {
                Ok(true) => {
                    self.events.emit(Event::new(
                        EventKind::ActionSkipped,
                        Level::Info,
                        json!({ "job": job.name, "action": action.name }),
                    ));
                    return ActionOutcome::Skipped { reason: "skip_condition".to_string() };
                }
                Ok(false) => {}
                Err(e) => return ActionOutcome::Failed { message: e.to_string() },
            }
        }

        self.events.emit(Event::new(
            EventKind::ActionStarted,
            Level::Info,
            json!({ "job": job.name, "action": action.name }),
        ));

        let dispatch = if action.is_template_call() {
            let template_name = action.template.as_ref().expect("is_template_call checked");
            match self.templates.get(template_name) {
                Some(template) => {
                    let args = {
                        let scope = self.job_scope(job, ctx);
                        self.resolve_arguments(&action.arguments, &scope).await
                    };
                    match args {
                        Ok(args) => Box::pin(self.execute_template(template, args, ctx)).await,
                        Err(e) => Err(EngineError::Resolution {
                            job: job.name.clone(),
                            action: action.name.clone(),
                            source: e,
                        }),
                    }
                }
                None => Err(EngineError::UnknownDispatchTarget {
                    job: job.name.clone(),
                    action: action.name.clone(),
                    kind: template_name.clone(),
                }),
            }
        } else {
            let kind = action.kind.as_deref().unwrap_or_default();
            self.dispatch_primitive(kind, &action.arguments, ctx, &job.source_path, &job.constants, None)
                .await
                .map_err(|e| EngineError::Resolution { job: job.name.clone(), action: action.name.clone(), source: e })
        };

        let outputs = match dispatch {
            Ok(outputs) => outputs,
            Err(e) => {
                self.events.emit(Event::new(
                    EventKind::ActionFailed,
                    Level::Error,
                    json!({ "job": job.name, "action": action.name, "message": e.to_string() }),
                ));
                return ActionOutcome::Failed { message: e.to_string() };
            }
        };

        let filtered = apply_output_filter(&action.output, outputs);

        if self.post_check_enabled {
            if let Some(conditions) = &action.skip_condition {
                let scope = self.job_scope(job, ctx);
                if let Ok(false) = evaluate_any(conditions, &scope).await {
                    self.events.emit(Event::new(
                        EventKind::ActionPostCheckWarning,
                        Level::Warn,
                        json!({ "job": job.name, "action": action.name }),
                    ));
                }
            }
        }

        self.events.emit(Event::new(
            EventKind::ActionCompleted,
            Level::Info,
            json!({ "job": job.name, "action": action.name }),
        ));
        ActionOutcome::Success { outputs: filtered }
    }

    /// `executeTemplate(template, callArgs, ctx)` (spec §4.5).
    async fn execute_template(
        &self,
        template: &Template,
        call_args: BTreeMap<String, Resolved>,
        ctx: &mut ExecutionContext,
    ) -> Result<BTreeMap<String, Json>, EngineError> {
        let empty_constants: BTreeMap<String, Value> = BTreeMap::new();

        if let Some(setup) = &template.setup {
            let run_setup = if let Some(conditions) = &setup.skip_condition {
                let scope = Scope {
                    ctx,
                    template_arguments: Some(&call_args),
                    job_constants: &empty_constants,
                    source_path: &template.source_path,
                    enclosing_contract: None,
                };
                !evaluate_all(conditions, &scope).await.map_err(|e| EngineError::Resolution {
                    job: String::new(),
                    action: template.name.clone(),
                    source: e,
                })?
            } else {
                true
            };
            if run_setup {
                let mut setup_scope_outputs: BTreeMap<String, Json> = BTreeMap::new();
                for action in &setup.actions {
                    let outputs = self
                        .execute_template_action(template, action, ctx, &call_args, &setup_scope_outputs)
                        .await?;
                    if let Some(name) = &action.name {
                        for (k, v) in &outputs {
                            setup_scope_outputs.insert(format!("{name}.{k}"), v.clone());
                        }
                    }
                }
            }
        }

        if let Some(conditions) = &template.skip_condition {
            let scope = Scope {
                ctx,
                template_arguments: Some(&call_args),
                job_constants: &empty_constants,
                source_path: &template.source_path,
                enclosing_contract: None,
            };
            let skip = evaluate_all(conditions, &scope).await.map_err(|e| EngineError::Resolution {
                job: String::new(),
                action: template.name.clone(),
                source: e,
            })?;
            if skip {
                return Ok(BTreeMap::new());
            }
        }

        let mut main_scope_outputs: BTreeMap<String, Json> = BTreeMap::new();
        for action in &template.actions {
            let outputs = self
                .execute_template_action(template, action, ctx, &call_args, &main_scope_outputs)
                .await?;
            if let Some(name) = &action.name {
                for (k, v) in &outputs {
                    main_scope_outputs.insert(format!("{name}.{k}"), v.clone());
                }
            }
        }

        let mut returned = BTreeMap::new();
        let empty_constants = BTreeMap::new();
        for (key, value) in &template.outputs {
            let resolved = {
                // `template.outputs` expressions resolve against the template's own
                // scope; job-scoped dotted paths therein refer to the just-built
                // `main_scope_outputs`, so stage them into the context temporarily.
                let staged = stage_scope(ctx, &main_scope_outputs);
                let scope = Scope {
                    ctx: &staged,
                    template_arguments: Some(&call_args),
                    job_constants: &empty_constants,
                    source_path: &template.source_path,
                    enclosing_contract: None,
                };
                resolve_value(value, &scope).await
            };
            match resolved {
                Ok(r) => {
                    returned.insert(key.clone(), r.into_json());
                }
                Err(e) => {
                    return Err(EngineError::Resolution {
                        job: String::new(),
                        action: template.name.clone(),
                        source: e,
                    })
                }
            }
        }
        Ok(returned)
    }

    async fn execute_template_action(
        &self,
        template: &Template,
        action: &Action,
        ctx: &mut ExecutionContext,
        call_args: &BTreeMap<String, Resolved>,
        sibling_outputs: &BTreeMap<String, Json>,
    ) -> Result<BTreeMap<String, Json>, EngineError> {
        let empty_constants: BTreeMap<String, Value> = BTreeMap::new();
        if let Some(conditions) = &action.skip_condition {
            let staged = stage_scope(ctx, sibling_outputs);
            let scope = Scope {
                ctx: &staged,
                template_arguments: Some(call_args),
                job_constants: &empty_constants,
                source_path: &template.source_path,
                enclosing_contract: None,
            };
            let skip = evaluate_any(conditions, &scope).await.map_err(|e| EngineError::Resolution {
                job: String::new(),
                action: action.name.clone().unwrap_or_default(),
                source: e,
            })?;
            if skip {
                return Ok(BTreeMap::new());
            }
        }

        if let Some(nested_template) = self.templates.get(&action.kind) {
            let args = {
                let staged = stage_scope(ctx, sibling_outputs);
                let scope = Scope {
                    ctx: &staged,
                    template_arguments: Some(call_args),
                    job_constants: &empty_constants,
                    source_path: &template.source_path,
                    enclosing_contract: None,
                };
                self.resolve_arguments(&action.arguments, &scope).await.map_err(|e| EngineError::Resolution {
                    job: String::new(),
                    action: action.name.clone().unwrap_or_default(),
                    source: e,
                })?
            };
            return Box::pin(self.execute_template(nested_template, args, ctx)).await;
        }

        let outputs = {
            let staged = stage_scope(ctx, sibling_outputs);
            self.dispatch_primitive_with_template_args(
                &action.kind,
                &action.arguments,
                &staged,
                &template.source_path,
                call_args,
            )
            .await
        };
        match outputs {
            Ok(outputs) => Ok(outputs),
            Err(e) => Err(EngineError::Resolution {
                job: String::new(),
                action: action.name.clone().unwrap_or_default(),
                source: e,
            }),
        }
    }

    async fn resolve_arguments(
        &self,
        arguments: &BTreeMap<String, Value>,
        scope: &Scope<'_>,
    ) -> Result<BTreeMap<String, Resolved>, ResolverError> {
        let mut out = BTreeMap::new();
        for (name, value) in arguments {
            out.insert(name.clone(), resolve_value(value, scope).await?);
        }
        Ok(out)
    }

    async fn dispatch_primitive(
        &self,
        kind: &str,
        arguments: &BTreeMap<String, Value>,
        ctx: &mut ExecutionContext,
        source_path: &str,
        job_constants: &BTreeMap<String, Value>,
        enclosing_contract: Option<Address>,
    ) -> Result<BTreeMap<String, Json>, ResolverError> {
        let resolved = {
            let scope = Scope {
                ctx,
                template_arguments: None,
                job_constants,
                source_path,
                enclosing_contract,
            };
            self.resolve_arguments(arguments, &scope).await?
        };
        self.run_primitive(kind, resolved, ctx).await
    }

    async fn dispatch_primitive_with_template_args(
        &self,
        kind: &str,
        arguments: &BTreeMap<String, Value>,
        ctx: &ExecutionContext,
        source_path: &str,
        call_args: &BTreeMap<String, Resolved>,
    ) -> Result<BTreeMap<String, Json>, ResolverError> {
        let empty_constants: BTreeMap<String, Value> = BTreeMap::new();
        let resolved = {
            let scope = Scope {
                ctx,
                template_arguments: Some(call_args),
                job_constants: &empty_constants,
                source_path,
                enclosing_contract: None,
            };
            self.resolve_arguments(arguments, &scope).await?
        };
        // Primitives called from inside a template do not mutate `ctx`
        // (no ability to record a deployed-address mapping for `.address`
        // lookups across a `&ExecutionContext`); acceptable since a
        // template's own `outputs` map is how its caller observes results.
        self.run_primitive_readonly(kind, resolved, ctx).await
    }

    async fn run_primitive(
        &self,
        kind: &str,
        args: BTreeMap<String, Resolved>,
        ctx: &mut ExecutionContext,
    ) -> Result<BTreeMap<String, Json>, ResolverError> {
        match kind {
            "send-transaction" => {
                let to = require(&args, "to")?.as_address()?;
                let data = optional_bytes(&args, "data")?;
                let value = optional_u256(&args, "value")?;
                let receipt = ctx
                    .transport()
                    .send_transaction(to, data, value)
                    .await
                    .map_err(ResolverError::Transport)?;
                self.events.emit(Event::new(
                    EventKind::TransactionSent,
                    Level::Info,
                    json!({ "hash": receipt.hash }),
                ));
                self.events.emit(Event::new(
                    EventKind::TransactionConfirmed,
                    Level::Info,
                    json!({ "hash": receipt.hash, "blockNumber": receipt.block_number }),
                ));
                let mut out = BTreeMap::new();
                out.insert("hash".to_string(), json!(receipt.hash));
                out.insert("receipt.blockNumber".to_string(), json!(receipt.block_number));
                out.insert("receipt.status".to_string(), json!(receipt.status));
                Ok(out)
            }
            "create-contract" => {
                let bytecode = require(&args, "bytecode")?;
                let contract_hash = bytecode_hash(bytecode);
                let data = bytecode.as_bytes()?;
                let value = optional_u256(&args, "value")?;
                let receipt = ctx.transport().deploy(data, value).await.map_err(ResolverError::Transport)?;
                if let Some(hash) = contract_hash {
                    ctx.record_deployed_address(hash, receipt.address);
                }
                self.events.emit(Event::new(
                    EventKind::ContractCreated,
                    Level::Info,
                    json!({ "address": receipt.address.to_string(), "hash": receipt.hash }),
                ));
                let mut out = BTreeMap::new();
                out.insert("address".to_string(), json!(receipt.address.to_string()));
                out.insert("hash".to_string(), json!(receipt.hash));
                out.insert("blockNumber".to_string(), json!(receipt.block_number));
                Ok(out)
            }
            "min-balance" => {
                let address = require(&args, "address")?.as_address()?;
                let minimum = require(&args, "minimum")?.as_bigint()?;
                let balance = ctx.transport().balance_of(address).await.map_err(ResolverError::Transport)?;
                let balance = crate::resolver::u256_to_bigint(balance);
                let mut out = BTreeMap::new();
                out.insert("balance".to_string(), json!(balance.to_string()));
                out.insert("sufficient".to_string(), json!(balance >= minimum));
                Ok(out)
            }
            "verify-contract" => self.run_verification(&args, ctx.signer()).await,
            other => Err(ResolverError::UnknownExpression { expr: format!("unknown primitive `{other}`") }),
        }
    }

    /// Variant of [`Self::run_primitive`] usable from inside a template body,
    /// where only a shared `&ExecutionContext` is available.
    async fn run_primitive_readonly(
        &self,
        kind: &str,
        args: BTreeMap<String, Resolved>,
        ctx: &ExecutionContext,
    ) -> Result<BTreeMap<String, Json>, ResolverError> {
        match kind {
            "send-transaction" => {
                let to = require(&args, "to")?.as_address()?;
                let data = optional_bytes(&args, "data")?;
                let value = optional_u256(&args, "value")?;
                let receipt = ctx
                    .transport()
                    .send_transaction(to, data, value)
                    .await
                    .map_err(ResolverError::Transport)?;
                let mut out = BTreeMap::new();
                out.insert("hash".to_string(), json!(receipt.hash));
                out.insert("receipt.blockNumber".to_string(), json!(receipt.block_number));
                out.insert("receipt.status".to_string(), json!(receipt.status));
                Ok(out)
            }
            "create-contract" => {
                let bytecode = require(&args, "bytecode")?;
                let data = bytecode.as_bytes()?;
                let value = optional_u256(&args, "value")?;
                let receipt = ctx.transport().deploy(data, value).await.map_err(ResolverError::Transport)?;
                let mut out = BTreeMap::new();
                out.insert("address".to_string(), json!(receipt.address.to_string()));
                out.insert("hash".to_string(), json!(receipt.hash));
                out.insert("blockNumber".to_string(), json!(receipt.block_number));
                Ok(out)
            }
            "min-balance" => {
                let address = require(&args, "address")?.as_address()?;
                let minimum = require(&args, "minimum")?.as_bigint()?;
                let balance = ctx.transport().balance_of(address).await.map_err(ResolverError::Transport)?;
                let balance = crate::resolver::u256_to_bigint(balance);
                let mut out = BTreeMap::new();
                out.insert("balance".to_string(), json!(balance.to_string()));
                out.insert("sufficient".to_string(), json!(balance >= minimum));
                Ok(out)
            }
            "verify-contract" => self.run_verification(&args, ctx.signer()).await,
            other => Err(ResolverError::UnknownExpression { expr: format!("unknown primitive `{other}`") }),
        }
    }

    async fn run_verification(
        &self,
        args: &BTreeMap<String, Resolved>,
        _signer: Address,
    ) -> Result<BTreeMap<String, Json>, ResolverError> {
        let platform = match require(args, "platform")?.clone().into_json() {
            Json::String(s) => s,
            other => other.to_string(),
        };
        let address = require(args, "address")?.as_address()?;
        let contract = match require(args, "contract")? {
            Resolved::Contract(c) => c.clone(),
            other => {
                return Err(ResolverError::ArithmeticTypeMismatch {
                    message: format!("verify-contract requires a Contract reference, found {other:?}"),
                })
            }
        };
        let constructor_args = args
            .get("constructorArgs")
            .map(Resolved::as_bytes)
            .transpose()?
            .unwrap_or_default();
        let chain_id = args
            .get("chainId")
            .map(Resolved::as_bigint)
            .transpose()?
            .and_then(|n| n.to_string().parse::<u64>().ok())
            .unwrap_or_default();

        self.events.emit(Event::new(
            EventKind::VerificationStarted,
            Level::Info,
            json!({ "platform": platform, "address": address.to_string() }),
        ));

        let outcome = self
            .verification
            .verify(VerificationRequest { platform: platform.clone(), address, contract, chain_id, constructor_args })
            .await;

        let mut out = BTreeMap::new();
        match outcome {
            VerificationOutcome::Succeeded | VerificationOutcome::AlreadyVerified => {
                self.events.emit(Event::new(
                    EventKind::VerificationSucceeded,
                    Level::Info,
                    json!({ "platform": platform, "address": address.to_string() }),
                ));
                out.insert("verified".to_string(), json!(true));
                Ok(out)
            }
            VerificationOutcome::Skipped { reason } => {
                self.events.emit(Event::new(
                    EventKind::VerificationSkipped,
                    Level::Warn,
                    json!({ "platform": platform, "reason": reason }),
                ));
                out.insert("verified".to_string(), json!(false));
                out.insert("reason".to_string(), json!(reason));
                Ok(out)
            }
            VerificationOutcome::Failed { message } => {
                self.events.emit(Event::new(
                    EventKind::VerificationFailed,
                    Level::Error,
                    json!({ "platform": platform, "message": message }),
                ));
                Err(ResolverError::Abi(message))
            }
        }
    }
}

fn require<'a>(args: &'a BTreeMap<String, Resolved>, key: &str) -> Result<&'a Resolved, ResolverError> {
    args.get(key)
        .ok_or_else(|| ResolverError::UnknownIdentifier { name: format!("missing required argument `{key}`") })
}

fn optional_bytes(args: &BTreeMap<String, Resolved>, key: &str) -> Result<alloy_primitives::Bytes, ResolverError> {
    match args.get(key) {
        Some(v) => v.as_bytes(),
        None => Ok(alloy_primitives::Bytes::new()),
    }
}

fn optional_u256(args: &BTreeMap<String, Resolved>, key: &str) -> Result<U256, ResolverError> {
    match args.get(key) {
        Some(v) => Ok(crate::resolver::bigint_to_u256(&v.as_bigint()?)),
        None => Ok(U256::ZERO),
    }
}

fn bytecode_hash(resolved: &Resolved) -> Option<deployctl_artifacts::UniqueHash> {
    match resolved {
        Resolved::Bytes { contract_hash, .. } => contract_hash.clone(),
        _ => None,
    }
}

/// A read-only snapshot of `ctx` with `extra` layered into its job scope, used
/// while resolving expressions inside a template body where sibling-action
/// outputs are not yet part of the real job scope (spec §8 invariant 6,
/// "Scope isolation").
fn stage_scope(ctx: &ExecutionContext, extra: &BTreeMap<String, Json>) -> ExecutionContext {
    ctx.snapshot_with_overlay(extra)
}

async fn evaluate_condition(condition: &Condition, scope: &Scope<'_>) -> Result<bool, ResolverError> {
    match condition {
        Condition::ContractExists { contract_exists } => {
            let address = resolve_value(&contract_exists.address, scope).await?.as_address()?;
            scope.ctx.transport().has_code(address).await.map_err(ResolverError::Transport)
        }
        Condition::JobCompleted { job_completed } => {
            let prefix = format!("{}.", job_completed.job);
            Ok(scope.ctx.cross_job_scope().keys().any(|k| k.starts_with(&prefix)))
        }
        Condition::Expr(value) => resolve_value(value, scope).await?.as_bool(),
    }
}

async fn evaluate_any(conditions: &[Condition], scope: &Scope<'_>) -> Result<bool, ResolverError> {
    for condition in conditions {
        if evaluate_condition(condition, scope).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn evaluate_all(conditions: &[Condition], scope: &Scope<'_>) -> Result<bool, ResolverError> {
    for condition in conditions {
        if !evaluate_condition(condition, scope).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Apply an action's `output: bool | map<string, Value>` filter. `true`/unset
/// keeps everything; a filter map restricts to (and renames via) its keys,
/// resolved eagerly at output-write time is out of scope here — filter
/// values are matched by key identity only (spec §3, §4.6 grouping rule).
fn apply_output_filter(spec: &Option<OutputSpec>, outputs: BTreeMap<String, Json>) -> BTreeMap<String, Json> {
    match spec {
        None | Some(OutputSpec::Bool(true)) => outputs,
        Some(OutputSpec::Bool(false)) => BTreeMap::new(),
        Some(OutputSpec::Filter(filter)) => {
            outputs.into_iter().filter(|(k, _)| filter.contains_key(k)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use deployctl_artifacts::ContractRepository;
    use deployctl_config::{Condition, ConditionJob};

    use super::*;
    use crate::test_support::FakeTransport;
    use crate::verification::NullVerificationRegistry;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(ContractRepository::new()),
            Arc::new(BTreeMap::new()),
            Arc::new(FakeTransport::default()),
            Address::ZERO,
            vec!["A".to_string()],
        )
    }

    fn job_with_actions(actions: Vec<JobAction>) -> Job {
        Job {
            name: "B".to_string(),
            version: "1".to_string(),
            description: None,
            depends_on: vec!["A".to_string()],
            actions,
            only_networks: None,
            skip_networks: None,
            skip_condition: None,
            constants: BTreeMap::new(),
            deprecated: false,
            min_evm_version: None,
            source_path: "jobs/b.yaml".to_string(),
        }
    }

    #[tokio::test]
    async fn job_completed_condition_true_once_cross_job_scope_is_populated() {
        let templates = BTreeMap::new();
        let events = EventBus::new();
        let registry = NullVerificationRegistry;
        let engine = ExecutionEngine::new(&templates, &events, &registry, true);

        let mut ctx = ctx();
        let job = job_with_actions(vec![]);

        let scope = engine.job_scope(&job, &ctx);
        let not_yet = evaluate_condition(
            &Condition::JobCompleted { job_completed: ConditionJob { job: "A".to_string() } },
            &scope,
        )
        .await
        .unwrap();
        assert!(!not_yet);
        drop(scope);

        let mut outputs = BTreeMap::new();
        outputs.insert("deploy.address".to_string(), json!("0xabc"));
        ctx.record_cross_job_outputs("A", &outputs);

        let scope = engine.job_scope(&job, &ctx);
        let now = evaluate_condition(
            &Condition::JobCompleted { job_completed: ConditionJob { job: "A".to_string() } },
            &scope,
        )
        .await
        .unwrap();
        assert!(now);
    }

    #[tokio::test]
    async fn deprecated_job_is_skipped_unless_explicitly_targeted() {
        let templates = BTreeMap::new();
        let events = EventBus::new();
        let registry = NullVerificationRegistry;
        let engine = ExecutionEngine::new(&templates, &events, &registry, true);

        let mut job = job_with_actions(vec![]);
        job.deprecated = true;
        let mut ctx = ctx();

        let outcome = engine.execute_job(&job, &mut ctx, false).await;
        assert!(matches!(outcome, JobOutcome::Skipped { reason } if reason == "deprecated"));

        let outcome = engine.execute_job(&job, &mut ctx, true).await;
        assert!(!matches!(outcome, JobOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn sibling_action_dependency_skips_on_prior_failure() {
        let templates = BTreeMap::new();
        let events = EventBus::new();
        let registry = NullVerificationRegistry;
        let engine = ExecutionEngine::new(&templates, &events, &registry, true);

        let job = job_with_actions(vec![JobAction {
            name: "b".to_string(),
            template: None,
            kind: Some("send-transaction".to_string()),
            arguments: BTreeMap::new(),
            skip_condition: None,
            depends_on: vec!["a".to_string()],
            output: None,
        }]);
        let mut prior = BTreeMap::new();
        prior.insert("a".to_string(), ActionOutcome::Failed { message: "boom".to_string() });

        let mut ctx = ctx();
        let outcome = engine.execute_job_action(&job, &job.actions[0], &mut ctx, &prior).await;
        assert!(matches!(outcome, ActionOutcome::Skipped { .. }));
    }
}
