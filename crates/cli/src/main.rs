mod cli;
mod live_transport;

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use cli::{Cli, Command};
use deployctl_config::ProjectLoader;
use deployctl_core::verification::{NullVerificationRegistry, VerificationRegistry};
use deployctl_events::EventBus;
use deployctl_graph::DependencyGraph;
use deployctl_orchestrator::{Deployer, RunOptions};
use deployctl_verify::{EtherscanV2, PlatformRegistry, Sourcify};
use eyre::{eyre, Context};
use live_transport::AlloyTransportFactory;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            jobs,
            network,
            private_key,
            etherscan_api_key,
            fail_early,
            flat_output,
            no_post_check_conditions,
            run_deprecated,
            ignore_verify_errors,
        } => {
            run(
                &cli.root,
                jobs,
                network,
                private_key,
                etherscan_api_key,
                fail_early,
                flat_output,
                !no_post_check_conditions,
                run_deprecated,
                ignore_verify_errors,
            )
            .await
        }
        Command::DryRun | Command::Validate => dry_run(&cli.root).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    root: &std::path::Path,
    jobs: Vec<String>,
    network: Vec<String>,
    private_key: Option<String>,
    etherscan_api_key: Option<String>,
    fail_early: bool,
    flat_output: bool,
    post_check_enabled: bool,
    run_deprecated: bool,
    ignore_verify_errors: bool,
) -> eyre::Result<()> {
    let project = ProjectLoader::default()
        .load(root, |name| std::env::var(name).ok())
        .wrap_err("failed to load project")?;
    for warning in &project.warnings {
        tracing::warn!(%warning, "project_load_warning");
    }

    let graph = DependencyGraph::build(&project.jobs, &project.templates).wrap_err("dependency graph construction failed")?;

    let private_key = private_key.ok_or_else(|| eyre!("--private-key (or PRIVATE_KEY) is required to run"))?;
    let signer = PrivateKeySigner::from_str(private_key.trim_start_matches("0x"))
        .wrap_err("failed to parse --private-key")?;
    let signer_address: Address = signer.address();

    let registry: Box<dyn VerificationRegistry> = match &etherscan_api_key {
        Some(key) => {
            let chains: Vec<u64> = project.networks.iter().map(|n| n.chain_id).collect();
            Box::new(PlatformRegistry::new(
                vec![
                    Arc::new(EtherscanV2::new(Some(key.clone()), chains.clone())),
                    Arc::new(Sourcify::new(chains)),
                ],
                ignore_verify_errors,
            ))
        }
        None => Box::new(NullVerificationRegistry),
    };

    let events = EventBus::new();
    let transports = AlloyTransportFactory { signer };
    let options = RunOptions {
        job_selectors: jobs,
        network_selectors: network,
        fail_early,
        flat_output,
        post_check_enabled,
        run_deprecated,
        signer: signer_address,
    };

    let deployer = Deployer { project: &project, graph: &graph, events: &events, verification: registry.as_ref(), transports: &transports };
    let summary = deployer.run(&options, root).await.wrap_err("run failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

async fn dry_run(root: &std::path::Path) -> eyre::Result<()> {
    let project = ProjectLoader::default()
        .load(root, |name| std::env::var(name).ok())
        .wrap_err("failed to load project")?;
    let _graph = DependencyGraph::build(&project.jobs, &project.templates).wrap_err("dependency graph construction failed")?;

    let report = deployctl_orchestrator::validate(&project).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
