use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deployctl", version, about = "Declarative EVM multi-network deployment engine")]
pub struct Cli {
    /// Project root directory (defaults to the current directory).
    #[arg(long, global = true, default_value = ".")]
    pub root: std::path::PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute the deployment plan against one or more networks.
    Run {
        /// Job name or glob selectors; omit to run every job.
        jobs: Vec<String>,

        /// Network chainId or name selectors; omit to target every configured network.
        #[arg(long = "network", num_args = 0..)]
        network: Vec<String>,

        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,

        #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
        etherscan_api_key: Option<String>,

        #[arg(long)]
        fail_early: bool,

        #[arg(long)]
        flat_output: bool,

        #[arg(long)]
        no_post_check_conditions: bool,

        #[arg(long)]
        run_deprecated: bool,

        /// Collect verification failures into a warnings report instead of
        /// failing the action that requested verification (spec §4.5/§7).
        #[arg(long)]
        ignore_verify_errors: bool,
    },
    /// Load the project, build the dependency graph, and resolve every
    /// action's arguments without touching the network or writing outputs.
    DryRun,
    /// Alias for `dry-run`.
    Validate,
}
