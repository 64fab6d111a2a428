//! Turns a loaded project into per-(job, network) executions (spec
//! component C9, §4.6).

pub mod deployer;
pub mod error;
pub mod output;
pub mod plan;
pub mod result_store;
pub mod transport;
pub mod validate;

pub use deployer::{Deployer, RunOptions};
pub use error::OrchestratorError;
pub use output::{KeyContract, RunSummary};
pub use plan::{select_jobs, select_networks, JobPlan, NetworkPlan};
pub use result_store::{JobNetworkOutcome, ResultStore};
pub use transport::TransportFactory;
pub use validate::{validate, ValidationIssue, ValidationReport};
