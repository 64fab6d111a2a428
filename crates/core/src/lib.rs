//! Expression resolution, execution scope, and the action-tree interpreter
//! (spec components C6, C7, C8).

pub mod abi;
pub mod context;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod transport;
pub mod verification;

#[cfg(test)]
mod test_support;

pub use context::ExecutionContext;
pub use engine::{ExecutionEngine, JobOutcome};
pub use error::{EngineError, ResolverError};
pub use resolver::{Resolved, Scope};
pub use transport::{ChainTransport, DeployReceipt, TxReceipt};
