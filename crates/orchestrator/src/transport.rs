//! The seam between the orchestrator and the out-of-scope concrete RPC/signing
//! transport (spec §1). `deployctl-cli` supplies a real implementation backed
//! by `alloy-provider`; tests supply an in-memory fake.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use deployctl_config::Network;
use deployctl_core::ChainTransport;

use crate::error::OrchestratorError;

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn build(&self, network: &Network, signer: Address) -> Result<Arc<dyn ChainTransport>, OrchestratorError>;
}
