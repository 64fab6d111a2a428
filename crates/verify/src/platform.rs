//! The per-platform seam (spec §4.5: "each platform exposes `supportsNetwork`,
//! `isConfigured`, `isAlreadyVerified`, `verifyContract`").

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use deployctl_artifacts::Contract;

use crate::error::VerifyError;

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub address: Address,
    pub contract: Contract,
    pub chain_id: u64,
    pub constructor_args: Bytes,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Matches the `platform:` name used in job documents, e.g. `etherscan_v2`.
    fn name(&self) -> &'static str;

    fn supports_network(&self, chain_id: u64) -> bool;

    fn is_configured(&self) -> bool;

    async fn is_already_verified(&self, address: Address, chain_id: u64) -> Result<bool, VerifyError>;

    async fn verify_contract(&self, request: &SubmitRequest) -> Result<(), VerifyError>;
}
