//! The verification-platform seam the engine dispatches into for the
//! `verify-contract` primitive (spec §4.5 "Verification"). `deployctl-verify`
//! provides the registry implementation; kept here (rather than there) so
//! `deployctl-core` has no dependency on it.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use deployctl_artifacts::Contract;

#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub platform: String,
    pub address: Address,
    pub contract: Contract,
    pub chain_id: u64,
    pub constructor_args: Bytes,
}

#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Succeeded,
    AlreadyVerified,
    Skipped { reason: String },
    Failed { message: String },
}

#[async_trait]
pub trait VerificationRegistry: Send + Sync {
    async fn verify(&self, request: VerificationRequest) -> VerificationOutcome;
}

/// A registry with no configured platforms; every request is skipped. Used
/// where the orchestrator is not given a real registry (e.g. `dry-run`).
#[derive(Debug, Default)]
pub struct NullVerificationRegistry;

#[async_trait]
impl VerificationRegistry for NullVerificationRegistry {
    async fn verify(&self, request: VerificationRequest) -> VerificationOutcome {
        VerificationOutcome::Skipped { reason: format!("no verification platform configured for `{}`", request.platform) }
    }
}
