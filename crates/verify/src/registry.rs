//! Dispatches a [`deployctl_core::verification::VerificationRequest`] to the
//! named platform, retrying "not yet indexed" failures with fixed backoff and
//! folding "already verified" submissions into success (spec §4.5).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deployctl_core::verification::{VerificationOutcome, VerificationRegistry, VerificationRequest};

use crate::error::VerifyError;
use crate::platform::{Platform, SubmitRequest};

pub struct PlatformRegistry {
    platforms: HashMap<&'static str, Arc<dyn Platform>>,
    retry_attempts: u32,
    retry_delay: Duration,
    ignore_errors: bool,
    warnings: Mutex<Vec<String>>,
}

impl PlatformRegistry {
    pub fn new(platforms: Vec<Arc<dyn Platform>>, ignore_errors: bool) -> Self {
        Self::with_retry(platforms, ignore_errors, 3, Duration::from_secs(5))
    }

    pub fn with_retry(
        platforms: Vec<Arc<dyn Platform>>,
        ignore_errors: bool,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        let platforms = platforms.into_iter().map(|p| (p.name(), p)).collect();
        Self { platforms, retry_attempts, retry_delay, ignore_errors, warnings: Mutex::new(Vec::new()) }
    }

    /// Drain the warnings accumulated from `ignoreVerifyErrors`-suppressed
    /// failures; the orchestrator emits these as a single summary event
    /// once the run completes rather than per-action.
    pub fn drain_warnings(&self) -> Vec<String> {
        std::mem::take(&mut self.warnings.lock().expect("warnings mutex poisoned"))
    }

    fn record_warning(&self, message: String) {
        self.warnings.lock().expect("warnings mutex poisoned").push(message);
    }

    async fn submit_with_retry(&self, platform: &dyn Platform, request: &SubmitRequest) -> Result<(), VerifyError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match platform.verify_contract(request).await {
                Ok(()) => return Ok(()),
                Err(VerifyError::AlreadyVerified) => return Ok(()),
                Err(VerifyError::NotFound) if attempt < self.retry_attempts => {
                    tracing::debug!(attempt, "verification_retry: bytecode not yet indexed");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl VerificationRegistry for PlatformRegistry {
    async fn verify(&self, request: VerificationRequest) -> VerificationOutcome {
        let Some(platform) = self.platforms.get(request.platform.as_str()) else {
            return VerificationOutcome::Skipped {
                reason: format!("unknown verification platform `{}`", request.platform),
            };
        };

        if !platform.supports_network(request.chain_id) {
            return VerificationOutcome::Skipped {
                reason: format!("`{}` does not support chain {}", request.platform, request.chain_id),
            };
        }
        if !platform.is_configured() {
            return VerificationOutcome::Skipped {
                reason: format!("`{}` is not configured (missing API key)", request.platform),
            };
        }

        match platform.is_already_verified(request.address, request.chain_id).await {
            Ok(true) => return VerificationOutcome::AlreadyVerified,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(%err, "verification_precheck_failed");
            }
        }

        let submit = SubmitRequest {
            address: request.address,
            contract: request.contract,
            chain_id: request.chain_id,
            constructor_args: request.constructor_args,
        };

        match self.submit_with_retry(platform.as_ref(), &submit).await {
            Ok(()) => VerificationOutcome::Succeeded,
            Err(err) => {
                let message = err.to_string();
                if self.ignore_errors {
                    self.record_warning(message.clone());
                    VerificationOutcome::Skipped { reason: message }
                } else {
                    VerificationOutcome::Failed { message }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes};
    use deployctl_artifacts::Contract;

    use super::*;

    struct AlwaysNotFound;

    #[async_trait]
    impl Platform for AlwaysNotFound {
        fn name(&self) -> &'static str {
            "always_not_found"
        }
        fn supports_network(&self, _chain_id: u64) -> bool {
            true
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn is_already_verified(&self, _address: Address, _chain_id: u64) -> Result<bool, VerifyError> {
            Ok(false)
        }
        async fn verify_contract(&self, _request: &SubmitRequest) -> Result<(), VerifyError> {
            Err(VerifyError::NotFound)
        }
    }

    fn request(platform: &str) -> VerificationRequest {
        VerificationRequest {
            platform: platform.to_string(),
            address: Address::ZERO,
            contract: Contract::new("0x".to_string(), "Foo.sol".to_string()),
            chain_id: 1,
            constructor_args: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_without_ignore_errors_fail() {
        let registry = PlatformRegistry::with_retry(
            vec![Arc::new(AlwaysNotFound)],
            false,
            2,
            Duration::from_millis(1),
        );
        let outcome = registry.verify(request("always_not_found")).await;
        assert!(matches!(outcome, VerificationOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_with_ignore_errors_skip_and_warn() {
        let registry = PlatformRegistry::with_retry(
            vec![Arc::new(AlwaysNotFound)],
            true,
            2,
            Duration::from_millis(1),
        );
        let outcome = registry.verify(request("always_not_found")).await;
        assert!(matches!(outcome, VerificationOutcome::Skipped { .. }));
        assert_eq!(registry.drain_warnings().len(), 1);
    }

    #[tokio::test]
    async fn unknown_platform_is_skipped() {
        let registry = PlatformRegistry::new(vec![], false);
        let outcome = registry.verify(request("nonexistent")).await;
        assert!(matches!(outcome, VerificationOutcome::Skipped { .. }));
    }
}
