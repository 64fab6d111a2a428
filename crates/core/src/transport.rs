//! The chain transport seam (spec §1 "OUT OF SCOPE: the concrete Ethereum
//! RPC/signing transport"). `deployctl-core` only depends on this trait; a
//! real `alloy-provider`-backed implementation and tests' in-memory fake both
//! satisfy it.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub hash: String,
    pub block_number: u64,
    pub status: bool,
}

#[derive(Debug, Clone)]
pub struct DeployReceipt {
    pub address: Address,
    pub hash: String,
    pub block_number: u64,
}

/// Everything the engine needs from a live chain connection. Every method
/// suspends on I/O (spec §4.4 "Purity").
#[async_trait]
pub trait ChainTransport: Send + Sync {
    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TxReceipt, String>;

    async fn deploy(&self, init_code: Bytes, value: U256) -> Result<DeployReceipt, String>;

    async fn balance_of(&self, address: Address) -> Result<U256, String>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, String>;

    async fn has_code(&self, address: Address) -> Result<bool, String>;

    /// Release any underlying connection. Called exactly once by
    /// `ExecutionContext::dispose`.
    async fn close(&self) -> Result<(), String> {
        Ok(())
    }
}
