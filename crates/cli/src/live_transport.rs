//! A concrete `ChainTransport` backed by `alloy-provider`. Spec §1 marks the
//! "concrete Ethereum RPC/signing transport" explicitly out of scope; this is
//! the minimal real backend needed to make `deployctl run` actually run
//! something, in the same spirit as `forge-script`'s broadcast backend.

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use deployctl_core::{ChainTransport, DeployReceipt, TxReceipt};
use deployctl_orchestrator::{OrchestratorError, TransportFactory};

pub struct AlloyTransportFactory {
    pub signer: PrivateKeySigner,
}

#[async_trait]
impl TransportFactory for AlloyTransportFactory {
    async fn build(
        &self,
        network: &deployctl_config::Network,
        _signer: Address,
    ) -> Result<std::sync::Arc<dyn ChainTransport>, OrchestratorError> {
        let url = network.rpc_url.parse().map_err(|err| OrchestratorError::TransportInit {
            network: network.name.clone(),
            message: format!("invalid RPC URL: {err}"),
        })?;
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new().wallet(wallet).on_http(url);
        Ok(std::sync::Arc::new(AlloyTransport { provider: Box::new(provider) }))
    }
}

struct AlloyTransport {
    provider: Box<dyn Provider + Send + Sync>,
}

#[async_trait]
impl ChainTransport for AlloyTransport {
    async fn send_transaction(&self, to: Address, data: Bytes, value: U256) -> Result<TxReceipt, String> {
        let tx = TransactionRequest::default().with_to(to).with_input(data).with_value(value);
        let pending = self.provider.send_transaction(tx).await.map_err(|e| e.to_string())?;
        let receipt = pending.get_receipt().await.map_err(|e| e.to_string())?;
        Ok(TxReceipt {
            hash: format!("{:?}", receipt.transaction_hash),
            block_number: receipt.block_number.unwrap_or_default(),
            status: receipt.status(),
        })
    }

    async fn deploy(&self, init_code: Bytes, value: U256) -> Result<DeployReceipt, String> {
        let tx = TransactionRequest::default().with_deploy_code(init_code).with_value(value);
        let pending = self.provider.send_transaction(tx).await.map_err(|e| e.to_string())?;
        let receipt = pending.get_receipt().await.map_err(|e| e.to_string())?;
        let address = receipt.contract_address.ok_or_else(|| "deployment receipt has no contract address".to_string())?;
        Ok(DeployReceipt {
            address,
            hash: format!("{:?}", receipt.transaction_hash),
            block_number: receipt.block_number.unwrap_or_default(),
        })
    }

    async fn balance_of(&self, address: Address) -> Result<U256, String> {
        self.provider.get_balance(address).await.map_err(|e| e.to_string())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, String> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider.call(&tx).await.map_err(|e| e.to_string())
    }

    async fn has_code(&self, address: Address) -> Result<bool, String> {
        let code = self.provider.get_code_at(address).await.map_err(|e| e.to_string())?;
        Ok(!code.is_empty())
    }
}
