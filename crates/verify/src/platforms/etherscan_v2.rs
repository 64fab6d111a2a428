//! Etherscan's unified multi-chain v2 API (one key, `chainid` query param
//! selects the network). <https://docs.etherscan.io/v2-migration>

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::VerifyError;
use crate::platform::{Platform, SubmitRequest};

const BASE_URL: &str = "https://api.etherscan.io/v2/api";

pub struct EtherscanV2 {
    client: reqwest::Client,
    api_key: Option<String>,
    supported_chains: Vec<u64>,
}

impl EtherscanV2 {
    pub fn new(api_key: Option<String>, supported_chains: Vec<u64>) -> Self {
        Self { client: reqwest::Client::new(), api_key, supported_chains }
    }

    fn key(&self) -> Result<&str, VerifyError> {
        self.api_key.as_deref().ok_or_else(|| VerifyError::NotConfigured(self.name().to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct EtherscanEnvelope {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[async_trait]
impl Platform for EtherscanV2 {
    fn name(&self) -> &'static str {
        "etherscan_v2"
    }

    fn supports_network(&self, chain_id: u64) -> bool {
        self.supported_chains.is_empty() || self.supported_chains.contains(&chain_id)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn is_already_verified(&self, address: Address, chain_id: u64) -> Result<bool, VerifyError> {
        let key = self.key()?;
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("chainid", chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "getabi".to_string()),
                ("address", format!("{address:?}")),
                ("apikey", key.to_string()),
            ])
            .send()
            .await
            .map_err(|err| VerifyError::Http(err.to_string()))?;

        let envelope: EtherscanEnvelope =
            resp.json().await.map_err(|err| VerifyError::Http(err.to_string()))?;

        Ok(envelope.status == "1")
    }

    async fn verify_contract(&self, request: &SubmitRequest) -> Result<(), VerifyError> {
        let key = self.key()?;
        let source = request.contract.source.clone().unwrap_or_default();
        let contract_name = request.contract.contract_name.clone().unwrap_or_default();
        let source_name = request.contract.source_name.clone().unwrap_or_default();

        let params = [
            ("chainid", request.chain_id.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("apikey", key.to_string()),
            ("contractaddress", format!("{:?}", request.address)),
            ("sourceCode", source),
            ("contractname", format!("{source_name}:{contract_name}")),
            ("constructorArguements", hex::encode(&request.constructor_args)),
            ("codeformat", "solidity-single-file".to_string()),
        ];

        let resp = self
            .client
            .post(BASE_URL)
            .form(&params)
            .send()
            .await
            .map_err(|err| VerifyError::Http(err.to_string()))?;

        let envelope: EtherscanEnvelope =
            resp.json().await.map_err(|err| VerifyError::Http(err.to_string()))?;

        if envelope.status == "1" {
            return Ok(());
        }

        let message = envelope.message.to_ascii_lowercase();
        if message.contains("already verified") {
            return Err(VerifyError::AlreadyVerified);
        }
        if message.contains("unable to locate") || message.contains("does not have bytecode") {
            return Err(VerifyError::NotFound);
        }
        Err(VerifyError::UnexpectedResponse(envelope.message))
    }
}
