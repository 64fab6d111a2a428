//! Sourcify, a keyless verification platform (<https://sourcify.dev>); any
//! chain it has a repository for is "supported", and it is always
//! "configured" since there is no API key to check.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::VerifyError;
use crate::platform::{Platform, SubmitRequest};

const BASE_URL: &str = "https://sourcify.dev/server";

pub struct Sourcify {
    client: reqwest::Client,
    supported_chains: Vec<u64>,
}

impl Sourcify {
    pub fn new(supported_chains: Vec<u64>) -> Self {
        Self { client: reqwest::Client::new(), supported_chains }
    }
}

#[derive(Debug, Deserialize)]
struct SourcifyCheckEntry {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourcifySubmitResponse {
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl Platform for Sourcify {
    fn name(&self) -> &'static str {
        "sourcify"
    }

    fn supports_network(&self, chain_id: u64) -> bool {
        self.supported_chains.is_empty() || self.supported_chains.contains(&chain_id)
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn is_already_verified(&self, address: Address, chain_id: u64) -> Result<bool, VerifyError> {
        let url = format!("{BASE_URL}/check-all-by-addresses");
        let resp = self
            .client
            .get(url)
            .query(&[("addresses", format!("{address:?}")), ("chainIds", chain_id.to_string())])
            .send()
            .await
            .map_err(|err| VerifyError::Http(err.to_string()))?;

        let entries: Vec<SourcifyCheckEntry> =
            resp.json().await.map_err(|err| VerifyError::Http(err.to_string()))?;

        Ok(entries.iter().any(|entry| matches!(entry.status.as_deref(), Some("perfect") | Some("partial"))))
    }

    async fn verify_contract(&self, request: &SubmitRequest) -> Result<(), VerifyError> {
        let source = request.contract.source.clone().unwrap_or_default();
        let contract_name = request.contract.contract_name.clone().unwrap_or_default();

        let body = serde_json::json!({
            "address": format!("{:?}", request.address),
            "chain": request.chain_id.to_string(),
            "files": { format!("{contract_name}.sol"): source },
        });

        let resp = self
            .client
            .post(format!("{BASE_URL}/"))
            .json(&body)
            .send()
            .await
            .map_err(|err| VerifyError::Http(err.to_string()))?;

        if resp.status().as_u16() == 409 {
            return Err(VerifyError::AlreadyVerified);
        }
        if resp.status().as_u16() == 404 {
            return Err(VerifyError::NotFound);
        }
        if !resp.status().is_success() {
            let parsed: SourcifySubmitResponse =
                resp.json().await.unwrap_or(SourcifySubmitResponse { error: None });
            return Err(VerifyError::UnexpectedResponse(
                parsed.error.unwrap_or_else(|| "sourcify submission failed".to_string()),
            ));
        }
        Ok(())
    }
}
