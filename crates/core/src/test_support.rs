//! In-memory `ChainTransport` fake shared by this crate's unit tests.
#![cfg(test)]

use std::sync::Mutex;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::transport::{ChainTransport, DeployReceipt, TxReceipt};

#[derive(Default)]
pub struct FakeTransport {
    pub balances: Mutex<std::collections::HashMap<Address, U256>>,
    pub code: Mutex<std::collections::HashSet<Address>>,
    pub next_deploy_address: Mutex<Address>,
    pub calls: Mutex<Vec<(Address, Bytes)>>,
}

#[async_trait]
impl ChainTransport for FakeTransport {
    async fn send_transaction(&self, _to: Address, _data: Bytes, _value: U256) -> Result<TxReceipt, String> {
        Ok(TxReceipt { hash: "0xaaaa".to_string(), block_number: 1, status: true })
    }

    async fn deploy(&self, _init_code: Bytes, _value: U256) -> Result<DeployReceipt, String> {
        let address = *self.next_deploy_address.lock().unwrap();
        Ok(DeployReceipt { address, hash: "0xbbbb".to_string(), block_number: 1 })
    }

    async fn balance_of(&self, address: Address) -> Result<U256, String> {
        Ok(self.balances.lock().unwrap().get(&address).copied().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, String> {
        self.calls.lock().unwrap().push((to, data));
        Ok(Bytes::new())
    }

    async fn has_code(&self, address: Address) -> Result<bool, String> {
        Ok(self.code.lock().unwrap().contains(&address))
    }
}
