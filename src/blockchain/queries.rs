//! Typed reads on top of [`NodeClient`], used by the chat tools.

use ethers::types::U256;
use serde_json::{json, Value};

use super::node_client::NodeClient;
use crate::jsonrpc::protocol::RpcError;
use crate::utils::{quantity_u256, quantity_u64};

impl NodeClient {
    pub async fn balance(&self, address: &str) -> Result<U256, RpcError> {
        let raw = self.call("eth_getBalance", vec![json!(address), json!("latest")]).await?;
        quantity_u256(&raw)
    }

    pub async fn transaction_count(&self, address: &str) -> Result<u64, RpcError> {
        let raw = self
            .call("eth_getTransactionCount", vec![json!(address), json!("latest")])
            .await?;
        quantity_u64(&raw)
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        quantity_u64(&self.call("eth_chainId", vec![]).await?)
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        quantity_u64(&self.call("eth_blockNumber", vec![]).await?)
    }

    pub async fn gas_price(&self) -> Result<U256, RpcError> {
        quantity_u256(&self.call("eth_gasPrice", vec![]).await?)
    }

    /// `None` when the node does not know the hash.
    pub async fn transaction(&self, hash: &str) -> Result<Option<Value>, RpcError> {
        let raw = self.call("eth_getTransactionByHash", vec![json!(hash)]).await?;
        Ok(Some(raw).filter(|v| !v.is_null()))
    }

    pub async fn receipt(&self, hash: &str) -> Result<Option<Value>, RpcError> {
        let raw = self.call("eth_getTransactionReceipt", vec![json!(hash)]).await?;
        Ok(Some(raw).filter(|v| !v.is_null()))
    }

    pub async fn estimate_gas(&self, tx: Value) -> Result<U256, RpcError> {
        quantity_u256(&self.call("eth_estimateGas", vec![tx, json!("latest")]).await?)
    }

    pub async fn eth_call(&self, tx: Value) -> Result<String, RpcError> {
        let raw = self.call("eth_call", vec![tx, json!("latest")]).await?;
        Ok(raw.as_str().unwrap_or_default().to_string())
    }
}
