//! Typed handlers behind the JSON-RPC dispatcher.
//!
//! Read-only and state methods are forwarded to the node with their
//! defaults filled in. Wallet methods that would open a wallet prompt in a
//! browser are validated and answered locally.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::methods::MethodKind;
use super::node_client::NodeClient;
use crate::jsonrpc::protocol::RpcError;

const LATEST: &str = "latest";
const PERMISSION_INVOKER: &str = "https://example.com";

#[derive(Debug, Clone)]
pub struct EthereumProvider {
    node: NodeClient,
    default_accounts: Vec<String>,
}

impl EthereumProvider {
    pub fn new(node: NodeClient, default_accounts: Vec<String>) -> Self {
        Self {
            node,
            default_accounts,
        }
    }

    pub fn node(&self) -> &NodeClient {
        &self.node
    }

    /// Forwards a method without a typed handler as-is.
    pub async fn passthrough(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.node.call(method, params).await
    }

    pub async fn invoke(&self, kind: MethodKind, params: &[Value]) -> Result<Value, RpcError> {
        use MethodKind::*;

        let method = kind.name();
        let p = |i: usize| arg(params, i);

        match kind {
            WalletAddEthereumChain => add_ethereum_chain(p(0)),
            WalletSwitchEthereumChain => {
                switch_ethereum_chain(p(0).and_then(|v| v.get("chainId")))
            }
            WalletWatchAsset => watch_asset(p(0)),
            WalletRequestPermissions => Ok(json!([{
                "parentCapability": "eth_accounts",
                "invoker": PERMISSION_INVOKER,
                "caveats": []
            }])),
            WalletGetPermissions => Ok(json!([])),
            WalletRevokePermissions => Ok(Value::Null),

            RequestAccounts => Ok(json!(self.default_accounts)),

            // Zero-argument reads
            Accounts | ChainId | BlockNumber | Syncing | Coinbase | GasPrice | NewBlockFilter
            | NewPendingTransactionFilter | ClientVersion | NetVersion | NetListening
            | NetPeerCount => self.node.call(method, vec![]).await,

            // Single positional argument
            SendTransaction | SendRawTransaction | GetTransactionByHash | GetTransactionReceipt
            | GetEncryptionPublicKey | GetBlockTransactionCountByHash
            | GetBlockTransactionCountByNumber | GetUncleCountByBlockHash
            | GetUncleCountByBlockNumber | GetFilterChanges | GetFilterLogs | UninstallFilter
            | Unsubscribe | Sha3 => self.forward(method, vec![required(params, 0)]).await,

            // Two positional arguments
            GetTransactionByBlockHashAndIndex | GetTransactionByBlockNumberAndIndex
            | PersonalSign | SignTypedDataV4 | Decrypt => {
                self.forward(method, vec![required(params, 0), required(params, 1)]).await
            }

            GetTransactionCount | GetBalance | GetCode => {
                self.forward(method, vec![required(params, 0), or_latest(p(1))]).await
            }
            EstimateGas | Call => {
                self.forward(method, vec![required(params, 0), or_latest(p(1))]).await
            }
            GetStorageAt => {
                let forwarded = vec![required(params, 0), required(params, 1), or_latest(p(2))];
                self.forward(method, forwarded).await
            }
            GetProof => {
                let keys = p(1).cloned().unwrap_or_else(|| json!([]));
                self.forward(method, vec![required(params, 0), keys, or_latest(p(2))])
                    .await
            }

            FeeHistory => {
                let block_count = quantity_hex(p(0))?;
                let percentiles = p(2).cloned().unwrap_or_else(|| json!([]));
                self.forward(method, vec![json!(block_count), or_latest(p(1)), percentiles])
                    .await
            }

            GetBlockByHash => {
                self.forward(method, vec![required(params, 0), or_false(p(1))]).await
            }
            GetBlockByNumber => self.forward(method, vec![or_latest(p(0)), or_false(p(1))]).await,

            GetLogs | NewFilter => {
                let filter = p(0).cloned().unwrap_or_else(|| json!({}));
                self.forward(method, vec![filter]).await
            }

            Subscribe => {
                let mut forwarded = vec![required(params, 0)];
                if let Some(filter) = p(1) {
                    forwarded.push(filter.clone());
                }
                self.forward(method, forwarded).await
            }
        }
    }

    async fn forward(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        debug!(method, params = ?params, "Forwarding typed method to node");
        self.node.call(method, params).await
    }
}

/// Positional argument `i` for defaulted positions, treating `null`,
/// `false`, `""` and `0` as absent.
fn arg(params: &[Value], i: usize) -> Option<&Value> {
    params.get(i).filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })
}

/// Required positions go to the node exactly as sent; only a missing one becomes `null`.
fn required(params: &[Value], i: usize) -> Value {
    params.get(i).cloned().unwrap_or(Value::Null)
}

fn or_latest(value: Option<&Value>) -> Value {
    value.cloned().unwrap_or_else(|| json!(LATEST))
}

fn or_false(value: Option<&Value>) -> Value {
    value.cloned().unwrap_or(Value::Bool(false))
}

/// Block counts arrive as hex strings or plain numbers; the node wants a hex quantity.
fn quantity_hex(value: Option<&Value>) -> Result<String, RpcError> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => u64::from_str_radix(s.trim_start_matches("0x"), 16).ok(),
        _ => None,
    };
    parsed
        .map(|n| format!("0x{:x}", n))
        .ok_or_else(|| RpcError::invalid_params("Invalid block count"))
}

fn add_ethereum_chain(params: Option<&Value>) -> Result<Value, RpcError> {
    let params = params.cloned().unwrap_or(Value::Null);
    for field in ["chainId", "chainName", "rpcUrls"] {
        if params.get(field).map_or(true, Value::is_null) {
            return Err(RpcError::invalid_params(format!(
                "Missing required field: {}",
                field
            )));
        }
    }
    info!(chain_id = %params["chainId"], "Simulated wallet_addEthereumChain");
    Ok(Value::Null)
}

fn switch_ethereum_chain(chain_id: Option<&Value>) -> Result<Value, RpcError> {
    match chain_id.and_then(Value::as_str) {
        Some(id) if id.starts_with("0x") => {
            info!(chain_id = id, "Simulated wallet_switchEthereumChain");
            Ok(Value::Null)
        }
        _ => Err(RpcError::invalid_params("Invalid chain ID format")),
    }
}

fn watch_asset(params: Option<&Value>) -> Result<Value, RpcError> {
    let params = params.cloned().unwrap_or(Value::Null);
    let has_type = params.get("type").map_or(false, |t| !t.is_null());
    let has_address = params
        .get("options")
        .and_then(|o| o.get("address"))
        .map_or(false, |a| !a.is_null());
    if !has_type || !has_address {
        return Err(RpcError::invalid_params("Missing required parameters"));
    }
    Ok(Value::Bool(true))
}
