//! Common Ethereum tools backed directly by node RPC.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::utils::parse_ether;
use serde_json::{json, Map, Value};

use super::{SharedTool, Tool, ToolError, ToolOutput, ToolSchema, ValueKind};
use crate::blockchain::node_client::NodeClient;
use crate::utils::{chain_name, format_eth, format_gwei, optional_str, quantity_u256, required_arg};

/// Node clients keyed by chain id, with a fallback for unknown chains.
#[derive(Debug, Clone)]
pub struct ChainClients {
    default: NodeClient,
    by_chain: HashMap<u64, NodeClient>,
}

impl ChainClients {
    pub fn new(default: NodeClient) -> Self {
        Self {
            default,
            by_chain: HashMap::new(),
        }
    }

    /// `urls` maps decimal chain ids to RPC URLs; unparsable keys are skipped.
    pub fn from_urls(
        http: &reqwest::Client,
        default_url: &str,
        urls: &HashMap<String, String>,
    ) -> Self {
        let by_chain = urls
            .iter()
            .filter_map(|(id, url)| {
                let id = id.parse::<u64>().ok()?;
                Some((id, NodeClient::with_client(http.clone(), url.clone())))
            })
            .collect();
        Self {
            default: NodeClient::with_client(http.clone(), default_url),
            by_chain,
        }
    }

    pub fn insert(&mut self, chain_id: u64, client: NodeClient) {
        self.by_chain.insert(chain_id, client);
    }

    /// The client for `chain_id`, else chain 1, else the default node.
    pub fn for_chain(&self, chain_id: Option<u64>) -> &NodeClient {
        chain_id
            .and_then(|id| self.by_chain.get(&id))
            .or_else(|| self.by_chain.get(&1))
            .unwrap_or(&self.default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonToolKind {
    GetBalance,
    GetTransactionByHash,
    GetTransactionReceipt,
    ChainId,
    BlockNumber,
    GasPrice,
    EstimateGas,
    Call,
}

impl CommonToolKind {
    pub const ALL: [CommonToolKind; 8] = [
        CommonToolKind::GetBalance,
        CommonToolKind::GetTransactionByHash,
        CommonToolKind::GetTransactionReceipt,
        CommonToolKind::ChainId,
        CommonToolKind::BlockNumber,
        CommonToolKind::GasPrice,
        CommonToolKind::EstimateGas,
        CommonToolKind::Call,
    ];

    fn name(self) -> &'static str {
        match self {
            CommonToolKind::GetBalance => "ethGetBalance",
            CommonToolKind::GetTransactionByHash => "ethGetTransactionByHash",
            CommonToolKind::GetTransactionReceipt => "ethGetTransactionReceipt",
            CommonToolKind::ChainId => "ethChainId",
            CommonToolKind::BlockNumber => "ethBlockNumber",
            CommonToolKind::GasPrice => "ethGasPrice",
            CommonToolKind::EstimateGas => "ethEstimateGas",
            CommonToolKind::Call => "ethCall",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CommonToolKind::GetBalance => "Get the ETH balance of an address.",
            CommonToolKind::GetTransactionByHash => "Get details of a transaction by its hash.",
            CommonToolKind::GetTransactionReceipt => {
                "Get the receipt of a transaction to check if it was successful."
            }
            CommonToolKind::ChainId => "Get the chain ID of the connected network.",
            CommonToolKind::BlockNumber => "Get the latest block number.",
            CommonToolKind::GasPrice => "Get the current gas price.",
            CommonToolKind::EstimateGas => "Estimate gas for a transaction before sending it.",
            CommonToolKind::Call => {
                "Call a smart contract function without sending a transaction."
            }
        }
    }

    fn schema(self) -> ToolSchema {
        let chain = |s: ToolSchema| {
            s.optional("chainId", ValueKind::Integer, "Chain ID (defaults to Ethereum Mainnet)")
        };
        let schema = match self {
            CommonToolKind::GetBalance => {
                ToolSchema::new().required("address", ValueKind::String, "Ethereum address (0x...)")
            }
            CommonToolKind::GetTransactionByHash | CommonToolKind::GetTransactionReceipt => {
                ToolSchema::new().required("hash", ValueKind::String, "Transaction hash (0x...)")
            }
            CommonToolKind::ChainId | CommonToolKind::BlockNumber | CommonToolKind::GasPrice => {
                ToolSchema::new()
            }
            CommonToolKind::EstimateGas => ToolSchema::new()
                .required("from", ValueKind::String, "From address (0x...)")
                .required("to", ValueKind::String, "To address (0x...)")
                .optional("value", ValueKind::String, "Value to send in ETH (e.g. \"0.1\")")
                .optional("data", ValueKind::String, "Transaction data (0x...)"),
            CommonToolKind::Call => ToolSchema::new()
                .required("to", ValueKind::String, "Contract address (0x...)")
                .required("data", ValueKind::String, "Encoded function call data (0x...)")
                .optional("from", ValueKind::String, "From address (0x...)"),
        };
        chain(schema)
    }
}

pub struct CommonTool {
    kind: CommonToolKind,
    clients: ChainClients,
    schema: ToolSchema,
}

impl CommonTool {
    pub fn new(kind: CommonToolKind, clients: ChainClients) -> Self {
        Self {
            kind,
            clients,
            schema: kind.schema(),
        }
    }
}

/// The common tool set over `clients`.
pub fn common_tools(clients: &ChainClients) -> Vec<SharedTool> {
    CommonToolKind::ALL
        .iter()
        .map(|kind| Arc::new(CommonTool::new(*kind, clients.clone())) as SharedTool)
        .collect()
}

fn failed(context: &str, err: impl std::fmt::Display) -> ToolError {
    ToolError::Failed(format!("Error {}: {}", context, err))
}

/// Transaction fields shown to the model.
pub(crate) fn summarize_transaction(tx: &Value, detailed: bool) -> Value {
    let eth = |key: &str| {
        tx.get(key)
            .and_then(|v| quantity_u256(v).ok())
            .map(|wei| format!("{} ETH", format_eth(wei)))
    };
    let block_number = tx
        .get("blockNumber")
        .and_then(|v| quantity_u256(v).ok())
        .map(|n| n.to_string());

    let mut out = Map::new();
    out.insert("from".into(), tx.get("from").cloned().unwrap_or(Value::Null));
    out.insert("to".into(), tx.get("to").cloned().unwrap_or(Value::Null));
    out.insert("value".into(), json!(eth("value")));
    if detailed {
        let gas = tx.get("gas").and_then(|v| quantity_u256(v).ok()).map(|g| g.to_string());
        out.insert("gas".into(), json!(gas));
        out.insert("gasPrice".into(), json!(eth("gasPrice").unwrap_or_else(|| "N/A".into())));
    }
    out.insert("blockNumber".into(), json!(block_number));
    if detailed {
        out.insert("blockHash".into(), tx.get("blockHash").cloned().unwrap_or(Value::Null));
    }
    let status = if block_number.is_some() { "confirmed" } else { "pending" };
    out.insert("status".into(), json!(status));
    Value::Object(out)
}

pub(crate) fn summarize_receipt(receipt: &Value, detailed: bool) -> Value {
    let number = |key: &str| {
        receipt
            .get(key)
            .and_then(|v| quantity_u256(v).ok())
            .map(|n| n.to_string())
    };
    let success = receipt.get("status").and_then(Value::as_str) == Some("0x1");

    let mut out = Map::new();
    out.insert("status".into(), json!(if success { "Success" } else { "Failed" }));
    out.insert("blockNumber".into(), json!(number("blockNumber")));
    out.insert("gasUsed".into(), json!(number("gasUsed")));
    if detailed {
        let price = receipt
            .get("effectiveGasPrice")
            .and_then(|v| quantity_u256(v).ok())
            .map(|wei| format!("{} ETH", format_eth(wei)));
        out.insert("effectiveGasPrice".into(), json!(price));
    }
    out.insert("from".into(), receipt.get("from").cloned().unwrap_or(Value::Null));
    out.insert("to".into(), receipt.get("to").cloned().unwrap_or(Value::Null));
    if detailed {
        out.insert(
            "contractAddress".into(),
            receipt.get("contractAddress").cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(out)
}

#[async_trait]
impl Tool for CommonTool {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let node = self
            .clients
            .for_chain(args.get("chainId").and_then(Value::as_u64));

        match self.kind {
            CommonToolKind::GetBalance => {
                let address: String = required_arg(&args, "address")?;
                let wei = node
                    .balance(&address)
                    .await
                    .map_err(|e| failed("getting balance", e))?;
                Ok(ToolOutput::Text(format!(
                    "Balance: {} ETH ({} wei)",
                    format_eth(wei),
                    wei
                )))
            }
            CommonToolKind::GetTransactionByHash => {
                let hash: String = required_arg(&args, "hash")?;
                let tx = node
                    .transaction(&hash)
                    .await
                    .map_err(|e| failed("getting transaction", e))?
                    .ok_or_else(|| failed("getting transaction", "transaction not found"))?;
                Ok(ToolOutput::Json(summarize_transaction(&tx, true)))
            }
            CommonToolKind::GetTransactionReceipt => {
                let hash: String = required_arg(&args, "hash")?;
                let receipt = node
                    .receipt(&hash)
                    .await
                    .map_err(|e| failed("getting receipt", e))?
                    .ok_or_else(|| failed("getting receipt", "receipt not found"))?;
                Ok(ToolOutput::Json(summarize_receipt(&receipt, true)))
            }
            CommonToolKind::ChainId => {
                let id = node
                    .chain_id()
                    .await
                    .map_err(|e| failed("getting chain ID", e))?;
                Ok(ToolOutput::Text(format!("Chain ID: {} ({})", id, chain_name(id))))
            }
            CommonToolKind::BlockNumber => {
                let n = node
                    .block_number()
                    .await
                    .map_err(|e| failed("getting block number", e))?;
                Ok(ToolOutput::Text(format!("Latest block number: {}", n)))
            }
            CommonToolKind::GasPrice => {
                let wei = node
                    .gas_price()
                    .await
                    .map_err(|e| failed("getting gas price", e))?;
                Ok(ToolOutput::Text(format!(
                    "Current gas price: {} Gwei ({} wei)",
                    format_gwei(wei),
                    wei
                )))
            }
            CommonToolKind::EstimateGas => {
                let from: String = required_arg(&args, "from")?;
                let to: String = required_arg(&args, "to")?;
                let mut tx = json!({ "from": from, "to": to });
                if let Some(value) = optional_str(&args, "value") {
                    let wei = parse_ether(value).map_err(|e| failed("estimating gas", e))?;
                    tx["value"] = json!(format!("0x{:x}", wei));
                }
                if let Some(data) = optional_str(&args, "data") {
                    tx["data"] = json!(data);
                }
                let gas = node
                    .estimate_gas(tx)
                    .await
                    .map_err(|e| failed("estimating gas", e))?;
                Ok(ToolOutput::Text(format!("Estimated gas: {} units", gas)))
            }
            CommonToolKind::Call => {
                let to: String = required_arg(&args, "to")?;
                let data: String = required_arg(&args, "data")?;
                let mut tx = json!({ "to": to, "data": data });
                if let Some(from) = optional_str(&args, "from") {
                    tx["from"] = json!(from);
                }
                let result = node
                    .eth_call(tx)
                    .await
                    .map_err(|e| failed("calling contract", e))?;
                let shown = if result.is_empty() || result == "0x" {
                    "No data returned".to_string()
                } else {
                    result
                };
                Ok(ToolOutput::Text(format!("Call result: {}", shown)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_selection_falls_back_to_mainnet_then_default() {
        let mut clients = ChainClients::new(NodeClient::new("http://default"));
        assert_eq!(clients.for_chain(Some(137)).url(), "http://default");

        clients.insert(1, NodeClient::new("http://mainnet"));
        clients.insert(137, NodeClient::new("http://polygon"));
        assert_eq!(clients.for_chain(Some(137)).url(), "http://polygon");
        assert_eq!(clients.for_chain(Some(10)).url(), "http://mainnet");
        assert_eq!(clients.for_chain(None).url(), "http://mainnet");
    }

    #[test]
    fn common_tool_names_are_stable() {
        let tools = common_tools(&ChainClients::new(NodeClient::new("http://x")));
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "ethGetBalance",
                "ethGetTransactionByHash",
                "ethGetTransactionReceipt",
                "ethChainId",
                "ethBlockNumber",
                "ethGasPrice",
                "ethEstimateGas",
                "ethCall"
            ]
        );
    }

    #[test]
    fn transaction_summary_marks_pending() {
        let tx = json!({"from": "0xa", "to": "0xb", "value": "0xde0b6b3a7640000", "blockNumber": null});
        let summary = summarize_transaction(&tx, false);
        assert_eq!(summary["value"], "1.0 ETH");
        assert_eq!(summary["status"], "pending");
    }
}
