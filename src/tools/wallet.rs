//! Tools bound to the caller's connected wallet.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ethereum::{summarize_receipt, summarize_transaction};
use super::{SharedTool, Tool, ToolError, ToolOutput, ToolSchema, ValueKind};
use crate::blockchain::node_client::NodeClient;
use crate::utils::{chain_name, format_eth, format_gwei, required_arg};

/// The wallet a chat turn is acting for. Lives for one orchestration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletContext {
    pub address: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalletToolKind {
    MyWalletBalance,
    MyTransactionCount,
    MyChainInfo,
    CurrentGasPrice,
    AddressBalance,
    Transaction,
    TransactionReceipt,
    MyWalletSummary,
}

const KINDS: [WalletToolKind; 8] = [
    WalletToolKind::MyWalletBalance,
    WalletToolKind::MyTransactionCount,
    WalletToolKind::MyChainInfo,
    WalletToolKind::CurrentGasPrice,
    WalletToolKind::AddressBalance,
    WalletToolKind::Transaction,
    WalletToolKind::TransactionReceipt,
    WalletToolKind::MyWalletSummary,
];

pub struct WalletTool {
    kind: WalletToolKind,
    wallet: Arc<WalletContext>,
    node: NodeClient,
    description: String,
    schema: ToolSchema,
}

/// The wallet-aware tool set. `node` must point at the wallet's chain.
pub fn wallet_tools(wallet: WalletContext, node: NodeClient) -> Vec<SharedTool> {
    let wallet = Arc::new(wallet);
    KINDS
        .iter()
        .map(|kind| {
            Arc::new(WalletTool::new(*kind, wallet.clone(), node.clone())) as SharedTool
        })
        .collect()
}

impl WalletTool {
    fn new(kind: WalletToolKind, wallet: Arc<WalletContext>, node: NodeClient) -> Self {
        use WalletToolKind::*;

        let description = match kind {
            MyWalletBalance => format!(
                "Get the ETH balance of your connected wallet ({}). Returns balance in ETH.",
                wallet.address
            ),
            MyTransactionCount => format!(
                "Get the number of transactions sent from your wallet ({}). This is also known as the nonce.",
                wallet.address
            ),
            MyChainInfo => {
                "Get information about the blockchain network you are currently connected to".into()
            }
            CurrentGasPrice => "Get the current gas price on the network in Gwei".into(),
            AddressBalance => {
                "Get the ETH balance of any Ethereum address. Useful for checking other wallets or contracts.".into()
            }
            Transaction => "Get details of a transaction by its hash".into(),
            TransactionReceipt => {
                "Get the receipt of a transaction to check if it was successful".into()
            }
            MyWalletSummary => {
                "Get a complete summary of your wallet including balance, transactions, and network info".into()
            }
        };
        let schema = match kind {
            AddressBalance => ToolSchema::new().required(
                "address",
                ValueKind::String,
                "The Ethereum address to check (0x...)",
            ),
            Transaction | TransactionReceipt => {
                ToolSchema::new().required("hash", ValueKind::String, "The transaction hash (0x...)")
            }
            _ => ToolSchema::new(),
        };

        Self {
            kind,
            wallet,
            node,
            description,
            schema,
        }
    }
}

fn failed(context: &str, err: impl std::fmt::Display) -> ToolError {
    ToolError::Failed(format!("Error {}: {}", context, err))
}

#[async_trait]
impl Tool for WalletTool {
    fn name(&self) -> &str {
        match self.kind {
            WalletToolKind::MyWalletBalance => "getMyWalletBalance",
            WalletToolKind::MyTransactionCount => "getMyTransactionCount",
            WalletToolKind::MyChainInfo => "getMyChainInfo",
            WalletToolKind::CurrentGasPrice => "getCurrentGasPrice",
            WalletToolKind::AddressBalance => "getAddressBalance",
            WalletToolKind::Transaction => "getTransaction",
            WalletToolKind::TransactionReceipt => "getTransactionReceipt",
            WalletToolKind::MyWalletSummary => "getMyWalletSummary",
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let address = self.wallet.address.as_str();
        let node = &self.node;

        match self.kind {
            WalletToolKind::MyWalletBalance => {
                let wei = node
                    .balance(address)
                    .await
                    .map_err(|e| failed("getting balance", e))?;
                let eth = format_eth(wei);
                let as_float: f64 = eth.parse().unwrap_or_default();
                Ok(ToolOutput::Json(json!({
                    "address": address,
                    "balance": eth,
                    "balanceFormatted": format!("{:.4} ETH", as_float),
                    "chainId": self.wallet.chain_id,
                })))
            }
            WalletToolKind::MyTransactionCount => {
                let count = node
                    .transaction_count(address)
                    .await
                    .map_err(|e| failed("getting transaction count", e))?;
                Ok(ToolOutput::Text(format!(
                    "Your wallet has sent {} transactions",
                    count
                )))
            }
            WalletToolKind::MyChainInfo => {
                let (chain_id, block) = futures::try_join!(node.chain_id(), node.block_number())
                    .map_err(|e| failed("getting chain info", e))?;
                Ok(ToolOutput::Json(json!({
                    "chainId": chain_id,
                    "chainName": chain_name(chain_id),
                    "latestBlock": block.to_string(),
                    "connectedWallet": address,
                })))
            }
            WalletToolKind::CurrentGasPrice => {
                let wei = node
                    .gas_price()
                    .await
                    .map_err(|e| failed("getting gas price", e))?;
                Ok(ToolOutput::Text(format!(
                    "Current gas price: {} Gwei",
                    format_gwei(wei)
                )))
            }
            WalletToolKind::AddressBalance => {
                let other: String = required_arg(&args, "address")?;
                let wei = node
                    .balance(&other)
                    .await
                    .map_err(|e| failed("getting balance", e))?;
                Ok(ToolOutput::Text(format!(
                    "Balance of {}: {} ETH",
                    other,
                    format_eth(wei)
                )))
            }
            WalletToolKind::Transaction => {
                let hash: String = required_arg(&args, "hash")?;
                let tx = node
                    .transaction(&hash)
                    .await
                    .map_err(|e| failed("getting transaction", e))?
                    .ok_or_else(|| failed("getting transaction", "transaction not found"))?;
                Ok(ToolOutput::Json(summarize_transaction(&tx, false)))
            }
            WalletToolKind::TransactionReceipt => {
                let hash: String = required_arg(&args, "hash")?;
                let receipt = node
                    .receipt(&hash)
                    .await
                    .map_err(|e| failed("getting receipt", e))?
                    .ok_or_else(|| failed("getting receipt", "receipt not found"))?;
                Ok(ToolOutput::Json(summarize_receipt(&receipt, false)))
            }
            WalletToolKind::MyWalletSummary => {
                let (balance, tx_count, chain_id, block, gas_price) = futures::try_join!(
                    node.balance(address),
                    node.transaction_count(address),
                    node.chain_id(),
                    node.block_number(),
                    node.gas_price()
                )
                .map_err(|e| failed("getting wallet summary", e))?;
                Ok(ToolOutput::Json(json!({
                    "wallet": {
                        "address": address,
                        "balance": format!("{} ETH", format_eth(balance)),
                        "transactionCount": tx_count,
                    },
                    "network": {
                        "chainId": chain_id,
                        "chainName": chain_name(chain_id),
                        "latestBlock": block.to_string(),
                        "gasPrice": format!("{} Gwei", format_gwei(gas_price)),
                    }
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_mention_the_wallet() {
        let tools = wallet_tools(
            WalletContext {
                address: "0xfeed".into(),
                chain_id: 1,
            },
            NodeClient::new("http://x"),
        );
        assert_eq!(tools.len(), 8);
        let balance = tools.iter().find(|t| t.name() == "getMyWalletBalance").unwrap();
        assert!(balance.description().contains("0xfeed"));
        assert!(tools.iter().any(|t| t.name() == "getMyWalletSummary"));
    }
}
