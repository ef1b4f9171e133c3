// src/blockchain/methods.rs

use serde::Serialize;

/// Grouping used by the method listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wallet,
    Accounts,
    Signing,
    Chain,
    Blocks,
    State,
    Filters,
    Utility,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Wallet,
        Category::Accounts,
        Category::Signing,
        Category::Chain,
        Category::Blocks,
        Category::State,
        Category::Filters,
        Category::Utility,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Wallet => "wallet",
            Category::Accounts => "accounts",
            Category::Signing => "signing",
            Category::Chain => "chain",
            Category::Blocks => "blocks",
            Category::State => "state",
            Category::Filters => "filters",
            Category::Utility => "utility",
        }
    }
}

/// Every JSON-RPC method with a typed handler. Anything else is forwarded
/// to the node untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    WalletAddEthereumChain,
    WalletSwitchEthereumChain,
    WalletWatchAsset,
    WalletRequestPermissions,
    WalletGetPermissions,
    WalletRevokePermissions,

    Accounts,
    RequestAccounts,
    SendTransaction,
    SendRawTransaction,
    GetTransactionByHash,
    GetTransactionReceipt,
    GetTransactionCount,
    GetTransactionByBlockHashAndIndex,
    GetTransactionByBlockNumberAndIndex,
    EstimateGas,

    PersonalSign,
    SignTypedDataV4,
    Decrypt,
    GetEncryptionPublicKey,

    ChainId,
    BlockNumber,
    Syncing,
    Coinbase,
    GasPrice,
    FeeHistory,

    GetBlockByHash,
    GetBlockByNumber,
    GetBlockTransactionCountByHash,
    GetBlockTransactionCountByNumber,
    GetUncleCountByBlockHash,
    GetUncleCountByBlockNumber,

    GetBalance,
    GetStorageAt,
    GetCode,
    GetProof,
    Call,
    GetLogs,

    NewFilter,
    NewBlockFilter,
    NewPendingTransactionFilter,
    GetFilterChanges,
    GetFilterLogs,
    UninstallFilter,
    Subscribe,
    Unsubscribe,

    ClientVersion,
    Sha3,
    NetVersion,
    NetListening,
    NetPeerCount,
}

use Category::*;
use MethodKind::*;

const TABLE: &[(MethodKind, &str, Category)] = &[
    (WalletAddEthereumChain, "wallet_addEthereumChain", Wallet),
    (WalletSwitchEthereumChain, "wallet_switchEthereumChain", Wallet),
    (WalletWatchAsset, "wallet_watchAsset", Wallet),
    (WalletRequestPermissions, "wallet_requestPermissions", Wallet),
    (WalletGetPermissions, "wallet_getPermissions", Wallet),
    (WalletRevokePermissions, "wallet_revokePermissions", Wallet),
    (MethodKind::Accounts, "eth_accounts", Category::Accounts),
    (RequestAccounts, "eth_requestAccounts", Category::Accounts),
    (SendTransaction, "eth_sendTransaction", Category::Accounts),
    (SendRawTransaction, "eth_sendRawTransaction", Category::Accounts),
    (GetTransactionByHash, "eth_getTransactionByHash", Category::Accounts),
    (GetTransactionReceipt, "eth_getTransactionReceipt", Category::Accounts),
    (GetTransactionCount, "eth_getTransactionCount", Category::Accounts),
    (GetTransactionByBlockHashAndIndex, "eth_getTransactionByBlockHashAndIndex", Category::Accounts),
    (GetTransactionByBlockNumberAndIndex, "eth_getTransactionByBlockNumberAndIndex", Category::Accounts),
    (EstimateGas, "eth_estimateGas", Category::Accounts),
    (PersonalSign, "personal_sign", Signing),
    (SignTypedDataV4, "eth_signTypedData_v4", Signing),
    (Decrypt, "eth_decrypt", Signing),
    (GetEncryptionPublicKey, "eth_getEncryptionPublicKey", Signing),
    (ChainId, "eth_chainId", Chain),
    (BlockNumber, "eth_blockNumber", Chain),
    (Syncing, "eth_syncing", Chain),
    (Coinbase, "eth_coinbase", Chain),
    (GasPrice, "eth_gasPrice", Chain),
    (FeeHistory, "eth_feeHistory", Chain),
    (GetBlockByHash, "eth_getBlockByHash", Blocks),
    (GetBlockByNumber, "eth_getBlockByNumber", Blocks),
    (GetBlockTransactionCountByHash, "eth_getBlockTransactionCountByHash", Blocks),
    (GetBlockTransactionCountByNumber, "eth_getBlockTransactionCountByNumber", Blocks),
    (GetUncleCountByBlockHash, "eth_getUncleCountByBlockHash", Blocks),
    (GetUncleCountByBlockNumber, "eth_getUncleCountByBlockNumber", Blocks),
    (GetBalance, "eth_getBalance", State),
    (GetStorageAt, "eth_getStorageAt", State),
    (GetCode, "eth_getCode", State),
    (GetProof, "eth_getProof", State),
    (Call, "eth_call", State),
    (GetLogs, "eth_getLogs", State),
    (NewFilter, "eth_newFilter", Filters),
    (NewBlockFilter, "eth_newBlockFilter", Filters),
    (NewPendingTransactionFilter, "eth_newPendingTransactionFilter", Filters),
    (GetFilterChanges, "eth_getFilterChanges", Filters),
    (GetFilterLogs, "eth_getFilterLogs", Filters),
    (UninstallFilter, "eth_uninstallFilter", Filters),
    (Subscribe, "eth_subscribe", Filters),
    (Unsubscribe, "eth_unsubscribe", Filters),
    (ClientVersion, "web3_clientVersion", Utility),
    (Sha3, "web3_sha3", Utility),
    (NetVersion, "net_version", Utility),
    (NetListening, "net_listening", Utility),
    (NetPeerCount, "net_peerCount", Utility),
];

impl MethodKind {
    pub fn from_name(name: &str) -> Option<MethodKind> {
        TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(kind, _, _)| *kind)
    }

    pub fn all() -> impl Iterator<Item = MethodKind> {
        TABLE.iter().map(|(kind, _, _)| *kind)
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn category(self) -> Category {
        self.entry().2
    }

    fn entry(self) -> &'static (MethodKind, &'static str, Category) {
        // Every variant has exactly one row; checked by the tests below.
        TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .unwrap_or(&TABLE[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for kind in MethodKind::all() {
            assert!(seen.insert(kind.name()), "duplicate {}", kind.name());
            assert_eq!(MethodKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(seen.len(), 51);
    }

    #[test]
    fn each_variant_has_its_own_row() {
        let kinds: HashSet<_> = MethodKind::all().collect();
        assert_eq!(kinds.len(), TABLE.len());
        assert_eq!(MethodKind::GetBalance.category(), Category::State);
        assert_eq!(MethodKind::WalletWatchAsset.category(), Category::Wallet);
        assert_eq!(MethodKind::NetPeerCount.name(), "net_peerCount");
    }

    #[test]
    fn unknown_names_are_not_typed() {
        assert_eq!(MethodKind::from_name("debug_traceTransaction"), None);
    }
}
