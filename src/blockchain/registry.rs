//! Static table of the REST-style wallet/node API.
//!
//! Each [`MethodDescriptor`] says how a named operation maps onto an HTTP
//! request: verb, path template, where each argument goes and what the body
//! looks like. The registry is built once and only read afterwards.

use std::collections::HashMap;

use serde::Serialize;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
}

impl ParamSpec {
    pub fn new(name: &str, location: ParamLocation, required: bool) -> Self {
        Self {
            name: name.to_string(),
            location,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub name: String,
    pub description: String,
    pub http_method: HttpMethod,
    pub path_template: String,
    pub parameters: Vec<ParamSpec>,
    /// Set when the operation takes a request body.
    pub body_content_type: Option<String>,
    pub base_url: Option<String>,
}

impl MethodDescriptor {
    pub fn takes_body(&self) -> bool {
        self.body_content_type.is_some()
    }

    pub fn params_in(&self, location: ParamLocation) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.iter().filter(move |p| p.location == location)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown method: {0}")]
    NotFound(String),
    #[error("Duplicate method name: {0}")]
    Duplicate(String),
    #[error("Placeholder {{{placeholder}}} in {method} has no matching path parameter")]
    MissingPathParam { method: String, placeholder: String },
}

#[derive(Debug, Clone)]
pub struct MethodRegistry {
    entries: Vec<MethodDescriptor>,
    index: HashMap<String, usize>,
}

impl MethodRegistry {
    /// Builds a registry, rejecting duplicate names and templates whose
    /// placeholders are not backed by a `path` parameter.
    pub fn new(entries: Vec<MethodDescriptor>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            for placeholder in placeholders(&entry.path_template) {
                let backed = entry
                    .params_in(ParamLocation::Path)
                    .any(|p| p.name == placeholder);
                if !backed {
                    return Err(RegistryError::MissingPathParam {
                        method: entry.name.clone(),
                        placeholder: placeholder.to_string(),
                    });
                }
            }
            if index.insert(entry.name.clone(), i).is_some() {
                return Err(RegistryError::Duplicate(entry.name.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    /// The wallet and node API surface, every entry pointing at `base_url`.
    pub fn builtin(base_url: &str) -> Result<Self, RegistryError> {
        Self::new(builtin_descriptors(base_url))
    }

    pub fn lookup(&self, name: &str) -> Result<&MethodDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Names of the `{placeholder}` segments of a path template, in order.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                out.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    out
}

const JSON: &str = "application/json";

fn descriptor(
    base_url: &str,
    name: &str,
    description: &str,
    http_method: HttpMethod,
    path: &str,
    query: &[(&str, bool)],
    body: bool,
) -> MethodDescriptor {
    MethodDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        http_method,
        path_template: path.to_string(),
        parameters: query
            .iter()
            .map(|(n, required)| ParamSpec::new(n, ParamLocation::Query, *required))
            .collect(),
        body_content_type: body.then(|| JSON.to_string()),
        base_url: Some(base_url.to_string()),
    }
}

fn builtin_descriptors(base: &str) -> Vec<MethodDescriptor> {
    use HttpMethod::{Delete, Get, Post};

    let get = |name: &'static str, desc: &'static str, path: &'static str, query: &[(&str, bool)]| {
        descriptor(base, name, desc, Get, path, query, false)
    };
    let post = |name: &'static str, desc: &'static str, path: &'static str, body: bool| {
        descriptor(base, name, desc, Post, path, &[], body)
    };

    vec![
        // Wallet
        post("walletAddEthereumChain", "Add Ethereum Chain", "/wallet/addEthereumChain", true),
        post("walletSwitchEthereumChain", "Switch Ethereum Chain", "/wallet/switchEthereumChain", true),
        post("walletWatchAsset", "Watch Asset", "/wallet/watchAsset", true),
        post("walletRequestPermissions", "Request Permissions", "/wallet/requestPermissions", true),
        get("walletGetPermissions", "Get Permissions", "/wallet/getPermissions", &[]),
        post("walletRevokePermissions", "Revoke Permissions", "/wallet/revokePermissions", true),
        post("walletSendCalls", "Send Batched Calls", "/wallet/sendCalls", true),
        post("walletGetCallsStatus", "Get Calls Status", "/wallet/getCallsStatus", true),
        get("walletGetCapabilities", "Get Wallet Capabilities", "/wallet/getCapabilities", &[]),
        // Accounts and transactions
        post("ethRequestAccounts", "Request Accounts", "/eth/requestAccounts", false),
        get("ethAccounts", "Get Accounts", "/eth/accounts", &[]),
        post("ethSendTransaction", "Send Transaction", "/eth/sendTransaction", true),
        post("ethSendRawTransaction", "Send Raw Transaction", "/eth/sendRawTransaction", true),
        get("ethGetTransactionByHash", "Get Transaction by Hash", "/eth/getTransactionByHash", &[("hash", true)]),
        get("ethGetTransactionReceipt", "Get Transaction Receipt", "/eth/getTransactionReceipt", &[("hash", true)]),
        get(
            "ethGetTransactionCount",
            "Get Transaction Count",
            "/eth/getTransactionCount",
            &[("address", true), ("block", false)],
        ),
        post("ethEstimateGas", "Estimate Gas", "/eth/estimateGas", true),
        // Signing
        post("personalSign", "Personal Sign", "/eth/personalSign", true),
        post("ethSignTypedDataV4", "Sign Typed Data V4", "/eth/signTypedDataV4", true),
        post("ethDecrypt", "Decrypt (Deprecated)", "/eth/decrypt", true),
        post(
            "ethGetEncryptionPublicKey",
            "Get Encryption Public Key (Deprecated)",
            "/eth/getEncryptionPublicKey",
            true,
        ),
        // Chain
        get("ethChainId", "Get Chain ID", "/eth/chainId", &[]),
        get("ethBlockNumber", "Get Block Number", "/eth/blockNumber", &[]),
        get("ethSyncing", "Get Syncing Status", "/eth/syncing", &[]),
        get("ethCoinbase", "Get Coinbase", "/eth/coinbase", &[]),
        get("ethGasPrice", "Get Gas Price", "/eth/gasPrice", &[]),
        get(
            "ethFeeHistory",
            "Get Fee History",
            "/eth/feeHistory",
            &[("blockCount", true), ("newestBlock", false), ("rewardPercentiles", false)],
        ),
        // Blocks
        get(
            "ethGetBlockByHash",
            "Get Block by Hash",
            "/eth/getBlockByHash",
            &[("hash", true), ("fullTransactions", false)],
        ),
        get(
            "ethGetBlockByNumber",
            "Get Block by Number",
            "/eth/getBlockByNumber",
            &[("blockNumber", false), ("fullTransactions", false)],
        ),
        get(
            "ethGetBlockTransactionCountByHash",
            "Get Block Transaction Count by Hash",
            "/eth/getBlockTransactionCountByHash",
            &[("hash", true)],
        ),
        get(
            "ethGetBlockTransactionCountByNumber",
            "Get Block Transaction Count by Number",
            "/eth/getBlockTransactionCountByNumber",
            &[("blockNumber", true)],
        ),
        get(
            "ethGetUncleCountByBlockHash",
            "Get Uncle Count by Block Hash",
            "/eth/getUncleCountByBlockHash",
            &[("hash", true)],
        ),
        get(
            "ethGetUncleCountByBlockNumber",
            "Get Uncle Count by Block Number",
            "/eth/getUncleCountByBlockNumber",
            &[("blockNumber", true)],
        ),
        // State
        get("ethGetBalance", "Get Balance", "/eth/getBalance", &[("address", true), ("block", false)]),
        get(
            "ethGetStorageAt",
            "Get Storage At",
            "/eth/getStorageAt",
            &[("address", true), ("position", true), ("block", false)],
        ),
        get("ethGetCode", "Get Code", "/eth/getCode", &[("address", true), ("block", false)]),
        get(
            "ethGetProof",
            "Get Proof",
            "/eth/getProof",
            &[("address", true), ("storageKeys", false), ("block", false)],
        ),
        post("ethCall", "Call", "/eth/call", true),
        post("ethGetLogs", "Get Logs", "/eth/getLogs", true),
        // Filters and subscriptions
        post("ethNewFilter", "New Filter", "/eth/newFilter", true),
        post("ethNewBlockFilter", "New Block Filter", "/eth/newBlockFilter", false),
        post(
            "ethNewPendingTransactionFilter",
            "New Pending Transaction Filter",
            "/eth/newPendingTransactionFilter",
            false,
        ),
        get("ethGetFilterChanges", "Get Filter Changes", "/eth/getFilterChanges", &[("filterId", true)]),
        get("ethGetFilterLogs", "Get Filter Logs", "/eth/getFilterLogs", &[("filterId", true)]),
        descriptor(
            base,
            "ethUninstallFilter",
            "Uninstall Filter",
            Delete,
            "/eth/uninstallFilter",
            &[("filterId", true)],
            false,
        ),
        post("ethSubscribe", "Subscribe", "/eth/subscribe", true),
        post("ethUnsubscribe", "Unsubscribe", "/eth/unsubscribe", true),
        // Utility
        get("web3ClientVersion", "Get Client Version", "/web3/clientVersion", &[]),
        post("jsonRpc", "Generic JSON-RPC", "/jsonrpc", true),
    ]
}
