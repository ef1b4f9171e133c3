//! JSON-RPC 2.0 dispatcher over the Ethereum provider.
//!
//! Stateless per call: validate the envelope, resolve the method to a typed
//! handler (or forward it raw), then package the result or error.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::protocol::{error_codes, Response, RpcError};
use crate::blockchain::methods::{Category, MethodKind};
use crate::blockchain::provider::EthereumProvider;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    provider: EthereumProvider,
}

/// Body of `GET /methods`.
#[derive(Debug, Clone, Serialize)]
pub struct MethodListing {
    pub total: usize,
    pub methods: Vec<&'static str>,
    pub categorized: BTreeMap<&'static str, Vec<&'static str>>,
}

impl Dispatcher {
    pub fn new(provider: EthereumProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &EthereumProvider {
        &self.provider
    }

    /// Handles one envelope. Always yields a response carrying the request id
    /// (or `null` when it could not be read).
    pub async fn dispatch(&self, raw: Value) -> Response {
        let id = raw.get("id").cloned().unwrap_or(Value::Null);

        if !raw.is_object() {
            return Response::error(id, error_codes::INVALID_REQUEST, "Invalid Request".into());
        }
        if raw.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Response::error(
                id,
                error_codes::INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"".into(),
            );
        }
        let method = match raw.get("method").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => {
                return Response::error(
                    id,
                    error_codes::INVALID_REQUEST,
                    "Invalid Request: method is required".into(),
                )
            }
        };
        let params = match normalize_params(raw.get("params")) {
            Ok(params) => params,
            Err(e) => return Response::failure(id, e),
        };

        info!(method = %method, "Dispatching JSON-RPC request");

        match MethodKind::from_name(&method) {
            Some(kind) => match self.provider.invoke(kind, &params).await {
                Ok(result) => Response::success(id, result),
                Err(e) => {
                    debug!(method = %method, code = e.code, error = %e.message, "Handler failed");
                    Response::failure(id, e)
                }
            },
            None => match self.provider.passthrough(&method, params).await {
                Ok(result) => Response::success(id, result),
                Err(e) => {
                    warn!(method = %method, error = %e, "Passthrough failed");
                    Response::error_with_data(
                        id,
                        error_codes::METHOD_NOT_FOUND,
                        format!("Method not found: {}", method),
                        serde_json::to_value(&e).unwrap_or(Value::Null),
                    )
                }
            },
        }
    }

    /// Handles every entry concurrently; the output has the same length and
    /// order as the input.
    pub async fn dispatch_batch(&self, requests: Vec<Value>) -> Vec<Response> {
        info!(count = requests.len(), "Dispatching JSON-RPC batch");
        join_all(requests.into_iter().map(|raw| self.dispatch(raw))).await
    }

    pub fn method_listing() -> MethodListing {
        let mut methods: Vec<&'static str> = MethodKind::all().map(MethodKind::name).collect();
        methods.sort_unstable();

        let mut categorized: BTreeMap<&'static str, Vec<&'static str>> = Category::ALL
            .iter()
            .map(|c| (c.as_str(), Vec::new()))
            .collect();
        for kind in MethodKind::all() {
            categorized
                .entry(kind.category().as_str())
                .or_default()
                .push(kind.name());
        }

        MethodListing {
            total: methods.len(),
            methods,
            categorized,
        }
    }
}

/// `params` may be omitted, a positional array, or a single by-name object
/// (passed through as the first positional argument).
fn normalize_params(params: Option<&Value>) -> Result<Vec<Value>, RpcError> {
    match params {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(obj @ Value::Object(_)) => Ok(vec![obj.clone()]),
        Some(_) => Err(RpcError::invalid_params(
            "Invalid params: expected array or object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::node_client::NodeClient;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(EthereumProvider::new(
            NodeClient::new("http://127.0.0.1:9"),
            vec![],
        ))
    }

    #[tokio::test]
    async fn rejects_wrong_or_missing_version() {
        for raw in [
            json!({"jsonrpc": "1.0", "id": 1, "method": "eth_chainId"}),
            json!({"id": 2, "method": "eth_chainId"}),
        ] {
            let resp = dispatcher().dispatch(raw.clone()).await;
            assert_eq!(resp.id, raw["id"]);
            assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);
            assert!(resp.result.is_none());
        }
    }

    #[tokio::test]
    async fn rejects_missing_method() {
        let resp = dispatcher().dispatch(json!({"jsonrpc": "2.0", "id": "x"})).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, error_codes::INVALID_REQUEST);
        assert_eq!(err.message, "Invalid Request: method is required");
    }

    #[tokio::test]
    async fn local_handlers_answer_without_a_node() {
        let resp = dispatcher()
            .dispatch(json!({"jsonrpc": "2.0", "id": 5, "method": "wallet_getPermissions"}))
            .await;
        assert_eq!(resp, Response::success(json!(5), json!([])));
    }

    #[test]
    fn params_normalization() {
        assert!(normalize_params(None).unwrap().is_empty());
        assert_eq!(normalize_params(Some(&json!({"a": 1}))).unwrap(), vec![json!({"a": 1})]);
        assert_eq!(
            normalize_params(Some(&json!("x"))).unwrap_err().code,
            error_codes::INVALID_PARAMS
        );
    }

    #[test]
    fn listing_puts_each_method_in_one_category() {
        let listing = Dispatcher::method_listing();
        assert_eq!(listing.total, listing.methods.len());
        let categorized: usize = listing.categorized.values().map(Vec::len).sum();
        assert_eq!(categorized, listing.total);
        assert!(listing.methods.windows(2).all(|w| w[0] <= w[1]));
        assert!(listing.categorized["wallet"].contains(&"wallet_watchAsset"));
    }
}
