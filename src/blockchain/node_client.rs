//! Raw JSON-RPC 2.0 client for an upstream Ethereum node.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::jsonrpc::protocol::{error_codes, RpcError};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const BATCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcCall {
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcCall {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// One entry of a batch answer, serialized as `{"result": ..}` or `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Result(Value),
    Error(RpcError),
}

/// Clones share the request-id counter, so ids stay unique per node client.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
    call_timeout: Duration,
    batch_timeout: Duration,
}

impl NodeClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            call_timeout: CALL_TIMEOUT,
            batch_timeout: BATCH_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, call: Duration, batch: Duration) -> Self {
        self.call_timeout = call;
        self.batch_timeout = batch;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reserves `count` consecutive ids and returns the first one.
    fn reserve_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.reserve_ids(1);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(id, method, url = %self.url, "Node RPC call");

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(self.transport_error(e)),
            Err(_) if !status.is_success() => return Err(server_error(status.as_u16())),
            Err(e) => return Err(RpcError::internal(e.to_string())),
        };

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            return Err(RpcError::from_value(error));
        }
        if !status.is_success() {
            return Err(server_error(status.as_u16()));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Sends all calls as one JSON-RPC batch. Answers are paired with calls
    /// by id; entries without a usable id fill the remaining slots in order.
    pub async fn batch_call(&self, calls: &[RpcCall]) -> Result<Vec<BatchOutcome>, RpcError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let first_id = self.reserve_ids(calls.len() as u64);
        let payload: Vec<Value> = calls
            .iter()
            .enumerate()
            .map(|(i, call)| {
                json!({
                    "jsonrpc": "2.0",
                    "id": first_id + i as u64,
                    "method": call.method,
                    "params": call.params,
                })
            })
            .collect();
        debug!(first_id, count = calls.len(), url = %self.url, "Node RPC batch");

        let batch_failed = |cause: String| {
            RpcError::with_data(error_codes::INTERNAL_ERROR, "Batch request failed", json!(cause))
        };

        let body: Value = self
            .http
            .post(&self.url)
            .json(&payload)
            .timeout(self.batch_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.transport_error(e)
                } else {
                    batch_failed(e.to_string())
                }
            })?;

        let entries = match body {
            Value::Array(entries) => entries,
            other => {
                if let Some(error) = other.get("error").filter(|e| !e.is_null()) {
                    return Err(RpcError::from_value(error));
                }
                return Err(batch_failed(other.to_string()));
            }
        };

        let mut by_id: HashMap<u64, Value> = HashMap::new();
        let mut anonymous: VecDeque<Value> = VecDeque::new();
        for entry in entries {
            match entry.get("id").and_then(Value::as_u64) {
                Some(id) if id >= first_id && id < first_id + calls.len() as u64 => {
                    by_id.insert(id, entry);
                }
                _ => anonymous.push_back(entry),
            }
        }
        if !anonymous.is_empty() {
            warn!(count = anonymous.len(), "Batch entries without a matching id, pairing by position");
        }

        let outcomes = (0..calls.len() as u64)
            .map(|offset| {
                let entry = by_id
                    .remove(&(first_id + offset))
                    .or_else(|| anonymous.pop_front());
                match entry {
                    Some(entry) => outcome_of(&entry),
                    None => BatchOutcome::Error(RpcError::internal("Missing response for batch item")),
                }
            })
            .collect();

        Ok(outcomes)
    }

    fn transport_error(&self, error: reqwest::Error) -> RpcError {
        if error.is_timeout() || error.is_connect() {
            warn!(url = %self.url, %error, "No response from node");
            RpcError::with_data(
                error_codes::NO_RESPONSE,
                "No response from node",
                json!({ "url": self.url }),
            )
        } else {
            RpcError::internal(error.to_string())
        }
    }
}

fn outcome_of(entry: &Value) -> BatchOutcome {
    match entry.get("error").filter(|e| !e.is_null()) {
        Some(error) => BatchOutcome::Error(RpcError::from_value(error)),
        None => BatchOutcome::Result(entry.get("result").cloned().unwrap_or(Value::Null)),
    }
}

fn server_error(status: u16) -> RpcError {
    RpcError::with_data(
        error_codes::INTERNAL_ERROR,
        "Server error",
        json!({ "status": status }),
    )
}
