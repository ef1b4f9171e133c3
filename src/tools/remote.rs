//! Tools published by external MCP servers over streamable HTTP.
//!
//! The client speaks just enough MCP to list and call tools: `initialize`,
//! `notifications/initialized`, `tools/list` and `tools/call`. Servers may
//! answer with plain JSON or with a short SSE stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::aggregator::ToolProvider;
use super::{SharedTool, Tool, ToolError, ToolOutput, ToolSchema};
use crate::jsonrpc::protocol::RpcError;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SESSION_HEADER: &str = "mcp-session-id";
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ToolServerError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("server error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("gave up connecting to {server} after {attempts} attempts: {last}")]
    ConnectFailed {
        server: String,
        attempts: u32,
        last: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteServerConfig {
    pub name: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
    /// After a failed connect, further connects fail fast for this long.
    pub reconnect_cooldown: Duration,
}

impl RemoteServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: Vec::new(),
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            reconnect_cooldown: DEFAULT_RECONNECT_COOLDOWN,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = cooldown;
        self
    }
}

/// The Ethereum tool server.
pub fn ethereum_server(url: &str) -> RemoteServerConfig {
    RemoteServerConfig::new("ethereum", url)
}

/// Composio's hosted tool server, authenticated by API key.
pub fn composio_server(url: &str, api_key: &str) -> RemoteServerConfig {
    RemoteServerConfig::new("composio", url).header("X-API-Key", api_key)
}

pub struct McpClient {
    http: reqwest::Client,
    config: RemoteServerConfig,
    next_id: AtomicU64,
    session_id: Mutex<Option<String>>,
}

impl McpClient {
    pub fn new(http: reqwest::Client, config: RemoteServerConfig) -> Self {
        Self {
            http,
            config,
            next_id: AtomicU64::new(1),
            session_id: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub async fn initialize(&self) -> Result<Value, ToolServerError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    /// All tool definitions, following `nextCursor` pages.
    pub async fn list_tools(&self) -> Result<Vec<Value>, ToolServerError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page = self.request("tools/list", params).await?;
            if let Some(items) = page.get("tools").and_then(Value::as_array) {
                tools.extend(items.iter().cloned());
            }
            cursor = page
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolServerError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        self.request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolServerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let body = self.post(&payload).await?;
        let message = parse_message(&body, id)?;

        if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
            return Err(ToolServerError::Rpc(RpcError::from_value(error)));
        }
        message
            .get("result")
            .cloned()
            .ok_or_else(|| ToolServerError::InvalidResponse(format!("no result for {}", method)))
    }

    async fn notify(&self, method: &str) -> Result<(), ToolServerError> {
        self.post(&json!({ "jsonrpc": "2.0", "method": method }))
            .await
            .map(|_| ())
    }

    async fn post(&self, payload: &Value) -> Result<String, ToolServerError> {
        let mut request = self
            .http
            .post(&self.config.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.config.call_timeout)
            .json(payload);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(session) = self.session() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await?;
        let status = response.status();
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.set_session(session.to_string());
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ToolServerError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn session(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    fn set_session(&self, session: String) {
        if let Ok(mut slot) = self.session_id.lock() {
            *slot = Some(session);
        }
    }
}

/// Finds the JSON-RPC answer to `id` in either a JSON body or an SSE stream.
fn parse_message(body: &str, id: u64) -> Result<Value, ToolServerError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|e| ToolServerError::InvalidResponse(e.to_string()));
    }

    for frame in body.split("\n\n") {
        let data: String = frame
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        if data.is_empty() {
            continue;
        }
        if let Ok(message) = serde_json::from_str::<Value>(&data) {
            if message.get("id").and_then(Value::as_u64) == Some(id) {
                return Ok(message);
            }
        }
    }
    Err(ToolServerError::InvalidResponse(format!(
        "no response for request {}",
        id
    )))
}

/// A remote MCP server as a [`ToolProvider`]. Connects lazily, once.
struct FailedConnect {
    at: Instant,
    attempts: u32,
    last: String,
}

pub struct McpToolProvider {
    client: Arc<McpClient>,
    connected: OnceCell<()>,
    failed: Mutex<Option<FailedConnect>>,
}

impl McpToolProvider {
    pub fn new(http: reqwest::Client, config: RemoteServerConfig) -> Self {
        Self {
            client: Arc::new(McpClient::new(http, config)),
            connected: OnceCell::new(),
            failed: Mutex::new(None),
        }
    }

    fn connect_failed(&self, attempts: u32, last: String) -> ToolServerError {
        ToolServerError::ConnectFailed {
            server: self.client.name().to_string(),
            attempts,
            last,
        }
    }

    /// The last connect failure, while it is still inside the cooldown.
    fn recent_failure(&self) -> Option<ToolServerError> {
        let failed = self.failed.lock().ok()?;
        let failure = failed.as_ref()?;
        if failure.at.elapsed() < self.client.config.reconnect_cooldown {
            Some(self.connect_failed(failure.attempts, failure.last.clone()))
        } else {
            None
        }
    }

    async fn connect_once(&self) -> Result<(), ToolServerError> {
        if let Some(err) = self.recent_failure() {
            debug!(
                server = self.client.name(),
                "Tool server still cooling down after a failed connect"
            );
            return Err(err);
        }
        let result = self.connect_with_retry().await;
        if let Ok(mut failed) = self.failed.lock() {
            *failed = match &result {
                Err(ToolServerError::ConnectFailed { attempts, last, .. }) => Some(FailedConnect {
                    at: Instant::now(),
                    attempts: *attempts,
                    last: last.clone(),
                }),
                _ => None,
            };
        }
        result
    }

    async fn connect_with_retry(&self) -> Result<(), ToolServerError> {
        let retry = self.client.config.retry;
        let attempts = retry.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            match self.client.initialize().await {
                Ok(info) => {
                    info!(
                        server = self.client.name(),
                        attempt,
                        server_info = %info.get("serverInfo").cloned().unwrap_or_default(),
                        "Connected to tool server"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(server = self.client.name(), attempt, error = %e, "Tool server connect failed");
                    last = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(retry.delay).await;
                    }
                }
            }
        }

        Err(self.connect_failed(attempts, last))
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn connect(&self) -> Result<(), ToolServerError> {
        self.connected
            .get_or_try_init(|| self.connect_once())
            .await
            .map(|_| ())
    }

    async fn tools(&self) -> Result<Vec<SharedTool>, ToolServerError> {
        self.connect().await?;
        let definitions = self.client.list_tools().await?;
        debug!(server = self.client.name(), count = definitions.len(), "Listed remote tools");

        Ok(definitions
            .iter()
            .filter_map(|def| {
                let name = def.get("name").and_then(Value::as_str)?;
                let tool = RemoteTool {
                    client: self.client.clone(),
                    name: name.to_string(),
                    description: def
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    schema: ToolSchema::from_json_schema(
                        def.get("inputSchema").unwrap_or(&Value::Null),
                    ),
                };
                Some(Arc::new(tool) as SharedTool)
            })
            .collect())
    }
}

pub struct RemoteTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    schema: ToolSchema,
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let result = self
            .client
            .call_tool(&self.name, args)
            .await
            .map_err(|e| ToolError::Failed(format!("Error calling {}: {}", self.name, e)))?;

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(ToolError::Failed(format!("Error calling {}: {}", self.name, text)));
        }
        if text.is_empty() {
            if let Some(structured) = result.get("structuredContent") {
                return Ok(ToolOutput::Json(structured.clone()));
            }
        }
        Ok(ToolOutput::Text(text))
    }
}
