//! # MCP Handler Module
//!
//! Serves the registry tools over the Model Context Protocol, on stdio and
//! on `POST /mcp`.
//!
//! ## Methods
//! - `initialize` - server info and capabilities
//! - `tools/list` - every registry tool with its input schema
//! - `tools/call` - validate, execute, and return text content
//! - `ping`

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::jsonrpc::protocol::{error_codes, Request, Response};
use crate::tools::{self, ToolOutput};
use crate::AppState;

pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Returns `None` for notifications.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!(method = %req.method, "Handling MCP request");

    if req.is_notification() {
        debug!(method = %req.method, "Ignoring notification");
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "ping" => Response::success(req.id.clone(), json!({})),
        "tools/list" => handle_tools_list(&req, &state),
        "tools/call" => handle_tool_call(req, state).await,
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

// Always carries a text content array; structured output is kept alongside
// for JSON-friendly clients.
fn make_texty_result(output: ToolOutput) -> Value {
    let content = json!([{ "type": "text", "text": output.to_text() }]);
    match output {
        ToolOutput::Json(structured) => json!({
            "content": content,
            "structuredContent": structured,
        }),
        ToolOutput::Text(_) => json!({ "content": content }),
    }
}

fn handle_initialize(req: &Request) -> Response {
    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "instructions": "Ethereum JSON-RPC methods exposed as tools. Arguments mirror the node API.",
        }),
    )
}

fn handle_tools_list(req: &Request, state: &AppState) -> Response {
    let tools: Vec<Value> = state
        .api_tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "inputSchema": tool.schema().to_json_schema(),
            })
        })
        .collect();
    Response::success(req.id.clone(), json!({ "tools": tools }))
}

async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let Some(params) = req.params.as_ref() else {
        return Response::error(
            req.id,
            error_codes::INVALID_PARAMS,
            "Missing 'params' object".into(),
        );
    };

    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return Response::error(
            req.id,
            error_codes::INVALID_PARAMS,
            "Missing 'name' field in params".into(),
        );
    };

    let Some(tool) = state.api_tools.iter().find(|t| t.name() == name) else {
        return Response::error(
            req.id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Unknown tool: {}", name),
        );
    };

    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let output = tools::invoke(tool.as_ref(), args).await;
    Response::success(req.id.clone(), make_texty_result(output))
}
