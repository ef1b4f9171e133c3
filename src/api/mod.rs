//! # API Module
//!
//! HTTP surface of the gateway.
//!
//! ## Endpoints
//! - `GET /health` - liveness and whether a node URL is configured
//! - `POST /jsonrpc` - one JSON-RPC 2.0 request against the Ethereum node
//! - `POST /jsonrpc/batch` - a batch of requests, answered in order
//! - `GET /methods` - the typed methods, flat and by category
//! - `POST /agent/chat` - an agent turn streamed as SSE
//! - `POST /mcp` - the registry tools over MCP
//!
//! Unknown paths answer 404 with a JSON-RPC style error body.

use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::jsonrpc::protocol::error_codes;
use crate::AppState;

pub mod chat;
pub mod health;
pub mod jsonrpc;
pub mod mcp;
pub mod methods;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/jsonrpc", post(jsonrpc::jsonrpc_handler))
        .route("/jsonrpc/batch", post(jsonrpc::jsonrpc_batch_handler))
        .route("/methods", get(methods::list_methods_handler))
        .route("/agent/chat", post(chat::chat_handler))
        .route("/mcp", post(mcp::mcp_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": error_codes::METHOD_NOT_FOUND,
                "message": "Method not found",
                "data": { "path": uri.path() },
            }
        })),
    )
}
