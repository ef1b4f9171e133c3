use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::jsonrpc::protocol::Request;
use crate::mcp::handler::handle_mcp_request;
use crate::AppState;

/// MCP over plain HTTP. Notifications are acknowledged with 202 and no body.
pub async fn mcp_handler(State(state): State<AppState>, Json(req): Json<Request>) -> impl IntoResponse {
    match handle_mcp_request(req, state).await {
        Some(resp) => (StatusCode::OK, Json(resp)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
