use axum::{extract::State, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let node = if state.config.eth_node_url.is_empty() {
        "not configured"
    } else {
        "configured"
    };
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "nodeUrl": node,
    }))
}
