//! `POST /jsonrpc` and `POST /jsonrpc/batch`.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::jsonrpc::protocol::{error_codes, Response as RpcResponse};
use crate::AppState;

/// Bodies that are not JSON still get a JSON-RPC envelope, with a null id.
fn parse_body(body: &Bytes) -> Result<Value, RpcResponse> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejected unparsable JSON-RPC body");
        RpcResponse::error_with_data(
            Value::Null,
            error_codes::PARSE_ERROR,
            "Parse error".into(),
            json!(e.to_string()),
        )
    })
}

fn batch_rejection(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": {
                "code": error_codes::INVALID_REQUEST,
                "message": message,
            }
        })),
    )
        .into_response()
}

pub async fn jsonrpc_handler(State(state): State<AppState>, body: Bytes) -> Json<RpcResponse> {
    match parse_body(&body) {
        Ok(raw) => Json(state.dispatcher.dispatch(raw).await),
        Err(parse_error) => Json(parse_error),
    }
}

pub async fn jsonrpc_batch_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = match parse_body(&body) {
        Ok(raw) => raw,
        Err(parse_error) => return Json(parse_error).into_response(),
    };
    let Value::Array(entries) = raw else {
        return batch_rejection("Invalid Request: expected array for batch");
    };
    if entries.is_empty() {
        return batch_rejection("Invalid Request: empty batch");
    }
    Json(state.dispatcher.dispatch_batch(entries).await).into_response()
}
