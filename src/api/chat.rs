//! `POST /agent/chat`: one agent turn streamed as server-sent events.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::{AgentEvent, ChatMessage, FocusMode, OptimizationMode, TurnRequest};
use crate::tools::wallet::WalletContext;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub focus_mode: FocusMode,
    #[serde(default)]
    pub optimization_mode: OptimizationMode,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub system_instructions: String,
    #[serde(default)]
    pub wallet: Option<WalletContext>,
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let turn = TurnRequest {
        message: req.message,
        history: req.history,
        focus_mode: req.focus_mode,
        optimization_mode: req.optimization_mode,
        file_ids: req.files,
        system_instructions: req.system_instructions,
        wallet: req.wallet,
        tools: Vec::new(),
    };

    // Tools are gathered inside the stream; keep-alives cover slow tool servers.
    let events = stream::once(start_turn(state, turn)).flatten().map(|event| {
        let sse = Event::default()
            .json_data(event.to_wire())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to encode agent event");
                Event::default().data(r#"{"type":"error","data":"encoding failed"}"#)
            });
        Ok::<_, Infallible>(sse)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn start_turn(
    state: AppState,
    mut turn: TurnRequest,
) -> impl Stream<Item = AgentEvent> + Send + 'static {
    if turn.focus_mode.uses_tools() {
        turn.tools = state.turn_tools(turn.wallet.as_ref()).await;
    }
    info!(focus_mode = ?turn.focus_mode, tools = turn.tools.len(), "Chat turn started");
    state.orchestrator.run(turn)
}
