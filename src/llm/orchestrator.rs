//! The agent turn: one user message in, a stream of [`AgentEvent`]s out.
//!
//! Without tools a turn is a single streamed completion. With tools the
//! model is called repeatedly; every step either answers in text (the turn
//! ends) or asks for tool calls, which run concurrently and are fed back
//! by call id before the next step. Iteration and wall-clock budgets cut a
//! runaway loop short with a notice.
//!
//! Each turn ends with exactly one terminal event: [`AgentEvent::Ended`] or
//! [`AgentEvent::Error`]. Dropping the stream cancels the turn at its next
//! emitted event.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::prompts::{system_prompt, FocusMode, OptimizationMode};
use super::{openai_tool_spec, ChatMessage, ChatModel, ModelChunk, ModelRequest, ToolCall};
use crate::tools::wallet::WalletContext;
use crate::tools::{self, SharedTool};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ResponseDelta(String),
    ToolStarted { name: String },
    Ended,
    Error { message: String },
}

/// What goes over the wire to the chat client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireEvent {
    Response { data: String },
    End,
    Error { data: String },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Ended | AgentEvent::Error { .. })
    }

    pub fn to_wire(&self) -> WireEvent {
        match self {
            AgentEvent::ResponseDelta(text) => WireEvent::Response { data: text.clone() },
            AgentEvent::ToolStarted { name } => WireEvent::Response {
                data: format!("\n\n🔧 Using tool: `{}`\n", name),
            },
            AgentEvent::Ended => WireEvent::End,
            AgentEvent::Error { message } => WireEvent::Error {
                data: message.clone(),
            },
        }
    }
}

/// Everything one turn needs.
#[derive(Clone, Default)]
pub struct TurnRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub focus_mode: FocusMode,
    pub optimization_mode: OptimizationMode,
    pub file_ids: Vec<String>,
    pub system_instructions: String,
    pub wallet: Option<WalletContext>,
    pub tools: Vec<SharedTool>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    fn runs_tools(&self) -> bool {
        self.focus_mode.uses_tools() && !self.tools.is_empty()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    max_iterations: usize,
    turn_timeout: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("max_iterations", &self.max_iterations)
            .field("turn_timeout", &self.turn_timeout)
            .finish()
    }
}

enum Stop {
    Answered,
    OutOfIterations,
}

enum TurnError {
    Model(anyhow::Error),
    /// The consumer dropped the stream.
    Disconnected,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    pub fn with_budget(mut self, max_iterations: usize, turn_timeout: Duration) -> Self {
        self.max_iterations = max_iterations.max(1);
        self.turn_timeout = turn_timeout;
        self
    }

    /// Starts the turn on a background task and returns its event stream.
    pub fn run(&self, turn: TurnRequest) -> impl Stream<Item = AgentEvent> + Send + 'static {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.drive(turn, tx).await });
        ReceiverStream::new(rx)
    }

    async fn drive(self, turn: TurnRequest, tx: mpsc::Sender<AgentEvent>) {
        let turn_id = Uuid::new_v4().to_string();
        info!(
            turn_id = %turn_id,
            focus_mode = ?turn.focus_mode,
            optimization_mode = ?turn.optimization_mode,
            history = turn.history.len(),
            files = turn.file_ids.len(),
            tools = turn.tools.len(),
            wallet = turn.wallet.as_ref().map(|w| w.address.as_str()).unwrap_or("none"),
            "Starting agent turn"
        );

        let deadline = Instant::now() + self.turn_timeout;
        let outcome = tokio::time::timeout_at(deadline, self.steps(&turn_id, &turn, &tx)).await;

        let terminal = match outcome {
            Ok(Ok(Stop::Answered)) => AgentEvent::Ended,
            Ok(Ok(Stop::OutOfIterations)) => {
                warn!(turn_id = %turn_id, max_iterations = self.max_iterations, "Tool loop hit its iteration limit");
                let notice = format!(
                    "\n\n_Stopped after {} tool steps without a final answer._",
                    self.max_iterations
                );
                if tx.send(AgentEvent::ResponseDelta(notice)).await.is_err() {
                    return;
                }
                AgentEvent::Ended
            }
            Ok(Err(TurnError::Model(e))) => {
                error!(turn_id = %turn_id, error = %e, "Model call failed");
                AgentEvent::Error {
                    message: e.to_string(),
                }
            }
            Ok(Err(TurnError::Disconnected)) => {
                debug!(turn_id = %turn_id, "Consumer went away, abandoning turn");
                return;
            }
            Err(_) => {
                warn!(turn_id = %turn_id, timeout_secs = self.turn_timeout.as_secs(), "Turn exceeded its time limit");
                let notice = "\n\n_Stopped: this answer took too long to produce._".to_string();
                if tx.send(AgentEvent::ResponseDelta(notice)).await.is_err() {
                    return;
                }
                AgentEvent::Ended
            }
        };

        info!(turn_id = %turn_id, terminal = ?terminal, "Agent turn finished");
        let _ = tx.send(terminal).await;
    }

    async fn steps(
        &self,
        turn_id: &str,
        turn: &TurnRequest,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<Stop, TurnError> {
        let with_tools = turn.runs_tools();
        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(ChatMessage::system(system_prompt(
            turn.focus_mode,
            &turn.system_instructions,
            turn.wallet.as_ref(),
        )));
        messages.extend(turn.history.iter().cloned());
        messages.push(ChatMessage::user(turn.message.clone()));

        let specs: Vec<Value> = if with_tools {
            turn.tools.iter().map(|t| openai_tool_spec(t.as_ref())).collect()
        } else {
            Vec::new()
        };

        for iteration in 1..=self.max_iterations {
            debug!(turn_id = %turn_id, iteration, messages = messages.len(), "Model step");
            let mut stream = self
                .model
                .stream(ModelRequest {
                    messages: messages.clone(),
                    tools: specs.clone(),
                })
                .await
                .map_err(TurnError::Model)?;

            let mut text = String::new();
            let mut calls = Vec::new();
            while let Some(chunk) = stream.next().await {
                match chunk.map_err(TurnError::Model)? {
                    ModelChunk::Text(delta) => {
                        text.push_str(&delta);
                        emit(tx, AgentEvent::ResponseDelta(delta)).await?;
                    }
                    ModelChunk::ToolCall(call) => calls.push(call),
                }
            }

            if !with_tools || calls.is_empty() {
                return Ok(Stop::Answered);
            }

            for call in &calls {
                info!(turn_id = %turn_id, iteration, tool = call.name(), call_id = %call.id, "Calling tool");
                emit(
                    tx,
                    AgentEvent::ToolStarted {
                        name: call.name().to_string(),
                    },
                )
                .await?;
            }

            let results = join_all(calls.iter().map(|call| run_call(&turn.tools, call))).await;
            messages.push(ChatMessage::assistant(text, calls.clone()));
            for (call, output) in calls.iter().zip(results) {
                messages.push(ChatMessage::tool(&call.id, output));
            }
        }

        Ok(Stop::OutOfIterations)
    }
}

async fn emit(tx: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), TurnError> {
    tx.send(event).await.map_err(|_| TurnError::Disconnected)
}

/// Runs one requested call. Always yields text for the model.
async fn run_call(tools: &[SharedTool], call: &ToolCall) -> String {
    let Some(tool) = tools.iter().find(|t| t.name() == call.name()) else {
        warn!(tool = call.name(), "Model asked for an unknown tool");
        return format!("Error: Unknown tool: {}", call.name());
    };

    let raw = call.function.arguments.trim();
    let args = if raw.is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str::<Value>(raw) {
            Ok(args) => args,
            Err(e) => {
                return format!("Error: Invalid JSON arguments for {}: {}", call.name(), e);
            }
        }
    };

    tools::invoke(tool.as_ref(), args).await.to_text()
}
