//! # LLM Module
//!
//! The chat model seam and the agent loop built on it.
//!
//! - [`ChatModel`] streams one completion step as [`ModelChunk`]s
//! - [`openai::ChatCompletionsModel`] implements it over `/v1/chat/completions`
//! - [`orchestrator::Orchestrator`] runs a turn, calling tools until the
//!   model answers in plain text
//! - [`prompts`] builds the system prompt for each focus mode

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::Tool;

pub mod openai;
pub mod orchestrator;
pub mod prompts;

pub use openai::ChatCompletionsModel;
pub use orchestrator::{AgentEvent, Orchestrator, TurnRequest};
pub use prompts::{FocusMode, OptimizationMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A chat message in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool(call_id: &str, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON text, as the model produced it.
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    Text(String),
    /// A fully assembled call; emitted once the model finishes the step.
    ToolCall(ToolCall),
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    /// Function specs; empty means the step runs without tools.
    pub tools: Vec<Value>,
}

pub type ModelStream = Pin<Box<dyn Stream<Item = anyhow::Result<ModelChunk>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream(&self, request: ModelRequest) -> anyhow::Result<ModelStream>;
}

/// The function spec a chat model sees for `tool`.
pub fn openai_tool_spec(tool: &dyn Tool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.schema().to_json_schema(),
        }
    })
}
