//! Shared test doubles.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eth_agent_gateway::llm::{ChatModel, ModelChunk, ModelRequest, ModelStream};
use eth_agent_gateway::tools::{Tool, ToolError, ToolOutput, ToolSchema, ValueKind};
use serde_json::Value;

/// Plays back one scripted step per model call and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Vec<ModelChunk>>>,
    pub seen: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Vec<ModelChunk>>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn stream(&self, request: ModelRequest) -> anyhow::Result<ModelStream> {
        self.seen.lock().unwrap().push(request);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("model unavailable"))?;
        Ok(Box::pin(futures::stream::iter(step.into_iter().map(Ok))))
    }
}

/// Echoes its `text` argument, optionally after a delay.
pub struct EchoTool {
    name: String,
    description: String,
    schema: ToolSchema,
    delay: Option<Duration>,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("{} tool", name),
            schema: ToolSchema::new().required("text", ValueKind::String, "What to echo"),
            delay: None,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Tool for EchoTool {
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
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = args["text"].as_str().unwrap_or_default();
        Ok(ToolOutput::Text(format!("{}: {}", self.name, text)))
    }
}
