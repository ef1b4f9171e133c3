//! # Tools Module
//!
//! Named, schema-checked operations the agent can call.
//!
//! ## Sources
//! - [`api::ApiTool`] - one tool per registry entry, executed over HTTP
//! - [`ethereum`] - common node reads (balance, transactions, gas, calls)
//! - [`wallet`] - reads bound to the caller's connected wallet
//! - [`remote`] - tools published by external MCP servers
//!
//! [`aggregator::collect_all`] flattens the tools of several providers
//! into the list handed to the orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

pub mod aggregator;
pub mod api;
pub mod ethereum;
pub mod remote;
pub mod schema;
pub mod wallet;

pub use aggregator::{collect_all, LocalToolProvider, ToolProvider};
pub use schema::{SchemaError, ToolSchema, ValueKind};

pub type SharedTool = Arc<dyn Tool>;

/// What a tool hands back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => crate::utils::render_value(value),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: SchemaError,
    },
    /// Already phrased for the model, e.g. `Error getting balance: ...`.
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> &ToolSchema;

    /// Runs the tool on arguments that already passed [`Tool::schema`].
    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// Validates `args` and runs the tool. Never fails: every error comes back
/// as readable text for the model.
pub async fn invoke(tool: &dyn Tool, args: Value) -> ToolOutput {
    if let Err(source) = tool.schema().validate(&args) {
        let err = ToolError::InvalidArguments {
            tool: tool.name().to_string(),
            source,
        };
        warn!(tool = tool.name(), error = %err, "Rejected tool arguments");
        return ToolOutput::Text(format!("Error: {}", err));
    }

    debug!(tool = tool.name(), "Invoking tool");
    match tool.call(args).await {
        Ok(output) => output,
        Err(err) => {
            warn!(tool = tool.name(), error = %err, "Tool call failed");
            ToolOutput::Text(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Exploding {
        schema: ToolSchema,
    }

    #[async_trait]
    impl Tool for Exploding {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }
        async fn call(&self, _args: Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Failed("Error exploding: boom".into()))
        }
    }

    #[tokio::test]
    async fn failures_come_back_as_text() {
        let tool = Exploding {
            schema: ToolSchema::new().required("target", ValueKind::String, ""),
        };

        let out = invoke(&tool, json!({"target": "x"})).await;
        assert_eq!(out, ToolOutput::Text("Error exploding: boom".into()));

        let out = invoke(&tool, json!({})).await;
        assert_eq!(
            out.to_text(),
            "Error: Invalid arguments for explode: missing required argument 'target'"
        );
    }
}
