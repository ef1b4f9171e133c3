//! Collects tools from several providers into one flat list.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, warn};

use super::remote::ToolServerError;
use super::SharedTool;

#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Idempotent; concurrent callers share one connection attempt.
    async fn connect(&self) -> Result<(), ToolServerError>;

    async fn tools(&self) -> Result<Vec<SharedTool>, ToolServerError>;
}

/// In-process tools that need no connection.
pub struct LocalToolProvider {
    name: String,
    tools: Vec<SharedTool>,
}

impl LocalToolProvider {
    pub fn new(name: impl Into<String>, tools: Vec<SharedTool>) -> Self {
        Self {
            name: name.into(),
            tools,
        }
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), ToolServerError> {
        Ok(())
    }

    async fn tools(&self) -> Result<Vec<SharedTool>, ToolServerError> {
        Ok(self.tools.clone())
    }
}

/// Connects to every provider and concatenates their tools in provider
/// order. A failing provider is logged and contributes nothing. When two
/// providers publish the same name the earlier one is kept.
pub async fn collect_all(providers: &[Arc<dyn ToolProvider>]) -> Vec<SharedTool> {
    let results = join_all(providers.iter().map(|provider| async move {
        let loaded = match provider.connect().await {
            Ok(()) => provider.tools().await,
            Err(e) => Err(e),
        };
        (provider.name().to_string(), loaded)
    }))
    .await;

    let mut seen = HashSet::new();
    let mut tools = Vec::new();
    for (provider, loaded) in results {
        match loaded {
            Ok(provided) => {
                info!(provider = %provider, count = provided.len(), "Loaded tools");
                for tool in provided {
                    if seen.insert(tool.name().to_string()) {
                        tools.push(tool);
                    } else {
                        warn!(provider = %provider, tool = tool.name(), "Duplicate tool name, keeping the first");
                    }
                }
            }
            Err(e) => {
                error!(provider = %provider, error = %e, "Failed to load tools from provider");
            }
        }
    }
    tools
}
