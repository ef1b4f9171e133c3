//! Registry entries exposed as tools, executed through [`RequestExecutor`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{SharedTool, Tool, ToolError, ToolOutput, ToolSchema, ValueKind};
use crate::blockchain::executor::{ExecuteOptions, ExecuteResponse, RequestExecutor};
use crate::blockchain::registry::{MethodDescriptor, MethodRegistry, ParamLocation};
use crate::utils::render_value;

pub struct ApiTool {
    descriptor: MethodDescriptor,
    executor: RequestExecutor,
    options: Arc<ExecuteOptions>,
    schema: ToolSchema,
}

impl ApiTool {
    pub fn new(
        descriptor: MethodDescriptor,
        executor: RequestExecutor,
        options: Arc<ExecuteOptions>,
    ) -> Self {
        let schema = schema_for(&descriptor);
        Self {
            descriptor,
            executor,
            options,
            schema,
        }
    }

    /// One tool per registry entry, sharing the executor and options.
    pub fn from_registry(
        registry: &MethodRegistry,
        executor: &RequestExecutor,
        options: ExecuteOptions,
    ) -> Vec<SharedTool> {
        let options = Arc::new(options);
        registry
            .iter()
            .map(|d| Arc::new(ApiTool::new(d.clone(), executor.clone(), options.clone())) as SharedTool)
            .collect()
    }
}

fn schema_for(descriptor: &MethodDescriptor) -> ToolSchema {
    let mut schema = ToolSchema::new();
    for param in &descriptor.parameters {
        let where_ = match param.location {
            ParamLocation::Path => "Path parameter",
            ParamLocation::Query => "Query parameter",
            ParamLocation::Header => "Header",
        };
        schema = if param.required {
            schema.required(&param.name, ValueKind::Any, where_)
        } else {
            schema.optional(&param.name, ValueKind::Any, where_)
        };
    }
    if descriptor.takes_body() {
        schema = schema.required("requestBody", ValueKind::Any, "Request body");
    }
    schema
}

/// Maps an HTTP answer onto tool output. Non-2xx answers become an error text
/// that still carries the body.
pub fn render_response(response: ExecuteResponse) -> ToolOutput {
    if !response.ok {
        return ToolOutput::Text(format!(
            "Error: {} {}\n{}",
            response.status,
            response.status_text,
            render_value(&response.data)
        ));
    }
    match response.data {
        Value::String(text) => ToolOutput::Text(text),
        data @ (Value::Object(_) | Value::Array(_)) => ToolOutput::Json(data),
        other => ToolOutput::Text(other.to_string()),
    }
}

#[async_trait]
impl Tool for ApiTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let response = self
            .executor
            .execute(&self.descriptor, &args, &self.options)
            .await
            .map_err(|e| ToolError::Failed(format!("Error: {}", e)))?;
        Ok(render_response(response))
    }
}
