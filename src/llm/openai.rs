//! Chat Completions driver (`/v1/chat/completions`, streamed).

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChatModel, ModelChunk, ModelRequest, ModelStream, ToolCall};

#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// e.g. `https://api.openai.com`
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Default)]
struct ToolAccum {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

#[derive(Clone)]
pub struct ChatCompletionsModel {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsModel")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish()
    }
}

impl ChatCompletionsModel {
    pub fn new(settings: LlmSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(http: reqwest::Client, settings: LlmSettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl ChatModel for ChatCompletionsModel {
    async fn stream(&self, request: ModelRequest) -> anyhow::Result<ModelStream> {
        let url = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let mut body = json!({
            "model": self.settings.model,
            "stream": true,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools);
        }

        let mut rb = self.http.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            rb = rb.bearer_auth(key);
        }
        let resp = rb
            .send()
            .await
            .with_context(|| format!("Failed to reach model endpoint {}", url))?
            .error_for_status()
            .context("Model endpoint rejected the request")?;
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut buf = Vec::<u8>::new();
            let mut accum: BTreeMap<usize, ToolAccum> = BTreeMap::new();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                buf.extend_from_slice(&chunk?);

                while let Some(pos) = find_double_newline(&buf) {
                    let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                    let text = String::from_utf8_lossy(&frame);

                    for line in text.lines() {
                        let Some(data) = line.trim().strip_prefix("data:") else {
                            continue;
                        };
                        let data = data.trim();
                        if data.is_empty() || data == "[DONE]" {
                            continue;
                        }

                        let v: Value = serde_json::from_str(data)?;
                        let choice = &v["choices"][0];
                        let delta = &choice["delta"];

                        if let Some(s) = delta.get("content").and_then(Value::as_str) {
                            if !s.is_empty() {
                                yield ModelChunk::Text(s.to_string());
                            }
                        }

                        if let Some(arr) = delta.get("tool_calls").and_then(Value::as_array) {
                            for tc in arr {
                                let idx = tc.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                                let entry = accum.entry(idx).or_default();
                                if entry.id.is_none() {
                                    entry.id = tc.get("id").and_then(Value::as_str).map(ToString::to_string);
                                }
                                let function = tc.get("function");
                                if entry.name.is_none() {
                                    entry.name = function
                                        .and_then(|f| f.get("name"))
                                        .and_then(Value::as_str)
                                        .map(ToString::to_string);
                                }
                                if let Some(part) = function
                                    .and_then(|f| f.get("arguments"))
                                    .and_then(Value::as_str)
                                {
                                    entry.args.push_str(part);
                                }
                            }
                        }

                        if choice.get("finish_reason").and_then(Value::as_str) == Some("tool_calls") {
                            for call in drain_calls(&mut accum) {
                                yield ModelChunk::ToolCall(call);
                            }
                        }
                    }
                }
            }

            // Some servers end the stream without a tool_calls finish reason.
            for call in drain_calls(&mut accum) {
                yield ModelChunk::ToolCall(call);
            }
        };

        debug!(model = %self.settings.model, "Model stream opened");
        Ok(Box::pin(out))
    }
}

fn drain_calls(accum: &mut BTreeMap<usize, ToolAccum>) -> Vec<ToolCall> {
    std::mem::take(accum)
        .into_values()
        .filter_map(|a| match (a.id, a.name) {
            (Some(id), Some(name)) => Some(ToolCall::new(id, name, a.args)),
            _ => None,
        })
        .collect()
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}
