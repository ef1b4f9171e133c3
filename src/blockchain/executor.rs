//! Turns a registry descriptor plus an argument bag into an HTTP request.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::registry::{HttpMethod, MethodDescriptor, ParamLocation};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Replaces the descriptor's own base URL.
    pub base_url_override: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    /// Applied last, so they win over everything else.
    pub auth_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub status: u16,
    pub status_text: String,
    pub ok: bool,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("No base URL configured for tool: {0}")]
    Configuration(String),
    #[error("Invalid URL for tool {tool}: {reason}")]
    InvalidUrl { tool: String, reason: String },
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestExecutor {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the request described by `descriptor`. Non-2xx statuses come
    /// back as `ok: false`; only local and transport failures are errors.
    pub async fn execute(
        &self,
        descriptor: &MethodDescriptor,
        args: &Value,
        options: &ExecuteOptions,
    ) -> Result<ExecuteResponse, ExecutorError> {
        let url = build_url(descriptor, args, options.base_url_override.as_deref())?;
        let headers = build_headers(descriptor, args, options)?;

        debug!(tool = %descriptor.name, method = ?descriptor.http_method, %url, "Executing API request");

        let mut request = self
            .http
            .request(descriptor.http_method.as_reqwest(), url)
            .headers(headers)
            .timeout(self.timeout);

        if descriptor.http_method != HttpMethod::Get {
            if let Some(body) = args.get("requestBody").filter(|b| !b.is_null()) {
                let content_type = descriptor
                    .body_content_type
                    .as_deref()
                    .unwrap_or(DEFAULT_CONTENT_TYPE);
                let bytes = match body {
                    Value::String(s) => s.clone().into_bytes(),
                    other => serde_json::to_vec(other).unwrap_or_default(),
                };
                request = request.header(CONTENT_TYPE, content_type).body(bytes);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let text = response.text().await?;

        let data = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        Ok(ExecuteResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            ok: status.is_success(),
            data,
        })
    }
}

/// Resolves the full request URL: base, substituted path, query string.
pub fn build_url(
    descriptor: &MethodDescriptor,
    args: &Value,
    base_url_override: Option<&str>,
) -> Result<Url, ExecutorError> {
    let base = base_url_override
        .or(descriptor.base_url.as_deref())
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ExecutorError::Configuration(descriptor.name.clone()))?;

    let mut path = descriptor.path_template.clone();
    for param in descriptor.params_in(ParamLocation::Path) {
        let value = args
            .get(&param.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ExecutorError::InvalidUrl {
                tool: descriptor.name.clone(),
                reason: format!("missing path parameter '{}'", param.name),
            })?;
        let encoded = urlencoding::encode(&value_to_string(value)).into_owned();
        path = path.replace(&format!("{{{}}}", param.name), &encoded);
    }

    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path)).map_err(|e| {
        ExecutorError::InvalidUrl {
            tool: descriptor.name.clone(),
            reason: e.to_string(),
        }
    })?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    for param in descriptor.params_in(ParamLocation::Query) {
        match args.get(&param.name) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                pairs.extend(
                    items
                        .iter()
                        .map(|item| (param.name.clone(), value_to_string(item))),
                );
            }
            Some(value) => pairs.push((param.name.clone(), value_to_string(value))),
        }
    }
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}

fn build_headers(
    descriptor: &MethodDescriptor,
    args: &Value,
    options: &ExecuteOptions,
) -> Result<HeaderMap, ExecutorError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in &options.extra_headers {
        insert_header(&mut headers, name, value)?;
    }
    for param in descriptor.params_in(ParamLocation::Header) {
        if let Some(value) = args.get(&param.name).filter(|v| !v.is_null()) {
            insert_header(&mut headers, &param.name, &value_to_string(value))?;
        }
    }
    for (name, value) in &options.auth_headers {
        insert_header(&mut headers, name, value)?;
    }

    Ok(headers)
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), ExecutorError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ExecutorError::InvalidHeader(name.to_string()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| ExecutorError::InvalidHeader(name.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::registry::ParamSpec;
    use serde_json::json;

    fn descriptor(template: &str, params: Vec<ParamSpec>) -> MethodDescriptor {
        MethodDescriptor {
            name: "testTool".into(),
            description: String::new(),
            http_method: HttpMethod::Get,
            path_template: template.into(),
            parameters: params,
            body_content_type: None,
            base_url: Some("http://api.test/v1".into()),
        }
    }

    #[test]
    fn substitutes_path_parameters() {
        let d = descriptor("/x/{id}", vec![ParamSpec::new("id", ParamLocation::Path, true)]);
        let url = build_url(&d, &json!({"id": "abc"}), None).unwrap();
        assert_eq!(url.as_str(), "http://api.test/v1/x/abc");
    }

    #[test]
    fn path_parameters_are_percent_encoded() {
        let d = descriptor("/x/{id}", vec![ParamSpec::new("id", ParamLocation::Path, true)]);
        let url = build_url(&d, &json!({"id": "a b/c"}), None).unwrap();
        assert_eq!(url.as_str(), "http://api.test/v1/x/a%20b%2Fc");
    }

    #[test]
    fn array_query_values_repeat_the_key() {
        let d = descriptor(
            "/eth/getProof",
            vec![
                ParamSpec::new("address", ParamLocation::Query, true),
                ParamSpec::new("storageKeys", ParamLocation::Query, false),
                ParamSpec::new("block", ParamLocation::Query, false),
            ],
        );
        let url = build_url(
            &d,
            &json!({"address": "0xabc", "storageKeys": ["0x1", "0x2"], "block": null}),
            None,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://api.test/v1/eth/getProof?address=0xabc&storageKeys=0x1&storageKeys=0x2"
        );
    }

    #[test]
    fn override_wins_and_missing_base_is_configuration_error() {
        let d = descriptor("/eth/chainId", vec![]);
        let url = build_url(&d, &json!({}), Some("http://other/")).unwrap();
        assert_eq!(url.as_str(), "http://other/eth/chainId");

        let mut no_base = d.clone();
        no_base.base_url = None;
        let err = build_url(&no_base, &json!({}), None).unwrap_err();
        assert!(matches!(err, ExecutorError::Configuration(ref name) if name == "testTool"));
        assert_eq!(err.to_string(), "No base URL configured for tool: testTool");
    }

    #[test]
    fn header_precedence_is_auth_over_params_over_extra() {
        let d = descriptor(
            "/h",
            vec![ParamSpec::new("x-trace", ParamLocation::Header, false)],
        );
        let options = ExecuteOptions {
            base_url_override: None,
            extra_headers: vec![
                ("x-trace".into(), "extra".into()),
                ("authorization".into(), "Bearer extra".into()),
            ],
            auth_headers: vec![("authorization".into(), "Bearer auth".into())],
        };
        let headers = build_headers(&d, &json!({"x-trace": "param"}), &options).unwrap();
        assert_eq!(headers["accept"], "application/json");
        assert_eq!(headers["x-trace"], "param");
        assert_eq!(headers["authorization"], "Bearer auth");
    }
}
