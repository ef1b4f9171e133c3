// src/config.rs

use std::collections::HashMap;
use std::env;

use anyhow::{bail, Context, Result};

use crate::blockchain::executor::ExecuteOptions;
use crate::blockchain::registry::DEFAULT_API_BASE_URL;
use crate::llm::openai::LlmSettings;
use crate::tools::remote::{composio_server, ethereum_server, RemoteServerConfig};

const DEFAULT_COMPOSIO_MCP_URL: &str = "https://mcp.composio.dev";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

// Loaded once at startup from the environment (and .env when present).
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // Ethereum node
    pub eth_node_url: String,
    pub default_accounts: Vec<String>,
    /// Decimal chain id -> RPC URL, for wallet-aware tools.
    pub chain_rpc_urls: HashMap<String, String>,

    // Registry tools
    pub api_base_url: String,
    pub api_key: Option<String>,
    /// Extra `Name: value` header sent with every registry call.
    pub api_auth_header: Option<(String, String)>,

    // Chat model
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub agent_max_iterations: usize,
    pub agent_turn_timeout_secs: u64,

    // Remote tool servers
    pub ethereum_mcp_url: Option<String>,
    pub composio_api_key: Option<String>,
    pub composio_mcp_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            eth_node_url: String::new(),
            default_accounts: Vec::new(),
            chain_rpc_urls: HashMap::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            api_auth_header: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            agent_max_iterations: 10,
            agent_turn_timeout_secs: 120,
            ethereum_mcp_url: None,
            composio_api_key: None,
            composio_mcp_url: DEFAULT_COMPOSIO_MCP_URL.to_string(),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

/// Splits `Name: value`.
fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("API_AUTH_HEADER must look like 'Header-Name: value'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("API_AUTH_HEADER is missing a header name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let eth_node_url = optional("ETH_NODE_URL")
            .context("ETH_NODE_URL must be set to the Ethereum node's JSON-RPC URL")?;

        let chain_rpc_urls = match optional("CHAIN_RPC_URLS") {
            Some(raw) => serde_json::from_str(&raw)
                .context("Invalid CHAIN_RPC_URLS JSON format (expected {\"<chainId>\": \"<url>\"})")?,
            None => HashMap::new(),
        };

        let default_accounts = optional("DEFAULT_ACCOUNTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let api_auth_header = optional("API_AUTH_HEADER")
            .map(|raw| parse_header(&raw))
            .transpose()?;

        Ok(Config {
            port: parse_or("PORT", defaults.port)?,
            eth_node_url,
            default_accounts,
            chain_rpc_urls,
            api_base_url: optional("API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_key: optional("API_KEY"),
            api_auth_header,
            llm_base_url: optional("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_api_key: optional("LLM_API_KEY"),
            llm_model: optional("LLM_MODEL").unwrap_or(defaults.llm_model),
            agent_max_iterations: parse_or("AGENT_MAX_ITERATIONS", defaults.agent_max_iterations)?,
            agent_turn_timeout_secs: parse_or(
                "AGENT_TURN_TIMEOUT_SECS",
                defaults.agent_turn_timeout_secs,
            )?,
            ethereum_mcp_url: optional("ETHEREUM_MCP_URL"),
            composio_api_key: optional("COMPOSIO_API_KEY"),
            composio_mcp_url: optional("COMPOSIO_MCP_URL").unwrap_or(defaults.composio_mcp_url),
        })
    }

    /// Headers every registry call carries.
    pub fn execute_options(&self) -> ExecuteOptions {
        let mut auth_headers = Vec::new();
        if let Some(key) = &self.api_key {
            auth_headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
        }
        if let Some(header) = &self.api_auth_header {
            auth_headers.push(header.clone());
        }
        ExecuteOptions {
            auth_headers,
            ..ExecuteOptions::default()
        }
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
        }
    }

    /// Remote tool servers that have enough configuration to be used.
    pub fn remote_servers(&self) -> Vec<RemoteServerConfig> {
        let mut servers = Vec::new();
        if let Some(url) = &self.ethereum_mcp_url {
            servers.push(ethereum_server(url));
        }
        if let Some(key) = &self.composio_api_key {
            servers.push(composio_server(&self.composio_mcp_url, key));
        }
        servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_header_needs_a_name() {
        assert_eq!(
            parse_header("X-Api-Key: abc").unwrap(),
            ("X-Api-Key".to_string(), "abc".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn api_key_becomes_bearer_auth() {
        let config = Config {
            api_key: Some("secret".into()),
            api_auth_header: Some(("X-Extra".into(), "1".into())),
            ..Config::default()
        };
        let options = config.execute_options();
        assert_eq!(
            options.auth_headers,
            vec![
                ("Authorization".to_string(), "Bearer secret".to_string()),
                ("X-Extra".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn remote_servers_follow_configuration() {
        assert!(Config::default().remote_servers().is_empty());

        let config = Config {
            ethereum_mcp_url: Some("http://localhost:3001/mcp".into()),
            composio_api_key: Some("ck".into()),
            ..Config::default()
        };
        let names: Vec<_> = config.remote_servers().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["ethereum", "composio"]);
    }
}
