// src/lib.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

pub mod api;
pub mod blockchain;
pub mod config;
pub mod jsonrpc;
pub mod llm;
pub mod mcp;
pub mod tools;
pub mod utils;

use blockchain::executor::RequestExecutor;
use blockchain::node_client::NodeClient;
use blockchain::provider::EthereumProvider;
use blockchain::registry::MethodRegistry;
use config::Config;
use jsonrpc::Dispatcher;
use llm::{ChatCompletionsModel, ChatModel, Orchestrator};
use tools::api::ApiTool;
use tools::ethereum::{common_tools, ChainClients};
use tools::remote::McpToolProvider;
use tools::wallet::{wallet_tools, WalletContext};
use tools::{collect_all, LocalToolProvider, SharedTool, ToolProvider};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// JSON-RPC front door to the Ethereum node
    pub dispatcher: Dispatcher,
    pub registry: Arc<MethodRegistry>,
    /// Registry entries as tools; what the MCP server mode serves
    pub api_tools: Arc<Vec<SharedTool>>,
    /// Node clients per chain for the common and wallet tools
    pub chain_clients: ChainClients,
    /// Remote tool servers; connected lazily on first chat turn
    pub remote_providers: Arc<Vec<Arc<dyn ToolProvider>>>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Wires everything from configuration, talking to the configured model.
    pub fn from_config(config: Config) -> Result<Self> {
        let model = Arc::new(ChatCompletionsModel::new(config.llm_settings()));
        Self::new(config, model)
    }

    pub fn new(config: Config, model: Arc<dyn ChatModel>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let node = NodeClient::with_client(http.clone(), config.eth_node_url.clone());
        let dispatcher = Dispatcher::new(EthereumProvider::new(
            node,
            config.default_accounts.clone(),
        ));

        let registry = MethodRegistry::builtin(&config.api_base_url)
            .context("Built-in method registry is inconsistent")?;
        let executor = RequestExecutor::with_client(http.clone());
        let api_tools = ApiTool::from_registry(&registry, &executor, config.execute_options());

        let chain_clients =
            ChainClients::from_urls(&http, &config.eth_node_url, &config.chain_rpc_urls);

        let remote_providers: Vec<Arc<dyn ToolProvider>> = config
            .remote_servers()
            .into_iter()
            .map(|server| Arc::new(McpToolProvider::new(http.clone(), server)) as Arc<dyn ToolProvider>)
            .collect();

        let orchestrator = Orchestrator::new(model).with_budget(
            config.agent_max_iterations,
            Duration::from_secs(config.agent_turn_timeout_secs),
        );

        Ok(Self {
            config,
            dispatcher,
            registry: Arc::new(registry),
            api_tools: Arc::new(api_tools),
            chain_clients,
            remote_providers: Arc::new(remote_providers),
            orchestrator,
        })
    }

    /// The tools one chat turn may call: wallet tools first, then the common
    /// node tools, then whatever the remote servers publish.
    pub async fn turn_tools(&self, wallet: Option<&WalletContext>) -> Vec<SharedTool> {
        let mut providers: Vec<Arc<dyn ToolProvider>> = Vec::new();
        if let Some(wallet) = wallet {
            let node = self.chain_clients.for_chain(Some(wallet.chain_id)).clone();
            providers.push(Arc::new(LocalToolProvider::new(
                "wallet",
                wallet_tools(wallet.clone(), node),
            )));
        }
        providers.push(Arc::new(LocalToolProvider::new(
            "common",
            common_tools(&self.chain_clients),
        )));
        providers.extend(self.remote_providers.iter().cloned());

        collect_all(&providers).await
    }
}
