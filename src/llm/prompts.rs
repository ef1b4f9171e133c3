//! System prompts per focus mode.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::wallet::WalletContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusMode {
    #[default]
    EthereumWallet,
    WritingAssistant,
    WebSearch,
}

impl FocusMode {
    /// Only the wallet assistant runs the tool loop.
    pub fn uses_tools(self) -> bool {
        matches!(self, FocusMode::EthereumWallet)
    }

    fn template(self) -> &'static str {
        match self {
            FocusMode::EthereumWallet => ETHEREUM_WALLET,
            FocusMode::WritingAssistant => WRITING_ASSISTANT,
            FocusMode::WebSearch => WEB_SEARCH,
        }
    }
}

/// Accepted and logged; no mode changes model parameters yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    Speed,
    #[default]
    Balanced,
    Quality,
}

const ETHEREUM_WALLET: &str = "You are an Ethereum wallet assistant. You help the user inspect \
their wallet and the Ethereum blockchain using the tools you have been given.

Explain what an operation will do before running anything that spends funds or signs data. \
Report amounts in ETH and gas prices in Gwei. If a tool fails, say so plainly and suggest a next step.

Current date: {date}

### User instructions
{systemInstructions}

<context>
{context}
</context>";

const WRITING_ASSISTANT: &str = "You are a writing assistant. Help the user write a response to \
their request. You do not search the web; if you lack information, ask the user for it.

Current date: {date}

### User instructions
{systemInstructions}

<context>
{context}
</context>";

const WEB_SEARCH: &str = "You are a research assistant. Answer the user's question with a clear, \
well-structured response. Use Markdown headings and lists where they help.

Current date: {date}

### User instructions
{systemInstructions}

<context>
{context}
</context>";

/// Fills `{systemInstructions}`, `{date}` and `{context}`.
pub fn render(template: &str, system_instructions: &str, date: &str, context: &str) -> String {
    template
        .replace("{systemInstructions}", system_instructions)
        .replace("{date}", date)
        .replace("{context}", context)
}

/// The system prompt for one turn. Retrieval is disabled, so the context
/// block is always empty.
pub fn system_prompt(
    focus: FocusMode,
    system_instructions: &str,
    wallet: Option<&WalletContext>,
) -> String {
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut prompt = render(focus.template(), system_instructions, &date, "");
    if let (FocusMode::EthereumWallet, Some(wallet)) = (focus, wallet) {
        prompt.push_str(&format!(
            "\n\nYou are currently connected to wallet: {} on chain ID {}.",
            wallet.address, wallet.chain_id
        ));
    }
    prompt
}
