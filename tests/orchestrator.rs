mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{EchoTool, ScriptedModel};
use eth_agent_gateway::llm::{
    AgentEvent, ChatMessage, FocusMode, ModelChunk, Orchestrator, Role, ToolCall, TurnRequest,
};
use eth_agent_gateway::tools::SharedTool;
use futures::StreamExt;

fn text(s: &str) -> ModelChunk {
    ModelChunk::Text(s.to_string())
}

fn call(id: &str, name: &str, args: &str) -> ModelChunk {
    ModelChunk::ToolCall(ToolCall::new(id, name, args))
}

fn wallet_turn(message: &str, tools: Vec<SharedTool>) -> TurnRequest {
    TurnRequest {
        focus_mode: FocusMode::EthereumWallet,
        tools,
        ..TurnRequest::new(message)
    }
}

async fn collect(orchestrator: &Orchestrator, turn: TurnRequest) -> Vec<AgentEvent> {
    orchestrator.run(turn).collect().await
}

fn terminal_count(events: &[AgentEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

#[tokio::test]
async fn direct_completion_streams_text_then_ends() {
    let model = ScriptedModel::new(vec![vec![text("Dear "), text("reader")]]);
    let orchestrator = Orchestrator::new(model.clone());

    let turn = TurnRequest {
        focus_mode: FocusMode::WritingAssistant,
        history: vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply", vec![])],
        system_instructions: "Be formal.".into(),
        tools: vec![Arc::new(EchoTool::new("echo"))],
        ..TurnRequest::new("Write a greeting")
    };
    let events = collect(&orchestrator, turn).await;

    assert_eq!(
        events,
        vec![
            AgentEvent::ResponseDelta("Dear ".into()),
            AgentEvent::ResponseDelta("reader".into()),
            AgentEvent::Ended,
        ]
    );

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.tools.is_empty());
    assert_eq!(request.messages.len(), 4);
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains("Be formal."));
    assert_eq!(request.messages[3], ChatMessage::user("Write a greeting"));
}

#[tokio::test]
async fn tool_calls_run_and_feed_results_back_by_id() {
    let model = ScriptedModel::new(vec![
        vec![
            text("Let me check."),
            call("call_a", "echo", r#"{"text":"one"}"#),
            call("call_b", "echo", r#"{"text":"two"}"#),
        ],
        vec![text("All done.")],
    ]);
    let orchestrator = Orchestrator::new(model.clone());

    let events = collect(
        &orchestrator,
        wallet_turn("go", vec![Arc::new(EchoTool::new("echo"))]),
    )
    .await;

    assert_eq!(
        events,
        vec![
            AgentEvent::ResponseDelta("Let me check.".into()),
            AgentEvent::ToolStarted { name: "echo".into() },
            AgentEvent::ToolStarted { name: "echo".into() },
            AgentEvent::ResponseDelta("All done.".into()),
            AgentEvent::Ended,
        ]
    );

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0]["function"]["name"], "echo");

    let followup = &requests[1].messages;
    let n = followup.len();
    assert_eq!(followup[n - 3].role, Role::Assistant);
    assert_eq!(followup[n - 3].tool_calls.len(), 2);
    assert_eq!(followup[n - 2], ChatMessage::tool("call_a", "echo: one"));
    assert_eq!(followup[n - 1], ChatMessage::tool("call_b", "echo: two"));
}

#[tokio::test]
async fn bad_arguments_are_reported_to_the_model() {
    let model = ScriptedModel::new(vec![
        vec![
            call("c1", "echo", r#"{"text": 5}"#),
            call("c2", "echo", "not json"),
            call("c3", "missing", "{}"),
        ],
        vec![text("Sorry.")],
    ]);
    let orchestrator = Orchestrator::new(model.clone());

    let events = collect(
        &orchestrator,
        wallet_turn("go", vec![Arc::new(EchoTool::new("echo"))]),
    )
    .await;
    assert_eq!(events.last(), Some(&AgentEvent::Ended));
    assert_eq!(terminal_count(&events), 1);

    let followup = &model.requests()[1].messages;
    let n = followup.len();
    assert!(followup[n - 3].content.starts_with("Error: Invalid arguments for echo"));
    assert!(followup[n - 2].content.starts_with("Error: Invalid JSON arguments for echo"));
    assert_eq!(followup[n - 1].content, "Error: Unknown tool: missing");
}

#[tokio::test]
async fn iteration_budget_truncates_the_turn() {
    let looping = vec![call("c", "echo", r#"{"text":"again"}"#)];
    let model = ScriptedModel::new(vec![looping.clone(), looping.clone(), looping]);
    let orchestrator = Orchestrator::new(model.clone()).with_budget(2, Duration::from_secs(30));

    let events = collect(
        &orchestrator,
        wallet_turn("loop", vec![Arc::new(EchoTool::new("echo"))]),
    )
    .await;

    assert_eq!(model.requests().len(), 2);
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last(), Some(&AgentEvent::Ended));
    match &events[events.len() - 2] {
        AgentEvent::ResponseDelta(notice) => assert!(notice.contains("2 tool steps")),
        other => panic!("expected a truncation notice, got {:?}", other),
    }
}

#[tokio::test]
async fn time_budget_truncates_the_turn() {
    let model = ScriptedModel::new(vec![vec![call("c", "slow", r#"{"text":"zzz"}"#)]]);
    let orchestrator = Orchestrator::new(model).with_budget(10, Duration::from_millis(100));
    let slow: SharedTool = Arc::new(EchoTool::new("slow").slow(Duration::from_secs(30)));

    let events = tokio::time::timeout(
        Duration::from_secs(5),
        collect(&orchestrator, wallet_turn("wait", vec![slow])),
    )
    .await
    .expect("turn should stop at its time budget");

    assert_eq!(events[0], AgentEvent::ToolStarted { name: "slow".into() });
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last(), Some(&AgentEvent::Ended));
    match &events[events.len() - 2] {
        AgentEvent::ResponseDelta(notice) => assert!(notice.contains("took too long")),
        other => panic!("expected a truncation notice, got {:?}", other),
    }
}

#[tokio::test]
async fn model_failure_is_the_only_terminal_event() {
    let model = ScriptedModel::new(vec![]);
    let orchestrator = Orchestrator::new(model);

    let events = collect(&orchestrator, TurnRequest::new("hello")).await;
    assert_eq!(
        events,
        vec![AgentEvent::Error {
            message: "model unavailable".into()
        }]
    );
}

#[tokio::test]
async fn wallet_context_reaches_the_system_prompt() {
    let model = ScriptedModel::new(vec![vec![text("ok")]]);
    let orchestrator = Orchestrator::new(model.clone());

    let turn = TurnRequest {
        wallet: Some(eth_agent_gateway::tools::wallet::WalletContext {
            address: "0xfeed".into(),
            chain_id: 5,
        }),
        ..wallet_turn("hi", vec![])
    };
    collect(&orchestrator, turn).await;

    let system = &model.requests()[0].messages[0].content;
    assert!(system.contains("connected to wallet: 0xfeed on chain ID 5"));
}
