use eth_agent_gateway::blockchain::methods::MethodKind;
use eth_agent_gateway::blockchain::node_client::{BatchOutcome, NodeClient, RpcCall};
use eth_agent_gateway::blockchain::provider::EthereumProvider;
use eth_agent_gateway::jsonrpc::protocol::error_codes;
use eth_agent_gateway::jsonrpc::Dispatcher;
use mockito::Matcher;
use serde_json::{json, Value};
use std::time::Duration;

fn dispatcher(url: &str) -> Dispatcher {
    Dispatcher::new(EthereumProvider::new(
        NodeClient::new(url),
        vec!["0x1111111111111111111111111111111111111111".into()],
    ))
}

fn node_result(result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string()
}

#[tokio::test]
async fn forwards_typed_methods_to_the_node() {
    let mut node = mockito::Server::new_async().await;
    node.mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber", "params": []})))
        .with_header("content-type", "application/json")
        .with_body(node_result(json!("0x10")))
        .create_async()
        .await;

    let resp = dispatcher(&node.url())
        .dispatch(json!({"jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber", "params": []}))
        .await;
    assert_eq!(resp.id, json!(1));
    assert_eq!(resp.result, Some(json!("0x10")));
    assert!(resp.error.is_none());
}

#[tokio::test]
async fn balance_defaults_to_latest_block() {
    let mut node = mockito::Server::new_async().await;
    let mock = node
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getBalance",
            "params": ["0xabc", "latest"]
        })))
        .with_header("content-type", "application/json")
        .with_body(node_result(json!("0xde0b6b3a7640000")))
        .create_async()
        .await;

    let resp = dispatcher(&node.url())
        .dispatch(json!({"jsonrpc": "2.0", "id": "bal", "method": "eth_getBalance", "params": ["0xabc"]}))
        .await;
    mock.assert_async().await;
    assert_eq!(resp.id, json!("bal"));
    assert_eq!(resp.result, Some(json!("0xde0b6b3a7640000")));
}

#[tokio::test]
async fn required_arguments_are_forwarded_as_sent() {
    let mut node = mockito::Server::new_async().await;
    let by_index = node
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getTransactionByBlockNumberAndIndex",
            "params": ["0x1", 0]
        })))
        .with_header("content-type", "application/json")
        .with_body(node_result(json!({"hash": "0xfeed"})))
        .create_async()
        .await;
    let sign = node
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "personal_sign",
            "params": ["", "0xabc"]
        })))
        .with_header("content-type", "application/json")
        .with_body(node_result(json!("0x5151")))
        .create_async()
        .await;

    let dispatcher = dispatcher(&node.url());
    let resp = dispatcher
        .dispatch(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getTransactionByBlockNumberAndIndex",
            "params": ["0x1", 0]
        }))
        .await;
    assert_eq!(resp.result, Some(json!({"hash": "0xfeed"})));

    let resp = dispatcher
        .dispatch(json!({"jsonrpc": "2.0", "id": 2, "method": "personal_sign", "params": ["", "0xabc"]}))
        .await;
    assert_eq!(resp.result, Some(json!("0x5151")));

    by_index.assert_async().await;
    sign.assert_async().await;
}

#[tokio::test]
async fn node_errors_pass_through_untouched() {
    let mut node = mockito::Server::new_async().await;
    node.mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "insufficient funds", "data": {"need": "0x1"}}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let resp = dispatcher(&node.url())
        .dispatch(json!({"jsonrpc": "2.0", "id": 9, "method": "eth_sendRawTransaction", "params": ["0xf86b"]}))
        .await;
    let error = resp.error.expect("error response");
    assert_eq!(error.code, -32000);
    assert_eq!(error.message, "insufficient funds");
    assert_eq!(error.data, Some(json!({"need": "0x1"})));
    assert!(resp.result.is_none());
}

#[tokio::test]
async fn http_failures_without_rpc_body_are_server_errors() {
    let mut node = mockito::Server::new_async().await;
    node.mock("POST", "/")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let err = NodeClient::new(node.url()).call("eth_chainId", vec![]).await.unwrap_err();
    assert_eq!(err.code, error_codes::INTERNAL_ERROR);
    assert_eq!(err.message, "Server error");
    assert_eq!(err.data, Some(json!({"status": 502})));
}

#[tokio::test]
async fn unknown_methods_without_a_node_are_not_found() {
    let resp = dispatcher("http://127.0.0.1:9")
        .dispatch(json!({"jsonrpc": "2.0", "id": 4, "method": "foo_bar", "params": []}))
        .await;
    let error = resp.error.expect("error response");
    assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
    assert_eq!(error.message, "Method not found: foo_bar");
    assert_eq!(error.data.unwrap()["code"], json!(error_codes::NO_RESPONSE));
}

#[tokio::test]
async fn batch_keeps_order_and_isolates_failures() {
    let mut node = mockito::Server::new_async().await;
    node.mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_chainId"})))
        .with_header("content-type", "application/json")
        .with_body(node_result(json!("0x1")))
        .create_async()
        .await;

    let responses = dispatcher(&node.url())
        .dispatch_batch(vec![
            json!({"jsonrpc": "1.0", "id": 1, "method": "eth_chainId"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "eth_chainId"}),
            json!("not an object"),
            json!({"jsonrpc": "2.0", "id": 3, "method": "eth_requestAccounts"}),
        ])
        .await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0].id, json!(1));
    assert_eq!(responses[0].error.as_ref().unwrap().code, error_codes::INVALID_REQUEST);
    assert_eq!(responses[1].id, json!(2));
    assert_eq!(responses[1].result, Some(json!("0x1")));
    assert_eq!(responses[2].id, Value::Null);
    assert_eq!(responses[2].error.as_ref().unwrap().code, error_codes::INVALID_REQUEST);
    assert_eq!(
        responses[3].result,
        Some(json!(["0x1111111111111111111111111111111111111111"]))
    );
}

#[tokio::test]
async fn every_typed_method_answers_with_result_xor_error() {
    // The node is unreachable, so forwarded methods fail and local ones succeed;
    // either way each response carries exactly one of the two.
    let dispatcher = dispatcher("http://127.0.0.1:9");
    for kind in MethodKind::all() {
        let resp = dispatcher
            .dispatch(json!({"jsonrpc": "2.0", "id": kind.name(), "method": kind.name(), "params": []}))
            .await;
        assert_eq!(resp.id, json!(kind.name()));
        assert!(
            resp.result.is_some() ^ resp.error.is_some(),
            "{} returned both or neither",
            kind.name()
        );
    }
}

#[tokio::test]
async fn node_batches_pair_answers_by_id() {
    let mut node = mockito::Server::new_async().await;
    // Answers arrive out of order; the last one has no id.
    node.mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"jsonrpc": "2.0", "id": 2, "error": {"code": -32602, "message": "bad block"}},
                {"jsonrpc": "2.0", "id": 1, "result": "0x1"},
                {"jsonrpc": "2.0", "result": "0x5"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let client = NodeClient::new(node.url());
    let outcomes = client
        .batch_call(&[
            RpcCall::new("eth_chainId", vec![]),
            RpcCall::new("eth_getBlockByNumber", vec![json!("nope"), json!(false)]),
            RpcCall::new("eth_blockNumber", vec![]),
        ])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], BatchOutcome::Result(json!("0x1")));
    match &outcomes[1] {
        BatchOutcome::Error(e) => assert_eq!(e.code, -32602),
        other => panic!("expected an error, got {:?}", other),
    }
    assert_eq!(outcomes[2], BatchOutcome::Result(json!("0x5")));
}

/// A node that accepts connections and never answers.
async fn silent_node() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn timeouts_are_reported_as_no_response() {
    let url = silent_node().await;
    let client = NodeClient::new(url.clone())
        .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));

    let err = client.call("eth_chainId", vec![]).await.unwrap_err();
    assert_eq!(err.code, error_codes::NO_RESPONSE);
    assert_eq!(err.message, "No response from node");
    assert_eq!(err.data, Some(json!({ "url": url })));

    let err = client
        .batch_call(&[RpcCall::new("eth_chainId", vec![]), RpcCall::new("eth_blockNumber", vec![])])
        .await
        .unwrap_err();
    assert_eq!(err.code, error_codes::NO_RESPONSE);
    assert_eq!(err.message, "No response from node");
}

#[tokio::test]
async fn unreachable_node_fails_a_batch_with_no_response() {
    let err = NodeClient::new("http://127.0.0.1:9")
        .batch_call(&[RpcCall::new("eth_chainId", vec![])])
        .await
        .unwrap_err();
    assert_eq!(err.code, error_codes::NO_RESPONSE);
}

#[tokio::test]
async fn undecodable_batch_answers_are_batch_failures() {
    let mut node = mockito::Server::new_async().await;
    node.mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_body("not json")
        .create_async()
        .await;

    let err = NodeClient::new(node.url())
        .batch_call(&[RpcCall::new("eth_chainId", vec![])])
        .await
        .unwrap_err();
    assert_eq!(err.code, error_codes::INTERNAL_ERROR);
    assert_eq!(err.message, "Batch request failed");
}
