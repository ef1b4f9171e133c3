use eth_agent_gateway::blockchain::executor::{ExecuteOptions, ExecutorError, RequestExecutor};
use eth_agent_gateway::blockchain::registry::MethodRegistry;
use eth_agent_gateway::tools::api::ApiTool;
use eth_agent_gateway::tools::{self, ToolOutput};
use mockito::Matcher;
use serde_json::json;

#[tokio::test]
async fn get_requests_carry_query_parameters_and_auth() {
    let mut api = mockito::Server::new_async().await;
    let mock = api
        .mock("GET", "/eth/getBalance")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("address".into(), "0xabc".into()),
            Matcher::UrlEncoded("block".into(), "latest".into()),
        ]))
        .match_header("authorization", "Bearer token-1")
        .match_header("accept", "application/json")
        .with_header("content-type", "application/json; charset=utf-8")
        .with_body(r#"{"result":"0x10"}"#)
        .create_async()
        .await;

    let registry = MethodRegistry::builtin(&api.url()).unwrap();
    let options = ExecuteOptions {
        auth_headers: vec![("Authorization".into(), "Bearer token-1".into())],
        ..ExecuteOptions::default()
    };
    let resp = RequestExecutor::new()
        .execute(
            registry.lookup("ethGetBalance").unwrap(),
            &json!({"address": "0xabc", "block": "latest"}),
            &options,
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(resp.status, 200);
    assert!(resp.ok);
    assert_eq!(resp.data, json!({"result": "0x10"}));
}

#[tokio::test]
async fn bodies_are_sent_as_json_and_text_answers_stay_text() {
    let mut api = mockito::Server::new_async().await;
    api.mock("POST", "/eth/sendTransaction")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"from": "0x1", "to": "0x2", "value": "0x0"})))
        .with_status(202)
        .with_header("content-type", "text/plain")
        .with_body("queued")
        .create_async()
        .await;

    let registry = MethodRegistry::builtin(&api.url()).unwrap();
    let resp = RequestExecutor::new()
        .execute(
            registry.lookup("ethSendTransaction").unwrap(),
            &json!({"requestBody": {"from": "0x1", "to": "0x2", "value": "0x0"}}),
            &ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status, 202);
    assert!(resp.ok);
    assert_eq!(resp.data, json!("queued"));
}

#[tokio::test]
async fn non_success_status_is_data_not_an_error() {
    let mut api = mockito::Server::new_async().await;
    api.mock("GET", "/eth/blockNumber")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"no such route"}"#)
        .create_async()
        .await;

    let registry = MethodRegistry::builtin(&api.url()).unwrap();
    let descriptor = registry.lookup("ethBlockNumber").unwrap();
    let resp = RequestExecutor::new()
        .execute(descriptor, &json!({}), &ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.status_text, "Not Found");
    assert!(!resp.ok);
    assert_eq!(resp.data["error"], "no such route");

    // Through the tool adapter the same answer becomes readable text.
    let tool = ApiTool::new(
        descriptor.clone(),
        RequestExecutor::new(),
        std::sync::Arc::new(ExecuteOptions::default()),
    );
    let out = tools::invoke(&tool, json!({})).await;
    assert!(out.to_text().starts_with("Error: 404 Not Found\n"));
}

#[tokio::test]
async fn base_url_override_redirects_requests() {
    let mut api = mockito::Server::new_async().await;
    api.mock("GET", "/eth/chainId")
        .with_header("content-type", "application/json")
        .with_body(r#""0x1""#)
        .create_async()
        .await;

    let registry = MethodRegistry::builtin("http://127.0.0.1:9/unused").unwrap();
    let tool = ApiTool::new(
        registry.lookup("ethChainId").unwrap().clone(),
        RequestExecutor::new(),
        std::sync::Arc::new(ExecuteOptions {
            base_url_override: Some(api.url()),
            ..ExecuteOptions::default()
        }),
    );
    assert_eq!(tools::invoke(&tool, json!({})).await, ToolOutput::Text("0x1".into()));
}

#[tokio::test]
async fn invalid_header_names_fail_before_sending() {
    let registry = MethodRegistry::builtin("http://127.0.0.1:9").unwrap();
    let err = RequestExecutor::new()
        .execute(
            registry.lookup("ethChainId").unwrap(),
            &json!({}),
            &ExecuteOptions {
                extra_headers: vec![("bad header".into(), "x".into())],
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidHeader(name) if name == "bad header"));
}
