//! Dispatch engine behaviour against mock Steem nodes.

use crate::mock_infrastructure::{echo_reply, engine_for, engine_with, fast_engine_config, SteemNodeMock};
use balancer_core::{
    config::BatchConfig,
    proxy::ProxyError,
    types::{JsonRpcRequest, RpcBody, ServedBy},
    upstream::{Endpoint, UpstreamError},
};
use serde_json::{json, Value};
use std::sync::Arc;

fn batch_body(outcome: RpcBody) -> Vec<Value> {
    let RpcBody::Batch(responses) = outcome else { panic!("expected a batch body") };
    responses.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect()
}

#[tokio::test]
async fn test_single_call_echoes_client_id() {
    let mut node = SteemNodeMock::new().await;
    node.mock_method("condenser_api.get_dynamic_global_properties", &json!({"head_block_number": 42}))
        .await;

    let engine = engine_for(vec![node.endpoint("privex")]);
    let outcome = engine
        .process_value(json!({
            "jsonrpc": "2.0",
            "method": "condenser_api.get_dynamic_global_properties",
            "params": [],
            "id": 5
        }))
        .await
        .unwrap();

    assert_eq!(outcome.served_by, ServedBy::Endpoint(Arc::from("privex")));
    let RpcBody::Single(response) = outcome.body else { panic!("expected a single body") };
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"jsonrpc": "2.0", "result": {"head_block_number": 42}, "id": 5})
    );
}

#[tokio::test]
async fn test_missing_id_is_echoed_as_one() {
    let mut node = SteemNodeMock::new().await;
    node.mock_echo().await;

    let engine = engine_for(vec![node.endpoint("privex")]);
    let outcome = engine
        .process_value(json!({"method": "get_block", "params": [10]}))
        .await
        .unwrap();

    let RpcBody::Single(response) = outcome.body else { panic!("expected a single body") };
    assert_eq!(*response.id, json!(1));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let mut node = SteemNodeMock::new().await;
    node.mock_http_status(500, 1).await;
    node.mock_method("get_block", &json!({"block_id": "0000000a"})).await;

    let engine = engine_for(vec![node.endpoint("flaky")]);
    let outcome = engine
        .process_request(JsonRpcRequest::new("get_block", Some(json!([10])), json!("blk")))
        .await
        .unwrap();

    let RpcBody::Single(response) = outcome.body else { panic!("expected a single body") };
    assert_eq!(response.result, Some(json!({"block_id": "0000000a"})));
    assert_eq!(*response.id, json!("blk"));
    node.assert_all().await;
}

#[tokio::test]
async fn test_retries_stop_at_policy_limit() {
    let mut node = SteemNodeMock::new().await;
    node.mock_http_status(503, 3).await;

    let engine = engine_for(vec![node.endpoint("down")]);
    let err = engine
        .process_request(JsonRpcRequest::new("get_block", Some(json!([10])), json!(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Upstream(UpstreamError::HttpError(503, _))));
    assert_eq!(err.status_code(), 502);
    node.assert_all().await;
}

#[tokio::test]
async fn test_embedded_error_is_not_retried() {
    let mut node = SteemNodeMock::new().await;
    let mock = node
        .server()
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"Assert Exception"},"id":1}"#)
        .expect(1)
        .create_async()
        .await;

    let engine = engine_for(vec![node.endpoint("privex")]);
    let err = engine
        .process_request(JsonRpcRequest::new("get_block", Some(json!([10])), json!(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Upstream(UpstreamError::RpcError(-32000, _))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_mixed_batch_keeps_client_order() {
    let mut node = SteemNodeMock::new().await;
    node.mock_echo().await;

    let methods = ["get_block", "get_accounts", "get_block", "get_config", "get_block", "get_accounts"];
    let calls: Vec<Value> = methods
        .iter()
        .enumerate()
        .map(|(i, method)| json!({"method": method, "params": [i], "id": format!("client-{i}")}))
        .collect();

    let config = BatchConfig { max_batch: 100, chunk_size: 2 };
    let engine = engine_with(vec![node.endpoint("privex")], fast_engine_config(config));
    let outcome = engine.process_value(Value::Array(calls)).await.unwrap();

    assert_eq!(outcome.served_by, ServedBy::Batch);
    let replies = batch_body(outcome.body);
    assert_eq!(replies.len(), methods.len());
    for (i, reply) in replies.iter().enumerate() {
        assert_eq!(reply["id"], format!("client-{i}"));
        assert_eq!(reply["result"]["method"], methods[i]);
        assert_eq!(reply["result"]["params"], json!([i]));
    }
}

#[tokio::test]
async fn test_batch_is_split_into_balanced_chunks() {
    let mut node = SteemNodeMock::new().await;
    let mock = node
        .server()
        .mock("POST", "/")
        .with_status(200)
        .with_body_from_request(|request| request.body().map(|b| echo_reply(b)).unwrap_or_default())
        .expect(5)
        .create_async()
        .await;

    let calls: Vec<Value> =
        (0..200).map(|i| json!({"method": "get_block", "params": [i], "id": i})).collect();

    let engine = engine_for(vec![node.endpoint("privex")]);
    let replies = batch_body(engine.process_value(Value::Array(calls)).await.unwrap().body);

    assert_eq!(replies.len(), 200);
    assert_eq!(replies[199]["id"], 199);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_oversized_batch_never_reaches_upstream() {
    let mut node = SteemNodeMock::new().await;
    node.mock_unreachable().await;

    let calls: Vec<Value> =
        (0..3001).map(|i| json!({"method": "get_block", "params": [i], "id": i})).collect();

    let engine = engine_for(vec![node.endpoint("privex")]);
    let err = engine.process_value(Value::Array(calls)).await.unwrap_err();

    assert!(matches!(err, ProxyError::BatchTooLarge { size: 3001, max: 3000 }));
    assert_eq!(err.status_code(), 400);
    node.assert_all().await;
}

#[tokio::test]
async fn test_batch_item_error_fails_whole_batch() {
    let mut node = SteemNodeMock::new().await;
    node.mock_batch_item_error("get_accounts").await;
    node.mock_echo().await;

    let engine = engine_for(vec![node.endpoint("privex")]);
    let err = engine
        .process_value(json!([
            {"method": "get_block", "params": [1], "id": 1},
            {"method": "get_accounts", "params": [["alice"]], "id": 2}
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Upstream(UpstreamError::BatchItemError(_))));
}

#[tokio::test]
async fn test_failed_chunk_on_other_node_fails_whole_batch() {
    let mut healthy = SteemNodeMock::new().await;
    healthy.mock_echo().await;
    let mut broken = SteemNodeMock::new().await;
    broken.mock_http_status(503, 3).await;

    let engine = engine_for(vec![
        healthy.endpoint("healthy").with_blacklist(["get_accounts"]),
        broken.endpoint("broken").with_blacklist(["get_block"]),
    ]);

    let err = engine
        .process_value(json!([
            {"method": "get_block", "params": [1], "id": 1},
            {"method": "get_accounts", "params": [["alice"]], "id": 2},
            {"method": "get_block", "params": [2], "id": 3}
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Upstream(UpstreamError::HttpError(503, _))));
    broken.assert_all().await;
}

#[tokio::test]
async fn test_no_capable_endpoint() {
    let mut node = SteemNodeMock::new().await;
    node.mock_unreachable().await;

    let light = Endpoint::new(node.url()).with_name("light").with_full(false);
    let engine = engine_for(vec![light]);
    let err = engine
        .process_value(json!({"method": "condenser_api.get_active_votes", "params": ["alice", "post"]}))
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Upstream(UpstreamError::NoEndpointAvailable(_))));
    assert_eq!(err.status_code(), 502);
    node.assert_all().await;
}

#[tokio::test]
async fn test_batch_member_without_result_fails_whole_batch() {
    let mut node = SteemNodeMock::new().await;
    let mock = node
        .server()
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"[{"jsonrpc":"2.0","result":"ok","id":0},{"id":1}]"#)
        .expect(1)
        .create_async()
        .await;

    let engine = engine_for(vec![node.endpoint("privex")]);
    let err = engine
        .process_value(json!([
            {"method": "get_block", "params": [1], "id": "a"},
            {"method": "get_block", "params": [2], "id": "b"}
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Upstream(UpstreamError::InvalidResponse(_))));
    assert_eq!(err.status_code(), 502);
    mock.assert_async().await;
}
