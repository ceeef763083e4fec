//! Full request path: axum router, engine and mock nodes.

use crate::mock_infrastructure::{app_for, engine_for, post_rpc, SteemNodeMock};
use balancer_core::upstream::EndpointRegistry;
use serde_json::{json, Value};

#[tokio::test]
async fn test_weighted_distribution() {
    let mut heavy = SteemNodeMock::new().await;
    heavy.mock_echo().await;
    let mut light = SteemNodeMock::new().await;
    light.mock_echo().await;

    let app = app_for(engine_for(vec![
        heavy.endpoint("heavy").with_weight(3),
        light.endpoint("light").with_weight(1),
    ]));

    let total = 400;
    let mut heavy_hits = 0;
    for i in 0..total {
        let reply = post_rpc(
            app.clone(),
            json!({"method": "get_block", "params": [i], "id": i}).to_string(),
        )
        .await;
        assert_eq!(reply.status, 200);
        match reply.upstream.as_deref() {
            Some("heavy") => heavy_hits += 1,
            Some("light") => {}
            other => panic!("unexpected upstream marker {other:?}"),
        }
    }

    let share = f64::from(heavy_hits) / f64::from(total);
    assert!((0.62..=0.88).contains(&share), "heavy share {share} outside expected range");
}

#[tokio::test]
async fn test_batch_marker_and_order() {
    let mut node = SteemNodeMock::new().await;
    node.mock_echo().await;

    let app = app_for(engine_for(vec![node.endpoint("privex")]));
    let reply = post_rpc(
        app,
        json!([
            {"method": "get_accounts", "params": [["alice"]], "id": "a"},
            {"method": "get_block", "params": [7], "id": "b"},
            {"method": "get_accounts", "params": [["bob"]], "id": "c"}
        ])
        .to_string(),
    )
    .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.upstream.as_deref(), Some("batch"));
    let ids: Vec<&Value> = reply.body.as_array().unwrap().iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!("a"), &json!("b"), &json!("c")]);
    assert_eq!(reply.body[2]["result"]["params"], json!([["bob"]]));
}

#[tokio::test]
async fn test_form_encoded_body_is_accepted() {
    let mut node = SteemNodeMock::new().await;
    node.mock_echo().await;

    let app = app_for(engine_for(vec![node.endpoint("privex")]));
    let reply = post_rpc(
        app,
        "%7B%22method%22%3A%22get_block%22%2C%22params%22%3A%5B3%5D%2C%22id%22%3A9%7D=",
    )
    .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["id"], 9);
    assert_eq!(reply.body["result"]["params"], json!([3]));
}

#[tokio::test]
async fn test_oversized_batch_is_400() {
    let mut node = SteemNodeMock::new().await;
    node.mock_unreachable().await;

    let calls: Vec<Value> =
        (0..3001).map(|i| json!({"method": "get_block", "params": [i], "id": i})).collect();

    let app = app_for(engine_for(vec![node.endpoint("privex")]));
    let reply = post_rpc(app, Value::Array(calls).to_string()).await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], true);
    assert!(reply.body["message"].as_str().unwrap().contains("3001"));
    node.assert_all().await;
}

#[tokio::test]
async fn test_empty_batch_is_400() {
    let mut node = SteemNodeMock::new().await;
    node.mock_unreachable().await;

    let app = app_for(engine_for(vec![node.endpoint("privex")]));
    let reply = post_rpc(app, "[]").await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], true);
    node.assert_all().await;
}

#[tokio::test]
async fn test_embedded_upstream_error_is_502() {
    let mut node = SteemNodeMock::new().await;
    node.mock_rpc_error("condenser_api.get_block", -32000, "Assert Exception").await;

    let app = app_for(engine_for(vec![node.endpoint("privex")]));
    let reply = post_rpc(
        app,
        json!({"method": "condenser_api.get_block", "params": [1], "id": 1}).to_string(),
    )
    .await;

    assert_eq!(reply.status, 502);
    assert_eq!(reply.body["error"], true);
    assert!(reply.body["message"].as_str().unwrap().contains("Assert Exception"));
    assert!(reply.upstream.is_none());
}

#[tokio::test]
async fn test_whitelist_routes_call_to_light_node() {
    let mut full = SteemNodeMock::new().await;
    full.mock_unreachable().await;
    let mut light = SteemNodeMock::new().await;
    light.mock_echo().await;

    let app = app_for(engine_for(vec![
        full.endpoint("full").with_blacklist(["get_active_votes"]),
        light.endpoint("light").with_full(false).with_whitelist(["condenser_api.get_active_votes"]),
    ]));

    let reply = post_rpc(
        app,
        json!({"method": "get_active_votes", "params": ["alice", "post"], "id": 3}).to_string(),
    )
    .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.upstream.as_deref(), Some("light"));
    full.assert_all().await;
}

#[test]
fn test_sample_nodes_file_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../configs/nodes.json");
    let registry = EndpointRegistry::from_file(path).unwrap();
    assert!(!registry.is_empty());
}
