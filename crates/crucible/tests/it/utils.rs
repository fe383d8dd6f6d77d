use crucible::{spawn, EthApi, NodeConfig, NodeHandle};
use serde_json::{json, Value};

/// Spawns a test node with its cache confined to a temp dir
pub async fn spawn_test_node() -> (EthApi, NodeHandle, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::test().with_cache_dir(dir.path().to_path_buf());
    let (api, handle) = spawn(config).await.unwrap();
    (api, handle, dir)
}

/// Sends a raw rpc call to the node and returns the full response body
pub async fn rpc_call(endpoint: &str, method: &str, params: Value) -> Value {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    reqwest::Client::new()
        .post(endpoint)
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Sends a rpc call and unwraps the `result`, panicking on an error response
pub async fn rpc_result(endpoint: &str, method: &str, params: Value) -> Value {
    let resp = rpc_call(endpoint, method, params).await;
    assert!(resp.get("error").is_none(), "unexpected rpc error: {resp}");
    resp["result"].clone()
}
