//! tests against the http rpc surface

use crate::utils::{rpc_call, rpc_result, spawn_test_node};
use alloy_primitives::{Address, U256};
use crucible::{spawn, NodeConfig, NodeError};
use serde_json::json;

#[tokio::test(flavor = "multi_thread")]
async fn handshake_methods_answer() {
    let (_api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();

    let chain_id = rpc_result(&endpoint, "eth_chainId", json!([])).await;
    assert_eq!(chain_id, json!("0x7a69"));

    let net = rpc_result(&endpoint, "net_version", json!([])).await;
    assert_eq!(net, json!("31337"));

    let version = rpc_result(&endpoint, "web3_clientVersion", json!([])).await;
    assert!(version.as_str().unwrap().starts_with("crucible/v"));

    let accounts = rpc_result(&endpoint, "eth_accounts", json!([])).await;
    assert_eq!(accounts.as_array().unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn dev_accounts_are_funded() {
    let (api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();
    let dev = api.backend().genesis().addresses()[0];

    let balance = rpc_result(&endpoint, "eth_getBalance", json!([dev, "latest"])).await;
    let balance: U256 = serde_json::from_value(balance).unwrap();
    assert_eq!(balance, U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)));
}

#[tokio::test(flavor = "multi_thread")]
async fn set_balance_shadows_reads() {
    let (_api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();
    let addr = Address::with_last_byte(0x42);

    rpc_result(&endpoint, "crucible_setBalance", json!([addr, "0x539"])).await;
    let balance = rpc_result(&endpoint, "eth_getBalance", json!([addr, "latest"])).await;
    assert_eq!(balance, json!("0x539"));

    // the hardhat alias writes the same overlay
    rpc_result(&endpoint, "hardhat_setNonce", json!([addr, "0x5"])).await;
    let nonce = rpc_result(&endpoint, "eth_getTransactionCount", json!([addr, "latest"])).await;
    assert_eq!(nonce, json!("0x5"));
}

#[tokio::test(flavor = "multi_thread")]
async fn can_set_code_and_storage() {
    let (_api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();
    let addr = Address::with_last_byte(0x43);

    rpc_result(&endpoint, "crucible_setCode", json!([addr, "0x6001"])).await;
    let code = rpc_result(&endpoint, "eth_getCode", json!([addr, "latest"])).await;
    assert_eq!(code, json!("0x6001"));

    let slot_value = "0x0000000000000000000000000000000000000000000000000000000000000539";
    rpc_result(&endpoint, "crucible_setStorageAt", json!([addr, "0x0", slot_value])).await;
    let value = rpc_result(&endpoint, "eth_getStorageAt", json!([addr, "0x0", "latest"])).await;
    assert_eq!(value, json!(slot_value));
}

#[tokio::test(flavor = "multi_thread")]
async fn impersonation_is_reflected_in_accounts() {
    let (_api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();
    // no on-chain presence required
    let addr = Address::with_last_byte(0x44);

    rpc_result(&endpoint, "hardhat_impersonateAccount", json!([addr])).await;
    let accounts = rpc_result(&endpoint, "eth_accounts", json!([])).await;
    let addr_json = serde_json::to_value(addr).unwrap();
    assert!(accounts.as_array().unwrap().contains(&addr_json));

    rpc_result(&endpoint, "hardhat_stopImpersonatingAccount", json!([addr])).await;
    let accounts = rpc_result(&endpoint, "eth_accounts", json!([])).await;
    assert!(!accounts.as_array().unwrap().contains(&addr_json));
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_restores_genesis_state() {
    let (api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();
    let dev = api.backend().genesis().addresses()[0];

    rpc_result(&endpoint, "crucible_setBalance", json!([dev, "0x1"])).await;
    let balance = rpc_result(&endpoint, "eth_getBalance", json!([dev, "latest"])).await;
    assert_eq!(balance, json!("0x1"));

    rpc_result(&endpoint, "hardhat_reset", json!([])).await;
    let balance = rpc_result(&endpoint, "eth_getBalance", json!([dev, "latest"])).await;
    let balance: U256 = serde_json::from_value(balance).unwrap();
    assert_eq!(balance, U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)));
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_with_invalid_url_fails_and_keeps_serving() {
    let (_api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();

    let resp = rpc_call(
        &endpoint,
        "crucible_reset",
        json!([{"forking": {"jsonRpcUrl": "not a url"}}]),
    )
    .await;
    assert!(resp.get("error").is_some());

    // the node is still up
    let chain_id = rpc_result(&endpoint, "eth_chainId", json!([])).await;
    assert_eq!(chain_id, json!("0x7a69"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_methods_are_rejected_as_not_found() {
    let (_api, handle, _dir) = spawn_test_node().await;
    let endpoint = handle.http_endpoint();

    let resp = rpc_call(&endpoint, "eth_sendTransaction", json!([])).await;
    assert_eq!(resp["error"]["code"], json!(-32601));
}

#[tokio::test(flavor = "multi_thread")]
async fn bind_conflict_surfaces_as_bind_error() {
    let (_api, handle, dir) = spawn_test_node().await;
    let taken = handle.socket_addr();

    let config = NodeConfig::test()
        .with_cache_dir(dir.path().to_path_buf())
        .with_port(taken.port());
    let err = spawn(config).await.unwrap_err();
    assert!(matches!(err, NodeError::Bind { .. }), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn refuses_foreign_network_override() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::test()
        .with_cache_dir(dir.path().to_path_buf())
        .with_network(Some("mainnet".to_string()));
    let err = spawn(config).await.unwrap_err();
    assert!(matches!(err, NodeError::Config(_)), "unexpected error: {err}");

    // an explicit override naming the local network passes
    let config = NodeConfig::test()
        .with_cache_dir(dir.path().to_path_buf())
        .with_network(Some("crucible".to_string()));
    assert!(spawn(config).await.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_resolves_the_handle() {
    let (_api, mut handle, _dir) = spawn_test_node().await;
    handle.shutdown();
    handle.await.unwrap();
}
