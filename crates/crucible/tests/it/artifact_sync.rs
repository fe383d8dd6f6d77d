//! tests for the compiler artifact watcher

use crucible::{spawn, EthApi, NodeConfig, NodeHandle};
use serde_json::json;
use std::{fs, path::Path, time::Duration};

async fn spawn_watching_node() -> (EthApi, NodeHandle, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NodeConfig::test().with_cache_dir(dir.path().to_path_buf());
    config.sync_poll_interval = Duration::from_millis(50);
    config.sync_stability_threshold = Duration::ZERO;
    let (api, handle) = spawn(config).await.unwrap();
    (api, handle, dir)
}

fn write_pair(dir: &Path, version: &str) {
    fs::write(
        dir.join("compiler-input.json"),
        json!({"language": "Solidity", "sources": {}}).to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("compiler-output.json"),
        json!({"solcVersion": version, "contracts": {}}).to_string(),
    )
    .unwrap();
}

/// Polls until the node registered `count` compilations or the timeout expires
async fn wait_for_compilations(api: &EthApi, count: usize) -> bool {
    for _ in 0..100 {
        if api.backend().compilation_count() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn completed_pair_is_registered_exactly_once() {
    let (api, _handle, dir) = spawn_watching_node().await;

    write_pair(dir.path(), "0.8.21");
    assert!(wait_for_compilations(&api, 1).await, "pair was never registered");

    // give the watcher a few more cycles, the same content must not register again
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(api.backend().compilation_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn new_content_is_registered_again() {
    let (api, _handle, dir) = spawn_watching_node().await;

    write_pair(dir.path(), "0.8.21");
    assert!(wait_for_compilations(&api, 1).await);

    write_pair(dir.path(), "0.8.22");
    assert!(wait_for_compilations(&api, 2).await, "changed pair was never registered");
}

#[tokio::test(flavor = "multi_thread")]
async fn lone_output_file_is_ignored() {
    let (api, _handle, dir) = spawn_watching_node().await;

    fs::write(
        dir.path().join("compiler-output.json"),
        json!({"solcVersion": "0.8.21"}).to_string(),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(api.backend().compilation_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn registration_goes_through_the_rpc_surface() {
    let (api, handle, _dir) = spawn_watching_node().await;

    // the watcher posts crucible_addCompilationResult like any other client would
    let result = crate::utils::rpc_result(
        &handle.http_endpoint(),
        "hardhat_addCompilationResult",
        json!(["0.8.21", {"language": "Solidity"}, {"contracts": {}}]),
    )
    .await;
    assert_eq!(result, json!(true));
    assert_eq!(api.backend().compilation_count(), 1);
}
