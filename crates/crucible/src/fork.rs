//! Remote fork client: fetches chain state from a remote endpoint through the disk cache

use crate::{
    cache::{CacheMeta, JsonRpcCacheDB},
    eth::error::BlockchainError,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::trace;
use url::Url;

/// Where the fork points to, as resolved from cli args or a `reset` call.
///
/// This is a plain descriptor, creating one performs no I/O. `block_number: None` means the fork
/// tracks the latest remote block, which disables response caching since "latest" is a moving
/// target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkClientConfig {
    pub eth_rpc_url: String,
    pub block_number: Option<u64>,
}

/// Errors a transport can produce when talking to the remote endpoint
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),
    #[error("remote endpoint returned error: {0}")]
    Rpc(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// How the fork client reaches the remote endpoint.
///
/// A trait seam so that tests can substitute the wire with a recording transport.
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync + std::fmt::Debug {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;
}

/// The production transport, a plain JSON-RPC 2.0 POST client
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: Url) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

#[async_trait::async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Http(err.to_string()))?;
        let resp: Value =
            resp.json().await.map_err(|err| TransportError::Decode(err.to_string()))?;

        if let Some(err) = resp.get("error") {
            return Err(TransportError::Rpc(err.to_string()));
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| TransportError::Decode("response carries no result".to_string()))
    }
}

/// Writes `value` with all object keys sorted, so the fingerprint is independent of key order
fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(out, &map[*key]);
            }
            out.push('}');
        }
        Value::Array(values) => {
            out.push('[');
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, value);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Computes the cache key of a remote query.
///
/// Pure function of method and params, so identical queries always land on the same entry.
pub fn fingerprint(method: &str, params: &Value) -> B256 {
    let mut buf = String::from(method);
    write_canonical(&mut buf, params);
    keccak256(buf.as_bytes())
}

/// A client that serves remote chain state as of the configured block.
///
/// All reads go through [`JsonRpcCacheDB`] when the fork is pinned to a historical block.
/// Identical concurrent cache misses are deduplicated with a per-fingerprint guard, only the
/// first caller hits the wire.
#[derive(Debug)]
pub struct ForkClient {
    config: ForkClientConfig,
    transport: Arc<dyn RpcTransport>,
    cache: JsonRpcCacheDB,
    inflight: Mutex<HashMap<B256, Arc<Mutex<()>>>>,
}

impl ForkClient {
    /// Creates a fork client speaking to the configured endpoint over http
    pub fn new(config: ForkClientConfig, cache_path: Option<PathBuf>) -> Result<Self, BlockchainError> {
        let url = Url::parse(&config.eth_rpc_url)
            .map_err(|err| BlockchainError::InvalidUrl(format!("{}: {err}", config.eth_rpc_url)))?;
        let transport = Arc::new(HttpTransport::new(url));
        Ok(Self::with_transport(config, cache_path, transport))
    }

    /// Creates a fork client with a custom transport
    pub fn with_transport(
        config: ForkClientConfig,
        cache_path: Option<PathBuf>,
        transport: Arc<dyn RpcTransport>,
    ) -> Self {
        // the full normalized url, a different port or path on the same host is a different chain
        let endpoint = Url::parse(&config.eth_rpc_url)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| config.eth_rpc_url.clone());
        let meta = CacheMeta { endpoint, block_number: config.block_number.unwrap_or_default() };
        // an unpinned fork never reads or writes the cache, so it gets no file
        let cache_path = config.block_number.is_some().then_some(cache_path).flatten();
        let cache = JsonRpcCacheDB::load_or_new(meta, cache_path);
        Self { config, transport, cache, inflight: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> &ForkClientConfig {
        &self.config
    }

    /// The block all reads are pinned to, `None` tracks the latest remote block
    pub fn block_number(&self) -> Option<u64> {
        self.config.block_number
    }

    fn block_tag(&self) -> Value {
        match self.config.block_number {
            Some(num) => Value::String(format!("0x{num:x}")),
            None => Value::String("latest".to_string()),
        }
    }

    /// Number of cached responses, exposed for tests
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drops all cached responses, including the on-disk file
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Sends the request, going through the cache when the fork is pinned
    async fn fetch(&self, method: &str, params: Value) -> Result<Value, BlockchainError> {
        if self.config.block_number.is_none() {
            // "latest" is a moving target, bypass the cache entirely
            return self.request(method, params).await;
        }

        let fp = fingerprint(method, &params);
        if let Some(hit) = self.cache.get(fp) {
            trace!(target: "fork", method, "cache hit");
            return Ok(hit);
        }

        // deduplicate identical concurrent misses
        let guard = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(fp).or_default().clone()
        };
        let _permit = guard.lock().await;

        // another caller may have populated the entry while we waited
        if let Some(hit) = self.cache.get(fp) {
            return Ok(hit);
        }

        let result = self.request(method, params).await;
        if let Ok(ref value) = result {
            self.cache.insert(fp, value.clone());
        }

        self.inflight.lock().await.remove(&fp);
        result
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, BlockchainError> {
        trace!(target: "fork", method, "fetching from remote");
        self.transport.request(method, params.clone()).await.map_err(|err| {
            BlockchainError::RemoteFetch { method: method.to_string(), params, message: err.to_string() }
        })
    }

    pub async fn get_balance(&self, address: Address) -> Result<U256, BlockchainError> {
        let params = json!([address, self.block_tag()]);
        let value = self.fetch("eth_getBalance", params.clone()).await?;
        decode(value, "eth_getBalance", params)
    }

    pub async fn get_nonce(&self, address: Address) -> Result<U256, BlockchainError> {
        let params = json!([address, self.block_tag()]);
        let value = self.fetch("eth_getTransactionCount", params.clone()).await?;
        decode(value, "eth_getTransactionCount", params)
    }

    pub async fn get_code(&self, address: Address) -> Result<Bytes, BlockchainError> {
        let params = json!([address, self.block_tag()]);
        let value = self.fetch("eth_getCode", params.clone()).await?;
        decode(value, "eth_getCode", params)
    }

    pub async fn storage_at(&self, address: Address, index: U256) -> Result<B256, BlockchainError> {
        let params = json!([address, format!("0x{index:x}"), self.block_tag()]);
        let value = self.fetch("eth_getStorageAt", params.clone()).await?;
        // lenient on width, some endpoints return unpadded quantities
        let word: U256 = decode(value, "eth_getStorageAt", params)?;
        Ok(B256::from(word))
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    value: Value,
    method: &str,
    params: Value,
) -> Result<T, BlockchainError> {
    serde_json::from_value(value).map_err(|err| BlockchainError::RemoteFetch {
        method: method.to_string(),
        params,
        message: format!("unexpected response format: {err}"),
    })
}

/// A fork that defers building the [`ForkClient`] until first use.
///
/// Constructing this is free of I/O and cannot fail. The fallible part, resolving the url and
/// loading the cache file, runs once on the first remote read and is memoized.
#[derive(Debug)]
pub struct LazyFork {
    config: ForkClientConfig,
    cache_path: Option<PathBuf>,
    client: OnceCell<Arc<ForkClient>>,
}

impl LazyFork {
    pub fn new(config: ForkClientConfig, cache_path: Option<PathBuf>) -> Self {
        Self { config, cache_path, client: OnceCell::new() }
    }

    pub fn config(&self) -> &ForkClientConfig {
        &self.config
    }

    /// Returns the fork client if it has been initialized already
    pub fn initialized(&self) -> Option<Arc<ForkClient>> {
        self.client.get().cloned()
    }

    /// Returns the fork client, initializing it on first call
    pub async fn client(&self) -> Result<Arc<ForkClient>, BlockchainError> {
        self.client
            .get_or_try_init(|| async {
                trace!(target: "fork", url = %self.config.eth_rpc_url, "initializing fork client");
                ForkClient::new(self.config.clone(), self.cache_path.clone()).map(Arc::new)
            })
            .await
            .cloned()
    }
}
