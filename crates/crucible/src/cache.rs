//! Disk-backed cache for remote JSON-RPC responses

use alloy_primitives::B256;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{trace, warn};

/// Identifies the remote endpoint and pinned block a cache file belongs to.
///
/// A cache file whose meta does not match the current fork target is stale and gets discarded on
/// load, the chain history behind an `(endpoint, block)` pair is immutable so matching entries
/// can be reused across restarts. The endpoint is the full url, two nodes on the same host serve
/// different chains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub endpoint: String,
    pub block_number: u64,
}

/// On-disk representation: meta header followed by the fingerprinted entries
#[derive(Serialize, Deserialize)]
struct JsonRpcCacheData {
    meta: CacheMeta,
    entries: BTreeMap<B256, Value>,
}

/// A [Value] cache for responses of a pinned remote block, backed by a single json file
///
/// Entries are keyed by the request fingerprint, see `ForkClient::fingerprint`. The only
/// eviction is [`JsonRpcCacheDB::invalidate_all`].
#[derive(Debug)]
pub struct JsonRpcCacheDB {
    meta: CacheMeta,
    /// Where this cache file is stored, `None` keeps the cache in memory only
    cache_path: Option<PathBuf>,
    entries: RwLock<BTreeMap<B256, Value>>,
}

impl JsonRpcCacheDB {
    /// Creates a new cache, loading any existing entries from `cache_path` whose meta matches
    pub fn load_or_new(meta: CacheMeta, cache_path: Option<PathBuf>) -> Self {
        let entries = cache_path
            .as_ref()
            .and_then(|p| Self::load_entries(&meta, p))
            .unwrap_or_default();
        Self { meta, cache_path, entries: RwLock::new(entries) }
    }

    fn load_entries(meta: &CacheMeta, path: &Path) -> Option<BTreeMap<B256, Value>> {
        let file = fs::File::open(path).ok()?;
        let data: JsonRpcCacheData = serde_json::from_reader(file).ok()?;
        if &data.meta != meta {
            trace!(target: "cache", path = ?path, "stale cache file, starting empty");
            return None;
        }
        trace!(target: "cache", path = ?path, entries = data.entries.len(), "loaded cache file");
        Some(data.entries)
    }

    /// Returns the cached response for the fingerprint, if any
    pub fn get(&self, fingerprint: B256) -> Option<Value> {
        self.entries.read().get(&fingerprint).cloned()
    }

    /// Caches the response and flushes the file
    pub fn insert(&self, fingerprint: B256, value: Value) {
        self.entries.write().insert(fingerprint, value);
        self.flush();
    }

    /// Drops all entries and removes the cache file
    pub fn invalidate_all(&self) {
        self.entries.write().clear();
        if let Some(ref path) = self.cache_path {
            if path.exists() {
                if let Err(err) = fs::remove_file(path) {
                    warn!(target: "cache", ?err, path = ?path, "failed to remove cache file");
                }
            }
        }
    }

    /// Writes the cache to the configured file, if any
    pub fn flush(&self) {
        let Some(ref path) = self.cache_path else { return };
        trace!(target: "cache", path = ?path, "saving json cache");

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let file = match fs::File::create(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(target: "cache", ?err, path = ?path, "failed to open cache file");
                return;
            }
        };

        let entries = self.entries.read();
        let data = JsonRpcCacheData { meta: self.meta.clone(), entries: entries.clone() };
        let mut writer = BufWriter::new(file);
        if let Err(err) =
            serde_json::to_writer(&mut writer, &data).map_err(std::io::Error::other).and_then(|()| writer.flush())
        {
            warn!(target: "cache", ?err, path = ?path, "failed to write cache file");
        } else {
            trace!(target: "cache", path = ?path, entries = entries.len(), "saved json cache");
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    fn meta() -> CacheMeta {
        CacheMeta { endpoint: "http://archive.example/".to_string(), block_number: 17_000_000 }
    }

    #[test]
    fn can_round_trip_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote-state.json");
        let fp = keccak256(b"eth_getBalance");

        let db = JsonRpcCacheDB::load_or_new(meta(), Some(path.clone()));
        db.insert(fp, serde_json::json!("0xde0b6b3a7640000"));

        let reloaded = JsonRpcCacheDB::load_or_new(meta(), Some(path));
        assert_eq!(reloaded.get(fp), Some(serde_json::json!("0xde0b6b3a7640000")));
    }

    #[test]
    fn discards_cache_with_mismatched_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote-state.json");
        let fp = keccak256(b"eth_getCode");

        let db = JsonRpcCacheDB::load_or_new(meta(), Some(path.clone()));
        db.insert(fp, serde_json::json!("0x"));

        let other =
            CacheMeta { endpoint: "http://archive.example/".to_string(), block_number: 17_000_001 };
        let reloaded = JsonRpcCacheDB::load_or_new(other, Some(path));
        assert!(reloaded.is_empty());

        // a different endpoint on the same block is just as stale
        let other =
            CacheMeta { endpoint: "http://archive.example:9999/".to_string(), block_number: 17_000_000 };
        let reloaded = JsonRpcCacheDB::load_or_new(other, Some(dir.path().join("remote-state.json")));
        assert!(reloaded.is_empty());
    }

    #[test]
    fn invalidate_all_removes_file_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote-state.json");
        let fp = keccak256(b"eth_getStorageAt");

        let db = JsonRpcCacheDB::load_or_new(meta(), Some(path.clone()));
        db.insert(fp, serde_json::json!("0x0"));
        assert!(path.exists());

        db.invalidate_all();
        assert!(db.is_empty());
        assert!(!path.exists());
    }
}
