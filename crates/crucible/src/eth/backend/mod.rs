//! The in-memory chain state behind the rpc surface

use crate::{
    eth::{
        error::BlockchainError,
        request::Forking,
    },
    fork::{ForkClientConfig, LazyFork},
};
use alloy_primitives::{Address, Bytes, B256, U256};
use parking_lot::RwLock;
use serde_json::Value;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tracing::trace;
use url::Url;

pub mod cheats;
pub mod genesis;

use cheats::CheatsManager;
use genesis::GenesisConfig;

/// Locally written account fields, they shadow genesis and forked values
#[derive(Clone, Debug, Default)]
pub struct AccountOverlay {
    pub balance: Option<U256>,
    pub nonce: Option<U256>,
    pub code: Option<Bytes>,
    pub storage: HashMap<U256, B256>,
}

/// A compiler run registered via `crucible_addCompilationResult`
#[derive(Clone, Debug)]
pub struct CompilationResult {
    pub solc_version: String,
    pub input: Value,
    pub output: Value,
}

/// Everything a `reset` replaces in one swap
#[derive(Debug, Default)]
struct ChainState {
    overlay: HashMap<Address, AccountOverlay>,
    fork: Option<Arc<LazyFork>>,
}

/// Serves reads layered overlay -> genesis -> fork and takes the cheat writes.
///
/// Cheap to clone, all clones share the same state.
#[derive(Clone, Debug)]
pub struct Backend {
    state: Arc<RwLock<ChainState>>,
    cheats: CheatsManager,
    genesis: Arc<GenesisConfig>,
    /// registered compiler runs, additive only, survives `reset`
    compilations: Arc<RwLock<Vec<CompilationResult>>>,
    /// where fork clients persist their response cache
    cache_path: Option<PathBuf>,
}

impl Backend {
    pub fn new(
        fork: Option<ForkClientConfig>,
        genesis: GenesisConfig,
        cache_path: Option<PathBuf>,
    ) -> Self {
        let fork = fork.map(|config| Arc::new(LazyFork::new(config, cache_path.clone())));
        Self {
            state: Arc::new(RwLock::new(ChainState { overlay: HashMap::new(), fork })),
            cheats: CheatsManager::default(),
            genesis: Arc::new(genesis),
            compilations: Arc::new(RwLock::new(Vec::new())),
            cache_path,
        }
    }

    pub fn genesis(&self) -> &GenesisConfig {
        &self.genesis
    }

    pub fn cheats(&self) -> &CheatsManager {
        &self.cheats
    }

    /// Returns the fork currently in effect, if any
    fn fork(&self) -> Option<Arc<LazyFork>> {
        self.state.read().fork.clone()
    }

    /// Whether forking is currently enabled
    pub fn is_forked(&self) -> bool {
        self.state.read().fork.is_some()
    }

    /// The pinned fork block, if the fork is pinned
    pub fn fork_block_number(&self) -> Option<u64> {
        self.state.read().fork.as_ref().and_then(|f| f.config().block_number)
    }

    /// Accounts the node answers `eth_accounts` with: dev accounts plus impersonated ones
    pub fn accounts(&self) -> Vec<Address> {
        let mut accounts = self.genesis.addresses();
        for addr in self.cheats.impersonated_accounts() {
            if !accounts.contains(&addr) {
                accounts.push(addr);
            }
        }
        accounts
    }

    pub async fn get_balance(&self, address: Address) -> Result<U256, BlockchainError> {
        let fork = {
            let state = self.state.read();
            if let Some(balance) = state.overlay.get(&address).and_then(|acc| acc.balance) {
                return Ok(balance);
            }
            if let Some(balance) = self.genesis.balance_of(address) {
                return Ok(balance);
            }
            state.fork.clone()
        };
        match fork {
            Some(fork) => fork.client().await?.get_balance(address).await,
            None => Ok(U256::ZERO),
        }
    }

    pub async fn get_nonce(&self, address: Address) -> Result<U256, BlockchainError> {
        let fork = {
            let state = self.state.read();
            if let Some(nonce) = state.overlay.get(&address).and_then(|acc| acc.nonce) {
                return Ok(nonce);
            }
            if self.genesis.balance_of(address).is_some() {
                return Ok(U256::ZERO);
            }
            state.fork.clone()
        };
        match fork {
            Some(fork) => fork.client().await?.get_nonce(address).await,
            None => Ok(U256::ZERO),
        }
    }

    pub async fn get_code(&self, address: Address) -> Result<Bytes, BlockchainError> {
        let fork = {
            let state = self.state.read();
            if let Some(code) = state.overlay.get(&address).and_then(|acc| acc.code.clone()) {
                return Ok(code);
            }
            if self.genesis.balance_of(address).is_some() {
                return Ok(Bytes::new());
            }
            state.fork.clone()
        };
        match fork {
            Some(fork) => fork.client().await?.get_code(address).await,
            None => Ok(Bytes::new()),
        }
    }

    pub async fn storage_at(&self, address: Address, index: U256) -> Result<B256, BlockchainError> {
        let fork = {
            let state = self.state.read();
            if let Some(value) =
                state.overlay.get(&address).and_then(|acc| acc.storage.get(&index).copied())
            {
                return Ok(value);
            }
            if self.genesis.balance_of(address).is_some() {
                return Ok(B256::ZERO);
            }
            state.fork.clone()
        };
        match fork {
            Some(fork) => fork.client().await?.storage_at(address, index).await,
            None => Ok(B256::ZERO),
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        trace!(target: "backend", ?address, %balance, "setBalance");
        self.state.write().overlay.entry(address).or_default().balance = Some(balance);
    }

    pub fn set_nonce(&self, address: Address, nonce: U256) {
        trace!(target: "backend", ?address, %nonce, "setNonce");
        self.state.write().overlay.entry(address).or_default().nonce = Some(nonce);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        trace!(target: "backend", ?address, "setCode");
        self.state.write().overlay.entry(address).or_default().code = Some(code);
    }

    pub fn set_storage_at(&self, address: Address, index: U256, value: B256) {
        trace!(target: "backend", ?address, %index, "setStorageAt");
        self.state.write().overlay.entry(address).or_default().storage.insert(index, value);
    }

    /// Swaps the fork target and drops all local modifications.
    ///
    /// Atomic from the caller's view: the new config is validated before any state is touched, so
    /// a reset with an invalid url leaves the node exactly as it was. Reads that started before
    /// the swap finish against the old fork client they already hold.
    pub fn reset(&self, forking: Option<Forking>) -> Result<(), BlockchainError> {
        match forking {
            Some(forking) => {
                let url = match forking.json_rpc_url {
                    Some(url) => url,
                    None => self
                        .fork()
                        .map(|f| f.config().eth_rpc_url.clone())
                        .ok_or_else(|| {
                            BlockchainError::InvalidUrl(
                                "no fork url given and no fork in effect".to_string(),
                            )
                        })?,
                };
                // validate before touching anything
                Url::parse(&url)
                    .map_err(|err| BlockchainError::InvalidUrl(format!("{url}: {err}")))?;

                let config =
                    ForkClientConfig { eth_rpc_url: url, block_number: forking.block_number };
                trace!(target: "backend", url = %config.eth_rpc_url, block = ?config.block_number, "resetting fork");
                let fork = Arc::new(LazyFork::new(config, self.cache_path.clone()));

                let mut state = self.state.write();
                state.overlay.clear();
                state.fork = Some(fork);
            }
            None => {
                trace!(target: "backend", "resetting to local chain");
                let mut state = self.state.write();
                state.overlay.clear();
                if let Some(fork) = state.fork.take() {
                    // drop the stale cache along with the fork
                    if let Some(client) = fork.initialized() {
                        client.invalidate_cache();
                    }
                }
                self.cheats.clear();
            }
        }
        Ok(())
    }

    pub fn add_compilation_result(&self, result: CompilationResult) {
        trace!(target: "backend", version = %result.solc_version, "registering compilation result");
        self.compilations.write().push(result);
    }

    /// Number of registered compiler runs
    pub fn compilation_count(&self) -> usize {
        self.compilations.read().len()
    }
}
