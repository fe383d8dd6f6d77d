//! The rpc surface of the node

use crate::eth::{
    backend::{Backend, CompilationResult},
    error::{Result, ToRpcResponseResult},
    request::{EthRequest, Forking},
};
use alloy_primitives::{Address, Bytes, B256, U256};
use crucible_rpc::response::ResponseResult;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// The client version the node reports via `web3_clientVersion`
pub const CLIENT_VERSION: &str = concat!("crucible/v", env!("CARGO_PKG_VERSION"));

/// The rpc endpoint surface, dispatches [EthRequest]s against the [Backend]
#[derive(Clone, Debug)]
pub struct EthApi {
    backend: Arc<Backend>,
    chain_id: u64,
}

impl EthApi {
    pub fn new(backend: Arc<Backend>, chain_id: u64) -> Self {
        Self { backend, chain_id }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Executes the [EthRequest] and returns the rpc result
    pub async fn execute(&self, request: EthRequest) -> ResponseResult {
        trace!(target: "rpc::api", "executing request {request:?}");
        match request {
            EthRequest::Web3ClientVersion(()) => self.client_version().to_rpc_result(),
            EthRequest::NetVersion(()) => self.network_id().to_rpc_result(),
            EthRequest::EthChainId(()) => self.chain_id().to_rpc_result(),
            EthRequest::EthAccounts(()) => self.accounts().to_rpc_result(),
            EthRequest::EthBlockNumber(()) => self.block_number().to_rpc_result(),
            EthRequest::EthGetBalance(addr, _) => self.balance(addr).await.to_rpc_result(),
            EthRequest::EthGetTransactionCount(addr, _) => {
                self.transaction_count(addr).await.to_rpc_result()
            }
            EthRequest::EthGetCodeAt(addr, _) => self.get_code(addr).await.to_rpc_result(),
            EthRequest::EthGetStorageAt(addr, slot, _) => {
                self.storage_at(addr, slot).await.to_rpc_result()
            }
            EthRequest::Reset(params) => {
                self.reset(params.and_then(|p| p.params)).to_rpc_result()
            }
            EthRequest::ImpersonateAccount(addr) => self.impersonate(addr).to_rpc_result(),
            EthRequest::StopImpersonatingAccount(addr) => {
                self.stop_impersonating(addr).to_rpc_result()
            }
            EthRequest::SetBalance(addr, balance) => {
                self.set_balance(addr, balance).to_rpc_result()
            }
            EthRequest::SetNonce(addr, nonce) => self.set_nonce(addr, nonce).to_rpc_result(),
            EthRequest::SetCode(addr, code) => self.set_code(addr, code).to_rpc_result(),
            EthRequest::SetStorageAt(addr, slot, value) => {
                self.set_storage_at(addr, slot, value).to_rpc_result()
            }
            EthRequest::AddCompilationResult(version, input, output) => {
                self.add_compilation_result(version, input, output).to_rpc_result()
            }
        }
    }

    /// Returns the current client version
    ///
    /// Handler for `web3_clientVersion`
    pub fn client_version(&self) -> Result<String> {
        Ok(CLIENT_VERSION.to_string())
    }

    /// Returns the network id the node answers `net_version` with
    pub fn network_id(&self) -> Result<String> {
        Ok(self.chain_id.to_string())
    }

    /// Handler for `eth_chainId`
    pub fn chain_id(&self) -> Result<String> {
        Ok(format!("0x{:x}", self.chain_id))
    }

    /// Handler for `eth_accounts`, dev accounts plus explicitly impersonated ones
    pub fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.backend.accounts())
    }

    /// Handler for `eth_blockNumber`, the pinned fork block or zero
    pub fn block_number(&self) -> Result<String> {
        Ok(format!("0x{:x}", self.backend.fork_block_number().unwrap_or_default()))
    }

    /// Handler for `eth_getBalance`
    pub async fn balance(&self, address: Address) -> Result<U256> {
        self.backend.get_balance(address).await
    }

    /// Handler for `eth_getTransactionCount`
    pub async fn transaction_count(&self, address: Address) -> Result<U256> {
        self.backend.get_nonce(address).await
    }

    /// Handler for `eth_getCode`
    pub async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.backend.get_code(address).await
    }

    /// Handler for `eth_getStorageAt`
    pub async fn storage_at(&self, address: Address, index: U256) -> Result<B256> {
        self.backend.storage_at(address, index).await
    }

    /// Handler for `crucible_reset`
    pub fn reset(&self, forking: Option<Forking>) -> Result<()> {
        self.backend.reset(forking)
    }

    /// Handler for `crucible_impersonateAccount`
    pub fn impersonate(&self, address: Address) -> Result<()> {
        self.backend.cheats().impersonate(address);
        Ok(())
    }

    /// Handler for `crucible_stopImpersonatingAccount`
    pub fn stop_impersonating(&self, address: Address) -> Result<()> {
        self.backend.cheats().stop_impersonating(&address);
        Ok(())
    }

    /// Handler for `crucible_setBalance`
    pub fn set_balance(&self, address: Address, balance: U256) -> Result<()> {
        self.backend.set_balance(address, balance);
        Ok(())
    }

    /// Handler for `crucible_setNonce`
    pub fn set_nonce(&self, address: Address, nonce: U256) -> Result<()> {
        self.backend.set_nonce(address, nonce);
        Ok(())
    }

    /// Handler for `crucible_setCode`
    pub fn set_code(&self, address: Address, code: Bytes) -> Result<()> {
        self.backend.set_code(address, code);
        Ok(())
    }

    /// Handler for `crucible_setStorageAt`
    pub fn set_storage_at(&self, address: Address, index: U256, value: B256) -> Result<()> {
        self.backend.set_storage_at(address, index, value);
        Ok(())
    }

    /// Handler for `crucible_addCompilationResult`
    pub fn add_compilation_result(
        &self,
        solc_version: String,
        input: Value,
        output: Value,
    ) -> Result<bool> {
        self.backend.add_compilation_result(CompilationResult { solc_version, input, output });
        Ok(true)
    }
}
