//! Support for "cheat codes", user modifications that bypass standard chain rules

use alloy_primitives::Address;
use parking_lot::RwLock;
use std::{collections::HashSet, sync::Arc};
use tracing::trace;

/// Manages the set of impersonated accounts
#[derive(Clone, Debug, Default)]
pub struct CheatsManager {
    /// shareable state
    state: Arc<RwLock<CheatsState>>,
}

impl CheatsManager {
    /// Sets the account to impersonate
    ///
    /// The account does not need any on-chain presence, impersonating a fresh address is legal.
    /// Returns `true` if the account was not already impersonated.
    pub fn impersonate(&self, addr: Address) -> bool {
        trace!(target: "cheats", "start impersonating {addr:?}");
        self.state.write().impersonated_accounts.insert(addr)
    }

    /// Removes the account from the impersonated set
    pub fn stop_impersonating(&self, addr: &Address) {
        trace!(target: "cheats", "stop impersonating {addr:?}");
        self.state.write().impersonated_accounts.remove(addr);
    }

    /// Returns true if the `addr` is currently impersonated
    pub fn is_impersonated(&self, addr: Address) -> bool {
        self.state.read().impersonated_accounts.contains(&addr)
    }

    /// Clears all impersonated accounts
    pub fn clear(&self) {
        self.state.write().impersonated_accounts.clear();
    }

    /// Returns all accounts that are currently being impersonated
    pub fn impersonated_accounts(&self) -> HashSet<Address> {
        self.state.read().impersonated_accounts.clone()
    }
}

/// Container type for all the state variables
#[derive(Clone, Debug, Default)]
pub struct CheatsState {
    /// All accounts that are currently impersonated
    pub impersonated_accounts: HashSet<Address>,
}
