//! Local dev accounts funded at startup

use alloy_primitives::{b256, keccak256, Address, B256, U256};
use k256::ecdsa::SigningKey;

/// The well known dev account secrets, as derived from the standard test mnemonic
pub const DEV_ACCOUNT_SECRETS: [B256; 10] = [
    b256!("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
    b256!("59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"),
    b256!("5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a"),
    b256!("7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6"),
    b256!("47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a"),
    b256!("8b3a350cf5c34c9194ca85829a2df0ec3153be0318b5e2d3348e872092edffba"),
    b256!("92db14e403b83dfe3df233f83dfa3a0d7096f21ca9b0d6d6b8d88b2b4ec1564e"),
    b256!("4bbbf85ce3377467afe5d46f804f221813b2bb87f24d81f60f1fcdbf7cbf4356"),
    b256!("dbda1821b80551c9d65939329250298aa3472ba22feea921c0cf5d620ea67b97"),
    b256!("2a871d0798f97d79848a013d4936a73bf4cc922c825d33c1cf7073dff6d409c6"),
];

/// A prefunded local account.
///
/// Created once at node construction, immutable thereafter. Its funded state lives in the genesis
/// layer of the backend, so a `reset` restores the account to this balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevAccount {
    pub secret: B256,
    pub address: Address,
    pub balance: U256,
}

impl DevAccount {
    /// Derives the account address from the secret key
    pub fn from_secret(secret: B256, balance: U256) -> Result<Self, k256::ecdsa::Error> {
        let signer = SigningKey::from_bytes(k256::FieldBytes::from_slice(secret.as_slice()))?;
        let public = signer.verifying_key().to_encoded_point(false);
        // skip the 0x04 SEC1 prefix
        let hash = keccak256(&public.as_bytes()[1..]);
        let address = Address::from_slice(&hash[12..]);
        Ok(Self { secret, address, balance })
    }
}

/// The accounts the chain starts out with
#[derive(Clone, Debug)]
pub struct GenesisConfig {
    pub accounts: Vec<DevAccount>,
}

impl GenesisConfig {
    /// Derives the standard dev accounts, each funded with `balance` wei
    pub fn dev_accounts(balance: U256) -> Self {
        let accounts = DEV_ACCOUNT_SECRETS
            .into_iter()
            .filter_map(|secret| DevAccount::from_secret(secret, balance).ok())
            .collect();
        Self { accounts }
    }

    /// Returns the genesis balance of `address`, if it is a dev account
    pub fn balance_of(&self, address: Address) -> Option<U256> {
        self.accounts.iter().find(|acc| acc.address == address).map(|acc| acc.balance)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|acc| acc.address).collect()
    }
}
