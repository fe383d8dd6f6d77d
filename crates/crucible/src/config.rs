//! Node configuration

use crate::{
    error::NodeError,
    eth::backend::genesis::GenesisConfig,
    fork::ForkClientConfig,
    sync::{ArtifactSyncConfig, PendingArtifactPair},
};
use alloy_primitives::U256;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use yansi::Paint;

use crate::eth::api::CLIENT_VERSION;

/// Default port the rpc server listens on
pub const NODE_PORT: u16 = 8545;

/// Default chain id of the node
pub const CHAIN_ID: u64 = 31337;

/// The only network name this node will start under when one is given explicitly
pub const NETWORK_NAME: &str = "crucible";

/// The default balance of the dev accounts, 10_000 ETH in wei
pub fn default_balance() -> U256 {
    U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64))
}

const BANNER: &str = r"
                          _  _     _
  ___  _ _  _  _  ___  _ | || |__ | | ___
 / __|| '_|| || |/ __|| || || '_ \| |/ _ \
| (__ | |  | || | (__ | || || |_) | |  __/
 \___||_|   \_,_|\___||_||_||_.__/|_|\___|
";

/// Configurations of the running node
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Chain ID of the emulated chain
    pub chain_id: u64,
    /// The host the server will listen on
    pub host: IpAddr,
    /// The port the server will listen on, `0` picks an ephemeral one
    pub port: u16,
    /// Explicit network name override, must match [NETWORK_NAME] when given
    pub network: Option<String>,
    /// The remote endpoint to fork from
    pub eth_rpc_url: Option<String>,
    /// The remote block to pin the fork to, `None` tracks latest
    pub fork_block_number: Option<u64>,
    /// Genesis balance of every dev account, in wei
    pub genesis_balance: U256,
    /// The project-local cache directory, holds the remote-state cache and compiler artifacts
    pub cache_dir: PathBuf,
    /// How often the artifact watcher polls
    pub sync_poll_interval: Duration,
    /// How long the compiler output must sit unchanged before it is picked up
    pub sync_stability_threshold: Duration,
    /// Don't print anything on startup
    pub silent: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: CHAIN_ID,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: NODE_PORT,
            network: None,
            eth_rpc_url: None,
            fork_block_number: None,
            genesis_balance: default_balance(),
            cache_dir: PathBuf::from("cache"),
            sync_poll_interval: ArtifactSyncConfig::DEFAULT_POLL_INTERVAL,
            sync_stability_threshold: ArtifactSyncConfig::DEFAULT_STABILITY_THRESHOLD,
            silent: false,
        }
    }
}

impl NodeConfig {
    /// Returns a new config intended to be used in tests: ephemeral port, no printout
    pub fn test() -> Self {
        Self { port: 0, silent: true, ..Default::default() }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn with_eth_rpc_url<U: Into<String>>(mut self, eth_rpc_url: Option<U>) -> Self {
        self.eth_rpc_url = eth_rpc_url.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_fork_block_number(mut self, fork_block_number: Option<u64>) -> Self {
        self.fork_block_number = fork_block_number;
        self
    }

    #[must_use]
    pub fn with_genesis_balance(mut self, balance: U256) -> Self {
        self.genesis_balance = balance;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Rejects an explicit network override naming anything but [NETWORK_NAME].
    ///
    /// No override passes, and so does an explicit override naming the designated network.
    pub fn check_network(&self) -> Result<(), NodeError> {
        match self.network.as_deref() {
            None => Ok(()),
            Some(NETWORK_NAME) => Ok(()),
            Some(other) => Err(NodeError::Config(format!(
                "unsupported network {other:?}, this node only runs as {NETWORK_NAME:?}"
            ))),
        }
    }

    /// The socket address the server will bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The fork descriptor, if forking is requested
    pub fn fork_config(&self) -> Option<ForkClientConfig> {
        self.eth_rpc_url.as_ref().map(|url| ForkClientConfig {
            eth_rpc_url: url.clone(),
            block_number: self.fork_block_number,
        })
    }

    /// Where fork clients persist their response cache
    pub fn cache_file_path(&self) -> PathBuf {
        self.cache_dir.join("remote-state.json")
    }

    /// The genesis accounts derived from this config
    pub fn genesis(&self) -> GenesisConfig {
        GenesisConfig::dev_accounts(self.genesis_balance)
    }

    /// The artifact watcher config for a node serving at `addr`
    pub fn artifact_sync_config(&self, addr: SocketAddr) -> ArtifactSyncConfig {
        ArtifactSyncConfig {
            pair: PendingArtifactPair {
                input_path: self.cache_dir.join("compiler-input.json"),
                output_path: self.cache_dir.join("compiler-output.json"),
            },
            poll_interval: self.sync_poll_interval,
            stability_threshold: self.sync_stability_threshold,
            endpoint: format!("http://{addr}/"),
        }
    }

    /// Prints the startup summary: accounts, keys, balances and the endpoint
    pub fn print_startup(&self, genesis: &GenesisConfig, addr: SocketAddr) {
        if self.silent {
            return;
        }

        println!("{}", Paint::green(BANNER));
        println!("    {CLIENT_VERSION}");

        println!(
            "
Available Accounts
=================="
        );
        for (idx, account) in genesis.accounts.iter().enumerate() {
            println!(
                "({idx}) {:?} ({} ETH)",
                account.address,
                display_whole_units(account.balance)
            );
        }

        println!(
            "
Private Keys
=================="
        );
        for (idx, account) in genesis.accounts.iter().enumerate() {
            println!("({idx}) {}", account.secret);
        }

        println!(
            "
Chain ID
==================

{}
",
            Paint::green(&self.chain_id)
        );

        if let Some(fork) = self.fork_config() {
            println!(
                "Fork
==================
Endpoint:       {}
Block number:   {}
",
                fork.eth_rpc_url,
                fork.block_number.map(|n| n.to_string()).unwrap_or_else(|| "latest".to_string())
            );
        }

        println!("Listening on {}", Paint::green(&format!("http://{addr}/")));
    }
}

/// Renders a wei amount in whole ether units, truncating any fraction
pub fn display_whole_units(wei: U256) -> String {
    (wei / U256::from(10u64).pow(U256::from(18u64))).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_unit_display_truncates() {
        let two = U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(display_whole_units(two), "2");

        // 2.5 ETH still renders as 2
        let two_and_a_half = two + U256::from(5u64) * U256::from(10u64).pow(U256::from(17u64));
        assert_eq!(display_whole_units(two_and_a_half), "2");

        assert_eq!(display_whole_units(U256::ZERO), "0");
    }

    #[test]
    fn network_override_is_validated() {
        let config = NodeConfig::test();
        assert!(config.check_network().is_ok());

        let config = NodeConfig::test().with_network(Some("crucible".to_string()));
        assert!(config.check_network().is_ok());

        let config = NodeConfig::test().with_network(Some("mainnet".to_string()));
        let err = config.check_network().unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn fork_config_requires_a_url() {
        let config = NodeConfig::test().with_fork_block_number(Some(42));
        assert!(config.fork_config().is_none());

        let config = config.with_eth_rpc_url(Some("http://archive.example"));
        let fork = config.fork_config().unwrap();
        assert_eq!(fork.block_number, Some(42));
    }
}
