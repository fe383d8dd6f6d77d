//! Cli arguments of the `crucible` binary

use crate::{
    config::{CHAIN_ID, NODE_PORT},
    error::NodeError,
    spawn, NodeConfig,
};
use alloy_primitives::U256;
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

#[derive(Clone, Debug, Parser)]
pub struct NodeArgs {
    /// The host the server will listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), value_name = "IP_ADDR")]
    pub host: IpAddr,

    /// Port number to listen on, `0` picks an ephemeral port.
    #[arg(long, short, default_value_t = NODE_PORT, value_name = "NUM")]
    pub port: u16,

    /// The network name to start under, only the local emulation network is accepted.
    #[arg(long, value_name = "NAME")]
    pub network: Option<String>,

    /// Fetch state over a remote endpoint instead of starting from an empty state.
    #[arg(long, short, visible_alias = "rpc-url", value_name = "URL")]
    pub fork_url: Option<String>,

    /// Fetch state from a specific block number over a remote endpoint.
    ///
    /// See --fork-url. Without this the fork tracks the latest remote block and remote responses
    /// are not cached.
    #[arg(long, requires = "fork_url", value_name = "BLOCK")]
    pub fork_block_number: Option<u64>,

    /// The balance of every dev account, in whole ether.
    #[arg(long, default_value_t = 10_000, value_name = "NUM")]
    pub balance: u64,

    /// The chain ID.
    #[arg(long, default_value_t = CHAIN_ID, value_name = "NUM")]
    pub chain_id: u64,

    /// The project-local cache directory.
    #[arg(long, default_value = "cache", value_name = "PATH")]
    pub cache_dir: PathBuf,

    /// Don't print anything on startup.
    #[arg(long)]
    pub silent: bool,
}

impl NodeArgs {
    pub fn into_node_config(self) -> NodeConfig {
        let mut config = NodeConfig::default()
            .with_host(self.host)
            .with_port(self.port)
            .with_network(self.network)
            .with_eth_rpc_url(self.fork_url)
            .with_fork_block_number(self.fork_block_number)
            .with_genesis_balance(
                U256::from(self.balance) * U256::from(10u64).pow(U256::from(18u64)),
            )
            .with_cache_dir(self.cache_dir);
        config.chain_id = self.chain_id;
        if self.silent {
            config = config.silent();
        }
        config
    }

    /// Starts the node and runs until the server stopped or ctrl-c was received
    pub async fn run(self) -> Result<(), NodeError> {
        let (_api, mut handle) = spawn(self.into_node_config()).await?;

        tokio::select! {
            res = &mut handle => res,
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown();
                handle.await
            }
        }
    }
}
