//! A local EVM emulation node that can mirror the state of a remote chain as of a pinned block,
//! serve JSON-RPC requests against that emulated state and pick up freshly produced compiler
//! artifacts so debugging tools can map execution back to source.
//!
//! The entry point is [spawn]:
//!
//! ```no_run
//! use crucible::{spawn, NodeConfig};
//!
//! # async fn run() -> Result<(), crucible::NodeError> {
//! let (api, handle) = spawn(NodeConfig::test()).await?;
//! println!("dev accounts: {:?}", api.backend().genesis().addresses());
//! handle.await?;
//! # Ok(())
//! # }
//! ```

use crate::{server::HttpEthRpcHandler, sync::ArtifactSyncService};
use futures::FutureExt;
use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{info, warn};

#[cfg(feature = "cli")]
pub mod args;
pub mod cache;
pub mod config;
pub mod error;
pub mod eth;
pub mod fork;
pub mod server;
pub mod sync;

pub use config::{NodeConfig, CHAIN_ID, NETWORK_NAME, NODE_PORT};
pub use error::NodeError;
pub use eth::EthApi;

/// Creates the node and spawns the server plus all background tasks.
///
/// Returns the rpc surface for programmatic access and a [NodeHandle] that resolves once the
/// server stopped. Constructing the node performs no remote I/O, a configured fork first touches
/// the remote endpoint when an rpc call needs remote chain state.
pub async fn spawn(config: NodeConfig) -> Result<(EthApi, NodeHandle), NodeError> {
    config.check_network()?;

    let backend = Arc::new(eth::backend::Backend::new(
        config.fork_config(),
        config.genesis(),
        Some(config.cache_file_path()),
    ));
    let api = EthApi::new(backend, config.chain_id);

    let addr = config.socket_addr();
    let listener =
        TcpListener::bind(addr).await.map_err(|source| NodeError::Bind { addr, source })?;
    let local_addr = listener.local_addr().map_err(NodeError::wrap)?;
    info!(target: "node", "listening on {local_addr}");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handler = HttpEthRpcHandler::new(api.clone());
    let server = tokio::spawn(crucible_server::serve_on(listener, handler, async move {
        shutdown_rx.await.ok();
    }));

    // a watcher that cannot start is not fatal, the node serves without it
    match ArtifactSyncService::new(config.artifact_sync_config(local_addr)) {
        Ok(service) => {
            tokio::spawn(service);
        }
        Err(err) => warn!(target: "node", %err, "artifact watcher disabled"),
    }

    config.print_startup(api.backend().genesis(), local_addr);

    Ok((api, NodeHandle { local_addr, server, shutdown: Some(shutdown_tx) }))
}

/// A handle to the spawned node, resolves once the server stopped
#[derive(Debug)]
pub struct NodeHandle {
    local_addr: SocketAddr,
    server: JoinHandle<std::io::Result<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl NodeHandle {
    /// The address the server is listening on
    pub fn socket_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The http endpoint of the node
    pub fn http_endpoint(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Tells the server to stop accepting connections and drain in-flight requests
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Future for NodeHandle {
    type Output = Result<(), NodeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let res = futures::ready!(self.server.poll_unpin(cx));
        Poll::Ready(match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(NodeError::wrap(err)),
            Err(err) => Err(NodeError::wrap(err)),
        })
    }
}
