//! Startup and orchestration errors

use std::net::SocketAddr;

/// Errors that can happen while bringing up or running the node
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The node configuration was rejected before anything was started
    #[error("configuration error: {0}")]
    Config(String),
    /// The listener could not be bound, e.g. the port is already taken
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The artifact watcher could not be started, non-fatal
    #[error("failed to start artifact watcher: {0}")]
    WatchStart(String),
    /// Any other server error, wrapped once with the original message preserved
    #[error("{0}")]
    Server(String),
}

impl NodeError {
    /// Wraps an unrecognized error into [`NodeError::Server`], preserving the original message.
    ///
    /// Callers only reach for this at the orchestration boundary, errors that already are a
    /// [`NodeError`] are propagated with `?` instead of being passed through here.
    pub fn wrap<E: std::fmt::Display>(err: E) -> Self {
        Self::Server(err.to_string())
    }
}
