//! Background service that feeds fresh compiler artifacts back into the node

use crate::error::NodeError;
use alloy_primitives::{keccak256, B256};
use futures::{future::BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::{
    fs,
    future::Future,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, SystemTime},
};
use tokio::time::Interval;
use tracing::{trace, warn};

/// Where the watcher looks and where it reports to
#[derive(Clone, Debug)]
pub struct ArtifactSyncConfig {
    /// the artifact pair to observe
    pub pair: PendingArtifactPair,
    pub poll_interval: Duration,
    /// how long the output file must sit unchanged before the pair counts as complete
    pub stability_threshold: Duration,
    /// the node's own http endpoint
    pub endpoint: String,
}

impl ArtifactSyncConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
    pub const DEFAULT_STABILITY_THRESHOLD: Duration = Duration::from_millis(500);
}

/// A compiler artifact pair as written by the compiler.
///
/// The files are observed, never owned: the pair only forms a complete unit once both documents
/// exist on disk at the same time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingArtifactPair {
    /// the compiler input document
    pub input_path: PathBuf,
    /// the compiler output document, its mtime drives the settle window
    pub output_path: PathBuf,
}

/// Pulls the compiler version out of the output document
pub fn extract_compiler_version(output: &Value) -> String {
    output
        .get("solcVersion")
        .or_else(|| output.get("version"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Content fingerprint of a pair, used to suppress duplicate notifications
pub fn pair_fingerprint(input: &[u8], output: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(input.len() + output.len());
    buf.extend_from_slice(input);
    buf.extend_from_slice(output);
    keccak256(&buf)
}

/// A completed pair, read and fingerprinted
struct CompletedPair {
    version: String,
    input: Value,
    output: Value,
    fingerprint: B256,
}

/// Watches a compiler artifact pair and notifies the node when a new one lands.
///
/// Modeled as a never-ending [Future] polled by a spawned task. Each tick stats the output file;
/// a pair counts as complete once the output sat unchanged for the settle window and both files
/// exist. Notifications are fire and forget, a failed POST is logged and never retried, and at
/// most one notification is in flight at a time.
#[must_use = "futures do nothing unless polled"]
pub struct ArtifactSyncService {
    config: ArtifactSyncConfig,
    interval: Interval,
    client: reqwest::Client,
    /// fingerprint of the last pair we notified about
    last_fingerprint: Option<B256>,
    /// the currently running notification, if any
    in_flight: Option<BoxFuture<'static, ()>>,
}

impl ArtifactSyncService {
    /// Creates the service, making sure the artifact directory is reachable
    pub fn new(config: ArtifactSyncConfig) -> Result<Self, NodeError> {
        if let Some(parent) = config.pair.output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| NodeError::WatchStart(format!("{}: {err}", parent.display())))?;
        }
        let interval = tokio::time::interval(config.poll_interval);
        Ok(Self {
            config,
            interval,
            client: reqwest::Client::new(),
            last_fingerprint: None,
            in_flight: None,
        })
    }

    /// Checks the artifact pair on disk, returning it when complete and settled.
    ///
    /// An absent file is a no-op, the pair only counts once both documents are present and the
    /// output was last written longer than the stability threshold ago.
    fn poll_artifacts(&self) -> Option<CompletedPair> {
        let meta = fs::metadata(&self.config.pair.output_path).ok()?;
        let modified = meta.modified().ok()?;
        let settled = SystemTime::now()
            .duration_since(modified)
            .map(|age| age >= self.config.stability_threshold)
            .unwrap_or(false);
        if !settled {
            trace!(target: "sync", "output file still settling");
            return None;
        }

        let input_bytes = fs::read(&self.config.pair.input_path).ok()?;
        let output_bytes = fs::read(&self.config.pair.output_path).ok()?;
        let fingerprint = pair_fingerprint(&input_bytes, &output_bytes);

        let input: Value = match serde_json::from_slice(&input_bytes) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(target: "sync", ?err, "failed to parse compiler input");
                return None;
            }
        };
        let output: Value = match serde_json::from_slice(&output_bytes) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(target: "sync", ?err, "failed to parse compiler output");
                return None;
            }
        };

        let version = extract_compiler_version(&output);
        Some(CompletedPair { version, input, output, fingerprint })
    }

    /// Builds the fire and forget notification for a completed pair
    fn notify(&self, pair: CompletedPair) -> BoxFuture<'static, ()> {
        let client = self.client.clone();
        let endpoint = self.config.endpoint.clone();
        async move {
            let body = json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "crucible_addCompilationResult",
                "params": [pair.version, pair.input, pair.output],
            });
            match client.post(&endpoint).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    trace!(target: "sync", version = %pair.version, "registered compilation result");
                }
                Ok(resp) => {
                    warn!(target: "sync", status = %resp.status(), "compilation notification rejected");
                }
                Err(err) => {
                    warn!(target: "sync", ?err, "failed to deliver compilation notification");
                }
            }
        }
        .boxed()
    }
}

impl Future for ArtifactSyncService {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pin = self.get_mut();

        loop {
            // finish the current notification before looking for new work, notifications never
            // overlap
            if let Some(mut notification) = pin.in_flight.take() {
                if notification.poll_unpin(cx).is_pending() {
                    pin.in_flight = Some(notification);
                    return Poll::Pending;
                }
            }

            if pin.interval.poll_tick(cx).is_pending() {
                return Poll::Pending;
            }

            if let Some(pair) = pin.poll_artifacts() {
                if pin.last_fingerprint != Some(pair.fingerprint) {
                    pin.last_fingerprint = Some(pair.fingerprint);
                    pin.in_flight = Some(pin.notify(pair));
                }
            }
        }
    }
}
