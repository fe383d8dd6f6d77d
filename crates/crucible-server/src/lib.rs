//! Bootstrap [axum] JSON-RPC servers

use axum::{routing::post, Router};
use crucible_rpc::{
    error::RpcError,
    request::RpcMethodCall,
    response::{ResponseResult, RpcResponse},
};
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::trace;

mod handler;

/// Handler for a JSON-RPC server.
///
/// Types implementing this only need to provide [`RpcHandler::on_request`], the
/// deserialization of the raw [`RpcMethodCall`] is handled by the default
/// [`RpcHandler::on_call`] implementation.
#[async_trait::async_trait]
pub trait RpcHandler: Clone + Send + Sync + 'static {
    /// The request type to expect
    type Request: DeserializeOwned + Send + Sync + std::fmt::Debug;

    /// Invoked when the request was received
    async fn on_request(&self, request: Self::Request) -> ResponseResult;

    /// Invoked for every incoming `RpcMethodCall`
    ///
    /// This will attempt to deserialize a `{ "method" : "<name>", "params": "<params>" }` message
    /// into the `Request` type of this handler. If a `Request` instance was deserialized
    /// successfully, [`Self::on_request`] will be invoked.
    ///
    /// **Note**: override this function if the expected `Request` deviates from `{ "method" :
    /// "<name>", "params": "<params>" }`
    async fn on_call(&self, call: RpcMethodCall) -> RpcResponse {
        trace!(target: "rpc", id = ?call.id, method = ?call.method, "received method call");
        let RpcMethodCall { method, params, id, .. } = call;

        let params: serde_json::Value = params.into();
        let call = serde_json::json!({ "method": &method, "params": params });

        match serde_json::from_value::<Self::Request>(call) {
            Ok(req) => {
                let result = self.on_request(req).await;
                RpcResponse::new(id, result)
            }
            Err(err) => {
                let err = err.to_string();
                // since the Request enum is tagged by the method name, a `method` that is not
                // present in the enum surfaces as an unknown variant error
                if err.contains("unknown variant") {
                    trace!(target: "rpc", ?method, "failed to deserialize method due to unknown variant");
                    RpcResponse::new(id, RpcError::method_not_found())
                } else {
                    trace!(target: "rpc", ?method, ?err, "failed to deserialize method");
                    RpcResponse::new(id, RpcError::invalid_params(err))
                }
            }
        }
    }
}

/// Configures an [`Router`] that handles JSON-RPC calls via HTTP at the root path
pub fn http_router<Http>(http: Http) -> Router
where
    Http: RpcHandler,
{
    Router::new()
        .route("/", post(handler::handle::<Http>))
        .layer(TraceLayer::new_for_http())
        .with_state(http)
}

/// Serves the JSON-RPC handler on the already bound listener until the
/// `shutdown` future resolves
pub async fn serve_on<Http>(
    listener: TcpListener,
    http: Http,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()>
where
    Http: RpcHandler,
{
    axum::serve(listener, http_router(http).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}
