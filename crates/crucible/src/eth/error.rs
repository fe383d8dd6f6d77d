//! Errors that can occur while handling rpc requests

use crucible_rpc::{error::RpcError, response::ResponseResult};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

pub(crate) type Result<T> = std::result::Result<T, BlockchainError>;

/// Errors raised while answering a single rpc request, never fatal to the node
#[derive(Debug, thiserror::Error)]
pub enum BlockchainError {
    /// A required remote lookup failed, carries the request that failed
    #[error("failed to fetch `{method}` from remote endpoint: {message}")]
    RemoteFetch { method: String, params: Value, message: String },
    #[error("invalid fork url: {0}")]
    InvalidUrl(String),
    #[error("Rpc error {0:?}")]
    RpcError(RpcError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RpcError> for BlockchainError {
    fn from(err: RpcError) -> Self {
        Self::RpcError(err)
    }
}

/// Helper trait to easily convert results to rpc results
pub(crate) trait ToRpcResponseResult {
    fn to_rpc_result(self) -> ResponseResult;
}

/// Converts a serializable value into a `ResponseResult`
pub fn to_rpc_result<T: Serialize>(val: T) -> ResponseResult {
    match serde_json::to_value(val) {
        Ok(success) => ResponseResult::Success(success),
        Err(err) => {
            error!(target: "rpc", ?err, "failed to serialize rpc response");
            ResponseResult::error(RpcError::internal_error())
        }
    }
}

impl<T: Serialize> ToRpcResponseResult for Result<T> {
    fn to_rpc_result(self) -> ResponseResult {
        match self {
            Ok(val) => to_rpc_result(val),
            Err(err) => match err {
                BlockchainError::RpcError(err) => err,
                err @ BlockchainError::RemoteFetch { .. } => {
                    RpcError::internal_error_with(err.to_string())
                }
                BlockchainError::InvalidUrl(err) => RpcError::invalid_params(err),
                BlockchainError::Internal(err) => RpcError::internal_error_with(err),
            }
            .into(),
        }
    }
}
