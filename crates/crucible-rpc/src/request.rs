//! JSON-RPC request bindings

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Version of the JSON-RPC protocol, only `2.0` is supported
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    #[serde(rename = "2.0")]
    V2,
}

/// Id of a JSON-RPC request
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(i64),
    Null,
}

impl Default for Id {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => s.fmt(f),
            Self::Number(n) => n.fmt(f),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Params of a method call, either none, positional or named
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestParams {
    #[default]
    None,
    Array(Vec<Value>),
    Object(serde_json::Map<String, Value>),
}

impl From<RequestParams> for Value {
    fn from(params: RequestParams) -> Self {
        match params {
            RequestParams::None => Self::Null,
            RequestParams::Array(arr) => arr.into(),
            RequestParams::Object(obj) => obj.into(),
        }
    }
}

/// A complete method call, including the request id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcMethodCall {
    pub jsonrpc: Version,
    pub method: String,
    #[serde(default)]
    pub params: RequestParams,
    pub id: Id,
}

impl RpcMethodCall {
    pub fn id(&self) -> Id {
        self.id.clone()
    }
}

/// A method call without an id, the server sends no response for these
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcNotification {
    pub jsonrpc: Option<Version>,
    pub method: String,
    #[serde(default)]
    pub params: RequestParams,
}

/// A single JSON-RPC call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcCall {
    MethodCall(RpcMethodCall),
    Notification(RpcNotification),
    /// A request that could not be parsed into one of the above, the id is
    /// carried over into the error response if it was present
    Invalid {
        #[serde(default)]
        id: Id,
    },
}

/// A JSON-RPC request, either a single call or a batch of calls
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Request {
    Single(RpcCall),
    Batch(Vec<RpcCall>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_deserialize_method_call() {
        let s = r#"{"jsonrpc":"2.0","method":"eth_chainId","params":[],"id":1}"#;
        let req: Request = serde_json::from_str(s).unwrap();
        match req {
            Request::Single(RpcCall::MethodCall(call)) => {
                assert_eq!(call.method, "eth_chainId");
                assert_eq!(call.id, Id::Number(1));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn can_deserialize_call_without_params() {
        let s = r#"{"jsonrpc":"2.0","method":"eth_accounts","id":"a"}"#;
        let req: Request = serde_json::from_str(s).unwrap();
        match req {
            Request::Single(RpcCall::MethodCall(call)) => {
                assert_eq!(call.params, RequestParams::None);
                assert_eq!(call.id, Id::String("a".to_string()));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn can_deserialize_batch() {
        let s = r#"[
            {"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1},
            {"jsonrpc":"2.0","method":"eth_subscription","params":[]}
        ]"#;
        let req: Request = serde_json::from_str(s).unwrap();
        match req {
            Request::Batch(calls) => {
                assert_eq!(calls.len(), 2);
                assert!(matches!(calls[0], RpcCall::MethodCall(_)));
                assert!(matches!(calls[1], RpcCall::Notification(_)));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn invalid_call_keeps_the_id() {
        let s = r#"{"id":7}"#;
        let req: Request = serde_json::from_str(s).unwrap();
        match req {
            Request::Single(RpcCall::Invalid { id }) => assert_eq!(id, Id::Number(7)),
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
