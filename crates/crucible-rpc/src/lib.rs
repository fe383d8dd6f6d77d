//! JSON-RPC 2.0 types as used by the crucible node

pub mod error;
pub mod request;
pub mod response;
