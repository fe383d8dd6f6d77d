pub mod api;
pub mod backend;
pub mod error;
pub mod request;
pub mod serde_helpers;

pub use api::EthApi;
