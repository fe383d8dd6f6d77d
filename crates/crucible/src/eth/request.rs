//! Incoming rpc calls, tagged by method name

use crate::eth::serde_helpers::*;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer};

/// The block parameter of a read call.
///
/// Accepted for wire compatibility; all reads are answered against the emulated state as of the
/// pinned fork block, so the parameter carries no meaning here.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BlockId {
    Number(u64),
    Tag(String),
}

/// Represents all rpc requests the node handles
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum EthRequest {
    #[serde(rename = "web3_clientVersion", with = "empty_params")]
    Web3ClientVersion(()),

    #[serde(rename = "net_version", with = "empty_params")]
    NetVersion(()),

    #[serde(rename = "eth_chainId", with = "empty_params")]
    EthChainId(()),

    #[serde(rename = "eth_accounts", with = "empty_params")]
    EthAccounts(()),

    #[serde(rename = "eth_blockNumber", with = "empty_params")]
    EthBlockNumber(()),

    #[serde(rename = "eth_getBalance")]
    EthGetBalance(Address, #[serde(default)] Option<BlockId>),

    #[serde(rename = "eth_getTransactionCount")]
    EthGetTransactionCount(Address, #[serde(default)] Option<BlockId>),

    #[serde(rename = "eth_getCode")]
    EthGetCodeAt(Address, #[serde(default)] Option<BlockId>),

    #[serde(rename = "eth_getStorageAt")]
    EthGetStorageAt(
        Address,
        #[serde(deserialize_with = "deserialize_number")] U256,
        #[serde(default)] Option<BlockId>,
    ),

    /// Re-points or disables the fork, dropping all local modifications
    #[serde(rename = "crucible_reset", alias = "hardhat_reset")]
    Reset(#[serde(default)] Option<Params<Option<Forking>>>),

    #[serde(
        rename = "crucible_impersonateAccount",
        alias = "hardhat_impersonateAccount",
        with = "sequence"
    )]
    ImpersonateAccount(Address),

    #[serde(
        rename = "crucible_stopImpersonatingAccount",
        alias = "hardhat_stopImpersonatingAccount",
        with = "sequence"
    )]
    StopImpersonatingAccount(Address),

    #[serde(rename = "crucible_setBalance", alias = "hardhat_setBalance")]
    SetBalance(Address, #[serde(deserialize_with = "deserialize_number")] U256),

    #[serde(rename = "crucible_setNonce", alias = "hardhat_setNonce")]
    SetNonce(Address, #[serde(deserialize_with = "deserialize_number")] U256),

    #[serde(rename = "crucible_setCode", alias = "hardhat_setCode")]
    SetCode(Address, Bytes),

    #[serde(rename = "crucible_setStorageAt", alias = "hardhat_setStorageAt")]
    SetStorageAt(
        Address,
        #[serde(deserialize_with = "deserialize_number")] U256,
        B256,
    ),

    /// Registers a compiler run `(version, input document, output document)`
    #[serde(rename = "crucible_addCompilationResult", alias = "hardhat_addCompilationResult")]
    AddCompilationResult(String, serde_json::Value, serde_json::Value),
}

/// Represents the params to set forking which can take various forms
///  - untagged
///  - tagged `forking`
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Forking {
    pub json_rpc_url: Option<String>,
    pub block_number: Option<u64>,
}

impl<'de> Deserialize<'de> for Forking {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ForkOpts {
            pub json_rpc_url: Option<String>,
            pub block_number: Option<u64>,
        }

        #[derive(Deserialize)]
        struct Tagged {
            forking: ForkOpts,
        }
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ForkingVariants {
            Tagged(Tagged),
            Fork(ForkOpts),
        }
        let f = match ForkingVariants::deserialize(deserializer)? {
            ForkingVariants::Fork(ForkOpts { json_rpc_url, block_number }) => {
                Forking { json_rpc_url, block_number }
            }
            ForkingVariants::Tagged(f) => Forking {
                json_rpc_url: f.forking.json_rpc_url,
                block_number: f.forking.block_number,
            },
        };
        Ok(f)
    }
}

impl EthRequest {
    /// Extracts the [Forking] request of a `Reset` variant, flattening the param wrappers
    pub fn into_forking(self) -> Option<Forking> {
        match self {
            Self::Reset(params) => params.and_then(|p| p.params),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_deserialize_get_balance() {
        let s = r#"{"method": "eth_getBalance", "params": ["0xd84de507f3fada7df80908082d3239466db55a71", "latest"]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert!(matches!(req, EthRequest::EthGetBalance(_, Some(BlockId::Tag(_)))));

        let s = r#"{"method": "eth_getBalance", "params": ["0xd84de507f3fada7df80908082d3239466db55a71"]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert!(matches!(req, EthRequest::EthGetBalance(_, None)));
    }

    #[test]
    fn can_deserialize_storage_read() {
        let s = r#"{"method": "eth_getStorageAt", "params": ["0xd84de507f3fada7df80908082d3239466db55a71", "0x0", "0x10"]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        match req {
            EthRequest::EthGetStorageAt(_, slot, Some(BlockId::Tag(tag))) => {
                assert_eq!(slot, U256::ZERO);
                assert_eq!(tag, "0x10");
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn can_deserialize_set_balance() {
        let s = r#"{"method": "crucible_setBalance", "params": ["0xd84de507f3fada7df80908082d3239466db55a71", "0xde0b6b3a7640000"]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert!(matches!(req, EthRequest::SetBalance(..)));

        // decimal balances are accepted too
        let s = r#"{"method": "hardhat_setBalance", "params": ["0xd84de507f3fada7df80908082d3239466db55a71", 1337]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        match req {
            EthRequest::SetBalance(_, balance) => assert_eq!(balance, U256::from(1337u64)),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn hardhat_aliases_map_to_same_variants() {
        let s = r#"{"method": "hardhat_impersonateAccount", "params": ["0xd84de507f3fada7df80908082d3239466db55a71"]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert!(matches!(req, EthRequest::ImpersonateAccount(_)));

        let s = r#"{"method": "hardhat_stopImpersonatingAccount", "params": ["0xd84de507f3fada7df80908082d3239466db55a71"]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert!(matches!(req, EthRequest::StopImpersonatingAccount(_)));
    }

    #[test]
    fn can_deserialize_reset_variants() {
        let s = r#"{"method": "crucible_reset", "params": [{"forking": {"jsonRpcUrl": "https://archive.example", "blockNumber": 11095000}}]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        let forking = req.into_forking().unwrap();
        assert_eq!(forking.json_rpc_url.as_deref(), Some("https://archive.example"));
        assert_eq!(forking.block_number, Some(11095000));

        // untagged form
        let s = r#"{"method": "hardhat_reset", "params": [{"jsonRpcUrl": "https://archive.example"}]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        let forking = req.into_forking().unwrap();
        assert_eq!(forking.json_rpc_url.as_deref(), Some("https://archive.example"));
        assert_eq!(forking.block_number, None);

        // no params disables forking
        let s = r#"{"method": "crucible_reset"}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert_eq!(req.clone().into_forking(), None);
        assert!(matches!(req, EthRequest::Reset(None)));

        // so does an empty params array
        let s = r#"{"method": "hardhat_reset", "params": []}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        assert_eq!(req.into_forking(), None);
    }

    #[test]
    fn can_deserialize_add_compilation_result() {
        let s = r#"{"method": "crucible_addCompilationResult", "params": ["0.8.21", {"language": "Solidity"}, {"contracts": {}}]}"#;
        let req: EthRequest = serde_json::from_str(s).unwrap();
        match req {
            EthRequest::AddCompilationResult(version, input, output) => {
                assert_eq!(version, "0.8.21");
                assert!(input.get("language").is_some());
                assert!(output.get("contracts").is_some());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        let s = r#"{"method": "eth_sendTransaction", "params": []}"#;
        let res = serde_json::from_str::<EthRequest>(s);
        let err = res.unwrap_err().to_string();
        assert!(err.contains("unknown variant"));
    }
}
