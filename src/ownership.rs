//! Token ownership lookup
//!
//! The NFTCloner contract maps each holder to the single token they own via
//! `tokenByOwner(address) returns (uint256)`. The function is declared once
//! as data below; selector, call data and result decoding derive from it.
//! Sending the call is left to the [`TokenOwnership`] implementation.

use ethers_core::types::U256;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::eip712::Address;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::crypto::{keccak256, strip_hex_prefix};

/// A view function taking one address and returning one uint256
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractFunction {
    pub name: &'static str,
    pub input_name: &'static str,
    /// Bumped whenever the deployed contract's ABI for this function changes
    pub abi_version: u32,
}

impl ContractFunction {
    pub const TOKEN_BY_OWNER: ContractFunction = ContractFunction {
        name: "tokenByOwner",
        input_name: "_owner",
        abi_version: 1,
    };

    /// Canonical signature, e.g. `tokenByOwner(address)`
    pub fn signature(&self) -> String {
        format!("{}(address)", self.name)
    }

    /// First 4 bytes of keccak256(signature)
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// JSON ABI fragment for this function
    pub fn abi_json(&self) -> Value {
        json!([{
            "inputs": [{"internalType": "address", "name": self.input_name, "type": "address"}],
            "name": self.name,
            "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }])
    }

    /// selector || address left-padded to 32 bytes
    pub fn encode_call(&self, owner: &Address) -> Vec<u8> {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&self.selector());
        data.extend_from_slice(&owner.to_word());
        data
    }

    /// JSON-RPC body for an `eth_call` against `contract` at the latest block
    pub fn eth_call_request(&self, contract: &Address, owner: &Address, id: u64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{
                "from": owner.to_checksum(),
                "to": contract.to_checksum(),
                "data": format!("0x{}", hex::encode(self.encode_call(owner))),
            }, "latest"],
            "id": id,
        })
    }

    /// Decode the hex-encoded uint256 return value
    ///
    /// Returns `None` for an empty result (no code at the address or a
    /// reverting call on some nodes).
    pub fn decode_uint_output(&self, output: &str) -> ServiceResult<Option<U256>> {
        let digits = strip_hex_prefix(output.trim());
        if digits.is_empty() {
            return Ok(None);
        }

        let bytes = hex::decode(digits)?;
        if bytes.len() != 32 {
            return Err(ServiceError::network(format!(
                "{} returned {} bytes, expected 32",
                self.name,
                bytes.len()
            )));
        }
        Ok(Some(U256::from_big_endian(&bytes)))
    }
}

/// Looks up the token a holder owns
pub trait TokenOwnership: Send + Sync {
    /// `None` means the address holds no token and is not authorized
    fn token_of_owner(&self, owner: &Address) -> ServiceResult<Option<U256>>;
}

/// JSON-RPC error code for a reverted execution
const RPC_EXECUTION_ERROR: i64 = 3;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl ContractFunction {
    /// Interpret a node's reply to [`ContractFunction::eth_call_request`]
    ///
    /// A reverted call means the contract refused the lookup and yields `None`.
    pub fn decode_eth_call_response(&self, response: &Value) -> ServiceResult<Option<U256>> {
        let response: RpcResponse = serde_json::from_value(response.clone())?;

        if let Some(error) = response.error {
            if error.code == RPC_EXECUTION_ERROR || error.message.contains("revert") {
                return Ok(None);
            }
            return Err(ServiceError::network(format!(
                "eth_call failed ({}): {}",
                error.code, error.message
            )));
        }

        match response.result {
            Some(output) => self.decode_uint_output(&output),
            None => Err(ServiceError::network("eth_call returned neither result nor error")),
        }
    }
}
