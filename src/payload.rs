//! The `UpdateMetadata` signed payload
//!
//! Clients sign `UpdateMetadata(address contract,uint256 tokenId)` under the
//! service's signing domain to prove they want the metadata of `tokenId` on
//! `contract` cloned into the token they own.

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eip712::{
    hash_typed_data_parts, recover_typed_data_signer, sign_hash, verify_typed_data_signer,
    Address, Digest, Eip712Domain, Eip712Error, Eip712Signature, TypeSchema, TypedData,
    TypedDataField,
};

/// The message clients sign to request a metadata update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadata {
    pub contract: Address,
    #[serde(with = "crate::eip712::types::uint256_serde")]
    pub token_id: U256,
}

impl UpdateMetadata {
    pub const PRIMARY_TYPE: &'static str = "UpdateMetadata";

    pub fn new(contract: Address, token_id: impl Into<U256>) -> Self {
        Self {
            contract,
            token_id: token_id.into(),
        }
    }

    /// Field order and types are part of the wire format
    pub fn fields() -> Vec<TypedDataField> {
        vec![
            TypedDataField::new("contract", "address"),
            TypedDataField::new("tokenId", "uint256"),
        ]
    }

    pub fn schema() -> TypeSchema {
        TypeSchema::new().with_type(Self::PRIMARY_TYPE, Self::fields())
    }

    pub fn to_message(&self) -> Value {
        serde_json::json!({
            "contract": self.contract.to_checksum(),
            "tokenId": self.token_id.to_string(),
        })
    }

    /// The full typed-data document a wallet is asked to sign
    pub fn to_typed_data(&self, domain: &Eip712Domain) -> TypedData {
        let mut types = Self::schema();
        types.insert(Eip712Domain::TYPE_NAME, Eip712Domain::fields());

        TypedData {
            types,
            primary_type: Self::PRIMARY_TYPE.to_string(),
            domain: domain.clone(),
            message: self.to_message(),
        }
    }

    pub fn digest(&self, domain: &Eip712Domain) -> Result<Digest, Eip712Error> {
        hash_typed_data_parts(Self::PRIMARY_TYPE, domain, &Self::schema(), &self.to_message())
    }

    pub fn sign(&self, domain: &Eip712Domain, private_key: &[u8]) -> Result<Eip712Signature, Eip712Error> {
        sign_hash(&self.digest(domain)?, private_key)
    }

    /// Recover the address that signed this payload under `domain`
    pub fn recover_signer(&self, domain: &Eip712Domain, signature: &[u8]) -> Result<Address, Eip712Error> {
        recover_typed_data_signer(
            Self::PRIMARY_TYPE,
            domain,
            &Self::schema(),
            &self.to_message(),
            signature,
        )
    }

    /// Fails with `SignerMismatch` unless `expected` signed this payload
    pub fn verify_signer(
        &self,
        domain: &Eip712Domain,
        signature: &[u8],
        expected: &Address,
    ) -> Result<Address, Eip712Error> {
        verify_typed_data_signer(
            Self::PRIMARY_TYPE,
            domain,
            &Self::schema(),
            &self.to_message(),
            signature,
            expected,
        )
    }
}
