//! EIP-712 Hashing
//!
//! Implements domain separator and struct hashing for EIP-712.

use super::encoder::encode_data;
use super::types::*;
use crate::utils::crypto::{keccak256, keccak256_concat};
use serde_json::Value;

/// Magic prefix for EIP-712 encoding
const EIP712_PREFIX: &[u8] = b"\x19\x01";

/// Calculate the domain separator hash
///
/// domainSeparator = hashStruct(eip712Domain), always under the pinned
/// domain schema from [`Eip712Domain::fields`]
pub fn domain_separator(domain: &Eip712Domain) -> Result<[u8; 32], Eip712Error> {
    hash_struct(Eip712Domain::TYPE_NAME, &domain.to_value(), &Eip712Domain::schema())
}

/// Hash a struct according to EIP-712
///
/// hashStruct(s) = keccak256(typeHash || encodeData(s))
pub fn hash_struct(type_name: &str, data: &Value, types: &TypeSchema) -> Result<[u8; 32], Eip712Error> {
    types.validate(type_name)?;
    let encoded = encode_data(type_name, data, types, type_name)?;
    Ok(keccak256(&encoded))
}

/// Combine the two struct hashes into the value that gets signed
///
/// digest = keccak256("\x19\x01" || domainSeparator || hashStruct(message))
pub fn typed_data_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> Digest {
    Digest::new(keccak256_concat(&[
        EIP712_PREFIX,
        &domain_separator[..],
        &struct_hash[..],
    ]))
}

/// Calculate the final EIP-712 hash from its separate inputs
pub fn hash_typed_data_parts(
    primary_type: &str,
    domain: &Eip712Domain,
    types: &TypeSchema,
    message: &Value,
) -> Result<Digest, Eip712Error> {
    Ok(get_pre_image_parts(primary_type, domain, types, message)?.final_hash)
}

/// Calculate the final EIP-712 hash for signing
pub fn hash_typed_data(typed_data: &TypedData) -> Result<Digest, Eip712Error> {
    hash_typed_data_parts(
        &typed_data.primary_type,
        &typed_data.domain,
        &typed_data.types,
        &typed_data.message,
    )
}

/// Get the pre-image components (for external signing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip712PreImage {
    pub domain_separator: [u8; 32],
    pub struct_hash: [u8; 32],
    pub final_hash: Digest,
}

/// Calculate the pre-image components for EIP-712
pub fn get_pre_image(typed_data: &TypedData) -> Result<Eip712PreImage, Eip712Error> {
    get_pre_image_parts(
        &typed_data.primary_type,
        &typed_data.domain,
        &typed_data.types,
        &typed_data.message,
    )
}

fn get_pre_image_parts(
    primary_type: &str,
    domain: &Eip712Domain,
    types: &TypeSchema,
    message: &Value,
) -> Result<Eip712PreImage, Eip712Error> {
    types.check_domain_type()?;
    let struct_hash = hash_struct(primary_type, message, types)?;
    let domain_separator = domain_separator(domain)?;
    let final_hash = typed_data_digest(&domain_separator, &struct_hash);

    Ok(Eip712PreImage {
        domain_separator,
        struct_hash,
        final_hash,
    })
}
