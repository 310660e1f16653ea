//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data signing.

use ethers_core::types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::utils::crypto::{strip_hex_prefix, to_checksum_address};

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedDataField {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "Person[]")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypedDataField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Struct type definitions, keyed by type name.
///
/// Field order inside each struct is part of the hash input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeSchema(BTreeMap<String, Vec<TypedDataField>>);

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a struct definition
    pub fn with_type(mut self, name: impl Into<String>, fields: Vec<TypedDataField>) -> Self {
        self.insert(name, fields);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, fields: Vec<TypedDataField>) {
        self.0.insert(name.into(), fields);
    }

    pub fn get(&self, name: &str) -> Option<&[TypedDataField]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// A declared `EIP712Domain` must match the pinned domain struct exactly.
    ///
    /// The domain separator is always computed under [`Eip712Domain::fields`];
    /// a document declaring anything else would be signed under a different
    /// separator than the one computed here.
    pub fn check_domain_type(&self) -> Result<(), Eip712Error> {
        match self.get(Eip712Domain::TYPE_NAME) {
            Some(declared) if declared != Eip712Domain::fields().as_slice() => {
                Err(Eip712Error::SchemaError(format!(
                    "EIP712Domain must be declared as {}",
                    Eip712Domain::type_string()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Check every struct reachable from `primary_type`.
    ///
    /// Fails when a referenced type is not declared, a type tag is malformed,
    /// a struct declares the same field twice, or struct references form a cycle.
    pub fn validate(&self, primary_type: &str) -> Result<(), Eip712Error> {
        if !self.contains(primary_type) {
            return Err(Eip712Error::SchemaError(format!(
                "primary type {} is not declared",
                primary_type
            )));
        }

        let mut path = Vec::new();
        let mut checked = HashSet::new();
        self.check_struct(primary_type, &mut path, &mut checked)
    }

    fn check_struct<'a>(
        &'a self,
        type_name: &'a str,
        path: &mut Vec<&'a str>,
        checked: &mut HashSet<&'a str>,
    ) -> Result<(), Eip712Error> {
        if checked.contains(type_name) {
            return Ok(());
        }
        if path.contains(&type_name) {
            path.push(type_name);
            return Err(Eip712Error::SchemaError(format!(
                "cyclic type reference: {}",
                path.join(" -> ")
            )));
        }

        let fields = self.get(type_name).ok_or_else(|| {
            Eip712Error::SchemaError(format!("type {} is not declared", type_name))
        })?;

        path.push(type_name);
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Eip712Error::SchemaError(format!(
                    "duplicate field {}.{}",
                    type_name, field.name
                )));
            }

            let base = base_type(&field.type_name)?;
            if is_atomic_type(base) || is_dynamic_type(base) {
                continue;
            }
            if !is_struct_name(base) {
                return Err(Eip712Error::SchemaError(format!(
                    "invalid type {} for field {}.{}",
                    field.type_name, type_name, field.name
                )));
            }
            self.check_struct(base, path, checked)?;
        }
        path.pop();
        checked.insert(type_name);

        Ok(())
    }
}

impl FromIterator<(String, Vec<TypedDataField>)> for TypeSchema {
    fn from_iter<I: IntoIterator<Item = (String, Vec<TypedDataField>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The signing domain used by this deployment.
///
/// All four fields are always present and always hashed. Any other domain
/// key (`salt`, ...) is rejected rather than silently left out of the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Eip712Domain {
    /// The human-readable name of the signing domain
    pub name: String,

    /// The current major version of the signing domain
    pub version: String,

    /// The EIP-155 chain ID
    #[serde(with = "uint256_serde")]
    pub chain_id: U256,

    /// Reference to the contract that will verify the signature.
    ///
    /// Hashed as a `string`, so the exact characters (including case) matter.
    pub verifying_contract: String,
}

impl Eip712Domain {
    pub const TYPE_NAME: &'static str = "EIP712Domain";

    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: impl Into<U256>,
        verifying_contract: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id: chain_id.into(),
            verifying_contract: verifying_contract.into(),
        }
    }

    /// The pinned domain struct definition.
    ///
    /// NOTE: `verifyingContract` is declared as `string`, not the canonical
    /// `address`. Signing clients already in the field hash it this way; switching
    /// to `address` changes every domain separator and breaks their signatures.
    pub fn fields() -> Vec<TypedDataField> {
        vec![
            TypedDataField::new("name", "string"),
            TypedDataField::new("version", "string"),
            TypedDataField::new("chainId", "uint256"),
            TypedDataField::new("verifyingContract", "string"),
        ]
    }

    /// `EIP712Domain(string name,...)`
    pub fn type_string() -> String {
        let fields: Vec<String> = Self::fields()
            .iter()
            .map(|f| format!("{} {}", f.type_name, f.name))
            .collect();
        format!("{}({})", Self::TYPE_NAME, fields.join(","))
    }

    /// Schema containing only the domain struct
    pub fn schema() -> TypeSchema {
        TypeSchema::new().with_type(Self::TYPE_NAME, Self::fields())
    }

    /// The domain as a message value for the struct hasher
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "version": self.version,
            "chainId": self.chain_id.to_string(),
            "verifyingContract": self.verifying_contract,
        })
    }
}

/// Complete EIP-712 typed data structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Type definitions (struct name -> fields)
    pub types: TypeSchema,

    /// The name of the primary type being signed
    pub primary_type: String,

    /// The EIP-712 domain
    pub domain: Eip712Domain,

    /// The actual message data to sign
    pub message: serde_json::Value,
}

impl TypedData {
    /// Parse typed data from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Eip712Error> {
        serde_json::from_str(json).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, Eip712Error> {
        serde_json::to_string(self).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Validate the message schema and any declared domain struct
    pub fn validate(&self) -> Result<(), Eip712Error> {
        self.types.check_domain_type()?;
        self.types.validate(&self.primary_type)
    }
}

/// A 20-byte account identifier.
///
/// Displayed with EIP-55 checksum casing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad to a 32-byte ABI word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    pub fn to_checksum(&self) -> String {
        to_checksum_address(&self.0)
    }
}

impl FromStr for Address {
    type Err = Eip712Error;

    /// Accepts exactly 40 hex characters with an optional `0x` prefix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = strip_hex_prefix(s.trim());
        if digits.len() != 40 {
            return Err(Eip712Error::ValueMismatch {
                field: "address".to_string(),
                reason: format!("expected 40 hex chars, got {}", digits.len()),
            });
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| Eip712Error::ValueMismatch {
            field: "address".to_string(),
            reason: format!("invalid hex: {}", e),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The final 32-byte challenge that gets signed
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// EIP-712 signature components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip712Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// v component (27/28 when produced here, 0/1 accepted on input)
    pub v: u8,
}

impl Eip712Signature {
    pub const LENGTH: usize = 65;

    /// Create from raw components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Create from 65-byte signature (r || s || v)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Eip712Error> {
        if bytes.len() != Self::LENGTH {
            return Err(Eip712Error::InvalidSignatureLength(bytes.len()));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = bytes[64];

        Ok(Self { r, s, v })
    }

    /// Parse a hex signature, `0x` prefix optional
    pub fn from_hex(s: &str) -> Result<Self, Eip712Error> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| Eip712Error::InvalidSignature(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Convert to 65-byte representation (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Recovery id in the 0/1 convention.
    ///
    /// 27 and 28 are shifted down; any other value passes through unchanged.
    pub fn recovery_id(&self) -> u8 {
        match self.v {
            27 | 28 => self.v - 27,
            v => v,
        }
    }

    /// The same signature with `v` in the 27/28 convention
    pub fn to_legacy_v(self) -> Self {
        match self.v {
            0 | 1 => Self {
                v: self.v + 27,
                ..self
            },
            _ => self,
        }
    }
}

/// Errors that can occur during EIP-712 operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Eip712Error {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid value for {field}: {reason}")]
    ValueMismatch { field: String, reason: String },

    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Signer mismatch: expected {expected}, recovered {recovered}")]
    SignerMismatch { expected: Address, recovered: Address },
}

impl Eip712Error {
    pub(crate) fn mismatch(field: &str, reason: impl Into<String>) -> Self {
        Eip712Error::ValueMismatch {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Check if a type is an atomic (fixed-size) type
pub fn is_atomic_type(type_name: &str) -> bool {
    type_name == "address"
        || type_name == "bool"
        || integer_width(type_name, "uint").is_some()
        || integer_width(type_name, "int").is_some()
        || fixed_bytes_width(type_name).is_some()
}

/// Check if a type is a dynamic type
pub fn is_dynamic_type(type_name: &str) -> bool {
    type_name == "bytes" || type_name == "string"
}

/// Bit width of `uintN`/`intN` for the given prefix
pub fn integer_width(type_name: &str, prefix: &str) -> Option<usize> {
    let bits: usize = type_name.strip_prefix(prefix)?.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

/// Byte width of `bytesN`
pub fn fixed_bytes_width(type_name: &str) -> Option<usize> {
    let size: usize = type_name.strip_prefix("bytes")?.parse().ok()?;
    (size > 0 && size <= 32).then_some(size)
}

/// Split the outermost array suffix: `Person[2][]` -> (`Person[2]`, None)
pub fn split_array_type(type_name: &str) -> Result<Option<(&str, Option<usize>)>, Eip712Error> {
    if !type_name.ends_with(']') {
        return Ok(None);
    }

    let open = type_name
        .rfind('[')
        .ok_or_else(|| Eip712Error::SchemaError(format!("invalid array type {}", type_name)))?;
    let element = &type_name[..open];
    let length = &type_name[open + 1..type_name.len() - 1];

    if element.is_empty() {
        return Err(Eip712Error::SchemaError(format!(
            "invalid array type {}",
            type_name
        )));
    }
    if length.is_empty() {
        return Ok(Some((element, None)));
    }

    let length: usize = length.parse().map_err(|_| {
        Eip712Error::SchemaError(format!("invalid array length in {}", type_name))
    })?;
    Ok(Some((element, Some(length))))
}

/// Strip every array suffix: `Person[2][]` -> `Person`
pub fn base_type(type_name: &str) -> Result<&str, Eip712Error> {
    let mut current = type_name;
    while let Some((element, _)) = split_array_type(current)? {
        current = element;
    }
    Ok(current)
}

fn is_struct_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Serde adapter for `U256` values that may arrive as JSON numbers,
/// decimal strings or `0x` hex strings. Serialized as a decimal string.
pub(crate) mod uint256_serde {
    use ethers_core::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::eip712::encoder::parse_uint;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        parse_uint(&value, 256, "uint256").map_err(serde::de::Error::custom)
    }
}
