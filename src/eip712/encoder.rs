//! EIP-712 Type Encoding
//!
//! Implements the encoding rules for EIP-712 typed data.

use super::types::*;
use crate::utils::crypto::{keccak256, strip_hex_prefix};
use ethers_core::types::U256;
use serde_json::Value;
use std::collections::BTreeSet;

/// Encode a type string for a struct type
/// Format: "TypeName(type1 name1,type2 name2,...)" followed by every
/// referenced struct type, sorted by name
pub fn encode_type(type_name: &str, types: &TypeSchema) -> Result<String, Eip712Error> {
    let fields = types.get(type_name).ok_or_else(|| {
        Eip712Error::SchemaError(format!("type {} is not declared", type_name))
    })?;

    let mut result = format_type_string(type_name, fields);

    // BTreeSet iterates in byte order, which is the order the standard requires
    let dependencies = find_type_dependencies(type_name, types)?;
    for dep in dependencies.iter().filter(|dep| dep.as_str() != type_name) {
        if let Some(dep_fields) = types.get(dep) {
            result.push_str(&format_type_string(dep, dep_fields));
        }
    }

    Ok(result)
}

/// Format a single type string
fn format_type_string(type_name: &str, fields: &[TypedDataField]) -> String {
    let field_strs: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.type_name, f.name))
        .collect();

    format!("{}({})", type_name, field_strs.join(","))
}

/// Find all struct types reachable from `type_name`, including itself
pub fn find_type_dependencies(
    type_name: &str,
    types: &TypeSchema,
) -> Result<BTreeSet<String>, Eip712Error> {
    let mut dependencies = BTreeSet::new();
    let mut to_visit = vec![type_name.to_string()];

    while let Some(current) = to_visit.pop() {
        if dependencies.contains(&current) {
            continue;
        }

        if let Some(fields) = types.get(&current) {
            for field in fields {
                let base = base_type(&field.type_name)?;
                if types.contains(base) && !dependencies.contains(base) {
                    to_visit.push(base.to_string());
                }
            }
            dependencies.insert(current);
        }
    }

    Ok(dependencies)
}

/// Calculate the type hash for a struct type
/// typeHash = keccak256(encodeType(typeOf(s)))
pub fn type_hash(type_name: &str, types: &TypeSchema) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_type(type_name, types)?;
    Ok(keccak256(encoded.as_bytes()))
}

/// Encode a struct value: typeHash || enc(field_1) || ... || enc(field_n)
///
/// `path` names the value in error messages (e.g. `Mail.from`).
pub fn encode_data(
    type_name: &str,
    value: &Value,
    types: &TypeSchema,
    path: &str,
) -> Result<Vec<u8>, Eip712Error> {
    let fields = types.get(type_name).ok_or_else(|| {
        Eip712Error::SchemaError(format!("type {} is not declared", type_name))
    })?;

    let obj = value
        .as_object()
        .ok_or_else(|| Eip712Error::mismatch(path, format!("expected a {} object", type_name)))?;

    if let Some(extra) = obj.keys().find(|key| !fields.iter().any(|f| &f.name == *key)) {
        return Err(Eip712Error::mismatch(
            path,
            format!("field {} is not part of {}", extra, type_name),
        ));
    }

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(&type_hash(type_name, types)?);

    for field in fields {
        let field_path = format!("{}.{}", path, field.name);
        let field_value = obj
            .get(&field.name)
            .ok_or_else(|| Eip712Error::mismatch(&field_path, "missing field"))?;

        encoded.extend_from_slice(&encode_field(
            &field.type_name,
            field_value,
            types,
            &field_path,
        )?);
    }

    Ok(encoded)
}

/// Encode one field value into its 32-byte slot
pub fn encode_field(
    type_name: &str,
    value: &Value,
    types: &TypeSchema,
    path: &str,
) -> Result<[u8; 32], Eip712Error> {
    if let Some((element_type, length)) = split_array_type(type_name)? {
        return encode_array(element_type, length, value, types, path);
    }

    match type_name {
        // Dynamic types are hashed
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| Eip712Error::mismatch(path, "expected a string"))?;
            Ok(keccak256(s.as_bytes()))
        }
        "bytes" => {
            let bytes = parse_hex_value(value, path)?;
            Ok(keccak256(&bytes))
        }
        // Struct references are replaced by their struct hash
        _ if types.contains(type_name) => {
            let encoded = encode_data(type_name, value, types, path)?;
            Ok(keccak256(&encoded))
        }
        _ => encode_atomic(type_name, value, path),
    }
}

/// Encode an array value: keccak256 of the concatenated element encodings
fn encode_array(
    element_type: &str,
    length: Option<usize>,
    value: &Value,
    types: &TypeSchema,
    path: &str,
) -> Result<[u8; 32], Eip712Error> {
    let arr = value
        .as_array()
        .ok_or_else(|| Eip712Error::mismatch(path, "expected an array"))?;

    if let Some(expected) = length {
        if arr.len() != expected {
            return Err(Eip712Error::mismatch(
                path,
                format!("expected {} elements, got {}", expected, arr.len()),
            ));
        }
    }

    let mut encoded = Vec::with_capacity(32 * arr.len());
    for (i, item) in arr.iter().enumerate() {
        let item_path = format!("{}[{}]", path, i);
        encoded.extend_from_slice(&encode_field(element_type, item, types, &item_path)?);
    }

    Ok(keccak256(&encoded))
}

/// Encode an atomic (fixed-size) value
fn encode_atomic(type_name: &str, value: &Value, path: &str) -> Result<[u8; 32], Eip712Error> {
    let mut result = [0u8; 32];

    // address - 20 bytes, left-padded to 32
    if type_name == "address" {
        let addr = value
            .as_str()
            .ok_or_else(|| Eip712Error::mismatch(path, "expected an address string"))?;
        let addr: Address = addr.parse().map_err(|e| match e {
            Eip712Error::ValueMismatch { reason, .. } => Eip712Error::mismatch(path, reason),
            other => other,
        })?;
        return Ok(addr.to_word());
    }

    // bool
    if type_name == "bool" {
        let b = match value {
            Value::Bool(b) => *b,
            Value::String(s) if s == "true" => true,
            Value::String(s) if s == "false" => false,
            _ => return Err(Eip712Error::mismatch(path, "expected a boolean")),
        };
        result[31] = u8::from(b);
        return Ok(result);
    }

    // uintN - big-endian, must fit in N bits
    if let Some(bits) = integer_width(type_name, "uint") {
        let n = parse_uint(value, bits, path)?;
        n.to_big_endian(&mut result);
        return Ok(result);
    }

    // intN - two's complement, sign extended
    if let Some(bits) = integer_width(type_name, "int") {
        return parse_int(value, bits, path);
    }

    // bytesN - right-padded
    if let Some(size) = fixed_bytes_width(type_name) {
        let bytes = parse_hex_value(value, path)?;
        if bytes.len() > size {
            return Err(Eip712Error::mismatch(
                path,
                format!("bytes too long: {} > {}", bytes.len(), size),
            ));
        }
        result[..bytes.len()].copy_from_slice(&bytes);
        return Ok(result);
    }

    Err(Eip712Error::SchemaError(format!("unknown type {}", type_name)))
}

/// Parse an unsigned integer of at most `bits` bits.
///
/// Accepts JSON numbers, decimal strings and `0x` hex strings.
pub fn parse_uint(value: &Value, bits: usize, path: &str) -> Result<U256, Eip712Error> {
    let n = match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| Eip712Error::mismatch(path, format!("{} is not an unsigned integer", n)))?,
        Value::String(s) => parse_uint_str(s)
            .ok_or_else(|| Eip712Error::mismatch(path, format!("invalid unsigned integer {:?}", s)))?,
        _ => return Err(Eip712Error::mismatch(path, "expected an unsigned integer")),
    };

    if n.bits() > bits {
        return Err(Eip712Error::mismatch(path, format!("value overflows uint{}", bits)));
    }

    Ok(n)
}

/// Parse a decimal or `0x` hex string into a U256
pub fn parse_uint_str(s: &str) -> Option<U256> {
    let s = s.trim();

    if s.starts_with("0x") || s.starts_with("0X") {
        let digits = strip_hex_prefix(s).trim_start_matches('0');
        if digits.is_empty() {
            return (s.len() > 2).then(U256::zero);
        }
        if digits.len() > 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return U256::from_str_radix(digits, 16).ok();
    }

    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_dec_str(s).ok()
}

/// Parse a signed integer of `bits` bits into its 32-byte two's-complement word
fn parse_int(value: &Value, bits: usize, path: &str) -> Result<[u8; 32], Eip712Error> {
    let (negative, magnitude) = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                (false, U256::from(u))
            } else if let Some(i) = n.as_i64() {
                (i < 0, U256::from(i.unsigned_abs()))
            } else {
                return Err(Eip712Error::mismatch(path, format!("{} is not an integer", n)));
            }
        }
        Value::String(s) => {
            let (negative, digits) = match s.trim().strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, s.as_str()),
            };
            let magnitude = parse_uint_str(digits)
                .ok_or_else(|| Eip712Error::mismatch(path, format!("invalid integer {:?}", s)))?;
            (negative, magnitude)
        }
        _ => return Err(Eip712Error::mismatch(path, "expected an integer")),
    };

    // 2^(bits-1): one past the largest positive value, the magnitude of the smallest
    let mut limit_bytes = [0u8; 32];
    let top_bit = bits - 1;
    limit_bytes[31 - top_bit / 8] = 1 << (top_bit % 8);
    let limit = U256::from_big_endian(&limit_bytes);

    let out_of_range = if negative { magnitude > limit } else { magnitude >= limit };
    if out_of_range {
        return Err(Eip712Error::mismatch(path, format!("value overflows int{}", bits)));
    }

    let mut word = [0u8; 32];
    magnitude.to_big_endian(&mut word);
    if negative {
        for byte in word.iter_mut() {
            *byte = !*byte;
        }
        for byte in word.iter_mut().rev() {
            let (sum, carry) = byte.overflowing_add(1);
            *byte = sum;
            if !carry {
                break;
            }
        }
    }

    Ok(word)
}

/// Parse a hex string value (with or without 0x prefix)
fn parse_hex_value(value: &Value, path: &str) -> Result<Vec<u8>, Eip712Error> {
    let s = value
        .as_str()
        .ok_or_else(|| Eip712Error::mismatch(path, "expected a hex string"))?;

    hex::decode(strip_hex_prefix(s))
        .map_err(|e| Eip712Error::mismatch(path, format!("invalid hex: {}", e)))
}

#[cfg(test)]
mod encoder_tests {
    use super::*;
    use serde_json::json;

    fn mail_types() -> TypeSchema {
        TypeSchema::new()
            .with_type(
                "Mail",
                vec![
                    TypedDataField::new("from", "Person"),
                    TypedDataField::new("to", "Person"),
                    TypedDataField::new("contents", "string"),
                ],
            )
            .with_type(
                "Person",
                vec![
                    TypedDataField::new("name", "string"),
                    TypedDataField::new("wallet", "address"),
                ],
            )
    }

    #[test]
    fn test_encode_type_simple() {
        let encoded = encode_type("Person", &mail_types()).unwrap();
        assert_eq!(encoded, "Person(string name,address wallet)");
    }

    #[test]
    fn test_encode_type_with_dependencies() {
        let encoded = encode_type("Mail", &mail_types()).unwrap();
        assert_eq!(
            encoded,
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
    }

    #[test]
    fn test_encode_type_sorts_dependencies() {
        let types = TypeSchema::new()
            .with_type(
                "Order",
                vec![
                    TypedDataField::new("zone", "Zone"),
                    TypedDataField::new("items", "Item[]"),
                ],
            )
            .with_type("Zone", vec![TypedDataField::new("id", "uint8")])
            .with_type("Item", vec![TypedDataField::new("id", "uint256")]);

        assert_eq!(
            encode_type("Order", &types).unwrap(),
            "Order(Zone zone,Item[] items)Item(uint256 id)Zone(uint8 id)"
        );
    }

    #[test]
    fn test_update_metadata_type_string() {
        let types = TypeSchema::new().with_type(
            "UpdateMetadata",
            vec![
                TypedDataField::new("contract", "address"),
                TypedDataField::new("tokenId", "uint256"),
            ],
        );
        assert_eq!(
            encode_type("UpdateMetadata", &types).unwrap(),
            "UpdateMetadata(address contract,uint256 tokenId)"
        );
    }

    #[test]
    fn test_encode_address_is_left_padded() {
        let word = encode_atomic(
            "address",
            &json!("0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"),
            "wallet",
        )
        .unwrap();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(hex::encode(&word[12..]), "cd2a3d9f938e13cd947ec05abc7fe734df8dd826");
    }

    #[test]
    fn test_encode_address_rejects_non_hex() {
        let err = encode_atomic("address", &json!("0xNFT"), "Mail.wallet").unwrap_err();
        assert!(matches!(err, Eip712Error::ValueMismatch { field, .. } if field == "Mail.wallet"));
    }

    #[test]
    fn test_encode_uint_forms_agree() {
        let a = encode_atomic("uint256", &json!(42), "n").unwrap();
        let b = encode_atomic("uint256", &json!("42"), "n").unwrap();
        let c = encode_atomic("uint256", &json!("0x2a"), "n").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a[31], 42);
        assert_eq!(&a[..31], &[0u8; 31]);
    }

    #[test]
    fn test_encode_uint_overflow() {
        assert!(encode_atomic("uint8", &json!(255), "n").is_ok());
        assert!(matches!(
            encode_atomic("uint8", &json!(256), "n"),
            Err(Eip712Error::ValueMismatch { .. })
        ));
        // 2^256 does not fit at all
        assert!(encode_atomic(
            "uint256",
            &json!("115792089237316195423570985008687907853269984665640564039457584007913129639936"),
            "n"
        )
        .is_err());
        assert!(encode_atomic(
            "uint256",
            &json!("115792089237316195423570985008687907853269984665640564039457584007913129639935"),
            "n"
        )
        .is_ok());
    }

    #[test]
    fn test_encode_uint_rejects_negative_and_garbage() {
        assert!(encode_atomic("uint256", &json!(-1), "n").is_err());
        assert!(encode_atomic("uint256", &json!("12a"), "n").is_err());
        assert!(encode_atomic("uint256", &json!(""), "n").is_err());
        assert!(encode_atomic("uint256", &json!(true), "n").is_err());
    }

    #[test]
    fn test_encode_int_twos_complement() {
        let minus_one = encode_atomic("int256", &json!(-1), "n").unwrap();
        assert_eq!(minus_one, [0xff; 32]);

        let minus_two = encode_atomic("int8", &json!("-2"), "n").unwrap();
        let mut expected = [0xff; 32];
        expected[31] = 0xfe;
        assert_eq!(minus_two, expected);

        assert!(encode_atomic("int8", &json!(127), "n").is_ok());
        assert!(encode_atomic("int8", &json!(-128), "n").is_ok());
        assert!(encode_atomic("int8", &json!(128), "n").is_err());
        assert!(encode_atomic("int8", &json!(-129), "n").is_err());
    }

    #[test]
    fn test_encode_bool_and_fixed_bytes() {
        assert_eq!(encode_atomic("bool", &json!(true), "b").unwrap()[31], 1);
        assert_eq!(encode_atomic("bool", &json!(false), "b").unwrap(), [0u8; 32]);

        let word = encode_atomic("bytes2", &json!("0xbeef"), "b").unwrap();
        assert_eq!(&word[..2], &[0xbe, 0xef]);
        assert_eq!(&word[2..], &[0u8; 30]);
        assert!(encode_atomic("bytes1", &json!("0xbeef"), "b").is_err());
    }

    #[test]
    fn test_dynamic_values_are_hashed() {
        let types = TypeSchema::new();
        assert_eq!(
            encode_field("string", &json!("hello"), &types, "s").unwrap(),
            keccak256(b"hello")
        );
        assert_eq!(
            encode_field("bytes", &json!("0x68656c6c6f"), &types, "b").unwrap(),
            keccak256(b"hello")
        );
    }

    #[test]
    fn test_fixed_array_length_is_enforced() {
        let types = TypeSchema::new();
        assert!(encode_field("uint256[2]", &json!([1, 2]), &types, "a").is_ok());
        assert!(encode_field("uint256[2]", &json!([1, 2, 3]), &types, "a").is_err());
    }

    #[test]
    fn test_missing_and_extra_fields() {
        let types = mail_types();
        let missing = encode_data("Person", &json!({"name": "Cow"}), &types, "Person").unwrap_err();
        assert!(matches!(missing, Eip712Error::ValueMismatch { field, .. } if field == "Person.wallet"));

        let extra = encode_data(
            "Person",
            &json!({
                "name": "Cow",
                "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826",
                "admin": true
            }),
            &types,
            "Person",
        )
        .unwrap_err();
        assert!(matches!(extra, Eip712Error::ValueMismatch { .. }));
    }

    #[test]
    fn test_parse_uint_str() {
        assert_eq!(parse_uint_str("0"), Some(U256::zero()));
        assert_eq!(parse_uint_str("0x0"), Some(U256::zero()));
        assert_eq!(parse_uint_str("0x"), None);
        assert_eq!(parse_uint_str("0x00ff"), Some(U256::from(255u64)));
        assert_eq!(parse_uint_str("-1"), None);
    }
}
