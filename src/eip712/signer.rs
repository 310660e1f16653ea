//! EIP-712 Signing
//!
//! ECDSA signing and signer recovery for EIP-712 typed data.

use super::hasher::{hash_typed_data, hash_typed_data_parts};
use super::types::*;
use crate::utils::crypto::keccak256;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde_json::Value;
use zeroize::Zeroizing;

/// secp256k1 group order divided by two; larger `s` values are malleated
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// A secret key that is erased when it goes out of scope
struct ScopedSecretKey(SecretKey);

impl ScopedSecretKey {
    fn from_slice(private_key: &[u8]) -> Result<Self, Eip712Error> {
        if private_key.len() != 32 {
            return Err(Eip712Error::SigningError(format!(
                "invalid private key length: expected 32, got {}",
                private_key.len()
            )));
        }

        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(private_key);

        SecretKey::from_slice(&bytes[..])
            .map(Self)
            .map_err(|e| Eip712Error::SigningError(e.to_string()))
    }
}

impl Drop for ScopedSecretKey {
    fn drop(&mut self) {
        self.0.non_secure_erase();
    }
}

/// Sign EIP-712 typed data
///
/// Returns a signature with v in the 27/28 convention.
pub fn sign_typed_data(
    typed_data: &TypedData,
    private_key: &[u8],
) -> Result<Eip712Signature, Eip712Error> {
    let hash = hash_typed_data(typed_data)?;
    sign_hash(&hash, private_key)
}

/// Sign a pre-computed digest (RFC 6979 deterministic nonces)
pub fn sign_hash(digest: &Digest, private_key: &[u8]) -> Result<Eip712Signature, Eip712Error> {
    let secret_key = ScopedSecretKey::from_slice(private_key)?;

    let secp = Secp256k1::new();
    let message = Message::from_digest(*digest.as_bytes());

    let (recovery_id, signature) = secp
        .sign_ecdsa_recoverable(&message, &secret_key.0)
        .serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&signature[0..32]);
    s.copy_from_slice(&signature[32..64]);

    // recovery id is 0 or 1 here; the 27 offset is the legacy Ethereum convention
    let v = recovery_id.to_i32() as u8 + 27;

    Ok(Eip712Signature::new(r, s, v))
}

/// Recover the signer of typed data given in separate parts.
///
/// The digest is always recomputed from the inputs. The returned address is
/// only a claim; callers must compare it against an authorized identity.
pub fn recover_typed_data_signer(
    primary_type: &str,
    domain: &Eip712Domain,
    types: &TypeSchema,
    message: &Value,
    signature: &[u8],
) -> Result<Address, Eip712Error> {
    // Length is rejected before any hashing or curve work
    let signature = Eip712Signature::from_bytes(signature)?;
    let digest = hash_typed_data_parts(primary_type, domain, types, message)?;
    recover_address(&digest, &signature)
}

/// Recover the signer and require it to be `expected`
pub fn verify_typed_data_signer(
    primary_type: &str,
    domain: &Eip712Domain,
    types: &TypeSchema,
    message: &Value,
    signature: &[u8],
    expected: &Address,
) -> Result<Address, Eip712Error> {
    let recovered = recover_typed_data_signer(primary_type, domain, types, message, signature)?;
    if recovered != *expected {
        return Err(Eip712Error::SignerMismatch {
            expected: *expected,
            recovered,
        });
    }
    Ok(recovered)
}

/// Verify an EIP-712 signature
///
/// Returns true if the signature recovers to `expected_address`.
pub fn verify_typed_data(
    typed_data: &TypedData,
    signature: &Eip712Signature,
    expected_address: &Address,
) -> Result<bool, Eip712Error> {
    let hash = hash_typed_data(typed_data)?;
    Ok(recover_address(&hash, signature)? == *expected_address)
}

/// Recover the signer's address from a digest and signature
pub fn recover_address(digest: &Digest, signature: &Eip712Signature) -> Result<Address, Eip712Error> {
    let recovery_id = RecoveryId::from_i32(i32::from(signature.recovery_id())).map_err(|e| {
        Eip712Error::InvalidSignature(format!("recovery id {}: {}", signature.v, e))
    })?;

    if signature.r == [0u8; 32] || signature.s == [0u8; 32] {
        return Err(Eip712Error::InvalidSignature("zero r or s".to_string()));
    }
    if signature.s > SECP256K1_HALF_ORDER {
        return Err(Eip712Error::InvalidSignature("non-canonical s".to_string()));
    }

    let mut sig_bytes = [0u8; 64];
    sig_bytes[0..32].copy_from_slice(&signature.r);
    sig_bytes[32..64].copy_from_slice(&signature.s);

    let recoverable_sig = RecoverableSignature::from_compact(&sig_bytes, recovery_id)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let message = Message::from_digest(*digest.as_bytes());

    let public_key = Secp256k1::new()
        .recover_ecdsa(&message, &recoverable_sig)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    Ok(public_key_to_address(&public_key))
}

/// Derive the address controlled by a private key
pub fn address_from_private_key(private_key: &[u8]) -> Result<Address, Eip712Error> {
    let secret_key = ScopedSecretKey::from_slice(private_key)?;
    let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key.0);
    Ok(public_key_to_address(&public_key))
}

/// Convert a secp256k1 public key to an Ethereum address
fn public_key_to_address(public_key: &PublicKey) -> Address {
    // Uncompressed key is 0x04 || x || y; the tag byte is not hashed
    let pubkey_bytes = public_key.serialize_uncompressed();
    let hash = keccak256(&pubkey_bytes[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    Address::from_bytes(address)
}

#[cfg(test)]
mod signer_tests {
    use super::*;

    // Well-known throwaway key 0x...01 (DO NOT USE IN PRODUCTION)
    fn key_one() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    }

    #[test]
    fn test_address_from_private_key() {
        let addr = address_from_private_key(&key_one()).unwrap();
        assert_eq!(addr.to_string(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }

    #[test]
    fn test_sign_hash_roundtrip() {
        let digest = Digest::new(keccak256(b"digest"));
        let signature = sign_hash(&digest, &key_one()).unwrap();

        assert!(signature.v == 27 || signature.v == 28);
        assert!(signature.s <= SECP256K1_HALF_ORDER);
        assert_eq!(
            recover_address(&digest, &signature).unwrap(),
            address_from_private_key(&key_one()).unwrap()
        );
    }

    #[test]
    fn test_signing_is_deterministic() {
        let digest = Digest::new(keccak256(b"digest"));
        assert_eq!(
            sign_hash(&digest, &key_one()).unwrap(),
            sign_hash(&digest, &key_one()).unwrap()
        );
    }

    #[test]
    fn test_invalid_private_keys() {
        let digest = Digest::new([7u8; 32]);

        assert!(matches!(
            sign_hash(&digest, &[1u8; 31]),
            Err(Eip712Error::SigningError(_))
        ));
        assert!(matches!(
            sign_hash(&digest, &[0u8; 32]),
            Err(Eip712Error::SigningError(_))
        ));
        // Curve order and above are not valid scalars
        assert!(matches!(
            sign_hash(&digest, &[0xffu8; 32]),
            Err(Eip712Error::SigningError(_))
        ));
    }

    #[test]
    fn test_zero_components_are_rejected() {
        let digest = Digest::new([7u8; 32]);
        let signature = Eip712Signature::new([0u8; 32], [1u8; 32], 27);
        assert!(matches!(
            recover_address(&digest, &signature),
            Err(Eip712Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_high_s_is_rejected() {
        let digest = Digest::new(keccak256(b"digest"));
        let signature = sign_hash(&digest, &key_one()).unwrap();

        // s' = n - s recovers the same key on plain ECDSA; it must not be accepted
        let malleated = Eip712Signature::new(signature.r, [0xffu8; 32], signature.v);
        assert!(matches!(
            recover_address(&digest, &malleated),
            Err(Eip712Error::InvalidSignature(msg)) if msg.contains("non-canonical")
        ));
    }

    #[test]
    fn test_out_of_range_recovery_id() {
        let digest = Digest::new(keccak256(b"digest"));
        let signature = sign_hash(&digest, &key_one()).unwrap();

        let bad = Eip712Signature { v: 29, ..signature };
        assert!(matches!(
            recover_address(&digest, &bad),
            Err(Eip712Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_signature_format() {
        let sig = Eip712Signature::new([1u8; 32], [2u8; 32], 27);
        let hex = sig.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 132); // 0x + 65 bytes * 2
    }
}
