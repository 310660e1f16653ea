use ethers_core::types::U256;
use nftcloner::eip712::{address_from_private_key, Address, Eip712Error};
use nftcloner::{keccak256, to_checksum_address, Eip712Domain, UpdateMetadata};
use proptest::prelude::*;
use secp256k1::SecretKey;

fn any_secret_key() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>()).prop_filter("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(bytes).is_ok()
    })
}

fn any_payload() -> impl Strategy<Value = UpdateMetadata> {
    (prop::array::uniform20(any::<u8>()), prop::array::uniform32(any::<u8>()))
        .prop_map(|(contract, token_id)| {
            UpdateMetadata::new(Address::from_bytes(contract), U256::from_big_endian(&token_id))
        })
}

fn domain() -> Eip712Domain {
    Eip712Domain::new("NFTCloner", "1", 1u64, "0x5FbDB2315678afecb367f032d93F642f64180aa3")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn checksum_addresses_roundtrip(bytes in prop::array::uniform20(any::<u8>())) {
        let checksummed = to_checksum_address(&bytes);
        prop_assert!(checksummed.starts_with("0x"));

        let tail = checksummed.trim_start_matches("0x");
        let lower_expected = hex::encode(bytes);
        prop_assert_eq!(tail.to_ascii_lowercase(), lower_expected.clone());

        let hash = keccak256(lower_expected.as_bytes());
        let mut expected = String::from("0x");
        for (i, ch) in lower_expected.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if ch.is_ascii_digit() || nibble < 8 {
                expected.push(ch);
            } else {
                expected.push(ch.to_ascii_uppercase());
            }
        }
        prop_assert_eq!(&checksummed, &expected);

        let parsed: Address = checksummed.parse().expect("checksum address parses");
        prop_assert_eq!(parsed.as_bytes(), &bytes);
    }

    #[test]
    fn signatures_recover_the_signer(key in any_secret_key(), payload in any_payload()) {
        let signature = payload.sign(&domain(), &key).expect("sign");
        prop_assert!(signature.v == 27 || signature.v == 28);

        let signer = payload.recover_signer(&domain(), &signature.to_bytes()).expect("recover");
        prop_assert_eq!(signer, address_from_private_key(&key).expect("address"));

        // Raw 0/1 recovery byte recovers the same address
        let mut raw = signature.to_bytes();
        raw[64] -= 27;
        prop_assert_eq!(payload.recover_signer(&domain(), &raw).expect("recover raw"), signer);
    }

    #[test]
    fn tampered_token_id_is_rejected(key in any_secret_key(), payload in any_payload()) {
        let signature = payload.sign(&domain(), &key).expect("sign");
        let signer = address_from_private_key(&key).expect("address");

        let tampered = UpdateMetadata::new(payload.contract, payload.token_id.overflowing_add(U256::one()).0);
        let result = tampered.verify_signer(&domain(), &signature.to_bytes(), &signer);
        prop_assert!(
            matches!(
                result,
                Err(Eip712Error::SignerMismatch { .. }) | Err(Eip712Error::InvalidSignature(_))
            ),
            "tampered payload verified: {:?}",
            result
        );
    }

    #[test]
    fn wrong_lengths_are_rejected(len in 0usize..200) {
        prop_assume!(len != 65);
        let payload = UpdateMetadata::new(Address::from_bytes([1u8; 20]), 42u64);
        let result = payload.recover_signer(&domain(), &vec![1u8; len]);
        prop_assert_eq!(result, Err(Eip712Error::InvalidSignatureLength(len)));
    }
}
