use nftcloner::eip712::address_from_private_key;
use nftcloner::{Eip712Domain, UpdateMetadata};
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output};

const VERIFYING_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const SOURCE_CONTRACT: &str = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D";
const PRIVATE_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
const SIGNER: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

fn nftcloner(args: &[&str]) -> Output {
    let binary_path = assert_cmd::cargo::cargo_bin!("nftcloner");
    let mut command = Command::new(binary_path);
    for key in [
        "NFT_CONTRACT_ADDRESS",
        "CHAIN_ID",
        "DOMAIN_NAME",
        "DOMAIN_VERSION",
        "SIGNER_PRIVATE_KEY",
        "LOG_LEVEL",
    ] {
        command.env_remove(key);
    }
    command
        .env("NFT_CONTRACT_ADDRESS", VERIFYING_CONTRACT)
        .args(args)
        .output()
        .expect("cli runs")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "cli exited unsuccessfully: {:?}",
        output
    );
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout is utf8");
    serde_json::from_str(&stdout).expect("stdout is valid json")
}

fn expected_payload(token_id: u64) -> (Eip712Domain, UpdateMetadata) {
    let domain = Eip712Domain::new("NFTCloner", "1", 1u64, VERIFYING_CONTRACT);
    let payload = UpdateMetadata::new(SOURCE_CONTRACT.parse().expect("address"), token_id);
    (domain, payload)
}

fn sign(token_id: &str) -> String {
    let output = nftcloner(&[
        "sign",
        "--contract",
        SOURCE_CONTRACT,
        "--token-id",
        token_id,
        "--private-key",
        PRIVATE_KEY,
        "--json",
    ]);
    let json = stdout_json(&output);
    assert_eq!(json["signer"], SIGNER);
    json["signature"].as_str().expect("signature string").to_string()
}

#[test]
fn digest_matches_library() {
    let output = nftcloner(&[
        "digest",
        "--contract",
        SOURCE_CONTRACT,
        "--token-id",
        "42",
        "--json",
    ]);
    let json = stdout_json(&output);

    let (domain, payload) = expected_payload(42);
    assert_eq!(json["digest"], payload.digest(&domain).expect("digest").to_hex());

    // Plain output is just the digest
    let plain = nftcloner(&["digest", "--contract", SOURCE_CONTRACT, "--token-id", "42"]);
    assert!(plain.status.success());
    assert_eq!(
        String::from_utf8(plain.stdout).expect("utf8").trim(),
        json["digest"].as_str().expect("digest string")
    );
}

#[test]
fn domain_flags_change_the_digest() {
    let base = stdout_json(&nftcloner(&[
        "digest", "--contract", SOURCE_CONTRACT, "--token-id", "42", "--json",
    ]));
    let goerli = stdout_json(&nftcloner(&[
        "digest", "--contract", SOURCE_CONTRACT, "--token-id", "42", "--chain-id", "5", "--json",
    ]));
    assert_ne!(base["digest"], goerli["digest"]);
    assert_eq!(base["structHash"], goerli["structHash"]);
}

#[test]
fn sign_then_verify_roundtrip() {
    let signature = sign("42");

    let (domain, payload) = expected_payload(42);
    let key = hex::decode(PRIVATE_KEY.trim_start_matches("0x")).expect("key hex");
    assert_eq!(
        signature,
        payload.sign(&domain, &key).expect("library sign").to_hex()
    );
    assert_eq!(address_from_private_key(&key).expect("address").to_string(), SIGNER);

    let verified = stdout_json(&nftcloner(&[
        "verify",
        "--contract",
        SOURCE_CONTRACT,
        "--token-id",
        "42",
        "--signature",
        &signature,
        "--expected",
        SIGNER,
        "--json",
    ]));
    assert_eq!(verified["signer"], SIGNER);
}

#[test]
fn verify_rejects_tampered_token_id() {
    let signature = sign("42");

    let output = nftcloner(&[
        "verify",
        "--contract",
        SOURCE_CONTRACT,
        "--token-id",
        "43",
        "--signature",
        &signature,
        "--expected",
        SIGNER,
    ]);
    assert!(!output.status.success(), "tampered payload verified");
    let stderr = String::from_utf8(output.stderr).expect("stderr is utf8");
    assert!(stderr.contains("Signer mismatch") || stderr.contains("Invalid signature"), "{}", stderr);
}

#[test]
fn verify_rejects_short_signature() {
    let signature = sign("42");
    let short = &signature[..signature.len() - 2];

    let output = nftcloner(&[
        "verify",
        "--contract",
        SOURCE_CONTRACT,
        "--token-id",
        "42",
        "--signature",
        short,
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("stderr is utf8");
    assert!(stderr.contains("got 64"), "{}", stderr);
}

#[test]
fn hash_reads_typed_data_document() {
    let (domain, payload) = expected_payload(7);
    let document = payload.to_typed_data(&domain).to_json().expect("json");

    let path = std::env::temp_dir().join(format!("nftcloner-typed-data-{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).expect("create temp file");
    file.write_all(document.as_bytes()).expect("write temp file");
    drop(file);

    let output = nftcloner(&["hash", path.to_str().expect("utf8 path"), "--json"]);
    std::fs::remove_file(&path).ok();

    let json = stdout_json(&output);
    assert_eq!(json["primaryType"], "UpdateMetadata");
    assert_eq!(json["digest"], payload.digest(&domain).expect("digest").to_hex());
}

#[test]
fn hash_rejects_foreign_domain_schema() {
    let (domain, payload) = expected_payload(7);
    let mut document: Value =
        serde_json::from_str(&payload.to_typed_data(&domain).to_json().expect("json")).expect("parse");
    document["types"]["EIP712Domain"][3]["type"] = Value::from("address");

    let path = std::env::temp_dir().join(format!("nftcloner-foreign-domain-{}.json", std::process::id()));
    std::fs::write(&path, document.to_string()).expect("write temp file");

    let output = nftcloner(&["hash", path.to_str().expect("utf8 path")]);
    std::fs::remove_file(&path).ok();

    assert!(!output.status.success(), "foreign domain schema hashed");
    let stderr = String::from_utf8(output.stderr).expect("stderr is utf8");
    assert!(stderr.contains("EIP712Domain"), "{}", stderr);
}

#[test]
fn missing_verifying_contract_is_an_error() {
    let binary_path = assert_cmd::cargo::cargo_bin!("nftcloner");
    let output = Command::new(binary_path)
        .env_remove("NFT_CONTRACT_ADDRESS")
        .args(["digest", "--contract", SOURCE_CONTRACT, "--token-id", "1"])
        .output()
        .expect("cli runs");
    assert!(!output.status.success());
}
