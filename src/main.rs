use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ethers_core::types::U256;
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use nftcloner::config::{DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION};
use nftcloner::eip712::{address_from_private_key, get_pre_image, parse_uint_str, Address};
use nftcloner::utils::crypto::strip_hex_prefix;
use nftcloner::utils::logging::{self, LogLevel};
use nftcloner::{log_debug, Eip712Domain, TypedData, UpdateMetadata};

#[derive(Debug, Parser)]
#[command(name = "nftcloner", version, about = "Hash, sign and verify NFTCloner metadata updates")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the EIP-712 digest of an UpdateMetadata payload
    Digest {
        #[command(flatten)]
        domain: DomainArgs,
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Sign an UpdateMetadata payload
    Sign {
        #[command(flatten)]
        domain: DomainArgs,
        #[command(flatten)]
        payload: PayloadArgs,
        /// Hex private key
        #[arg(long, env = "SIGNER_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },
    /// Recover the signer of an UpdateMetadata payload
    Verify {
        #[command(flatten)]
        domain: DomainArgs,
        #[command(flatten)]
        payload: PayloadArgs,
        /// 0x-prefixed 65-byte signature
        #[arg(long)]
        signature: String,
        /// Fail unless the signature recovers to this address
        #[arg(long)]
        expected: Option<String>,
    },
    /// Hash a typed-data JSON document (`-` reads stdin)
    Hash { file: PathBuf },
}

#[derive(Debug, Args)]
struct DomainArgs {
    #[arg(long = "domain-name", env = "DOMAIN_NAME", default_value = DEFAULT_DOMAIN_NAME)]
    name: String,

    #[arg(long = "domain-version", env = "DOMAIN_VERSION", default_value = DEFAULT_DOMAIN_VERSION)]
    version: String,

    /// Decimal or 0x hex
    #[arg(long, env = "CHAIN_ID", default_value = "1")]
    chain_id: String,

    /// Hashed verbatim as a string
    #[arg(long, env = "NFT_CONTRACT_ADDRESS")]
    verifying_contract: String,
}

impl DomainArgs {
    fn to_domain(&self) -> Result<Eip712Domain> {
        let chain_id = parse_uint_str(&self.chain_id)
            .with_context(|| format!("invalid chain id: {}", self.chain_id))?;
        Ok(Eip712Domain::new(
            self.name.clone(),
            self.version.clone(),
            chain_id,
            self.verifying_contract.clone(),
        ))
    }
}

#[derive(Debug, Args)]
struct PayloadArgs {
    /// Contract of the token whose metadata is cloned
    #[arg(long)]
    contract: String,

    /// Decimal token id
    #[arg(long)]
    token_id: String,
}

impl PayloadArgs {
    fn to_payload(&self) -> Result<UpdateMetadata> {
        let contract: Address = self
            .contract
            .parse()
            .with_context(|| format!("invalid contract address: {}", self.contract))?;
        if self.token_id.is_empty() || !self.token_id.chars().all(|c| c.is_ascii_digit()) {
            bail!("token id must be a decimal integer: {}", self.token_id);
        }
        let token_id = U256::from_dec_str(&self.token_id)
            .map_err(|e| anyhow::anyhow!("invalid token id {}: {:?}", self.token_id, e))?;
        Ok(UpdateMetadata::new(contract, token_id))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::set_min_level(cli.log_level);

    match cli.command {
        Command::Digest { domain, payload } => {
            let domain = domain.to_domain()?;
            let payload = payload.to_payload()?;
            let pre_image = get_pre_image(&payload.to_typed_data(&domain))?;
            log_debug!("cli", "computed digest", digest = pre_image.final_hash);

            if cli.json {
                println!(
                    "{}",
                    json!({
                        "domainSeparator": format!("0x{}", hex::encode(pre_image.domain_separator)),
                        "structHash": format!("0x{}", hex::encode(pre_image.struct_hash)),
                        "digest": pre_image.final_hash.to_hex(),
                    })
                );
            } else {
                println!("{}", pre_image.final_hash);
            }
        }
        Command::Sign {
            domain,
            payload,
            private_key,
        } => {
            let private_key = Zeroizing::new(private_key);
            let key_bytes = Zeroizing::new(
                hex::decode(strip_hex_prefix(private_key.trim())).context("private key is not hex")?,
            );

            let domain = domain.to_domain()?;
            let payload = payload.to_payload()?;
            let signature = payload.sign(&domain, &key_bytes)?;
            let signer = address_from_private_key(&key_bytes)?;

            if cli.json {
                println!(
                    "{}",
                    json!({
                        "signer": signer,
                        "signature": signature.to_hex(),
                        "digest": payload.digest(&domain)?.to_hex(),
                    })
                );
            } else {
                println!("{}", signature.to_hex());
            }
        }
        Command::Verify {
            domain,
            payload,
            signature,
            expected,
        } => {
            let domain = domain.to_domain()?;
            let payload = payload.to_payload()?;
            if !signature.starts_with("0x") {
                bail!("signature must be 0x-prefixed hex");
            }
            let signature = hex::decode(strip_hex_prefix(&signature)).context("signature is not hex")?;

            let signer = match expected {
                Some(expected) => {
                    let expected: Address = expected
                        .parse()
                        .with_context(|| format!("invalid expected address: {}", expected))?;
                    payload.verify_signer(&domain, &signature, &expected)?
                }
                None => payload.recover_signer(&domain, &signature)?,
            };

            if cli.json {
                println!("{}", json!({ "signer": signer }));
            } else {
                println!("{}", signer);
            }
        }
        Command::Hash { file } => {
            let document = read_input(&file)?;
            let typed_data = TypedData::from_json(&document)?;
            let pre_image = get_pre_image(&typed_data)?;

            if cli.json {
                println!(
                    "{}",
                    json!({
                        "primaryType": typed_data.primary_type,
                        "domainSeparator": format!("0x{}", hex::encode(pre_image.domain_separator)),
                        "structHash": format!("0x{}", hex::encode(pre_image.struct_hash)),
                        "digest": pre_image.final_hash.to_hex(),
                    })
                );
            } else {
                println!("{}", pre_image.final_hash);
            }
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
