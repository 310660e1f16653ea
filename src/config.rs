//! Deployment configuration
//!
//! Read once at startup from the environment and threaded through by
//! reference. Nothing else in the crate reads environment variables.

use ethers_core::types::U256;
use std::time::Duration;
use url::Url;

use crate::eip712::{parse_uint_str, Address, Eip712Domain};
use crate::error::{ServiceError, ServiceResult};
use crate::utils::logging::LogLevel;

pub const DEFAULT_CHAIN_ID: u64 = 1;
pub const DEFAULT_DOMAIN_NAME: &str = "NFTCloner";
pub const DEFAULT_DOMAIN_VERSION: &str = "1";
pub const DEFAULT_OPENSEA_API_URL: &str = "https://api.opensea.io/api/v1/";

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Exactly as configured; the domain hashes this string verbatim
    pub verifying_contract: String,
    /// Same contract, parsed; holds the cloned tokens and answers `tokenByOwner`
    pub contract: Address,
    pub chain_id: U256,
    pub domain_name: String,
    pub domain_version: String,
    pub opensea_api_url: Url,
    pub log_level: LogLevel,
    pub http_timeout: Duration,
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> ServiceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let verifying_contract = get("NFT_CONTRACT_ADDRESS")
            .ok_or_else(|| ServiceError::config("NFT_CONTRACT_ADDRESS is not set"))?;
        let contract: Address = verifying_contract.parse().map_err(|_| {
            ServiceError::config(format!(
                "NFT_CONTRACT_ADDRESS is not an address: {}",
                verifying_contract
            ))
        })?;

        let chain_id = match get("CHAIN_ID") {
            Some(raw) => parse_uint_str(&raw)
                .ok_or_else(|| ServiceError::config(format!("CHAIN_ID is not an integer: {}", raw)))?,
            None => U256::from(DEFAULT_CHAIN_ID),
        };

        let opensea_api_url = parse_url("OPENSEA_API_URL", get("OPENSEA_API_URL"), DEFAULT_OPENSEA_API_URL)?;

        let log_level = match get("LOG_LEVEL") {
            Some(raw) => raw.parse::<LogLevel>().map_err(ServiceError::config)?,
            None => LogLevel::Info,
        };

        Ok(Self {
            verifying_contract,
            contract,
            chain_id,
            domain_name: get("DOMAIN_NAME").unwrap_or_else(|| DEFAULT_DOMAIN_NAME.to_string()),
            domain_version: get("DOMAIN_VERSION").unwrap_or_else(|| DEFAULT_DOMAIN_VERSION.to_string()),
            opensea_api_url,
            log_level,
            http_timeout: Duration::from_secs(30),
        })
    }

    /// The signing domain every payload is hashed under
    pub fn signing_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            self.domain_name.clone(),
            self.domain_version.clone(),
            self.chain_id,
            self.verifying_contract.clone(),
        )
    }
}

fn parse_url(name: &str, value: Option<String>, default: &str) -> ServiceResult<Url> {
    let raw = value.unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).map_err(|e| ServiceError::config(format!("{} is invalid: {}", name, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ServiceError::config(format!(
            "{} must be http(s), got {}",
            name, other
        ))),
    }
}
