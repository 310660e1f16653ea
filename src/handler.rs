//! Metadata update handler
//!
//! Takes a URL-encoded form `contract=..&tokenId=..&signature=0x..`, checks
//! that the signer holds an NFTCloner token, and copies the source token's
//! metadata onto the signer's token. The response body is the copied
//! metadata as a JSON string.

use ethers_core::types::U256;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::eip712::{Address, Eip712Domain, Eip712Error};
use crate::error::{ServiceError, ServiceResult};
use crate::metadata::{MetadataSource, OpenSeaClient};
use crate::ownership::TokenOwnership;
use crate::payload::UpdateMetadata;
use crate::storage::{object_key, MetadataStore, TokenMetadataRecord};
use crate::utils::crypto::strip_hex_prefix;
use crate::utils::{http, logging};
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "handler";

/// A parsed update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMetadataRequest {
    pub contract: Address,
    pub token_id: U256,
    /// Raw bytes; the length is checked during verification
    pub signature: Vec<u8>,
}

impl UpdateMetadataRequest {
    /// Parse a URL-encoded form body. The first value of a repeated field wins.
    pub fn from_form(body: &str) -> ServiceResult<Self> {
        let mut contract = None;
        let mut token_id = None;
        let mut signature = None;

        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            let slot = match key.as_ref() {
                "contract" => &mut contract,
                "tokenId" => &mut token_id,
                "signature" => &mut signature,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let contract = required("contract", contract)?;
        let token_id = required("tokenId", token_id)?;
        let signature = required("signature", signature)?;

        Self::from_parts(&contract, &token_id, &signature)
    }

    pub fn from_parts(contract: &str, token_id: &str, signature: &str) -> ServiceResult<Self> {
        let contract: Address = contract
            .parse()
            .map_err(|_| ServiceError::invalid_input(format!("invalid contract address: {}", contract)))?;

        let token_id = parse_token_id(token_id)?;

        if !signature.starts_with("0x") {
            return Err(ServiceError::invalid_input("signature must be 0x-prefixed hex"));
        }
        let signature = hex::decode(strip_hex_prefix(signature))?;

        Ok(Self {
            contract,
            token_id,
            signature,
        })
    }

    pub fn payload(&self) -> UpdateMetadata {
        UpdateMetadata::new(self.contract, self.token_id)
    }
}

fn required(field: &str, value: Option<String>) -> ServiceResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::invalid_input(format!("{} is required", field)))
}

fn parse_token_id(raw: &str) -> ServiceResult<U256> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::invalid_input(format!("tokenId must be a decimal integer: {}", raw)));
    }
    U256::from_dec_str(raw)
        .map_err(|_| ServiceError::invalid_input(format!("tokenId overflows uint256: {}", raw)))
}

/// Recover who signed `request` under `domain`
///
/// The result is only a claim; callers still decide whether that address is
/// allowed to act.
pub fn verify_update_signature(
    domain: &Eip712Domain,
    request: &UpdateMetadataRequest,
) -> Result<Address, Eip712Error> {
    request.payload().recover_signer(domain, &request.signature)
}

/// Status code and JSON body returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(err: &ServiceError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.message }),
        }
    }
}

/// Runs the update flow against its collaborators
pub struct MetadataUpdater {
    domain: Eip712Domain,
    /// NFTCloner contract holding the cloned tokens
    contract: Address,
    ownership: Arc<dyn TokenOwnership>,
    source: Arc<dyn MetadataSource>,
    store: Arc<dyn MetadataStore>,
}

impl MetadataUpdater {
    pub fn new(
        domain: Eip712Domain,
        contract: Address,
        ownership: Arc<dyn TokenOwnership>,
        source: Arc<dyn MetadataSource>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            domain,
            contract,
            ownership,
            source,
            store,
        }
    }

    /// Wire the marketplace client described by `config` around the given
    /// ownership lookup and store
    pub fn from_config(
        config: &ServiceConfig,
        ownership: Arc<dyn TokenOwnership>,
        store: Arc<dyn MetadataStore>,
    ) -> ServiceResult<Self> {
        logging::set_min_level(config.log_level);
        let client = http::build_client(config.http_timeout)?;
        let source = OpenSeaClient::new(client, config.opensea_api_url.clone());

        Ok(Self::new(
            config.signing_domain(),
            config.contract,
            ownership,
            Arc::new(source),
            store,
        ))
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Handle one form body; never fails, errors become 4xx/5xx responses
    pub fn handle(&self, form_body: &str) -> HandlerResponse {
        match self.update(form_body) {
            Ok(body) => HandlerResponse::ok(body),
            Err(err) => {
                log_warn!(
                    MODULE,
                    "update rejected",
                    code = format!("{:?}", err.code),
                    reason = err.message,
                    details = err.details.as_deref().unwrap_or("-"),
                );
                HandlerResponse::error(&err)
            }
        }
    }

    fn update(&self, form_body: &str) -> ServiceResult<Value> {
        let request = UpdateMetadataRequest::from_form(form_body)?;

        let signer = verify_update_signature(&self.domain, &request)?;
        log_debug!(MODULE, "signature recovered", signer = signer, token_id = request.token_id);

        let owned_token = self
            .ownership
            .token_of_owner(&signer)?
            .ok_or_else(|| {
                ServiceError::unauthorized().with_details(format!("{} holds no token", signer))
            })?;
        let owned_key = owned_token.to_string();

        let asset = self.source.fetch_asset(&request.contract, &request.token_id)?;
        let metadata = self.source.download_metadata(&asset.token_metadata)?;

        let record = TokenMetadataRecord {
            eoa: signer.to_checksum(),
            name: asset.name,
            contract: request.contract.to_checksum(),
            token_id: request.token_id.to_string(),
            metadata_uri: asset.token_metadata,
            time: chrono::Utc::now(),
        };
        self.store.put_record(&owned_key, record)?;
        self.store.put_object(&object_key(&owned_key), &metadata)?;

        // Refresh failures are logged only
        if let Err(err) = self.source.refresh_cache(&self.contract, &owned_token) {
            log_warn!(
                MODULE,
                "cache refresh failed",
                owned_token = owned_key,
                reason = err.message,
                details = err.details.as_deref().unwrap_or("-"),
            );
        }

        log_info!(
            MODULE,
            "metadata cloned",
            signer = signer,
            owned_token = owned_key,
            source_token = request.token_id,
        );

        Ok(Value::String(String::from_utf8_lossy(&metadata).into_owned()))
    }
}
