//! Marketplace metadata lookup
//!
//! The source token's name and metadata URI come from the OpenSea asset API;
//! the metadata document is then downloaded from wherever that URI points.
//! Once a clone is stored, the marketplace is asked to re-read the cloned
//! token so its cached copy picks up the new metadata.

use ethers_core::types::U256;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::eip712::Address;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::http;

/// Fields of the asset record this service uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSeaAsset {
    #[serde(default)]
    pub name: String,
    pub token_metadata: String,
}

pub trait MetadataSource: Send + Sync {
    fn fetch_asset(&self, contract: &Address, token_id: &U256) -> ServiceResult<OpenSeaAsset>;

    fn download_metadata(&self, uri: &str) -> ServiceResult<Vec<u8>>;

    /// Ask the marketplace to drop its cached copy of a token
    fn refresh_cache(&self, contract: &Address, token_id: &U256) -> ServiceResult<()>;
}

/// Asset path relative to the API base, e.g. `asset/0xAbc.../42/`
pub fn asset_path(contract: &Address, token_id: &U256) -> String {
    format!("asset/{}/{}/", contract.to_checksum(), token_id)
}

/// Forced revalidation path, e.g. `asset/0xAbc.../42/validate/?force_update=true`
pub fn refresh_path(contract: &Address, token_id: &U256) -> String {
    format!("{}validate/?force_update=true", asset_path(contract, token_id))
}

/// Only http(s) metadata URIs can be fetched
pub fn check_metadata_uri(uri: &str) -> ServiceResult<Url> {
    if uri.starts_with("ipfs://") {
        return Err(ServiceError::not_implemented("ipfs metadata URIs are not supported"));
    }

    let url = Url::parse(uri)
        .map_err(|e| ServiceError::network(format!("invalid metadata URI {:?}: {}", uri, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ServiceError::not_implemented(format!(
            "{} metadata URIs are not supported",
            other
        ))),
    }
}

pub struct OpenSeaClient {
    client: Client,
    base_url: Url,
}

impl OpenSeaClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn asset_url(&self, contract: &Address, token_id: &U256) -> ServiceResult<Url> {
        Ok(self.base_url.join(&asset_path(contract, token_id))?)
    }

    pub fn refresh_url(&self, contract: &Address, token_id: &U256) -> ServiceResult<Url> {
        Ok(self.base_url.join(&refresh_path(contract, token_id))?)
    }
}

impl MetadataSource for OpenSeaClient {
    fn fetch_asset(&self, contract: &Address, token_id: &U256) -> ServiceResult<OpenSeaAsset> {
        let url = self.asset_url(contract, token_id)?;
        http::get_json(&self.client, url.as_str())
    }

    fn download_metadata(&self, uri: &str) -> ServiceResult<Vec<u8>> {
        let url = check_metadata_uri(uri)?;
        http::get_bytes(&self.client, url.as_str())
    }

    fn refresh_cache(&self, contract: &Address, token_id: &U256) -> ServiceResult<()> {
        let url = self.refresh_url(contract, token_id)?;
        http::get_bytes(&self.client, url.as_str())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::time::Duration;

    fn contract() -> Address {
        "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d".parse().unwrap()
    }

    #[test]
    fn test_asset_url() {
        let client = OpenSeaClient::new(
            http::build_client(Duration::from_secs(5)).unwrap(),
            Url::parse("https://api.opensea.io/api/v1/").unwrap(),
        );

        let url = client.asset_url(&contract(), &U256::from(42u64)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.opensea.io/api/v1/asset/0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D/42/"
        );
    }

    #[test]
    fn test_refresh_url() {
        let client = OpenSeaClient::new(
            http::build_client(Duration::from_secs(5)).unwrap(),
            Url::parse("https://testnets-api.opensea.io/api/v1/").unwrap(),
        );

        let url = client.refresh_url(&contract(), &U256::from(7u64)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://testnets-api.opensea.io/api/v1/asset/0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D/7/validate/?force_update=true"
        );
        assert_eq!(url.query(), Some("force_update=true"));
    }

    #[test]
    fn test_ipfs_is_not_implemented() {
        let err = check_metadata_uri("ipfs://QmeSjSinHpPnmXmspMjwiXyN6zS4E9zccariGR3jxcaWtq/1")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotImplemented);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_http_uris_are_accepted() {
        assert!(check_metadata_uri("https://example.com/token/1").is_ok());
        assert_eq!(
            check_metadata_uri("ar://abc").unwrap_err().code,
            ErrorCode::NotImplemented
        );
        assert_eq!(
            check_metadata_uri("not a uri").unwrap_err().code,
            ErrorCode::NetworkError
        );
    }

    #[test]
    fn test_asset_deserialization_ignores_extra_fields() {
        let asset: OpenSeaAsset = serde_json::from_str(
            r#"{"id": 1, "name": "Ape", "token_metadata": "https://example.com/1", "traits": []}"#,
        )
        .unwrap();
        assert_eq!(asset.name, "Ape");
        assert_eq!(asset.token_metadata, "https://example.com/1");
    }
}
