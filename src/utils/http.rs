//! Blocking HTTP helpers
//!
//! One client configuration for every upstream (marketplace API and
//! metadata hosts). Non-success statuses become `UpstreamError` with the
//! response body attached.

use reqwest::blocking::{Client, Response};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

const USER_AGENT: &str = concat!("nftcloner/", env!("CARGO_PKG_VERSION"));

/// Build the shared blocking client
pub fn build_client(timeout: Duration) -> ServiceResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(5)
        .tcp_nodelay(true)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ServiceError::network(format!("Failed to create HTTP client: {}", e)))
}

/// GET a URL and return the body, failing on any non-200 status
pub fn get_bytes(client: &Client, url: &str) -> ServiceResult<Vec<u8>> {
    let response = client.get(url).send()?;
    let response = require_ok(response)?;
    Ok(response.bytes()?.to_vec())
}

/// GET a URL and parse the body as JSON
pub fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> ServiceResult<T> {
    let body = get_bytes(client, url)?;
    Ok(serde_json::from_slice(&body)?)
}

fn require_ok(response: Response) -> ServiceResult<Response> {
    let status = response.status();
    if status == reqwest::StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(ServiceError::upstream(status.as_u16(), body))
}
