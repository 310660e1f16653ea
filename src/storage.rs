//! Persistence for cloned metadata
//!
//! A record describing each clone plus the public metadata object itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{ServiceError, ServiceResult};

/// Which source token a holder's token now mirrors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadataRecord {
    /// Checksummed address that signed the update
    pub eoa: String,
    pub name: String,
    pub contract: String,
    pub token_id: String,
    pub metadata_uri: String,
    pub time: DateTime<Utc>,
}

/// Object key for a holder's metadata document
pub fn object_key(token_id: &str) -> String {
    format!("nft/{}.json", token_id)
}

pub trait MetadataStore: Send + Sync {
    /// Insert or replace the record stored under `key`
    fn put_record(&self, key: &str, record: TokenMetadataRecord) -> ServiceResult<()>;

    /// Insert or replace a publicly readable object
    fn put_object(&self, key: &str, data: &[u8]) -> ServiceResult<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, TokenMetadataRecord>>,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str) -> Option<TokenMetadataRecord> {
        self.records.read().ok()?.get(key).cloned()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().ok()?.get(key).cloned()
    }
}

impl MetadataStore for InMemoryStore {
    fn put_record(&self, key: &str, record: TokenMetadataRecord) -> ServiceResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ServiceError::storage("record store lock poisoned"))?;
        records.insert(key.to_string(), record);
        Ok(())
    }

    fn put_object(&self, key: &str, data: &[u8]) -> ServiceResult<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| ServiceError::storage("object store lock poisoned"))?;
        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
