//! NFTCloner Core Library
//!
//! Verifies EIP-712 signed requests to copy an NFT's metadata onto a holder's
//! NFTCloner token.
//!
//! # Architecture
//!
//! This crate provides:
//! - **eip712**: Typed-data hashing, signing and signer recovery
//! - **payload**: The `UpdateMetadata(address contract,uint256 tokenId)` message
//! - **config**: Deployment configuration and the signing domain
//! - **ownership**: `tokenByOwner` lookups against the NFTCloner contract
//! - **metadata**: Marketplace asset lookup and metadata download
//! - **storage**: Record and object persistence
//! - **handler**: The request flow tying the above together
//!
//! # Security
//!
//! Private keys are copied into `zeroize` buffers and erased when dropped.
//! A recovered address is only a claim until it is compared against an
//! authorized identity.
//!
//! # Example
//!
//! ```rust,ignore
//! use nftcloner::{Eip712Domain, UpdateMetadata};
//!
//! let domain = Eip712Domain::new("NFTCloner", "1", 1u64, contract_address);
//! let payload = UpdateMetadata::new(source_contract, 42u64);
//! let signature = payload.sign(&domain, &private_key)?;
//! let signer = payload.recover_signer(&domain, &signature.to_bytes())?;
//! ```

pub mod config;
pub mod eip712;
pub mod error;
pub mod handler;
pub mod metadata;
pub mod ownership;
pub mod payload;
pub mod storage;
pub mod utils;

// Re-export key types for convenience
pub use config::ServiceConfig;
pub use eip712::{Address, Digest, Eip712Domain, Eip712Error, Eip712Signature, TypedData};
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use handler::{HandlerResponse, MetadataUpdater, UpdateMetadataRequest};
pub use payload::UpdateMetadata;
pub use utils::crypto::{keccak256, to_checksum_address};
