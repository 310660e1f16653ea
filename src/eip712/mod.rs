//! EIP-712 Typed Data Signing
//!
//! Implementation of EIP-712 typed structured data hashing, signing and
//! signer recovery.
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,ignore
//! use nftcloner::eip712::{TypedData, sign_typed_data, recover_address, hash_typed_data};
//!
//! let typed_data = TypedData::from_json(json_string)?;
//! let digest = hash_typed_data(&typed_data)?;
//! let signature = sign_typed_data(&typed_data, &private_key)?;
//! let signer = recover_address(&digest, &signature)?;
//! ```

pub mod types;
pub mod encoder;
pub mod hasher;
pub mod signer;

pub use types::*;
pub use encoder::*;
pub use hasher::*;
pub use signer::*;
