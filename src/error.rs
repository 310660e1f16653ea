//! Service error types
//!
//! Every failure on the request path flows through [`ServiceError`] so the
//! handler can turn it into a status code and a JSON error body.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::eip712::Eip712Error;

/// Message returned to callers for every authorization failure
pub const UNAUTHORIZED_MESSAGE: &str = "signature does not authorize this update";

/// Main error type for NFTCloner operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    /// Logged, never sent to the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    /// Recovery failures, signer mismatches and missing ownership all look alike
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, UNAUTHORIZED_MESSAGE)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, format!("upstream returned status {}", status))
            .with_details(body)
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotImplemented, msg)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// HTTP status the handler responds with
    pub fn status_code(&self) -> u16 {
        match self.code {
            ErrorCode::Internal => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Request errors
    InvalidInput,
    Unauthorized,

    // Environment errors
    ConfigError,

    // Upstream errors
    NetworkError,
    UpstreamError,
    NotImplemented,
    StorageError,

    // Internal
    Internal,
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// Conversions from common error types

impl From<Eip712Error> for ServiceError {
    fn from(e: Eip712Error) -> Self {
        match e {
            Eip712Error::InvalidSignatureLength(_)
            | Eip712Error::InvalidSignature(_)
            | Eip712Error::SignerMismatch { .. } => {
                ServiceError::unauthorized().with_details(e.to_string())
            }
            Eip712Error::ValueMismatch { .. } | Eip712Error::InvalidJson(_) => {
                ServiceError::invalid_input(e.to_string())
            }
            Eip712Error::SchemaError(_) | Eip712Error::SigningError(_) => {
                ServiceError::internal(e.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::new(ErrorCode::UpstreamError, format!("invalid JSON: {}", e))
    }
}

impl From<hex::FromHexError> for ServiceError {
    fn from(e: hex::FromHexError) -> Self {
        ServiceError::invalid_input(format!("invalid hex: {}", e))
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(e: url::ParseError) -> Self {
        ServiceError::config(format!("invalid URL: {}", e))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::network("Request timed out")
        } else if e.is_connect() {
            ServiceError::network("Connection failed")
        } else {
            ServiceError::network(e.to_string())
        }
    }
}
