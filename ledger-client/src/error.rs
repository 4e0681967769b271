//! Error types for ledger client operations.
//!
//! This module provides the error hierarchy for RPC-facing operations:
//!
//! - [`LedgerError`] - The primary error type for all ledger client operations
//!
//! # Error Philosophy
//!
//! These errors are designed to be:
//! - **Actionable**: Each variant tells you what went wrong
//! - **Convertible**: Easy to convert from underlying transport errors
//! - **Chain-agnostic**: Same error shape regardless of the concrete RPC endpoint

use thiserror::Error;

/// Result type alias using [`LedgerError`].
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur when reading from a ledger over RPC.
///
/// # Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Network | `Connection`, `Timeout` | Endpoint unreachable, slow |
/// | Protocol | `Rpc`, `Unsupported` | Server rejected the request |
/// | Data | `InvalidResponse`, `Decode` | Malformed response body |
/// | Not found | `SignatureNotFound`, `AccountNotFound` | Queried state does not exist |
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Failed to establish a connection to the RPC endpoint.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request timed out waiting for a response.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// JSON-RPC error returned by the server.
    #[error("RPC error ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable error message from the server.
        message: String,
    },

    /// The requested operation is not supported by this client.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// A transaction with the given signature was not found.
    #[error("transaction not found: {0}")]
    SignatureNotFound(String),

    /// An account with the given address was not found.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Response was valid JSON but had unexpected structure.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to decode a base58/base64 payload in a response.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid configuration provided to the client.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error wrapping an underlying implementation error.
    #[error("ledger client error: {0}")]
    Other(String),
}

impl LedgerError {
    /// Create an RPC error from code and message.
    #[must_use]
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Whether this error is likely transient and worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Rpc { code, .. } => {
                // -32005: node is behind / limit exceeded; 429 surfaces as -32000 on most RPCs
                *code == -32005 || *code == -32000
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(std::time::Duration::from_secs(0))
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_retryable() {
        let timeout = LedgerError::Timeout(std::time::Duration::from_secs(30));
        assert!(timeout.is_retryable());

        let connection = LedgerError::Connection("connection refused".into());
        assert!(connection.is_retryable());

        let rate_limited = LedgerError::rpc(-32_000, "Too many requests");
        assert!(rate_limited.is_retryable());

        let unsupported = LedgerError::unsupported("cursor pagination");
        assert!(!unsupported.is_retryable());
    }

    #[test]
    fn rpc_constructor_sets_fields() {
        let err = LedgerError::rpc(-32_601, "method not found");
        match err {
            LedgerError::Rpc { code, message } => {
                assert_eq!(code, -32_601);
                assert_eq!(message, "method not found");
            }
            _ => panic!("expected Rpc variant"),
        }
    }
}
