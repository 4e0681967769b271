//! Layered error types for the agent feedback indexer.
//!
//! - [`DomainError`] - business-rule violations (invalid transitions, bad input)
//! - [`InfraError`] - infrastructure failures (database, ledger RPC, decode)
//! - [`AppError`] - application-level errors combining domain and infra
//!
//! # Error Philosophy
//!
//! - Domain errors are recoverable and describe a specific invariant.
//! - Infrastructure errors are logged with full detail; only the variant
//!   (not the message) should ever reach a metric label.
//! - The `Result` alias uses `AppError` for application code.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors representing business rule violations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// An agent with the given asset address was not found.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// A feedback entry with the given id was not found.
    #[error("feedback not found: {0}")]
    FeedbackNotFound(String),

    /// Attempted to act on a feedback entry that is already revoked.
    #[error("feedback already revoked: {0}")]
    FeedbackAlreadyRevoked(String),

    /// Attempted to overwrite a metadata key marked immutable.
    #[error("metadata key is immutable: asset={asset}, key={key}")]
    MetadataImmutable {
        /// The agent's asset address.
        asset: String,
        /// The metadata key.
        key: String,
    },

    /// An address derived from expected seeds did not match the on-chain PDA.
    #[error("invalid PDA for seeds {seeds}: expected {expected}, computed {computed}")]
    InvalidPda {
        /// Human-readable seed description.
        seeds: String,
        /// The address found on-chain.
        expected: String,
        /// The address this process computed.
        computed: String,
    },

    /// Illegal finality-status transition.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted new state.
        to: String,
    },

    /// Malformed pubkey string.
    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    /// Malformed amount payload.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A URI failed validation before being queued for metadata fetch.
    #[error("invalid metadata uri: {0}")]
    InvalidUri(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger RPC error.
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger_client::LedgerError),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event decoding error surfaced by the (external) decoder.
    #[error("event decoding error: {0}")]
    EventDecoding(String),

    /// A row read back from storage failed validation (e.g. a malformed
    /// pubkey or amount column). Indicates corruption upstream of this
    /// process, not a transient failure.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Outbound HTTP request failed (URI-metadata worker).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A fetch was blocked by SSRF policy before any network I/O occurred.
    #[error("blocked by ssrf policy: {0}")]
    SsrfBlocked(String),

    /// Response body exceeded the configured size limit.
    #[error("response exceeded size limit: {0} bytes")]
    ResponseTooLarge(usize),

    /// Compressed payload decompressed beyond the configured bomb-protection limit.
    #[error("decompressed payload exceeded limit: {0} bytes")]
    DecompressionBombSuspected(usize),

    /// Resource not found in storage.
    #[error("resource not found")]
    NotFound,

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Timeout waiting for an operation.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// The verifier detected a hash-chain mismatch or orphaned confirmed row.
    #[error("reorg reconciliation required at slot {0}")]
    ReorgDetected(u64),

    /// An event exhausted its retry budget and was moved to the dead letter table.
    #[error("event moved to dead letter queue: {0}")]
    DeadLettered(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Startup/initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown requested.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application `Result`s.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// CONVENIENCE CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

impl From<crate::types::primitives::InvalidPubkey> for DomainError {
    fn from(err: crate::types::primitives::InvalidPubkey) -> Self {
        Self::InvalidPubkey(err.to_string())
    }
}

impl From<crate::types::primitives::InvalidAmount> for DomainError {
    fn from(err: crate::types::primitives::InvalidAmount) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

impl From<crate::types::primitives::InvalidPubkey> for AppError {
    fn from(err: crate::types::primitives::InvalidPubkey) -> Self {
        Self::Domain(err.into())
    }
}

impl From<crate::types::primitives::InvalidAmount> for AppError {
    fn from(err: crate::types::primitives::InvalidAmount) -> Self {
        Self::Domain(err.into())
    }
}

impl From<ledger_client::LedgerError> for AppError {
    fn from(err: ledger_client::LedgerError) -> Self {
        Self::Infra(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_display() {
        let err = DomainError::AgentNotFound("asset123".into());
        assert!(err.to_string().contains("asset123"));
    }

    #[test]
    fn app_error_from_domain() {
        let domain = DomainError::FeedbackAlreadyRevoked("fb1".into());
        let app: AppError = domain.into();
        assert!(matches!(
            app,
            AppError::Domain(DomainError::FeedbackAlreadyRevoked(_))
        ));
    }

    #[test]
    fn app_error_from_infra() {
        let infra = InfraError::NotFound;
        let app: AppError = infra.into();
        assert!(matches!(app, AppError::Infra(InfraError::NotFound)));
    }

    #[test]
    fn pubkey_error_converts_into_app_error() {
        let err = crate::types::primitives::Pubkey::from_base58("not-base58-!!!").unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(
            app,
            AppError::Domain(DomainError::InvalidPubkey(_))
        ));
    }
}
