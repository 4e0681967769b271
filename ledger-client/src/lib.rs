//! Read-only abstraction over a Solana-compatible ledger.
//!
//! This crate provides a unified interface for reading chain state —
//! signatures, transactions, and accounts — abstracting away endpoint-specific
//! retry and pagination quirks.
//!
//! # Overview
//!
//! The core of this crate is the [`LedgerClient`] trait, implemented by
//! [`standard::JsonRpcLedgerClient`] for production use and
//! [`mock::MockLedgerClient`] for tests.
//!
//! # Architecture
//!
//! This crate follows the ports-and-adapters (hexagonal) architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Indexer                         │
//! └─────────────────────────────────────────────────┘
//!                        │ uses
//!                        ▼
//! ┌─────────────────────────────────────────────────┐
//! │            LedgerClient trait (Port)             │
//! │  - list_signatures()                             │
//! │  - fetch_transaction() / fetch_transactions()    │
//! │  - fetch_account()     / fetch_accounts()        │
//! │  - head_slot()                                   │
//! └─────────────────────────────────────────────────┘
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ JsonRpcLedgerClient   │   │ MockLedgerClient     │
//! │ (Adapter)             │   │ (Adapter, test-only) │
//! └──────────────────────┘   └──────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/ledger-client")]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod error;
pub mod mock;
pub mod standard;
pub mod traits;
pub mod types;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

pub use error::{LedgerError, Result};
pub use mock::MockLedgerClient;
pub use standard::JsonRpcLedgerClient;
pub use traits::LedgerClient;
pub use types::{Commitment, RawAccount, RawBlock, RawTransaction, SignatureInfo, SignaturePage};

/// Convenience re-exports for common use.
pub mod prelude {
    pub use crate::error::{LedgerError, Result};
    pub use crate::traits::LedgerClient;
    pub use crate::types::{Commitment, RawAccount, RawBlock, RawTransaction, SignatureInfo, SignaturePage};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
