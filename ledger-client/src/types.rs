//! Common types for ledger client operations.
//!
//! This module defines chain-facing data structures returned by [`crate::LedgerClient`]:
//!
//! - [`SignatureInfo`] - one entry of a `getSignaturesForAddress`-style page
//! - [`RawTransaction`] - an opaque, decoder-ready parsed transaction envelope
//! - [`RawAccount`] - an opaque account payload
//! - [`Commitment`] - confirmation level requested from the RPC endpoint

use serde::{Deserialize, Serialize};

/// Confirmation level for RPC reads.
///
/// Mirrors the commitment levels exposed by Solana-style JSON-RPC endpoints.
/// The indexer's live-tail poller reads at `Confirmed`; the verifier reads at
/// `Finalized` when establishing its cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Optimistically confirmed by a supermajority of stake.
    Confirmed,
    /// Finalized — reorg probability is treated as zero past this point.
    Finalized,
}

impl Commitment {
    /// The RPC parameter string for this commitment level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

/// One entry returned by a signature-listing call, prior to transaction decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Base58 transaction signature.
    pub signature: String,
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Unix timestamp of the containing block, if the endpoint reports one.
    pub block_time: Option<i64>,
    /// Error payload if the transaction failed on-chain; `None` means success.
    pub err: Option<serde_json::Value>,
}

/// An opaque, fully-fetched transaction payload.
///
/// The indexer never interprets `raw` itself — it hands the whole value to
/// the (out of scope) decoder, which returns typed events. This client's
/// job ends at "here is the JSON body the RPC endpoint returned for this
/// signature", plus the envelope fields (`slot`, `block_time`) needed for
/// ordering regardless of decode outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction signature.
    pub signature: String,
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Unix timestamp of the containing block, if available.
    pub block_time: Option<i64>,
    /// Full RPC response body for this transaction.
    pub raw: serde_json::Value,
}

/// A block's transaction signatures in on-chain order, used only to resolve
/// `tx_index` for slots containing more than one indexed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// The slot this block occupies.
    pub slot: u64,
    /// Transaction signatures in the block's canonical order.
    pub signatures: Vec<String>,
}

/// An opaque account payload, used by the verifier's existence probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAccount {
    /// Account address (base58).
    pub address: String,
    /// Slot the account data was read at (the `context.slot` of the response).
    pub slot: u64,
    /// Full account payload, or `None` if the account does not exist.
    pub raw: Option<serde_json::Value>,
}

/// Cursor/page parameters for `list_signatures`.
#[derive(Debug, Clone, Default)]
pub struct SignaturePage {
    /// Only return signatures older than this one (exclusive), walking backward.
    pub before: Option<String>,
    /// Only return signatures newer than this one (exclusive); used to bound backfill.
    pub until: Option<String>,
    /// Maximum number of entries to return (endpoint-capped, typically 1000).
    pub limit: usize,
}

impl SignaturePage {
    /// Build a page request with the given limit and no cursor.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            before: None,
            until: None,
            limit,
        }
    }

    /// Set the `before` cursor.
    #[must_use]
    pub fn before(mut self, signature: impl Into<String>) -> Self {
        self.before = Some(signature.into());
        self
    }

    /// Set the `until` boundary.
    #[must_use]
    pub fn until(mut self, signature: impl Into<String>) -> Self {
        self.until = Some(signature.into());
        self
    }
}
