//! Projected domain entities — the rows the store layer persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::FinalityStatus;
use super::primitives::{Digest32, Pubkey, RawAmount, Slot, TxIndex};

/// An on-chain agent registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// The agent's on-chain identity (its registration PDA).
    pub asset: Pubkey,
    /// Current owner, following `OwnerSynced` updates.
    pub owner: Pubkey,
    /// The collection this agent was registered under.
    pub collection: Pubkey,
    /// Current wallet used for settlement, following `WalletUpdated`.
    pub wallet: Pubkey,
    /// Current metadata URI, following `UriUpdated`.
    pub uri: String,
    /// Whether the agent is enabled to accept feedback (`AtomEnabled`).
    pub enabled: bool,
    /// Slot the registering transaction landed in.
    pub registered_at_slot: Slot,
    /// Position of the registering transaction within its slot, used for
    /// the `global_id` backfill ordering.
    pub registered_tx_index: TxIndex,
    /// Signature of the registering transaction, used as the final
    /// tiebreaker for the `global_id` backfill ordering.
    pub registered_tx_signature: String,
    /// Number of feedback entries aggregated against this agent.
    pub feedback_count: i64,
    /// Sum of non-revoked feedback values, in the same exponent-free decimal
    /// space as [`RawAmount::as_decimal`].
    pub total_value: RawAmount,
    /// Mean `score` over non-revoked feedback, recomputed via `AVG(score)`
    /// alongside `feedback_count` on every insert/revoke.
    pub raw_avg_score: f64,
    /// Confirmation status.
    pub status: FinalityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single feedback entry submitted against an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// The feedback account's address.
    pub feedback_id: Pubkey,
    /// The agent this feedback targets.
    pub asset: Pubkey,
    /// The client that submitted the feedback.
    pub client_address: Pubkey,
    /// Feedback value (stake, rating, or similar — protocol-defined).
    pub value: RawAmount,
    /// Protocol-defined score, aggregated into the agent's `raw_avg_score`.
    pub score: i32,
    /// First optional protocol tag (e.g. a feedback category).
    pub tag1: Option<String>,
    /// Second optional protocol tag.
    pub tag2: Option<String>,
    /// Endpoint the feedback was submitted against, if the client reported one.
    pub endpoint: Option<String>,
    /// External URI carrying the full feedback payload off-chain.
    pub feedback_uri: Option<String>,
    /// Content hash of the data at `feedback_uri`.
    pub feedback_hash: Option<Digest32>,
    /// Running hash-chain digest as of this entry, used by the verifier.
    pub running_digest: Option<Digest32>,
    /// Whether this feedback has been revoked.
    pub revoked: bool,
    pub block_slot: Slot,
    pub tx_index: TxIndex,
    pub tx_signature: String,
    pub status: FinalityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A response appended by the agent (or its owner) to a feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub feedback_id: Pubkey,
    pub responder: Pubkey,
    pub response_text: String,
    pub block_slot: Slot,
    pub tx_index: TxIndex,
    pub tx_signature: String,
    pub status: FinalityStatus,
    pub created_at: DateTime<Utc>,
}

/// A revocation of a previously submitted feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revocation {
    pub feedback_id: Pubkey,
    pub revoked_by: Pubkey,
    pub block_slot: Slot,
    pub tx_index: TxIndex,
    pub tx_signature: String,
    pub status: FinalityStatus,
    pub created_at: DateTime<Utc>,
}

/// A single key/value entry in an agent's metadata map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub asset: Pubkey,
    pub key: String,
    /// Raw value bytes after NUL-stripping and codec framing has been applied.
    pub value: Vec<u8>,
    /// Whether this key is write-once (set for protocol-reserved keys like
    /// `_uri:_status`).
    pub immutable: bool,
    pub updated_at: DateTime<Utc>,
}

/// A registry-level collection record, created by `RegistryInitialized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPointer {
    pub collection: Pubkey,
    pub authority: Pubkey,
    pub updated_at: DateTime<Utc>,
}

/// The ingestion pipeline's durable progress marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerCursor {
    pub source: super::enums::CursorSource,
    pub last_signature: Option<String>,
    pub last_slot: Slot,
    pub updated_at: DateTime<Utc>,
}

/// An event that exhausted its retry budget and was diverted to the dead
/// letter table instead of blocking the buffer flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: i64,
    pub tx_signature: String,
    pub payload: serde_json::Value,
    pub error: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}
