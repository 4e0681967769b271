//! Typed on-chain events, as handed to the router by the (out-of-scope) decoder.
//!
//! The decoder's job is external to this crate — it is given a parsed
//! transaction and returns zero or more [`LedgerEvent`] values already
//! tagged by variant. `EventRouter` never inspects raw instruction data.

use serde::{Deserialize, Serialize};

use super::primitives::{Digest32, Pubkey, RawAmount, Slot, TxIndex};

/// Metadata common to every event, independent of its variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub block_slot: Slot,
    pub tx_index: TxIndex,
    pub tx_signature: String,
}

/// A decoded on-chain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A new agent was registered.
    AgentRegistered(AgentRegistered),
    /// An agent's metadata URI changed.
    UriUpdated(UriUpdated),
    /// An agent's settlement wallet changed.
    WalletUpdated(WalletUpdated),
    /// An agent's enabled flag changed.
    AtomEnabled(AtomEnabled),
    /// An agent's owner changed (e.g. following an NFT transfer).
    OwnerSynced(OwnerSynced),
    /// A metadata key was set.
    MetadataSet(MetadataSet),
    /// A metadata key was deleted.
    MetadataDeleted(MetadataDeleted),
    /// New feedback was submitted.
    NewFeedback(NewFeedback),
    /// A response was appended to a feedback entry.
    ResponseAppended(ResponseAppended),
    /// A feedback entry was revoked.
    FeedbackRevoked(FeedbackRevoked),
    /// The on-chain registry was initialized (one-time, emitted once per deployment).
    RegistryInitialized(RegistryInitialized),
}

impl LedgerEvent {
    /// The event metadata, regardless of variant.
    #[must_use]
    pub const fn metadata(&self) -> &EventMetadata {
        match self {
            Self::AgentRegistered(e) => &e.meta,
            Self::UriUpdated(e) => &e.meta,
            Self::WalletUpdated(e) => &e.meta,
            Self::AtomEnabled(e) => &e.meta,
            Self::OwnerSynced(e) => &e.meta,
            Self::MetadataSet(e) => &e.meta,
            Self::MetadataDeleted(e) => &e.meta,
            Self::NewFeedback(e) => &e.meta,
            Self::ResponseAppended(e) => &e.meta,
            Self::FeedbackRevoked(e) => &e.meta,
            Self::RegistryInitialized(e) => &e.meta,
        }
    }

    /// Overwrite the `tx_index` of this event's metadata in place.
    ///
    /// The decoder has no visibility into a transaction's position within
    /// its slot, so it decodes events with a placeholder index; the poller
    /// patches in the resolved value before the event reaches a handler or
    /// the event buffer.
    pub fn set_tx_index(&mut self, tx_index: TxIndex) {
        let meta = match self {
            Self::AgentRegistered(e) => &mut e.meta,
            Self::UriUpdated(e) => &mut e.meta,
            Self::WalletUpdated(e) => &mut e.meta,
            Self::AtomEnabled(e) => &mut e.meta,
            Self::OwnerSynced(e) => &mut e.meta,
            Self::MetadataSet(e) => &mut e.meta,
            Self::MetadataDeleted(e) => &mut e.meta,
            Self::NewFeedback(e) => &mut e.meta,
            Self::ResponseAppended(e) => &mut e.meta,
            Self::FeedbackRevoked(e) => &mut e.meta,
            Self::RegistryInitialized(e) => &mut e.meta,
        };
        meta.tx_index = tx_index;
    }

    /// A short name for the variant, used in logging and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AgentRegistered(_) => "agent_registered",
            Self::UriUpdated(_) => "uri_updated",
            Self::WalletUpdated(_) => "wallet_updated",
            Self::AtomEnabled(_) => "atom_enabled",
            Self::OwnerSynced(_) => "owner_synced",
            Self::MetadataSet(_) => "metadata_set",
            Self::MetadataDeleted(_) => "metadata_deleted",
            Self::NewFeedback(_) => "new_feedback",
            Self::ResponseAppended(_) => "response_appended",
            Self::FeedbackRevoked(_) => "feedback_revoked",
            Self::RegistryInitialized(_) => "registry_initialized",
        }
    }
}

/// A new agent was registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistered {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub owner: Pubkey,
    pub collection: Pubkey,
    pub wallet: Pubkey,
    pub uri: String,
}

/// An agent's metadata URI changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UriUpdated {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub uri: String,
}

/// An agent's settlement wallet changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletUpdated {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub wallet: Pubkey,
}

/// An agent's enabled flag changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomEnabled {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub enabled: bool,
}

/// An agent's owner changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerSynced {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub owner: Pubkey,
}

/// A metadata key was set (or overwritten, if not immutable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSet {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub key: String,
    pub value: Vec<u8>,
    pub immutable: bool,
}

/// A metadata key was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDeleted {
    pub meta: EventMetadata,
    pub asset: Pubkey,
    pub key: String,
}

/// New feedback was submitted against an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub meta: EventMetadata,
    pub feedback_id: Pubkey,
    pub asset: Pubkey,
    pub client_address: Pubkey,
    pub value: RawAmount,
    /// Protocol-defined score submitted with this feedback.
    pub score: i32,
    /// First optional protocol tag.
    pub tag1: Option<String>,
    /// Second optional protocol tag.
    pub tag2: Option<String>,
    /// Endpoint the feedback was submitted against, if reported.
    pub endpoint: Option<String>,
    /// External URI carrying the full feedback payload off-chain.
    pub feedback_uri: Option<String>,
    /// Content hash of the data at `feedback_uri`.
    pub feedback_hash: Option<Digest32>,
    /// Running hash-chain digest computed on-chain as of this entry.
    pub running_digest: Option<Digest32>,
}

/// A response was appended to a feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAppended {
    pub meta: EventMetadata,
    pub feedback_id: Pubkey,
    pub responder: Pubkey,
    pub response_text: String,
}

/// A feedback entry was revoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRevoked {
    pub meta: EventMetadata,
    pub feedback_id: Pubkey,
    pub revoked_by: Pubkey,
}

/// The on-chain registry was initialized for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryInitialized {
    pub meta: EventMetadata,
    pub collection: Pubkey,
    pub authority: Pubkey,
}
