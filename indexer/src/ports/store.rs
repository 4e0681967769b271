//! Storage port traits for data persistence.
//!
//! These traits define the contract for persisting and retrieving
//! domain entities. Infrastructure adapters implement these traits
//! using concrete storage backends (e.g., PostgreSQL).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::{
    Agent, CollectionPointer, DeadLetterEntry, Feedback, IndexerCursor, MetadataEntry, Response,
    Revocation,
};
use crate::types::enums::{CursorSource, FinalityStatus};
use crate::types::primitives::{Pubkey, RawAmount, Slot};

// ═══════════════════════════════════════════════════════════════════════════════
// AGENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for agent persistence operations.
///
/// Handles upserts from `AgentRegistered`, `UriUpdated`, `WalletUpdated`,
/// `AtomEnabled`, and `OwnerSynced` events, plus the verifier's status
/// transitions and aggregate-stat recomputation.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Use `ON CONFLICT (asset) DO UPDATE` so replays are idempotent
/// - Never write a status backwards across the finality lattice
/// - Index on `status` for the verifier's pending-row scan
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Insert a new agent or update an existing one.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn upsert_agent(&self, agent: &Agent) -> Result<()>;

    /// Get an agent by its asset address.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn get_agent(&self, asset: &Pubkey) -> Result<Option<Agent>>;

    /// List agents with `PENDING` status registered at or before `cutoff`,
    /// up to `limit` rows. Used by the verifier to select its working set.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn list_pending_agents(&self, cutoff: Slot, limit: u32) -> Result<Vec<Agent>>;

    /// Apply a status transition to an agent.
    ///
    /// # Errors
    /// Returns an error if `from` does not match the stored status or the
    /// transition is not legal per [`FinalityStatus::can_transition_to`].
    async fn set_agent_status(&self, asset: &Pubkey, status: FinalityStatus) -> Result<()>;

    /// Recompute and persist an agent's `feedback_count` and `total_value`
    /// from its non-orphaned feedback rows.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn recompute_agent_stats(&self, asset: &Pubkey) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEEDBACK STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for feedback persistence operations.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Use `ON CONFLICT (feedback_id) DO NOTHING` for insert idempotency
/// - Insert with `ORPHANED` status (not fail the batch) when the parent
///   agent row is absent
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert a new feedback entry. A duplicate is silently ignored.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn insert_feedback(&self, feedback: &Feedback) -> Result<()>;

    /// Get a feedback entry by id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn get_feedback(&self, feedback_id: &Pubkey) -> Result<Option<Feedback>>;

    /// List non-orphaned feedback entries for an agent, ordered by
    /// `(block_slot, tx_index COALESCE MAX, tx_signature)`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn list_feedback_for_asset(&self, asset: &Pubkey) -> Result<Vec<Feedback>>;

    /// Mark a feedback entry revoked.
    ///
    /// # Errors
    /// Returns an error if the feedback does not exist.
    async fn mark_revoked(&self, feedback_id: &Pubkey) -> Result<()>;

    /// Apply a status transition to a feedback entry.
    ///
    /// # Errors
    /// Returns an error if the transition is not legal.
    async fn set_feedback_status(
        &self,
        feedback_id: &Pubkey,
        status: FinalityStatus,
    ) -> Result<()>;

    /// Count non-orphaned feedback entries and compute their summed value
    /// for an agent, used by [`AgentStore::recompute_agent_stats`].
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn count_and_sum_for_asset(&self, asset: &Pubkey) -> Result<(i64, RawAmount)>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for response persistence operations.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Insert a response. A duplicate `(feedback_id, responder, tx_signature)`
    /// triple is silently ignored.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn insert_response(&self, response: &Response) -> Result<()>;

    /// List responses for a feedback entry, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn list_responses_for_feedback(&self, feedback_id: &Pubkey) -> Result<Vec<Response>>;

    /// Apply a status transition to a response.
    ///
    /// # Errors
    /// Returns an error if the transition is not legal.
    async fn set_response_status(
        &self,
        feedback_id: &Pubkey,
        tx_signature: &str,
        status: FinalityStatus,
    ) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// REVOCATION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for revocation persistence operations.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Insert a revocation record.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn insert_revocation(&self, revocation: &Revocation) -> Result<()>;

    /// Get the revocation for a feedback entry, if any.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn get_revocation(&self, feedback_id: &Pubkey) -> Result<Option<Revocation>>;

    /// Apply a status transition to a revocation.
    ///
    /// # Errors
    /// Returns an error if the transition is not legal.
    async fn set_revocation_status(
        &self,
        feedback_id: &Pubkey,
        status: FinalityStatus,
    ) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for per-agent metadata map persistence.
///
/// # Implementation Notes
///
/// Implementations must refuse to overwrite a key already stored with
/// `immutable = true`; callers should check [`DomainError::MetadataImmutable`]
/// and treat it as a policy block, not a fatal error.
///
/// [`DomainError::MetadataImmutable`]: crate::error::DomainError::MetadataImmutable
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Set a metadata key, or return an error if the existing row is
    /// immutable.
    ///
    /// # Errors
    /// Returns an error if the key is immutable or the database operation
    /// fails.
    async fn set_metadata(&self, entry: &MetadataEntry) -> Result<()>;

    /// Get a metadata entry by key.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn get_metadata(&self, asset: &Pubkey, key: &str) -> Result<Option<MetadataEntry>>;

    /// Delete a metadata key. No-op if the key is immutable or absent.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn delete_metadata(&self, asset: &Pubkey, key: &str) -> Result<()>;

    /// List all metadata entries for an agent.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn list_metadata_for_asset(&self, asset: &Pubkey) -> Result<Vec<MetadataEntry>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for registry-level collection persistence.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Set (or update) a collection record.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn set_collection(&self, pointer: &CollectionPointer) -> Result<()>;

    /// Get a collection record by its address.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn get_collection(&self, collection: &Pubkey) -> Result<Option<CollectionPointer>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for durable ingestion-progress tracking.
///
/// # Implementation Notes
///
/// A single row per [`CursorSource`]; `save_cursor` is an upsert so the
/// poller can call it after every successful batch without a read-modify-
/// write race against itself (it is single-writer per source).
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Get the saved cursor for a source, if any.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn get_cursor(&self, source: CursorSource) -> Result<Option<IndexerCursor>>;

    /// Save (upsert) the cursor for a source.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEAD LETTER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the dead letter queue backing store.
///
/// # Implementation Notes
///
/// Implementations should cap outstanding rows (the buffer enforces the
/// capacity and eviction policy; this port only persists what the buffer
/// hands it).
#[async_trait]
pub trait DlqStore: Send + Sync {
    /// Append an entry to the dead letter table.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn enqueue_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()>;

    /// Count current dead letter rows.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    async fn count_dead_letters(&self) -> Result<u64>;

    /// Delete dead letter rows older than `older_than_secs` seconds.
    /// Returns the number of rows removed.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    async fn evict_dead_letters_older_than(&self, older_than_secs: i64) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_store_ports_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        fn check_agent_store<T: AgentStore>() {
            assert_send_sync::<T>();
        }
        fn check_feedback_store<T: FeedbackStore>() {
            assert_send_sync::<T>();
        }
        fn check_response_store<T: ResponseStore>() {
            assert_send_sync::<T>();
        }
        fn check_revocation_store<T: RevocationStore>() {
            assert_send_sync::<T>();
        }
        fn check_metadata_store<T: MetadataStore>() {
            assert_send_sync::<T>();
        }
        fn check_collection_store<T: CollectionStore>() {
            assert_send_sync::<T>();
        }
        fn check_cursor_store<T: CursorStore>() {
            assert_send_sync::<T>();
        }
        fn check_dlq_store<T: DlqStore>() {
            assert_send_sync::<T>();
        }
    }
}
