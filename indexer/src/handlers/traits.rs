//! Handler trait ports for event processing.
//!
//! Each trait defines a port for handling events from a specific domain
//! area. The [`crate::indexer::EventRouter`] dispatches decoded events to
//! the appropriate handler based on event type.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::events::{
    AgentRegistered, AtomEnabled, FeedbackRevoked, MetadataDeleted, MetadataSet, NewFeedback,
    OwnerSynced, RegistryInitialized, ResponseAppended, UriUpdated, WalletUpdated,
};
use crate::types::primitives::Pubkey;

// ═══════════════════════════════════════════════════════════════════════════════
// URI ENQUEUER - sink for the agent handler's fire-and-forget worker hand-off
// ═══════════════════════════════════════════════════════════════════════════════

/// Port through which [`AgentPort`] implementations hand a changed URI off
/// to the background metadata fetcher, without depending on its type.
pub trait UriEnqueuer: Send + Sync {
    /// Enqueue a fetch for `asset`'s `uri`. Returns `false` if the queue
    /// rejected the task (full, or a duplicate of the asset's latest
    /// pending request); the caller only logs this, it is not an error.
    fn enqueue_uri(&self, asset: Pubkey, uri: String) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGENT PORT - Agent lifecycle and metadata events
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for handling agent lifecycle and metadata-map events.
///
/// Handles:
/// - Agent registration (`AgentRegistered`)
/// - URI, wallet, owner, and enabled-flag updates
/// - Metadata key set/delete
/// - Registry initialization (collection pointer bootstrap)
#[async_trait]
pub trait AgentPort: Send + Sync {
    /// Handle a new agent registration.
    async fn handle_agent_registered(&self, event: AgentRegistered) -> Result<()>;

    /// Handle a metadata URI update.
    async fn handle_uri_updated(&self, event: UriUpdated) -> Result<()>;

    /// Handle a settlement wallet update.
    async fn handle_wallet_updated(&self, event: WalletUpdated) -> Result<()>;

    /// Handle an enabled-flag change.
    async fn handle_atom_enabled(&self, event: AtomEnabled) -> Result<()>;

    /// Handle an owner change.
    async fn handle_owner_synced(&self, event: OwnerSynced) -> Result<()>;

    /// Handle a metadata key set.
    async fn handle_metadata_set(&self, event: MetadataSet) -> Result<()>;

    /// Handle a metadata key delete.
    async fn handle_metadata_deleted(&self, event: MetadataDeleted) -> Result<()>;

    /// Handle registry initialization.
    async fn handle_registry_initialized(&self, event: RegistryInitialized) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEEDBACK PORT - Feedback lifecycle events
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for handling feedback lifecycle events.
///
/// Handles:
/// - New feedback submission (`NewFeedback`)
/// - Responses appended to a feedback entry (`ResponseAppended`)
/// - Feedback revocation (`FeedbackRevoked`)
#[async_trait]
pub trait FeedbackPort: Send + Sync {
    /// Handle new feedback submission.
    async fn handle_new_feedback(&self, event: NewFeedback) -> Result<()>;

    /// Handle a response appended to a feedback entry.
    async fn handle_response_appended(&self, event: ResponseAppended) -> Result<()>;

    /// Handle a feedback revocation.
    async fn handle_feedback_revoked(&self, event: FeedbackRevoked) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// MOCK IMPLEMENTATIONS FOR TESTING
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
pub mod mocks {
    //! Mock handler implementations for testing.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Mock handler that counts method calls.
    ///
    /// Useful for verifying that the router dispatches events correctly.
    #[derive(Debug, Default, Clone)]
    pub struct CountingHandler {
        /// The number of times any handler method has been called.
        pub call_count: Arc<AtomicUsize>,
    }

    impl CountingHandler {
        /// Create a new counting handler.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Get the current call count.
        #[must_use]
        pub fn count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn increment(&self) {
            self.call_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AgentPort for CountingHandler {
        async fn handle_agent_registered(&self, _: AgentRegistered) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_uri_updated(&self, _: UriUpdated) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_wallet_updated(&self, _: WalletUpdated) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_atom_enabled(&self, _: AtomEnabled) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_owner_synced(&self, _: OwnerSynced) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_metadata_set(&self, _: MetadataSet) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_metadata_deleted(&self, _: MetadataDeleted) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_registry_initialized(&self, _: RegistryInitialized) -> Result<()> {
            self.increment();
            Ok(())
        }
    }

    #[async_trait]
    impl FeedbackPort for CountingHandler {
        async fn handle_new_feedback(&self, _: NewFeedback) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_response_appended(&self, _: ResponseAppended) -> Result<()> {
            self.increment();
            Ok(())
        }

        async fn handle_feedback_revoked(&self, _: FeedbackRevoked) -> Result<()> {
            self.increment();
            Ok(())
        }
    }
}
