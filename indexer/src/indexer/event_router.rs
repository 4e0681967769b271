//! Routes decoded [`LedgerEvent`]s to the handler port responsible for them.
//!
//! The router holds no state of its own beyond the two handler instances. It
//! exists purely to keep the dispatch `match` in one place instead of
//! scattered across the poller and the event buffer's flush path.

use tracing::instrument;

use crate::error::Result;
use crate::handlers::{AgentPort, FeedbackPort};
use crate::types::events::LedgerEvent;

/// Dispatches decoded events to the [`AgentPort`] or [`FeedbackPort`]
/// implementation that owns their projection.
#[derive(Debug, Clone)]
pub struct EventRouter<A, F>
where
    A: AgentPort,
    F: FeedbackPort,
{
    agent_handler: A,
    feedback_handler: F,
}

impl<A, F> EventRouter<A, F>
where
    A: AgentPort,
    F: FeedbackPort,
{
    /// Create a router over the given handler implementations.
    pub const fn new(agent_handler: A, feedback_handler: F) -> Self {
        Self {
            agent_handler,
            feedback_handler,
        }
    }

    /// Dispatch a single decoded event to its handler.
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    pub async fn route(&self, event: LedgerEvent) -> Result<()> {
        match event {
            LedgerEvent::AgentRegistered(e) => self.agent_handler.handle_agent_registered(e).await,
            LedgerEvent::UriUpdated(e) => self.agent_handler.handle_uri_updated(e).await,
            LedgerEvent::WalletUpdated(e) => self.agent_handler.handle_wallet_updated(e).await,
            LedgerEvent::AtomEnabled(e) => self.agent_handler.handle_atom_enabled(e).await,
            LedgerEvent::OwnerSynced(e) => self.agent_handler.handle_owner_synced(e).await,
            LedgerEvent::MetadataSet(e) => self.agent_handler.handle_metadata_set(e).await,
            LedgerEvent::MetadataDeleted(e) => self.agent_handler.handle_metadata_deleted(e).await,
            LedgerEvent::RegistryInitialized(e) => {
                self.agent_handler.handle_registry_initialized(e).await
            }
            LedgerEvent::NewFeedback(e) => self.feedback_handler.handle_new_feedback(e).await,
            LedgerEvent::ResponseAppended(e) => {
                self.feedback_handler.handle_response_appended(e).await
            }
            LedgerEvent::FeedbackRevoked(e) => {
                self.feedback_handler.handle_feedback_revoked(e).await
            }
        }
    }

    /// Dispatch a batch of events in order, stopping at the first error.
    ///
    /// Ordering within a batch matters: events from the same transaction or
    /// adjacent transactions can depend on state written by earlier ones
    /// (e.g. an agent must be registered before its feedback can reference
    /// it), so this does not parallelize across the slice.
    pub async fn route_all(&self, events: Vec<LedgerEvent>) -> Result<()> {
        for event in events {
            self.route(event).await?;
        }
        Ok(())
    }
}
