//! Handler for feedback lifecycle events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{instrument, warn};

use super::traits::FeedbackPort;
use crate::error::Result;
use crate::ports::{AgentStore, FeedbackStore, ResponseStore, RevocationStore};
use crate::types::entities::{Feedback, Response, Revocation};
use crate::types::enums::FinalityStatus;
use crate::types::events::{FeedbackRevoked, NewFeedback, ResponseAppended};

/// Handler for feedback submission, responses, and revocations.
///
/// Backed by [`FeedbackStore`], [`ResponseStore`], [`RevocationStore`], and
/// [`AgentStore`] (for aggregate stat recomputation).
#[derive(Clone)]
pub struct FeedbackHandler<F, R, V, A> {
    feedback_store: Arc<F>,
    response_store: Arc<R>,
    revocation_store: Arc<V>,
    agent_store: Arc<A>,
}

impl<F, R, V, A> FeedbackHandler<F, R, V, A>
where
    F: FeedbackStore,
    R: ResponseStore,
    V: RevocationStore,
    A: AgentStore,
{
    /// Construct a new feedback handler.
    pub fn new(
        feedback_store: Arc<F>,
        response_store: Arc<R>,
        revocation_store: Arc<V>,
        agent_store: Arc<A>,
    ) -> Self {
        Self {
            feedback_store,
            response_store,
            revocation_store,
            agent_store,
        }
    }
}

#[async_trait]
impl<F, R, V, A> FeedbackPort for FeedbackHandler<F, R, V, A>
where
    F: FeedbackStore,
    R: ResponseStore,
    V: RevocationStore,
    A: AgentStore,
{
    #[instrument(skip(self, event), fields(feedback_id = %event.feedback_id, asset = %event.asset))]
    async fn handle_new_feedback(&self, event: NewFeedback) -> Result<()> {
        let now = Utc::now();
        let feedback = Feedback {
            feedback_id: event.feedback_id,
            asset: event.asset,
            client_address: event.client_address,
            value: event.value,
            score: event.score,
            tag1: event.tag1,
            tag2: event.tag2,
            endpoint: event.endpoint,
            feedback_uri: event.feedback_uri,
            feedback_hash: event.feedback_hash,
            running_digest: event.running_digest,
            revoked: false,
            block_slot: event.meta.block_slot,
            tx_index: event.meta.tx_index,
            tx_signature: event.meta.tx_signature,
            status: FinalityStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.feedback_store.insert_feedback(&feedback).await?;

        if self.agent_store.get_agent(&event.asset).await?.is_none() {
            warn!(asset = %event.asset, "NewFeedback against unknown agent, stats not recomputed");
            return Ok(());
        }
        self.agent_store.recompute_agent_stats(&event.asset).await
    }

    #[instrument(skip(self, event), fields(feedback_id = %event.feedback_id))]
    async fn handle_response_appended(&self, event: ResponseAppended) -> Result<()> {
        let response = Response {
            feedback_id: event.feedback_id,
            responder: event.responder,
            response_text: event.response_text.replace('\0', ""),
            block_slot: event.meta.block_slot,
            tx_index: event.meta.tx_index,
            tx_signature: event.meta.tx_signature,
            status: FinalityStatus::Pending,
            created_at: Utc::now(),
        };
        self.response_store.insert_response(&response).await
    }

    #[instrument(skip(self, event), fields(feedback_id = %event.feedback_id))]
    async fn handle_feedback_revoked(&self, event: FeedbackRevoked) -> Result<()> {
        let feedback = self.feedback_store.get_feedback(&event.feedback_id).await?;

        let status = if feedback.is_some() {
            FinalityStatus::Pending
        } else {
            warn!(
                feedback_id = %event.feedback_id,
                "FeedbackRevoked for unknown feedback, recording as orphaned"
            );
            FinalityStatus::Orphaned
        };

        let revocation = Revocation {
            feedback_id: event.feedback_id,
            revoked_by: event.revoked_by,
            block_slot: event.meta.block_slot,
            tx_index: event.meta.tx_index,
            tx_signature: event.meta.tx_signature,
            status,
            created_at: Utc::now(),
        };
        self.revocation_store.insert_revocation(&revocation).await?;

        let Some(feedback) = feedback else {
            return Ok(());
        };
        self.feedback_store.mark_revoked(&event.feedback_id).await?;
        self.agent_store.recompute_agent_stats(&feedback.asset).await
    }
}
