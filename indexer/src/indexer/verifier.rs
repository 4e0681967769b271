//! Reorg-resilience verifier.
//!
//! On a fixed interval, probes the chain for every `PENDING` agent
//! registered at or before a safety-margin cutoff behind the finalized
//! head, decodes its account bytes, and compares the on-chain hash-chain
//! state against what has been indexed locally. Agents (and their
//! dependent feedback/response/revocation rows) move to `FINALIZED` when
//! they agree, or to `ORPHANED`/stay `PENDING` when they don't, per
//! [`FinalityStatus::can_transition_to`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::indexer::account_layout::{AgentAccount, decode_agent_account};
use crate::indexer::pda::agent_pda;
use crate::ports::{AgentStore, FeedbackStore, RevocationStore, ResponseStore};
use crate::types::entities::Agent;
use crate::types::enums::FinalityStatus;
use crate::types::primitives::{Digest32, Pubkey, Slot};
use ledger_client::{Commitment, LedgerClient};

const EXISTENCE_BATCH_CHUNK: usize = 100;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Outcome of comparing one hash-chain triplet against local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainVerdict {
    /// Local state matches the chain; the row(s) it covers can finalize.
    Agreed,
    /// Local count trails the chain's; the indexer simply hasn't caught up
    /// yet. Not a mismatch — no counter increments.
    Behind,
    /// Local state disagrees with the chain (local count leads, or counts
    /// agree but digests differ); the row(s) it covers must stay pending
    /// for a future cycle (possible reorg in flight).
    Mismatched,
}

/// Periodic reconciliation task comparing local finality state against the
/// program's on-chain account bytes.
pub struct Verifier<L, A, F, R, V> {
    ledger: L,
    agent_store: A,
    feedback_store: F,
    response_store: R,
    revocation_store: V,
    program_id: Pubkey,
    safety_margin_slots: u64,
    batch_size: u32,
    max_retries: u32,
    in_progress: Arc<AtomicBool>,
}

impl<L, A, F, R, V> Verifier<L, A, F, R, V>
where
    L: LedgerClient,
    A: AgentStore,
    F: FeedbackStore,
    R: ResponseStore,
    V: RevocationStore,
{
    /// Build a verifier. `safety_margin_slots` controls how far behind the
    /// finalized head the cutoff sits; `batch_size` caps agents reconciled
    /// per cycle; `max_retries` bounds the existence-probe backoff.
    pub fn new(
        ledger: L,
        agent_store: A,
        feedback_store: F,
        response_store: R,
        revocation_store: V,
        program_id: Pubkey,
        safety_margin_slots: u64,
        batch_size: u32,
        max_retries: u32,
    ) -> Self {
        Self {
            ledger,
            agent_store,
            feedback_store,
            response_store,
            revocation_store,
            program_id,
            safety_margin_slots,
            batch_size,
            max_retries,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one verification cycle. No-ops (returning `Ok(())`) if a prior
    /// cycle is still in flight.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<()> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            debug!("verification cycle already running, skipping");
            return Ok(());
        }

        let result = self.run_cycle_inner().await;
        self.in_progress.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle_inner(&self) -> Result<()> {
        let head = self.ledger.head_slot(Commitment::Finalized).await?;
        let cutoff = Slot(head.saturating_sub(self.safety_margin_slots));

        let agents = self
            .agent_store
            .list_pending_agents(cutoff, self.batch_size)
            .await?;
        if agents.is_empty() {
            debug!(cutoff = cutoff.0, "no pending agents to verify");
            return Ok(());
        }
        info!(count = agents.len(), cutoff = cutoff.0, "starting verification cycle");

        let futures = agents
            .into_iter()
            .map(|agent| self.verify_agent(agent));
        let results = futures::future::join_all(futures).await;

        for result in results {
            if let Err(err) = result {
                warn!(error = %err, "agent verification failed");
            }
        }

        Ok(())
    }

    async fn verify_agent(&self, agent: Agent) -> Result<()> {
        let Some((pda, _bump)) = agent_pda(&self.program_id, &agent.asset) else {
            warn!(asset = %agent.asset, "failed to derive agent PDA");
            return Ok(());
        };

        let account = match self.probe_account(&pda.to_string()).await? {
            None => {
                self.orphan_agent_and_children(&agent).await?;
                return Ok(());
            }
            Some(raw) => raw,
        };

        let decoded = match decode_agent_account(&account) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(asset = %agent.asset, error = %err, "could not decode agent account, leaving pending");
                return Ok(());
            }
        };

        let feedback_rows = self.feedback_store.list_feedback_for_asset(&agent.asset).await?;
        let feedback_verdict = compare_feedback_chain(&feedback_rows, &decoded);

        match feedback_verdict {
            ChainVerdict::Agreed => self.finalize_feedback_rows(&feedback_rows).await?,
            ChainVerdict::Behind => {
                debug!(asset = %agent.asset, "local feedback chain behind on-chain count, staying pending");
            }
            ChainVerdict::Mismatched => {
                warn!(asset = %agent.asset, "feedback chain mismatch, staying pending");
                counter!("hash_chain_mismatches").increment(1);
            }
        }

        let response_count = self.count_responses_for_asset(&feedback_rows).await?;
        if response_count as u64 == decoded.response_chain.count {
            self.finalize_responses_for_asset(&feedback_rows).await?;
        }

        let revoke_count = self.count_revocations_for_asset(&feedback_rows).await?;
        if revoke_count as u64 == decoded.revoke_chain.count {
            self.finalize_revocations_for_asset(&feedback_rows).await?;
        }

        if feedback_verdict == ChainVerdict::Agreed
            && response_count as u64 == decoded.response_chain.count
            && revoke_count as u64 == decoded.revoke_chain.count
        {
            self.transition_agent(&agent.asset, FinalityStatus::Finalized).await?;
            self.agent_store.recompute_agent_stats(&agent.asset).await?;
        }

        Ok(())
    }

    async fn probe_account(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let mut attempt = 0u32;
        loop {
            match self.ledger.fetch_account(address, Commitment::Finalized).await {
                Ok(account) => {
                    return Ok(account.raw.and_then(|raw| decode_account_bytes(&raw)));
                }
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "existence probe failed, retrying");
                    tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
                }
                Err(err) => return Err(AppError::from(crate::error::InfraError::from(err))),
            }
        }
    }

    async fn orphan_agent_and_children(&self, agent: &Agent) -> Result<()> {
        warn!(asset = %agent.asset, "agent account no longer exists, orphaning");
        self.transition_agent(&agent.asset, FinalityStatus::Orphaned).await?;

        let feedback_rows = self.feedback_store.list_feedback_for_asset(&agent.asset).await?;
        for row in &feedback_rows {
            self.transition_feedback(&row.feedback_id, FinalityStatus::Orphaned).await?;
            for response in self.response_store.list_responses_for_feedback(&row.feedback_id).await? {
                if !response.status.is_terminal() {
                    self.response_store
                        .set_response_status(&row.feedback_id, &response.tx_signature, FinalityStatus::Orphaned)
                        .await?;
                }
            }
            if let Some(revocation) = self.revocation_store.get_revocation(&row.feedback_id).await? {
                if !revocation.status.is_terminal() {
                    self.revocation_store
                        .set_revocation_status(&row.feedback_id, FinalityStatus::Orphaned)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn transition_agent(&self, asset: &Pubkey, status: FinalityStatus) -> Result<()> {
        self.agent_store.set_agent_status(asset, status).await
    }

    async fn transition_feedback(&self, feedback_id: &Pubkey, status: FinalityStatus) -> Result<()> {
        self.feedback_store.set_feedback_status(feedback_id, status).await
    }

    async fn finalize_feedback_rows(&self, rows: &[crate::types::entities::Feedback]) -> Result<()> {
        for row in rows {
            if !row.status.is_terminal() {
                self.transition_feedback(&row.feedback_id, FinalityStatus::Finalized).await?;
            }
        }
        Ok(())
    }

    async fn count_responses_for_asset(&self, feedback_rows: &[crate::types::entities::Feedback]) -> Result<usize> {
        let mut total = 0usize;
        for row in feedback_rows {
            total += self
                .response_store
                .list_responses_for_feedback(&row.feedback_id)
                .await?
                .len();
        }
        Ok(total)
    }

    async fn finalize_responses_for_asset(&self, feedback_rows: &[crate::types::entities::Feedback]) -> Result<()> {
        for row in feedback_rows {
            for response in self.response_store.list_responses_for_feedback(&row.feedback_id).await? {
                if !response.status.is_terminal() {
                    self.response_store
                        .set_response_status(&row.feedback_id, &response.tx_signature, FinalityStatus::Finalized)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn count_revocations_for_asset(&self, feedback_rows: &[crate::types::entities::Feedback]) -> Result<usize> {
        let mut total = 0usize;
        for row in feedback_rows {
            if self.revocation_store.get_revocation(&row.feedback_id).await?.is_some() {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn finalize_revocations_for_asset(&self, feedback_rows: &[crate::types::entities::Feedback]) -> Result<()> {
        for row in feedback_rows {
            if let Some(revocation) = self.revocation_store.get_revocation(&row.feedback_id).await? {
                if !revocation.status.is_terminal() {
                    self.revocation_store
                        .set_revocation_status(&row.feedback_id, FinalityStatus::Finalized)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

/// Decode an `account.raw` JSON envelope's base64 data field into bytes.
///
/// Ledger client implementations shape `raw` as `{"data": [base64, "base64"], ...}`,
/// matching `getAccountInfo`'s jsonParsed-less encoding.
fn decode_account_bytes(raw: &serde_json::Value) -> Option<Vec<u8>> {
    use base64::Engine;
    let encoded = raw.get("data")?.get(0)?.as_str()?;
    base64::engine::general_purpose::STANDARD.decode(encoded).ok()
}

/// Compare locally stored feedback rows' running digests against the
/// on-chain feedback chain triplet.
///
/// - If the local count is behind the chain's count, local state is stale;
///   stay pending ([`ChainVerdict::Behind`], not a mismatch).
/// - If the local count leads the chain's count, a reorg may have dropped
///   entries the chain no longer has; stay pending ([`ChainVerdict::Mismatched`]).
/// - If counts agree, the chains are equal only if their terminal digests
///   (or both-absent digests) match; otherwise [`ChainVerdict::Mismatched`].
fn compare_feedback_chain(
    rows: &[crate::types::entities::Feedback],
    decoded: &AgentAccount,
) -> ChainVerdict {
    let local_count = rows.len() as u64;
    let chain = decoded.feedback_chain;

    if local_count < chain.count {
        return ChainVerdict::Behind;
    }
    if local_count > chain.count {
        return ChainVerdict::Mismatched;
    }

    let local_digest: Option<Digest32> = rows.last().and_then(|row| row.running_digest);
    if local_digest == chain.digest {
        ChainVerdict::Agreed
    } else {
        ChainVerdict::Mismatched
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::entities::Feedback;
    use crate::types::primitives::{RawAmount, TxIndex};
    use chrono::Utc;

    fn sample_account(feedback_count: u64, digest: Option<Digest32>) -> AgentAccount {
        AgentAccount {
            collection: Pubkey::ZERO,
            owner: Pubkey::ZERO,
            asset: Pubkey::ZERO,
            bump: 0,
            atom_enabled: true,
            optional_authority: None,
            feedback_chain: crate::indexer::account_layout::ChainTriplet {
                digest,
                count: feedback_count,
            },
            response_chain: crate::indexer::account_layout::ChainTriplet { digest: None, count: 0 },
            revoke_chain: crate::indexer::account_layout::ChainTriplet { digest: None, count: 0 },
        }
    }

    fn sample_feedback(digest: Option<Digest32>) -> Feedback {
        Feedback {
            feedback_id: Pubkey::ZERO,
            asset: Pubkey::ZERO,
            client_address: Pubkey::ZERO,
            value: RawAmount::zero(),
            score: 0,
            tag1: None,
            tag2: None,
            endpoint: None,
            feedback_uri: None,
            feedback_hash: None,
            running_digest: digest,
            revoked: false,
            block_slot: Slot(1),
            tx_index: TxIndex(Some(0)),
            tx_signature: "sig".to_string(),
            status: FinalityStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn agrees_when_counts_and_digests_match() {
        let digest = Digest32::from_bytes([1u8; 32]);
        let rows = vec![sample_feedback(digest)];
        let account = sample_account(1, digest);
        assert_eq!(compare_feedback_chain(&rows, &account), ChainVerdict::Agreed);
    }

    #[test]
    fn agrees_when_both_sides_have_no_feedback() {
        let account = sample_account(0, None);
        assert_eq!(compare_feedback_chain(&[], &account), ChainVerdict::Agreed);
    }

    #[test]
    fn behind_when_local_count_trails_chain() {
        let account = sample_account(2, Digest32::from_bytes([1u8; 32]));
        let rows = vec![sample_feedback(Digest32::from_bytes([1u8; 32]))];
        assert_eq!(compare_feedback_chain(&rows, &account), ChainVerdict::Behind);
    }

    #[test]
    fn mismatches_when_local_count_leads_chain() {
        let account = sample_account(0, None);
        let rows = vec![sample_feedback(Digest32::from_bytes([1u8; 32]))];
        assert_eq!(compare_feedback_chain(&rows, &account), ChainVerdict::Mismatched);
    }

    #[test]
    fn mismatches_when_digests_differ_at_equal_count() {
        let account = sample_account(1, Digest32::from_bytes([2u8; 32]));
        let rows = vec![sample_feedback(Digest32::from_bytes([1u8; 32]))];
        assert_eq!(compare_feedback_chain(&rows, &account), ChainVerdict::Mismatched);
    }
}
