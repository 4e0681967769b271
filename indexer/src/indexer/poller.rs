//! Ingestion pipeline: backfill and live-tail polling.
//!
//! The Poller is the only writer of the ingestion cursor. It drives two
//! phases against the [`LedgerClient`] collaborator:
//!
//! - **Backfill**: runs once, when no cursor is saved, to walk the program's
//!   full signature history from genesis forward.
//! - **Live tail**: runs forever after backfill, paging backward from the
//!   chain head on each tick to pick up new signatures since the cursor.
//!
//! Both phases converge on the same per-transaction processing path: fetch,
//! decode, resolve `tx_index`, and hand the event to the [`EventBuffer`].

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::abi::Decoder;
use crate::error::Result;
use crate::handlers::{AgentPort, FeedbackPort};
use crate::indexer::buffer::{BufferedEvent, EventBuffer};
use crate::indexer::checkpoint::CheckpointManager;
use crate::ports::{Clock, CursorStore, DlqStore};
use crate::types::primitives::{Slot, TxIndex};
use ledger_client::{Commitment, LedgerClient, SignatureInfo, SignaturePage};

/// Consecutive scan failures before backfill aborts.
const MAX_SCAN_FAILURES: u32 = 5;
/// Gap size (in signatures) past which live-tail pagination checkpoints
/// its partial progress instead of holding everything in memory.
const MEMORY_GUARD_THRESHOLD: usize = 100_000;

/// Tunables controlling poll cadence and batch sizing.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub polling_interval: Duration,
    pub batch_size: usize,
}

/// Tracks a live-tail pagination gap that exceeded the memory guard, so the
/// next tick can resume without re-walking already-seen pages or losing the
/// original stop point.
#[derive(Debug, Clone, Default)]
struct PendingContinuation {
    before: Option<String>,
    stop_signature: Option<String>,
}

#[derive(Debug, Default)]
struct PollerStats {
    processed: u64,
    errors: u64,
}

/// Drives backfill and live-tail ingestion for a single watched program
/// address.
pub struct Poller<L, D, A: AgentPort, F: FeedbackPort, C, DQ, CL> {
    ledger: L,
    decoder: D,
    buffer: EventBuffer<A, F, C, DQ, CL>,
    checkpoint: CheckpointManager<C>,
    program_address: String,
    config: PollerConfig,
    pending: tokio::sync::Mutex<Option<PendingContinuation>>,
    stats: tokio::sync::Mutex<PollerStats>,
}

impl<L, D, A, F, C, DQ, CL> Poller<L, D, A, F, C, DQ, CL>
where
    L: LedgerClient,
    D: Decoder,
    A: AgentPort + 'static,
    F: FeedbackPort + 'static,
    C: CursorStore + Clone + 'static,
    DQ: DlqStore + 'static,
    CL: Clock + 'static,
{
    /// Build a poller. `checkpoint` and `buffer` must share the same
    /// underlying cursor store so cursor reads (recovery) and writes
    /// (post-flush) agree.
    pub fn new(
        ledger: L,
        decoder: D,
        buffer: EventBuffer<A, F, C, DQ, CL>,
        checkpoint: CheckpointManager<C>,
        program_address: impl Into<String>,
        config: PollerConfig,
    ) -> Self {
        Self {
            ledger,
            decoder,
            buffer,
            checkpoint,
            program_address: program_address.into(),
            config,
            pending: tokio::sync::Mutex::new(None),
            stats: tokio::sync::Mutex::new(PollerStats::default()),
        }
    }

    /// Signatures requested per page, from configuration.
    fn page_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Run backfill (if no cursor exists yet) then live-tail until
    /// cancellation, flushing the buffer before returning.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let cursor = self.checkpoint.load().await?;
        if cursor.is_none() {
            info!("no cursor found, starting backfill");
            self.backfill(&cancel).await?;
        }

        while !cancel.is_cancelled() {
            tokio::select! {
                () = cancel.cancelled() => break,
                result = self.live_tail_tick() => {
                    if let Err(err) = result {
                        warn!(error = %err, "live-tail tick failed");
                    }
                }
            }
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.polling_interval) => {}
            }
        }

        self.buffer.flush().await;
        info!("poller stopped");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Backfill
    // ─────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, cancel))]
    async fn backfill(&self, cancel: &CancellationToken) -> Result<()> {
        let checkpoints = self.scan_checkpoints(cancel).await?;
        self.process_checkpoints_oldest_first(&checkpoints).await?;
        info!("backfill complete");
        Ok(())
    }

    /// Page backward from the head recording a checkpoint signature once
    /// per page, oldest recorded checkpoint last.
    async fn scan_checkpoints(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let mut checkpoints = Vec::new();
        let mut before: Option<String> = None;
        let mut consecutive_failures = 0u32;
        let mut backoff = Duration::from_secs(1);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let mut page = SignaturePage::new(self.page_size());
            if let Some(b) = &before {
                page = page.before(b.clone());
            }

            match self.ledger.list_signatures(&self.program_address, page).await {
                Ok(entries) if entries.is_empty() => break,
                Ok(entries) => {
                    consecutive_failures = 0;
                    backoff = Duration::from_secs(1);
                    if let Some(last) = entries.last() {
                        checkpoints.push(last.signature.clone());
                        before = Some(last.signature.clone());
                    }
                    if entries.len() < self.page_size() {
                        break;
                    }
                }
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(error = %err, consecutive_failures, "scan page failed");
                    if consecutive_failures >= MAX_SCAN_FAILURES {
                        warn!("scan aborted after repeated failures");
                        break;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                }
            }
        }

        debug!(count = checkpoints.len(), "scan phase recorded checkpoints");
        Ok(checkpoints)
    }

    /// Process checkpoints oldest-first: for each adjacent pair, fetch the
    /// window strictly between them and process oldest-first. After the
    /// last (= oldest) checkpoint, fetch anything newer than the newest
    /// checkpoint to bridge to live.
    async fn process_checkpoints_oldest_first(&self, checkpoints: &[String]) -> Result<()> {
        if checkpoints.is_empty() {
            return Ok(());
        }

        // checkpoints[0] is newest, checkpoints[last] is oldest.
        for window in checkpoints.windows(2).rev() {
            let [newer, older] = window else { unreachable!() };
            self.process_signature_window(Some(newer.clone()), Some(older.clone())).await?;
        }

        // Bridge the gap between the newest checkpoint and the current head.
        self.process_signature_window(None, checkpoints.first().cloned()).await?;

        Ok(())
    }

    /// Fetch and process every signature strictly between `before` (newer
    /// bound, exclusive) and `until` (older bound, exclusive), oldest first.
    async fn process_signature_window(&self, before: Option<String>, until: Option<String>) -> Result<()> {
        loop {
            let mut page = SignaturePage::new(self.page_size());
            if let Some(b) = &before {
                page = page.before(b.clone());
            }
            if let Some(u) = &until {
                page = page.until(u.clone());
            }

            let entries = self.ledger.list_signatures(&self.program_address, page).await?;
            if entries.is_empty() {
                return Ok(());
            }

            let mut ordered = entries.clone();
            ordered.reverse();
            self.process_signature_batch(&ordered).await?;

            if entries.len() < self.page_size() {
                return Ok(());
            }
            // Pagination within a bounded window always means we've covered
            // everything once a short page comes back, since `before` only
            // advances via the outer checkpoint walk.
            return Ok(());
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Live tail
    // ─────────────────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    async fn live_tail_tick(&self) -> Result<()> {
        let cursor = self.checkpoint.load().await?;
        let stop_signature = cursor.and_then(|c| c.last_signature);

        let mut pending = self.pending.lock().await.take();
        let start_before = pending.as_ref().and_then(|p| p.before.clone());
        let effective_stop = pending
            .as_ref()
            .and_then(|p| p.stop_signature.clone())
            .or_else(|| stop_signature.clone());

        let mut collected = Vec::new();
        let mut before = start_before;

        loop {
            let mut page = SignaturePage::new(self.page_size());
            if let Some(b) = &before {
                page = page.before(b.clone());
            }

            let entries = self.ledger.list_signatures(&self.program_address, page).await?;
            if entries.is_empty() {
                break;
            }

            let hit_stop = effective_stop
                .as_ref()
                .and_then(|stop| entries.iter().position(|e| &e.signature == stop));

            let take = hit_stop.unwrap_or(entries.len());
            collected.extend(entries.iter().take(take).cloned());

            if hit_stop.is_some() || entries.len() < self.page_size() {
                break;
            }

            if collected.len() >= MEMORY_GUARD_THRESHOLD {
                warn!(
                    collected = collected.len(),
                    "live-tail gap exceeded memory guard, checkpointing partial progress"
                );
                pending = Some(PendingContinuation {
                    before: entries.last().map(|e| e.signature.clone()),
                    stop_signature: effective_stop.clone(),
                });
                break;
            }

            before = entries.last().map(|e| e.signature.clone());
        }

        *self.pending.lock().await = pending;

        if collected.is_empty() {
            return Ok(());
        }

        collected.reverse();
        self.process_signature_batch(&collected).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shared per-transaction processing
    // ─────────────────────────────────────────────────────────────────────

    /// Process a batch of signatures already in chronological order:
    /// group by slot, resolve `tx_index` within each slot, sort by the
    /// canonical key, then process one at a time.
    async fn process_signature_batch(&self, entries: &[SignatureInfo]) -> Result<()> {
        let mut by_slot: HashMap<u64, Vec<&SignatureInfo>> = HashMap::new();
        for entry in entries {
            by_slot.entry(entry.slot).or_default().push(entry);
        }

        let mut resolved: Vec<(u64, TxIndex, String)> = Vec::new();
        for (slot, sigs) in &by_slot {
            let indices = self.resolve_tx_indices(*slot, sigs).await;
            for sig in sigs {
                let tx_index = indices.get(&sig.signature).copied().unwrap_or(TxIndex(None));
                resolved.push((*slot, tx_index, sig.signature.clone()));
            }
        }

        resolved.sort_by_key(|(slot, tx_index, signature)| (*slot, tx_index.sort_key(), signature.clone()));

        for (slot, tx_index, signature) in resolved {
            if let Err(err) = self.process_transaction(Slot(slot), tx_index, &signature).await {
                warn!(%signature, error = %err, "transaction processing failed");
                self.stats.lock().await.errors += 1;
                continue;
            }
            self.report_progress().await;
        }

        Ok(())
    }

    /// Resolve `tx_index` for every signature in a single slot. A slot with
    /// exactly one signature gets index 0 without a block fetch; otherwise
    /// the block is fetched once and positions are read off its signature
    /// list. On fetch failure every signature in the slot gets `None`.
    async fn resolve_tx_indices(&self, slot: u64, sigs: &[&SignatureInfo]) -> HashMap<String, TxIndex> {
        if sigs.len() == 1 {
            let mut map = HashMap::with_capacity(1);
            map.insert(sigs[0].signature.clone(), TxIndex(Some(0)));
            return map;
        }

        match self.ledger.fetch_block(slot, Commitment::Confirmed).await {
            Ok(block) => sigs
                .iter()
                .map(|sig| {
                    let index = block
                        .signatures
                        .iter()
                        .position(|s| s == &sig.signature)
                        .map(|pos| pos as u32);
                    (sig.signature.clone(), TxIndex(index))
                })
                .collect(),
            Err(err) => {
                warn!(slot, error = %err, "block fetch failed, persisting NULL tx_index");
                sigs.iter().map(|sig| (sig.signature.clone(), TxIndex(None))).collect()
            }
        }
    }

    async fn process_transaction(&self, slot: Slot, tx_index: TxIndex, signature: &str) -> Result<()> {
        let tx = self.ledger.fetch_transaction(signature, Commitment::Confirmed).await?;
        let events = self.decoder.decode(&tx).await?;

        for mut event in events {
            event.set_tx_index(tx_index);
            self.buffer
                .add(BufferedEvent {
                    event,
                    signature: signature.to_string(),
                    slot,
                })
                .await;
        }

        self.stats.lock().await.processed += 1;
        Ok(())
    }

    async fn report_progress(&self) {
        let stats = self.stats.lock().await;
        if stats.processed % 100 == 0 && stats.processed > 0 {
            info!(processed = stats.processed, errors = stats.errors, "poller progress");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::abi::mocks::StaticDecoder;
    use crate::handlers::mocks::CountingHandler;
    use crate::indexer::buffer::BufferConfig;
    use crate::indexer::event_router::EventRouter;
    use crate::ports::FakeClock;
    use crate::types::entities::{DeadLetterEntry, IndexerCursor};
    use crate::types::enums::CursorSource;
    use async_trait::async_trait;
    use ledger_client::MockLedgerClient;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default, Clone)]
    struct SharedCursorStore {
        saved: std::sync::Arc<StdMutex<Option<IndexerCursor>>>,
    }

    #[async_trait]
    impl CursorStore for SharedCursorStore {
        async fn get_cursor(&self, _source: CursorSource) -> Result<Option<IndexerCursor>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()> {
            let mut guard = self.saved.lock().unwrap();
            let should_write = guard.as_ref().is_none_or(|c| c.last_slot < cursor.last_slot);
            if should_write {
                *guard = Some(cursor.clone());
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct NullDlqStore;

    #[async_trait]
    impl DlqStore for NullDlqStore {
        async fn enqueue_dead_letter(&self, _entry: &DeadLetterEntry) -> Result<()> {
            Ok(())
        }
        async fn count_dead_letters(&self) -> Result<u64> {
            Ok(0)
        }
        async fn evict_dead_letters_older_than(&self, _older_than_secs: i64) -> Result<u64> {
            Ok(0)
        }
    }

    fn build_poller() -> (
        Poller<
            std::sync::Arc<MockLedgerClient>,
            StaticDecoder,
            CountingHandler,
            CountingHandler,
            SharedCursorStore,
            NullDlqStore,
            FakeClock,
        >,
        std::sync::Arc<MockLedgerClient>,
        CountingHandler,
    ) {
        let ledger = std::sync::Arc::new(MockLedgerClient::new());
        let decoder = StaticDecoder::new();
        let agent_handler = CountingHandler::new();
        let router = EventRouter::new(agent_handler.clone(), CountingHandler::new());
        let cursor_store = SharedCursorStore::default();
        let buffer = EventBuffer::new(
            router,
            cursor_store.clone(),
            NullDlqStore,
            FakeClock::now_fake(),
            BufferConfig {
                max_entries: 1,
                ..BufferConfig::default()
            },
        );
        let checkpoint = CheckpointManager::new(cursor_store);
        let poller = Poller::new(
            ledger.clone(),
            decoder,
            buffer,
            checkpoint,
            "program-address",
            PollerConfig {
                polling_interval: Duration::from_millis(1),
                batch_size: 1000,
            },
        );
        (poller, ledger, agent_handler)
    }

    #[tokio::test]
    async fn resolves_single_tx_slot_without_block_fetch() {
        let (poller, _ledger, _handler) = build_poller();
        let sig = SignatureInfo {
            signature: "sig-1".to_string(),
            slot: 10,
            block_time: None,
            err: None,
        };
        let indices = poller.resolve_tx_indices(10, &[&sig]).await;
        assert_eq!(indices.get("sig-1"), Some(&TxIndex(Some(0))));
    }

    #[tokio::test]
    async fn resolves_multi_tx_slot_via_block_fetch() {
        let (poller, ledger, _handler) = build_poller();
        ledger.push_block(ledger_client::RawBlock {
            slot: 20,
            signatures: vec!["sig-a".to_string(), "sig-b".to_string()],
        });
        let sig_a = SignatureInfo { signature: "sig-a".to_string(), slot: 20, block_time: None, err: None };
        let sig_b = SignatureInfo { signature: "sig-b".to_string(), slot: 20, block_time: None, err: None };
        let indices = poller.resolve_tx_indices(20, &[&sig_a, &sig_b]).await;
        assert_eq!(indices.get("sig-a"), Some(&TxIndex(Some(0))));
        assert_eq!(indices.get("sig-b"), Some(&TxIndex(Some(1))));
    }

    #[tokio::test]
    async fn missing_block_persists_null_tx_index() {
        let (poller, _ledger, _handler) = build_poller();
        let sig_a = SignatureInfo { signature: "sig-a".to_string(), slot: 99, block_time: None, err: None };
        let sig_b = SignatureInfo { signature: "sig-b".to_string(), slot: 99, block_time: None, err: None };
        let indices = poller.resolve_tx_indices(99, &[&sig_a, &sig_b]).await;
        assert_eq!(indices.get("sig-a"), Some(&TxIndex(None)));
    }
}
