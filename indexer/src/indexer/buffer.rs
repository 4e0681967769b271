//! Event Buffer — a bounded accumulator trading latency for write throughput.
//!
//! Events are appended as the poller decodes transactions. A flush drains
//! the accumulated slice, dispatches each event through the [`EventRouter`],
//! and advances the cursor to the batch's newest `(signature, slot)`. A
//! failing flush is retried with linear backoff before the batch is
//! dead-lettered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

use crate::error::Result;
use crate::handlers::{AgentPort, FeedbackPort};
use crate::indexer::event_router::EventRouter;
use crate::ports::{Clock, CursorStore, DlqStore};
use crate::types::entities::{DeadLetterEntry, IndexerCursor};
use crate::types::enums::CursorSource;
use crate::types::events::LedgerEvent;
use crate::types::primitives::Slot;

/// A decoded event paired with the transaction it came from, for cursor
/// bookkeeping at flush time.
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub event: LedgerEvent,
    pub signature: String,
    pub slot: Slot,
}

/// Tunables for flush timing and retry behavior.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Flush immediately once this many entries accumulate.
    pub max_entries: usize,
    /// Flush this long after the first entry lands in an empty buffer.
    pub flush_interval: Duration,
    /// Number of flush attempts before dead-lettering the batch.
    pub max_retries: u32,
    /// Base linear backoff between retries (multiplied by attempt number).
    pub retry_backoff: Duration,
    /// Capacity the dead letter queue is provisioned for, used only to
    /// compute the `dlq_utilization_pct` gauge — the store itself enforces
    /// no such limit.
    pub dlq_capacity: usize,
}

/// DLQ utilization at or above this percentage triggers a warning log.
const DLQ_UTILIZATION_WARN_THRESHOLD: f64 = 80.0;

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            flush_interval: Duration::from_millis(500),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            dlq_capacity: 10_000,
        }
    }
}

#[derive(Debug, Default)]
struct BufferMetrics {
    events_buffered: AtomicU64,
    events_flushed: AtomicU64,
    flush_count: AtomicU64,
    dead_lettered: AtomicU64,
    total_flush_millis: AtomicU64,
}

struct Inner<A: AgentPort, F: FeedbackPort, C, D, CL> {
    router: EventRouter<A, F>,
    cursor_store: C,
    dlq_store: D,
    clock: CL,
    config: BufferConfig,
    entries: Mutex<Vec<BufferedEvent>>,
    flushing: AtomicBool,
    timer_armed: AtomicBool,
    metrics: BufferMetrics,
}

/// A bounded, flush-on-timer-or-threshold event accumulator.
///
/// Cheaply [`Clone`]able — all clones share the same underlying buffer and
/// reentrancy latch.
pub struct EventBuffer<A: AgentPort, F: FeedbackPort, C, D, CL> {
    inner: Arc<Inner<A, F, C, D, CL>>,
}

impl<A: AgentPort, F: FeedbackPort, C, D, CL> Clone for EventBuffer<A, F, C, D, CL> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, F, C, D, CL> EventBuffer<A, F, C, D, CL>
where
    A: AgentPort + 'static,
    F: FeedbackPort + 'static,
    C: CursorStore + 'static,
    D: DlqStore + 'static,
    CL: Clock + 'static,
{
    /// Build a new buffer over the given router, cursor store, DLQ store and clock.
    pub fn new(
        router: EventRouter<A, F>,
        cursor_store: C,
        dlq_store: D,
        clock: CL,
        config: BufferConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                router,
                cursor_store,
                dlq_store,
                clock,
                config,
                entries: Mutex::new(Vec::new()),
                flushing: AtomicBool::new(false),
                timer_armed: AtomicBool::new(false),
                metrics: BufferMetrics::default(),
            }),
        }
    }

    /// Append an event. Flushes immediately if the high-water mark is hit,
    /// otherwise arms the flush timer if this is the first pending entry.
    pub async fn add(&self, buffered: BufferedEvent) {
        self.inner
            .metrics
            .events_buffered
            .fetch_add(1, Ordering::Relaxed);
        counter!("events_buffered").increment(1);

        let should_flush_now = {
            let mut entries = self.inner.entries.lock().await;
            entries.push(buffered);
            entries.len() >= self.inner.config.max_entries
        };

        if should_flush_now {
            self.flush().await;
            return;
        }

        if !self.inner.timer_armed.swap(true, Ordering::SeqCst) {
            let this = self.clone();
            let delay = self.inner.config.flush_interval;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.inner.timer_armed.store(false, Ordering::SeqCst);
                this.flush().await;
            });
        }
    }

    /// Drain and flush the current batch, retrying with linear backoff and
    /// dead-lettering on exhaustion. No-ops if a flush is already in flight
    /// (reentrancy latch) or the buffer is empty.
    #[instrument(skip(self))]
    pub async fn flush(&self) {
        if self.inner.flushing.swap(true, Ordering::SeqCst) {
            debug!("flush already in progress, skipping");
            return;
        }

        let batch = {
            let mut entries = self.inner.entries.lock().await;
            std::mem::take(&mut *entries)
        };

        if batch.is_empty() {
            self.inner.flushing.store(false, Ordering::SeqCst);
            return;
        }

        let started = Instant::now();
        let mut attempt = 1u32;
        loop {
            match self.try_flush_batch(&batch).await {
                Ok(()) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    self.inner
                        .metrics
                        .events_flushed
                        .fetch_add(batch.len() as u64, Ordering::Relaxed);
                    let flush_count = self.inner.metrics.flush_count.fetch_add(1, Ordering::Relaxed) + 1;
                    let total_millis = self
                        .inner
                        .metrics
                        .total_flush_millis
                        .fetch_add(elapsed_ms, Ordering::Relaxed)
                        + elapsed_ms;

                    counter!("events_flushed").increment(batch.len() as u64);
                    counter!("flush_count").increment(1);
                    histogram!("flush_duration_ms").record(elapsed_ms as f64);
                    gauge!("avg_flush_ms").set(total_millis as f64 / flush_count as f64);

                    debug!(count = batch.len(), elapsed_ms, "flush succeeded");
                    break;
                }
                Err(err) if attempt < self.inner.config.max_retries => {
                    warn!(attempt, error = %err, "flush failed, retrying");
                    tokio::time::sleep(self.inner.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        error = %err,
                        count = batch.len(),
                        "flush exhausted retries, dead-lettering batch"
                    );
                    self.dead_letter_batch(&batch, &err.to_string()).await;
                    break;
                }
            }
        }

        self.inner.flushing.store(false, Ordering::SeqCst);
    }

    async fn try_flush_batch(&self, batch: &[BufferedEvent]) -> Result<()> {
        for item in batch {
            self.inner.router.route(item.event.clone()).await?;
        }

        if let Some(newest) = batch.iter().max_by_key(|item| item.slot) {
            let cursor = IndexerCursor {
                source: CursorSource::Poller,
                last_signature: Some(newest.signature.clone()),
                last_slot: newest.slot,
                updated_at: self.inner.clock.now(),
            };
            self.inner.cursor_store.save_cursor(&cursor).await?;
        }

        Ok(())
    }

    async fn dead_letter_batch(&self, batch: &[BufferedEvent], error: &str) {
        for item in batch {
            let payload = serde_json::to_value(&item.event).unwrap_or(serde_json::Value::Null);
            let entry = DeadLetterEntry {
                id: 0,
                tx_signature: item.signature.clone(),
                payload,
                error: error.to_string(),
                attempts: self.inner.config.max_retries as i32,
                created_at: self.inner.clock.now(),
            };
            if let Err(enqueue_err) = self.inner.dlq_store.enqueue_dead_letter(&entry).await {
                error!(error = %enqueue_err, signature = %item.signature, "failed to enqueue dead letter");
            }
        }
        self.inner
            .metrics
            .dead_lettered
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        counter!("dead_lettered").increment(batch.len() as u64);

        match self.inner.dlq_store.count_dead_letters().await {
            Ok(size) => {
                let utilization_pct = size as f64 / self.inner.config.dlq_capacity as f64 * 100.0;
                gauge!("dlq_size").set(size as f64);
                gauge!("dlq_utilization_pct").set(utilization_pct);
                if utilization_pct >= DLQ_UTILIZATION_WARN_THRESHOLD {
                    warn!(size, utilization_pct, "dead letter queue nearing capacity");
                }
            }
            Err(err) => error!(error = %err, "failed to read dead letter queue size"),
        }
    }

    /// Number of events appended since construction.
    #[must_use]
    pub fn events_buffered(&self) -> u64 {
        self.inner.metrics.events_buffered.load(Ordering::Relaxed)
    }

    /// Number of events that made it through a successful flush.
    #[must_use]
    pub fn events_flushed(&self) -> u64 {
        self.inner.metrics.events_flushed.load(Ordering::Relaxed)
    }

    /// Number of completed flush cycles (successful or dead-lettered).
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.inner.metrics.flush_count.load(Ordering::Relaxed)
    }

    /// Number of events moved to the dead letter queue.
    #[must_use]
    pub fn dead_lettered(&self) -> u64 {
        self.inner.metrics.dead_lettered.load(Ordering::Relaxed)
    }

    /// Mean flush duration in milliseconds across all completed flushes.
    #[must_use]
    pub fn average_flush_millis(&self) -> f64 {
        let flush_count = self.inner.metrics.flush_count.load(Ordering::Relaxed);
        if flush_count == 0 {
            return 0.0;
        }
        let total_millis = self.inner.metrics.total_flush_millis.load(Ordering::Relaxed);
        total_millis as f64 / flush_count as f64
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::handlers::mocks::CountingHandler;
    use crate::ports::FakeClock;
    use crate::types::events::{AgentRegistered, EventMetadata};
    use crate::types::primitives::{Pubkey, TxIndex};

    #[derive(Debug, Default)]
    struct MockCursorStore {
        saved: StdMutex<Option<IndexerCursor>>,
    }

    #[async_trait]
    impl CursorStore for MockCursorStore {
        async fn get_cursor(&self, _source: CursorSource) -> Result<Option<IndexerCursor>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()> {
            *self.saved.lock().unwrap() = Some(cursor.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct MockDlqStore {
        entries: StdMutex<Vec<DeadLetterEntry>>,
    }

    #[async_trait]
    impl DlqStore for MockDlqStore {
        async fn enqueue_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn count_dead_letters(&self) -> Result<u64> {
            Ok(self.entries.lock().unwrap().len() as u64)
        }

        async fn evict_dead_letters_older_than(&self, _older_than_secs: i64) -> Result<u64> {
            Ok(0)
        }
    }

    fn sample_event(signature: &str) -> LedgerEvent {
        LedgerEvent::AgentRegistered(AgentRegistered {
            meta: EventMetadata {
                block_slot: Slot(1),
                tx_index: TxIndex(Some(0)),
                tx_signature: signature.to_string(),
            },
            asset: Pubkey::ZERO,
            owner: Pubkey::ZERO,
            collection: Pubkey::ZERO,
            wallet: Pubkey::ZERO,
            uri: String::new(),
        })
    }

    fn buffer_with(
        config: BufferConfig,
    ) -> (
        EventBuffer<CountingHandler, CountingHandler, MockCursorStore, MockDlqStore, FakeClock>,
        CountingHandler,
    ) {
        let agent_handler = CountingHandler::new();
        let router = EventRouter::new(agent_handler.clone(), CountingHandler::new());
        let buffer = EventBuffer::new(
            router,
            MockCursorStore::default(),
            MockDlqStore::default(),
            FakeClock::now_fake(),
            config,
        );
        (buffer, agent_handler)
    }

    #[tokio::test]
    async fn flushes_immediately_at_max_entries() {
        let (buffer, handler) = buffer_with(BufferConfig {
            max_entries: 2,
            ..BufferConfig::default()
        });

        buffer
            .add(BufferedEvent {
                event: sample_event("sig-1"),
                signature: "sig-1".to_string(),
                slot: Slot(1),
            })
            .await;
        assert_eq!(handler.count(), 0);

        buffer
            .add(BufferedEvent {
                event: sample_event("sig-2"),
                signature: "sig-2".to_string(),
                slot: Slot(2),
            })
            .await;

        assert_eq!(handler.count(), 2);
        assert_eq!(buffer.events_flushed(), 2);
    }

    #[tokio::test]
    async fn flush_advances_cursor_to_newest_slot() {
        let (buffer, _handler) = buffer_with(BufferConfig {
            max_entries: 2,
            ..BufferConfig::default()
        });

        buffer
            .add(BufferedEvent {
                event: sample_event("sig-1"),
                signature: "sig-1".to_string(),
                slot: Slot(1),
            })
            .await;
        buffer
            .add(BufferedEvent {
                event: sample_event("sig-2"),
                signature: "sig-2".to_string(),
                slot: Slot(5),
            })
            .await;

        let cursor = buffer.inner.cursor_store.get_cursor(CursorSource::Poller).await.unwrap().unwrap();
        assert_eq!(cursor.last_slot, Slot(5));
        assert_eq!(cursor.last_signature.as_deref(), Some("sig-2"));
    }

    #[tokio::test]
    async fn empty_flush_is_a_noop() {
        let (buffer, handler) = buffer_with(BufferConfig::default());
        buffer.flush().await;
        assert_eq!(handler.count(), 0);
        assert_eq!(buffer.flush_count(), 0);
        assert_eq!(buffer.average_flush_millis(), 0.0);
    }

    #[tokio::test]
    async fn average_flush_millis_tracks_completed_flushes() {
        let (buffer, _handler) = buffer_with(BufferConfig {
            max_entries: 1,
            ..BufferConfig::default()
        });

        buffer
            .add(BufferedEvent {
                event: sample_event("sig-1"),
                signature: "sig-1".to_string(),
                slot: Slot(1),
            })
            .await;

        assert_eq!(buffer.flush_count(), 1);
        assert!(buffer.average_flush_millis() < 1000.0);
    }
}
