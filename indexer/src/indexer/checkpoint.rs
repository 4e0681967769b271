//! Checkpoint management for poller state persistence and recovery.
//!
//! This module provides a high-level interface over [`CursorStore`] for
//! determining where the poller should resume after a restart.
//!
//! # Checkpoint Strategy
//!
//! 1. **On successful transaction processing**: update the cursor to the
//!    transaction's `(signature, slot)`.
//! 2. **On restart**: resume backfill/live-tail bounded by the last saved
//!    cursor's signature.
//!
//! Unlike a block-number chain, there is no contiguous range to "roll back
//! to" on a fork — the verifier reconciles individual rows by signature
//! instead of the poller rewinding a checkpoint. This module only tracks
//! forward progress.

use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::ports::CursorStore;
use crate::types::entities::IndexerCursor;
use crate::types::enums::CursorSource;
use crate::types::primitives::Slot;

// ═══════════════════════════════════════════════════════════════════════════════
// RECOVERY MODE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mode for determining the poller's starting cursor on startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Resume from the last saved cursor (default behavior).
    #[default]
    Resume,
    /// Start from a specific signature, ignoring any existing cursor.
    /// Does not clear existing data — use with caution.
    StartFrom(String),
    /// Start from the beginning of chain history (no `until` bound at all).
    Genesis,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHECKPOINT MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Manages the poller's cursor for persistence and recovery.
#[derive(Debug)]
pub struct CheckpointManager<S> {
    store: S,
    recovery_mode: RecoveryMode,
}

impl<S> CheckpointManager<S>
where
    S: CursorStore,
{
    /// Create a new checkpoint manager over the given cursor store.
    pub const fn new(store: S) -> Self {
        Self {
            store,
            recovery_mode: RecoveryMode::Resume,
        }
    }

    /// Set the recovery mode for startup.
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// Load the saved cursor, if any.
    ///
    /// # Errors
    /// Returns an error if the store fails to retrieve the cursor.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<IndexerCursor>> {
        let cursor = self.store.get_cursor(CursorSource::Poller).await?;
        debug!(found = cursor.is_some(), "loaded poller cursor");
        Ok(cursor)
    }

    /// The signature to pass as `until` when paging backward from the chain
    /// head, per the recovery mode. `None` means backfill to genesis.
    ///
    /// # Errors
    /// Returns an error if the checkpoint cannot be loaded.
    #[instrument(skip(self))]
    pub async fn get_start_signature(&self) -> Result<Option<String>> {
        let start = match &self.recovery_mode {
            RecoveryMode::Resume => {
                let cursor = self.load().await?;
                match cursor {
                    Some(c) if c.last_signature.is_some() => {
                        info!(signature = ?c.last_signature, "resuming from saved cursor");
                        c.last_signature
                    }
                    _ => {
                        info!("no cursor found, backfilling from genesis");
                        None
                    }
                }
            }
            RecoveryMode::StartFrom(signature) => {
                warn!(%signature, "starting from specified signature (ignoring saved cursor)");
                Some(signature.clone())
            }
            RecoveryMode::Genesis => {
                info!("starting from genesis (ignoring saved cursor)");
                None
            }
        };

        Ok(start)
    }

    /// Update the cursor after processing a transaction.
    ///
    /// The store enforces slot-monotonicity: a write with a lower slot than
    /// the one already saved is silently ignored rather than regressing the
    /// cursor.
    ///
    /// # Errors
    /// Returns an error if the store fails to save the cursor.
    #[instrument(skip(self, clock), fields(%signature, slot = slot.0))]
    pub async fn update(
        &self,
        signature: String,
        slot: Slot,
        clock: &impl crate::ports::Clock,
    ) -> Result<()> {
        let cursor = IndexerCursor {
            source: CursorSource::Poller,
            last_signature: Some(signature),
            last_slot: slot,
            updated_at: clock.now(),
        };
        self.store.save_cursor(&cursor).await?;
        Ok(())
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consume the manager and return the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::ports::FakeClock;

    #[derive(Debug, Default)]
    struct MockCursorStore {
        cursor: Mutex<Option<IndexerCursor>>,
    }

    #[async_trait]
    impl CursorStore for MockCursorStore {
        async fn get_cursor(&self, _source: CursorSource) -> Result<Option<IndexerCursor>> {
            Ok(self.cursor.lock().unwrap().clone())
        }

        async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()> {
            let mut guard = self.cursor.lock().unwrap();
            let should_write = match guard.as_ref() {
                Some(existing) => existing.last_slot < cursor.last_slot,
                None => true,
            };
            if should_write {
                *guard = Some(cursor.clone());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn resume_with_no_cursor_starts_at_genesis() {
        let manager = CheckpointManager::new(MockCursorStore::default());
        let start = manager.get_start_signature().await.unwrap();
        assert!(start.is_none());
    }

    #[tokio::test]
    async fn resume_with_saved_cursor_returns_its_signature() {
        let store = MockCursorStore::default();
        *store.cursor.lock().unwrap() = Some(IndexerCursor {
            source: CursorSource::Poller,
            last_signature: Some("sig-a".to_string()),
            last_slot: Slot(10),
            updated_at: Utc::now(),
        });
        let manager = CheckpointManager::new(store);

        let start = manager.get_start_signature().await.unwrap();
        assert_eq!(start.as_deref(), Some("sig-a"));
    }

    #[tokio::test]
    async fn start_from_ignores_saved_cursor() {
        let store = MockCursorStore::default();
        *store.cursor.lock().unwrap() = Some(IndexerCursor {
            source: CursorSource::Poller,
            last_signature: Some("sig-a".to_string()),
            last_slot: Slot(10),
            updated_at: Utc::now(),
        });
        let manager = CheckpointManager::new(store)
            .with_recovery_mode(RecoveryMode::StartFrom("sig-override".to_string()));

        let start = manager.get_start_signature().await.unwrap();
        assert_eq!(start.as_deref(), Some("sig-override"));
    }

    #[tokio::test]
    async fn genesis_ignores_saved_cursor() {
        let store = MockCursorStore::default();
        *store.cursor.lock().unwrap() = Some(IndexerCursor {
            source: CursorSource::Poller,
            last_signature: Some("sig-a".to_string()),
            last_slot: Slot(10),
            updated_at: Utc::now(),
        });
        let manager = CheckpointManager::new(store).with_recovery_mode(RecoveryMode::Genesis);

        let start = manager.get_start_signature().await.unwrap();
        assert!(start.is_none());
    }

    #[tokio::test]
    async fn update_persists_cursor() {
        let manager = CheckpointManager::new(MockCursorStore::default());
        let clock = FakeClock::now_fake();

        manager
            .update("sig-a".to_string(), Slot(5), &clock)
            .await
            .unwrap();

        let cursor = manager.load().await.unwrap().unwrap();
        assert_eq!(cursor.last_signature.as_deref(), Some("sig-a"));
        assert_eq!(cursor.last_slot, Slot(5));
    }

    #[test]
    fn manager_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CheckpointManager<MockCursorStore>>();
    }
}
