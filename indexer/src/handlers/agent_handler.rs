//! Handler for agent lifecycle and metadata-map events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{instrument, warn};

use super::traits::{AgentPort, UriEnqueuer};
use crate::error::{AppError, Result};
use crate::ports::{AgentStore, CollectionStore, MetadataStore};
use crate::types::entities::{Agent, CollectionPointer, MetadataEntry};
use crate::types::enums::FinalityStatus;
use crate::types::events::{
    AgentRegistered, AtomEnabled, MetadataDeleted, MetadataSet, OwnerSynced, RegistryInitialized,
    UriUpdated, WalletUpdated,
};

/// Reserved metadata key prefix owned exclusively by the URI worker.
///
/// On-chain event handlers must reject writes under this prefix — it is
/// how the worker's `_uri:*` enrichment rows stay distinguishable from
/// on-chain metadata.
pub const URI_WORKER_KEY_PREFIX: &str = "_uri:";

/// Values larger than this are offered to the compression codec; smaller
/// values are framed raw without attempting zstd.
const METADATA_COMPRESS_THRESHOLD: usize = 256;

/// Handler for agent lifecycle, metadata, and registry events.
///
/// Backed by [`AgentStore`], [`MetadataStore`], and [`CollectionStore`];
/// hands URI changes off to a [`UriEnqueuer`] rather than fetching them
/// itself.
#[derive(Clone)]
pub struct AgentHandler<A, M, C, U> {
    agent_store: Arc<A>,
    metadata_store: Arc<M>,
    collection_store: Arc<C>,
    uri_enqueuer: Arc<U>,
}

impl<A, M, C, U> AgentHandler<A, M, C, U>
where
    A: AgentStore,
    M: MetadataStore,
    C: CollectionStore,
    U: UriEnqueuer,
{
    /// Construct a new agent handler.
    pub fn new(
        agent_store: Arc<A>,
        metadata_store: Arc<M>,
        collection_store: Arc<C>,
        uri_enqueuer: Arc<U>,
    ) -> Self {
        Self {
            agent_store,
            metadata_store,
            collection_store,
            uri_enqueuer,
        }
    }
}

#[async_trait]
impl<A, M, C, U> AgentPort for AgentHandler<A, M, C, U>
where
    A: AgentStore,
    M: MetadataStore,
    C: CollectionStore,
    U: UriEnqueuer,
{
    #[instrument(skip(self, event), fields(asset = %event.asset))]
    async fn handle_agent_registered(&self, event: AgentRegistered) -> Result<()> {
        let now = Utc::now();
        let agent = Agent {
            asset: event.asset,
            owner: event.owner,
            collection: event.collection,
            wallet: event.wallet,
            uri: event.uri,
            enabled: true,
            registered_at_slot: event.meta.block_slot,
            registered_tx_index: event.meta.tx_index,
            registered_tx_signature: event.meta.tx_signature,
            feedback_count: 0,
            total_value: crate::types::primitives::RawAmount::zero(),
            raw_avg_score: 0.0,
            status: FinalityStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.agent_store.upsert_agent(&agent).await?;
        self.uri_enqueuer.enqueue_uri(agent.asset, agent.uri);
        Ok(())
    }

    #[instrument(skip(self, event), fields(asset = %event.asset))]
    async fn handle_uri_updated(&self, event: UriUpdated) -> Result<()> {
        let Some(mut agent) = self.agent_store.get_agent(&event.asset).await? else {
            warn!(asset = %event.asset, "UriUpdated for unknown agent");
            return Ok(());
        };
        agent.uri = event.uri;
        agent.updated_at = Utc::now();
        self.agent_store.upsert_agent(&agent).await?;
        self.uri_enqueuer.enqueue_uri(agent.asset, agent.uri);
        Ok(())
    }

    #[instrument(skip(self, event), fields(asset = %event.asset))]
    async fn handle_wallet_updated(&self, event: WalletUpdated) -> Result<()> {
        let Some(mut agent) = self.agent_store.get_agent(&event.asset).await? else {
            warn!(asset = %event.asset, "WalletUpdated for unknown agent");
            return Ok(());
        };
        agent.wallet = event.wallet;
        agent.updated_at = Utc::now();
        self.agent_store.upsert_agent(&agent).await
    }

    #[instrument(skip(self, event), fields(asset = %event.asset))]
    async fn handle_atom_enabled(&self, event: AtomEnabled) -> Result<()> {
        let Some(mut agent) = self.agent_store.get_agent(&event.asset).await? else {
            warn!(asset = %event.asset, "AtomEnabled for unknown agent");
            return Ok(());
        };
        agent.enabled = event.enabled;
        agent.updated_at = Utc::now();
        self.agent_store.upsert_agent(&agent).await
    }

    #[instrument(skip(self, event), fields(asset = %event.asset))]
    async fn handle_owner_synced(&self, event: OwnerSynced) -> Result<()> {
        let Some(mut agent) = self.agent_store.get_agent(&event.asset).await? else {
            warn!(asset = %event.asset, "OwnerSynced for unknown agent");
            return Ok(());
        };
        agent.owner = event.owner;
        agent.updated_at = Utc::now();
        self.agent_store.upsert_agent(&agent).await
    }

    #[instrument(skip(self, event), fields(asset = %event.asset, key = %event.key))]
    async fn handle_metadata_set(&self, event: MetadataSet) -> Result<()> {
        if event.key.starts_with(URI_WORKER_KEY_PREFIX) {
            warn!(key = %event.key, "rejecting on-chain write to reserved metadata prefix");
            return Ok(());
        }

        let sanitized: Vec<u8> = event.value.into_iter().filter(|&b| b != 0).collect();
        let value = if sanitized.len() > METADATA_COMPRESS_THRESHOLD {
            crate::codec::encode(&sanitized)
        } else {
            crate::codec::frame_raw(&sanitized)
        };

        let entry = MetadataEntry {
            asset: event.asset,
            key: event.key,
            value,
            immutable: event.immutable,
            updated_at: Utc::now(),
        };

        match self.metadata_store.set_metadata(&entry).await {
            Ok(()) => Ok(()),
            Err(AppError::Domain(crate::error::DomainError::MetadataImmutable { .. })) => {
                // A re-set against an immutable key is a no-op by protocol
                // convention, not a failure.
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self, event), fields(asset = %event.asset, key = %event.key))]
    async fn handle_metadata_deleted(&self, event: MetadataDeleted) -> Result<()> {
        self.metadata_store
            .delete_metadata(&event.asset, &event.key)
            .await
    }

    #[instrument(skip(self, event), fields(collection = %event.collection))]
    async fn handle_registry_initialized(&self, event: RegistryInitialized) -> Result<()> {
        let pointer = CollectionPointer {
            collection: event.collection,
            authority: event.authority,
            updated_at: Utc::now(),
        };
        self.collection_store.set_collection(&pointer).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::types::primitives::{Pubkey, Slot, TxIndex};

    #[derive(Default)]
    struct FakeAgentStore {
        rows: Mutex<HashMap<Pubkey, Agent>>,
    }

    #[async_trait]
    impl AgentStore for FakeAgentStore {
        async fn upsert_agent(&self, agent: &Agent) -> Result<()> {
            self.rows.lock().unwrap().insert(agent.asset, agent.clone());
            Ok(())
        }
        async fn get_agent(&self, asset: &Pubkey) -> Result<Option<Agent>> {
            Ok(self.rows.lock().unwrap().get(asset).cloned())
        }
        async fn list_pending_agents(&self, _cutoff: Slot, _limit: u32) -> Result<Vec<Agent>> {
            Ok(vec![])
        }
        async fn set_agent_status(&self, asset: &Pubkey, status: FinalityStatus) -> Result<()> {
            if let Some(a) = self.rows.lock().unwrap().get_mut(asset) {
                a.status = status;
            }
            Ok(())
        }
        async fn recompute_agent_stats(&self, _asset: &Pubkey) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeMetadataStore {
        rows: Mutex<HashMap<(Pubkey, String), MetadataEntry>>,
    }

    #[async_trait]
    impl MetadataStore for FakeMetadataStore {
        async fn set_metadata(&self, entry: &MetadataEntry) -> Result<()> {
            let key = (entry.asset, entry.key.clone());
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.get(&key) {
                if existing.immutable {
                    return Err(crate::error::DomainError::MetadataImmutable {
                        asset: entry.asset.to_string(),
                        key: entry.key.clone(),
                    }
                    .into());
                }
            }
            rows.insert(key, entry.clone());
            Ok(())
        }
        async fn get_metadata(&self, asset: &Pubkey, key: &str) -> Result<Option<MetadataEntry>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&(*asset, key.to_string()))
                .cloned())
        }
        async fn delete_metadata(&self, asset: &Pubkey, key: &str) -> Result<()> {
            self.rows.lock().unwrap().remove(&(*asset, key.to_string()));
            Ok(())
        }
        async fn list_metadata_for_asset(&self, _asset: &Pubkey) -> Result<Vec<MetadataEntry>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeCollectionStore {
        rows: Mutex<HashMap<Pubkey, CollectionPointer>>,
    }

    #[async_trait]
    impl CollectionStore for FakeCollectionStore {
        async fn set_collection(&self, pointer: &CollectionPointer) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .insert(pointer.collection, pointer.clone());
            Ok(())
        }
        async fn get_collection(&self, collection: &Pubkey) -> Result<Option<CollectionPointer>> {
            Ok(self.rows.lock().unwrap().get(collection).cloned())
        }
    }

    #[derive(Default)]
    struct FakeUriEnqueuer {
        enqueued: Mutex<Vec<(Pubkey, String)>>,
    }

    impl UriEnqueuer for FakeUriEnqueuer {
        fn enqueue_uri(&self, asset: Pubkey, uri: String) -> bool {
            self.enqueued.lock().unwrap().push((asset, uri));
            true
        }
    }

    fn handler()
    -> AgentHandler<FakeAgentStore, FakeMetadataStore, FakeCollectionStore, FakeUriEnqueuer> {
        AgentHandler::new(
            Arc::new(FakeAgentStore::default()),
            Arc::new(FakeMetadataStore::default()),
            Arc::new(FakeCollectionStore::default()),
            Arc::new(FakeUriEnqueuer::default()),
        )
    }

    fn meta() -> crate::types::events::EventMetadata {
        crate::types::events::EventMetadata {
            block_slot: Slot(10),
            tx_index: TxIndex(Some(0)),
            tx_signature: "sig".to_string(),
        }
    }

    #[tokio::test]
    async fn registering_an_agent_defaults_it_to_pending_and_enabled() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        handler
            .handle_agent_registered(AgentRegistered {
                meta: meta(),
                asset,
                owner: Pubkey::from_bytes([2; 32]),
                collection: Pubkey::from_bytes([3; 32]),
                wallet: Pubkey::from_bytes([4; 32]),
                uri: "ipfs://x".to_string(),
            })
            .await
            .unwrap();

        let agent = handler.agent_store.get_agent(&asset).await.unwrap().unwrap();
        assert!(agent.enabled);
        assert_eq!(agent.status, FinalityStatus::Pending);
    }

    #[tokio::test]
    async fn uri_update_against_unknown_agent_is_a_noop() {
        let handler = handler();
        handler
            .handle_uri_updated(UriUpdated {
                meta: meta(),
                asset: Pubkey::from_bytes([9; 32]),
                uri: "ipfs://y".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registering_and_updating_an_agent_enqueues_its_uri() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        handler
            .handle_agent_registered(AgentRegistered {
                meta: meta(),
                asset,
                owner: Pubkey::from_bytes([2; 32]),
                collection: Pubkey::from_bytes([3; 32]),
                wallet: Pubkey::from_bytes([4; 32]),
                uri: "ipfs://x".to_string(),
            })
            .await
            .unwrap();
        handler
            .handle_uri_updated(UriUpdated {
                meta: meta(),
                asset,
                uri: "ipfs://z".to_string(),
            })
            .await
            .unwrap();

        let enqueued = handler.uri_enqueuer.enqueued.lock().unwrap();
        assert_eq!(
            *enqueued,
            vec![
                (asset, "ipfs://x".to_string()),
                (asset, "ipfs://z".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn metadata_set_rejects_reserved_uri_prefix() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        handler
            .handle_metadata_set(MetadataSet {
                meta: meta(),
                asset,
                key: "_uri:status".to_string(),
                value: vec![1, 2, 3],
                immutable: false,
            })
            .await
            .unwrap();

        assert!(
            handler
                .metadata_store
                .get_metadata(&asset, "_uri:status")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn resetting_an_immutable_key_is_a_noop_not_an_error() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        handler
            .handle_metadata_set(MetadataSet {
                meta: meta(),
                asset,
                key: "k".to_string(),
                value: vec![1],
                immutable: true,
            })
            .await
            .unwrap();

        handler
            .handle_metadata_set(MetadataSet {
                meta: meta(),
                asset,
                key: "k".to_string(),
                value: vec![2],
                immutable: true,
            })
            .await
            .unwrap();

        let entry = handler
            .metadata_store
            .get_metadata(&asset, "k")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(crate::codec::decode(&entry.value).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn metadata_value_strips_nul_bytes() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        handler
            .handle_metadata_set(MetadataSet {
                meta: meta(),
                asset,
                key: "k".to_string(),
                value: vec![1, 0, 2, 0, 3],
                immutable: false,
            })
            .await
            .unwrap();

        let entry = handler
            .metadata_store
            .get_metadata(&asset, "k")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(crate::codec::decode(&entry.value).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn small_metadata_values_are_framed_raw() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        handler
            .handle_metadata_set(MetadataSet {
                meta: meta(),
                asset,
                key: "k".to_string(),
                value: vec![9, 9, 9],
                immutable: false,
            })
            .await
            .unwrap();

        let entry = handler
            .metadata_store
            .get_metadata(&asset, "k")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.value[0], 0x00);
    }

    #[tokio::test]
    async fn large_metadata_values_go_through_the_compression_codec() {
        let handler = handler();
        let asset = Pubkey::from_bytes([1; 32]);
        let big_value = vec![b'x'; 1024];
        handler
            .handle_metadata_set(MetadataSet {
                meta: meta(),
                asset,
                key: "k".to_string(),
                value: big_value.clone(),
                immutable: false,
            })
            .await
            .unwrap();

        let entry = handler
            .metadata_store
            .get_metadata(&asset, "k")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.value[0], 0x01);
        assert_eq!(crate::codec::decode(&entry.value).unwrap(), big_value);
    }

    #[tokio::test]
    async fn registry_initialized_upserts_collection_pointer() {
        let handler = handler();
        let collection = Pubkey::from_bytes([5; 32]);
        handler
            .handle_registry_initialized(RegistryInitialized {
                meta: meta(),
                collection,
                authority: Pubkey::from_bytes([6; 32]),
            })
            .await
            .unwrap();

        assert!(
            handler
                .collection_store
                .get_collection(&collection)
                .await
                .unwrap()
                .is_some()
        );
    }
}
