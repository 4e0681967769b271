//! Test fixtures for integration tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use sqlx::PgPool;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

use agent_feedback_indexer::store::PostgresStore;
use agent_feedback_indexer::types::entities::{Agent, Feedback, MetadataEntry};
use agent_feedback_indexer::types::enums::FinalityStatus;
use agent_feedback_indexer::types::primitives::{Pubkey, RawAmount, Slot, TxIndex};

/// A test database instance with pool and container.
///
/// The container is kept alive as long as this struct exists. When
/// dropped, the container is automatically stopped.
pub struct TestDb {
    /// The connection pool to the test database.
    pub pool: PgPool,
    /// The `PostgresStore` wrapping the pool.
    pub store: PostgresStore,
    /// The container (kept alive for the duration of the test).
    _container: ContainerAsync<Postgres>,
}

impl TestDb {
    /// Start a fresh Postgres container, connect, and run migrations.
    ///
    /// # Panics
    /// Panics if container startup, connection, or migrations fail.
    pub async fn new() -> Self {
        let container = Postgres::default()
            .start()
            .await
            .expect("failed to start postgres container");

        let host = container.get_host().await.expect("failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("failed to get port");

        let connection_string =
            super::containers::build_connection_string(&host.to_string(), port);

        let pool = connect_with_retries(&connection_string, 30)
            .await
            .expect("failed to connect to database");

        let store = PostgresStore::new(pool.clone());
        store.run_migrations().await.expect("failed to run migrations");

        Self {
            pool,
            store,
            _container: container,
        }
    }
}

/// Connect with retries — the container's "ready" log line lands slightly
/// before the server actually accepts connections.
async fn connect_with_retries(url: &str, max_attempts: u32) -> Result<PgPool, sqlx::Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPool::connect(url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) if attempts < max_attempts => {
                    tracing::debug!("connection verify failed (attempt {attempts}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if attempts < max_attempts => {
                tracing::debug!("connection failed (attempt {attempts}): {e}");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build a pubkey from a single repeated byte, for readable test data.
#[must_use]
pub fn pubkey(byte: u8) -> Pubkey {
    Pubkey::from_bytes([byte; 32])
}

/// Create a test agent with defaults, already finalized and enabled.
#[must_use]
pub fn create_test_agent(asset: Pubkey, owner: Pubkey, collection: Pubkey) -> Agent {
    let now = Utc::now();
    Agent {
        asset,
        owner,
        collection,
        wallet: owner,
        uri: "ipfs://example-metadata".to_string(),
        enabled: true,
        registered_at_slot: Slot(1000),
        registered_tx_index: TxIndex(Some(0)),
        registered_tx_signature: format!("sig-register-{asset}"),
        feedback_count: 0,
        total_value: RawAmount::zero(),
        raw_avg_score: 0.0,
        status: FinalityStatus::Finalized,
        created_at: now,
        updated_at: now,
    }
}

/// Create a pending (not yet finalized) agent.
#[must_use]
pub fn create_pending_agent(asset: Pubkey, owner: Pubkey, collection: Pubkey) -> Agent {
    let mut agent = create_test_agent(asset, owner, collection);
    agent.status = FinalityStatus::Pending;
    agent
}

/// Create a test feedback entry against `asset`.
#[must_use]
pub fn create_test_feedback(feedback_id: Pubkey, asset: Pubkey, client: Pubkey) -> Feedback {
    let now = Utc::now();
    Feedback {
        feedback_id,
        asset,
        client_address: client,
        value: RawAmount::new("1000000", 0).expect("valid amount"),
        score: 80,
        tag1: None,
        tag2: None,
        endpoint: None,
        feedback_uri: None,
        feedback_hash: None,
        running_digest: None,
        revoked: false,
        block_slot: Slot(1000),
        tx_index: TxIndex(Some(0)),
        tx_signature: format!("sig-{feedback_id}"),
        status: FinalityStatus::Finalized,
        created_at: now,
        updated_at: now,
    }
}

/// Create a metadata entry for `asset`, framed raw (no compression).
#[must_use]
pub fn create_test_metadata(asset: Pubkey, key: &str, value: &[u8]) -> MetadataEntry {
    MetadataEntry {
        asset,
        key: key.to_string(),
        value: agent_feedback_indexer::codec::frame_raw(value),
        immutable: false,
        updated_at: Utc::now(),
    }
}
