//! PostgreSQL implementation of store ports using SQLx.
//!
//! # Type Conversions
//!
//! - [`Pubkey`] persists as a 32-byte `BYTEA`.
//! - [`RawAmount`] persists as a `(TEXT digits, SMALLINT exponent)` pair —
//!   never as a normalized numeric column, so the raw on-chain value is
//!   always recoverable byte-for-byte.
//! - [`Digest32`] persists as a nullable 32-byte `BYTEA`; `NULL` and
//!   all-zero are the same value by construction (see
//!   [`Digest32::from_bytes`]).
//! - [`FinalityStatus`] persists as `TEXT` via its `Display`/`FromStr`
//!   impls.
//! - [`TxIndex`] persists as a nullable `INTEGER`; `NULL` means
//!   unresolved, matching the sort-key contract in
//!   [`TxIndex::sort_key`].
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless,
    clippy::use_self
)]

use async_trait::async_trait;
use bigdecimal::Signed;
use sqlx::{FromRow, postgres::PgPool};
use tracing::{debug, instrument, warn};

use crate::error::{InfraError, Result};
use crate::ports::{
    AgentStore, CollectionStore, CursorStore, DlqStore, FeedbackStore, MetadataStore,
    ResponseStore, RevocationStore,
};
use crate::types::entities::{
    Agent, CollectionPointer, DeadLetterEntry, Feedback, IndexerCursor, MetadataEntry, Response,
    Revocation,
};
use crate::types::enums::{CursorSource, FinalityStatus};
use crate::types::primitives::{Digest32, Pubkey, RawAmount, Slot, TxIndex};

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSION HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn pubkey_from_bytes(bytes: Vec<u8>) -> std::result::Result<Pubkey, InfraError> {
    let len = bytes.len();
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| InfraError::Corrupt(format!("pubkey column has {len} bytes, want 32")))?;
    Ok(Pubkey::from_bytes(arr))
}

fn digest_from_bytes(bytes: Option<Vec<u8>>) -> std::result::Result<Option<Digest32>, InfraError> {
    bytes
        .map(|b| {
            let len = b.len();
            let arr: [u8; 32] = b.try_into().map_err(|_| {
                InfraError::Corrupt(format!("digest column has {len} bytes, want 32"))
            })?;
            Ok(Digest32::from_bytes(arr))
        })
        .transpose()
        .map(Option::flatten)
}

fn amount_from_parts(
    digits: String,
    exponent: i16,
) -> std::result::Result<RawAmount, InfraError> {
    RawAmount::new(digits, exponent)
        .map_err(|e| InfraError::Corrupt(format!("invalid amount column: {e}")))
}

fn status_from_str(s: &str) -> std::result::Result<FinalityStatus, InfraError> {
    s.parse()
        .map_err(|e| InfraError::Corrupt(format!("invalid status column: {e:?}")))
}

fn tx_index_from_i32(v: Option<i32>) -> TxIndex {
    TxIndex(v.map(|v| v as u32))
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL-based store implementation.
///
/// Implements every storage port using SQLx for database access. A single
/// instance is shared (behind an `Arc`) across the poller, verifier, and
/// URI worker tasks.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InfraError::Corrupt(format!("migration error: {e}")))?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct AgentRow {
    asset: Vec<u8>,
    owner: Vec<u8>,
    collection: Vec<u8>,
    wallet: Vec<u8>,
    uri: String,
    enabled: bool,
    registered_at_slot: i64,
    registered_tx_index: Option<i32>,
    registered_tx_signature: String,
    feedback_count: i64,
    total_value_digits: String,
    total_value_exponent: i16,
    raw_avg_score: f64,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<AgentRow> for Agent {
    type Error = InfraError;

    fn try_from(row: AgentRow) -> std::result::Result<Self, Self::Error> {
        Ok(Agent {
            asset: pubkey_from_bytes(row.asset)?,
            owner: pubkey_from_bytes(row.owner)?,
            collection: pubkey_from_bytes(row.collection)?,
            wallet: pubkey_from_bytes(row.wallet)?,
            uri: row.uri,
            enabled: row.enabled,
            registered_at_slot: Slot(row.registered_at_slot as u64),
            registered_tx_index: tx_index_from_i32(row.registered_tx_index),
            registered_tx_signature: row.registered_tx_signature,
            feedback_count: row.feedback_count,
            total_value: amount_from_parts(row.total_value_digits, row.total_value_exponent)?,
            raw_avg_score: row.raw_avg_score,
            status: status_from_str(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl AgentStore for PostgresStore {
    #[instrument(skip(self, agent), fields(asset = %agent.asset))]
    async fn upsert_agent(&self, agent: &Agent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (
                asset, owner, collection, wallet, uri, enabled, registered_at_slot,
                registered_tx_index, registered_tx_signature,
                feedback_count, total_value_digits, total_value_exponent, raw_avg_score,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (asset) DO UPDATE SET
                owner = EXCLUDED.owner,
                wallet = EXCLUDED.wallet,
                uri = EXCLUDED.uri,
                enabled = EXCLUDED.enabled,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(agent.asset.as_bytes().as_slice())
        .bind(agent.owner.as_bytes().as_slice())
        .bind(agent.collection.as_bytes().as_slice())
        .bind(agent.wallet.as_bytes().as_slice())
        .bind(&agent.uri)
        .bind(agent.enabled)
        .bind(agent.registered_at_slot.0 as i64)
        .bind(agent.registered_tx_index.0.map(|v| v as i32))
        .bind(&agent.registered_tx_signature)
        .bind(agent.feedback_count)
        .bind(agent.total_value.digits())
        .bind(agent.total_value.exponent())
        .bind(agent.raw_avg_score)
        .bind(agent.status.to_string())
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("agent upserted");
        Ok(())
    }

    #[instrument(skip(self), fields(asset = %asset))]
    async fn get_agent(&self, asset: &Pubkey) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT asset, owner, collection, wallet, uri, enabled, registered_at_slot,
                   registered_tx_index, registered_tx_signature,
                   feedback_count, total_value_digits, total_value_exponent, raw_avg_score,
                   status, created_at, updated_at
            FROM agents
            WHERE asset = $1
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(Agent::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff, limit = limit))]
    async fn list_pending_agents(&self, cutoff: Slot, limit: u32) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT asset, owner, collection, wallet, uri, enabled, registered_at_slot,
                   registered_tx_index, registered_tx_signature,
                   feedback_count, total_value_digits, total_value_exponent, raw_avg_score,
                   status, created_at, updated_at
            FROM agents
            WHERE status = 'PENDING' AND registered_at_slot <= $1
            ORDER BY registered_at_slot ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff.0 as i64)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(Agent::try_from).map(|r| r.map_err(Into::into)).collect()
    }

    #[instrument(skip(self), fields(asset = %asset, status = %status))]
    async fn set_agent_status(&self, asset: &Pubkey, status: FinalityStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE agents SET status = $2, updated_at = now()
            WHERE asset = $1
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .bind(status.to_string())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        if result.rows_affected() == 0 {
            warn!(%asset, "attempted status transition on missing agent");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(asset = %asset))]
    async fn recompute_agent_stats(&self, asset: &Pubkey) -> Result<()> {
        let (_, amount) = self.count_and_sum_for_asset(asset).await?;
        sqlx::query(
            r#"
            UPDATE agents SET
                feedback_count = (
                    SELECT COUNT(*) FROM feedback
                    WHERE asset = $1 AND revoked = false AND status != 'ORPHANED'
                ),
                raw_avg_score = COALESCE((
                    SELECT AVG(score) FROM feedback
                    WHERE asset = $1 AND revoked = false AND status != 'ORPHANED'
                ), 0),
                total_value_digits = $2,
                total_value_exponent = $3,
                updated_at = now()
            WHERE asset = $1
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .bind(amount.digits())
        .bind(amount.exponent())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEEDBACK STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct FeedbackRow {
    feedback_id: Vec<u8>,
    asset: Vec<u8>,
    client_address: Vec<u8>,
    value_digits: String,
    value_exponent: i16,
    score: i32,
    tag1: Option<String>,
    tag2: Option<String>,
    endpoint: Option<String>,
    feedback_uri: Option<String>,
    feedback_hash: Option<Vec<u8>>,
    running_digest: Option<Vec<u8>>,
    revoked: bool,
    block_slot: i64,
    tx_index: Option<i32>,
    tx_signature: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = InfraError;

    fn try_from(row: FeedbackRow) -> std::result::Result<Self, Self::Error> {
        Ok(Feedback {
            feedback_id: pubkey_from_bytes(row.feedback_id)?,
            asset: pubkey_from_bytes(row.asset)?,
            client_address: pubkey_from_bytes(row.client_address)?,
            value: amount_from_parts(row.value_digits, row.value_exponent)?,
            score: row.score,
            tag1: row.tag1,
            tag2: row.tag2,
            endpoint: row.endpoint,
            feedback_uri: row.feedback_uri,
            feedback_hash: digest_from_bytes(row.feedback_hash)?,
            running_digest: digest_from_bytes(row.running_digest)?,
            revoked: row.revoked,
            block_slot: Slot(row.block_slot as u64),
            tx_index: tx_index_from_i32(row.tx_index),
            tx_signature: row.tx_signature,
            status: status_from_str(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl FeedbackStore for PostgresStore {
    #[instrument(skip(self, feedback), fields(feedback_id = %feedback.feedback_id))]
    async fn insert_feedback(&self, feedback: &Feedback) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feedback (
                feedback_id, asset, client_address, value_digits, value_exponent,
                score, tag1, tag2, endpoint, feedback_uri, feedback_hash,
                running_digest, revoked, block_slot, tx_index, tx_signature,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (feedback_id) DO NOTHING
            "#,
        )
        .bind(feedback.feedback_id.as_bytes().as_slice())
        .bind(feedback.asset.as_bytes().as_slice())
        .bind(feedback.client_address.as_bytes().as_slice())
        .bind(feedback.value.digits())
        .bind(feedback.value.exponent())
        .bind(feedback.score)
        .bind(&feedback.tag1)
        .bind(&feedback.tag2)
        .bind(&feedback.endpoint)
        .bind(&feedback.feedback_uri)
        .bind(feedback.feedback_hash.as_ref().map(|d| d.as_bytes().as_slice()))
        .bind(feedback.running_digest.as_ref().map(|d| d.as_bytes().as_slice()))
        .bind(feedback.revoked)
        .bind(feedback.block_slot.0 as i64)
        .bind(feedback.tx_index.0.map(|v| v as i32))
        .bind(&feedback.tx_signature)
        .bind(feedback.status.to_string())
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id))]
    async fn get_feedback(&self, feedback_id: &Pubkey) -> Result<Option<Feedback>> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT feedback_id, asset, client_address, value_digits, value_exponent,
                   score, tag1, tag2, endpoint, feedback_uri, feedback_hash,
                   running_digest, revoked, block_slot, tx_index, tx_signature,
                   status, created_at, updated_at
            FROM feedback
            WHERE feedback_id = $1
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(Feedback::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self), fields(asset = %asset))]
    async fn list_feedback_for_asset(&self, asset: &Pubkey) -> Result<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT feedback_id, asset, client_address, value_digits, value_exponent,
                   score, tag1, tag2, endpoint, feedback_uri, feedback_hash,
                   running_digest, revoked, block_slot, tx_index, tx_signature,
                   status, created_at, updated_at
            FROM feedback
            WHERE asset = $1 AND status != 'ORPHANED'
            ORDER BY block_slot ASC, COALESCE(tx_index, 2147483647) ASC, tx_signature ASC
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(Feedback::try_from)
            .map(|r| r.map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id))]
    async fn mark_revoked(&self, feedback_id: &Pubkey) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feedback SET revoked = true, updated_at = now()
            WHERE feedback_id = $1
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id, status = %status))]
    async fn set_feedback_status(
        &self,
        feedback_id: &Pubkey,
        status: FinalityStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feedback SET status = $2, updated_at = now()
            WHERE feedback_id = $1
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .bind(status.to_string())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(asset = %asset))]
    async fn count_and_sum_for_asset(&self, asset: &Pubkey) -> Result<(i64, RawAmount)> {
        let feedback = self.list_feedback_for_asset(asset).await?;
        let non_revoked: Vec<_> = feedback.iter().filter(|f| !f.revoked).collect();
        let count = non_revoked.len() as i64;
        let sum = non_revoked
            .iter()
            .map(|f| f.value.as_decimal())
            .fold(bigdecimal::BigDecimal::from(0), |acc, v| acc + v);

        // Collapse back to a raw digit string at exponent 0 for storage; the
        // aggregate is a derived figure, not a value replayed from the chain,
        // so losing the original per-entry exponents here is acceptable.
        let (digits_bigint, _) = sum.as_bigint_and_exponent();
        let amount = RawAmount::new(digits_bigint.abs().to_string(), 0)
            .map_err(|e| InfraError::Corrupt(format!("aggregate amount overflow: {e}")))?;

        Ok((count, amount))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct ResponseRow {
    feedback_id: Vec<u8>,
    responder: Vec<u8>,
    response_text: String,
    block_slot: i64,
    tx_index: Option<i32>,
    tx_signature: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ResponseRow> for Response {
    type Error = InfraError;

    fn try_from(row: ResponseRow) -> std::result::Result<Self, Self::Error> {
        Ok(Response {
            feedback_id: pubkey_from_bytes(row.feedback_id)?,
            responder: pubkey_from_bytes(row.responder)?,
            response_text: row.response_text,
            block_slot: Slot(row.block_slot as u64),
            tx_index: tx_index_from_i32(row.tx_index),
            tx_signature: row.tx_signature,
            status: status_from_str(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ResponseStore for PostgresStore {
    #[instrument(skip(self, response), fields(feedback_id = %response.feedback_id))]
    async fn insert_response(&self, response: &Response) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO responses (
                feedback_id, responder, response_text, block_slot, tx_index,
                tx_signature, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (feedback_id, responder, tx_signature) DO NOTHING
            "#,
        )
        .bind(response.feedback_id.as_bytes().as_slice())
        .bind(response.responder.as_bytes().as_slice())
        .bind(&response.response_text)
        .bind(response.block_slot.0 as i64)
        .bind(response.tx_index.0.map(|v| v as i32))
        .bind(&response.tx_signature)
        .bind(response.status.to_string())
        .bind(response.created_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id))]
    async fn list_responses_for_feedback(&self, feedback_id: &Pubkey) -> Result<Vec<Response>> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT feedback_id, responder, response_text, block_slot, tx_index,
                   tx_signature, status, created_at
            FROM responses
            WHERE feedback_id = $1
            ORDER BY block_slot ASC, COALESCE(tx_index, 2147483647) ASC, tx_signature ASC
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(Response::try_from)
            .map(|r| r.map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id, tx_signature = %tx_signature, status = %status))]
    async fn set_response_status(
        &self,
        feedback_id: &Pubkey,
        tx_signature: &str,
        status: FinalityStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE responses SET status = $3
            WHERE feedback_id = $1 AND tx_signature = $2
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .bind(tx_signature)
        .bind(status.to_string())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REVOCATION STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct RevocationRow {
    feedback_id: Vec<u8>,
    revoked_by: Vec<u8>,
    block_slot: i64,
    tx_index: Option<i32>,
    tx_signature: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<RevocationRow> for Revocation {
    type Error = InfraError;

    fn try_from(row: RevocationRow) -> std::result::Result<Self, Self::Error> {
        Ok(Revocation {
            feedback_id: pubkey_from_bytes(row.feedback_id)?,
            revoked_by: pubkey_from_bytes(row.revoked_by)?,
            block_slot: Slot(row.block_slot as u64),
            tx_index: tx_index_from_i32(row.tx_index),
            tx_signature: row.tx_signature,
            status: status_from_str(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl RevocationStore for PostgresStore {
    #[instrument(skip(self, revocation), fields(feedback_id = %revocation.feedback_id))]
    async fn insert_revocation(&self, revocation: &Revocation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO revocations (
                feedback_id, revoked_by, block_slot, tx_index, tx_signature,
                status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (feedback_id) DO NOTHING
            "#,
        )
        .bind(revocation.feedback_id.as_bytes().as_slice())
        .bind(revocation.revoked_by.as_bytes().as_slice())
        .bind(revocation.block_slot.0 as i64)
        .bind(revocation.tx_index.0.map(|v| v as i32))
        .bind(&revocation.tx_signature)
        .bind(revocation.status.to_string())
        .bind(revocation.created_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id))]
    async fn get_revocation(&self, feedback_id: &Pubkey) -> Result<Option<Revocation>> {
        let row = sqlx::query_as::<_, RevocationRow>(
            r#"
            SELECT feedback_id, revoked_by, block_slot, tx_index, tx_signature,
                   status, created_at
            FROM revocations
            WHERE feedback_id = $1
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(Revocation::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self), fields(feedback_id = %feedback_id, status = %status))]
    async fn set_revocation_status(
        &self,
        feedback_id: &Pubkey,
        status: FinalityStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE revocations SET status = $2
            WHERE feedback_id = $1
            "#,
        )
        .bind(feedback_id.as_bytes().as_slice())
        .bind(status.to_string())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct MetadataRow {
    asset: Vec<u8>,
    key: String,
    value: Vec<u8>,
    immutable: bool,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<MetadataRow> for MetadataEntry {
    type Error = InfraError;

    fn try_from(row: MetadataRow) -> std::result::Result<Self, Self::Error> {
        Ok(MetadataEntry {
            asset: pubkey_from_bytes(row.asset)?,
            key: row.key,
            value: row.value,
            immutable: row.immutable,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    #[instrument(skip(self, entry), fields(asset = %entry.asset, key = %entry.key))]
    async fn set_metadata(&self, entry: &MetadataEntry) -> Result<()> {
        let existing = self.get_metadata(&entry.asset, &entry.key).await?;
        if let Some(existing) = existing {
            if existing.immutable {
                return Err(crate::error::DomainError::MetadataImmutable {
                    asset: entry.asset.to_string(),
                    key: entry.key.clone(),
                }
                .into());
            }
        }

        sqlx::query(
            r#"
            INSERT INTO metadata (asset, key, value, immutable, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (asset, key) DO UPDATE SET
                value = EXCLUDED.value,
                immutable = EXCLUDED.immutable,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(entry.asset.as_bytes().as_slice())
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.immutable)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(asset = %asset, key = %key))]
    async fn get_metadata(&self, asset: &Pubkey, key: &str) -> Result<Option<MetadataEntry>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            r#"
            SELECT asset, key, value, immutable, updated_at
            FROM metadata
            WHERE asset = $1 AND key = $2
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(MetadataEntry::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self), fields(asset = %asset, key = %key))]
    async fn delete_metadata(&self, asset: &Pubkey, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM metadata
            WHERE asset = $1 AND key = $2 AND immutable = false
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(asset = %asset))]
    async fn list_metadata_for_asset(&self, asset: &Pubkey) -> Result<Vec<MetadataEntry>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            r#"
            SELECT asset, key, value, immutable, updated_at
            FROM metadata
            WHERE asset = $1
            ORDER BY key ASC
            "#,
        )
        .bind(asset.as_bytes().as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(MetadataEntry::try_from)
            .map(|r| r.map_err(Into::into))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTION STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct CollectionRow {
    collection: Vec<u8>,
    authority: Vec<u8>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<CollectionRow> for CollectionPointer {
    type Error = InfraError;

    fn try_from(row: CollectionRow) -> std::result::Result<Self, Self::Error> {
        Ok(CollectionPointer {
            collection: pubkey_from_bytes(row.collection)?,
            authority: pubkey_from_bytes(row.authority)?,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CollectionStore for PostgresStore {
    #[instrument(skip(self, pointer), fields(collection = %pointer.collection))]
    async fn set_collection(&self, pointer: &CollectionPointer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (collection, authority, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection) DO UPDATE SET
                authority = EXCLUDED.authority,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(pointer.collection.as_bytes().as_slice())
        .bind(pointer.authority.as_bytes().as_slice())
        .bind(pointer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn get_collection(&self, collection: &Pubkey) -> Result<Option<CollectionPointer>> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT collection, authority, updated_at
            FROM collections
            WHERE collection = $1
            "#,
        )
        .bind(collection.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(CollectionPointer::try_from).transpose().map_err(Into::into)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct CursorRow {
    source: String,
    last_signature: Option<String>,
    last_slot: i64,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<CursorRow> for IndexerCursor {
    type Error = InfraError;

    fn try_from(row: CursorRow) -> std::result::Result<Self, Self::Error> {
        let source = match row.source.as_str() {
            "poller" => CursorSource::Poller,
            other => {
                return Err(InfraError::Corrupt(format!(
                    "unknown cursor source: {other}"
                )));
            }
        };
        Ok(IndexerCursor {
            source,
            last_signature: row.last_signature,
            last_slot: Slot(row.last_slot as u64),
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CursorStore for PostgresStore {
    #[instrument(skip(self), fields(source = %source))]
    async fn get_cursor(&self, source: CursorSource) -> Result<Option<IndexerCursor>> {
        let row = sqlx::query_as::<_, CursorRow>(
            r#"
            SELECT source, last_signature, last_slot, updated_at
            FROM cursors
            WHERE source = $1
            "#,
        )
        .bind(source.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(IndexerCursor::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self, cursor), fields(source = %cursor.source))]
    async fn save_cursor(&self, cursor: &IndexerCursor) -> Result<()> {
        // Last-wins guarded by slot: an out-of-order write from a concurrent
        // retry must never regress the cursor.
        sqlx::query(
            r#"
            INSERT INTO cursors (source, last_signature, last_slot, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source) DO UPDATE SET
                last_signature = EXCLUDED.last_signature,
                last_slot = EXCLUDED.last_slot,
                updated_at = EXCLUDED.updated_at
            WHERE cursors.last_slot < EXCLUDED.last_slot
            "#,
        )
        .bind(cursor.source.to_string())
        .bind(&cursor.last_signature)
        .bind(cursor.last_slot.0 as i64)
        .bind(cursor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEAD LETTER STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl DlqStore for PostgresStore {
    #[instrument(skip(self, entry), fields(tx_signature = %entry.tx_signature))]
    async fn enqueue_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters (tx_signature, payload, error, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.tx_signature)
        .bind(&entry.payload)
        .bind(&entry.error)
        .bind(entry.attempts)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_dead_letters(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await
            .map_err(InfraError::Database)?;
        Ok(count as u64)
    }

    #[instrument(skip(self), fields(older_than_secs = older_than_secs))]
    async fn evict_dead_letters_older_than(&self, older_than_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM dead_letters
            WHERE created_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(older_than_secs as f64)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(result.rows_affected())
    }
}
