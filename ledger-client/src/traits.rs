//! Core trait for reading from a Solana-compatible ledger.
//!
//! This module defines [`LedgerClient`], the single abstraction the indexer
//! uses to talk to the chain. It is intentionally read-only: the indexer
//! never submits transactions.
//!
//! # Design Philosophy
//!
//! This trait is designed to:
//! - **Be endpoint-agnostic**: work against any Solana-compatible JSON-RPC
//! - **Hide pagination/retry details**: callers page with `before`/`until`,
//!   not raw offsets
//! - **Support testing**: easy to implement a deterministic mock

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Commitment, RawAccount, RawBlock, RawTransaction, SignatureInfo, SignaturePage};

/// Read-only interface to a Solana-compatible ledger.
///
/// Implementors handle endpoint-specific details (request shaping, retry,
/// rate-limit backoff) while presenting a uniform interface to the poller
/// and verifier.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    /// List signatures for an address, walking backward from `page.before`
    /// (or from the most recent signature if `before` is `None`) down to
    /// (but not including) `page.until`.
    ///
    /// Returns at most `page.limit` entries, newest first — the same order
    /// as `getSignaturesForAddress`.
    async fn list_signatures(
        &self,
        address: &str,
        page: SignaturePage,
    ) -> Result<Vec<SignatureInfo>>;

    /// Fetch a single transaction by signature at the given commitment level.
    ///
    /// Returns `Err(LedgerError::SignatureNotFound)` if the signature is
    /// unknown to the endpoint at that commitment.
    async fn fetch_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<RawTransaction>;

    /// Fetch multiple transactions concurrently, preserving input order.
    ///
    /// Default implementation issues one [`fetch_transaction`](Self::fetch_transaction)
    /// call per signature with bounded concurrency; a production client may
    /// override this with a batched JSON-RPC request.
    async fn fetch_transactions(
        &self,
        signatures: &[String],
        commitment: Commitment,
    ) -> Result<Vec<Result<RawTransaction>>> {
        let mut out = Vec::with_capacity(signatures.len());
        for sig in signatures {
            out.push(self.fetch_transaction(sig, commitment).await);
        }
        Ok(out)
    }

    /// Fetch a single account's data at the given commitment level.
    ///
    /// Returns `Ok(RawAccount { raw: None, .. })` rather than an error when
    /// the account does not exist — non-existence is meaningful state for
    /// the verifier, not a failure.
    async fn fetch_account(&self, address: &str, commitment: Commitment) -> Result<RawAccount>;

    /// Fetch multiple accounts in one round trip where the endpoint supports
    /// it (`getMultipleAccounts`-style); default implementation fetches
    /// sequentially.
    async fn fetch_accounts(
        &self,
        addresses: &[String],
        commitment: Commitment,
    ) -> Result<Vec<RawAccount>> {
        let mut out = Vec::with_capacity(addresses.len());
        for addr in addresses {
            out.push(self.fetch_account(addr, commitment).await?);
        }
        Ok(out)
    }

    /// Current slot height at the given commitment level.
    async fn head_slot(&self, commitment: Commitment) -> Result<u64>;

    /// Fetch a block's transaction signatures in on-chain order.
    ///
    /// Used only when a slot contains more than one indexed transaction
    /// and `tx_index` must be resolved by locating each signature's
    /// position in the full block.
    async fn fetch_block(&self, slot: u64, commitment: Commitment) -> Result<RawBlock>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for std::sync::Arc<T> {
    async fn list_signatures(
        &self,
        address: &str,
        page: SignaturePage,
    ) -> Result<Vec<SignatureInfo>> {
        (**self).list_signatures(address, page).await
    }

    async fn fetch_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<RawTransaction> {
        (**self).fetch_transaction(signature, commitment).await
    }

    async fn fetch_transactions(
        &self,
        signatures: &[String],
        commitment: Commitment,
    ) -> Result<Vec<Result<RawTransaction>>> {
        (**self).fetch_transactions(signatures, commitment).await
    }

    async fn fetch_account(&self, address: &str, commitment: Commitment) -> Result<RawAccount> {
        (**self).fetch_account(address, commitment).await
    }

    async fn fetch_accounts(
        &self,
        addresses: &[String],
        commitment: Commitment,
    ) -> Result<Vec<RawAccount>> {
        (**self).fetch_accounts(addresses, commitment).await
    }

    async fn head_slot(&self, commitment: Commitment) -> Result<u64> {
        (**self).head_slot(commitment).await
    }

    async fn fetch_block(&self, slot: u64, commitment: Commitment) -> Result<RawBlock> {
        (**self).fetch_block(slot, commitment).await
    }
}
