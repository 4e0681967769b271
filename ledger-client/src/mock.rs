//! Mock ledger client for testing.
//!
//! This module provides [`MockLedgerClient`], an in-memory [`LedgerClient`]
//! implementation used throughout the indexer's own test suite.
//!
//! # Panics
//!
//! Methods panic if internal locks are poisoned, which should only happen
//! if a test panics while holding a lock.

#![allow(clippy::expect_used)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{LedgerError, Result};
use crate::traits::LedgerClient;
use crate::types::{Commitment, RawAccount, RawBlock, RawTransaction, SignatureInfo, SignaturePage};

/// In-memory [`LedgerClient`] for tests.
///
/// Signatures are stored per-address in insertion order (newest last); callers
/// append with [`push_signature`](Self::push_signature) and
/// [`push_transaction`](Self::push_transaction) to script a fixture, then
/// drive the poller/verifier against it exactly as they would a real
/// endpoint.
#[derive(Debug, Default)]
pub struct MockLedgerClient {
    signatures: RwLock<HashMap<String, Vec<SignatureInfo>>>,
    transactions: RwLock<HashMap<String, RawTransaction>>,
    accounts: RwLock<HashMap<String, RawAccount>>,
    blocks: RwLock<HashMap<u64, RawBlock>>,
    head: AtomicU64,
}

impl MockLedgerClient {
    /// Construct an empty mock client at slot 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signature entry for `address`, newest-last.
    pub fn push_signature(&self, address: &str, info: SignatureInfo) {
        self.signatures
            .write()
            .expect("lock poisoned")
            .entry(address.to_string())
            .or_default()
            .push(info);
    }

    /// Register the transaction body fetched for `signature`.
    pub fn push_transaction(&self, tx: RawTransaction) {
        self.transactions
            .write()
            .expect("lock poisoned")
            .insert(tx.signature.clone(), tx);
    }

    /// Set the stored account payload (or clear it by passing `raw: None`).
    pub fn set_account(&self, account: RawAccount) {
        self.accounts
            .write()
            .expect("lock poisoned")
            .insert(account.address.clone(), account);
    }

    /// Register the signature ordering for a block.
    pub fn push_block(&self, block: RawBlock) {
        self.blocks.write().expect("lock poisoned").insert(block.slot, block);
    }

    /// Advance the simulated chain head.
    pub fn set_head_slot(&self, slot: u64) {
        self.head.store(slot, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn list_signatures(
        &self,
        address: &str,
        page: SignaturePage,
    ) -> Result<Vec<SignatureInfo>> {
        let all = self.signatures.read().expect("lock poisoned");
        let Some(entries) = all.get(address) else {
            return Ok(Vec::new());
        };

        // Stored newest-last; walk from the end (newest) backward, same as the real endpoint.
        let mut rev: Vec<&SignatureInfo> = entries.iter().rev().collect();

        if let Some(before) = &page.before {
            if let Some(pos) = rev.iter().position(|s| &s.signature == before) {
                rev = rev.split_off(pos + 1);
            }
        }

        if let Some(until) = &page.until {
            if let Some(pos) = rev.iter().position(|s| &s.signature == until) {
                rev.truncate(pos);
            }
        }

        rev.truncate(page.limit);
        Ok(rev.into_iter().cloned().collect())
    }

    async fn fetch_transaction(
        &self,
        signature: &str,
        _commitment: Commitment,
    ) -> Result<RawTransaction> {
        self.transactions
            .read()
            .expect("lock poisoned")
            .get(signature)
            .cloned()
            .ok_or_else(|| LedgerError::SignatureNotFound(signature.to_string()))
    }

    async fn fetch_account(&self, address: &str, _commitment: Commitment) -> Result<RawAccount> {
        Ok(self
            .accounts
            .read()
            .expect("lock poisoned")
            .get(address)
            .cloned()
            .unwrap_or_else(|| RawAccount {
                address: address.to_string(),
                slot: self.head.load(Ordering::SeqCst),
                raw: None,
            }))
    }

    async fn head_slot(&self, _commitment: Commitment) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn fetch_block(&self, slot: u64, _commitment: Commitment) -> Result<RawBlock> {
        self.blocks
            .read()
            .expect("lock poisoned")
            .get(&slot)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("no block registered for slot {slot}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(s: &str, slot: u64) -> SignatureInfo {
        SignatureInfo {
            signature: s.to_string(),
            slot,
            block_time: None,
            err: None,
        }
    }

    #[tokio::test]
    async fn list_signatures_walks_backward_from_before_cursor() {
        let client = MockLedgerClient::new();
        client.push_signature("addr", sig("a", 1));
        client.push_signature("addr", sig("b", 2));
        client.push_signature("addr", sig("c", 3));

        let page = client
            .list_signatures("addr", SignaturePage::new(10).before("c"))
            .await
            .unwrap();
        assert_eq!(
            page.iter().map(|s| s.signature.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
    }

    #[tokio::test]
    async fn fetch_unknown_transaction_errors() {
        let client = MockLedgerClient::new();
        let err = client
            .fetch_transaction("missing", Commitment::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SignatureNotFound(_)));
    }

    #[tokio::test]
    async fn fetch_account_defaults_to_nonexistent() {
        let client = MockLedgerClient::new();
        client.set_head_slot(42);
        let account = client
            .fetch_account("nowhere", Commitment::Confirmed)
            .await
            .unwrap();
        assert!(account.raw.is_none());
        assert_eq!(account.slot, 42);
    }
}
