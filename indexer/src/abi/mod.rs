//! Decoder port boundary.
//!
//! Turning a raw transaction into typed [`LedgerEvent`]s is out of scope
//! for this crate — the decoder is an external collaborator that already
//! understands the on-chain instruction layout. This module only defines
//! the trait seam the ingestion pipeline calls through, so the pipeline
//! never inspects raw instruction data itself.
//!
//! # Usage
//!
//! ```ignore
//! use agent_feedback_indexer::abi::Decoder;
//!
//! async fn process<D: Decoder>(decoder: &D, tx: &RawTransaction) -> Result<()> {
//!     for event in decoder.decode(tx).await? {
//!         // route event
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use ledger_client::RawTransaction;

use crate::error::Result;
use crate::types::LedgerEvent;

/// Port for decoding a raw transaction into zero or more [`LedgerEvent`]s.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Return an empty `Vec` for transactions that touch the program but
///   carry no recognized instruction (not an error)
/// - Surface a malformed-but-recognized instruction as
///   [`InfraError::EventDecoding`], which the router logs and skips —
///   the cursor still advances past the transaction
/// - Reject unknown instruction discriminants by default rather than
///   guessing at a variant
///
/// [`InfraError::EventDecoding`]: crate::error::InfraError::EventDecoding
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Decode a single transaction into its constituent events, in the
    /// order their instructions appear.
    ///
    /// # Errors
    /// Returns an error if the transaction carries a recognized but
    /// malformed instruction for the watched program.
    async fn decode(&self, tx: &RawTransaction) -> Result<Vec<LedgerEvent>>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! Mock decoder for testing the pipeline without a real decoder.

    use std::collections::HashMap;
    use std::sync::RwLock;

    use super::{Decoder, LedgerEvent, RawTransaction, Result};

    /// Decoder returning a fixed, pre-registered set of events per
    /// signature. Signatures with no registered events decode to an
    /// empty `Vec`.
    #[derive(Debug, Default)]
    pub struct StaticDecoder {
        events: RwLock<HashMap<String, Vec<LedgerEvent>>>,
    }

    impl StaticDecoder {
        /// Create an empty static decoder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register the events a given signature should decode to.
        pub fn register(&self, signature: impl Into<String>, events: Vec<LedgerEvent>) {
            self.events
                .write()
                .expect("lock poisoned")
                .insert(signature.into(), events);
        }
    }

    #[async_trait::async_trait]
    impl Decoder for StaticDecoder {
        async fn decode(&self, tx: &RawTransaction) -> Result<Vec<LedgerEvent>> {
            Ok(self
                .events
                .read()
                .expect("lock poisoned")
                .get(&tx.signature)
                .cloned()
                .unwrap_or_default())
        }
    }
}
