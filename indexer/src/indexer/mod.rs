//! Core indexing pipeline for the on-chain agent feedback protocol.
//!
//! This module contains the components that:
//! 1. Decode raw transactions into typed ledger events via the external
//!    [`Decoder`](crate::abi::Decoder) port
//! 2. Accumulate decoded events and flush them transactionally
//! 3. Route flushed events to the [`AgentPort`](crate::handlers::AgentPort)
//!    and [`FeedbackPort`](crate::handlers::FeedbackPort) handler ports
//! 4. Periodically reconcile local finality state against the chain
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                            Indexer Core                               │
//! │                                                                       │
//! │  ┌────────────┐    ┌──────────────┐    ┌─────────────┐               │
//! │  │   Poller   │───▶│ EventBuffer  │───▶│ EventRouter │               │
//! │  │ (backfill/ │    │ (batch+retry │    │  (dispatch) │               │
//! │  │ live-tail) │    │  +DLQ+cursor)│    └──────┬──────┘               │
//! │  └────────────┘    └──────────────┘           │                      │
//! │                                                ▼                      │
//! │                                   ┌─────────────────────────┐        │
//! │                                   │ AgentPort / FeedbackPort│        │
//! │                                   └─────────────────────────┘        │
//! │                                                                       │
//! │  ┌────────────┐                                                      │
//! │  │  Verifier  │  reconciles PENDING rows against on-chain account    │
//! │  │ (60s cycle)│  bytes via PDA derivation + hash-chain comparison    │
//! │  └────────────┘                                                      │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```

mod account_layout;
mod buffer;
mod checkpoint;
mod event_router;
mod pda;
mod poller;
mod verifier;

pub use account_layout::{AgentAccount, ChainTriplet, decode_agent_account};
pub use buffer::{BufferConfig, BufferedEvent, EventBuffer};
pub use checkpoint::{CheckpointManager, RecoveryMode};
pub use event_router::EventRouter;
pub use pda::{agent_pda, find_program_address, metadata_pda, registry_config_pda, root_config_pda, validation_pda};
pub use poller::{Poller, PollerConfig};
pub use verifier::Verifier;
