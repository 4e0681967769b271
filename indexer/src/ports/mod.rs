//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the domain layer needs.
//! Following hexagonal architecture, adapters (in the infrastructure layer)
//! implement these traits to provide concrete functionality.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                            │
//! │                                                                 │
//! │  Uses ports (traits) to define what it needs                   │
//! │                                                                 │
//! │  ┌───────────┐  ┌──────────────┐  ┌─────────────┐              │
//! │  │AgentStore │  │FeedbackStore │  │MetadataStore│   ...        │
//! │  └─────┬─────┘  └──────┬───────┘  └──────┬──────┘              │
//! │        │               │                 │                     │
//! └────────┼───────────────┼─────────────────┼─────────────────────┘
//!          │               │                 │
//!          ▼               ▼                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Infrastructure Layer                        │
//! │                                                                 │
//! │  A single PostgresStore implements every storage port           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Port Categories
//!
//! | Category | Ports | Purpose |
//! |----------|-------|---------|
//! | Storage | [`AgentStore`], [`FeedbackStore`], [`ResponseStore`], [`RevocationStore`], [`MetadataStore`], [`CollectionStore`], [`CursorStore`], [`DlqStore`] | Data persistence |
//! | Time | [`Clock`] | Testable time operations |
//!
//! Caching for the verifier's per-cycle digest comparisons and the URI
//! worker's in-flight dedup set is task-local state, not a port: neither
//! needs to be swapped out in tests, and both live and die with their
//! owning task.
//!
//! # Usage
//!
//! ```ignore
//! use agent_feedback_indexer::ports::{AgentStore, Clock, SystemClock};
//!
//! // Application code depends on traits, not implementations
//! async fn process_agent<S: AgentStore, C: Clock>(
//!     store: &S,
//!     clock: &C,
//!     asset: &Pubkey,
//! ) -> Result<()> {
//!     let agent = store.get_agent(asset).await?;
//!     let now = clock.now();
//!     // ...
//!     Ok(())
//! }
//!
//! // In production, use real implementations
//! let store = PostgresStore::new(pool);
//! let clock = SystemClock;
//! ```

mod clock;
mod store;

// Re-export all port traits
pub use clock::{Clock, SystemClock};
pub use store::{
    AgentStore, CollectionStore, CursorStore, DlqStore, FeedbackStore, MetadataStore,
    ResponseStore, RevocationStore,
};

// Re-export test utilities for tests and downstream crates using test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub use clock::FakeClock;
