//! Event handler ports for the on-chain agent feedback protocol.
//!
//! This module defines trait-based ports (interfaces) for handling decoded
//! [`LedgerEvent`](crate::types::LedgerEvent) variants. Following hexagonal
//! architecture, these traits allow:
//!
//! - **Testability**: Mock implementations for unit testing
//! - **Flexibility**: Swap implementations without changing routing logic
//! - **Separation of Concerns**: Each handler focuses on one domain area
//!
//! # Handler Ports
//!
//! | Port | Events |
//! |------|--------|
//! | [`AgentPort`] | Registration, URI/wallet/owner/enabled updates, metadata set/delete, registry init |
//! | [`FeedbackPort`] | New feedback, response append, revocation |
//!
//! # Handler Implementations
//!
//! | Handler | Port | Status |
//! |---------|------|--------|
//! | [`AgentHandler`] | [`AgentPort`] | Complete |
//! | [`FeedbackHandler`] | [`FeedbackPort`] | Complete |
//!
//! # Usage
//!
//! ```ignore
//! use agent_feedback_indexer::handlers::{AgentPort, FeedbackPort};
//! use agent_feedback_indexer::handlers::{AgentHandler, FeedbackHandler};
//!
//! let agent_handler = AgentHandler::new(agent_store, metadata_store, collection_store, uri_worker);
//! let feedback_handler = FeedbackHandler::new(feedback_store, response_store, revocation_store, agent_store);
//! ```

mod agent_handler;
mod feedback_handler;
mod traits;

pub use agent_handler::{AgentHandler, URI_WORKER_KEY_PREFIX};
pub use feedback_handler::FeedbackHandler;
pub use traits::{AgentPort, FeedbackPort, UriEnqueuer};

#[cfg(test)]
pub use traits::mocks;
