//! Agent Feedback Protocol Indexer
//!
//! A Rust backend service that ingests on-chain events from the agent
//! feedback protocol on a Solana-compatible ledger, persists them to
//! `PostgreSQL`, and periodically reconciles local finality state against
//! the chain.
//!
//! # Architecture
//!
//! The indexer follows a hexagonal architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         INDEXER CORE                            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │    Poller    │  │   Decoder    │  │ EventBuffer  │          │
//! │  │ (backfill/   │─▶│  (external)  │─▶│ (batch+DLQ)  │          │
//! │  │  live-tail)  │  └──────────────┘  └──────┬───────┘          │
//! │  └──────────────┘                           │                  │
//! │                                   ┌──────────▼───────────┐      │
//! │                                   │     EventRouter       │      │
//! │                                   └──────────┬───────────┘      │
//! │              ┌───────────────────────────────┼──────────────┐  │
//! │              ▼                               ▼              ▼  │
//! │       ┌──────────────┐              ┌──────────────┐   ┌─────┐ │
//! │       │   Handlers   │              │    Store     │   │Cache│ │
//! │       └──────────────┘              └──────────────┘   └─────┘ │
//! │                                                                  │
//! │  ┌──────────────┐                        ┌──────────────┐       │
//! │  │   Verifier   │ reconciles PENDING      │  URI Worker  │       │
//! │  │  (60s cycle) │ rows against on-chain   │ (SSRF-hard.) │       │
//! │  └──────────────┘ account bytes           └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (enums, events, entities, primitives)
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`abi`] - External decoder port boundary
//! - [`indexer`] - Core indexing logic (poller, buffer, router, verifier)
//! - [`handlers`] - Event handler ports for agents and feedback
//! - [`store`] - Data persistence (`PostgreSQL`)
//! - [`uri_worker`] - SSRF-hardened metadata URI fetcher
//! - [`codec`] - Metadata value compression framing
//!
//! # Getting Started
//!
//! ```bash
//! # Set up environment
//! cp .env.example .env
//! # Edit .env with your configuration
//!
//! # Run migrations
//! sqlx migrate run
//!
//! # Start the indexer
//! cargo run -- run
//! ```

pub mod abi;
pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod indexer;
pub mod ports;
pub mod store;
pub mod types;
pub mod uri_worker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }
}
