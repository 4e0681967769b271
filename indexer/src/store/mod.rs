//! Data persistence layer (adapters for store ports).
//!
//! This module provides concrete implementations of the store ports
//! defined in [`crate::ports::store`]. The primary implementation uses
//! `PostgreSQL`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Store Adapters                            │
//! │                                                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │                  PostgresStore                            │  │
//! │   │   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │  │
//! │   │   │   Agents     │  │  Feedback    │  │  Responses   │   │  │
//! │   │   └──────────────┘  └──────────────┘  └──────────────┘   │  │
//! │   │   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │  │
//! │   │   │ Revocations  │  │   Metadata   │  │   Cursors    │   │  │
//! │   │   └──────────────┘  └──────────────┘  └──────────────┘   │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! │                               │                                  │
//! │                               ▼                                  │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │              SQLx Connection Pool                         │  │
//! │   │                    (PostgreSQL)                           │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Tables
//!
//! | Table | Primary Key | Notes |
//! |-------|-------------|-------|
//! | `agents` | `asset` | one row per registered agent |
//! | `feedback` | `feedback_id` | `status` indexed for the verifier scan |
//! | `responses` | `(feedback_id, responder, tx_signature)` unique | append-only |
//! | `revocations` | `feedback_id` | one revocation per feedback entry |
//! | `metadata` | `(asset, key)` | `immutable` rows are write-once |
//! | `collections` | `asset` | |
//! | `cursors` | `source` | single row per [`crate::types::enums::CursorSource`] |
//! | `dead_letters` | `id` (`BIGSERIAL`) | bounded and evicted by the buffer |
//!
//! # Usage
//!
//! ```ignore
//! use agent_feedback_indexer::store::PostgresStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/agent_feedback")
//!     .await?;
//!
//! // Run migrations
//! sqlx::migrate!("./migrations").run(&pool).await?;
//!
//! // Create store
//! let store = PostgresStore::new(pool);
//!
//! // Use via trait methods
//! let agent = store.get_agent(&asset).await?;
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via `sqlx migrate run`.
//! See individual migration files for schema details.

mod postgres;

pub use postgres::PostgresStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;
