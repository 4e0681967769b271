//! Domain types for the agent feedback indexer.
//!
//! - [`enums`] - status lattices (`FinalityStatus`, `CursorSource`)
//! - [`primitives`] - validated newtypes (`Pubkey`, `RawAmount`, `Slot`, `TxIndex`, `Digest32`)
//! - [`events`] - the decoder's tagged union of on-chain events (`LedgerEvent`)
//! - [`entities`] - projected rows persisted by the store layer

pub mod entities;
pub mod enums;
pub mod events;
pub mod primitives;

pub use entities::{
    Agent, CollectionPointer, DeadLetterEntry, Feedback, IndexerCursor, MetadataEntry, Response,
    Revocation,
};
pub use enums::{CursorSource, FinalityStatus};
pub use events::{EventMetadata, LedgerEvent};
pub use primitives::{Digest32, Pubkey, RawAmount, Slot, TxIndex, TX_INDEX_NULL_SENTINEL};
