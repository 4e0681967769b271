//! Status lattices for indexed entities.
//!
//! These enums persist as `TEXT` columns (see the `store` module) and encode
//! the state-transition invariants enforced by the handlers and the verifier.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Finality status shared by agents, feedback, responses, and revocations.
///
/// Lattice: `Pending -> Finalized` or `Pending -> Orphaned`. Once terminal
/// (`Finalized` or `Orphaned`), a row's status must never be written back to
/// `Pending`, and `Finalized` must never be downgraded to `Orphaned` without
/// going through the verifier's explicit reconciliation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalityStatus {
    /// Observed via live-tail or backfill but not yet confirmed past the
    /// verifier's safety margin.
    Pending,
    /// Confirmed to still exist at or past the finalized cutoff.
    Finalized,
    /// No longer observable on-chain past the finalized cutoff — the
    /// transaction that produced it was reorganized out.
    Orphaned,
}

impl FinalityStatus {
    /// Whether this status is terminal (never transitions again).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Orphaned)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Finalized)
                | (Self::Pending, Self::Orphaned)
                | (Self::Finalized, Self::Orphaned)
        )
    }
}

impl fmt::Display for FinalityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Finalized => "FINALIZED",
            Self::Orphaned => "ORPHANED",
        };
        write!(f, "{s}")
    }
}

/// Error parsing a [`FinalityStatus`] from a stored string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid finality status: {0}")]
pub struct InvalidFinalityStatus(pub String);

impl std::str::FromStr for FinalityStatus {
    type Err = InvalidFinalityStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "FINALIZED" => Ok(Self::Finalized),
            "ORPHANED" => Ok(Self::Orphaned),
            other => Err(InvalidFinalityStatus(other.to_string())),
        }
    }
}

/// Source of a cursor row — distinguishes the poller's cursor from any future
/// independent cursor holder sharing the same table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorSource {
    /// The ingestion pipeline (backfill + live-tail).
    Poller,
}

impl fmt::Display for CursorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poller => write!(f, "poller"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod finality_status_tests {
        use super::*;

        #[test]
        fn pending_can_reach_either_terminal_state() {
            assert!(FinalityStatus::Pending.can_transition_to(FinalityStatus::Finalized));
            assert!(FinalityStatus::Pending.can_transition_to(FinalityStatus::Orphaned));
        }

        #[test]
        fn finalized_can_be_orphaned_by_reconciliation() {
            assert!(FinalityStatus::Finalized.can_transition_to(FinalityStatus::Orphaned));
        }

        #[test]
        fn orphaned_is_a_dead_end() {
            assert!(!FinalityStatus::Orphaned.can_transition_to(FinalityStatus::Finalized));
            assert!(!FinalityStatus::Orphaned.can_transition_to(FinalityStatus::Pending));
        }

        #[test]
        fn terminal_states_are_terminal() {
            assert!(FinalityStatus::Finalized.is_terminal());
            assert!(FinalityStatus::Orphaned.is_terminal());
            assert!(!FinalityStatus::Pending.is_terminal());
        }

        #[test]
        fn round_trips_through_display_and_parse() {
            for status in [
                FinalityStatus::Pending,
                FinalityStatus::Finalized,
                FinalityStatus::Orphaned,
            ] {
                let parsed: FinalityStatus = status.to_string().parse().unwrap();
                assert_eq!(parsed, status);
            }
        }

        #[test]
        fn rejects_unknown_string() {
            assert!("WHATEVER".parse::<FinalityStatus>().is_err());
        }
    }
}
