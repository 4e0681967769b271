//! Validated newtypes for on-chain primitives.
//!
//! - [`Pubkey`] - a 32-byte ledger address, base58-encoded on the wire
//! - [`RawAmount`] - an arbitrary-precision value carried as raw digits + a decimal exponent
//! - [`Slot`] - a monotonically increasing ledger height
//! - [`TxIndex`] - a transaction's position within its slot
//! - [`Digest32`] - a 32-byte hash, with all-zero normalized to `None`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// NULL-sentinel used when ordering by `tx_index` and the index could not be
/// resolved (see the ordering contract).
pub const TX_INDEX_NULL_SENTINEL: i64 = i32::MAX as i64;

// ═══════════════════════════════════════════════════════════════════════════════
// PUBKEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Error constructing a [`Pubkey`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPubkey {
    /// The base58 payload did not decode to exactly 32 bytes.
    #[error("pubkey must decode to 32 bytes, got {0}")]
    WrongLength(usize),
    /// The input was not valid base58.
    #[error("invalid base58: {0}")]
    Base58(String),
}

/// A 32-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    /// The all-zero pubkey, used as a sentinel in a small number of event payloads.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Construct directly from 32 raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a base58-encoded string.
    pub fn from_base58(s: &str) -> Result<Self, InvalidPubkey> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|e| InvalidPubkey::Base58(e.to_string()))?;
        let len = decoded.len();
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| InvalidPubkey::WrongLength(len))?;
        Ok(Self(bytes))
    }

    /// Borrow the raw 32 bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

impl FromStr for Pubkey {
    type Err = InvalidPubkey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAW AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Error constructing a [`RawAmount`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidAmount {
    /// The raw digit string contained a non-digit character.
    #[error("amount digits must be base-10: {0}")]
    NotDigits(String),
}

/// An arbitrary-precision value carried as raw decimal digits plus an exponent,
/// rather than normalized into a fixed-point integer. Two `RawAmount`s with
/// different exponents are never implicitly compared — callers normalize via
/// [`RawAmount::as_decimal`] first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAmount {
    digits: String,
    exponent: i16,
}

impl RawAmount {
    /// Construct from raw base-10 digits and a decimal exponent.
    pub fn new(digits: impl Into<String>, exponent: i16) -> Result<Self, InvalidAmount> {
        let digits = digits.into();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidAmount::NotDigits(digits));
        }
        Ok(Self { digits, exponent })
    }

    /// The zero value at exponent 0.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            digits: "0".to_string(),
            exponent: 0,
        }
    }

    /// Raw digit string, as received from the chain.
    #[must_use]
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Decimal exponent: actual value is `digits * 10^exponent`.
    #[must_use]
    pub const fn exponent(&self) -> i16 {
        self.exponent
    }

    /// Render as a [`bigdecimal::BigDecimal`] for comparison/arithmetic.
    #[must_use]
    pub fn as_decimal(&self) -> bigdecimal::BigDecimal {
        let unscaled = bigdecimal::num_bigint::BigInt::from_str(&self.digits).unwrap_or_default();
        bigdecimal::BigDecimal::new(unscaled, -i64::from(self.exponent))
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.digits, self.exponent)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOT / TX INDEX
// ═══════════════════════════════════════════════════════════════════════════════

/// A ledger slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot(pub u64);

impl Slot {
    /// The genesis slot.
    pub const GENESIS: Self = Self(0);

    /// Saturating successor.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Saturating `self - margin`, floored at zero. Used to compute the
    /// verifier's safety cutoff.
    #[must_use]
    pub const fn saturating_sub(self, margin: u64) -> Self {
        Self(self.0.saturating_sub(margin))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transaction's position within its slot, resolved by the poller.
///
/// `None` means the position could not be resolved and the NULL-sentinel
/// (`i32::MAX`) must be used for ordering purposes — see
/// [`TX_INDEX_NULL_SENTINEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxIndex(pub Option<u32>);

impl TxIndex {
    /// The value to sort by: the real index, or the NULL sentinel.
    #[must_use]
    pub fn sort_key(self) -> i64 {
        self.0.map_or(TX_INDEX_NULL_SENTINEL, i64::from)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIGEST32
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte hash digest. All-zero is normalized to [`None`] at construction,
/// matching the on-chain convention that an unset hash field is zero-filled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest32([u8; 32]);

impl Digest32 {
    /// Construct from raw bytes, normalizing all-zero to `None`.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        if bytes == [0u8; 32] {
            None
        } else {
            Some(Self(bytes))
        }
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest32({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod pubkey_tests {
        use super::*;

        #[test]
        fn round_trips_through_base58() {
            let bytes = [7u8; 32];
            let key = Pubkey::from_bytes(bytes);
            let encoded = key.to_string();
            let decoded = Pubkey::from_base58(&encoded).unwrap();
            assert_eq!(key, decoded);
        }

        #[test]
        fn rejects_wrong_length() {
            let short = bs58::encode([1u8; 10]).into_string();
            assert_eq!(
                Pubkey::from_base58(&short),
                Err(InvalidPubkey::WrongLength(10))
            );
        }

        #[test]
        fn zero_is_zero() {
            assert!(Pubkey::ZERO.is_zero());
            assert!(!Pubkey::from_bytes([1u8; 32]).is_zero());
        }
    }

    mod raw_amount_tests {
        use super::*;

        #[test]
        fn rejects_non_digit_payload() {
            assert!(RawAmount::new("12a4", 0).is_err());
        }

        #[test]
        fn zero_is_zero_decimal() {
            assert_eq!(
                RawAmount::zero().as_decimal(),
                bigdecimal::BigDecimal::from(0)
            );
        }

        #[test]
        fn applies_exponent() {
            let amount = RawAmount::new("1500", -2).unwrap();
            assert_eq!(
                amount.as_decimal(),
                bigdecimal::BigDecimal::from_str("15.00").unwrap()
            );
        }
    }

    mod slot_tests {
        use super::*;

        #[test]
        fn next_saturates() {
            assert_eq!(Slot(u64::MAX).next(), Slot(u64::MAX));
        }

        #[test]
        fn saturating_sub_floors_at_zero() {
            assert_eq!(Slot(5).saturating_sub(10), Slot(0));
        }
    }

    mod tx_index_tests {
        use super::*;

        #[test]
        fn resolved_sorts_by_value() {
            assert_eq!(TxIndex(Some(3)).sort_key(), 3);
        }

        #[test]
        fn unresolved_sorts_last() {
            assert_eq!(TxIndex(None).sort_key(), TX_INDEX_NULL_SENTINEL);
        }
    }

    mod digest_tests {
        use super::*;

        #[test]
        fn all_zero_normalizes_to_none() {
            assert!(Digest32::from_bytes([0u8; 32]).is_none());
        }

        #[test]
        fn nonzero_round_trips() {
            let mut bytes = [0u8; 32];
            bytes[0] = 1;
            let digest = Digest32::from_bytes(bytes).unwrap();
            assert_eq!(digest.as_bytes(), &bytes);
        }
    }
}
